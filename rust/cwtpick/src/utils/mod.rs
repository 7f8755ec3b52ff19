pub mod correlation;
pub mod integration;
