use crate::errors::DataProcessingError;

/// Calculates the pearson correlation between two slices of the same size.
///
/// Returns `Ok(None)` when either slice has no variance, in which case
/// the correlation is undefined.
///
/// # Example
///
/// ```
/// use cwtpick::utils::correlation::pearson_correlation;
///
/// let a = vec![1.0, 2.0, 3.0];
/// let b = vec![2.0, 4.0, 6.0];
/// let result = pearson_correlation(&a, &b).unwrap().unwrap();
/// assert!((result - 1.0).abs() < 1e-12);
/// ```
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Result<Option<f64>, DataProcessingError> {
    if a.len() != b.len() {
        return Err(DataProcessingError::ExpectedSlicesSameLength {
            expected: a.len(),
            other: b.len(),
            context: "pearson_correlation".to_string(),
        });
    }
    if a.is_empty() {
        return Err(DataProcessingError::ExpectedNonEmptyData {
            context: Some("pearson_correlation".to_string()),
        });
    }

    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Ok(None);
    }

    // Rounding can push perfectly correlated data slightly past 1
    Ok(Some((cov / denom).clamp(-1.0, 1.0)))
}

/// Squared pearson correlation, the goodness of fit measure of a peak shape.
///
/// Degenerate inputs (no variance) score 0.0 instead of propagating a NaN.
pub fn squared_pearson(a: &[f64], b: &[f64]) -> Result<f64, DataProcessingError> {
    Ok(pearson_correlation(a, b)?.map(|r| r * r).unwrap_or(0.0))
}

/// Squared pearson correlation between a model and observations, computed
/// without allocating the model values.
///
/// Same semantics as [squared_pearson], a zero variance side scores 0.0.
pub fn squared_pearson_with<F: Fn(f64) -> f64>(positions: &[f64], observed: &[f64], model: F) -> f64 {
    let n = positions.len().min(observed.len());
    if n == 0 {
        return 0.0;
    }
    let nf = n as f64;

    let mut sum_m = 0.0;
    let mut sum_o = 0.0;
    for i in 0..n {
        sum_m += model(positions[i]);
        sum_o += observed[i];
    }
    let mean_m = sum_m / nf;
    let mean_o = sum_o / nf;

    let mut cov = 0.0;
    let mut var_m = 0.0;
    let mut var_o = 0.0;
    for i in 0..n {
        let dm = model(positions[i]) - mean_m;
        let dobs = observed[i] - mean_o;
        cov += dm * dobs;
        var_m += dm * dm;
        var_o += dobs * dobs;
    }

    let denom = var_m * var_o;
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let r2 = (cov * cov) / denom;
    if r2.is_finite() { r2.min(1.0) } else { 0.0 }
}
