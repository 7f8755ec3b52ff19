//! Joint refinement of all the accepted peak shapes of a signal.
//!
//! Overlapping peaks are fitted one at a time during depletion, so their
//! flanks absorb part of their neighbours. The refiner adjusts position and
//! both widths of every shape at once. At each sample the model is the sum of
//! the shapes whose region contains that sample, and drift away from the
//! initial fit is penalized. Heights stay fixed.

use std::fmt::Debug;

use tracing::debug;

use crate::config::{
    OptimizationConfig,
    PenaltyFactors,
};
use crate::models::{
    PeakShape,
    PeakShapeKind,
};

/// Data a refiner fits the shapes against.
#[derive(Debug, Clone, Copy)]
pub struct RefinementProblem<'a> {
    /// Positions of the unmodified signal.
    pub positions: &'a [f64],
    /// Intensities of the unmodified signal.
    pub intensities: &'a [f64],
    /// Inclusive sample range of every shape, same order as the shapes.
    pub regions: &'a [(usize, usize)],
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RefinementSummary {
    pub iterations: usize,
    pub initial_loss: f64,
    pub final_loss: f64,
    pub converged: bool,
}

/// Batch optimizer of accepted shapes.
///
/// Implementations may move positions and widths in place but must keep
/// the number and order of shapes.
pub trait PeakRefiner: Send + Sync + Debug {
    fn refine(&self, shapes: &mut [PeakShape], problem: &RefinementProblem<'_>)
    -> RefinementSummary;
}

/// Number of step halvings tried before giving up on an iteration.
const MAX_BACKTRACKS: usize = 30;

/// Penalized least squares refiner using diagonal Gauss-Newton steps with
/// backtracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenalizedGradientRefiner {
    penalties: PenaltyFactors,
    max_iterations: usize,
    delta_abs_error: f64,
    delta_rel_error: f64,
}

impl From<&OptimizationConfig> for PenalizedGradientRefiner {
    fn from(value: &OptimizationConfig) -> Self {
        Self {
            penalties: value.penalties,
            max_iterations: value.max_iterations,
            delta_abs_error: value.delta_abs_error,
            delta_rel_error: value.delta_rel_error,
        }
    }
}

impl Default for PenalizedGradientRefiner {
    fn default() -> Self {
        Self::from(&OptimizationConfig::default())
    }
}

/// Free parameters of one shape.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ShapeParams {
    position: f64,
    left_width: f64,
    right_width: f64,
}

impl ShapeParams {
    fn of(shape: &PeakShape) -> Self {
        Self {
            position: shape.position,
            left_width: shape.left_width,
            right_width: shape.right_width,
        }
    }

    fn apply(&self, shape: &mut PeakShape) {
        shape.position = self.position;
        shape.left_width = self.left_width;
        shape.right_width = self.right_width;
    }

    fn is_usable(&self) -> bool {
        self.position.is_finite()
            && self.left_width.is_finite()
            && self.left_width > 0.0
            && self.right_width.is_finite()
            && self.right_width > 0.0
    }
}

/// Value of the shape at `x` and its partial derivatives with respect
/// to position, left width and right width.
fn value_and_partials(shape: &PeakShape, x: f64) -> (f64, [f64; 3]) {
    let dx = x - shape.position;
    let on_left = x <= shape.position;
    let width = if on_left {
        shape.left_width
    } else {
        shape.right_width
    };
    let u = width * dx;
    let (value, d_du) = match shape.kind {
        PeakShapeKind::Lorentzian => {
            let denom = 1.0 + u * u;
            let value = shape.height / denom;
            (value, -2.0 * shape.height * u / (denom * denom))
        }
        PeakShapeKind::Sech2 => {
            let sech = 1.0 / u.cosh();
            let value = shape.height * sech * sech;
            (value, -2.0 * value * u.tanh())
        }
    };
    let d_position = -d_du * width;
    let d_width = d_du * dx;
    let partials = if on_left {
        [d_position, d_width, 0.0]
    } else {
        [d_position, 0.0, d_width]
    };
    (value, partials)
}

/// A sample inside at least one region, with the shapes whose region
/// contains it. Only those shapes are part of the model at that sample.
#[derive(Debug, Clone, PartialEq)]
struct SampleCover {
    index: usize,
    shapes: Vec<usize>,
}

/// Covered samples in increasing order. Regions are clamped to the signal,
/// the ones starting past its end or without a matching shape are ignored.
fn sample_covers(problem: &RefinementProblem<'_>, num_shapes: usize) -> Vec<SampleCover> {
    let n = problem.positions.len().min(problem.intensities.len());
    let mut per_sample: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (k, &(left, right)) in problem.regions.iter().enumerate().take(num_shapes) {
        if left >= n || left > right {
            continue;
        }
        for slot in &mut per_sample[left..=right.min(n - 1)] {
            slot.push(k);
        }
    }
    per_sample
        .into_iter()
        .enumerate()
        .filter(|(_, shapes)| !shapes.is_empty())
        .map(|(index, shapes)| SampleCover { index, shapes })
        .collect()
}

impl PenalizedGradientRefiner {
    pub fn new(
        penalties: PenaltyFactors,
        max_iterations: usize,
        delta_abs_error: f64,
        delta_rel_error: f64,
    ) -> Self {
        Self {
            penalties,
            max_iterations,
            delta_abs_error,
            delta_rel_error,
        }
    }

    fn penalty_weights(&self) -> [f64; 3] {
        [
            self.penalties.position,
            self.penalties.left_width,
            self.penalties.right_width,
        ]
    }

    fn loss(
        &self,
        shapes: &[PeakShape],
        initial: &[ShapeParams],
        covers: &[SampleCover],
        problem: &RefinementProblem<'_>,
    ) -> f64 {
        let mut loss = 0.0;
        for cover in covers {
            let x = problem.positions[cover.index];
            let model: f64 = cover.shapes.iter().map(|&k| shapes[k].evaluate(x)).sum();
            let residual = problem.intensities[cover.index] - model;
            loss += residual * residual;
        }
        let [wp, wl, wr] = self.penalty_weights();
        for (shape, init) in shapes.iter().zip(initial.iter()) {
            loss += wp * (shape.position - init.position).powi(2);
            loss += wl * (shape.left_width - init.left_width).powi(2);
            loss += wr * (shape.right_width - init.right_width).powi(2);
        }
        loss
    }

    /// Diagonal Gauss-Newton step for every shape.
    fn step(
        &self,
        shapes: &[PeakShape],
        initial: &[ShapeParams],
        covers: &[SampleCover],
        problem: &RefinementProblem<'_>,
    ) -> Vec<[f64; 3]> {
        let mut gradient = vec![[0.0; 3]; shapes.len()];
        let mut curvature = vec![[0.0; 3]; shapes.len()];
        let mut partials: Vec<(usize, [f64; 3])> = Vec::new();

        for cover in covers {
            let x = problem.positions[cover.index];
            let mut model = 0.0;
            partials.clear();
            for &k in &cover.shapes {
                let (value, p) = value_and_partials(&shapes[k], x);
                model += value;
                partials.push((k, p));
            }
            let residual = problem.intensities[cover.index] - model;
            for &(k, p) in &partials {
                for j in 0..3 {
                    gradient[k][j] -= 2.0 * residual * p[j];
                    curvature[k][j] += 2.0 * p[j] * p[j];
                }
            }
        }

        let weights = self.penalty_weights();
        shapes
            .iter()
            .zip(initial.iter())
            .enumerate()
            .map(|(k, (shape, init))| {
                let current = [shape.position, shape.left_width, shape.right_width];
                let start = [init.position, init.left_width, init.right_width];
                let mut delta = [0.0; 3];
                for j in 0..3 {
                    let g = gradient[k][j] + 2.0 * weights[j] * (current[j] - start[j]);
                    let h = curvature[k][j] + 2.0 * weights[j];
                    delta[j] = if h > f64::EPSILON { -g / h } else { 0.0 };
                }
                delta
            })
            .collect()
    }
}

impl PeakRefiner for PenalizedGradientRefiner {
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    fn refine(
        &self,
        shapes: &mut [PeakShape],
        problem: &RefinementProblem<'_>,
    ) -> RefinementSummary {
        let covers = sample_covers(problem, shapes.len());
        let initial: Vec<ShapeParams> = shapes.iter().map(ShapeParams::of).collect();
        let initial_loss = self.loss(shapes, &initial, &covers, problem);
        let mut summary = RefinementSummary {
            iterations: 0,
            initial_loss,
            final_loss: initial_loss,
            converged: false,
        };
        if shapes.is_empty() || covers.is_empty() || !initial_loss.is_finite() {
            summary.converged = true;
            return summary;
        }

        let mut current_loss = initial_loss;
        let mut trial: Vec<PeakShape> = shapes.to_vec();
        for iteration in 0..self.max_iterations {
            summary.iterations = iteration + 1;
            let delta = self.step(shapes, &initial, &covers, problem);

            let mut step_size = 1.0;
            let mut improved = None;
            for _ in 0..MAX_BACKTRACKS {
                let mut usable = true;
                for ((candidate, shape), d) in trial.iter_mut().zip(shapes.iter()).zip(delta.iter()) {
                    let params = ShapeParams {
                        position: shape.position + step_size * d[0],
                        left_width: shape.left_width + step_size * d[1],
                        right_width: shape.right_width + step_size * d[2],
                    };
                    if !params.is_usable() {
                        usable = false;
                        break;
                    }
                    *candidate = *shape;
                    params.apply(candidate);
                }
                if usable {
                    let loss = self.loss(&trial, &initial, &covers, problem);
                    if loss.is_finite() && loss < current_loss {
                        improved = Some(loss);
                        break;
                    }
                }
                step_size *= 0.5;
            }

            let Some(new_loss) = improved else {
                // No descent left along the step direction
                summary.converged = true;
                break;
            };
            shapes.copy_from_slice(&trial);
            let change = current_loss - new_loss;
            let previous = current_loss;
            current_loss = new_loss;
            if change <= self.delta_abs_error || change <= self.delta_rel_error * previous {
                summary.converged = true;
                break;
            }
        }

        summary.final_loss = current_loss;
        debug!(
            "Refined {} peaks in {} iterations, loss {:.4e} -> {:.4e}",
            shapes.len(),
            summary.iterations,
            summary.initial_loss,
            summary.final_loss
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lorentz(height: f64, position: f64, width: f64) -> PeakShape {
        PeakShape {
            height,
            position,
            left_width: width,
            right_width: width,
            kind: PeakShapeKind::Lorentzian,
            correlation: 0.0,
            area: 0.0,
        }
    }

    fn signal_of(shapes: &[PeakShape], n: usize, step: f64) -> (Vec<f64>, Vec<f64>) {
        let positions: Vec<f64> = (0..n).map(|i| i as f64 * step).collect();
        let intensities = positions
            .iter()
            .map(|&x| shapes.iter().map(|s| s.evaluate(x)).sum())
            .collect();
        (positions, intensities)
    }

    fn free_refiner(iterations: usize) -> PenalizedGradientRefiner {
        PenalizedGradientRefiner::new(
            PenaltyFactors {
                position: 0.0,
                left_width: 0.0,
                right_width: 0.0,
            },
            iterations,
            0.0,
            0.0,
        )
    }

    #[test]
    fn test_partials_match_finite_differences() {
        for kind in [PeakShapeKind::Lorentzian, PeakShapeKind::Sech2] {
            let mut shape = lorentz(10.0, 1.0, 3.0);
            shape.kind = kind;
            shape.right_width = 5.0;
            for x in [0.6, 0.95, 1.1, 1.4] {
                let (value, partials) = value_and_partials(&shape, x);
                assert!((value - shape.evaluate(x)).abs() < 1e-12);
                let h = 1e-6;
                let bump = |f: &dyn Fn(&mut PeakShape)| {
                    let mut s = shape;
                    f(&mut s);
                    (s.evaluate(x) - shape.evaluate(x)) / h
                };
                let numeric = [
                    bump(&|s| s.position += h),
                    bump(&|s| s.left_width += h),
                    bump(&|s| s.right_width += h),
                ];
                for j in 0..3 {
                    assert!(
                        (numeric[j] - partials[j]).abs() < 1e-3 * (1.0 + partials[j].abs()),
                        "{:?} x={} j={} numeric {} analytic {}",
                        kind,
                        x,
                        j,
                        numeric[j],
                        partials[j]
                    );
                }
            }
        }
    }

    #[test]
    fn test_recovers_shifted_position() {
        let truth = [lorentz(100.0, 1.0, 20.0)];
        let (positions, intensities) = signal_of(&truth, 201, 0.01);
        let regions = [(50, 150)];
        let problem = RefinementProblem {
            positions: &positions,
            intensities: &intensities,
            regions: &regions,
        };
        let mut shapes = [lorentz(100.0, 1.02, 16.0)];
        let summary = free_refiner(50).refine(&mut shapes, &problem);
        assert!(summary.final_loss < summary.initial_loss);
        assert!((shapes[0].position - 1.0).abs() < 0.005, "{:?}", shapes[0]);
        assert!((shapes[0].left_width - 20.0).abs() < 1.0, "{:?}", shapes[0]);
    }

    #[test]
    fn test_overlapping_pair_improves() {
        let truth = [lorentz(100.0, 0.9, 15.0), lorentz(60.0, 1.1, 15.0)];
        let (positions, intensities) = signal_of(&truth, 201, 0.01);
        let regions = [(70, 110), (90, 130)];
        let problem = RefinementProblem {
            positions: &positions,
            intensities: &intensities,
            regions: &regions,
        };
        let mut shapes = [lorentz(100.0, 0.89, 10.0), lorentz(60.0, 1.11, 10.0)];
        let summary = free_refiner(15).refine(&mut shapes, &problem);
        assert_eq!(shapes.len(), 2);
        assert!(summary.final_loss < 0.5 * summary.initial_loss, "{:?}", summary);
        assert!(shapes[0].position < shapes[1].position);
    }

    #[test]
    fn test_heavy_penalty_keeps_initial_fit() {
        let truth = [lorentz(100.0, 1.0, 20.0)];
        let (positions, intensities) = signal_of(&truth, 201, 0.01);
        let regions = [(50, 150)];
        let problem = RefinementProblem {
            positions: &positions,
            intensities: &intensities,
            regions: &regions,
        };
        let refiner = PenalizedGradientRefiner::new(
            PenaltyFactors {
                position: 1e12,
                left_width: 1e12,
                right_width: 1e12,
            },
            15,
            1e-4,
            1e-4,
        );
        let mut shapes = [lorentz(100.0, 1.02, 16.0)];
        refiner.refine(&mut shapes, &problem);
        assert!((shapes[0].position - 1.02).abs() < 1e-3);
        assert!((shapes[0].left_width - 16.0).abs() < 1e-2);
    }

    #[test]
    fn test_samples_only_see_overlapping_shapes() {
        let positions = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let intensities = [0.0; 6];
        let regions = [(0, 2), (2, 4), (3, 9)];
        let problem = RefinementProblem {
            positions: &positions,
            intensities: &intensities,
            regions: &regions,
        };
        let covers = sample_covers(&problem, 2);
        let shapes_at: Vec<(usize, Vec<usize>)> =
            covers.into_iter().map(|c| (c.index, c.shapes)).collect();
        assert_eq!(
            shapes_at,
            vec![
                (0, vec![0]),
                (1, vec![0]),
                (2, vec![0, 1]),
                (3, vec![1]),
                (4, vec![1]),
            ]
        );

        // Regions running past the end are clamped
        let covers = sample_covers(&problem, 3);
        assert_eq!(covers.last().map(|c| c.index), Some(5));
    }

    #[test]
    fn test_empty_problem_is_noop() {
        let problem = RefinementProblem {
            positions: &[],
            intensities: &[],
            regions: &[],
        };
        let mut shapes: [PeakShape; 0] = [];
        let summary = PenalizedGradientRefiner::default().refine(&mut shapes, &problem);
        assert!(summary.converged);
        assert_eq!(summary.iterations, 0);
    }
}
