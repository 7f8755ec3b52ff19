/// Trapezoidal integral of `values` over (possibly irregular) `positions`.
///
/// Both slices are truncated to the shorter one, fewer than two points
/// integrate to 0.0.
///
/// ```
/// use cwtpick::utils::integration::trapezoid;
///
/// let x = [0.0, 1.0, 3.0];
/// let y = [0.0, 2.0, 2.0];
/// assert_eq!(trapezoid(&x, &y), 5.0);
/// ```
pub fn trapezoid(positions: &[f64], values: &[f64]) -> f64 {
    let n = positions.len().min(values.len());
    if n < 2 {
        return 0.0;
    }
    positions[..n]
        .windows(2)
        .zip(values[..n].windows(2))
        .map(|(x, y)| 0.5 * (y[0] + y[1]) * (x[1] - x[0]))
        .sum()
}
