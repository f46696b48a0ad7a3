use std::sync::OnceLock;

use crate::{Float, JalebiResult};

/// Number of nodes in the cached Gauss-Legendre rule. A 64-point rule is exact for polynomials
/// up to degree 127 and converges quickly for the smooth peaked shapes used here.
pub const QUADRATURE_POINTS: usize = 64;

/// A Gauss-Legendre quadrature rule on `[-1, 1]`.
pub struct GaussLegendreRule {
    /// Quadrature nodes (roots of the Legendre polynomial).
    pub nodes: Vec<Float>,
    /// Quadrature weights (sum to 2).
    pub weights: Vec<Float>,
}

static GAUSS_LEGENDRE: OnceLock<GaussLegendreRule> = OnceLock::new();

/// The cached [`QUADRATURE_POINTS`]-node Gauss-Legendre rule.
///
/// Nodes are found by Newton iteration on the Legendre recurrence, seeded with the Chebyshev
/// estimate of the roots; weights follow from the derivative at each root.
pub fn gauss_legendre() -> &'static GaussLegendreRule {
    GAUSS_LEGENDRE.get_or_init(|| {
        let n = QUADRATURE_POINTS;
        let mut nodes = vec![0.0 as Float; n];
        let mut weights = vec![0.0 as Float; n];
        // The rule is symmetric, so only half the roots need to be found.
        let m = (n + 1) / 2;
        for i in 0..m {
            let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut dp = 0.0;
            for _ in 0..100 {
                let (p, d) = legendre_and_derivative(n, x);
                dp = d;
                let dx = p / d;
                x -= dx;
                if dx.abs() < 1.0e-15 {
                    break;
                }
            }
            let w = 2.0 / ((1.0 - x * x) * dp * dp);
            nodes[i] = -x as Float;
            nodes[n - 1 - i] = x as Float;
            weights[i] = w as Float;
            weights[n - 1 - i] = w as Float;
        }
        GaussLegendreRule { nodes, weights }
    })
}

/// Evaluate the order-`n` Legendre polynomial and its derivative at `x` by the three-term
/// recurrence.
fn legendre_and_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

/// The Legendre polynomial `P_n(x)` for small `n`.
pub fn legendre_p(n: usize, x: Float) -> Float {
    match n {
        0 => 1.0,
        1 => x,
        _ => {
            let mut p0 = 1.0;
            let mut p1 = x;
            for k in 2..=n {
                let k = k as Float;
                let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
                p0 = p1;
                p1 = p2;
            }
            p1
        }
    }
}

/// Integrate `f` over `[lower, upper]` with the cached Gauss-Legendre rule.
pub fn integrate<F>(mut f: F, lower: Float, upper: Float) -> JalebiResult<Float>
where
    F: FnMut(Float) -> JalebiResult<Float>,
{
    let rule = gauss_legendre();
    let half_width = 0.5 * (upper - lower);
    let center = 0.5 * (upper + lower);
    let mut total = 0.0;
    for (&node, &weight) in rule.nodes.iter().zip(rule.weights.iter()) {
        total += weight * f(center + half_width * node)?;
    }
    Ok(half_width * total)
}

/// Integrate `f` over a box, one nested Gauss-Legendre rule per axis.
pub fn integrate_box<F>(f: &mut F, bounds: &[(Float, Float)]) -> JalebiResult<Float>
where
    F: FnMut(&[Float]) -> JalebiResult<Float>,
{
    let mut point = vec![0.0; bounds.len()];
    integrate_box_inner(f, bounds, &mut point, 0)
}

fn integrate_box_inner<F>(
    f: &mut F,
    bounds: &[(Float, Float)],
    point: &mut Vec<Float>,
    axis: usize,
) -> JalebiResult<Float>
where
    F: FnMut(&[Float]) -> JalebiResult<Float>,
{
    if axis == bounds.len() {
        return f(point);
    }
    let rule = gauss_legendre();
    let (lower, upper) = bounds[axis];
    let half_width = 0.5 * (upper - lower);
    let center = 0.5 * (upper + lower);
    let mut total = 0.0;
    for (&node, &weight) in rule.nodes.iter().zip(rule.weights.iter()) {
        point[axis] = center + half_width * node;
        total += weight * integrate_box_inner(f, bounds, point, axis + 1)?;
    }
    Ok(half_width * total)
}

/// The error function, via the Abramowitz & Stegun 7.1.26 rational approximation
/// (absolute error below `1.5e-7`, well inside the normalization tolerances used here).
pub fn erf(x: Float) -> Float {
    const A1: Float = 0.254829592;
    const A2: Float = -0.284496736;
    const A3: Float = 1.421413741;
    const A4: Float = -1.453152027;
    const A5: Float = 1.061405429;
    const P: Float = 0.3275911;
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gauss_legendre_weights_sum_to_two() {
        let rule = gauss_legendre();
        let total: Float = rule.weights.iter().sum();
        assert_relative_eq!(total, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn quadrature_is_exact_for_polynomials() {
        // ∫_0^2 x^5 dx = 32/3
        let value = integrate(|x| Ok(x.powi(5)), 0.0, 2.0).unwrap();
        assert_relative_eq!(value, 32.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn quadrature_handles_peaked_integrands() {
        // Narrow Gaussian over a wide range, σ/range ≈ 0.05 as in the mass fit.
        let sigma: Float = 16.0;
        let mu: Float = 5280.0;
        let value = integrate(
            |x| Ok((-0.5 * ((x - mu) / sigma).powi(2)).exp()),
            5200.0,
            5500.0,
        )
        .unwrap();
        let exact = sigma
            * (crate::PI / 2.0).sqrt()
            * (erf((5500.0 - mu) / (sigma * (2.0 as Float).sqrt()))
                - erf((5200.0 - mu) / (sigma * (2.0 as Float).sqrt())));
        assert_relative_eq!(value, exact, max_relative = 1e-6);
    }

    #[test]
    fn box_integration_factorizes() {
        let value = integrate_box(&mut |p: &[Float]| Ok(p[0] * p[0] * p[1]), &[(-1.0, 1.0), (0.0, 2.0)])
            .unwrap();
        // (∫_{-1}^{1} x² dx)(∫_0^2 y dy) = (2/3)(2)
        assert_relative_eq!(value, 4.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn erf_reference_values() {
        // The rational approximation is only accurate to ~1.5e-7 in absolute terms, even at 0.
        assert_relative_eq!(erf(0.0), 0.0, epsilon = 1.5e-7);
        assert_relative_eq!(erf(1.0), 0.8427007929497149, epsilon = 1e-6);
        assert_relative_eq!(erf(-1.0), -0.8427007929497149, epsilon = 1e-6);
        assert_relative_eq!(erf(3.0), 0.9999779095030014, epsilon = 1e-6);
    }

    #[test]
    fn legendre_polynomials() {
        assert_relative_eq!(legendre_p(1, 0.5), 0.5);
        assert_relative_eq!(legendre_p(2, 0.5), 0.5 * (3.0 * 0.25 - 1.0));
    }
}
