use crate::{
    parameters::{ParameterId, ParameterValues},
    pdfs::{check_density, check_norm, check_point, Pdf},
    space::Space,
    utils::functions::erf,
    Float, JalebiError, JalebiResult, PI,
};

/// A double-sided Crystal Ball mass peak: a Gaussian core with independent left/right widths
/// and independent power-law tails on either side,
///
/// ```math
/// f(m) = \begin{cases}
///   A_L\left(B_L - \frac{m-\mu}{\sigma_L}\right)^{-n_L} & \frac{m-\mu}{\sigma_L} < -\alpha_L \\
///   e^{-\frac{(m-\mu)^2}{2\sigma_L^2}} & -\alpha_L \le \frac{m-\mu}{\sigma_L} \le 0 \\
///   e^{-\frac{(m-\mu)^2}{2\sigma_R^2}} & 0 < \frac{m-\mu}{\sigma_R} \le \alpha_R \\
///   A_R\left(B_R + \frac{m-\mu}{\sigma_R}\right)^{-n_R} & \frac{m-\mu}{\sigma_R} > \alpha_R \\
/// \end{cases}
/// ```
///
/// with `A = (n/α)^n e^{-α²/2}` and `B = n/α - α` on each side, which makes the shape
/// continuous at the tail junctions. The normalization over the declared mass range is closed
/// form: error-function core pieces plus elementary power-law tail integrals.
///
/// The six shape parameters (`σ_L, α_L, n_L, σ_R, α_R, n_R`) are typically fixed from a prior
/// one-dimensional calibration fit, leaving only `μ` floating.
#[derive(Clone)]
pub struct DoubleSidedCrystalBall {
    name: String,
    space: Space,
    mu: ParameterId,
    sigma_l: ParameterId,
    alpha_l: ParameterId,
    n_l: ParameterId,
    sigma_r: ParameterId,
    alpha_r: ParameterId,
    n_r: ParameterId,
}

struct Shape {
    mu: Float,
    sigma_l: Float,
    alpha_l: Float,
    n_l: Float,
    sigma_r: Float,
    alpha_r: Float,
    n_r: Float,
}

impl DoubleSidedCrystalBall {
    /// Construct a [`DoubleSidedCrystalBall`] over a one-dimensional mass space.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        space: &Space,
        mu: ParameterId,
        sigma_l: ParameterId,
        alpha_l: ParameterId,
        n_l: ParameterId,
        sigma_r: ParameterId,
        alpha_r: ParameterId,
        n_r: ParameterId,
    ) -> JalebiResult<Box<Self>> {
        if space.dim() != 1 {
            return Err(JalebiError::InvalidModel {
                reason: format!(
                    "mass peak \"{}\" requires a 1-dimensional space, got {}",
                    name,
                    space.dim()
                ),
            });
        }
        Ok(Box::new(Self {
            name: name.to_string(),
            space: space.clone(),
            mu,
            sigma_l,
            alpha_l,
            n_l,
            sigma_r,
            alpha_r,
            n_r,
        }))
    }

    fn shape(&self, values: &ParameterValues) -> JalebiResult<Shape> {
        let shape = Shape {
            mu: values.get(self.mu),
            sigma_l: values.get(self.sigma_l),
            alpha_l: values.get(self.alpha_l),
            n_l: values.get(self.n_l),
            sigma_r: values.get(self.sigma_r),
            alpha_r: values.get(self.alpha_r),
            n_r: values.get(self.n_r),
        };
        for (label, value) in [
            ("sigma_l", shape.sigma_l),
            ("alpha_l", shape.alpha_l),
            ("n_l", shape.n_l),
            ("sigma_r", shape.sigma_r),
            ("alpha_r", shape.alpha_r),
            ("n_r", shape.n_r),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(JalebiError::InvalidShape {
                    component: self.name.clone(),
                    reason: format!("{label} must be finite and positive, got {value}"),
                });
            }
        }
        Ok(shape)
    }
}

/// `∫ exp(-z²/2) dz` over `[z_a, z_b]` in units of the local width.
fn gaussian_piece(sigma: Float, z_a: Float, z_b: Float) -> Float {
    let sqrt_half = (0.5 as Float).sqrt();
    sigma * (PI / 2.0).sqrt() * (erf(z_b * sqrt_half) - erf(z_a * sqrt_half))
}

/// `∫ (b - z)^{-n} dz` over `[z_a, z_b]`, valid for `b - z > 0` on the interval.
fn power_tail_piece(b: Float, n: Float, z_a: Float, z_b: Float) -> Float {
    if (n - 1.0).abs() < 1.0e-9 {
        ((b - z_a) / (b - z_b)).ln()
    } else {
        ((b - z_b).powf(1.0 - n) - (b - z_a).powf(1.0 - n)) / (n - 1.0)
    }
}

impl Pdf for DoubleSidedCrystalBall {
    fn name(&self) -> &str {
        &self.name
    }
    fn space(&self) -> &Space {
        &self.space
    }
    fn density(&self, point: &[Float], values: &ParameterValues) -> JalebiResult<Float> {
        check_point(&self.name, &self.space, point)?;
        let x = point[0];
        let s = self.shape(values)?;
        let f = if x < s.mu {
            let z = (x - s.mu) / s.sigma_l;
            if z < -s.alpha_l {
                let a = (s.n_l / s.alpha_l).powf(s.n_l) * (-0.5 * s.alpha_l * s.alpha_l).exp();
                let b = s.n_l / s.alpha_l - s.alpha_l;
                a * (b - z).powf(-s.n_l)
            } else {
                (-0.5 * z * z).exp()
            }
        } else {
            let z = (x - s.mu) / s.sigma_r;
            if z > s.alpha_r {
                let a = (s.n_r / s.alpha_r).powf(s.n_r) * (-0.5 * s.alpha_r * s.alpha_r).exp();
                let b = s.n_r / s.alpha_r - s.alpha_r;
                a * (b + z).powf(-s.n_r)
            } else {
                (-0.5 * z * z).exp()
            }
        };
        check_density(&self.name, f)
    }
    fn norm(&self, values: &ParameterValues) -> JalebiResult<Float> {
        let s = self.shape(values)?;
        let lower = self.space.axis(0).lower();
        let upper = self.space.axis(0).upper();
        let left_junction = s.mu - s.alpha_l * s.sigma_l;
        let right_junction = s.mu + s.alpha_r * s.sigma_r;
        let mut total = 0.0;

        // Left power-law tail.
        let (a, b) = (lower, upper.min(left_junction));
        if a < b {
            let amp = (s.n_l / s.alpha_l).powf(s.n_l) * (-0.5 * s.alpha_l * s.alpha_l).exp();
            let shift = s.n_l / s.alpha_l - s.alpha_l;
            total += s.sigma_l
                * amp
                * power_tail_piece(shift, s.n_l, (a - s.mu) / s.sigma_l, (b - s.mu) / s.sigma_l);
        }
        // Left Gaussian core.
        let (a, b) = (lower.max(left_junction), upper.min(s.mu));
        if a < b {
            total += gaussian_piece(s.sigma_l, (a - s.mu) / s.sigma_l, (b - s.mu) / s.sigma_l);
        }
        // Right Gaussian core.
        let (a, b) = (lower.max(s.mu), upper.min(right_junction));
        if a < b {
            total += gaussian_piece(s.sigma_r, (a - s.mu) / s.sigma_r, (b - s.mu) / s.sigma_r);
        }
        // Right power-law tail; mirror of the left via z → -z.
        let (a, b) = (lower.max(right_junction), upper);
        if a < b {
            let amp = (s.n_r / s.alpha_r).powf(s.n_r) * (-0.5 * s.alpha_r * s.alpha_r).exp();
            let shift = s.n_r / s.alpha_r - s.alpha_r;
            total += s.sigma_r
                * amp
                * power_tail_piece(shift, s.n_r, (s.mu - b) / s.sigma_r, (s.mu - a) / s.sigma_r);
        }
        check_norm(&self.name, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSet;
    use crate::space::Observable;
    use crate::utils::functions::integrate;
    use approx::assert_relative_eq;

    fn calibrated() -> (ParameterSet, Box<DoubleSidedCrystalBall>) {
        let mut params = ParameterSet::new();
        let mu = params.register("mu", 5280.0, 5200.0, 5400.0).unwrap();
        let sigma_l = params.register("sigmal", 15.9, 5.0, 80.0).unwrap();
        let alpha_l = params.register("alphal", 1.36, 0.1, 5.0).unwrap();
        let n_l = params.register("nl", 9.77, 0.5, 50.0).unwrap();
        let sigma_r = params.register("sigmar", 15.5, 5.0, 80.0).unwrap();
        let alpha_r = params.register("alphar", 1.66, 0.1, 5.0).unwrap();
        let n_r = params.register("nr", 146.0, 0.5, 500.0).unwrap();
        for name in ["sigmal", "alphal", "nl", "sigmar", "alphar", "nr"] {
            params.fix(name).unwrap();
        }
        let mass = Observable::new("B_mass", 5200.0, 5500.0).unwrap();
        let pdf = DoubleSidedCrystalBall::new(
            "sig_mass",
            &mass.space(),
            mu,
            sigma_l,
            alpha_l,
            n_l,
            sigma_r,
            alpha_r,
            n_r,
        )
        .unwrap();
        (params, pdf)
    }

    /// Quadrature over each smooth piece of the shape separately; the tail junctions are kinks
    /// that a single fixed-order panel over the whole range does not resolve.
    fn piecewise_quadrature(
        pdf: &DoubleSidedCrystalBall,
        values: &ParameterValues,
        edges: &[Float],
    ) -> Float {
        edges
            .windows(2)
            .map(|w| integrate(|x| pdf.density(&[x], values), w[0], w[1]).unwrap())
            .sum()
    }

    #[test]
    fn peak_and_continuity() {
        let (params, pdf) = calibrated();
        let values = params.snapshot();
        assert_relative_eq!(pdf.density(&[5280.0], &values).unwrap(), 1.0);
        // Continuity across the left tail junction z = -alpha_l.
        let junction = 5280.0 - 1.36 * 15.9;
        let below = pdf.density(&[junction - 1e-6], &values).unwrap();
        let above = pdf.density(&[junction + 1e-6], &values).unwrap();
        assert_relative_eq!(below, above, max_relative = 1e-4);
        // Continuity across the right tail junction z = +alpha_r.
        let junction = 5280.0 + 1.66 * 15.5;
        let below = pdf.density(&[junction - 1e-6], &values).unwrap();
        let above = pdf.density(&[junction + 1e-6], &values).unwrap();
        assert_relative_eq!(below, above, max_relative = 1e-4);
    }

    #[test]
    fn closed_form_norm_matches_quadrature() {
        let (params, pdf) = calibrated();
        let values = params.snapshot();
        let closed = pdf.norm(&values).unwrap();
        let edges = [5200.0, 5280.0 - 1.36 * 15.9, 5280.0, 5280.0 + 1.66 * 15.5, 5500.0];
        let numeric = piecewise_quadrature(&pdf, &values, &edges);
        assert_relative_eq!(closed, numeric, max_relative = 1e-4);
    }

    #[test]
    fn norm_matches_quadrature_across_shape_grid() {
        let (mut params, pdf) = calibrated();
        for (mu, sigma, alpha, n) in [
            (5250.0, 10.0, 0.8, 2.0),
            (5300.0, 25.0, 2.5, 1.0),
            (5280.0, 40.0, 0.5, 30.0),
        ] {
            params.set_value("mu", mu).unwrap();
            params.set_value("sigmal", sigma).unwrap();
            params.set_value("alphal", alpha).unwrap();
            params.set_value("nl", n).unwrap();
            let values = params.snapshot();
            let closed = pdf.norm(&values).unwrap();
            let edges = [5200.0, mu - alpha * sigma, mu, mu + 1.66 * 15.5, 5500.0];
            let numeric = piecewise_quadrature(&pdf, &values, &edges);
            assert_relative_eq!(closed, numeric, max_relative = 1e-4);
        }
    }

    #[test]
    fn density_nonnegative_over_range() {
        let (params, pdf) = calibrated();
        let values = params.snapshot();
        for i in 0..=300 {
            let x = 5200.0 + i as Float;
            let f = pdf.density(&[x], &values).unwrap();
            assert!(f.is_finite() && f >= 0.0);
        }
    }

    #[test]
    fn invalid_shape_is_rejected() {
        let mut params = ParameterSet::new();
        let mu = params.register("mu", 5280.0, 5200.0, 5400.0).unwrap();
        let sigma = params.register("sigma", 1.0, -5.0, 80.0).unwrap();
        let alpha = params.register("alpha", 1.5, 0.1, 5.0).unwrap();
        let n = params.register("n", 2.0, 0.5, 50.0).unwrap();
        let mass = Observable::new("B_mass", 5200.0, 5500.0).unwrap();
        let pdf = DoubleSidedCrystalBall::new(
            "sig_mass",
            &mass.space(),
            mu,
            sigma,
            alpha,
            n,
            sigma,
            alpha,
            n,
        )
        .unwrap();
        params.set_value("sigma", -1.0).unwrap();
        let values = params.snapshot();
        assert!(matches!(
            pdf.density(&[5280.0], &values),
            Err(JalebiError::InvalidShape { .. })
        ));
    }
}
