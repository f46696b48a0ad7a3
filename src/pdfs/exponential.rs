use crate::{
    parameters::{ParameterId, ParameterSet, ParameterValues},
    pdfs::{check_density, check_norm, check_point, Pdf},
    space::Space,
    Float, JalebiError, JalebiResult,
};

/// An exponential background shape over a one-dimensional axis,
///
/// ```math
/// f(x) = e^{\lambda (x - x_\text{lo})}
/// ```
///
/// anchored at the lower edge of the axis so the density stays O(1) for the mass ranges used
/// here. The normalization is `(e^{\lambda w} - 1) / \lambda` with `w` the axis width, with the
/// uniform limit `w` as `λ → 0`.
///
/// The rate is required to be non-positive at construction time: the declared upper bound of
/// `λ` must not exceed zero, so the minimizer can never wander into a growing exponential.
#[derive(Clone)]
pub struct Exponential {
    name: String,
    space: Space,
    lambda: ParameterId,
}

impl Exponential {
    /// Construct an [`Exponential`] over a one-dimensional space.
    ///
    /// # Errors
    ///
    /// Returns [`NonDecayingRate`](JalebiError::NonDecayingRate) unless `lambda` is a scalar
    /// parameter whose declared upper bound is at most zero.
    pub fn new(
        name: &str,
        space: &Space,
        lambda: ParameterId,
        parameters: &ParameterSet,
    ) -> JalebiResult<Box<Self>> {
        if space.dim() != 1 {
            return Err(JalebiError::InvalidModel {
                reason: format!(
                    "exponential \"{}\" requires a 1-dimensional space, got {}",
                    name,
                    space.dim()
                ),
            });
        }
        match parameters.bounds(lambda) {
            Some((_, upper)) if upper <= 0.0 => {}
            Some((_, upper)) => {
                return Err(JalebiError::NonDecayingRate {
                    name: parameters.name(lambda).to_string(),
                    upper,
                })
            }
            None => {
                return Err(JalebiError::NonDecayingRate {
                    name: parameters.name(lambda).to_string(),
                    upper: Float::INFINITY,
                })
            }
        }
        Ok(Box::new(Self {
            name: name.to_string(),
            space: space.clone(),
            lambda,
        }))
    }
}

impl Pdf for Exponential {
    fn name(&self) -> &str {
        &self.name
    }
    fn space(&self) -> &Space {
        &self.space
    }
    fn density(&self, point: &[Float], values: &ParameterValues) -> JalebiResult<Float> {
        check_point(&self.name, &self.space, point)?;
        let lambda = values.get(self.lambda);
        let f = (lambda * (point[0] - self.space.axis(0).lower())).exp();
        check_density(&self.name, f)
    }
    fn norm(&self, values: &ParameterValues) -> JalebiResult<Float> {
        let lambda = values.get(self.lambda);
        let width = self.space.axis(0).width();
        let total = if lambda.abs() < 1.0e-12 {
            width
        } else {
            ((lambda * width).exp() - 1.0) / lambda
        };
        check_norm(&self.name, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::Observable;
    use crate::utils::functions::integrate;
    use approx::assert_relative_eq;

    fn mass_axis() -> Space {
        Observable::new("B_mass", 5200.0, 5500.0).unwrap().space()
    }

    #[test]
    fn closed_form_norm_matches_quadrature() {
        let mut params = ParameterSet::new();
        let lambda = params.register("lambda", -0.001, -1.0, 0.0).unwrap();
        let pdf = Exponential::new("bkg_mass", &mass_axis(), lambda, &params).unwrap();
        let values = params.snapshot();
        let closed = pdf.norm(&values).unwrap();
        let numeric = integrate(|x| pdf.density(&[x], &values), 5200.0, 5500.0).unwrap();
        assert_relative_eq!(closed, numeric, max_relative = 1e-12);
    }

    #[test]
    fn zero_rate_reduces_to_uniform() {
        let mut params = ParameterSet::new();
        let lambda = params.register("lambda", 0.0, -1.0, 0.0).unwrap();
        let pdf = Exponential::new("bkg_mass", &mass_axis(), lambda, &params).unwrap();
        let values = params.snapshot();
        assert_relative_eq!(pdf.density(&[5350.0], &values).unwrap(), 1.0);
        assert_relative_eq!(pdf.norm(&values).unwrap(), 300.0);
    }

    #[test]
    fn evaluation_outside_the_axis_is_rejected() {
        let mut params = ParameterSet::new();
        let lambda = params.register("lambda", -0.01, -1.0, 0.0).unwrap();
        let pdf = Exponential::new("bkg_mass", &mass_axis(), lambda, &params).unwrap();
        let values = params.snapshot();
        assert!(matches!(
            pdf.density(&[6000.0], &values),
            Err(JalebiError::PointOutOfBounds { .. })
        ));
        assert!(matches!(
            pdf.density(&[5350.0, 0.5], &values),
            Err(JalebiError::PointOutOfBounds { .. })
        ));
    }

    #[test]
    fn growing_rate_bound_is_rejected() {
        let mut params = ParameterSet::new();
        let lambda = params.register("lambda", -0.001, -1.0, 1.0).unwrap();
        assert!(matches!(
            Exponential::new("bkg_mass", &mass_axis(), lambda, &params),
            Err(JalebiError::NonDecayingRate { .. })
        ));
    }

    #[test]
    fn composed_rate_is_rejected() {
        let mut params = ParameterSet::new();
        params.register("a", -0.5, -1.0, 0.0).unwrap();
        let lambda = params.register_composed("lambda", &["a"], |p| p[0]).unwrap();
        assert!(Exponential::new("bkg_mass", &mass_axis(), lambda, &params).is_err());
    }
}
