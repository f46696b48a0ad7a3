use crate::{
    parameters::{ParameterId, ParameterValues},
    pdfs::{check_density, check_norm, check_point, Pdf},
    space::Space,
    utils::functions::legendre_p,
    Float, JalebiError, JalebiResult,
};

/// A one-dimensional background shape built from a Legendre series,
///
/// ```math
/// f(x) = 1 + \sum_{n \ge 1} c_n P_n(x)
/// ```
///
/// with one coefficient per order starting at `P_1`. The normalization uses the exact
/// antiderivative `∫ P_n dx = (P_{n+1} - P_{n-1}) / (2n + 1)`, so it is closed form on any
/// interval, not just `[-1, 1]`.
///
/// Nothing constrains the series to stay positive; a coefficient choice that makes the density
/// dip below zero inside the axis range is reported as a domain error at evaluation time.
#[derive(Clone)]
pub struct LegendreBackground {
    name: String,
    space: Space,
    coefficients: Vec<ParameterId>,
}

impl LegendreBackground {
    /// Construct a [`LegendreBackground`] over a one-dimensional space with the given
    /// coefficients of `P_1, P_2, …` (in order).
    pub fn new(
        name: &str,
        space: &Space,
        coefficients: &[ParameterId],
    ) -> JalebiResult<Box<Self>> {
        if space.dim() != 1 {
            return Err(JalebiError::InvalidModel {
                reason: format!(
                    "Legendre background \"{}\" requires a 1-dimensional space, got {}",
                    name,
                    space.dim()
                ),
            });
        }
        Ok(Box::new(Self {
            name: name.to_string(),
            space: space.clone(),
            coefficients: coefficients.to_vec(),
        }))
    }
}

/// The antiderivative of `P_n` at `x`, up to a constant.
fn legendre_antiderivative(n: usize, x: Float) -> Float {
    (legendre_p(n + 1, x) - legendre_p(n - 1, x)) / (2.0 * n as Float + 1.0)
}

impl Pdf for LegendreBackground {
    fn name(&self) -> &str {
        &self.name
    }
    fn space(&self) -> &Space {
        &self.space
    }
    fn density(&self, point: &[Float], values: &ParameterValues) -> JalebiResult<Float> {
        check_point(&self.name, &self.space, point)?;
        let x = point[0];
        let mut f = 1.0;
        for (order, &id) in self.coefficients.iter().enumerate() {
            f += values.get(id) * legendre_p(order + 1, x);
        }
        check_density(&self.name, f)
    }
    fn norm(&self, values: &ParameterValues) -> JalebiResult<Float> {
        let lower = self.space.axis(0).lower();
        let upper = self.space.axis(0).upper();
        let mut total = upper - lower;
        for (order, &id) in self.coefficients.iter().enumerate() {
            total += values.get(id)
                * (legendre_antiderivative(order + 1, upper)
                    - legendre_antiderivative(order + 1, lower));
        }
        check_norm(&self.name, total)
    }
}
