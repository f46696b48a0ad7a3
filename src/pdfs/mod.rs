use dyn_clone::DynClone;

use crate::{parameters::ParameterValues, space::Space, Float, JalebiError, JalebiResult};

/// The angular signal density parametrized by amplitude coefficients.
pub mod angular;
/// An exponential background shape with a closed-form normalization.
pub mod exponential;
/// A low-order Legendre polynomial background shape per angle.
pub mod legendre;
/// The double-sided Crystal Ball mass peak.
pub mod mass;

/// The capability set of an elementary density component: an unnormalized density evaluator
/// over a declared [`Space`] and its normalization integral at the current parameter values.
///
/// Contract: inside the declared space, for any parameter values inside their declared bounds,
/// the density must be finite and non-negative. Implementations report a violation as an
/// [`InvalidDensity`](JalebiError::InvalidDensity) domain error instead of clamping, since a
/// negative or non-finite density indicates an invalid parameter region and clamping would
/// silently bias the likelihood.
pub trait Pdf: DynClone + Send + Sync {
    /// The name of this component, used in diagnostics and error messages.
    fn name(&self) -> &str;
    /// The space this component is defined over.
    fn space(&self) -> &Space;
    /// Evaluate the unnormalized density at a point inside the component's space. A point
    /// outside the space is a [`PointOutOfBounds`](JalebiError::PointOutOfBounds) domain error,
    /// never an extrapolation.
    fn density(&self, point: &[Float], values: &ParameterValues) -> JalebiResult<Float>;
    /// The integral of the unnormalized density over the component's space at the current
    /// parameter values (closed form where available, quadrature otherwise).
    fn norm(&self, values: &ParameterValues) -> JalebiResult<Float>;
}

dyn_clone::clone_trait_object!(Pdf);

/// Validate that a point lies inside a component's space: densities are only defined there, so
/// evaluation outside is a domain error, never an extrapolation.
pub(crate) fn check_point(component: &str, space: &Space, point: &[Float]) -> JalebiResult<()> {
    if point.len() != space.dim() {
        return Err(JalebiError::PointOutOfBounds {
            component: component.to_string(),
            axis: space.to_string(),
            value: Float::NAN,
        });
    }
    for (axis, &value) in space.axes().iter().zip(point.iter()) {
        if !axis.contains(value) {
            return Err(JalebiError::PointOutOfBounds {
                component: component.to_string(),
                axis: axis.name().to_string(),
                value,
            });
        }
    }
    Ok(())
}

/// Validate a density value: finite and non-negative, per the [`Pdf`] contract.
pub(crate) fn check_density(component: &str, value: Float) -> JalebiResult<Float> {
    if !value.is_finite() || value < 0.0 {
        return Err(JalebiError::InvalidDensity {
            component: component.to_string(),
            value,
        });
    }
    Ok(value)
}

/// Validate a normalization constant: finite and strictly positive.
pub(crate) fn check_norm(component: &str, value: Float) -> JalebiResult<Float> {
    if !value.is_finite() || value <= 0.0 {
        return Err(JalebiError::InvalidNormalization {
            component: component.to_string(),
            value,
        });
    }
    Ok(value)
}
