use crate::{
    parameters::{ParameterId, ParameterValues},
    pdfs::{check_density, check_norm, check_point, Pdf},
    space::Space,
    Float, JalebiError, JalebiResult,
};

/// The amplitude and asymmetry coefficients of the [`AngularDistribution`].
///
/// `a_s` is expected to be a composed parameter implementing the unitarity constraint
/// `AS = 1 - A0 - App - Aqc - Aqs`, so that the five amplitude terms integrate to one.
#[derive(Copy, Clone, Debug)]
pub struct AngularAmplitudes {
    /// Transverse P-wave amplitude.
    pub app: ParameterId,
    /// Longitudinal P-wave amplitude.
    pub a0: ParameterId,
    /// S-wave amplitude (composed, fixed by unitarity).
    pub a_s: ParameterId,
    /// Quadratic lepton-angle amplitude (cosine-squared term).
    pub aqc: ParameterId,
    /// Quadratic interference amplitude.
    pub aqs: ParameterId,
    /// Forward-backward asymmetry in the hadron angle, longitudinal component.
    pub afb_hc: ParameterId,
    /// Forward-backward asymmetry in the hadron angle, transverse component.
    pub afb_hs: ParameterId,
    /// Forward-backward asymmetry in the lepton angle, longitudinal component.
    pub afb_lc: ParameterId,
    /// Forward-backward asymmetry in the lepton angle, transverse component.
    pub afb_ls: ParameterId,
}

/// The two-dimensional angular signal density over `(cos θ_K, cos θ_L)`, bilinear in the two
/// cosines:
///
/// ```math
/// f(x, y) = A_0\,\tfrac{3}{2}x^2\,\tfrac{3}{4}(1-y^2)
///         + A_{\parallel}\,\tfrac{3}{4}(1-x^2)\,\tfrac{3}{8}(1+y^2)
///         + A_S\,\tfrac{1}{2}\,\tfrac{3}{4}(1-y^2)
///         + A_{qc}\,\tfrac{1}{2}\,\tfrac{3}{2}y^2
///         + A_{qs}\,\tfrac{3}{4}(1-x^2)\,\tfrac{3}{4}(1-y^2)
///         + A_{FB}^{HC}\,\tfrac{3}{4}x\,\tfrac{3}{4}(1-y^2)
///         + A_{FB}^{HS}\,\tfrac{3}{4}x\,\tfrac{3}{8}(1+y^2)
///         + A_{FB}^{LC}\,\tfrac{3}{2}x^2\,\tfrac{1}{2}y
///         + A_{FB}^{LS}\,\tfrac{3}{4}(1-x^2)\,\tfrac{1}{2}y
/// ```
///
/// Each amplitude multiplies a product of one-dimensional shapes that integrate to one over
/// `[-1, 1]`, and each asymmetry term is odd in one cosine and integrates to zero, so the
/// normalization is exactly `A0 + App + AS + Aqc + Aqs`.
///
/// With the composed `AS` the normalization is one by construction, but an amplitude
/// combination that pushes `AS` outside its physical range can make the density negative
/// somewhere in the space. That is reported as a domain error at evaluation time, never
/// clamped.
#[derive(Clone)]
pub struct AngularDistribution {
    name: String,
    space: Space,
    amplitudes: AngularAmplitudes,
}

impl AngularDistribution {
    /// Construct an [`AngularDistribution`] over the given two-dimensional space, which must
    /// span exactly `[-1, 1] × [-1, 1]` (the closed-form normalization relies on the full
    /// cosine range).
    pub fn new(
        name: &str,
        space: &Space,
        amplitudes: AngularAmplitudes,
    ) -> JalebiResult<Box<Self>> {
        if space.dim() != 2 {
            return Err(JalebiError::InvalidModel {
                reason: format!(
                    "angular distribution \"{}\" requires a 2-dimensional space, got {}",
                    name,
                    space.dim()
                ),
            });
        }
        for axis in space.axes() {
            if axis.lower() != -1.0 || axis.upper() != 1.0 {
                return Err(JalebiError::InvalidModel {
                    reason: format!(
                        "angular distribution \"{}\" requires cosine axes on [-1, 1], got {}",
                        name, axis
                    ),
                });
            }
        }
        Ok(Box::new(Self {
            name: name.to_string(),
            space: space.clone(),
            amplitudes,
        }))
    }
}

impl Pdf for AngularDistribution {
    fn name(&self) -> &str {
        &self.name
    }
    fn space(&self) -> &Space {
        &self.space
    }
    fn density(&self, point: &[Float], values: &ParameterValues) -> JalebiResult<Float> {
        check_point(&self.name, &self.space, point)?;
        let x = point[0];
        let y = point[1];
        let a = &self.amplitudes;
        let h0 = 1.5 * x * x;
        let h1 = 0.75 * (1.0 - x * x);
        let hs = 0.5;
        let l0 = 0.75 * (1.0 - y * y);
        let l2 = 0.375 * (1.0 + y * y);
        let lq = 1.5 * y * y;
        let f = values.get(a.a0) * h0 * l0
            + values.get(a.app) * h1 * l2
            + values.get(a.a_s) * hs * l0
            + values.get(a.aqc) * hs * lq
            + values.get(a.aqs) * h1 * l0
            + values.get(a.afb_hc) * 0.75 * x * l0
            + values.get(a.afb_hs) * 0.75 * x * l2
            + values.get(a.afb_lc) * h0 * 0.5 * y
            + values.get(a.afb_ls) * h1 * 0.5 * y;
        check_density(&self.name, f)
    }
    fn norm(&self, values: &ParameterValues) -> JalebiResult<Float> {
        let a = &self.amplitudes;
        let total = values.get(a.a0)
            + values.get(a.app)
            + values.get(a.a_s)
            + values.get(a.aqc)
            + values.get(a.aqs);
        check_norm(&self.name, total)
    }
}
