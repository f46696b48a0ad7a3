use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    data::{Dataset, Event},
    parameters::{ParameterId, ParameterSet, ParameterValues},
    pdfs::Pdf,
    space::Space,
    Float, JalebiError, JalebiResult,
};

/// Grid points per axis used to bound the density before accept-reject sampling.
const ENVELOPE_GRID: usize = 32;
/// Safety margin applied to the grid-scan maximum.
const ENVELOPE_MARGIN: Float = 1.5;

/// A composed fit model: elementary [`Pdf`] components combined by product over disjoint axes,
/// extension with a Poisson yield, summation of extended components, and projection onto a
/// subset of axes.
///
/// The normalized density of a [`Model`] is [`Model::pdf`]; extended models additionally expose
/// the event intensity [`Model::ext_pdf`] (yield times normalized density, summed over
/// components) which is what the extended likelihood consumes.
#[derive(Clone)]
pub enum Model {
    /// An elementary density component.
    Pdf(Box<dyn Pdf>),
    /// A product of non-extended models over disjoint axes.
    Product {
        /// The factors, in axis order.
        children: Vec<Model>,
        /// The concatenated space of the factors.
        space: Space,
    },
    /// A model paired with a Poisson yield parameter.
    Extended {
        /// The shape.
        inner: Box<Model>,
        /// The yield parameter.
        yield_id: ParameterId,
        /// The yield parameter's name, for diagnostics.
        yield_name: String,
    },
    /// A sum of extended models over a common space.
    Sum {
        /// The extended components.
        children: Vec<Model>,
        /// The shared space.
        space: Space,
    },
    /// A marginal of a model over a subset of its axes.
    Projection {
        /// The full model.
        inner: Box<Model>,
        /// The kept axes.
        space: Space,
    },
}

impl From<Box<dyn Pdf>> for Model {
    fn from(pdf: Box<dyn Pdf>) -> Self {
        Model::Pdf(pdf)
    }
}

impl Model {
    /// Wrap an elementary component.
    pub fn pdf_component<P: Pdf + 'static>(pdf: Box<P>) -> Self {
        Model::Pdf(pdf)
    }

    /// Combine non-extended models into a product over the concatenation of their spaces.
    ///
    /// # Errors
    ///
    /// The children must not be extended, and no axis name may appear in more than one child
    /// ([`OverlappingAxes`](JalebiError::OverlappingAxes)).
    pub fn product(children: Vec<Model>) -> JalebiResult<Model> {
        if children.is_empty() {
            return Err(JalebiError::InvalidModel {
                reason: "a product model needs at least one factor".to_string(),
            });
        }
        let mut space = Space::default();
        for child in &children {
            if child.is_extended() {
                return Err(JalebiError::InvalidModel {
                    reason: "extended models cannot be product factors (extend the product instead)"
                        .to_string(),
                });
            }
            space = &space * child.space();
        }
        for (i, axis) in space.axes().iter().enumerate() {
            if space.axes()[..i].iter().any(|a| a.name() == axis.name()) {
                return Err(JalebiError::OverlappingAxes {
                    name: axis.name().to_string(),
                });
            }
        }
        Ok(Model::Product { children, space })
    }

    /// Attach a Poisson yield to this model.
    ///
    /// # Errors
    ///
    /// The yield must be a scalar parameter with a non-negative lower bound
    /// ([`InvalidYieldBound`](JalebiError::InvalidYieldBound)), and the model must not already
    /// be extended.
    pub fn extended(
        self,
        yield_id: ParameterId,
        parameters: &ParameterSet,
    ) -> JalebiResult<Model> {
        if self.is_extended() {
            return Err(JalebiError::InvalidModel {
                reason: "model is already extended".to_string(),
            });
        }
        let yield_name = parameters.name(yield_id).to_string();
        match parameters.bounds(yield_id) {
            Some((lower, _)) if lower >= 0.0 => {}
            Some((lower, _)) => {
                return Err(JalebiError::InvalidYieldBound {
                    name: yield_name,
                    lower,
                })
            }
            None => {
                return Err(JalebiError::InvalidYieldBound {
                    name: yield_name,
                    lower: Float::NEG_INFINITY,
                })
            }
        }
        Ok(Model::Extended {
            inner: Box::new(self),
            yield_id,
            yield_name,
        })
    }

    /// Sum extended models sharing a common space.
    pub fn sum(children: Vec<Model>) -> JalebiResult<Model> {
        let first_space = match children.first() {
            Some(child) => child.space().clone(),
            None => {
                return Err(JalebiError::InvalidModel {
                    reason: "a sum model needs at least one component".to_string(),
                })
            }
        };
        for child in &children {
            if !child.is_extended() {
                return Err(JalebiError::InvalidModel {
                    reason: "every component of a sum must carry a yield".to_string(),
                });
            }
            if child.space() != &first_space {
                return Err(JalebiError::InvalidModel {
                    reason: format!(
                        "sum components must share one space, got {} and {}",
                        first_space,
                        child.space()
                    ),
                });
            }
        }
        Ok(Model::Sum {
            children,
            space: first_space,
        })
    }

    /// Project this model onto the named axes, yielding the marginal density (integrated over
    /// the dropped axes by quadrature, with products factorized exactly).
    pub fn project(&self, axes: &[&str]) -> JalebiResult<Model> {
        let space = self.space().sub_space(axes)?;
        Ok(Model::Projection {
            inner: Box::new(self.clone()),
            space,
        })
    }

    /// The observable space of this model (the kept axes for a projection).
    pub fn space(&self) -> &Space {
        match self {
            Model::Pdf(pdf) => pdf.space(),
            Model::Product { space, .. } => space,
            Model::Extended { inner, .. } => inner.space(),
            Model::Sum { space, .. } => space,
            Model::Projection { space, .. } => space,
        }
    }

    /// Check whether this model carries yield information.
    pub fn is_extended(&self) -> bool {
        match self {
            Model::Pdf(_) | Model::Product { .. } => false,
            Model::Extended { .. } | Model::Sum { .. } => true,
            Model::Projection { inner, .. } => inner.is_extended(),
        }
    }

    /// The total expected event count of an extended model.
    ///
    /// # Errors
    ///
    /// Non-extended models have no yield.
    pub fn total_yield(&self, values: &ParameterValues) -> JalebiResult<Float> {
        match self {
            Model::Extended { yield_id, .. } => Ok(values.get(*yield_id)),
            Model::Sum { children, .. } => {
                let mut total = 0.0;
                for child in children {
                    total += child.total_yield(values)?;
                }
                Ok(total)
            }
            Model::Projection { inner, .. } => inner.total_yield(values),
            _ => Err(JalebiError::InvalidModel {
                reason: "model is not extended, it has no yield".to_string(),
            }),
        }
    }

    /// The unnormalized density at `point`, such that [`Model::pdf`] is `density / norm`.
    ///
    /// Sums and projections build their densities already normalized, so for those variants
    /// this coincides with [`Model::pdf`] and [`Model::norm`] is one.
    pub fn density(&self, point: &[Float], values: &ParameterValues) -> JalebiResult<Float> {
        match self {
            Model::Pdf(pdf) => pdf.density(point, values),
            Model::Product { children, .. } => {
                let mut f = 1.0;
                let mut offset = 0;
                for child in children {
                    let dim = child.space().dim();
                    f *= child.density(&point[offset..offset + dim], values)?;
                    offset += dim;
                }
                Ok(f)
            }
            Model::Extended { inner, .. } => inner.density(point, values),
            Model::Sum { .. } | Model::Projection { .. } => self.pdf(point, values),
        }
    }

    /// The integral of [`Model::density`] over the model's space.
    pub fn norm(&self, values: &ParameterValues) -> JalebiResult<Float> {
        match self {
            Model::Pdf(pdf) => pdf.norm(values),
            Model::Product { children, .. } => {
                let mut total = 1.0;
                for child in children {
                    total *= child.norm(values)?;
                }
                Ok(total)
            }
            Model::Extended { inner, .. } => inner.norm(values),
            Model::Sum { .. } | Model::Projection { .. } => Ok(1.0),
        }
    }

    /// The normalized probability density at `point` (ordered like [`Model::space`]).
    pub fn pdf(&self, point: &[Float], values: &ParameterValues) -> JalebiResult<Float> {
        match self {
            Model::Pdf(pdf) => Ok(pdf.density(point, values)? / pdf.norm(values)?),
            Model::Product { children, .. } => {
                // Factors own contiguous, disjoint blocks of the product space.
                let mut f = 1.0;
                let mut offset = 0;
                for child in children {
                    let dim = child.space().dim();
                    f *= child.pdf(&point[offset..offset + dim], values)?;
                    offset += dim;
                }
                Ok(f)
            }
            Model::Extended { inner, .. } => inner.pdf(point, values),
            Model::Sum { children, .. } => {
                // A vanishing total yield leaves the mixture undefined, not zero.
                let total = crate::pdfs::check_norm("sum", self.total_yield(values)?)?;
                let mut weighted = 0.0;
                for child in children {
                    weighted += child.total_yield(values)? * child.pdf(point, values)?;
                }
                Ok(weighted / total)
            }
            Model::Projection { inner, space } => inner.marginal_pdf(space, point, values),
        }
    }

    /// The extended event intensity at `point`: yield times normalized density, summed over
    /// components. Integrates to the total yield over the model's space.
    pub fn ext_pdf(&self, point: &[Float], values: &ParameterValues) -> JalebiResult<Float> {
        match self {
            Model::Extended { inner, yield_id, .. } => {
                Ok(values.get(*yield_id) * inner.pdf(point, values)?)
            }
            Model::Sum { children, .. } => {
                let mut total = 0.0;
                for child in children {
                    total += child.ext_pdf(point, values)?;
                }
                Ok(total)
            }
            Model::Projection { inner, .. } => {
                Ok(inner.total_yield(values)? * self.pdf(point, values)?)
            }
            _ => Err(JalebiError::InvalidModel {
                reason: "model is not extended, use Model::pdf".to_string(),
            }),
        }
    }

    /// The normalized marginal density over `kept` at `point` (ordered like `kept`).
    ///
    /// Axes of this model absent from `kept` are integrated out. Products factorize exactly;
    /// an elementary component that is only partially kept falls back to quadrature over its
    /// dropped axes.
    fn marginal_pdf(
        &self,
        kept: &Space,
        point: &[Float],
        values: &ParameterValues,
    ) -> JalebiResult<Float> {
        match self {
            Model::Pdf(pdf) => {
                let leaf_space = pdf.space();
                // Partition the leaf axes into kept (with their values) and dropped.
                let mut template = vec![None; leaf_space.dim()];
                let mut dropped = Vec::new();
                for (i, axis) in leaf_space.axes().iter().enumerate() {
                    match kept.index_of(axis.name()) {
                        Some(k) => template[i] = Some(point[k]),
                        None => dropped.push((i, (axis.lower(), axis.upper()))),
                    }
                }
                let norm = pdf.norm(values)?;
                if dropped.is_empty() {
                    let full: Vec<Float> = template.iter().map(|v| v.unwrap_or(0.0)).collect();
                    return Ok(pdf.density(&full, values)? / norm);
                }
                if dropped.len() == leaf_space.dim() {
                    // Fully integrated out: contributes exactly one.
                    return Ok(1.0);
                }
                let bounds: Vec<(Float, Float)> = dropped.iter().map(|&(_, b)| b).collect();
                let mut full: Vec<Float> = template.iter().map(|v| v.unwrap_or(0.0)).collect();
                let integral = crate::utils::functions::integrate_box(
                    &mut |vars: &[Float]| {
                        for (&(i, _), &v) in dropped.iter().zip(vars.iter()) {
                            full[i] = v;
                        }
                        pdf.density(&full, values)
                    },
                    &bounds,
                )?;
                Ok(integral / norm)
            }
            Model::Product { children, .. } => {
                // Disjoint axes: the marginal is the product of per-factor marginals.
                let mut f = 1.0;
                for child in children {
                    let mut child_kept_names = Vec::new();
                    let mut child_point = Vec::new();
                    for name in child.space().names() {
                        if let Some(k) = kept.index_of(name) {
                            child_kept_names.push(name);
                            child_point.push(point[k]);
                        }
                    }
                    let child_kept = child.space().sub_space(&child_kept_names)?;
                    f *= child.marginal_pdf(&child_kept, &child_point, values)?;
                }
                Ok(f)
            }
            Model::Extended { inner, .. } => inner.marginal_pdf(kept, point, values),
            Model::Sum { children, .. } => {
                let total = crate::pdfs::check_norm("sum", self.total_yield(values)?)?;
                let mut weighted = 0.0;
                for child in children {
                    weighted += child.total_yield(values)? * child.marginal_pdf(kept, point, values)?;
                }
                Ok(weighted / total)
            }
            Model::Projection { inner, .. } => inner.marginal_pdf(kept, point, values),
        }
    }

    /// Draw `n` events from this model's normalized density by accept-reject sampling.
    ///
    /// The envelope is a grid scan of the density over the space, inflated by a safety margin;
    /// a proposal whose density exceeds the envelope aborts generation rather than biasing the
    /// sample. The generator is a [`ChaCha8Rng`] seeded with `seed`, so draws are reproducible
    /// across runs and platforms.
    pub fn generate(
        &self,
        n: usize,
        values: &ParameterValues,
        seed: u64,
    ) -> JalebiResult<Dataset> {
        let space = self.space().clone();
        let envelope = self.density_envelope(values)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut events = Vec::with_capacity(n);
        let max_attempts = 10_000_usize.saturating_mul(n.max(1));
        let mut attempts = 0;
        while events.len() < n {
            attempts += 1;
            if attempts > max_attempts {
                return Err(JalebiError::Custom(format!(
                    "accept-reject sampling stalled after {attempts} proposals (envelope {envelope})"
                )));
            }
            let point: Vec<Float> = space
                .axes()
                .iter()
                .map(|axis| rng.gen_range(axis.lower()..=axis.upper()))
                .collect();
            let f = self.pdf(&point, values)?;
            if f > envelope {
                return Err(JalebiError::Custom(format!(
                    "density {f} exceeds the sampling envelope {envelope}; peak missed by the grid scan"
                )));
            }
            if rng.gen::<Float>() * envelope <= f {
                events.push(Event {
                    values: point,
                    weight: 1.0,
                });
            }
        }
        Ok(Dataset::new(events))
    }

    /// An upper bound on the normalized density over the space: the maximum over a per-axis
    /// grid, inflated by [`ENVELOPE_MARGIN`].
    fn density_envelope(&self, values: &ParameterValues) -> JalebiResult<Float> {
        let space = self.space();
        let mut point = vec![0.0; space.dim()];
        let mut peak: Float = 0.0;
        self.scan_axis(space, values, &mut point, 0, &mut peak)?;
        if peak <= 0.0 {
            return Err(JalebiError::Custom(
                "density vanishes over the entire sampling grid".to_string(),
            ));
        }
        Ok(peak * ENVELOPE_MARGIN)
    }

    fn scan_axis(
        &self,
        space: &Space,
        values: &ParameterValues,
        point: &mut Vec<Float>,
        axis: usize,
        peak: &mut Float,
    ) -> JalebiResult<()> {
        if axis == space.dim() {
            let f = self.pdf(point, values)?;
            if f > *peak {
                *peak = f;
            }
            return Ok(());
        }
        let bounds = space.axis(axis);
        for i in 0..=ENVELOPE_GRID {
            point[axis] =
                bounds.lower() + bounds.width() * (i as Float) / (ENVELOPE_GRID as Float);
            self.scan_axis(space, values, point, axis + 1, peak)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdfs::exponential::Exponential;
    use crate::pdfs::legendre::LegendreBackground;
    use crate::pdfs::mass::DoubleSidedCrystalBall;
    use crate::space::Observable;
    use crate::utils::functions::{integrate, integrate_box};
    use approx::assert_relative_eq;

    fn axes() -> (Observable, Observable) {
        (
            Observable::new("cosl", -1.0, 1.0).unwrap(),
            Observable::new("B_mass", 5200.0, 5500.0).unwrap(),
        )
    }

    fn two_component_model(params: &mut ParameterSet) -> Model {
        let (cosl, mass) = axes();
        let mu = params.register("mu", 5280.0, 5200.0, 5400.0).unwrap();
        let sigma = params.register("sigma", 15.9, 5.0, 80.0).unwrap();
        let alpha = params.register("alpha", 1.5, 0.1, 5.0).unwrap();
        let n = params.register("n", 5.0, 0.5, 50.0).unwrap();
        let a2 = params.register("a2_cosl", -0.4, -2.0, 2.0).unwrap();
        let lambda = params.register("lambda", -0.001, -1.0, 0.0).unwrap();
        let nsig = params.register("Nsig", 200.0, 0.0, 1.0e8).unwrap();
        let nbkg = params.register("Nbkg", 500.0, 0.0, 1.0e8).unwrap();
        let a1 = params.register("a1_cosl", 0.0, -2.0, 2.0).unwrap();

        let sig_mass = DoubleSidedCrystalBall::new(
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
        // Uniform angular shape for the signal via an empty Legendre series.
        let sig_ang = LegendreBackground::new("sig_ang", &cosl.space(), &[]).unwrap();
        let bkg_mass = Exponential::new("bkg_mass", &mass.space(), lambda, params).unwrap();
        let bkg_ang = LegendreBackground::new("bkg_ang", &cosl.space(), &[a1, a2]).unwrap();

        let signal = Model::product(vec![Model::Pdf(sig_ang), Model::Pdf(sig_mass)])
            .unwrap()
            .extended(nsig, params)
            .unwrap();
        let background = Model::product(vec![Model::Pdf(bkg_ang), Model::Pdf(bkg_mass)])
            .unwrap()
            .extended(nbkg, params)
            .unwrap();
        Model::sum(vec![signal, background]).unwrap()
    }

    #[test]
    fn product_rejects_overlapping_axes() {
        let mut params = ParameterSet::new();
        let a1 = params.register("a1", 0.0, -2.0, 2.0).unwrap();
        let cosl = Observable::new("cosl", -1.0, 1.0).unwrap();
        let first = LegendreBackground::new("p", &cosl.space(), &[a1]).unwrap();
        let second = LegendreBackground::new("q", &cosl.space(), &[a1]).unwrap();
        assert!(matches!(
            Model::product(vec![Model::Pdf(first), Model::Pdf(second)]),
            Err(JalebiError::OverlappingAxes { .. })
        ));
    }

    #[test]
    fn extension_requires_nonnegative_yield_bound() {
        let mut params = ParameterSet::new();
        let a1 = params.register("a1", 0.0, -2.0, 2.0).unwrap();
        let bad = params.register("Nsig", 100.0, -10.0, 1.0e8).unwrap();
        let cosl = Observable::new("cosl", -1.0, 1.0).unwrap();
        let shape = LegendreBackground::new("p", &cosl.space(), &[a1]).unwrap();
        assert!(matches!(
            Model::Pdf(shape).extended(bad, &params),
            Err(JalebiError::InvalidYieldBound { .. })
        ));
    }

    #[test]
    fn sum_requires_extended_components_on_one_space() {
        let mut params = ParameterSet::new();
        let a1 = params.register("a1", 0.0, -2.0, 2.0).unwrap();
        let cosl = Observable::new("cosl", -1.0, 1.0).unwrap();
        let shape = LegendreBackground::new("p", &cosl.space(), &[a1]).unwrap();
        assert!(Model::sum(vec![Model::Pdf(shape)]).is_err());
    }

    #[test]
    fn sum_pdf_integrates_to_one() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        let integral = integrate_box(
            &mut |p: &[Float]| model.pdf(p, &values),
            &[(-1.0, 1.0), (5200.0, 5500.0)],
        )
        .unwrap();
        assert_relative_eq!(integral, 1.0, max_relative = 1e-4);
    }

    #[test]
    fn ext_pdf_integrates_to_total_yield() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        assert_relative_eq!(model.total_yield(&values).unwrap(), 700.0);
        let integral = integrate_box(
            &mut |p: &[Float]| model.ext_pdf(p, &values),
            &[(-1.0, 1.0), (5200.0, 5500.0)],
        )
        .unwrap();
        assert_relative_eq!(integral, 700.0, max_relative = 1e-4);
    }

    #[test]
    fn product_norm_is_the_product_of_component_norms() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        let Model::Sum { children, .. } = &model else {
            panic!("expected a sum");
        };
        for child in children {
            let integral = integrate_box(
                &mut |p: &[Float]| child.density(p, &values),
                &[(-1.0, 1.0), (5200.0, 5500.0)],
            )
            .unwrap();
            assert_relative_eq!(integral, child.norm(&values).unwrap(), max_relative = 1e-4);
        }
    }

    #[test]
    fn full_axis_projection_returns_the_original_density() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        let proj = model.project(&["cosl", "B_mass"]).unwrap();
        for point in [[-0.7, 5230.0], [0.0, 5280.0], [0.4, 5415.0]] {
            assert_relative_eq!(
                proj.pdf(&point, &values).unwrap(),
                model.pdf(&point, &values).unwrap(),
                max_relative = 1e-12
            );
            assert_relative_eq!(
                proj.ext_pdf(&point, &values).unwrap(),
                model.ext_pdf(&point, &values).unwrap(),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn projection_marginal_is_normalized() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        let mass_proj = model.project(&["B_mass"]).unwrap();
        let integral = integrate(|m| mass_proj.pdf(&[m], &values), 5200.0, 5500.0).unwrap();
        assert_relative_eq!(integral, 1.0, max_relative = 1e-4);
        // The projected intensity keeps the yields.
        let ext_integral =
            integrate(|m| mass_proj.ext_pdf(&[m], &values), 5200.0, 5500.0).unwrap();
        assert_relative_eq!(ext_integral, 700.0, max_relative = 1e-4);
    }

    #[test]
    fn projection_matches_direct_marginal() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        let proj = model.project(&["cosl"]).unwrap();
        // Integrate the mass axis piece by piece: the Crystal Ball tail junctions are kinks
        // that a single fixed-order panel does not resolve to this tolerance.
        let edges = [
            5200.0,
            5280.0 - 1.5 * 15.9,
            5280.0,
            5280.0 + 1.5 * 15.9,
            5500.0,
        ];
        for x in [-0.9, -0.3, 0.0, 0.5, 1.0] {
            let direct: Float = edges
                .windows(2)
                .map(|w| integrate(|m| model.pdf(&[x, m], &values), w[0], w[1]).unwrap())
                .sum();
            assert_relative_eq!(
                proj.pdf(&[x], &values).unwrap(),
                direct,
                max_relative = 1e-8
            );
        }
    }

    #[test]
    fn out_of_bounds_points_are_domain_errors() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        assert!(matches!(
            model.pdf(&[0.0, 6000.0], &values),
            Err(JalebiError::PointOutOfBounds { .. })
        ));
        assert!(matches!(
            model.ext_pdf(&[2.0, 5280.0], &values),
            Err(JalebiError::PointOutOfBounds { .. })
        ));
    }

    #[test]
    fn vanishing_total_yield_is_flagged() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        params.set_value("Nsig", 0.0).unwrap();
        params.set_value("Nbkg", 0.0).unwrap();
        let values = params.snapshot();
        assert!(matches!(
            model.pdf(&[0.0, 5280.0], &values),
            Err(JalebiError::InvalidNormalization { .. })
        ));
        let proj = model.project(&["B_mass"]).unwrap();
        assert!(matches!(
            proj.pdf(&[5280.0], &values),
            Err(JalebiError::InvalidNormalization { .. })
        ));
    }

    #[test]
    fn generation_is_reproducible_and_in_bounds() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        let first = model.generate(500, &values, 42).unwrap();
        let second = model.generate(500, &values, 42).unwrap();
        assert_eq!(first.len(), 500);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.values, b.values);
        }
        for event in &first {
            assert!(model.space().contains(&event.values));
        }
        let other = model.generate(500, &values, 43).unwrap();
        assert!(first
            .iter()
            .zip(other.iter())
            .any(|(a, b)| a.values != b.values));
    }

    #[test]
    fn generated_sample_tracks_the_density() {
        let mut params = ParameterSet::new();
        let model = two_component_model(&mut params);
        let values = params.snapshot();
        let sample = model.generate(4000, &values, 7).unwrap();
        // The signal region should hold roughly Nsig plus the background under the peak.
        let in_peak = sample
            .iter()
            .filter(|e| (e.values[1] - 5280.0).abs() < 48.0)
            .count() as Float;
        let expected = integrate_box(
            &mut |p: &[Float]| model.pdf(p, &values),
            &[(-1.0, 1.0), (5232.0, 5328.0)],
        )
        .unwrap()
            * 4000.0;
        assert_relative_eq!(in_peak, expected, max_relative = 0.1);
    }
}
