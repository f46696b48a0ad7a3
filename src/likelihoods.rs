use std::sync::Arc;

use accurate::sum::Klein;
use accurate::traits::*;
use ganesh::{
    algorithms::LBFGSB, observers::DebugObserver, Algorithm, Function, Minimizer, Observer, Status,
};
use indexmap::IndexMap;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    data::Dataset,
    models::Model,
    parameters::{ParameterSet, ParameterValues},
    Float, JalebiError, JalebiResult,
};

/// The extended unbinned negative log-likelihood of a [`Model`] over a [`Dataset`],
///
/// ```math
/// \text{NLL}(\vec{p}) = \nu_{\text{tot}}(\vec{p}) - \sum_{e \in \text{Data}} \ln \left( \sum_i \nu_i(\vec{p}) \hat{f}_i(e; \vec{p}) \right)
/// ```
///
/// where the inner sum is the extended intensity [`Model::ext_pdf`]. The constant
/// `ln N!` term is dropped, so only likelihood differences are meaningful.
pub struct ExtendedUnbinnedNLL {
    model: Model,
    dataset: Arc<Dataset>,
    parameters: ParameterSet,
}

impl ExtendedUnbinnedNLL {
    /// Bind a model, a dataset, and a parameter registry into a likelihood.
    ///
    /// # Errors
    ///
    /// The model must be extended, and every event must lie inside the model's space
    /// ([`EventOutOfBounds`](JalebiError::EventOutOfBounds)); out-of-range events indicate a
    /// missing selection cut and are rejected up front rather than silently dropped.
    pub fn new(
        model: Model,
        dataset: Arc<Dataset>,
        parameters: ParameterSet,
    ) -> JalebiResult<Self> {
        if !model.is_extended() {
            return Err(JalebiError::InvalidModel {
                reason: "an extended likelihood needs an extended model".to_string(),
            });
        }
        let space = model.space();
        for (index, event) in dataset.iter().enumerate() {
            if event.values.len() != space.dim() {
                return Err(JalebiError::EventOutOfBounds {
                    index,
                    axis: space.to_string(),
                    value: Float::NAN,
                });
            }
            for (axis, &value) in space.axes().iter().zip(event.values.iter()) {
                if !axis.contains(value) {
                    return Err(JalebiError::EventOutOfBounds {
                        index,
                        axis: axis.name().to_string(),
                        value,
                    });
                }
            }
        }
        Ok(Self {
            model,
            dataset,
            parameters,
        })
    }

    /// The model under fit.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The dataset under fit.
    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// The parameter registry (starting values, bounds, floating flags).
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Evaluate the negative log-likelihood at the given parameter values.
    #[cfg(feature = "rayon")]
    pub fn nll(&self, values: &ParameterValues) -> JalebiResult<Float> {
        let log_terms = self
            .dataset
            .events
            .par_iter()
            .map(|event| self.model.ext_pdf(&event.values, values).map(Float::ln))
            .collect::<JalebiResult<Vec<Float>>>()?;
        let log_sum = log_terms
            .into_par_iter()
            .parallel_sum_with_accumulator::<Klein<Float>>();
        self.finish_nll(values, log_sum)
    }

    /// Evaluate the negative log-likelihood at the given parameter values.
    #[cfg(not(feature = "rayon"))]
    pub fn nll(&self, values: &ParameterValues) -> JalebiResult<Float> {
        let log_sum = self
            .dataset
            .events
            .iter()
            .map(|event| self.model.ext_pdf(&event.values, values).map(Float::ln))
            .collect::<JalebiResult<Vec<Float>>>()?
            .into_iter()
            .sum_with_accumulator::<Klein<Float>>();
        self.finish_nll(values, log_sum)
    }

    fn finish_nll(&self, values: &ParameterValues, log_sum: Float) -> JalebiResult<Float> {
        let nll = self.model.total_yield(values)? - log_sum;
        if !nll.is_finite() {
            return Err(JalebiError::Custom(format!(
                "non-finite likelihood ({nll}): an event sits where the model density vanishes"
            )));
        }
        Ok(nll)
    }

    /// Minimize the likelihood over the floating parameters, starting from their current values
    /// and respecting their declared bounds.
    pub fn minimize(&self, options: Option<MinimizerOptions>) -> JalebiResult<Fit> {
        let options = options.unwrap_or_default();
        let p0 = self.parameters.free_values();
        let bounds = self.parameters.free_bounds();
        let mut m = Minimizer::new_from_box(options.algorithm, p0.len())
            .with_bounds(Some(bounds.clone()))
            .with_observers(options.observers)
            .with_max_steps(options.max_steps);
        m.minimize(self, &p0, &mut ())?;
        let status = m.status;
        self.collect_fit(&status, &bounds)
    }

    fn collect_fit(&self, status: &Status<Float>, bounds: &[(Float, Float)]) -> JalebiResult<Fit> {
        let best: Vec<Float> = status.x.iter().cloned().collect();
        let mut fit_status = if status.converged {
            FitStatus::Converged
        } else {
            FitStatus::Failed
        };
        if matches!(fit_status, FitStatus::Converged) {
            for (&value, &(lower, upper)) in best.iter().zip(bounds.iter()) {
                let tolerance = Float::EPSILON.sqrt() * (upper - lower).abs().max(1.0);
                if (value - lower).abs() < tolerance || (value - upper).abs() < tolerance {
                    fit_status = FitStatus::AtBoundary;
                    break;
                }
            }
        }
        let values = self.parameters.values(&best)?;
        let mut parameters = IndexMap::new();
        for name in self.parameters.names() {
            let id = self.parameters.id(&name)?;
            parameters.insert(
                name,
                FitParameter {
                    value: values.get(id),
                    error_lower: None,
                    error_upper: None,
                    floating: self.parameters.is_floating(id),
                },
            );
        }
        Ok(Fit {
            status: fit_status,
            nll: status.fx,
            message: status.message.clone(),
            parameters,
        })
    }

    /// A copy of the parameter registry with the floating parameters moved to the fitted
    /// optimum, ready for projections and further fits.
    pub fn optimized_parameters(&self, fit: &Fit) -> JalebiResult<ParameterSet> {
        let mut set = self.parameters.clone();
        let free = set
            .free_names()
            .iter()
            .map(|name| {
                fit.parameters
                    .get(name)
                    .map(|p| p.value)
                    .ok_or_else(|| JalebiError::ParameterNotFoundError { name: name.clone() })
            })
            .collect::<JalebiResult<Vec<Float>>>()?;
        set.update_free(&free)?;
        Ok(set)
    }

    /// Fill in asymmetric errors from a likelihood scan: for each floating parameter, walk away
    /// from the optimum (the other parameters held there) until the likelihood rises by one
    /// half, bracketing the crossing geometrically and polishing it by bisection.
    ///
    /// A side whose crossing lies outside the parameter's bounds is left as `None`.
    pub fn errors(&self, fit: &mut Fit) -> JalebiResult<()> {
        let free_names = self.parameters.free_names();
        let best: Vec<Float> = free_names
            .iter()
            .map(|name| {
                fit.parameters
                    .get(name)
                    .map(|p| p.value)
                    .ok_or_else(|| JalebiError::ParameterNotFoundError { name: name.clone() })
            })
            .collect::<JalebiResult<Vec<Float>>>()?;
        let bounds = self.parameters.free_bounds();
        let nll_min = self.nll(&self.parameters.values(&best)?)?;
        for (i, name) in free_names.iter().enumerate() {
            let upper_err = self.scan_crossing(&best, i, 1.0, bounds[i].1, nll_min)?;
            let lower_err = self.scan_crossing(&best, i, -1.0, bounds[i].0, nll_min)?;
            if let Some(parameter) = fit.parameters.get_mut(name) {
                parameter.error_lower = lower_err;
                parameter.error_upper = upper_err;
            }
        }
        Ok(())
    }

    /// Find the distance from `best[i]` (in `direction`, toward `bound`) at which the
    /// likelihood first exceeds the minimum by one half, or `None` if it never does inside the
    /// bound.
    fn scan_crossing(
        &self,
        best: &[Float],
        i: usize,
        direction: Float,
        bound: Float,
        nll_min: Float,
    ) -> JalebiResult<Option<Float>> {
        let room = (bound - best[i]) * direction;
        if room <= 0.0 {
            return Ok(None);
        }
        let mut point = best.to_vec();
        let mut excess = |delta: Float, point: &mut Vec<Float>| -> JalebiResult<Float> {
            point[i] = best[i] + direction * delta;
            Ok(self.nll(&self.parameters.values(point)?)? - nll_min - 0.5)
        };
        // Bracket the crossing by geometric growth from a small step.
        let mut low = 0.0;
        let mut high = (1.0e-3 as Float) * best[i].abs().max(1.0);
        high = high.min(room);
        loop {
            if excess(high, &mut point)? >= 0.0 {
                break;
            }
            low = high;
            if high >= room {
                return Ok(None);
            }
            high = (high * 2.0).min(room);
        }
        // Bisect down to a relative width well below any quoted precision.
        for _ in 0..100 {
            let mid = 0.5 * (low + high);
            if excess(mid, &mut point)? >= 0.0 {
                high = mid;
            } else {
                low = mid;
            }
            if high - low <= 1.0e-10 * high.max(1.0e-30) {
                break;
            }
        }
        Ok(Some(0.5 * (low + high)))
    }
}

impl Function<Float, (), JalebiError> for ExtendedUnbinnedNLL {
    fn evaluate(&self, parameters: &[Float], _user_data: &mut ()) -> Result<Float, JalebiError> {
        let values = self.parameters.values(parameters)?;
        self.nll(&values)
    }
}

/// A set of options that are used when minimizations are performed.
pub struct MinimizerOptions {
    algorithm: Box<dyn Algorithm<Float, (), JalebiError>>,
    observers: Vec<Box<dyn Observer<Float, ()>>>,
    max_steps: usize,
}

impl Default for MinimizerOptions {
    fn default() -> Self {
        Self {
            algorithm: Box::new(LBFGSB::default()),
            observers: Default::default(),
            max_steps: 4000,
        }
    }
}

struct VerboseObserver {
    show_step: bool,
    show_x: bool,
    show_fx: bool,
}
impl Observer<Float, ()> for VerboseObserver {
    fn callback(&mut self, step: usize, status: &mut Status<Float>, _user_data: &mut ()) -> bool {
        if self.show_step {
            println!("Step: {}", step);
        }
        if self.show_x {
            println!("Current Best Position: {}", status.x.transpose());
        }
        if self.show_fx {
            println!("Current Best Value: {}", status.fx);
        }
        true
    }
}

impl MinimizerOptions {
    /// Adds the [`DebugObserver`] to the minimization.
    pub fn debug(self) -> Self {
        let mut observers = self.observers;
        observers.push(Box::new(DebugObserver));
        Self {
            algorithm: self.algorithm,
            observers,
            max_steps: self.max_steps,
        }
    }
    /// Adds a customizable [`VerboseObserver`] to the minimization.
    pub fn verbose(self, show_step: bool, show_x: bool, show_fx: bool) -> Self {
        let mut observers = self.observers;
        observers.push(Box::new(VerboseObserver {
            show_step,
            show_x,
            show_fx,
        }));
        Self {
            algorithm: self.algorithm,
            observers,
            max_steps: self.max_steps,
        }
    }
    /// Set the [`Algorithm`] to be used in the minimization (default: [`LBFGSB`] with default
    /// settings).
    pub fn with_algorithm<A: Algorithm<Float, (), JalebiError> + 'static>(
        self,
        algorithm: A,
    ) -> Self {
        Self {
            algorithm: Box::new(algorithm),
            observers: self.observers,
            max_steps: self.max_steps,
        }
    }
    /// Add an [`Observer`] to the list of [`Observer`]s used in the minimization.
    pub fn with_observer<O: Observer<Float, ()> + 'static>(self, observer: O) -> Self {
        let mut observers = self.observers;
        observers.push(Box::new(observer));
        Self {
            algorithm: self.algorithm,
            observers,
            max_steps: self.max_steps,
        }
    }

    /// Set the maximum number of [`Algorithm`] steps for the minimization (default: 4000).
    pub fn with_max_steps(self, max_steps: usize) -> Self {
        Self {
            algorithm: self.algorithm,
            observers: self.observers,
            max_steps,
        }
    }
}

/// The terminal state of a minimization.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FitStatus {
    /// The minimizer reported convergence away from every bound.
    Converged,
    /// The minimizer converged with at least one floating parameter pinned at a bound; its
    /// errors and the likelihood curvature there are unreliable.
    AtBoundary,
    /// The minimizer did not converge.
    Failed,
}

/// One parameter in a [`Fit`] report.
#[derive(Clone, Debug, Serialize)]
pub struct FitParameter {
    /// The fitted (or held) value.
    pub value: Float,
    /// The distance to the lower half-unit likelihood crossing, if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_lower: Option<Float>,
    /// The distance to the upper half-unit likelihood crossing, if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_upper: Option<Float>,
    /// Whether the parameter floated in the fit.
    pub floating: bool,
}

/// The result of a likelihood minimization: terminal status, the likelihood value at the
/// optimum, and every registered parameter (floating ones at their fitted values).
#[derive(Clone, Debug, Serialize)]
pub struct Fit {
    /// The terminal status.
    pub status: FitStatus,
    /// The negative log-likelihood at the optimum.
    pub nll: Float,
    /// The minimizer's exit message.
    pub message: String,
    /// All registered parameters, in registration order.
    pub parameters: IndexMap<String, FitParameter>,
}

impl Fit {
    /// The fitted value of a named parameter.
    pub fn value(&self, name: &str) -> JalebiResult<Float> {
        self.parameters
            .get(name)
            .map(|p| p.value)
            .ok_or_else(|| JalebiError::ParameterNotFoundError {
                name: name.to_string(),
            })
    }

    /// Serialize the full report to pretty-printed JSON.
    pub fn to_json(&self) -> JalebiResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
