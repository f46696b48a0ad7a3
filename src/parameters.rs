use std::sync::Arc;

use indexmap::IndexMap;

use crate::{Float, JalebiError, JalebiResult};

/// A tag which refers to a parameter registered with a [`ParameterSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParameterId(pub(crate) usize);

type ComposedFn = Arc<dyn Fn(&[Float]) -> Float + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Scalar {
        value: Float,
        lower: Float,
        upper: Float,
        floating: bool,
    },
    Composed {
        inputs: Vec<ParameterId>,
        function: ComposedFn,
    },
}

/// An ordered registry of named fit parameters.
///
/// Scalar parameters carry a current value, bounds, and a floating flag; composed parameters
/// hold a pure function of previously registered parameters and are recomputed on every access,
/// never adjusted by the minimizer. Because composed inputs must already exist at registration
/// time, every composed reference points earlier in registration order and cycles cannot be
/// expressed.
#[derive(Clone, Default)]
pub struct ParameterSet {
    entries: IndexMap<String, Entry>,
}

impl ParameterSet {
    /// Create an empty [`ParameterSet`].
    pub fn new() -> Self {
        Self::default()
    }
    /// Register a floating scalar parameter with the given starting value and bounds.
    ///
    /// # Errors
    ///
    /// The name must be unique ([`RegistrationError`](JalebiError::RegistrationError)), the
    /// bounds finite with `lower < upper`
    /// ([`InvalidBounds`](JalebiError::InvalidBounds)), and the starting value inside them
    /// ([`ValueOutOfBounds`](JalebiError::ValueOutOfBounds)).
    pub fn register(
        &mut self,
        name: &str,
        value: Float,
        lower: Float,
        upper: Float,
    ) -> JalebiResult<ParameterId> {
        if self.entries.contains_key(name) {
            return Err(JalebiError::RegistrationError {
                name: name.to_string(),
            });
        }
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(JalebiError::InvalidBounds {
                name: name.to_string(),
                lower,
                upper,
            });
        }
        if !value.is_finite() || value < lower || value > upper {
            return Err(JalebiError::ValueOutOfBounds {
                name: name.to_string(),
                value,
                lower,
                upper,
            });
        }
        let id = ParameterId(self.entries.len());
        self.entries.insert(
            name.to_string(),
            Entry::Scalar {
                value,
                lower,
                upper,
                floating: true,
            },
        );
        Ok(id)
    }
    /// Register a composed parameter whose value is `function` applied to the current values of
    /// `inputs` (in the order given).
    ///
    /// # Errors
    ///
    /// Every input must already be registered
    /// ([`ParameterNotFoundError`](JalebiError::ParameterNotFoundError)) and the name must be
    /// unique.
    pub fn register_composed<F>(
        &mut self,
        name: &str,
        inputs: &[&str],
        function: F,
    ) -> JalebiResult<ParameterId>
    where
        F: Fn(&[Float]) -> Float + Send + Sync + 'static,
    {
        if self.entries.contains_key(name) {
            return Err(JalebiError::RegistrationError {
                name: name.to_string(),
            });
        }
        let inputs = inputs
            .iter()
            .map(|input| self.id(input))
            .collect::<JalebiResult<Vec<ParameterId>>>()?;
        let id = ParameterId(self.entries.len());
        self.entries.insert(
            name.to_string(),
            Entry::Composed {
                inputs,
                function: Arc::new(function),
            },
        );
        Ok(id)
    }
    /// Look up the [`ParameterId`] of a registered parameter by name.
    pub fn id(&self, name: &str) -> JalebiResult<ParameterId> {
        self.entries
            .get_index_of(name)
            .map(ParameterId)
            .ok_or_else(|| JalebiError::ParameterNotFoundError {
                name: name.to_string(),
            })
    }
    /// The name of a registered parameter.
    pub fn name(&self, id: ParameterId) -> &str {
        self.entries
            .get_index(id.0)
            .map(|(name, _)| name.as_str())
            .unwrap_or("<unregistered>")
    }
    /// The number of registered parameters (scalar and composed).
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// The declared bounds of a scalar parameter (`None` for composed parameters).
    pub fn bounds(&self, id: ParameterId) -> Option<(Float, Float)> {
        match self.entries.get_index(id.0)?.1 {
            Entry::Scalar { lower, upper, .. } => Some((*lower, *upper)),
            Entry::Composed { .. } => None,
        }
    }
    /// Check whether a parameter floats in the fit (composed parameters never float).
    pub fn is_floating(&self, id: ParameterId) -> bool {
        matches!(
            self.entries.get_index(id.0),
            Some((_, Entry::Scalar { floating: true, .. }))
        )
    }
    /// Fix a scalar parameter at its current value.
    pub fn fix(&mut self, name: &str) -> JalebiResult<()> {
        self.set_floating(name, false)
    }
    /// Let a scalar parameter float in the fit.
    pub fn float(&mut self, name: &str) -> JalebiResult<()> {
        self.set_floating(name, true)
    }
    fn set_floating(&mut self, name: &str, value: bool) -> JalebiResult<()> {
        match self.entries.get_mut(name) {
            Some(Entry::Scalar { floating, .. }) => {
                *floating = value;
                Ok(())
            }
            Some(Entry::Composed { .. }) => Err(JalebiError::ComposedNotAdjustable {
                name: name.to_string(),
            }),
            None => Err(JalebiError::ParameterNotFoundError {
                name: name.to_string(),
            }),
        }
    }
    /// Set the current value of a scalar parameter (bounds are enforced).
    pub fn set_value(&mut self, name: &str, new_value: Float) -> JalebiResult<()> {
        match self.entries.get_mut(name) {
            Some(Entry::Scalar {
                value,
                lower,
                upper,
                ..
            }) => {
                if !new_value.is_finite() || new_value < *lower || new_value > *upper {
                    return Err(JalebiError::ValueOutOfBounds {
                        name: name.to_string(),
                        value: new_value,
                        lower: *lower,
                        upper: *upper,
                    });
                }
                *value = new_value;
                Ok(())
            }
            Some(Entry::Composed { .. }) => Err(JalebiError::ComposedNotAdjustable {
                name: name.to_string(),
            }),
            None => Err(JalebiError::ParameterNotFoundError {
                name: name.to_string(),
            }),
        }
    }
    /// The names of all registered parameters, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
    /// The names of the floating parameters, in registration order. This is the order in which
    /// the minimizer sees them.
    pub fn free_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| match entry {
                Entry::Scalar { floating: true, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
    /// The current values of the floating parameters, in registration order.
    pub fn free_values(&self) -> Vec<Float> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                Entry::Scalar {
                    value,
                    floating: true,
                    ..
                } => Some(*value),
                _ => None,
            })
            .collect()
    }
    /// The bounds of the floating parameters, in registration order.
    pub fn free_bounds(&self) -> Vec<(Float, Float)> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                Entry::Scalar {
                    lower,
                    upper,
                    floating: true,
                    ..
                } => Some((*lower, *upper)),
                _ => None,
            })
            .collect()
    }
    /// The number of floating parameters.
    pub fn n_free(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, Entry::Scalar { floating: true, .. }))
            .count()
    }
    /// Write a minimizer position back into the stored values of the floating parameters.
    pub fn update_free(&mut self, free: &[Float]) -> JalebiResult<()> {
        if free.len() != self.n_free() {
            return Err(JalebiError::Custom(format!(
                "expected {} free parameter values, got {}",
                self.n_free(),
                free.len()
            )));
        }
        let mut it = free.iter().copied();
        for entry in self.entries.values_mut() {
            if let Entry::Scalar {
                value,
                floating: true,
                ..
            } = entry
            {
                if let Some(new_value) = it.next() {
                    *value = new_value;
                }
            }
        }
        Ok(())
    }
    /// Bind a candidate free-parameter vector to this registry, producing a read-only snapshot
    /// for density evaluation.
    ///
    /// The snapshot borrows the registry: the minimizer is the single writer of the free vector
    /// and every density evaluator is a reader, so no locking is needed.
    pub fn values(&self, free: &[Float]) -> JalebiResult<ParameterValues<'_>> {
        if free.len() != self.n_free() {
            return Err(JalebiError::Custom(format!(
                "expected {} free parameter values, got {}",
                self.n_free(),
                free.len()
            )));
        }
        let mut free_slots = vec![None; self.entries.len()];
        let mut slot = 0;
        for (index, entry) in self.entries.values().enumerate() {
            if matches!(entry, Entry::Scalar { floating: true, .. }) {
                free_slots[index] = Some(slot);
                slot += 1;
            }
        }
        Ok(ParameterValues {
            set: self,
            free: free.to_vec(),
            free_slots,
        })
    }
    /// A snapshot at the currently stored values.
    pub fn snapshot(&self) -> ParameterValues<'_> {
        self.values(&self.free_values())
            .expect("free_values always matches n_free")
    }
}

/// A read-only snapshot of parameter values: the registry's stored values with a candidate
/// free-parameter vector substituted for the floating entries. Composed parameters are
/// recomputed on every access.
pub struct ParameterValues<'a> {
    set: &'a ParameterSet,
    free: Vec<Float>,
    free_slots: Vec<Option<usize>>,
}

impl ParameterValues<'_> {
    /// The current value of the given parameter.
    pub fn get(&self, id: ParameterId) -> Float {
        match self
            .set
            .entries
            .get_index(id.0)
            .map(|(_, entry)| entry)
            .expect("ParameterId out of range")
        {
            Entry::Scalar { value, .. } => match self.free_slots[id.0] {
                Some(slot) => self.free[slot],
                None => *value,
            },
            Entry::Composed { inputs, function } => {
                let args: Vec<Float> = inputs.iter().map(|&input| self.get(input)).collect();
                function(&args)
            }
        }
    }
    /// The current value of the named parameter.
    pub fn get_by_name(&self, name: &str) -> JalebiResult<Float> {
        Ok(self.get(self.set.id(name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn registration_validation() {
        let mut params = ParameterSet::new();
        params.register("mu", 5280.0, 5200.0, 5400.0).unwrap();
        assert!(params.register("mu", 5280.0, 5200.0, 5400.0).is_err());
        assert!(params.register("bad", 0.0, 1.0, -1.0).is_err());
        assert!(params.register("low", -2.0, -1.0, 1.0).is_err());
    }

    #[test]
    fn composed_unitarity_constraint() {
        let mut params = ParameterSet::new();
        params.register("App", 0.1670, -1.0, 2.0).unwrap();
        params.register("A0", 0.5, -1.0, 2.0).unwrap();
        params.register("Aqs", 0.01, -10.0, 10.0).unwrap();
        params.register("Aqc", 0.01, -10.0, 10.0).unwrap();
        let a_s = params
            .register_composed("AS", &["A0", "App", "Aqc", "Aqs"], |p| {
                1.0 - p[0] - p[1] - p[2] - p[3]
            })
            .unwrap();
        let values = params.snapshot();
        assert_relative_eq!(values.get(a_s), 0.313);
        assert!(!params.is_floating(a_s));
    }

    #[test]
    fn composed_requires_existing_inputs() {
        let mut params = ParameterSet::new();
        params.register("A0", 0.5, -1.0, 2.0).unwrap();
        let result = params.register_composed("AS", &["A0", "App"], |p| 1.0 - p[0] - p[1]);
        assert!(matches!(
            result,
            Err(JalebiError::ParameterNotFoundError { .. })
        ));
    }

    #[test]
    fn free_vector_ordering_skips_fixed_and_composed() {
        let mut params = ParameterSet::new();
        let mu = params.register("mu", 5280.0, 5200.0, 5400.0).unwrap();
        let sigma = params.register("sigma", 15.9, 5.0, 80.0).unwrap();
        params
            .register_composed("twice_mu", &["mu"], |p| 2.0 * p[0])
            .unwrap();
        let nsig = params.register("Nsig", 20000.0, 0.0, 1.0e8).unwrap();
        params.fix("sigma").unwrap();
        assert_eq!(params.free_names(), vec!["mu", "Nsig"]);
        assert_eq!(params.n_free(), 2);

        let values = params.values(&[5300.0, 21000.0]).unwrap();
        assert_relative_eq!(values.get(mu), 5300.0);
        assert_relative_eq!(values.get(sigma), 15.9);
        assert_relative_eq!(values.get(nsig), 21000.0);
        assert_relative_eq!(values.get_by_name("twice_mu").unwrap(), 10600.0);
    }

    #[test]
    fn composed_cannot_float_or_be_set() {
        let mut params = ParameterSet::new();
        params.register("A0", 0.5, -1.0, 2.0).unwrap();
        params
            .register_composed("AS", &["A0"], |p| 1.0 - p[0])
            .unwrap();
        assert!(params.float("AS").is_err());
        assert!(params.set_value("AS", 0.2).is_err());
    }
}
