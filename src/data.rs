use accurate::sum::Klein;
use accurate::traits::*;
use indexmap::IndexMap;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{space::Space, Float, JalebiError, JalebiResult};

/// A single event: one coordinate per axis of the observable space it belongs to, plus a
/// weight. Weights are diagnostic (weighted projections and counts); the likelihood itself is
/// unweighted.
#[derive(Clone, Debug)]
pub struct Event {
    /// The event coordinates, ordered like the axes of the owning [`Space`].
    pub values: Vec<Float>,
    /// The event weight.
    pub weight: Float,
}

/// An in-memory collection of [`Event`]s.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    /// The events in this dataset.
    pub events: Vec<Event>,
}

impl Dataset {
    /// Create a new [`Dataset`] from a list of events.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// The number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over the events.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// The sum of event weights (compensated).
    #[cfg(feature = "rayon")]
    pub fn weighted_len(&self) -> Float {
        self.events
            .par_iter()
            .map(|event| event.weight)
            .parallel_sum_with_accumulator::<Klein<Float>>()
    }

    /// The sum of event weights (compensated).
    #[cfg(not(feature = "rayon"))]
    pub fn weighted_len(&self) -> Float {
        self.events
            .iter()
            .map(|event| event.weight)
            .sum_with_accumulator::<Klein<Float>>()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A columnar table of named `Float` columns of equal length, the staging area between raw
/// simulation output and a fit-ready [`Dataset`]: apply selection cuts with [`Table::between`],
/// then bind the axis columns to an observable [`Space`] with [`Table::dataset`].
#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: IndexMap<String, Vec<Float>>,
}

impl Table {
    /// Build a [`Table`] from named columns.
    ///
    /// # Errors
    ///
    /// All columns must have the same length.
    pub fn from_columns(columns: Vec<(String, Vec<Float>)>) -> JalebiResult<Self> {
        let mut map = IndexMap::with_capacity(columns.len());
        let mut n_rows = None;
        for (name, column) in columns {
            match n_rows {
                None => n_rows = Some(column.len()),
                Some(n) if n == column.len() => {}
                Some(n) => {
                    return Err(JalebiError::Custom(format!(
                        "column \"{}\" has {} rows, expected {}",
                        name,
                        column.len(),
                        n
                    )))
                }
            }
            if map.insert(name.clone(), column).is_some() {
                return Err(JalebiError::Custom(format!("duplicate column \"{name}\"")));
            }
        }
        Ok(Self { columns: map })
    }

    /// The number of rows (zero for a table with no columns).
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    /// The named column.
    pub fn column(&self, name: &str) -> JalebiResult<&[Float]> {
        self.columns
            .get(name)
            .map(|c| c.as_slice())
            .ok_or_else(|| JalebiError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    /// Keep only the rows where the named column lies inside `[lower, upper]` (inclusive).
    pub fn between(&self, name: &str, lower: Float, upper: Float) -> JalebiResult<Table> {
        let selector = self.column(name)?;
        let keep: Vec<bool> = selector
            .iter()
            .map(|&v| v >= lower && v <= upper)
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, column)| {
                let filtered = column
                    .iter()
                    .zip(keep.iter())
                    .filter_map(|(&v, &k)| if k { Some(v) } else { None })
                    .collect();
                (name.clone(), filtered)
            })
            .collect();
        Ok(Self { columns })
    }

    /// Bind the axis columns of `space` into a unit-weight [`Dataset`].
    ///
    /// # Errors
    ///
    /// Every axis name of `space` must be a column of this table.
    pub fn dataset(&self, space: &Space) -> JalebiResult<Dataset> {
        self.build_dataset(space, None)
    }

    /// Bind the axis columns of `space` into a [`Dataset`], taking per-event weights from the
    /// named column.
    pub fn dataset_weighted(&self, space: &Space, weight: &str) -> JalebiResult<Dataset> {
        self.build_dataset(space, Some(self.column(weight)?))
    }

    fn build_dataset(&self, space: &Space, weights: Option<&[Float]>) -> JalebiResult<Dataset> {
        let columns = space
            .axes()
            .iter()
            .map(|axis| self.column(axis.name()))
            .collect::<JalebiResult<Vec<&[Float]>>>()?;
        let events = (0..self.n_rows())
            .map(|row| Event {
                values: columns.iter().map(|column| column[row]).collect(),
                weight: weights.map(|w| w[row]).unwrap_or(1.0),
            })
            .collect();
        Ok(Dataset::new(events))
    }
}
