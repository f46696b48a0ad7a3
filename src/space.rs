use std::fmt::Display;

use auto_ops::impl_op_ex;

use crate::{Float, JalebiError, JalebiResult};

/// A named, bounded, continuous observable axis.
///
/// Densities and normalizations are only defined inside `[lower, upper]`; evaluating a model
/// outside these bounds is a domain error, never an extrapolation.
#[derive(Clone, Debug, PartialEq)]
pub struct Observable {
    name: String,
    lower: Float,
    upper: Float,
}

impl Observable {
    /// Create a new [`Observable`] with the given name and finite bounds (`lower < upper`).
    pub fn new(name: &str, lower: Float, upper: Float) -> JalebiResult<Self> {
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(JalebiError::InvalidBounds {
                name: name.to_string(),
                lower,
                upper,
            });
        }
        Ok(Self {
            name: name.to_string(),
            lower,
            upper,
        })
    }
    /// The name of the axis.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The lower bound of the axis.
    pub fn lower(&self) -> Float {
        self.lower
    }
    /// The upper bound of the axis.
    pub fn upper(&self) -> Float {
        self.upper
    }
    /// The width of the axis.
    pub fn width(&self) -> Float {
        self.upper - self.lower
    }
    /// Check whether `value` lies inside the (inclusive) bounds.
    pub fn contains(&self, value: Float) -> bool {
        value >= self.lower && value <= self.upper
    }
    /// Promote this axis to a one-dimensional [`Space`].
    pub fn space(&self) -> Space {
        Space {
            axes: vec![self.clone()],
        }
    }
}

impl Display for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ∈ [{}, {}]", self.name, self.lower, self.upper)
    }
}

/// An ordered Cartesian product of [`Observable`]s.
///
/// Spaces compose with the `*` operator, so `&cosh * &cosl * &mass` builds the
/// three-dimensional observable space of the full fit. Points are slices ordered like the axes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Space {
    axes: Vec<Observable>,
}

impl Space {
    /// Build a [`Space`] from an ordered list of axes.
    pub fn new(axes: Vec<Observable>) -> Self {
        Self { axes }
    }
    /// The number of axes.
    pub fn dim(&self) -> usize {
        self.axes.len()
    }
    /// The ordered axes of this space.
    pub fn axes(&self) -> &[Observable] {
        &self.axes
    }
    /// The axis at position `index`.
    pub fn axis(&self, index: usize) -> &Observable {
        &self.axes[index]
    }
    /// The position of the axis with the given name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|a| a.name() == name)
    }
    /// The ordered axis names.
    pub fn names(&self) -> Vec<&str> {
        self.axes.iter().map(|a| a.name()).collect()
    }
    /// Check whether any axis name appears more than once.
    pub fn has_duplicate_axes(&self) -> bool {
        self.axes
            .iter()
            .enumerate()
            .any(|(i, a)| self.axes[..i].iter().any(|b| b.name() == a.name()))
    }
    /// Check whether `point` lies inside the (inclusive) bounds on every axis.
    ///
    /// A point of the wrong dimension is never contained.
    pub fn contains(&self, point: &[Float]) -> bool {
        point.len() == self.axes.len()
            && self
                .axes
                .iter()
                .zip(point.iter())
                .all(|(axis, &value)| axis.contains(value))
    }
    /// The volume of the bounding box.
    pub fn volume(&self) -> Float {
        self.axes.iter().map(|a| a.width()).product()
    }
    /// Build the sub-space spanned by the named axes, in the order given.
    ///
    /// # Errors
    ///
    /// Returns an [`AxisNotFoundError`](JalebiError::AxisNotFoundError) if any name is not an
    /// axis of this space.
    pub fn sub_space(&self, names: &[&str]) -> JalebiResult<Space> {
        let axes = names
            .iter()
            .map(|name| {
                self.index_of(name)
                    .map(|i| self.axes[i].clone())
                    .ok_or_else(|| JalebiError::AxisNotFoundError {
                        name: name.to_string(),
                    })
            })
            .collect::<JalebiResult<Vec<Observable>>>()?;
        Ok(Space { axes })
    }
}

impl From<Observable> for Space {
    fn from(axis: Observable) -> Self {
        axis.space()
    }
}

impl From<&Observable> for Space {
    fn from(axis: &Observable) -> Self {
        axis.space()
    }
}

impl Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.axes.iter().map(|a| a.to_string()).collect();
        write!(f, "({})", names.join(" × "))
    }
}

impl_op_ex!(*|a: &Space, b: &Space| -> Space {
    let mut axes = a.axes.clone();
    axes.extend(b.axes.iter().cloned());
    Space { axes }
});
impl_op_ex!(*|a: &Observable, b: &Observable| -> Space {
    Space {
        axes: vec![a.clone(), b.clone()],
    }
});
impl_op_ex!(*|a: &Space, b: &Observable| -> Space {
    let mut axes = a.axes.clone();
    axes.push(b.clone());
    Space { axes }
});
impl_op_ex!(*|a: &Observable, b: &Space| -> Space {
    let mut axes = vec![a.clone()];
    axes.extend(b.axes.iter().cloned());
    Space { axes }
});
