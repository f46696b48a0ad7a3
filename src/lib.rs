//! `jalebi` is a library for extended unbinned maximum-likelihood fits over low-dimensional
//! observable spaces, built for rare-decay angular analyses: declare named, bounded observables,
//! compose elementary density components (an amplitude-parametrized angular signal shape, a
//! double-sided Crystal Ball mass peak, Legendre and exponential backgrounds) into products,
//! extend them with Poisson yields, sum the extended components, and minimize the resulting
//! likelihood with a bounded quasi-Newton algorithm.
//!
//! All normalizations are closed form, so likelihood evaluation is a single pass over the
//! events; projections onto any subset of axes (for plotting fit overlays) integrate the
//! remaining axes out by Gauss-Legendre quadrature, factorizing products exactly.
//!
//! ```no_run
//! use std::sync::Arc;
//! use jalebi::{
//!     data::Table,
//!     likelihoods::ExtendedUnbinnedNLL,
//!     models::Model,
//!     parameters::ParameterSet,
//!     pdfs::{
//!         angular::{AngularAmplitudes, AngularDistribution},
//!         exponential::Exponential,
//!         legendre::LegendreBackground,
//!         mass::DoubleSidedCrystalBall,
//!     },
//!     space::Observable,
//!     JalebiResult,
//! };
//!
//! fn main() -> JalebiResult<()> {
//!     let cosh = Observable::new("cosh", -1.0, 1.0)?;
//!     let cosl = Observable::new("cosl", -1.0, 1.0)?;
//!     let mass = Observable::new("B_mass", 5200.0, 5500.0)?;
//!
//!     let mut params = ParameterSet::new();
//!     let app = params.register("App", 0.1670, -1.0, 2.0)?;
//!     let a0 = params.register("A0", 0.5, -1.0, 2.0)?;
//!     let aqs = params.register("Aqs", 0.01, -10.0, 10.0)?;
//!     let aqc = params.register("Aqc", 0.01, -10.0, 10.0)?;
//!     let afb_hs = params.register("AfbHS", 0.0, -1.0, 1.0)?;
//!     let afb_hc = params.register("AfbHC", 0.0, -1.0, 1.0)?;
//!     let afb_ls = params.register("AfbLS", 0.0, -1.0, 1.0)?;
//!     let afb_lc = params.register("AfbLC", 0.0, -1.0, 1.0)?;
//!     let a_s = params.register_composed("AS", &["A0", "App", "Aqc", "Aqs"], |p| {
//!         1.0 - p[0] - p[1] - p[2] - p[3]
//!     })?;
//!     let mu = params.register("mu", 5280.0, 5200.0, 5400.0)?;
//!     let sigma_l = params.register("sigmal", 15.9, 5.0, 80.0)?;
//!     let alpha_l = params.register("alphal", 1.36, 0.1, 5.0)?;
//!     let n_l = params.register("nl", 9.77, 0.5, 50.0)?;
//!     let sigma_r = params.register("sigmar", 15.5, 5.0, 80.0)?;
//!     let alpha_r = params.register("alphar", 1.66, 0.1, 5.0)?;
//!     let n_r = params.register("nr", 146.0, 0.5, 500.0)?;
//!     for name in ["sigmal", "alphal", "nl", "sigmar", "alphar", "nr"] {
//!         params.fix(name)?;
//!     }
//!     let a1_cosh = params.register("a1_cosh", 0.0, -2.0, 2.0)?;
//!     let a2_cosh = params.register("a2_cosh", -0.2, -2.0, 2.0)?;
//!     let a1_cosl = params.register("a1_cosl", 0.0, -2.0, 2.0)?;
//!     let a2_cosl = params.register("a2_cosl", -0.4, -2.0, 2.0)?;
//!     for name in ["a1_cosh", "a2_cosh", "a1_cosl", "a2_cosl"] {
//!         params.fix(name)?;
//!     }
//!     let lambda = params.register("lambda", -0.001, -1.0, 0.0)?;
//!     let nsig = params.register("Nsig", 20000.0, 0.0, 1.0e8)?;
//!     let nbkg = params.register("Nbkg", 50000.0, 0.0, 1.0e8)?;
//!
//!     let sig_ang = AngularDistribution::new(
//!         "sig_ang",
//!         &(&cosh * &cosl),
//!         AngularAmplitudes { app, a0, a_s, aqc, aqs, afb_hc, afb_hs, afb_lc, afb_ls },
//!     )?;
//!     let sig_mass = DoubleSidedCrystalBall::new(
//!         "sig_mass", &mass.space(), mu, sigma_l, alpha_l, n_l, sigma_r, alpha_r, n_r,
//!     )?;
//!     let bkg_cosh = LegendreBackground::new("bkg_cosh", &cosh.space(), &[a1_cosh, a2_cosh])?;
//!     let bkg_cosl = LegendreBackground::new("bkg_cosl", &cosl.space(), &[a1_cosl, a2_cosl])?;
//!     let bkg_mass = Exponential::new("bkg_mass", &mass.space(), lambda, &params)?;
//!
//!     let signal = Model::product(vec![Model::Pdf(sig_ang), Model::Pdf(sig_mass)])?
//!         .extended(nsig, &params)?;
//!     let background = Model::product(vec![
//!         Model::Pdf(bkg_cosh),
//!         Model::Pdf(bkg_cosl),
//!         Model::Pdf(bkg_mass),
//!     ])?
//!     .extended(nbkg, &params)?;
//!     let model = Model::sum(vec![signal, background])?;
//!
//!     let table = Table::from_columns(vec![/* simulation output */])?;
//!     let selected = table.between("q2", 1.1, 7.0)?.between("mKpi", 0.65, 1.5)?;
//!     let dataset = Arc::new(selected.dataset(model.space())?);
//!
//!     let nll = ExtendedUnbinnedNLL::new(model, dataset, params)?;
//!     let mut fit = nll.minimize(None)?;
//!     nll.errors(&mut fit)?;
//!     println!("{}", fit.to_json()?);
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

use thiserror::Error;

/// [`Event`](data::Event), [`Dataset`](data::Dataset) and columnar [`Table`](data::Table)
/// storage.
pub mod data;
/// The extended unbinned negative log-likelihood and its minimizer front-end.
pub mod likelihoods;
/// Model composition: products, yields, sums, and projections.
pub mod models;
/// The ordered registry of scalar and composed fit parameters.
pub mod parameters;
/// Elementary density components.
pub mod pdfs;
/// Named, bounded observables and their Cartesian products.
pub mod space;
/// Quadrature rules and special functions.
pub mod utils;

pub use data::{Dataset, Event, Table};
pub use likelihoods::{ExtendedUnbinnedNLL, Fit, FitParameter, FitStatus, MinimizerOptions};
pub use models::Model;
pub use parameters::{ParameterId, ParameterSet, ParameterValues};
pub use pdfs::Pdf;
pub use space::{Observable, Space};

/// A floating-point number type (defaults to [`f64`], see `f32` feature).
#[cfg(not(feature = "f32"))]
pub type Float = f64;

/// A floating-point number type (defaults to [`f64`], see `f32` feature).
#[cfg(feature = "f32")]
pub type Float = f32;

/// The mathematical constant π.
#[cfg(not(feature = "f32"))]
pub const PI: Float = std::f64::consts::PI;

/// The mathematical constant π.
#[cfg(feature = "f32")]
pub const PI: Float = std::f32::consts::PI;

/// The error type used by all `jalebi` internal methods.
#[derive(Error, Debug)]
pub enum JalebiError {
    /// An error which occurs when two parameters are registered under one name.
    #[error("A parameter by the name \"{name}\" is already registered!")]
    RegistrationError {
        /// Name of the parameter which is already registered.
        name: String,
    },
    /// An error which occurs on lookup of an unregistered parameter.
    #[error("No registered parameter with name \"{name}\"!")]
    ParameterNotFoundError {
        /// Name of the parameter which failed lookup.
        name: String,
    },
    /// An error which occurs when bounds are non-finite or inverted.
    #[error("Invalid bounds [{lower}, {upper}] for \"{name}\"!")]
    InvalidBounds {
        /// The bounded object's name.
        name: String,
        /// The offending lower bound.
        lower: Float,
        /// The offending upper bound.
        upper: Float,
    },
    /// An error which occurs when a value is set outside its declared bounds.
    #[error("Value {value} for \"{name}\" lies outside [{lower}, {upper}]!")]
    ValueOutOfBounds {
        /// The parameter's name.
        name: String,
        /// The offending value.
        value: Float,
        /// The declared lower bound.
        lower: Float,
        /// The declared upper bound.
        upper: Float,
    },
    /// An error which occurs on an attempt to set, fix or float a composed parameter.
    #[error("\"{name}\" is a composed parameter and cannot be adjusted directly!")]
    ComposedNotAdjustable {
        /// The composed parameter's name.
        name: String,
    },
    /// An error which occurs on lookup of an axis name not present in a space.
    #[error("No axis with name \"{name}\" in this space!")]
    AxisNotFoundError {
        /// The axis name which failed lookup.
        name: String,
    },
    /// An error which occurs when models are composed in an unsupported way.
    #[error("Invalid model: {reason}")]
    InvalidModel {
        /// Why the composition is rejected.
        reason: String,
    },
    /// An error which occurs when two product factors claim the same axis.
    #[error("Axis \"{name}\" appears in more than one product factor!")]
    OverlappingAxes {
        /// The shared axis name.
        name: String,
    },
    /// An error which occurs when a yield parameter could go negative.
    #[error("Yield \"{name}\" must have a non-negative lower bound, got {lower}!")]
    InvalidYieldBound {
        /// The yield parameter's name.
        name: String,
        /// The offending lower bound (negative infinity for a composed parameter).
        lower: Float,
    },
    /// An error which occurs when an exponential rate is allowed to grow.
    #[error("Exponential rate \"{name}\" must be bounded above by zero, got upper bound {upper}!")]
    NonDecayingRate {
        /// The rate parameter's name.
        name: String,
        /// The offending upper bound (infinity for a composed parameter).
        upper: Float,
    },
    /// An error which occurs when a density evaluates negative or non-finite.
    #[error("Component \"{component}\" produced an invalid density value {value}!")]
    InvalidDensity {
        /// The offending component's name.
        component: String,
        /// The offending density value.
        value: Float,
    },
    /// An error which occurs when a normalization integral is non-positive or non-finite.
    #[error("Component \"{component}\" produced an invalid normalization {value}!")]
    InvalidNormalization {
        /// The offending component's name.
        component: String,
        /// The offending normalization value.
        value: Float,
    },
    /// An error which occurs when a component's shape parameters leave their valid region.
    #[error("Component \"{component}\" has invalid shape parameters: {reason}")]
    InvalidShape {
        /// The offending component's name.
        component: String,
        /// Which parameter is invalid and why.
        reason: String,
    },
    /// An error which occurs when a density is evaluated outside its declared space.
    #[error("Component \"{component}\" evaluated outside its space on axis \"{axis}\" (value {value})!")]
    PointOutOfBounds {
        /// The component being evaluated.
        component: String,
        /// The violated axis.
        axis: String,
        /// The out-of-range coordinate.
        value: Float,
    },
    /// An error which occurs when a dataset event lies outside the model's space.
    #[error("Event {index} lies outside the fit space on axis \"{axis}\" (value {value})!")]
    EventOutOfBounds {
        /// The event's position in the dataset.
        index: usize,
        /// The violated axis.
        axis: String,
        /// The out-of-range coordinate.
        value: Float,
    },
    /// An error which occurs on lookup of a missing table column.
    #[error("No column with name \"{name}\" in this table!")]
    ColumnNotFound {
        /// The column name which failed lookup.
        name: String,
    },
    /// An error returned by the JSON serializer.
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    /// A custom fallback error for errors too complex or too infrequent to warrant their own
    /// error category.
    #[error("{0}")]
    Custom(String),
}

impl Clone for JalebiError {
    // This is a little hack because error types are rarely cloneable, but I need to store them
    // in a cloneable box for minimizers.
    fn clone(&self) -> Self {
        let err_string = self.to_string();
        JalebiError::Custom(err_string)
    }
}

/// A [`Result`] alias for [`JalebiError`].
pub type JalebiResult<T> = Result<T, JalebiError>;
