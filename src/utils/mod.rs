/// Special functions and quadrature rules used by the density components.
pub mod functions;
