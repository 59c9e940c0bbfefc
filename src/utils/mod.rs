//! Numeric building blocks
//!
//! Linear prediction and polynomial root finding. Neither module knows
//! anything about audio: they take plain sample and coefficient slices.

pub mod lpc;
pub mod roots;

pub use lpc::{estimate, lpc_autocorrelation, lpc_burg, LpcCoefficients, LpcMethod};
pub use roots::{companion_roots, laguerre, ComplexPolynomial, RootFinder, RootMethod};
