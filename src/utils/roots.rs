//! Polynomial root finding
//!
//! All roots of the LPC characteristic polynomial are found one at a time
//! with Laguerre's method, each root divided out of the polynomial before the
//! next search (deflation). Laguerre's method converges from almost any
//! starting point, so every search starts at zero. Roots come back in the
//! order they were extracted.
//!
//! The companion-matrix eigenvalue method ([`companion_roots`]) is available
//! for real polynomials as a cross-check.

use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{AnalysisError, Result};

/// Relative step size at which an iteration counts as converged
pub const EPS: f64 = 2.0e-6;

/// Relative rounding-error bound for `|p(x)|`
pub const EPSS: f64 = 1.0e-7;

/// Number of fractional step multipliers used to break limit cycles
pub const MR: usize = 8;

/// Iterations between two fractional steps
pub const MT: usize = 10;

/// Iteration budget for one root
pub const MAXIT: usize = MT * MR;

/// Step fractions taken every `MT` iterations
const FRAC: [f64; MR + 1] = [0.0, 0.5, 0.25, 0.75, 0.125, 0.375, 0.625, 0.875, 1.0];

/// Polynomial with complex coefficients in ascending powers
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexPolynomial {
    coefficients: Vec<Complex64>,
}

impl ComplexPolynomial {
    /// Create a polynomial from `c[0] + c[1]*z + ... + c[m]*z^m`
    ///
    /// Zero high-order coefficients are dropped so that the leading one is non-zero.
    pub fn new(mut coefficients: Vec<Complex64>) -> Self {
        while coefficients.len() > 1 && coefficients.last().map_or(false, |c| c.norm() == 0.0) {
            coefficients.pop();
        }
        Self { coefficients }
    }

    /// Create a polynomial from real coefficients in ascending powers
    pub fn from_real(coefficients: &[f64]) -> Self {
        Self::new(
            coefficients
                .iter()
                .map(|&c| Complex64::new(c, 0.0))
                .collect(),
        )
    }

    /// The monic polynomial with the given roots
    pub fn from_roots(roots: &[Complex64]) -> Self {
        let mut coefficients = vec![Complex64::new(1.0, 0.0)];
        for &root in roots {
            let mut next = vec![Complex64::new(0.0, 0.0); coefficients.len() + 1];
            for (k, &c) in coefficients.iter().enumerate() {
                next[k + 1] += c;
                next[k] -= root * c;
            }
            coefficients = next;
        }
        Self { coefficients }
    }

    /// Coefficients in ascending powers
    pub fn coefficients(&self) -> &[Complex64] {
        &self.coefficients
    }

    /// Degree of the polynomial (0 for constants)
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// True if every imaginary part is negligible
    ///
    /// Products of conjugate pairs leave rounding residue in the imaginary
    /// parts, so each must be within `EPSS` of the largest coefficient.
    pub fn is_real(&self) -> bool {
        let scale = self
            .coefficients
            .iter()
            .map(|c| c.norm())
            .fold(0.0, f64::max);
        self.coefficients
            .iter()
            .all(|c| c.im.abs() <= EPSS * scale)
    }

    /// Evaluate at `z` with Horner's method
    pub fn evaluate(&self, z: Complex64) -> Complex64 {
        self.coefficients
            .iter()
            .rev()
            .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * z + c)
    }

    /// Evaluate `p(z)`, `p'(z)` and `p''(z)` in one Horner pass
    pub fn evaluate_with_derivatives(&self, z: Complex64) -> (Complex64, Complex64, Complex64) {
        let h = self.horner(z);
        (h.value, h.first, h.half_second * 2.0)
    }

    fn horner(&self, z: Complex64) -> Horner {
        let zero = Complex64::new(0.0, 0.0);
        let Some((&leading, rest)) = self.coefficients.split_last() else {
            return Horner {
                value: zero,
                first: zero,
                half_second: zero,
                rounding_bound: 0.0,
            };
        };

        let abs_z = z.norm();
        let mut h = Horner {
            value: leading,
            first: zero,
            half_second: zero,
            rounding_bound: leading.norm(),
        };
        for &c in rest.iter().rev() {
            h.half_second = h.half_second * z + h.first;
            h.first = h.first * z + h.value;
            h.value = h.value * z + c;
            h.rounding_bound = h.value.norm() + abs_z * h.rounding_bound;
        }
        h
    }

    /// Divide by `(z - root)` with synthetic division
    ///
    /// Returns the quotient, a new polynomial of degree `m - 1`, and the
    /// remainder, which equals `p(root)`. `self` is left untouched.
    pub fn deflate(&self, root: Complex64) -> (ComplexPolynomial, Complex64) {
        let m = self.degree();
        if m == 0 {
            let constant = self
                .coefficients
                .first()
                .copied()
                .unwrap_or(Complex64::new(0.0, 0.0));
            return (self.clone(), constant);
        }

        let mut quotient = vec![Complex64::new(0.0, 0.0); m];
        let mut b = self.coefficients[m];
        for j in (0..m).rev() {
            quotient[j] = b;
            b = root * b + self.coefficients[j];
        }

        (
            ComplexPolynomial {
                coefficients: quotient,
            },
            b,
        )
    }
}

/// One Horner pass: `p`, `p'`, `p''/2` and the accumulated `|p|` bound
struct Horner {
    value: Complex64,
    first: Complex64,
    half_second: Complex64,
    rounding_bound: f64,
}

/// Find one root of `poly` with Laguerre's method, starting at `guess`
///
/// Every `MT` iterations the step is scaled by the next fraction in a fixed
/// cycle so that the iteration cannot sit in a limit cycle.
///
/// # Errors
/// * `RootFindingFailed` if no convergence within `MAXIT` iterations
/// * `InvalidParameter` for a constant polynomial
pub fn laguerre(poly: &ComplexPolynomial, guess: Complex64) -> Result<Complex64> {
    let m = poly.degree();
    if m == 0 {
        return Err(AnalysisError::InvalidParameter(
            "a constant polynomial has no roots".to_string(),
        ));
    }

    let mf = m as f64;
    let mut x = guess;

    for iter in 1..=MAXIT {
        let Horner {
            value: b,
            first: d,
            half_second: f,
            rounding_bound,
        } = poly.horner(x);
        let abx = x.norm();

        // p(x) is zero to within rounding
        if b.norm() <= EPSS * rounding_bound {
            return Ok(x);
        }

        let g = d / b;
        let g2 = g * g;
        let h = g2 - f * 2.0 / b;
        let sq = ((h * mf - g2) * (mf - 1.0)).sqrt();
        let gp = g + sq;
        let gm = g - sq;
        let abp = gp.norm();
        let abm = gm.norm();
        let denominator = if abp < abm { gm } else { gp };

        let dx = if abp.max(abm) > 0.0 {
            Complex64::new(mf, 0.0) / denominator
        } else {
            Complex64::from_polar(1.0 + abx, iter as f64)
        };

        let x1 = x - dx;
        if x == x1 || dx.norm() <= EPS * x.norm() {
            return Ok(x1);
        }

        x = if iter % MT != 0 {
            x1
        } else {
            x - dx * FRAC[iter / MT]
        };
    }

    Err(AnalysisError::RootFindingFailed {
        degree: m,
        iterations: MAXIT,
    })
}

/// Roots of a real polynomial as eigenvalues of its companion matrix
///
/// Coefficients are in ascending powers.
pub fn companion_roots(coefficients: &[f64]) -> Result<Vec<Complex64>> {
    let mut coefficients = coefficients;
    while let Some((&last, rest)) = coefficients.split_last() {
        if last != 0.0 {
            break;
        }
        coefficients = rest;
    }

    let n = coefficients.len().saturating_sub(1);
    if n == 0 {
        return Ok(Vec::new());
    }

    let leading = coefficients[n];
    let normalized: Vec<f64> = coefficients.iter().map(|&c| c / leading).collect();

    if n == 1 {
        return Ok(vec![Complex64::new(-normalized[0], 0.0)]);
    }

    // [ 0  0 ... 0  -c0     ]
    // [ 1  0 ... 0  -c1     ]
    // [ 0  1 ... 0  -c2     ]
    // [ 0  0 ... 1  -c(n-1) ]
    let mut companion = DMatrix::<f64>::zeros(n, n);
    for i in 1..n {
        companion[(i, i - 1)] = 1.0;
    }
    for i in 0..n {
        companion[(i, n - 1)] = -normalized[i];
    }

    let eigenvalues = companion.complex_eigenvalues();
    let roots: Vec<Complex64> = eigenvalues
        .iter()
        .map(|c| Complex64::new(c.re, c.im))
        .collect();

    if roots.iter().any(|r| !r.re.is_finite() || !r.im.is_finite()) {
        return Err(AnalysisError::Analysis(
            "companion matrix eigenvalues did not converge".to_string(),
        ));
    }
    Ok(roots)
}

/// Algorithm used to find the poles of the LPC filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootMethod {
    /// Laguerre's method with deflation
    #[default]
    Laguerre,
    /// Eigenvalues of the companion matrix (real polynomials only)
    CompanionMatrix,
}

/// Finds all roots of a polynomial
#[derive(Debug, Clone, Copy, Default)]
pub struct RootFinder {
    method: RootMethod,
    polish: bool,
}

impl RootFinder {
    /// Laguerre's method without polishing
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the root-finding algorithm
    pub fn with_method(mut self, method: RootMethod) -> Self {
        self.method = method;
        self
    }

    /// Re-run Laguerre on the undeflated polynomial, seeded with each deflated root
    ///
    /// Deflation accumulates rounding error in later roots; polishing removes
    /// most of it at the cost of one extra Laguerre search per root.
    pub fn with_polish(mut self, polish: bool) -> Self {
        self.polish = polish;
        self
    }

    /// Find all `poly.degree()` roots
    pub fn find_roots(&self, poly: &ComplexPolynomial) -> Result<Vec<Complex64>> {
        self.find_roots_cancellable(poly, &AtomicBool::new(false))
    }

    /// Find all roots, checking `cancel` before each root extraction
    ///
    /// # Errors
    /// * `Cancelled` once `cancel` is set
    /// * `RootFindingFailed` if any root does not converge; the remaining roots
    ///   are not attempted since every later deflation depends on it
    pub fn find_roots_cancellable(
        &self,
        poly: &ComplexPolynomial,
        cancel: &AtomicBool,
    ) -> Result<Vec<Complex64>> {
        let mut roots = match self.method {
            RootMethod::Laguerre => deflation_roots(poly, cancel)?,
            RootMethod::CompanionMatrix => {
                if !poly.is_real() {
                    return Err(AnalysisError::InvalidParameter(
                        "companion matrix method needs real coefficients".to_string(),
                    ));
                }
                if cancel.load(Ordering::Relaxed) {
                    return Err(AnalysisError::Cancelled);
                }
                let real: Vec<f64> = poly.coefficients().iter().map(|c| c.re).collect();
                companion_roots(&real)?
            }
        };

        if self.polish {
            for root in roots.iter_mut() {
                if cancel.load(Ordering::Relaxed) {
                    return Err(AnalysisError::Cancelled);
                }
                *root = laguerre(poly, *root)?;
            }
        }

        Ok(roots)
    }
}

/// Laguerre + deflation down to degree 0
fn deflation_roots(poly: &ComplexPolynomial, cancel: &AtomicBool) -> Result<Vec<Complex64>> {
    let mut roots = Vec::with_capacity(poly.degree());
    let mut deflated = poly.clone();

    while deflated.degree() > 0 {
        if cancel.load(Ordering::Relaxed) {
            return Err(AnalysisError::Cancelled);
        }

        let mut root = laguerre(&deflated, Complex64::new(0.0, 0.0)).map_err(|e| {
            warn!(
                degree = deflated.degree(),
                found = roots.len(),
                "Laguerre iteration failed: {}",
                e
            );
            e
        })?;
        if root.im.abs() < EPS * root.re.abs() {
            root.im = 0.0;
        }
        roots.push(root);

        let (quotient, _) = deflated.deflate(root);
        deflated = quotient;
    }

    Ok(roots)
}
