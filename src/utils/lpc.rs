//! Linear Predictive Coding (LPC) utilities
//!
//! The vowel segment is modelled as the output of an all-pole filter
//! `1 / A(z)` with `A(z) = 1 - a[1]*z^-1 - ... - a[p]*z^-p`. The default
//! estimator is the autocorrelation method with Levinson-Durbin recursion,
//! which always yields a stable filter. Burg's method is available as an
//! alternative and uses the same coefficient convention.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::utils::roots::ComplexPolynomial;
use crate::{AnalysisError, Result};

/// LPC estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LpcMethod {
    /// Autocorrelation of the whole segment + Levinson-Durbin recursion
    #[default]
    Autocorrelation,
    /// Burg's maximum entropy method
    Burg,
}

/// Prediction coefficients of one analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct LpcCoefficients {
    /// a[1..p] in `x[n] ~ a[1]*x[n-1] + ... + a[p]*x[n-p]`
    coefficients: Vec<f64>,
    /// Prediction error power left after the final order
    prediction_error: f64,
}

impl LpcCoefficients {
    /// Wrap prediction coefficients `a[1..p]`
    pub fn new(coefficients: Vec<f64>, prediction_error: f64) -> Self {
        Self {
            coefficients,
            prediction_error,
        }
    }

    /// Model order p
    pub fn order(&self) -> usize {
        self.coefficients.len()
    }

    /// Prediction coefficients a[1..p]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Residual prediction error
    pub fn prediction_error(&self) -> f64 {
        self.prediction_error
    }

    /// Inverse filter taps `[1, -a[1], ..., -a[p]]`, the coefficients of `A(z)` in powers of `z^-1`
    pub fn inverse_filter(&self) -> Vec<f64> {
        std::iter::once(1.0)
            .chain(self.coefficients.iter().map(|&a| -a))
            .collect()
    }

    /// `z^p * A(z)` as a polynomial in `z` (ascending powers)
    ///
    /// Its roots are the poles of the synthesis filter `1 / A(z)`.
    pub fn characteristic_polynomial(&self) -> ComplexPolynomial {
        let p = self.coefficients.len();
        let mut poly = vec![Complex64::new(0.0, 0.0); p + 1];
        for (i, &a) in self.coefficients.iter().enumerate() {
            // a[i+1] multiplies z^(p-i-1)
            poly[p - i - 1] = Complex64::new(-a, 0.0);
        }
        poly[p] = Complex64::new(1.0, 0.0);
        ComplexPolynomial::new(poly)
    }
}

/// Estimate LPC coefficients of the given order
///
/// # Errors
/// `InsufficientSamples` if the segment is not longer than `order` or has no energy.
pub fn estimate(samples: &[f64], order: usize, method: LpcMethod) -> Result<LpcCoefficients> {
    match method {
        LpcMethod::Autocorrelation => lpc_autocorrelation(samples, order),
        LpcMethod::Burg => lpc_burg(samples, order),
    }
}

/// Autocorrelation `r[0..=max_lag]` without normalization
pub fn autocorrelation(samples: &[f64], max_lag: usize) -> Vec<f64> {
    (0..=max_lag)
        .map(|lag| {
            if lag >= samples.len() {
                return 0.0;
            }
            samples[..samples.len() - lag]
                .iter()
                .zip(&samples[lag..])
                .map(|(x, y)| x * y)
                .sum()
        })
        .collect()
}

fn check_length(samples: &[f64], order: usize) -> Result<()> {
    if samples.len() <= order {
        return Err(AnalysisError::InsufficientSamples {
            needed: order,
            available: samples.len(),
        });
    }
    Ok(())
}

/// Compute LPC coefficients with the autocorrelation method
///
/// Levinson-Durbin recursion on the autocorrelation of the whole (unwindowed)
/// segment. A segment that becomes perfectly predictable before reaching
/// `order` keeps zeros for the remaining coefficients.
pub fn lpc_autocorrelation(samples: &[f64], order: usize) -> Result<LpcCoefficients> {
    check_length(samples, order)?;

    let r = autocorrelation(samples, order);
    let mut error = r[0];
    if error <= 0.0 {
        return Err(AnalysisError::InsufficientSamples {
            needed: order,
            available: 0,
        });
    }

    let mut a = vec![0.0; order];
    let mut previous = vec![0.0; order];

    for i in 0..order {
        // Reflection coefficient for order i+1
        let mut acc = r[i + 1];
        for j in 0..i {
            acc -= previous[j] * r[i - j];
        }
        let k = acc / error;

        a[i] = k;
        for j in 0..i {
            a[j] = previous[j] - k * previous[i - j - 1];
        }

        error *= 1.0 - k * k;
        previous[..=i].copy_from_slice(&a[..=i]);

        if error <= 0.0 {
            error = 0.0;
            break;
        }
    }

    Ok(LpcCoefficients::new(a, error / samples.len() as f64))
}

/// Compute LPC coefficients using Burg's method
///
/// Reflection coefficients are estimated from forward and backward
/// prediction errors, so no autocorrelation window is implied.
pub fn lpc_burg(samples: &[f64], order: usize) -> Result<LpcCoefficients> {
    check_length(samples, order)?;

    let n = samples.len();
    let m = order;
    let mut a = vec![0.0; m];

    let power: f64 = samples.iter().map(|x| x * x).sum();
    let mut xms = power / n as f64;
    if xms <= 0.0 {
        return Err(AnalysisError::InsufficientSamples {
            needed: order,
            available: 0,
        });
    }

    // Forward (b1) and backward (b2) prediction errors
    let mut b1 = vec![0.0; n];
    let mut b2 = vec![0.0; n];
    b1[0] = samples[0];
    b2[n - 2] = samples[n - 1];
    for j in 1..n - 1 {
        b1[j] = samples[j];
        b2[j - 1] = samples[j];
    }

    let mut aa = vec![0.0; m];

    for i in 0..m {
        let mut num = 0.0;
        let mut den = 0.0;
        for j in 0..n - i - 1 {
            num += b1[j] * b2[j];
            den += b1[j] * b1[j] + b2[j] * b2[j];
        }

        if den <= 0.0 {
            return Ok(LpcCoefficients::new(a, 0.0));
        }

        a[i] = 2.0 * num / den;
        xms *= 1.0 - a[i] * a[i];

        for j in 0..i {
            a[j] = aa[j] - a[i] * aa[i - j - 1];
        }

        if i < m - 1 {
            aa[..=i].copy_from_slice(&a[..=i]);
            for j in 0..n - i - 2 {
                b1[j] -= aa[i] * b2[j];
                b2[j] = b2[j + 1] - aa[i] * b1[j + 1];
            }
        }
    }

    Ok(LpcCoefficients::new(a, xms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// x[n] = 1.3 x[n-1] - 0.8 x[n-2] + e[n], e from a fixed LCG
    fn ar2_signal(n: usize) -> Vec<f64> {
        let mut state: u32 = 12345;
        let mut noise = || {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((state >> 16) & 0x7fff) as f64 / 16384.0 - 1.0
        };
        let mut x = vec![0.0; n];
        for i in 0..n {
            let x1 = if i >= 1 { x[i - 1] } else { 0.0 };
            let x2 = if i >= 2 { x[i - 2] } else { 0.0 };
            x[i] = 1.3 * x1 - 0.8 * x2 + noise();
        }
        x
    }

    #[test]
    fn test_autocorrelation_recovers_ar2() {
        let x = ar2_signal(8000);
        let lpc = lpc_autocorrelation(&x, 2).unwrap();
        assert_relative_eq!(lpc.coefficients()[0], 1.3, epsilon = 0.05);
        assert_relative_eq!(lpc.coefficients()[1], -0.8, epsilon = 0.05);
        assert!(lpc.prediction_error() > 0.0);
    }

    #[test]
    fn test_burg_recovers_ar2() {
        let x = ar2_signal(8000);
        let lpc = lpc_burg(&x, 2).unwrap();
        assert_relative_eq!(lpc.coefficients()[0], 1.3, epsilon = 0.05);
        assert_relative_eq!(lpc.coefficients()[1], -0.8, epsilon = 0.05);
    }

    #[test]
    fn test_order_20_shape() {
        let x = ar2_signal(2000);
        let lpc = estimate(&x, crate::ORDER, LpcMethod::Autocorrelation).unwrap();
        assert_eq!(lpc.order(), crate::ORDER);

        let taps = lpc.inverse_filter();
        assert_eq!(taps.len(), crate::ORDER + 1);
        assert_eq!(taps[0], 1.0);
        assert_eq!(taps[1], -lpc.coefficients()[0]);

        let poly = lpc.characteristic_polynomial();
        assert_eq!(poly.degree(), crate::ORDER);
        assert_eq!(poly.coefficients()[crate::ORDER], Complex64::new(1.0, 0.0));
        assert_eq!(poly.coefficients()[crate::ORDER - 1].re, -lpc.coefficients()[0]);
    }

    #[test]
    fn test_insufficient_samples() {
        let x = vec![1.0; 20];
        let err = lpc_autocorrelation(&x, 20).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientSamples {
                needed: 20,
                available: 20
            }
        ));
        assert!(lpc_burg(&x, 20).is_err());
    }

    #[test]
    fn test_silent_segment() {
        let x = vec![0.0; 200];
        assert!(matches!(
            estimate(&x, 20, LpcMethod::Autocorrelation),
            Err(AnalysisError::InsufficientSamples { .. })
        ));
        assert!(matches!(
            estimate(&x, 20, LpcMethod::Burg),
            Err(AnalysisError::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn test_autocorrelation_values() {
        let r = autocorrelation(&[1.0, 2.0, 3.0], 3);
        assert_eq!(r, vec![14.0, 8.0, 3.0, 0.0]);
    }
}
