//! Distribution functions used to turn statistics into p-values and significance levels into
//! critical values.

use crate::error::{Error, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use statrs::function::gamma::ln_gamma;

/// Standard normal cumulative distribution function.
pub fn normal_cdf(x: f64) -> f64 {
    standard_normal().cdf(x)
}

fn standard_normal() -> Normal {
    // The standard normal's parameters are always valid.
    Normal::new(0.0, 1.0).unwrap()
}

/// The two-tailed p-value of a standard normal statistic, `2 (1 - Φ(|z|))`.
///
/// ```
/// use indtest::distribution::normal_two_tailed_p;
///
/// assert_eq!(normal_two_tailed_p(0.0), 1.0);
/// assert!((normal_two_tailed_p(1.959963984540054) - 0.05).abs() < 1e-9);
/// ```
pub fn normal_two_tailed_p(z: f64) -> f64 {
    2.0 * (1.0 - normal_cdf(z.abs()))
}

/// The critical value `c` such that a standard normal falls outside `[-c, c]` with probability
/// `alpha`.
///
/// An `alpha` of 0 gives an infinite cutoff, so nothing is ever rejected; an `alpha` of 1 gives
/// a cutoff of 0.
pub fn normal_two_tailed_cutoff(alpha: f64) -> Result<f64> {
    check_alpha(alpha)?;
    if alpha == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(standard_normal().inverse_cdf(1.0 - alpha / 2.0))
}

/// Chi-squared cumulative distribution function with `df` degrees of freedom.
pub fn chi_square_cdf(x: f64, df: f64) -> Result<f64> {
    Ok(ChiSquared::new(df)?.cdf(x))
}

/// Rejects significance levels which aren't probabilities.
pub fn check_alpha(alpha: f64) -> Result<()> {
    if (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(Error::AlphaOutOfRange(alpha))
    }
}

/// The null density of a sample partial correlation coefficient.
///
/// With `n` samples and `k` variables in the partial correlation (the two being correlated plus
/// everything conditioned on), the density on `[-1, 1]` is
///
/// ```text
/// Γ((n-k+1)/2) / (√π Γ((n-k)/2)) · (1 - x²)^((n-k-2)/2)
/// ```
///
/// which integrates to exactly 1 for every `n - k ≥ 2`.
#[derive(Clone, Copy, Debug)]
pub struct PartialCorrelationPdf {
    n: usize,
    k: usize,
    ln_outside_term: f64,
    exponent: f64,
}

impl PartialCorrelationPdf {
    /// Creates the density for `n` samples and `k` variables.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InsufficientSampleSize`] unless `n - k ≥ 2`; below that the density is
    /// either undefined or unbounded at the endpoints.
    pub fn new(n: usize, k: usize) -> Result<Self> {
        if n < k + 2 {
            return Err(Error::InsufficientSampleSize {
                sample_size: n,
                conditioning: k.saturating_sub(2),
            });
        }
        let m = (n - k) as f64;
        Ok(PartialCorrelationPdf {
            n,
            k,
            ln_outside_term: ln_gamma((m + 1.0) / 2.0)
                - 0.5 * std::f64::consts::PI.ln()
                - ln_gamma(m / 2.0),
            exponent: (m - 2.0) / 2.0,
        })
    }

    /// The sample-size parameter.
    pub fn n(&self) -> usize {
        self.n
    }

    /// The number-of-variables parameter.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Evaluates the density. Outside `[-1, 1]` it's 0.
    pub fn value_at(&self, x: f64) -> f64 {
        if !(-1.0..=1.0).contains(&x) {
            return 0.0;
        }
        let base = 1.0 - x * x;
        if base == 0.0 {
            return if self.exponent == 0.0 {
                self.ln_outside_term.exp()
            } else {
                0.0
            };
        }
        (self.ln_outside_term + self.exponent * base.ln()).exp()
    }

    /// The probability mass above `x`, by numeric integration.
    pub fn upper_tail(&self, x: f64) -> f64 {
        let x = x.clamp(-1.0, 1.0);
        if x >= 1.0 {
            return 0.0;
        }
        if x < 0.0 {
            return 1.0 - self.upper_tail(-x);
        }
        integrate(|t| self.value_at(t), x, 1.0)
    }

    /// Two-tailed p-value for an observed partial correlation `r`.
    pub fn two_tailed_p(&self, r: f64) -> f64 {
        (2.0 * self.upper_tail(r.abs())).min(1.0)
    }

    /// The cutoff `c ∈ [0, 1]` such that the two tails beyond `±c` hold total mass `alpha`.
    ///
    /// The tail area falls monotonically from 1/2 at 0 to 0 at 1, so bisection always converges.
    pub fn cutoff(&self, alpha: f64) -> Result<f64> {
        check_alpha(alpha)?;
        let target = alpha / 2.0;
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        for _ in 0..100 {
            let mid = (lo + hi) / 2.0;
            if self.upper_tail(mid) > target {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < 1e-12 {
                break;
            }
        }
        Ok((lo + hi) / 2.0)
    }
}

/// Adaptive Simpson integration of `f` over `[a, b]`.
pub fn integrate<F: Fn(f64) -> f64>(f: F, a: f64, b: f64) -> f64 {
    fn simpson<F: Fn(f64) -> f64>(f: &F, a: f64, fa: f64, b: f64, fb: f64) -> (f64, f64, f64) {
        let m = (a + b) / 2.0;
        let fm = f(m);
        (m, fm, (b - a) / 6.0 * (fa + 4.0 * fm + fb))
    }

    #[allow(clippy::too_many_arguments)]
    fn recurse<F: Fn(f64) -> f64>(
        f: &F,
        a: f64,
        fa: f64,
        b: f64,
        fb: f64,
        m: f64,
        fm: f64,
        whole: f64,
        eps: f64,
        depth: u32,
    ) -> f64 {
        let (lm, flm, left) = simpson(f, a, fa, m, fm);
        let (rm, frm, right) = simpson(f, m, fm, b, fb);
        let delta = left + right - whole;
        if depth == 0 || delta.abs() <= 15.0 * eps {
            return left + right + delta / 15.0;
        }
        recurse(f, a, fa, m, fm, lm, flm, left, eps / 2.0, depth - 1)
            + recurse(f, m, fm, b, fb, rm, frm, right, eps / 2.0, depth - 1)
    }

    if a == b {
        return 0.0;
    }
    let fa = f(a);
    let fb = f(b);
    let (m, fm, whole) = simpson(&f, a, fa, b, fb);
    recurse(&f, a, fa, b, fb, m, fm, whole, 1e-12, 40)
}
