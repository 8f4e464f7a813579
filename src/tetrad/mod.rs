//! Tests of vanishing tetrad differences.
//!
//! For four variables `a`, `b`, `c`, `d`, the tetrad difference `σ_ab·σ_cd - σ_ac·σ_bd` is
//! zero in the population whenever a single latent variable separates the pairs, so clustering
//! searches use these tests to find groups of indicators that share a latent parent.

use crate::config::TestConfig;
use crate::covariance::CovarianceMatrix;
use crate::data::DataSet;
use crate::distribution::normal_two_tailed_p;
use crate::error::{Error, Result};
use crate::linalg;
use crate::variable::Variable;
use log::log;
use std::fmt;

mod factor;
mod moments;

pub use factor::{FactorModel, FactorModelFitter};
pub use moments::FourthMoments;

/// How the sampling variance of a tetrad difference is estimated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TetradTestKind {
    /// Wishart's closed form, which assumes multivariate normal data and needs only the
    /// covariance matrix.
    Wishart,
    /// Bollen's distribution-free asymptotic variance, computed from fourth moments of the raw
    /// data.
    Bollen,
}

/// Tests tetrad constraints among continuous variables.
///
/// ```
/// use indtest::tetrad::{ContinuousTetradTest, TetradTestKind};
/// use indtest::{CovarianceMatrix, TestConfig, Variable};
/// use nalgebra::DMatrix;
///
/// // Two tight pairs, {a, b} and {c, d}, weakly linked to each other.
/// let v: Vec<Variable> = ["a", "b", "c", "d"].iter().map(|n| Variable::continuous(*n)).collect();
/// let cov = DMatrix::from_row_slice(4, 4, &[
///     1.0, 0.8, 0.3, 0.3,
///     0.8, 1.0, 0.3, 0.3,
///     0.3, 0.3, 1.0, 0.8,
///     0.3, 0.3, 0.8, 1.0,
/// ]);
/// let cov = CovarianceMatrix::new(v.clone(), cov, 1000).unwrap();
/// let test =
///     ContinuousTetradTest::from_covariance(cov, TetradTestKind::Wishart, TestConfig::default())
///         .unwrap();
///
/// assert!(!test.tetrad_holds(&v[0], &v[1], &v[2], &v[3]).unwrap());
/// assert!(test.tetrad_holds(&v[0], &v[2], &v[3], &v[1]).unwrap());
/// assert_eq!(test.tetrad_score(&v[0], &v[1], &v[2], &v[3]).unwrap(), 1);
/// ```
pub struct ContinuousTetradTest {
    covariance: CovarianceMatrix,
    kind: TetradTestKind,
    config: TestConfig,
    moments: Option<FourthMoments>,
    fitter: Option<Box<dyn FactorModelFitter>>,
}

impl ContinuousTetradTest {
    /// Builds a test over raw data. For [`TetradTestKind::Bollen`] this computes every fourth
    /// moment of the data up front.
    pub fn from_data(data: &DataSet, kind: TetradTestKind, config: TestConfig) -> Result<Self> {
        let covariance = CovarianceMatrix::from_data(data)?;
        let moments = match kind {
            TetradTestKind::Wishart => None,
            TetradTestKind::Bollen => Some(FourthMoments::new(data)?),
        };
        Ok(ContinuousTetradTest {
            covariance,
            kind,
            config,
            moments,
            fitter: None,
        })
    }

    /// Builds a test over a covariance matrix.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::RequiresRawData`] for [`TetradTestKind::Bollen`].
    pub fn from_covariance(
        covariance: CovarianceMatrix,
        kind: TetradTestKind,
        config: TestConfig,
    ) -> Result<Self> {
        if kind == TetradTestKind::Bollen {
            return Err(Error::RequiresRawData);
        }
        Ok(ContinuousTetradTest {
            covariance,
            kind,
            config,
            moments: None,
            fitter: None,
        })
    }

    /// Attaches the estimator used by [`ContinuousTetradTest::one_factor_test`] and
    /// [`ContinuousTetradTest::two_factor_test`].
    pub fn with_fitter(mut self, fitter: Box<dyn FactorModelFitter>) -> Self {
        self.fitter = Some(fitter);
        self
    }

    /// Which variance estimate this test uses.
    pub fn kind(&self) -> TetradTestKind {
        self.kind
    }

    /// The significance level.
    pub fn alpha(&self) -> f64 {
        self.config.alpha()
    }

    /// Changes the significance level.
    pub fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        self.config.set_alpha(alpha)
    }

    /// The variables this test can be asked about.
    pub fn variables(&self) -> &[Variable] {
        self.covariance.variables()
    }

    /// The number of samples behind the covariance matrix.
    pub fn sample_size(&self) -> usize {
        self.covariance.sample_size()
    }

    /// The two-tailed p-value of the hypothesis `σ_ij·σ_kl - σ_ik·σ_jl = 0`.
    ///
    /// # Errors
    ///
    /// Fails if a variable is unknown, or with [`Error::NonFiniteStatistic`] when the estimated
    /// variance of a non-zero tetrad difference isn't a positive finite number. That happens
    /// with a singular Wishart determinant or too few samples.
    pub fn tetrad_p_value(
        &self,
        i: &Variable,
        j: &Variable,
        k: &Variable,
        l: &Variable,
    ) -> Result<f64> {
        let index = [
            self.covariance.index_of(i)?,
            self.covariance.index_of(j)?,
            self.covariance.index_of(k)?,
            self.covariance.index_of(l)?,
        ];
        let p = self.p_value_at(index)?;

        let level = self.config.log_level();
        log!(
            level,
            "tetrad {} {} {} {}: p = {}",
            i,
            j,
            k,
            l,
            self.config.format_p_value(p)
        );
        Ok(p)
    }

    fn p_value_at(&self, [i, j, k, l]: [usize; 4]) -> Result<f64> {
        let s = |a, b| self.covariance.value(a, b);
        let tau = s(i, j) * s(k, l) - s(i, k) * s(j, l);
        let variance = match &self.moments {
            None => self.wishart_variance([i, j, k, l]),
            Some(moments) => self.bollen_variance(moments, [i, j, k, l]),
        };

        if !(variance.is_finite() && variance > 0.0) {
            if tau == 0.0 {
                return Ok(1.0);
            }
            return Err(Error::NonFiniteStatistic);
        }
        Ok(normal_two_tailed_p(tau / variance.sqrt()))
    }

    fn wishart_variance(&self, [i, j, k, l]: [usize; 4]) -> f64 {
        let n = self.sample_size() as f64;
        let det2 = |a, b| {
            let s = &self.covariance;
            s.value(a, a) * s.value(b, b) - s.value(a, b) * s.value(a, b)
        };
        let det4 = linalg::determinant(&self.covariance.submatrix(&[i, j, k, l]));
        (det2(i, l) * det2(j, k) * (n + 1.0) / (n - 1.0) - det4) / (n - 2.0)
    }

    fn bollen_variance(&self, moments: &FourthMoments, [i, j, k, l]: [usize; 4]) -> f64 {
        let s = |a, b| self.covariance.value(a, b);
        let pairs = [(i, j), (k, l), (i, k), (j, l)];
        let gradient = [s(k, l), s(i, j), -s(j, l), -s(i, k)];

        let mut variance = 0.0;
        for (&(a, b), &ga) in pairs.iter().zip(gradient.iter()) {
            for (&(c, d), &gb) in pairs.iter().zip(gradient.iter()) {
                variance += ga * gb * (moments.get(a, b, c, d) - s(a, b) * s(c, d));
            }
        }
        variance / self.sample_size() as f64
    }

    /// Returns `true` if `σ_ij·σ_kl = σ_ik·σ_jl` can't be rejected at the significance level.
    pub fn tetrad_holds(
        &self,
        i: &Variable,
        j: &Variable,
        k: &Variable,
        l: &Variable,
    ) -> Result<bool> {
        Ok(self.tetrad_p_value(i, j, k, l)? > self.alpha())
    }

    /// Counts how many of the three tetrad constraints among four variables hold: 0, 1, or 3.
    ///
    /// The three p-values are sorted in ascending order and the `r`th smallest is compared with
    /// `r · alpha / 3`. The largest `r` that passes is the number of constraints rejected, and
    /// the rest hold. Exactly two constraints holding without the third can't happen under a
    /// single-factor model, so that outcome is reported as 1.
    pub fn tetrad_score(
        &self,
        i: &Variable,
        j: &Variable,
        k: &Variable,
        l: &Variable,
    ) -> Result<u8> {
        let mut p = [
            self.tetrad_p_value(i, j, k, l)?,
            self.tetrad_p_value(i, j, l, k)?,
            self.tetrad_p_value(i, k, l, j)?,
        ];
        p.sort_by(|a, b| a.total_cmp(b));

        let step = self.alpha() / 3.0;
        let rejected = (1..=3)
            .rev()
            .find(|&r| p[r - 1] <= r as f64 * step)
            .unwrap_or(0);
        Ok(match 3 - rejected {
            2 => 1,
            holds => holds as u8,
        })
    }

    /// Returns `true` if exactly one tetrad constraint holds among the four variables.
    pub fn tetrad_score1(
        &self,
        i: &Variable,
        j: &Variable,
        k: &Variable,
        l: &Variable,
    ) -> Result<bool> {
        Ok(self.tetrad_score(i, j, k, l)? == 1)
    }

    /// Returns `true` if all three tetrad constraints hold among the four variables.
    pub fn tetrad_score3(
        &self,
        i: &Variable,
        j: &Variable,
        k: &Variable,
        l: &Variable,
    ) -> Result<bool> {
        Ok(self.tetrad_score(i, j, k, l)? == 3)
    }

    /// Fits a single latent factor over 4 to 6 variables and accepts it if the fit's p-value
    /// exceeds alpha.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Unsupported`] if no fitter is attached, and with
    /// [`Error::IndicatorCount`] for the wrong number of variables.
    pub fn one_factor_test(&self, indicators: &[Variable]) -> Result<bool> {
        self.factor_test(&FactorModel::one_factor(indicators)?)
    }

    /// Fits two correlated latent factors, one per group, and accepts the model if the fit's
    /// p-value exceeds alpha.
    pub fn two_factor_test(&self, first: &[Variable], second: &[Variable]) -> Result<bool> {
        self.factor_test(&FactorModel::two_factor(first, second)?)
    }

    fn factor_test(&self, model: &FactorModel) -> Result<bool> {
        let fitter = self
            .fitter
            .as_ref()
            .ok_or(Error::Unsupported("factor model tests without a fitter"))?;
        let covariance = self.covariance.filter_variables(&model.indicators())?;
        let p = fitter.fit(&covariance, model)?;
        log!(
            self.config.log_level(),
            "{}-factor model over {} indicators: p = {}",
            model.num_latents(),
            covariance.dimension(),
            self.config.format_p_value(p)
        );
        Ok(p > self.alpha())
    }
}

impl fmt::Debug for ContinuousTetradTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuousTetradTest")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("variables", &self.covariance.variables())
            .field("sample_size", &self.sample_size())
            .field("has_fitter", &self.fitter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::DMatrix;

    fn vars() -> Vec<Variable> {
        ["a", "b", "c", "d"]
            .iter()
            .map(|n| Variable::continuous(*n))
            .collect()
    }

    fn one_factor_cov(n: usize) -> CovarianceMatrix {
        // Loadings 0.9, 0.8, 0.7, 0.6 on one unit-variance factor: every tetrad vanishes.
        let l = [0.9, 0.8, 0.7, 0.6];
        let m = DMatrix::from_fn(4, 4, |i, j| if i == j { 1.0 } else { l[i] * l[j] });
        CovarianceMatrix::new(vars(), m, n).unwrap()
    }

    #[test]
    fn single_factor_scores_three() {
        let v = vars();
        let test = ContinuousTetradTest::from_covariance(
            one_factor_cov(500),
            TetradTestKind::Wishart,
            TestConfig::default(),
        )
        .unwrap();
        assert!(test.tetrad_score3(&v[0], &v[1], &v[2], &v[3]).unwrap());
        assert!(!test.tetrad_score1(&v[0], &v[1], &v[2], &v[3]).unwrap());
    }

    #[test]
    fn bollen_needs_raw_data() {
        assert_eq!(
            ContinuousTetradTest::from_covariance(
                one_factor_cov(100),
                TetradTestKind::Bollen,
                TestConfig::default()
            )
            .err(),
            Some(Error::RequiresRawData)
        );
    }

    #[test]
    fn wishart_variance_closed_form() {
        let test = ContinuousTetradTest::from_covariance(
            one_factor_cov(101),
            TetradTestKind::Wishart,
            TestConfig::default(),
        )
        .unwrap();
        let s = test.covariance.matrix().clone();
        let det4 = s.determinant();
        let d14 = s[(0, 0)] * s[(3, 3)] - s[(0, 3)].powi(2);
        let d23 = s[(1, 1)] * s[(2, 2)] - s[(1, 2)].powi(2);
        let expected = (d14 * d23 * 102.0 / 100.0 - det4) / 99.0;
        assert_abs_diff_eq!(test.wishart_variance([0, 1, 2, 3]), expected, epsilon = 1e-15);
        assert!(expected > 0.0);
    }

    #[test]
    fn degenerate_variance() {
        let v = vars();
        let m = DMatrix::from_row_slice(
            4,
            4,
            &[
                1.0, 0.5, 0.1, 0.1, 0.5, 1.0, 0.1, 0.1, 0.1, 0.1, 1.0, 0.5, 0.1, 0.1, 0.5, 1.0,
            ],
        );
        // Two samples leave no degrees of freedom for the Wishart variance.
        let test = ContinuousTetradTest::from_covariance(
            CovarianceMatrix::new(vars(), m, 2).unwrap(),
            TetradTestKind::Wishart,
            TestConfig::default(),
        )
        .unwrap();
        assert_eq!(
            test.tetrad_p_value(&v[0], &v[1], &v[2], &v[3]),
            Err(Error::NonFiniteStatistic)
        );
        // σ_ac·σ_db - σ_ad·σ_cb is exactly 0.1·0.1 - 0.1·0.1.
        assert_eq!(test.tetrad_p_value(&v[0], &v[2], &v[3], &v[1]), Ok(1.0));
        assert_eq!(test.kind(), TetradTestKind::Wishart);
    }

    #[test]
    fn factor_tests_use_the_fitter() {
        let v = vars();
        let test = ContinuousTetradTest::from_covariance(
            one_factor_cov(200),
            TetradTestKind::Wishart,
            TestConfig::default(),
        )
        .unwrap();
        assert_eq!(
            test.one_factor_test(&v),
            Err(Error::Unsupported("factor model tests without a fitter"))
        );

        let fitter = |cov: &CovarianceMatrix, model: &FactorModel| -> Result<f64> {
            assert_eq!(cov.dimension(), model.indicators().len());
            Ok(match model {
                FactorModel::OneFactor { .. } => 0.6,
                FactorModel::TwoFactor { .. } => 0.01,
            })
        };
        let test = test.with_fitter(Box::new(fitter));
        assert!(test.one_factor_test(&v).unwrap());
        assert!(!test.two_factor_test(&v[..2], &v[2..]).unwrap());
        assert_eq!(test.one_factor_test(&v[..3]), Err(Error::IndicatorCount(3)));
    }
}
