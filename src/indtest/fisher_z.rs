use super::{log_fact, IndTestDeterministic, IndependenceTest, TestResult};
use crate::config::TestConfig;
use crate::covariance::CovarianceMatrix;
use crate::data::DataSet;
use crate::distribution::{normal_two_tailed_cutoff, normal_two_tailed_p};
use crate::error::{Error, Result};
use crate::linalg;
use crate::variable::Variable;
use log::warn;
use std::sync::Arc;

/// Fisher's Z test for zero partial correlation, assuming the data are multivariate normal.
///
/// The partial correlation `r` of `x` and `y` given `z` is read off the inverse of the
/// covariance submatrix over `{x, y} ∪ z`, then transformed to
///
/// ```text
/// Z = sqrt(n - |z| - 3) · atanh(r)
/// ```
///
/// which is approximately standard normal when the true partial correlation is zero. The pair is
/// judged independent when `|Z|` is at most the two-tailed normal critical value for alpha.
///
/// When the submatrix is rank-deficient, meaning some variable in the query is a linear function
/// of the others, the inverse doesn't exist. This test then hands the query to
/// [`IndTestDeterministic`], which works with a generalized inverse. [`IndTestCramerT`] makes the
/// opposite choice and fails; callers rely on both behaviours.
///
/// [`IndTestCramerT`]: super::IndTestCramerT
///
/// ```
/// use indtest::{CovarianceMatrix, IndTestFisherZ, IndependenceTest, TestConfig, Variable};
/// use nalgebra::DMatrix;
///
/// // x -> y -> w, so x and w are correlated, but not once y is known.
/// let vars = vec![Variable::continuous("x"), Variable::continuous("y"), Variable::continuous("w")];
/// let cov = DMatrix::from_row_slice(3, 3, &[
///     1.0, 0.6, 0.36,
///     0.6, 1.0, 0.6,
///     0.36, 0.6, 1.0,
/// ]);
/// let cov = CovarianceMatrix::new(vars.clone(), cov, 500).unwrap();
/// let mut test = IndTestFisherZ::from_covariance(cov, TestConfig::new(0.05).unwrap());
///
/// assert!(test.is_dependent(&vars[0], &vars[2], &[]).unwrap());
/// assert!(test.is_independent(&vars[0], &vars[2], &vars[1..2]).unwrap());
/// assert!(test.p_value().unwrap() > 0.99);
/// ```
#[derive(Clone, Debug)]
pub struct IndTestFisherZ {
    covariance: Arc<CovarianceMatrix>,
    config: TestConfig,
    cutoff: Option<f64>,
    fallback: IndTestDeterministic,
    last: Option<TestResult>,
}

impl IndTestFisherZ {
    /// Builds a test over the sample covariance of a continuous data set.
    pub fn new(data: &DataSet, config: TestConfig) -> Result<Self> {
        Ok(IndTestFisherZ::from_covariance(
            CovarianceMatrix::from_data(data)?,
            config,
        ))
    }

    /// Builds a test over a covariance matrix.
    pub fn from_covariance(covariance: CovarianceMatrix, config: TestConfig) -> Self {
        IndTestFisherZ::from_shared(Arc::new(covariance), config)
    }

    /// Builds a test over a covariance matrix shared with other tests.
    pub fn from_shared(covariance: Arc<CovarianceMatrix>, config: TestConfig) -> Self {
        IndTestFisherZ {
            fallback: IndTestDeterministic::from_shared(covariance.clone(), config),
            covariance,
            config,
            cutoff: None,
            last: None,
        }
    }

    /// The covariance matrix the test reads from.
    pub fn covariance(&self) -> &CovarianceMatrix {
        &self.covariance
    }

    /// The sample size used for degrees of freedom.
    pub fn sample_size(&self) -> usize {
        self.covariance.sample_size()
    }

    /// The critical value for `|Z|`, computed once per alpha.
    pub fn cutoff(&mut self) -> Result<f64> {
        if let Some(cutoff) = self.cutoff {
            return Ok(cutoff);
        }
        let cutoff = normal_two_tailed_cutoff(self.config.alpha())?;
        self.cutoff = Some(cutoff);
        Ok(cutoff)
    }

    /// The Fisher Z statistic from the most recent query, which is `NaN` until something has
    /// been checked.
    pub fn statistic(&self) -> f64 {
        self.last.map_or(f64::NAN, |r| r.statistic())
    }

    fn evaluate(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        let (xi, yi, zi) = self.covariance.variable_index().resolve(x, y, z)?;
        let indices = zi.with_pair(xi, yi);
        let sub = self.covariance.submatrix(&indices);

        // A rank-deficient submatrix means determinism among the query's variables; hand it to
        // the generalized-inverse test rather than failing.
        let r = if linalg::is_full_rank(&sub)? {
            linalg::partial_correlation(&sub).ok()
        } else {
            None
        };
        let r = match r {
            Some(r) => r,
            None => {
                warn!(
                    "singular covariance for {} and {} given {} variables; \
                     testing with a generalized inverse",
                    x,
                    y,
                    zi.len()
                );
                return self.fallback.evaluate_submatrix(&sub, zi.len());
            }
        };

        let statistic = fisher_z(r, self.sample_size(), zi.len())?;
        let p_value = normal_two_tailed_p(statistic);
        let independent = statistic.abs() <= self.cutoff()?;
        Ok(TestResult::new(independent, statistic, p_value))
    }
}

/// Fisher's transformation of a partial correlation into an approximately standard normal
/// statistic.
///
/// `r` is clamped to `[-1, 1]` first so that rounding error can't produce a `NaN`; a perfect
/// correlation gives an infinite statistic.
///
/// # Errors
///
/// Fails with [`Error::InsufficientSampleSize`] unless `sample_size > conditioning + 3`.
pub(crate) fn fisher_z(r: f64, sample_size: usize, conditioning: usize) -> Result<f64> {
    let df = sample_size as f64 - conditioning as f64 - 3.0;
    if df <= 0.0 {
        return Err(Error::InsufficientSampleSize {
            sample_size,
            conditioning,
        });
    }
    let r = r.clamp(-1.0, 1.0);
    Ok(df.sqrt() * 0.5 * ((1.0 + r).ln() - (1.0 - r).ln()))
}

impl IndependenceTest for IndTestFisherZ {
    fn check(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        let result = self.evaluate(x, y, z)?;
        log_fact(&self.config, "Fisher Z", x, y, z, &result);
        self.last = Some(result);
        Ok(result)
    }

    fn p_value(&self) -> Result<f64> {
        Ok(self.last.map_or(f64::NAN, |r| r.p_value()))
    }

    fn alpha(&self) -> f64 {
        self.config.alpha()
    }

    fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        self.config.set_alpha(alpha)?;
        self.fallback.set_alpha(alpha)?;
        self.cutoff = None;
        Ok(())
    }

    fn variables(&self) -> &[Variable] {
        self.covariance.variables()
    }

    fn subset(&self, variables: &[Variable]) -> Result<Box<dyn IndependenceTest>> {
        let covariance = self.covariance.filter_variables(variables)?;
        Ok(Box::new(IndTestFisherZ::from_covariance(
            covariance,
            self.config,
        )))
    }

    fn determines(&self, z: &[Variable], x: &Variable) -> Result<bool> {
        self.fallback.determines(z, x)
    }
}
