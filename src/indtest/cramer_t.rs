use super::{log_fact, IndependenceTest, TestResult};
use crate::config::TestConfig;
use crate::covariance::{CorrelationMatrix, CovarianceMatrix};
use crate::data::DataSet;
use crate::distribution::PartialCorrelationPdf;
use crate::error::Result;
use crate::linalg;
use crate::variable::Variable;
use std::collections::HashMap;

/// Tests for zero partial correlation by comparing `|r|` directly against a critical value taken
/// from the exact null density of a sample partial correlation.
///
/// The density depends on the sample size and on `k`, the number of variables in the partial
/// correlation (2 plus the size of the conditioning set), so critical values are cached per `k`.
/// Changing alpha clears the cache.
///
/// Unlike [`IndTestFisherZ`](super::IndTestFisherZ), there's no fallback for singular
/// correlation submatrices: a query over linearly dependent variables fails with
/// [`Error::Singular`](crate::Error::Singular).
#[derive(Clone, Debug)]
pub struct IndTestCramerT {
    correlation: CorrelationMatrix,
    config: TestConfig,
    cutoffs: HashMap<usize, f64>,
    last: Option<TestResult>,
}

impl IndTestCramerT {
    /// Builds a test over the sample correlations of a continuous data set.
    pub fn new(data: &DataSet, config: TestConfig) -> Result<Self> {
        Ok(IndTestCramerT::from_covariance(
            &CovarianceMatrix::from_data(data)?,
            config,
        ))
    }

    /// Builds a test over a covariance matrix, normalizing it to correlations.
    pub fn from_covariance(covariance: &CovarianceMatrix, config: TestConfig) -> Self {
        IndTestCramerT::from_correlation(covariance.to_correlation(), config)
    }

    /// Builds a test over a correlation matrix.
    pub fn from_correlation(correlation: CorrelationMatrix, config: TestConfig) -> Self {
        IndTestCramerT {
            correlation,
            config,
            cutoffs: HashMap::new(),
            last: None,
        }
    }

    fn density(&self, k: usize) -> Result<PartialCorrelationPdf> {
        PartialCorrelationPdf::new(self.correlation.sample_size().saturating_sub(1), k)
    }

    /// The critical value for `|r|` when the partial correlation involves `k` variables.
    ///
    /// ```
    /// use indtest::{CovarianceMatrix, IndTestCramerT, TestConfig, Variable};
    /// use nalgebra::DMatrix;
    ///
    /// let vars = vec![Variable::continuous("a"), Variable::continuous("b")];
    /// let cov = CovarianceMatrix::new(vars, DMatrix::identity(2, 2), 100).unwrap();
    /// let mut test = IndTestCramerT::from_covariance(&cov, TestConfig::new(0.05).unwrap());
    ///
    /// // Close to the large-sample approximation 1.96 / sqrt(n).
    /// let cutoff = test.cutoff(2).unwrap();
    /// assert!((cutoff - 0.197).abs() < 0.01);
    /// ```
    pub fn cutoff(&mut self, k: usize) -> Result<f64> {
        if let Some(&cutoff) = self.cutoffs.get(&k) {
            return Ok(cutoff);
        }
        let cutoff = self.density(k)?.cutoff(self.config.alpha())?;
        self.cutoffs.insert(k, cutoff);
        Ok(cutoff)
    }

    fn evaluate(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        let (xi, yi, zi) = self.correlation.variable_index().resolve(x, y, z)?;
        let sub = self.correlation.submatrix(&zi.with_pair(xi, yi));

        // Singular submatrices are the caller's problem here.
        let r = linalg::partial_correlation(&sub)?;

        let k = zi.len() + 2;
        let cutoff = self.cutoff(k)?;
        let p_value = self.density(k)?.two_tailed_p(r);
        Ok(TestResult::new(r.abs() <= cutoff, r, p_value))
    }
}

impl IndependenceTest for IndTestCramerT {
    fn check(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        let result = self.evaluate(x, y, z)?;
        log_fact(&self.config, "Cramer T", x, y, z, &result);
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
        self.cutoffs.clear();
        Ok(())
    }

    fn variables(&self) -> &[Variable] {
        self.correlation.variables()
    }

    fn subset(&self, variables: &[Variable]) -> Result<Box<dyn IndependenceTest>> {
        let indices = self.correlation.variable_index().indices_of(variables)?;
        Ok(Box::new(IndTestCramerT::from_correlation(
            self.correlation.filter(&indices)?,
            self.config,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use nalgebra::DMatrix;

    fn vars(names: &[&str]) -> Vec<Variable> {
        names.iter().map(|n| Variable::continuous(*n)).collect()
    }

    #[test]
    fn cutoff_shrinks_as_alpha_grows() {
        let cov = CovarianceMatrix::new(vars(&["a", "b"]), DMatrix::identity(2, 2), 60).unwrap();
        let mut test = IndTestCramerT::from_covariance(&cov, TestConfig::new(0.01).unwrap());
        let mut previous = test.cutoff(3).unwrap();
        for &alpha in &[0.02, 0.05, 0.1, 0.2, 0.5] {
            test.set_alpha(alpha).unwrap();
            let cutoff = test.cutoff(3).unwrap();
            assert!(cutoff < previous, "cutoff({}) = {} >= {}", alpha, cutoff, previous);
            previous = cutoff;
        }
    }

    #[test]
    fn singular_submatrix_is_an_error() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let v = vars(&["a", "b"]);
        let cov = CovarianceMatrix::new(v.clone(), m, 60).unwrap();
        let mut test = IndTestCramerT::from_covariance(&cov, TestConfig::default());
        assert_eq!(test.check(&v[0], &v[1], &[]), Err(Error::Singular));
    }

    #[test]
    fn p_value_and_verdict_agree() {
        let v = vars(&["a", "b", "c"]);
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 0.3, 0.1, 0.3, 1.0, 0.2, 0.1, 0.2, 1.0]);
        let cov = CovarianceMatrix::new(v.clone(), m, 40).unwrap();
        let mut test = IndTestCramerT::from_covariance(&cov, TestConfig::default());
        for (x, y) in &[(0, 1), (0, 2), (1, 2)] {
            let result = test.check(&v[*x], &v[*y], &[]).unwrap();
            assert_eq!(result.is_independent(), result.p_value() >= test.alpha());
        }
    }
}
