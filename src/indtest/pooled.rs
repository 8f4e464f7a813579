use super::{log_fact, majority, IndependenceTest, TestResult};
use crate::config::TestConfig;
use crate::error::{Error, Result};
use crate::variable::Variable;

/// Combines several tests, typically over different data sets measuring the same variables, by
/// majority vote.
///
/// The pair is judged independent when strictly more than half of the constituent tests say so.
/// The result's statistic is the fraction that voted for independence. Votes don't have a joint
/// p-value, so [`IndependenceTest::p_value`] is unsupported, as is
/// [`IndependenceTest::subset`]. Changing alpha changes it in every constituent.
///
/// ```
/// use indtest::{CovarianceMatrix, IndTestFisherZ, IndTestPooled, IndependenceTest, TestConfig, Variable};
/// use nalgebra::DMatrix;
///
/// let vars = vec![Variable::continuous("a"), Variable::continuous("b")];
/// let test = |r: f64| -> Box<dyn IndependenceTest> {
///     let m = DMatrix::from_row_slice(2, 2, &[1.0, r, r, 1.0]);
///     let cov = CovarianceMatrix::new(vars.clone(), m, 200).unwrap();
///     Box::new(IndTestFisherZ::from_covariance(cov, TestConfig::default()))
/// };
///
/// let mut pooled = IndTestPooled::new(vec![test(0.0), test(0.01), test(0.5)]).unwrap();
/// let result = pooled.check(&vars[0], &vars[1], &[]).unwrap();
/// assert!(result.is_independent());
/// assert!((result.statistic() - 2.0 / 3.0).abs() < 1e-12);
/// ```
pub struct IndTestPooled {
    tests: Vec<Box<dyn IndependenceTest>>,
    config: TestConfig,
}

impl IndTestPooled {
    /// Pools the given tests. Their alphas are all reset to the first test's alpha, and the
    /// variables reported are the first test's.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoVoters`] if `tests` is empty.
    pub fn new(tests: Vec<Box<dyn IndependenceTest>>) -> Result<Self> {
        let alpha = match tests.first() {
            Some(first) => first.alpha(),
            None => return Err(Error::NoVoters),
        };
        let mut pooled = IndTestPooled {
            tests,
            config: TestConfig::new(alpha)?,
        };
        pooled.set_alpha(alpha)?;
        Ok(pooled)
    }

    /// Replaces the logging settings. Alpha is kept.
    pub fn with_config(mut self, config: TestConfig) -> Result<Self> {
        let alpha = self.config.alpha();
        self.config = config;
        self.config.set_alpha(alpha)?;
        Ok(self)
    }

    /// The pooled tests.
    pub fn tests(&self) -> &[Box<dyn IndependenceTest>] {
        &self.tests
    }
}

impl IndependenceTest for IndTestPooled {
    fn check(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        let mut votes = 0;
        for test in &mut self.tests {
            if test.is_independent(x, y, z)? {
                votes += 1;
            }
        }
        let result = majority(votes, self.tests.len());
        log_fact(&self.config, "Pooled", x, y, z, &result);
        Ok(result)
    }

    fn p_value(&self) -> Result<f64> {
        Err(Error::Unsupported("p_value"))
    }

    fn alpha(&self) -> f64 {
        self.config.alpha()
    }

    fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        self.config.set_alpha(alpha)?;
        for test in &mut self.tests {
            test.set_alpha(alpha)?;
        }
        Ok(())
    }

    fn variables(&self) -> &[Variable] {
        self.tests[0].variables()
    }

    fn subset(&self, _variables: &[Variable]) -> Result<Box<dyn IndependenceTest>> {
        Err(Error::Unsupported("subset"))
    }
}
