//! Conditional independence tests.
//!
//! Every test answers the same question: given variables `x` and `y` and a conditioning set `z`,
//! should we believe `x` is independent of `y` given `z`? They differ in what data they need and
//! what assumptions they make:
//!
//! - [`IndTestFisherZ`] and [`IndTestCramerT`] test for zero partial correlation in continuous,
//!   roughly Gaussian data.
//! - [`ChiSquareTest`] works on categorical data.
//! - [`IndTestDSep`] reads the answer off a known causal graph, with no statistics at all.
//! - [`IndTestPooled`] and [`IndTestBootstrap`] vote across several underlying tests.
//!
//! The tests are pluggable through the [`IndependenceTest`] trait, which search algorithms take
//! as a `dyn` object.
//!
//! # Concurrency
//!
//! Each test remembers the result of its most recent query, which is what
//! [`IndependenceTest::p_value`] reports. That's why [`IndependenceTest::check`] takes
//! `&mut self`: to query one test from several threads, wrap it in a lock held across both calls,
//! or give each thread its own instance.

use crate::config::TestConfig;
use crate::error::{Error, Result};
use crate::variable::Variable;

mod bootstrap;
mod chi_square;
mod cramer_t;
mod deterministic;
mod dsep;
mod fisher_z;
mod pooled;

pub use bootstrap::IndTestBootstrap;
pub use chi_square::{ChiSquareResult, ChiSquareTest};
pub use cramer_t::IndTestCramerT;
pub use deterministic::IndTestDeterministic;
pub use dsep::IndTestDSep;
pub use fisher_z::IndTestFisherZ;
pub use pooled::IndTestPooled;

/// The outcome of one independence query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TestResult {
    independent: bool,
    statistic: f64,
    p_value: f64,
    degrees_of_freedom: Option<f64>,
}

impl TestResult {
    /// Records a verdict along with the statistic and p-value that produced it.
    pub fn new(independent: bool, statistic: f64, p_value: f64) -> Self {
        TestResult {
            independent,
            statistic,
            p_value,
            degrees_of_freedom: None,
        }
    }

    /// Attaches degrees of freedom, for tests where that's meaningful.
    pub fn with_degrees_of_freedom(mut self, df: f64) -> Self {
        self.degrees_of_freedom = Some(df);
        self
    }

    /// Returns `true` if the test judged the variables independent.
    pub fn is_independent(&self) -> bool {
        self.independent
    }

    /// Returns `true` if the test judged the variables dependent.
    pub fn is_dependent(&self) -> bool {
        !self.independent
    }

    /// The test statistic. Its meaning depends on the test.
    pub fn statistic(&self) -> f64 {
        self.statistic
    }

    /// The p-value, or `NaN` for tests where there isn't one.
    pub fn p_value(&self) -> f64 {
        self.p_value
    }

    /// Degrees of freedom, for tests which have them.
    pub fn degrees_of_freedom(&self) -> Option<f64> {
        self.degrees_of_freedom
    }
}

/// The capability set every conditional independence test provides.
pub trait IndependenceTest {
    /// Evaluates whether `x` is independent of `y` given `z`, and remembers the result as this
    /// test's most recent one.
    ///
    /// # Errors
    ///
    /// Fails if any variable isn't part of this test's universe. Individual tests document
    /// their numeric failure modes.
    fn check(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult>;

    /// Returns `true` if `x` is judged independent of `y` given `z`.
    fn is_independent(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<bool> {
        Ok(self.check(x, y, z)?.is_independent())
    }

    /// Returns `true` if `x` is judged dependent on `y` given `z`.
    fn is_dependent(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<bool> {
        Ok(!self.is_independent(x, y, z)?)
    }

    /// The p-value of the most recent query, or `NaN` before the first.
    fn p_value(&self) -> Result<f64>;

    /// The significance level.
    fn alpha(&self) -> f64;

    /// Changes the significance level, invalidating any cached critical values.
    fn set_alpha(&mut self, alpha: f64) -> Result<()>;

    /// The variables this test can be asked about.
    fn variables(&self) -> &[Variable];

    /// Looks up one of this test's variables by name.
    fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables().iter().find(|v| v.name() == name)
    }

    /// A new, independent test over a subset of this test's variables.
    ///
    /// # Errors
    ///
    /// Fails if `variables` is empty or names a variable outside this test's universe.
    fn subset(&self, variables: &[Variable]) -> Result<Box<dyn IndependenceTest>>;

    /// Returns `true` if `x` is (nearly) a deterministic function of `z`.
    fn determines(&self, _z: &[Variable], _x: &Variable) -> Result<bool> {
        Err(Error::Unsupported("determines"))
    }
}

/// Writes one independence fact to the log at the level `config` asks for.
pub(crate) fn log_fact(
    config: &TestConfig,
    test: &str,
    x: &Variable,
    y: &Variable,
    z: &[Variable],
    result: &TestResult,
) {
    let level = config.log_level();
    if log::log_enabled!(level) {
        let z: Vec<&str> = z.iter().map(Variable::name).collect();
        log::log!(
            level,
            "{}: {} {} {} | {:?} p = {}",
            test,
            x,
            if result.is_independent() { "_||_" } else { "-/-" },
            y,
            z,
            config.format_p_value(result.p_value())
        );
    }
}

/// Counts votes for independence and reports the majority.
///
/// Ties count as dependence: independence needs strictly more than half.
pub(crate) fn majority(independent_votes: usize, total: usize) -> TestResult {
    let fraction = independent_votes as f64 / total as f64;
    TestResult::new(2 * independent_votes > total, fraction, f64::NAN)
}
