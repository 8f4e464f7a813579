use crate::distribution::check_alpha;
use crate::error::Result;

/// Settings shared by every test constructor.
///
/// Each test keeps its own copy, so two tests over the same data can report differently.
///
/// ```
/// use indtest::TestConfig;
///
/// let config = TestConfig::new(0.01).unwrap().precision(6).verbose(true);
/// assert_eq!(config.alpha(), 0.01);
/// assert_eq!(config.format_p_value(0.123456789), "0.123457");
/// assert!(TestConfig::new(-0.5).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TestConfig {
    alpha: f64,
    precision: usize,
    verbose: bool,
}

impl TestConfig {
    /// A configuration with the given significance level, four digits of p-value precision, and
    /// independence facts logged at debug level.
    pub fn new(alpha: f64) -> Result<Self> {
        check_alpha(alpha)?;
        Ok(TestConfig {
            alpha,
            precision: 4,
            verbose: false,
        })
    }

    /// Number of digits after the decimal point when p-values are written to the log.
    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Log every independence fact at info level instead of debug level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The significance level.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub(crate) fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        check_alpha(alpha)?;
        self.alpha = alpha;
        Ok(())
    }

    /// Formats a p-value with the configured precision.
    pub fn format_p_value(&self, p: f64) -> String {
        format!("{:.*}", self.precision, p)
    }

    /// The level at which independence facts are logged.
    pub fn log_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        TestConfig {
            alpha: 0.05,
            precision: 4,
            verbose: false,
        }
    }
}
