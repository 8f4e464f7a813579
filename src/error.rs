use thiserror::Error;

/// Convenience alias used by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building a data store or evaluating a test.
///
/// The variants fall into four groups: invalid arguments (programmer errors which should never be
/// retried), numeric singularity, degenerate statistics which can't be floored away, and
/// operations that a particular test variant doesn't support.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A variable was named in a query or subset but isn't part of the test's universe.
    #[error("unknown variable {0:?}")]
    UnknownVariable(String),

    /// The same variable name appeared twice where names must be unique.
    #[error("duplicate variable {0:?}")]
    DuplicateVariable(String),

    /// A subset was requested over no variables at all.
    #[error("variable list must not be empty")]
    EmptyVariableList,

    /// Significance levels are probabilities.
    #[error("alpha must be in [0, 1], got {0}")]
    AlphaOutOfRange(f64),

    /// Two things which must have matching lengths or dimensions don't.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The length the operation required.
        expected: usize,
        /// The length it was given.
        found: usize,
    },

    /// A supplied covariance matrix isn't symmetric.
    #[error("covariance matrix is not symmetric at ({0}, {1})")]
    NotSymmetric(usize, usize),

    /// A supplied covariance matrix has a negative variance on its diagonal.
    #[error("variance of {0:?} is negative")]
    NegativeVariance(String),

    /// Sample covariances can't be computed over missing values; filter them out first.
    #[error("data contains missing values in column {0:?}")]
    MissingValues(String),

    /// Data and covariances must be finite; infinities can't be centred or decomposed.
    #[error("non-finite value for variable {0:?}")]
    NonFiniteValue(String),

    /// The operation needs a continuous variable.
    #[error("variable {0:?} is not continuous")]
    NotContinuous(String),

    /// The operation needs a discrete variable.
    #[error("variable {0:?} is not discrete")]
    NotDiscrete(String),

    /// A discrete cell held a category index the variable doesn't have.
    #[error("category index {index} out of range for {variable:?}")]
    CategoryOutOfRange {
        /// Name of the discrete variable.
        variable: String,
        /// The offending category index.
        index: i64,
    },

    /// Cutoffs for discretization must be sorted in ascending order.
    #[error("cutoffs must be sorted in ascending order")]
    UnsortedCutoffs,

    /// The matrix which needed inverting has no inverse.
    #[error("matrix is singular")]
    Singular,

    /// Not enough samples remain after accounting for the conditioning set.
    #[error("sample size {sample_size} is too small for {conditioning} conditioning variables")]
    InsufficientSampleSize {
        /// Number of samples in the data.
        sample_size: usize,
        /// Size of the conditioning set.
        conditioning: usize,
    },

    /// A statistic came out as NaN or infinite and there is no sensible p-value for it.
    #[error("statistic is not finite")]
    NonFiniteStatistic,

    /// The distribution-free tetrad test needs the raw data to compute fourth moments.
    #[error("this test requires raw data, not just a covariance matrix")]
    RequiresRawData,

    /// An input to a statistical distribution was outside that distribution's domain.
    #[error("invalid distribution parameter: {0}")]
    Distribution(String),

    /// Edges which would make a directed graph cyclic are rejected.
    #[error("edge {0:?} -> {1:?} would create a cycle")]
    Cycle(String, String),

    /// Factor-model tests take between four and six measured variables.
    #[error("factor models need 4 to 6 indicators, got {0}")]
    IndicatorCount(usize),

    /// A voting test was built with nothing to vote.
    #[error("a voting test needs at least one constituent")]
    NoVoters,

    /// This test variant doesn't implement the requested operation.
    #[error("{0} is not supported by this test")]
    Unsupported(&'static str),
}

impl From<statrs::StatsError> for Error {
    fn from(err: statrs::StatsError) -> Self {
        Error::Distribution(err.to_string())
    }
}
