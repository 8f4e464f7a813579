#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! Conditional independence tests and tetrad-constraint tests, the statistical core of
//! constraint-based causal discovery.
//!
//! A search algorithm such as PC or FCI learns a causal graph by asking, over and over, whether
//! variable `x` is independent of variable `y` once a set of variables `z` is known. This crate
//! answers those questions. Every test implements [`IndependenceTest`], so a search can be
//! written once and run against:
//!
//! - [`IndTestFisherZ`] and [`IndTestCramerT`] for continuous, roughly Gaussian data,
//! - [`ChiSquareTest`] for categorical data,
//! - [`IndTestDSep`] when the true graph is known and only its implications are wanted,
//! - [`IndTestPooled`] and [`IndTestBootstrap`], which take a majority vote.
//!
//! Latent-variable searches ask a different question: whether four covariances satisfy a tetrad
//! constraint. Those tests live in [`tetrad`].
//!
//! Tests are built over a [`DataSet`] or a [`CovarianceMatrix`], together with a [`TestConfig`]
//! holding the significance level and logging preferences. Independence facts are written to the
//! [`log`] facade as they're evaluated.
//!
//! The algorithms follow the definitions in these references:
//!
//! - Spirtes, Glymour and Scheines, Causation, Prediction, and Search, 2nd edition, 2000
//! - Wishart, Sampling errors in the theory of two factors, 1928
//! - Bollen, Outlier screening and a distribution-free test for vanishing tetrads, 1990

pub mod cell_table;
mod config;
mod covariance;
mod data;
pub mod discretize;
pub mod distribution;
mod error;
pub mod graph;
pub mod indtest;
pub mod linalg;
pub mod tetrad;
mod variable;

pub use cell_table::CellTable;
pub use config::TestConfig;
pub use covariance::{CorrelationMatrix, CovarianceMatrix};
pub use data::DataSet;
pub use error::{Error, Result};
pub use indtest::{
    ChiSquareResult, ChiSquareTest, IndTestBootstrap, IndTestCramerT, IndTestDSep,
    IndTestDeterministic, IndTestFisherZ, IndTestPooled, IndependenceTest, TestResult,
};
pub use variable::{ConditioningSet, Variable, VariableKind, Variables};
