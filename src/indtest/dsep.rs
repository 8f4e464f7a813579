use super::{log_fact, IndependenceTest, TestResult};
use crate::config::TestConfig;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::variable::{Variable, Variables};
use std::sync::Arc;

/// An oracle which reads independence facts off a known causal graph instead of estimating them.
///
/// `x` is reported independent of `y` given `z` exactly when they're d-separated by `z` in the
/// graph. There's no statistic, so the result's statistic is `NaN`; the p-value is 1 for
/// independence and `NaN` otherwise. Alpha is stored and reported but never consulted.
///
/// The observed variables start out as all of the graph's nodes. [`IndependenceTest::subset`]
/// narrows them, which models latent variables: they still shape d-separation but can't be asked
/// about.
///
/// ```
/// use indtest::graph::Dag;
/// use indtest::{IndTestDSep, IndependenceTest, TestConfig, Variable};
/// use std::sync::Arc;
///
/// let (a, b) = (Variable::continuous("a"), Variable::continuous("b"));
/// let mut dag = Dag::new();
/// dag.add_node(a.clone()).unwrap();
/// dag.add_node(b.clone()).unwrap();
///
/// let mut test = IndTestDSep::new(Arc::new(dag), TestConfig::default()).unwrap();
/// assert!(test.is_independent(&a, &b, &[]).unwrap());
/// assert_eq!(test.p_value().unwrap(), 1.0);
/// ```
#[derive(Debug)]
pub struct IndTestDSep<G> {
    graph: Arc<G>,
    observed: Variables,
    config: TestConfig,
    last: Option<TestResult>,
}

impl<G: Graph> IndTestDSep<G> {
    /// An oracle over every node of `graph`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DuplicateVariable`] if two nodes share a name.
    pub fn new(graph: Arc<G>, config: TestConfig) -> Result<Self> {
        let observed = Variables::new(graph.nodes().to_vec())?;
        Ok(IndTestDSep {
            graph,
            observed,
            config,
            last: None,
        })
    }

    /// The graph this oracle consults.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    fn check_observed(&self, variable: &Variable) -> Result<()> {
        self.observed.index_of(variable).map(|_| ())
    }
}

impl<G: Graph> Clone for IndTestDSep<G> {
    fn clone(&self) -> Self {
        IndTestDSep {
            graph: self.graph.clone(),
            observed: self.observed.clone(),
            config: self.config,
            last: self.last,
        }
    }
}

impl<G: Graph + 'static> IndependenceTest for IndTestDSep<G> {
    fn check(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        for v in std::iter::once(x).chain(std::iter::once(y)).chain(z) {
            self.check_observed(v)?;
        }
        let result = if self.graph.is_d_separated(x, y, z)? {
            TestResult::new(true, f64::NAN, 1.0)
        } else {
            TestResult::new(false, f64::NAN, f64::NAN)
        };
        log_fact(&self.config, "D-separation", x, y, z, &result);
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
        self.config.set_alpha(alpha)
    }

    fn variables(&self) -> &[Variable] {
        self.observed.as_slice()
    }

    fn subset(&self, variables: &[Variable]) -> Result<Box<dyn IndependenceTest>> {
        if variables.is_empty() {
            return Err(Error::EmptyVariableList);
        }
        let kept = self
            .observed
            .indices_of(variables)?
            .into_iter()
            .map(|i| self.observed.as_slice()[i].clone())
            .collect();
        Ok(Box::new(IndTestDSep {
            graph: self.graph.clone(),
            observed: Variables::new(kept)?,
            config: self.config,
            last: None,
        }))
    }
}
