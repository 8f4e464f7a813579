use super::{log_fact, majority, IndTestFisherZ, IndependenceTest, TestResult};
use crate::config::TestConfig;
use crate::data::DataSet;
use crate::error::{Error, Result};
use crate::variable::Variable;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

/// Fisher's Z by majority vote over bootstrap resamples of the data.
///
/// The resamples are drawn once, at construction: each one picks `resample_size` rows uniformly
/// with replacement, using a [`Xoshiro256PlusPlus`] generator seeded from `seed`. The same data
/// and seed therefore always produce the same resamples and the same verdicts.
///
/// Building a covariance matrix per resample is the expensive part, so each resample's test is
/// only constructed when a query first needs it, and then kept.
///
/// Like [`IndTestPooled`](super::IndTestPooled), the result's statistic is the fraction of
/// resamples voting independent, and neither [`IndependenceTest::p_value`] nor
/// [`IndependenceTest::subset`] is supported.
#[derive(Clone, Debug)]
pub struct IndTestBootstrap {
    data: Arc<DataSet>,
    config: TestConfig,
    resamples: Vec<Vec<usize>>,
    tests: Vec<Option<IndTestFisherZ>>,
}

impl IndTestBootstrap {
    /// Draws `num_resamples` resamples of `resample_size` rows each.
    ///
    /// # Errors
    ///
    /// Fails if any column isn't continuous, if `num_resamples` is zero, or if `resample_size` is
    /// too small to estimate a covariance.
    pub fn new(
        data: Arc<DataSet>,
        config: TestConfig,
        num_resamples: usize,
        resample_size: usize,
        seed: u64,
    ) -> Result<Self> {
        if let Some(v) = data
            .variables()
            .as_slice()
            .iter()
            .find(|v| !v.is_continuous())
        {
            return Err(Error::NotContinuous(v.name().to_owned()));
        }
        if num_resamples == 0 {
            return Err(Error::NoVoters);
        }
        if resample_size < 2 || data.num_rows() == 0 {
            return Err(Error::InsufficientSampleSize {
                sample_size: resample_size.min(data.num_rows()),
                conditioning: 0,
            });
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let rows = data.num_rows();
        let resamples = (0..num_resamples)
            .map(|_| (0..resample_size).map(|_| rng.gen_range(0..rows)).collect())
            .collect();

        Ok(IndTestBootstrap {
            data,
            config,
            resamples,
            tests: vec![None; num_resamples],
        })
    }

    /// The row indices making up each resample.
    pub fn resamples(&self) -> &[Vec<usize>] {
        &self.resamples
    }

    /// The number of resamples whose test has been built so far.
    pub fn built(&self) -> usize {
        self.tests.iter().filter(|t| t.is_some()).count()
    }

    fn test(&mut self, i: usize) -> Result<&mut IndTestFisherZ> {
        if self.tests[i].is_none() {
            let resample = self.data.select_rows(&self.resamples[i]);
            self.tests[i] = Some(IndTestFisherZ::new(&resample, self.config)?);
        }
        // Just filled in above if it was empty.
        match &mut self.tests[i] {
            Some(test) => Ok(test),
            None => unreachable!(),
        }
    }
}

impl IndependenceTest for IndTestBootstrap {
    fn check(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        let mut votes = 0;
        for i in 0..self.resamples.len() {
            if self.test(i)?.is_independent(x, y, z)? {
                votes += 1;
            }
        }
        let result = majority(votes, self.resamples.len());
        log_fact(&self.config, "Bootstrap", x, y, z, &result);
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
        for test in self.tests.iter_mut().flatten() {
            test.set_alpha(alpha)?;
        }
        Ok(())
    }

    fn variables(&self) -> &[Variable] {
        self.data.variables().as_slice()
    }

    fn subset(&self, _variables: &[Variable]) -> Result<Box<dyn IndependenceTest>> {
        Err(Error::Unsupported("subset"))
    }
}
