use super::fisher_z::fisher_z;
use super::{log_fact, IndependenceTest, TestResult};
use crate::config::TestConfig;
use crate::covariance::CovarianceMatrix;
use crate::distribution::{normal_two_tailed_cutoff, normal_two_tailed_p};
use crate::error::Result;
use crate::linalg;
use crate::variable::{ConditioningSet, Variable};
use nalgebra::DMatrix;
use std::sync::Arc;

/// A residual variance at most this fraction of the total variance means the variable is a
/// deterministic function of the conditioning set.
const DETERMINISM_TOLERANCE: f64 = 1e-10;

/// A partial-correlation test which stays well-defined when variables are linear functions of
/// each other.
///
/// Both `x` and `y` are regressed on `z` using the Moore-Penrose pseudo-inverse of the
/// conditioning block. If either has no residual variance left, it's determined by `z`, and a
/// determined variable carries no information about anything else once `z` is known: the pair is
/// reported independent with a p-value of 1. Otherwise the residual correlation goes through the
/// same Fisher Z transformation as [`IndTestFisherZ`](super::IndTestFisherZ).
///
/// [`IndTestFisherZ`](super::IndTestFisherZ) delegates here whenever its own submatrix is
/// singular, but this is also a complete test in its own right.
#[derive(Clone, Debug)]
pub struct IndTestDeterministic {
    covariance: Arc<CovarianceMatrix>,
    config: TestConfig,
    cutoff: Option<f64>,
    last: Option<TestResult>,
}

impl IndTestDeterministic {
    /// Builds a test over a covariance matrix.
    pub fn from_covariance(covariance: CovarianceMatrix, config: TestConfig) -> Self {
        IndTestDeterministic::from_shared(Arc::new(covariance), config)
    }

    /// Builds a test over a covariance matrix shared with other tests.
    pub fn from_shared(covariance: Arc<CovarianceMatrix>, config: TestConfig) -> Self {
        IndTestDeterministic {
            covariance,
            config,
            cutoff: None,
            last: None,
        }
    }

    fn cutoff(&mut self) -> Result<f64> {
        if let Some(cutoff) = self.cutoff {
            return Ok(cutoff);
        }
        let cutoff = normal_two_tailed_cutoff(self.config.alpha())?;
        self.cutoff = Some(cutoff);
        Ok(cutoff)
    }

    /// Tests the first two variables of a covariance submatrix given the remaining `conditioning`
    /// variables.
    pub(crate) fn evaluate_submatrix(
        &mut self,
        sub: &DMatrix<f64>,
        conditioning: usize,
    ) -> Result<TestResult> {
        let residual = linalg::residual_covariance(sub)?;
        let (var_x, var_y) = (residual[(0, 0)], residual[(1, 1)]);
        if is_determined(var_x, sub[(0, 0)]) || is_determined(var_y, sub[(1, 1)]) {
            return Ok(TestResult::new(true, 0.0, 1.0));
        }

        let r = residual[(0, 1)] / (var_x * var_y).sqrt();
        let statistic = fisher_z(r, self.covariance.sample_size(), conditioning)?;
        let p_value = normal_two_tailed_p(statistic);
        let independent = statistic.abs() <= self.cutoff()?;
        Ok(TestResult::new(independent, statistic, p_value))
    }
}

fn is_determined(residual_variance: f64, total_variance: f64) -> bool {
    residual_variance <= DETERMINISM_TOLERANCE * total_variance
}

impl IndependenceTest for IndTestDeterministic {
    fn check(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        let (xi, yi, zi) = self.covariance.variable_index().resolve(x, y, z)?;
        let sub = self.covariance.submatrix(&zi.with_pair(xi, yi));
        let result = self.evaluate_submatrix(&sub, zi.len())?;
        log_fact(&self.config, "Deterministic", x, y, z, &result);
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
        self.cutoff = None;
        Ok(())
    }

    fn variables(&self) -> &[Variable] {
        self.covariance.variables()
    }

    fn subset(&self, variables: &[Variable]) -> Result<Box<dyn IndependenceTest>> {
        let covariance = self.covariance.filter_variables(variables)?;
        Ok(Box::new(IndTestDeterministic::from_covariance(
            covariance,
            self.config,
        )))
    }

    /// Regresses `x` on `z` and reports whether any residual variance is left.
    fn determines(&self, z: &[Variable], x: &Variable) -> Result<bool> {
        let index = self.covariance.variable_index();
        let xi = index.index_of(x)?;
        let zi = z
            .iter()
            .map(|v| index.index_of(v))
            .collect::<Result<ConditioningSet>>()?;

        let total = self.covariance.value(xi, xi);
        if zi.is_empty() {
            return Ok(is_determined(total, total));
        }
        let z: Vec<usize> = zi.iter().collect();
        let cross = linalg::block(self.covariance.matrix(), &[xi], &z);
        let rest = self.covariance.submatrix(&z);
        let explained = &cross * linalg::pseudo_inverse(&rest)? * cross.transpose();
        Ok(is_determined(total - explained[(0, 0)], total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn agrees_with_fisher_z_on_regular_matrices() {
        let vars: Vec<Variable> = ["a", "b", "c"]
            .iter()
            .map(|n| Variable::continuous(*n))
            .collect();
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 0.4, 0.2, 0.4, 1.0, 0.3, 0.2, 0.3, 1.0]);
        let cov = CovarianceMatrix::new(vars.clone(), m, 80).unwrap();
        let mut det = IndTestDeterministic::from_covariance(cov.clone(), TestConfig::default());
        let mut fz = super::super::IndTestFisherZ::from_covariance(cov, TestConfig::default());
        let a = det.check(&vars[0], &vars[1], &vars[2..]).unwrap();
        let b = fz.check(&vars[0], &vars[1], &vars[2..]).unwrap();
        assert_abs_diff_eq!(a.statistic(), b.statistic(), epsilon = 1e-9);
        assert_eq!(a.is_independent(), b.is_independent());
    }

    #[test]
    fn constant_variable_is_determined_by_nothing() {
        let vars = vec![Variable::continuous("a"), Variable::continuous("k")];
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        let cov = CovarianceMatrix::new(vars.clone(), m, 30).unwrap();
        let mut det = IndTestDeterministic::from_covariance(cov, TestConfig::default());
        assert!(det.determines(&[], &vars[1]).unwrap());
        assert!(!det.determines(&[], &vars[0]).unwrap());
        assert!(det.is_independent(&vars[0], &vars[1], &[]).unwrap());
        assert_eq!(det.p_value().unwrap(), 1.0);
    }
}
