use crate::covariance::CovarianceMatrix;
use crate::error::{Error, Result};
use crate::variable::Variable;

/// A small latent-variable model whose fit decides a factor test.
#[derive(Clone, Debug, PartialEq)]
pub enum FactorModel {
    /// One latent variable with every indicator as its child.
    OneFactor {
        /// The measured variables.
        indicators: Vec<Variable>,
    },
    /// Two correlated latent variables, each with its own group of indicators.
    TwoFactor {
        /// Children of the first latent.
        first: Vec<Variable>,
        /// Children of the second latent.
        second: Vec<Variable>,
    },
}

impl FactorModel {
    /// A one-factor model.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IndicatorCount`] unless there are 4 to 6 indicators.
    pub fn one_factor(indicators: &[Variable]) -> Result<Self> {
        check_count(indicators.len())?;
        Ok(FactorModel::OneFactor {
            indicators: indicators.to_vec(),
        })
    }

    /// A two-factor model.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IndicatorCount`] unless there are 4 to 6 indicators in total, and with
    /// [`Error::EmptyVariableList`] if either group is empty.
    pub fn two_factor(first: &[Variable], second: &[Variable]) -> Result<Self> {
        if first.is_empty() || second.is_empty() {
            return Err(Error::EmptyVariableList);
        }
        check_count(first.len() + second.len())?;
        Ok(FactorModel::TwoFactor {
            first: first.to_vec(),
            second: second.to_vec(),
        })
    }

    /// Every measured variable, first group first.
    pub fn indicators(&self) -> Vec<Variable> {
        match self {
            FactorModel::OneFactor { indicators } => indicators.clone(),
            FactorModel::TwoFactor { first, second } => {
                first.iter().chain(second.iter()).cloned().collect()
            }
        }
    }

    /// Number of latent variables.
    pub fn num_latents(&self) -> usize {
        match self {
            FactorModel::OneFactor { .. } => 1,
            FactorModel::TwoFactor { .. } => 2,
        }
    }

    /// Degrees of freedom of the likelihood-ratio test of this model: distinct covariances
    /// minus free parameters, with latent variances fixed at 1.
    ///
    /// ```
    /// use indtest::tetrad::FactorModel;
    /// use indtest::Variable;
    ///
    /// let v: Vec<Variable> = ["a", "b", "c", "d"].iter().map(|n| Variable::continuous(*n)).collect();
    /// assert_eq!(FactorModel::one_factor(&v).unwrap().degrees_of_freedom(), 2);
    /// assert_eq!(FactorModel::two_factor(&v[..2], &v[2..]).unwrap().degrees_of_freedom(), 1);
    /// ```
    pub fn degrees_of_freedom(&self) -> usize {
        let p = match self {
            FactorModel::OneFactor { indicators } => indicators.len(),
            FactorModel::TwoFactor { first, second } => first.len() + second.len(),
        };
        // One loading and one error variance per indicator, plus the latent correlation.
        let parameters = 2 * p + self.num_latents() - 1;
        (p * (p + 1) / 2).saturating_sub(parameters)
    }
}

fn check_count(n: usize) -> Result<()> {
    if (4..=6).contains(&n) {
        Ok(())
    } else {
        Err(Error::IndicatorCount(n))
    }
}

/// Estimates a factor model and reports the p-value of its fit.
///
/// The covariance matrix handed over covers exactly the model's indicators, in
/// [`FactorModel::indicators`] order.
pub trait FactorModelFitter {
    /// Fits `model` to `covariance` and returns the likelihood-ratio p-value.
    fn fit(&self, covariance: &CovarianceMatrix, model: &FactorModel) -> Result<f64>;
}

impl<F> FactorModelFitter for F
where
    F: Fn(&CovarianceMatrix, &FactorModel) -> Result<f64>,
{
    fn fit(&self, covariance: &CovarianceMatrix, model: &FactorModel) -> Result<f64> {
        self(covariance, model)
    }
}
