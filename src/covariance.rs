use crate::data::DataSet;
use crate::error::{Error, Result};
use crate::linalg;
use crate::variable::{Variable, Variables};
use nalgebra::DMatrix;

/// Relative tolerance used when checking that a supplied matrix is symmetric.
const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// A covariance matrix over named variables, together with the sample size it was estimated from.
///
/// Instances are never mutated: restricting to fewer variables with [`CovarianceMatrix::filter`]
/// or normalizing with [`CovarianceMatrix::to_correlation`] builds a new one.
#[derive(Clone, Debug)]
pub struct CovarianceMatrix {
    variables: Variables,
    matrix: DMatrix<f64>,
    sample_size: usize,
}

impl CovarianceMatrix {
    /// Wraps a supplied matrix.
    ///
    /// # Errors
    ///
    /// The matrix must be square with one row per variable, finite, symmetric, with a
    /// non-negative diagonal. Variable names must be unique and the sample size at least 1.
    pub fn new(variables: Vec<Variable>, matrix: DMatrix<f64>, sample_size: usize) -> Result<Self> {
        if !matrix.is_square() {
            return Err(Error::DimensionMismatch {
                expected: matrix.nrows(),
                found: matrix.ncols(),
            });
        }
        if variables.len() != matrix.nrows() {
            return Err(Error::DimensionMismatch {
                expected: variables.len(),
                found: matrix.nrows(),
            });
        }
        if sample_size < 1 {
            return Err(Error::InsufficientSampleSize {
                sample_size,
                conditioning: 0,
            });
        }
        let variables = Variables::new(variables)?;
        for (i, row) in matrix.row_iter().enumerate() {
            if row.iter().any(|x| !x.is_finite()) {
                return Err(Error::NonFiniteValue(
                    variables.as_slice()[i].name().to_owned(),
                ));
            }
        }
        for i in 0..matrix.nrows() {
            if matrix[(i, i)] < 0.0 {
                return Err(Error::NegativeVariance(
                    variables.as_slice()[i].name().to_owned(),
                ));
            }
            for j in 0..i {
                let (a, b) = (matrix[(i, j)], matrix[(j, i)]);
                let scale = a.abs().max(b.abs()).max(1.0);
                if (a - b).abs() > SYMMETRY_TOLERANCE * scale {
                    return Err(Error::NotSymmetric(i, j));
                }
            }
        }
        Ok(CovarianceMatrix {
            variables,
            matrix,
            sample_size,
        })
    }

    /// Computes the unbiased sample covariance of every column of a continuous data set.
    ///
    /// ```
    /// use indtest::{CovarianceMatrix, DataSet, Variable};
    ///
    /// let data = DataSet::from_rows(
    ///     vec![Variable::continuous("x"), Variable::continuous("y")],
    ///     &[vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]],
    /// ).unwrap();
    /// let cov = CovarianceMatrix::from_data(&data).unwrap();
    /// assert_eq!(cov.sample_size(), 3);
    /// assert_eq!(cov.value(0, 0), 1.0);
    /// assert_eq!(cov.value(0, 1), 2.0);
    /// assert_eq!(cov.value(1, 1), 4.0);
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if any column is discrete or contains a missing or infinite value, or if there are
    /// fewer than two rows. Values so large that their products overflow give
    /// [`Error::NonFiniteStatistic`].
    pub fn from_data(data: &DataSet) -> Result<Self> {
        for column in 0..data.num_columns() {
            let variable = data.variable(column);
            if !variable.is_continuous() {
                return Err(Error::NotContinuous(variable.name().to_owned()));
            }
            let values = data.matrix().column(column);
            if values.iter().any(|x| x.is_nan()) {
                return Err(Error::MissingValues(variable.name().to_owned()));
            }
            if values.iter().any(|x| x.is_infinite()) {
                return Err(Error::NonFiniteValue(variable.name().to_owned()));
            }
        }

        let rows = data.num_rows();
        if rows < 2 {
            return Err(Error::InsufficientSampleSize {
                sample_size: rows,
                conditioning: 0,
            });
        }

        let means = data.matrix().row_mean();
        let mut centered = data.matrix().clone();
        for (mut column, mean) in centered.column_iter_mut().zip(means.iter()) {
            column.add_scalar_mut(-mean);
        }
        let matrix = (centered.transpose() * &centered) / (rows - 1) as f64;
        if matrix.iter().any(|x| !x.is_finite()) {
            return Err(Error::NonFiniteStatistic);
        }

        Ok(CovarianceMatrix {
            variables: data.variables().clone(),
            matrix,
            sample_size: rows,
        })
    }

    /// The variables, in matrix order.
    pub fn variables(&self) -> &[Variable] {
        self.variables.as_slice()
    }

    /// The variable universe with lookup by name.
    pub fn variable_index(&self) -> &Variables {
        &self.variables
    }

    /// Row/column index of a variable.
    pub fn index_of(&self, variable: &Variable) -> Result<usize> {
        self.variables.index_of(variable)
    }

    /// The number of samples the matrix was estimated from.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// The number of variables.
    pub fn dimension(&self) -> usize {
        self.matrix.nrows()
    }

    /// One entry of the matrix.
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    /// The whole matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// The square block over the given indices, in the order requested.
    pub fn submatrix(&self, indices: &[usize]) -> DMatrix<f64> {
        linalg::submatrix(&self.matrix, indices)
    }

    /// A new covariance matrix over a subset of the variables, in the order requested.
    pub fn filter(&self, indices: &[usize]) -> Result<CovarianceMatrix> {
        if indices.is_empty() {
            return Err(Error::EmptyVariableList);
        }
        let dimension = self.dimension();
        if let Some(&i) = indices.iter().find(|&&i| i >= dimension) {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                found: i,
            });
        }
        let variables = indices
            .iter()
            .map(|&i| self.variables.as_slice()[i].clone())
            .collect();
        Ok(CovarianceMatrix {
            variables: Variables::new(variables)?,
            matrix: self.submatrix(indices),
            sample_size: self.sample_size,
        })
    }

    /// A new covariance matrix over the named subset of variables.
    pub fn filter_variables(&self, variables: &[Variable]) -> Result<CovarianceMatrix> {
        self.filter(&self.variables.indices_of(variables)?)
    }

    /// Normalizes by the outer product of standard deviations.
    ///
    /// A variable with zero variance has no defined correlation with anything; its off-diagonal
    /// entries come out as `NaN` and its diagonal as 1.
    pub fn to_correlation(&self) -> CorrelationMatrix {
        let sd: Vec<f64> = self.matrix.diagonal().iter().map(|v| v.sqrt()).collect();
        let n = self.dimension();
        let matrix = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                1.0
            } else {
                self.matrix[(i, j)] / (sd[i] * sd[j])
            }
        });
        CorrelationMatrix(CovarianceMatrix {
            variables: self.variables.clone(),
            matrix,
            sample_size: self.sample_size,
        })
    }
}

/// A covariance matrix normalized to unit variances.
///
/// It derefs to [`CovarianceMatrix`], so every accessor works the same way.
#[derive(Clone, Debug)]
pub struct CorrelationMatrix(CovarianceMatrix);

impl CorrelationMatrix {
    /// Normalizes a covariance matrix.
    pub fn new(covariance: &CovarianceMatrix) -> Self {
        covariance.to_correlation()
    }

    /// A new correlation matrix over a subset of the variables.
    pub fn filter(&self, indices: &[usize]) -> Result<CorrelationMatrix> {
        Ok(CorrelationMatrix(self.0.filter(indices)?))
    }
}

impl std::ops::Deref for CorrelationMatrix {
    type Target = CovarianceMatrix;

    fn deref(&self) -> &CovarianceMatrix {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn vars(names: &[&str]) -> Vec<Variable> {
        names.iter().map(|n| Variable::continuous(*n)).collect()
    }

    #[test]
    fn rejects_asymmetric_matrices() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.4, 1.0]);
        assert_eq!(
            CovarianceMatrix::new(vars(&["a", "b"]), m, 10).err(),
            Some(Error::NotSymmetric(1, 0))
        );
    }

    #[test]
    fn rejects_negative_variance() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert_eq!(
            CovarianceMatrix::new(vars(&["a", "b"]), m, 10).err(),
            Some(Error::NegativeVariance("b".into()))
        );
    }

    #[test]
    fn missing_values_are_rejected() {
        let data = DataSet::from_rows(vars(&["a"]), &[vec![1.0], vec![f64::NAN]]).unwrap();
        assert_eq!(
            CovarianceMatrix::from_data(&data).err(),
            Some(Error::MissingValues("a".into()))
        );
    }

    #[test]
    fn non_finite_entries_are_rejected() {
        let m = DMatrix::from_row_slice(2, 2, &[f64::NAN, 0.0, 0.0, 1.0]);
        assert_eq!(
            CovarianceMatrix::new(vars(&["a", "b"]), m, 10).err(),
            Some(Error::NonFiniteValue("a".into()))
        );
        let m = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, f64::NAN, 1.0]);
        assert_eq!(
            CovarianceMatrix::new(vars(&["a", "b"]), m, 10).err(),
            Some(Error::NonFiniteValue("a".into()))
        );
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, f64::INFINITY]);
        assert_eq!(
            CovarianceMatrix::new(vars(&["a", "b"]), m, 10).err(),
            Some(Error::NonFiniteValue("b".into()))
        );
    }

    #[test]
    fn infinite_data_is_rejected() {
        let rows = [vec![1.0, 2.0], vec![2.0, f64::INFINITY], vec![3.0, 1.0]];
        let data = DataSet::from_rows(vars(&["a", "b"]), &rows).unwrap();
        assert_eq!(
            CovarianceMatrix::from_data(&data).err(),
            Some(Error::NonFiniteValue("b".into()))
        );

        let rows = [vec![1e200], vec![-1e200], vec![0.0]];
        let data = DataSet::from_rows(vars(&["a"]), &rows).unwrap();
        assert_eq!(
            CovarianceMatrix::from_data(&data).err(),
            Some(Error::NonFiniteStatistic)
        );
    }

    #[test]
    fn correlation_has_unit_diagonal() {
        let m = DMatrix::from_row_slice(3, 3, &[4.0, 2.0, 0.0, 2.0, 9.0, 3.0, 0.0, 3.0, 1.0]);
        let cov = CovarianceMatrix::new(vars(&["a", "b", "c"]), m, 50).unwrap();
        let corr = cov.to_correlation();
        for i in 0..3 {
            assert_eq!(corr.value(i, i), 1.0);
        }
        assert_abs_diff_eq!(corr.value(0, 1), 2.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(corr.value(2, 1), 1.0, epsilon = 1e-12);
        assert_eq!(corr.sample_size(), 50);
    }

    #[test]
    fn filter_preserves_requested_order() {
        let m = DMatrix::from_row_slice(3, 3, &[4.0, 2.0, 0.0, 2.0, 9.0, 3.0, 0.0, 3.0, 1.0]);
        let cov = CovarianceMatrix::new(vars(&["a", "b", "c"]), m, 50).unwrap();
        let sub = cov.filter(&[2, 0]).unwrap();
        assert_eq!(sub.variables()[0].name(), "c");
        assert_eq!(sub.value(0, 0), 1.0);
        assert_eq!(sub.value(1, 1), 4.0);
        assert_eq!(sub.value(0, 1), 0.0);
        assert_eq!(cov.filter(&[]).err(), Some(Error::EmptyVariableList));
        assert_eq!(
            cov.filter(&[0, 3]).err(),
            Some(Error::DimensionMismatch {
                expected: 3,
                found: 3
            })
        );
    }
}
