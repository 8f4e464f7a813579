use crate::error::{Error, Result};
use crate::variable::{Variable, Variables};
use nalgebra::DMatrix;

/// A rectangular table of observations, one column per variable.
///
/// Every cell is stored as an `f64`. For a continuous column that's the observed value, with
/// `NaN` marking a missing observation. For a discrete column it's the index of the observed
/// category, with any negative value marking a missing observation.
///
/// Data sets are read-only once built; tests which need a different view (a resample, a
/// discretized column) construct a new one.
#[derive(Clone, Debug)]
pub struct DataSet {
    variables: Variables,
    data: DMatrix<f64>,
}

impl DataSet {
    /// Wraps a `rows × columns` matrix, with one variable per column.
    ///
    /// ```
    /// use indtest::{DataSet, Variable};
    /// use nalgebra::DMatrix;
    ///
    /// let data = DataSet::new(
    ///     vec![Variable::continuous("x"), Variable::discrete("y", &["no", "yes"])],
    ///     DMatrix::from_row_slice(2, 2, &[0.5, 1.0, -0.25, 0.0]),
    /// ).unwrap();
    /// assert_eq!(data.num_rows(), 2);
    /// assert_eq!(data.get_int(0, 1), 1);
    /// ```
    pub fn new(variables: Vec<Variable>, data: DMatrix<f64>) -> Result<Self> {
        if variables.len() != data.ncols() {
            return Err(Error::DimensionMismatch {
                expected: variables.len(),
                found: data.ncols(),
            });
        }
        Ok(DataSet {
            variables: Variables::new(variables)?,
            data,
        })
    }

    /// Builds a data set from row-major values.
    pub fn from_rows(variables: Vec<Variable>, rows: &[Vec<f64>]) -> Result<Self> {
        let columns = variables.len();
        let mut flat = Vec::with_capacity(rows.len() * columns);
        for row in rows {
            if row.len() != columns {
                return Err(Error::DimensionMismatch {
                    expected: columns,
                    found: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        DataSet::new(variables, DMatrix::from_row_slice(rows.len(), columns, &flat))
    }

    /// Number of observations.
    pub fn num_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of variables.
    pub fn num_columns(&self) -> usize {
        self.data.ncols()
    }

    /// The variable describing a column.
    pub fn variable(&self, column: usize) -> &Variable {
        &self.variables.as_slice()[column]
    }

    /// All variables, in column order.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// The raw value stored in a cell.
    pub fn get_double(&self, row: usize, column: usize) -> f64 {
        self.data[(row, column)]
    }

    /// The category index stored in a discrete cell; negative means missing.
    pub fn get_int(&self, row: usize, column: usize) -> i64 {
        let value = self.data[(row, column)];
        if value.is_nan() || value < 0.0 {
            -1
        } else {
            value as i64
        }
    }

    /// Returns `true` if every column is continuous.
    pub fn is_continuous(&self) -> bool {
        self.variables.as_slice().iter().all(Variable::is_continuous)
    }

    /// Returns `true` if every column is discrete.
    pub fn is_discrete(&self) -> bool {
        self.variables.as_slice().iter().all(Variable::is_discrete)
    }

    /// Returns `true` if the cell holds a missing value for its column's kind.
    pub fn is_missing(&self, row: usize, column: usize) -> bool {
        if self.variable(column).is_continuous() {
            self.data[(row, column)].is_nan()
        } else {
            self.get_int(row, column) < 0
        }
    }

    /// The underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// A new data set made of the given rows of this one, in the given order. Rows may repeat,
    /// which is how bootstrap resamples are built.
    pub fn select_rows(&self, rows: &[usize]) -> DataSet {
        DataSet {
            variables: self.variables.clone(),
            data: self.data.select_rows(rows),
        }
    }

    /// A new data set with one column replaced by different values and a different variable.
    pub fn replace_column(&self, column: usize, variable: Variable, values: &[f64]) -> Result<Self> {
        if values.len() != self.num_rows() {
            return Err(Error::DimensionMismatch {
                expected: self.num_rows(),
                found: values.len(),
            });
        }
        let mut variables = self.variables.as_slice().to_vec();
        variables[column] = variable;
        let mut data = self.data.clone();
        for (row, value) in values.iter().enumerate() {
            data[(row, column)] = *value;
        }
        DataSet::new(variables, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_categories_are_missing() {
        let data = DataSet::from_rows(
            vec![Variable::discrete("x", &["a", "b"])],
            &[vec![1.0], vec![-0.5], vec![-3.0], vec![f64::NAN]],
        )
        .unwrap();
        assert_eq!(data.get_int(0, 0), 1);
        for row in 1..4 {
            assert_eq!(data.get_int(row, 0), -1);
            assert!(data.is_missing(row, 0));
        }
        assert!(!data.is_missing(0, 0));
    }
}
