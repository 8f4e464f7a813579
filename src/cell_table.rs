use crate::data::DataSet;
use crate::error::{Error, Result};
use smallvec::SmallVec;
use std::iter;

/// A dense contingency table of counts over some discrete columns of a [`DataSet`].
///
/// Unlike a sparse table keyed by observed states, every cell in the Cartesian product of the
/// columns' categories has a slot here, because the chi-square test needs to visit empty cells
/// too: an empty row or column changes the degrees of freedom.
///
/// The table is meant to be reused: [`CellTable::add_to_table`] resets the counts and rebuilds
/// them for a new set of columns, keeping the allocation.
#[derive(Clone, Debug, Default)]
pub struct CellTable {
    dims: SmallVec<[usize; 6]>,
    cells: Vec<u64>,
}

impl CellTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        CellTable::default()
    }

    /// Resets the table and counts every row of `data` over the given columns.
    ///
    /// Rows with a missing value in any of the selected columns are skipped.
    ///
    /// ```
    /// use indtest::{CellTable, DataSet, Variable};
    ///
    /// let data = DataSet::from_rows(
    ///     vec![Variable::discrete("a", &["0", "1"]), Variable::discrete("b", &["0", "1", "2"])],
    ///     &[vec![0.0, 2.0], vec![1.0, 2.0], vec![0.0, 2.0], vec![1.0, 0.0]],
    /// ).unwrap();
    ///
    /// let mut table = CellTable::new();
    /// table.add_to_table(&data, &[0, 1]).unwrap();
    /// assert_eq!(table.value(&[0, 2]), 2);
    /// assert_eq!(table.num_values(1), 3);
    /// assert_eq!(table.calc_margin(&[0, 0], &[1]), 2);
    /// assert_eq!(table.calc_margin(&[0, 2], &[0]), 3);
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if a selected column doesn't exist or isn't discrete, or holds a category index the
    /// variable doesn't have.
    pub fn add_to_table(&mut self, data: &DataSet, columns: &[usize]) -> Result<()> {
        self.dims.clear();
        for &column in columns {
            if column >= data.num_columns() {
                return Err(Error::DimensionMismatch {
                    expected: data.num_columns(),
                    found: column,
                });
            }
            let variable = data.variable(column);
            if !variable.is_discrete() {
                return Err(Error::NotDiscrete(variable.name().to_owned()));
            }
            self.dims.push(variable.num_categories());
        }

        let size = self.dims.iter().product();
        self.cells.clear();
        self.cells.resize(size, 0);

        'rows: for row in 0..data.num_rows() {
            let mut index = 0;
            for (&column, &dim) in columns.iter().zip(self.dims.iter()) {
                let value = data.get_int(row, column);
                if value < 0 {
                    continue 'rows;
                }
                if value as usize >= dim {
                    return Err(Error::CategoryOutOfRange {
                        variable: data.variable(column).name().to_owned(),
                        index: value,
                    });
                }
                index = index * dim + value as usize;
            }
            self.cells[index] += 1;
        }
        Ok(())
    }

    /// The category count of each dimension.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// The number of categories in dimension `dim`.
    pub fn num_values(&self, dim: usize) -> usize {
        self.dims[dim]
    }

    fn index(&self, coords: &[usize]) -> usize {
        debug_assert_eq!(coords.len(), self.dims.len());
        coords
            .iter()
            .zip(self.dims.iter())
            .fold(0, |index, (&c, &dim)| index * dim + c)
    }

    /// The count in a single cell.
    pub fn value(&self, coords: &[usize]) -> u64 {
        self.cells[self.index(coords)]
    }

    /// Sums every cell whose coordinates match `coords` outside of `marginal_dims`. The entries of
    /// `coords` at the marginalized positions are ignored.
    pub fn calc_margin(&self, coords: &[usize], marginal_dims: &[usize]) -> u64 {
        let mut scratch: SmallVec<[usize; 6]> = SmallVec::from_slice(coords);
        let ranges: SmallVec<[usize; 6]> = marginal_dims.iter().map(|&d| self.dims[d]).collect();
        let mut total = 0;
        for combination in combinations(&ranges) {
            for (&dim, &value) in marginal_dims.iter().zip(combination.iter()) {
                scratch[dim] = value;
            }
            total += self.value(&scratch);
        }
        total
    }
}

/// Iterates over every coordinate in the Cartesian product `0..dims[0] × 0..dims[1] × ...`, with
/// the last coordinate varying fastest.
///
/// An empty `dims` yields exactly one (empty) combination; a zero anywhere in `dims` yields none.
///
/// ```
/// use indtest::cell_table::combinations;
///
/// let all: Vec<Vec<usize>> = combinations(&[2, 2]).map(|c| c.to_vec()).collect();
/// assert_eq!(all, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
/// assert_eq!(combinations(&[]).count(), 1);
/// ```
pub fn combinations(dims: &[usize]) -> impl Iterator<Item = SmallVec<[usize; 6]>> + '_ {
    let mut next: Option<SmallVec<[usize; 6]>> = if dims.iter().all(|&d| d > 0) {
        Some(SmallVec::from_elem(0, dims.len()))
    } else {
        None
    };
    iter::from_fn(move || {
        let current = next.take()?;
        let mut successor = current.clone();
        for pos in (0..dims.len()).rev() {
            successor[pos] += 1;
            if successor[pos] < dims[pos] {
                next = Some(successor);
                break;
            }
            successor[pos] = 0;
        }
        Some(current)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;

    fn three_way() -> DataSet {
        DataSet::from_rows(
            vec![
                Variable::discrete("a", &["0", "1"]),
                Variable::discrete("b", &["0", "1"]),
                Variable::discrete("c", &["0", "1", "2"]),
            ],
            &[
                vec![0.0, 0.0, 0.0],
                vec![0.0, 1.0, 2.0],
                vec![1.0, 1.0, 2.0],
                vec![1.0, 1.0, 1.0],
                vec![1.0, 0.0, -1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn missing_rows_are_skipped() {
        let mut table = CellTable::new();
        table.add_to_table(&three_way(), &[0, 1, 2]).unwrap();
        assert_eq!(table.calc_margin(&[0, 0, 0], &[0, 1, 2]), 4);
        table.add_to_table(&three_way(), &[0, 1]).unwrap();
        assert_eq!(table.calc_margin(&[0, 0], &[0, 1]), 5);
    }

    #[test]
    fn margins_over_several_dims() {
        let mut table = CellTable::new();
        table.add_to_table(&three_way(), &[2, 0, 1]).unwrap();
        assert_eq!(table.dims(), &[3, 2, 2]);
        assert_eq!(table.calc_margin(&[2, 0, 0], &[1, 2]), 2);
        assert_eq!(table.calc_margin(&[0, 1, 1], &[0]), 2);
    }

    #[test]
    fn continuous_columns_are_rejected() {
        let data = DataSet::from_rows(vec![Variable::continuous("x")], &[vec![0.0]]).unwrap();
        assert_eq!(
            CellTable::new().add_to_table(&data, &[0]),
            Err(Error::NotDiscrete("x".into()))
        );
    }

    #[test]
    fn unknown_columns_are_rejected() {
        assert_eq!(
            CellTable::new().add_to_table(&three_way(), &[0, 7]),
            Err(Error::DimensionMismatch {
                expected: 3,
                found: 7
            })
        );
    }

    #[test]
    fn out_of_range_category() {
        let data =
            DataSet::from_rows(vec![Variable::discrete("x", &["a"])], &[vec![3.0]]).unwrap();
        assert!(matches!(
            CellTable::new().add_to_table(&data, &[0]),
            Err(Error::CategoryOutOfRange { index: 3, .. })
        ));
    }
}
