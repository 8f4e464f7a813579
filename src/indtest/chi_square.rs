use super::{log_fact, IndependenceTest, TestResult};
use crate::cell_table::{combinations, CellTable};
use crate::config::TestConfig;
use crate::data::DataSet;
use crate::distribution::chi_square_cdf;
use crate::error::{Error, Result};
use crate::variable::{ConditioningSet, Variable};
use smallvec::SmallVec;
use std::sync::Arc;

/// Pearson's chi-square test of conditional independence for categorical data.
///
/// For each combination of values of the conditioning variables, the counts of `x` against `y`
/// form a two-way table, and each table contributes its own chi-square statistic and degrees of
/// freedom to the totals. Rows and columns that are empty within one table are left out of that
/// table entirely, since they carry no evidence either way; a table with no observations at all
/// contributes nothing.
///
/// If every table turns out to be degenerate, the degrees of freedom would come out as 0 and the
/// chi-squared distribution wouldn't exist. In that case the degrees of freedom are taken to be
/// 1, which makes the statistic of 0 report a p-value of 1 rather than `NaN`.
#[derive(Clone, Debug)]
pub struct ChiSquareTest {
    data: Arc<DataSet>,
    config: TestConfig,
    table: CellTable,
    last: Option<TestResult>,
}

/// The full output of [`ChiSquareTest::calc_chi_square`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct ChiSquareResult {
    /// The chi-square statistic summed over all conditioning combinations.
    pub statistic: f64,
    /// The upper-tail probability of the statistic.
    pub p_value: f64,
    /// Degrees of freedom summed over all conditioning combinations, never less than 1.
    pub degrees_of_freedom: usize,
    /// `true` if `p_value > alpha`.
    pub independent: bool,
}

impl ChiSquareTest {
    /// Builds a test over a discrete data set.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotDiscrete`] if any column is continuous.
    pub fn new(data: Arc<DataSet>, config: TestConfig) -> Result<Self> {
        if let Some(v) = data
            .variables()
            .as_slice()
            .iter()
            .find(|v| !v.is_discrete())
        {
            return Err(Error::NotDiscrete(v.name().to_owned()));
        }
        Ok(ChiSquareTest {
            data,
            config,
            table: CellTable::new(),
            last: None,
        })
    }

    /// The data set this test counts.
    pub fn data(&self) -> &DataSet {
        &self.data
    }

    /// Computes the chi-square statistic for the columns `[x, y, z...]`.
    ///
    /// ```
    /// use indtest::{ChiSquareTest, DataSet, TestConfig, Variable};
    /// use std::sync::Arc;
    ///
    /// let bits = ["0", "1"];
    /// let data = DataSet::from_rows(
    ///     vec![Variable::discrete("a", &bits), Variable::discrete("b", &bits)],
    ///     &[vec![0.0, 0.0], vec![0.0, 0.0], vec![1.0, 1.0], vec![1.0, 1.0]],
    /// ).unwrap();
    /// let mut test = ChiSquareTest::new(Arc::new(data), TestConfig::default()).unwrap();
    ///
    /// let result = test.calc_chi_square(&[0, 1]).unwrap();
    /// assert_eq!(result.statistic, 4.0);
    /// assert_eq!(result.degrees_of_freedom, 1);
    /// ```
    pub fn calc_chi_square(&mut self, columns: &[usize]) -> Result<ChiSquareResult> {
        if columns.len() < 2 {
            return Err(Error::DimensionMismatch {
                expected: 2,
                found: columns.len(),
            });
        }
        self.table.add_to_table(&self.data, columns)?;
        let table = &self.table;

        let (num_rows, num_cols) = (table.num_values(0), table.num_values(1));
        let conditioning_dims: SmallVec<[usize; 6]> = table.dims()[2..].iter().copied().collect();

        let mut coords: SmallVec<[usize; 6]> = SmallVec::from_elem(0, columns.len());
        let mut attested_rows = vec![true; num_rows];
        let mut attested_cols = vec![true; num_cols];
        let mut statistic = 0.0;
        let mut df = 0;

        for combination in combinations(&conditioning_dims) {
            coords[2..].copy_from_slice(&combination);
            let total = table.calc_margin(&coords, &[0, 1]);
            if total == 0 {
                continue;
            }

            attested_rows.iter_mut().for_each(|a| *a = true);
            attested_cols.iter_mut().for_each(|a| *a = true);

            for i in 0..num_rows {
                for j in 0..num_cols {
                    coords[0] = i;
                    coords[1] = j;
                    let row_sum = table.calc_margin(&coords, &[1]);
                    let col_sum = table.calc_margin(&coords, &[0]);
                    if row_sum == 0 {
                        attested_rows[i] = false;
                    }
                    if col_sum == 0 {
                        attested_cols[j] = false;
                    }
                    if row_sum == 0 || col_sum == 0 {
                        continue;
                    }
                    let observed = table.value(&coords) as f64;
                    let expected = (row_sum as f64 * col_sum as f64) / total as f64;
                    statistic += (observed - expected).powi(2) / expected;
                }
            }

            let rows = attested_rows.iter().filter(|&&a| a).count();
            let cols = attested_cols.iter().filter(|&&a| a).count();
            df += rows.saturating_sub(1) * cols.saturating_sub(1);
        }

        if df == 0 {
            df = 1;
        }

        let p_value = 1.0 - chi_square_cdf(statistic, df as f64)?;
        Ok(ChiSquareResult {
            statistic,
            p_value,
            degrees_of_freedom: df,
            independent: p_value > self.config.alpha(),
        })
    }

    /// Returns `true` if the variable in `columns[0]` is determined by the remaining columns:
    /// for every combination of their values that was observed at all, a single category of the
    /// first variable holds at least fraction `p` of the observations.
    pub fn is_determined(&mut self, columns: &[usize], p: f64) -> Result<bool> {
        self.dominated(columns, p, 1)
    }

    /// Like [`ChiSquareTest::is_determined`], but the first variable only needs to be narrowed
    /// down to a choice between two categories: for every observed combination of the remaining
    /// columns, its two most frequent categories together hold at least fraction `p`.
    pub fn is_split_determined(&mut self, columns: &[usize], p: f64) -> Result<bool> {
        self.dominated(columns, p, 2)
    }

    fn dominated(&mut self, columns: &[usize], p: f64, top: usize) -> Result<bool> {
        if columns.is_empty() {
            return Err(Error::EmptyVariableList);
        }
        self.table.add_to_table(&self.data, columns)?;
        let table = &self.table;
        let num_values = table.num_values(0);
        let conditioning_dims: SmallVec<[usize; 6]> = table.dims()[1..].iter().copied().collect();
        let mut coords: SmallVec<[usize; 6]> = SmallVec::from_elem(0, columns.len());
        let mut counts = Vec::with_capacity(num_values);

        for combination in combinations(&conditioning_dims) {
            coords[1..].copy_from_slice(&combination);
            let total = table.calc_margin(&coords, &[0]);
            if total == 0 {
                continue;
            }

            counts.clear();
            for i in 0..num_values {
                coords[0] = i;
                counts.push(table.value(&coords));
            }
            counts.sort_unstable_by(|a, b| b.cmp(a));
            let mass: u64 = counts.iter().take(top).sum();
            if (mass as f64) / (total as f64) < p {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn columns(&self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<Vec<usize>> {
        let index = self.data.variables();
        let (xi, yi, zi) = index.resolve(x, y, z)?;
        Ok(zi.with_pair(xi, yi).to_vec())
    }
}

impl IndependenceTest for ChiSquareTest {
    fn check(&mut self, x: &Variable, y: &Variable, z: &[Variable]) -> Result<TestResult> {
        let columns = self.columns(x, y, z)?;
        let chi = self.calc_chi_square(&columns)?;
        let result = TestResult::new(chi.independent, chi.statistic, chi.p_value)
            .with_degrees_of_freedom(chi.degrees_of_freedom as f64);
        log_fact(&self.config, "Chi Square", x, y, z, &result);
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
        self.data.variables().as_slice()
    }

    fn subset(&self, variables: &[Variable]) -> Result<Box<dyn IndependenceTest>> {
        let indices = self.data.variables().indices_of(variables)?;
        let kept = indices.iter().map(|&i| self.data.variable(i).clone()).collect();
        let data = DataSet::new(kept, self.data.matrix().select_columns(&indices))?;
        Ok(Box::new(ChiSquareTest::new(Arc::new(data), self.config)?))
    }

    /// Uses [`ChiSquareTest::is_determined`] with a threshold of 0.99.
    fn determines(&self, z: &[Variable], x: &Variable) -> Result<bool> {
        let index = self.data.variables();
        let mut columns = vec![index.index_of(x)?];
        let zi = z
            .iter()
            .map(|v| index.index_of(v))
            .collect::<Result<ConditioningSet>>()?;
        columns.extend(zi.iter());
        // Counting needs scratch space, and determines() only borrows the test.
        let mut scratch = self.clone();
        scratch.is_determined(&columns, 0.99)
    }
}
