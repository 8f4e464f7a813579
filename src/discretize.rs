//! Turning continuous columns into categorical ones, so that categorical tests can run over
//! mixed data.

use crate::data::DataSet;
use crate::error::{Error, Result};
use crate::variable::Variable;

/// Cutoffs which split `data` into `num_categories` bins holding roughly equal numbers of values.
///
/// The values are sorted, and the `i`th of the `num_categories - 1` cutoffs is the sorted value at
/// position `(n / num_categories) · i`, using integer division.
///
/// ```
/// use indtest::discretize::equal_frequency_break_points;
///
/// let data = [13.0, 1.2, 2.2, 4.5, 12.005, 5.5, 10.1, 7.5, 3.4];
/// assert_eq!(equal_frequency_break_points(&data, 3).unwrap(), vec![4.5, 10.1]);
/// ```
///
/// # Errors
///
/// Fails if `data` is empty or contains `NaN`, or if `num_categories` is zero.
pub fn equal_frequency_break_points(data: &[f64], num_categories: usize) -> Result<Vec<f64>> {
    if num_categories == 0 {
        return Err(Error::DimensionMismatch {
            expected: 1,
            found: 0,
        });
    }
    if data.is_empty() {
        return Err(Error::InsufficientSampleSize {
            sample_size: 0,
            conditioning: 0,
        });
    }
    if data.iter().any(|v| v.is_nan()) {
        return Err(Error::MissingValues(String::new()));
    }

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let step = sorted.len() / num_categories;
    Ok((1..num_categories).map(|i| sorted[step * i]).collect())
}

/// The result of [`discretize`]: a category index per input value, plus the category labels.
#[derive(Clone, Debug, PartialEq)]
pub struct Discretization {
    categories: Vec<usize>,
    labels: Vec<String>,
}

impl Discretization {
    /// The category index assigned to each input value, in input order.
    pub fn categories(&self) -> &[usize] {
        &self.categories
    }

    /// The category labels, indexed by category.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The label assigned to each input value, in input order.
    pub fn category_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories.iter().map(move |&c| self.labels[c].as_str())
    }
}

/// Assigns each value the number of cutoffs at or below it, so that a value equal to a cutoff
/// lands in the higher bin.
///
/// ```
/// use indtest::discretize::discretize;
///
/// let d = discretize(&[1.0, 2.0, 2.5, 3.0, 4.0, 5.0], &[2.5, 3.2], &["lo", "med", "hi"]).unwrap();
/// let labels: Vec<&str> = d.category_labels().collect();
/// assert_eq!(labels, ["lo", "lo", "med", "med", "hi", "hi"]);
/// ```
///
/// # Errors
///
/// Fails if there isn't exactly one more label than there are cutoffs, or if the cutoffs aren't
/// sorted in ascending order.
pub fn discretize<S: AsRef<str>>(
    data: &[f64],
    cutoffs: &[f64],
    labels: &[S],
) -> Result<Discretization> {
    if labels.len() != cutoffs.len() + 1 {
        return Err(Error::DimensionMismatch {
            expected: cutoffs.len() + 1,
            found: labels.len(),
        });
    }
    if cutoffs.windows(2).any(|w| !(w[0] <= w[1])) {
        return Err(Error::UnsortedCutoffs);
    }

    let categories = data
        .iter()
        .map(|&value| cutoffs.partition_point(|&c| c <= value))
        .collect();
    Ok(Discretization {
        categories,
        labels: labels.iter().map(|l| l.as_ref().to_owned()).collect(),
    })
}

/// Replaces a continuous column with its equal-frequency discretization into `num_categories`
/// bins labelled `0`, `1`, ... .
///
/// # Errors
///
/// Fails with [`Error::NotContinuous`] if the column is already discrete, and otherwise as
/// [`equal_frequency_break_points`] does.
pub fn discretize_column(data: &DataSet, column: usize, num_categories: usize) -> Result<DataSet> {
    let variable = data.variable(column);
    if !variable.is_continuous() {
        return Err(Error::NotContinuous(variable.name().to_owned()));
    }
    let values: Vec<f64> = data.matrix().column(column).iter().copied().collect();
    let cutoffs = equal_frequency_break_points(&values, num_categories)
        .map_err(|e| match e {
            Error::MissingValues(_) => Error::MissingValues(variable.name().to_owned()),
            e => e,
        })?;
    let labels: Vec<String> = (0..num_categories).map(|i| i.to_string()).collect();
    let discretized = discretize(&values, &cutoffs, &labels)?;

    let indices: Vec<f64> = discretized.categories().iter().map(|&c| c as f64).collect();
    data.replace_column(
        column,
        Variable::discrete(variable.name(), &labels),
        &indices,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_category_has_no_cutoffs() {
        assert!(equal_frequency_break_points(&[3.0, 1.0], 1)
            .unwrap()
            .is_empty());
        let d = discretize(&[3.0, 1.0], &[], &["all"]).unwrap();
        assert_eq!(d.categories(), &[0, 0]);
    }

    #[test]
    fn invalid_arguments() {
        assert!(equal_frequency_break_points(&[], 3).is_err());
        assert!(equal_frequency_break_points(&[1.0], 0).is_err());
        assert!(equal_frequency_break_points(&[1.0, f64::NAN], 2).is_err());
        assert_eq!(
            discretize(&[1.0], &[2.0, 1.0], &["a", "b", "c"]),
            Err(Error::UnsortedCutoffs)
        );
        assert!(matches!(
            discretize(&[1.0], &[2.0], &["a"]),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn column_is_replaced_with_categories() {
        let rows: Vec<Vec<f64>> = (0..9).map(|i| vec![i as f64, (8 - i) as f64]).collect();
        let data = DataSet::from_rows(
            vec![Variable::continuous("a"), Variable::continuous("b")],
            &rows,
        )
        .unwrap();
        let data = discretize_column(&data, 1, 3).unwrap();
        assert!(data.variable(1).is_discrete());
        assert_eq!(data.variable(1).num_categories(), 3);
        let column: Vec<i64> = (0..9).map(|r| data.get_int(r, 1)).collect();
        assert_eq!(column, vec![2, 2, 2, 1, 1, 1, 0, 0, 0]);
        assert_eq!(
            discretize_column(&data, 1, 3).err(),
            Some(Error::NotContinuous("b".into()))
        );
    }
}
