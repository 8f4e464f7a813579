use crate::data::DataSet;
use crate::error::{Error, Result};
use nalgebra::DMatrix;

/// Every fourth central moment `E[(x_a - μ_a)(x_b - μ_b)(x_c - μ_c)(x_d - μ_d)]` of a data set.
///
/// The moment doesn't depend on the order of its indices, so only one value is stored per
/// multiset `{a, b, c, d}`: `C(p + 3, 4)` values for `p` variables, packed by ranking the sorted
/// indices `a ≤ b ≤ c ≤ d` as the combination `{a, b + 1, c + 2, d + 3}`.
///
/// Building this takes time proportional to `p⁴ · n / 24`, which is why it's done once.
#[derive(Clone, Debug)]
pub struct FourthMoments {
    dimension: usize,
    values: Vec<f64>,
}

impl FourthMoments {
    /// Computes every fourth moment of a continuous data set.
    ///
    /// ```
    /// use indtest::tetrad::FourthMoments;
    /// use indtest::{DataSet, Variable};
    ///
    /// let data = DataSet::from_rows(
    ///     vec![Variable::continuous("a"), Variable::continuous("b")],
    ///     &[vec![1.0, 0.0], vec![-1.0, 2.0]],
    /// ).unwrap();
    /// let m = FourthMoments::new(&data).unwrap();
    /// assert_eq!(m.get(0, 0, 0, 0), 1.0);
    /// assert_eq!(m.get(1, 0, 1, 0), 1.0);
    /// assert_eq!(m.get(0, 1, 1, 1), -1.0);
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if a column is discrete or has missing or infinite values, or if there are no rows.
    pub fn new(data: &DataSet) -> Result<Self> {
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
        if rows == 0 {
            return Err(Error::InsufficientSampleSize {
                sample_size: 0,
                conditioning: 0,
            });
        }

        let centered = center(data.matrix());
        let p = data.num_columns();
        let mut values = vec![0.0; choose(p + 3, 4)];
        let mut ab = vec![0.0; rows];
        let mut abc = vec![0.0; rows];
        for d in 0..p {
            for c in 0..=d {
                for b in 0..=c {
                    for (t, ab_t) in ab.iter_mut().enumerate() {
                        *ab_t = centered[(t, b)] * centered[(t, c)];
                    }
                    for a in 0..=b {
                        for (t, abc_t) in abc.iter_mut().enumerate() {
                            *abc_t = ab[t] * centered[(t, a)];
                        }
                        let sum: f64 = abc
                            .iter()
                            .enumerate()
                            .map(|(t, v)| v * centered[(t, d)])
                            .sum();
                        values[rank(a, b, c, d)] = sum / rows as f64;
                    }
                }
            }
        }

        Ok(FourthMoments {
            dimension: p,
            values,
        })
    }

    /// The number of variables.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The fourth central moment over four column indices, in any order.
    pub fn get(&self, a: usize, b: usize, c: usize, d: usize) -> f64 {
        let mut i = [a, b, c, d];
        i.sort_unstable();
        self.values[rank(i[0], i[1], i[2], i[3])]
    }
}

fn center(m: &DMatrix<f64>) -> DMatrix<f64> {
    let means = m.row_mean();
    let mut centered = m.clone();
    for (mut column, mean) in centered.column_iter_mut().zip(means.iter()) {
        column.add_scalar_mut(-mean);
    }
    centered
}

fn rank(a: usize, b: usize, c: usize, d: usize) -> usize {
    debug_assert!(a <= b && b <= c && c <= d);
    choose(a, 1) + choose(b + 1, 2) + choose(c + 2, 3) + choose(d + 3, 4)
}

fn choose(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ranks_are_dense_and_unique() {
        let p = 5;
        let mut seen = vec![false; choose(p + 3, 4)];
        for d in 0..p {
            for c in 0..=d {
                for b in 0..=c {
                    for a in 0..=b {
                        let r = rank(a, b, c, d);
                        assert!(!seen[r], "rank {} repeated", r);
                        seen[r] = true;
                    }
                }
            }
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn matches_direct_computation() {
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let t = i as f64;
                vec![t.sin(), (t * 0.7).cos(), t * 0.1]
            })
            .collect();
        let data = DataSet::from_rows(
            vec![
                Variable::continuous("a"),
                Variable::continuous("b"),
                Variable::continuous("c"),
            ],
            &rows,
        )
        .unwrap();
        let m = FourthMoments::new(&data).unwrap();
        let centered = center(data.matrix());
        let direct = |a: usize, b: usize, c: usize, d: usize| {
            (0..20)
                .map(|t| {
                    centered[(t, a)] * centered[(t, b)] * centered[(t, c)] * centered[(t, d)]
                })
                .sum::<f64>()
                / 20.0
        };
        assert_abs_diff_eq!(m.get(2, 0, 1, 0), direct(0, 0, 1, 2), epsilon = 1e-12);
        assert_abs_diff_eq!(m.get(1, 2, 2, 1), direct(1, 1, 2, 2), epsilon = 1e-12);
        assert_eq!(m.dimension(), 3);
    }
}
