use indtest::{DataSet, Variable};
use rand::distributions::Distribution;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use statrs::distribution::Normal;

/// Samples a linear Gaussian model over `p` variables named `x0`, `x1`, ... in which every edge
/// `(from, to, coefficient)` has `from < to` and every variable has unit-variance noise.
pub fn linear_gaussian(p: usize, edges: &[(usize, usize, f64)], n: usize, seed: u64) -> DataSet {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            let mut row = vec![0.0; p];
            for to in 0..p {
                let parents: f64 = edges
                    .iter()
                    .filter(|&&(_, t, _)| t == to)
                    .map(|&(from, _, c)| c * row[from])
                    .sum();
                row[to] = parents + noise.sample(&mut rng);
            }
            row
        })
        .collect();
    let variables = (0..p).map(|i| Variable::continuous(format!("x{}", i))).collect();
    DataSet::from_rows(variables, &rows).unwrap()
}

/// Samples indicators of correlated latent factors: indicator `i` loads on factor
/// `groups[i]` with the given loading, and the factors have unit variance and pairwise
/// correlation `factor_correlation`.
#[allow(dead_code)]
pub fn factor_data(
    groups: &[usize],
    loading: f64,
    factor_correlation: f64,
    n: usize,
    seed: u64,
) -> DataSet {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let num_factors = groups.iter().max().map_or(0, |&g| g + 1);
    let shared_weight = factor_correlation.sqrt();
    let own_weight = (1.0 - factor_correlation).sqrt();
    let error_sd = (1.0 - loading * loading).sqrt();

    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            let shared = noise.sample(&mut rng);
            let factors: Vec<f64> = (0..num_factors)
                .map(|_| shared_weight * shared + own_weight * noise.sample(&mut rng))
                .collect();
            groups
                .iter()
                .map(|&g| loading * factors[g] + error_sd * noise.sample(&mut rng))
                .collect()
        })
        .collect();
    let variables = (0..groups.len())
        .map(|i| Variable::continuous(format!("m{}", i)))
        .collect();
    DataSet::from_rows(variables, &rows).unwrap()
}
