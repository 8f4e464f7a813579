mod common;

use common::linear_gaussian;
use indtest::discretize::discretize_column;
use indtest::graph::Dag;
use indtest::{
    ChiSquareTest, DataSet, IndTestBootstrap, IndTestCramerT, IndTestDSep, IndTestDeterministic,
    IndTestFisherZ, IndTestPooled, IndependenceTest, TestConfig, Variable,
};
use std::sync::Arc;

/// x0 -> x1 -> x2, with x3 unrelated.
fn chain() -> DataSet {
    linear_gaussian(4, &[(0, 1, 0.8), (1, 2, 0.8)], 300, 7)
}

fn chain_dag(variables: &[Variable]) -> Dag {
    let mut dag = Dag::new();
    for v in variables {
        dag.add_node(v.clone()).unwrap();
    }
    dag.add_edge(&variables[0], &variables[1]).unwrap();
    dag.add_edge(&variables[1], &variables[2]).unwrap();
    dag
}

fn discretized(data: &DataSet) -> DataSet {
    let mut data = data.clone();
    for column in 0..data.num_columns() {
        data = discretize_column(&data, column, 3).unwrap();
    }
    data
}

fn same_p_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || (a - b).abs() <= 1e-9 * a.abs().max(1.0)
}

/// Every query with at most one conditioning variable gets the same answer with `x` and `y`
/// swapped.
fn check_symmetry(test: &mut dyn IndependenceTest) {
    let variables = test.variables().to_vec();
    for x in &variables {
        for y in &variables {
            if x == y {
                continue;
            }
            let mut conditioning: Vec<Vec<Variable>> = vec![Vec::new()];
            conditioning.extend(
                variables
                    .iter()
                    .filter(|z| *z != x && *z != y)
                    .map(|z| vec![z.clone()]),
            );
            for z in &conditioning {
                let forward = test.check(x, y, z).unwrap();
                let backward = test.check(y, x, z).unwrap();
                assert_eq!(
                    forward.is_independent(),
                    backward.is_independent(),
                    "{} vs {} given {:?}",
                    x,
                    y,
                    z
                );
                assert!(
                    same_p_value(forward.p_value(), backward.p_value()),
                    "{} vs {} given {:?}: {} != {}",
                    x,
                    y,
                    z,
                    forward.p_value(),
                    backward.p_value()
                );
            }
        }
    }
}

macro_rules! symmetric {
    ($($name:ident => $build:expr;)*) => {
        $(
        #[test]
        fn $name() {
            let mut test: Box<dyn IndependenceTest> = Box::new($build);
            check_symmetry(&mut *test);
        }
        )*
    }
}

symmetric! {
    fisher_z_is_symmetric => IndTestFisherZ::new(&chain(), TestConfig::default()).unwrap();
    deterministic_is_symmetric => IndTestDeterministic::from_covariance(
        indtest::CovarianceMatrix::from_data(&chain()).unwrap(),
        TestConfig::default(),
    );
    cramer_t_is_symmetric => IndTestCramerT::new(&chain(), TestConfig::default()).unwrap();
    chi_square_is_symmetric =>
        ChiSquareTest::new(Arc::new(discretized(&chain())), TestConfig::default()).unwrap();
    dsep_is_symmetric => IndTestDSep::new(
        Arc::new(chain_dag(chain().variables().as_slice())),
        TestConfig::default(),
    )
    .unwrap();
    bootstrap_is_symmetric =>
        IndTestBootstrap::new(Arc::new(chain()), TestConfig::default(), 5, 200, 3).unwrap();
    pooled_is_symmetric => IndTestPooled::new(vec![
        Box::new(IndTestFisherZ::new(&chain(), TestConfig::default()).unwrap())
            as Box<dyn IndependenceTest>,
        Box::new(IndTestCramerT::new(&chain(), TestConfig::default()).unwrap()),
        Box::new(
            IndTestFisherZ::new(
                &linear_gaussian(4, &[(0, 1, 0.8), (1, 2, 0.8)], 300, 11),
                TestConfig::default(),
            )
            .unwrap(),
        ),
    ])
    .unwrap();
}

#[test]
fn chain_structure_is_recovered() {
    let data = chain();
    let v = data.variables().as_slice().to_vec();
    let mut test = IndTestFisherZ::new(&data, TestConfig::new(0.01).unwrap()).unwrap();
    assert!(test.is_dependent(&v[0], &v[1], &[]).unwrap());
    assert!(test.is_dependent(&v[0], &v[2], &[]).unwrap());
    assert!(test.is_dependent(&v[1], &v[2], &v[..1]).unwrap());
}

#[test]
fn fisher_z_rejects_at_the_nominal_rate() {
    // 200 data sets with no dependence at all; at alpha = 0.05 about 10 should be rejected.
    let mut rejections = 0;
    for seed in 0..200 {
        let data = linear_gaussian(3, &[], 100, seed);
        let v = data.variables().as_slice().to_vec();
        let mut test = IndTestFisherZ::new(&data, TestConfig::default()).unwrap();
        if test.is_dependent(&v[0], &v[1], &v[2..]).unwrap() {
            rejections += 1;
        }
    }
    assert!((2..=22).contains(&rejections), "{} rejections", rejections);
}

#[test]
fn dsep_is_deterministic() {
    let variables = chain().variables().as_slice().to_vec();
    let mut test =
        IndTestDSep::new(Arc::new(chain_dag(&variables)), TestConfig::default()).unwrap();
    for x in &variables {
        for y in &variables {
            for z in [Vec::new(), variables[1..2].to_vec(), variables[3..].to_vec()] {
                let first = test.is_independent(x, y, &z).unwrap();
                let second = test.is_independent(x, y, &z).unwrap();
                assert_eq!(first, second);
            }
        }
    }
    assert!(test.is_independent(&variables[0], &variables[2], &variables[1..2]).unwrap());
    assert!(test.is_dependent(&variables[0], &variables[2], &[]).unwrap());
}

#[test]
fn bootstrap_is_reproducible() {
    let data = Arc::new(linear_gaussian(4, &[(0, 1, 0.3), (1, 2, 0.3), (0, 3, 0.1)], 150, 11));
    let v = data.variables().as_slice().to_vec();
    let build = || {
        IndTestBootstrap::new(data.clone(), TestConfig::default(), 9, 150, 2024).unwrap()
    };
    let (mut a, mut b) = (build(), build());

    let queries: Vec<(usize, usize, Vec<Variable>)> = vec![
        (0, 1, vec![]),
        (0, 2, vec![v[1].clone()]),
        (0, 3, vec![]),
        (2, 3, vec![v[0].clone(), v[1].clone()]),
        (1, 3, vec![v[0].clone()]),
    ];
    for (x, y, z) in &queries {
        let ra = a.check(&v[*x], &v[*y], z).unwrap();
        let rb = b.check(&v[*x], &v[*y], z).unwrap();
        assert_eq!(ra.is_independent(), rb.is_independent());
        assert_eq!(ra.statistic(), rb.statistic());
    }
}

#[test]
fn chi_square_with_empty_conditioning_tables() {
    // z is missing on every row, so every conditioning combination has a zero total.
    let bits = ["0", "1"];
    let rows: Vec<Vec<f64>> = (0..40)
        .map(|i| vec![(i % 2) as f64, ((i / 2) % 2) as f64, -1.0])
        .collect();
    let data = DataSet::from_rows(
        vec![
            Variable::discrete("x", &bits),
            Variable::discrete("y", &bits),
            Variable::discrete("z", &bits),
        ],
        &rows,
    )
    .unwrap();
    let mut test = ChiSquareTest::new(Arc::new(data), TestConfig::default()).unwrap();
    let result = test.calc_chi_square(&[0, 1, 2]).unwrap();
    assert_eq!(result.degrees_of_freedom, 1);
    assert_eq!(result.statistic, 0.0);
    assert!(!result.p_value.is_nan());
    assert!(result.independent);
}
