mod common;

use common::factor_data;
use indtest::tetrad::{ContinuousTetradTest, TetradTestKind};
use indtest::TestConfig;

fn strict() -> TestConfig {
    TestConfig::new(1e-4).unwrap()
}

macro_rules! scores {
    ($($name:ident: $kind:expr, $groups:expr => $score:expr;)*) => {
        $(
        #[test]
        fn $name() {
            let data = factor_data(&$groups, 0.9, 0.3, 2000, 17);
            let test = ContinuousTetradTest::from_data(&data, $kind, strict()).unwrap();
            let v = test.variables().to_vec();
            assert_eq!(test.tetrad_score(&v[0], &v[1], &v[2], &v[3]).unwrap(), $score);
        }
        )*
    }
}

scores! {
    wishart_one_factor: TetradTestKind::Wishart, [0, 0, 0, 0] => 3;
    bollen_one_factor: TetradTestKind::Bollen, [0, 0, 0, 0] => 3;
    wishart_two_factors: TetradTestKind::Wishart, [0, 0, 1, 1] => 1;
    bollen_two_factors: TetradTestKind::Bollen, [0, 0, 1, 1] => 1;
}

#[test]
fn violated_tetrads_are_decisive() {
    // m0 and m1 share a factor, as do m2 and m3, so only σ02·σ13 = σ03·σ12 holds.
    let data = factor_data(&[0, 0, 1, 1], 0.9, 0.3, 2000, 5);
    for kind in [TetradTestKind::Wishart, TetradTestKind::Bollen] {
        let test = ContinuousTetradTest::from_data(&data, kind, strict()).unwrap();
        let v = test.variables().to_vec();
        assert!(test.tetrad_p_value(&v[0], &v[1], &v[2], &v[3]).unwrap() < 1e-10);
        assert!(test.tetrad_p_value(&v[0], &v[1], &v[3], &v[2]).unwrap() < 1e-10);
        assert!(test.tetrad_holds(&v[0], &v[2], &v[3], &v[1]).unwrap());
        assert!(test.tetrad_score1(&v[0], &v[1], &v[2], &v[3]).unwrap());
        assert!(!test.tetrad_score3(&v[0], &v[1], &v[2], &v[3]).unwrap());
    }
}

#[test]
fn score_ignores_argument_order() {
    let data = factor_data(&[0, 1, 0, 1], 0.9, 0.3, 2000, 23);
    let test = ContinuousTetradTest::from_data(&data, TetradTestKind::Wishart, strict()).unwrap();
    let v = test.variables().to_vec();
    let score = test.tetrad_score(&v[0], &v[1], &v[2], &v[3]).unwrap();
    assert_eq!(score, 1);
    assert_eq!(test.tetrad_score(&v[3], &v[2], &v[1], &v[0]).unwrap(), score);
    assert_eq!(test.tetrad_score(&v[1], &v[3], &v[0], &v[2]).unwrap(), score);
}
