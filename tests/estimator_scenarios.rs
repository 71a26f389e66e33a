//! Parameter recovery on synthetic series with known parameters.

use stochastic_calibrator::generators::{
    generate_gbm_bars, generate_heston_bars, generate_regime_bars, GeneratorConfig, HestonSpec,
    RegimeSpec,
};
use stochastic_calibrator::*;

fn generator(length: usize, seed: u64) -> GeneratorConfig {
    GeneratorConfig {
        length,
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn test_gbm_recovers_sigma_on_short_history() {
    for seed in [1, 2, 3] {
        let series = generate_gbm_bars(&generator(300, seed), 0.08, 0.20).unwrap();
        let fit = GbmEstimator::default().estimate(&series).unwrap();
        let sigma = fit.params.sigma.value;
        assert!(
            (sigma - 0.20).abs() <= 0.06,
            "seed {}: sigma = {}",
            seed,
            sigma
        );
        assert!(fit.params.mu.std_error.is_some());
    }
}

#[test]
fn test_every_volatility_method_drives_gbm() {
    let series = generate_gbm_bars(&generator(500, 4), 0.0, 0.3).unwrap();
    for method in VolatilityMethod::ALL {
        let estimator = GbmEstimator::new(
            EstimatorConfig::default(),
            GbmConfig {
                volatility_method: method,
            },
        );
        let sigma = estimator.estimate(&series).unwrap().params.sigma.value;
        assert!((sigma - 0.3).abs() < 0.09, "{:?}: sigma = {}", method, sigma);
    }
}

#[test]
fn test_heston_mean_reversion_is_detected() {
    let spec = HestonSpec {
        mu: 0.05,
        kappa: 6.0,
        theta: 0.05,
        sigma_v: 0.4,
        rho: -0.7,
    };
    let series = generate_heston_bars(&generator(1000, 77), &spec).unwrap();
    let fit = HestonEstimator::default().estimate(&series).unwrap();

    let kappa = fit.params.kappa.value;
    assert!((0.1..=50.0).contains(&kappa), "kappa = {}", kappa);
    assert!(
        !fit.warnings.iter().any(|w| w.contains("no mean reversion")),
        "{:?}",
        fit.warnings
    );
    assert!(fit.params.theta.value > 0.0);
    assert!(fit.params.v0.value > 0.0);
}

#[test]
fn test_garch_on_white_noise_bars() {
    let series = generate_gbm_bars(&generator(1500, 9), 0.0, 0.2).unwrap();
    let fit = GarchEstimator::default().estimate(&series).unwrap();
    let p = &fit.params;

    assert!(p.alpha.value < 0.1, "alpha = {}", p.alpha.value);
    assert!(p.persistence.value < 1.0);
    assert!(!fit.warnings.iter().any(|w| w.contains("non-stationary")));
}

#[test]
fn test_two_separated_regimes() {
    let regimes = [
        RegimeSpec {
            mean: 0.001,
            std: 0.006,
        },
        RegimeSpec {
            mean: -0.002,
            std: 0.03,
        },
    ];
    let transition = vec![vec![0.97, 0.03], vec![0.05, 0.95]];
    let series = generate_regime_bars(&generator(1500, 13), &regimes, &transition).unwrap();

    let fit = RegimeSwitchingEstimator::default().estimate(&series).unwrap();
    let p = &fit.params;

    assert_eq!(p.n_regimes, 2);
    assert!(p.transition_matrix[0][0] > 0.8, "{:?}", p.transition_matrix);
    assert!(p.transition_matrix[1][1] > 0.8, "{:?}", p.transition_matrix);

    // Annualized: 0.006·√252 ≈ 0.095 and 0.03·√252 ≈ 0.476
    assert!((p.regimes[0].sigma.value - 0.095).abs() < 0.03);
    assert!((p.regimes[1].sigma.value - 0.476).abs() < 0.1);
}

#[test]
fn test_block_size_grows_with_clustering() {
    let calm = generate_gbm_bars(&generator(1500, 15), 0.0, 0.2).unwrap();
    let clustered =
        generators::generate_garch_bars(&generator(1500, 15), 2e-6, 0.12, 0.86).unwrap();

    let estimator = BlockBootstrapEstimator::default();
    let calm_lag = estimator.estimate(&calm).unwrap().params.decorrelation_lag.value;
    let clustered_lag = estimator
        .estimate(&clustered)
        .unwrap()
        .params
        .decorrelation_lag
        .value;
    assert!(
        clustered_lag >= calm_lag,
        "clustered {} < calm {}",
        clustered_lag,
        calm_lag
    );
}
