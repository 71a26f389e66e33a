//! Structural guarantees that hold for any input.

use assert_approx_eq::assert_approx_eq;
use chrono::{Duration, NaiveDate};
use stochastic_calibrator::generators::{
    generate_garch_bars, generate_gbm_bars, generate_regime_bars, GeneratorConfig, RegimeSpec,
};
use stochastic_calibrator::*;

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(offset)
}

fn generator(length: usize, seed: u64) -> GeneratorConfig {
    GeneratorConfig {
        length,
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn test_bar_validation() {
    assert!(Bar::new(day(0), 100.0, 101.0, 99.0, 100.5, 1000.0).is_ok());
    assert!(Bar::new(day(0), 100.0, 100.0, 100.0, 100.0, 0.0).is_ok());

    let invalid = [
        (100.0, 99.0, 101.0, 100.0, 1.0),  // high < low
        (102.0, 101.0, 99.0, 100.0, 1.0),  // high < open
        (100.0, 101.0, 99.0, 101.5, 1.0),  // high < close
        (98.0, 101.0, 99.0, 100.0, 1.0),   // low > open
        (100.0, 101.0, 99.5, 99.0, 1.0),   // low > close
        (100.0, 101.0, 99.0, 100.0, -1.0), // negative volume
    ];
    for (open, high, low, close, volume) in invalid {
        assert!(
            matches!(
                Bar::new(day(0), open, high, low, close, volume),
                Err(EstimationError::InvalidBar { .. })
            ),
            "accepted o={} h={} l={} c={} v={}",
            open,
            high,
            low,
            close,
            volume
        );
    }
}

#[test]
fn test_increasing_closes_give_positive_returns() {
    let bars: Vec<Bar> = (0..30)
        .map(|i| {
            let close = 50.0 * 1.01f64.powi(i as i32);
            Bar::new(day(i), close, close * 1.005, close * 0.995, close, 10.0).unwrap()
        })
        .collect();
    let series = BarSeries::new("UP", bars).unwrap();

    assert_eq!(series.log_returns().len(), series.len() - 1);
    assert!(series.log_returns().iter().all(|&r| r > 0.0));
    assert_approx_eq!(series.log_returns()[0], 1.01f64.ln(), 1e-12);
}

#[test]
fn test_garch_persistence_below_one() {
    for (seed, alpha, beta) in [(1, 0.05, 0.94), (2, 0.2, 0.79), (3, 0.0, 0.0)] {
        let series = if alpha + beta > 0.0 {
            generate_garch_bars(&generator(600, seed), 1e-6, alpha, beta).unwrap()
        } else {
            generate_gbm_bars(&generator(600, seed), 0.0, 0.4).unwrap()
        };
        let p = GarchEstimator::default().estimate(&series).unwrap().params;
        assert!(p.persistence.value < 1.0, "seed {}: {}", seed, p.persistence.value);
        assert!(p.unconditional_variance.value > 0.0);
    }
}

#[test]
fn test_regime_output_is_well_formed() {
    let regimes = [
        RegimeSpec {
            mean: 0.0,
            std: 0.01,
        },
        RegimeSpec {
            mean: 0.0,
            std: 0.015,
        },
        RegimeSpec {
            mean: 0.0,
            std: 0.04,
        },
    ];
    let transition = vec![
        vec![0.95, 0.04, 0.01],
        vec![0.05, 0.9, 0.05],
        vec![0.02, 0.08, 0.9],
    ];
    let series = generate_regime_bars(&generator(900, 6), &regimes, &transition).unwrap();
    let estimator = RegimeSwitchingEstimator::new(
        EstimatorConfig::default(),
        RegimeConfig {
            n_regimes: 3,
            n_init: 4,
            ..Default::default()
        },
    );
    let p = estimator.estimate(&series).unwrap().params;

    assert_eq!(p.regimes.len(), 3);
    for row in &p.transition_matrix {
        assert_approx_eq!(row.iter().sum::<f64>(), 1.0, 1e-9);
        assert!(row.iter().all(|&x| x >= 0.0));
    }
    assert_approx_eq!(p.stationary_distribution.iter().sum::<f64>(), 1.0, 1e-9);
    assert!(p.stationary_distribution.iter().all(|&x| x >= 0.0));
    for pair in p.regimes.windows(2) {
        assert!(pair[0].sigma.value <= pair[1].sigma.value);
    }
}

#[test]
fn test_block_size_respects_bounds() {
    let config = BlockBootstrapConfig {
        min_block_size: 8,
        max_block_size: 25,
        ..Default::default()
    };
    for (length, seed) in [(30, 1), (61, 2), (400, 3), (3000, 4)] {
        let series = generate_garch_bars(&generator(length, seed), 2e-6, 0.1, 0.88).unwrap();
        let fit = BlockBootstrapEstimator::new(EstimatorConfig::default(), config.clone())
            .estimate(&series)
            .unwrap();
        let n = series.log_returns().len();
        let block = fit.params.block_size.value;
        assert!(block >= 8.0, "n={} block={}", n, block);
        assert!(block <= 25f64.min((n / 3) as f64), "n={} block={}", n, block);
    }
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let series = generate_gbm_bars(&generator(100, 1), 0.0, 0.2).unwrap();
    let bad = EstimatorConfig {
        confidence_level: 1.5,
        ..Default::default()
    };
    assert!(matches!(
        GbmEstimator::new(bad, GbmConfig::default()).estimate(&series),
        Err(EstimationError::InvalidParameter { .. })
    ));
}
