//! # Stochastic Price-Model Calibration
//!
//! Estimates the parameters of five stochastic price models from daily OHLCV bars, each
//! parameter with a standard error and a confidence interval where one can be derived.
//!
//! ## Models
//!
//! - **GBM**: drift and volatility, with a choice of range-based volatility estimators
//! - **Heston**: regression approximation of a mean-reverting variance process on a
//!   Parkinson proxy
//! - **GARCH(1,1)**: Gaussian maximum likelihood with Hessian standard errors
//! - **Regime switching**: Gaussian hidden Markov model fitted by EM with k-means
//!   restarts
//! - **Block bootstrap**: block length for resampling dependent returns
//!
//! Degenerate conditions never fail silently: every estimator returns its warnings
//! alongside the parameter bundle, and the [`Calibrator`] turns per-model failures into
//! warnings so a calibration always produces a (possibly partial) result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stochastic_calibrator::{Calibrator, CalibratorConfig, ModelType};
//! use stochastic_calibrator::generators::{generate_gbm_bars, GeneratorConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let series = generate_gbm_bars(&GeneratorConfig::default(), 0.08, 0.2)?;
//!
//!     let config = CalibratorConfig::default().with_models(&[ModelType::Gbm, ModelType::Garch]);
//!     let result = Calibrator::new(config).calibrate(&series);
//!
//!     if let Some(garch) = &result.garch {
//!         println!("persistence = {:.3}", garch.persistence.value);
//!     }
//!     for warning in &result.warnings {
//!         println!("warning: {}", warning);
//!     }
//!     println!("{}", result.to_json()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Randomness
//!
//! EM restarts are seeded explicitly from [`RegimeConfig::seed`]. Bootstrap intervals
//! draw from a thread-local generator; call [`rng::global_seed`] for reproducible runs.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod bars;
pub mod config;
pub mod errors;
pub mod results;
pub mod rng;

// Numerical building blocks
pub mod bootstrap;
pub mod confidence_intervals;
pub mod kmeans;
pub mod linear_algebra;
pub mod math_utils;
pub mod optimization;
pub mod volatility;

// Estimators
pub mod block_bootstrap;
pub mod estimator;
pub mod garch;
pub mod gbm;
pub mod heston;
pub mod hmm;
pub mod regime_switching;

// Orchestration and tooling
pub mod calibrator;
pub mod cross_validation;
pub mod generators;

// Re-exports for convenience - main public API
pub use bars::{Bar, BarSeries};
pub use calibrator::{Calibrator, ProgressCallback};
pub use config::{
    BlockBootstrapConfig, CalibratorConfig, EstimatorConfig, GarchConfig, GbmConfig,
    HestonConfig, RegimeConfig,
};
pub use errors::{EstimationError, EstimationResult};
pub use estimator::{Estimation, Estimator};
pub use results::{
    BlockBootstrapParameters, CalibrationResult, DateRange, GarchParameters, GbmParameters,
    HestonParameters, ModelType, ParameterEstimate, RegimeParameters, RegimeSwitchingParameters,
};

pub use block_bootstrap::BlockBootstrapEstimator;
pub use garch::GarchEstimator;
pub use gbm::GbmEstimator;
pub use heston::HestonEstimator;
pub use regime_switching::RegimeSwitchingEstimator;

pub use bootstrap::{bootstrap_statistic, BootstrapEstimate, ResamplingScheme};
pub use confidence_intervals::{ConfidenceInterval, ConfidenceIntervalMethod};
pub use cross_validation::{cross_validate_block_size, cross_validate_series};
pub use rng::{clear_global_seed, global_seed, SeededRng};
pub use volatility::{
    estimate_all_volatilities, estimate_volatility, VolatilityEstimate, VolatilityMethod,
};
