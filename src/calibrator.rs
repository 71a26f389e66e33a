//! # Calibrator
//!
//! [`Calibrator`] runs the enabled estimators against one [`BarSeries`] and gathers
//! their bundles and warnings into a [`CalibrationResult`].
//!
//! A model that fails does not stop the run: its error becomes the warning
//! `"<Model> estimation failed: <reason>"` and its bundle stays `None`.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use stochastic_calibrator::calibrator::Calibrator;
//! use stochastic_calibrator::config::CalibratorConfig;
//! use stochastic_calibrator::generators::{generate_gbm_bars, GeneratorConfig};
//!
//! # fn main() -> Result<(), stochastic_calibrator::errors::EstimationError> {
//! let series = generate_gbm_bars(&GeneratorConfig::default(), 0.08, 0.2)?;
//! let calibrator = Calibrator::new(CalibratorConfig::default())
//!     .with_progress(|message| println!("{}", message));
//! let result = calibrator.calibrate(&series);
//! if let Some(gbm) = &result.gbm {
//!     println!("sigma = {:.3}", gbm.sigma.value);
//! }
//! # Ok(())
//! # }
//! ```

use crate::bars::BarSeries;
use crate::block_bootstrap::BlockBootstrapEstimator;
use crate::config::CalibratorConfig;
use crate::errors::EstimationResult;
use crate::estimator::{Estimation, Estimator};
use crate::garch::GarchEstimator;
use crate::gbm::GbmEstimator;
use crate::heston::HestonEstimator;
use crate::regime_switching::RegimeSwitchingEstimator;
use crate::results::{CalibrationResult, DateRange, ModelType};
use std::fmt;

/// Receives progress messages during a calibration.
pub type ProgressCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Runs the configured estimators and aggregates their output.
pub struct Calibrator {
    config: CalibratorConfig,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Calibrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calibrator")
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CalibratorConfig::default())
    }
}

impl Calibrator {
    /// Create a calibrator without a progress callback.
    pub fn new(config: CalibratorConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Report progress through `callback`: once before each model and once at the end.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    fn report(&self, message: &str) {
        log::info!("{}", message);
        if let Some(callback) = &self.progress {
            callback(message);
        }
    }

    /// Run every enabled model in order. Never fails; see `warnings` for what went wrong.
    pub fn calibrate(&self, series: &BarSeries) -> CalibrationResult {
        let mut result = empty_result(series);
        for &model in &self.config.models {
            self.report(&format!("Estimating {} parameters...", model.label()));
            self.run_model(model, series, &mut result);
        }
        self.report("Calibration complete.");
        result
    }

    /// Run one model, enabled or not, without progress reporting.
    pub fn calibrate_single(&self, series: &BarSeries, model: ModelType) -> CalibrationResult {
        let mut result = empty_result(series);
        self.run_model(model, series, &mut result);
        result
    }

    /// Calibrate several series, keeping input order.
    ///
    /// With the `parallel` feature the series are processed on the rayon pool.
    pub fn calibrate_many(&self, series: &[BarSeries]) -> Vec<CalibrationResult> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            series.par_iter().map(|s| self.calibrate(s)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            series.iter().map(|s| self.calibrate(s)).collect()
        }
    }

    fn run_model(&self, model: ModelType, series: &BarSeries, result: &mut CalibrationResult) {
        let c = &self.config;
        let estimator = c.estimator.clone();
        match model {
            ModelType::Gbm => {
                let outcome = GbmEstimator::new(estimator, c.gbm.clone()).estimate(series);
                result.gbm = record(model, outcome, &mut result.warnings);
            }
            ModelType::Heston => {
                let outcome = HestonEstimator::new(estimator, c.heston.clone()).estimate(series);
                result.heston = record(model, outcome, &mut result.warnings);
            }
            ModelType::Garch => {
                let outcome = GarchEstimator::new(estimator, c.garch.clone()).estimate(series);
                result.garch = record(model, outcome, &mut result.warnings);
            }
            ModelType::RegimeSwitching => {
                let outcome =
                    RegimeSwitchingEstimator::new(estimator, c.regime.clone()).estimate(series);
                result.regime_switching = record(model, outcome, &mut result.warnings);
            }
            ModelType::BlockBootstrap => {
                let outcome = BlockBootstrapEstimator::new(estimator, c.block_bootstrap.clone())
                    .estimate(series);
                result.block_bootstrap = record(model, outcome, &mut result.warnings);
            }
        }
    }
}

fn empty_result(series: &BarSeries) -> CalibrationResult {
    let (start, end) = series.date_range();
    CalibrationResult::new(series.ticker(), series.len(), DateRange { start, end })
}

/// Keep the bundle and its warnings, or turn the error into a warning.
fn record<P>(
    model: ModelType,
    outcome: EstimationResult<Estimation<P>>,
    warnings: &mut Vec<String>,
) -> Option<P> {
    match outcome {
        Ok(estimation) => {
            let (params, model_warnings) = estimation.into_parts();
            warnings.extend(model_warnings);
            Some(params)
        }
        Err(e) => {
            let message = format!("{} estimation failed: {}", model.name(), e);
            log::warn!("{}", message);
            warnings.push(message);
            None
        }
    }
}
