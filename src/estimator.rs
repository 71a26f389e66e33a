//! The estimator family shared by every model.
//!
//! An estimator is configured once and then maps a [`BarSeries`] to a parameter
//! bundle. Warnings travel back with the bundle instead of living on the estimator,
//! so `estimate` takes `&self` and one instance can serve several threads.

use crate::bars::BarSeries;
use crate::errors::EstimationResult;
use crate::results::ModelType;

/// A fitted parameter bundle and the warnings raised while fitting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimation<P> {
    /// Fitted parameters
    pub params: P,
    /// Degenerate conditions met during estimation, in the order they occurred
    pub warnings: Vec<String>,
}

impl<P> Estimation<P> {
    /// Bundle parameters with their warnings.
    pub fn new(params: P, warnings: Vec<String>) -> Self {
        Self { params, warnings }
    }

    /// Split into parameters and warnings.
    pub fn into_parts(self) -> (P, Vec<String>) {
        (self.params, self.warnings)
    }
}

/// Estimates one model's parameters from a bar series.
pub trait Estimator {
    /// Parameter bundle produced by this estimator
    type Params;

    /// Which model this estimator fits.
    fn model_type(&self) -> ModelType;

    /// Fit the model to `series`.
    fn estimate(&self, series: &BarSeries) -> EstimationResult<Estimation<Self::Params>>;
}

/// Accumulates warnings for one estimation call, logging each as it is recorded.
#[derive(Debug, Default)]
pub(crate) struct Warnings {
    model: Option<ModelType>,
    messages: Vec<String>,
}

impl Warnings {
    pub(crate) fn for_model(model: ModelType) -> Self {
        Self {
            model: Some(model),
            messages: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        match self.model {
            Some(model) => log::warn!("{}: {}", model, message),
            None => log::warn!("{}", message),
        }
        self.messages.push(message);
    }

    pub(crate) fn finish<P>(self, params: P) -> Estimation<P> {
        Estimation::new(params, self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_keep_order() {
        let mut warnings = Warnings::for_model(ModelType::Gbm);
        warnings.push("first");
        warnings.push(String::from("second"));
        let (params, messages) = warnings.finish(7).into_parts();
        assert_eq!(params, 7);
        assert_eq!(messages, vec!["first", "second"]);
    }
}
