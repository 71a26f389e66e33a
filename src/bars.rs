//! Validated OHLCV bars and the immutable bar series consumed by every estimator.

use crate::errors::{EstimationError, EstimationResult};
use chrono::NaiveDate;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One interval of price history.
///
/// Construction enforces `high >= max(open, close)`, `low <= min(open, close)`,
/// `high >= low` and `volume >= 0`. Prices must also be finite and strictly positive,
/// since every estimator works with logarithms of prices.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Bar {
    /// Create a validated bar.
    pub fn new(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> EstimationResult<Self> {
        let invalid = |reason: String| Err(EstimationError::InvalidBar { reason });

        for (name, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if !value.is_finite() || value <= 0.0 {
                return invalid(format!("{} {} on {} must be finite and positive", name, value, date));
            }
        }
        if !volume.is_finite() {
            return invalid(format!("volume {} on {} is not finite", volume, date));
        }
        if high < low {
            return invalid(format!("high {} < low {} on {}", high, low, date));
        }
        if high < open.max(close) {
            return invalid(format!(
                "high {} < max(open, close) {} on {}",
                high,
                open.max(close),
                date
            ));
        }
        if low > open.min(close) {
            return invalid(format!(
                "low {} > min(open, close) {} on {}",
                low,
                open.min(close),
                date
            ));
        }
        if volume < 0.0 {
            return invalid(format!("negative volume {} on {}", volume, date));
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Trading date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Opening price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Highest price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Lowest price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Closing price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Traded volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }
}

/// Ordered bars for one instrument with cached derived arrays.
///
/// The series is immutable once built: the per-field arrays and the log returns
/// (`ln(close[t] / close[t-1])`, length `n - 1`) are computed once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    ticker: String,
    bars: Vec<Bar>,
    opens: Vec<f64>,
    highs: Vec<f64>,
    lows: Vec<f64>,
    closes: Vec<f64>,
    volumes: Vec<f64>,
    log_returns: Vec<f64>,
}

impl BarSeries {
    /// Minimum number of bars in a series.
    pub const MIN_BARS: usize = 2;

    /// Build a series from bars, sorting them by date.
    pub fn new(ticker: impl Into<String>, mut bars: Vec<Bar>) -> EstimationResult<Self> {
        if bars.len() < Self::MIN_BARS {
            return Err(EstimationError::InsufficientData {
                required: Self::MIN_BARS,
                actual: bars.len(),
            });
        }
        bars.sort_by_key(|bar| bar.date);

        let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let log_returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();

        Ok(Self {
            ticker: ticker.into(),
            bars,
            opens,
            highs,
            lows,
            closes,
            volumes,
            log_returns,
        })
    }

    /// Instrument identifier.
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// The bars in date order.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false; a series holds at least [`BarSeries::MIN_BARS`] bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Opening prices.
    pub fn opens(&self) -> &[f64] {
        &self.opens
    }

    /// High prices.
    pub fn highs(&self) -> &[f64] {
        &self.highs
    }

    /// Low prices.
    pub fn lows(&self) -> &[f64] {
        &self.lows
    }

    /// Closing prices.
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// Volumes.
    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// Close-to-close log returns, one fewer than the number of bars.
    pub fn log_returns(&self) -> &[f64] {
        &self.log_returns
    }

    /// First and last trading dates.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        // Construction guarantees at least two bars.
        let first = self.bars[0].date;
        let last = self.bars[self.bars.len() - 1].date;
        (first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_bar_rejects_each_invariant() {
        assert!(Bar::new(day(1), 10.0, 9.0, 9.5, 9.5, 100.0).is_err()); // high < low
        assert!(Bar::new(day(1), 10.0, 10.5, 9.0, 11.0, 100.0).is_err()); // high < close
        assert!(Bar::new(day(1), 10.0, 11.0, 10.2, 10.5, 100.0).is_err()); // low > open
        assert!(Bar::new(day(1), 10.0, 11.0, 9.0, 10.5, -1.0).is_err()); // volume
        assert!(Bar::new(day(1), 10.0, 11.0, 9.0, 10.5, 0.0).is_ok());
    }

    #[test]
    fn test_bar_rejects_non_positive_prices() {
        assert!(matches!(
            Bar::new(day(1), 0.0, 1.0, 0.0, 0.5, 1.0),
            Err(EstimationError::InvalidBar { .. })
        ));
        assert!(Bar::new(day(1), f64::NAN, 1.0, 0.5, 0.8, 1.0).is_err());
    }

    #[test]
    fn test_series_requires_two_bars() {
        let bar = Bar::new(day(1), 10.0, 11.0, 9.0, 10.5, 1.0).unwrap();
        assert!(matches!(
            BarSeries::new("X", vec![bar]),
            Err(EstimationError::InsufficientData {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_series_sorts_and_derives_returns() {
        let bars = vec![
            Bar::new(day(3), 12.0, 12.5, 11.5, 12.1, 1.0).unwrap(),
            Bar::new(day(1), 10.0, 10.5, 9.5, 10.0, 1.0).unwrap(),
            Bar::new(day(2), 10.0, 11.2, 9.9, 11.0, 1.0).unwrap(),
        ];
        let series = BarSeries::new("ABC", bars).unwrap();

        assert_eq!(series.ticker(), "ABC");
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), &[10.0, 11.0, 12.1]);
        assert_eq!(series.log_returns().len(), 2);
        assert_approx_eq!(series.log_returns()[0], (1.1f64).ln(), 1e-12);
        assert_eq!(series.date_range(), (day(1), day(3)));
    }
}
