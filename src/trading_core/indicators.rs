//! Technical Indicators
//!
//! Pure functions over a price series ordered oldest to newest. Every
//! function returns a vector aligned with its input, with `None` where the
//! trailing window is not yet full. Inputs shorter than the minimum window
//! fail with `InsufficientData` instead of returning an all-`None` vector.

use crate::error::{Result, TradingError};

/// Default RSI lookback
pub const RSI_PERIOD: usize = 14;
/// Default MACD fast EMA span
pub const MACD_FAST: usize = 12;
/// Default MACD slow EMA span
pub const MACD_SLOW: usize = 26;
/// Default MACD signal EMA span
pub const MACD_SIGNAL: usize = 9;

/// MACD output, aligned with the input series
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

impl Macd {
    /// Latest (macd, signal, histogram) triple
    pub fn last(&self) -> Option<(f64, f64, f64)> {
        let macd = (*self.macd.last()?)?;
        let signal = (*self.signal.last()?)?;
        let histogram = (*self.histogram.last()?)?;
        Some((macd, signal, histogram))
    }
}

fn require(window: usize, available: usize) -> Result<()> {
    if available < window {
        return Err(TradingError::InsufficientData { required: window, available });
    }
    Ok(())
}

fn non_zero(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(TradingError::InvalidParameter(format!("{} must be at least 1", name)));
    }
    Ok(())
}

/// Simple moving average over a trailing window
pub fn moving_average(series: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    non_zero("window", window)?;
    require(window, series.len())?;

    let mut out = vec![None; series.len()];
    let mut sum: f64 = series[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);

    for i in window..series.len() {
        sum += series[i] - series[i - window];
        out[i] = Some(sum / window as f64);
    }

    Ok(out)
}

/// Relative Strength Index using simple rolling means of gains and losses
///
/// RSI = 100 - 100 / (1 + RS), RS = average gain / average loss.
/// The first `period` entries are `None` since they have fewer than
/// `period` price changes behind them. A zero loss average saturates at 100.
pub fn rsi(series: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    non_zero("period", period)?;
    require(period + 1, series.len())?;

    let changes: Vec<(f64, f64)> = series
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .collect();

    let mut out = vec![None; series.len()];
    for i in period..series.len() {
        // changes[k] is the move from bar k to bar k + 1
        let window = &changes[i - period..i];
        let avg_gain = window.iter().map(|(g, _)| g).sum::<f64>() / period as f64;
        let avg_loss = window.iter().map(|(_, l)| l).sum::<f64>() / period as f64;

        let value = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        out[i] = Some(value.clamp(0.0, 100.0));
    }

    Ok(out)
}

/// Exponential moving average, seeded with the simple mean of the first `span` values
pub fn ema(series: &[f64], span: usize) -> Result<Vec<Option<f64>>> {
    non_zero("span", span)?;
    require(span, series.len())?;

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = vec![None; series.len()];
    let mut prev = series[..span].iter().sum::<f64>() / span as f64;
    out[span - 1] = Some(prev);

    for i in span..series.len() {
        prev = alpha * series[i] + (1.0 - alpha) * prev;
        out[i] = Some(prev);
    }

    Ok(out)
}

/// Moving Average Convergence Divergence
///
/// MACD line = EMA(fast) - EMA(slow); signal line = EMA(signal) over the
/// defined part of the MACD line. Needs `slow + signal - 1` values.
pub fn macd(series: &[f64], fast: usize, slow: usize, signal: usize) -> Result<Macd> {
    non_zero("fast", fast)?;
    non_zero("signal", signal)?;
    if fast >= slow {
        return Err(TradingError::InvalidParameter(format!(
            "fast span {} must be shorter than slow span {}",
            fast, slow
        )));
    }
    require(slow + signal - 1, series.len())?;

    let fast_ema = ema(series, fast)?;
    let slow_ema = ema(series, slow)?;

    let macd_line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // The MACD line is defined from slow - 1 onward
    let offset = slow - 1;
    let defined: Vec<f64> = macd_line[offset..].iter().flatten().copied().collect();
    let signal_tail = ema(&defined, signal)?;

    let mut signal_line = vec![None; series.len()];
    for (i, value) in signal_tail.into_iter().enumerate() {
        signal_line[offset + i] = value;
    }

    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    Ok(Macd {
        macd: macd_line,
        signal: signal_line,
        histogram,
    })
}

/// Last defined value of an indicator series
pub fn latest(values: &[Option<f64>]) -> Option<f64> {
    values.last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_moving_average_alignment() {
        let series = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ma = moving_average(&series, 3).unwrap();

        assert_eq!(ma.len(), 5);
        assert_eq!(ma[0], None);
        assert_eq!(ma[1], None);
        assert!(approx(ma[2].unwrap(), 2.0));
        assert!(approx(ma[3].unwrap(), 3.0));
        assert!(approx(ma[4].unwrap(), 4.0));
    }

    #[test]
    fn test_moving_average_insufficient_data() {
        let err = moving_average(&[1.0, 2.0], 3).unwrap_err();
        assert_eq!(err, TradingError::InsufficientData { required: 3, available: 2 });
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            moving_average(&[1.0], 0),
            Err(TradingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rsi_all_gains_saturates() {
        let series: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let values = rsi(&series, 14).unwrap();

        assert!(values[..14].iter().all(Option::is_none));
        assert_eq!(values[14], Some(100.0));
        assert_eq!(latest(&values), Some(100.0));
    }

    #[test]
    fn test_rsi_all_losses_is_zero() {
        let series: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let values = rsi(&series, 14).unwrap();
        assert!(approx(latest(&values).unwrap(), 0.0));
    }

    #[test]
    fn test_rsi_balanced_moves() {
        // Alternating +1 / -1 gives equal gain and loss averages
        let series: Vec<f64> = (0..16).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let values = rsi(&series, 14).unwrap();
        assert!(approx(values[14].unwrap(), 50.0));
    }

    #[test]
    fn test_rsi_bounded() {
        let series: Vec<f64> = (0..200)
            .map(|i| 100.0 + ((i * 37) % 23) as f64 * 1.7 - ((i * 11) % 7) as f64 * 3.1)
            .collect();
        let values = rsi(&series, 14).unwrap();
        for v in values.iter().flatten() {
            assert!((0.0..=100.0).contains(v), "rsi out of range: {}", v);
        }
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        let series = vec![1.0; 14];
        let err = rsi(&series, 14).unwrap_err();
        assert_eq!(err, TradingError::InsufficientData { required: 15, available: 14 });
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let series = [2.0, 4.0, 6.0, 8.0];
        let values = ema(&series, 3).unwrap();

        assert_eq!(values[1], None);
        assert!(approx(values[2].unwrap(), 4.0));
        // alpha = 0.5: 0.5 * 8 + 0.5 * 4
        assert!(approx(values[3].unwrap(), 6.0));
    }

    #[test]
    fn test_macd_constant_series_is_flat() {
        let series = vec![50.0; 40];
        let result = macd(&series, MACD_FAST, MACD_SLOW, MACD_SIGNAL).unwrap();

        assert_eq!(result.macd[24], None);
        assert!(result.macd[25].is_some());
        assert_eq!(result.signal[32], None);
        assert!(result.signal[33].is_some());

        let (m, s, h) = result.last().unwrap();
        assert!(approx(m, 0.0));
        assert!(approx(s, 0.0));
        assert!(approx(h, 0.0));
    }

    #[test]
    fn test_macd_uptrend_positive() {
        let series: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let result = macd(&series, MACD_FAST, MACD_SLOW, MACD_SIGNAL).unwrap();
        let (m, _, _) = result.last().unwrap();
        assert!(m > 0.0);
    }

    #[test]
    fn test_macd_minimum_length() {
        let series = vec![1.0; 33];
        let err = macd(&series, 12, 26, 9).unwrap_err();
        assert_eq!(err, TradingError::InsufficientData { required: 34, available: 33 });

        assert!(matches!(
            macd(&vec![1.0; 60], 26, 12, 9),
            Err(TradingError::InvalidParameter(_))
        ));
    }
}
