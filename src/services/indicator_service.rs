//! Technical indicator calculations.
//!
//! Every function returns series aligned index-for-index with its input.
//! Positions inside an indicator's warm-up window are `None`; short input
//! therefore yields mostly (or entirely) undefined output, never an error.

use crate::models::{IndicatorKind, IndicatorSeries, OhlcvSeries};

pub const RSI_WINDOW: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_WINDOW: usize = 20;
pub const BOLLINGER_K: f64 = 2.0;
pub const STOCH_K_WINDOW: usize = 14;
pub const STOCH_D_WINDOW: usize = 3;

/// Compute every output series of `kind` with the default windows.
///
/// Output order matches `kind.descriptor().lines`.
pub fn compute(kind: IndicatorKind, series: &OhlcvSeries) -> Vec<IndicatorSeries> {
    let lines = kind.descriptor().lines;
    let values: Vec<Vec<Option<f64>>> = match kind {
        IndicatorKind::Rsi => vec![rsi(&series.closes(), RSI_WINDOW)],
        IndicatorKind::Macd => {
            let macd = macd(&series.closes(), MACD_FAST, MACD_SLOW, MACD_SIGNAL);
            vec![macd.line, macd.signal]
        }
        IndicatorKind::BollingerBands => {
            let bands = bollinger_bands(&series.closes(), BOLLINGER_WINDOW, BOLLINGER_K);
            vec![bands.upper, bands.lower]
        }
        IndicatorKind::Stochastic => {
            let stoch = stochastic(
                &series.highs(),
                &series.lows(),
                &series.closes(),
                STOCH_K_WINDOW,
                STOCH_D_WINDOW,
            );
            vec![stoch.k, stoch.d]
        }
    };

    lines
        .iter()
        .zip(values)
        .map(|(style, values)| IndicatorSeries::new(style.label, values))
        .collect()
}

// =============================================================================
// RSI
// =============================================================================

/// Relative Strength Index with Wilder's smoothing.
///
/// The averages are seeded with the plain mean of the first `window` gains
/// and losses, so the first defined value sits at index `window`. After that
/// `avg = (avg * (window - 1) + current) / window`. A zero average loss gives
/// exactly 100.
pub fn rsi(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if window == 0 || closes.len() <= window {
        return out;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let n = window as f64;

    let (sum_gain, sum_loss) = deltas[..window].iter().fold((0.0, 0.0), |(g, l), &d| {
        (g + d.max(0.0), l + (-d).max(0.0))
    });
    let mut avg_gain = sum_gain / n;
    let mut avg_loss = sum_loss / n;
    out[window] = Some(rsi_from_averages(avg_gain, avg_loss));

    // deltas[i] is the change into bar i + 1
    for (i, &d) in deltas.iter().enumerate().skip(window) {
        avg_gain = (avg_gain * (n - 1.0) + d.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-d).max(0.0)) / n;
        out[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

// =============================================================================
// Moving averages
// =============================================================================

/// Simple moving average over the trailing `window` values.
///
/// Defined only where the whole window is defined.
pub fn sma(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    for end in window..=values.len() {
        let slice = &values[end - window..end];
        if slice.iter().all(Option::is_some) {
            let sum: f64 = slice.iter().flatten().sum();
            out[end - 1] = Some(sum / window as f64);
        }
    }
    out
}

/// Exponential moving average with smoothing factor `2 / (period + 1)`.
///
/// Leading undefined inputs are skipped. The average is seeded with the mean
/// of the first `period` defined values, so the first output sits `period - 1`
/// positions after the first defined input.
pub fn ema(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };
    if period == 0 || values.len() - start < period {
        return out;
    }

    let seed_end = start + period;
    let seed: Option<f64> = values[start..seed_end].iter().copied().sum();
    let Some(seed) = seed else {
        return out;
    };

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed / period as f64;
    out[seed_end - 1] = Some(prev);

    for (i, value) in values.iter().enumerate().skip(seed_end) {
        match value {
            Some(v) => {
                prev = alpha * v + (1.0 - alpha) * prev;
                out[i] = Some(prev);
            }
            None => break,
        }
    }

    out
}

// =============================================================================
// MACD
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

/// `line = EMA(fast) - EMA(slow)`, `signal = EMA(line, signal)`.
///
/// The line is undefined before index `slow - 1`; the signal needs a further
/// `signal - 1` bars of line history.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let defined: Vec<Option<f64>> = closes.iter().copied().map(Some).collect();
    let fast_ema = ema(&defined, fast);
    let slow_ema = ema(&defined, slow);

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema(&line, signal);

    Macd { line, signal }
}

// =============================================================================
// Bollinger Bands
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// `middle = SMA(window)`, bands at `middle ± k·σ` with the population
/// standard deviation of the same trailing window.
pub fn bollinger_bands(closes: &[f64], window: usize, k: f64) -> BollingerBands {
    let len = closes.len();
    let mut bands = BollingerBands {
        upper: vec![None; len],
        middle: vec![None; len],
        lower: vec![None; len],
    };
    if window == 0 || len < window {
        return bands;
    }

    for end in window..=len {
        let slice = &closes[end - window..end];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let variance = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / window as f64;
        let std_dev = variance.sqrt();

        let i = end - 1;
        bands.middle[i] = Some(mean);
        bands.upper[i] = Some(mean + k * std_dev);
        bands.lower[i] = Some(mean - k * std_dev);
    }

    bands
}

// =============================================================================
// Stochastic Oscillator
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// `%K = 100 · (close - lowest low) / (highest high - lowest low)` over
/// `k_window` bars, `%D = SMA(%K, d_window)`.
///
/// A flat range (zero denominator) gives `%K = 0`. Values are clamped to
/// `[0, 100]` since bars are not checked for `low <= close <= high`.
pub fn stochastic(highs: &[f64], lows: &[f64], closes: &[f64], k_window: usize, d_window: usize) -> Stochastic {
    let len = closes.len().min(highs.len()).min(lows.len());
    let mut k = vec![None; closes.len()];

    if k_window > 0 && len >= k_window {
        for end in k_window..=len {
            let start = end - k_window;
            let lowest = lows[start..end].iter().copied().fold(f64::INFINITY, f64::min);
            let highest = highs[start..end].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = highest - lowest;

            let value = if range == 0.0 {
                0.0
            } else {
                (100.0 * (closes[end - 1] - lowest) / range).clamp(0.0, 100.0)
            };
            k[end - 1] = Some(value);
        }
    }

    let d = sma(&k, d_window);
    Stochastic { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 10.0 * (i as f64 * 0.7).sin() + i as f64 * 0.3).collect()
    }

    // ---- RSI ---------------------------------------------------------------

    #[test]
    fn rsi_warm_up_is_undefined() {
        let out = rsi(&wavy(30), 14);
        assert_eq!(out.len(), 30);
        assert!(out[..14].iter().all(Option::is_none));
        assert!(out[14..].iter().all(Option::is_some));
    }

    #[test]
    fn rsi_short_series_entirely_undefined() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(rsi(&closes, 14).iter().all(Option::is_none));
        // Exactly `window` closes only give window - 1 deltas
        assert!(rsi(&wavy(14), 14).iter().all(Option::is_none));
    }

    #[test]
    fn rsi_no_losses_is_exactly_100() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        for v in rsi(&closes, 14).into_iter().flatten() {
            assert_eq!(v, 100.0);
        }
        // Flat prices also have zero average loss
        for v in rsi(&[50.0; 20], 14).into_iter().flatten() {
            assert_eq!(v, 100.0);
        }
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        for v in rsi(&closes, 14).into_iter().flatten() {
            assert!(v.abs() < 1e-10, "expected 0, got {v}");
        }
    }

    #[test]
    fn rsi_reference_value() {
        // Wilder's textbook data set
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03, 45.61,
            46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ];
        let out = rsi(&closes, 14);
        let first = out[14].unwrap();
        assert!((first - 70.46).abs() < 0.05, "got {first}");
    }

    #[test]
    fn rsi_always_in_range() {
        for v in rsi(&wavy(200), 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    // ---- EMA / SMA ---------------------------------------------------------

    #[test]
    fn ema_seeded_with_mean() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].into_iter().map(Some).collect();
        let out = ema(&values, 3);
        assert!(out[..2].iter().all(Option::is_none));
        assert!(approx(out[2].unwrap(), 2.0));
        // alpha = 0.5
        assert!(approx(out[3].unwrap(), 3.0));
    }

    #[test]
    fn ema_skips_leading_undefined() {
        let values = vec![None, None, Some(2.0), Some(4.0), Some(6.0)];
        let out = ema(&values, 2);
        assert!(out[..3].iter().all(Option::is_none));
        assert!(approx(out[3].unwrap(), 3.0));
        assert!(approx(out[4].unwrap(), 5.0));
    }

    #[test]
    fn sma_requires_full_window() {
        let values = vec![None, Some(1.0), Some(2.0), Some(3.0)];
        let out = sma(&values, 2);
        assert_eq!(out, vec![None, None, Some(1.5), Some(2.5)]);
    }

    // ---- MACD --------------------------------------------------------------

    #[test]
    fn macd_definition_boundaries() {
        let out = macd(&wavy(60), 12, 26, 9);
        assert_eq!(out.line.iter().position(Option::is_some), Some(25));
        assert_eq!(out.signal.iter().position(Option::is_some), Some(33));
        assert!(out.line[25..].iter().all(Option::is_some));
    }

    #[test]
    fn macd_flat_prices_are_zero() {
        let out = macd(&[100.0; 50], 12, 26, 9);
        for v in out.line.iter().chain(&out.signal).flatten() {
            assert!(approx(*v, 0.0));
        }
    }

    #[test]
    fn macd_short_series_undefined() {
        let out = macd(&wavy(20), 12, 26, 9);
        assert!(out.line.iter().all(Option::is_none));
        assert!(out.signal.iter().all(Option::is_none));
    }

    // ---- Bollinger ---------------------------------------------------------

    #[test]
    fn bollinger_ordering_holds() {
        let bands = bollinger_bands(&wavy(100), 20, 2.0);
        assert!(bands.middle[..19].iter().all(Option::is_none));
        for i in 19..100 {
            let (u, m, l) = (bands.upper[i].unwrap(), bands.middle[i].unwrap(), bands.lower[i].unwrap());
            assert!(l <= m && m <= u, "bad ordering at {i}: {l} {m} {u}");
        }
    }

    #[test]
    fn bollinger_uses_population_std() {
        // mean 2.5, population variance 1.25
        let bands = bollinger_bands(&[1.0, 2.0, 3.0, 4.0], 4, 2.0);
        let expected = 2.5 + 2.0 * 1.25f64.sqrt();
        assert!(approx(bands.upper[3].unwrap(), expected));
        assert!(approx(bands.middle[3].unwrap(), 2.5));
    }

    #[test]
    fn bollinger_flat_collapses() {
        let bands = bollinger_bands(&[7.0; 20], 20, 2.0);
        assert_eq!(bands.upper[19], Some(7.0));
        assert_eq!(bands.lower[19], Some(7.0));
    }

    // ---- Stochastic --------------------------------------------------------

    #[test]
    fn stochastic_in_range_and_aligned() {
        let closes = wavy(80);
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.5).collect();
        let out = stochastic(&highs, &lows, &closes, 14, 3);

        assert_eq!(out.k.iter().position(Option::is_some), Some(13));
        assert_eq!(out.d.iter().position(Option::is_some), Some(15));
        for v in out.k.iter().chain(&out.d).flatten() {
            assert!((0.0..=100.0).contains(v), "stochastic {v} out of range");
        }
    }

    #[test]
    fn stochastic_flat_range_is_zero() {
        let flat = [10.0; 20];
        let out = stochastic(&flat, &flat, &flat, 14, 3);
        assert_eq!(out.k[13], Some(0.0));
        assert_eq!(out.d[15], Some(0.0));
    }

    #[test]
    fn stochastic_clamps_bad_bars() {
        // close above every high in the window
        let highs = [10.0, 11.0, 12.0];
        let lows = [9.0, 9.0, 9.0];
        let closes = [10.0, 10.0, 20.0];
        let out = stochastic(&highs, &lows, &closes, 3, 1);
        assert_eq!(out.k[2], Some(100.0));
    }

    // ---- dispatch ----------------------------------------------------------

    #[test]
    fn compute_labels_follow_descriptor() {
        let series = OhlcvSeries::default();
        for kind in IndicatorKind::ALL {
            let out = compute(kind, &series);
            let labels: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
            let expected: Vec<&str> = kind.descriptor().lines.iter().map(|l| l.label).collect();
            assert_eq!(labels, expected);
            assert!(out.iter().all(|s| s.values.is_empty()));
        }
    }
}
