//! Bollinger Bands.
//!
//! - Middle: SMA over n closes
//! - Upper / Lower: Middle ± devfactor × population std-dev (divides by N)
//!
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_bollinger(bars: &[Bar], period: usize, stddev_mult_x100: u32) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let valid = period > 0 && i + 1 >= period;
            let (upper, middle, lower) = if valid {
                let window = &bars[i + 1 - period..=i];
                let n = period as f64;
                let mean = window.iter().map(|b| b.close).sum::<f64>() / n;
                let variance = window.iter().map(|b| (b.close - mean).powi(2)).sum::<f64>() / n;
                let width = mult * variance.sqrt();
                (mean + width, mean, mean - width)
            } else {
                (0.0, 0.0, 0.0)
            };

            IndicatorPoint {
                date: bar.date,
                valid,
                value: IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}
