//! Indicator feed backed by series computed up front over the whole run.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::error::BartraderError;
use crate::domain::indicator::{
    IndicatorRef, IndicatorSeries, IndicatorType, compute_indicators, extract_field,
};
use crate::domain::ohlcv::Bar;
use crate::domain::snapshot::{IndicatorSnapshot, Lookback};
use crate::ports::indicator_port::IndicatorFeed;

pub struct PrecomputedFeed {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
    series: HashMap<IndicatorType, IndicatorSeries>,
    cursor: Option<usize>,
}

impl PrecomputedFeed {
    /// `bars` must be the chronological sequence the backtest will replay.
    pub fn new(bars: &[Bar], indicators: &[IndicatorType]) -> Self {
        PrecomputedFeed {
            dates: bars.iter().map(|b| b.date).collect(),
            closes: bars.iter().map(|b| b.close).collect(),
            series: compute_indicators(bars, indicators),
            cursor: None,
        }
    }

    fn locate(&self, date: NaiveDate) -> Option<usize> {
        let from = self.cursor.map_or(0, |c| c + 1);
        match self.dates.get(from) {
            Some(d) if *d == date => Some(from),
            _ => self.dates.binary_search(&date).ok(),
        }
    }
}

impl IndicatorFeed for PrecomputedFeed {
    fn advance(&mut self, bar: &Bar) {
        self.cursor = self.locate(bar.date);
    }

    fn current(&self) -> Result<IndicatorSnapshot, BartraderError> {
        let idx = self.cursor.ok_or_else(|| BartraderError::missing("close"))?;
        let prev = idx.checked_sub(1);

        let close = Lookback::new(self.closes[idx], prev.map(|p| self.closes[p]));
        let mut snapshot = IndicatorSnapshot::new(self.dates[idx], close);

        for (indicator_type, series) in &self.series {
            let Some(point) = series.values.get(idx) else {
                continue;
            };
            for &field in indicator_type.fields() {
                let Some(current) = extract_field(point, field) else {
                    continue;
                };
                let previous = prev
                    .and_then(|p| series.values.get(p))
                    .and_then(|pt| extract_field(pt, field));
                snapshot.insert(
                    IndicatorRef {
                        indicator_type: *indicator_type,
                        field,
                    },
                    Lookback::new(current, previous),
                );
            }
        }
        Ok(snapshot)
    }
}
