//! OHLCV bar representation.

use chrono::NaiveDate;

/// One price bar. Bars are immutable once loaded and are always consumed in
/// chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// True when every price is finite and the high/low envelope holds.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite())
            && self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

/// Keep only bars inside `[start, end]`, sorted by date, one bar per date.
/// Returns the admitted bars and the number of duplicates dropped.
pub fn admit_range(bars: &[Bar], start: NaiveDate, end: NaiveDate) -> (Vec<Bar>, usize) {
    let mut admitted: Vec<Bar> = bars
        .iter()
        .filter(|b| b.date >= start && b.date <= end)
        .cloned()
        .collect();
    admitted.sort_by_key(|b| b.date);
    let before = admitted.len();
    admitted.dedup_by_key(|b| b.date);
    let dropped = before - admitted.len();
    (admitted, dropped)
}
