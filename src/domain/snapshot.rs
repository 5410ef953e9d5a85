//! Per-bar indicator snapshot read by the signal evaluators.
//!
//! A snapshot holds the current value and the previous bar's value of every
//! warmed-up line. That one-bar lookback is enough for crossover detection:
//!
//! - `crossed_above(a, b)`: `a > b` now and `a <= b` on the previous bar
//! - `crossed_below(a, b)`: `a < b` now and `a >= b` on the previous bar

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::error::BartraderError;
use crate::domain::indicator::{IndicatorRef, IndicatorType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookback {
    pub current: f64,
    pub previous: Option<f64>,
}

impl Lookback {
    pub fn new(current: f64, previous: Option<f64>) -> Self {
        Lookback { current, previous }
    }
}

/// Something a rule can read from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Close,
    Indicator(IndicatorRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub date: NaiveDate,
    pub close: Lookback,
    lines: HashMap<IndicatorRef, Lookback>,
}

impl IndicatorSnapshot {
    pub fn new(date: NaiveDate, close: Lookback) -> Self {
        IndicatorSnapshot {
            date,
            close,
            lines: HashMap::new(),
        }
    }

    pub fn insert(&mut self, line: IndicatorRef, value: Lookback) {
        self.lines.insert(line, value);
    }

    pub fn with_line(mut self, line: IndicatorRef, value: Lookback) -> Self {
        self.insert(line, value);
        self
    }

    pub fn lookback(&self, operand: Operand) -> Result<Lookback, BartraderError> {
        let lb = match operand {
            Operand::Close => self.close,
            Operand::Indicator(r) => *self
                .lines
                .get(&r)
                .ok_or_else(|| BartraderError::missing(r))?,
        };
        if !lb.current.is_finite() {
            return Err(BartraderError::missing(describe(operand)));
        }
        Ok(lb)
    }

    /// Fails with the first line of `indicators` that is not warmed up.
    pub fn require(&self, indicators: &[IndicatorType]) -> Result<(), BartraderError> {
        for indicator_type in indicators {
            for &field in indicator_type.fields() {
                let line = IndicatorRef {
                    indicator_type: *indicator_type,
                    field,
                };
                self.lookback(Operand::Indicator(line))?;
            }
        }
        Ok(())
    }

    /// Current value of `operand`.
    pub fn value(&self, operand: Operand) -> Result<f64, BartraderError> {
        self.lookback(operand).map(|lb| lb.current)
    }

    pub fn crossed_above(&self, left: Operand, right: Operand) -> Result<bool, BartraderError> {
        let ((lc, lp), (rc, rp)) = self.pair(left, right)?;
        Ok(lc > rc && lp <= rp)
    }

    pub fn crossed_below(&self, left: Operand, right: Operand) -> Result<bool, BartraderError> {
        let ((lc, lp), (rc, rp)) = self.pair(left, right)?;
        Ok(lc < rc && lp >= rp)
    }

    fn pair(
        &self,
        left: Operand,
        right: Operand,
    ) -> Result<((f64, f64), (f64, f64)), BartraderError> {
        Ok((self.with_previous(left)?, self.with_previous(right)?))
    }

    fn with_previous(&self, operand: Operand) -> Result<(f64, f64), BartraderError> {
        let lb = self.lookback(operand)?;
        match lb.previous {
            Some(prev) if prev.is_finite() => Ok((lb.current, prev)),
            _ => Err(BartraderError::missing(format!("{}[-1]", describe(operand)))),
        }
    }
}

fn describe(operand: Operand) -> String {
    match operand {
        Operand::Close => "close".to_string(),
        Operand::Indicator(r) => r.to_string(),
    }
}
