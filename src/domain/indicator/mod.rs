//! Technical indicator series.
//!
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values
//! - `IndicatorField` / `IndicatorRef`: one scalar line of an indicator

pub mod bollinger;
pub mod rsi;
pub mod sma;

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl IndicatorType {
    pub fn bollinger(period: usize, devfactor: f64) -> Self {
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100: (devfactor * 100.0).round() as u32,
        }
    }

    /// Scalar lines this indicator produces.
    pub fn fields(&self) -> &'static [IndicatorField] {
        match self {
            IndicatorType::Sma(_) | IndicatorType::Rsi(_) => &[IndicatorField::Value],
            IndicatorType::Bollinger { .. } => &[
                IndicatorField::BollingerUpper,
                IndicatorField::BollingerMiddle,
                IndicatorField::BollingerLower,
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
}

/// One scalar line of an indicator, e.g. the lower Bollinger band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

impl IndicatorRef {
    pub fn value(indicator_type: IndicatorType) -> Self {
        IndicatorRef {
            indicator_type,
            field: IndicatorField::Value,
        }
    }

    pub fn sma(period: usize) -> Self {
        Self::value(IndicatorType::Sma(period))
    }

    pub fn rsi(period: usize) -> Self {
        Self::value(IndicatorType::Rsi(period))
    }

    pub fn band(period: usize, devfactor: f64, field: IndicatorField) -> Self {
        IndicatorRef {
            indicator_type: IndicatorType::bollinger(period, devfactor),
            field,
        }
    }
}

impl fmt::Display for IndicatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            IndicatorField::Value => write!(f, "{}", self.indicator_type),
            IndicatorField::BollingerUpper => write!(f, "{}.upper", self.indicator_type),
            IndicatorField::BollingerMiddle => write!(f, "{}.middle", self.indicator_type),
            IndicatorField::BollingerLower => write!(f, "{}.lower", self.indicator_type),
        }
    }
}

/// Scalar value of `field` at `point`, or `None` when the point is still
/// warming up or the field does not belong to the value's shape.
pub fn extract_field(point: &IndicatorPoint, field: IndicatorField) -> Option<f64> {
    if !point.valid {
        return None;
    }
    let v = match (&point.value, field) {
        (IndicatorValue::Simple(v), IndicatorField::Value) => *v,
        (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => *upper,
        (IndicatorValue::Bollinger { middle, .. }, IndicatorField::BollingerMiddle) => *middle,
        (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => *lower,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Compute every requested indicator over `bars`.
pub fn compute_indicators(
    bars: &[Bar],
    types: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut out = HashMap::with_capacity(types.len());
    for t in types {
        if out.contains_key(t) {
            continue;
        }
        let series = match *t {
            IndicatorType::Sma(period) => sma::calculate_sma(bars, period),
            IndicatorType::Rsi(period) => rsi::calculate_rsi(bars, period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => bollinger::calculate_bollinger(bars, period, stddev_mult_x100),
        };
        out.insert(*t, series);
    }
    out
}
