//! Position sizing.
//!
//! Every mode truncates to a whole number of lots: the remainder is dropped,
//! never rounded up, so risk-based sizes never spend more than the budget.

use crate::domain::error::BartraderError;

#[derive(Debug, Clone, PartialEq)]
pub enum Sizer {
    /// Constant quantity on every entry.
    Fixed { stake: f64 },
    /// `equity * percent / 100` worth of the instrument at the entry price.
    Percent { percent: f64, lot_size: f64 },
    /// Risk `equity * risk_fraction` between entry and stop.
    RiskBased { risk_fraction: f64, lot_size: f64 },
}

impl Sizer {
    pub fn name(&self) -> &'static str {
        match self {
            Sizer::Fixed { .. } => "fixed",
            Sizer::Percent { .. } => "percent",
            Sizer::RiskBased { .. } => "risk",
        }
    }

    /// Quantity for a long entry at `entry_price`. `stop_price` is only read
    /// by the risk-based mode.
    pub fn size(
        &self,
        equity: f64,
        entry_price: f64,
        stop_price: Option<f64>,
    ) -> Result<f64, BartraderError> {
        match *self {
            Sizer::Fixed { stake } => Ok(stake),
            Sizer::Percent { percent, lot_size } => {
                check_price(entry_price)?;
                let raw = equity * percent / 100.0 / entry_price;
                Ok(floor_to_lot(raw, lot_size))
            }
            Sizer::RiskBased {
                risk_fraction,
                lot_size,
            } => {
                let stop = stop_price.ok_or(BartraderError::InvalidStopDistance {
                    entry: entry_price,
                    stop: f64::NAN,
                })?;
                let raw = raw_risk_size(equity, risk_fraction, entry_price, stop)?;
                Ok(floor_to_lot(raw, lot_size))
            }
        }
    }
}

/// Un-truncated risk-based quantity: `equity * risk_fraction / (entry - stop)`.
pub fn raw_risk_size(
    equity: f64,
    risk_fraction: f64,
    entry_price: f64,
    stop_price: f64,
) -> Result<f64, BartraderError> {
    check_price(entry_price)?;
    let distance = entry_price - stop_price;
    if !(distance > 0.0) {
        return Err(BartraderError::InvalidStopDistance {
            entry: entry_price,
            stop: stop_price,
        });
    }
    let risk_amount = equity * risk_fraction;
    Ok(risk_amount / distance)
}

/// Truncate `quantity` to a whole number of `lot_size` units.
pub fn floor_to_lot(quantity: f64, lot_size: f64) -> f64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0.0;
    }
    if lot_size <= 0.0 {
        return quantity;
    }
    (quantity / lot_size).floor() * lot_size
}

fn check_price(entry_price: f64) -> Result<(), BartraderError> {
    if !(entry_price.is_finite() && entry_price > 0.0) {
        return Err(BartraderError::InvalidSizingInput {
            reason: format!("entry price {entry_price} must be positive"),
        });
    }
    Ok(())
}
