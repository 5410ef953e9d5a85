//! Position tracking and closed-trade records.

use chrono::NaiveDate;

use super::order::Fill;

/// Sizes below this are treated as zero.
const SIZE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Flat,
    Long,
}

/// The strategy's single net position.
///
/// `side == Long` exactly when `size > 0`; when flat, `size == 0` and there
/// is no entry price or date.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub size: f64,
    pub entry_price: Option<f64>,
    pub entry_date: Option<NaiveDate>,
    /// Commission paid on the fills that opened the current position.
    pub entry_commission: f64,
    /// Gross P&L already realized by partial sells of this position.
    pub realized_gross: f64,
    /// Commission paid on partial sells of this position.
    pub exit_commission: f64,
    /// Size already sold by partial sells of this position.
    pub closed_size: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self::flat()
    }
}

impl Position {
    pub fn flat() -> Self {
        Position {
            side: Side::Flat,
            size: 0.0,
            entry_price: None,
            entry_date: None,
            entry_commission: 0.0,
            realized_gross: 0.0,
            exit_commission: 0.0,
            closed_size: 0.0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_flat(&self) -> bool {
        self.side == Side::Flat
    }

    /// Apply a buy fill. Adding to an open position averages the entry price
    /// by size.
    pub fn apply_buy(&mut self, fill: &Fill) {
        let new_size = self.size + fill.size;
        let entry = match self.entry_price {
            Some(prev) if self.size > 0.0 => (prev * self.size + fill.price * fill.size) / new_size,
            _ => fill.price,
        };
        self.side = Side::Long;
        self.size = new_size;
        self.entry_price = Some(entry);
        if self.entry_date.is_none() {
            self.entry_date = Some(fill.date);
        }
        self.entry_commission += fill.commission;
    }

    /// Apply a sell fill. Returns the completed trade when the fill closes the
    /// position. A smaller fill reduces the position and banks its P&L and
    /// commission, which are folded into the trade that finally closes it.
    pub fn apply_sell(&mut self, fill: &Fill) -> Option<Trade> {
        let entry_price = self.entry_price?;
        let closed = fill.size.min(self.size);
        let remaining = self.size - closed;

        self.realized_gross += (fill.price - entry_price) * closed;
        self.exit_commission += fill.commission;
        self.closed_size += closed;

        if remaining > SIZE_EPSILON {
            self.size = remaining;
            return None;
        }

        let gross_pnl = self.realized_gross;
        let commission = self.entry_commission + self.exit_commission;
        let trade = Trade {
            entry_date: self.entry_date.unwrap_or(fill.date),
            exit_date: fill.date,
            size: self.closed_size,
            entry_price,
            exit_price: fill.price,
            gross_pnl,
            commission,
            net_pnl: gross_pnl - commission,
        };
        *self = Position::flat();
        Some(trade)
    }
}

/// One completed round trip. `size` and the P&L cover every sell that
/// took the position back to flat.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub gross_pnl: f64,
    /// Commission on both legs.
    pub commission: f64,
    pub net_pnl: f64,
}
