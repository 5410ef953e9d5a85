//! Structured events emitted by the order lifecycle manager.

use chrono::NaiveDate;
use std::fmt;

use crate::domain::order::{Direction, OrderId, OrderStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    OrderAcknowledged {
        date: NaiveDate,
        order_id: OrderId,
        status: OrderStatus,
    },
    OrderFilled {
        date: NaiveDate,
        order_id: OrderId,
        direction: Direction,
        price: f64,
        size: f64,
        /// `price * size`
        value: f64,
        commission: f64,
    },
    OrderFailed {
        date: NaiveDate,
        order_id: OrderId,
        status: OrderStatus,
    },
    TradeClosed {
        date: NaiveDate,
        order_id: OrderId,
        gross_pnl: f64,
        net_pnl: f64,
    },
}

impl Notification {
    pub fn date(&self) -> NaiveDate {
        match self {
            Notification::OrderAcknowledged { date, .. }
            | Notification::OrderFilled { date, .. }
            | Notification::OrderFailed { date, .. }
            | Notification::TradeClosed { date, .. } => *date,
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            Notification::OrderAcknowledged { order_id, .. }
            | Notification::OrderFilled { order_id, .. }
            | Notification::OrderFailed { order_id, .. }
            | Notification::TradeClosed { order_id, .. } => *order_id,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::OrderAcknowledged {
                date,
                order_id,
                status,
            } => write!(f, "{date}, ORDER {order_id} {status}"),
            Notification::OrderFilled {
                date,
                direction,
                price,
                value,
                commission,
                ..
            } => {
                let side = match direction {
                    Direction::Buy => "BUY",
                    Direction::Sell => "SELL",
                };
                write!(
                    f,
                    "{date}, {side} EXECUTED, Price: {price:.2}, Cost: {value:.2}, Comm {commission:.2}"
                )
            }
            Notification::OrderFailed {
                date,
                order_id,
                status,
            } => write!(f, "{date}, ORDER {order_id} {status}"),
            Notification::TradeClosed {
                date,
                gross_pnl,
                net_pnl,
                ..
            } => write!(
                f,
                "{date}, OPERATION PROFIT, GROSS {gross_pnl:.2}, NET {net_pnl:.2}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2005, 3, 14).unwrap()
    }

    #[test]
    fn fill_line() {
        let n = Notification::OrderFilled {
            date: date(),
            order_id: 1,
            direction: Direction::Buy,
            price: 12.5,
            size: 100.0,
            value: 1250.0,
            commission: 1.25,
        };
        assert_eq!(
            n.to_string(),
            "2005-03-14, BUY EXECUTED, Price: 12.50, Cost: 1250.00, Comm 1.25"
        );
    }

    #[test]
    fn trade_line() {
        let n = Notification::TradeClosed {
            date: date(),
            order_id: 2,
            gross_pnl: 4000.0,
            net_pnl: 3796.0,
        };
        assert_eq!(
            n.to_string(),
            "2005-03-14, OPERATION PROFIT, GROSS 4000.00, NET 3796.00"
        );
        assert_eq!(n.order_id(), 2);
        assert_eq!(n.date(), date());
    }

    #[test]
    fn failure_line() {
        let n = Notification::OrderFailed {
            date: date(),
            order_id: 7,
            status: OrderStatus::Margin,
        };
        assert_eq!(n.to_string(), "2005-03-14, ORDER 7 Margin");
    }
}
