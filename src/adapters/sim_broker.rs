//! Simulated broker: fills orders against subsequent bars.
//!
//! Fill rules, evaluated on the first bar after submission and every bar
//! after that until the order resolves:
//!
//! | order        | triggers when  | fills at           |
//! |--------------|----------------|--------------------|
//! | market       | always         | open               |
//! | buy stop     | high >= price  | max(open, price)   |
//! | buy limit    | low <= price   | min(open, price)   |
//! | sell stop    | low <= price   | min(open, price)   |
//! | sell limit   | high >= price  | max(open, price)   |
//!
//! Commission is `value * commission_rate` on every fill. A buy whose cost
//! plus commission exceeds available cash resolves as `Margin`.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::backtest::BacktestConfig;
use crate::domain::ohlcv::Bar;
use crate::domain::order::{Direction, Fill, Order, OrderStatus, OrderType, StatusUpdate};
use crate::ports::broker_port::BrokerPort;

/// Holdings below this are treated as zero.
const SIZE_EPSILON: f64 = 1e-9;

/// Commission charged on a fill of `trade_value`.
pub fn calculate_commission(trade_value: f64, commission_rate: f64) -> f64 {
    trade_value * commission_rate
}

/// Price at which `order` executes on `bar`, or `None` if it does not
/// trigger.
pub fn fill_price(order: &Order, bar: &Bar) -> Option<f64> {
    match (order.order_type, order.direction, order.price) {
        (OrderType::Market, _, _) => Some(bar.open),
        (OrderType::Stop, Direction::Buy, Some(p)) => (bar.high >= p).then(|| bar.open.max(p)),
        (OrderType::Limit, Direction::Buy, Some(p)) => (bar.low <= p).then(|| bar.open.min(p)),
        (OrderType::Stop, Direction::Sell, Some(p)) => (bar.low <= p).then(|| bar.open.min(p)),
        (OrderType::Limit, Direction::Sell, Some(p)) => (bar.high >= p).then(|| bar.open.max(p)),
        (_, _, None) => None,
    }
}

#[derive(Debug, Clone)]
struct WorkingOrder {
    order: Order,
    bars_seen: usize,
}

#[derive(Debug, Clone)]
pub struct SimulatedBroker {
    cash: f64,
    held: f64,
    last_close: Option<f64>,
    commission_rate: f64,
    order_valid_bars: usize,
    working: Option<WorkingOrder>,
}

impl SimulatedBroker {
    pub fn new(starting_cash: f64, commission_rate: f64) -> Self {
        SimulatedBroker {
            cash: starting_cash,
            held: 0.0,
            last_close: None,
            commission_rate,
            order_valid_bars: 0,
            working: None,
        }
    }

    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(config.starting_cash, config.commission_rate)
            .with_order_valid_bars(config.order_valid_bars)
    }

    /// Cancel untriggered orders after `bars` bars. `0` keeps them working.
    pub fn with_order_valid_bars(mut self, bars: usize) -> Self {
        self.order_valid_bars = bars;
        self
    }

    pub fn held(&self) -> f64 {
        self.held
    }

    fn reject(&self, order: &Order, reason: &str) -> Vec<StatusUpdate> {
        debug!(order_id = order.id, reason, "order rejected");
        vec![
            StatusUpdate::status(order.id, OrderStatus::Submitted, order.created),
            StatusUpdate::status(order.id, OrderStatus::Rejected, order.created),
        ]
    }

    fn execute(&mut self, order: &Order, price: f64, date: NaiveDate) -> StatusUpdate {
        let size = order.requested_size;
        let value = price * size;
        let commission = calculate_commission(value, self.commission_rate);

        match order.direction {
            Direction::Buy => {
                if value + commission > self.cash {
                    debug!(
                        order_id = order.id,
                        cost = value + commission,
                        cash = self.cash,
                        "insufficient cash"
                    );
                    return StatusUpdate::status(order.id, OrderStatus::Margin, date);
                }
                self.cash -= value + commission;
                self.held += size;
            }
            Direction::Sell => {
                self.cash += value - commission;
                self.held -= size;
                if self.held.abs() < SIZE_EPSILON {
                    self.held = 0.0;
                }
            }
        }

        StatusUpdate::completed(
            order.id,
            Fill {
                date,
                price,
                size,
                value,
                commission,
            },
        )
    }
}

impl BrokerPort for SimulatedBroker {
    fn submit(&mut self, order: &Order) -> Vec<StatusUpdate> {
        if self.working.is_some() {
            return self.reject(order, "another order is working");
        }
        if !(order.requested_size.is_finite() && order.requested_size > 0.0) {
            return self.reject(order, "non-positive size");
        }
        if order.order_type != OrderType::Market && order.price.is_none() {
            return self.reject(order, "missing trigger price");
        }
        if order.direction == Direction::Sell && order.requested_size > self.held + SIZE_EPSILON {
            return self.reject(order, "sell exceeds holdings");
        }

        self.working = Some(WorkingOrder {
            order: order.clone(),
            bars_seen: 0,
        });
        vec![
            StatusUpdate::status(order.id, OrderStatus::Submitted, order.created),
            StatusUpdate::status(order.id, OrderStatus::Accepted, order.created),
        ]
    }

    fn process_bar(&mut self, bar: &Bar) -> Vec<StatusUpdate> {
        let mut updates = Vec::new();

        if let Some(mut working) = self.working.take() {
            working.bars_seen += 1;
            match fill_price(&working.order, bar) {
                Some(price) => updates.push(self.execute(&working.order, price, bar.date)),
                None if self.order_valid_bars > 0
                    && working.bars_seen >= self.order_valid_bars =>
                {
                    debug!(order_id = working.order.id, bars = working.bars_seen, "order expired");
                    updates.push(StatusUpdate::status(
                        working.order.id,
                        OrderStatus::Canceled,
                        bar.date,
                    ));
                }
                None => self.working = Some(working),
            }
        }

        self.last_close = Some(bar.close);
        updates
    }

    fn equity(&self) -> f64 {
        self.cash + self.held * self.last_close.unwrap_or(0.0)
    }

    fn cash(&self) -> f64 {
        self.cash
    }
}
