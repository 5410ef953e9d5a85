//! Broker port trait.
//!
//! The broker executes orders and reports every status change back as a
//! [`StatusUpdate`]. Calls are synchronous: updates are returned to the
//! caller, which feeds them to the lifecycle manager in order.

use crate::domain::ohlcv::Bar;
use crate::domain::order::{Order, StatusUpdate};

pub trait BrokerPort {
    /// Take a new order. Returns its acknowledgment (or rejection).
    fn submit(&mut self, order: &Order) -> Vec<StatusUpdate>;

    /// Process a new bar: resolve any working order against it and mark the
    /// portfolio to its close.
    fn process_bar(&mut self, bar: &Bar) -> Vec<StatusUpdate>;

    /// Cash plus the market value of holdings.
    fn equity(&self) -> f64;

    fn cash(&self) -> f64;
}
