//! Order types, status state machine, fills and broker status updates.

use chrono::NaiveDate;
use std::fmt;

pub type OrderId = u64;

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

/// How the broker should execute an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// Fill at the next available price.
    Market,
    /// Trigger once price trades through `price` in the order's direction.
    Stop,
    /// Fill at `price` or better.
    Limit,
}

impl OrderType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "market" => Some(OrderType::Market),
            "stop" => Some(OrderType::Stop),
            "limit" => Some(OrderType::Limit),
            _ => None,
        }
    }
}

/// Order status.
///
/// `Submitted -> Accepted -> {Completed | Canceled | Margin | Rejected}`.
/// A broker may also resolve a `Submitted` order straight to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Handed to the broker, not yet acknowledged.
    Submitted,
    /// Acknowledged and working.
    Accepted,
    /// Fully filled.
    Completed,
    /// Canceled (e.g. expired without triggering).
    Canceled,
    /// Not enough cash to cover cost plus commission.
    Margin,
    /// Refused by the broker.
    Rejected,
}

impl OrderStatus {
    /// Check if this is a terminal status (order is done).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Canceled | Self::Margin | Self::Rejected
        )
    }

    /// Whether the state machine allows `self -> next`.
    ///
    /// Repeated acknowledgments are tolerated; nothing leaves a terminal
    /// state and an accepted order never goes back to `Submitted`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (OrderStatus::Accepted, OrderStatus::Submitted) => false,
            _ => true,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Submitted => "Submitted",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Completed => "Completed",
            OrderStatus::Canceled => "Canceled",
            OrderStatus::Margin => "Margin",
            OrderStatus::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

/// An order owned by the lifecycle manager until it reaches a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub direction: Direction,
    pub order_type: OrderType,
    pub requested_size: f64,
    /// Trigger or limit price. `None` for market orders.
    pub price: Option<f64>,
    pub status: OrderStatus,
    pub created: NaiveDate,
    pub rationale: String,
}

impl Order {
    pub fn is_buy(&self) -> bool {
        self.direction == Direction::Buy
    }
}

/// Execution details for a completed order.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub date: NaiveDate,
    pub price: f64,
    pub size: f64,
    /// `price * size`
    pub value: f64,
    pub commission: f64,
}

/// A status transition reported by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub date: NaiveDate,
    pub fill: Option<Fill>,
}

impl StatusUpdate {
    pub fn status(order_id: OrderId, status: OrderStatus, date: NaiveDate) -> Self {
        StatusUpdate {
            order_id,
            status,
            date,
            fill: None,
        }
    }

    pub fn completed(order_id: OrderId, fill: Fill) -> Self {
        StatusUpdate {
            order_id,
            status: OrderStatus::Completed,
            date: fill.date,
            fill: Some(fill),
        }
    }
}
