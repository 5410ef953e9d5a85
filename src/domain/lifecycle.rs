//! Order lifecycle manager.
//!
//! Owns the strategy's position and the single pending-order slot. Orders
//! enter through [`OrderLifecycleManager::submit`] and leave through broker
//! status updates; at most one non-terminal order exists at any time.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::error::BartraderError;
use super::notification::Notification;
use super::order::{Direction, Order, OrderId, OrderStatus, OrderType, StatusUpdate};
use super::position::{Position, Trade};

#[derive(Debug, Clone)]
pub struct OrderLifecycleManager {
    position: Position,
    pending: Option<Order>,
    next_id: OrderId,
    trades: Vec<Trade>,
    notifications: Vec<Notification>,
}

impl Default for OrderLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderLifecycleManager {
    pub fn new() -> Self {
        OrderLifecycleManager {
            position: Position::flat(),
            pending: None,
            next_id: 1,
            trades: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn pending(&self) -> Option<&Order> {
        self.pending.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Place a new order in the pending slot with status `Submitted`.
    pub fn submit(
        &mut self,
        direction: Direction,
        size: f64,
        order_type: OrderType,
        price: Option<f64>,
        date: NaiveDate,
        rationale: impl Into<String>,
    ) -> Result<Order, BartraderError> {
        if let Some(pending) = &self.pending {
            return Err(BartraderError::OrderAlreadyPending { id: pending.id });
        }
        if !(size.is_finite() && size > 0.0) {
            return Err(BartraderError::InvalidOrderSize { size });
        }

        let order = Order {
            id: self.next_id,
            direction,
            order_type,
            requested_size: size,
            price,
            status: OrderStatus::Submitted,
            created: date,
            rationale: rationale.into(),
        };
        self.next_id += 1;

        debug!(
            order_id = order.id,
            ?direction,
            ?order_type,
            size,
            price,
            %date,
            "order submitted"
        );
        self.pending = Some(order.clone());
        Ok(order)
    }

    /// Apply a broker status update to the pending order.
    ///
    /// Returns the trade closed by this update, if any.
    pub fn on_status_update(
        &mut self,
        update: &StatusUpdate,
    ) -> Result<Option<Trade>, BartraderError> {
        let (id, from, direction) = match &self.pending {
            Some(order) if order.id == update.order_id => {
                (order.id, order.status, order.direction)
            }
            _ => return Err(BartraderError::UnknownOrder { id: update.order_id }),
        };
        if !from.can_transition_to(update.status) {
            return Err(BartraderError::InvalidTransition {
                id,
                from,
                to: update.status,
            });
        }

        match update.status {
            OrderStatus::Submitted | OrderStatus::Accepted => {
                if let Some(order) = self.pending.as_mut() {
                    order.status = update.status;
                }
                debug!(order_id = id, status = %update.status, "order acknowledged");
                self.notifications.push(Notification::OrderAcknowledged {
                    date: update.date,
                    order_id: id,
                    status: update.status,
                });
                Ok(None)
            }
            OrderStatus::Completed => {
                let fill = update
                    .fill
                    .as_ref()
                    .ok_or(BartraderError::MissingFill { id })?;
                self.pending = None;

                let filled = Notification::OrderFilled {
                    date: fill.date,
                    order_id: id,
                    direction,
                    price: fill.price,
                    size: fill.size,
                    value: fill.value,
                    commission: fill.commission,
                };
                info!("{filled}");
                self.notifications.push(filled);

                let trade = match direction {
                    Direction::Buy => {
                        self.position.apply_buy(fill);
                        None
                    }
                    Direction::Sell => self.position.apply_sell(fill),
                };

                if let Some(trade) = &trade {
                    let closed = Notification::TradeClosed {
                        date: trade.exit_date,
                        order_id: id,
                        gross_pnl: trade.gross_pnl,
                        net_pnl: trade.net_pnl,
                    };
                    info!("{closed}");
                    self.notifications.push(closed);
                    self.trades.push(trade.clone());
                }
                Ok(trade)
            }
            OrderStatus::Canceled | OrderStatus::Margin | OrderStatus::Rejected => {
                self.pending = None;
                let failed = Notification::OrderFailed {
                    date: update.date,
                    order_id: id,
                    status: update.status,
                };
                warn!("{failed}");
                self.notifications.push(failed);
                Ok(None)
            }
        }
    }
}
