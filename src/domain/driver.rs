//! Per-bar strategy driver.
//!
//! Glues the signal evaluator, the sizer and the lifecycle manager together.
//! Nothing here aborts a run: missing indicator data, sizing failures and a
//! busy order slot all end with "no order this bar".

use tracing::{debug, warn};

use super::error::BartraderError;
use super::indicator::IndicatorType;
use super::lifecycle::OrderLifecycleManager;
use super::ohlcv::Bar;
use super::order::{Direction, Order, OrderType};
use super::signal::{IntentKind, SignalEvaluator, SignalIntent, StrategyRules};
use super::sizing::Sizer;
use super::snapshot::IndicatorSnapshot;

/// Order placement settings shared by every rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverParams {
    /// Fallback stop distance below the close when the rule gives no stop.
    pub stop_loss_pct: f64,
    pub entry_order: OrderType,
    /// Stop and limit entries are placed this far below the close.
    pub entry_offset_pct: f64,
}

impl Default for DriverParams {
    fn default() -> Self {
        DriverParams {
            stop_loss_pct: 0.02,
            entry_order: OrderType::Market,
            entry_offset_pct: 0.02,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrategyDriver {
    pub rules: StrategyRules,
    pub sizer: Sizer,
    pub params: DriverParams,
    /// Every line the rules may read; evaluation waits until all are warm.
    required: Vec<IndicatorType>,
}

impl StrategyDriver {
    pub fn new(rules: StrategyRules, sizer: Sizer, params: DriverParams) -> Self {
        let required = rules.required_indicators();
        StrategyDriver {
            rules,
            sizer,
            params,
            required,
        }
    }

    pub fn required_indicators(&self) -> &[IndicatorType] {
        &self.required
    }

    /// Run one bar of the strategy. Returns the order submitted to the
    /// lifecycle manager, which the caller forwards to the broker.
    pub fn on_bar(
        &self,
        bar: &Bar,
        snapshot: Result<IndicatorSnapshot, BartraderError>,
        equity: f64,
        lifecycle: &mut OrderLifecycleManager,
    ) -> Option<Order> {
        if let Some(pending) = lifecycle.pending() {
            debug!(date = %bar.date, order_id = pending.id, "order pending, skipping evaluation");
            return None;
        }

        let evaluated = snapshot.and_then(|s| {
            s.require(&self.required)?;
            self.rules.evaluate(&s, lifecycle.position())
        });
        let intent = match evaluated {
            Ok(Some(intent)) => intent,
            Ok(None) => return None,
            Err(e) => {
                debug!(date = %bar.date, error = %e, "no signal");
                return None;
            }
        };

        let placed = match intent.kind {
            IntentKind::Entry => self.enter(bar, &intent, equity, lifecycle),
            IntentKind::Exit => self.exit(bar, &intent, lifecycle),
        };

        match placed {
            Ok(order) => order,
            Err(e) => {
                warn!(date = %bar.date, rationale = %intent.rationale, error = %e, "intent dropped");
                None
            }
        }
    }

    fn enter(
        &self,
        bar: &Bar,
        intent: &SignalIntent,
        equity: f64,
        lifecycle: &mut OrderLifecycleManager,
    ) -> Result<Option<Order>, BartraderError> {
        let close = bar.close;
        let stop = intent
            .stop_hint
            .unwrap_or(close * (1.0 - self.params.stop_loss_pct));
        let size = self.sizer.size(equity, close, Some(stop))?;
        if size <= 0.0 {
            debug!(date = %bar.date, equity, close, stop, "sized to zero, no entry");
            return Ok(None);
        }

        let price = match self.params.entry_order {
            OrderType::Market => None,
            OrderType::Stop | OrderType::Limit => {
                Some(close * (1.0 - self.params.entry_offset_pct))
            }
        };
        let order = lifecycle.submit(
            Direction::Buy,
            size,
            self.params.entry_order,
            price,
            bar.date,
            intent.rationale.clone(),
        )?;
        debug!(
            date = %bar.date,
            order_id = order.id,
            size,
            stop,
            rationale = %intent.rationale,
            "entry submitted"
        );
        Ok(Some(order))
    }

    fn exit(
        &self,
        bar: &Bar,
        intent: &SignalIntent,
        lifecycle: &mut OrderLifecycleManager,
    ) -> Result<Option<Order>, BartraderError> {
        let size = lifecycle.position().size;
        let order = lifecycle.submit(
            Direction::Sell,
            size,
            OrderType::Market,
            None,
            bar.date,
            intent.rationale.clone(),
        )?;
        debug!(
            date = %bar.date,
            order_id = order.id,
            size,
            rationale = %intent.rationale,
            "exit submitted"
        );
        Ok(Some(order))
    }
}
