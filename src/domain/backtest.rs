//! Backtest event loop.
//!
//! Each bar is processed in a fixed order:
//!
//! 1. the broker resolves the working order against the bar
//! 2. its status updates are applied to the lifecycle manager
//! 3. the indicator feed admits the bar
//! 4. the driver evaluates the strategy and may submit an order
//! 5. the broker acknowledges the order, updates are applied again
//! 6. an equity point is recorded at the bar's close
//!
//! An order submitted on bar `t` can therefore fill no earlier than bar `t+1`.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::driver::StrategyDriver;
use super::error::BartraderError;
use super::lifecycle::OrderLifecycleManager;
use super::notification::Notification;
use super::ohlcv::{Bar, admit_range};
use super::order::StatusUpdate;
use super::position::{Position, Trade};
use crate::ports::broker_port::BrokerPort;
use crate::ports::indicator_port::IndicatorFeed;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_cash: f64,
    /// Fraction of traded value charged on every fill.
    pub commission_rate: f64,
    /// Bars an untriggered order stays working. `0` keeps it until canceled.
    pub order_valid_bars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub starting_value: f64,
    pub ending_value: f64,
    pub trades: Vec<Trade>,
    pub notifications: Vec<Notification>,
    pub equity_curve: Vec<EquityPoint>,
    /// Position still held after the last bar, valued into `ending_value`.
    pub open_position: Position,
}

/// Run `driver` over `bars` against `broker`.
///
/// Bars outside `[start_date, end_date]` are ignored; the rest are processed
/// oldest first with duplicate dates dropped.
pub fn run_backtest<F, B>(
    bars: &[Bar],
    feed: &mut F,
    broker: &mut B,
    driver: &StrategyDriver,
    config: &BacktestConfig,
) -> Result<BacktestResult, BartraderError>
where
    F: IndicatorFeed + ?Sized,
    B: BrokerPort + ?Sized,
{
    let (admitted, dropped) = admit_range(bars, config.start_date, config.end_date);
    if dropped > 0 {
        debug!(dropped, "duplicate bars dropped");
    }
    if admitted.is_empty() {
        return Err(BartraderError::NoData {
            start: config.start_date.to_string(),
            end: config.end_date.to_string(),
        });
    }

    let starting_value = broker.equity();
    info!(
        strategy = %driver.rules,
        sizer = driver.sizer.name(),
        bars = admitted.len(),
        "Starting Portfolio Value: {starting_value:.2}"
    );

    let mut lifecycle = OrderLifecycleManager::new();
    let mut equity_curve = Vec::with_capacity(admitted.len());

    for bar in &admitted {
        let updates = broker.process_bar(bar);
        apply_updates(&mut lifecycle, &updates);

        feed.advance(bar);
        let equity = broker.equity();
        if let Some(order) = driver.on_bar(bar, feed.current(), equity, &mut lifecycle) {
            let updates = broker.submit(&order);
            apply_updates(&mut lifecycle, &updates);
        }

        equity_curve.push(EquityPoint {
            date: bar.date,
            equity: broker.equity(),
        });
    }

    let ending_value = broker.equity();
    info!("Final Portfolio Value: {ending_value:.2}");

    Ok(BacktestResult {
        starting_value,
        ending_value,
        trades: lifecycle.trades().to_vec(),
        notifications: lifecycle.notifications().to_vec(),
        equity_curve,
        open_position: lifecycle.position().clone(),
    })
}

fn apply_updates(lifecycle: &mut OrderLifecycleManager, updates: &[StatusUpdate]) {
    for update in updates {
        if let Err(e) = lifecycle.on_status_update(update) {
            warn!(order_id = update.order_id, status = %update.status, error = %e, "status update ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::driver::DriverParams;
    use crate::domain::indicator::IndicatorRef;
    use crate::domain::order::{Fill, Order, OrderStatus};
    use crate::domain::signal::{GoldenCross, StrategyRules};
    use crate::domain::sizing::Sizer;
    use crate::domain::snapshot::{IndicatorSnapshot, Lookback};
    use approx::assert_relative_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn bar(day: u32, price: f64) -> Bar {
        Bar {
            date: date(day),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 100,
        }
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            start_date: date(1),
            end_date: date(31),
            starting_cash: 10_000.0,
            commission_rate: 0.0,
            order_valid_bars: 0,
        }
    }

    /// Reports an SMA(2)/SMA(4) cross on scripted days only.
    struct ScriptedFeed {
        up: Vec<u32>,
        down: Vec<u32>,
        last: Option<Bar>,
    }

    impl IndicatorFeed for ScriptedFeed {
        fn advance(&mut self, bar: &Bar) {
            self.last = Some(bar.clone());
        }

        fn current(&self) -> Result<IndicatorSnapshot, BartraderError> {
            let bar = self.last.as_ref().ok_or_else(|| BartraderError::missing("close"))?;
            let day = chrono::Datelike::day(&bar.date);
            let (fast, prev_fast) = if self.up.contains(&day) {
                (2.0, 0.0)
            } else if self.down.contains(&day) {
                (0.0, 2.0)
            } else {
                (1.0, 1.0)
            };
            Ok(
                IndicatorSnapshot::new(bar.date, Lookback::new(bar.close, Some(bar.close)))
                    .with_line(IndicatorRef::sma(2), Lookback::new(fast, Some(prev_fast)))
                    .with_line(IndicatorRef::sma(4), Lookback::new(1.0, Some(1.0))),
            )
        }
    }

    /// Fills market orders at the next bar's open with no commission.
    struct InstantBroker {
        cash: f64,
        held: f64,
        last_close: f64,
        working: Option<Order>,
    }

    impl BrokerPort for InstantBroker {
        fn submit(&mut self, order: &Order) -> Vec<StatusUpdate> {
            self.working = Some(order.clone());
            vec![StatusUpdate::status(order.id, OrderStatus::Accepted, order.created)]
        }

        fn process_bar(&mut self, bar: &Bar) -> Vec<StatusUpdate> {
            self.last_close = bar.close;
            let Some(order) = self.working.take() else {
                return Vec::new();
            };
            let size = order.requested_size;
            if order.is_buy() {
                self.cash -= bar.open * size;
                self.held += size;
            } else {
                self.cash += bar.open * size;
                self.held -= size;
            }
            vec![StatusUpdate::completed(
                order.id,
                Fill {
                    date: bar.date,
                    price: bar.open,
                    size,
                    value: bar.open * size,
                    commission: 0.0,
                },
            )]
        }

        fn equity(&self) -> f64 {
            self.cash + self.held * self.last_close
        }

        fn cash(&self) -> f64 {
            self.cash
        }
    }

    fn driver() -> StrategyDriver {
        StrategyDriver::new(
            StrategyRules::GoldenCross(GoldenCross {
                short_period: 2,
                long_period: 4,
            }),
            Sizer::Fixed { stake: 10.0 },
            DriverParams::default(),
        )
    }

    fn broker() -> InstantBroker {
        InstantBroker {
            cash: 10_000.0,
            held: 0.0,
            last_close: 0.0,
            working: None,
        }
    }

    #[test]
    fn cross_up_then_down_makes_one_trade() {
        let bars: Vec<Bar> = (1..=10).map(|d| bar(d, 100.0 + d as f64)).collect();
        let mut feed = ScriptedFeed {
            up: vec![2],
            down: vec![6],
            last: None,
        };
        let mut broker = broker();

        let result = run_backtest(&bars, &mut feed, &mut broker, &driver(), &config()).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        // signal on day 2 fills at day 3's open, exit on day 6 fills on day 7
        assert_eq!(trade.entry_date, date(3));
        assert_eq!(trade.exit_date, date(7));
        assert_relative_eq!(trade.gross_pnl, 40.0);
        assert!(result.open_position.is_flat());
        assert_eq!(result.equity_curve.len(), 10);
        assert_relative_eq!(result.starting_value, 10_000.0);
        assert_relative_eq!(result.ending_value, 10_040.0);
    }

    #[test]
    fn open_position_is_left_open() {
        let bars: Vec<Bar> = (1..=5).map(|d| bar(d, 100.0)).collect();
        let mut feed = ScriptedFeed {
            up: vec![2],
            down: vec![],
            last: None,
        };
        let mut broker = broker();
        let result = run_backtest(&bars, &mut feed, &mut broker, &driver(), &config()).unwrap();

        assert!(result.trades.is_empty());
        assert!(result.open_position.is_long());
        assert_relative_eq!(result.open_position.size, 10.0);
    }

    #[test]
    fn bars_outside_range_are_ignored() {
        let bars: Vec<Bar> = (1..=10).map(|d| bar(d, 100.0)).collect();
        let mut feed = ScriptedFeed {
            up: vec![],
            down: vec![],
            last: None,
        };
        let cfg = BacktestConfig {
            start_date: date(3),
            end_date: date(5),
            ..config()
        };
        let result = run_backtest(&bars, &mut feed, &mut broker(), &driver(), &cfg).unwrap();
        assert_eq!(result.equity_curve.len(), 3);
        assert_eq!(result.equity_curve[0].date, date(3));
    }

    #[test]
    fn empty_range_is_no_data() {
        let bars = vec![bar(1, 100.0)];
        let mut feed = ScriptedFeed {
            up: vec![],
            down: vec![],
            last: None,
        };
        let cfg = BacktestConfig {
            start_date: date(10),
            end_date: date(20),
            ..config()
        };
        let err = run_backtest(&bars, &mut feed, &mut broker(), &driver(), &cfg).unwrap_err();
        assert!(matches!(err, BartraderError::NoData { .. }));
    }
}
