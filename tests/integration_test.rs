//! End-to-end tests through the public API: rule sets, sizing, the lifecycle
//! manager and the simulated broker wired together by the backtest loop.

mod common;

use approx::assert_relative_eq;
use bartrader::adapters::precomputed_feed::PrecomputedFeed;
use bartrader::adapters::sim_broker::SimulatedBroker;
use bartrader::domain::backtest::{BacktestResult, run_backtest};
use bartrader::domain::driver::{DriverParams, StrategyDriver};
use bartrader::domain::error::BartraderError;
use bartrader::domain::indicator::{IndicatorField, IndicatorRef};
use bartrader::domain::lifecycle::OrderLifecycleManager;
use bartrader::domain::notification::Notification;
use bartrader::domain::order::{Direction, OrderStatus, OrderType, StatusUpdate};
use bartrader::domain::signal::{
    BandReversion, ExitGrouping, GoldenCross, IntentKind, MomentumOscillator, SignalEvaluator,
    StrategyRules,
};
use bartrader::domain::sizing::Sizer;
use bartrader::domain::snapshot::{IndicatorSnapshot, Lookback};
use bartrader::ports::broker_port::BrokerPort;
use bartrader::ports::indicator_port::IndicatorFeed;
use common::*;
use proptest::prelude::*;

fn golden_cross(short_period: usize, long_period: usize) -> StrategyRules {
    StrategyRules::GoldenCross(GoldenCross {
        short_period,
        long_period,
    })
}

fn percent_sizer() -> Sizer {
    Sizer::Percent {
        percent: 10.0,
        lot_size: 1.0,
    }
}

fn backtest(bars: &[Bar], rules: StrategyRules, sizer: Sizer, commission_rate: f64) -> BacktestResult {
    let config = bt_config(bars, commission_rate);
    let driver = StrategyDriver::new(rules, sizer, DriverParams::default());
    let mut feed = PrecomputedFeed::new(bars, driver.required_indicators());
    let mut broker = SimulatedBroker::from_config(&config);
    run_backtest(bars, &mut feed, &mut broker, &driver, &config).unwrap()
}

fn apply(mgr: &mut OrderLifecycleManager, updates: Vec<StatusUpdate>) {
    for update in &updates {
        mgr.on_status_update(update).unwrap();
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn risk_sizing_on_one_point_stop() {
        let sizer = Sizer::RiskBased {
            risk_fraction: 0.02,
            lot_size: 1.0,
        };
        assert_relative_eq!(sizer.size(100_000.0, 50.0, Some(49.0)).unwrap(), 2000.0);
    }

    #[test]
    fn band_reversion_enters_then_exits() {
        let rules = StrategyRules::BandReversion(BandReversion {
            band_period: 20,
            devfactor: 2.0,
        });
        let band = |field, value| (IndicatorRef::band(20, 2.0, field), Lookback::new(value, None));
        let snap = |close: f64, lower: f64, upper: f64| {
            let (l, lv) = band(IndicatorField::BollingerLower, lower);
            let (u, uv) = band(IndicatorField::BollingerUpper, upper);
            IndicatorSnapshot::new(base_date(), Lookback::new(close, None))
                .with_line(l, lv)
                .with_line(u, uv)
        };

        let mut mgr = OrderLifecycleManager::new();
        let entry = rules
            .evaluate(&snap(51.0, 50.0, 55.0), mgr.position())
            .unwrap()
            .unwrap();
        assert_eq!(entry.kind, IntentKind::Entry);
        assert_eq!(entry.stop_hint, Some(50.0));

        let order = mgr
            .submit(Direction::Buy, 100.0, OrderType::Market, None, base_date(), "entry")
            .unwrap();
        let mut broker = SimulatedBroker::new(100_000.0, 0.0);
        apply(&mut mgr, broker.submit(&order));
        apply(&mut mgr, broker.process_bar(&make_bar(base_date(), 51.0)));
        assert!(mgr.position().is_long());

        let exit = rules
            .evaluate(&snap(48.0, 45.0, 55.0), mgr.position())
            .unwrap()
            .unwrap();
        assert_eq!(exit.kind, IntentKind::Exit);
    }

    #[test]
    fn golden_cross_round_trip() {
        let bars = bars_from_closes(&rise_and_fall());
        let result = backtest(&bars, golden_cross(5, 20), percent_sizer(), 0.001);

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        // signal on the first rising close, filled at the next open
        assert_eq!(trade.entry_date, bars[31].date);
        assert_relative_eq!(trade.entry_price, 102.0);
        assert_relative_eq!(trade.size, 99.0);
        assert!(trade.exit_date > bars[60].date);
        assert!(result.open_position.is_flat());

        assert_relative_eq!(
            trade.gross_pnl,
            (trade.exit_price - trade.entry_price) * trade.size,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            result.ending_value,
            result.starting_value + trade.net_pnl,
            epsilon = 1e-6
        );
    }

    #[test]
    fn second_submission_while_pending_fails() {
        let mut mgr = OrderLifecycleManager::new();
        let first = mgr
            .submit(Direction::Buy, 10.0, OrderType::Market, None, base_date(), "first")
            .unwrap();
        let err = mgr
            .submit(Direction::Buy, 10.0, OrderType::Market, None, base_date(), "second")
            .unwrap_err();
        assert!(matches!(err, BartraderError::OrderAlreadyPending { id } if id == first.id));
        assert!(mgr.position().is_flat());
    }

    #[test]
    fn completed_round_trip_books_commission_on_both_legs() {
        let mut mgr = OrderLifecycleManager::new();
        let mut broker = SimulatedBroker::new(200_000.0, 0.001);
        let day1 = base_date();
        let day2 = day1.succ_opt().unwrap();

        let buy = mgr
            .submit(Direction::Buy, 2000.0, OrderType::Market, None, day1, "entry")
            .unwrap();
        apply(&mut mgr, broker.submit(&buy));
        apply(&mut mgr, broker.process_bar(&make_bar(day1, 50.0)));
        assert_relative_eq!(mgr.position().size, 2000.0);

        let sell = mgr
            .submit(Direction::Sell, 2000.0, OrderType::Market, None, day1, "exit")
            .unwrap();
        apply(&mut mgr, broker.submit(&sell));
        apply(&mut mgr, broker.process_bar(&make_bar(day2, 52.0)));

        let trade = &mgr.trades()[0];
        assert_relative_eq!(trade.gross_pnl, 4000.0);
        assert_relative_eq!(trade.commission, 204.0, epsilon = 1e-9);
        assert_relative_eq!(trade.net_pnl, 3796.0, epsilon = 1e-9);
        assert_relative_eq!(broker.cash(), 203_796.0, epsilon = 1e-6);
        assert!(mgr.position().is_flat());
    }

    #[test]
    fn rejection_frees_the_slot() {
        let mut mgr = OrderLifecycleManager::new();
        let mut broker = SimulatedBroker::new(100_000.0, 0.0);

        // nothing held, so the broker refuses the sell
        let sell = mgr
            .submit(Direction::Sell, 5.0, OrderType::Market, None, base_date(), "exit")
            .unwrap();
        apply(&mut mgr, broker.submit(&sell));

        assert!(!mgr.has_pending());
        assert!(mgr.position().is_flat());
        assert!(matches!(
            mgr.notifications().last(),
            Some(Notification::OrderFailed {
                status: OrderStatus::Rejected,
                ..
            })
        ));
        assert!(
            mgr.submit(Direction::Buy, 5.0, OrderType::Market, None, base_date(), "retry")
                .is_ok()
        );
    }
}

mod engine {
    use super::*;

    #[test]
    fn no_entry_before_every_line_is_warm() {
        // the fast cross happens long before SMA(60) exists
        let bars = bars_from_closes(&rise_and_fall());
        let rules = StrategyRules::MomentumOscillator(MomentumOscillator {
            fast_period: 2,
            short_period: 5,
            long_period: 60,
            rsi_period: 3,
            rsi_overbought: 65.0,
            rsi_oversold: 101.0,
            band_period: 5,
            devfactor: 2.0,
            exit_grouping: ExitGrouping::AsWritten,
        });
        let result = backtest(&bars, rules, percent_sizer(), 0.0);
        for trade in &result.trades {
            assert!(trade.entry_date > bars[59].date);
        }
    }

    #[test]
    fn margin_leaves_position_flat() {
        let bars = bars_from_closes(&rise_and_fall());
        let result = backtest(&bars, golden_cross(5, 20), Sizer::Fixed { stake: 1e6 }, 0.0);

        assert!(result.trades.is_empty());
        assert!(result.open_position.is_flat());
        assert!(result.notifications.iter().any(|n| matches!(
            n,
            Notification::OrderFailed {
                status: OrderStatus::Margin,
                ..
            }
        )));
        assert_relative_eq!(result.ending_value, 100_000.0);
    }

    #[test]
    fn equity_curve_has_one_point_per_bar() {
        let bars = bars_from_closes(&rise_and_fall());
        let result = backtest(&bars, golden_cross(5, 20), percent_sizer(), 0.001);
        assert_eq!(result.equity_curve.len(), bars.len());
        assert_eq!(result.equity_curve[0].date, bars[0].date);
        assert_relative_eq!(
            result.equity_curve.last().unwrap().equity,
            result.ending_value
        );
    }

    #[test]
    fn evaluation_is_idempotent() {
        let bars = bars_from_closes(&rise_and_fall());
        let rules = golden_cross(5, 20);
        let mut feed = PrecomputedFeed::new(&bars, &rules.required_indicators());
        let mgr = OrderLifecycleManager::new();
        for bar in &bars {
            feed.advance(bar);
            let snap = feed.current().unwrap();
            let first = rules.evaluate(&snap, mgr.position()).ok().flatten();
            let second = rules.evaluate(&snap, mgr.position()).ok().flatten();
            assert_eq!(first, second);
        }
    }
}

fn rules_strategy() -> impl Strategy<Value = StrategyRules> {
    prop_oneof![
        (2usize..6, 6usize..15).prop_map(|(s, l)| golden_cross(s, l)),
        (3usize..12).prop_map(|p| StrategyRules::BandReversion(BandReversion {
            band_period: p,
            devfactor: 2.0,
        })),
        (2usize..5, prop::bool::ANY).prop_map(|(rsi, grouped)| {
            StrategyRules::MomentumOscillator(MomentumOscillator {
                fast_period: 2,
                short_period: 3,
                long_period: 8,
                rsi_period: rsi,
                rsi_overbought: 60.0,
                rsi_oversold: 45.0,
                band_period: 5,
                devfactor: 2.0,
                exit_grouping: if grouped {
                    ExitGrouping::Grouped
                } else {
                    ExitGrouping::AsWritten
                },
            })
        }),
    ]
}

fn walk_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-3.0f64..3.0, 20..120).prop_map(|steps| {
        let mut price = 100.0f64;
        steps
            .into_iter()
            .map(|s| {
                price = (price + s).max(1.0);
                price
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn lifecycle_invariants_hold(closes in walk_strategy(), rules in rules_strategy()) {
        let bars = bars_from_closes(&closes);
        let result = backtest(&bars, rules.clone(), percent_sizer(), 0.001);

        // at most one order outstanding at any time
        let mut open = None;
        for n in &result.notifications {
            match n {
                Notification::OrderAcknowledged { order_id, .. } => {
                    if let Some(id) = open {
                        prop_assert_eq!(id, *order_id);
                    }
                    open = Some(*order_id);
                }
                Notification::OrderFilled { order_id, .. }
                | Notification::OrderFailed { order_id, .. } => {
                    prop_assert_eq!(open, Some(*order_id));
                    open = None;
                }
                Notification::TradeClosed { .. } => {}
            }
        }

        // replay the loop bar by bar so the position is checked after each one
        let config = bt_config(&bars, 0.001);
        let driver = StrategyDriver::new(rules, percent_sizer(), DriverParams::default());
        let mut feed = PrecomputedFeed::new(&bars, driver.required_indicators());
        let mut broker = SimulatedBroker::from_config(&config);
        let mut mgr = OrderLifecycleManager::new();
        for bar in &bars {
            for update in broker.process_bar(bar) {
                let _ = mgr.on_status_update(&update);
            }
            feed.advance(bar);
            if let Some(order) = driver.on_bar(bar, feed.current(), broker.equity(), &mut mgr) {
                for update in broker.submit(&order) {
                    let _ = mgr.on_status_update(&update);
                }
            }

            let pos = mgr.position();
            prop_assert_eq!(pos.size > 0.0, pos.is_long(), "on {}", bar.date);
            if pos.is_flat() {
                prop_assert!(pos.entry_price.is_none(), "on {}", bar.date);
                prop_assert_eq!(pos.size, 0.0, "on {}", bar.date);
            } else {
                prop_assert!(pos.entry_price.is_some(), "on {}", bar.date);
            }
        }
        prop_assert_eq!(mgr.trades(), &result.trades[..]);
        prop_assert_eq!(mgr.position(), &result.open_position);

        for pair in result.trades.windows(2) {
            prop_assert!(pair[0].exit_date <= pair[1].entry_date);
        }
        for trade in &result.trades {
            prop_assert!(trade.size > 0.0);
            prop_assert!(trade.entry_date < trade.exit_date);
        }

        prop_assert_eq!(result.equity_curve.len(), bars.len());
        prop_assert!(result.equity_curve.iter().all(|p| p.equity.is_finite() && p.equity > 0.0));
    }
}
