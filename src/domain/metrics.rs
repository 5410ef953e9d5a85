//! Performance metrics computed from a finished backtest.

use super::backtest::{BacktestResult, EquityPoint};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior equity peak.
    pub max_drawdown_duration: i64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub commission_paid: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_trade_duration: f64,
}

impl Metrics {
    /// Trade statistics use net P&L: a trade that only covers its
    /// commissions counts as breakeven or a loss.
    pub fn compute(result: &BacktestResult) -> Self {
        let initial = result.starting_value;
        let total_return = if initial > 0.0 {
            (result.ending_value - initial) / initial
        } else {
            0.0
        };

        let years = result.equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&result.equity_curve);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut gross_pnl = 0.0_f64;
        let mut net_pnl = 0.0_f64;
        let mut commission_paid = 0.0_f64;
        let mut total_duration_days = 0i64;

        for trade in &result.trades {
            let pnl = trade.net_pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            gross_pnl += trade.gross_pnl;
            net_pnl += pnl;
            commission_paid += trade.commission;
            total_duration_days += (trade.exit_date - trade.entry_date).num_days();
        }

        let total_trades = result.trades.len();
        let win_rate = ratio(trades_won as f64, total_trades as f64);

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Metrics {
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            gross_pnl,
            net_pnl,
            commission_paid,
            avg_win: ratio(total_wins, trades_won as f64),
            avg_loss: ratio(total_losses, trades_lost as f64),
            largest_win,
            largest_loss,
            avg_trade_duration: ratio(total_duration_days as f64, total_trades as f64),
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 && point.equity < peak {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}
