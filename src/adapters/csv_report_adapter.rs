//! CSV report adapter.
//!
//! Writes the closed-trade ledger to the output path and the equity curve to
//! a sibling file with an `_equity` suffix (`trades.csv` ->
//! `trades_equity.csv`).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::backtest::{BacktestResult, EquityPoint};
use crate::domain::error::BartraderError;
use crate::domain::position::Trade;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

fn csv_error(e: impl std::fmt::Display) -> BartraderError {
    BartraderError::Io(std::io::Error::other(e.to_string()))
}

/// Trade ledger as CSV text.
pub fn trades_csv(trades: &[Trade]) -> Result<String, BartraderError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_date",
        "exit_date",
        "size",
        "entry_price",
        "exit_price",
        "gross_pnl",
        "commission",
        "net_pnl",
    ])
    .map_err(csv_error)?;

    for t in trades {
        wtr.write_record([
            t.entry_date.to_string(),
            t.exit_date.to_string(),
            format!("{}", t.size),
            format!("{:.4}", t.entry_price),
            format!("{:.4}", t.exit_price),
            format!("{:.2}", t.gross_pnl),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.net_pnl),
        ])
        .map_err(csv_error)?;
    }

    let data = wtr.into_inner().map_err(csv_error)?;
    String::from_utf8(data).map_err(csv_error)
}

/// Equity curve as CSV text.
pub fn equity_csv(curve: &[EquityPoint]) -> Result<String, BartraderError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "equity"]).map_err(csv_error)?;
    for p in curve {
        wtr.write_record([p.date.to_string(), format!("{:.2}", p.equity)])
            .map_err(csv_error)?;
    }
    let data = wtr.into_inner().map_err(csv_error)?;
    String::from_utf8(data).map_err(csv_error)
}

fn equity_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output_path.with_file_name(format!("{stem}_equity.csv"))
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), BartraderError> {
        let path = Path::new(output_path);
        fs::write(path, trades_csv(&result.trades)?)?;
        let equity = equity_path(path);
        fs::write(&equity, equity_csv(&result.equity_curve)?)?;
        info!(
            trades = %path.display(),
            equity = %equity.display(),
            "report written"
        );
        Ok(())
    }
}
