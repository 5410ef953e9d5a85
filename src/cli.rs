//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::precomputed_feed::PrecomputedFeed;
use crate::adapters::sim_broker::SimulatedBroker;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    parse_date, validate_backtest_config, validate_sizer_config, validate_strategy_config,
};
use crate::domain::driver::{DriverParams, StrategyDriver};
use crate::domain::error::BartraderError;
use crate::domain::metrics::Metrics;
use crate::domain::order::OrderType;
use crate::domain::signal::{
    BandReversion, ExitGrouping, GoldenCross, MomentumOscillator, SignalEvaluator, StrategyRules,
};
use crate::domain::sizing::Sizer;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "bartrader", about = "Single-instrument bar-driven backtester")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over a CSV bar file
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Write closed trades here, and the equity curve next to it
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Use raw closes even when the file has an Adj Close column
        #[arg(long)]
        no_adjust: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            no_adjust,
        } => run_backtest(&config, &data, output.as_deref(), !no_adjust),
        Command::Validate { config } => run_validate(&config),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BartraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| BartraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Every validation pass over one config file.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_sizer_config(config)
}

fn run_validate(config_path: &Path) -> Result<(), BartraderError> {
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;

    let rules = build_strategy(&adapter)?;
    let sizer = build_sizer(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;

    eprintln!("Config validated successfully");
    eprintln!("  strategy: {}", rules);
    eprintln!("  sizer:    {}", sizer.name());
    eprintln!(
        "  range:    {} to {}",
        bt_config.start_date, bt_config.end_date
    );

    let mut indicators: Vec<String> = rules
        .required_indicators()
        .iter()
        .map(|i| i.to_string())
        .collect();
    indicators.sort();
    indicators.dedup();
    eprintln!("  indicators: {}", indicators.join(", "));
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    data_path: &Path,
    output_path: Option<&Path>,
    adjust_close: bool,
) -> Result<(), BartraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;

    let bt_config = build_backtest_config(&adapter)?;
    let rules = build_strategy(&adapter)?;
    let sizer = build_sizer(&adapter)?;
    let params = build_driver_params(&adapter)?;
    eprintln!("Strategy: {} ({} sizer)", rules, sizer.name());

    let data = build_csv_adapter(&adapter, data_path, adjust_close);
    let result = run_pipeline(&data, rules, sizer, params, &bt_config)?;

    let metrics = Metrics::compute(&result);
    print_summary(&result, &metrics);

    if let Some(path) = output_path {
        let path = path.to_string_lossy();
        CsvReportAdapter.write(&result, &path)?;
        eprintln!("\nTrades written to: {}", path);
    }
    Ok(())
}

/// `[backtest] adjust_close` can turn adjustment off; the CLI flag only ever
/// turns it off too.
pub fn build_csv_adapter(adapter: &dyn ConfigPort, path: &Path, adjust_close: bool) -> CsvAdapter {
    let adjust_close = adjust_close && adapter.get_bool("backtest", "adjust_close", true);
    CsvAdapter::new(path.to_path_buf()).with_adjust_close(adjust_close)
}

/// Load bars, wire the feed and broker, and replay the run.
pub fn run_pipeline(
    data: &dyn DataPort,
    rules: StrategyRules,
    sizer: Sizer,
    params: DriverParams,
    bt_config: &BacktestConfig,
) -> Result<BacktestResult, BartraderError> {
    let bars = data.fetch_bars(bt_config.start_date, bt_config.end_date)?;
    if bars.is_empty() {
        return Err(BartraderError::NoData {
            start: bt_config.start_date.to_string(),
            end: bt_config.end_date.to_string(),
        });
    }
    eprintln!(
        "Running backtest: {} bars, {} to {}",
        bars.len(),
        bt_config.start_date,
        bt_config.end_date
    );

    let driver = StrategyDriver::new(rules, sizer, params);
    let mut feed = PrecomputedFeed::new(&bars, driver.required_indicators());
    let mut broker = SimulatedBroker::from_config(bt_config);
    backtest_engine::run_backtest(&bars, &mut feed, &mut broker, &driver, bt_config)
}

fn print_summary(result: &BacktestResult, metrics: &Metrics) {
    println!("Starting Portfolio Value: {:.2}", result.starting_value);
    println!("Final Portfolio Value: {:.2}", result.ending_value);

    eprintln!("\n=== Results ===");
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!(
        "Annualized:       {:.2}%",
        metrics.annualized_return * 100.0
    );
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Net P&L:          {:.2}", metrics.net_pnl);
    eprintln!("Commission:       {:.2}", metrics.commission_paid);
    if !result.open_position.is_flat() {
        eprintln!(
            "Open Position:    {} @ {:.2}",
            result.open_position.size,
            result.open_position.entry_price.unwrap_or_default()
        );
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BartraderError> {
    let start_date = parse_date(
        adapter.get_string("backtest", "start_date").as_deref(),
        "start_date",
    )?;
    let end_date = parse_date(
        adapter.get_string("backtest", "end_date").as_deref(),
        "end_date",
    )?;

    Ok(BacktestConfig {
        start_date,
        end_date,
        starting_cash: adapter.get_double("backtest", "starting_cash", 100_000.0),
        commission_rate: adapter.get_double("backtest", "commission_rate", 0.001),
        order_valid_bars: adapter.get_int("backtest", "order_valid_bars", 0).max(0) as usize,
    })
}

fn period(adapter: &dyn ConfigPort, key: &str, default: i64) -> usize {
    adapter.get_int("strategy", key, default).max(1) as usize
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<StrategyRules, BartraderError> {
    let variant = adapter.get_string_or("strategy", "variant", "momentum_oscillator");
    let devfactor = adapter.get_double("strategy", "band_devfactor", 2.0);

    let rules = match variant.trim().to_lowercase().as_str() {
        "band_reversion" => StrategyRules::BandReversion(BandReversion {
            band_period: period(adapter, "band_period", 20),
            devfactor,
        }),
        "golden_cross" => StrategyRules::GoldenCross(GoldenCross {
            short_period: period(adapter, "short_period", 50),
            long_period: period(adapter, "long_period", 200),
        }),
        "momentum_oscillator" => {
            let grouping = adapter.get_string_or("strategy", "exit_grouping", "as_written");
            let exit_grouping =
                ExitGrouping::parse(&grouping).ok_or_else(|| BartraderError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "exit_grouping".into(),
                    reason: format!("unknown exit grouping '{}'", grouping),
                })?;
            StrategyRules::MomentumOscillator(MomentumOscillator {
                fast_period: period(adapter, "fast_period", 2),
                short_period: period(adapter, "short_period", 50),
                long_period: period(adapter, "long_period", 200),
                rsi_period: period(adapter, "rsi_period", 10),
                rsi_overbought: adapter.get_double("strategy", "rsi_overbought", 65.0),
                rsi_oversold: adapter.get_double("strategy", "rsi_oversold", 35.0),
                band_period: period(adapter, "band_period", 20),
                devfactor,
                exit_grouping,
            })
        }
        other => {
            return Err(BartraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "variant".into(),
                reason: format!("unknown variant '{}'", other),
            });
        }
    };
    Ok(rules)
}

pub fn build_sizer(adapter: &dyn ConfigPort) -> Result<Sizer, BartraderError> {
    let mode = adapter.get_string_or("sizer", "mode", "percent");
    let lot_size = adapter.get_double("sizer", "lot_size", 1.0);

    match mode.trim().to_lowercase().as_str() {
        "fixed" => Ok(Sizer::Fixed {
            stake: adapter.get_double("sizer", "stake", 1400.0),
        }),
        "percent" => Ok(Sizer::Percent {
            percent: adapter.get_double("sizer", "percent", 10.0),
            lot_size,
        }),
        "risk" => Ok(Sizer::RiskBased {
            risk_fraction: adapter.get_double("sizer", "risk_fraction", 0.02),
            lot_size,
        }),
        other => Err(BartraderError::ConfigInvalid {
            section: "sizer".into(),
            key: "mode".into(),
            reason: format!("unknown sizer mode '{}'", other),
        }),
    }
}

pub fn build_driver_params(adapter: &dyn ConfigPort) -> Result<DriverParams, BartraderError> {
    let defaults = DriverParams::default();
    let entry_order = match adapter.get_string("strategy", "entry_order") {
        None => defaults.entry_order,
        Some(s) => OrderType::parse(&s).ok_or_else(|| BartraderError::ConfigInvalid {
            section: "strategy".into(),
            key: "entry_order".into(),
            reason: format!("unknown order type '{}'", s),
        })?,
    };

    Ok(DriverParams {
        stop_loss_pct: adapter.get_double("strategy", "stop_loss_pct", defaults.stop_loss_pct),
        entry_order,
        entry_offset_pct: adapter.get_double(
            "strategy",
            "entry_offset_pct",
            defaults.entry_offset_pct,
        ),
    })
}
