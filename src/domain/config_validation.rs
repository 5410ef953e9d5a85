//! Configuration validation.
//!
//! Runs over the raw config before any typed config is built, so a bad value
//! is reported against its section and key.

use crate::domain::error::BartraderError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const VARIANTS: [&str; 3] = ["band_reversion", "momentum_oscillator", "golden_cross"];
pub const SIZER_MODES: [&str; 3] = ["fixed", "percent", "risk"];
const ENTRY_ORDERS: [&str; 3] = ["market", "stop", "limit"];
const EXIT_GROUPINGS: [&str; 2] = ["as_written", "grouped"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    validate_starting_cash(config)?;
    validate_commission(config)?;
    validate_order_valid_bars(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    let variant = validate_choice(config, "strategy", "variant", &VARIANTS)?;
    validate_choice(config, "strategy", "exit_grouping", &EXIT_GROUPINGS)?;
    validate_choice(config, "strategy", "entry_order", &ENTRY_ORDERS)?;
    validate_fraction(config, "strategy", "entry_offset_pct", 0.02)?;
    validate_fraction(config, "strategy", "stop_loss_pct", 0.02)?;

    match variant.as_deref().unwrap_or("momentum_oscillator") {
        "band_reversion" => validate_band(config),
        "golden_cross" => validate_moving_averages(config),
        _ => {
            validate_positive_int(config, "strategy", "fast_period", 2)?;
            validate_moving_averages(config)?;
            validate_rsi(config)?;
            validate_band(config)
        }
    }
}

pub fn validate_sizer_config(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    let mode = validate_choice(config, "sizer", "mode", &SIZER_MODES)?;
    match mode.as_deref().unwrap_or("percent") {
        "fixed" => {
            if config.get_double("sizer", "stake", 1400.0) <= 0.0 {
                return Err(invalid("sizer", "stake", "stake must be positive"));
            }
        }
        "risk" => {
            let value = config.get_double("sizer", "risk_fraction", 0.02);
            if value <= 0.0 || value > 1.0 {
                return Err(invalid(
                    "sizer",
                    "risk_fraction",
                    "risk_fraction must be in (0, 1]",
                ));
            }
        }
        _ => {
            let value = config.get_double("sizer", "percent", 10.0);
            if value <= 0.0 || value > 100.0 {
                return Err(invalid("sizer", "percent", "percent must be in (0, 100]"));
            }
        }
    }
    if config.get_double("sizer", "lot_size", 1.0) <= 0.0 {
        return Err(invalid("sizer", "lot_size", "lot_size must be positive"));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BartraderError {
    BartraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_starting_cash(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    let value = config.get_double("backtest", "starting_cash", 100_000.0);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "starting_cash",
            "starting_cash must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    let value = config.get_double("backtest", "commission_rate", 0.001);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "commission_rate",
            "commission_rate must be in [0, 1)",
        ));
    }
    Ok(())
}

fn validate_order_valid_bars(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    if config.get_int("backtest", "order_valid_bars", 0) < 0 {
        return Err(invalid(
            "backtest",
            "order_valid_bars",
            "order_valid_bars must be non-negative",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date > end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, BartraderError> {
    match value {
        None => Err(BartraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

/// Returns the lowercased value when present.
fn validate_choice(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    allowed: &[&str],
) -> Result<Option<String>, BartraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let value = raw.trim().to_lowercase();
    if !allowed.contains(&value.as_str()) {
        return Err(invalid(
            section,
            key,
            format!("unknown value '{}', expected one of {}", raw.trim(), allowed.join("|")),
        ));
    }
    Ok(Some(value))
}

fn validate_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, BartraderError> {
    let value = config.get_int(section, key, default);
    if value < 1 {
        return Err(invalid(section, key, format!("{key} must be at least 1")));
    }
    Ok(value)
}

fn validate_fraction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), BartraderError> {
    let value = config.get_double(section, key, default);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(section, key, format!("{key} must be in [0, 1)")));
    }
    Ok(())
}

fn validate_moving_averages(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    let short = validate_positive_int(config, "strategy", "short_period", 50)?;
    let long = validate_positive_int(config, "strategy", "long_period", 200)?;
    if short >= long {
        return Err(invalid(
            "strategy",
            "short_period",
            "short_period must be less than long_period",
        ));
    }
    Ok(())
}

fn validate_rsi(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    validate_positive_int(config, "strategy", "rsi_period", 10)?;
    let overbought = config.get_double("strategy", "rsi_overbought", 65.0);
    let oversold = config.get_double("strategy", "rsi_oversold", 35.0);
    for (key, value) in [("rsi_overbought", overbought), ("rsi_oversold", oversold)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid("strategy", key, format!("{key} must be in [0, 100]")));
        }
    }
    if oversold >= overbought {
        return Err(invalid(
            "strategy",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }
    Ok(())
}

fn validate_band(config: &dyn ConfigPort) -> Result<(), BartraderError> {
    validate_positive_int(config, "strategy", "band_period", 20)?;
    if config.get_double("strategy", "band_devfactor", 2.0) <= 0.0 {
        return Err(invalid(
            "strategy",
            "band_devfactor",
            "band_devfactor must be positive",
        ));
    }
    Ok(())
}
