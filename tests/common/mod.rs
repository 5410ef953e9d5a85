#![allow(dead_code)]

use bartrader::domain::backtest::BacktestConfig;
use bartrader::domain::error::BartraderError;
pub use bartrader::domain::ohlcv::Bar;
use bartrader::ports::data_port::DataPort;
use chrono::{Duration, NaiveDate};
use std::io::Write;

pub struct MockDataPort {
    pub bars: Vec<Bar>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars, error: None }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            bars: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BartraderError> {
        if let Some(reason) = &self.error {
            return Err(BartraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn base_date() -> NaiveDate {
    date("2005-01-03")
}

/// Bar with open, high, low and close all at `close`.
pub fn make_bar(date: NaiveDate, close: f64) -> Bar {
    Bar {
        date,
        open: close,
        high: close,
        low: close,
        close,
        volume: 10_000,
    }
}

/// One bar per calendar day starting at `base_date()`.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(base_date() + Duration::days(i as i64), c))
        .collect()
}

/// 30 flat bars, a 30-bar rise, then a 40-bar fall: one golden cross
/// followed by one death cross for short/long SMAs inside those windows.
pub fn rise_and_fall() -> Vec<f64> {
    let mut closes = vec![100.0; 30];
    closes.extend((1..=30).map(|i| 100.0 + i as f64));
    closes.extend((1..=40).map(|i| 130.0 - 2.0 * i as f64));
    closes
}

pub fn bt_config(bars: &[Bar], commission_rate: f64) -> BacktestConfig {
    BacktestConfig {
        start_date: bars.first().map(|b| b.date).unwrap_or_else(base_date),
        end_date: bars.last().map(|b| b.date).unwrap_or_else(base_date),
        starting_cash: 100_000.0,
        commission_rate,
        order_valid_bars: 0,
    }
}

/// Yahoo-style CSV with `Adj Close` equal to `Close`.
pub fn yahoo_csv(bars: &[Bar]) -> String {
    let mut out = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.close, b.volume
        ));
    }
    out
}

pub fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
