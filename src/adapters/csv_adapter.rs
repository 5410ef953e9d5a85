//! CSV file data adapter.
//!
//! Reads one instrument's daily bars from a file with a header row. Columns
//! are located by name, case-insensitively, so both the plain
//! `date,open,high,low,close,volume` layout and the Yahoo export layout
//! (`Date,Open,High,Low,Close,Adj Close,Volume`) load.
//!
//! When an `Adj Close` column is present and adjustment is on, prices are
//! rescaled by `adj_close / close` and volume by the inverse, so splits and
//! dividends do not show up as gaps. Rows containing `null` (Yahoo's marker
//! for a missing day) are skipped.

use crate::domain::error::BartraderError;
use crate::domain::ohlcv::{Bar, admit_range};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    path: PathBuf,
    adjust_close: bool,
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    adj_close: Option<usize>,
    volume: usize,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            adjust_close: true,
        }
    }

    pub fn with_adjust_close(mut self, adjust_close: bool) -> Self {
        self.adjust_close = adjust_close;
        self
    }

    fn columns(headers: &csv::StringRecord) -> Result<Columns, BartraderError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| BartraderError::Data {
                reason: format!("missing {} column", name),
            })
        };
        Ok(Columns {
            date: require("date")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            adj_close: find("adj close").or_else(|| find("adj_close")),
            volume: require("volume")?,
        })
    }

    fn parse_field(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, BartraderError> {
        let raw = record.get(idx).ok_or_else(|| BartraderError::Data {
            reason: format!("missing {} value", name),
        })?;
        raw.trim().parse().map_err(|e| BartraderError::Data {
            reason: format!("invalid {} value '{}': {}", name, raw, e),
        })
    }

    fn parse_bar(&self, record: &csv::StringRecord, cols: &Columns) -> Result<Bar, BartraderError> {
        let date_str = record.get(cols.date).unwrap_or_default().trim();
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
            BartraderError::Data {
                reason: format!("invalid date '{}': {}", date_str, e),
            }
        })?;

        let mut open = Self::parse_field(record, cols.open, "open")?;
        let mut high = Self::parse_field(record, cols.high, "high")?;
        let mut low = Self::parse_field(record, cols.low, "low")?;
        let mut close = Self::parse_field(record, cols.close, "close")?;
        let mut volume = Self::parse_field(record, cols.volume, "volume")?;

        if let (true, Some(idx)) = (self.adjust_close, cols.adj_close) {
            let adj = Self::parse_field(record, idx, "adj close")?;
            if close != 0.0 && adj != 0.0 {
                let factor = close / adj;
                open /= factor;
                high /= factor;
                low /= factor;
                close = adj;
                volume *= factor;
            }
        }

        Ok(Bar {
            date,
            open,
            high,
            low,
            close,
            volume: volume.round() as i64,
        })
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, BartraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| BartraderError::Data {
                reason: format!("failed to read {}: {}", self.path.display(), e),
            })?;

        let headers = rdr
            .headers()
            .map_err(|e| BartraderError::Data {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        let cols = Self::columns(&headers)?;

        let mut bars = Vec::new();
        let mut skipped = 0usize;
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| BartraderError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            if record.iter().any(|f| f.eq_ignore_ascii_case("null")) {
                skipped += 1;
                continue;
            }
            let bar = self.parse_bar(&record, &cols).map_err(|e| BartraderError::Data {
                reason: format!("{} row {}: {}", self.path.display(), line + 2, e),
            })?;
            if !bar.is_well_formed() {
                debug!(date = %bar.date, "malformed bar skipped");
                skipped += 1;
                continue;
            }
            bars.push(bar);
        }

        let (bars, duplicates) = admit_range(&bars, start_date, end_date);
        debug!(
            path = %self.path.display(),
            bars = bars.len(),
            skipped,
            duplicates,
            "loaded bars"
        );
        Ok(bars)
    }
}
