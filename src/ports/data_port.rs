//! Market data port trait.

use crate::domain::error::BartraderError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars within `[start_date, end_date]`, oldest first, one per date.
    fn fetch_bars(&self, start_date: NaiveDate, end_date: NaiveDate)
    -> Result<Vec<Bar>, BartraderError>;
}
