//! Indicator feed port trait.

use crate::domain::error::BartraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::snapshot::IndicatorSnapshot;

/// Serves the indicator snapshot for the most recently admitted bar.
pub trait IndicatorFeed {
    /// Admit the next bar. Bars arrive in chronological order.
    fn advance(&mut self, bar: &Bar);

    /// Snapshot for the last admitted bar. Lines that are still warming up
    /// are absent, so reading them yields `MissingIndicatorData`.
    fn current(&self) -> Result<IndicatorSnapshot, BartraderError>;
}
