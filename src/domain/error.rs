//! Domain error types.

use crate::domain::order::OrderStatus;

/// Top-level error type for bartrader.
///
/// The engine variants (sizing, submission, status updates, indicator reads)
/// are all recoverable: the driver drops the current intent and carries on
/// with the next bar. Only config, data and I/O errors end a run.
#[derive(Debug, thiserror::Error)]
pub enum BartraderError {
    #[error("invalid stop distance: entry {entry} must be above stop {stop}")]
    InvalidStopDistance { entry: f64, stop: f64 },

    #[error("invalid sizing input: {reason}")]
    InvalidSizingInput { reason: String },

    #[error("order {id} is still pending")]
    OrderAlreadyPending { id: u64 },

    #[error("indicator {indicator} has no data for this bar")]
    MissingIndicatorData { indicator: String },

    #[error("invalid order size {size}")]
    InvalidOrderSize { size: f64 },

    #[error("no pending order with id {id}")]
    UnknownOrder { id: u64 },

    #[error("order {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: u64,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("order {id} completed without a fill")]
    MissingFill { id: u64 },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no bars between {start} and {end}")]
    NoData { start: String, end: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BartraderError {
    pub fn missing(indicator: impl ToString) -> Self {
        BartraderError::MissingIndicatorData {
            indicator: indicator.to_string(),
        }
    }
}

impl From<&BartraderError> for std::process::ExitCode {
    fn from(err: &BartraderError) -> Self {
        let code: u8 = match err {
            BartraderError::Io(_) => 1,
            BartraderError::ConfigParse { .. }
            | BartraderError::ConfigMissing { .. }
            | BartraderError::ConfigInvalid { .. } => 2,
            BartraderError::Data { .. } | BartraderError::NoData { .. } => 5,
            BartraderError::InvalidStopDistance { .. }
            | BartraderError::InvalidSizingInput { .. }
            | BartraderError::OrderAlreadyPending { .. }
            | BartraderError::MissingIndicatorData { .. }
            | BartraderError::InvalidOrderSize { .. }
            | BartraderError::UnknownOrder { .. }
            | BartraderError::InvalidTransition { .. }
            | BartraderError::MissingFill { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_stop_distance() {
        let err = BartraderError::InvalidStopDistance {
            entry: 49.0,
            stop: 50.0,
        };
        assert_eq!(
            err.to_string(),
            "invalid stop distance: entry 49 must be above stop 50"
        );
    }

    #[test]
    fn display_transition() {
        let err = BartraderError::InvalidTransition {
            id: 3,
            from: OrderStatus::Accepted,
            to: OrderStatus::Submitted,
        };
        assert_eq!(
            err.to_string(),
            "order 3 cannot move from Accepted to Submitted"
        );
    }

    #[test]
    fn missing_helper_formats_indicator() {
        let err = BartraderError::missing("SMA(50)");
        assert!(matches!(
            err,
            BartraderError::MissingIndicatorData { ref indicator } if indicator == "SMA(50)"
        ));
    }

    #[test]
    fn exit_codes_by_category() {
        use std::process::ExitCode;
        let code = |e: &BartraderError| format!("{:?}", ExitCode::from(e));
        let expected = |c: u8| format!("{:?}", ExitCode::from(c));

        let config = BartraderError::ConfigMissing {
            section: "backtest".into(),
            key: "start_date".into(),
        };
        assert_eq!(code(&config), expected(2));

        let data = BartraderError::Data {
            reason: "bad row".into(),
        };
        assert_eq!(code(&data), expected(5));

        let io = BartraderError::Io(std::io::Error::other("boom"));
        assert_eq!(code(&io), expected(1));
    }
}
