//! Core domain types and logic.

pub mod ohlcv;
pub mod order;
pub mod position;
pub mod notification;
pub mod indicator;
pub mod snapshot;
pub mod signal;
pub mod sizing;
pub mod lifecycle;
pub mod driver;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
