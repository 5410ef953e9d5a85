//! Signal evaluation: indicator snapshot + position -> optional order intent.
//!
//! Evaluators are pure. When flat only entry rules run; when long only exit
//! rules run, so a single bar can never both enter and exit.

use std::fmt;

use crate::domain::error::BartraderError;
use crate::domain::indicator::{IndicatorField, IndicatorRef, IndicatorType};
use crate::domain::position::Position;
use crate::domain::snapshot::{IndicatorSnapshot, Operand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Open a long position.
    Entry,
    /// Sell the whole position back to flat.
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalIntent {
    pub kind: IntentKind,
    pub rationale: String,
    /// Protective stop implied by the rule, used by risk-based sizing.
    pub stop_hint: Option<f64>,
}

impl SignalIntent {
    pub fn entry(rationale: impl Into<String>) -> Self {
        SignalIntent {
            kind: IntentKind::Entry,
            rationale: rationale.into(),
            stop_hint: None,
        }
    }

    pub fn exit(rationale: impl Into<String>) -> Self {
        SignalIntent {
            kind: IntentKind::Exit,
            rationale: rationale.into(),
            stop_hint: None,
        }
    }

    pub fn with_stop(mut self, stop: f64) -> Self {
        self.stop_hint = Some(stop);
        self
    }
}

pub trait SignalEvaluator {
    /// `Err(MissingIndicatorData)` means the inputs are not warmed up yet and
    /// the bar carries no signal.
    fn evaluate(
        &self,
        snapshot: &IndicatorSnapshot,
        position: &Position,
    ) -> Result<Option<SignalIntent>, BartraderError>;

    /// Indicators the feed must provide for this evaluator.
    fn required_indicators(&self) -> Vec<IndicatorType>;
}

/// Variant A: buy the bounce off the lower Bollinger band, sell below the
/// upper band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandReversion {
    pub band_period: usize,
    pub devfactor: f64,
}

impl BandReversion {
    fn band(&self, field: IndicatorField) -> Operand {
        Operand::Indicator(IndicatorRef::band(self.band_period, self.devfactor, field))
    }
}

impl SignalEvaluator for BandReversion {
    fn evaluate(
        &self,
        snapshot: &IndicatorSnapshot,
        position: &Position,
    ) -> Result<Option<SignalIntent>, BartraderError> {
        let close = snapshot.value(Operand::Close)?;
        if position.is_flat() {
            let lower = snapshot.value(self.band(IndicatorField::BollingerLower))?;
            if close > lower {
                return Ok(Some(
                    SignalIntent::entry(format!("close {close:.2} above lower band {lower:.2}"))
                        .with_stop(lower),
                ));
            }
        } else {
            let upper = snapshot.value(self.band(IndicatorField::BollingerUpper))?;
            if close < upper {
                return Ok(Some(SignalIntent::exit(format!(
                    "close {close:.2} below upper band {upper:.2}"
                ))));
            }
        }
        Ok(None)
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::bollinger(self.band_period, self.devfactor)]
    }
}

/// How the momentum/oscillator exit combines its three conditions.
///
/// The rule is written `crossunder or close < upper and rsi > overbought`.
/// Read with operator precedence that is
/// `crossunder or (close < upper and rsi > overbought)`, which fires on most
/// bars where RSI is high. `Grouped` reads it as
/// `(crossunder or close < upper) and rsi > overbought` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitGrouping {
    #[default]
    AsWritten,
    Grouped,
}

impl ExitGrouping {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "as_written" => Some(ExitGrouping::AsWritten),
            "grouped" => Some(ExitGrouping::Grouped),
            _ => None,
        }
    }
}

/// Variant B: enter when close crosses above a fast SMA while RSI is
/// oversold; exit on a short/long SMA crossunder or an overbought RSI below
/// the upper band.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumOscillator {
    pub fast_period: usize,
    pub short_period: usize,
    pub long_period: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub band_period: usize,
    pub devfactor: f64,
    pub exit_grouping: ExitGrouping,
}

impl SignalEvaluator for MomentumOscillator {
    fn evaluate(
        &self,
        snapshot: &IndicatorSnapshot,
        position: &Position,
    ) -> Result<Option<SignalIntent>, BartraderError> {
        let rsi = snapshot.value(Operand::Indicator(IndicatorRef::rsi(self.rsi_period)))?;

        if position.is_flat() {
            let fast = Operand::Indicator(IndicatorRef::sma(self.fast_period));
            let crossed = snapshot.crossed_above(Operand::Close, fast)?;
            if crossed && rsi < self.rsi_oversold {
                return Ok(Some(SignalIntent::entry(format!(
                    "close crossed above SMA({}) with RSI {rsi:.1} < {}",
                    self.fast_period, self.rsi_oversold
                ))));
            }
            return Ok(None);
        }

        let short = Operand::Indicator(IndicatorRef::sma(self.short_period));
        let long = Operand::Indicator(IndicatorRef::sma(self.long_period));
        let upper = Operand::Indicator(IndicatorRef::band(
            self.band_period,
            self.devfactor,
            IndicatorField::BollingerUpper,
        ));

        let crossunder = snapshot.crossed_below(short, long)?;
        let below_upper = snapshot.value(Operand::Close)? < snapshot.value(upper)?;
        let overbought = rsi > self.rsi_overbought;

        let fire = match self.exit_grouping {
            ExitGrouping::AsWritten => crossunder || (below_upper && overbought),
            ExitGrouping::Grouped => (crossunder || below_upper) && overbought,
        };

        if !fire {
            return Ok(None);
        }
        let rationale = if crossunder {
            format!(
                "SMA({}) crossed below SMA({})",
                self.short_period, self.long_period
            )
        } else {
            format!(
                "close below upper band with RSI {rsi:.1} > {}",
                self.rsi_overbought
            )
        };
        Ok(Some(SignalIntent::exit(rationale)))
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Sma(self.fast_period),
            IndicatorType::Sma(self.short_period),
            IndicatorType::Sma(self.long_period),
            IndicatorType::Rsi(self.rsi_period),
            IndicatorType::bollinger(self.band_period, self.devfactor),
        ]
    }
}

/// Variant C: golden cross in, death cross out.
#[derive(Debug, Clone, PartialEq)]
pub struct GoldenCross {
    pub short_period: usize,
    pub long_period: usize,
}

impl SignalEvaluator for GoldenCross {
    fn evaluate(
        &self,
        snapshot: &IndicatorSnapshot,
        position: &Position,
    ) -> Result<Option<SignalIntent>, BartraderError> {
        let short = Operand::Indicator(IndicatorRef::sma(self.short_period));
        let long = Operand::Indicator(IndicatorRef::sma(self.long_period));

        if position.is_flat() {
            if snapshot.crossed_above(short, long)? {
                return Ok(Some(SignalIntent::entry(format!(
                    "golden cross SMA({}) over SMA({})",
                    self.short_period, self.long_period
                ))));
            }
        } else if snapshot.crossed_below(short, long)? {
            return Ok(Some(SignalIntent::exit(format!(
                "death cross SMA({}) under SMA({})",
                self.short_period, self.long_period
            ))));
        }
        Ok(None)
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Sma(self.short_period),
            IndicatorType::Sma(self.long_period),
        ]
    }
}

/// The rule set a strategy run uses, chosen by configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyRules {
    BandReversion(BandReversion),
    MomentumOscillator(MomentumOscillator),
    GoldenCross(GoldenCross),
}

impl StrategyRules {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyRules::BandReversion(_) => "band_reversion",
            StrategyRules::MomentumOscillator(_) => "momentum_oscillator",
            StrategyRules::GoldenCross(_) => "golden_cross",
        }
    }
}

impl fmt::Display for StrategyRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyRules::BandReversion(r) => write!(
                f,
                "band_reversion(period={}, devfactor={})",
                r.band_period, r.devfactor
            ),
            StrategyRules::MomentumOscillator(r) => write!(
                f,
                "momentum_oscillator(fast={}, short={}, long={}, rsi={}, ob={}, os={}, band={}, exit={:?})",
                r.fast_period,
                r.short_period,
                r.long_period,
                r.rsi_period,
                r.rsi_overbought,
                r.rsi_oversold,
                r.band_period,
                r.exit_grouping
            ),
            StrategyRules::GoldenCross(r) => {
                write!(f, "golden_cross(short={}, long={})", r.short_period, r.long_period)
            }
        }
    }
}

impl SignalEvaluator for StrategyRules {
    fn evaluate(
        &self,
        snapshot: &IndicatorSnapshot,
        position: &Position,
    ) -> Result<Option<SignalIntent>, BartraderError> {
        match self {
            StrategyRules::BandReversion(r) => r.evaluate(snapshot, position),
            StrategyRules::MomentumOscillator(r) => r.evaluate(snapshot, position),
            StrategyRules::GoldenCross(r) => r.evaluate(snapshot, position),
        }
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        match self {
            StrategyRules::BandReversion(r) => r.required_indicators(),
            StrategyRules::MomentumOscillator(r) => r.required_indicators(),
            StrategyRules::GoldenCross(r) => r.required_indicators(),
        }
    }
}
