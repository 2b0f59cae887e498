// src/analog.rs - Four-threshold analog alarms with settling delay
//
// The value is mapped onto five bands (LL < L < NOM < H < HH). A change of
// band is only confirmed after it has persisted for `set_delay`. One delay
// runs at a time, tagged with its direction; a move in the opposite direction
// replaces it and re-entering the confirmed band discards it.

use crate::error::{AlarmError, Result};
use crate::signal::SignalRef;
use crate::timer::{PendingTimer, TimerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Confirmed band of an analog alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AnalogState {
    /// Nominal
    #[default]
    #[serde(rename = "NOM")]
    Nominal,
    /// PV <= LL_SV
    #[serde(rename = "LL")]
    LowLow,
    /// LL_SV < PV <= L_SV
    #[serde(rename = "L")]
    Low,
    /// H_SV <= PV < HH_SV
    #[serde(rename = "H")]
    High,
    /// PV >= HH_SV
    #[serde(rename = "HH")]
    HighHigh,
}

impl AnalogState {
    /// Distance from nominal: 0 for NOM, 1 for L/H, 2 for LL/HH
    pub fn severity(self) -> u8 {
        match self {
            AnalogState::Nominal => 0,
            AnalogState::Low | AnalogState::High => 1,
            AnalogState::LowLow | AnalogState::HighHigh => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalogState::Nominal => "NOM",
            AnalogState::LowLow => "LL",
            AnalogState::Low => "L",
            AnalogState::High => "H",
            AnalogState::HighHigh => "HH",
        }
    }
}

impl fmt::Display for AnalogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a pending band change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards a more severe band, or across nominal to the other side
    Escalating,
    /// Towards nominal
    Clearing,
}

impl Direction {
    /// Direction of the move from the confirmed band `from` to `to`
    pub fn between(from: AnalogState, to: AnalogState) -> Self {
        if to.severity() >= from.severity() {
            Direction::Escalating
        } else {
            Direction::Clearing
        }
    }
}

/// Alarm setpoints; `None` excludes a level from evaluation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub ll: Option<f64>,
    #[serde(default)]
    pub l: Option<f64>,
    #[serde(default)]
    pub h: Option<f64>,
    #[serde(default)]
    pub hh: Option<f64>,
}

impl Thresholds {
    /// Validated setpoints
    ///
    /// The set levels must be non-decreasing in LL, L, H, HH order and at
    /// least one must be set. NaN is not accepted as a setpoint.
    pub fn new(ll: Option<f64>, l: Option<f64>, h: Option<f64>, hh: Option<f64>) -> Result<Self> {
        let thresholds = Self { ll, l, h, hh };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_set() {
            return Err(AlarmError::InvalidThresholds("no setpoint is set".to_string()));
        }

        let levels = [("ll", self.ll), ("l", self.l), ("h", self.h), ("hh", self.hh)];

        let mut previous: Option<(&str, f64)> = None;
        for (label, level) in levels {
            let Some(value) = level else { continue };
            if value.is_nan() {
                return Err(AlarmError::InvalidThresholds(format!("{} is NaN", label)));
            }
            if let Some((prev_label, prev)) = previous {
                if prev > value {
                    return Err(AlarmError::InvalidThresholds(format!(
                        "{} ({}) is greater than {} ({})",
                        prev_label, prev, label, value
                    )));
                }
            }
            previous = Some((label, value));
        }
        Ok(())
    }

    /// Band implied by `value`, or `None` for NaN
    pub fn band(&self, value: f64) -> Option<AnalogState> {
        if value.is_nan() {
            return None;
        }
        let band = if self.hh.is_some_and(|hh| value >= hh) {
            AnalogState::HighHigh
        } else if self.h.is_some_and(|h| value >= h) {
            AnalogState::High
        } else if self.ll.is_some_and(|ll| value <= ll) {
            AnalogState::LowLow
        } else if self.l.is_some_and(|l| value <= l) {
            AnalogState::Low
        } else {
            AnalogState::Nominal
        };
        Some(band)
    }

    /// Whether any setpoint is set
    pub fn is_set(&self) -> bool {
        self.ll.is_some() || self.l.is_some() || self.h.is_some() || self.hh.is_some()
    }
}

/// What a poll tick wants done with the alarm's settling timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogAction {
    /// Nothing to do; any running delay continues
    Hold,
    /// Start a delay in this direction, replacing any opposite one
    Arm(Direction),
    /// Value is back in the confirmed band
    Cancel,
}

#[derive(Debug)]
struct PendingBand {
    direction: Direction,
    timer: PendingTimer,
}

/// Analog alarm record
pub struct AnalogAlarm {
    name: String,
    pub(crate) enabled: bool,
    pub(crate) state: AnalogState,
    signal: SignalRef<f64>,
    thresholds: Thresholds,
    set_delay: Duration,
    pending: Option<PendingBand>,
}

impl AnalogAlarm {
    /// New enabled alarm in the nominal band
    pub fn new(
        name: impl Into<String>,
        signal: SignalRef<f64>,
        thresholds: Thresholds,
        set_delay: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            state: AnalogState::Nominal,
            signal,
            thresholds,
            set_delay,
            pending: None,
        }
    }

    /// Builder-style initial enabled flag
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> AnalogState {
        self.state
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn set_delay(&self) -> Duration {
        self.set_delay
    }

    pub fn pending_direction(&self) -> Option<Direction> {
        self.pending.as_ref().map(|p| p.direction)
    }

    /// Band implied by the current signal value
    pub fn raw_band(&self) -> Option<AnalogState> {
        self.thresholds.band(self.signal.read())
    }

    /// One poll-tick evaluation against the current signal value
    pub fn evaluate(&self) -> AnalogAction {
        let Some(raw) = self.raw_band() else {
            return AnalogAction::Hold;
        };

        if raw == self.state {
            return match self.pending {
                Some(_) => AnalogAction::Cancel,
                None => AnalogAction::Hold,
            };
        }

        let direction = Direction::between(self.state, raw);
        match &self.pending {
            Some(pending) if pending.direction == direction => AnalogAction::Hold,
            _ => AnalogAction::Arm(direction),
        }
    }

    pub(crate) fn start_pending(&mut self, direction: Direction, timer: PendingTimer) {
        self.cancel_pending();
        self.pending = Some(PendingBand { direction, timer });
    }

    pub(crate) fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.cancel();
        }
    }

    /// Consume the pending timer if `id` is the one currently armed
    pub(crate) fn take_pending(&mut self, id: TimerId) -> Option<Direction> {
        match &self.pending {
            Some(pending) if pending.timer.id() == id => {
                let direction = pending.direction;
                self.pending = None;
                Some(direction)
            }
            _ => None,
        }
    }

    /// Confirm the band the value sits in now, if it still lies in
    /// `direction` from the confirmed state
    ///
    /// Returns the previous band when the state changed.
    pub(crate) fn confirm(&mut self, direction: Direction) -> Option<AnalogState> {
        let raw = self.raw_band()?;
        if raw == self.state || Direction::between(self.state, raw) != direction {
            return None;
        }
        let previous = self.state;
        self.state = raw;
        Some(previous)
    }

    /// Disable and return to nominal without notification
    pub(crate) fn disable(&mut self) {
        self.cancel_pending();
        self.enabled = false;
        self.state = AnalogState::Nominal;
    }
}

impl fmt::Debug for AnalogAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalogAlarm")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .field("thresholds", &self.thresholds)
            .field("set_delay", &self.set_delay)
            .field("pending", &self.pending_direction())
            .finish()
    }
}

impl Drop for AnalogAlarm {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
