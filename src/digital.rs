// src/digital.rs - Debounced boolean alarms
//
// Two confirmed states (inactive, active). Each state has one debounce delay
// guarding the move to the other: `set_delay` while inactive, `reset_delay`
// while active. The poll tick only decides whether to arm or cancel that
// delay; the engine's timer callback performs the confirmation.

use crate::signal::SignalRef;
use crate::timer::{PendingTimer, TimerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which input level triggers the alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Alarm is triggered by the input going low
    ActiveLow,
    /// Alarm is triggered by the input going high
    ActiveHigh,
}

impl Polarity {
    /// Whether `input` is the triggering level
    pub fn is_triggered(self, input: bool) -> bool {
        match self {
            Polarity::ActiveHigh => input,
            Polarity::ActiveLow => !input,
        }
    }
}

/// What a poll tick wants done with the alarm's debounce timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalAction {
    /// Nothing to do
    Hold,
    /// Start a delay that confirms `active = target` on expiry
    Arm { delay: Duration, target: bool },
    /// Input went back before the delay elapsed
    Cancel,
}

#[derive(Debug)]
struct PendingDelay {
    target: bool,
    timer: PendingTimer,
}

/// Debounced boolean alarm record
pub struct DigitalAlarm {
    name: String,
    pub(crate) enabled: bool,
    pub(crate) active: bool,
    signal: SignalRef<bool>,
    polarity: Polarity,
    set_delay: Duration,
    reset_delay: Duration,
    pending: Option<PendingDelay>,
}

impl DigitalAlarm {
    /// New enabled, inactive alarm
    pub fn new(
        name: impl Into<String>,
        signal: SignalRef<bool>,
        polarity: Polarity,
        set_delay: Duration,
        reset_delay: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            active: false,
            signal,
            polarity,
            set_delay,
            reset_delay,
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

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn set_delay(&self) -> Duration {
        self.set_delay
    }

    pub fn reset_delay(&self) -> Duration {
        self.reset_delay
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// State the running delay would confirm, if any
    pub fn pending_target(&self) -> Option<bool> {
        self.pending.as_ref().map(|p| p.target)
    }

    /// Whether the signal currently sits at the triggering level
    pub fn triggered(&self) -> bool {
        self.polarity.is_triggered(self.signal.read())
    }

    /// One poll-tick evaluation against the current signal value
    ///
    /// A running delay towards the other state (left over from a manual
    /// reset) counts as absent and is replaced.
    pub fn evaluate(&self) -> DigitalAction {
        let trigger = self.triggered();
        if trigger == self.active {
            // input returned to the confirmed condition before the delay elapsed
            return match self.pending {
                Some(_) => DigitalAction::Cancel,
                None => DigitalAction::Hold,
            };
        }
        match self.pending_target() {
            Some(target) if target == trigger => DigitalAction::Hold,
            _ => DigitalAction::Arm {
                delay: if trigger { self.set_delay } else { self.reset_delay },
                target: trigger,
            },
        }
    }

    pub(crate) fn start_pending(&mut self, target: bool, timer: PendingTimer) {
        self.cancel_pending();
        self.pending = Some(PendingDelay { target, timer });
    }

    pub(crate) fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.cancel();
        }
    }

    /// Consume the pending timer if `id` is the one currently armed,
    /// returning the state it confirms
    pub(crate) fn take_pending(&mut self, id: TimerId) -> Option<bool> {
        match &self.pending {
            Some(pending) if pending.timer.id() == id => {
                let target = pending.target;
                self.pending = None;
                Some(target)
            }
            _ => None,
        }
    }

    /// Apply a confirmed transition, returning whether the state changed
    pub(crate) fn confirm(&mut self, target: bool) -> bool {
        let changed = self.active != target;
        self.active = target;
        changed
    }

    /// Disable and clear without notification
    pub(crate) fn disable(&mut self) {
        self.cancel_pending();
        self.enabled = false;
        self.active = false;
    }
}

impl fmt::Debug for DigitalAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalAlarm")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("active", &self.active)
            .field("polarity", &self.polarity)
            .field("set_delay", &self.set_delay)
            .field("reset_delay", &self.reset_delay)
            .field("pending", &self.pending_target())
            .finish()
    }
}

impl Drop for DigitalAlarm {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
