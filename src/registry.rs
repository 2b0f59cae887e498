// src/registry.rs - Named alarm collections
//
// Digital and analog alarms live in separate maps, each behind its own
// mutex. Whenever both are needed (name uniqueness on insert) the digital
// lock is taken first.

use crate::analog::{AnalogAlarm, AnalogState};
use crate::digital::DigitalAlarm;
use crate::error::{AlarmError, Result};
use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Alarm kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmType {
    Digital,
    Analog,
}

/// Confirmed state of an alarm of either kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    /// Digital alarm active flag
    Digital(bool),
    /// Analog alarm band
    Analog(AnalogState),
}

impl AlarmState {
    pub fn alarm_type(&self) -> AlarmType {
        match self {
            AlarmState::Digital(_) => AlarmType::Digital,
            AlarmState::Analog(_) => AlarmType::Analog,
        }
    }

    /// Whether this is the cleared state (inactive / NOM)
    pub fn is_normal(&self) -> bool {
        matches!(
            self,
            AlarmState::Digital(false) | AlarmState::Analog(AnalogState::Nominal)
        )
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmState::Digital(true) => f.write_str("active"),
            AlarmState::Digital(false) => f.write_str("inactive"),
            AlarmState::Analog(band) => write!(f, "{}", band),
        }
    }
}

/// Snapshot of one alarm as returned by [`AlarmRegistry::list`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmSummary {
    pub name: String,
    pub enabled: bool,
    pub alarm_type: AlarmType,
    pub state: AlarmState,
}

impl From<&DigitalAlarm> for AlarmSummary {
    fn from(alarm: &DigitalAlarm) -> Self {
        Self {
            name: alarm.name().to_string(),
            enabled: alarm.is_enabled(),
            alarm_type: AlarmType::Digital,
            state: AlarmState::Digital(alarm.is_active()),
        }
    }
}

impl From<&AnalogAlarm> for AlarmSummary {
    fn from(alarm: &AnalogAlarm) -> Self {
        Self {
            name: alarm.name().to_string(),
            enabled: alarm.is_enabled(),
            alarm_type: AlarmType::Analog,
            state: AlarmState::Analog(alarm.state()),
        }
    }
}

/// Owner of every alarm record
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    digital: Mutex<HashMap<String, DigitalAlarm>>,
    analog: Mutex<HashMap<String, AnalogAlarm>>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a digital alarm
    ///
    /// Fails on an empty name, a name already used by any alarm, or when the
    /// map cannot grow. Nothing is inserted on failure.
    pub fn add_digital(&self, alarm: DigitalAlarm) -> Result<()> {
        validate_name(alarm.name())?;
        let mut digital = self.digital.lock();
        let analog = self.analog.lock();
        ensure_unique(alarm.name(), digital.contains_key(alarm.name()) || analog.contains_key(alarm.name()))?;
        drop(analog);

        digital
            .try_reserve(1)
            .map_err(|e| AlarmError::AllocationFailure(format!("digital alarm '{}': {}", alarm.name(), e)))?;
        info!(
            "Digital alarm '{}' added ({:?}, set {:?}, reset {:?})",
            alarm.name(),
            alarm.polarity(),
            alarm.set_delay(),
            alarm.reset_delay()
        );
        digital.insert(alarm.name().to_string(), alarm);
        Ok(())
    }

    /// Insert an analog alarm
    ///
    /// Same rules as [`add_digital`](Self::add_digital); thresholds are
    /// validated here once and never again.
    pub fn add_analog(&self, alarm: AnalogAlarm) -> Result<()> {
        validate_name(alarm.name())?;
        alarm.thresholds().validate()?;
        let digital = self.digital.lock();
        let mut analog = self.analog.lock();
        ensure_unique(alarm.name(), digital.contains_key(alarm.name()) || analog.contains_key(alarm.name()))?;
        drop(digital);

        analog
            .try_reserve(1)
            .map_err(|e| AlarmError::AllocationFailure(format!("analog alarm '{}': {}", alarm.name(), e)))?;
        info!(
            "Analog alarm '{}' added ({:?}, set {:?})",
            alarm.name(),
            alarm.thresholds(),
            alarm.set_delay()
        );
        analog.insert(alarm.name().to_string(), alarm);
        Ok(())
    }

    /// Remove an alarm, cancelling its pending timer
    pub fn remove(&self, name: &str) -> Result<AlarmType> {
        if let Some(mut alarm) = self.digital.lock().remove(name) {
            alarm.cancel_pending();
            info!("Digital alarm '{}' has been removed", name);
            return Ok(AlarmType::Digital);
        }
        if let Some(mut alarm) = self.analog.lock().remove(name) {
            alarm.cancel_pending();
            info!("Analog alarm '{}' has been removed", name);
            return Ok(AlarmType::Analog);
        }
        debug!("Alarm '{}' does not exist", name);
        Err(AlarmError::NotFound(name.to_string()))
    }

    /// Disable an alarm and force it back to its normal state, silently
    pub fn disable(&self, name: &str) -> Result<AlarmType> {
        self.with_alarm(
            name,
            |alarm| alarm.disable(),
            |alarm| alarm.disable(),
        )
        .inspect(|kind| info!("{:?} alarm '{}' has been disabled", kind, name))
    }

    /// Re-enable a disabled alarm
    pub fn enable(&self, name: &str) -> Result<AlarmType> {
        self.with_alarm(
            name,
            |alarm| alarm.enabled = true,
            |alarm| alarm.enabled = true,
        )
        .inspect(|kind| info!("{:?} alarm '{}' has been enabled", kind, name))
    }

    /// Force an alarm back to its normal state without touching `enabled`
    pub fn reset(&self, name: &str) -> Result<AlarmType> {
        self.with_alarm(
            name,
            |alarm| alarm.active = false,
            |alarm| alarm.state = AnalogState::Nominal,
        )
        .inspect(|kind| info!("{:?} alarm '{}' has been reset", kind, name))
    }

    /// Snapshot of every alarm, digital first, each group sorted by name
    pub fn list(&self) -> Vec<AlarmSummary> {
        let mut digital: Vec<AlarmSummary> = self
            .digital
            .lock()
            .values()
            .map(AlarmSummary::from)
            .collect();
        digital.sort_by(|a, b| a.name.cmp(&b.name));

        let mut analog: Vec<AlarmSummary> = self
            .analog
            .lock()
            .values()
            .map(AlarmSummary::from)
            .collect();
        analog.sort_by(|a, b| a.name.cmp(&b.name));

        digital.extend(analog);
        digital
    }

    /// Snapshot of one alarm
    pub fn get(&self, name: &str) -> Option<AlarmSummary> {
        if let Some(alarm) = self.digital.lock().get(name) {
            return Some(alarm.into());
        }
        self.analog.lock().get(name).map(AlarmSummary::from)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn digital_len(&self) -> usize {
        self.digital.lock().len()
    }

    pub fn analog_len(&self) -> usize {
        self.analog.lock().len()
    }

    pub fn len(&self) -> usize {
        self.digital_len() + self.analog_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every alarm, cancelling all pending timers
    pub fn clear(&self) {
        self.digital.lock().clear();
        self.analog.lock().clear();
    }

    /// Stop every running delay, leaving states as they are
    pub(crate) fn cancel_all_pending(&self) {
        self.digital.lock().values_mut().for_each(DigitalAlarm::cancel_pending);
        self.analog.lock().values_mut().for_each(AnalogAlarm::cancel_pending);
    }

    pub(crate) fn lock_digital(&self) -> MutexGuard<'_, HashMap<String, DigitalAlarm>> {
        self.digital.lock()
    }

    pub(crate) fn lock_analog(&self) -> MutexGuard<'_, HashMap<String, AnalogAlarm>> {
        self.analog.lock()
    }

    fn with_alarm<D, A>(&self, name: &str, on_digital: D, on_analog: A) -> Result<AlarmType>
    where
        D: FnOnce(&mut DigitalAlarm),
        A: FnOnce(&mut AnalogAlarm),
    {
        if let Some(alarm) = self.digital.lock().get_mut(name) {
            on_digital(alarm);
            return Ok(AlarmType::Digital);
        }
        if let Some(alarm) = self.analog.lock().get_mut(name) {
            on_analog(alarm);
            return Ok(AlarmType::Analog);
        }
        debug!("Alarm '{}' does not exist", name);
        Err(AlarmError::NotFound(name.to_string()))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AlarmError::InvalidName);
    }
    Ok(())
}

fn ensure_unique(name: &str, taken: bool) -> Result<()> {
    if taken {
        return Err(AlarmError::DuplicateName(name.to_string()));
    }
    Ok(())
}
