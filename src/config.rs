// src/config.rs - YAML configuration for the engine, signals and alarms

use crate::analog::Thresholds;
use crate::digital::Polarity;
use crate::error::{AlarmError, Result};
use crate::value::{Value, ValueType};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// Top-level alarmon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Signal definitions
    #[serde(default)]
    pub signals: Vec<SignalConfig>,

    /// Debounced boolean alarms
    #[serde(default)]
    pub digital_alarms: Vec<DigitalAlarmConfig>,

    /// Four-threshold analog alarms
    #[serde(default)]
    pub analog_alarms: Vec<AnalogAlarmConfig>,

    /// Optional signal simulation
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        let mut signals = HashSet::new();
        for signal in &self.signals {
            if signal.name.is_empty() {
                return Err(AlarmError::Config("Signal name must not be empty".into()));
            }
            if !signals.insert(signal.name.as_str()) {
                return Err(AlarmError::Config(format!("Duplicate signal name: {}", signal.name)));
            }
            signal.initial_value()?;
        }

        let mut alarms = HashSet::new();
        for alarm in &self.digital_alarms {
            if !alarms.insert(alarm.name.as_str()) {
                return Err(AlarmError::Config(format!("Duplicate alarm name: {}", alarm.name)));
            }
            self.check_signal(&alarm.name, &alarm.signal, ValueType::Bool)?;
        }
        for alarm in &self.analog_alarms {
            if !alarms.insert(alarm.name.as_str()) {
                return Err(AlarmError::Config(format!("Duplicate alarm name: {}", alarm.name)));
            }
            self.check_signal(&alarm.name, &alarm.signal, ValueType::Float)?;
            alarm.thresholds().validate().map_err(|e| {
                AlarmError::Config(format!("Analog alarm '{}': {}", alarm.name, e))
            })?;
        }
        if alarms.contains("") {
            return Err(AlarmError::Config("Alarm name must not be empty".into()));
        }

        if let Some(simulation) = &self.simulation {
            simulation.validate(self)?;
        }

        if let Some(shortest) = self.shortest_delay() {
            let poll = self.engine.poll_interval();
            if poll * 10 > shortest {
                warn!(
                    "Poll interval {:?} is more than a tenth of the shortest alarm delay {:?}; \
                     confirmations will be late by up to one poll",
                    poll, shortest
                );
            }
        }

        Ok(())
    }

    /// Shortest non-zero delay over all configured alarms
    pub fn shortest_delay(&self) -> Option<Duration> {
        self.digital_alarms
            .iter()
            .flat_map(|a| [a.set_delay_ms, a.reset_delay_ms])
            .chain(self.analog_alarms.iter().map(|a| a.set_delay_ms))
            .filter(|ms| *ms > 0)
            .min()
            .map(Duration::from_millis)
    }

    pub fn signal(&self, name: &str) -> Option<&SignalConfig> {
        self.signals.iter().find(|s| s.name == name)
    }

    fn check_signal(&self, alarm: &str, signal: &str, expected: ValueType) -> Result<()> {
        match self.signal(signal) {
            Some(s) if s.signal_type == expected => Ok(()),
            Some(s) => Err(AlarmError::Config(format!(
                "Alarm '{}' needs a {} signal but '{}' is {}",
                alarm,
                expected.name(),
                signal,
                s.signal_type.name()
            ))),
            None => Err(AlarmError::Config(format!(
                "Alarm '{}' references unknown signal '{}'",
                alarm, signal
            ))),
        }
    }
}

// ============================================================================
// ENGINE CONFIGURATION
// ============================================================================

/// Largest accepted `event_channel_capacity`
pub const MAX_EVENT_CHANNEL_CAPACITY: usize = 65_536;

/// Engine runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Poll period in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Events buffered per subscriber before it starts lagging
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            event_channel_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(AlarmError::Config("poll_interval_ms must be greater than 0".into()));
        }
        if self.event_channel_capacity == 0 {
            return Err(AlarmError::Config(
                "event_channel_capacity must be greater than 0".into(),
            ));
        }
        if self.event_channel_capacity > MAX_EVENT_CHANNEL_CAPACITY {
            return Err(AlarmError::Config(format!(
                "event_channel_capacity {} exceeds the maximum of {}",
                self.event_channel_capacity, MAX_EVENT_CHANNEL_CAPACITY
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SIGNALS
// ============================================================================

/// Signal definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub signal_type: ValueType,
    #[serde(default)]
    pub initial: serde_yaml::Value,
}

impl SignalConfig {
    /// Typed initial value; a missing `initial` means false / 0.0
    pub fn initial_value(&self) -> Result<Value> {
        if self.initial.is_null() {
            return Ok(Value::zero(self.signal_type));
        }
        let value = match self.signal_type {
            ValueType::Bool => self.initial.as_bool().map(Value::Bool),
            ValueType::Float => self.initial.as_f64().map(Value::Float),
        };
        value.ok_or_else(|| {
            AlarmError::Config(format!(
                "Invalid initial value for {} signal '{}'",
                self.signal_type.name(),
                self.name
            ))
        })
    }
}

// ============================================================================
// ALARMS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalAlarmConfig {
    pub name: String,
    /// Boolean signal the alarm watches
    pub signal: String,
    #[serde(default = "default_polarity")]
    pub polarity: Polarity,
    #[serde(default)]
    pub set_delay_ms: u64,
    #[serde(default)]
    pub reset_delay_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogAlarmConfig {
    pub name: String,
    /// Float signal the alarm watches
    pub signal: String,
    #[serde(default)]
    pub ll: Option<f64>,
    #[serde(default)]
    pub l: Option<f64>,
    #[serde(default)]
    pub h: Option<f64>,
    #[serde(default)]
    pub hh: Option<f64>,
    #[serde(default)]
    pub set_delay_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AnalogAlarmConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            ll: self.ll,
            l: self.l,
            h: self.h,
            hh: self.hh,
        }
    }
}

// ============================================================================
// SIMULATION
// ============================================================================

/// Drives bus signals with synthetic waveforms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Update period in milliseconds
    #[serde(default = "default_simulation_period")]
    pub period_ms: u64,
    #[serde(default)]
    pub signals: Vec<SimulatedSignalConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedSignalConfig {
    pub signal: String,
    pub pattern: SignalPattern,
}

/// Waveform written to a simulated signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalPattern {
    /// Boolean toggling every half period
    Square { period_ms: u64 },
    /// Float moving by up to `step` per update, clamped to `[min, max]`
    RandomWalk { min: f64, max: f64, step: f64 },
    /// Float `offset + amplitude * sin(2πt / period)`
    Sine {
        #[serde(default)]
        offset: f64,
        amplitude: f64,
        period_ms: u64,
    },
}

impl SignalPattern {
    pub fn value_type(&self) -> ValueType {
        match self {
            SignalPattern::Square { .. } => ValueType::Bool,
            SignalPattern::RandomWalk { .. } | SignalPattern::Sine { .. } => ValueType::Float,
        }
    }
}

impl SimulationConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        if self.period_ms == 0 {
            return Err(AlarmError::Config("simulation period_ms must be greater than 0".into()));
        }
        for sim in &self.signals {
            let Some(signal) = config.signal(&sim.signal) else {
                return Err(AlarmError::Config(format!(
                    "Simulation references unknown signal '{}'",
                    sim.signal
                )));
            };
            if signal.signal_type != sim.pattern.value_type() {
                return Err(AlarmError::Config(format!(
                    "Simulation pattern for '{}' produces {} values but the signal is {}",
                    sim.signal,
                    sim.pattern.value_type().name(),
                    signal.signal_type.name()
                )));
            }
            match sim.pattern {
                SignalPattern::Square { period_ms } | SignalPattern::Sine { period_ms, .. }
                    if period_ms == 0 =>
                {
                    return Err(AlarmError::Config(format!(
                        "Simulation pattern for '{}' needs a non-zero period",
                        sim.signal
                    )));
                }
                SignalPattern::RandomWalk { min, max, step } if !(min <= max) || !(step >= 0.0) => {
                    return Err(AlarmError::Config(format!(
                        "Random walk for '{}' needs min <= max and step >= 0",
                        sim.signal
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ============================================================================
// DEFAULT VALUE FUNCTIONS
// ============================================================================

fn default_poll_interval() -> u64 { 100 }
fn default_event_capacity() -> usize { 256 }
fn default_simulation_period() -> u64 { 100 }
fn default_polarity() -> Polarity { Polarity::ActiveHigh }
fn default_true() -> bool { true }
