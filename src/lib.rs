//! alarmon - debounced digital and four-threshold analog alarm monitoring
//!
//! An [`AlarmEngine`] polls a set of named alarms at a fixed period. Digital
//! alarms watch a boolean signal and confirm a change only after it has held
//! for a set or reset delay. Analog alarms map a float signal onto five bands
//! (LL, L, NOM, H, HH) and confirm a band change after a settling delay.
//! Every confirmed transition is published as an [`AlarmEvent`] on the
//! `"alm"` category.
//!
//! # Examples
//!
//! ```rust
//! use alarmon::{AlarmEngine, AlarmEventKind, FloatSignal};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> alarmon::Result<()> {
//! let engine = AlarmEngine::init(10)?;
//! let mut events = engine.subscribe();
//!
//! let level = FloatSignal::new(0.35);
//! engine.add_analog_alarm(true, level.handle(), Some(0.2), Some(0.3), Some(0.4), Some(0.5), 50, "tank");
//!
//! level.set(0.45);
//! let event = events.recv().await.unwrap();
//! assert_eq!(event.kind, AlarmEventKind::Set);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// CORE MODULES
// ============================================================================

/// Error type and result alias
pub mod error;

/// Values carried on the signal bus
pub mod value;

/// Signal references and the named signal bus
pub mod signal;

/// One-shot confirmation delays on the tokio runtime
pub mod timer;

/// Debounced boolean alarms
pub mod digital;

/// Four-threshold analog alarms
pub mod analog;

/// Alarm storage keyed by name
pub mod registry;

/// Set/reset event publication
pub mod events;

/// YAML configuration
pub mod config;

/// Poll driver and public engine handle
pub mod engine;

/// Synthetic signal drivers
#[cfg(feature = "simulation")]
#[cfg_attr(docsrs, doc(cfg(feature = "simulation")))]
pub mod simulation;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use analog::{AnalogAlarm, AnalogState, Direction, Thresholds};
pub use config::{Config, EngineConfig, MAX_EVENT_CHANNEL_CAPACITY};
pub use digital::{DigitalAlarm, Polarity};
pub use engine::{AlarmEngine, EngineStats};
pub use error::{AlarmError, Result};
pub use events::{AlarmEvent, AlarmEventKind, ALARM_EVENT_CATEGORY};
pub use registry::{AlarmState, AlarmSummary, AlarmType};
pub use signal::{BoolSignal, FloatSignal, SignalBus, SignalRef, SignalSource};
pub use value::{Value, ValueType};

#[cfg(feature = "simulation")]
pub use simulation::Simulator;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialise `env_logger` from `RUST_LOG`, defaulting to `alarmon=info`
///
/// Safe to call more than once; later calls leave the first logger in place.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("alarmon=info");
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialised");
    }
}
