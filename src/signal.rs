// src/signal.rs - Live signal references and the named signal bus
use crate::{error::{AlarmError, Result}, value::{Value, ValueType}};
use dashmap::DashMap;
use log::trace;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Read-only live view of a process variable
///
/// The engine only ever calls [`read`](SignalSource::read); whoever owns the
/// underlying value is responsible for updating it.
pub trait SignalSource<T>: Send + Sync {
    /// Current value of the signal
    fn read(&self) -> T;
}

/// Shared handle to a signal source, as held by alarm records
pub type SignalRef<T> = Arc<dyn SignalSource<T>>;

impl<T, F> SignalSource<T> for F
where
    F: Fn() -> T + Send + Sync,
{
    fn read(&self) -> T {
        self()
    }
}

/// Boolean signal cell shared between a producer and the engine
///
/// # Examples
///
/// ```rust
/// use alarmon::BoolSignal;
///
/// let input = BoolSignal::new(false);
/// let alarm_view = input.handle();
///
/// input.set(true);
/// assert!(alarm_view.read());
/// ```
#[derive(Clone, Default)]
pub struct BoolSignal {
    value: Arc<AtomicBool>,
}

impl BoolSignal {
    pub fn new(initial: bool) -> Self {
        Self {
            value: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    /// Read-only handle for registering with the engine
    pub fn handle(&self) -> SignalRef<bool> {
        Arc::new(self.clone())
    }
}

impl SignalSource<bool> for BoolSignal {
    fn read(&self) -> bool {
        self.get()
    }
}

impl fmt::Debug for BoolSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoolSignal").field(&self.get()).finish()
    }
}

/// Floating point signal cell shared between a producer and the engine
///
/// Stored as raw bits in an atomic so reads never tear.
#[derive(Clone)]
pub struct FloatSignal {
    bits: Arc<AtomicU64>,
}

impl FloatSignal {
    pub fn new(initial: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(initial.to_bits())),
        }
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Read-only handle for registering with the engine
    pub fn handle(&self) -> SignalRef<f64> {
        Arc::new(self.clone())
    }
}

impl Default for FloatSignal {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl SignalSource<f64> for FloatSignal {
    fn read(&self) -> f64 {
        self.get()
    }
}

impl fmt::Debug for FloatSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FloatSignal").field(&self.get()).finish()
    }
}

/// Thread-safe named signal store
///
/// The bus lets configuration files bind alarms to signals by name. A
/// producer (hardware shim, simulator) writes values; alarms registered via
/// [`SignalBus::bool_ref`] / [`SignalBus::float_ref`] read them on every poll.
///
/// # Examples
///
/// ```rust
/// use alarmon::{SignalBus, Value};
///
/// let bus = SignalBus::new();
/// bus.set("tank_level", Value::Float(0.35))?;
///
/// let level = bus.float_ref("tank_level")?;
/// assert_eq!(level.read(), 0.35);
/// # Ok::<(), alarmon::AlarmError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignalBus {
    signals: Arc<DashMap<String, Value>>,
}

impl SignalBus {
    /// Create a new signal bus
    pub fn new() -> Self {
        Self {
            signals: Arc::new(DashMap::new()),
        }
    }

    /// Set a signal value
    ///
    /// Once a signal exists its type is fixed; writing a value of the other
    /// type is rejected.
    pub fn set(&self, name: impl AsRef<str>, value: Value) -> Result<()> {
        let name = name.as_ref();
        trace!("Setting signal {} = {}", name, value);
        if let Some(mut existing) = self.signals.get_mut(name) {
            if existing.value_type() != value.value_type() {
                return Err(AlarmError::TypeMismatch {
                    expected: existing.type_name(),
                    actual: value.type_name(),
                });
            }
            *existing = value;
            return Ok(());
        }
        self.signals.insert(name.to_string(), value);
        Ok(())
    }

    /// Get a signal value
    ///
    /// Returns `None` if the signal doesn't exist.
    pub fn get(&self, name: impl AsRef<str>) -> Option<Value> {
        self.signals.get(name.as_ref()).map(|entry| *entry.value())
    }

    /// Get a boolean signal value
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Some(Value::Bool(b)) => Ok(b),
            Some(v) => Err(AlarmError::TypeMismatch {
                expected: "bool",
                actual: v.type_name(),
            }),
            None => Err(AlarmError::SignalNotFound(name.to_string())),
        }
    }

    /// Get a float signal value
    pub fn get_float(&self, name: &str) -> Result<f64> {
        match self.get(name) {
            Some(Value::Float(f)) => Ok(f),
            Some(v) => Err(AlarmError::TypeMismatch {
                expected: "float",
                actual: v.type_name(),
            }),
            None => Err(AlarmError::SignalNotFound(name.to_string())),
        }
    }

    /// Type of an existing signal
    pub fn value_type(&self, name: &str) -> Option<ValueType> {
        self.get(name).map(|v| v.value_type())
    }

    /// Live reference to a boolean signal on this bus
    ///
    /// Fails if the signal does not exist or is not boolean. If the signal is
    /// removed later the reference reads `false`.
    pub fn bool_ref(&self, name: &str) -> Result<SignalRef<bool>> {
        self.get_bool(name)?;
        Ok(Arc::new(BusSignal {
            bus: self.clone(),
            name: name.to_string(),
        }))
    }

    /// Live reference to a float signal on this bus
    ///
    /// Fails if the signal does not exist or is not a float. If the signal
    /// is removed later the reference reads NaN, which analog alarms ignore.
    pub fn float_ref(&self, name: &str) -> Result<SignalRef<f64>> {
        self.get_float(name)?;
        Ok(Arc::new(BusSignal {
            bus: self.clone(),
            name: name.to_string(),
        }))
    }

    /// Check if a signal exists
    pub fn exists(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    /// Remove a signal from the bus
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.signals.remove(name).map(|(_, v)| v)
    }

    /// Get the number of signals
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Check if the bus is empty
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Get all signal names
    pub fn signal_names(&self) -> Vec<String> {
        self.signals.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Create a snapshot of all signals
    pub fn snapshot(&self) -> std::collections::HashMap<String, Value> {
        self.signals
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

/// Signal reference resolved through the bus on every read
struct BusSignal {
    bus: SignalBus,
    name: String,
}

impl SignalSource<bool> for BusSignal {
    fn read(&self) -> bool {
        self.bus.get_bool(&self.name).unwrap_or(false)
    }
}

impl SignalSource<f64> for BusSignal {
    fn read(&self) -> f64 {
        self.bus.get_float(&self.name).unwrap_or(f64::NAN)
    }
}
