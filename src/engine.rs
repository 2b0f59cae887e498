// src/engine.rs - Alarm engine: poll driver, timer callbacks, public API
use crate::{
    analog::{AnalogAction, AnalogAlarm, Direction, Thresholds},
    config::{Config, EngineConfig},
    digital::{DigitalAction, DigitalAlarm, Polarity},
    error::*,
    events::{AlarmEvent, AlarmEventKind, EventPublisher},
    registry::{AlarmRegistry, AlarmState, AlarmSummary, AlarmType},
    signal::{SignalBus, SignalRef},
    timer::{PendingTimer, TimerId, TimerService},
};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Clone, Debug, Serialize)]
pub struct EngineStats {
    pub running: bool,
    pub poll_interval_ms: u64,
    pub tick_count: u64,
    pub events_published: u64,
    pub subscriber_count: usize,
    pub digital_alarm_count: usize,
    pub analog_alarm_count: usize,
    pub uptime_secs: u64,
}

/// State shared between the engine handle, the poll driver and timer tasks
///
/// Only the handle holds a strong reference; tasks upgrade a `Weak` for the
/// duration of one tick or one callback.
#[derive(Debug)]
struct Shared {
    registry: AlarmRegistry,
    publisher: EventPublisher,
    timers: TimerService,
    poll_interval: Duration,
    running: AtomicBool,
    tick_count: AtomicU64,
    start_time: Instant,
}

impl Shared {
    fn poll(self: &Arc<Self>) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        let tick = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("Poll tick {}", tick);

        {
            let mut digital = self.registry.lock_digital();
            for alarm in digital.values_mut().filter(|a| a.is_enabled()) {
                match alarm.evaluate() {
                    DigitalAction::Hold => {}
                    DigitalAction::Cancel => {
                        debug!("Digital alarm '{}': input returned, delay cancelled", alarm.name());
                        alarm.cancel_pending();
                    }
                    DigitalAction::Arm { delay, target } => {
                        debug!(
                            "Digital alarm '{}': {} delay {:?} started",
                            alarm.name(),
                            if target { "set" } else { "reset" },
                            delay
                        );
                        let timer = self.arm_digital(alarm.name(), delay);
                        alarm.start_pending(target, timer);
                    }
                }
            }
        }

        {
            let mut analog = self.registry.lock_analog();
            for alarm in analog.values_mut().filter(|a| a.is_enabled()) {
                match alarm.evaluate() {
                    AnalogAction::Hold => {}
                    AnalogAction::Cancel => {
                        debug!(
                            "Analog alarm '{}': back in {}, delay cancelled",
                            alarm.name(),
                            alarm.state()
                        );
                        alarm.cancel_pending();
                    }
                    AnalogAction::Arm(direction) => {
                        debug!(
                            "Analog alarm '{}': {:?} delay {:?} started from {}",
                            alarm.name(),
                            direction,
                            alarm.set_delay(),
                            alarm.state()
                        );
                        let timer = self.arm_analog(alarm.name(), alarm.set_delay());
                        alarm.start_pending(direction, timer);
                    }
                }
            }
        }
    }

    fn arm_digital(self: &Arc<Self>, name: &str, delay: Duration) -> PendingTimer {
        let shared = Arc::downgrade(self);
        let name = name.to_string();
        self.timers.arm(delay, move |id| {
            if let Some(shared) = shared.upgrade() {
                shared.on_digital_timer(&name, id);
            }
        })
    }

    fn arm_analog(self: &Arc<Self>, name: &str, delay: Duration) -> PendingTimer {
        let shared = Arc::downgrade(self);
        let name = name.to_string();
        self.timers.arm(delay, move |id| {
            if let Some(shared) = shared.upgrade() {
                shared.on_analog_timer(&name, id);
            }
        })
    }

    fn on_digital_timer(&self, name: &str, id: TimerId) {
        let mut digital = self.registry.lock_digital();
        let Some(alarm) = digital.get_mut(name) else {
            trace!("Timer {} fired for removed alarm '{}'", id.value(), name);
            return;
        };
        let Some(target) = alarm.take_pending(id) else {
            trace!("Stale timer {} for digital alarm '{}' ignored", id.value(), name);
            return;
        };
        if !alarm.is_enabled() || !alarm.confirm(target) {
            return;
        }

        let kind = if target { AlarmEventKind::Set } else { AlarmEventKind::Reset };
        info!("Digital alarm '{}' {}", name, if target { "set" } else { "reset" });
        self.publisher
            .publish(AlarmEvent::new(kind, name, AlarmState::Digital(target)));
    }

    fn on_analog_timer(&self, name: &str, id: TimerId) {
        let mut analog = self.registry.lock_analog();
        let Some(alarm) = analog.get_mut(name) else {
            trace!("Timer {} fired for removed alarm '{}'", id.value(), name);
            return;
        };
        let Some(direction) = alarm.take_pending(id) else {
            trace!("Stale timer {} for analog alarm '{}' ignored", id.value(), name);
            return;
        };
        if !alarm.is_enabled() {
            return;
        }
        let Some(previous) = alarm.confirm(direction) else {
            debug!(
                "Analog alarm '{}': value left the {:?} band before the delay elapsed",
                name, direction
            );
            return;
        };

        let state = alarm.state();
        let kind = match Direction::between(previous, state) {
            Direction::Clearing => AlarmEventKind::Reset,
            Direction::Escalating => AlarmEventKind::Set,
        };
        info!("Analog alarm '{}' {} -> {}", name, previous, state);
        self.publisher
            .publish(AlarmEvent::new(kind, name, AlarmState::Analog(state)));
    }
}

/// Handle to a running alarm engine
///
/// Created inside a tokio runtime; the poll driver and every confirmation
/// delay run as tasks on that runtime. Dropping the handle stops the driver
/// and cancels all pending delays.
///
/// # Examples
///
/// ```rust
/// use alarmon::{AlarmEngine, BoolSignal, Polarity};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> alarmon::Result<()> {
/// let engine = AlarmEngine::init(100)?;
/// let door = BoolSignal::new(false);
///
/// assert!(engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 1000, 500, "door_open"));
/// assert_eq!(engine.list_alarms().len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct AlarmEngine {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl AlarmEngine {
    /// Start an engine polling every `poll_interval_ms`
    ///
    /// Must be called from within a tokio runtime. A non-positive interval is
    /// rejected.
    pub fn init(poll_interval_ms: i64) -> Result<Self> {
        let poll_interval_ms = u64::try_from(poll_interval_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                AlarmError::Config(format!(
                    "poll interval must be positive, got {}ms",
                    poll_interval_ms
                ))
            })?;
        Self::new(&EngineConfig {
            poll_interval_ms,
            ..EngineConfig::default()
        })
    }

    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let timers = TimerService::current()?;
        let publisher = EventPublisher::new(config.event_channel_capacity);

        let shared = Arc::new(Shared {
            registry: AlarmRegistry::new(),
            publisher,
            timers,
            poll_interval: config.poll_interval(),
            running: AtomicBool::new(true),
            tick_count: AtomicU64::new(0),
            start_time: Instant::now(),
        });

        let driver = tokio::spawn(run_driver(Arc::downgrade(&shared), shared.poll_interval));
        info!(
            "Alarm engine started: poll interval {:?}, event category '{}'",
            shared.poll_interval,
            shared.publisher.category()
        );

        Ok(Self {
            shared,
            driver: Mutex::new(Some(driver)),
        })
    }

    /// Build an engine from a validated configuration
    ///
    /// Configured signals are created on `bus` with their initial values and
    /// every configured alarm is bound to its bus signal.
    pub fn from_config(config: &Config, bus: &SignalBus) -> Result<Self> {
        config.validate()?;

        for signal in &config.signals {
            let value = signal.initial_value()?;
            bus.set(&signal.name, value)?;
            debug!("Initialized signal '{}' as {} = {}", signal.name, signal.signal_type.name(), value);
        }

        let engine = Self::new(&config.engine)?;

        for alarm in &config.digital_alarms {
            let record = DigitalAlarm::new(
                &alarm.name,
                bus.bool_ref(&alarm.signal)?,
                alarm.polarity,
                Duration::from_millis(alarm.set_delay_ms),
                Duration::from_millis(alarm.reset_delay_ms),
            )
            .enabled(alarm.enabled);
            engine.add_digital(record)?;
        }

        for alarm in &config.analog_alarms {
            let record = AnalogAlarm::new(
                &alarm.name,
                bus.float_ref(&alarm.signal)?,
                alarm.thresholds(),
                Duration::from_millis(alarm.set_delay_ms),
            )
            .enabled(alarm.enabled);
            engine.add_analog(record)?;
        }

        Ok(engine)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub fn add_digital(&self, alarm: DigitalAlarm) -> Result<()> {
        self.shared.registry.add_digital(alarm)
    }

    pub fn add_analog(&self, alarm: AnalogAlarm) -> Result<()> {
        self.shared.registry.add_analog(alarm)
    }

    /// Register a debounced boolean alarm
    ///
    /// Negative delays are treated as 0. Returns `false` (and logs why) if
    /// the name is empty or already used.
    pub fn add_digital_alarm(
        &self,
        enabled: bool,
        signal: SignalRef<bool>,
        polarity: Polarity,
        set_delay_ms: i64,
        reset_delay_ms: i64,
        name: &str,
    ) -> bool {
        let alarm = DigitalAlarm::new(
            name,
            signal,
            polarity,
            clamp_delay(set_delay_ms),
            clamp_delay(reset_delay_ms),
        )
        .enabled(enabled);
        report("Digital alarm", name, self.add_digital(alarm))
    }

    /// Register a four-threshold analog alarm
    ///
    /// `None` leaves a setpoint unset. Returns `false` (and logs why) if the
    /// name is empty or taken, or if the set thresholds are out of order or
    /// all unset.
    #[allow(clippy::too_many_arguments)]
    pub fn add_analog_alarm(
        &self,
        enabled: bool,
        signal: SignalRef<f64>,
        ll: Option<f64>,
        l: Option<f64>,
        h: Option<f64>,
        hh: Option<f64>,
        set_delay_ms: i64,
        name: &str,
    ) -> bool {
        let alarm = AnalogAlarm::new(
            name,
            signal,
            Thresholds { ll, l, h, hh },
            clamp_delay(set_delay_ms),
        )
        .enabled(enabled);
        report("Analog alarm", name, self.add_analog(alarm))
    }

    // ------------------------------------------------------------------
    // Management
    // ------------------------------------------------------------------

    pub fn remove_alarm(&self, name: &str) -> bool {
        self.shared.registry.remove(name).is_ok()
    }

    /// Disable an alarm; it returns to its normal state without an event
    pub fn disable_alarm(&self, name: &str) -> bool {
        self.shared.registry.disable(name).is_ok()
    }

    pub fn enable_alarm(&self, name: &str) -> bool {
        self.shared.registry.enable(name).is_ok()
    }

    /// Force an alarm back to its normal state without an event
    ///
    /// A delay already running is kept. It is replaced on the next tick if
    /// the input now points away from the reset state, otherwise it is
    /// re-checked when it fires.
    pub fn reset_alarm(&self, name: &str) -> bool {
        self.shared.registry.reset(name).is_ok()
    }

    pub fn list_alarms(&self) -> Vec<AlarmSummary> {
        self.shared.registry.list()
    }

    pub fn alarm(&self, name: &str) -> Option<AlarmSummary> {
        self.shared.registry.get(name)
    }

    pub fn alarm_type(&self, name: &str) -> Option<AlarmType> {
        self.alarm(name).map(|summary| summary.alarm_type)
    }

    // ------------------------------------------------------------------
    // Events and runtime
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<AlarmEvent> {
        self.shared.publisher.subscribe()
    }

    pub fn event_category(&self) -> &'static str {
        self.shared.publisher.category()
    }

    /// Run one poll tick now, in addition to the periodic driver
    pub fn poll(&self) {
        self.shared.poll();
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> EngineStats {
        let shared = &self.shared;
        EngineStats {
            running: self.is_running(),
            poll_interval_ms: shared.poll_interval.as_millis() as u64,
            tick_count: shared.tick_count.load(Ordering::Relaxed),
            events_published: shared.publisher.published(),
            subscriber_count: shared.publisher.subscriber_count(),
            digital_alarm_count: shared.registry.digital_len(),
            analog_alarm_count: shared.registry.analog_len(),
            uptime_secs: shared.start_time.elapsed().as_secs(),
        }
    }

    /// Stop the poll driver and cancel every pending delay
    ///
    /// Registered alarms stay listed with their last state. Calling this
    /// twice is harmless.
    pub fn shutdown(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
        self.shared.registry.cancel_all_pending();
        info!(
            "Alarm engine stopped after {} ticks",
            self.shared.tick_count.load(Ordering::Relaxed)
        );
    }
}

impl Drop for AlarmEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AlarmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmEngine")
            .field("running", &self.is_running())
            .field("poll_interval", &self.shared.poll_interval)
            .field("alarms", &self.shared.registry.len())
            .finish()
    }
}

async fn run_driver(shared: Weak<Shared>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.running.load(Ordering::Acquire) {
            break;
        }
        shared.poll();
    }
    debug!("Poll driver exited");
}

fn clamp_delay(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

fn report(kind: &str, name: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e @ AlarmError::AllocationFailure(_)) => {
            error!("{} '{}' failed to init: {}", kind, name, e);
            false
        }
        Err(e) => {
            warn!("{} '{}' failed to init: {}", kind, name, e);
            false
        }
    }
}
