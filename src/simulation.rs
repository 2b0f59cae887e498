// src/simulation.rs - Synthetic signal drivers for demos and soak testing
use crate::config::{SignalPattern, SimulationConfig};
use crate::error::Result;
use crate::signal::SignalBus;
use crate::value::Value;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

struct Driver {
    signal: String,
    pattern: SignalPattern,
    walk: Option<f64>,
}

impl Driver {
    fn sample<R: Rng>(&mut self, elapsed: Duration, rng: &mut R) -> Value {
        let t = elapsed.as_millis() as f64;
        match self.pattern {
            SignalPattern::Square { period_ms } => {
                let phase = (t % period_ms as f64) / period_ms as f64;
                Value::Bool(phase >= 0.5)
            }
            SignalPattern::RandomWalk { min, max, step } => {
                let current = self.walk.unwrap_or((min + max) / 2.0);
                let delta = if step > 0.0 { rng.gen_range(-step..=step) } else { 0.0 };
                let next = (current + delta).clamp(min, max);
                self.walk = Some(next);
                Value::Float(next)
            }
            SignalPattern::Sine { offset, amplitude, period_ms } => {
                let angle = 2.0 * std::f64::consts::PI * t / period_ms as f64;
                Value::Float(offset + amplitude * angle.sin())
            }
        }
    }
}

/// Writes configured waveforms onto bus signals at a fixed period
pub struct Simulator {
    bus: SignalBus,
    period: Duration,
    drivers: Vec<Driver>,
}

impl Simulator {
    pub fn new(bus: SignalBus, config: &SimulationConfig) -> Self {
        let drivers = config
            .signals
            .iter()
            .map(|s| Driver {
                signal: s.signal.clone(),
                pattern: s.pattern.clone(),
                walk: None,
            })
            .collect();
        Self {
            bus,
            period: config.period(),
            drivers,
        }
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Write one sample per signal for time `elapsed` since start
    pub fn step<R: Rng>(&mut self, elapsed: Duration, rng: &mut R) -> Result<()> {
        for driver in &mut self.drivers {
            let value = driver.sample(elapsed, rng);
            self.bus.set(&driver.signal, value)?;
        }
        Ok(())
    }

    /// Drive the bus until the task is dropped or aborted
    pub async fn run(mut self) {
        debug!("Simulating {} signals every {:?}", self.drivers.len(), self.period);
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let start = tokio::time::Instant::now();
        let mut rng = StdRng::from_entropy();
        loop {
            ticker.tick().await;
            if let Err(e) = self.step(start.elapsed(), &mut rng) {
                warn!("Simulation step failed: {}", e);
            }
        }
    }
}
