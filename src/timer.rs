// src/timer.rs - One-shot confirmation delays
//
// Each alarm owns at most one PendingTimer. A timer only carries the id it
// was armed with; the fire callback looks the alarm up by name and compares
// ids under the collection lock, so a timer that lost a race with a cancel
// (or with removal of its alarm) is harmless.

use crate::error::{AlarmError, Result};
use log::trace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Identity of one armed delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Arms one-shot delays on the runtime the engine was initialised on
#[derive(Debug)]
pub struct TimerService {
    handle: Handle,
    next_id: AtomicU64,
}

impl TimerService {
    /// Bind to the tokio runtime of the calling context
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| AlarmError::Runtime(format!("no tokio runtime available: {}", e)))?;
        Ok(Self::with_handle(handle))
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
        }
    }

    /// Arm a delay; `on_fire` runs on the runtime once it elapses
    ///
    /// A zero delay fires at the next scheduling opportunity.
    pub fn arm<F>(&self, delay: Duration, on_fire: F) -> PendingTimer
    where
        F: FnOnce(TimerId) + Send + 'static,
    {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        trace!("Arming timer {} for {:?}", id.0, delay);
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(id);
        });
        PendingTimer {
            id,
            abort: Some(task.abort_handle()),
        }
    }
}

/// An armed, not yet confirmed delay
#[derive(Debug)]
pub struct PendingTimer {
    id: TimerId,
    abort: Option<AbortHandle>,
}

impl PendingTimer {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Stop the delay; a no-op if it already fired
    pub fn cancel(self) {
        if let Some(abort) = self.abort {
            trace!("Cancelling timer {}", self.id.0);
            abort.abort();
        }
    }

    /// Timer with no backing task, used to exercise state machines directly
    #[cfg(test)]
    pub(crate) fn detached(id: u64) -> Self {
        Self {
            id: TimerId(id),
            abort: None,
        }
    }
}
