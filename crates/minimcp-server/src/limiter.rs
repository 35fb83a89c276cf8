//! Concurrency gate and idle watchdog.
//!
//! Every accepted message holds a [`LimiterGuard`] for the whole of its
//! execution. The guard owns one semaphore permit, so at most
//! `max_concurrency` handlers run at once, and one [`IdleHandle`] whose
//! deadline moves forward on every `reset()`. A watchdog that reaches its
//! deadline fires once and ignores later resets.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{McpError, McpResult};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;

/// Process-wide limiter shared by every request of one server
#[derive(Debug, Clone)]
pub struct Limiter {
    gate: Arc<Semaphore>,
    max_concurrency: usize,
    idle_timeout: Duration,
    acquire_timeout: Option<Duration>,
}

impl Limiter {
    pub fn new(max_concurrency: usize, idle_timeout: Duration) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            idle_timeout,
            acquire_timeout: None,
        }
    }

    /// Fail acquisitions that wait longer than `timeout` with [`McpError::Overloaded`]
    /// instead of waiting indefinitely.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.gate.available_permits()
    }

    /// Handlers currently holding a slot
    pub fn active(&self) -> usize {
        self.max_concurrency - self.available()
    }

    /// Wait for a free slot. The idle watchdog starts when this returns.
    ///
    /// Dropping the returned future while waiting gives up the place in the
    /// queue without taking a slot.
    pub async fn acquire(&self) -> McpResult<LimiterGuard> {
        let permit = match self.acquire_timeout {
            None => self.gate.clone().acquire_owned().await,
            Some(limit) => {
                match tokio::time::timeout(limit, self.gate.clone().acquire_owned()).await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(
                            "No handler slot free after {:?} ({} in flight)",
                            limit, self.max_concurrency
                        );
                        return Err(McpError::Overloaded(limit));
                    }
                }
            }
        }
        .map_err(|_| McpError::internal("Concurrency gate closed"))?;

        Ok(LimiterGuard {
            _permit: permit,
            idle: IdleHandle::start(self.idle_timeout),
        })
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY, DEFAULT_IDLE_TIMEOUT)
    }
}

/// One held slot plus its watchdog. The slot is returned when the guard drops,
/// on every exit path including cancellation.
#[derive(Debug)]
pub struct LimiterGuard {
    _permit: OwnedSemaphorePermit,
    idle: IdleHandle,
}

impl LimiterGuard {
    pub fn idle_handle(&self) -> IdleHandle {
        self.idle.clone()
    }
}

#[derive(Debug)]
struct WatchdogClock {
    deadline: Instant,
    fired: bool,
}

/// Resettable idle watchdog for one handler
#[derive(Debug, Clone)]
pub struct IdleHandle {
    timeout: Duration,
    clock: Arc<Mutex<WatchdogClock>>,
}

impl IdleHandle {
    fn start(timeout: Duration) -> Self {
        Self {
            timeout,
            clock: Arc::new(Mutex::new(WatchdogClock {
                deadline: Instant::now() + timeout,
                fired: false,
            })),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Restart the idle window from now. Returns false once the watchdog has fired.
    pub fn reset(&self) -> bool {
        let mut clock = self.clock.lock();
        if clock.fired {
            return false;
        }
        clock.deadline = Instant::now() + self.timeout;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.clock.lock().fired
    }

    /// Resolves when the idle window elapses without a reset.
    pub async fn expired(&self) {
        loop {
            let deadline = {
                let mut clock = self.clock.lock();
                if clock.fired {
                    return;
                }
                if Instant::now() >= clock.deadline {
                    clock.fired = true;
                    debug!("Idle watchdog fired after {:?}", self.timeout);
                    return;
                }
                clock.deadline
            };
            tokio::time::sleep_until(deadline).await;
        }
    }
}
