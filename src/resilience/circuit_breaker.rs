//! Three-state circuit breaker guarding a single downstream dependency.
//!
//! - **Closed**: calls pass through. Consecutive failures are counted and the
//!   counters are cleared every `interval`, so sparse failures never add up.
//!   The circuit opens once consecutive failures exceed `failure_threshold`.
//! - **Open**: calls are rejected without running the operation. After
//!   `cooldown` the breaker moves to half-open.
//! - **HalfOpen**: at most `half_open_max_requests` trial calls are admitted.
//!   Any failure reopens the circuit; that many consecutive successes close it.
//!
//! Every state change starts a new generation. Results of calls admitted in an
//! earlier generation are discarded, so a slow call from before a transition
//! cannot corrupt the counters of the current state.

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::AppError;

/// Downstream dependencies that get their own breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Database,
    Counter,
    Relay,
}

impl Dependency {
    pub const ALL: [Dependency; 3] = [Dependency::Database, Dependency::Counter, Dependency::Relay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dependency::Database => "postgres",
            Dependency::Counter => "counter",
            Dependency::Relay => "relay",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub dependency: Dependency,
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Tuning knobs shared by every breaker in a registry.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// The circuit opens when consecutive failures exceed this value.
    pub failure_threshold: u32,
    /// Time spent open before trial calls are admitted.
    pub cooldown: Duration,
    /// Trial calls admitted while half-open.
    pub half_open_max_requests: u32,
    /// Closed-state counter reset interval. Zero disables the reset.
    pub interval: Duration,
    /// Upper bound on a single guarded call. Elapsing counts as a failure.
    pub call_timeout: Option<Duration>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            half_open_max_requests: 3,
            interval: Duration::from_secs(10),
            call_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit open for {dependency}")]
    Open { dependency: Dependency },

    #[error("{dependency} call timed out after {after:?}")]
    Timeout {
        dependency: Dependency,
        after: Duration,
    },

    #[error(transparent)]
    Inner(E),
}

impl<E: Into<AppError>> From<BreakerError<E>> for AppError {
    fn from(e: BreakerError<E>) -> Self {
        match e {
            BreakerError::Open { dependency } => {
                AppError::dependency(dependency.as_str(), "circuit open")
            }
            BreakerError::Timeout { dependency, after } => AppError::dependency(
                dependency.as_str(),
                format!("timed out after {}ms", after.as_millis()),
            ),
            BreakerError::Inner(inner) => inner.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    requests: u32,
    consecutive_successes: u32,
    consecutive_failures: u32,
}

impl Counts {
    fn on_success(&mut self) {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }
}

struct Inner {
    state: BreakerState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// Thread-safe breaker for one dependency.
///
/// The state lives behind a mutex that is never held across an `.await`, so
/// every transition is observed atomically by all concurrent callers.
pub struct CircuitBreaker {
    dependency: Dependency,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
    events: broadcast::Sender<StateChange>,
}

impl CircuitBreaker {
    pub fn new(
        dependency: Dependency,
        settings: BreakerSettings,
        events: broadcast::Sender<StateChange>,
    ) -> Self {
        let now = Instant::now();
        let expiry = (!settings.interval.is_zero()).then(|| now + settings.interval);

        Self {
            dependency,
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            }),
            events,
        }
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    /// Current state, advancing time-based transitions first.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now()).0
    }

    /// Runs `op` if the breaker admits it and records the outcome.
    ///
    /// # Errors
    ///
    /// - [`BreakerError::Open`] when the call was rejected; `op` was not run.
    /// - [`BreakerError::Timeout`] when `op` exceeded the configured call timeout.
    /// - [`BreakerError::Inner`] with the operation's own error.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(op, |_: &E| false).await
    }

    /// Like [`CircuitBreaker::call`], but an error for which `is_successful`
    /// returns `true` is recorded as a success.
    ///
    /// Use it when the dependency can answer with an error that blames the
    /// input, such as a constraint violation.
    ///
    /// # Errors
    ///
    /// Same as [`CircuitBreaker::call`]; the classified error is still returned.
    pub async fn call_with<T, E, F, Fut, P>(
        &self,
        op: F,
        is_successful: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        let Some(generation) = self.before_call() else {
            return Err(BreakerError::Open {
                dependency: self.dependency,
            });
        };
        let mut attempt = Attempt {
            breaker: self,
            generation,
            settled: false,
        };

        let outcome = match self.settings.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result.map_err(BreakerError::Inner),
                Err(_) => Err(BreakerError::Timeout {
                    dependency: self.dependency,
                    after: limit,
                }),
            },
            None => op().await.map_err(BreakerError::Inner),
        };

        let success = match &outcome {
            Ok(_) => true,
            Err(BreakerError::Inner(e)) => is_successful(e),
            Err(_) => false,
        };
        attempt.settle(success);
        outcome
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admits or rejects a call, returning the generation it belongs to.
    fn before_call(&self) -> Option<u64> {
        let mut inner = self.lock();
        let (state, generation) = self.current_state(&mut inner, Instant::now());

        let admitted = match state {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                inner.counts.requests < self.settings.half_open_max_requests
            }
        };

        if !admitted {
            metrics::counter!("breaker_rejections_total", "dependency" => self.dependency.as_str())
                .increment(1);
            return None;
        }

        inner.counts.requests += 1;
        Some(generation)
    }

    fn after_call(&self, generation: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        let (state, current) = self.current_state(&mut inner, now);
        if generation != current {
            return;
        }

        if success {
            inner.counts.on_success();
            if state == BreakerState::HalfOpen
                && inner.counts.consecutive_successes >= self.settings.half_open_max_requests
            {
                self.set_state(&mut inner, BreakerState::Closed, now);
            }
        } else {
            inner.counts.on_failure();
            match state {
                BreakerState::Closed
                    if inner.counts.consecutive_failures > self.settings.failure_threshold =>
                {
                    self.set_state(&mut inner, BreakerState::Open, now);
                }
                BreakerState::HalfOpen => self.set_state(&mut inner, BreakerState::Open, now),
                _ => {}
            }
        }
    }

    fn current_state(&self, inner: &mut Inner, now: Instant) -> (BreakerState, u64) {
        match inner.state {
            BreakerState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            BreakerState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.set_state(inner, BreakerState::HalfOpen, now);
                }
            }
            BreakerState::HalfOpen => {}
        }
        (inner.state, inner.generation)
    }

    fn set_state(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        self.new_generation(inner, now);

        match to {
            BreakerState::Open => warn!(
                dependency = %self.dependency,
                from = %from,
                to = %to,
                "Circuit breaker opened"
            ),
            _ => info!(
                dependency = %self.dependency,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }
        metrics::counter!(
            "breaker_transitions_total",
            "dependency" => self.dependency.as_str(),
            "to" => to.as_str()
        )
        .increment(1);

        // No subscribers is fine.
        let _ = self.events.send(StateChange {
            dependency: self.dependency,
            from,
            to,
        });
    }

    fn new_generation(&self, inner: &mut Inner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            BreakerState::Closed => {
                (!self.settings.interval.is_zero()).then(|| now + self.settings.interval)
            }
            BreakerState::Open => Some(now + self.settings.cooldown),
            BreakerState::HalfOpen => None,
        };
    }
}

/// Records a failure for calls that are dropped before completing, so a
/// cancelled trial call cannot hold a half-open slot forever.
struct Attempt<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Attempt<'_> {
    fn settle(&mut self, success: bool) {
        self.settled = true;
        self.breaker.after_call(self.generation, success);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.after_call(self.generation, false);
        }
    }
}
