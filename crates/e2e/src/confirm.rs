//! Outcome confirmation for actions whose effect shows up asynchronously
//!
//! Submitting a login form can end in a success toast, a redirect, both, or
//! neither within any given window. [`race_wait`] waits for whichever of the
//! two signals comes first, and [`OutcomeConfirmer`] drives the action and the
//! race in a bounded loop until a redirect proves success or the attempt
//! budget runs out.
//!
//! ```text
//!            ┌──────────── attempt n (n ≤ max_retries) ────────────┐
//!            │ trigger_action() ──► race_wait()                     │
//!            │                        ├─ RedirectDetected ─► Confirmed
//!            │                        ├─ SuccessSignal ─► delay(grace)
//!            │                        │      └─ url matches ─► Confirmed
//!            │                        └─ TimedOut / error ─► next attempt
//!            └──────────────────────────────────────────────────────┘
//!                               budget spent ─► Failed
//! ```

use std::fmt;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult};

/// First terminal condition observed by a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceOutcome {
    /// The success indicator became visible
    SuccessSignal,
    /// The page navigated to a URL matching the success pattern
    RedirectDetected,
    /// Neither happened inside the window
    TimedOut,
}

impl fmt::Display for RaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RaceOutcome::SuccessSignal => "success_signal",
            RaceOutcome::RedirectDetected => "redirect_detected",
            RaceOutcome::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Environment capabilities the protocol observes and drives
#[async_trait]
pub trait ConfirmationProbe: Send + Sync {
    /// Whether the success signal becomes visible within `timeout`. Never fails.
    async fn is_signal_visible(&self, timeout: Duration) -> bool;

    /// Resolve once the current URL matches `pattern`.
    /// A plain timeout is reported as `E2eError::Timeout`.
    async fn wait_for_url_match(&self, pattern: &Regex, timeout: Duration) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Re-triggerable action whose effect is being confirmed
    async fn trigger_action(&self) -> E2eResult<()>;

    async fn delay(&self, duration: Duration);
}

/// Progress events emitted while confirming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConfirmationEvent {
    AttemptStarted { attempt: u32, max_attempts: u32 },
    AttemptFailed { attempt: u32, error: String },
    Outcome { attempt: u32, outcome: RaceOutcome },
    SignalWithoutRedirect { attempt: u32, url: String },
    Confirmed { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl fmt::Display for ConfirmationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationEvent::AttemptStarted { attempt, max_attempts } => {
                write!(f, "attempt {}/{} started", attempt, max_attempts)
            }
            ConfirmationEvent::AttemptFailed { attempt, error } => {
                write!(f, "attempt {} failed: {}", attempt, error)
            }
            ConfirmationEvent::Outcome { attempt, outcome } => {
                write!(f, "attempt {} outcome: {}", attempt, outcome)
            }
            ConfirmationEvent::SignalWithoutRedirect { attempt, url } => {
                write!(f, "attempt {}: success signal shown but still at {}", attempt, url)
            }
            ConfirmationEvent::Confirmed { attempts } => {
                write!(f, "confirmed after {} attempt(s)", attempts)
            }
            ConfirmationEvent::Exhausted { attempts } => {
                write!(f, "not confirmed after {} attempt(s)", attempts)
            }
        }
    }
}

/// Receiver for confirmation events. Must not fail.
pub trait EventSink: Send + Sync {
    fn log(&self, event: &ConfirmationEvent);
}

/// Sink that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log(&self, event: &ConfirmationEvent) {
        match event {
            ConfirmationEvent::AttemptStarted { .. } => debug!("[confirm] {}", event),
            ConfirmationEvent::AttemptFailed { .. }
            | ConfirmationEvent::SignalWithoutRedirect { .. } => warn!("[confirm] {}", event),
            ConfirmationEvent::Exhausted { .. } => error!("[confirm] {}", event),
            _ => info!("[confirm] {}", event),
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ConfirmationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ConfirmationEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn log(&self, event: &ConfirmationEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Wait for the success signal or a matching URL, whichever comes first.
///
/// A probe that gives up inside the window drops out of the race and the
/// other keeps running. `TimedOut` is returned when both drop out or the
/// window elapses. Only a non-timeout failure of the URL wait is an error.
pub async fn race_wait<P>(probe: &P, pattern: &Regex, timeout: Duration) -> E2eResult<RaceOutcome>
where
    P: ConfirmationProbe + ?Sized,
{
    let signal = async {
        if probe.is_signal_visible(timeout).await {
            Some(RaceOutcome::SuccessSignal)
        } else {
            None
        }
    };

    let redirect = async {
        match probe.wait_for_url_match(pattern, timeout).await {
            Ok(()) => Some(Ok(RaceOutcome::RedirectDetected)),
            Err(e) if e.is_timeout() => None,
            Err(e) => Some(Err(e)),
        }
    };

    let race = async {
        tokio::select! {
            Some(outcome) = signal => Ok(outcome),
            Some(result) = redirect => result,
            else => Ok(RaceOutcome::TimedOut),
        }
    };

    match tokio::time::timeout(timeout, race).await {
        Ok(result) => result,
        Err(_) => Ok(RaceOutcome::TimedOut),
    }
}

/// Settings for one confirmation run
#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// Maximum number of attempts, each one action plus one race
    pub max_retries: u32,

    /// Window for each race
    pub race_timeout: Duration,

    /// Pause after a bare success signal before re-reading the URL
    pub grace_period: Duration,

    /// Raw regex a URL must match to count as success
    pub success_pattern: String,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            race_timeout: Duration::from_millis(5000),
            grace_period: Duration::from_millis(1000),
            success_pattern: "dashboard".to_string(),
        }
    }
}

/// Bounded retry loop around an action and its race
pub struct OutcomeConfirmer<'a> {
    probe: &'a dyn ConfirmationProbe,
    sink: &'a dyn EventSink,
    config: ConfirmationConfig,
    pattern: Regex,
}

impl<'a> OutcomeConfirmer<'a> {
    /// Build a confirmer. Fails on a malformed pattern or a zero budget.
    pub fn new(
        probe: &'a dyn ConfirmationProbe,
        sink: &'a dyn EventSink,
        config: ConfirmationConfig,
    ) -> E2eResult<Self> {
        if config.max_retries == 0 {
            return Err(E2eError::InvalidConfig("max_retries must be at least 1".to_string()));
        }

        let pattern = Regex::new(&config.success_pattern).map_err(|source| E2eError::InvalidPattern {
            pattern: config.success_pattern.clone(),
            source,
        })?;

        Ok(Self { probe, sink, config, pattern })
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Trigger the action and confirm its effect.
    ///
    /// Returns `true` once a redirect is seen (directly, or by re-reading the
    /// URL after the grace period that follows a success signal). The action
    /// runs at most `max_retries` times in total. Failures inside an attempt
    /// use up that attempt and are never returned.
    pub async fn confirm(&self) -> bool {
        let max = self.config.max_retries;

        for attempt in 1..=max {
            self.sink.log(&ConfirmationEvent::AttemptStarted { attempt, max_attempts: max });

            let outcome = match self.attempt().await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.sink.log(&ConfirmationEvent::AttemptFailed { attempt, error: e.to_string() });
                    RaceOutcome::TimedOut
                }
            };
            self.sink.log(&ConfirmationEvent::Outcome { attempt, outcome });

            match outcome {
                RaceOutcome::RedirectDetected => {
                    self.sink.log(&ConfirmationEvent::Confirmed { attempts: attempt });
                    return true;
                }
                RaceOutcome::SuccessSignal => {
                    self.probe.delay(self.config.grace_period).await;
                    match self.probe.current_url().await {
                        Ok(url) if self.pattern.is_match(&url) => {
                            self.sink.log(&ConfirmationEvent::Confirmed { attempts: attempt });
                            return true;
                        }
                        Ok(url) => {
                            self.sink.log(&ConfirmationEvent::SignalWithoutRedirect { attempt, url });
                        }
                        Err(e) => {
                            self.sink.log(&ConfirmationEvent::AttemptFailed { attempt, error: e.to_string() });
                        }
                    }
                }
                RaceOutcome::TimedOut => {}
            }
        }

        self.sink.log(&ConfirmationEvent::Exhausted { attempts: max });
        false
    }

    async fn attempt(&self) -> E2eResult<RaceOutcome> {
        self.probe.trigger_action().await?;
        race_wait(self.probe, &self.pattern, self.config.race_timeout).await
    }
}
