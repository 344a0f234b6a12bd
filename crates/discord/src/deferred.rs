use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::commands::PendingReply;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FollowupError {
    #[error("follow-up request failed: {0}")]
    Request(String),
    #[error("follow-up rejected with status {0}")]
    Status(u16),
}

/// Edits the original response of an interaction, addressed by its
/// continuation token.
#[async_trait]
pub trait FollowupTransport: Send + Sync {
    async fn edit_original(
        &self,
        continuation_token: &str,
        content: &str,
    ) -> Result<(), FollowupError>;
}

/// Delays slept after each failed attempt. N delays allow N + 1 attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_secs(&tether_core::config::DEFAULT_RETRY_DELAYS_SECS)
    }
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_secs(delays: &[u64]) -> Self {
        Self::new(delays.iter().copied().map(Duration::from_secs).collect())
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    fn attempt(&self, attempt_index: usize) -> DeliveryAttempt {
        DeliveryAttempt {
            attempt_index,
            delay_before_next: self.delays.get(attempt_index).copied(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DeliveryAttempt {
    attempt_index: usize,
    delay_before_next: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: usize },
    Exhausted { attempts: usize },
    /// The handler never produced content, so nothing was sent.
    Abandoned,
}

pub struct DeferredResponder {
    transport: Arc<dyn FollowupTransport>,
    schedule: RetrySchedule,
    tracker: TaskTracker,
}

impl DeferredResponder {
    pub fn new(transport: Arc<dyn FollowupTransport>, schedule: RetrySchedule) -> Self {
        Self { transport, schedule, tracker: TaskTracker::new() }
    }

    pub fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }

    /// Spawns the delivery as a tracked background task and returns at once.
    /// Must be called from within a tokio runtime.
    pub fn deliver(
        &self,
        continuation_token: String,
        pending: PendingReply,
        correlation_id: String,
    ) {
        let transport = self.transport.clone();
        let schedule = self.schedule.clone();

        debug!(
            event_name = "delivery.discord.spawned",
            correlation_id = %correlation_id,
            in_flight = self.tracker.len() + 1,
            "deferred delivery task spawned"
        );

        self.tracker.spawn(async move {
            run_delivery(
                transport.as_ref(),
                &schedule,
                &continuation_token,
                pending,
                &correlation_id,
            )
            .await
        });
    }

    pub fn pending_deliveries(&self) -> usize {
        self.tracker.len()
    }

    /// Closes the task set and waits up to `grace` for in-flight deliveries.
    /// Returns false when some had to be abandoned.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();

        if drained {
            info!(
                event_name = "delivery.discord.drained",
                correlation_id = "shutdown",
                in_flight,
                "deferred deliveries drained"
            );
        } else {
            warn!(
                event_name = "delivery.discord.drain_timeout",
                correlation_id = "shutdown",
                remaining = self.tracker.len(),
                grace_secs = grace.as_secs(),
                "abandoning deferred deliveries still in flight"
            );
        }
        drained
    }
}

/// Awaits the handler result and pushes it with the retry schedule. Never
/// fails: handler errors and panics abandon the delivery, transport errors
/// are retried and finally logged.
pub async fn run_delivery(
    transport: &dyn FollowupTransport,
    schedule: &RetrySchedule,
    continuation_token: &str,
    pending: PendingReply,
    correlation_id: &str,
) -> DeliveryOutcome {
    let content = match AssertUnwindSafe(pending).catch_unwind().await {
        Ok(Ok(content)) => content,
        Ok(Err(handler_error)) => {
            warn!(
                event_name = "delivery.discord.abandoned",
                correlation_id = %correlation_id,
                error = %handler_error,
                "command handler failed; abandoning deferred delivery"
            );
            return DeliveryOutcome::Abandoned;
        }
        Err(_) => {
            error!(
                event_name = "delivery.discord.abandoned",
                correlation_id = %correlation_id,
                "command handler panicked; abandoning deferred delivery"
            );
            return DeliveryOutcome::Abandoned;
        }
    };

    let max_attempts = schedule.max_attempts();
    for attempt_index in 0..max_attempts {
        let attempt = schedule.attempt(attempt_index);

        match transport.edit_original(continuation_token, &content).await {
            Ok(()) => {
                info!(
                    event_name = "delivery.discord.delivered",
                    correlation_id = %correlation_id,
                    attempts = attempt.attempt_index + 1,
                    "deferred response delivered"
                );
                return DeliveryOutcome::Delivered { attempts: attempt.attempt_index + 1 };
            }
            Err(delivery_error) => {
                warn!(
                    event_name = "delivery.discord.attempt_failed",
                    correlation_id = %correlation_id,
                    attempt = attempt.attempt_index + 1,
                    max_attempts,
                    retry_in_ms = attempt.delay_before_next.map(|delay| delay.as_millis() as u64),
                    error = %delivery_error,
                    "deferred delivery attempt failed"
                );

                if let Some(delay) = attempt.delay_before_next {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    error!(
        event_name = "delivery.discord.exhausted",
        correlation_id = %correlation_id,
        attempts = max_attempts,
        "deferred delivery retries exhausted; giving up"
    );
    DeliveryOutcome::Exhausted { attempts: max_attempts }
}
