//! Stream supervisor
//!
//! Sole consumer of the message stream. Routes events one at a time, and on a
//! transient fault re-runs the connect sequence with exponential backoff.
//! Fatal faults, or running out of attempts, end the supervisor with
//! [`GatewayError::StreamFault`].

use super::MessageRouter;
use crate::connection::ConnectionSession;
use crate::error::{GatewayError, GatewayResult, StreamFault};
use crate::transport::MessageStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Resubscription backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per fault before giving up; zero disables resubscription
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt` (1-based), doubling each time
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Owns the message stream for the lifetime of a connection
pub struct StreamSupervisor {
    session: Arc<ConnectionSession>,
    router: MessageRouter,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl StreamSupervisor {
    pub fn new(
        session: Arc<ConnectionSession>,
        router: MessageRouter,
        retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            router,
            retry,
            shutdown,
        }
    }

    /// Consume the stream until shutdown or an unrecoverable fault
    pub async fn run(mut self, mut stream: MessageStream) -> GatewayResult<()> {
        tracing::info!(user_id = %stream.own_user_id(), "Stream supervisor started");

        loop {
            let item = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                item = stream.next() => item,
            };

            let fault = match item {
                Some(Ok(event)) => {
                    let outcome = self.router.route(&event);
                    tracing::trace!(
                        message_id = %event.message.id,
                        room = %event.message.rid,
                        outcome = %outcome,
                        "Stream event routed"
                    );
                    continue;
                }
                Some(Err(fault)) => fault,
                None => StreamFault::Disconnected("stream ended".to_string()),
            };

            if !fault.is_transient() {
                tracing::error!(fault = %fault, "Unrecoverable stream fault");
                return Err(GatewayError::StreamFault(fault));
            }

            tracing::warn!(fault = %fault, "Stream interrupted, resubscribing");
            if !self.resubscribe(&mut stream, fault).await? {
                break;
            }
        }

        tracing::info!("Stream supervisor stopped");
        Ok(())
    }

    /// Returns `Ok(false)` when shutdown was requested while retrying
    async fn resubscribe(&mut self, stream: &mut MessageStream, fault: StreamFault) -> GatewayResult<bool> {
        for attempt in 1..=self.retry.max_attempts {
            let delay = self.retry.delay_for(attempt);

            tokio::select! {
                biased;
                _ = self.shutdown.changed() => return Ok(false),
                () = tokio::time::sleep(delay) => {}
            }

            match self.session.reopen_stream(stream).await {
                Ok(()) => {
                    tracing::info!(attempt = attempt, "Message stream re-established");
                    return Ok(true);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Resubscription attempt failed"
                    );
                }
            }
        }

        tracing::error!(
            attempts = self.retry.max_attempts,
            fault = %fault,
            "Giving up on message stream"
        );
        Err(GatewayError::StreamFault(fault))
    }
}

impl std::fmt::Debug for StreamSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSupervisor")
            .field("retry", &self.retry)
            .field("sessions", &self.router.registry().len())
            .finish()
    }
}
