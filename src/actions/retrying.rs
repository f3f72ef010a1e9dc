//! Asynchronous retrying post-action decorator.
//!
//! State machine per invocation: submit → run the delegate on the runtime →
//! await the result with a per-attempt timeout → classify through the
//! pluggable result check → on error, let the retry policy decide whether to
//! re-invoke or give up. Exhaustion is logged, never propagated: a failed
//! side effect must not disturb other messages or the persistence result.
//!
//! `close()` stops pending retries and gives in-flight invocations a bounded
//! grace period to drain before shutdown proceeds; failing to drain is
//! logged, not fatal. Each `run()` invocation holds one in-flight permit for
//! its whole lifetime, backoff sleeps included.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use super::{PostAction, PostActionError};
use crate::database::ArchivedMessage;
use crate::processing::ProcessingContext;
use crate::resilience::{retry_with_policy, RetryPolicy};

/// Pluggable classification of one attempt's result. The default accepts
/// `Ok` and passes errors through; a custom check can map delegate-specific
/// statuses onto success or failure.
pub type ResultCheck = Arc<
    dyn Fn(Result<(), PostActionError>) -> Result<(), PostActionError> + Send + Sync,
>;

/// Decorator executing its delegate asynchronously with timeout and retry.
pub struct RetryingPostAction {
    delegate: Arc<dyn PostAction>,
    retry_policy: RetryPolicy,
    attempt_timeout: Duration,
    in_flight: Arc<Semaphore>,
    max_in_flight: u32,
    check_result: ResultCheck,
    closed: Arc<AtomicBool>,
}

impl RetryingPostAction {
    pub fn new(
        delegate: Arc<dyn PostAction>,
        retry_policy: RetryPolicy,
        attempt_timeout: Duration,
        max_in_flight: u32,
    ) -> Self {
        Self {
            delegate,
            retry_policy,
            attempt_timeout,
            in_flight: Arc::new(Semaphore::new(max_in_flight as usize)),
            max_in_flight,
            check_result: Arc::new(|result| result),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the default result check.
    pub fn with_result_check(mut self, check: ResultCheck) -> Self {
        self.check_result = check;
        self
    }
}

#[async_trait]
impl PostAction for RetryingPostAction {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    async fn run(
        &self,
        ctx: &ProcessingContext,
        message: &ArchivedMessage,
    ) -> Result<(), PostActionError> {
        if self.closed.load(Ordering::Acquire) {
            warn!(action = self.delegate.name(), "post action invoked after close");
            return Ok(());
        }

        // One permit spans the whole invocation, backoff sleeps included.
        let Ok(permit) = self.in_flight.clone().acquire_owned().await else {
            warn!(action = self.delegate.name(), "post action invoked after close");
            return Ok(());
        };

        let action_name = self.delegate.name().to_string();
        let attempt_name = action_name.clone();
        let delegate = self.delegate.clone();
        let check = self.check_result.clone();
        let closed = self.closed.clone();
        let attempt_timeout = self.attempt_timeout;
        let ctx = ctx.clone();
        let message = message.clone();

        let result = retry_with_policy(
            &action_name,
            &self.retry_policy,
            |error: &PostActionError| !matches!(error, PostActionError::Closed { .. }),
            move || {
                let action_name = attempt_name.clone();
                let delegate = delegate.clone();
                let check = check.clone();
                let closed = closed.clone();
                let ctx = ctx.clone();
                let message = message.clone();
                async move {
                    // Re-checked before every attempt so a pending backoff
                    // stops at close instead of re-invoking the delegate.
                    if closed.load(Ordering::Acquire) {
                        return Err(PostActionError::Closed {
                            action: action_name.clone(),
                        });
                    }
                    let mut handle = tokio::spawn(async move {
                        delegate.run(&ctx, &message).await
                    });
                    let attempt = match tokio::time::timeout(attempt_timeout, &mut handle).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(join_error)) => Err(PostActionError::failed(
                            &action_name,
                            format!("post action task aborted: {join_error}"),
                        )),
                        Err(_) => {
                            handle.abort();
                            Err(PostActionError::Timeout {
                                action: action_name.clone(),
                                timeout_ms: attempt_timeout.as_millis() as u64,
                            })
                        }
                    };
                    check(attempt)
                }
            },
        )
        .await;
        drop(permit);

        // Neither outcome propagates to other messages or the file outcome.
        match result {
            Ok(()) => {}
            Err(PostActionError::Closed { .. }) => {
                warn!(
                    action = self.delegate.name(),
                    "pending retries stopped by close"
                );
            }
            Err(e) => {
                error!(
                    action = self.delegate.name(),
                    error = %e,
                    "post action retries exhausted"
                );
            }
        }
        Ok(())
    }

    async fn close(&self, grace: Duration) {
        self.closed.store(true, Ordering::Release);
        match tokio::time::timeout(
            grace,
            self.in_flight.clone().acquire_many_owned(self.max_in_flight),
        )
        .await
        {
            Ok(Ok(_permits)) => {
                debug!(action = self.delegate.name(), "post action drained");
            }
            Ok(Err(_)) => {}
            Err(_) => {
                warn!(
                    action = self.delegate.name(),
                    grace_ms = grace.as_millis() as u64,
                    "post action did not drain within the shutdown grace period"
                );
            }
        }
    }
}
