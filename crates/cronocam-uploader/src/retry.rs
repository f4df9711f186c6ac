use std::sync::Arc;
use std::time::Duration;

use cronocam_core::UploaderConfig;
use cronocam_infra::RateLimiter;
use tokio_util::sync::CancellationToken;

use crate::error::UploadError;
use crate::finalize::{FinalizeAttemptError, MediaItemCreator};
use crate::resumable::cancellable;

/// Finalize retry budget and linear backoff
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_unit: config.backoff_unit,
        }
    }

    /// Wait before retry number `attempt` (1-based): `attempt * 2` units
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt.saturating_mul(2))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Runs the finalize call under the shared rate limiter with retries
#[derive(Clone)]
pub struct FinalizeOrchestrator {
    creator: Arc<dyn MediaItemCreator>,
    limiter: RateLimiter,
    policy: RetryPolicy,
}

impl FinalizeOrchestrator {
    pub fn new(
        creator: Arc<dyn MediaItemCreator>,
        limiter: RateLimiter,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            creator,
            limiter,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Exchange `upload_token` for a media item id.
    ///
    /// Every attempt takes one permit first. A fatal response ends the loop at
    /// once; retryable ones are retried until the budget is spent, and the
    /// last error is reported.
    #[tracing::instrument(skip(self, upload_token, cancel))]
    pub async fn finalize(
        &self,
        upload_token: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        let mut last_error = String::new();

        for attempt in 0..self.policy.max_attempts() {
            if attempt > 0 {
                let delay = self.policy.backoff_for(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                cancellable(cancel, tokio::time::sleep(delay)).await?;
            }

            self.limiter.acquire(cancel).await?;

            match cancellable(cancel, self.creator.create(upload_token, description)).await? {
                Ok(media_item_id) => {
                    tracing::debug!(attempt, %media_item_id, "Media item created");
                    return Ok(media_item_id);
                }
                Err(FinalizeAttemptError::Fatal(message)) => {
                    tracing::error!(attempt, error = %message, "Media item creation rejected");
                    return Err(UploadError::FinalizeFatal(message));
                }
                Err(FinalizeAttemptError::Retryable(message)) => {
                    tracing::warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %message,
                        "Media item creation failed, will retry if budget allows"
                    );
                    last_error = message;
                }
            }
        }

        Err(UploadError::FinalizeRetryable {
            attempts: self.policy.max_attempts(),
            last_error,
        })
    }
}
