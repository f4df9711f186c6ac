use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    #[error("Wait for a request permit was cancelled")]
    Cancelled,

    #[error("Rate limiter has been shut down")]
    Closed,
}

struct Inner {
    permits: Arc<Semaphore>,
    capacity: usize,
    period: Duration,
    refill_stop: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.refill_stop.cancel();
    }
}

/// Token bucket shared by every request to the remote service.
///
/// The bucket starts full with `max_burst` permits and gains one permit every
/// `1 / requests_per_second` seconds, never exceeding `max_burst`. Over any window
/// of length T at most `max_burst + T * requests_per_second` permits are granted.
///
/// Cloning is cheap; all clones share one bucket. The refill task stops when
/// [`RateLimiter::shutdown`] is called or the last clone is dropped.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// Create a limiter and start its refill task on the current Tokio runtime
    pub fn new(requests_per_second: f64, max_burst: usize) -> anyhow::Result<Self> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            anyhow::bail!(
                "requests_per_second must be a positive number, got {}",
                requests_per_second
            );
        }
        if max_burst == 0 {
            anyhow::bail!("max_burst must be at least 1");
        }
        if max_burst > Semaphore::MAX_PERMITS {
            anyhow::bail!(
                "max_burst must be at most {}, got {}",
                Semaphore::MAX_PERMITS,
                max_burst
            );
        }

        let period = Duration::try_from_secs_f64(1.0 / requests_per_second).map_err(|_| {
            anyhow::anyhow!("requests_per_second {} is too low", requests_per_second)
        })?;
        if period.is_zero() {
            anyhow::bail!("requests_per_second {} is too high", requests_per_second);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .context("Rate limiter requires a running Tokio runtime")?;

        let permits = Arc::new(Semaphore::new(max_burst));
        let refill_stop = CancellationToken::new();

        runtime.spawn(refill_loop(
            permits.clone(),
            max_burst,
            period,
            refill_stop.clone(),
        ));

        tracing::debug!(
            requests_per_second,
            max_burst,
            "Rate limiter started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                permits,
                capacity: max_burst,
                period,
                refill_stop,
            }),
        })
    }

    /// Wait for a permit.
    ///
    /// Returns [`AcquireError::Cancelled`] as soon as `cancel` fires, even when a
    /// permit is also available, and [`AcquireError::Closed`] after shutdown.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), AcquireError> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(AcquireError::Cancelled),
            permit = self.inner.permits.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    Ok(())
                }
                Err(_) => Err(AcquireError::Closed),
            },
        }
    }

    /// Take a permit without waiting
    pub fn try_acquire(&self) -> bool {
        match self.inner.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Interval between refills
    pub fn refill_period(&self) -> Duration {
        self.inner.period
    }

    /// Stop refilling and fail every pending and future acquire with `Closed`
    pub fn shutdown(&self) {
        self.inner.refill_stop.cancel();
        self.inner.permits.close();
        tracing::debug!("Rate limiter shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.inner.capacity)
            .field("period", &self.inner.period)
            .field("available", &self.available_permits())
            .finish()
    }
}

async fn refill_loop(
    permits: Arc<Semaphore>,
    capacity: usize,
    period: Duration,
    stop: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    // A stalled runtime must not bank a backlog of refills
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                if permits.is_closed() {
                    break;
                }
                if permits.available_permits() < capacity {
                    permits.add_permits(1);
                }
            }
        }
    }

    tracing::trace!("Rate limiter refill task stopped");
}
