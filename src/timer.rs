use crate::error::{AutoShutdownError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Background scheduler for the shutdown clock and the watchdog.
///
/// Callbacks run on tokio worker threads, never on the host's main loop, and
/// must return quickly. Once scheduled a timer keeps firing until the service
/// is dropped.
pub struct TimerService {
    handle: Handle,
    cancellation_token: CancellationToken,
}

impl TimerService {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Use the runtime the caller is running in
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            AutoShutdownError::system(format!("No tokio runtime for timers: {}", e))
        })?;
        Ok(Self::new(handle))
    }

    /// Run `callback` at `first`, then every `period`. A `first` in the past
    /// fires immediately.
    pub fn schedule_at<F>(
        &self,
        name: &'static str,
        first: DateTime<Utc>,
        period: Duration,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        let delay = (first - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        self.schedule_after(name, delay, period, callback)
    }

    /// Run `callback` after `initial_delay`, then every `period`
    pub fn schedule_after<F>(
        &self,
        name: &'static str,
        initial_delay: Duration,
        period: Duration,
        mut callback: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        let token = self.cancellation_token.clone();
        let period = period.max(Duration::from_millis(1));

        self.handle.spawn(async move {
            let mut interval = interval_at(Instant::now() + initial_delay, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!("{} timer running", name);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("{} timer stopped", name);
                        break;
                    }
                    _ = interval.tick() => callback(),
                }
            }
        })
    }

    /// Stop every timer started by this service
    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay_then_every_period() {
        let timers = TimerService::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        timers.schedule_after(
            "test",
            Duration::from_secs(10),
            Duration::from_secs(10),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_instant_fires_immediately() {
        let timers = TimerService::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        timers.schedule_at(
            "test",
            Utc::now() - chrono::Duration::seconds(30),
            Duration::from_secs(60),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_timers() {
        let timers = TimerService::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        let handle = timers.schedule_after(
            "test",
            Duration::from_secs(1),
            Duration::from_secs(1),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        timers.shutdown();
        handle.await.unwrap();

        let seen = fired.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), seen);
    }
}
