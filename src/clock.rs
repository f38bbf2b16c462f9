//! Wall-clock driver: one simulated month per period.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::engine::Engine;

/// Default length of one simulated month.
pub const DEFAULT_MONTH_DURATION: Duration = Duration::from_millis(7_000);

/// Periodic month ticker running on the tokio runtime. Ticks that land while
/// the engine is blocked are skipped and never replayed. Dropping the clock
/// aborts the task; [`Clock::shutdown`] stops it cleanly.
pub struct Clock {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Clock {
    pub fn spawn(engine: Arc<Engine>, period: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_ms = period.as_millis() as u64, "clock started");

            loop {
                tokio::select! {
                    _ = interval.tick() => match engine.tick() {
                        Ok(Some(report)) => debug!(month = report.month, "clock advanced"),
                        Ok(None) => {}
                        Err(err) => {
                            error!(error = %err, "month tick failed, stopping clock");
                            break;
                        }
                    },
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("clock stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signals the task to stop and waits for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!(error = %err, "clock task panicked");
                }
            }
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineBuilder, EngineSettings};

    fn engine() -> Arc<Engine> {
        Arc::new(
            EngineBuilder::new(EngineSettings::default())
                .build()
                .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn advances_once_per_period() {
        let engine = engine();
        let clock = Clock::spawn(engine.clone(), Duration::from_secs(7));

        time::sleep(Duration::from_millis(21_010)).await;
        assert_eq!(engine.state().month(), 3);

        clock.shutdown().await;
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(engine.state().month(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_ticks_are_not_replayed() {
        let engine = engine();
        let clock = Clock::spawn(engine.clone(), Duration::from_secs(7));

        engine.pause();
        time::sleep(Duration::from_millis(21_010)).await;
        assert_eq!(engine.state().month(), 0);

        engine.resume();
        time::sleep(Duration::from_secs(7)).await;
        assert_eq!(engine.state().month(), 1);

        drop(clock);
    }
}
