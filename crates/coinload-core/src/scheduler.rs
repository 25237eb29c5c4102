// crates/coinload-core/src/scheduler.rs
// ============================================================================
// Module: Rate Scheduler
// Description: Constant-arrival-rate admission loop over a bounded worker pool.
// Purpose: Start iterations on schedule regardless of how long each one takes.
// Dependencies: thiserror, tokio
// ============================================================================

//! ## Overview
//! Admission `i` is due at `start + i / rate`. When it comes due the
//! scheduler takes a worker permit, growing the pool one worker at a time
//! from `pre_allocated_workers` up to `max_workers`. With every worker busy
//! the admission waits for at most one admission interval and is then
//! dropped and counted. Once the duration elapses no more admissions are
//! made; iterations already running are drained to completion.
//!
//! ## Invariants
//! - Concurrently running iterations never exceed `max_workers`.
//! - There is no admission queue; late admissions are dropped, not buffered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::events::EventSink;
use crate::events::HarnessEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default arrival rate in iterations per second.
pub const DEFAULT_RATE_PER_SECOND: f64 = 1000.0;
/// Default admission window.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(300);
/// Default workers available at start.
pub const DEFAULT_PRE_ALLOCATED_WORKERS: usize = 200;
/// Default hard worker limit.
pub const DEFAULT_MAX_WORKERS: usize = 1000;

// ============================================================================
// SECTION: Load Profile
// ============================================================================

/// Arrival-rate and worker-pool parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    /// Target arrival rate in iterations per second.
    pub rate_per_second: f64,
    /// Admission window.
    pub duration: Duration,
    /// Workers available at start.
    pub pre_allocated_workers: usize,
    /// Hard worker limit.
    pub max_workers: usize,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            duration: DEFAULT_DURATION,
            pre_allocated_workers: DEFAULT_PRE_ALLOCATED_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl LoadProfile {
    /// Checks the profile can be scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] for a non-positive or non-finite rate, a
    /// zero duration, a zero worker limit, or more pre-allocated workers than
    /// the limit allows.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !self.rate_per_second.is_finite() || self.rate_per_second <= 0.0 {
            return Err(SchedulerError::InvalidRate(self.rate_per_second));
        }
        if self.duration.is_zero() {
            return Err(SchedulerError::ZeroDuration);
        }
        if self.max_workers == 0 {
            return Err(SchedulerError::ZeroMaxWorkers);
        }
        if self.pre_allocated_workers > self.max_workers {
            return Err(SchedulerError::PreAllocatedExceedsMax {
                pre_allocated: self.pre_allocated_workers,
                max: self.max_workers,
            });
        }
        Ok(())
    }

    /// Returns the gap between consecutive admissions.
    #[must_use]
    pub fn admission_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_per_second.recip()).unwrap_or(Duration::ZERO)
    }

    /// Returns the offset of admission `index` from the run start.
    fn admission_offset(&self, index: u64) -> Option<Duration> {
        #[allow(clippy::cast_precision_loss, reason = "Admission indices stay far below 2^53.")]
        let index = index as f64;
        Duration::try_from_secs_f64(index / self.rate_per_second).ok()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Load profile errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchedulerError {
    /// Rate is zero, negative or not finite.
    #[error("rate_per_second must be a positive finite number, got {0}")]
    InvalidRate(f64),
    /// Duration is zero.
    #[error("duration must be greater than zero")]
    ZeroDuration,
    /// Worker limit is zero.
    #[error("max_workers must be at least 1")]
    ZeroMaxWorkers,
    /// More pre-allocated workers than the limit.
    #[error("pre_allocated_workers ({pre_allocated}) exceeds max_workers ({max})")]
    PreAllocatedExceedsMax {
        /// Requested pre-allocated workers.
        pre_allocated: usize,
        /// Hard worker limit.
        max: usize,
    },
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Iterations started.
    pub admitted: u64,
    /// Iterations that ran to completion.
    pub completed: u64,
    /// Admissions dropped because every worker stayed busy.
    pub dropped: u64,
    /// Iterations that panicked.
    pub panicked: u64,
    /// Workers allocated at the end of the run (the pool never shrinks).
    pub peak_workers: usize,
    /// Time from first admission until the last iteration finished.
    pub elapsed: Duration,
}

impl SchedulerStats {
    /// Folds a finished task into the counters.
    fn finish(&mut self, result: Result<(), JoinError>) {
        match result {
            Ok(()) => self.completed = self.completed.saturating_add(1),
            Err(_) => self.panicked = self.panicked.saturating_add(1),
        }
    }
}

// ============================================================================
// SECTION: Worker Pool
// ============================================================================

/// Semaphore-backed pool that grows on demand up to a hard limit.
struct WorkerPool {
    /// Free worker permits.
    permits: Arc<Semaphore>,
    /// Workers allocated so far.
    allocated: usize,
    /// Hard worker limit.
    max: usize,
}

impl WorkerPool {
    /// Creates a pool with `pre_allocated` free workers.
    fn new(pre_allocated: usize, max: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(pre_allocated)),
            allocated: pre_allocated,
            max,
        }
    }

    /// Takes a worker, growing the pool or waiting up to `wait` if needed.
    async fn acquire(&mut self, wait: Duration, events: &dyn EventSink) -> Option<OwnedSemaphorePermit> {
        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            return Some(permit);
        }
        if self.allocated < self.max {
            self.allocated += 1;
            self.permits.add_permits(1);
            events.emit(HarnessEvent::WorkerPoolGrown {
                workers: self.allocated,
                max_workers: self.max,
            });
            return Arc::clone(&self.permits).try_acquire_owned().ok();
        }
        tokio::time::timeout(wait, Arc::clone(&self.permits).acquire_owned()).await.ok()?.ok()
    }
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Leaky-bucket admission loop.
pub struct RateScheduler {
    /// Rate and pool parameters.
    profile: LoadProfile,
    /// Event destination.
    events: Arc<dyn EventSink>,
}

impl RateScheduler {
    /// Creates a scheduler for `profile`.
    #[must_use]
    pub fn new(profile: LoadProfile, events: Arc<dyn EventSink>) -> Self {
        Self {
            profile,
            events,
        }
    }

    /// Returns the load profile.
    #[must_use]
    pub const fn profile(&self) -> &LoadProfile {
        &self.profile
    }

    /// Admits `iteration()` on schedule until the duration elapses, then
    /// waits for every admitted iteration to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] when the profile is invalid; no iteration
    /// is started in that case.
    pub async fn run<F, Fut>(&self, iteration: F) -> Result<SchedulerStats, SchedulerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.profile.validate()?;
        let interval = self.profile.admission_interval();
        let mut pool = WorkerPool::new(self.profile.pre_allocated_workers, self.profile.max_workers);
        let mut tasks = JoinSet::new();
        let mut stats = SchedulerStats::default();
        let start = Instant::now();
        let deadline = start + self.profile.duration;

        let mut index: u64 = 0;
        while let Some(offset) = self.profile.admission_offset(index) {
            let due = start + offset;
            if due >= deadline {
                break;
            }
            tokio::time::sleep_until(due).await;
            if Instant::now() >= deadline {
                break;
            }
            while let Some(result) = tasks.try_join_next() {
                stats.finish(result);
            }
            if let Some(permit) = pool.acquire(interval, self.events.as_ref()).await {
                let run = iteration();
                tasks.spawn(async move {
                    run.await;
                    drop(permit);
                });
                stats.admitted = stats.admitted.saturating_add(1);
            } else {
                stats.dropped = stats.dropped.saturating_add(1);
                self.events.emit(HarnessEvent::IterationDropped {
                    dropped_total: stats.dropped,
                    max_workers: self.profile.max_workers,
                });
            }
            index = index.saturating_add(1);
        }

        while let Some(result) = tasks.join_next().await {
            stats.finish(result);
        }
        stats.peak_workers = pool.allocated;
        stats.elapsed = start.elapsed();
        Ok(stats)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::missing_docs_in_private_items,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::sync::atomic::AtomicU64;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::events::MemoryEventSink;
    use crate::events::NoopEventSink;

    fn profile(rate: f64, secs: u64, pre: usize, max: usize) -> LoadProfile {
        LoadProfile {
            rate_per_second: rate,
            duration: Duration::from_secs(secs),
            pre_allocated_workers: pre,
            max_workers: max,
        }
    }

    fn sleeping(millis: u64) -> impl Fn() -> tokio::time::Sleep {
        move || tokio::time::sleep(Duration::from_millis(millis))
    }

    #[test]
    fn validate_rejects_bad_profiles() {
        assert_eq!(profile(0.0, 1, 1, 1).validate(), Err(SchedulerError::InvalidRate(0.0)));
        assert!(matches!(profile(f64::NAN, 1, 1, 1).validate(), Err(SchedulerError::InvalidRate(_))));
        assert_eq!(profile(1.0, 0, 1, 1).validate(), Err(SchedulerError::ZeroDuration));
        assert_eq!(profile(1.0, 1, 0, 0).validate(), Err(SchedulerError::ZeroMaxWorkers));
        assert_eq!(
            profile(1.0, 1, 5, 2).validate(),
            Err(SchedulerError::PreAllocatedExceedsMax {
                pre_allocated: 5,
                max: 2
            })
        );
        assert_eq!(LoadProfile::default().validate(), Ok(()));
    }

    #[test]
    fn admission_interval_is_inverse_rate() {
        assert_eq!(profile(4.0, 1, 1, 1).admission_interval(), Duration::from_millis(250));
        assert_eq!(LoadProfile::default().admission_interval(), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_profile_starts_nothing() {
        let started = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&started);
        let scheduler = RateScheduler::new(profile(-1.0, 1, 1, 1), Arc::new(NoopEventSink));
        let result = scheduler
            .run(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .await;
        assert!(result.is_err());
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn admits_rate_times_duration_with_ample_workers() {
        let scheduler = RateScheduler::new(profile(50.0, 60, 10, 10_000), Arc::new(NoopEventSink));
        let stats = scheduler.run(sleeping(1_000)).await.unwrap();
        assert_eq!(stats.admitted, 3_000);
        assert_eq!(stats.completed, 3_000);
        assert_eq!(stats.dropped, 0);
        assert!(stats.peak_workers <= 51, "peak {}", stats.peak_workers);
    }

    #[tokio::test(start_paused = true)]
    async fn drains_in_flight_iterations_after_deadline() {
        let finished = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&finished);
        let scheduler = RateScheduler::new(profile(5.0, 2, 10, 10), Arc::new(NoopEventSink));
        let stats = scheduler
            .run(move || {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await
            .unwrap();
        assert_eq!(stats.admitted, 10);
        assert_eq!(finished.load(Ordering::SeqCst), 10);
        assert_eq!(stats.completed, 10);
        assert!(stats.elapsed >= Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn drops_admissions_when_every_worker_is_busy() {
        let events = Arc::new(MemoryEventSink::new());
        let scheduler = RateScheduler::new(profile(10.0, 1, 1, 1), events.clone());
        let stats = scheduler.run(sleeping(5_000)).await.unwrap();
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.dropped, 9);
        assert_eq!(stats.peak_workers, 1);
        let drops = events
            .events()
            .into_iter()
            .filter(|event| matches!(event, HarnessEvent::IterationDropped { .. }))
            .count();
        assert_eq!(drops, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn grows_pool_one_worker_at_a_time() {
        let events = Arc::new(MemoryEventSink::new());
        let scheduler = RateScheduler::new(profile(10.0, 1, 0, 3), events.clone());
        let stats = scheduler.run(sleeping(250)).await.unwrap();
        assert_eq!(stats.admitted, 10);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.peak_workers, 3);
        let grown: Vec<usize> = events
            .events()
            .into_iter()
            .filter_map(|event| match event {
                HarnessEvent::WorkerPoolGrown {
                    workers,
                    ..
                } => Some(workers),
                _ => None,
            })
            .collect();
        assert_eq!(grown, [1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_iteration_is_counted_not_propagated() {
        let scheduler = RateScheduler::new(profile(2.0, 1, 2, 2), Arc::new(NoopEventSink));
        let stats = scheduler.run(|| async { panic!("iteration failure") }).await.unwrap();
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.panicked, 2);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn lagging_loop_stops_admitting_at_the_deadline() {
        let profile = LoadProfile {
            rate_per_second: 100.0,
            duration: Duration::from_millis(200),
            pre_allocated_workers: 20,
            max_workers: 20,
        };
        let scheduler = RateScheduler::new(profile, Arc::new(NoopEventSink));
        // Building each iteration blocks the admission loop for 50ms, so it
        // falls five intervals behind per admission.
        let stats = scheduler
            .run(|| {
                std::thread::sleep(Duration::from_millis(50));
                async {}
            })
            .await
            .unwrap();
        assert!(stats.admitted >= 1);
        assert!(stats.admitted <= 6, "admitted {} after the deadline passed", stats.admitted);
        assert_eq!(stats.dropped, 0);
    }
}
