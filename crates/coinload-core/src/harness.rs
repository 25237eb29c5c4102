// crates/coinload-core/src/harness.rs
// ============================================================================
// Module: Harness
// Description: Wires the credential pool, session cache, scenario runner,
//              rate scheduler and check aggregator into one run.
// Purpose: Execute a configured load test and produce a run report.
// Dependencies: thiserror, url
// ============================================================================

//! ## Overview
//! [`Harness::run`] validates the load profile, generates the user pool,
//! resolves endpoints, and then lets the [`RateScheduler`] admit scenario
//! iterations. Each finished iteration folds its checks into the shared
//! [`CheckAggregator`]. Startup errors are returned before any request is
//! sent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::checks::CheckAggregator;
use crate::credentials::CredentialError;
use crate::credentials::CredentialPool;
use crate::credentials::DEFAULT_PASSWORD;
use crate::credentials::DEFAULT_USERNAME_PREFIX;
use crate::events::EventSink;
use crate::events::HarnessEvent;
use crate::executor::RequestExecutor;
use crate::report::RunReport;
use crate::scenario::ApiEndpoints;
use crate::scenario::EndpointError;
use crate::scenario::ScenarioRunner;
use crate::scenario::ScenarioSettings;
use crate::scheduler::LoadProfile;
use crate::scheduler::RateScheduler;
use crate::scheduler::SchedulerError;
use crate::session::SessionCache;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of synthetic users.
pub const DEFAULT_USER_POOL_SIZE: usize = 1000;
/// Default failure ratio above which a run fails.
pub const DEFAULT_MAX_CHECK_FAILURE_RATIO: f64 = 0.05;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Synthetic user pool parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPoolSettings {
    /// Number of users to generate.
    pub size: usize,
    /// Username prefix; the user index is appended.
    pub username_prefix: String,
    /// Password shared by every user.
    pub password: String,
}

impl Default for UserPoolSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_USER_POOL_SIZE,
            username_prefix: DEFAULT_USERNAME_PREFIX.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// Fully resolved run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessSettings {
    /// API base URL, including the `/api` prefix.
    pub base_url: Url,
    /// User pool parameters.
    pub users: UserPoolSettings,
    /// Arrival rate and worker pool parameters.
    pub load: LoadProfile,
    /// Per-iteration parameters.
    pub scenario: ScenarioSettings,
    /// Maximum session age; `None` keeps sessions until a 401.
    pub session_ttl: Option<Duration>,
    /// Failure ratio above which the run fails.
    pub max_check_failure_ratio: f64,
}

impl HarnessSettings {
    /// Creates settings for `base_url` with every other value defaulted.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            users: UserPoolSettings::default(),
            load: LoadProfile::default(),
            scenario: ScenarioSettings::default(),
            session_ttl: None,
            max_check_failure_ratio: DEFAULT_MAX_CHECK_FAILURE_RATIO,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Startup failures; no traffic is sent when one occurs.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The user pool could not be generated.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    /// Endpoints could not be resolved from the base URL.
    #[error(transparent)]
    Endpoints(#[from] EndpointError),
    /// The load profile is invalid.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// A configured load test.
pub struct Harness {
    /// Run settings.
    settings: HarnessSettings,
    /// Executor shared by logins and endpoint calls.
    executor: Arc<dyn RequestExecutor>,
    /// Event destination.
    events: Arc<dyn EventSink>,
    /// Check log for this run.
    aggregator: Arc<CheckAggregator>,
}

impl Harness {
    /// Creates a harness.
    #[must_use]
    pub fn new(
        settings: HarnessSettings,
        executor: Arc<dyn RequestExecutor>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            settings,
            executor,
            events,
            aggregator: Arc::new(CheckAggregator::new()),
        }
    }

    /// Returns the run settings.
    #[must_use]
    pub const fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Returns the check log shared with running iterations.
    #[must_use]
    pub const fn aggregator(&self) -> &Arc<CheckAggregator> {
        &self.aggregator
    }

    /// Runs the load test to completion, draining in-flight iterations.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when startup fails.
    pub async fn run(&self) -> Result<RunReport, HarnessError> {
        let settings = &self.settings;
        settings.load.validate()?;
        let pool = Arc::new(CredentialPool::generate(
            settings.users.size,
            &settings.users.username_prefix,
            &settings.users.password,
        )?);
        let endpoints = ApiEndpoints::new(&settings.base_url, &settings.scenario.item)?;
        let sessions = Arc::new(SessionCache::new(
            Arc::clone(&self.executor),
            endpoints.auth.clone(),
            settings.scenario.request_timeout,
            settings.session_ttl,
        ));
        let runner = Arc::new(ScenarioRunner::new(
            pool,
            sessions,
            Arc::clone(&self.executor),
            endpoints,
            settings.scenario.clone(),
            Arc::clone(&self.events),
        ));

        self.events.emit(HarnessEvent::RunStarted {
            base_url: settings.base_url.to_string(),
            rate_per_second: settings.load.rate_per_second,
            duration_ms: u64::try_from(settings.load.duration.as_millis()).unwrap_or(u64::MAX),
            pre_allocated_workers: settings.load.pre_allocated_workers,
            max_workers: settings.load.max_workers,
            user_pool_size: settings.users.size,
        });

        let scheduler = RateScheduler::new(settings.load.clone(), Arc::clone(&self.events));
        let aggregator = Arc::clone(&self.aggregator);
        let stats = scheduler
            .run(move || {
                let runner = Arc::clone(&runner);
                let aggregator = Arc::clone(&aggregator);
                async move {
                    let outcome = runner.run_iteration().await;
                    aggregator.record_all(outcome.checks);
                }
            })
            .await?;

        self.events.emit(HarnessEvent::RunFinished {
            admitted: stats.admitted,
            completed: stats.completed,
            dropped: stats.dropped,
            elapsed_ms: u64::try_from(stats.elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        Ok(RunReport::new(&stats, &self.aggregator.summary(), settings.max_check_failure_ratio))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
