// crates/coinload-core/src/scenario.rs
// ============================================================================
// Module: Scenario Runner
// Description: One virtual-user iteration against the coin API.
// Purpose: Authenticate, buy, transfer and query info with pacing delays.
// Dependencies: serde, thiserror, tokio, url
// ============================================================================

//! ## Overview
//! An iteration picks a random user and a random (possibly identical)
//! recipient, obtains a token through the [`SessionCache`], then runs the
//! buy, send-coin and info steps strictly in sequence. Every response is
//! scored into a [`CheckResult`]. Transport failures on an endpoint step
//! record a failed check and the iteration moves on; a failed login ends the
//! iteration immediately. A `401` from any endpoint drops the cached session
//! so the next iteration for that user logs in again, unless another
//! iteration has already replaced the rejected token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::checks::BUY_CHECK;
use crate::checks::CheckResult;
use crate::checks::INFO_CHECK;
use crate::checks::LOGIN_CHECK;
use crate::checks::SEND_COIN_CHECK;
use crate::checks::status_is_not_server_error;
use crate::credentials::CredentialPool;
use crate::credentials::UserCredential;
use crate::events::EventSink;
use crate::events::HarnessEvent;
use crate::executor::DEFAULT_REQUEST_TIMEOUT;
use crate::executor::HttpRequest;
use crate::executor::NetworkError;
use crate::executor::RequestExecutor;
use crate::session::SessionCache;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default item bought on every iteration.
pub const DEFAULT_ITEM: &str = "socks";
/// Default number of coins sent on every iteration.
pub const DEFAULT_TRANSFER_AMOUNT: u64 = 1;
/// Default pause between scenario steps.
pub const DEFAULT_INTER_STEP_DELAY: Duration = Duration::from_secs(1);

/// Status the API returns for unknown or expired tokens.
const UNAUTHORIZED_STATUS: u16 = 401;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Per-iteration scenario parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSettings {
    /// Item name for the buy step.
    pub item: String,
    /// Coins sent in the transfer step.
    pub transfer_amount: u64,
    /// Pause after each endpoint step.
    pub inter_step_delay: Duration,
    /// Deadline applied to every request.
    pub request_timeout: Duration,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            item: DEFAULT_ITEM.to_string(),
            transfer_amount: DEFAULT_TRANSFER_AMOUNT,
            inter_step_delay: DEFAULT_INTER_STEP_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

// ============================================================================
// SECTION: Endpoints
// ============================================================================

/// Endpoint URL construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The base URL cannot carry path segments.
    #[error("base url cannot be used as a path base: {0}")]
    CannotBeABase(String),
}

/// Resolved target endpoints.
///
/// # Invariants
/// - Every URL shares the base URL's scheme, host, port and path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    /// `POST {base}/auth`.
    pub auth: Url,
    /// `GET {base}/buy/{item}`.
    pub buy: Url,
    /// `POST {base}/sendCoin`.
    pub send_coin: Url,
    /// `GET {base}/info`.
    pub info: Url,
}

impl ApiEndpoints {
    /// Resolves every endpoint under `base`.
    ///
    /// The item is appended as a single percent-encoded path segment.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::CannotBeABase`] for URLs such as `mailto:`.
    pub fn new(base: &Url, item: &str) -> Result<Self, EndpointError> {
        Ok(Self {
            auth: join(base, &["auth"])?,
            buy: join(base, &["buy", item])?,
            send_coin: join(base, &["sendCoin"])?,
            info: join(base, &["info"])?,
        })
    }
}

/// Appends `segments` to the base path.
fn join(base: &Url, segments: &[&str]) -> Result<Url, EndpointError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| EndpointError::CannotBeABase(base.to_string()))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of one scenario iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationOutcome {
    /// Acting username.
    pub user: String,
    /// Transfer recipient username.
    pub recipient: String,
    /// Checks recorded in step order.
    pub checks: Vec<CheckResult>,
    /// True when the iteration ended at the login step.
    pub aborted: bool,
}

/// Transfer request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendCoinRequest<'a> {
    /// Recipient username.
    to_user: &'a str,
    /// Coins to send.
    amount: u64,
}

/// Endpoint step labels used in events.
#[derive(Debug, Clone, Copy)]
enum Step {
    /// Buy step.
    Buy,
    /// Send-coin step.
    SendCoin,
    /// Info step.
    Info,
}

impl Step {
    /// Event label.
    const fn label(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::SendCoin => "send_coin",
            Self::Info => "info",
        }
    }

    /// Check recorded for this step.
    const fn check(self) -> &'static str {
        match self {
            Self::Buy => BUY_CHECK,
            Self::SendCoin => SEND_COIN_CHECK,
            Self::Info => INFO_CHECK,
        }
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Executes scenario iterations; cheap to share behind an `Arc`.
pub struct ScenarioRunner {
    /// Users to act as and send to.
    pool: Arc<CredentialPool>,
    /// Shared token cache.
    sessions: Arc<SessionCache>,
    /// Executor for endpoint calls.
    executor: Arc<dyn RequestExecutor>,
    /// Resolved endpoint URLs.
    endpoints: ApiEndpoints,
    /// Scenario parameters.
    settings: ScenarioSettings,
    /// Event destination.
    events: Arc<dyn EventSink>,
}

impl ScenarioRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        pool: Arc<CredentialPool>,
        sessions: Arc<SessionCache>,
        executor: Arc<dyn RequestExecutor>,
        endpoints: ApiEndpoints,
        settings: ScenarioSettings,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            pool,
            sessions,
            executor,
            endpoints,
            settings,
            events,
        }
    }

    /// Returns the shared session cache.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    /// Runs one iteration for a random user and recipient.
    pub async fn run_iteration(&self) -> IterationOutcome {
        let (user, recipient) = self.pool.pick_pair();
        self.run_iteration_for(user, recipient).await
    }

    /// Runs one iteration for a fixed user and recipient.
    pub async fn run_iteration_for(
        &self,
        user: &UserCredential,
        recipient: &UserCredential,
    ) -> IterationOutcome {
        let mut outcome = IterationOutcome {
            user: user.username.clone(),
            recipient: recipient.username.clone(),
            checks: Vec::with_capacity(4),
            aborted: false,
        };

        let token = match self.sessions.get_token(user).await {
            Ok(token) => {
                if token.fresh {
                    outcome.checks.push(CheckResult::new(LOGIN_CHECK, true));
                }
                token.value
            }
            Err(err) => {
                outcome.checks.push(CheckResult::new(LOGIN_CHECK, false));
                self.events.emit(HarnessEvent::LoginFailed {
                    username: user.username.clone(),
                    error_kind: err.kind(),
                    status: err.status(),
                });
                outcome.aborted = true;
                return outcome;
            }
        };

        let buy = HttpRequest::get(self.endpoints.buy.clone());
        self.step(&user.username, &token, Step::Buy, Ok(buy), &mut outcome.checks).await;
        self.pace().await;

        let transfer = HttpRequest::post_json(
            self.endpoints.send_coin.clone(),
            &SendCoinRequest {
                to_user: &recipient.username,
                amount: self.settings.transfer_amount,
            },
        );
        self.step(&user.username, &token, Step::SendCoin, transfer, &mut outcome.checks).await;
        self.pace().await;

        let info = HttpRequest::get(self.endpoints.info.clone());
        self.step(&user.username, &token, Step::Info, Ok(info), &mut outcome.checks).await;
        self.pace().await;

        outcome
    }

    /// Issues one authenticated endpoint call and scores it.
    async fn step(
        &self,
        username: &str,
        token: &str,
        step: Step,
        request: Result<HttpRequest, NetworkError>,
        checks: &mut Vec<CheckResult>,
    ) {
        let result = match request {
            Ok(request) => {
                let request = request.with_bearer(token).with_timeout(self.settings.request_timeout);
                self.executor.execute(request).await
            }
            Err(err) => Err(err),
        };
        match result {
            Ok(response) => {
                if response.status == UNAUTHORIZED_STATUS
                    && self.sessions.invalidate_token(username, token)
                {
                    self.events.emit(HarnessEvent::SessionInvalidated {
                        username: username.to_string(),
                        endpoint: step.label(),
                    });
                }
                checks.push(CheckResult::new(step.check(), status_is_not_server_error(response.status)));
            }
            Err(err) => {
                self.events.emit(HarnessEvent::RequestFailed {
                    username: username.to_string(),
                    endpoint: step.label(),
                    error_kind: err.kind(),
                    message: err.to_string(),
                });
                checks.push(CheckResult::new(step.check(), false));
            }
        }
    }

    /// Sleeps for the inter-step delay without blocking other tasks.
    async fn pace(&self) {
        if !self.settings.inter_step_delay.is_zero() {
            tokio::time::sleep(self.settings.inter_step_delay).await;
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
