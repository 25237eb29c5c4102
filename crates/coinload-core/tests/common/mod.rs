// crates/coinload-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: In-process mock of the merch-store coin API.
// Purpose: Drive the harness over real HTTP without an external server.
// Dependencies: coinload-core, serde_json, tiny_http, url
// ============================================================================

//! ## Overview
//! [`MockApi`] serves `/api/auth`, `/api/buy/{item}`, `/api/sendCoin` and
//! `/api/info` from a background thread. Tokens are issued per login and
//! checked on every authenticated call. Behavior knobs let tests force
//! server errors, one-off 401s, slow responses or oversized bodies.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use coinload_core::ApiEndpoints;
use coinload_core::CredentialPool;
use coinload_core::EventSink;
use coinload_core::ExecutorConfig;
use coinload_core::MemoryEventSink;
use coinload_core::RequestExecutor;
use coinload_core::ReqwestExecutor;
use coinload_core::ScenarioRunner;
use coinload_core::ScenarioSettings;
use coinload_core::SessionCache;
use serde_json::Value;
use serde_json::json;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Mock API
// ============================================================================

/// Password the mock accepts for every user.
pub const MOCK_PASSWORD: &str = "1Test!Password49";

/// Knobs for the mock API.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Status forced on `/buy`, if any.
    pub buy_status: Option<u16>,
    /// Delay before answering `/buy`.
    pub buy_delay: Option<Duration>,
    /// Answer the first `/info` with 401 and revoke its token.
    pub reject_first_info: bool,
    /// Size of the `/info` body padding in bytes.
    pub info_padding: usize,
}

/// A transfer observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Sender resolved from the bearer token.
    pub from: String,
    /// Requested recipient.
    pub to: String,
    /// Requested amount.
    pub amount: u64,
}

#[derive(Default)]
struct MockState {
    logins: AtomicU64,
    requests: AtomicU64,
    tokens: Mutex<HashMap<String, String>>,
    transfers: Mutex<Vec<Transfer>>,
    info_rejected: AtomicBool,
}

/// Running mock API; stops when dropped.
pub struct MockApi {
    /// Base URL including the `/api` prefix.
    pub base_url: Url,
    server: Arc<Server>,
    state: Arc<MockState>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockApi {
    /// Starts a mock with the given behavior.
    pub fn start(behavior: MockBehavior) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let base_url = Url::parse(&format!("http://{addr}/api")).unwrap();
        let state = Arc::new(MockState::default());
        let behavior = Arc::new(behavior);
        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    let state = Arc::clone(&state);
                    let behavior = Arc::clone(&behavior);
                    thread::spawn(move || serve(request, &state, &behavior));
                }
            })
        };
        Self {
            base_url,
            server,
            state,
            handle: Some(handle),
        }
    }

    /// Starts a mock that answers every call normally.
    pub fn healthy() -> Self {
        Self::start(MockBehavior::default())
    }

    /// Number of successful logins served.
    pub fn logins(&self) -> u64 {
        self.state.logins.load(Ordering::SeqCst)
    }

    /// Number of requests received.
    pub fn requests(&self) -> u64 {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Transfers observed so far.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.transfers.lock().unwrap().clone()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(mut request: tiny_http::Request, state: &MockState, behavior: &MockBehavior) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let mut body = String::new();
    let _ = request.as_reader().read_to_string(&mut body);
    let path = request.url().to_string();
    let bearer = request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Authorization"))
        .and_then(|header| header.value.as_str().strip_prefix("Bearer "))
        .map(str::to_string);

    if path == "/api/auth" {
        let (status, payload) = login(&body, state);
        let _ = request.respond(Response::from_string(payload.to_string()).with_status_code(status));
        return;
    }

    let owner = bearer.and_then(|token| {
        state.tokens.lock().unwrap().get(&token).cloned().map(|user| (token, user))
    });
    let Some((token, user)) = owner else {
        let _ = request.respond(unauthorized());
        return;
    };

    let response = if path.starts_with("/api/buy/") {
        if let Some(delay) = behavior.buy_delay {
            thread::sleep(delay);
        }
        Response::from_string("{}").with_status_code(behavior.buy_status.unwrap_or(200))
    } else if path == "/api/sendCoin" {
        let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let to = parsed["toUser"].as_str().unwrap_or_default().to_string();
        let amount = parsed["amount"].as_u64().unwrap_or_default();
        let status = if to == user { 400 } else { 200 };
        state.transfers.lock().unwrap().push(Transfer {
            from: user,
            to,
            amount,
        });
        Response::from_string("{}").with_status_code(status)
    } else if path == "/api/info" {
        if behavior.reject_first_info && !state.info_rejected.swap(true, Ordering::SeqCst) {
            state.tokens.lock().unwrap().remove(&token);
            let _ = request.respond(unauthorized());
            return;
        }
        let padding = "x".repeat(behavior.info_padding);
        Response::from_string(json!({"coins": 1000, "inventory": [], "padding": padding}).to_string())
    } else {
        Response::from_string("{}").with_status_code(404)
    };
    let _ = request.respond(response);
}

fn login(body: &str, state: &MockState) -> (u16, Value) {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let username = parsed["username"].as_str().unwrap_or_default();
    let password = parsed["password"].as_str().unwrap_or_default();
    if username.len() < 4 || username.len() > 64 {
        return (400, json!({"errors": "invalid username"}));
    }
    if password != MOCK_PASSWORD {
        return (401, json!({"errors": "invalid credentials"}));
    }
    let serial = state.logins.fetch_add(1, Ordering::SeqCst);
    let token = format!("token-{username}-{serial}");
    state.tokens.lock().unwrap().insert(token.clone(), username.to_string());
    (200, json!({"token": token}))
}

fn unauthorized() -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(json!({"errors": "unauthorized"}).to_string()).with_status_code(401)
}

// ============================================================================
// SECTION: Runner Helpers
// ============================================================================

/// Scenario settings without pacing and with a short deadline.
pub fn fast_scenario() -> ScenarioSettings {
    ScenarioSettings {
        inter_step_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(2),
        ..ScenarioSettings::default()
    }
}

/// Builds a real-HTTP scenario runner against `base_url`.
pub fn http_runner(
    base_url: &Url,
    pool_size: usize,
    scenario: ScenarioSettings,
    executor_config: &ExecutorConfig,
) -> (ScenarioRunner, Arc<MemoryEventSink>) {
    let executor: Arc<dyn RequestExecutor> = Arc::new(ReqwestExecutor::new(executor_config).unwrap());
    let events = Arc::new(MemoryEventSink::new());
    let sink: Arc<dyn EventSink> = events.clone();
    let endpoints = ApiEndpoints::new(base_url, &scenario.item).unwrap();
    let sessions = Arc::new(SessionCache::new(
        Arc::clone(&executor),
        endpoints.auth.clone(),
        scenario.request_timeout,
        None,
    ));
    let pool = Arc::new(CredentialPool::generate(pool_size, "stress_test_user_", MOCK_PASSWORD).unwrap());
    let runner = ScenarioRunner::new(pool, sessions, executor, endpoints, scenario, sink);
    (runner, events)
}
