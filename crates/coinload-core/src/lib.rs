// crates/coinload-core/src/lib.rs
// ============================================================================
// Module: Coinload Core Library
// Description: Load-generation engine for the merch-store coin API.
// Purpose: Drive authenticated virtual-user iterations at a fixed arrival rate.
// Dependencies: async-trait, rand, reqwest, serde, thiserror, tokio, url
// ============================================================================

//! ## Overview
//! `coinload-core` implements the harness engine: a synthetic credential
//! pool, a shared session cache, an HTTP request executor, the per-iteration
//! scenario runner, a leaky-bucket rate scheduler feeding a bounded worker
//! pool, and an append-only check aggregator. The [`Harness`] type wires the
//! pieces together and produces a [`RunReport`].
//!
//! Target responses are untrusted: bodies are size-limited and transport
//! failures are classified rather than propagated as panics.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod checks;
pub mod credentials;
pub mod events;
pub mod executor;
pub mod harness;
pub mod report;
pub mod scenario;
pub mod scheduler;
pub mod session;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use checks::CheckAggregator;
pub use checks::CheckResult;
pub use checks::CheckTally;
pub use credentials::CredentialError;
pub use credentials::CredentialPool;
pub use credentials::UserCredential;
pub use events::EventRecord;
pub use events::EventSink;
pub use events::FileEventSink;
pub use events::HarnessEvent;
pub use events::MemoryEventSink;
pub use events::NoopEventSink;
pub use events::StderrEventSink;
pub use executor::ExecutorConfig;
pub use executor::HttpMethod;
pub use executor::HttpRequest;
pub use executor::HttpResponse;
pub use executor::NetworkError;
pub use executor::RequestExecutor;
pub use executor::ReqwestExecutor;
pub use harness::Harness;
pub use harness::HarnessError;
pub use harness::HarnessSettings;
pub use harness::UserPoolSettings;
pub use report::CheckSummaryEntry;
pub use report::RunReport;
pub use scenario::ApiEndpoints;
pub use scenario::EndpointError;
pub use scenario::IterationOutcome;
pub use scenario::ScenarioRunner;
pub use scenario::ScenarioSettings;
pub use scheduler::LoadProfile;
pub use scheduler::RateScheduler;
pub use scheduler::SchedulerError;
pub use scheduler::SchedulerStats;
pub use session::AuthError;
pub use session::Session;
pub use session::SessionCache;
pub use session::SessionToken;
