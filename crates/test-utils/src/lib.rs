//! Shared helpers for `chaindag` integration tests.
//!
//! - [`actions`]: scripted task actions (recording, failing, flaky, blocking).
//! - [`collaborators`]: in-memory catalog / ingestion / check / transform.
//! - [`fake_executor`]: an `ExecutorBackend` that completes tasks instantly.
//! - [`builders`]: config builders.

pub mod actions;
pub mod builders;
pub mod collaborators;
pub mod fake_executor;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Upper bound for any single awaited test step.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test tracing subscriber once per process.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `--nocapture`). `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test step timed out after {TEST_TIMEOUT:?}"))
}
