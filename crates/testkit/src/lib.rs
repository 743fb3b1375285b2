#![warn(missing_docs)]
//! Test surfaces for the scanner: recording subscribers, world fixtures and
//! async polling helpers.

mod fixtures;
mod recording;

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Result};

pub use fixtures::*;
pub use recording::*;

/// Default deadline used by integration tests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Install a test-friendly tracing subscriber (honours `RUST_LOG`). Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Poll `condition` every few milliseconds until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Run `future` with a deadline, failing instead of hanging.
pub async fn within<F: Future>(timeout: Duration, future: F) -> Result<F::Output> {
    match tokio::time::timeout(timeout, future).await {
        Ok(output) => Ok(output),
        Err(_) => bail!("operation did not finish within {:?}", timeout),
    }
}
