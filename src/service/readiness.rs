// src/service/readiness.rs

//! TCP readiness polling.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, warn};

use crate::errors::{Result, StagehandError};

/// Time between the starts of two consecutive attempts.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Budget for a single connect attempt.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Floor for the last attempt when the overall budget is nearly spent.
const MIN_ATTEMPT: Duration = Duration::from_millis(50);

/// Try to connect to `host:port` once per second until it succeeds or
/// `deadline` has elapsed.
///
/// Refused or timed-out attempts are expected and never surface as errors.
/// The connection is closed as soon as it is established.
pub async fn poll_until_open(host: &str, port: u16, deadline: Duration) -> bool {
    let started = Instant::now();
    let give_up_at = started + deadline;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let attempt_started = Instant::now();
        let budget = ATTEMPT_TIMEOUT
            .min(give_up_at.saturating_duration_since(attempt_started))
            .max(MIN_ATTEMPT);

        match timeout(budget, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                info!(host, port, attempt, elapsed = ?started.elapsed(), "service accepting connections");
                return true;
            }
            Ok(Err(e)) => debug!(host, port, attempt, error = %e, "not accepting connections yet"),
            Err(_) => debug!(host, port, attempt, "connect attempt timed out"),
        }

        if Instant::now() >= give_up_at {
            warn!(host, port, attempts = attempt, "gave up waiting for service");
            return false;
        }
        sleep_until((attempt_started + POLL_INTERVAL).min(give_up_at)).await;
    }
}

/// [`poll_until_open`] for callers that treat a missed deadline as a
/// `ReadinessTimeout`.
pub async fn wait_until_ready(host: &str, port: u16, timeout_secs: u64) -> Result<()> {
    if poll_until_open(host, port, Duration::from_secs(timeout_secs)).await {
        Ok(())
    } else {
        Err(StagehandError::ReadinessTimeout {
            host: host.to_string(),
            port,
            timeout_secs,
        })
    }
}
