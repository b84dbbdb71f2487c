use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

const PROBE_PATH: &str = "health";
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Probe the shared store with a one-shot read and report the result.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let rooms = state.hosted_count();
    match timeout(PROBE_TIMEOUT, state.store().get(PROBE_PATH)).await {
        Ok(Ok(_)) => HealthResponse::ok(rooms),
        Ok(Err(err)) => {
            warn!(error = %err, "store health check failed");
            HealthResponse::degraded(rooms)
        }
        Err(_) => {
            warn!("store health check timed out");
            HealthResponse::degraded(rooms)
        }
    }
}
