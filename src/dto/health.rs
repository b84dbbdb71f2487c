use serde::Serialize;
use utoipa::ToSchema;

const OK: &str = "ok";
const DEGRADED: &str = "degraded";

/// Liveness report: store reachability and hosted room count.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Rooms hosted by this process.
    pub rooms: usize,
}

impl HealthResponse {
    /// The store answered.
    pub fn ok(rooms: usize) -> Self {
        Self {
            status: OK.to_string(),
            rooms,
        }
    }

    /// The store failed or timed out on the probe read.
    pub fn degraded(rooms: usize) -> Self {
        Self {
            status: DEGRADED.to_string(),
            rooms,
        }
    }

    /// Whether the report is healthy.
    pub fn is_ok(&self) -> bool {
        self.status == OK
    }
}
