use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::time::Instant;
use utoipa::ToSchema;

/// Health report returned by the health endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthRes {
    /// `ok` or `error`.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
    /// `connected` or `disconnected`.
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthRes {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Health service shared by the API surfaces.
///
/// Records when it was created so reports can carry the process uptime.
#[derive(Clone, Debug)]
pub struct HealthService {
    started: Instant,
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Seconds since the service was created.
    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Builds a report from the outcome of a storage probe.
    pub fn check<E: Display>(&self, probe: Result<(), E>) -> HealthRes {
        let timestamp = Utc::now();
        match probe {
            Ok(()) => HealthRes {
                status: "ok".into(),
                timestamp,
                uptime_seconds: Some(self.uptime_seconds()),
                database: "connected".into(),
                error: None,
            },
            Err(e) => HealthRes {
                status: "error".into(),
                timestamp,
                uptime_seconds: None,
                database: "disconnected".into(),
                error: Some(e.to_string()),
            },
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}
