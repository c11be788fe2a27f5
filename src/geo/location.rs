use crate::geo::{Coordinate, InvalidCoordinate};
use actix_web::rt::time::timeout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;

/// Why the device could not produce a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationError {
    #[error("location unavailable")]
    Unavailable,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location request timed out")]
    Timeout,
}

impl LocationError {
    /// What the user can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            LocationError::Unavailable => {
                "Location information is unavailable. Move to an open area and try again."
            }
            LocationError::PermissionDenied => {
                "Location access was denied. Allow location permission for this app and try again."
            }
            LocationError::Timeout => {
                "Getting your location took too long. Check your GPS signal and try again."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    pub captured_at: DateTime<Utc>,
}

#[allow(async_fn_in_trait)]
pub trait GeolocationProvider {
    async fn current_fix(&self) -> Result<LocationFix, LocationError>;
}

/// Bounds for a single location request.
#[derive(Debug, Clone, Copy)]
pub struct FixOptions {
    pub timeout: Duration,
    /// Oldest cached fix still accepted in place of a fresh one.
    pub maximum_age: Duration,
    /// How far ahead of `now` a fix may be stamped before its clock is
    /// considered wrong.
    pub maximum_skew: Duration,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            maximum_age: Duration::from_secs(300),
            maximum_skew: Duration::from_secs(30),
        }
    }
}

/// Ask `provider` for a fix, giving up after `options.timeout` and refusing
/// fixes older than `options.maximum_age` or stamped more than
/// `options.maximum_skew` ahead of `now`.
pub async fn acquire<P: GeolocationProvider>(
    provider: &P,
    options: &FixOptions,
    now: DateTime<Utc>,
) -> Result<LocationFix, LocationError> {
    let fix = timeout(options.timeout, provider.current_fix())
        .await
        .map_err(|_| {
            warn!(timeout_ms = options.timeout.as_millis() as u64, "Location request timed out");
            LocationError::Timeout
        })??;

    match (now - fix.captured_at).to_std() {
        Ok(age) if age > options.maximum_age => {
            warn!(age_secs = age.as_secs(), "Rejecting stale location fix");
            return Err(LocationError::Unavailable);
        }
        Ok(age) => debug!(age_ms = age.as_millis() as u64, "Location fix accepted"),
        Err(_) => {
            // stamped ahead of the server clock
            let ahead = (fix.captured_at - now).to_std().unwrap_or(Duration::MAX);
            if ahead > options.maximum_skew {
                warn!(ahead_secs = ahead.as_secs(), "Rejecting future-dated location fix");
                return Err(LocationError::Unavailable);
            }
            debug!(ahead_ms = ahead.as_millis() as u64, "Location fix accepted despite clock skew");
        }
    }

    Ok(fix)
}

/// What the device sent along with an attendance request: either a position
/// or the reason it could not get one.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "latitude": 23.8103,
    "longitude": 90.4125,
    "captured_at": "2026-01-05T08:00:00Z"
}))]
pub struct LocationReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// When the device took the fix. Defaults to the time the request arrived.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub captured_at: Option<DateTime<Utc>>,
    /// Set instead of coordinates when the device failed to get a position.
    pub error: Option<LocationError>,
}

/// A [`GeolocationProvider`] backed by a client-side report.
#[derive(Debug, Clone)]
pub struct ReportedLocation {
    outcome: Result<LocationFix, LocationError>,
}

impl ReportedLocation {
    /// Coordinates are range-checked here, before anything else sees them.
    pub fn from_report(
        report: &LocationReport,
        received_at: DateTime<Utc>,
    ) -> Result<Self, InvalidCoordinate> {
        let outcome = match (report.error, report.latitude, report.longitude) {
            (Some(error), _, _) => Err(error),
            (None, Some(latitude), Some(longitude)) => Ok(LocationFix {
                coordinate: Coordinate::new(latitude, longitude)?,
                captured_at: report.captured_at.unwrap_or(received_at),
            }),
            _ => Err(LocationError::Unavailable),
        };

        Ok(Self { outcome })
    }
}

impl GeolocationProvider for ReportedLocation {
    async fn current_fix(&self) -> Result<LocationFix, LocationError> {
        self.outcome
    }
}
