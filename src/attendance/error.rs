use crate::geo::location::LocationError;
use crate::geo::{InvalidCoordinate, OutsideGeofence};
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Everything that can stop an attendance action. All of these except
/// `Storage` are the caller's to correct and retry.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error(transparent)]
    InvalidCoordinate(#[from] InvalidCoordinate),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    OutsideGeofence(#[from] OutsideGeofence),

    #[error("already checked in, check out first")]
    DuplicateCheckIn,

    #[error("no open check-in found for today")]
    NoOpenCheckIn,

    #[error("attendance for this day is already closed")]
    DayClosed,

    #[error("employee {0} not found")]
    EmployeeNotFound(u64),

    #[error("attendance record {0} not found")]
    RecordNotFound(u64),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl AttendanceError {
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::InvalidCoordinate(_) => "invalid_coordinate",
            AttendanceError::Location(LocationError::Unavailable) => "location_unavailable",
            AttendanceError::Location(LocationError::PermissionDenied) => "permission_denied",
            AttendanceError::Location(LocationError::Timeout) => "location_timeout",
            AttendanceError::OutsideGeofence(_) => "outside_geofence",
            AttendanceError::DuplicateCheckIn => "duplicate_check_in",
            AttendanceError::NoOpenCheckIn => "no_open_check_in",
            AttendanceError::DayClosed => "day_closed",
            AttendanceError::EmployeeNotFound(_) => "employee_not_found",
            AttendanceError::RecordNotFound(_) => "record_not_found",
            AttendanceError::Storage(_) => "internal_error",
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::InvalidCoordinate(_) => StatusCode::BAD_REQUEST,
            AttendanceError::Location(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::OutsideGeofence(_) => StatusCode::FORBIDDEN,
            AttendanceError::DuplicateCheckIn
            | AttendanceError::NoOpenCheckIn
            | AttendanceError::DayClosed => StatusCode::CONFLICT,
            AttendanceError::EmployeeNotFound(_) | AttendanceError::RecordNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AttendanceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AttendanceError::Storage(e) => {
                tracing::error!(error = %e, "Attendance storage failure");
                json!({
                    "code": self.code(),
                    "message": "Internal Server Error"
                })
            }
            AttendanceError::Location(e) => json!({
                "code": self.code(),
                "message": self.to_string(),
                "hint": e.hint()
            }),
            AttendanceError::OutsideGeofence(e) => json!({
                "code": self.code(),
                "message": self.to_string(),
                "distance_km": e.distance_km,
                "radius_km": e.radius_km
            }),
            _ => json!({
                "code": self.code(),
                "message": self.to_string()
            }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
