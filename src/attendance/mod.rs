//! Geofenced attendance: the check-in/check-out state machine, the service
//! that runs it under a per-employee-day lock, and the store seams.

pub mod engine;
pub mod error;
pub mod locks;
pub mod service;
pub mod store;

/// The service as wired into the HTTP layer.
pub type Attendance = service::AttendanceService<store::mysql::MySqlStore>;
