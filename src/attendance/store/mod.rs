//! Persistence seams for the attendance service.

#[cfg(test)]
pub mod memory;
pub mod mysql;

use crate::attendance::error::AttendanceError;
use crate::geo::Site;
use crate::model::attendance::AttendanceRecord;
use chrono::NaiveDate;

#[allow(async_fn_in_trait)]
pub trait AttendanceStore {
    /// The record with a check-in and no check-out, if any.
    async fn open_record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError>;

    /// Every record for the employee on that day, oldest first.
    async fn day_records(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError>;

    async fn record(&self, id: u64) -> Result<Option<AttendanceRecord>, AttendanceError>;

    /// Insert when `record.id` is `None`, update otherwise. Saving a record
    /// that would leave two open records for the same day fails with
    /// `DuplicateCheckIn`.
    async fn save(&self, record: AttendanceRecord) -> Result<AttendanceRecord, AttendanceError>;

    /// Returns `false` when no such record exists.
    async fn set_address(&self, id: u64, address: &str) -> Result<bool, AttendanceError>;
}

#[allow(async_fn_in_trait)]
pub trait EmployeeDirectory {
    /// The site the employee is assigned to. Employees without an assignment
    /// get [`Site::unrestricted`].
    async fn employee_site(&self, employee_id: u64) -> Result<Site, AttendanceError>;
}
