use crate::geo::Coordinate;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Leave,
    HalfDay,
}

/// One employee's attendance for one check-in/check-out cycle on a day.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 42,
    "employee_id": 7,
    "date": "2026-01-05",
    "status": "present",
    "check_in": "08:00:00",
    "check_out": "17:00:00",
    "location": { "latitude": 23.8103, "longitude": 90.4125 },
    "address": "Gulshan, Dhaka, Bangladesh"
}))]
pub struct AttendanceRecord {
    /// Assigned by the store on first save.
    pub id: Option<u64>,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    /// Where the most recent check-in or check-out happened.
    pub location: Option<Coordinate>,
    pub address: Option<String>,
}

impl AttendanceRecord {
    /// Checked in and not yet checked out.
    pub fn is_open(&self) -> bool {
        self.check_in.is_some() && self.check_out.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.check_in.is_some() && self.check_out.is_some()
    }
}

/// Per-status head count for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub leave: u64,
    pub half_day: u64,
    pub total: u64,
}

impl AttendanceSummary {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            present: 0,
            absent: 0,
            late: 0,
            leave: 0,
            half_day: 0,
            total: 0,
        }
    }

    pub fn count(&mut self, status: AttendanceStatus) {
        let slot = match status {
            AttendanceStatus::Present => &mut self.present,
            AttendanceStatus::Absent => &mut self.absent,
            AttendanceStatus::Late => &mut self.late,
            AttendanceStatus::Leave => &mut self.leave,
            AttendanceStatus::HalfDay => &mut self.half_day,
        };
        *slot += 1;
        self.total += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn status_wire_form_is_kebab_case() {
        assert_eq!(AttendanceStatus::HalfDay.to_string(), "half-day");
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "half-day");
        assert_eq!(AttendanceStatus::from_str("half-day").unwrap(), AttendanceStatus::HalfDay);
        assert_eq!(
            serde_json::to_value(AttendanceStatus::HalfDay).unwrap(),
            serde_json::json!("half-day")
        );

        for status in AttendanceStatus::iter() {
            assert_eq!(AttendanceStatus::from_str(status.as_ref()).unwrap(), status);
        }
    }

    #[test]
    fn summary_counts_each_status() {
        let mut summary = AttendanceSummary::new(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        for status in [
            AttendanceStatus::Present,
            AttendanceStatus::Present,
            AttendanceStatus::Late,
            AttendanceStatus::HalfDay,
            AttendanceStatus::Leave,
        ] {
            summary.count(status);
        }

        assert_eq!(summary.present, 2);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.half_day, 1);
        assert_eq!(summary.leave, 1);
        assert_eq!(summary.absent, 0);
        assert_eq!(summary.total, 5);
    }
}
