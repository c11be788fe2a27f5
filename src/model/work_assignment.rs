use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

crate::model::text_column!(AssignmentStatus);

/// A day's task for one employee. `end_time` is always after `start_time`.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "employee_id": 1,
    "site_id": 1,
    "work_date": "2026-01-05",
    "work_details": "Pour level 3 slab, east wing",
    "start_time": "08:00:00",
    "end_time": "16:30:00",
    "status": "pending"
}))]
pub struct WorkAssignment {
    pub id: u64,
    pub employee_id: u64,
    pub site_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub work_date: NaiveDate,
    pub work_details: String,
    #[schema(value_type = String, example = "08:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "16:30:00")]
    pub end_time: NaiveTime,
    #[sqlx(try_from = "String")]
    pub status: AssignmentStatus,
}
