use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SiteStatus {
    Active,
    OnHold,
    Completed,
}

crate::model::text_column!(SiteStatus);

/// A construction project site as stored. `latitude`/`longitude` form the
/// geofence centre and are either both set or both null.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Downtown Tower Project",
        "address": "123 Main St, Downtown",
        "status": "active",
        "latitude": 23.8103,
        "longitude": 90.4125,
        "start_date": "2024-01-15",
        "expected_end": "2025-06-30"
    })
)]
pub struct ProjectSite {
    pub id: u64,
    pub name: String,
    pub address: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: SiteStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub expected_end: Option<NaiveDate>,
}
