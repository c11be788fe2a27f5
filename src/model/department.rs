use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Shared by departments and job roles.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CatalogStatus {
    #[default]
    Active,
    Inactive,
}

crate::model::text_column!(CatalogStatus);

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 2,
    "name": "Civil Works",
    "description": "Foundations, concrete and masonry crews",
    "status": "active"
}))]
pub struct Department {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: CatalogStatus,
}
