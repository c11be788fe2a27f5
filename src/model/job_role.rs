use crate::model::department::CatalogStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A trade or title employees can be assigned, optionally scoped to a
/// department. Assigning one copies its name into `employees.job_role`.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 4,
    "name": "Crane Operator",
    "description": "Tower and mobile cranes",
    "department_id": 2,
    "status": "active"
}))]
pub struct JobRole {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub department_id: Option<u64>,
    #[sqlx(try_from = "String")]
    pub status: CatalogStatus,
}
