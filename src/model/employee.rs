use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EmployeeStatus {
    Active,
    OnLeave,
    Inactive,
}

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
pub enum EmploymentType {
    #[default]
    Permanent,
    Contract,
    DailyWage,
}

crate::model::text_column!(EmployeeStatus, EmploymentType);

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "full_name": "John Martinez",
        "email": "john.martinez@company.com",
        "phone": "+8801712345678",
        "job_role": "Site Supervisor",
        "department_id": 2,
        "site_id": 1,
        "status": "active",
        "employment_type": "permanent",
        "join_date": "2024-01-15",
        "date_of_birth": "1990-04-02",
        "gender": "male",
        "address": "House 12, Road 5, Dhanmondi, Dhaka",
        "emergency_contact_name": "Maria Martinez",
        "emergency_contact_phone": "+8801812345678"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John Martinez")]
    pub full_name: String,

    #[schema(example = "john.martinez@company.com")]
    pub email: String,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    /// Trade or title on site, e.g. "Mason", "Crane Operator"
    #[schema(example = "Site Supervisor")]
    pub job_role: String,

    #[schema(example = 2, nullable = true)]
    pub department_id: Option<u64>,

    /// Geofence site; `null` means attendance is not location-restricted
    #[schema(example = 1, nullable = true)]
    pub site_id: Option<u64>,

    #[sqlx(try_from = "String")]
    pub status: EmployeeStatus,

    #[sqlx(try_from = "String")]
    pub employment_type: EmploymentType,

    #[schema(
        example = "2024-01-15",
        value_type = String,
        format = "date"
    )]
    pub join_date: NaiveDate,

    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_birth: Option<NaiveDate>,

    pub gender: Option<String>,

    pub address: Option<String>,

    pub emergency_contact_name: Option<String>,

    pub emergency_contact_phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_decode_to_variants() {
        assert_eq!(
            EmployeeStatus::try_from("on-leave".to_string()).unwrap(),
            EmployeeStatus::OnLeave
        );
        assert_eq!(
            EmploymentType::try_from("daily-wage".to_string()).unwrap(),
            EmploymentType::DailyWage
        );
        assert!(EmployeeStatus::try_from("retired".to_string()).is_err());
        assert_eq!(EmploymentType::default().as_ref(), "permanent");
    }
}
