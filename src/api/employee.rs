use crate::{
    auth::auth::AuthUser,
    model::employee::{Employee, EmployeeStatus, EmploymentType},
    utils::db_utils::{
        Filters, SqlValue, bind_all, build_update_sql, check_choice, execute_update, paging,
        patch_object,
    },
};
use actix_web::{HttpResponse, Responder, error::ErrorBadRequest, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const EMPLOYEE_COLUMNS: &str = "id, employee_code, full_name, email, phone, job_role, \
     department_id, site_id, status, employment_type, join_date, date_of_birth, gender, \
     address, emergency_contact_name, emergency_contact_phone";

const UPDATABLE: &[&str] = &[
    "employee_code",
    "full_name",
    "email",
    "phone",
    "job_role",
    "department_id",
    "site_id",
    "status",
    "employment_type",
    "join_date",
    "date_of_birth",
    "gender",
    "address",
    "emergency_contact_name",
    "emergency_contact_phone",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John Martinez")]
    pub full_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    #[schema(example = "+8801712345678")]
    pub phone: Option<String>,
    #[schema(example = "Mason")]
    pub job_role: String,
    #[schema(example = 2)]
    pub department_id: Option<u64>,
    #[schema(example = 1)]
    pub site_id: Option<u64>,
    /// Defaults to `permanent`
    pub employment_type: Option<EmploymentType>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub join_date: NaiveDate,
    #[schema(example = "1990-04-02", format = "date", value_type = Option<String>)]
    pub date_of_birth: Option<NaiveDate>,
    #[schema(example = "male")]
    pub gender: Option<String>,
    #[schema(example = "House 12, Road 5, Dhanmondi, Dhaka")]
    pub address: Option<String>,
    #[schema(example = "Maria Martinez")]
    pub emergency_contact_name: Option<String>,
    #[schema(example = "+8801812345678")]
    pub emergency_contact_phone: Option<String>,
}

impl CreateEmployee {
    fn validate(&self) -> actix_web::Result<()> {
        if self.full_name.trim().is_empty() || self.employee_code.trim().is_empty() {
            return Err(ErrorBadRequest("employee_code and full_name are required"));
        }
        if self.date_of_birth.is_some_and(|born| born >= self.join_date) {
            return Err(ErrorBadRequest("date_of_birth must be before join_date"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub site_id: Option<u64>,
    pub department_id: Option<u64>,
    pub status: Option<EmployeeStatus>,
    pub employment_type: Option<EmploymentType>,
    /// Matches name, email or employee code
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

fn db_error(e: sqlx::Error) -> HttpResponse {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => HttpResponse::Conflict()
            .json(json!({ "message": "Employee code or email already in use" })),
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            HttpResponse::BadRequest().json(json!({ "message": "Unknown site_id or department_id" }))
        }
        _ => {
            error!(error = %e, "Employee write failed");
            HttpResponse::InternalServerError().json(json!({
                "message": "Something went wrong, Contact with system admin"
            }))
        }
    }
}

fn check_patch(patch: &Value) -> actix_web::Result<()> {
    let obj = patch_object(patch)?;
    check_choice::<EmployeeStatus>(obj, "status")?;
    check_choice::<EmploymentType>(obj, "employment_type")
}

#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({
            "id": 1, "message": "Employee created"
        })),
        (status = 400, description = "Missing name or code, bad dates, unknown site or department"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Employee code or email already in use")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    payload.validate()?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, full_name, email, phone, job_role, department_id, site_id,
             employment_type, join_date, date_of_birth, gender, address,
             emergency_contact_name, emergency_contact_phone)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.full_name.trim())
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.job_role)
    .bind(payload.department_id)
    .bind(payload.site_id)
    .bind(payload.employment_type.unwrap_or_default().to_string())
    .bind(payload.join_date)
    .bind(payload.date_of_birth)
    .bind(&payload.gender)
    .bind(&payload.address)
    .bind(&payload.emergency_contact_name)
    .bind(&payload.emergency_contact_phone)
    .execute(pool.get_ref())
    .await;

    Ok(match result {
        Ok(done) => {
            info!(employee_id = done.last_insert_id(), "Employee created");
            HttpResponse::Created().json(json!({
                "id": done.last_insert_id(),
                "message": "Employee created"
            }))
        }
        Err(e) => db_error(e),
    })
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 400, description = "Unknown status or employment type filter")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(site_id) = query.site_id {
        filters.push("site_id = ?", SqlValue::U64(site_id));
    }
    if let Some(department_id) = query.department_id {
        filters.push("department_id = ?", SqlValue::U64(department_id));
    }
    if let Some(status) = query.status {
        filters.push("status = ?", SqlValue::String(status.to_string()));
    }
    if let Some(employment_type) = query.employment_type {
        filters.push("employment_type = ?", SqlValue::String(employment_type.to_string()));
    }
    if let Some(search) = &query.search {
        let like = SqlValue::String(format!("%{}%", search.trim()));
        filters.push_many(
            "(full_name LIKE ? OR email LIKE ? OR employee_code LIKE ?)",
            [like.clone(), like.clone(), like],
        );
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM employees {where_clause}");
    debug!(sql = %count_sql, bindings = ?filters.values, "Counting employees");

    let total = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %count_sql, "Failed to count employees");
            ErrorInternalServerError("Database error")
        })?;

    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees {where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let employees = bind_all!(sqlx::query_as::<_, Employee>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %data_sql, "Failed to fetch employees");
            ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Partial update. Only the listed employee columns may be sent.
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    request_body(content = Object, example = json!({ "site_id": 2, "status": "on-leave" })),
    responses(
        (status = 200, description = "Employee updated"),
        (status = 400, description = "Unknown field or status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    check_patch(&body)?;
    let update = build_update_sql("employees", &body, UPDATABLE, "id", employee_id)?;

    Ok(match execute_update(pool.get_ref(), update).await {
        // zero when nothing changed as well as when the id is unknown
        Ok(0) => match employee_exists(pool.get_ref(), employee_id).await {
            Ok(true) => HttpResponse::Ok().json(json!({ "message": "Employee updated" })),
            Ok(false) => HttpResponse::NotFound().json(json!({ "message": "Employee not found" })),
            Err(e) => db_error(e),
        },
        Ok(_) => {
            info!(employee_id, "Employee updated");
            HttpResponse::Ok().json(json!({ "message": "Employee updated" }))
        }
        Err(e) => db_error(e),
    })
}

async fn employee_exists(pool: &MySqlPool, employee_id: u64) -> Result<bool, sqlx::Error> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_one(pool)
        .await?;
    Ok(n > 0)
}

#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee has attendance history")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await;

    Ok(match result {
        Ok(res) if res.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "message": "Employee not found" }))
        }
        Ok(_) => {
            info!(employee_id, "Employee deleted");
            HttpResponse::Ok().json(json!({ "message": "Successfully deleted" }))
        }
        // attendance rows reference the employee
        Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
            HttpResponse::Conflict().json(json!({
                "message": "Employee has attendance history and cannot be deleted; set status to inactive instead"
            }))
        }
        Err(e) => {
            error!(error = %e, employee_id, "Failed to delete employee");
            HttpResponse::InternalServerError().json(json!({ "message": "Internal Server Error" }))
        }
    })
}

#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let employee = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"
    ))
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch employee");
        ErrorInternalServerError("Internal Server Error")
    })?;

    match employee {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(HttpResponse::NotFound().json(json!({ "message": "Employee not found" }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_hire() -> CreateEmployee {
        serde_json::from_value(json!({
            "employee_code": "EMP-014",
            "full_name": "Rafiq Hasan",
            "email": "rafiq@company.com",
            "job_role": "Mason",
            "join_date": "2026-01-01"
        }))
        .unwrap()
    }

    #[test]
    fn status_patch_is_validated() {
        assert!(check_patch(&json!({ "status": "on-leave" })).is_ok());
        assert!(check_patch(&json!({ "full_name": "A" })).is_ok());
        assert!(check_patch(&json!({ "status": "retired" })).is_err());
        assert!(check_patch(&json!({ "status": 3 })).is_err());
        assert!(check_patch(&json!({ "employment_type": "daily-wage" })).is_ok());
        assert!(check_patch(&json!({ "employment_type": "freelance" })).is_err());
    }

    #[test]
    fn status_filter_must_be_a_known_status() {
        let query = web::Query::<EmployeeQuery>::from_query("status=on-leave&page=2").unwrap();
        assert_eq!(query.status, Some(EmployeeStatus::OnLeave));

        assert!(web::Query::<EmployeeQuery>::from_query("status=retired").is_err());
        assert!(web::Query::<EmployeeQuery>::from_query("employment_type=daily-wage").is_ok());
        assert!(web::Query::<EmployeeQuery>::from_query("employment_type=intern").is_err());
    }

    #[test]
    fn new_hire_defaults_and_date_checks() {
        let hire = new_hire();
        assert!(hire.validate().is_ok());
        assert_eq!(hire.employment_type, None);
        assert_eq!(hire.employment_type.unwrap_or_default(), EmploymentType::Permanent);

        let mut born_after_joining = new_hire();
        born_after_joining.date_of_birth = NaiveDate::from_ymd_opt(2026, 3, 1);
        assert!(born_after_joining.validate().is_err());

        let mut blank = new_hire();
        blank.full_name = "  ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn employee_columns_are_updatable_except_id() {
        assert!(!UPDATABLE.contains(&"id"));
        for column in UPDATABLE {
            assert!(EMPLOYEE_COLUMNS.contains(column));
        }
    }
}
