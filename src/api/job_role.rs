use crate::{
    auth::auth::AuthUser,
    model::department::CatalogStatus,
    model::job_role::JobRole,
    utils::db_utils::{
        Filters, SqlValue, bind_all, build_update_sql, check_choice, execute_update, paging,
        patch_object,
    },
};
use actix_web::{
    HttpResponse,
    error::{ErrorBadRequest, ErrorInternalServerError, ErrorNotFound},
    web,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const JOB_ROLE_COLUMNS: &str = "id, name, description, department_id, status";

const UPDATABLE: &[&str] = &["name", "description", "department_id", "status"];

#[derive(Deserialize, ToSchema)]
pub struct CreateJobRole {
    #[schema(example = "Crane Operator")]
    pub name: String,
    #[schema(example = "Tower and mobile cranes")]
    pub description: Option<String>,
    #[schema(example = 2)]
    pub department_id: Option<u64>,
    /// Defaults to `active`
    pub status: Option<CatalogStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobRoleQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub status: Option<CatalogStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct JobRoleListResponse {
    pub data: Vec<JobRole>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignJobRole {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = 4)]
    pub job_role_id: u64,
}

fn check_patch(patch: &Value) -> actix_web::Result<()> {
    let obj = patch_object(patch)?;
    check_choice::<CatalogStatus>(obj, "status")?;

    match obj.get("name") {
        Some(Value::String(name)) if name.trim().is_empty() => {
            Err(ErrorBadRequest("name cannot be blank"))
        }
        Some(Value::String(_)) | None => Ok(()),
        Some(_) => Err(ErrorBadRequest("name must be a string")),
    }
}

/// Only an existing, active job role can be handed out.
fn assignable(role: Option<JobRole>, job_role_id: u64) -> actix_web::Result<JobRole> {
    match role {
        None => Err(ErrorNotFound(format!("Job role {job_role_id} not found"))),
        Some(role) if role.status == CatalogStatus::Inactive => Err(ErrorBadRequest(format!(
            "Job role '{}' is inactive",
            role.name
        ))),
        Some(role) => Ok(role),
    }
}

fn db_error(e: sqlx::Error) -> HttpResponse {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            HttpResponse::Conflict().json(json!({ "message": "Job role name already in use" }))
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            HttpResponse::BadRequest().json(json!({ "message": "Unknown department_id" }))
        }
        _ => {
            error!(error = %e, "Job role write failed");
            HttpResponse::InternalServerError().json(json!({ "message": "Internal Server Error" }))
        }
    }
}

async fn fetch_job_role(pool: &MySqlPool, job_role_id: u64) -> actix_web::Result<Option<JobRole>> {
    let sql = format!("SELECT {JOB_ROLE_COLUMNS} FROM job_roles WHERE id = ?");
    sqlx::query_as::<_, JobRole>(&sql)
        .bind(job_role_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            error!(error = %e, job_role_id, "Failed to fetch job role");
            ErrorInternalServerError("Internal Server Error")
        })
}

#[utoipa::path(
    post,
    path = "/api/job-roles",
    request_body = CreateJobRole,
    responses(
        (status = 201, description = "Job role created"),
        (status = 400, description = "Name is required, or unknown department"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Job role name already in use")
    ),
    tag = "Job Role",
    security(("bearer_auth" = []))
)]
pub async fn create_job_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateJobRole>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    if payload.name.trim().is_empty() {
        return Err(ErrorBadRequest("name is required"));
    }

    let result = sqlx::query(
        "INSERT INTO job_roles (name, description, department_id, status) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.department_id)
    .bind(payload.status.unwrap_or_default().to_string())
    .execute(pool.get_ref())
    .await;

    Ok(match result {
        Ok(done) => {
            info!(job_role_id = done.last_insert_id(), "Job role created");
            HttpResponse::Created()
                .json(json!({ "id": done.last_insert_id(), "message": "Job role created" }))
        }
        Err(e) => db_error(e),
    })
}

#[utoipa::path(
    get,
    path = "/api/job-roles",
    params(JobRoleQuery),
    responses(
        (status = 200, description = "Job roles by name", body = JobRoleListResponse),
        (status = 400, description = "Unknown status filter")
    ),
    tag = "Job Role",
    security(("bearer_auth" = []))
)]
pub async fn list_job_roles(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<JobRoleQuery>,
) -> actix_web::Result<HttpResponse> {
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(department_id) = query.department_id {
        filters.push("department_id = ?", SqlValue::U64(department_id));
    }
    if let Some(status) = query.status {
        filters.push("status = ?", SqlValue::String(status.to_string()));
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM job_roles {where_clause}");
    let total = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count job roles");
            ErrorInternalServerError("Database error")
        })?;

    let data_sql = format!(
        "SELECT {JOB_ROLE_COLUMNS} FROM job_roles {where_clause} ORDER BY name LIMIT ? OFFSET ?"
    );
    let roles = bind_all!(sqlx::query_as::<_, JobRole>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch job roles");
            ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(JobRoleListResponse {
        data: roles,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/job-roles/{job_role_id}",
    params(("job_role_id", Path, description = "Job role ID")),
    responses(
        (status = 200, description = "Job role found", body = JobRole),
        (status = 404, description = "Job role not found")
    ),
    tag = "Job Role",
    security(("bearer_auth" = []))
)]
pub async fn get_job_role(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    Ok(match fetch_job_role(pool.get_ref(), path.into_inner()).await? {
        Some(role) => HttpResponse::Ok().json(role),
        None => HttpResponse::NotFound().json(json!({ "message": "Job role not found" })),
    })
}

/// Renaming a job role does not rename it on employees already holding it.
#[utoipa::path(
    put,
    path = "/api/job-roles/{job_role_id}",
    params(("job_role_id", Path, description = "Job role ID")),
    request_body(content = Object, example = json!({ "department_id": 3 })),
    responses(
        (status = 200, description = "Job role updated"),
        (status = 400, description = "Unknown field, status or department"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Job role not found")
    ),
    tag = "Job Role",
    security(("bearer_auth" = []))
)]
pub async fn update_job_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let job_role_id = path.into_inner();

    check_patch(&body)?;
    let update = build_update_sql("job_roles", &body, UPDATABLE, "id", job_role_id)?;

    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(n) => n,
        Err(e) => return Ok(db_error(e)),
    };

    if affected == 0 && fetch_job_role(pool.get_ref(), job_role_id).await?.is_none() {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Job role not found" })));
    }

    info!(job_role_id, "Job role updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Job role updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/job-roles/{job_role_id}",
    params(("job_role_id", Path, description = "Job role ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Job role not found")
    ),
    tag = "Job Role",
    security(("bearer_auth" = []))
)]
pub async fn delete_job_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let job_role_id = path.into_inner();

    let result = sqlx::query("DELETE FROM job_roles WHERE id = ?")
        .bind(job_role_id)
        .execute(pool.get_ref())
        .await;

    Ok(match result {
        Ok(res) if res.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "message": "Job role not found" }))
        }
        Ok(_) => {
            info!(job_role_id, "Job role deleted");
            HttpResponse::Ok().json(json!({ "message": "Successfully deleted" }))
        }
        Err(e) => db_error(e),
    })
}

/// Give an employee a job role. The employee takes the role's name and, when
/// the role belongs to one, its department.
#[utoipa::path(
    post,
    path = "/api/job-roles/assign",
    request_body = AssignJobRole,
    responses(
        (status = 200, description = "Job role assigned", body = Object, example = json!({
            "employee_id": 1, "job_role": "Crane Operator", "message": "Job role assigned"
        })),
        (status = 400, description = "Job role is inactive"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee or job role not found")
    ),
    tag = "Job Role",
    security(("bearer_auth" = []))
)]
pub async fn assign_job_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<AssignJobRole>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let AssignJobRole {
        employee_id,
        job_role_id,
    } = payload.into_inner();

    let role = assignable(fetch_job_role(pool.get_ref(), job_role_id).await?, job_role_id)?;

    let result = sqlx::query(
        r#"
        UPDATE employees
        SET job_role = ?, department_id = COALESCE(?, department_id)
        WHERE id = ?
        "#,
    )
    .bind(&role.name)
    .bind(role.department_id)
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, job_role_id, "Failed to assign job role");
        ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_one(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, employee_id, "Failed to check employee");
                ErrorInternalServerError("Internal Server Error")
            })?;
        if exists == 0 {
            return Ok(HttpResponse::NotFound().json(json!({ "message": "Employee not found" })));
        }
    }

    info!(employee_id, job_role = %role.name, "Job role assigned");
    Ok(HttpResponse::Ok().json(json!({
        "employee_id": employee_id,
        "job_role": role.name,
        "message": "Job role assigned"
    })))
}
