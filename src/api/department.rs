use crate::{
    auth::auth::AuthUser,
    model::department::{CatalogStatus, Department},
    utils::db_utils::{
        Filters, SqlValue, bind_all, build_update_sql, check_choice, execute_update, paging,
        patch_object,
    },
};
use actix_web::{HttpResponse, error::ErrorBadRequest, error::ErrorInternalServerError, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const DEPARTMENT_COLUMNS: &str = "id, name, description, status";

const UPDATABLE: &[&str] = &["name", "description", "status"];

#[derive(Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "Civil Works")]
    pub name: String,
    #[schema(example = "Foundations, concrete and masonry crews")]
    pub description: Option<String>,
    /// Defaults to `active`
    pub status: Option<CatalogStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DepartmentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<CatalogStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct DepartmentListResponse {
    pub data: Vec<Department>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
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

fn db_error(e: sqlx::Error) -> HttpResponse {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            HttpResponse::Conflict().json(json!({ "message": "Department name already in use" }))
        }
        _ => {
            error!(error = %e, "Department write failed");
            HttpResponse::InternalServerError().json(json!({ "message": "Internal Server Error" }))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = CreateDepartment,
    responses(
        (status = 201, description = "Department created"),
        (status = 400, description = "Name is required"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Department name already in use")
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    if payload.name.trim().is_empty() {
        return Err(ErrorBadRequest("name is required"));
    }

    let result = sqlx::query("INSERT INTO departments (name, description, status) VALUES (?, ?, ?)")
        .bind(payload.name.trim())
        .bind(&payload.description)
        .bind(payload.status.unwrap_or_default().to_string())
        .execute(pool.get_ref())
        .await;

    Ok(match result {
        Ok(done) => {
            info!(department_id = done.last_insert_id(), "Department created");
            HttpResponse::Created()
                .json(json!({ "id": done.last_insert_id(), "message": "Department created" }))
        }
        Err(e) => db_error(e),
    })
}

#[utoipa::path(
    get,
    path = "/api/departments",
    params(DepartmentQuery),
    responses(
        (status = 200, description = "Departments by name", body = DepartmentListResponse),
        (status = 400, description = "Unknown status filter")
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn list_departments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DepartmentQuery>,
) -> actix_web::Result<HttpResponse> {
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(status) = query.status {
        filters.push("status = ?", SqlValue::String(status.to_string()));
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM departments {where_clause}");
    let total = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count departments");
            ErrorInternalServerError("Database error")
        })?;

    let data_sql = format!(
        "SELECT {DEPARTMENT_COLUMNS} FROM departments {where_clause} ORDER BY name LIMIT ? OFFSET ?"
    );
    let departments = bind_all!(sqlx::query_as::<_, Department>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch departments");
            ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(DepartmentListResponse {
        data: departments,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/departments/{department_id}",
    params(("department_id", Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department found", body = Department),
        (status = 404, description = "Department not found")
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn get_department(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    let department_id = path.into_inner();

    let sql = format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = ?");
    let department = sqlx::query_as::<_, Department>(&sql)
        .bind(department_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, department_id, "Failed to fetch department");
            ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(match department {
        Some(department) => HttpResponse::Ok().json(department),
        None => HttpResponse::NotFound().json(json!({ "message": "Department not found" })),
    })
}

#[utoipa::path(
    put,
    path = "/api/departments/{department_id}",
    params(("department_id", Path, description = "Department ID")),
    request_body(content = Object, example = json!({ "status": "inactive" })),
    responses(
        (status = 200, description = "Department updated"),
        (status = 400, description = "Unknown field or status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Department name already in use")
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let department_id = path.into_inner();

    check_patch(&body)?;
    let update = build_update_sql("departments", &body, UPDATABLE, "id", department_id)?;

    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(n) => n,
        Err(e) => return Ok(db_error(e)),
    };

    if affected == 0 {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM departments WHERE id = ?")
            .bind(department_id)
            .fetch_one(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, department_id, "Failed to check department");
                ErrorInternalServerError("Internal Server Error")
            })?;
        if exists == 0 {
            return Ok(HttpResponse::NotFound().json(json!({ "message": "Department not found" })));
        }
    }

    info!(department_id, "Department updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Department updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/departments/{department_id}",
    params(("department_id", Path, description = "Department ID")),
    responses(
        (status = 200, description = "Deleted; its employees and job roles lose the department"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Department not found")
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let department_id = path.into_inner();

    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(department_id)
        .execute(pool.get_ref())
        .await;

    Ok(match result {
        Ok(res) if res.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "message": "Department not found" }))
        }
        Ok(_) => {
            info!(department_id, "Department deleted");
            HttpResponse::Ok().json(json!({ "message": "Successfully deleted" }))
        }
        Err(e) => db_error(e),
    })
}
