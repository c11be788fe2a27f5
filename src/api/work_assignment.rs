use crate::{
    auth::auth::AuthUser,
    model::work_assignment::{AssignmentStatus, WorkAssignment},
    utils::db_utils::{
        Filters, SqlValue, bind_all, build_update_sql, check_choice, execute_update, paging,
        patch_object,
    },
};
use actix_web::{
    HttpResponse,
    error::{ErrorBadRequest, ErrorForbidden, ErrorInternalServerError},
    web,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const ASSIGNMENT_COLUMNS: &str =
    "id, employee_id, site_id, work_date, work_details, start_time, end_time, status";

const UPDATABLE: &[&str] = &[
    "employee_id",
    "site_id",
    "work_date",
    "work_details",
    "start_time",
    "end_time",
    "status",
];

/// Statuses an employee may move their own assignment to.
const SELF_SERVICE: &[AssignmentStatus] = &[AssignmentStatus::InProgress, AssignmentStatus::Completed];

#[derive(Deserialize, ToSchema)]
pub struct CreateWorkAssignment {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = 1)]
    pub site_id: Option<u64>,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(example = "Pour level 3 slab, east wing")]
    pub work_details: String,
    #[schema(example = "08:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "16:30:00", value_type = String)]
    pub end_time: NaiveTime,
    /// Defaults to `pending`
    pub status: Option<AssignmentStatus>,
}

impl CreateWorkAssignment {
    fn validate(&self) -> actix_web::Result<()> {
        if self.work_details.trim().is_empty() {
            return Err(ErrorBadRequest("work_details is required"));
        }
        check_window(self.start_time, self.end_time)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkAssignmentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Employees may only ask for themselves
    pub employee_id: Option<u64>,
    pub site_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub status: Option<AssignmentStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkAssignmentListResponse {
    pub data: Vec<WorkAssignment>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn check_window(start: NaiveTime, end: NaiveTime) -> actix_web::Result<()> {
    if end > start {
        Ok(())
    } else {
        Err(ErrorBadRequest("end_time must be after start_time"))
    }
}

fn parse_time(value: &Value) -> actix_web::Result<NaiveTime> {
    value
        .as_str()
        .and_then(|s| {
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
        })
        .ok_or_else(|| ErrorBadRequest(format!("Invalid time {value}, expected HH:MM[:SS]")))
}

/// Admins may change any listed column; employees only move the status of
/// their own assignment forward.
fn check_patch(patch: &Value, admin: bool) -> actix_web::Result<()> {
    let obj = patch_object(patch)?;
    check_choice::<AssignmentStatus>(obj, "status")?;

    if !admin {
        if obj.keys().any(|k| k != "status") {
            return Err(ErrorForbidden("Employees may only update the assignment status"));
        }
        let status = obj
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| AssignmentStatus::from_str(s).ok());
        if !status.is_some_and(|s| SELF_SERVICE.contains(&s)) {
            return Err(ErrorForbidden("Employees may only start or complete assignments"));
        }
        return Ok(());
    }

    if let Some(details) = obj.get("work_details") {
        if details.as_str().is_none_or(|d| d.trim().is_empty()) {
            return Err(ErrorBadRequest("work_details cannot be blank"));
        }
    }

    match (obj.get("start_time"), obj.get("end_time")) {
        (None, None) => Ok(()),
        (Some(start), Some(end)) => check_window(parse_time(start)?, parse_time(end)?),
        _ => Err(ErrorBadRequest("start_time and end_time must be updated together")),
    }
}

/// Which employee a listing is limited to, if any.
fn scope_employee(auth: &AuthUser, requested: Option<u64>) -> actix_web::Result<Option<u64>> {
    match (auth.is_admin(), requested) {
        (true, requested) => Ok(requested),
        (false, Some(requested)) if !auth.can_view_employee(requested) => Err(ErrorForbidden(
            "Employees may only view their own work assignments",
        )),
        (false, _) => Ok(Some(auth.require_employee()?)),
    }
}

fn db_error(e: sqlx::Error) -> HttpResponse {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            HttpResponse::BadRequest().json(json!({ "message": "Unknown employee_id or site_id" }))
        }
        _ => {
            error!(error = %e, "Work assignment write failed");
            HttpResponse::InternalServerError().json(json!({ "message": "Internal Server Error" }))
        }
    }
}

async fn fetch_assignment(
    pool: &MySqlPool,
    assignment_id: u64,
) -> actix_web::Result<Option<WorkAssignment>> {
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM work_assignments WHERE id = ?");
    sqlx::query_as::<_, WorkAssignment>(&sql)
        .bind(assignment_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            error!(error = %e, assignment_id, "Failed to fetch work assignment");
            ErrorInternalServerError("Internal Server Error")
        })
}

async fn fetch_page(
    pool: &MySqlPool,
    filters: Filters,
    page: Option<u32>,
    per_page: Option<u32>,
) -> actix_web::Result<WorkAssignmentListResponse> {
    let (page, per_page, offset) = paging(page, per_page);
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM work_assignments {where_clause}");
    let total = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count work assignments");
            ErrorInternalServerError("Database error")
        })?;

    let data_sql = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM work_assignments {where_clause} \
         ORDER BY work_date DESC, start_time, id LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page, per_page, "Fetching work assignments");

    let data = bind_all!(sqlx::query_as::<_, WorkAssignment>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch work assignments");
            ErrorInternalServerError("Database error")
        })?;

    Ok(WorkAssignmentListResponse {
        data,
        page,
        per_page,
        total,
    })
}

#[utoipa::path(
    post,
    path = "/api/work-assignments",
    request_body = CreateWorkAssignment,
    responses(
        (status = 201, description = "Work assigned"),
        (status = 400, description = "Blank details, end not after start, unknown employee or site"),
        (status = 403, description = "Admin only")
    ),
    tag = "Work Assignment",
    security(("bearer_auth" = []))
)]
pub async fn create_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWorkAssignment>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let result = sqlx::query(
        r#"
        INSERT INTO work_assignments
            (employee_id, site_id, work_date, work_details, start_time, end_time, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.site_id)
    .bind(payload.work_date)
    .bind(payload.work_details.trim())
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.status.unwrap_or_default().to_string())
    .execute(pool.get_ref())
    .await;

    Ok(match result {
        Ok(done) => {
            info!(
                assignment_id = done.last_insert_id(),
                employee_id = payload.employee_id,
                "Work assigned"
            );
            HttpResponse::Created()
                .json(json!({ "id": done.last_insert_id(), "message": "Work assigned" }))
        }
        Err(e) => db_error(e),
    })
}

#[utoipa::path(
    get,
    path = "/api/work-assignments",
    params(WorkAssignmentQuery),
    responses(
        (status = 200, description = "Assignments, latest day first", body = WorkAssignmentListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 403, description = "Employees may only view their own assignments")
    ),
    tag = "Work Assignment",
    security(("bearer_auth" = []))
)]
pub async fn list_assignments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<WorkAssignmentQuery>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = scope_employee(&auth, query.employee_id)?;

    let mut filters = Filters::default();
    if let Some(id) = employee_id {
        filters.push("employee_id = ?", SqlValue::U64(id));
    }
    if let Some(site_id) = query.site_id {
        filters.push("site_id = ?", SqlValue::U64(site_id));
    }
    if let Some(date) = query.date {
        filters.push("work_date = ?", SqlValue::Date(date));
    }
    if let Some(status) = query.status {
        filters.push("status = ?", SqlValue::String(status.to_string()));
    }

    let page = fetch_page(pool.get_ref(), filters, query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/work-assignments/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID"),
        ("page" = Option<u32>, Query, description = "1-based page"),
        ("per_page" = Option<u32>, Query, description = "Page size, at most 100")
    ),
    responses(
        (status = 200, description = "The employee's assignments", body = WorkAssignmentListResponse),
        (status = 403, description = "Employees may only view their own assignments")
    ),
    tag = "Work Assignment",
    security(("bearer_auth" = []))
)]
pub async fn employee_assignments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<WorkAssignmentQuery>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = scope_employee(&auth, Some(path.into_inner()))?;

    let mut filters = Filters::default();
    if let Some(id) = employee_id {
        filters.push("employee_id = ?", SqlValue::U64(id));
    }

    let page = fetch_page(pool.get_ref(), filters, query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/work-assignments/{assignment_id}",
    params(("assignment_id", Path, description = "Work assignment ID")),
    responses(
        (status = 200, description = "Assignment found", body = WorkAssignment),
        (status = 404, description = "Assignment not found")
    ),
    tag = "Work Assignment",
    security(("bearer_auth" = []))
)]
pub async fn get_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    // someone else's assignment looks the same as a missing one
    Ok(match fetch_assignment(pool.get_ref(), path.into_inner()).await? {
        Some(assignment) if auth.can_view_employee(assignment.employee_id) => {
            HttpResponse::Ok().json(assignment)
        }
        _ => HttpResponse::NotFound().json(json!({ "message": "Work assignment not found" })),
    })
}

#[utoipa::path(
    put,
    path = "/api/work-assignments/{assignment_id}",
    params(("assignment_id", Path, description = "Work assignment ID")),
    request_body(content = Object, example = json!({ "status": "in-progress" })),
    responses(
        (status = 200, description = "Assignment updated"),
        (status = 400, description = "Unknown field or status, or end not after start"),
        (status = 403, description = "Employees may only start or complete their own assignments"),
        (status = 404, description = "Assignment not found")
    ),
    tag = "Work Assignment",
    security(("bearer_auth" = []))
)]
pub async fn update_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<HttpResponse> {
    let assignment_id = path.into_inner();

    let Some(current) = fetch_assignment(pool.get_ref(), assignment_id).await? else {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Work assignment not found" })));
    };
    if !auth.can_view_employee(current.employee_id) {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Work assignment not found" })));
    }

    check_patch(&body, auth.is_admin())?;
    let update = build_update_sql("work_assignments", &body, UPDATABLE, "id", assignment_id)?;

    if let Err(e) = execute_update(pool.get_ref(), update).await {
        return Ok(db_error(e));
    }

    info!(assignment_id, by = %auth.username, "Work assignment updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Work assignment updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/work-assignments/{assignment_id}",
    params(("assignment_id", Path, description = "Work assignment ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Assignment not found")
    ),
    tag = "Work Assignment",
    security(("bearer_auth" = []))
)]
pub async fn delete_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let assignment_id = path.into_inner();

    let result = sqlx::query("DELETE FROM work_assignments WHERE id = ?")
        .bind(assignment_id)
        .execute(pool.get_ref())
        .await;

    Ok(match result {
        Ok(res) if res.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "message": "Work assignment not found" }))
        }
        Ok(_) => {
            info!(assignment_id, "Work assignment deleted");
            HttpResponse::Ok().json(json!({ "message": "Successfully deleted" }))
        }
        Err(e) => db_error(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "site.lead".to_string(),
            role,
            employee_id,
        }
    }

    fn slab_pour() -> CreateWorkAssignment {
        serde_json::from_value(json!({
            "employee_id": 1,
            "site_id": 1,
            "work_date": "2026-01-05",
            "work_details": "Pour level 3 slab",
            "start_time": "08:00:00",
            "end_time": "16:30:00"
        }))
        .unwrap()
    }

    #[test]
    fn end_must_follow_start() {
        assert!(slab_pour().validate().is_ok());
        assert_eq!(slab_pour().status.unwrap_or_default(), AssignmentStatus::Pending);

        let mut same = slab_pour();
        same.end_time = same.start_time;
        assert!(same.validate().is_err());

        let mut backwards = slab_pour();
        backwards.end_time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        assert!(backwards.validate().is_err());

        let mut blank = slab_pour();
        blank.work_details = " ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn admin_patch_keeps_times_paired_and_ordered() {
        assert!(check_patch(&json!({ "start_time": "09:00", "end_time": "17:00" }), true).is_ok());
        assert!(check_patch(&json!({ "start_time": "17:00", "end_time": "09:00" }), true).is_err());
        assert!(check_patch(&json!({ "start_time": "09:00" }), true).is_err());
        assert!(check_patch(&json!({ "start_time": "nine", "end_time": "17:00" }), true).is_err());
        assert!(check_patch(&json!({ "work_details": "" }), true).is_err());
        assert!(check_patch(&json!({ "status": "cancelled", "site_id": 2 }), true).is_ok());
        assert!(check_patch(&json!({ "status": "paused" }), true).is_err());
    }

    #[test]
    fn employees_only_start_or_complete() {
        assert!(check_patch(&json!({ "status": "in-progress" }), false).is_ok());
        assert!(check_patch(&json!({ "status": "completed" }), false).is_ok());
        assert!(check_patch(&json!({ "status": "cancelled" }), false).is_err());
        assert!(check_patch(&json!({ "status": "pending" }), false).is_err());
        assert!(check_patch(&json!({ "status": "completed", "end_time": "18:00" }), false).is_err());
    }

    #[test]
    fn listings_are_scoped_to_the_caller() {
        let admin = user(Role::Admin, None);
        assert_eq!(scope_employee(&admin, None).unwrap(), None);
        assert_eq!(scope_employee(&admin, Some(9)).unwrap(), Some(9));

        let worker = user(Role::Employee, Some(7));
        assert_eq!(scope_employee(&worker, None).unwrap(), Some(7));
        assert_eq!(scope_employee(&worker, Some(7)).unwrap(), Some(7));
        assert!(scope_employee(&worker, Some(9)).is_err());

        assert!(scope_employee(&user(Role::Employee, None), None).is_err());
    }

    #[test]
    fn status_filter_must_be_known() {
        let query =
            web::Query::<WorkAssignmentQuery>::from_query("status=in-progress&date=2026-01-05")
                .unwrap();
        assert_eq!(query.status, Some(AssignmentStatus::InProgress));
        assert!(web::Query::<WorkAssignmentQuery>::from_query("status=blocked").is_err());
    }
}
