use crate::{
    auth::auth::AuthUser,
    geo::Coordinate,
    model::site::{ProjectSite, SiteStatus},
    utils::db_utils::{
        Filters, SqlValue, bind_all, build_update_sql, check_choice, execute_update, paging,
        patch_object,
    },
};
use actix_web::{HttpResponse, error::ErrorBadRequest, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const SITE_COLUMNS: &str =
    "id, name, address, status, latitude, longitude, start_date, expected_end";

const UPDATABLE: &[&str] = &[
    "name",
    "address",
    "status",
    "latitude",
    "longitude",
    "start_date",
    "expected_end",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateSite {
    #[schema(example = "Downtown Tower Project")]
    pub name: String,
    #[schema(example = "123 Main St, Downtown")]
    pub address: Option<String>,
    #[schema(example = 23.8103)]
    pub latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub longitude: Option<f64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub expected_end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SiteQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<SiteStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct SiteListResponse {
    pub data: Vec<ProjectSite>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// A geofence centre must be a valid coordinate, given as a pair.
fn check_reference(latitude: Option<f64>, longitude: Option<f64>) -> actix_web::Result<()> {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => Coordinate::new(lat, lng)
            .map(|_| ())
            .map_err(|e| ErrorBadRequest(e.to_string())),
        (None, None) => Ok(()),
        _ => Err(ErrorBadRequest("latitude and longitude must be set together")),
    }
}

fn check_patch(patch: &Value) -> actix_web::Result<()> {
    let obj = patch_object(patch)?;

    check_choice::<SiteStatus>(obj, "status")?;

    match (obj.get("latitude"), obj.get("longitude")) {
        (None, None) => Ok(()),
        (Some(lat), Some(lng)) => {
            let number = |v: &Value| match v {
                Value::Null => Ok(None),
                Value::Number(n) => Ok(n.as_f64()),
                _ => Err(ErrorBadRequest("latitude and longitude must be numbers")),
            };
            check_reference(number(lat)?, number(lng)?)
        }
        _ => Err(ErrorBadRequest("latitude and longitude must be updated together")),
    }
}

fn db_error(e: sqlx::Error) -> HttpResponse {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            HttpResponse::Conflict().json(json!({ "message": "Site name already in use" }))
        }
        _ => {
            error!(error = %e, "Site write failed");
            HttpResponse::InternalServerError().json(json!({ "message": "Internal Server Error" }))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/sites",
    request_body = CreateSite,
    responses(
        (status = 201, description = "Site created"),
        (status = 400, description = "Invalid reference coordinate"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Site name already in use")
    ),
    tag = "Site",
    security(("bearer_auth" = []))
)]
pub async fn create_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSite>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    if payload.name.trim().is_empty() {
        return Err(ErrorBadRequest("name is required"));
    }
    check_reference(payload.latitude, payload.longitude)?;

    let result = sqlx::query(
        r#"
        INSERT INTO sites (name, address, latitude, longitude, start_date, expected_end)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.address)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(payload.start_date)
    .bind(payload.expected_end)
    .execute(pool.get_ref())
    .await;

    Ok(match result {
        Ok(done) => {
            info!(site_id = done.last_insert_id(), "Site created");
            HttpResponse::Created().json(json!({ "id": done.last_insert_id(), "message": "Site created" }))
        }
        Err(e) => db_error(e),
    })
}

#[utoipa::path(
    get,
    path = "/api/sites",
    params(SiteQuery),
    responses(
        (status = 200, description = "Paginated site list", body = SiteListResponse),
        (status = 400, description = "Unknown status filter")
    ),
    tag = "Site",
    security(("bearer_auth" = []))
)]
pub async fn list_sites(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SiteQuery>,
) -> actix_web::Result<HttpResponse> {
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(status) = query.status {
        filters.push("status = ?", SqlValue::String(status.to_string()));
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM sites {where_clause}");
    let total = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count sites");
            ErrorInternalServerError("Database error")
        })?;

    let data_sql =
        format!("SELECT {SITE_COLUMNS} FROM sites {where_clause} ORDER BY name LIMIT ? OFFSET ?");
    let sites = bind_all!(sqlx::query_as::<_, ProjectSite>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch sites");
            ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(SiteListResponse {
        data: sites,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/sites/{site_id}",
    params(("site_id", Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site found", body = ProjectSite),
        (status = 404, description = "Site not found")
    ),
    tag = "Site",
    security(("bearer_auth" = []))
)]
pub async fn get_site(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    let site_id = path.into_inner();

    let site = sqlx::query_as::<_, ProjectSite>(&format!(
        "SELECT {SITE_COLUMNS} FROM sites WHERE id = ?"
    ))
    .bind(site_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, site_id, "Failed to fetch site");
        ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(match site {
        Some(site) => HttpResponse::Ok().json(site),
        None => HttpResponse::NotFound().json(json!({ "message": "Site not found" })),
    })
}

/// Partial update. Moving the geofence centre takes effect on the next
/// check-in or check-out.
#[utoipa::path(
    put,
    path = "/api/sites/{site_id}",
    params(("site_id", Path, description = "Site ID")),
    request_body(content = Object, example = json!({ "latitude": 23.81, "longitude": 90.41 })),
    responses(
        (status = 200, description = "Site updated"),
        (status = 400, description = "Unknown field, status or invalid coordinate"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Site not found")
    ),
    tag = "Site",
    security(("bearer_auth" = []))
)]
pub async fn update_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let site_id = path.into_inner();

    check_patch(&body)?;
    let update = build_update_sql("sites", &body, UPDATABLE, "id", site_id)?;

    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(n) => n,
        Err(e) => return Ok(db_error(e)),
    };

    if affected == 0 {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sites WHERE id = ?")
            .bind(site_id)
            .fetch_one(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, site_id, "Failed to check site");
                ErrorInternalServerError("Internal Server Error")
            })?;
        if exists == 0 {
            return Ok(HttpResponse::NotFound().json(json!({ "message": "Site not found" })));
        }
    }

    info!(site_id, "Site updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Site updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/sites/{site_id}",
    params(("site_id", Path, description = "Site ID")),
    responses(
        (status = 200, description = "Deleted; assigned employees become unrestricted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Site not found")
    ),
    tag = "Site",
    security(("bearer_auth" = []))
)]
pub async fn delete_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let site_id = path.into_inner();

    let result = sqlx::query("DELETE FROM sites WHERE id = ?")
        .bind(site_id)
        .execute(pool.get_ref())
        .await;

    Ok(match result {
        Ok(res) if res.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "message": "Site not found" }))
        }
        Ok(_) => {
            info!(site_id, "Site deleted");
            HttpResponse::Ok().json(json!({ "message": "Successfully deleted" }))
        }
        Err(e) => db_error(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_must_be_a_valid_pair() {
        assert!(check_reference(Some(23.8), Some(90.4)).is_ok());
        assert!(check_reference(None, None).is_ok());
        assert!(check_reference(Some(23.8), None).is_err());
        assert!(check_reference(Some(91.0), Some(0.0)).is_err());
        assert!(check_reference(Some(0.0), Some(-181.0)).is_err());
    }

    #[test]
    fn patches_move_or_clear_the_centre_as_a_pair() {
        assert!(check_patch(&json!({ "latitude": 1.0, "longitude": 2.0 })).is_ok());
        assert!(check_patch(&json!({ "latitude": null, "longitude": null })).is_ok());
        assert!(check_patch(&json!({ "latitude": 1.0 })).is_err());
        assert!(check_patch(&json!({ "latitude": 1.0, "longitude": null })).is_err());
        assert!(check_patch(&json!({ "latitude": "north", "longitude": 2.0 })).is_err());
        assert!(check_patch(&json!({ "latitude": 100.0, "longitude": 2.0 })).is_err());
    }

    #[test]
    fn status_must_be_known() {
        assert!(check_patch(&json!({ "status": "on-hold" })).is_ok());
        assert!(check_patch(&json!({ "status": "abandoned" })).is_err());
        assert!(check_patch(&json!({ "status": null })).is_err());
    }

    #[test]
    fn status_filter_must_be_known() {
        let query = web::Query::<SiteQuery>::from_query("status=on-hold").unwrap();
        assert_eq!(query.status, Some(SiteStatus::OnHold));
        assert!(web::Query::<SiteQuery>::from_query("status=paused").is_err());
    }
}
