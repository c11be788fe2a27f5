use crate::{
    attendance::{
        Attendance,
        error::AttendanceError,
        store::AttendanceStore,
        store::mysql::{AttendanceRow, RECORD_COLUMNS},
    },
    auth::auth::AuthUser,
    config::Config,
    geo::Coordinate,
    geo::geocode::Geocoder,
    geo::location::{LocationReport, ReportedLocation, acquire},
    model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary},
    utils::db_utils::{Filters, SqlValue, bind_all, paging},
};
use actix_web::{
    HttpResponse,
    error::{ErrorBadRequest, ErrorForbidden, ErrorInternalServerError},
    web,
};
use chrono::{Local, NaiveDate, NaiveTime, Timelike, Utc};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, error, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct PunchRequest {
    pub location: LocationReport,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusOverride {
    #[schema(example = 7)]
    pub employee_id: u64,
    /// Defaults to today
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct AddressOverride {
    #[schema(example = "Gate 3, Harbor Bridge site")]
    pub address: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    pub employee_id: Option<u64>,
    /// Exact day
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Local wall-clock date and time, to the second.
fn local_now() -> (NaiveDate, NaiveTime) {
    let now = Local::now().naive_local();
    let time = now.time().with_nanosecond(0).unwrap_or(now.time());
    (now.date(), time)
}

/// Validate the reported location and run it through the fix bounds.
async fn resolve_location(
    report: &LocationReport,
    config: &Config,
) -> Result<Coordinate, AttendanceError> {
    let received_at = Utc::now();
    let provider = ReportedLocation::from_report(report, received_at)?;
    let fix = acquire(&provider, &config.fix_options(), received_at).await?;
    Ok(fix.coordinate)
}

/// Annotate a saved record with a human-readable address. Failures are
/// logged and the record is returned as saved, as it is when a concurrent
/// punch moved the record before the lookup finished.
async fn annotate(
    service: &Attendance,
    geocoder: &Geocoder,
    record: AttendanceRecord,
) -> AttendanceRecord {
    let (Some(id), Some(location)) = (record.id, record.location) else {
        return record;
    };

    let address = geocoder.reverse(location).await;
    match service.annotate_address(id, location, &address).await {
        Ok(Some(updated)) => updated,
        Ok(None) => record,
        Err(e) => {
            warn!(record_id = id, error = %e, "Failed to store geocoded address");
            record
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = PunchRequest,
    responses(
        (status = 201, description = "Checked in", body = AttendanceRecord),
        (status = 400, description = "Invalid coordinate"),
        (status = 403, description = "Outside the site geofence, or no employee profile"),
        (status = 409, description = "Already checked in, or day closed"),
        (status = 422, description = "Location unavailable, denied or timed out")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    config: web::Data<Config>,
    service: web::Data<Attendance>,
    geocoder: web::Data<Geocoder>,
    body: web::Json<PunchRequest>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let location = resolve_location(&body.location, &config).await?;
    let (date, time) = local_now();

    let record = service
        .request_check_in(employee_id, date, location, time)
        .await?;
    let record = annotate(&service, &geocoder, record).await;

    Ok(HttpResponse::Created().json(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = PunchRequest,
    responses(
        (status = 200, description = "Checked out", body = AttendanceRecord),
        (status = 400, description = "Invalid coordinate"),
        (status = 403, description = "Outside the site geofence, or no employee profile"),
        (status = 409, description = "No open check-in today"),
        (status = 422, description = "Location unavailable, denied or timed out")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    config: web::Data<Config>,
    service: web::Data<Attendance>,
    geocoder: web::Data<Geocoder>,
    body: web::Json<PunchRequest>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let location = resolve_location(&body.location, &config).await?;
    let (date, time) = local_now();

    let record = service
        .request_check_out(employee_id, date, location, time)
        .await?;
    let record = annotate(&service, &geocoder, record).await;

    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance history, newest first", body = AttendanceListResponse),
        (status = 403, description = "Employees may only view their own records")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = match (auth.is_admin(), query.employee_id) {
        (true, requested) => requested,
        (false, Some(requested)) if !auth.can_view_employee(requested) => {
            return Err(ErrorForbidden("Employees may only view their own attendance"));
        }
        (false, _) => Some(auth.require_employee()?),
    };

    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(id) = employee_id {
        filters.push("employee_id = ?", SqlValue::U64(id));
    }
    if let Some(date) = query.date {
        filters.push("date = ?", SqlValue::Date(date));
    }
    if let Some(from) = query.from {
        filters.push("date >= ?", SqlValue::Date(from));
    }
    if let Some(to) = query.to {
        filters.push("date <= ?", SqlValue::Date(to));
    }
    if let Some(status) = &query.status {
        let status = AttendanceStatus::from_str(status)
            .map_err(|_| ErrorBadRequest(format!("Unknown attendance status '{status}'")))?;
        filters.push("status = ?", SqlValue::String(status.to_string()));
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM attendance {where_clause}");
    let total = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count attendance");
            ErrorInternalServerError("Database error")
        })?;

    let data_sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance {where_clause} \
         ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page, per_page, "Fetching attendance");

    let rows = bind_all!(sqlx::query_as::<_, AttendanceRow>(&data_sql), filters.values)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch attendance");
            ErrorInternalServerError("Database error")
        })?;

    let data = rows
        .into_iter()
        .map(AttendanceRecord::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AttendanceError::from)?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Tally one status per employee: their latest record of the day.
fn tally(
    date: NaiveDate,
    latest: impl IntoIterator<Item = (u64, AttendanceStatus)>,
) -> AttendanceSummary {
    let per_employee: HashMap<u64, AttendanceStatus> = latest.into_iter().collect();

    let mut summary = AttendanceSummary::new(date);
    for status in per_employee.into_values() {
        summary.count(status);
    }
    summary
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    employee_id: u64,
    status: String,
}

#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Per-status head count for the day", body = AttendanceSummary),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;
    let date = query.date.unwrap_or_else(|| local_now().0);

    let mut rows = sqlx::query_as::<_, StatusRow>(
        "SELECT employee_id, status FROM attendance WHERE date = ? ORDER BY employee_id, id",
    )
    .bind(date)
    .fetch(pool.get_ref());

    // rows are in id order, so later entries replace earlier ones per employee
    let mut latest = Vec::new();
    while let Some(row) = rows.try_next().await.map_err(AttendanceError::from)? {
        match AttendanceStatus::from_str(&row.status) {
            Ok(status) => latest.push((row.employee_id, status)),
            Err(_) => warn!(employee_id = row.employee_id, status = %row.status, "Skipping unknown status"),
        }
    }

    Ok(HttpResponse::Ok().json(tally(date, latest)))
}

#[utoipa::path(
    put,
    path = "/api/attendance/status",
    request_body = StatusOverride,
    responses(
        (status = 200, description = "Status set on the day's latest record", body = AttendanceRecord),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Would open a second record for the day")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn override_status(
    auth: AuthUser,
    service: web::Data<Attendance>,
    body: web::Json<StatusOverride>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let (today, now) = local_now();
    let record = service
        .override_status(body.employee_id, body.date.unwrap_or(today), body.status, now)
        .await?;

    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    put,
    path = "/api/attendance/{record_id}/address",
    params(("record_id", Path, description = "Attendance record ID")),
    request_body = AddressOverride,
    responses(
        (status = 200, description = "Address replaced", body = AttendanceRecord),
        (status = 400, description = "Empty address"),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_address(
    auth: AuthUser,
    service: web::Data<Attendance>,
    path: web::Path<u64>,
    body: web::Json<AddressOverride>,
) -> actix_web::Result<HttpResponse> {
    let record_id = path.into_inner();
    let address = body.address.trim();
    if address.is_empty() {
        return Err(ErrorBadRequest("address must not be empty"));
    }

    let record = service
        .store()
        .record(record_id)
        .await?
        .ok_or(AttendanceError::RecordNotFound(record_id))?;

    if !auth.can_view_employee(record.employee_id) {
        return Err(ErrorForbidden("Not your attendance record"));
    }

    let record = service.set_address(record_id, address).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn summary_counts_latest_status_per_employee() {
        let summary = tally(
            d1(),
            [
                (1, AttendanceStatus::Present),
                (2, AttendanceStatus::Late),
                (1, AttendanceStatus::HalfDay),
                (3, AttendanceStatus::Absent),
            ],
        );

        assert_eq!(summary.total, 3);
        assert_eq!(summary.present, 0);
        assert_eq!(summary.half_day, 1);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 1);
    }

    #[test]
    fn empty_day_has_zero_counts() {
        assert_eq!(tally(d1(), []), AttendanceSummary::new(d1()));
    }

    #[test]
    fn local_time_has_no_subseconds() {
        assert_eq!(local_now().1.nanosecond(), 0);
    }
}
