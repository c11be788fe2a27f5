use crate::attendance::error::AttendanceError;
use crate::attendance::store::{AttendanceStore, EmployeeDirectory};
use crate::geo::{Coordinate, Site};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use chrono::{NaiveDate, NaiveTime};
use sqlx::{FromRow, MySqlPool};
use std::str::FromStr;
use tracing::debug;

pub const RECORD_COLUMNS: &str =
    "id, employee_id, date, status, check_in, check_out, latitude, longitude, address";

/// Raw `attendance` row. Converted (and validated) into an
/// [`AttendanceRecord`] before it leaves the store.
#[derive(Debug, FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub status: String,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = sqlx::Error;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::from_str(&row.status)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(AttendanceRecord {
            id: Some(row.id),
            employee_id: row.employee_id,
            date: row.date,
            status,
            check_in: row.check_in,
            check_out: row.check_out,
            location: stored_coordinate(row.latitude, row.longitude)?,
            address: row.address,
        })
    }
}

/// Latitude/longitude column pair. Both or neither must be set.
pub fn stored_coordinate(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<Coordinate>, sqlx::Error> {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => Coordinate::new(lat, lng)
            .map(Some)
            .map_err(|e| sqlx::Error::Decode(Box::new(e))),
        (None, None) => Ok(None),
        _ => Err(sqlx::Error::Decode(
            "latitude and longitude must be set together".into(),
        )),
    }
}

fn into_records(rows: Vec<AttendanceRow>) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    rows.into_iter()
        .map(|row| AttendanceRecord::try_from(row).map_err(AttendanceError::from))
        .collect()
}

fn duplicate_or(e: sqlx::Error) -> AttendanceError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AttendanceError::DuplicateCheckIn;
        }
    }
    AttendanceError::Storage(e)
}

#[derive(Debug, FromRow)]
struct EmployeeSiteRow {
    site_id: Option<u64>,
    site_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl AttendanceStore for MySqlStore {
    async fn open_record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance \
             WHERE employee_id = ? AND date = ? AND check_in IS NOT NULL AND check_out IS NULL \
             ORDER BY id DESC LIMIT 1"
        );

        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AttendanceRecord::try_from).transpose()?)
    }

    async fn day_records(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ? ORDER BY id"
        );

        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        into_records(rows)
    }

    async fn record(&self, id: u64) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE id = ?");

        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AttendanceRecord::try_from).transpose()?)
    }

    async fn save(&self, mut record: AttendanceRecord) -> Result<AttendanceRecord, AttendanceError> {
        let latitude = record.location.map(|c| c.latitude());
        let longitude = record.location.map(|c| c.longitude());

        match record.id {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO attendance
                        (employee_id, date, status, check_in, check_out, latitude, longitude, address)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(record.employee_id)
                .bind(record.date)
                .bind(record.status.as_ref())
                .bind(record.check_in)
                .bind(record.check_out)
                .bind(latitude)
                .bind(longitude)
                .bind(&record.address)
                .execute(&self.pool)
                .await
                .map_err(duplicate_or)?;

                record.id = Some(result.last_insert_id());
                debug!(id = result.last_insert_id(), employee_id = record.employee_id, "Attendance inserted");
            }
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE attendance
                    SET status = ?, check_in = ?, check_out = ?, latitude = ?, longitude = ?, address = ?
                    WHERE id = ?
                    "#,
                )
                .bind(record.status.as_ref())
                .bind(record.check_in)
                .bind(record.check_out)
                .bind(latitude)
                .bind(longitude)
                .bind(&record.address)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(duplicate_or)?;

                debug!(id, employee_id = record.employee_id, "Attendance updated");
            }
        }

        Ok(record)
    }

    async fn set_address(&self, id: u64, address: &str) -> Result<bool, AttendanceError> {
        // affected rows are zero when the address is unchanged, so look first
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if found == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE attendance SET address = ? WHERE id = ?")
            .bind(address)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }
}

impl EmployeeDirectory for MySqlStore {
    async fn employee_site(&self, employee_id: u64) -> Result<Site, AttendanceError> {
        let row = sqlx::query_as::<_, EmployeeSiteRow>(
            r#"
            SELECT s.id AS site_id, s.name AS site_name, s.latitude, s.longitude
            FROM employees e
            LEFT JOIN sites s ON s.id = e.site_id
            WHERE e.id = ?
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AttendanceError::EmployeeNotFound(employee_id))?;

        let Some(site_id) = row.site_id else {
            return Ok(Site::unrestricted());
        };

        Ok(Site {
            id: Some(site_id),
            name: row.site_name.unwrap_or_default(),
            reference: stored_coordinate(row.latitude, row.longitude)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, latitude: Option<f64>, longitude: Option<f64>) -> AttendanceRow {
        AttendanceRow {
            id: 10,
            employee_id: 7,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            status: status.to_string(),
            check_in: NaiveTime::from_hms_opt(8, 0, 0),
            check_out: None,
            latitude,
            longitude,
            address: None,
        }
    }

    #[test]
    fn valid_row_converts() {
        let record = AttendanceRecord::try_from(row("half-day", Some(1.0), Some(2.0))).unwrap();
        assert_eq!(record.id, Some(10));
        assert_eq!(record.status, AttendanceStatus::HalfDay);
        assert_eq!(record.location, Some(Coordinate::new(1.0, 2.0).unwrap()));
        assert!(record.is_open());
    }

    #[test]
    fn bad_rows_are_rejected_at_the_boundary() {
        assert!(AttendanceRecord::try_from(row("sleeping", None, None)).is_err());
        assert!(AttendanceRecord::try_from(row("present", Some(95.0), Some(0.0))).is_err());
        assert!(AttendanceRecord::try_from(row("present", Some(1.0), None)).is_err());
    }

    #[test]
    fn coordinate_columns_must_pair_up() {
        assert_eq!(stored_coordinate(None, None).unwrap(), None);
        assert!(stored_coordinate(None, Some(1.0)).is_err());
        assert!(stored_coordinate(Some(1.0), Some(1.0)).unwrap().is_some());
    }
}
