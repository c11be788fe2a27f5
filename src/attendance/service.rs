use crate::attendance::engine::{self, Punch, SameDayPolicy};
use crate::attendance::error::AttendanceError;
use crate::attendance::locks::KeyedLocks;
use crate::attendance::store::{AttendanceStore, EmployeeDirectory};
use crate::geo::{Coordinate, GeofencePolicy};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};

/// Geofenced check-in / check-out over a store.
///
/// Each read-decide-write runs under the `(employee_id, date)` lock, so two
/// concurrent check-ins in this process cannot both see an empty day.
pub struct AttendanceService<S> {
    store: S,
    geofence: GeofencePolicy,
    same_day: SameDayPolicy,
    locks: KeyedLocks,
}

impl<S> AttendanceService<S>
where
    S: AttendanceStore + EmployeeDirectory,
{
    pub fn new(store: S, geofence: GeofencePolicy, same_day: SameDayPolicy) -> Self {
        Self {
            store,
            geofence,
            same_day,
            locks: KeyedLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(name = "check_in", skip(self))]
    pub async fn request_check_in(
        &self,
        employee_id: u64,
        date: NaiveDate,
        location: Coordinate,
        time: NaiveTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let punch = self.admit(employee_id, date, location, time).await?;

        let slot = self.locks.slot(employee_id, date);
        let _guard = slot.lock().await;

        let day = self.store.day_records(employee_id, date).await?;
        let record = engine::check_in(&punch, &day, self.same_day)?;
        let record = self.store.save(record).await?;

        info!(record_id = ?record.id, "Checked in");
        Ok(record)
    }

    #[instrument(name = "check_out", skip(self))]
    pub async fn request_check_out(
        &self,
        employee_id: u64,
        date: NaiveDate,
        location: Coordinate,
        time: NaiveTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let punch = self.admit(employee_id, date, location, time).await?;

        let slot = self.locks.slot(employee_id, date);
        let _guard = slot.lock().await;

        let open = self.store.open_record(employee_id, date).await?;
        let record = engine::check_out(&punch, open)?;
        let record = self.store.save(record).await?;

        info!(record_id = ?record.id, "Checked out");
        Ok(record)
    }

    /// Administrative status change for the employee's latest record that day.
    #[instrument(name = "override_status", skip(self))]
    pub async fn override_status(
        &self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        now: NaiveTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        // resolves or fails with EmployeeNotFound
        self.store.employee_site(employee_id).await?;

        let slot = self.locks.slot(employee_id, date);
        let _guard = slot.lock().await;

        let latest = self.store.day_records(employee_id, date).await?.pop();
        let record = engine::override_status(employee_id, date, latest, status, now);
        let record = self.store.save(record).await?;

        info!(record_id = ?record.id, %status, "Attendance status overridden");
        Ok(record)
    }

    pub async fn set_address(
        &self,
        record_id: u64,
        address: &str,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if !self.store.set_address(record_id, address).await? {
            return Err(AttendanceError::RecordNotFound(record_id));
        }

        self.store
            .record(record_id)
            .await?
            .ok_or(AttendanceError::RecordNotFound(record_id))
    }

    /// Store a geocoded address for the fix at `location`. Runs under the
    /// record's day lock and returns `None` without writing when the record is
    /// gone or a later punch already moved it elsewhere.
    #[instrument(name = "annotate_address", skip(self, address))]
    pub async fn annotate_address(
        &self,
        record_id: u64,
        location: Coordinate,
        address: &str,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let Some(seen) = self.store.record(record_id).await? else {
            return Ok(None);
        };

        let slot = self.locks.slot(seen.employee_id, seen.date);
        let _guard = slot.lock().await;

        match self.store.record(record_id).await? {
            Some(current) if current.location == Some(location) => {}
            _ => {
                debug!(record_id, "Location changed before the address arrived");
                return Ok(None);
            }
        }

        if !self.store.set_address(record_id, address).await? {
            return Ok(None);
        }
        self.store.record(record_id).await
    }

    /// Resolve the employee's site and apply the geofence. Nothing is locked
    /// or written yet.
    async fn admit(
        &self,
        employee_id: u64,
        date: NaiveDate,
        location: Coordinate,
        time: NaiveTime,
    ) -> Result<Punch, AttendanceError> {
        let site = self.store.employee_site(employee_id).await?;

        if let Err(e) = self.geofence.check(location, &site) {
            warn!(
                employee_id,
                site = %site.name,
                distance_km = e.distance_km,
                radius_km = e.radius_km,
                "Attendance outside geofence"
            );
            return Err(e.into());
        }

        Ok(Punch {
            employee_id,
            date,
            location,
            time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::store::memory::MemoryStore;
    use crate::geo::Site;

    const E1: u64 = 1;
    const E2: u64 = 2;
    const UNASSIGNED: u64 = 3;

    fn d1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn site() -> Site {
        Site {
            id: Some(1),
            name: "Harbor Bridge".to_string(),
            reference: Some(coord(0.0, 0.0)),
        }
    }

    fn service(same_day: SameDayPolicy) -> AttendanceService<MemoryStore> {
        let store = MemoryStore::default()
            .with_employee(E1, Some(site()))
            .with_employee(E2, Some(site()))
            .with_employee(UNASSIGNED, None);
        AttendanceService::new(store, GeofencePolicy::default(), same_day)
    }

    #[actix_web::test]
    async fn full_day_cycle() {
        let svc = service(SameDayPolicy::Multiple);
        let loc = coord(0.0, 0.001);

        let record = svc.request_check_in(E1, d1(), loc, at(8, 0)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.check_in, Some(at(8, 0)));
        assert_eq!(record.check_out, None);

        let err = svc.request_check_in(E1, d1(), loc, at(9, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::DuplicateCheckIn));

        let record = svc.request_check_out(E1, d1(), loc, at(17, 0)).await.unwrap();
        assert_eq!(record.check_out, Some(at(17, 0)));

        let err = svc.request_check_out(E1, d1(), loc, at(18, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoOpenCheckIn));

        assert_eq!(svc.store().all().len(), 1);
    }

    #[actix_web::test]
    async fn check_out_without_check_in() {
        let svc = service(SameDayPolicy::Multiple);
        let err = svc
            .request_check_out(E2, d1(), coord(0.0, 0.0), at(17, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::NoOpenCheckIn));
    }

    #[actix_web::test]
    async fn outside_geofence_writes_nothing() {
        let svc = service(SameDayPolicy::Multiple);

        let err = svc
            .request_check_in(E1, d1(), coord(0.0, 0.01), at(8, 0))
            .await
            .unwrap_err();
        match err {
            AttendanceError::OutsideGeofence(e) => {
                assert!(e.distance_km > e.radius_km);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(svc.store().all().is_empty());

        // a far-away check-out must not close the open record either
        svc.request_check_in(E1, d1(), coord(0.0, 0.0), at(8, 0)).await.unwrap();
        let err = svc
            .request_check_out(E1, d1(), coord(1.0, 1.0), at(17, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::OutsideGeofence(_)));
        assert!(svc.store().all()[0].is_open());
    }

    #[actix_web::test]
    async fn unknown_employee_is_rejected() {
        let svc = service(SameDayPolicy::Multiple);
        let err = svc
            .request_check_in(99, d1(), coord(0.0, 0.0), at(8, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::EmployeeNotFound(99)));

        let err = svc
            .override_status(99, d1(), AttendanceStatus::Absent, at(8, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::EmployeeNotFound(99)));
    }

    #[actix_web::test]
    async fn unassigned_employee_is_not_geofenced() {
        let svc = service(SameDayPolicy::Multiple);
        let record = svc
            .request_check_in(UNASSIGNED, d1(), coord(45.0, 45.0), at(8, 0))
            .await
            .unwrap();
        assert!(record.is_open());
    }

    #[actix_web::test]
    async fn second_cycle_follows_same_day_policy() {
        let loc = coord(0.0, 0.0);

        let svc = service(SameDayPolicy::Multiple);
        svc.request_check_in(E1, d1(), loc, at(8, 0)).await.unwrap();
        svc.request_check_out(E1, d1(), loc, at(12, 0)).await.unwrap();
        let second = svc.request_check_in(E1, d1(), loc, at(13, 0)).await.unwrap();
        assert_ne!(second.id, Some(1));
        assert_eq!(svc.store().all().len(), 2);

        let svc = service(SameDayPolicy::Single);
        svc.request_check_in(E1, d1(), loc, at(8, 0)).await.unwrap();
        svc.request_check_out(E1, d1(), loc, at(12, 0)).await.unwrap();
        let err = svc.request_check_in(E1, d1(), loc, at(13, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::DayClosed));
    }

    #[actix_web::test]
    async fn concurrent_check_ins_open_one_record() {
        let svc = service(SameDayPolicy::Multiple);
        let loc = coord(0.0, 0.0);

        let results = futures::future::join_all(
            (0..8).map(|_| svc.request_check_in(E1, d1(), loc, at(8, 0))),
        )
        .await;

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(AttendanceError::DuplicateCheckIn)))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(svc.store().all().len(), 1);
    }

    #[actix_web::test]
    async fn override_creates_or_updates_latest_record() {
        let svc = service(SameDayPolicy::Multiple);

        let late = svc
            .override_status(E2, d1(), AttendanceStatus::Late, at(8, 32))
            .await
            .unwrap();
        assert_eq!(late.check_in, Some(at(8, 32)));

        let leave = svc
            .override_status(E2, d1(), AttendanceStatus::Leave, at(9, 0))
            .await
            .unwrap();
        assert_eq!(leave.id, late.id);
        assert_eq!(leave.check_in, None);
        assert_eq!(svc.store().all().len(), 1);
    }

    #[actix_web::test]
    async fn address_override() {
        let svc = service(SameDayPolicy::Multiple);
        let record = svc
            .request_check_in(E1, d1(), coord(0.0, 0.0), at(8, 0))
            .await
            .unwrap();
        let id = record.id.unwrap();

        let updated = svc.set_address(id, "Pier 12, Harbor District").await.unwrap();
        assert_eq!(updated.address.as_deref(), Some("Pier 12, Harbor District"));

        let err = svc.set_address(404, "nowhere").await.unwrap_err();
        assert!(matches!(err, AttendanceError::RecordNotFound(404)));
    }

    #[actix_web::test]
    async fn late_address_does_not_overwrite_a_moved_record() {
        let svc = service(SameDayPolicy::Multiple);
        let entry = coord(0.0, 0.0);
        let exit = coord(0.0, 0.002);

        let opened = svc.request_check_in(E1, d1(), entry, at(8, 0)).await.unwrap();
        let id = opened.id.unwrap();
        svc.request_check_out(E1, d1(), exit, at(17, 0)).await.unwrap();

        // the check-in lookup finishes after check-out already moved the record
        let stale = svc.annotate_address(id, entry, "Gate A").await.unwrap();
        assert!(stale.is_none());
        assert_eq!(svc.store().all()[0].address, None);
        assert_eq!(svc.store().all()[0].location, Some(exit));

        let fresh = svc.annotate_address(id, exit, "Gate B").await.unwrap().unwrap();
        assert_eq!(fresh.address.as_deref(), Some("Gate B"));

        assert!(svc.annotate_address(404, exit, "nowhere").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn single_policy_day_stays_closed_after_absent_override() {
        let svc = service(SameDayPolicy::Single);
        let loc = coord(0.0, 0.0);

        svc.request_check_in(E1, d1(), loc, at(8, 0)).await.unwrap();
        svc.request_check_out(E1, d1(), loc, at(12, 0)).await.unwrap();
        svc.override_status(E1, d1(), AttendanceStatus::Absent, at(13, 0))
            .await
            .unwrap();

        let err = svc.request_check_in(E1, d1(), loc, at(14, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::DayClosed));
        assert_eq!(svc.store().all().len(), 1);
    }
}
