//! Check-in / check-out state machine for one employee on one day.
//!
//! `NoRecord -> CheckedIn -> CheckedOut`. The functions here are pure: they
//! look at what the store already holds and return the record to save, or the
//! reason the action is not allowed. Nothing is written on failure.

use crate::attendance::error::AttendanceError;
use crate::geo::Coordinate;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use chrono::{NaiveDate, NaiveTime};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    NoRecord,
    CheckedIn,
    CheckedOut,
}

/// What happens when someone checks in again after checking out the same day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SameDayPolicy {
    /// Every closed cycle may be followed by a new one.
    #[default]
    Multiple,
    /// One check-in/check-out cycle per day. Any record already on the day,
    /// administrative ones included, closes it.
    Single,
}

/// A check-in or check-out request that already passed the geofence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Punch {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub location: Coordinate,
    pub time: NaiveTime,
}

/// State of the day as seen from its latest record.
pub fn day_state(day: &[AttendanceRecord]) -> DayState {
    if day.iter().any(AttendanceRecord::is_open) {
        DayState::CheckedIn
    } else if day.iter().any(AttendanceRecord::is_closed) {
        DayState::CheckedOut
    } else {
        DayState::NoRecord
    }
}

/// Start a new cycle.
///
/// `day` is every record the employee has for `punch.date`.
pub fn check_in(
    punch: &Punch,
    day: &[AttendanceRecord],
    policy: SameDayPolicy,
) -> Result<AttendanceRecord, AttendanceError> {
    match (day_state(day), policy) {
        (DayState::CheckedIn, _) => return Err(AttendanceError::DuplicateCheckIn),
        (_, SameDayPolicy::Single) if !day.is_empty() => return Err(AttendanceError::DayClosed),
        _ => {}
    }

    Ok(AttendanceRecord {
        id: None,
        employee_id: punch.employee_id,
        date: punch.date,
        status: AttendanceStatus::Present,
        check_in: Some(punch.time),
        check_out: None,
        location: Some(punch.location),
        address: None,
    })
}

/// Close the open cycle. The check-out location replaces the check-in one.
pub fn check_out(
    punch: &Punch,
    open: Option<AttendanceRecord>,
) -> Result<AttendanceRecord, AttendanceError> {
    let mut record = open
        .filter(AttendanceRecord::is_open)
        .ok_or(AttendanceError::NoOpenCheckIn)?;

    record.check_out = Some(punch.time);
    record.location = Some(punch.location);
    // the address described the check-in spot
    record.address = None;
    Ok(record)
}

/// Administrative status change on the day's latest record, or a fresh one.
///
/// Present/late keep the existing check-in or stamp `now`; absent/leave wipe
/// both times; half-day leaves the times alone.
pub fn override_status(
    employee_id: u64,
    date: NaiveDate,
    latest: Option<AttendanceRecord>,
    status: AttendanceStatus,
    now: NaiveTime,
) -> AttendanceRecord {
    let mut record = latest.unwrap_or(AttendanceRecord {
        id: None,
        employee_id,
        date,
        status,
        check_in: None,
        check_out: None,
        location: None,
        address: None,
    });

    record.status = status;
    match status {
        AttendanceStatus::Present | AttendanceStatus::Late => {
            record.check_in = record.check_in.or(Some(now));
        }
        AttendanceStatus::Absent | AttendanceStatus::Leave => {
            record.check_in = None;
            record.check_out = None;
        }
        AttendanceStatus::HalfDay => {}
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn punch(at: NaiveTime) -> Punch {
        Punch {
            employee_id: 1,
            date: date(),
            location: Coordinate::new(0.0, 0.0).unwrap(),
            time: at,
        }
    }

    fn saved(mut record: AttendanceRecord, id: u64) -> AttendanceRecord {
        record.id = Some(id);
        record
    }

    #[test]
    fn first_check_in_opens_a_present_record() {
        let record = check_in(&punch(time(8, 0)), &[], SameDayPolicy::Multiple).unwrap();

        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.check_in, Some(time(8, 0)));
        assert_eq!(record.check_out, None);
        assert_eq!(record.location, Some(Coordinate::new(0.0, 0.0).unwrap()));
        assert!(record.is_open());
        assert_eq!(day_state(&[record]), DayState::CheckedIn);
    }

    #[test]
    fn second_check_in_while_open_is_rejected() {
        let open = saved(check_in(&punch(time(8, 0)), &[], SameDayPolicy::Multiple).unwrap(), 1);

        for policy in [SameDayPolicy::Multiple, SameDayPolicy::Single] {
            let err = check_in(&punch(time(9, 0)), std::slice::from_ref(&open), policy).unwrap_err();
            assert!(matches!(err, AttendanceError::DuplicateCheckIn));
        }
    }

    #[test]
    fn check_out_closes_and_moves_location() {
        let open = saved(check_in(&punch(time(8, 0)), &[], SameDayPolicy::Multiple).unwrap(), 1);
        let mut out = punch(time(17, 0));
        out.location = Coordinate::new(0.0, 0.002).unwrap();

        let closed = check_out(&out, Some(open)).unwrap();
        assert_eq!(closed.id, Some(1));
        assert_eq!(closed.check_in, Some(time(8, 0)));
        assert_eq!(closed.check_out, Some(time(17, 0)));
        assert_eq!(closed.location, Some(out.location));
        assert_eq!(day_state(&[closed.clone()]), DayState::CheckedOut);

        // a closed record handed back in is not an open check-in
        let err = check_out(&punch(time(18, 0)), Some(closed)).unwrap_err();
        assert!(matches!(err, AttendanceError::NoOpenCheckIn));
    }

    #[test]
    fn single_policy_stays_closed_after_absent_override() {
        let open = saved(check_in(&punch(time(8, 0)), &[], SameDayPolicy::Single).unwrap(), 1);
        let closed = check_out(&punch(time(12, 0)), Some(open)).unwrap();
        let absent = override_status(1, date(), Some(closed), AttendanceStatus::Absent, time(13, 0));
        assert_eq!(day_state(std::slice::from_ref(&absent)), DayState::NoRecord);

        let err = check_in(&punch(time(14, 0)), std::slice::from_ref(&absent), SameDayPolicy::Single)
            .unwrap_err();
        assert!(matches!(err, AttendanceError::DayClosed));

        // an admin-created leave day is closed too
        let leave = saved(override_status(1, date(), None, AttendanceStatus::Leave, time(7, 0)), 2);
        let err = check_in(&punch(time(8, 0)), &[leave.clone()], SameDayPolicy::Single).unwrap_err();
        assert!(matches!(err, AttendanceError::DayClosed));

        assert!(check_in(&punch(time(14, 0)), &[absent, leave], SameDayPolicy::Multiple).is_ok());
    }

    #[test]
    fn check_out_without_check_in_is_rejected() {
        let err = check_out(&punch(time(17, 0)), None).unwrap_err();
        assert!(matches!(err, AttendanceError::NoOpenCheckIn));
    }

    #[test]
    fn same_day_policy_governs_a_second_cycle() {
        let open = saved(check_in(&punch(time(8, 0)), &[], SameDayPolicy::Multiple).unwrap(), 1);
        let closed = check_out(&punch(time(12, 0)), Some(open)).unwrap();
        let day = [closed];

        let again = check_in(&punch(time(13, 0)), &day, SameDayPolicy::Multiple).unwrap();
        assert_eq!(again.id, None);
        assert_eq!(again.check_in, Some(time(13, 0)));

        let err = check_in(&punch(time(13, 0)), &day, SameDayPolicy::Single).unwrap_err();
        assert!(matches!(err, AttendanceError::DayClosed));
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!("multiple".parse::<SameDayPolicy>().unwrap(), SameDayPolicy::Multiple);
        assert_eq!("single".parse::<SameDayPolicy>().unwrap(), SameDayPolicy::Single);
        assert!("twice".parse::<SameDayPolicy>().is_err());
    }

    #[test]
    fn override_to_present_or_late_keeps_or_stamps_check_in() {
        let fresh = override_status(1, date(), None, AttendanceStatus::Late, time(8, 32));
        assert_eq!(fresh.status, AttendanceStatus::Late);
        assert_eq!(fresh.check_in, Some(time(8, 32)));
        assert_eq!(fresh.id, None);

        let existing = saved(check_in(&punch(time(8, 2)), &[], SameDayPolicy::Multiple).unwrap(), 3);
        let present = override_status(1, date(), Some(existing), AttendanceStatus::Present, time(10, 0));
        assert_eq!(present.id, Some(3));
        assert_eq!(present.check_in, Some(time(8, 2)));
    }

    #[test]
    fn override_to_absent_or_leave_clears_times() {
        let open = saved(check_in(&punch(time(8, 0)), &[], SameDayPolicy::Multiple).unwrap(), 1);
        let closed = check_out(&punch(time(17, 0)), Some(open)).unwrap();

        for status in [AttendanceStatus::Absent, AttendanceStatus::Leave] {
            let record = override_status(1, date(), Some(closed.clone()), status, time(18, 0));
            assert_eq!(record.status, status);
            assert_eq!(record.check_in, None);
            assert_eq!(record.check_out, None);
        }
    }

    #[test]
    fn override_to_half_day_keeps_times() {
        let open = saved(check_in(&punch(time(8, 5)), &[], SameDayPolicy::Multiple).unwrap(), 1);
        let closed = check_out(&punch(time(12, 30)), Some(open)).unwrap();

        let record = override_status(1, date(), Some(closed), AttendanceStatus::HalfDay, time(18, 0));
        assert_eq!(record.status, AttendanceStatus::HalfDay);
        assert_eq!(record.check_in, Some(time(8, 5)));
        assert_eq!(record.check_out, Some(time(12, 30)));
    }
}
