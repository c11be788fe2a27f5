use chrono::NaiveDate;
use futures::lock::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, Weak};

type Key = (u64, NaiveDate);

/// One async mutex per `(employee_id, date)`, created on demand and dropped
/// once nobody holds it.
#[derive(Default)]
pub struct KeyedLocks {
    slots: std::sync::Mutex<HashMap<Key, Weak<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn slot(&self, employee_id: u64, date: NaiveDate) -> Arc<Mutex<()>> {
        let key = (employee_id, date);
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = slots.get(&key).and_then(Weak::upgrade) {
            return slot;
        }

        slots.retain(|_, slot| slot.strong_count() > 0);
        let slot = Arc::new(Mutex::new(()));
        slots.insert(key, Arc::downgrade(&slot));
        slot
    }

    #[cfg(test)]
    fn live(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn same_key_shares_a_slot() {
        let locks = KeyedLocks::default();
        let a = locks.slot(1, day(5));
        let b = locks.slot(1, day(5));
        let other_day = locks.slot(1, day(6));
        let other_employee = locks.slot(2, day(5));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other_day));
        assert!(!Arc::ptr_eq(&a, &other_employee));
    }

    #[test]
    fn idle_slots_are_reclaimed() {
        let locks = KeyedLocks::default();
        let held = locks.slot(1, day(5));
        drop(locks.slot(2, day(5)));
        drop(locks.slot(3, day(5)));
        assert_eq!(locks.live(), 1);

        let _fresh = locks.slot(4, day(5));
        assert_eq!(locks.slots.lock().unwrap().len(), 2);
        drop(held);
    }

    #[actix_web::test]
    async fn slot_excludes_concurrent_holders() {
        let locks = KeyedLocks::default();
        let slot = locks.slot(1, day(5));
        let guard = slot.lock().await;

        let same = locks.slot(1, day(5));
        assert!(same.try_lock().is_none());
        drop(guard);
        assert!(same.try_lock().is_some());
    }
}
