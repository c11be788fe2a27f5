use crate::attendance::error::AttendanceError;
use crate::attendance::store::{AttendanceStore, EmployeeDirectory};
use crate::geo::Site;
use crate::model::attendance::AttendanceRecord;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process store with the same open-record guarantee as the MySQL schema.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AttendanceRecord>>,
    /// employee id -> assigned site (`None` = unassigned)
    employees: HashMap<u64, Option<Site>>,
}

impl MemoryStore {
    pub fn with_employee(mut self, employee_id: u64, site: Option<Site>) -> Self {
        self.employees.insert(employee_id, site);
        self
    }

    pub fn all(&self) -> Vec<AttendanceRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AttendanceStore for MemoryStore {
    async fn open_record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        Ok(self
            .day_records(employee_id, date)
            .await?
            .into_iter()
            .rev()
            .find(AttendanceRecord::is_open))
    }

    async fn day_records(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.employee_id == employee_id && r.date == date)
            .cloned()
            .collect())
    }

    async fn record(&self, id: u64) -> Result<Option<AttendanceRecord>, AttendanceError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == Some(id))
            .cloned())
    }

    async fn save(&self, mut record: AttendanceRecord) -> Result<AttendanceRecord, AttendanceError> {
        let mut records = self.records.lock().unwrap();

        let clashes = records.iter().any(|r| {
            r.id != record.id
                && r.employee_id == record.employee_id
                && r.date == record.date
                && r.is_open()
                && record.is_open()
        });
        if clashes {
            return Err(AttendanceError::DuplicateCheckIn);
        }

        match record.id {
            Some(id) => {
                let slot = records
                    .iter_mut()
                    .find(|r| r.id == Some(id))
                    .ok_or(AttendanceError::RecordNotFound(id))?;
                *slot = record.clone();
            }
            None => {
                record.id = Some(records.len() as u64 + 1);
                records.push(record.clone());
            }
        }

        Ok(record)
    }

    async fn set_address(&self, id: u64, address: &str) -> Result<bool, AttendanceError> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == Some(id)) {
            Some(record) => {
                record.address = Some(address.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl EmployeeDirectory for MemoryStore {
    async fn employee_site(&self, employee_id: u64) -> Result<Site, AttendanceError> {
        match self.employees.get(&employee_id) {
            Some(Some(site)) => Ok(site.clone()),
            Some(None) => Ok(Site::unrestricted()),
            None => Err(AttendanceError::EmployeeNotFound(employee_id)),
        }
    }
}
