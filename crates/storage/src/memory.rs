//! In-memory storage backend.

use std::collections::HashMap;

use async_trait::async_trait;
use crewline_core::{
    Assignment, AssignmentId, AttendanceRecord, BookingEntry, BookingEntryId, BookingFilter,
    Property, PropertyId, WorkUnit, WorkUnitFilter, WorkUnitId, WorkUnitPatch,
};
use tokio::sync::RwLock;

use super::{Result, Storage, StorageError};

#[derive(Default)]
struct Tables {
    properties: HashMap<PropertyId, Property>,
    bookings: HashMap<BookingEntryId, BookingEntry>,
    work_units: HashMap<WorkUnitId, WorkUnit>,
    assignments: Vec<Assignment>,
    attendance: Vec<AttendanceRecord>,
}

/// Storage held entirely in memory. Used by tests and short-lived tools.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_property(&self, property: &Property) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.properties.insert(property.id.clone(), property.clone());
        Ok(())
    }

    async fn load_property(&self, id: &PropertyId) -> Result<Option<Property>> {
        Ok(self.tables.read().await.properties.get(id).cloned())
    }

    async fn insert_booking(&self, entry: &BookingEntry) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.bookings.contains_key(&entry.id) {
            return Err(StorageError::Conflict(format!("booking {}", entry.id)));
        }
        tables.bookings.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn save_booking(&self, entry: &BookingEntry) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.bookings.get_mut(&entry.id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("booking {}", entry.id))),
        }
    }

    async fn load_booking(&self, id: BookingEntryId) -> Result<Option<BookingEntry>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<BookingEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<_> = tables
            .bookings
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| (a.stay_start, a.id).cmp(&(b.stay_start, b.id)));
        Ok(entries)
    }

    async fn delete_booking(&self, id: BookingEntryId) -> Result<()> {
        self.tables.write().await.bookings.remove(&id);
        Ok(())
    }

    async fn insert_work_unit(&self, unit: &WorkUnit) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.work_units.contains_key(&unit.id) {
            return Err(StorageError::Conflict(format!("work unit {}", unit.id)));
        }
        tables.work_units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn load_work_unit(&self, id: WorkUnitId) -> Result<Option<WorkUnit>> {
        Ok(self.tables.read().await.work_units.get(&id).cloned())
    }

    async fn update_work_unit(&self, id: WorkUnitId, patch: &WorkUnitPatch) -> Result<WorkUnit> {
        let mut tables = self.tables.write().await;
        let unit = tables
            .work_units
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("work unit {}", id)))?;
        patch.apply(unit, chrono::Utc::now());
        Ok(unit.clone())
    }

    async fn list_work_units(&self, filter: &WorkUnitFilter) -> Result<Vec<WorkUnit>> {
        let tables = self.tables.read().await;
        let mut units: Vec<_> = tables
            .work_units
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        units.sort_by(|a, b| (a.work_date, a.id).cmp(&(b.work_date, b.id)));
        Ok(units)
    }

    async fn delete_work_unit(&self, id: WorkUnitId) -> Result<()> {
        self.tables.write().await.work_units.remove(&id);
        Ok(())
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.assignments.iter().any(|a| a.id == assignment.id) {
            return Err(StorageError::Conflict(format!("assignment {}", assignment.id)));
        }
        tables.assignments.push(assignment.clone());
        Ok(())
    }

    async fn list_assignments(&self, work_unit_id: WorkUnitId) -> Result<Vec<Assignment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.work_unit_id == work_unit_id)
            .cloned()
            .collect())
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<()> {
        self.tables.write().await.assignments.retain(|a| a.id != id);
        Ok(())
    }

    async fn delete_assignments_for_unit(&self, work_unit_id: WorkUnitId) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.assignments.len();
        tables.assignments.retain(|a| a.work_unit_id != work_unit_id);
        Ok(before - tables.assignments.len())
    }

    async fn append_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.attendance.iter().any(|r| r.id == record.id) {
            return Err(StorageError::Conflict(format!("attendance {}", record.id)));
        }
        tables.attendance.push(record.clone());
        Ok(())
    }

    async fn list_attendance(&self, work_unit_id: WorkUnitId) -> Result<Vec<AttendanceRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .attendance
            .iter()
            .filter(|r| r.work_unit_id == work_unit_id)
            .cloned()
            .collect())
    }
}
