//! JSON file storage implementation.
//!
//! Stores records as JSON files in a data directory and keeps small
//! per-object meta markers (version + updated_at) for mutable records.
//! A process-wide write lock makes each single-record write atomic; it is
//! never held across two trait calls.

use std::path::{Path, PathBuf};

use crewline_core::{
    Assignment, AssignmentId, AttendanceRecord, BookingEntry, BookingEntryId, BookingFilter,
    Property, PropertyId, WorkUnit, WorkUnitFilter, WorkUnitId, WorkUnitPatch,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{Result, Storage, StorageError};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStorage {
    /// Create storage, creating the record directories under `root`.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for dir in ["properties", "bookings", "work_units", "assignments", "attendance"] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        fs::create_dir_all(root.join("meta").join("bookings")).await?;
        fs::create_dir_all(root.join("meta").join("work_units")).await?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn property_path(&self, id: &PropertyId) -> PathBuf {
        self.root.join("properties").join(format!("{}.json", id))
    }
    fn booking_path(&self, id: BookingEntryId) -> PathBuf {
        self.root.join("bookings").join(format!("{}.json", id))
    }
    fn work_unit_path(&self, id: WorkUnitId) -> PathBuf {
        self.root.join("work_units").join(format!("{}.json", id))
    }
    fn assignment_path(&self, id: AssignmentId) -> PathBuf {
        self.root.join("assignments").join(format!("{}.json", id))
    }
    fn attendance_path(&self, record: &AttendanceRecord) -> PathBuf {
        self.root.join("attendance").join(format!("{}.json", record.id))
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let path = self.meta_path(kind, id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    async fn drop_meta(&self, kind: &str, id: &str) -> Result<()> {
        remove_if_exists(&self.meta_path(kind, id)).await
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_property(&self, property: &Property) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_json(&self.property_path(&property.id), property).await
    }

    async fn load_property(&self, id: &PropertyId) -> Result<Option<Property>> {
        read_json(&self.property_path(id)).await
    }

    async fn insert_booking(&self, entry: &BookingEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        create_json(&self.booking_path(entry.id), entry).await?;
        self.bump_version("bookings", &entry.id.to_string()).await?;
        Ok(())
    }

    async fn save_booking(&self, entry: &BookingEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.booking_path(entry.id);
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(format!("booking {}", entry.id)));
        }
        write_json(&path, entry).await?;
        let ver = self.bump_version("bookings", &entry.id.to_string()).await?;
        tracing::trace!(booking = %entry.id, version = ver, "booking saved");
        Ok(())
    }

    async fn load_booking(&self, id: BookingEntryId) -> Result<Option<BookingEntry>> {
        read_json(&self.booking_path(id)).await
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<BookingEntry>> {
        let mut entries: Vec<BookingEntry> = list_dir(&self.root.join("bookings"))
            .await?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| (a.stay_start, a.id).cmp(&(b.stay_start, b.id)));
        Ok(entries)
    }

    async fn delete_booking(&self, id: BookingEntryId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&self.booking_path(id)).await?;
        self.drop_meta("bookings", &id.to_string()).await
    }

    async fn insert_work_unit(&self, unit: &WorkUnit) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        create_json(&self.work_unit_path(unit.id), unit).await?;
        self.bump_version("work_units", &unit.id.to_string()).await?;
        Ok(())
    }

    async fn load_work_unit(&self, id: WorkUnitId) -> Result<Option<WorkUnit>> {
        read_json(&self.work_unit_path(id)).await
    }

    async fn update_work_unit(&self, id: WorkUnitId, patch: &WorkUnitPatch) -> Result<WorkUnit> {
        let _guard = self.write_lock.lock().await;
        let path = self.work_unit_path(id);
        let mut unit: WorkUnit = read_json(&path)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("work unit {}", id)))?;
        patch.apply(&mut unit, chrono::Utc::now());
        write_json(&path, &unit).await?;
        self.bump_version("work_units", &id.to_string()).await?;
        Ok(unit)
    }

    async fn list_work_units(&self, filter: &WorkUnitFilter) -> Result<Vec<WorkUnit>> {
        let mut units: Vec<WorkUnit> = list_dir(&self.root.join("work_units"))
            .await?
            .into_iter()
            .filter(|u| filter.matches(u))
            .collect();
        units.sort_by(|a, b| (a.work_date, a.id).cmp(&(b.work_date, b.id)));
        Ok(units)
    }

    async fn delete_work_unit(&self, id: WorkUnitId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&self.work_unit_path(id)).await?;
        self.drop_meta("work_units", &id.to_string()).await
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        create_json(&self.assignment_path(assignment.id), assignment).await
    }

    async fn list_assignments(&self, work_unit_id: WorkUnitId) -> Result<Vec<Assignment>> {
        let mut rows: Vec<Assignment> = list_dir(&self.root.join("assignments"))
            .await?
            .into_iter()
            .filter(|a: &Assignment| a.work_unit_id == work_unit_id)
            .collect();
        rows.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at));
        Ok(rows)
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&self.assignment_path(id)).await
    }

    async fn delete_assignments_for_unit(&self, work_unit_id: WorkUnitId) -> Result<usize> {
        let rows = self.list_assignments(work_unit_id).await?;
        let _guard = self.write_lock.lock().await;
        for row in &rows {
            remove_if_exists(&self.assignment_path(row.id)).await?;
        }
        Ok(rows.len())
    }

    async fn append_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        create_json(&self.attendance_path(record), record).await
    }

    async fn list_attendance(&self, work_unit_id: WorkUnitId) -> Result<Vec<AttendanceRecord>> {
        let mut records: Vec<AttendanceRecord> = list_dir(&self.root.join("attendance"))
            .await?
            .into_iter()
            .filter(|r: &AttendanceRecord| r.work_unit_id == work_unit_id)
            .collect();
        // ULIDs grow with creation time, so this approximates insertion order
        records.sort_by(|a, b| {
            (a.timestamp, a.id.to_string()).cmp(&(b.timestamp, b.id.to_string()))
        });
        Ok(records)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json.as_bytes()).await?;
    Ok(())
}

/// Write a new file, refusing to overwrite.
async fn create_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(StorageError::Conflict(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(json.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(e)
        }
    })?;
    Ok(())
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&entry.path()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable record"),
        }
    }
    Ok(items)
}
