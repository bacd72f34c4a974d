//! Shared fixtures for workflow tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use crewline_core::{
    Actor, Assignment, AssignmentId, AttendanceRecord, BookingEntry, BookingEntryId,
    BookingFilter, NewBooking, Property, PropertyId, WorkUnit, WorkUnitFilter, WorkUnitId,
    WorkUnitPatch,
};
use crewline_notify::{ChannelError, DirectoryResolver, Dispatcher, MessageChannel};
use crewline_storage::{MemoryStorage, Result, Storage, StorageError};
use crewline_work::{EngineConfig, TransitionEngine, Workflow};

pub const PROPERTY: &str = "loft";

pub fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
}

pub fn dates(days: &[u32]) -> BTreeSet<NaiveDate> {
    days.iter().map(|day| d(*day)).collect()
}

pub fn owner() -> Actor {
    Actor::owner("owner")
}

pub fn manager() -> Actor {
    Actor::manager("m1")
}

/// A stay from July 1st to July 10th cleaning on `days`.
pub fn stay(days: &[u32]) -> NewBooking {
    NewBooking {
        property_id: PropertyId::new(PROPERTY),
        stay_start: d(1),
        stay_end: d(10),
        occupant_count: 2,
        owner_remark: "keys under the mat".to_string(),
        work_dates: dates(days),
    }
}

/// Fails one call of an operation once armed.
#[derive(Default)]
pub struct Trip {
    calls: AtomicUsize,
    fail_at: Mutex<Option<usize>>,
}

impl Trip {
    /// Fail the `nth` call from now (0 = the next one).
    pub fn arm(&self, nth: usize) {
        let at = self.calls.load(Ordering::SeqCst) + nth;
        *self.fail_at.lock().unwrap() = Some(at);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, what: &str) -> Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut fail_at = self.fail_at.lock().unwrap();
        if *fail_at == Some(n) {
            *fail_at = None;
            return Err(StorageError::Unavailable(format!("injected {} failure", what)));
        }
        Ok(())
    }
}

/// Memory storage with injectable one-shot failures and call counters.
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    pub unit_inserts: Trip,
    pub unit_deletes: Trip,
    pub unit_updates: Trip,
    pub booking_saves: Trip,
    pub assignment_inserts: Trip,
    pub attendance_appends: Trip,
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn save_property(&self, property: &Property) -> Result<()> {
        self.inner.save_property(property).await
    }

    async fn load_property(&self, id: &PropertyId) -> Result<Option<Property>> {
        self.inner.load_property(id).await
    }

    async fn insert_booking(&self, entry: &BookingEntry) -> Result<()> {
        self.inner.insert_booking(entry).await
    }

    async fn save_booking(&self, entry: &BookingEntry) -> Result<()> {
        self.booking_saves.check("booking save")?;
        self.inner.save_booking(entry).await
    }

    async fn load_booking(&self, id: BookingEntryId) -> Result<Option<BookingEntry>> {
        self.inner.load_booking(id).await
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<BookingEntry>> {
        self.inner.list_bookings(filter).await
    }

    async fn delete_booking(&self, id: BookingEntryId) -> Result<()> {
        self.inner.delete_booking(id).await
    }

    async fn insert_work_unit(&self, unit: &WorkUnit) -> Result<()> {
        self.unit_inserts.check("unit insert")?;
        self.inner.insert_work_unit(unit).await
    }

    async fn load_work_unit(&self, id: WorkUnitId) -> Result<Option<WorkUnit>> {
        self.inner.load_work_unit(id).await
    }

    async fn update_work_unit(&self, id: WorkUnitId, patch: &WorkUnitPatch) -> Result<WorkUnit> {
        self.unit_updates.check("unit update")?;
        self.inner.update_work_unit(id, patch).await
    }

    async fn list_work_units(&self, filter: &WorkUnitFilter) -> Result<Vec<WorkUnit>> {
        self.inner.list_work_units(filter).await
    }

    async fn delete_work_unit(&self, id: WorkUnitId) -> Result<()> {
        self.unit_deletes.check("unit delete")?;
        self.inner.delete_work_unit(id).await
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        self.assignment_inserts.check("assignment insert")?;
        self.inner.insert_assignment(assignment).await
    }

    async fn list_assignments(&self, work_unit_id: WorkUnitId) -> Result<Vec<Assignment>> {
        self.inner.list_assignments(work_unit_id).await
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<()> {
        self.inner.delete_assignment(id).await
    }

    async fn delete_assignments_for_unit(&self, work_unit_id: WorkUnitId) -> Result<usize> {
        self.inner.delete_assignments_for_unit(work_unit_id).await
    }

    async fn append_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        self.attendance_appends.check("attendance append")?;
        self.inner.append_attendance(record).await
    }

    async fn list_attendance(&self, work_unit_id: WorkUnitId) -> Result<Vec<AttendanceRecord>> {
        self.inner.list_attendance(work_unit_id).await
    }
}

/// Channel that records deliveries; fails for ids listed in `fail_for`.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail_for: Vec<String>,
}

impl RecordingChannel {
    /// External ids that received a message, in order.
    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, recipient: &str, message: &str) -> std::result::Result<(), ChannelError> {
        if self.fail_for.iter().any(|r| r == recipient) {
            return Err(ChannelError::Rejected("blocked".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

/// A workflow over flaky storage with inline dispatch to a recording channel.
pub struct Harness {
    pub storage: Arc<FlakyStorage>,
    pub channel: Arc<RecordingChannel>,
    pub workflow: Workflow,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_channel(RecordingChannel::default()).await
    }

    pub async fn with_channel(channel: RecordingChannel) -> Self {
        let storage = Arc::new(FlakyStorage::default());
        let property = Property::new(PropertyId::new(PROPERTY), "Seaside Loft", "owner".into())
            .with_managers(vec!["m1".into(), "m2".into()]);
        storage.save_property(&property).await.unwrap();

        let resolver = ["owner", "m1", "m2", "a", "b", "c"]
            .iter()
            .fold(DirectoryResolver::new(), |r, user| {
                r.link(*user, format!("ext-{}", user))
            });

        let channel = Arc::new(channel);
        let dispatcher = Dispatcher::new(storage.clone(), Arc::new(resolver), channel.clone());
        let engine = TransitionEngine::new(storage.clone())
            .with_dispatcher(Arc::new(dispatcher))
            .with_config(EngineConfig {
                detached_dispatch: false,
            });

        Self {
            workflow: Workflow::with_engine(storage.clone(), engine),
            storage,
            channel,
        }
    }

    pub async fn units(&self, booking: BookingEntryId) -> Vec<WorkUnit> {
        self.workflow.work_units_for_booking(booking).await.unwrap()
    }

    pub async fn unit(&self, id: WorkUnitId) -> WorkUnit {
        self.workflow.work_unit(id).await.unwrap().unwrap()
    }

    /// Create a booking cleaning on `day` and open its only unit.
    pub async fn open_unit(&self, day: u32) -> WorkUnit {
        let entry = self
            .workflow
            .create_booking(&owner(), stay(&[day]))
            .await
            .unwrap();
        let unit = self.units(entry.id).await.remove(0);
        self.workflow
            .advance(
                unit.id,
                Some(crewline_core::WorkState::Draft),
                crewline_core::WorkState::Open,
                owner(),
                Default::default(),
            )
            .await
            .unwrap()
    }
}
