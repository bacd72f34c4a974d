//! Work unit model - one schedulable cleaning job on one work date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::booking::BookingEntry;
use crate::id::{BookingEntryId, PropertyId, UserId, WorkUnitId};
use crate::state::WorkState;
use crate::Time;

/// A unit of cleaning work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Unique identifier
    pub id: WorkUnitId,

    /// Booking this unit was derived from (a back-reference, not ownership)
    pub booking_entry_id: Option<BookingEntryId>,

    /// Property the work happens at
    pub property_id: PropertyId,

    /// Stay interval, copied from the booking
    pub stay_start: NaiveDate,
    /// Checkout day
    pub stay_end: NaiveDate,

    /// Guest count, copied from the booking
    pub occupant_count: u32,

    /// The day the work is scheduled for
    pub work_date: NaiveDate,

    /// Current lifecycle state
    pub state: WorkState,

    /// Assigned crew, in assignment order, without duplicates
    pub assigned_crew_ids: Vec<UserId>,

    /// Crew members who accepted the job
    pub accepted_crew_ids: Vec<UserId>,

    /// Owner's note, copied from the booking
    pub owner_remark: String,

    /// Crew's note
    pub crew_remark: Option<String>,

    /// Report written when confirming
    pub manager_report: Option<String>,

    /// Who created the unit
    pub created_by: UserId,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,

    /// Stamped on entering `completed`
    pub completed_at: Option<Time>,

    /// Stamped on entering `confirmed`
    pub confirmed_at: Option<Time>,
}

impl WorkUnit {
    /// Derive a draft unit for `work_date` from a booking entry.
    pub fn derive(entry: &BookingEntry, work_date: NaiveDate) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: WorkUnitId::new(),
            booking_entry_id: Some(entry.id),
            property_id: entry.property_id.clone(),
            stay_start: entry.stay_start,
            stay_end: entry.stay_end,
            occupant_count: entry.occupant_count,
            work_date,
            state: WorkState::Draft,
            assigned_crew_ids: Vec::new(),
            accepted_crew_ids: Vec::new(),
            owner_remark: entry.owner_remark.clone(),
            crew_remark: None,
            manager_report: None,
            created_by: entry.created_by.clone(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            confirmed_at: None,
        }
    }

    /// Whether `user` is on the assigned crew.
    pub fn is_assigned(&self, user: &UserId) -> bool {
        self.assigned_crew_ids.contains(user)
    }
}

/// Partial update applied to a work unit in a single store call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnitPatch {
    /// New lifecycle state
    pub state: Option<WorkState>,

    /// Replaces the assigned crew (deduplicated, order kept); accepted crew
    /// no longer assigned are dropped
    pub assigned_crew_ids: Option<Vec<UserId>>,

    /// Appended to accepted crew if not already present
    pub accepted_crew: Option<UserId>,

    /// Removed from both assigned and accepted crew
    pub removed_crew: Option<UserId>,

    /// Completion stamp
    pub completed_at: Option<Time>,
    /// Confirmation stamp
    pub confirmed_at: Option<Time>,
    /// Report written on confirmation
    pub manager_report: Option<String>,
    /// Free-text note from the crew
    pub crew_remark: Option<String>,

    /// Booking fields copied onto the unit
    pub stay_start: Option<NaiveDate>,
    /// Checkout day
    pub stay_end: Option<NaiveDate>,
    /// Guest count
    pub occupant_count: Option<u32>,
    /// Owner's note
    pub owner_remark: Option<String>,
}

impl WorkUnitPatch {
    /// Patch that only moves the state.
    pub fn state(state: WorkState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    /// True when applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch in place.
    pub fn apply(&self, unit: &mut WorkUnit, now: Time) {
        if let Some(state) = self.state {
            unit.state = state;
        }
        if let Some(crew) = &self.assigned_crew_ids {
            let assigned = ordered_set(crew.iter().cloned());
            unit.accepted_crew_ids.retain(|u| assigned.contains(u));
            unit.assigned_crew_ids = assigned;
        }
        if let Some(user) = &self.accepted_crew {
            if !unit.accepted_crew_ids.contains(user) {
                unit.accepted_crew_ids.push(user.clone());
            }
        }
        if let Some(user) = &self.removed_crew {
            unit.assigned_crew_ids.retain(|u| u != user);
            unit.accepted_crew_ids.retain(|u| u != user);
        }
        if let Some(at) = self.completed_at {
            unit.completed_at = Some(at);
        }
        if let Some(at) = self.confirmed_at {
            unit.confirmed_at = Some(at);
        }
        if let Some(report) = &self.manager_report {
            unit.manager_report = Some(report.clone());
        }
        if let Some(remark) = &self.crew_remark {
            unit.crew_remark = Some(remark.clone());
        }
        if let Some(start) = self.stay_start {
            unit.stay_start = start;
        }
        if let Some(end) = self.stay_end {
            unit.stay_end = end;
        }
        if let Some(count) = self.occupant_count {
            unit.occupant_count = count;
        }
        if let Some(remark) = &self.owner_remark {
            unit.owner_remark = remark.clone();
        }
        unit.updated_at = now;
    }
}

/// Filter for querying work units. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkUnitFilter {
    /// Units derived from this booking
    pub booking_entry_id: Option<BookingEntryId>,
    /// Units at this property
    pub property_id: Option<PropertyId>,

    /// Units this crew member is assigned to
    pub crew_id: Option<UserId>,

    /// Units in any of these states
    pub states: Option<Vec<WorkState>>,

    /// Inclusive work date range
    pub from: Option<NaiveDate>,
    /// End of the range
    pub to: Option<NaiveDate>,
}

impl WorkUnitFilter {
    /// Units derived from one booking.
    pub fn for_booking(id: BookingEntryId) -> Self {
        Self {
            booking_entry_id: Some(id),
            ..Default::default()
        }
    }

    /// Check whether a unit matches.
    pub fn matches(&self, unit: &WorkUnit) -> bool {
        if let Some(id) = &self.booking_entry_id {
            if unit.booking_entry_id.as_ref() != Some(id) {
                return false;
            }
        }
        if let Some(property) = &self.property_id {
            if &unit.property_id != property {
                return false;
            }
        }
        if let Some(crew) = &self.crew_id {
            if !unit.is_assigned(crew) {
                return false;
            }
        }
        if let Some(states) = &self.states {
            if !states.contains(&unit.state) {
                return false;
            }
        }
        if self.from.map_or(false, |from| unit.work_date < from) {
            return false;
        }
        if self.to.map_or(false, |to| unit.work_date > to) {
            return false;
        }
        true
    }
}

/// Collect ids into an ordered set, keeping first occurrences.
pub fn ordered_set(ids: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
    let mut out: Vec<UserId> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
