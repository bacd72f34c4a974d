//! Booking entries - owner-declared stays that generate work units.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::id::{BookingEntryId, PropertyId, UserId};
use crate::work_unit::WorkUnitPatch;
use crate::{Time, ValidationError};

/// An owner-declared stay interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEntry {
    /// Unique identifier
    pub id: BookingEntryId,

    /// Property the stay is at
    pub property_id: PropertyId,

    /// First night of the stay
    pub stay_start: NaiveDate,

    /// Checkout day
    pub stay_end: NaiveDate,

    /// Number of guests
    pub occupant_count: u32,

    /// Free-form note from the owner, copied onto derived units
    pub owner_remark: String,

    /// Days cleaning should happen; never empty, always inside the stay
    pub work_dates: BTreeSet<NaiveDate>,

    /// Who declared the booking
    pub created_by: UserId,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

/// Input for declaring a new booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    /// Property being booked
    pub property_id: PropertyId,
    /// First night
    pub stay_start: NaiveDate,
    /// Checkout day
    pub stay_end: NaiveDate,
    /// Number of guests
    pub occupant_count: u32,
    /// Note for managers and crew
    #[serde(default)]
    pub owner_remark: String,
    /// Empty means "clean on checkout day"
    #[serde(default)]
    pub work_dates: BTreeSet<NaiveDate>,
}

/// Partial edit of a booking entry.
///
/// `work_dates` being `Some` is what triggers unit reconciliation; an empty
/// set there means "default to the (patched) checkout day".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingPatch {
    /// New first night
    pub stay_start: Option<NaiveDate>,
    /// New checkout day
    pub stay_end: Option<NaiveDate>,
    /// New guest count
    pub occupant_count: Option<u32>,
    /// New note
    pub owner_remark: Option<String>,
    /// Replacement set of cleaning days
    pub work_dates: Option<BTreeSet<NaiveDate>>,
}

/// Filter for querying booking entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    /// Filter by property
    pub property_id: Option<PropertyId>,

    /// Filter by declaring user
    pub created_by: Option<UserId>,
}

impl BookingFilter {
    /// Check whether an entry matches.
    pub fn matches(&self, entry: &BookingEntry) -> bool {
        self.property_id.as_ref().map_or(true, |p| &entry.property_id == p)
            && self.created_by.as_ref().map_or(true, |u| &entry.created_by == u)
    }
}

/// Validate a work date set against a stay, applying the checkout-day default.
pub fn normalize_work_dates(
    dates: &BTreeSet<NaiveDate>,
    stay_start: NaiveDate,
    stay_end: NaiveDate,
) -> Result<BTreeSet<NaiveDate>, ValidationError> {
    if stay_start > stay_end {
        return Err(ValidationError::InvalidStay {
            start: stay_start,
            end: stay_end,
        });
    }
    if dates.is_empty() {
        return Ok(BTreeSet::from([stay_end]));
    }
    if let Some(date) = dates.iter().find(|d| **d < stay_start || **d > stay_end) {
        return Err(ValidationError::WorkDateOutOfRange {
            date: *date,
            start: stay_start,
            end: stay_end,
        });
    }
    Ok(dates.clone())
}

impl BookingEntry {
    /// Build a new entry from user input.
    pub fn create(input: NewBooking, created_by: UserId) -> Result<Self, ValidationError> {
        let work_dates = normalize_work_dates(&input.work_dates, input.stay_start, input.stay_end)?;
        let now = chrono::Utc::now();
        Ok(Self {
            id: BookingEntryId::new(),
            property_id: input.property_id,
            stay_start: input.stay_start,
            stay_end: input.stay_end,
            occupant_count: input.occupant_count,
            owner_remark: input.owner_remark,
            work_dates,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Patch that copies this entry's denormalised fields onto a unit.
    pub fn unit_fields(&self) -> WorkUnitPatch {
        WorkUnitPatch {
            stay_start: Some(self.stay_start),
            stay_end: Some(self.stay_end),
            occupant_count: Some(self.occupant_count),
            owner_remark: Some(self.owner_remark.clone()),
            ..Default::default()
        }
    }
}

impl BookingPatch {
    /// Produce the patched copy of `entry`.
    ///
    /// Work dates are only re-validated when the patch carries them; a stay
    /// change that strands existing dates outside the interval is rejected.
    pub fn apply_to(&self, entry: &BookingEntry) -> Result<BookingEntry, ValidationError> {
        let mut next = entry.clone();
        if let Some(start) = self.stay_start {
            next.stay_start = start;
        }
        if let Some(end) = self.stay_end {
            next.stay_end = end;
        }
        if let Some(count) = self.occupant_count {
            next.occupant_count = count;
        }
        if let Some(remark) = &self.owner_remark {
            next.owner_remark = remark.clone();
        }
        let dates = self.work_dates.as_ref().unwrap_or(&entry.work_dates);
        next.work_dates = normalize_work_dates(dates, next.stay_start, next.stay_end)?;
        next.updated_at = chrono::Utc::now();
        Ok(next)
    }

    /// Whether any field copied onto derived units is being changed.
    pub fn touches_unit_fields(&self) -> bool {
        self.stay_start.is_some()
            || self.stay_end.is_some()
            || self.occupant_count.is_some()
            || self.owner_remark.is_some()
    }
}
