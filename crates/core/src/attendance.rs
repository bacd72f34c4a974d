//! Attendance log - append-only check-in/check-out events and their projection.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::{AttendanceId, UserId, WorkUnitId};
use crate::Time;

/// Kind of attendance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceKind {
    /// Crew arrived
    CheckIn,
    /// Crew left
    CheckOut,
}

impl std::fmt::Display for AttendanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceKind::CheckIn => f.write_str("check_in"),
            AttendanceKind::CheckOut => f.write_str("check_out"),
        }
    }
}

/// A single attendance event. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Record id
    pub id: AttendanceId,
    /// Unit attended
    pub work_unit_id: WorkUnitId,
    /// Crew member
    pub crew_id: UserId,
    /// Check-in or check-out
    pub kind: AttendanceKind,
    /// When it was recorded
    pub timestamp: Time,
}

impl AttendanceRecord {
    /// Create a record stamped now.
    pub fn new(work_unit_id: WorkUnitId, crew_id: UserId, kind: AttendanceKind) -> Self {
        Self::at(work_unit_id, crew_id, kind, chrono::Utc::now())
    }

    /// Create a record with an explicit timestamp.
    pub fn at(work_unit_id: WorkUnitId, crew_id: UserId, kind: AttendanceKind, timestamp: Time) -> Self {
        Self {
            id: AttendanceId::new(),
            work_unit_id,
            crew_id,
            kind,
            timestamp,
        }
    }
}

/// Current status of one crew member: the kind of their latest record.
///
/// Records with equal timestamps resolve to the one appearing later in the
/// slice, so callers should pass the log in insertion order.
pub fn latest_status(records: &[AttendanceRecord], crew_id: &UserId) -> Option<AttendanceKind> {
    let mut latest: Option<&AttendanceRecord> = None;
    for record in records.iter().filter(|r| &r.crew_id == crew_id) {
        if latest.map_or(true, |l| record.timestamp >= l.timestamp) {
            latest = Some(record);
        }
    }
    latest.map(|r| r.kind)
}

/// Current status of every crew member appearing in the log.
pub fn current_statuses(records: &[AttendanceRecord]) -> HashMap<UserId, AttendanceKind> {
    let mut latest: HashMap<UserId, &AttendanceRecord> = HashMap::new();
    for record in records {
        match latest.get(&record.crew_id) {
            Some(prev) if prev.timestamp > record.timestamp => {}
            _ => {
                latest.insert(record.crew_id.clone(), record);
            }
        }
    }
    latest.into_iter().map(|(crew, r)| (crew, r.kind)).collect()
}

/// Whether every listed crew member's latest record is a check-out.
///
/// An empty crew list never counts as checked out.
pub fn all_checked_out(records: &[AttendanceRecord], crew_ids: &[UserId]) -> bool {
    if crew_ids.is_empty() {
        return false;
    }
    let statuses = current_statuses(records);
    crew_ids
        .iter()
        .all(|crew| statuses.get(crew) == Some(&AttendanceKind::CheckOut))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn rec(unit: WorkUnitId, crew: &str, kind: AttendanceKind, offset_min: i64) -> AttendanceRecord {
        AttendanceRecord::at(unit, crew.into(), kind, Utc::now() + Duration::minutes(offset_min))
    }

    #[test]
    fn test_latest_status_by_timestamp_not_order() {
        let unit = WorkUnitId::new();
        // Out-of-order arrival: the later check-in wins
        let records = vec![
            rec(unit, "a", AttendanceKind::CheckIn, 30),
            rec(unit, "a", AttendanceKind::CheckOut, 10),
        ];
        assert_eq!(latest_status(&records, &"a".into()), Some(AttendanceKind::CheckIn));
        assert_eq!(latest_status(&records, &"b".into()), None);
    }

    #[test]
    fn test_equal_timestamps_later_record_wins() {
        let unit = WorkUnitId::new();
        let now = Utc::now();
        let records = vec![
            AttendanceRecord::at(unit, "a".into(), AttendanceKind::CheckIn, now),
            AttendanceRecord::at(unit, "a".into(), AttendanceKind::CheckOut, now),
        ];
        assert_eq!(latest_status(&records, &"a".into()), Some(AttendanceKind::CheckOut));
        assert_eq!(current_statuses(&records)[&UserId::new("a")], AttendanceKind::CheckOut);
    }

    #[test]
    fn test_all_checked_out_requires_every_member() {
        let unit = WorkUnitId::new();
        let crew: Vec<UserId> = vec!["a".into(), "b".into()];
        let mut records = vec![
            rec(unit, "a", AttendanceKind::CheckIn, 0),
            rec(unit, "b", AttendanceKind::CheckIn, 1),
            rec(unit, "a", AttendanceKind::CheckOut, 2),
        ];
        assert!(!all_checked_out(&records, &crew));

        records.push(rec(unit, "b", AttendanceKind::CheckOut, 3));
        assert!(all_checked_out(&records, &crew));

        // Re-entering flips the projection back
        records.push(rec(unit, "b", AttendanceKind::CheckIn, 4));
        assert!(!all_checked_out(&records, &crew));
    }

    #[test]
    fn test_no_crew_is_never_checked_out() {
        assert!(!all_checked_out(&[], &[]));
    }
}
