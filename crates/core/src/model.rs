//! Domain records: interventions and the intervention-type nomenclature.
//!
//! Records returned by the stores are always complete and valid. Inputs come in three shapes:
//! - `New*` carries what a caller supplies at creation, with optional fields still unresolved
//! - `*Draft` is what the engine hands the store once business defaults have been applied
//! - [`InterventionPatch`] carries a partial update

use crate::MeditacheError;
use chrono::{DateTime, Utc};
use meditache_types::{ActorId, NonEmptyText};
use meditache_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// Lifecycle status of an intervention.
///
/// Any status may be replaced by any other through an update; there is no transition table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionStatus {
    #[default]
    Planned,
    InProgress,
    Done,
    Canceled,
}

impl InterventionStatus {
    pub const ALL: [InterventionStatus; 4] = [
        InterventionStatus::Planned,
        InterventionStatus::InProgress,
        InterventionStatus::Done,
        InterventionStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionStatus::Planned => "PLANNED",
            InterventionStatus::InProgress => "IN_PROGRESS",
            InterventionStatus::Done => "DONE",
            InterventionStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for InterventionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterventionStatus {
    type Err = MeditacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                MeditacheError::Validation(format!(
                    "status must be one of PLANNED, IN_PROGRESS, DONE, CANCELED; got '{}'",
                    s
                ))
            })
    }
}

/// Urgency of an intervention, ordered from least to most urgent.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = MeditacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                MeditacheError::Validation(format!(
                    "priority must be one of LOW, MEDIUM, HIGH, URGENT; got '{}'",
                    s
                ))
            })
    }
}

// ============================================================================
// INTERVENTION
// ============================================================================

/// A scheduled medical action assigned to a doctor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: ShardableUuid,
    pub doctor_id: ActorId,
    pub intervention_type_id: Option<ShardableUuid>,
    pub title: NonEmptyText,
    pub notes: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub status: InterventionStatus,
    /// Opaque blob references in upload order. Duplicates are legitimate.
    pub report_attachments: Vec<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new intervention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewIntervention {
    pub doctor_id: ActorId,
    pub intervention_type_id: Option<ShardableUuid>,
    pub title: NonEmptyText,
    pub notes: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub status: Option<InterventionStatus>,
}

/// A new intervention with every default resolved, ready for the store to assign identity and
/// timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterventionDraft {
    pub doctor_id: ActorId,
    pub intervention_type_id: Option<ShardableUuid>,
    pub title: NonEmptyText,
    pub notes: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub status: InterventionStatus,
    pub report_attachments: Vec<String>,
    pub created_by: ActorId,
}

impl InterventionDraft {
    /// Materialises the draft as a stored record.
    pub fn into_record(self, id: ShardableUuid, now: DateTime<Utc>) -> Intervention {
        Intervention {
            id,
            doctor_id: self.doctor_id,
            intervention_type_id: self.intervention_type_id,
            title: self.title,
            notes: self.notes,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
            priority: self.priority,
            status: self.status,
            report_attachments: self.report_attachments,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of an intervention. `None` leaves a field untouched.
///
/// The nullable columns take a nested option: `Some(None)` clears the stored value.
/// `report_attachments`, when present, replaces the stored list wholesale.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterventionPatch {
    pub doctor_id: Option<ActorId>,
    pub intervention_type_id: Option<Option<ShardableUuid>>,
    pub title: Option<NonEmptyText>,
    pub notes: Option<Option<String>>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub status: Option<InterventionStatus>,
    pub report_attachments: Option<Vec<String>>,
}

impl InterventionPatch {
    /// Patch that only replaces the attachment list.
    pub fn attachments(report_attachments: Vec<String>) -> Self {
        Self {
            report_attachments: Some(report_attachments),
            ..Self::default()
        }
    }

    /// Patch that only changes the status.
    pub fn status(status: InterventionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Applies the supplied fields to `record` and stamps `updated_at`.
    pub fn apply_to(&self, record: &mut Intervention, now: DateTime<Utc>) {
        if let Some(doctor_id) = &self.doctor_id {
            record.doctor_id = doctor_id.clone();
        }
        if let Some(type_id) = &self.intervention_type_id {
            record.intervention_type_id = type_id.clone();
        }
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
        if let Some(start) = self.scheduled_start {
            record.scheduled_start = start;
        }
        if let Some(end) = self.scheduled_end {
            record.scheduled_end = end;
        }
        if let Some(priority) = self.priority {
            record.priority = priority;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(attachments) = &self.report_attachments {
            record.report_attachments = attachments.clone();
        }
        record.updated_at = now;
    }

    /// Like [`apply_to`](Self::apply_to), but leaves `record` untouched if the merged schedule
    /// would end before it starts.
    pub fn apply_checked(
        &self,
        record: &mut Intervention,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidSchedule> {
        let mut merged = record.clone();
        self.apply_to(&mut merged, now);
        validate_schedule(merged.scheduled_start, merged.scheduled_end)?;
        *record = merged;
        Ok(())
    }
}

/// A schedule whose end precedes its start.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "scheduled end {} is before scheduled start {}",
    .end.to_rfc3339(),
    .start.to_rfc3339()
)]
pub struct InvalidSchedule {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<InvalidSchedule> for MeditacheError {
    fn from(err: InvalidSchedule) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Rejects a schedule whose end precedes its start.
pub(crate) fn validate_schedule(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Result<(), InvalidSchedule> {
    match end {
        Some(end) if end < start => Err(InvalidSchedule { start, end }),
        _ => Ok(()),
    }
}

// ============================================================================
// INTERVENTION TYPE
// ============================================================================

/// Nomenclature entry. A `None` owner means the entry belongs to the global catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionType {
    pub id: ShardableUuid,
    pub name: NonEmptyText,
    pub owner_doctor_id: Option<ActorId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl InterventionType {
    pub fn is_global(&self) -> bool {
        self.owner_doctor_id.is_none()
    }
}

/// A nomenclature entry awaiting insertion. New entries are always active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterventionTypeDraft {
    pub name: NonEmptyText,
    pub owner_doctor_id: Option<ActorId>,
}

impl InterventionTypeDraft {
    pub fn into_record(self, id: ShardableUuid, now: DateTime<Utc>) -> InterventionType {
        InterventionType {
            id,
            name: self.name,
            owner_doctor_id: self.owner_doctor_id,
            active: true,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> Intervention {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        InterventionDraft {
            doctor_id: ActorId::new("doc-1").unwrap(),
            intervention_type_id: None,
            title: NonEmptyText::new("Dressing change").unwrap(),
            notes: None,
            scheduled_start: at,
            scheduled_end: None,
            priority: Priority::Medium,
            status: InterventionStatus::Planned,
            report_attachments: vec![],
            created_by: ActorId::new("doc-1").unwrap(),
        }
        .into_record(ShardableUuid::new(), at)
    }

    #[test]
    fn status_parses_case_insensitively_and_rejects_unknown() {
        assert_eq!(
            "in_progress".parse::<InterventionStatus>().unwrap(),
            InterventionStatus::InProgress
        );
        assert_eq!(
            " DONE ".parse::<InterventionStatus>().unwrap(),
            InterventionStatus::Done
        );
        assert!(matches!(
            "FINISHED".parse::<InterventionStatus>(),
            Err(MeditacheError::Validation(_))
        ));
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&InterventionStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        assert!(serde_json::from_str::<InterventionStatus>("\"ARCHIVED\"").is_err());
    }

    #[test]
    fn priority_is_totally_ordered() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Urgent);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!("urgent".parse::<Priority>().unwrap(), Priority::Urgent);
    }

    #[test]
    fn patch_changes_only_supplied_fields() {
        let mut record = sample();
        let before = record.clone();
        let later = before.updated_at + Duration::minutes(5);

        InterventionPatch::status(InterventionStatus::Done).apply_to(&mut record, later);

        assert_eq!(record.status, InterventionStatus::Done);
        assert_eq!(record.updated_at, later);
        assert_eq!(record.title, before.title);
        assert_eq!(record.scheduled_start, before.scheduled_start);
        assert_eq!(record.created_at, before.created_at);
    }

    #[test]
    fn patch_replaces_attachment_list() {
        let mut record = sample();
        record.report_attachments = vec!["/a.png".into()];
        let now = record.updated_at;

        let patch = InterventionPatch::attachments(vec!["/b.png".into(), "/c.png".into()]);
        patch.apply_to(&mut record, now);
        patch.apply_to(&mut record, now);

        assert_eq!(record.report_attachments, vec!["/b.png", "/c.png"]);
    }

    #[test]
    fn validate_schedule_rejects_end_before_start() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert!(validate_schedule(start, None).is_ok());
        assert!(validate_schedule(start, Some(start)).is_ok());
        assert_eq!(
            validate_schedule(start, Some(start - Duration::minutes(1))),
            Err(InvalidSchedule {
                start,
                end: start - Duration::minutes(1)
            })
        );
    }

    #[test]
    fn patch_with_explicit_none_clears_nullable_fields() {
        let mut record = sample();
        record.notes = Some("fasting".into());
        record.scheduled_end = Some(record.scheduled_start + Duration::hours(1));
        record.intervention_type_id = Some(ShardableUuid::new());
        let now = record.updated_at;

        InterventionPatch {
            notes: Some(None),
            scheduled_end: Some(None),
            intervention_type_id: Some(None),
            ..InterventionPatch::default()
        }
        .apply_to(&mut record, now);

        assert_eq!(record.notes, None);
        assert_eq!(record.scheduled_end, None);
        assert_eq!(record.intervention_type_id, None);
    }

    #[test]
    fn checked_patch_leaves_record_alone_on_inverted_schedule() {
        let mut record = sample();
        let before = record.clone();
        let later = before.updated_at + Duration::minutes(5);

        let inverted = InterventionPatch {
            scheduled_end: Some(Some(before.scheduled_start - Duration::minutes(1))),
            status: Some(InterventionStatus::Done),
            ..InterventionPatch::default()
        };

        assert!(inverted.apply_checked(&mut record, later).is_err());
        assert_eq!(record, before);

        InterventionPatch::status(InterventionStatus::Done)
            .apply_checked(&mut record, later)
            .unwrap();
        assert_eq!(record.status, InterventionStatus::Done);
    }
}
