//! Request and response bodies.
//!
//! Everything on the wire is camelCase. Request bodies reject unknown fields. Enumerations travel
//! as their SCREAMING_SNAKE_CASE names and are parsed here, so an unknown status or priority is a
//! 400 rather than a deserialization failure deep in the stack.

use chrono::{DateTime, Utc};
use meditache_core::{
    ActorId, Intervention, InterventionFilter, InterventionPatch, InterventionStatus,
    InterventionType, MeditacheError, MeditacheResult, NewIntervention, NonEmptyText, Priority,
    ShardableUuid,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRes {
    #[schema(example = 404)]
    pub status_code: u16,
    #[schema(example = "Not Found")]
    pub error: String,
    pub message: String,
}

// ============================================================================
// INTERVENTION TYPES
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterventionTypeRes {
    pub id: String,
    pub name: String,
    /// Absent for global entries.
    pub owner_doctor_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<InterventionType> for InterventionTypeRes {
    fn from(entry: InterventionType) -> Self {
        Self {
            id: entry.id.to_string(),
            name: entry.name.into_inner(),
            owner_doctor_id: entry.owner_doctor_id.map(|d| d.to_string()),
            active: entry.active,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InterventionTypeQuery {
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    /// Include this doctor's own entries alongside the global ones.
    pub doctor_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateInterventionTypeReq {
    #[schema(example = "Chest X-Ray")]
    pub name: String,
    /// Owner of a private entry; omit for a global entry.
    pub doctor_id: Option<String>,
}

// ============================================================================
// INTERVENTIONS
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRes {
    pub id: String,
    pub doctor_id: String,
    pub intervention_type_id: Option<String>,
    pub title: String,
    pub notes: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: Option<DateTime<Utc>>,
    #[schema(example = "MEDIUM")]
    pub priority: String,
    #[schema(example = "PLANNED")]
    pub status: String,
    pub report_attachments: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Intervention> for InterventionRes {
    fn from(record: Intervention) -> Self {
        Self {
            id: record.id.to_string(),
            doctor_id: record.doctor_id.to_string(),
            intervention_type_id: record.intervention_type_id.map(|id| id.to_string()),
            title: record.title.into_inner(),
            notes: record.notes,
            scheduled_start: record.scheduled_start,
            scheduled_end: record.scheduled_end,
            priority: record.priority.to_string(),
            status: record.status.to_string(),
            report_attachments: record.report_attachments,
            created_by: record.created_by.to_string(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateInterventionReq {
    pub doctor_id: String,
    pub intervention_type_id: Option<String>,
    #[schema(example = "Dressing change")]
    pub title: String,
    pub notes: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: Option<DateTime<Utc>>,
    /// LOW, MEDIUM, HIGH or URGENT. Defaults to MEDIUM.
    pub priority: Option<String>,
    /// PLANNED, IN_PROGRESS, DONE or CANCELED. Defaults to PLANNED.
    pub status: Option<String>,
}

impl CreateInterventionReq {
    pub fn into_new(self) -> MeditacheResult<NewIntervention> {
        Ok(NewIntervention {
            doctor_id: required_actor("doctorId", &self.doctor_id)?,
            intervention_type_id: self
                .intervention_type_id
                .as_deref()
                .map(parse_type_id)
                .transpose()?,
            title: required_text("title", &self.title)?,
            notes: self.notes,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
            priority: self
                .priority
                .as_deref()
                .map(str::parse::<Priority>)
                .transpose()?,
            status: self
                .status
                .as_deref()
                .map(str::parse::<InterventionStatus>)
                .transpose()?,
        })
    }
}

/// Partial update. Omitted fields are left unchanged; `reportAttachments` replaces the list.
///
/// `interventionTypeId`, `notes` and `scheduledEnd` may be sent as `null` to clear them.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateInterventionReq {
    pub doctor_id: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub intervention_type_id: Option<Option<String>>,
    pub title: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub notes: Option<Option<String>>,
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = DateTime, nullable)]
    pub scheduled_end: Option<Option<DateTime<Utc>>>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub report_attachments: Option<Vec<String>>,
}

impl UpdateInterventionReq {
    pub fn into_patch(self) -> MeditacheResult<InterventionPatch> {
        Ok(InterventionPatch {
            doctor_id: self
                .doctor_id
                .as_deref()
                .map(|d| required_actor("doctorId", d))
                .transpose()?,
            intervention_type_id: self
                .intervention_type_id
                .map(|id| id.as_deref().map(parse_type_id).transpose())
                .transpose()?,
            title: self
                .title
                .as_deref()
                .map(|t| required_text("title", t))
                .transpose()?,
            notes: self.notes,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
            priority: self
                .priority
                .as_deref()
                .map(str::parse::<Priority>)
                .transpose()?,
            status: self
                .status
                .as_deref()
                .map(str::parse::<InterventionStatus>)
                .transpose()?,
            report_attachments: self.report_attachments,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InterventionQuery {
    pub doctor_id: Option<String>,
    /// PLANNED, IN_PROGRESS, DONE or CANCELED.
    pub status: Option<String>,
    /// LOW, MEDIUM, HIGH or URGENT.
    pub priority: Option<String>,
    /// Earliest scheduled start, inclusive (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Latest scheduled start, inclusive (RFC 3339).
    pub to: Option<DateTime<Utc>>,
}

impl InterventionQuery {
    pub fn into_filter(self) -> MeditacheResult<InterventionFilter> {
        Ok(InterventionFilter {
            doctor_id: optional_actor(self.doctor_id.as_deref()),
            status: non_blank(self.status.as_deref())
                .map(str::parse::<InterventionStatus>)
                .transpose()?,
            priority: non_blank(self.priority.as_deref())
                .map(str::parse::<Priority>)
                .transpose()?,
            from: self.from,
            to: self.to,
        })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UpcomingQuery {
    /// Look-ahead in days; defaults to 7.
    pub days: Option<u32>,
}

/// Multipart body of the attachment upload.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadReportAttachmentsReq {
    /// Up to 5 files, 5 MiB each.
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Blank filter values mean "no filter".
pub(crate) fn optional_actor(value: Option<&str>) -> Option<ActorId> {
    non_blank(value).and_then(|v| ActorId::new(v).ok())
}

fn required_actor(field: &str, value: &str) -> MeditacheResult<ActorId> {
    ActorId::new(value).map_err(|_| MeditacheError::Validation(format!("{} required", field)))
}

fn required_text(field: &str, value: &str) -> MeditacheResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|_| MeditacheError::Validation(format!("{} required", field)))
}

fn parse_type_id(value: &str) -> MeditacheResult<ShardableUuid> {
    ShardableUuid::parse(value.trim()).map_err(|_| {
        MeditacheError::Validation(format!(
            "interventionTypeId must be a 32-character lowercase hex id, got '{}'",
            value
        ))
    })
}
