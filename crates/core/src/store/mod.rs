//! Persistence port.
//!
//! The engines talk to storage only through the traits in this module. Two implementations ship:
//! - [`MemoryStore`]: lock-guarded maps, used by tests and ephemeral runs
//! - [`FileStore`]: one YAML document per record in a sharded directory tree
//!
//! Filters are plain structs; each store evaluates them with the `matches` helpers defined here
//! so both implementations agree on predicate semantics.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::model::{
    Intervention, InterventionDraft, InterventionPatch, InterventionStatus, InterventionType,
    InterventionTypeDraft, InvalidSchedule, Priority,
};
use chrono::{DateTime, Utc};
use meditache_types::ActorId;
use meditache_uuid::ShardableUuid;
use std::path::PathBuf;

/// Errors raised by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialization(String),

    #[error("failed to deserialize {path}: {message}", path = path.display())]
    Deserialization { path: PathBuf, message: String },

    /// An insert would create a second live row under a unique key.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// An update would leave the record ending before it starts; nothing was written.
    #[error(transparent)]
    InvalidSchedule(#[from] InvalidSchedule),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// FILTERS
// ============================================================================

/// Conjunctive intervention filter. Absent fields impose no constraint.
///
/// `from`/`to` bound the scheduled start, both inclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterventionFilter {
    pub doctor_id: Option<ActorId>,
    pub status: Option<InterventionStatus>,
    pub priority: Option<Priority>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl InterventionFilter {
    /// Filter selecting interventions whose scheduled start lies in `[from, to]`.
    pub fn scheduled_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    pub fn matches(&self, intervention: &Intervention) -> bool {
        self.doctor_id
            .as_ref()
            .map_or(true, |d| &intervention.doctor_id == d)
            && self.status.map_or(true, |s| intervention.status == s)
            && self.priority.map_or(true, |p| intervention.priority == p)
            && self.from.map_or(true, |from| intervention.scheduled_start >= from)
            && self.to.map_or(true, |to| intervention.scheduled_start <= to)
    }
}

/// Which owners' nomenclature entries are visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnerScope {
    /// Global entries only.
    Global,
    /// Global entries plus those owned by one doctor.
    GlobalAndDoctor(ActorId),
}

impl OwnerScope {
    pub fn for_doctor(doctor_id: Option<ActorId>) -> Self {
        match doctor_id {
            Some(doctor_id) => Self::GlobalAndDoctor(doctor_id),
            None => Self::Global,
        }
    }

    pub fn admits(&self, owner: Option<&ActorId>) -> bool {
        match (self, owner) {
            (_, None) => true,
            (Self::GlobalAndDoctor(doctor_id), Some(owner)) => doctor_id == owner,
            (Self::Global, Some(_)) => false,
        }
    }
}

/// Case-insensitive name predicate. The needle is stored lowercased and trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameMatch {
    Contains(String),
    Equals(String),
}

impl NameMatch {
    pub fn contains(needle: &str) -> Self {
        Self::Contains(needle.trim().to_lowercase())
    }

    pub fn equals(name: &str) -> Self {
        Self::Equals(name.trim().to_lowercase())
    }

    pub fn matches(&self, name: &str) -> bool {
        let folded = name.to_lowercase();
        match self {
            Self::Contains(needle) => folded.contains(needle.as_str()),
            Self::Equals(wanted) => folded.trim() == wanted,
        }
    }
}

/// Nomenclature filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterventionTypeFilter {
    pub active_only: bool,
    pub name: Option<NameMatch>,
    pub scope: OwnerScope,
}

impl InterventionTypeFilter {
    pub fn matches(&self, entry: &InterventionType) -> bool {
        (!self.active_only || entry.active)
            && self
                .name
                .as_ref()
                .map_or(true, |m| m.matches(entry.name.as_str()))
            && self.scope.admits(entry.owner_doctor_id.as_ref())
    }
}

/// True when inserting `draft` next to `existing` would break the nomenclature unique key:
/// same owner, same case-folded name, existing row still active.
pub(crate) fn violates_unique_name(existing: &InterventionType, draft: &InterventionTypeDraft) -> bool {
    existing.active
        && existing.owner_doctor_id == draft.owner_doctor_id
        && existing.name.folded() == draft.name.folded()
}

// ============================================================================
// PORT TRAITS
// ============================================================================

/// Storage of intervention records.
pub trait InterventionStore: Send + Sync {
    /// Persists a new record, assigning its id and audit timestamps.
    fn insert_intervention(&self, draft: InterventionDraft) -> StoreResult<Intervention>;

    /// Returns every record matching `filter`, in no particular order.
    fn find_interventions(&self, filter: &InterventionFilter) -> StoreResult<Vec<Intervention>>;

    fn get_intervention(&self, id: &ShardableUuid) -> StoreResult<Option<Intervention>>;

    /// Applies `patch` under the store's write lock; `Ok(None)` when no record has that id.
    ///
    /// Fails with [`StoreError::InvalidSchedule`], leaving the record as it was, if the merged
    /// schedule ends before it starts.
    fn update_intervention(
        &self,
        id: &ShardableUuid,
        patch: &InterventionPatch,
    ) -> StoreResult<Option<Intervention>>;

    /// Physically removes a record, returning it; `Ok(None)` when absent.
    fn delete_intervention(&self, id: &ShardableUuid) -> StoreResult<Option<Intervention>>;
}

/// Storage of nomenclature entries.
pub trait InterventionTypeStore: Send + Sync {
    /// Returns every entry matching `filter`, in no particular order.
    fn find_intervention_types(
        &self,
        filter: &InterventionTypeFilter,
    ) -> StoreResult<Vec<InterventionType>>;

    /// Returns one matching entry, preferring global entries, then the oldest.
    fn find_first_intervention_type(
        &self,
        filter: &InterventionTypeFilter,
    ) -> StoreResult<Option<InterventionType>> {
        Ok(self
            .find_intervention_types(filter)?
            .into_iter()
            .min_by(|a, b| {
                (a.owner_doctor_id.is_some(), a.created_at, &a.id).cmp(&(
                    b.owner_doctor_id.is_some(),
                    b.created_at,
                    &b.id,
                ))
            }))
    }

    /// Persists a new entry.
    ///
    /// Fails with [`StoreError::UniqueViolation`] if an active entry with the same owner and
    /// case-folded name exists.
    fn insert_intervention_type(&self, draft: InterventionTypeDraft) -> StoreResult<InterventionType>;
}

/// A complete backing store for both engines.
pub trait Store: InterventionStore + InterventionTypeStore {
    /// Cheap liveness probe used by health checks.
    fn ping(&self) -> StoreResult<()>;
}
