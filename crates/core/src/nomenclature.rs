//! Intervention-type nomenclature.
//!
//! The catalog holds global entries (no owner) and entries private to one doctor. A doctor sees
//! the global entries plus their own. Creating a name that already exists in the caller's
//! visible scope returns the existing entry instead of inserting a duplicate, so creation is
//! idempotent from the caller's point of view.

use crate::model::{InterventionType, InterventionTypeDraft};
use crate::store::{
    InterventionTypeFilter, InterventionTypeStore, NameMatch, OwnerScope, StoreError,
};
use crate::{MeditacheError, MeditacheResult};
use meditache_types::{ActorId, NonEmptyText};
use std::sync::Arc;

/// Service for listing and creating nomenclature entries.
#[derive(Debug)]
pub struct InterventionTypeService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for InterventionTypeService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> InterventionTypeService<S>
where
    S: InterventionTypeStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Lists active entries visible to `doctor_id` (global only when `None`).
    ///
    /// A non-blank `search` keeps entries whose name contains it, ignoring case. Results are
    /// global entries first, then by case-insensitive name.
    pub fn list(
        &self,
        search: Option<&str>,
        doctor_id: Option<&ActorId>,
    ) -> MeditacheResult<Vec<InterventionType>> {
        let filter = InterventionTypeFilter {
            active_only: true,
            name: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(NameMatch::contains),
            scope: OwnerScope::for_doctor(doctor_id.cloned()),
        };

        let mut entries = self.store.find_intervention_types(&filter)?;
        entries.sort_by(|a, b| {
            (a.owner_doctor_id.is_some(), a.name.folded(), a.name.as_str()).cmp(&(
                b.owner_doctor_id.is_some(),
                b.name.folded(),
                b.name.as_str(),
            ))
        });

        tracing::debug!(
            "listed {} intervention types (search={:?}, doctor={:?})",
            entries.len(),
            search,
            doctor_id.map(ActorId::as_str)
        );
        Ok(entries)
    }

    /// Returns the visible entry named `name`, creating one owned by `doctor_id` if none exists.
    ///
    /// The lookup considers active entries in the global scope plus the doctor's own, so a
    /// doctor asking for a name that exists globally gets the global entry back.
    ///
    /// # Errors
    ///
    /// - [`MeditacheError::Validation`] if `name` is blank after trimming.
    /// - [`MeditacheError::Conflict`] if the store rejects the insert as a duplicate and the
    ///   conflicting entry cannot then be found.
    pub fn create(
        &self,
        name: &str,
        doctor_id: Option<ActorId>,
    ) -> MeditacheResult<InterventionType> {
        let name = NonEmptyText::new(name)
            .map_err(|_| MeditacheError::Validation("name required".into()))?;

        let lookup = InterventionTypeFilter {
            active_only: true,
            name: Some(NameMatch::equals(name.as_str())),
            scope: OwnerScope::for_doctor(doctor_id.clone()),
        };

        if let Some(existing) = self.store.find_first_intervention_type(&lookup)? {
            tracing::debug!("reusing intervention type {} for '{}'", existing.id, name);
            return Ok(existing);
        }

        let draft = InterventionTypeDraft {
            name,
            owner_doctor_id: doctor_id,
        };

        match self.store.insert_intervention_type(draft) {
            Ok(created) => {
                tracing::info!(
                    "created intervention type {} '{}' (owner={:?})",
                    created.id,
                    created.name,
                    created.owner_doctor_id.as_ref().map(ActorId::as_str)
                );
                Ok(created)
            }
            // Lost a race with a concurrent create: return the winner.
            Err(StoreError::UniqueViolation(detail)) => self
                .store
                .find_first_intervention_type(&lookup)?
                .ok_or(MeditacheError::Conflict(detail)),
            Err(e) => Err(e.into()),
        }
    }
}
