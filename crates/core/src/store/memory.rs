use super::{
    violates_unique_name, InterventionFilter, InterventionStore, InterventionTypeFilter,
    InterventionTypeStore, Store, StoreError, StoreResult,
};
use crate::model::{
    Intervention, InterventionDraft, InterventionPatch, InterventionType, InterventionTypeDraft,
};
use chrono::Utc;
use meditache_uuid::ShardableUuid;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-process store. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    interventions: RwLock<BTreeMap<ShardableUuid, Intervention>>,
    intervention_types: RwLock<BTreeMap<ShardableUuid, InterventionType>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a nomenclature entry verbatim, bypassing the unique check.
    #[cfg(test)]
    pub(crate) fn seed_intervention_type(&self, entry: InterventionType) {
        self.intervention_types
            .write()
            .expect("lock")
            .insert(entry.id.clone(), entry);
    }
}

impl InterventionStore for MemoryStore {
    fn insert_intervention(&self, draft: InterventionDraft) -> StoreResult<Intervention> {
        let mut map = self
            .interventions
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;

        let mut id = ShardableUuid::new();
        while map.contains_key(&id) {
            id = ShardableUuid::new();
        }

        let record = draft.into_record(id.clone(), Utc::now());
        map.insert(id, record.clone());
        Ok(record)
    }

    fn find_interventions(&self, filter: &InterventionFilter) -> StoreResult<Vec<Intervention>> {
        let map = self
            .interventions
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.values().filter(|i| filter.matches(i)).cloned().collect())
    }

    fn get_intervention(&self, id: &ShardableUuid) -> StoreResult<Option<Intervention>> {
        let map = self
            .interventions
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(id).cloned())
    }

    fn update_intervention(
        &self,
        id: &ShardableUuid,
        patch: &InterventionPatch,
    ) -> StoreResult<Option<Intervention>> {
        let mut map = self
            .interventions
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;

        let Some(record) = map.get_mut(id) else {
            return Ok(None);
        };
        patch.apply_checked(record, Utc::now())?;
        Ok(Some(record.clone()))
    }

    fn delete_intervention(&self, id: &ShardableUuid) -> StoreResult<Option<Intervention>> {
        let mut map = self
            .interventions
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.remove(id))
    }
}

impl InterventionTypeStore for MemoryStore {
    fn find_intervention_types(
        &self,
        filter: &InterventionTypeFilter,
    ) -> StoreResult<Vec<InterventionType>> {
        let map = self
            .intervention_types
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.values().filter(|t| filter.matches(t)).cloned().collect())
    }

    fn insert_intervention_type(&self, draft: InterventionTypeDraft) -> StoreResult<InterventionType> {
        let mut map = self
            .intervention_types
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;

        if map.values().any(|existing| violates_unique_name(existing, &draft)) {
            return Err(StoreError::UniqueViolation(format!(
                "intervention type '{}' already exists for this owner",
                draft.name
            )));
        }

        let mut id = ShardableUuid::new();
        while map.contains_key(&id) {
            id = ShardableUuid::new();
        }

        let record = draft.into_record(id.clone(), Utc::now());
        map.insert(id, record.clone());
        Ok(record)
    }
}

impl Store for MemoryStore {
    fn ping(&self) -> StoreResult<()> {
        self.interventions
            .read()
            .map_err(|_| StoreError::LockPoisoned)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InterventionStatus, Priority};
    use crate::store::{NameMatch, OwnerScope};
    use chrono::{Duration, TimeZone};
    use meditache_types::{ActorId, NonEmptyText};

    fn draft(doctor: &str, title: &str, hours_from_base: i64) -> InterventionDraft {
        let base = Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap();
        InterventionDraft {
            doctor_id: ActorId::new(doctor).unwrap(),
            intervention_type_id: None,
            title: NonEmptyText::new(title).unwrap(),
            notes: None,
            scheduled_start: base + Duration::hours(hours_from_base),
            scheduled_end: None,
            priority: Priority::Medium,
            status: InterventionStatus::Planned,
            report_attachments: vec![],
            created_by: ActorId::new("admin").unwrap(),
        }
    }

    fn type_draft(name: &str, owner: Option<&str>) -> InterventionTypeDraft {
        InterventionTypeDraft {
            name: NonEmptyText::new(name).unwrap(),
            owner_doctor_id: owner.map(|o| ActorId::new(o).unwrap()),
        }
    }

    #[test]
    fn insert_assigns_identity_and_timestamps() {
        let store = MemoryStore::new();

        let a = store.insert_intervention(draft("d1", "Suture", 0)).unwrap();
        let b = store.insert_intervention(draft("d1", "Suture", 0)).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);
        assert_eq!(store.get_intervention(&a.id).unwrap(), Some(a));
    }

    #[test]
    fn find_applies_every_filter_field() {
        let store = MemoryStore::new();
        store.insert_intervention(draft("d1", "Early", 0)).unwrap();
        let mid = store.insert_intervention(draft("d1", "Mid", 5)).unwrap();
        store.insert_intervention(draft("d2", "Other doctor", 5)).unwrap();
        store.insert_intervention(draft("d1", "Late", 10)).unwrap();

        let filter = InterventionFilter {
            doctor_id: Some(ActorId::new("d1").unwrap()),
            ..InterventionFilter::scheduled_between(mid.scheduled_start, mid.scheduled_start)
        };

        let found = store.find_interventions(&filter).unwrap();
        assert_eq!(found, vec![mid]);
    }

    #[test]
    fn update_and_delete_missing_ids_return_none() {
        let store = MemoryStore::new();
        let id = ShardableUuid::new();

        assert!(
            store
                .update_intervention(&id, &InterventionPatch::status(InterventionStatus::Done))
                .unwrap()
                .is_none()
        );
        assert!(store.delete_intervention(&id).unwrap().is_none());
    }

    #[test]
    fn racing_updates_never_persist_an_inverted_schedule() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let created = store.insert_intervention(draft("d1", "Suture", 0)).unwrap();
        let start = created.scheduled_start;

        let later_start = InterventionPatch {
            scheduled_start: Some(start + Duration::hours(2)),
            ..InterventionPatch::default()
        };
        let early_end = InterventionPatch {
            scheduled_end: Some(Some(start + Duration::hours(1))),
            ..InterventionPatch::default()
        };

        let handles: Vec<_> = [later_start, early_end]
            .into_iter()
            .map(|patch| {
                let store = std::sync::Arc::clone(&store);
                let id = created.id.clone();
                std::thread::spawn(move || store.update_intervention(&id, &patch))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(StoreError::InvalidSchedule(_))))
        );

        let stored = store.get_intervention(&created.id).unwrap().unwrap();
        if let Some(end) = stored.scheduled_end {
            assert!(end >= stored.scheduled_start);
        }
    }

    #[test]
    fn delete_removes_record() {
        let store = MemoryStore::new();
        let created = store.insert_intervention(draft("d1", "Suture", 0)).unwrap();

        let removed = store.delete_intervention(&created.id).unwrap();

        assert_eq!(removed, Some(created.clone()));
        assert!(store.get_intervention(&created.id).unwrap().is_none());
    }

    #[test]
    fn insert_type_enforces_owner_scoped_unique_name() {
        let store = MemoryStore::new();
        store.insert_intervention_type(type_draft("X-Ray", None)).unwrap();

        let dup = store.insert_intervention_type(type_draft("x-ray", None));
        assert!(matches!(dup, Err(StoreError::UniqueViolation(_))));

        store
            .insert_intervention_type(type_draft("x-ray", Some("d1")))
            .unwrap();
    }

    #[test]
    fn inactive_entries_do_not_block_inserts() {
        let store = MemoryStore::new();
        let mut retired = type_draft("Biopsy", None).into_record(ShardableUuid::new(), Utc::now());
        retired.active = false;
        store.seed_intervention_type(retired);

        store.insert_intervention_type(type_draft("Biopsy", None)).unwrap();

        let all = store
            .find_intervention_types(&InterventionTypeFilter {
                active_only: false,
                name: Some(NameMatch::equals("biopsy")),
                scope: OwnerScope::Global,
            })
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn find_first_prefers_global_entry() {
        let store = MemoryStore::new();
        store
            .insert_intervention_type(type_draft("Ultrasound", Some("d1")))
            .unwrap();
        let global = store
            .insert_intervention_type(type_draft("Ultrasound", None))
            .unwrap();

        let first = store
            .find_first_intervention_type(&InterventionTypeFilter {
                active_only: true,
                name: Some(NameMatch::equals("ultrasound")),
                scope: OwnerScope::for_doctor(Some(ActorId::new("d1").unwrap())),
            })
            .unwrap();

        assert_eq!(first, Some(global));
    }

    #[test]
    fn ping_succeeds() {
        assert!(MemoryStore::new().ping().is_ok());
    }
}
