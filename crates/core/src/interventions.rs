//! Intervention lifecycle and queries.

use crate::attachments;
use crate::constants::DEFAULT_UPCOMING_DAYS;
use crate::model::{
    validate_schedule, Intervention, InterventionDraft, InterventionPatch, NewIntervention,
};
use crate::store::{InterventionFilter, InterventionStore};
use crate::{MeditacheError, MeditacheResult};
use chrono::{DateTime, Duration, Utc};
use meditache_types::ActorId;
use meditache_uuid::ShardableUuid;
use std::sync::Arc;

/// Service for creating, querying, updating and removing interventions.
///
/// Stateless apart from the store handle; clones share the same store.
#[derive(Debug)]
pub struct InterventionService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for InterventionService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> InterventionService<S>
where
    S: InterventionStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates an intervention on behalf of `created_by`.
    ///
    /// Status defaults to `PLANNED`, priority to `MEDIUM`, and the attachment list starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`MeditacheError::Validation`] if the scheduled end precedes the scheduled start.
    pub fn create(
        &self,
        new: NewIntervention,
        created_by: ActorId,
    ) -> MeditacheResult<Intervention> {
        validate_schedule(new.scheduled_start, new.scheduled_end)?;

        let draft = InterventionDraft {
            doctor_id: new.doctor_id,
            intervention_type_id: new.intervention_type_id,
            title: new.title,
            notes: new.notes,
            scheduled_start: new.scheduled_start,
            scheduled_end: new.scheduled_end,
            priority: new.priority.unwrap_or_default(),
            status: new.status.unwrap_or_default(),
            report_attachments: Vec::new(),
            created_by,
        };

        let created = self.store.insert_intervention(draft)?;
        tracing::info!(
            "created intervention {} for doctor {} ({})",
            created.id,
            created.doctor_id,
            created.status
        );
        Ok(created)
    }

    /// Returns interventions matching `filter`, ordered by scheduled start, then creation time,
    /// then id.
    pub fn find_all(&self, filter: &InterventionFilter) -> MeditacheResult<Vec<Intervention>> {
        let mut found = self.store.find_interventions(filter)?;
        sort_schedule(&mut found);
        tracing::debug!("found {} interventions for {:?}", found.len(), filter);
        Ok(found)
    }

    /// Returns interventions starting within the next `days` days (7 when `None`), whatever
    /// their status.
    pub fn upcoming(&self, days: Option<u32>) -> MeditacheResult<Vec<Intervention>> {
        self.upcoming_from(Utc::now(), days)
    }

    /// [`upcoming`](Self::upcoming) evaluated against an explicit clock reading.
    ///
    /// The window `[now, now + days]` is inclusive at both ends.
    ///
    /// # Errors
    ///
    /// Returns [`MeditacheError::Validation`] if `days` is zero or the window end overflows the
    /// representable time range.
    pub fn upcoming_from(
        &self,
        now: DateTime<Utc>,
        days: Option<u32>,
    ) -> MeditacheResult<Vec<Intervention>> {
        let days = days.unwrap_or(DEFAULT_UPCOMING_DAYS);
        if days == 0 {
            return Err(MeditacheError::Validation(
                "days must be a positive integer".into(),
            ));
        }

        let until = now
            .checked_add_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| MeditacheError::Validation(format!("days {} is out of range", days)))?;

        self.find_all(&InterventionFilter::scheduled_between(now, until))
    }

    /// # Errors
    ///
    /// Returns [`MeditacheError::NotFound`] if no intervention has this id.
    pub fn find_one(&self, id: &ShardableUuid) -> MeditacheResult<Intervention> {
        self.store
            .get_intervention(id)?
            .ok_or_else(|| MeditacheError::intervention_not_found(id))
    }

    /// Applies a partial update. A supplied attachment list replaces the stored one.
    ///
    /// # Errors
    ///
    /// - [`MeditacheError::NotFound`] if no intervention has this id.
    /// - [`MeditacheError::Validation`] if the resulting schedule ends before it starts.
    pub fn update(
        &self,
        id: &ShardableUuid,
        patch: &InterventionPatch,
    ) -> MeditacheResult<Intervention> {
        let updated = self
            .store
            .update_intervention(id, patch)?
            .ok_or_else(|| MeditacheError::intervention_not_found(id))?;

        tracing::debug!("updated intervention {}", updated.id);
        Ok(updated)
    }

    /// Appends `new_references` to the intervention's attachment list.
    ///
    /// Existing references keep their order and duplicates are preserved.
    pub fn append_report_attachments(
        &self,
        id: &ShardableUuid,
        new_references: Vec<String>,
    ) -> MeditacheResult<Intervention> {
        let current = self.find_one(id)?;
        let added = new_references.len();
        let merged = attachments::append(current.report_attachments, new_references);

        let updated = self.update(id, &InterventionPatch::attachments(merged))?;
        tracing::info!(
            "attached {} report file(s) to intervention {}",
            added,
            updated.id
        );
        Ok(updated)
    }

    /// Deletes an intervention and returns the removed record.
    ///
    /// # Errors
    ///
    /// Returns [`MeditacheError::NotFound`] if no intervention has this id.
    pub fn remove(&self, id: &ShardableUuid) -> MeditacheResult<Intervention> {
        let removed = self
            .store
            .delete_intervention(id)?
            .ok_or_else(|| MeditacheError::intervention_not_found(id))?;

        tracing::info!("removed intervention {}", removed.id);
        Ok(removed)
    }
}

fn sort_schedule(interventions: &mut [Intervention]) {
    interventions.sort_by(|a, b| {
        (a.scheduled_start, a.created_at, &a.id).cmp(&(b.scheduled_start, b.created_at, &b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InterventionStatus, Priority};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use meditache_types::NonEmptyText;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 10, 12, 0, 0).unwrap()
    }

    fn actor(id: &str) -> ActorId {
        ActorId::new(id).unwrap()
    }

    fn service() -> InterventionService<MemoryStore> {
        InterventionService::new(Arc::new(MemoryStore::new()))
    }

    fn new_at(doctor: &str, title: &str, start: DateTime<Utc>) -> NewIntervention {
        NewIntervention {
            doctor_id: actor(doctor),
            intervention_type_id: None,
            title: NonEmptyText::new(title).unwrap(),
            notes: None,
            scheduled_start: start,
            scheduled_end: None,
            priority: None,
            status: None,
        }
    }

    fn titles(found: &[Intervention]) -> Vec<&str> {
        found.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn create_applies_defaults() {
        let svc = service();

        let created = svc
            .create(new_at("d1", "Suture removal", now()), actor("admin"))
            .unwrap();

        assert_eq!(created.status, InterventionStatus::Planned);
        assert_eq!(created.priority, Priority::Medium);
        assert!(created.report_attachments.is_empty());
        assert_eq!(created.created_by, actor("admin"));
    }

    #[test]
    fn create_keeps_explicit_status_and_priority() {
        let svc = service();
        let mut new = new_at("d1", "Triage", now());
        new.status = Some(InterventionStatus::InProgress);
        new.priority = Some(Priority::Urgent);

        let created = svc.create(new, actor("d1")).unwrap();

        assert_eq!(created.status, InterventionStatus::InProgress);
        assert_eq!(created.priority, Priority::Urgent);
    }

    #[test]
    fn create_rejects_end_before_start() {
        let svc = service();
        let mut new = new_at("d1", "Backwards", now());
        new.scheduled_end = Some(now() - Duration::hours(1));

        assert!(matches!(
            svc.create(new, actor("d1")),
            Err(MeditacheError::Validation(_))
        ));
    }

    #[test]
    fn find_all_filters_conjunctively_and_orders_by_schedule() {
        let svc = service();
        svc.create(new_at("d1", "Later", now() + Duration::days(2)), actor("a"))
            .unwrap();
        svc.create(new_at("d1", "Sooner", now() + Duration::days(1)), actor("a"))
            .unwrap();
        svc.create(new_at("d2", "Elsewhere", now()), actor("a"))
            .unwrap();
        let mut urgent = new_at("d1", "Urgent", now() + Duration::days(3));
        urgent.priority = Some(Priority::Urgent);
        svc.create(urgent, actor("a")).unwrap();

        let all = svc.find_all(&InterventionFilter::default()).unwrap();
        assert_eq!(titles(&all), vec!["Elsewhere", "Sooner", "Later", "Urgent"]);

        let d1_medium = svc
            .find_all(&InterventionFilter {
                doctor_id: Some(actor("d1")),
                priority: Some(Priority::Medium),
                ..InterventionFilter::default()
            })
            .unwrap();
        assert_eq!(titles(&d1_medium), vec!["Sooner", "Later"]);

        let bounded = svc
            .find_all(&InterventionFilter {
                from: Some(now() + Duration::days(1)),
                to: Some(now() + Duration::days(2)),
                ..InterventionFilter::default()
            })
            .unwrap();
        assert_eq!(titles(&bounded), vec!["Sooner", "Later"]);
    }

    #[test]
    fn upcoming_window_is_inclusive_and_ignores_status() {
        let svc = service();
        svc.create(new_at("d1", "Past", now() - Duration::seconds(1)), actor("a"))
            .unwrap();
        svc.create(new_at("d1", "Now", now()), actor("a")).unwrap();
        let mut done = new_at("d1", "Done edge", now() + Duration::days(7));
        done.status = Some(InterventionStatus::Done);
        svc.create(done, actor("a")).unwrap();
        let mut canceled = new_at("d1", "Canceled", now() + Duration::days(3));
        canceled.status = Some(InterventionStatus::Canceled);
        svc.create(canceled, actor("a")).unwrap();
        svc.create(
            new_at("d1", "Beyond", now() + Duration::days(7) + Duration::seconds(1)),
            actor("a"),
        )
        .unwrap();

        let week = svc.upcoming_from(now(), None).unwrap();
        assert_eq!(titles(&week), vec!["Now", "Canceled", "Done edge"]);

        let one_day = svc.upcoming_from(now(), Some(1)).unwrap();
        assert_eq!(titles(&one_day), vec!["Now"]);
    }

    #[test]
    fn upcoming_rejects_zero_and_overflowing_windows() {
        let svc = service();

        assert!(matches!(
            svc.upcoming_from(now(), Some(0)),
            Err(MeditacheError::Validation(_))
        ));
        assert!(matches!(
            svc.upcoming_from(now(), Some(u32::MAX)),
            Err(MeditacheError::Validation(_))
        ));
    }

    #[test]
    fn find_one_reports_not_found() {
        let svc = service();

        assert!(matches!(
            svc.find_one(&ShardableUuid::new()),
            Err(MeditacheError::NotFound { .. })
        ));
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let svc = service();
        let created = svc
            .create(new_at("d1", "Cast check", now()), actor("a"))
            .unwrap();

        let updated = svc
            .update(
                &created.id,
                &InterventionPatch {
                    notes: Some(Some("swelling reduced".into())),
                    priority: Some(Priority::High),
                    ..InterventionPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.notes.as_deref(), Some("swelling reduced"));
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.status, created.status);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn update_rejects_schedule_inversion_and_missing_ids() {
        let svc = service();
        let created = svc
            .create(new_at("d1", "Cast check", now()), actor("a"))
            .unwrap();

        let inverted = InterventionPatch {
            scheduled_end: Some(Some(now() - Duration::minutes(30))),
            ..InterventionPatch::default()
        };
        assert!(matches!(
            svc.update(&created.id, &inverted),
            Err(MeditacheError::Validation(_))
        ));
        assert_eq!(svc.find_one(&created.id).unwrap(), created);

        assert!(matches!(
            svc.update(&ShardableUuid::new(), &InterventionPatch::default()),
            Err(MeditacheError::NotFound { .. })
        ));
    }

    #[test]
    fn update_with_explicit_none_clears_scheduled_end_and_notes() {
        let svc = service();
        let mut new = new_at("d1", "Cast check", now());
        new.scheduled_end = Some(now() + Duration::hours(1));
        new.notes = Some("bring x-ray".into());
        let created = svc.create(new, actor("a")).unwrap();

        let cleared = svc
            .update(
                &created.id,
                &InterventionPatch {
                    scheduled_end: Some(None),
                    notes: Some(None),
                    ..InterventionPatch::default()
                },
            )
            .unwrap();

        assert_eq!(cleared.scheduled_end, None);
        assert_eq!(cleared.notes, None);
        assert_eq!(svc.find_one(&created.id).unwrap(), cleared);
    }

    #[test]
    fn sequential_updates_cannot_combine_into_inverted_schedule() {
        let svc = service();
        let created = svc
            .create(new_at("d1", "Cast check", now()), actor("a"))
            .unwrap();

        // Each patch is valid against the created record on its own.
        let later_start = InterventionPatch {
            scheduled_start: Some(now() + Duration::hours(2)),
            ..InterventionPatch::default()
        };
        let early_end = InterventionPatch {
            scheduled_end: Some(Some(now() + Duration::hours(1))),
            ..InterventionPatch::default()
        };

        svc.update(&created.id, &later_start).unwrap();
        assert!(matches!(
            svc.update(&created.id, &early_end),
            Err(MeditacheError::Validation(_))
        ));

        let stored = svc.find_one(&created.id).unwrap();
        assert_eq!(stored.scheduled_start, now() + Duration::hours(2));
        assert_eq!(stored.scheduled_end, None);
    }

    #[test]
    fn update_replaces_attachments_and_is_idempotent() {
        let svc = service();
        let created = svc
            .create(new_at("d1", "Scan review", now()), actor("a"))
            .unwrap();
        svc.append_report_attachments(&created.id, vec!["/old.png".into()])
            .unwrap();

        let patch = InterventionPatch::attachments(vec!["/x.png".into(), "/y.png".into()]);
        let once = svc.update(&created.id, &patch).unwrap();
        let twice = svc.update(&created.id, &patch).unwrap();

        assert_eq!(once.report_attachments, vec!["/x.png", "/y.png"]);
        assert_eq!(twice.report_attachments, once.report_attachments);
    }

    #[test]
    fn append_preserves_order_and_duplicates() {
        let svc = service();
        let created = svc
            .create(new_at("d1", "Scan review", now()), actor("a"))
            .unwrap();

        svc.append_report_attachments(&created.id, vec!["/scan.png".into()])
            .unwrap();
        let updated = svc
            .append_report_attachments(&created.id, vec!["/ecg.pdf".into(), "/scan.png".into()])
            .unwrap();

        assert_eq!(
            updated.report_attachments,
            vec!["/scan.png", "/ecg.pdf", "/scan.png"]
        );
        assert!(matches!(
            svc.append_report_attachments(&ShardableUuid::new(), vec!["/a.png".into()]),
            Err(MeditacheError::NotFound { .. })
        ));
    }

    #[test]
    fn remove_is_terminal() {
        let svc = service();
        let created = svc
            .create(new_at("d1", "Dressing", now()), actor("a"))
            .unwrap();

        let removed = svc.remove(&created.id).unwrap();
        assert_eq!(removed.id, created.id);

        assert!(matches!(
            svc.find_one(&created.id),
            Err(MeditacheError::NotFound { .. })
        ));
        assert!(matches!(
            svc.remove(&created.id),
            Err(MeditacheError::NotFound { .. })
        ));
    }

    #[test]
    fn planned_intervention_can_be_completed() {
        let svc = service();
        let created = svc
            .create(new_at("d1", "Physio session", now()), actor("d1"))
            .unwrap();
        assert_eq!(created.status, InterventionStatus::Planned);

        let started = svc
            .update(&created.id, &InterventionPatch::status(InterventionStatus::InProgress))
            .unwrap();
        assert_eq!(started.status, InterventionStatus::InProgress);

        let done = svc
            .update(&created.id, &InterventionPatch::status(InterventionStatus::Done))
            .unwrap();
        assert_eq!(done.status, InterventionStatus::Done);
        assert!(done.updated_at >= created.updated_at);

        let listed = svc
            .find_all(&InterventionFilter {
                status: Some(InterventionStatus::Done),
                ..InterventionFilter::default()
            })
            .unwrap();
        assert_eq!(listed, vec![done]);
    }
}
