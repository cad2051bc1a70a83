//! File-backed store.
//!
//! Layout under the data directory:
//!
//! ```text
//! interventions/<s1>/<s2>/<id>/intervention.yaml
//! intervention-types/<s1>/<s2>/<id>/intervention-type.yaml
//! ```
//!
//! where `s1`/`s2` are the first two byte pairs of the canonical id. Documents are written via a
//! temporary file and a rename so readers never observe a partial write. Mutations are
//! serialised through a lock owned by each `FileStore` value; the nomenclature unique check
//! relies on it. Two processes opening the same data directory do not share that lock, so run
//! one writer per directory.

use super::{
    violates_unique_name, InterventionFilter, InterventionStore, InterventionTypeFilter,
    InterventionTypeStore, Store, StoreError, StoreResult,
};
use crate::attachments;
use crate::constants::{
    INTERVENTIONS_DIR_NAME, INTERVENTION_FILENAME, INTERVENTION_TYPES_DIR_NAME,
    INTERVENTION_TYPE_FILENAME,
};
use crate::model::{
    Intervention, InterventionDraft, InterventionPatch, InterventionStatus, InterventionType,
    InterventionTypeDraft, Priority,
};
use chrono::{DateTime, Utc};
use meditache_types::{ActorId, NonEmptyText};
use meditache_uuid::ShardableUuid;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// On-disk shape of an intervention.
///
/// Attachments are kept as a JSON text column so the file format matches the relational export;
/// it is decoded tolerantly on read.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct InterventionWire {
    id: ShardableUuid,
    doctor_id: ActorId,
    #[serde(default)]
    intervention_type_id: Option<ShardableUuid>,
    title: NonEmptyText,
    #[serde(default)]
    notes: Option<String>,
    scheduled_start: DateTime<Utc>,
    #[serde(default)]
    scheduled_end: Option<DateTime<Utc>>,
    priority: Priority,
    status: InterventionStatus,
    #[serde(default)]
    report_attachments: Option<String>,
    created_by: ActorId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Intervention> for InterventionWire {
    fn from(record: &Intervention) -> Self {
        Self {
            id: record.id.clone(),
            doctor_id: record.doctor_id.clone(),
            intervention_type_id: record.intervention_type_id.clone(),
            title: record.title.clone(),
            notes: record.notes.clone(),
            scheduled_start: record.scheduled_start,
            scheduled_end: record.scheduled_end,
            priority: record.priority,
            status: record.status,
            report_attachments: Some(attachments::encode(&record.report_attachments)),
            created_by: record.created_by.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<InterventionWire> for Intervention {
    fn from(wire: InterventionWire) -> Self {
        Self {
            report_attachments: attachments::decode(wire.report_attachments.as_deref()),
            id: wire.id,
            doctor_id: wire.doctor_id,
            intervention_type_id: wire.intervention_type_id,
            title: wire.title,
            notes: wire.notes,
            scheduled_start: wire.scheduled_start,
            scheduled_end: wire.scheduled_end,
            priority: wire.priority,
            status: wire.status,
            created_by: wire.created_by,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct InterventionTypeWire {
    id: ShardableUuid,
    name: NonEmptyText,
    #[serde(default)]
    owner_doctor_id: Option<ActorId>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<&InterventionType> for InterventionTypeWire {
    fn from(record: &InterventionType) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            owner_doctor_id: record.owner_doctor_id.clone(),
            active: record.active,
            created_at: record.created_at,
        }
    }
}

impl From<InterventionTypeWire> for InterventionType {
    fn from(wire: InterventionTypeWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            owner_doctor_id: wire.owner_doctor_id,
            active: wire.active,
            created_at: wire.created_at,
        }
    }
}

/// Store persisting each record as a YAML document in a sharded directory tree.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the record directories cannot be created.
    pub fn open(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = data_dir.into();
        for dir in [
            root.join(INTERVENTIONS_DIR_NAME),
            root.join(INTERVENTION_TYPES_DIR_NAME),
        ] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }

        tracing::debug!("opened file store at {}", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn interventions_dir(&self) -> PathBuf {
        self.root.join(INTERVENTIONS_DIR_NAME)
    }

    fn intervention_types_dir(&self) -> PathBuf {
        self.root.join(INTERVENTION_TYPES_DIR_NAME)
    }

    fn intervention_path(&self, id: &ShardableUuid) -> PathBuf {
        id.sharded_dir(&self.interventions_dir())
            .join(INTERVENTION_FILENAME)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn read_intervention(&self, id: &ShardableUuid) -> StoreResult<Option<Intervention>> {
        let path = self.intervention_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        read_yaml::<InterventionWire>(&path).map(|wire| Some(wire.into()))
    }
}

impl InterventionStore for FileStore {
    fn insert_intervention(&self, draft: InterventionDraft) -> StoreResult<Intervention> {
        let _guard = self.lock()?;

        let (id, dir) = allocate_record_dir(&self.interventions_dir())?;
        let record = draft.into_record(id, Utc::now());

        if let Err(e) = write_yaml(
            &dir.join(INTERVENTION_FILENAME),
            &InterventionWire::from(&record),
        ) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }

        Ok(record)
    }

    fn find_interventions(&self, filter: &InterventionFilter) -> StoreResult<Vec<Intervention>> {
        Ok(
            scan_records::<InterventionWire>(&self.interventions_dir(), INTERVENTION_FILENAME)?
                .into_iter()
                .map(Intervention::from)
                .filter(|i| filter.matches(i))
                .collect(),
        )
    }

    fn get_intervention(&self, id: &ShardableUuid) -> StoreResult<Option<Intervention>> {
        self.read_intervention(id)
    }

    fn update_intervention(
        &self,
        id: &ShardableUuid,
        patch: &InterventionPatch,
    ) -> StoreResult<Option<Intervention>> {
        let _guard = self.lock()?;

        let Some(mut record) = self.read_intervention(id)? else {
            return Ok(None);
        };
        patch.apply_checked(&mut record, Utc::now())?;
        write_yaml(&self.intervention_path(id), &InterventionWire::from(&record))?;

        Ok(Some(record))
    }

    fn delete_intervention(&self, id: &ShardableUuid) -> StoreResult<Option<Intervention>> {
        let _guard = self.lock()?;

        let Some(record) = self.read_intervention(id)? else {
            return Ok(None);
        };
        let dir = id.sharded_dir(&self.interventions_dir());
        fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        Ok(Some(record))
    }
}

impl InterventionTypeStore for FileStore {
    fn find_intervention_types(
        &self,
        filter: &InterventionTypeFilter,
    ) -> StoreResult<Vec<InterventionType>> {
        Ok(scan_records::<InterventionTypeWire>(
            &self.intervention_types_dir(),
            INTERVENTION_TYPE_FILENAME,
        )?
        .into_iter()
        .map(InterventionType::from)
        .filter(|t| filter.matches(t))
        .collect())
    }

    fn insert_intervention_type(&self, draft: InterventionTypeDraft) -> StoreResult<InterventionType> {
        let _guard = self.lock()?;

        let base = self.intervention_types_dir();
        let existing =
            scan_records::<InterventionTypeWire>(&base, INTERVENTION_TYPE_FILENAME)?;
        if existing
            .into_iter()
            .map(InterventionType::from)
            .any(|entry| violates_unique_name(&entry, &draft))
        {
            return Err(StoreError::UniqueViolation(format!(
                "intervention type '{}' already exists for this owner",
                draft.name
            )));
        }

        let (id, dir) = allocate_record_dir(&base)?;
        let record = draft.into_record(id, Utc::now());

        if let Err(e) = write_yaml(
            &dir.join(INTERVENTION_TYPE_FILENAME),
            &InterventionTypeWire::from(&record),
        ) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }

        Ok(record)
    }
}

impl Store for FileStore {
    fn ping(&self) -> StoreResult<()> {
        fs::read_dir(&self.root)
            .map(|_| ())
            .map_err(|e| StoreError::io(&self.root, e))
    }
}

/// Allocates a fresh id and creates its sharded directory under `base_dir`.
///
/// Retries a bounded number of times if the candidate directory already exists.
fn allocate_record_dir(base_dir: &Path) -> StoreResult<(ShardableUuid, PathBuf)> {
    for _attempt in 0..MAX_ALLOCATION_ATTEMPTS {
        let id = ShardableUuid::new();
        let candidate = id.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((id, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StoreError::io(&candidate, e)),
        }
    }

    Err(StoreError::io(
        base_dir,
        std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!(
                "failed to allocate a unique record directory after {} attempts",
                MAX_ALLOCATION_ATTEMPTS
            ),
        ),
    ))
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let deserializer = serde_yaml::Deserializer::from_str(&text);

    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let field = err.path().to_string();
        let field = if field.is_empty() {
            "<root>".to_string()
        } else {
            field
        };
        StoreError::Deserialization {
            path: path.to_path_buf(),
            message: format!("{}: {}", field, err.into_inner()),
        }
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let text = serde_yaml::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Walks `<base>/<s1>/<s2>/<id>/<filename>` and parses every document found.
///
/// Documents that fail to parse are logged and skipped so one bad file cannot take a listing
/// down. Directory and read failures are returned.
fn scan_records<T: DeserializeOwned>(base: &Path, filename: &str) -> StoreResult<Vec<T>> {
    let mut records = Vec::new();

    for s1_path in subdirectories(base)? {
        for s2_path in subdirectories(&s1_path)? {
            for record_dir in subdirectories(&s2_path)? {
                let record_path = record_dir.join(filename);
                if !record_path.is_file() {
                    continue;
                }

                match read_yaml::<T>(&record_path) {
                    Ok(record) => records.push(record),
                    Err(e @ StoreError::Deserialization { .. }) => {
                        tracing::warn!("skipping unreadable record: {}", e)
                    }
                    // Removed between listing and reading.
                    Err(StoreError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(records)
}

fn subdirectories(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NameMatch, OwnerScope};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn draft(doctor: &str, title: &str) -> InterventionDraft {
        InterventionDraft {
            doctor_id: ActorId::new(doctor).unwrap(),
            intervention_type_id: None,
            title: NonEmptyText::new(title).unwrap(),
            notes: Some("left forearm".into()),
            scheduled_start: Utc.with_ymd_and_hms(2026, 6, 1, 10, 30, 0).unwrap(),
            scheduled_end: None,
            priority: Priority::High,
            status: InterventionStatus::Planned,
            report_attachments: vec!["/uploads/a.png".into()],
            created_by: ActorId::new("admin").unwrap(),
        }
    }

    fn type_draft(name: &str, owner: Option<&str>) -> InterventionTypeDraft {
        InterventionTypeDraft {
            name: NonEmptyText::new(name).unwrap(),
            owner_doctor_id: owner.map(|o| ActorId::new(o).unwrap()),
        }
    }

    fn rewrite_field(path: &Path, field: &str, value: serde_yaml::Value) {
        let text = fs::read_to_string(path).unwrap();
        let mut doc: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        doc[field] = value;
        fs::write(path, serde_yaml::to_string(&doc).unwrap()).unwrap();
    }

    #[test]
    fn records_persist_across_reopen() {
        let temp = TempDir::new().unwrap();
        let created = {
            let store = FileStore::open(temp.path()).unwrap();
            store.insert_intervention(draft("d1", "Cast removal")).unwrap()
        };

        let reopened = FileStore::open(temp.path()).unwrap();
        let loaded = reopened.get_intervention(&created.id).unwrap();

        assert_eq!(loaded, Some(created.clone()));
        assert!(
            reopened
                .intervention_path(&created.id)
                .starts_with(temp.path().join(INTERVENTIONS_DIR_NAME))
        );
    }

    #[test]
    fn corrupt_attachment_column_reads_as_empty_list() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        let created = store.insert_intervention(draft("d1", "Cast removal")).unwrap();

        rewrite_field(
            &store.intervention_path(&created.id),
            "report_attachments",
            serde_yaml::Value::String("not valid json".into()),
        );

        let loaded = store.get_intervention(&created.id).unwrap().unwrap();
        assert!(loaded.report_attachments.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected_with_field_path() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        let created = store.insert_intervention(draft("d1", "Cast removal")).unwrap();

        rewrite_field(
            &store.intervention_path(&created.id),
            "surprise",
            serde_yaml::Value::Bool(true),
        );

        let err = store.get_intervention(&created.id).unwrap_err();
        assert!(matches!(err, StoreError::Deserialization { .. }));
    }

    #[test]
    fn scans_skip_unparseable_documents() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        let good = store.insert_intervention(draft("d1", "Good")).unwrap();
        let bad = store.insert_intervention(draft("d1", "Bad")).unwrap();
        fs::write(store.intervention_path(&bad.id), "title: [unterminated").unwrap();

        let found = store
            .find_interventions(&InterventionFilter::default())
            .unwrap();

        assert_eq!(found, vec![good]);
    }

    #[test]
    fn update_rewrites_document() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        let created = store.insert_intervention(draft("d1", "Cast removal")).unwrap();

        let updated = store
            .update_intervention(
                &created.id,
                &InterventionPatch::attachments(vec!["/uploads/b.png".into()]),
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.report_attachments, vec!["/uploads/b.png"]);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(store.get_intervention(&created.id).unwrap(), Some(updated));
        assert!(
            store
                .update_intervention(&ShardableUuid::new(), &InterventionPatch::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn delete_removes_record_directory() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        let created = store.insert_intervention(draft("d1", "Cast removal")).unwrap();
        let dir = created.id.sharded_dir(&store.interventions_dir());

        let removed = store.delete_intervention(&created.id).unwrap();

        assert_eq!(removed, Some(created.clone()));
        assert!(!dir.exists());
        assert!(store.delete_intervention(&created.id).unwrap().is_none());
    }

    #[test]
    fn type_insert_enforces_unique_name_per_owner() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        store.insert_intervention_type(type_draft("ECG", None)).unwrap();

        assert!(matches!(
            store.insert_intervention_type(type_draft("ecg ", None)),
            Err(StoreError::UniqueViolation(_))
        ));
        store
            .insert_intervention_type(type_draft("ECG", Some("d1")))
            .unwrap();

        let visible = store
            .find_intervention_types(&InterventionTypeFilter {
                active_only: true,
                name: Some(NameMatch::contains("ec")),
                scope: OwnerScope::for_doctor(Some(ActorId::new("d1").unwrap())),
            })
            .unwrap();
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn update_rejects_inverted_schedule_without_writing() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();
        let created = store.insert_intervention(draft("d1", "Cast removal")).unwrap();

        let inverted = InterventionPatch {
            scheduled_end: Some(Some(created.scheduled_start - chrono::Duration::hours(1))),
            ..InterventionPatch::default()
        };

        assert!(matches!(
            store.update_intervention(&created.id, &inverted),
            Err(StoreError::InvalidSchedule(_))
        ));
        assert_eq!(store.get_intervention(&created.id).unwrap(), Some(created));
    }

    #[test]
    fn scans_report_a_vanished_data_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let store = FileStore::open(&root).unwrap();
        store.insert_intervention(draft("d1", "Cast removal")).unwrap();

        fs::remove_dir_all(&root).unwrap();

        assert!(matches!(
            store.find_interventions(&InterventionFilter::default()),
            Err(StoreError::Io { .. })
        ));
        assert!(matches!(
            store.find_intervention_types(&InterventionTypeFilter {
                active_only: false,
                name: None,
                scope: OwnerScope::Global,
            }),
            Err(StoreError::Io { .. })
        ));
        assert!(matches!(
            store.insert_intervention_type(type_draft("ECG", None)),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn ping_fails_when_root_is_gone() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let store = FileStore::open(&root).unwrap();
        assert!(store.ping().is_ok());

        fs::remove_dir_all(&root).unwrap();
        assert!(matches!(store.ping(), Err(StoreError::Io { .. })));
    }
}
