//! Constants used throughout the Meditache core crate.
//!
//! Path and filename constants live here so the on-disk layout is defined in one place.

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "meditache_data";

/// Default directory for uploaded report attachments.
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Directory name for intervention records.
pub const INTERVENTIONS_DIR_NAME: &str = "interventions";

/// Directory name for nomenclature entries.
pub const INTERVENTION_TYPES_DIR_NAME: &str = "intervention-types";

/// Filename of a stored intervention record.
pub const INTERVENTION_FILENAME: &str = "intervention.yaml";

/// Filename of a stored nomenclature entry.
pub const INTERVENTION_TYPE_FILENAME: &str = "intervention-type.yaml";

/// Upload collection holding intervention report attachments.
pub const ATTACHMENTS_COLLECTION: &str = "interventions";

/// Look-ahead used by the upcoming view when the caller gives none.
pub const DEFAULT_UPCOMING_DAYS: u32 = 7;
