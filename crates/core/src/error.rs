use crate::store::StoreError;

/// Errors surfaced by the Meditache engines.
///
/// The boundary layer maps these one-to-one onto transport failures; the engines never recover
/// from them locally.
#[derive(Debug, thiserror::Error)]
pub enum MeditacheError {
    /// Malformed or missing required input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint fired and the conflicting row could not be re-read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Startup configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for MeditacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidSchedule(invalid) => invalid.into(),
            other => Self::Store(other),
        }
    }
}

impl MeditacheError {
    pub(crate) fn intervention_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "intervention",
            id: id.to_string(),
        }
    }
}

pub type MeditacheResult<T> = std::result::Result<T, MeditacheError>;
