//! # Meditache Core
//!
//! Core business logic for Meditache intervention scheduling.
//!
//! This crate contains the domain model and the two engines built on it:
//! - [`InterventionService`]: intervention lifecycle, filtered queries and the upcoming window
//! - [`InterventionTypeService`]: the intervention-type nomenclature with global and
//!   doctor-owned entries
//!
//! Storage goes through the [`store`] port; [`MemoryStore`] and [`FileStore`] implement it.
//!
//! **No API concerns**: authentication, HTTP servers and request validation belong in
//! `api-rest` and `api-shared`.

pub mod attachments;
pub mod config;
pub mod constants;
pub mod error;
pub mod interventions;
pub mod model;
pub mod nomenclature;
pub mod store;

pub use config::CoreConfig;
pub use error::{MeditacheError, MeditacheResult};
pub use interventions::InterventionService;
pub use model::{
    Intervention, InterventionPatch, InterventionStatus, InterventionType, NewIntervention,
    Priority,
};
pub use nomenclature::InterventionTypeService;
pub use store::{FileStore, InterventionFilter, MemoryStore, Store, StoreError};

pub use meditache_types::{ActorId, NonEmptyText};
pub use meditache_uuid::ShardableUuid;
