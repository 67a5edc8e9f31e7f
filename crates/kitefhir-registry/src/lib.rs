//! Resource configuration registry.
//!
//! Loads per-resource declarative configuration (`resources/*.yml`) once at
//! startup into an immutable snapshot: enabled interactions, supported FHIR
//! versions with a default, and the search parameter allow/deny policy.
//! The interaction guard checks requests against that snapshot.

pub mod config;
pub mod error;
pub mod guard;
pub mod registry;

pub use config::{
    InteractionSet, ProfileBinding, ResourceConfig, SearchParamMode, SearchParamPolicy,
    VersionEntry,
};
pub use error::RegistryError;
pub use guard::InteractionGuard;
pub use registry::ResourceRegistry;
