//! Search parameter handling for the KiteFHIR server.
//!
//! Loads per-version FHIR SearchParameter definitions, parses request
//! query strings, validates them against the registry and the resource
//! configuration, and compiles them into the typed query IR evaluated by
//! storage backends. Also provides the write-time indexer that keeps the
//! search index in sync with resource content.

pub mod engine;
pub mod error;
pub mod indexer;
pub mod loader;
pub mod parameters;
pub mod parser;
pub mod registry;
pub mod types;

pub use engine::{SearchOptions, SearchPlan, build_plan};
pub use error::SearchError;
pub use indexer::SearchIndexer;
pub use loader::{load_search_parameters, parse_search_parameter, register_common_parameters};
pub use parameters::{
    SearchModifier, SearchParamType, SearchParameter, SearchParameterComponent, SearchPrefix,
};
pub use parser::{ParsedParam, ParsedQuery, ParsedValue, parse_query};
pub use registry::{SearchParameterRegistry, filter_expression};
