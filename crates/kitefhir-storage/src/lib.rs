//! Storage abstraction layer for the KiteFHIR server.
//!
//! Defines the traits every storage backend implements, the row shapes
//! shared between backends and the service layer, and the typed search
//! query IR the search engine produces. Backends never see raw query
//! strings, only this IR, so no URL-supplied value can reach a query
//! as text.

pub mod error;
pub mod index;
pub mod query;
pub mod traits;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use index::{IndexEntry, ResourceIndexer};
pub use query::{
    ComparisonOp, NumberTest, ParamFilter, Predicate, ReferenceTest, SearchQuery, SortKey,
    StringMode, TokenTest, UriMode, ValueTest,
};
pub use traits::{ResourceStore, StoreOps, StoreTransaction, TenantStore};
pub use types::{
    HistoryMethod, HistoryPage, HistoryParams, NewResourceVersion, SearchPage, StoredResource,
    TenantRecord, TotalMode,
};
