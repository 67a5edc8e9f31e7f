//! In-memory storage backend for the KiteFHIR server.
//!
//! Implements the storage traits over process memory: per-tenant version
//! chains with an implicit current row (the last element), immutable
//! history, tombstone deletes, a per-resource search index evaluated
//! against the typed query IR, and undo-log transactions.
//!
//! The update invariant (mark prior rows non-current, insert the new
//! current row, rewrite the index) spans several structures, so a single
//! `parking_lot::RwLock` over the store is the per-store serialization
//! point. Locks are never held across an `.await`.

mod eval;
mod storage;
mod tenants;
mod transaction;

pub use storage::MemoryStore;
pub use tenants::MemoryTenantStore;
