//! Local caching of the competition snapshot.
//!
//! This module provides the `CacheStore`, the single owner of "is there
//! fresh data, and what is it". The snapshot lives in memory and is mirrored
//! to durable local storage as JSON so a restart within the TTL (one hour by
//! default) skips the network preload.
//!
//! Durable storage is best effort: write and read failures are logged and
//! never propagated.

pub mod snapshot;
pub mod storage;
pub mod store;

pub use snapshot::{Catalogue, CategoryErrors, Snapshot};
pub use storage::LocalStorage;
pub use store::CacheStore;
