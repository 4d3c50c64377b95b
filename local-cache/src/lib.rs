//! Versioned local storage for storefront collections.
//!
//! A [`VersionedCache`] keeps one JSON array per collection in a
//! [`KeyValueStore`] and rewrites it whenever the schema version changes,
//! so stale or corrupt data never reaches the UI. The adapters in
//! [`collections`] build recently viewed, wishlist, saved-for-later and
//! compare lists on top of it.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod clock;
pub mod collections;
pub mod item;
pub mod manager;
pub mod notify;
pub mod probe;
pub mod store;
pub mod validation;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use item::CachedItem;
pub use manager::{
    CacheContext, CollectionSpec, InsertError, Migrator, Overflow, Validator, VersionedCache,
    wrap_legacy_item,
};
pub use notify::{ChangeNotifier, CollectionChange, CollectionEvent};
pub use probe::{ExistenceProbe, ProbeError};
pub use store::{FileStore, KeyValueStore, MemoryStore, SharedStore, StoreError};
pub use validation::{Validation, ValidationMonitor, ValidationStats};
