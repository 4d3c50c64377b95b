//! Versioned local cache manager
//!
//! Each collection is a JSON array under `storage_key` with a schema version
//! stamped under `version_key`. Reads take a fast path when the stamp
//! matches; otherwise the stored array is cleaned up (migrated, validated,
//! pruned by age, bounded by size) and written back with the current stamp.
//!
//! Storage and parse failures never reach the caller. Corrupt data is
//! discarded and the collection starts over empty.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::clock::SharedClock;
use crate::item::CachedItem;
use crate::store::SharedStore;
use crate::validation::{Validation, ValidationMonitor};

/// Prefix shared by every collection's data key.
pub const STORAGE_PREFIX: &str = "storefront";

/// Legacy field names that may carry an item's timestamp, in lookup order.
const LEGACY_TIMESTAMP_FIELDS: [&str; 4] = ["timestamp", "viewedAt", "addedAt", "savedAt"];

pub type Validator<T> = Arc<dyn Fn(&T) -> Validation + Send + Sync>;

/// Rewrites one stored element into the current record shape.
/// Returning `None` drops the element.
pub type Migrator = Arc<dyn Fn(Value, DateTime<Utc>) -> Option<Value> + Send + Sync>;

/// What `insert_front` does when the collection is already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    EvictOldest,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub storage_key: String,
    pub version_key: String,
    pub current_version: String,
    pub max_items: usize,
    pub retention_days: u32,
    pub overflow: Overflow,
}

impl CollectionSpec {
    /// `storefront_<name>` for data, `<name>_version` for the stamp.
    pub fn new(name: &str, current_version: &str) -> Self {
        Self {
            name: name.to_string(),
            storage_key: format!("{STORAGE_PREFIX}_{name}"),
            version_key: format!("{name}_version"),
            current_version: current_version.to_string(),
            max_items: 50,
            retention_days: 30,
            overflow: Overflow::EvictOldest,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_retention_days(mut self, retention_days: u32) -> Self {
        self.retention_days = retention_days;
        self
    }

    pub fn with_overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("{collection} is full ({max_items} items)")]
    Full {
        collection: String,
        max_items: usize,
    },

    #[error("item rejected: {}", reasons.join(", "))]
    Invalid { reasons: Vec<String> },
}

/// Cache services shared by every collection of one storefront.
#[derive(Clone)]
pub struct CacheContext {
    pub store: SharedStore,
    pub clock: SharedClock,
    pub monitor: Arc<ValidationMonitor>,
}

impl CacheContext {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            monitor: Arc::new(ValidationMonitor::new()),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<ValidationMonitor>) -> Self {
        self.monitor = monitor;
        self
    }
}

pub struct VersionedCache<T> {
    spec: CollectionSpec,
    context: CacheContext,
    validator: Validator<T>,
    migrator: Migrator,
    _payload: PhantomData<fn() -> T>,
}

impl<T> VersionedCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(
        spec: CollectionSpec,
        context: CacheContext,
        validator: impl Fn(&T) -> Validation + Send + Sync + 'static,
    ) -> Self {
        Self {
            spec,
            context,
            validator: Arc::new(validator),
            migrator: Arc::new(wrap_legacy_item),
            _payload: PhantomData,
        }
    }

    pub fn with_migrator(
        mut self,
        migrator: impl Fn(Value, DateTime<Utc>) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.migrator = Arc::new(migrator);
        self
    }

    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    pub fn context(&self) -> &CacheContext {
        &self.context
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.context.clock.now()
    }

    pub fn validate(&self, payload: &T) -> Validation {
        let validation = (self.validator)(payload);
        self.context.monitor.record_check(&validation);
        validation
    }

    /// Current contents, most recent first.
    pub fn get_all(&self) -> Vec<CachedItem<T>> {
        if !self.version_is_current() {
            return self.cleanup();
        }

        let Some(raw) = self.read(&self.spec.storage_key) else {
            return Vec::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Err(e) => {
                self.discard_corrupt(&e);
                Vec::new()
            }
            Ok(value) => match serde_json::from_value::<Vec<CachedItem<T>>>(value) {
                Ok(items) => {
                    tracing::trace!(collection = %self.spec.name, len = items.len(), "cache hit");
                    items
                }
                // Well-formed JSON in an unexpected shape: salvage what we can.
                Err(_) => self.cleanup(),
            },
        }
    }

    /// Replace the collection. Invalid items are dropped and the list is cut
    /// to `max_items`.
    pub fn save(&self, items: Vec<CachedItem<T>>) {
        let mut kept: Vec<CachedItem<T>> = items
            .into_iter()
            .filter(|item| !item.id.is_empty() && self.validate(&item.payload).is_valid())
            .collect();
        kept.truncate(self.spec.max_items);
        self.persist(&kept);
    }

    /// Remove both the data and the version stamp.
    pub fn clear(&self) {
        self.delete(&self.spec.storage_key);
        self.delete(&self.spec.version_key);
        tracing::debug!(collection = %self.spec.name, "collection cleared");
    }

    /// Run a cleanup pass regardless of the version stamp.
    pub fn force_cleanup(&self) -> Vec<CachedItem<T>> {
        self.cleanup()
    }

    /// Whether stored data is stale: old version, unreadable shape, too many
    /// items, or items past retention.
    pub fn needs_cleanup(&self) -> bool {
        if !self.version_is_current() {
            return true;
        }
        let Some(raw) = self.read(&self.spec.storage_key) else {
            return false;
        };
        let Ok(items) = serde_json::from_str::<Vec<CachedItem<T>>>(&raw) else {
            return true;
        };
        let now = self.now();
        items.len() > self.spec.max_items
            || items
                .iter()
                .any(|item| item.is_expired_at(now, self.spec.retention_days))
    }

    /// Put `item` first, replacing any entry with the same id and dropping
    /// expired ones.
    ///
    /// On a full collection the oldest entry is evicted, or the insert is
    /// refused when the collection uses [`Overflow::Reject`].
    pub fn insert_front(
        &self,
        item: CachedItem<T>,
    ) -> Result<Vec<CachedItem<T>>, InsertError> {
        let validation = self.validate(&item.payload);
        let validation = validation.check(!item.id.is_empty(), "id is empty");
        if !validation.is_valid() {
            tracing::warn!(
                collection = %self.spec.name,
                id = %item.id,
                reasons = ?validation.reasons(),
                "rejected invalid item"
            );
            return Err(InsertError::Invalid {
                reasons: validation.into_reasons(),
            });
        }

        let now = self.now();
        let mut items = self.get_all();
        items.retain(|existing| {
            existing.id != item.id && !existing.is_expired_at(now, self.spec.retention_days)
        });

        if self.spec.overflow == Overflow::Reject && items.len() >= self.spec.max_items {
            return Err(InsertError::Full {
                collection: self.spec.name.clone(),
                max_items: self.spec.max_items,
            });
        }

        items.insert(0, item);
        if items.len() > self.spec.max_items {
            let evicted = items.len() - self.spec.max_items;
            items.truncate(self.spec.max_items);
            tracing::debug!(collection = %self.spec.name, evicted, "evicted oldest items");
        }
        self.persist(&items);
        Ok(items)
    }

    /// Returns the removed item, if any.
    pub fn remove(&self, id: &str) -> Option<CachedItem<T>> {
        let mut items = self.get_all();
        let position = items.iter().position(|item| item.id == id)?;
        let removed = items.remove(position);
        self.persist(&items);
        Some(removed)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_all().iter().any(|item| item.id == id)
    }

    fn cleanup(&self) -> Vec<CachedItem<T>> {
        let started = Instant::now();
        let now = self.now();
        // Corrupt data was discarded; leave the key empty rather than rewrite it.
        let Some(stored) = self.read_elements() else {
            return Vec::new();
        };
        let stored_len = stored.len();

        let mut items: Vec<CachedItem<T>> = Vec::with_capacity(stored_len);
        for element in stored {
            let Some(migrated) = (self.migrator)(element, now) else {
                continue;
            };
            let item = match serde_json::from_value::<CachedItem<T>>(migrated) {
                Ok(item) => item,
                Err(e) => {
                    tracing::debug!(collection = %self.spec.name, "dropping malformed item: {e}");
                    continue;
                }
            };
            if item.id.is_empty() || !self.validate(&item.payload).is_valid() {
                continue;
            }
            if item.is_expired_at(now, self.spec.retention_days) {
                continue;
            }
            items.push(item);
        }

        // Newest first; the newest copy of a duplicated id wins.
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.id.clone()));
        items.truncate(self.spec.max_items);
        self.persist(&items);

        let elapsed = started.elapsed();
        self.context.monitor.record_cleanup(elapsed);
        tracing::info!(
            collection = %self.spec.name,
            version = %self.spec.current_version,
            stored = stored_len,
            kept = items.len(),
            elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "cache cleanup complete"
        );
        items
    }

    /// Stored array elements; a non-array value counts as empty. `None` when
    /// the value was not JSON and has been removed.
    fn read_elements(&self) -> Option<Vec<Value>> {
        let Some(raw) = self.read(&self.spec.storage_key) else {
            return Some(Vec::new());
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(elements)) => Some(elements),
            Ok(_) => {
                tracing::warn!(collection = %self.spec.name, "stored value is not an array, resetting");
                Some(Vec::new())
            }
            Err(e) => {
                self.discard_corrupt(&e);
                None
            }
        }
    }

    fn version_is_current(&self) -> bool {
        self.read(&self.spec.version_key).as_deref() == Some(self.spec.current_version.as_str())
    }

    fn persist(&self, items: &[CachedItem<T>]) {
        let json = match serde_json::to_string(items) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(collection = %self.spec.name, "failed to serialise collection: {e}");
                return;
            }
        };
        let store = &self.context.store;
        if let Err(e) = store.set(&self.spec.storage_key, &json) {
            tracing::warn!(collection = %self.spec.name, "failed to write collection: {e}");
            return;
        }
        if let Err(e) = store.set(&self.spec.version_key, &self.spec.current_version) {
            tracing::warn!(collection = %self.spec.name, "failed to stamp version: {e}");
        }
    }

    fn discard_corrupt(&self, error: &serde_json::Error) {
        tracing::warn!(
            collection = %self.spec.name,
            key = %self.spec.storage_key,
            "discarding corrupt cache data: {error}"
        );
        self.delete(&self.spec.storage_key);
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.context.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(collection = %self.spec.name, key, "storage read failed: {e}");
                None
            }
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.context.store.remove(key) {
            tracing::warn!(collection = %self.spec.name, key, "storage remove failed: {e}");
        }
    }
}

/// Default migrator.
///
/// Current records pass through untouched. Bare legacy objects are wrapped
/// into `{id, timestamp, payload}`, taking the timestamp from the first of
/// `timestamp`, `viewedAt`, `addedAt`, `savedAt` that parses, else `now`.
/// Objects without a usable `id` are dropped.
pub fn wrap_legacy_item(value: Value, now: DateTime<Utc>) -> Option<Value> {
    let Value::Object(object) = value else {
        return None;
    };
    if object.contains_key("payload") && object.contains_key("timestamp") {
        return Some(Value::Object(object));
    }

    let id = match object.get("id")? {
        Value::String(id) if !id.is_empty() => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    let timestamp = LEGACY_TIMESTAMP_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(parse_timestamp))
        .unwrap_or(now);

    let mut record = Map::new();
    record.insert("id".to_string(), Value::String(id));
    record.insert("timestamp".to_string(), Value::String(timestamp.to_rfc3339()));
    record.insert("payload".to_string(), Value::Object(object));
    Some(Value::Object(record))
}

/// ISO-8601 strings or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(millis) => Utc.timestamp_millis_opt(millis.as_i64()?).single(),
        _ => None,
    }
}
