//! Cart lines moved out of the cart to buy later.

use serde::{Deserialize, Serialize};

use crate::collections::ProductSummary;
use crate::item::CachedItem;
use crate::manager::{CacheContext, CollectionSpec, InsertError, VersionedCache};
use crate::notify::{ChangeNotifier, CollectionChange};
use crate::validation::Validation;

pub const COLLECTION: &str = "saved_for_later";
pub const SCHEMA_VERSION: &str = "1";

/// A saved cart line, keyed by variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItem {
    pub product: ProductSummary,
    pub variant_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl SavedItem {
    pub fn validate(&self) -> Validation {
        self.product
            .validate()
            .check(!self.variant_id.is_empty(), "variant id is empty")
            .check(self.quantity > 0, "quantity is zero")
    }
}

pub struct SavedForLater {
    cache: VersionedCache<SavedItem>,
    notifier: ChangeNotifier,
}

impl SavedForLater {
    pub fn spec() -> CollectionSpec {
        CollectionSpec::new(COLLECTION, SCHEMA_VERSION)
            .with_max_items(50)
            .with_retention_days(60)
    }

    pub fn new(context: CacheContext, notifier: ChangeNotifier) -> Self {
        Self::with_spec(Self::spec(), context, notifier)
    }

    pub fn with_spec(spec: CollectionSpec, context: CacheContext, notifier: ChangeNotifier) -> Self {
        Self {
            cache: VersionedCache::new(spec, context, SavedItem::validate),
            notifier,
        }
    }

    pub fn cache(&self) -> &VersionedCache<SavedItem> {
        &self.cache
    }

    /// Saving the same variant again replaces the earlier line.
    pub fn save(&self, item: SavedItem) -> Result<(), InsertError> {
        let id = item.variant_id.clone();
        let items = self
            .cache
            .insert_front(CachedItem::new(id.clone(), self.cache.now(), item))?;
        self.notifier
            .notify(COLLECTION, CollectionChange::Added { id }, items.len());
        Ok(())
    }

    /// Remove and return a line, to move it back into the cart.
    pub fn take(&self, variant_id: &str) -> Option<SavedItem> {
        let removed = self.cache.remove(variant_id)?;
        self.notifier.notify(
            COLLECTION,
            CollectionChange::Removed {
                id: variant_id.to_string(),
            },
            self.len(),
        );
        Some(removed.payload)
    }

    pub fn remove(&self, variant_id: &str) -> bool {
        self.take(variant_id).is_some()
    }

    pub fn items(&self) -> Vec<SavedItem> {
        self.cache
            .get_all()
            .into_iter()
            .map(|item| item.payload)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cache.get_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.notifier.notify(COLLECTION, CollectionChange::Cleared, 0);
    }
}
