//! Side-by-side product comparison, capped at four products.
//!
//! Unlike the other collections a full compare list refuses new products
//! instead of evicting the oldest one.

use crate::collections::ProductSummary;
use crate::item::CachedItem;
use crate::manager::{CacheContext, CollectionSpec, InsertError, Overflow, VersionedCache};
use crate::notify::{ChangeNotifier, CollectionChange};

pub const COLLECTION: &str = "compare";
pub const SCHEMA_VERSION: &str = "1";
pub const MAX_COMPARE_ITEMS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompareError {
    #[error("You can compare up to {max} products at a time")]
    Full { max: usize },

    #[error("product cannot be compared: {}", reasons.join(", "))]
    Invalid { reasons: Vec<String> },
}

impl From<InsertError> for CompareError {
    fn from(err: InsertError) -> Self {
        match err {
            InsertError::Full { max_items, .. } => CompareError::Full { max: max_items },
            InsertError::Invalid { reasons } => CompareError::Invalid { reasons },
        }
    }
}

pub struct CompareList {
    cache: VersionedCache<ProductSummary>,
    notifier: ChangeNotifier,
}

impl CompareList {
    pub fn spec() -> CollectionSpec {
        CollectionSpec::new(COLLECTION, SCHEMA_VERSION)
            .with_max_items(MAX_COMPARE_ITEMS)
            .with_retention_days(30)
            .with_overflow(Overflow::Reject)
    }

    pub fn new(context: CacheContext, notifier: ChangeNotifier) -> Self {
        Self::with_spec(Self::spec(), context, notifier)
    }

    pub fn with_spec(spec: CollectionSpec, context: CacheContext, notifier: ChangeNotifier) -> Self {
        Self {
            cache: VersionedCache::new(spec, context, ProductSummary::validate),
            notifier,
        }
    }

    pub fn cache(&self) -> &VersionedCache<ProductSummary> {
        &self.cache
    }

    pub fn add(&self, product: ProductSummary) -> Result<(), CompareError> {
        let id = product.id.clone();
        let items = self
            .cache
            .insert_front(CachedItem::new(id.clone(), self.cache.now(), product))?;
        self.notifier
            .notify(COLLECTION, CollectionChange::Added { id }, items.len());
        Ok(())
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.cache.remove(id).is_some();
        if removed {
            self.notifier.notify(
                COLLECTION,
                CollectionChange::Removed { id: id.to_string() },
                self.items().len(),
            );
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cache.contains(id)
    }

    pub fn items(&self) -> Vec<ProductSummary> {
        self.cache
            .get_all()
            .into_iter()
            .map(|item| item.payload)
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.cache.get_all().len() >= self.cache.spec().max_items
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.notifier.notify(COLLECTION, CollectionChange::Cleared, 0);
    }
}
