use crate::collections::ProductSummary;
use crate::item::CachedItem;
use crate::manager::{CacheContext, CollectionSpec, InsertError, VersionedCache};
use crate::notify::{ChangeNotifier, CollectionChange};

pub const COLLECTION: &str = "wishlist";
pub const SCHEMA_VERSION: &str = "2";

/// Products the shopper saved for later consideration, newest first.
pub struct Wishlist {
    cache: VersionedCache<ProductSummary>,
    notifier: ChangeNotifier,
}

impl Wishlist {
    pub fn spec() -> CollectionSpec {
        CollectionSpec::new(COLLECTION, SCHEMA_VERSION)
            .with_max_items(100)
            .with_retention_days(90)
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

    /// Adding a product that is already present moves it to the front.
    pub fn add(&self, product: ProductSummary) -> Result<(), InsertError> {
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
                self.count(),
            );
        }
        removed
    }

    /// Returns whether the product is in the wishlist afterwards.
    pub fn toggle(&self, product: ProductSummary) -> Result<bool, InsertError> {
        if self.has(&product.id) {
            self.remove(&product.id);
            Ok(false)
        } else {
            self.add(product)?;
            Ok(true)
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.cache.contains(id)
    }

    pub fn items(&self) -> Vec<ProductSummary> {
        self.cache
            .get_all()
            .into_iter()
            .map(|item| item.payload)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.cache.get_all().len()
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.notifier.notify(COLLECTION, CollectionChange::Cleared, 0);
    }
}
