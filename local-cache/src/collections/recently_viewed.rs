//! Recently viewed products.
//!
//! Bounded to the last 10 products seen within 30 days. Entries are
//! periodically re-checked against the backend so products that were
//! unpublished disappear, but a failed check never removes anything.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::collections::validate_price;
use crate::item::CachedItem;
use crate::manager::{CacheContext, CollectionSpec, VersionedCache};
use crate::notify::{ChangeNotifier, CollectionChange};
use crate::probe::ExistenceProbe;
use crate::validation::Validation;

pub const COLLECTION: &str = "recently_viewed";
pub const SCHEMA_VERSION: &str = "2";

/// Where the time of the last existence check is stamped.
pub const LAST_CHECK_KEY: &str = "recently_viewed_last_check";

pub const DEFAULT_REVALIDATION_INTERVAL: Duration = Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentlyViewedProduct {
    pub id: String,
    pub title: String,
    pub handle: String,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: String,
    pub title: String,
    pub price: f64,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

impl RecentlyViewedProduct {
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::pass()
            .check(!self.id.is_empty(), "id is empty")
            .check(!self.title.is_empty(), "title is empty")
            .check(!self.handle.is_empty(), "handle is empty")
            .check(!self.variants.is_empty(), "no variants");
        for variant in &self.variants {
            validation = validation
                .check(!variant.id.is_empty(), "variant id is empty")
                .merge(validate_price(variant.price));
        }
        validation.check(
            self.images.iter().all(|image| !image.url.is_empty()),
            "image url is empty",
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// Checked too recently; nothing was probed.
    Skipped { next_check: DateTime<Utc> },
    Checked {
        /// Ids removed because the backend reported them gone.
        removed: Vec<String>,
        /// Probes that failed; those items were kept.
        failed: usize,
    },
}

pub struct RecentlyViewed {
    cache: VersionedCache<RecentlyViewedProduct>,
    notifier: ChangeNotifier,
    interval: Duration,
}

impl RecentlyViewed {
    pub fn spec() -> CollectionSpec {
        CollectionSpec::new(COLLECTION, SCHEMA_VERSION)
            .with_max_items(10)
            .with_retention_days(30)
    }

    pub fn new(context: CacheContext, notifier: ChangeNotifier) -> Self {
        Self::with_spec(Self::spec(), context, notifier)
    }

    pub fn with_spec(spec: CollectionSpec, context: CacheContext, notifier: ChangeNotifier) -> Self {
        Self {
            cache: VersionedCache::new(spec, context, RecentlyViewedProduct::validate),
            notifier,
            interval: DEFAULT_REVALIDATION_INTERVAL,
        }
    }

    pub fn with_revalidation_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn cache(&self) -> &VersionedCache<RecentlyViewedProduct> {
        &self.cache
    }

    /// Record a product view. Returns `false` when the product is rejected.
    pub fn add(&self, product: RecentlyViewedProduct) -> bool {
        let id = product.id.clone();
        let item = CachedItem::new(id.clone(), self.cache.now(), product);
        match self.cache.insert_front(item) {
            Ok(items) => {
                self.notifier
                    .notify(COLLECTION, CollectionChange::Added { id }, items.len());
                true
            }
            Err(e) => {
                tracing::warn!(product = %id, "not recording product view: {e}");
                false
            }
        }
    }

    pub fn items(&self) -> Vec<RecentlyViewedProduct> {
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

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.cache.remove(id).is_some();
        if removed {
            self.notifier.notify(
                COLLECTION,
                CollectionChange::Removed { id: id.to_string() },
                self.len(),
            );
        }
        removed
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.notifier.notify(COLLECTION, CollectionChange::Cleared, 0);
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        let raw = match self.cache.context().store.get(LAST_CHECK_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("failed to read last revalidation time: {e}");
                return None;
            }
        };
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Drop products the backend reports as gone.
    ///
    /// Runs at most once per revalidation interval. A probe error keeps the
    /// item: a transient network failure must never delete local data.
    pub async fn revalidate(&self, probe: &dyn ExistenceProbe) -> Revalidation {
        let now = self.cache.now();
        if let Some(last) = self.last_check()
            && now.signed_duration_since(last) < self.interval
        {
            let next_check = last + self.interval;
            tracing::debug!(%next_check, "recently viewed revalidated recently, skipping");
            return Revalidation::Skipped { next_check };
        }

        let mut removed = Vec::new();
        let mut failed = 0;
        for item in self.cache.get_all() {
            match probe.exists(&item.payload.handle).await {
                Ok(true) => {}
                Ok(false) => removed.push(item.id),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(product = %item.id, "existence check failed, keeping item: {e}");
                }
            }
        }

        // Remove by id so views recorded while probing survive.
        for id in &removed {
            if self.cache.remove(id).is_some() {
                self.notifier.notify(
                    COLLECTION,
                    CollectionChange::Removed { id: id.clone() },
                    self.len(),
                );
            }
        }

        if let Err(e) = self
            .cache
            .context()
            .store
            .set(LAST_CHECK_KEY, &now.to_rfc3339())
        {
            tracing::warn!("failed to stamp revalidation time: {e}");
        }
        tracing::info!(removed = removed.len(), failed, "recently viewed revalidated");

        Revalidation::Checked { removed, failed }
    }
}
