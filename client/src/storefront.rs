//! Wires configuration, the backend client and the local collections.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

use storefront_local_cache::collections::{
    CompareList, RecentlyViewed, Revalidation, SavedForLater, Wishlist,
};
use storefront_local_cache::{
    CacheContext, ChangeNotifier, CollectionEvent, FileStore, MemoryStore, SharedStore,
    SystemClock, ValidationMonitor, ValidationStats,
};
use storefront_resilience::{CircuitBreaker, RetryEngine, SharedCircuitBreaker};

use crate::api::{ApiError, BackendClient};
use crate::auth::AuthSession;
use crate::config::{AppConfig, ConfigError};

#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct Storefront {
    config: AppConfig,
    client: Arc<BackendClient>,
    breaker: SharedCircuitBreaker,
    notifier: ChangeNotifier,
    monitor: Arc<ValidationMonitor>,
    recently_viewed: RecentlyViewed,
    wishlist: Wishlist,
    saved_for_later: SavedForLater,
    compare: CompareList,
}

impl Storefront {
    /// Collections are file-backed under the configured storage dir, or
    /// kept in memory when no data directory can be found.
    pub fn open(config: &AppConfig) -> Result<Self, StorefrontError> {
        config.check_consistency()?;
        let client = BackendClient::new(&config.api)?;

        let store: SharedStore = match config.cache.resolved_storage_dir() {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "using file-backed collections");
                Arc::new(FileStore::new(dir))
            }
            None => {
                tracing::warn!("no data directory available, collections will not persist");
                MemoryStore::shared()
            }
        };
        let context = CacheContext::new(store, Arc::new(SystemClock));

        Ok(Self::with_context(config, client, context))
    }

    /// Build on an explicit store and clock.
    pub fn with_context(config: &AppConfig, client: BackendClient, context: CacheContext) -> Self {
        let notifier = ChangeNotifier::new();
        let limits = &config.cache;

        let recently_viewed = RecentlyViewed::with_spec(
            limits.recently_viewed.apply(RecentlyViewed::spec()),
            context.clone(),
            notifier.clone(),
        )
        .with_revalidation_interval(limits.revalidation_interval());
        let wishlist = Wishlist::with_spec(
            limits.wishlist.apply(Wishlist::spec()),
            context.clone(),
            notifier.clone(),
        );
        let saved_for_later = SavedForLater::with_spec(
            limits.saved_for_later.apply(SavedForLater::spec()),
            context.clone(),
            notifier.clone(),
        );
        let compare = CompareList::with_spec(
            limits.compare.apply(CompareList::spec()),
            context.clone(),
            notifier.clone(),
        );

        Self {
            config: config.clone(),
            client: Arc::new(client),
            breaker: CircuitBreaker::shared(config.circuit_breaker.to_breaker_config()),
            notifier,
            monitor: context.monitor,
            recently_viewed,
            wishlist,
            saved_for_later,
            compare,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<BackendClient> {
        &self.client
    }

    /// New engine sharing this storefront's circuit breaker.
    pub fn retry_engine(&self) -> RetryEngine {
        RetryEngine::new(self.config.retry.to_policy()).with_shared_breaker(self.breaker.clone())
    }

    pub fn auth_session(&self) -> AuthSession {
        AuthSession::new(self.client.clone(), self.retry_engine())
    }

    pub async fn revalidate_recently_viewed(&self) -> Revalidation {
        self.recently_viewed.revalidate(self.client.as_ref()).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.notifier.subscribe()
    }

    pub fn validation_stats(&self) -> ValidationStats {
        self.monitor.snapshot()
    }

    pub fn recently_viewed(&self) -> &RecentlyViewed {
        &self.recently_viewed
    }

    pub fn wishlist(&self) -> &Wishlist {
        &self.wishlist
    }

    pub fn saved_for_later(&self) -> &SavedForLater {
        &self.saved_for_later
    }

    pub fn compare(&self) -> &CompareList {
        &self.compare
    }
}
