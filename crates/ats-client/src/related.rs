//! Related-product lookup for the product page.

use ats_core::Product;
use ats_store::related::{merge_candidates, rank_related};
use ats_store::{RelatedConfig, ScoredProduct};

use crate::cache::TtlCache;
use crate::client::ApiClient;
use crate::error::ClientError;

const CATEGORY_CANDIDATES: u32 = 50;
const FALLBACK_CANDIDATES: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RelatedKey {
    id: i64,
    category: String,
    subcategory: String,
    max_products: usize,
}

impl RelatedKey {
    fn new(product: &Product, max_products: usize) -> Self {
        Self {
            id: product.id,
            category: product.category.clone(),
            subcategory: product.subcategory.clone(),
            max_products,
        }
    }
}

/// Fetches candidates for a product and ranks them by similarity.
///
/// Candidates come from the product's category; when that yields fewer
/// than twice `max_products`, the general listing tops them up. Rankings
/// are cached for `config.cache_ttl`.
#[derive(Debug)]
pub struct RelatedProducts {
    client: ApiClient,
    config: RelatedConfig,
    cache: TtlCache<RelatedKey, Vec<ScoredProduct>>,
}

impl RelatedProducts {
    #[must_use]
    pub fn new(client: ApiClient, config: RelatedConfig) -> Self {
        let cache = TtlCache::new(config.cache_ttl);
        Self {
            client,
            config,
            cache,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RelatedConfig {
        &self.config
    }

    /// Related products for `current`, best match first.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the category listing fails. A failing
    /// top-up request is logged and the category candidates are ranked
    /// alone.
    pub async fn related_to(&self, current: &Product) -> Result<Vec<ScoredProduct>, ClientError> {
        let key = RelatedKey::new(current, self.config.max_products);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(id = current.id, count = cached.len(), "related cache hit");
            return Ok(cached);
        }

        let related = self.fetch_and_rank(current).await?;
        self.cache.insert(key, related.clone());
        Ok(related)
    }

    /// Drops the cached ranking for `current` and fetches it again.
    ///
    /// # Errors
    ///
    /// See [`RelatedProducts::related_to`].
    pub async fn refresh(&self, current: &Product) -> Result<Vec<ScoredProduct>, ClientError> {
        self.cache
            .invalidate(&RelatedKey::new(current, self.config.max_products));
        self.related_to(current).await
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    async fn fetch_and_rank(&self, current: &Product) -> Result<Vec<ScoredProduct>, ClientError> {
        let mut candidates = if current.category.trim().is_empty() {
            Vec::new()
        } else {
            self.client
                .products_by_category(&current.category, 0, CATEGORY_CANDIDATES)
                .await?
                .items
        };

        if candidates.len() < self.config.max_products * 2 {
            match self.client.all_products(0, FALLBACK_CANDIDATES).await {
                Ok(page) => candidates = merge_candidates(candidates, page.items),
                Err(e) => {
                    tracing::warn!(id = current.id, error = %e, "related top-up failed");
                }
            }
        }

        let ranked = rank_related(current, &candidates, &self.config);
        tracing::debug!(
            id = current.id,
            candidates = candidates.len(),
            related = ranked.len(),
            "ranked related products"
        );
        Ok(ranked)
    }
}
