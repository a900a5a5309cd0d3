//! HTTP client for the product catalog API (`/api/v1/productos`).

use std::sync::Arc;
use std::time::Duration;

use ats_core::{AppConfig, Category, Product};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::cache::CategoryCache;
use crate::error::ClientError;
use crate::retry::retry_with_backoff;
use crate::types::{ApiResponse, Page};

const API_PREFIX: &str = "/api/v1/productos";

/// Characters left unescaped in a path segment, matching the browser's
/// `encodeURIComponent`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes one URL path segment.
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Client for the product API.
///
/// Transient errors (429, network failures) are retried with exponential
/// backoff up to `max_retries` additional attempts. Category listings are
/// served from an injectable [`CategoryCache`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff_base_secs: u64,
    categories: Arc<CategoryCache>,
}

impl ApiClient {
    /// Creates a client for the API at `base_url` (an origin such as
    /// `http://127.0.0.1:5001`; a trailing slash is ignored).
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidBaseUrl`] if `base_url` is not an absolute
    ///   `http` or `https` URL.
    /// - [`ClientError::Http`] if the underlying `reqwest::Client` cannot be
    ///   built.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url,
            max_retries,
            backoff_base_secs,
            categories: Arc::new(CategoryCache::default()),
        })
    }

    /// Creates a client from application configuration, with a category
    /// cache using the configured TTL.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        let client = Self::new(
            &config.api_url,
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_secs,
        )?;
        let cache = CategoryCache::new(Duration::from_secs(config.category_cache_ttl_secs));
        Ok(client.with_category_cache(Arc::new(cache)))
    }

    /// Replaces the category cache, e.g. to share one across clients.
    #[must_use]
    pub fn with_category_cache(mut self, cache: Arc<CategoryCache>) -> Self {
        self.categories = cache;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn category_cache(&self) -> &Arc<CategoryCache> {
        &self.categories
    }

    /// Lists categories, serving repeated calls for the same `limit` from
    /// the cache until it expires.
    ///
    /// # Errors
    ///
    /// Any [`ClientError`] from the request. Failures are not cached.
    pub async fn list_categories(&self, limit: Option<u32>) -> Result<Vec<Category>, ClientError> {
        if let Some(cached) = self.categories.get(&limit) {
            tracing::debug!(?limit, count = cached.len(), "category cache hit");
            return Ok(cached);
        }

        let mut query = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let response: ApiResponse<Vec<Category>> =
            self.get_json("/categorias", &query, "category list").await?;
        let categories = into_data(response)?;

        self.categories.insert(limit, categories.clone());
        Ok(categories)
    }

    /// Like [`Self::list_categories`], but substitutes the static fallback
    /// set when the API is unreachable.
    pub async fn categories_or_fallback(&self, limit: Option<u32>) -> Vec<Category> {
        match self.list_categories(limit).await {
            Ok(categories) => categories,
            Err(e) => {
                tracing::warn!(error = %e, "category list unavailable, using fallback set");
                let mut fallback = Category::fallback_set();
                if let Some(limit) = limit {
                    fallback.truncate(limit as usize);
                }
                fallback
            }
        }
    }

    /// # Errors
    ///
    /// Any [`ClientError`] from the request.
    pub async fn products_by_category(
        &self,
        category: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Product>, ClientError> {
        let path = format!("/categoria/{}", encode_segment(category));
        self.get_page(&path, offset, limit, "category products").await
    }

    /// # Errors
    ///
    /// Any [`ClientError`] from the request.
    pub async fn products_by_subcategory(
        &self,
        subcategory: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Product>, ClientError> {
        let path = format!("/subcategoria/{}", encode_segment(subcategory));
        self.get_page(&path, offset, limit, "subcategory products").await
    }

    /// # Errors
    ///
    /// Any [`ClientError`] from the request.
    pub async fn all_products(&self, offset: u32, limit: u32) -> Result<Page<Product>, ClientError> {
        self.get_page("", offset, limit, "product list").await
    }

    /// Free-text search over the catalog.
    ///
    /// # Errors
    ///
    /// Any [`ClientError`] from the request.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<Product>, ClientError> {
        let path = format!("/buscar/{}", encode_segment(query.trim()));
        let response: ApiResponse<Vec<Product>> = self
            .get_json(&path, &[("limit", limit.to_string())], "search results")
            .await?;
        into_data(response)
    }

    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown id, or any other
    /// [`ClientError`] from the request.
    pub async fn product_by_id(&self, id: i64) -> Result<Product, ClientError> {
        let response: ApiResponse<Product> =
            self.get_json(&format!("/{id}"), &[], "product").await?;
        into_data(response)
    }

    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown SKU, or any other
    /// [`ClientError`] from the request.
    pub async fn product_by_sku(&self, sku: &str) -> Result<Product, ClientError> {
        let path = format!("/sku/{}", encode_segment(sku));
        let response: ApiResponse<Product> = self.get_json(&path, &[], "product").await?;
        into_data(response)
    }

    async fn get_page(
        &self,
        path: &str,
        offset: u32,
        limit: u32,
        context: &str,
    ) -> Result<Page<Product>, ClientError> {
        let query = [("limit", limit.to_string()), ("offset", offset.to_string())];
        let started = tokio::time::Instant::now();
        let response: ApiResponse<Vec<Product>> = self.get_json(path, &query, context).await?;
        let meta = response.meta.clone();
        let items = into_data(response)?;
        let page = Page::from_parts(items, meta, offset, limit);
        tracing::debug!(
            path,
            offset,
            limit,
            received = page.items.len(),
            total = page.total,
            elapsed_ms = started.elapsed().as_millis(),
            "page loaded"
        );
        Ok(page)
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<String, ClientError> {
        let raw = format!("{}{API_PREFIX}{path}", self.base_url);
        let mut url = reqwest::Url::parse(&raw).map_err(|e| ClientError::InvalidBaseUrl {
            base_url: self.base_url.clone(),
            reason: format!("cannot build request URL \"{raw}\": {e}"),
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    /// GETs `path` under the API prefix and decodes the envelope, with retry
    /// on transient errors.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<ApiResponse<T>, ClientError> {
        let url = self.url(path, query)?;

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(ClientError::RateLimited { retry_after_secs });
                }

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ClientError::NotFound { url });
                }

                if !status.is_success() {
                    return Err(ClientError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<ApiResponse<T>>(&body).map_err(|source| {
                    ClientError::Deserialize {
                        context: format!("{context} from {url}"),
                        source,
                    }
                })
            }
        })
        .await
    }
}

/// Unwraps the envelope's `data`, turning `success: false` into
/// [`ClientError::Api`].
fn into_data<T>(response: ApiResponse<T>) -> Result<T, ClientError> {
    if !response.success {
        let message = response
            .error
            .unwrap_or_else(|| "Error en la respuesta del servidor".to_owned());
        return Err(ClientError::Api(message));
    }
    response
        .data
        .ok_or_else(|| ClientError::Api("response has no data".to_owned()))
}

fn normalize_base_url(base_url: &str) -> Result<String, ClientError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        base_url: base_url.to_owned(),
        reason,
    };
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme \"{}\"", parsed.scheme())));
    }
    Ok(trimmed.to_owned())
}
