//! Offset-based "load more" loop shared by every product listing.
//!
//! A [`Paginator`] accumulates pages from a [`PageSource`], de-duplicating
//! by id and stopping at a configurable item cap. Starting a reset or
//! refresh aborts any request still in flight; a generation counter fences
//! late responses that slip past the abort so only the newest request ever
//! commits.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ats_core::Product;
use futures::future::{AbortHandle, Abortable, Aborted};
use tokio::time::Instant;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::types::Page;

/// Items that can be de-duplicated across pages.
pub trait Identified {
    fn id(&self) -> i64;
}

impl Identified for Product {
    fn id(&self) -> i64 {
        self.id
    }
}

/// A listing endpoint that can be read one window at a time.
pub trait PageSource: Send + Sync {
    type Item: Identified + Clone + Send;

    fn fetch_page(
        &self,
        offset: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Page<Self::Item>, ClientError>> + Send;
}

/// Which product listing an [`ApiListing`] reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Category(String),
    Subcategory(String),
    All,
    /// Search results. The endpoint takes no offset, so the whole result
    /// set arrives as a single page.
    Search(String),
}

/// [`PageSource`] backed by the product API.
#[derive(Debug, Clone)]
pub struct ApiListing {
    client: ApiClient,
    listing: Listing,
}

impl ApiListing {
    #[must_use]
    pub fn new(client: ApiClient, listing: Listing) -> Self {
        Self { client, listing }
    }

    #[must_use]
    pub fn listing(&self) -> &Listing {
        &self.listing
    }
}

impl PageSource for ApiListing {
    type Item = Product;

    async fn fetch_page(&self, offset: u32, limit: u32) -> Result<Page<Product>, ClientError> {
        match &self.listing {
            Listing::Category(category) => {
                self.client.products_by_category(category, offset, limit).await
            }
            Listing::Subcategory(subcategory) => {
                self.client
                    .products_by_subcategory(subcategory, offset, limit)
                    .await
            }
            Listing::All => self.client.all_products(offset, limit).await,
            Listing::Search(query) => {
                if offset > 0 {
                    return Ok(Page::from_parts(Vec::new(), None, offset, limit));
                }
                let items = self.client.search(query, limit).await?;
                Ok(Page::from_parts(items, None, offset, limit))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationConfig {
    pub limit: u32,
    /// Distance from the bottom, in pixels or rows, below which a scroll
    /// event triggers [`Paginator::load_more`].
    pub scroll_threshold: u32,
    pub max_items: usize,
    /// Scroll events closer together than this are dropped.
    pub scroll_throttle: Duration,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            limit: 12,
            scroll_threshold: 300,
            max_items: 1000,
            scroll_throttle: Duration::from_millis(100),
        }
    }
}

impl PaginationConfig {
    /// Settings used by category pages.
    #[must_use]
    pub fn category_listing() -> Self {
        Self {
            scroll_threshold: 400,
            max_items: 500,
            ..Self::default()
        }
    }
}

/// Snapshot of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState<T> {
    pub items: Vec<T>,
    pub offset: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
    /// A reset or refresh is in flight.
    pub loading: bool,
    /// A load-more is in flight.
    pub loading_more: bool,
    pub error: Option<String>,
    pub is_near_bottom: bool,
}

impl<T> PaginationState<T> {
    /// 1-based page number of the next window to load.
    #[must_use]
    pub fn page(&self) -> u32 {
        if self.limit == 0 {
            return 1;
        }
        self.offset / self.limit + 1
    }

    /// Share of `total` already loaded, 0–100.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.items.len() as f64 / self.total as f64 * 100.0).min(100.0)
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.loading || self.loading_more
    }
}

/// Result of one pagination step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was committed; `added` counts new, unique items.
    Loaded { added: usize },
    /// Nothing was requested: the listing is exhausted or already loading.
    Skipped,
    /// A newer request started before this one finished; its result was
    /// discarded.
    Superseded,
    /// The request failed; the message is in [`PaginationState::error`].
    Failed,
    /// A scroll event arrived inside the throttle window.
    Throttled,
}

#[derive(Clone, Copy)]
enum LoadKind {
    Reset,
    Refresh,
    More,
}

struct Inner<T> {
    state: PaginationState<T>,
    generation: u64,
    in_flight: Option<AbortHandle>,
    last_scroll: Option<Instant>,
}

pub struct Paginator<S: PageSource> {
    source: S,
    config: PaginationConfig,
    inner: Mutex<Inner<S::Item>>,
}

impl<S: PageSource> std::fmt::Debug for Paginator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: PageSource> Paginator<S> {
    #[must_use]
    pub fn new(source: S, config: PaginationConfig) -> Self {
        let state = PaginationState {
            items: Vec::new(),
            offset: 0,
            limit: config.limit,
            total: 0,
            has_more: true,
            loading: false,
            loading_more: false,
            error: None,
            is_near_bottom: false,
        };
        Self {
            source,
            config,
            inner: Mutex::new(Inner {
                state,
                generation: 0,
                in_flight: None,
                last_scroll: None,
            }),
        }
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    #[must_use]
    pub fn snapshot(&self) -> PaginationState<S::Item> {
        self.lock().state.clone()
    }

    /// Fetches the next window and appends its unseen items. Does nothing
    /// while another load is running or once the listing is exhausted.
    pub async fn load_more(&self) -> LoadOutcome {
        self.run(LoadKind::More).await
    }

    /// Clears the listing and reloads it from offset 0, aborting any
    /// request in flight.
    pub async fn reset(&self) -> LoadOutcome {
        self.run(LoadKind::Reset).await
    }

    /// Reloads from offset 0 without clearing the current items first.
    pub async fn refresh(&self) -> LoadOutcome {
        self.run(LoadKind::Refresh).await
    }

    /// Aborts the request in flight, if any, and leaves the listing idle.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        if let Some(handle) = inner.in_flight.take() {
            handle.abort();
        }
        inner.state.loading = false;
        inner.state.loading_more = false;
    }

    /// Handles a scroll position report. Loads the next window when the
    /// viewport is within the threshold of the bottom.
    pub async fn on_scroll(&self, distance_from_bottom: u32) -> LoadOutcome {
        let should_load = {
            let mut inner = self.lock();
            let now = Instant::now();
            if let Some(last) = inner.last_scroll {
                if now.duration_since(last) < self.config.scroll_throttle {
                    return LoadOutcome::Throttled;
                }
            }
            inner.last_scroll = Some(now);

            let near_bottom = distance_from_bottom < self.config.scroll_threshold;
            inner.state.is_near_bottom = near_bottom;
            near_bottom && inner.state.has_more && !inner.state.is_busy()
        };

        if should_load {
            self.load_more().await
        } else {
            LoadOutcome::Skipped
        }
    }

    async fn run(&self, kind: LoadKind) -> LoadOutcome {
        let (generation, offset, registration) = {
            let mut inner = self.lock();
            let offset = match kind {
                LoadKind::More => {
                    if inner.state.is_busy() || !inner.state.has_more {
                        return LoadOutcome::Skipped;
                    }
                    inner.state.loading_more = true;
                    inner.state.offset
                }
                LoadKind::Reset | LoadKind::Refresh => {
                    if let Some(handle) = inner.in_flight.take() {
                        handle.abort();
                    }
                    if matches!(kind, LoadKind::Reset) {
                        inner.state.items.clear();
                        inner.state.offset = 0;
                        inner.state.total = 0;
                        inner.state.has_more = true;
                    }
                    inner.state.error = None;
                    inner.state.loading = true;
                    inner.state.loading_more = false;
                    0
                }
            };
            inner.generation += 1;
            let (handle, registration) = AbortHandle::new_pair();
            inner.in_flight = Some(handle);
            (inner.generation, offset, registration)
        };

        let limit = self.config.limit;
        let result = Abortable::new(self.source.fetch_page(offset, limit), registration).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(offset, "discarding superseded page");
            return LoadOutcome::Superseded;
        }
        inner.in_flight = None;
        inner.state.loading = false;
        inner.state.loading_more = false;

        match result {
            Err(Aborted) | Ok(Err(ClientError::Aborted)) => LoadOutcome::Superseded,
            Ok(Err(e)) => {
                tracing::warn!(offset, error = %e, "page load failed");
                inner.state.error = Some(e.to_string());
                LoadOutcome::Failed
            }
            Ok(Ok(page)) => {
                let added = match kind {
                    LoadKind::More => self.append(&mut inner.state, page.items),
                    LoadKind::Reset | LoadKind::Refresh => {
                        inner.state.items.clear();
                        self.append(&mut inner.state, page.items)
                    }
                };
                let state = &mut inner.state;
                // An offset pinned at u32::MAX cannot reach another window.
                state.offset = offset.saturating_add(limit);
                state.total = page.total;
                state.has_more = page.has_more
                    && state.offset > offset
                    && state.items.len() < self.config.max_items;
                state.error = None;
                LoadOutcome::Loaded { added }
            }
        }
    }

    /// Appends items whose ids are not yet present, then enforces the item
    /// cap. Returns how many new items were kept.
    fn append(&self, state: &mut PaginationState<S::Item>, items: Vec<S::Item>) -> usize {
        let before = state.items.len();
        let mut seen: HashSet<i64> = state.items.iter().map(Identified::id).collect();
        state
            .items
            .extend(items.into_iter().filter(|item| seen.insert(item.id())));
        state.items.truncate(self.config.max_items);
        state.items.len().saturating_sub(before)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S::Item>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "pagination_test.rs"]
mod tests;
