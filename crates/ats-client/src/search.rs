//! Debounced product search.
//!
//! Keystrokes are pushed into a [`DebouncedSearch`] with
//! [`DebouncedSearch::set_query`]. A background task waits for the input to
//! settle (or for the max-wait ceiling under continuous typing) and then
//! runs the search. Starting a search aborts the previous one, and only the
//! newest search may commit results.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use ats_core::Product;
use ats_store::SearchHistory;
use futures::future::{AbortHandle, Abortable, Aborted};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::client::ApiClient;
use crate::error::ClientError;

/// An async search backend.
pub trait SearchSource: Send + Sync {
    type Item: Clone + Send;

    fn search(&self, query: &str)
        -> impl Future<Output = Result<Vec<Self::Item>, ClientError>> + Send;
}

/// [`SearchSource`] backed by the product API's search endpoint.
#[derive(Debug, Clone)]
pub struct ApiSearch {
    client: ApiClient,
    limit: u32,
}

impl ApiSearch {
    #[must_use]
    pub fn new(client: ApiClient, limit: u32) -> Self {
        Self { client, limit }
    }
}

impl SearchSource for ApiSearch {
    type Item = Product;

    async fn search(&self, query: &str) -> Result<Vec<Product>, ClientError> {
        self.client.search(query, self.limit).await
    }
}

/// Emits the latest value of a watch channel once it has stopped changing
/// for `delay`, or once `max_wait` has passed since the first unsettled
/// change, whichever comes first.
pub struct Debouncer<T> {
    rx: watch::Receiver<T>,
    delay: Duration,
    max_wait: Option<Duration>,
}

impl<T: Clone> Debouncer<T> {
    #[must_use]
    pub fn new(rx: watch::Receiver<T>, delay: Duration, max_wait: Option<Duration>) -> Self {
        Self {
            rx,
            delay,
            max_wait,
        }
    }

    /// Waits for the next settled value. Returns `None` once the sender is
    /// gone and no unsettled value remains.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        let ceiling = self.max_wait.map(|wait| Instant::now() + wait);

        loop {
            let mut deadline = Instant::now() + self.delay;
            if let Some(ceiling) = ceiling {
                deadline = deadline.min(ceiling);
            }
            tokio::select! {
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return Some(self.rx.borrow_and_update().clone());
                    }
                }
                () = tokio::time::sleep_until(deadline) => {
                    return Some(self.rx.borrow_and_update().clone());
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub debounce: Duration,
    /// Longest a changing query can go without a search. `None` disables
    /// the ceiling.
    pub max_wait: Option<Duration>,
    /// Queries shorter than this (in characters) clear the results instead
    /// of searching.
    pub min_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let debounce = Duration::from_millis(300);
        Self {
            debounce,
            max_wait: Some(debounce * 3),
            min_length: 2,
        }
    }
}

/// Current search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSnapshot<T> {
    /// The query the results belong to.
    pub query: String,
    pub results: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
    pub result_count: usize,
    /// A long-enough query finished with no results.
    pub is_empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Completed { count: usize },
    /// The query was blank or too short; results were cleared.
    Cleared,
    /// A newer search started first; this one's result was discarded.
    Superseded,
    /// The search failed; the message is in [`SearchSnapshot::error`].
    Failed,
}

struct Inner<T> {
    query: String,
    results: Vec<T>,
    loading: bool,
    error: Option<String>,
    elapsed: Duration,
    generation: u64,
    in_flight: Option<AbortHandle>,
}

pub struct DebouncedSearch<S: SearchSource> {
    source: S,
    config: SearchConfig,
    input: watch::Sender<String>,
    inner: Mutex<Inner<S::Item>>,
    history: Mutex<SearchHistory>,
}

impl<S: SearchSource> std::fmt::Debug for DebouncedSearch<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedSearch")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S> DebouncedSearch<S>
where
    S: SearchSource + 'static,
    S::Item: 'static,
{
    #[must_use]
    pub fn new(source: S, config: SearchConfig, history: SearchHistory) -> Arc<Self> {
        let (input, _) = watch::channel(String::new());
        Arc::new(Self {
            source,
            config,
            input,
            inner: Mutex::new(Inner {
                query: String::new(),
                results: Vec::new(),
                loading: false,
                error: None,
                elapsed: Duration::ZERO,
                generation: 0,
                in_flight: None,
            }),
            history: Mutex::new(history),
        })
    }

    /// Starts the debounce loop. The loop ends when the last `Arc` to this
    /// search is dropped.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut debouncer = Debouncer::new(
            self.input.subscribe(),
            self.config.debounce,
            self.config.max_wait,
        );
        tokio::spawn(async move {
            while let Some(query) = debouncer.next().await {
                let Some(search) = weak.upgrade() else {
                    break;
                };
                tokio::spawn(async move {
                    search.perform_search(&query).await;
                });
            }
        })
    }

    /// Records the latest user input. The search runs once input settles.
    pub fn set_query(&self, query: impl Into<String>) {
        self.input.send_replace(query.into());
    }

    /// The latest raw input, which may not have been searched yet.
    #[must_use]
    pub fn pending_query(&self) -> String {
        self.input.borrow().clone()
    }

    /// Runs a search for `query` immediately, bypassing the debounce.
    pub async fn perform_search(&self, query: &str) -> SearchOutcome {
        let too_short = self.is_too_short(query);

        let (generation, registration) = {
            let mut inner = self.lock();
            inner.generation += 1;
            if let Some(handle) = inner.in_flight.take() {
                handle.abort();
            }
            inner.query = query.to_owned();
            inner.error = None;
            if too_short {
                inner.results.clear();
                inner.loading = false;
                return SearchOutcome::Cleared;
            }
            inner.loading = true;
            let (handle, registration) = AbortHandle::new_pair();
            inner.in_flight = Some(handle);
            (inner.generation, registration)
        };

        let started = Instant::now();
        let result = Abortable::new(self.source.search(query), registration).await;
        let elapsed = started.elapsed();

        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return SearchOutcome::Superseded;
            }
            inner.in_flight = None;
            inner.loading = false;

            match result {
                Err(Aborted) | Ok(Err(ClientError::Aborted)) => return SearchOutcome::Superseded,
                Ok(Err(e)) => {
                    tracing::warn!(query, error = %e, "search failed");
                    inner.error = Some(e.to_string());
                    return SearchOutcome::Failed;
                }
                Ok(Ok(results)) => {
                    inner.results = results;
                    inner.elapsed = elapsed;
                }
            }
        }

        let count = self.lock().results.len();
        tracing::debug!(
            query,
            count,
            elapsed_ms = elapsed.as_millis(),
            "search completed"
        );
        self.history_lock().add(query);
        SearchOutcome::Completed { count }
    }

    /// Aborts the search in flight, if any.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        if let Some(handle) = inner.in_flight.take() {
            handle.abort();
        }
        inner.loading = false;
    }

    #[must_use]
    pub fn snapshot(&self) -> SearchSnapshot<S::Item> {
        let inner = self.lock();
        let long_enough = !self.is_too_short(&inner.query);
        SearchSnapshot {
            query: inner.query.clone(),
            results: inner.results.clone(),
            loading: inner.loading,
            error: inner.error.clone(),
            elapsed: inner.elapsed,
            result_count: inner.results.len(),
            is_empty: !inner.loading && inner.results.is_empty() && long_enough,
        }
    }

    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history_lock().entries().to_vec()
    }

    pub fn clear_history(&self) {
        self.history_lock().clear();
    }

    pub fn remove_from_history(&self, query: &str) {
        self.history_lock().remove(query);
    }

    fn is_too_short(&self, query: &str) -> bool {
        let trimmed = query.trim();
        trimmed.is_empty() || trimmed.chars().count() < self.config.min_length
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S::Item>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn history_lock(&self) -> MutexGuard<'_, SearchHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
