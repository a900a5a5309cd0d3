//! Facet filtering for product listings.
//!
//! A [`FilterState`] owns the active criteria for one listing context (a
//! category page or the search page) plus the facets available in the
//! currently loaded product set. Active criteria persist under
//! `liquor-filters-<context>`.

use std::collections::BTreeSet;
use std::sync::Arc;

use ats_core::{Product, StockState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::storage::{read_json, write_json, KeyValueStore, BLOB_VERSION};

pub const FILTER_KEY_PREFIX: &str = "liquor-filters-";

const DEFAULT_PRICE_MIN: i64 = 0;
const DEFAULT_PRICE_MAX: i64 = 1000;

fn default_price_range() -> (Decimal, Decimal) {
    (Decimal::from(DEFAULT_PRICE_MIN), Decimal::from(DEFAULT_PRICE_MAX))
}

/// The criteria a user has selected. Empty sets mean "no constraint".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActiveFilters {
    pub subcategories: BTreeSet<String>,
    pub sizes: BTreeSet<String>,
    pub stock: BTreeSet<StockState>,
    /// Inclusive on both ends.
    pub price_range: (Decimal, Decimal),
    pub search_query: String,
}

impl Default for ActiveFilters {
    fn default() -> Self {
        Self {
            subcategories: BTreeSet::new(),
            sizes: BTreeSet::new(),
            stock: BTreeSet::new(),
            price_range: default_price_range(),
            search_query: String::new(),
        }
    }
}

impl ActiveFilters {
    /// The trimmed query, or `None` when blank.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        let trimmed = self.search_query.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Facets offered for the loaded product set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub subcategories: Vec<String>,
    pub sizes: Vec<String>,
    pub stock: Vec<StockState>,
    pub price_min: Decimal,
    pub price_max: Decimal,
}

impl Default for FilterOptions {
    fn default() -> Self {
        let (price_min, price_max) = default_price_range();
        Self {
            subcategories: Vec::new(),
            sizes: Vec::new(),
            stock: vec![StockState::InStock, StockState::OutOfStock],
            price_min,
            price_max,
        }
    }
}

impl FilterOptions {
    #[must_use]
    pub fn full_price_range(&self) -> (Decimal, Decimal) {
        (self.price_min, self.price_max)
    }
}

/// Identifies one facet of [`ActiveFilters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    Subcategories,
    Sizes,
    Stock,
    PriceRange,
    SearchQuery,
}

/// A replacement value for one facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterUpdate {
    Subcategories(BTreeSet<String>),
    Sizes(BTreeSet<String>),
    Stock(BTreeSet<StockState>),
    PriceRange(Decimal, Decimal),
    SearchQuery(String),
}

impl FilterUpdate {
    #[must_use]
    pub fn key(&self) -> FilterKey {
        match self {
            FilterUpdate::Subcategories(_) => FilterKey::Subcategories,
            FilterUpdate::Sizes(_) => FilterKey::Sizes,
            FilterUpdate::Stock(_) => FilterKey::Stock,
            FilterUpdate::PriceRange(..) => FilterKey::PriceRange,
            FilterUpdate::SearchQuery(_) => FilterKey::SearchQuery,
        }
    }

    fn apply(self, filters: &mut ActiveFilters) {
        match self {
            FilterUpdate::Subcategories(values) => filters.subcategories = values,
            FilterUpdate::Sizes(values) => filters.sizes = values,
            FilterUpdate::Stock(values) => filters.stock = values,
            FilterUpdate::PriceRange(min, max) => {
                filters.price_range = if min <= max { (min, max) } else { (max, min) };
            }
            FilterUpdate::SearchQuery(query) => filters.search_query = query,
        }
    }
}

/// `priceRangeSet` is false while the price range tracks the available
/// range; the stored range is then ignored on load.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredFiltersOut<'a> {
    version: &'static str,
    filters: &'a ActiveFilters,
    price_range_set: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFiltersIn {
    filters: ActiveFilters,
    #[serde(default)]
    price_range_set: bool,
}

pub struct FilterState {
    context: String,
    active: ActiveFilters,
    available: FilterOptions,
    /// True once the user picked a price range other than the full one.
    price_range_set: bool,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl std::fmt::Debug for FilterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterState")
            .field("context", &self.context)
            .field("active", &self.active)
            .field("available", &self.available)
            .field("price_range_set", &self.price_range_set)
            .finish_non_exhaustive()
    }
}

impl FilterState {
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            active: ActiveFilters::default(),
            available: FilterOptions::default(),
            price_range_set: false,
            store: None,
        }
    }

    /// A filter state whose saved criteria, if any, replace the defaults.
    #[must_use]
    pub fn with_store(context: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        let mut state = Self::new(context);
        let key = state.storage_key();
        match read_json::<StoredFiltersIn>(store.as_ref(), &key) {
            Ok(Some(saved)) => {
                state.active = saved.filters;
                if saved.price_range_set {
                    state.price_range_set = true;
                } else {
                    state.active.price_range = state.available.full_price_range();
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "ignoring saved filters"),
        }
        state.store = Some(store);
        state
    }

    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{FILTER_KEY_PREFIX}{}", self.context)
    }

    #[must_use]
    pub fn active(&self) -> &ActiveFilters {
        &self.active
    }

    #[must_use]
    pub fn available(&self) -> &FilterOptions {
        &self.available
    }

    /// Whether the price range was chosen by the user rather than following
    /// the available range.
    #[must_use]
    pub fn price_range_is_set(&self) -> bool {
        self.price_range_set
    }

    pub fn update_filter(&mut self, update: FilterUpdate) {
        self.apply(update);
        self.persist();
    }

    /// Applies several facet updates with a single save.
    pub fn set_active_filters(&mut self, updates: impl IntoIterator<Item = FilterUpdate>) {
        for update in updates {
            self.apply(update);
        }
        self.persist();
    }

    fn apply(&mut self, update: FilterUpdate) {
        let is_price = update.key() == FilterKey::PriceRange;
        update.apply(&mut self.active);
        if is_price {
            self.price_range_set = self.price_is_narrowed();
        }
    }

    /// Resets every facet; the price range goes back to the available range.
    pub fn clear_filters(&mut self) {
        self.active = ActiveFilters {
            price_range: self.available.full_price_range(),
            ..ActiveFilters::default()
        };
        self.price_range_set = false;
        self.persist();
    }

    pub fn clear_filter(&mut self, key: FilterKey) {
        match key {
            FilterKey::Subcategories => self.active.subcategories.clear(),
            FilterKey::Sizes => self.active.sizes.clear(),
            FilterKey::Stock => self.active.stock.clear(),
            FilterKey::PriceRange => {
                self.active.price_range = self.available.full_price_range();
                self.price_range_set = false;
            }
            FilterKey::SearchQuery => self.active.search_query.clear(),
        }
        self.persist();
    }

    /// Replaces the available facets. Unless the user picked a price range,
    /// the active range follows the new full range, so widening it never
    /// turns into an implicit price filter.
    pub fn set_available_filters(&mut self, options: FilterOptions) {
        self.available = options;
        if !self.price_range_set {
            self.active.price_range = self.available.full_price_range();
        }
    }

    /// Number of constraints in effect: one per selected set member, one for
    /// a narrowed price range, one for a non-blank query.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        let mut count =
            self.active.subcategories.len() + self.active.sizes.len() + self.active.stock.len();
        if self.price_is_narrowed() {
            count += 1;
        }
        if self.active.query().is_some() {
            count += 1;
        }
        count
    }

    #[must_use]
    pub fn is_filtering(&self) -> bool {
        self.applied_count() > 0
    }

    /// Keeps the items accepted by `predicate`. When no facet is active the
    /// input is returned unchanged.
    pub fn filter_items<T, F>(&self, items: &[T], predicate: F) -> Vec<T>
    where
        T: Clone,
        F: Fn(&T, &ActiveFilters) -> bool,
    {
        if !self.is_filtering() {
            return items.to_vec();
        }
        items
            .iter()
            .filter(|item| predicate(item, &self.active))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn filter_products(&self, products: &[Product]) -> Vec<Product> {
        self.filter_items(products, product_matches)
    }

    /// Short labels for the active constraints, in display order.
    #[must_use]
    pub fn filter_summary(&self) -> Vec<String> {
        let mut summary = Vec::new();

        let n = self.active.subcategories.len();
        if n > 0 {
            summary.push(format!("{n} subcategoría{}", plural(n)));
        }
        let n = self.active.sizes.len();
        if n > 0 {
            summary.push(format!("{n} tamaño{}", plural(n)));
        }
        let n = self.active.stock.len();
        if n > 0 {
            summary.push(format!("{n} disponibilidad"));
        }
        if self.price_is_narrowed() {
            let (min, max) = self.active.price_range;
            summary.push(format!("S/{min} - S/{max}"));
        }
        if let Some(query) = self.active.query() {
            summary.push(format!("\"{query}\""));
        }
        summary
    }

    fn price_is_narrowed(&self) -> bool {
        self.active.price_range != self.available.full_price_range()
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let key = self.storage_key();
        let blob = StoredFiltersOut {
            version: BLOB_VERSION,
            filters: &self.active,
            price_range_set: self.price_range_set,
        };
        if let Err(e) = write_json(store.as_ref(), &key, &blob) {
            tracing::warn!(key = %key, error = %e, "failed to save filters");
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n > 1 {
        "s"
    } else {
        ""
    }
}

/// Tests one product against every facet. All facets must match.
#[must_use]
pub fn product_matches(product: &Product, filters: &ActiveFilters) -> bool {
    if !filters.subcategories.is_empty() && !filters.subcategories.contains(&product.subcategory) {
        return false;
    }
    if !filters.sizes.is_empty() && !filters.sizes.contains(&product.size) {
        return false;
    }
    if !filters.stock.is_empty() && !filters.stock.contains(&product.stock_state()) {
        return false;
    }

    let (min, max) = filters.price_range;
    if product.base_price < min || product.base_price > max {
        return false;
    }

    if let Some(query) = filters.query() {
        let query = query.to_lowercase();
        let in_name = product.name.to_lowercase().contains(&query);
        let in_description = product.description.to_lowercase().contains(&query);
        if !in_name && !in_description {
            return false;
        }
    }
    true
}

/// Builds the facets offered for `products`: distinct sorted subcategories
/// and sizes, both stock states, and a price range that always covers
/// `[0, 1000]` and stretches to the highest positive price.
#[must_use]
pub fn derive_filter_options(products: &[Product]) -> FilterOptions {
    let subcategories: BTreeSet<&str> = products
        .iter()
        .map(|p| p.subcategory.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    let sizes: BTreeSet<&str> = products
        .iter()
        .map(|p| p.size.as_str())
        .filter(|s| !s.is_empty())
        .collect();

    let (default_min, default_max) = default_price_range();
    let positive_prices = products
        .iter()
        .map(|p| p.base_price)
        .filter(|price| *price > Decimal::ZERO);
    let (price_min, price_max) = positive_prices.fold((default_min, default_max), |(lo, hi), p| {
        (lo.min(p), hi.max(p))
    });

    FilterOptions {
        subcategories: subcategories.into_iter().map(str::to_owned).collect(),
        sizes: sizes.into_iter().map(str::to_owned).collect(),
        price_min,
        price_max,
        ..FilterOptions::default()
    }
}
