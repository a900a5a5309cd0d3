//! Catalog command handlers: categories, browsing, search and product pages.
//!
//! Listing commands print plain-text tables to stdout. Filters and recent
//! searches are persisted in the local store between runs.

use std::collections::BTreeSet;
use std::sync::Arc;

use ats_client::{
    ApiClient, ApiListing, ApiSearch, DebouncedSearch, Listing, LoadOutcome, PaginationConfig,
    Paginator, RelatedProducts, SearchConfig, SearchOutcome,
};
use ats_core::{Product, StockState};
use ats_store::filters::derive_filter_options;
use ats_store::{
    ActiveFilters, FilterState, FilterUpdate, KeyValueStore, RelatedConfig, SearchHistory,
};
use clap::Args;
use rust_decimal::Decimal;

/// History context for searches run from the command line.
const SEARCH_CONTEXT: &str = "cli";

/// Filter flags accepted by `browse`. Only the facets given on the command
/// line replace the saved ones.
#[derive(Debug, Default, Args)]
pub struct FilterArgs {
    /// Keep only this subcategory (repeatable)
    #[arg(long = "subcategory")]
    pub subcategories: Vec<String>,
    /// Keep only this size, e.g. 750ml (repeatable)
    #[arg(long = "size")]
    pub sizes: Vec<String>,
    /// Keep only products in stock
    #[arg(long, conflicts_with = "out_of_stock")]
    pub in_stock: bool,
    /// Keep only products out of stock
    #[arg(long)]
    pub out_of_stock: bool,
    /// Lowest price to show
    #[arg(long)]
    pub min_price: Option<Decimal>,
    /// Highest price to show
    #[arg(long)]
    pub max_price: Option<Decimal>,
    /// Text matched against product name and description
    #[arg(long)]
    pub query: Option<String>,
    /// Forget the filters saved for this category before applying these
    #[arg(long)]
    pub clear_filters: bool,
}

impl FilterArgs {
    /// Filter updates for the flags that were given. A single price bound
    /// keeps the other bound of `current`.
    pub(crate) fn updates(&self, current: &ActiveFilters) -> Vec<FilterUpdate> {
        let mut updates = Vec::new();
        if !self.subcategories.is_empty() {
            updates.push(FilterUpdate::Subcategories(
                self.subcategories.iter().cloned().collect(),
            ));
        }
        if !self.sizes.is_empty() {
            updates.push(FilterUpdate::Sizes(self.sizes.iter().cloned().collect()));
        }
        if self.in_stock || self.out_of_stock {
            let state = if self.in_stock {
                StockState::InStock
            } else {
                StockState::OutOfStock
            };
            updates.push(FilterUpdate::Stock(BTreeSet::from([state])));
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            let (min, max) = current.price_range;
            updates.push(FilterUpdate::PriceRange(
                self.min_price.unwrap_or(min),
                self.max_price.unwrap_or(max),
            ));
        }
        if let Some(query) = &self.query {
            updates.push(FilterUpdate::SearchQuery(query.clone()));
        }
        updates
    }
}

/// List categories, falling back to the built-in set when the API is down.
pub(crate) async fn run_categories(client: &ApiClient, limit: Option<u32>) {
    let categories = client.categories_or_fallback(limit).await;

    println!("{:<16}{:<24}{:>10}{:>10}", "KEY", "NAME", "PRODUCTS", "IN STOCK");
    for category in &categories {
        let in_stock = category
            .products_in_stock
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "{:<16}{:<24}{:>10}{:>10}",
            category.key,
            category.name(),
            category.total_products,
            in_stock
        );
    }
}

/// Load up to `pages` pages of a category and print the products that pass
/// the category's filters.
///
/// # Errors
///
/// Returns an error if the first page cannot be loaded. A failure on a
/// later page is logged and the pages loaded so far are shown.
pub(crate) async fn run_browse(
    client: &ApiClient,
    store: &Arc<dyn KeyValueStore>,
    category: &str,
    pages: u32,
    args: &FilterArgs,
) -> anyhow::Result<()> {
    let listing = ApiListing::new(client.clone(), Listing::Category(category.to_owned()));
    let paginator = Paginator::new(listing, PaginationConfig::category_listing());

    for _ in 0..pages.max(1) {
        match paginator.load_more().await {
            LoadOutcome::Loaded { .. } => {}
            LoadOutcome::Failed => {
                let state = paginator.snapshot();
                let error = state.error.unwrap_or_default();
                if state.items.is_empty() {
                    anyhow::bail!("failed to load category '{category}': {error}");
                }
                tracing::warn!(category, error = %error, "stopping after page load failure");
                break;
            }
            LoadOutcome::Skipped
            | LoadOutcome::Superseded
            | LoadOutcome::Throttled => break,
        }
    }
    let state = paginator.snapshot();

    let mut filters = FilterState::with_store(category, Arc::clone(store));
    if args.clear_filters {
        filters.clear_filters();
    }
    filters.set_available_filters(derive_filter_options(&state.items));
    let updates = args.updates(filters.active());
    if !updates.is_empty() {
        filters.set_active_filters(updates);
    }

    let shown = filters.filter_products(&state.items);
    print_products(&shown);
    println!();
    println!(
        "showing {} of {} loaded ({} in category), {} page(s), {:.0}% loaded{}",
        shown.len(),
        state.items.len(),
        state.total,
        state.page().saturating_sub(1),
        state.progress(),
        if state.has_more { "; use --pages to load more" } else { "" }
    );
    if filters.is_filtering() {
        println!(
            "{} filter(s): {}",
            filters.applied_count(),
            filters.filter_summary().join(", ")
        );
    }
    Ok(())
}

/// Run one search and print the results. Without a query, print the recent
/// searches instead.
///
/// # Errors
///
/// Returns an error if the search request fails.
pub(crate) async fn run_search(
    client: &ApiClient,
    store: &Arc<dyn KeyValueStore>,
    query: Option<&str>,
    limit: u32,
    clear_history: bool,
) -> anyhow::Result<()> {
    let config = SearchConfig::default();
    let min_length = config.min_length;
    let history = SearchHistory::with_store(SEARCH_CONTEXT, Arc::clone(store));
    let search = DebouncedSearch::new(ApiSearch::new(client.clone(), limit), config, history);

    if clear_history {
        search.clear_history();
        println!("search history cleared");
    }

    let Some(query) = query else {
        let recent = search.history();
        if recent.is_empty() {
            println!("no recent searches");
        }
        for entry in recent {
            println!("{entry}");
        }
        return Ok(());
    };

    match search.perform_search(query).await {
        SearchOutcome::Cleared => {
            println!("enter at least {min_length} characters to search");
        }
        SearchOutcome::Failed => {
            let error = search.snapshot().error.unwrap_or_default();
            anyhow::bail!("search for '{query}' failed: {error}");
        }
        SearchOutcome::Completed { .. } | SearchOutcome::Superseded => {
            let snapshot = search.snapshot();
            if snapshot.is_empty {
                println!("no products match '{query}'");
            } else {
                print_products(&snapshot.results);
                println!();
                println!(
                    "{} result(s) in {} ms",
                    snapshot.result_count,
                    snapshot.elapsed.as_millis()
                );
            }
        }
    }
    Ok(())
}

/// Print one product's details.
///
/// # Errors
///
/// Returns an error if neither `id` nor `sku` is given or the lookup fails.
pub(crate) async fn run_product(
    client: &ApiClient,
    id: Option<i64>,
    sku: Option<&str>,
) -> anyhow::Result<()> {
    let product = match (id, sku) {
        (Some(id), _) => client.product_by_id(id).await?,
        (None, Some(sku)) => client.product_by_sku(sku).await?,
        (None, None) => anyhow::bail!("give a product id or --sku"),
    };

    println!("{} (#{})", product.name, product.id);
    println!("SKU:          {}", product.sku);
    println!("Category:     {} / {}", product.category, product.subcategory);
    println!("Size:         {}", product.size);
    println!("Price:        {}", fmt_money(product.base_price));
    println!("Availability: {}", product.stock_state());
    if let Some(units) = product.units_on_hand {
        println!("On hand:      {units}");
    }
    if !product.description.is_empty() {
        println!();
        println!("{}", product.description);
    }
    Ok(())
}

/// Print the products most similar to product `id`.
///
/// # Errors
///
/// Returns an error if the product or its category listing cannot be
/// fetched.
pub(crate) async fn run_related(
    client: &ApiClient,
    id: i64,
    max: usize,
    with_brand: bool,
) -> anyhow::Result<()> {
    let current = client.product_by_id(id).await?;
    let config = RelatedConfig {
        max_products: max,
        include_brand: with_brand,
        ..RelatedConfig::default()
    };
    let related = RelatedProducts::new(client.clone(), config)
        .related_to(&current)
        .await?;

    if related.is_empty() {
        println!("no related products for '{}'", current.name);
        return Ok(());
    }
    println!("related to {} (#{}):", current.name, current.id);
    println!("{:>6}  {:<8}{:>12}  NAME", "SCORE", "ID", "PRICE");
    for scored in &related {
        println!(
            "{:>6.1}  {:<8}{:>12}  {}",
            scored.score,
            scored.product.id,
            fmt_money(scored.product.base_price),
            scored.product.name
        );
    }
    Ok(())
}

pub(crate) fn fmt_money(amount: Decimal) -> String {
    format!("S/{amount:.2}")
}

fn print_products(products: &[Product]) {
    println!(
        "{:<8}{:<14}{:<12}{:>12}  {:<10}NAME",
        "ID", "SKU", "SIZE", "PRICE", "STOCK"
    );
    for product in products {
        println!(
            "{:<8}{:<14}{:<12}{:>12}  {:<10}{}",
            product.id,
            product.sku,
            product.size,
            fmt_money(product.base_price),
            product.stock_state().label(),
            product.name
        );
    }
}
