//! Shopping cart with derived pricing and local persistence.
//!
//! The cart is optimistic local-only state: every mutation recomputes the
//! [`CartSummary`] synchronously and writes the cart to the configured
//! [`KeyValueStore`]. Storage failures are logged and never block a
//! mutation.

use std::collections::HashMap;
use std::sync::Arc;

use ats_core::{AppConfig, Product};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::{read_json, write_json, KeyValueStore, BLOB_VERSION};

pub const DEFAULT_CART_KEY: &str = "liquor-ats-cart";

/// Shipping weight in kilograms per unit, keyed by catalog category.
/// Categories not listed weigh [`DEFAULT_UNIT_WEIGHT`].
const CATEGORY_WEIGHTS: &[(&str, f64)] = &[
    ("WHISKY", 1.2),
    ("CERVEZA", 0.5),
    ("VODKA", 1.0),
    ("RON", 1.0),
    ("TEQUILA", 1.0),
    ("VINO", 0.8),
];
const DEFAULT_UNIT_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CartConfig {
    pub storage_key: String,
    pub tax_rate: Decimal,
    pub free_shipping_threshold: Decimal,
    pub shipping_cost: Decimal,
    pub enable_persistence: bool,
    pub max_quantity_per_item: u32,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_CART_KEY.to_owned(),
            tax_rate: Decimal::new(16, 2),
            free_shipping_threshold: Decimal::from(1500),
            shipping_cost: Decimal::from(150),
            enable_persistence: true,
            max_quantity_per_item: 50,
        }
    }
}

impl CartConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tax_rate: config.tax_rate,
            free_shipping_threshold: config.free_shipping_threshold,
            shipping_cost: config.shipping_cost,
            max_quantity_per_item: config.max_quantity_per_item,
            ..Self::default()
        }
    }
}

/// One cart line. Product identity fields keep the catalog's column names
/// on disk so persisted carts stay readable by other storefront clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    #[serde(rename = "SKU", default)]
    pub sku: String,
    #[serde(rename = "Nombre", default)]
    pub name: String,
    #[serde(rename = "Modelo", default)]
    pub model: String,
    #[serde(rename = "Tamaño", default)]
    pub size: String,
    #[serde(rename = "Precio B", default)]
    pub base_price: Decimal,
    #[serde(rename = "Precio J", default)]
    pub wholesale_price: Decimal,
    #[serde(rename = "Categoria", default)]
    pub category: String,
    #[serde(rename = "Sub Categoria", default)]
    pub subcategory: String,
    #[serde(rename = "Stock", default)]
    pub stock: String,
    #[serde(rename = "Photo", default)]
    pub photo: String,
    pub quantity: u32,
    /// Base price captured when the item was first added. Later catalog
    /// price changes do not affect it.
    #[serde(rename = "unitPrice")]
    pub unit_price: Decimal,
    #[serde(rename = "addedAt")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            model: product.model.clone(),
            size: product.size.clone(),
            base_price: product.base_price,
            wholesale_price: product.wholesale_price,
            category: product.category.clone(),
            subcategory: product.subcategory.clone(),
            stock: product.stock.clone(),
            photo: product.photo.clone(),
            quantity,
            unit_price: product.base_price,
            added_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Derived totals. Never stored; always recomputed from the current items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub tax_rate: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub item_count: u64,
    pub unique_item_count: usize,
}

/// Computes the summary for `items` under `config`.
///
/// Shipping is free once the subtotal reaches the threshold. An empty cart
/// still reports the flat shipping cost, matching the storefront.
#[must_use]
pub fn compute_summary(items: &[CartItem], config: &CartConfig) -> CartSummary {
    let subtotal: Decimal = items.iter().map(CartItem::line_total).sum();
    let item_count = items.iter().map(|item| u64::from(item.quantity)).sum();
    let tax = subtotal * config.tax_rate;
    let shipping = if subtotal >= config.free_shipping_threshold {
        Decimal::ZERO
    } else {
        config.shipping_cost
    };
    // Promotions are not modelled yet.
    let discount = Decimal::ZERO;
    let total = subtotal + tax + shipping - discount;

    CartSummary {
        subtotal,
        tax,
        tax_rate: config.tax_rate,
        shipping,
        discount,
        total,
        item_count,
        unique_item_count: items.len(),
    }
}

#[derive(Serialize)]
struct StoredCartOut<'a> {
    items: &'a [CartItem],
    #[serde(rename = "savedAt")]
    saved_at: DateTime<Utc>,
    version: &'static str,
}

#[derive(Deserialize)]
struct StoredCartIn {
    #[serde(default)]
    items: Option<Vec<CartItem>>,
}

#[derive(Serialize)]
struct ExportedCart<'a> {
    items: &'a [CartItem],
    summary: &'a CartSummary,
    #[serde(rename = "exportedAt")]
    exported_at: DateTime<Utc>,
    version: &'static str,
}

pub struct Cart {
    config: CartConfig,
    items: Vec<CartItem>,
    summary: CartSummary,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart")
            .field("config", &self.config)
            .field("items", &self.items)
            .field("summary", &self.summary)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl Cart {
    /// A cart with no backing store.
    #[must_use]
    pub fn new(config: CartConfig) -> Self {
        let summary = compute_summary(&[], &config);
        Self {
            config,
            items: Vec::new(),
            summary,
            store: None,
        }
    }

    /// A cart backed by `store`. When persistence is enabled the saved cart
    /// is loaded immediately; a missing or unreadable blob yields an empty
    /// cart.
    #[must_use]
    pub fn with_store(config: CartConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let mut cart = Self::new(config);
        cart.store = Some(store);
        if cart.config.enable_persistence {
            if let Err(e) = cart.load() {
                tracing::warn!(key = %cart.config.storage_key, error = %e, "failed to load saved cart");
            }
        }
        cart
    }

    #[must_use]
    pub fn config(&self) -> &CartConfig {
        &self.config
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn summary(&self) -> &CartSummary {
        &self.summary
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Adds `quantity` units of `product`.
    ///
    /// An existing line for the same product id is merged and capped at the
    /// per-item maximum; its captured unit price is kept. Non-positive
    /// quantities are ignored.
    pub fn add_item(&mut self, product: &Product, quantity: i64) {
        if quantity <= 0 {
            return;
        }
        let max = self.config.max_quantity_per_item;

        if let Some(existing) = self.items.iter_mut().find(|item| item.id == product.id) {
            existing.quantity = clamp_quantity(i64::from(existing.quantity) + quantity, max);
        } else {
            self.items
                .push(CartItem::from_product(product, clamp_quantity(quantity, max)));
        }
        self.commit();
    }

    pub fn remove_item(&mut self, product_id: i64) {
        let before = self.items.len();
        self.items.retain(|item| item.id != product_id);
        if self.items.len() != before {
            self.commit();
        }
    }

    /// Sets the quantity of an existing line. Zero or negative removes it.
    pub fn update_quantity(&mut self, product_id: i64, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }
        let max = self.config.max_quantity_per_item;
        if let Some(item) = self.items.iter_mut().find(|item| item.id == product_id) {
            item.quantity = clamp_quantity(quantity, max);
            self.commit();
        }
    }

    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.commit();
    }

    /// Adds one unit unless the line is already at the cap.
    pub fn increment_quantity(&mut self, product_id: i64) {
        if let Some(quantity) = self.get_item(product_id).map(|item| item.quantity) {
            if quantity < self.config.max_quantity_per_item {
                self.update_quantity(product_id, i64::from(quantity) + 1);
            }
        }
    }

    /// Removes one unit; the line disappears when it reaches zero.
    pub fn decrement_quantity(&mut self, product_id: i64) {
        if let Some(quantity) = self.get_item(product_id).map(|item| item.quantity) {
            self.update_quantity(product_id, i64::from(quantity) - 1);
        }
    }

    #[must_use]
    pub fn get_item(&self, product_id: i64) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == product_id)
    }

    #[must_use]
    pub fn item_quantity(&self, product_id: i64) -> u32 {
        self.get_item(product_id).map_or(0, |item| item.quantity)
    }

    #[must_use]
    pub fn is_in_cart(&self, product_id: i64) -> bool {
        self.get_item(product_id).is_some()
    }

    #[must_use]
    pub fn can_add_more(&self, product_id: i64) -> bool {
        self.get_item(product_id)
            .is_none_or(|item| item.quantity < self.config.max_quantity_per_item)
    }

    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.summary.item_count
    }

    #[must_use]
    pub fn total_value(&self) -> Decimal {
        self.summary.total
    }

    /// Estimated shipping weight in kilograms.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.items
            .iter()
            .map(|item| unit_weight(&item.category) * f64::from(item.quantity))
            .sum()
    }

    /// Writes the cart to the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the blob cannot be encoded or written.
    /// A cart without a store saves nothing and succeeds.
    pub fn save(&self) -> Result<(), StorageError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let blob = StoredCartOut {
            items: &self.items,
            saved_at: Utc::now(),
            version: BLOB_VERSION,
        };
        write_json(store.as_ref(), &self.config.storage_key, &blob)
    }

    /// Replaces the in-memory items with the saved cart and returns the
    /// number of lines loaded. A blob without an `items` array is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the blob cannot be read or decoded.
    pub fn load(&mut self) -> Result<usize, StorageError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let stored: Option<StoredCartIn> = read_json(store.as_ref(), &self.config.storage_key)?;
        let Some(items) = stored.and_then(|blob| blob.items) else {
            return Ok(0);
        };
        self.items = normalize_items(items, self.config.max_quantity_per_item);
        self.summary = compute_summary(&self.items, &self.config);
        tracing::info!(items = self.items.len(), "cart loaded");
        Ok(self.items.len())
    }

    /// Serializes the cart and its summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Encode`] if serialization fails.
    pub fn export_cart(&self) -> Result<String, StorageError> {
        let export = ExportedCart {
            items: &self.items,
            summary: &self.summary,
            exported_at: Utc::now(),
            version: BLOB_VERSION,
        };
        serde_json::to_string_pretty(&export).map_err(|source| StorageError::Encode {
            key: self.config.storage_key.clone(),
            source,
        })
    }

    /// Replaces the cart with the items in an exported document. Returns
    /// `false` and leaves the cart untouched when the document has no valid
    /// `items` array.
    pub fn import_cart(&mut self, data: &str) -> bool {
        let parsed: Result<StoredCartIn, _> = serde_json::from_str(data);
        match parsed {
            Ok(StoredCartIn { items: Some(items) }) => {
                self.items = normalize_items(items, self.config.max_quantity_per_item);
                self.commit();
                tracing::info!(items = self.items.len(), "cart imported");
                true
            }
            Ok(StoredCartIn { items: None }) => false,
            Err(e) => {
                tracing::warn!(error = %e, "rejected cart import");
                false
            }
        }
    }

    fn commit(&mut self) {
        self.summary = compute_summary(&self.items, &self.config);
        if self.config.enable_persistence {
            if let Err(e) = self.save() {
                tracing::warn!(key = %self.config.storage_key, error = %e, "failed to save cart");
            }
        }
    }
}

fn clamp_quantity(quantity: i64, max: u32) -> u32 {
    let max = max.max(1);
    u32::try_from(quantity.clamp(1, i64::from(max))).unwrap_or(max)
}

fn unit_weight(category: &str) -> f64 {
    CATEGORY_WEIGHTS
        .iter()
        .find(|(name, _)| *name == category)
        .map_or(DEFAULT_UNIT_WEIGHT, |(_, weight)| *weight)
}

/// Restores cart invariants on externally supplied items: one line per
/// product id (quantities merged, first line's price kept), no empty lines,
/// quantities capped.
fn normalize_items(items: Vec<CartItem>, max: u32) -> Vec<CartItem> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut normalized: Vec<CartItem> = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity == 0 {
            continue;
        }
        if let Some(&pos) = index.get(&item.id) {
            let merged = i64::from(normalized[pos].quantity) + i64::from(item.quantity);
            normalized[pos].quantity = clamp_quantity(merged, max);
        } else {
            index.insert(item.id, normalized.len());
            let quantity = clamp_quantity(i64::from(item.quantity), max);
            normalized.push(CartItem { quantity, ..item });
        }
    }
    normalized
}

#[cfg(test)]
#[path = "cart_test.rs"]
mod tests;
