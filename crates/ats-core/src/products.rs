use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Stock label the catalog uses for products that cannot be ordered.
pub const OUT_OF_STOCK_LABEL: &str = "Sin Stock";
/// Stock label for everything else. The catalog stores free-form stock
/// strings; only [`OUT_OF_STOCK_LABEL`] means unavailable.
pub const IN_STOCK_LABEL: &str = "Con Stock";

/// Availability facet derived from a product's raw `Stock` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StockState {
    #[serde(rename = "Con Stock")]
    InStock,
    #[serde(rename = "Sin Stock")]
    OutOfStock,
}

impl StockState {
    /// Maps the raw `Stock` column: `"Sin Stock"` is out of stock, any other
    /// value (including empty) counts as in stock.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        if raw == OUT_OF_STOCK_LABEL {
            StockState::OutOfStock
        } else {
            StockState::InStock
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            StockState::InStock => IN_STOCK_LABEL,
            StockState::OutOfStock => OUT_OF_STOCK_LABEL,
        }
    }
}

impl std::fmt::Display for StockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A product record as served by the catalog API.
///
/// Field names on the wire are the catalog's column names, which are in
/// Spanish and contain spaces (`"Precio B"`, `"Sub Categoria"`). Columns the
/// API leaves `null` collapse to empty strings or zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    #[serde(rename = "SKU", default, deserialize_with = "null_as_default")]
    pub sku: String,
    #[serde(rename = "Nombre", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "Modelo", default, deserialize_with = "null_as_default")]
    pub model: String,
    /// Bottle or pack size, e.g. `"750ml"` or `"Six Pack"`.
    #[serde(rename = "Tamaño", default, deserialize_with = "null_as_default")]
    pub size: String,
    /// Retail price. This is the price captured into the cart.
    #[serde(rename = "Precio B", default, deserialize_with = "null_as_default")]
    pub base_price: Decimal,
    /// Wholesale price.
    #[serde(rename = "Precio J", default, deserialize_with = "null_as_default")]
    pub wholesale_price: Decimal,
    #[serde(rename = "Categoria", default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(rename = "Sub Categoria", default, deserialize_with = "null_as_default")]
    pub subcategory: String,
    /// Raw stock label; see [`StockState::from_raw`].
    #[serde(rename = "Stock", default, deserialize_with = "null_as_default")]
    pub stock: String,
    #[serde(
        rename = "Sub Categoria Nivel",
        default,
        deserialize_with = "null_as_default"
    )]
    pub subcategory_level: String,
    #[serde(rename = "Al Por Mayor", default, deserialize_with = "null_as_default")]
    pub wholesale: String,
    #[serde(rename = "Top_S_Sku", default, deserialize_with = "null_as_default")]
    pub top_sku: String,
    #[serde(rename = "Product_asig", default, deserialize_with = "null_as_default")]
    pub assignment: String,
    #[serde(rename = "Descripcion", default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Units on hand. The API sometimes serializes this as a float.
    #[serde(rename = "Cantidad", default)]
    pub units_on_hand: Option<f64>,
    #[serde(rename = "Photo", default, deserialize_with = "null_as_default")]
    pub photo: String,
}

impl Product {
    #[must_use]
    pub fn stock_state(&self) -> StockState {
        StockState::from_raw(&self.stock)
    }

    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.stock_state() == StockState::InStock
    }
}

/// A category entry from the category listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category key used in listing URLs, e.g. `"WHISKY"`.
    #[serde(rename = "Categoria")]
    pub key: String,
    /// Display name, e.g. `"Whiskies"`.
    #[serde(rename = "Sub_Categoria", default)]
    pub display_name: Option<String>,
    /// Sort key assigned by the catalog.
    #[serde(rename = "Sub_Categoria_Nivel", default)]
    pub level: Option<String>,
    #[serde(rename = "total_productos", default)]
    pub total_products: u64,
    #[serde(rename = "productos_con_stock", default)]
    pub products_in_stock: Option<u64>,
}

impl Category {
    /// Display name, falling back to the category key.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }

    /// Categories without a stock count are assumed to have stock.
    #[must_use]
    pub fn has_stock(&self) -> bool {
        self.products_in_stock.is_none_or(|n| n > 0)
    }

    /// Static category set shown when the catalog API is unreachable.
    #[must_use]
    pub fn fallback_set() -> Vec<Category> {
        [
            ("CERVEZA", "Cervezas", "1", 153),
            ("WHISKY", "Whiskies", "2", 78),
            ("TRAGOS", "Tragos", "3", 76),
            ("VODKA", "Vodkas", "4", 74),
            ("PISCO", "Piscos", "5", 67),
        ]
        .into_iter()
        .map(|(key, name, level, total)| Category {
            key: key.to_string(),
            display_name: Some(name.to_string()),
            level: Some(level.to_string()),
            total_products: total,
            products_in_stock: Some(total),
        })
        .collect()
    }
}

/// Deserializes `null` as `T::default()`; `#[serde(default)]` only covers
/// absent keys.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_record() -> serde_json::Value {
        serde_json::json!({
            "id": 412,
            "SKU": "WH-JW-BLK-750",
            "Nombre": "Johnnie Walker Black Label",
            "Modelo": "Black Label",
            "Tamaño": "750ml",
            "Precio B": 159.9,
            "Precio J": 145.0,
            "Categoria": "WHISKY",
            "Sub Categoria": "Whiskies",
            "Stock": "Con Stock",
            "Sub Categoria Nivel": "2",
            "Al Por Mayor": "Si",
            "Top_S_Sku": "",
            "Product_asig": "",
            "Descripcion": "Blended Scotch whisky, 12 years",
            "Cantidad": 24.0,
            "Photo": "https://cdn.example.com/jw-black.jpg"
        })
    }

    #[test]
    fn deserializes_api_record_with_spanish_column_names() {
        let product: Product = serde_json::from_value(api_record()).unwrap();
        assert_eq!(product.id, 412);
        assert_eq!(product.sku, "WH-JW-BLK-750");
        assert_eq!(product.name, "Johnnie Walker Black Label");
        assert_eq!(product.size, "750ml");
        assert_eq!(product.base_price, Decimal::new(1599, 1));
        assert_eq!(product.wholesale_price, Decimal::from(145));
        assert_eq!(product.subcategory, "Whiskies");
        assert_eq!(product.units_on_hand, Some(24.0));
    }

    #[test]
    fn null_and_missing_columns_collapse_to_defaults() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": 7,
            "Nombre": null,
            "Precio B": null,
            "Stock": null
        }))
        .unwrap();
        assert_eq!(product.name, "");
        assert_eq!(product.base_price, Decimal::ZERO);
        assert_eq!(product.stock, "");
        assert!(product.units_on_hand.is_none());
    }

    #[test]
    fn price_as_string_is_accepted() {
        let mut record = api_record();
        record["Precio B"] = serde_json::json!("89.50");
        let product: Product = serde_json::from_value(record).unwrap();
        assert_eq!(product.base_price, Decimal::new(8950, 2));
    }

    #[test]
    fn stock_state_only_sin_stock_is_out() {
        assert_eq!(StockState::from_raw("Sin Stock"), StockState::OutOfStock);
        assert_eq!(StockState::from_raw("Con Stock"), StockState::InStock);
        assert_eq!(StockState::from_raw("Pocas unidades"), StockState::InStock);
        assert_eq!(StockState::from_raw(""), StockState::InStock);
    }

    #[test]
    fn stock_state_labels() {
        assert_eq!(StockState::InStock.to_string(), "Con Stock");
        assert_eq!(StockState::OutOfStock.label(), "Sin Stock");
    }

    #[test]
    fn category_name_falls_back_to_key() {
        let category: Category = serde_json::from_value(serde_json::json!({
            "Categoria": "RON",
            "total_productos": 12
        }))
        .unwrap();
        assert_eq!(category.name(), "RON");
        assert!(category.has_stock());
    }

    #[test]
    fn category_without_stock_is_flagged() {
        let category: Category = serde_json::from_value(serde_json::json!({
            "Categoria": "VINO",
            "Sub_Categoria": "Vinos",
            "total_productos": 30,
            "productos_con_stock": 0
        }))
        .unwrap();
        assert_eq!(category.name(), "Vinos");
        assert!(!category.has_stock());
    }

    #[test]
    fn fallback_set_is_ordered_by_level() {
        let categories = Category::fallback_set();
        assert_eq!(categories.len(), 5);
        assert_eq!(categories[0].key, "CERVEZA");
        assert_eq!(categories[4].name(), "Piscos");
    }
}
