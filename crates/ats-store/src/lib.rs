pub mod cart;
pub mod checkout;
pub mod error;
pub mod filters;
pub mod history;
pub mod related;
pub mod storage;

pub use cart::{Cart, CartConfig, CartItem, CartSummary};
pub use checkout::{place_order, CheckoutForm, OrderReceipt, PaymentMethod};
pub use error::{CheckoutError, StorageError};
pub use filters::{ActiveFilters, FilterKey, FilterOptions, FilterState, FilterUpdate};
pub use history::SearchHistory;
pub use related::{RelatedConfig, ScoredProduct};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
