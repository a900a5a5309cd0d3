pub mod cache;
pub mod client;
pub mod error;
pub mod pagination;
pub mod related;
pub(crate) mod retry;
pub mod search;
pub mod types;

pub use cache::{CategoryCache, TtlCache};
pub use client::ApiClient;
pub use error::ClientError;
pub use pagination::{
    ApiListing, Listing, LoadOutcome, PageSource, PaginationConfig, PaginationState, Paginator,
};
pub use related::RelatedProducts;
pub use search::{
    ApiSearch, DebouncedSearch, SearchConfig, SearchOutcome, SearchSnapshot, SearchSource,
};
pub use types::{ApiResponse, Page, PageMeta};
