use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error for key \"{key}\": {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage quota exceeded writing \"{key}\": {needed} bytes needed, {limit} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("failed to encode value for \"{key}\": {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored value for \"{key}\" is malformed: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("the cart is empty")]
    EmptyCart,

    #[error("checkout form has {} invalid field(s)", .0.len())]
    InvalidForm(BTreeMap<&'static str, String>),
}
