use serde::{Deserialize, Serialize};

/// Envelope wrapping every product API response.
///
/// Failed calls carry `success: false` and an `error` message instead of
/// `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
    /// Server-side timings. Shape varies by endpoint.
    #[serde(default)]
    pub performance: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Paging metadata. The API reports `limit` and `has_more` as `null` when
/// the request had no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Builds a page from response data, falling back to the request's own
    /// offset and limit when the API omits paging metadata.
    pub(crate) fn from_parts(items: Vec<T>, meta: Option<PageMeta>, offset: u32, limit: u32) -> Self {
        match meta {
            Some(meta) => Self {
                total: meta.total,
                offset: meta.offset,
                limit: meta.limit.unwrap_or(limit),
                has_more: meta.has_more.unwrap_or(false),
                items,
            },
            None => Self {
                total: items.len() as u64,
                offset,
                limit,
                has_more: false,
                items,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_envelope() {
        let raw = serde_json::json!({
            "success": true,
            "data": [1, 2, 3],
            "meta": {"categoria": "WHISKY", "total": 40, "limit": 12, "offset": 0, "has_more": true},
            "performance": {"total_time": 0.01, "cache_hit": false}
        });
        let resp: ApiResponse<Vec<u32>> = serde_json::from_value(raw).unwrap();
        assert!(resp.success);
        assert_eq!(resp.data.unwrap(), vec![1, 2, 3]);
        let meta = resp.meta.unwrap();
        assert_eq!(meta.total, 40);
        assert_eq!(meta.has_more, Some(true));
    }

    #[test]
    fn parses_failure_envelope_without_data() {
        let raw = serde_json::json!({
            "success": false,
            "error": "Producto no encontrado",
            "performance": {"total_time": 0.002}
        });
        let resp: ApiResponse<Vec<u32>> = serde_json::from_value(raw).unwrap();
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error.as_deref(), Some("Producto no encontrado"));
    }

    #[test]
    fn null_limit_and_has_more_are_accepted() {
        let raw = serde_json::json!({"total": 5, "limit": null, "offset": 0, "has_more": null});
        let meta: PageMeta = serde_json::from_value(raw).unwrap();
        let page = Page::from_parts(vec!['a'], Some(meta), 0, 12);
        assert_eq!(page.limit, 12);
        assert!(!page.has_more);
    }

    #[test]
    fn missing_meta_uses_request_window() {
        let page = Page::from_parts(vec![1, 2], None, 24, 12);
        assert_eq!(page.total, 2);
        assert_eq!(page.offset, 24);
        assert!(!page.has_more);
    }
}
