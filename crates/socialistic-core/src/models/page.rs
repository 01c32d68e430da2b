use serde::{Deserialize, Serialize};

/// Paginated list envelope: `{count, next, previous, results}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Page<T> {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            count: None,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.is_empty())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_page_without_count() {
        let page: Page<i64> = serde_json::from_str(
            r#"{"next": "http://x/api/posts/?cursor=abc", "previous": null, "results": [1, 2]}"#,
        )
        .unwrap();
        assert!(page.count.is_none());
        assert!(page.has_next());
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn test_last_page() {
        let page: Page<i64> = serde_json::from_str(r#"{"count": 0, "next": null, "results": []}"#).unwrap();
        assert!(!page.has_next());
        assert!(page.is_empty());
    }
}
