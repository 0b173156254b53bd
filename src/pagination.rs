//! Page parameters and the paginated list envelope

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;

/// `?page=&limit=` query parameters. Numbers may arrive as strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    #[serde(default, deserialize_with = "deserialize_optional_usize")]
    pub page: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_optional_usize")]
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UsizeInput {
    Number(usize),
    Text(String),
}

fn deserialize_optional_usize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<UsizeInput>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(UsizeInput::Number(number)) => Ok(Some(number)),
        Some(UsizeInput::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(UsizeInput::Text(text)) => text
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(DeError::custom),
    }
}

impl PageParams {
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// 1-based page number
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Paginated list envelope shared by every list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
    pub total_results: usize,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, params: PageParams, total_results: usize) -> Self {
        let limit = params.limit();
        Self {
            results,
            page: params.page(),
            limit,
            total_pages: total_pages(total_results, limit),
            total_results,
        }
    }

    /// Slice one page out of an already ordered collection.
    pub fn from_slice(all: &[T], params: PageParams) -> Self
    where
        T: Clone,
    {
        let results = all
            .iter()
            .skip(params.offset())
            .take(params.limit())
            .cloned()
            .collect();
        Self::new(results, params, all.len())
    }

    pub fn controls(&self) -> PageControls {
        PageControls::new(self.page, self.total_pages)
    }
}

/// List response: the envelope plus the state of its previous/next controls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResponse<T> {
    #[serde(flatten)]
    pub page: Page<T>,
    pub controls: PageControls,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        let controls = page.controls();
        Self { page, controls }
    }
}

/// Page parameters merged with a list filter, as sent to the upstream service
#[derive(Debug, Serialize)]
pub struct PagedQuery<'a, F> {
    page: usize,
    limit: usize,
    #[serde(flatten)]
    filter: &'a F,
}

impl<'a, F> PagedQuery<'a, F> {
    pub fn new(params: PageParams, filter: &'a F) -> Self {
        Self {
            page: params.page(),
            limit: params.limit(),
            filter,
        }
    }
}

/// An empty collection still has one (empty) page.
pub fn total_pages(total_results: usize, limit: usize) -> usize {
    let limit = limit.max(1);
    total_results.div_ceil(limit).max(1)
}

/// Enabled state of the previous/next buttons under a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageControls {
    pub page: usize,
    pub total_pages: usize,
    pub previous_disabled: bool,
    pub next_disabled: bool,
}

impl PageControls {
    pub fn new(page: usize, total_pages: usize) -> Self {
        Self {
            page,
            total_pages,
            previous_disabled: page <= 1,
            next_disabled: page >= total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_defaults_and_clamping() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(params.offset(), 0);

        let params = PageParams::new(0, 5000);
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), MAX_PAGE_LIMIT);

        assert_eq!(PageParams::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_params_accept_strings() {
        let params: PageParams =
            serde_json::from_value(json!({"page": "2", "limit": ""})).unwrap();
        assert_eq!(params.page(), 2);
        assert_eq!(params.limit(), DEFAULT_PAGE_LIMIT);
        assert!(serde_json::from_value::<PageParams>(json!({"page": "two"})).is_err());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(50, 20), 3);
    }

    #[test]
    fn test_controls_at_edges() {
        let first = PageControls::new(1, 5);
        assert!(first.previous_disabled);
        assert!(!first.next_disabled);

        let last = PageControls::new(5, 5);
        assert!(!last.previous_disabled);
        assert!(last.next_disabled);

        let only = PageControls::new(1, 1);
        assert!(only.previous_disabled && only.next_disabled);
    }

    #[test]
    fn test_from_slice() {
        let items: Vec<u32> = (1..=45).collect();
        let page = Page::from_slice(&items, PageParams::new(3, 20));
        assert_eq!(page.results, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_results, 45);
        assert!(page.controls().next_disabled);
    }

    #[test]
    fn test_response_carries_controls() {
        let items: Vec<u32> = (1..=45).collect();
        let response = PageResponse::from(Page::from_slice(&items, PageParams::new(2, 20)));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["page"], json!(2));
        assert_eq!(value["totalResults"], json!(45));
        assert_eq!(value["results"].as_array().unwrap().len(), 20);
        assert_eq!(value["controls"]["previousDisabled"], json!(false));
        assert_eq!(value["controls"]["nextDisabled"], json!(false));
    }
}
