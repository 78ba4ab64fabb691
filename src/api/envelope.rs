use serde::Serialize;
use serde_json::Value;

/// Response body of every resource operation.
///
/// Listings carry pagination metadata with absent links as `null`;
/// single-record operations carry `data` alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Page(PageEnvelope),
    Item { data: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageEnvelope {
    pub data: Vec<Value>,
    pub per_page: u64,
    pub pages_count: u64,
    pub current: u64,
    pub next: Option<String>,
    pub prev: Option<String>,
}

impl Envelope {
    pub fn item(data: Value) -> Self {
        Envelope::Item { data }
    }

    pub fn page(data: Vec<Value>, pagination: &Pagination, prefix: &str, endpoint: &str) -> Self {
        Envelope::Page(PageEnvelope {
            data,
            per_page: pagination.per_page,
            pages_count: pagination.pages_count,
            current: pagination.current,
            next: pagination.next().map(|n| page_link(prefix, endpoint, n)),
            prev: pagination.prev().map(|n| page_link(prefix, endpoint, n)),
        })
    }
}

/// Position of one page within a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current: u64,
    pub per_page: u64,
    pub pages_count: u64,
}

impl Pagination {
    /// `current` is 1-indexed and may lie past the last page.
    pub fn new(current: u64, per_page: u64, total: u64) -> Self {
        let per_page = per_page.max(1);
        Self {
            current,
            per_page,
            pages_count: total.div_ceil(per_page),
        }
    }

    pub fn next(&self) -> Option<u64> {
        (self.current < self.pages_count).then(|| self.current + 1)
    }

    pub fn prev(&self) -> Option<u64> {
        (self.current > 1).then(|| self.current - 1)
    }
}

pub fn page_link(prefix: &str, endpoint: &str, page: u64) -> String {
    format!("{}{}?page={}", prefix, endpoint, page)
}
