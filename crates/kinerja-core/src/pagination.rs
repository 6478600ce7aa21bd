//! # Pagination
//!
//! Derives `page`/`limit`/`skip` from raw query parameters and builds the
//! pagination metadata returned alongside every list response.
//!
//! Values are read like a leading integer: after trimming, an optional sign
//! and the digits that follow it are used and the rest is ignored, so `"2.5"`
//! reads as 2 and `"20abc"` as 20. Malformed input never fails: a missing,
//! non-numeric, non-positive or overflowing value falls back to the default
//! (`page = 1`, `limit = 10`). This module puts no
//! upper bound on `limit`; callers opt into one with
//! [`PageRequest::with_max_limit`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Page used when the query omits or garbles `page`.
pub const DEFAULT_PAGE: u64 = 1;
/// Limit used when the query omits or garbles `limit`.
pub const DEFAULT_LIMIT: u64 = 10;

/// A normalized page request. Both fields are always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// One-based page number.
    pub page: u64,
    /// Page size.
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Parse the leading integer of `raw`, keeping it only when positive.
fn parse_positive(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    let sign_len = usize::from(raw.starts_with(['+', '-']));
    let digits_len = raw[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    raw[..sign_len + digits_len]
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .map(|n| n as u64)
}

impl PageRequest {
    /// Build from the raw `page` and `limit` query values.
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: parse_positive(page).unwrap_or(DEFAULT_PAGE),
            limit: parse_positive(limit).unwrap_or(DEFAULT_LIMIT),
        }
    }

    /// Build from a raw query-string map.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        Self::from_raw(
            query.get("page").map(String::as_str),
            query.get("limit").map(String::as_str),
        )
    }

    /// Number of items preceding this page: `(page - 1) * limit`.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Clamp `limit` to `max` (itself clamped to at least 1).
    pub fn with_max_limit(self, max: u64) -> Self {
        Self {
            limit: self.limit.min(max.max(1)),
            ..self
        }
    }

    /// Cut this page out of an already filtered and ordered list.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let skip = usize::try_from(self.skip()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.limit).unwrap_or(usize::MAX);
        let data = items.into_iter().skip(skip).take(take).collect();
        Page {
            data,
            meta: PaginationMeta::new(total, self.page, self.limit),
        }
    }
}

/// Pagination metadata. Every field is derived from `(total, page, limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Total number of matching items.
    pub total: u64,
    /// Current page.
    pub page: u64,
    /// Page size.
    pub limit: u64,
    /// `ceil(total / limit)`; zero when `total` is zero.
    pub total_pages: u64,
    /// `page < total_pages`.
    pub has_next: bool,
    /// `page > 1`.
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Derive metadata. `limit` of zero is treated as one.
    pub fn new(total: u64, page: u64, limit: u64) -> Self {
        let total_pages = total.div_ceil(limit.max(1));
        Self {
            total,
            page,
            limit,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// One page of results with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Metadata describing the page.
    pub meta: PaginationMeta,
}
