//! Processing-cost estimate from page count.
//!
//! Two-tier linear pricing: $0.025/page up to and including 40 000 pages,
//! $0.01/page for the whole document above that.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest page count billed at the standard rate (inclusive).
pub const STANDARD_TIER_MAX_PAGES: i64 = 40_000;
/// Dollars per page at or below [`STANDARD_TIER_MAX_PAGES`].
pub const STANDARD_RATE: f64 = 0.025;
/// Dollars per page above [`STANDARD_TIER_MAX_PAGES`].
pub const VOLUME_RATE: f64 = 0.01;

/// Estimated cost in dollars for `page_count` pages.
///
/// Unrounded; formatting is left to the caller. Negative counts are not
/// rejected and yield a negative amount.
pub fn estimate_cost(page_count: i64) -> f64 {
    if page_count <= STANDARD_TIER_MAX_PAGES {
        page_count as f64 * STANDARD_RATE
    } else {
        page_count as f64 * VOLUME_RATE
    }
}

/// A page count paired with its estimated cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub pages: i64,
    pub amount: f64,
}

impl CostEstimate {
    pub fn for_pages(pages: i64) -> Self {
        Self {
            pages,
            amount: estimate_cost(pages),
        }
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2} (based on {} pages)", self.amount, self.pages)
    }
}
