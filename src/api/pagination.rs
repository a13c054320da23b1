//! Pagination helpers shared by list endpoints.

use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::IntoParams;

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Items per page, max 100
    pub per_page: Option<u64>,
}

impl PageParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page_or(DEFAULT_PER_PAGE)
    }

    pub fn per_page_or(&self, default: u64) -> u64 {
        self.per_page.unwrap_or(default).clamp(1, MAX_PER_PAGE)
    }
}

/// `meta` object returned next to paginated `data`
pub fn meta(total: u64, page: u64, per_page: u64) -> Value {
    let per_page = per_page.max(1);
    json!({
        "total": total,
        "current_page": page,
        "per_page": per_page,
        "last_page": total.div_ceil(per_page).max(1),
    })
}
