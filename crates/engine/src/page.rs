//! Offset pagination for listings.

use serde::Serialize;

use crate::{EngineError, ResultEngine};

pub const DEFAULT_TAKE: u64 = 10;
pub const MAX_TAKE: u64 = 50;

/// 1-based page number and page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub take: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            take: DEFAULT_TAKE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, take: u64) -> ResultEngine<Self> {
        let request = Self { page, take };
        request.validate()?;
        Ok(request)
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        if self.page == 0 {
            return Err(EngineError::Validation("page must be >= 1".to_string()));
        }
        if self.take == 0 || self.take > MAX_TAKE {
            return Err(EngineError::Validation(format!(
                "take must be between 1 and {MAX_TAKE}"
            )));
        }
        Ok(())
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.take
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub take: u64,
    pub item_count: u64,
    pub page_count: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, item_count: u64) -> Self {
        let page_count = item_count.div_ceil(request.take);
        Self {
            items,
            page: request.page,
            take: request.take,
            item_count,
            page_count,
            has_previous_page: request.page > 1,
            has_next_page: request.page < page_count,
        }
    }
}
