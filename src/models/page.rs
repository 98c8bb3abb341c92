use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MIN_PAGE_SIZE: i64 = 5;
pub const MAX_PAGE_SIZE: i64 = 10;

/// One-based page selector for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Page {
    #[validate(range(min = 1))]
    pub page_id: i64,
    #[validate(range(min = 5, max = 10))]
    pub page_size: i64,
}

impl Page {
    pub fn new(page_id: i64, page_size: i64) -> Self {
        Self { page_id, page_size }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page_id - 1) * self.page_size
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, MAX_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(Page::new(1, 5).offset(), 0);
        assert_eq!(Page::new(3, 5).offset(), 10);
        assert_eq!(Page::new(2, 10).limit(), 10);
    }

    #[test]
    fn test_bounds() {
        assert!(Page::new(1, MIN_PAGE_SIZE).validate().is_ok());
        assert!(Page::new(1, MAX_PAGE_SIZE).validate().is_ok());
        assert!(Page::new(0, 5).validate().is_err());
        assert!(Page::new(1, 4).validate().is_err());
        assert!(Page::new(1, 11).validate().is_err());
    }
}
