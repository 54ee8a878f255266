pub const DEFAULT_PAGE_COUNT: i64 = 5;

/// A bounded window over the active (non opted-out) subscribers.
///
/// Pages are 1-indexed. Anything below the first page is clamped to it, so
/// the computed offset is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    count: i64,
}

impl PageRequest {
    pub fn parse(page: Option<i64>, count: Option<i64>) -> Result<PageRequest, String> {
        let count = count.unwrap_or(DEFAULT_PAGE_COUNT);

        if count < 0 {
            return Err(format!("{} is not a valid page count", count));
        }

        Ok(Self {
            page: page.unwrap_or(0).max(1),
            count,
        })
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.count
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.count)
    }
}
