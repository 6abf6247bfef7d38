use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Default, Clone, Copy, Deserialize, IntoParams)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// `(LIMIT, OFFSET)`; the offset is widened so any `page` fits.
    pub fn limit_offset(&self) -> (u32, u64) {
        let per_page = self.per_page();
        (per_page, u64::from(self.page() - 1) * u64::from(per_page))
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, query: &PageQuery, total: i64) -> Self {
        Self {
            data,
            page: query.page(),
            per_page: query.per_page(),
            total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let q = PageQuery::default();
        assert_eq!((q.page(), q.per_page()), (1, 20));
        assert_eq!(q.limit_offset(), (20, 0));

        let q = PageQuery {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!((q.page(), q.per_page()), (1, 100));

        let q = PageQuery {
            page: Some(3),
            per_page: Some(0),
        };
        assert_eq!(q.limit_offset(), (1, 2));
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let q = PageQuery {
            page: Some(u32::MAX),
            per_page: Some(100),
        };
        assert_eq!(q.limit_offset(), (100, (u32::MAX as u64 - 1) * 100));
    }

    #[test]
    fn map_keeps_paging_fields() {
        let q = PageQuery {
            page: Some(2),
            per_page: Some(10),
        };
        let page = Page::new(vec![1, 2], &q, 12).map(|n| n * 10);
        assert_eq!(page.data, vec![10, 20]);
        assert_eq!((page.page, page.per_page, page.total), (2, 10, 12));
    }
}
