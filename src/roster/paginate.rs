use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 100;

/// Raw `page`/`limit` query parameters. Kept as strings so that garbage
/// falls back to the defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub tab: Option<String>,
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v >= 1)
}

impl PageQuery {
    pub fn page(&self) -> u64 {
        positive(self.page.as_deref()).unwrap_or(1)
    }

    pub fn limit(&self) -> u64 {
        positive(self.limit.as_deref())
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT)
    }

    pub fn paginate(&self, total: u64) -> Pagination {
        paginate(self.page(), self.limit(), total)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
}

impl Pagination {
    /// The slice of `items` this window covers. Empty past the last page.
    pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let len = items.len() as u64;
        let start = self.offset.min(len) as usize;
        let end = self.offset.saturating_add(self.limit).min(len) as usize;
        &items[start..end]
    }
}

/// Offset/limit window for `page` (1-based) over `total` rows.
///
/// `page` and `limit` below 1 are treated as 1.
pub fn paginate(page: u64, limit: u64, total: u64) -> Pagination {
    let page = page.max(1);
    let limit = limit.max(1);
    let total_pages = total.div_ceil(limit);
    Pagination {
        page,
        offset: (page - 1).saturating_mul(limit),
        limit,
        total,
        total_pages,
        prev_page: (page > 1).then(|| page - 1),
        next_page: (page < total_pages).then(|| page + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
            tab: None,
        }
    }

    #[test]
    fn test_forty_five_rows_in_pages_of_twenty() {
        let p = paginate(3, 20, 45);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 40);
        assert_eq!(p.prev_page, Some(2));
        assert_eq!(p.next_page, None);

        let first = paginate(1, 20, 45);
        assert_eq!(first.offset, 0);
        assert_eq!(first.prev_page, None);
        assert_eq!(first.next_page, Some(2));
    }

    #[test]
    fn test_bounds_hold_for_every_page() {
        for total in [0u64, 1, 19, 20, 21, 45, 100] {
            for limit in [1u64, 7, 20] {
                let total_pages = total.div_ceil(limit);
                for page in 1..=total_pages + 2 {
                    let p = paginate(page, limit, total);
                    assert_eq!(p.offset, (page - 1) * limit);
                    assert_eq!(p.next_page.is_none(), page >= total_pages);
                    assert_eq!(p.prev_page.is_some(), page > 1);
                }
            }
        }
    }

    #[test]
    fn test_zero_total_has_no_pages() {
        let p = paginate(1, 20, 0);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.next_page, None);
        assert_eq!(p.prev_page, None);
    }

    #[test]
    fn test_window_past_the_end_is_empty() {
        let items: Vec<u32> = (0..45).collect();
        assert_eq!(paginate(3, 20, 45).window(&items), &items[40..45]);
        assert!(paginate(4, 20, 45).window(&items).is_empty());
        assert!(paginate(9, 20, 45).next_page.is_none());
    }

    #[test]
    fn test_query_defaults() {
        let q = query(Some("abc"), Some("-3"));
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), DEFAULT_LIMIT);

        let q = query(Some("0"), Some("0"));
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), DEFAULT_LIMIT);

        let q = query(None, None);
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), DEFAULT_LIMIT);

        let q = query(Some(" 2 "), Some("500"));
        assert_eq!(q.page(), 2);
        assert_eq!(q.limit(), MAX_LIMIT);
    }
}
