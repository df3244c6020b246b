use serde::Serialize;

/// One page of results plus the numbers a paginator needs.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = total_pages(total, per_page);
        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

pub fn total_pages(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return 1;
    }
    total.div_ceil(per_page).max(1)
}

/// Resolves a raw `page` query value: anything non-numeric yields the first
/// page, anything past the end yields the last one.
pub fn resolve_page(raw: Option<&str>, total: u64, per_page: u64) -> u64 {
    let last = total_pages(total, per_page);
    match raw.and_then(|value| value.trim().parse::<u64>().ok()) {
        Some(0) | None => 1,
        Some(page) if page > last => last,
        Some(page) => page,
    }
}

/// Row offset for a resolved page, for `offset=` query parameters.
pub fn offset_for(page: u64, per_page: u64) -> u64 {
    page.saturating_sub(1) * per_page
}

/// Paginates an already materialised list.
pub fn paginate<T>(items: Vec<T>, raw_page: Option<&str>, per_page: u64) -> Page<T> {
    let total = items.len() as u64;
    let page = resolve_page(raw_page, total, per_page);
    let start = offset_for(page, per_page) as usize;

    let items = items
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    Page::new(items, page, per_page, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_and_overflowing_pages() {
        assert_eq!(resolve_page(Some("abc"), 20, 6), 1);
        assert_eq!(resolve_page(None, 20, 6), 1);
        assert_eq!(resolve_page(Some("0"), 20, 6), 1);
        assert_eq!(resolve_page(Some("99"), 20, 6), 4);
        assert_eq!(resolve_page(Some("2"), 20, 6), 2);
        assert_eq!(resolve_page(Some("3"), 0, 6), 1);
    }

    #[test]
    fn paginates_in_memory() {
        let page = paginate((1..=14).collect::<Vec<_>>(), Some("3"), 6);
        assert_eq!(page.items, vec![13, 14]);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }
}
