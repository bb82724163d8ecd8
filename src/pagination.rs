//! Splits an ordered list into fixed-size index pages.
//!
//! Page 1 of a list rooted at `{base}` lives at `{base}` itself; page `n`
//! lives at `{base}page/{n}/`. The same layout is used for the main index
//! (rooted at the site root) and for category indices (rooted at
//! `categories/{slug}/`).

use std::path::{Path, PathBuf};
use url::Url;

/// Navigation state for one page of a paginated list. Derived, never
/// stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based.
    pub current_page: usize,

    /// `ceil(items / page_size)`, at least 1.
    pub total_pages: usize,

    /// Present exactly when [`Pagination::has_prev`] is true.
    pub prev_url: Option<Url>,

    /// Present exactly when [`Pagination::has_next`] is true.
    pub next_url: Option<Url>,
}

impl Pagination {
    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// One page of a paginated list.
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub pagination: Pagination,
    pub url: Url,
    pub file_path: PathBuf,
}

/// The number of pages needed for `item_count` items. An empty list still
/// has one (empty) page.
pub fn total_pages(item_count: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    item_count.div_ceil(page_size).max(1)
}

/// The URL of page `page` of the list rooted at `base`. `base` must end in
/// `/`.
pub fn page_url(base: &Url, page: usize) -> Url {
    match page {
        0 | 1 => base.clone(),
        n => base
            .join(&format!("page/{}/", n))
            .unwrap_or_else(|_| base.clone()),
    }
}

/// The output file of page `page` of the list rooted at `dir`.
pub fn page_path(dir: &Path, page: usize) -> PathBuf {
    match page {
        0 | 1 => dir.join("index.html"),
        n => dir.join("page").join(n.to_string()).join("index.html"),
    }
}

/// Splits `items` into pages of `page_size`. Always returns at least one
/// page.
pub fn paginate<'a, T>(
    items: &'a [T],
    page_size: usize,
    base_url: &Url,
    base_directory: &Path,
) -> Vec<Page<'a, T>> {
    let page_size = page_size.max(1);
    let total = total_pages(items.len(), page_size);

    (1..=total)
        .map(|current| {
            let start = ((current - 1) * page_size).min(items.len());
            let stop = (start + page_size).min(items.len());
            Page {
                items: &items[start..stop],
                pagination: Pagination {
                    current_page: current,
                    total_pages: total,
                    prev_url: match current > 1 {
                        true => Some(page_url(base_url, current - 1)),
                        false => None,
                    },
                    next_url: match current < total {
                        true => Some(page_url(base_url, current + 1)),
                        false => None,
                    },
                },
                url: page_url(base_url, current),
                file_path: page_path(base_directory, current),
            }
        })
        .collect()
}
