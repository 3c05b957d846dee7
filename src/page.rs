// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Page requests and the page bookkeeping returned with every paged view.
//!
//! Pages are numbered from 1. A page carries everything needed to ask for the
//! next one, so callers never hold a server-side cursor.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page_size: usize,
    pub page_num: usize,
}

impl PageInfo {
    pub fn new(page_size: usize, page_num: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page_num: page_num.max(1),
        }
    }

    pub fn first(page_size: usize) -> Self {
        Self::new(page_size, 1)
    }

    pub fn next(self) -> Self {
        Self::new(self.page_size, self.page_num + 1)
    }

    /// Index of the first hit on this page.
    pub fn offset(self) -> usize {
        (self.page_num - 1) * self.page_size
    }

    /// The hits of `all` that fall on this page.
    pub fn slice<T: Clone>(self, all: &[T]) -> Vec<T> {
        all.iter().skip(self.offset()).take(self.page_size).cloned().collect()
    }
}

/// A requested page together with how many hits the query produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPageInfo {
    pub page_size: usize,
    pub page_num: usize,
    pub total_hits: usize,
}

impl ProcessedPageInfo {
    pub fn new(page: PageInfo, total_hits: usize) -> Self {
        Self {
            page_size: page.page_size,
            page_num: page.page_num,
            total_hits,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_hits.div_ceil(self.page_size.max(1))
    }

    pub fn is_last_page(&self) -> bool {
        self.page_num >= self.total_pages()
    }

    pub fn page_info(&self) -> PageInfo {
        PageInfo::new(self.page_size, self.page_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_and_totals() {
        let hits: Vec<u32> = (0..7).collect();
        let page = PageInfo::new(3, 3);
        assert_eq!(page.slice(&hits), vec![6]);
        assert_eq!(PageInfo::first(3).slice(&hits), vec![0, 1, 2]);

        let info = ProcessedPageInfo::new(page, hits.len());
        assert_eq!(info.total_pages(), 3);
        assert!(info.is_last_page());
        assert!(!ProcessedPageInfo::new(PageInfo::first(3), 7).is_last_page());
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let page = PageInfo::new(0, 0);
        assert_eq!(page, PageInfo::new(1, 1));
        assert_eq!(ProcessedPageInfo::new(page, 0).total_pages(), 0);
        assert!(ProcessedPageInfo::new(page, 0).is_last_page());
    }
}
