use std::ops::RangeInclusive;

use tracing::debug;

use crate::error::{TallyError, TallyResult};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_BUTTONS: usize = 5;

/// One rendered page of the filtered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    /// Offset of the first item within the view.
    pub start_index: usize,
    /// Offset one past the last item within the view.
    pub end_index: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn strip(&self) -> RangeInclusive<usize> {
        page_strip(self.page, self.total_pages)
    }

    pub fn info_line(&self) -> String {
        if self.total_items == 0 {
            return "Showing 0-0 of 0 todos".to_string();
        }
        format!(
            "Showing {}-{} of {} todos",
            self.start_index + 1,
            self.end_index,
            self.total_items
        )
    }
}

pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

/// Slices `view` for 1-based `page`. Out-of-range pages yield an empty slice
/// rather than an error.
pub fn paginate<T: Clone>(view: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let page = page.max(1);
    let start = (page - 1).saturating_mul(page_size).min(view.len());
    let end = start.saturating_add(page_size).min(view.len());

    Page {
        items: view[start..end].to_vec(),
        page,
        total_pages: total_pages(view.len(), page_size),
        start_index: start,
        end_index: end,
        total_items: view.len(),
    }
}

/// Page buttons to show: at most `MAX_PAGE_BUTTONS`, centered on `current`
/// and shifted inward near either end.
pub fn page_strip(current: usize, total_pages: usize) -> RangeInclusive<usize> {
    let total_pages = total_pages.max(1);
    let current = current.clamp(1, total_pages);

    let mut start = current.saturating_sub(MAX_PAGE_BUTTONS / 2).max(1);
    let end = (start + MAX_PAGE_BUTTONS - 1).min(total_pages);
    if end + 1 - start < MAX_PAGE_BUTTONS {
        start = (end + 1).saturating_sub(MAX_PAGE_BUTTONS).max(1);
    }
    start..=end
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current_page: usize,
    items_per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            items_per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(items_per_page: usize) -> TallyResult<Self> {
        let mut state = Self::default();
        state.set_page_size(items_per_page)?;
        Ok(state)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Pulls the current page back into range after the view shrank.
    pub fn clamp(&mut self, view_len: usize) {
        let last = total_pages(view_len, self.items_per_page);
        if self.current_page > last {
            debug!(from = self.current_page, to = last, "clamping current page");
            self.current_page = last;
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.current_page > 1 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    pub fn next(&mut self, view_len: usize) -> bool {
        if self.current_page < total_pages(view_len, self.items_per_page) {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    pub fn go_to(&mut self, page: usize, view_len: usize) {
        self.current_page = page.clamp(1, total_pages(view_len, self.items_per_page));
    }

    pub fn set_page_size(&mut self, items_per_page: usize) -> TallyResult<()> {
        if items_per_page == 0 {
            return Err(TallyError::Validation(
                "Items per page must be at least 1.".to_string(),
            ));
        }
        self.items_per_page = items_per_page;
        self.current_page = 1;
        Ok(())
    }

    pub fn page_of<T: Clone>(&self, view: &[T]) -> Page<T> {
        paginate(view, self.current_page, self.items_per_page)
    }
}
