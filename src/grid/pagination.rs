//! Pagination cursor for both server-driven and locally sliced tables.

/// Page sizes the UI cycles through.
pub const PAGE_SIZE_OPTIONS: &[usize] = &[5, 9, 15, 25, 50];

/// Default page size, matching the backend's preferred window.
pub const DEFAULT_PAGE_SIZE: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    /// Page boundaries come from the remote API; every navigation needs a
    /// new fetch.
    Server,
    /// The full row set is held in memory and sliced locally.
    Local,
}

#[derive(Debug, Clone)]
pub struct Pagination {
    mode: PageMode,
    page_index: usize,
    page_size: usize,
    total_count: usize,
    page_count: usize,
    /// Server hint derived from the envelope's `next` cursor. `None` until
    /// the first response arrives.
    has_next: Option<bool>,
}

impl Pagination {
    pub fn server(page_size: usize) -> Self {
        Self::new(PageMode::Server, page_size)
    }

    pub fn local(page_size: usize) -> Self {
        Self::new(PageMode::Local, page_size)
    }

    fn new(mode: PageMode, page_size: usize) -> Self {
        Self {
            mode,
            page_index: 0,
            page_size: page_size.max(1),
            total_count: 0,
            page_count: 1,
            has_next: None,
        }
    }

    pub const fn mode(&self) -> PageMode {
        self.mode
    }

    /// 0-based index of the current page.
    pub const fn page_index(&self) -> usize {
        self.page_index
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub const fn total_count(&self) -> usize {
        self.total_count
    }

    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Record the total row count reported by the server and re-derive the
    /// page count, clamping the index if it now points past the end.
    pub fn set_total(&mut self, total: usize) {
        self.total_count = total;
        self.page_count = Self::pages_for(total, self.page_size);
        self.clamp();
    }

    /// Record the server's has-next hint from the envelope cursor.
    pub fn set_has_next(&mut self, has_next: Option<bool>) {
        self.has_next = has_next;
    }

    /// Local mode: derive the page count from the (filtered) row count.
    pub fn sync_row_count(&mut self, rows: usize) {
        self.total_count = rows;
        self.page_count = Self::pages_for(rows, self.page_size);
        self.clamp();
    }

    /// Jump back to the first page. Used whenever the effective search or
    /// the filtered row set changes.
    pub fn reset(&mut self) {
        self.page_index = 0;
    }

    /// Advance one page. No-op on the last page, or when the server says
    /// there is nothing further. Returns whether the index moved.
    pub fn next(&mut self) -> bool {
        if self.has_next == Some(false) {
            return false;
        }
        if self.page_index + 1 >= self.page_count {
            return false;
        }
        self.page_index += 1;
        true
    }

    /// Go back one page. No-op on the first page.
    pub fn prev(&mut self) -> bool {
        if self.page_index == 0 {
            return false;
        }
        self.page_index -= 1;
        true
    }

    /// Change the page size. Always resets to the first page. Returns
    /// whether anything changed (callers refetch on `true`).
    pub fn set_page_size(&mut self, size: usize) -> bool {
        let size = size.max(1);
        if size == self.page_size && self.page_index == 0 {
            return false;
        }
        self.page_size = size;
        self.page_index = 0;
        self.page_count = Self::pages_for(self.total_count, size);
        true
    }

    /// The window of `rows` belonging to the current page. Server mode
    /// already holds exactly one page, so the rows pass through untouched.
    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        match self.mode {
            PageMode::Server => rows,
            PageMode::Local => {
                let start = self.page_index.saturating_mul(self.page_size).min(rows.len());
                let end = start.saturating_add(self.page_size).min(rows.len());
                &rows[start..end]
            }
        }
    }

    fn clamp(&mut self) {
        if self.page_index >= self.page_count {
            self.page_index = self.page_count - 1;
        }
    }

    fn pages_for(total: usize, size: usize) -> usize {
        total.div_ceil(size).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_is_clamped_ceiling() {
        for (total, size, expected) in [
            (0, 9, 1),
            (1, 9, 1),
            (9, 9, 1),
            (10, 9, 2),
            (3, 2, 2),
            (100, 25, 4),
        ] {
            let mut p = Pagination::local(size);
            p.sync_row_count(total);
            assert_eq!(p.page_count(), expected, "total={total} size={size}");
        }
    }

    #[test]
    fn prev_at_first_page_is_noop() {
        let mut p = Pagination::server(9);
        p.set_total(50);
        assert!(!p.prev());
        assert_eq!(p.page_index(), 0);
    }

    #[test]
    fn next_at_last_page_is_noop() {
        let mut p = Pagination::local(2);
        p.sync_row_count(3);
        assert!(p.next());
        assert_eq!(p.page_index(), 1);
        assert!(!p.next());
        assert_eq!(p.page_index(), 1);
    }

    #[test]
    fn server_has_next_hint_blocks_navigation() {
        let mut p = Pagination::server(9);
        p.set_total(18);
        p.set_has_next(Some(false));
        assert!(!p.next());
    }

    #[test]
    fn page_size_change_resets_to_first_page() {
        let mut p = Pagination::server(9);
        p.set_total(100);
        p.next();
        p.next();
        assert_eq!(p.page_index(), 2);
        assert!(p.set_page_size(25));
        assert_eq!(p.page_index(), 0);
        assert_eq!(p.page_count(), 4);
    }

    #[test]
    fn shrinking_row_set_clamps_index() {
        let mut p = Pagination::local(5);
        p.sync_row_count(20);
        p.next();
        p.next();
        assert_eq!(p.page_index(), 2);
        p.sync_row_count(6);
        assert_eq!(p.page_index(), 1);
    }

    #[test]
    fn local_slice_scenario() {
        // Three rows at page size 2: page 1 shows two, page 2 shows one,
        // and next() past the end is a no-op.
        let rows = ["x", "y", "z"];
        let mut p = Pagination::local(2);
        p.sync_row_count(rows.len());
        assert_eq!(p.slice(&rows), &["x", "y"]);
        assert!(p.next());
        assert_eq!(p.slice(&rows), &["z"]);
        assert!(!p.next());
        assert_eq!(p.slice(&rows), &["z"]);
    }
}
