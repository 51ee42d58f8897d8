//! Page-level fetch orchestration.
//!
//! A [`Browser`] owns everything a data page needs to talk to its
//! [`PageSource`]: the debounced search, the pagination cursor, the sort
//! state, the canonical row set, and a monotonically increasing request
//! sequence. Fetches may complete out of order; `commit` only accepts the
//! newest sequence number, so a slow response for a superseded
//! (search, page) combination can never overwrite fresher rows.

use async_trait::async_trait;
use color_eyre::Result;

use super::debounce::{DebounceTicket, DebouncedSearch};
use super::pagination::{PageMode, Pagination};
use super::sort::SortState;

/// One fetchable page: the settled search text plus the pagination window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub search: String,
    /// 0-based; the API layer converts to the wire's 1-based `page`.
    pub page_index: usize,
    pub page_size: usize,
}

/// What a source hands back for one query.
#[derive(Debug, Clone)]
pub struct PageData<T> {
    pub rows: Vec<T>,
    /// Total rows on the server, when the envelope reports one.
    pub total_count: Option<usize>,
    pub has_next: Option<bool>,
    pub has_previous: Option<bool>,
}

impl<T> Default for PageData<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            total_count: None,
            has_next: None,
            has_previous: None,
        }
    }
}

/// Injected asynchronous data source. Implementations wrap the API client
/// and map raw payloads into row view-models; the browser never sees
/// headers, tokens, or retries.
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    type Row: Send + 'static;

    async fn fetch_page(&self, query: &PageQuery) -> Result<PageData<Self::Row>>;
}

/// Outcome of committing a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Rows, total count and page count were replaced atomically.
    Committed,
    /// A newer fetch has been issued since; the result was discarded.
    Stale,
    /// The fetch failed; the table was reset to a well-formed empty state
    /// and the error message stored for display.
    Failed,
}

pub struct Browser<T> {
    search: DebouncedSearch,
    pagination: Pagination,
    sort: SortState,
    rows: Vec<T>,
    loading: bool,
    error: Option<String>,
    last_issued: u64,
}

impl<T> Browser<T> {
    pub fn server(page_size: usize) -> Self {
        Self::with_pagination(Pagination::server(page_size))
    }

    pub fn local(page_size: usize) -> Self {
        Self::with_pagination(Pagination::local(page_size))
    }

    fn with_pagination(pagination: Pagination) -> Self {
        Self {
            search: DebouncedSearch::default(),
            pagination,
            sort: SortState::new(),
            rows: Vec::new(),
            loading: false,
            error: None,
            last_issued: 0,
        }
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub const fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub const fn search(&self) -> &DebouncedSearch {
        &self.search
    }

    pub const fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Local-mode pages re-derive counts when their filter changes.
    pub const fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }

    pub const fn sort(&self) -> &SortState {
        &self.sort
    }

    pub const fn sort_mut(&mut self) -> &mut SortState {
        &mut self.sort
    }

    // === Search ===

    /// Store a keystroke and return the timer ticket the caller must
    /// schedule (see [`super::SettleSearchCmd`]).
    pub fn edit_search(&mut self, raw: impl Into<String>) -> DebounceTicket {
        self.search.edit(raw)
    }

    /// A settle timer fired. Returns `true` when the effective search
    /// changed; the page index is reset so the new query starts from the
    /// first page.
    pub fn settle_search(&mut self, ticket: DebounceTicket) -> bool {
        if !self.search.settle(ticket) {
            return false;
        }
        self.pagination.reset();
        true
    }

    // === Navigation ===

    /// Returns `true` when the page moved (server pages refetch on that).
    pub fn next_page(&mut self) -> bool {
        self.pagination.next()
    }

    pub fn prev_page(&mut self) -> bool {
        self.pagination.prev()
    }

    /// Returns `true` when anything changed; always lands on page 0.
    pub fn set_page_size(&mut self, size: usize) -> bool {
        self.pagination.set_page_size(size)
    }

    // === Fetch lifecycle ===

    /// Start a new fetch: bumps the request sequence (invalidating any
    /// in-flight fetch) and snapshots the query to run.
    pub fn begin_fetch(&mut self) -> (u64, PageQuery) {
        self.last_issued += 1;
        self.loading = true;
        let query = PageQuery {
            search: self.search.effective().to_string(),
            page_index: self.pagination.page_index(),
            page_size: self.pagination.page_size(),
        };
        (self.last_issued, query)
    }

    /// Apply a completed fetch. Results for anything but the newest
    /// sequence number are dropped without touching state.
    pub fn commit(&mut self, seq: u64, result: Result<PageData<T>>) -> Commit {
        if seq != self.last_issued {
            return Commit::Stale;
        }
        self.loading = false;
        match result {
            Ok(data) => {
                self.rows = data.rows;
                match self.pagination.mode() {
                    PageMode::Server => {
                        self.pagination.set_total(data.total_count.unwrap_or(0));
                        self.pagination.set_has_next(data.has_next);
                    }
                    PageMode::Local => {
                        self.pagination.sync_row_count(self.rows.len());
                    }
                }
                self.error = None;
                Commit::Committed
            }
            Err(err) => {
                self.rows.clear();
                self.pagination.set_total(0);
                self.pagination.set_has_next(None);
                self.pagination.reset();
                self.error = Some(format!("{err:#}"));
                Commit::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::eyre;

    use super::*;

    fn page(rows: &[&str], total: usize) -> PageData<String> {
        PageData {
            rows: rows.iter().map(|s| (*s).to_string()).collect(),
            total_count: Some(total),
            has_next: Some(rows.len() < total),
            has_previous: Some(false),
        }
    }

    #[test]
    fn stale_result_is_discarded() {
        let mut browser = Browser::server(9);
        let (seq_a, _) = browser.begin_fetch();
        let (seq_b, _) = browser.begin_fetch();

        // B lands first, then the slow A arrives.
        assert_eq!(browser.commit(seq_b, Ok(page(&["b"], 1))), Commit::Committed);
        assert_eq!(browser.commit(seq_a, Ok(page(&["a"], 99))), Commit::Stale);

        assert_eq!(browser.rows(), ["b"]);
        assert_eq!(browser.pagination().total_count(), 1);
        assert!(!browser.loading());
    }

    #[test]
    fn commit_replaces_rows_and_counts_atomically() {
        let mut browser = Browser::server(9);
        let (seq, query) = browser.begin_fetch();
        assert_eq!(query.page_index, 0);
        assert!(browser.loading());

        assert_eq!(
            browser.commit(seq, Ok(page(&["x", "y"], 20))),
            Commit::Committed
        );
        assert_eq!(browser.rows().len(), 2);
        assert_eq!(browser.pagination().total_count(), 20);
        assert_eq!(browser.pagination().page_count(), 3);
        assert!(browser.error().is_none());
    }

    #[test]
    fn failure_resets_to_empty_well_formed_state() {
        let mut browser = Browser::server(9);
        let (seq, _) = browser.begin_fetch();
        browser.commit(seq, Ok(page(&["x"], 30)));

        let (seq, _) = browser.begin_fetch();
        assert_eq!(browser.commit(seq, Err(eyre!("boom"))), Commit::Failed);

        assert!(browser.rows().is_empty());
        assert_eq!(browser.pagination().total_count(), 0);
        assert_eq!(browser.pagination().page_count(), 1);
        assert_eq!(browser.pagination().page_index(), 0);
        assert!(browser.error().is_some());
        assert!(!browser.loading());
    }

    #[test]
    fn settled_search_resets_page_and_requests_refetch() {
        let mut browser = Browser::<String>::server(9);
        let (seq, _) = browser.begin_fetch();
        browser.commit(seq, Ok(page(&[], 90)));
        browser.next_page();
        assert_eq!(browser.pagination().page_index(), 1);

        let ticket = browser.edit_search("dev");
        assert!(browser.settle_search(ticket));
        assert_eq!(browser.pagination().page_index(), 0);

        let (_, query) = browser.begin_fetch();
        assert_eq!(query.search, "dev");
        assert_eq!(query.page_index, 0);
    }

    #[test]
    fn stale_settle_does_not_refetch() {
        let mut browser = Browser::<String>::server(9);
        let old = browser.edit_search("a");
        browser.edit_search("ab");
        assert!(!browser.settle_search(old));
    }

    #[test]
    fn page_size_change_snapshots_first_page() {
        let mut browser = Browser::<String>::server(9);
        let (seq, _) = browser.begin_fetch();
        browser.commit(seq, Ok(page(&[], 90)));
        browser.next_page();

        assert!(browser.set_page_size(25));
        let (_, query) = browser.begin_fetch();
        assert_eq!(query.page_index, 0);
        assert_eq!(query.page_size, 25);
    }

    #[test]
    fn local_mode_derives_counts_from_rows() {
        let mut browser = Browser::local(2);
        let (seq, _) = browser.begin_fetch();
        browser.commit(
            seq,
            Ok(PageData {
                rows: vec!["x".to_string(), "y".to_string(), "z".to_string()],
                ..PageData::default()
            }),
        );
        assert_eq!(browser.pagination().page_count(), 2);
        assert_eq!(browser.pagination().slice(browser.rows()), ["x", "y"]);
    }
}
