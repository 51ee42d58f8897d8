//! Paginated, searchable, sortable grid state.
//!
//! Every data page in the app is driven by the same small state machine:
//! a debounced search input, a pagination cursor (server-driven or local
//! slicing), a single-column sort toggle, and a request tracker that
//! discards results from superseded fetches. The pieces are plain state
//! structs owned by the page; the table widget in [`crate::ui::table`]
//! renders them without mutating anything.

mod browser;
mod commands;
mod debounce;
mod pagination;
mod sort;

pub use browser::{Browser, Commit, PageData, PageQuery, PageSource};
pub use commands::{FetchPageCmd, SettleSearchCmd};
pub use debounce::{DEFAULT_SEARCH_DELAY, DebounceTicket, DebouncedSearch};
pub use pagination::{DEFAULT_PAGE_SIZE, PAGE_SIZE_OPTIONS, PageMode, Pagination};
pub use sort::{SortDirection, SortState, sort_indices};
