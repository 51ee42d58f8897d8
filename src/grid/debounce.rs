//! Debounced search input.
//!
//! The raw text is stored immediately so the UI can echo keystrokes, while
//! the effective value (the one fetches see) trails behind by a fixed
//! delay. Each edit invalidates every previously issued timer ticket, so
//! only the last keystroke in a burst ever settles.

use std::time::Duration;

/// Delay between the last keystroke and the search becoming effective.
pub const DEFAULT_SEARCH_DELAY: Duration = Duration::from_millis(400);

/// Handle for a pending settle timer.
///
/// Tickets are inert values: a ticket whose generation has been superseded
/// by a newer edit is simply ignored when it comes back, so timers for a
/// page that has since been torn down are harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket {
    generation: u64,
    delay: Duration,
}

impl DebounceTicket {
    /// How long the holder should wait before calling
    /// [`DebouncedSearch::settle`].
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

#[derive(Debug, Clone)]
pub struct DebouncedSearch {
    raw: String,
    effective: String,
    delay: Duration,
    generation: u64,
}

impl DebouncedSearch {
    pub fn new(delay: Duration) -> Self {
        Self {
            raw: String::new(),
            effective: String::new(),
            delay,
            generation: 0,
        }
    }

    /// The text as typed, for immediate UI echo.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The settled value used for fetching and filtering.
    pub fn effective(&self) -> &str {
        &self.effective
    }

    /// Record a keystroke and hand back the ticket for the restarted
    /// timer. All earlier tickets become stale.
    pub fn edit(&mut self, raw: impl Into<String>) -> DebounceTicket {
        self.raw = raw.into();
        self.generation += 1;
        DebounceTicket {
            generation: self.generation,
            delay: self.delay,
        }
    }

    /// A timer fired. Commits `raw` into `effective` and returns `true`
    /// only when the ticket is the newest one and the value actually
    /// changed, so dependents are notified exactly once per settled value.
    pub fn settle(&mut self, ticket: DebounceTicket) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        if self.effective == self.raw {
            return false;
        }
        self.effective.clone_from(&self.raw);
        true
    }
}

impl Default for DebouncedSearch {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_last_edit_settles() {
        let mut search = DebouncedSearch::default();
        let a = search.edit("a");
        let ab = search.edit("ab");
        let abc = search.edit("abc");

        assert_eq!(search.raw(), "abc");
        assert_eq!(search.effective(), "");

        assert!(!search.settle(a));
        assert!(!search.settle(ab));
        assert_eq!(search.effective(), "");

        assert!(search.settle(abc));
        assert_eq!(search.effective(), "abc");
    }

    #[test]
    fn settled_value_notifies_exactly_once() {
        let mut search = DebouncedSearch::default();
        let ticket = search.edit("query");
        assert!(search.settle(ticket));
        assert!(!search.settle(ticket));
    }

    #[test]
    fn reverting_within_window_is_silent() {
        let mut search = DebouncedSearch::default();
        let first = search.edit("x");
        assert!(search.settle(first));

        search.edit("xy");
        let back = search.edit("x");
        assert!(!search.settle(back), "value did not change, no notification");
        assert_eq!(search.effective(), "x");
    }

    #[test]
    fn raw_echo_is_immediate() {
        let mut search = DebouncedSearch::default();
        search.edit("typing");
        assert_eq!(search.raw(), "typing");
        assert_eq!(search.effective(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn timer_driven_settle() {
        let mut search = DebouncedSearch::default();
        let stale = search.edit("de");
        tokio::time::sleep(Duration::from_millis(200)).await;
        let ticket = search.edit("dev");

        tokio::time::sleep(stale.delay()).await;
        assert!(!search.settle(stale));

        tokio::time::sleep(ticket.delay()).await;
        assert!(search.settle(ticket));
        assert_eq!(search.effective(), "dev");
    }
}
