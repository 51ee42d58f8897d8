//! Commands gluing the browser to the async world.

use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::command::Command;

use super::browser::{PageData, PageQuery, PageSource};
use super::debounce::DebounceTicket;

/// Run one page fetch against a [`PageSource`] and deliver the outcome to
/// the owning page. Failures are part of the payload, never an error of
/// the command itself, so the page always gets to call
/// [`super::Browser::commit`].
pub struct FetchPageCmd<S: PageSource, M: Send + 'static> {
    source: Arc<S>,
    query: PageQuery,
    seq: u64,
    tx: UnboundedSender<M>,
    wrap: fn(u64, Result<PageData<S::Row>>) -> M,
}

impl<S: PageSource, M: Send + 'static> FetchPageCmd<S, M> {
    pub fn new(
        source: Arc<S>,
        seq: u64,
        query: PageQuery,
        tx: UnboundedSender<M>,
        wrap: fn(u64, Result<PageData<S::Row>>) -> M,
    ) -> Self {
        Self {
            source,
            query,
            seq,
            tx,
            wrap,
        }
    }
}

#[async_trait]
impl<S: PageSource, M: Send + 'static> Command for FetchPageCmd<S, M> {
    fn name(&self) -> String {
        format!("fetch page {}", self.query.page_index + 1)
    }

    async fn execute(self: Box<Self>) -> Result<()> {
        let result = self.source.fetch_page(&self.query).await;
        // The page may be gone; a dead channel is not an error.
        let _ = self.tx.send((self.wrap)(self.seq, result));
        Ok(())
    }
}

/// Sleep out a debounce window, then hand the ticket back to the page.
/// The browser ignores tickets that a newer keystroke has superseded.
pub struct SettleSearchCmd<M: Send + 'static> {
    ticket: DebounceTicket,
    tx: UnboundedSender<M>,
    wrap: fn(DebounceTicket) -> M,
}

impl<M: Send + 'static> SettleSearchCmd<M> {
    pub fn new(ticket: DebounceTicket, tx: UnboundedSender<M>, wrap: fn(DebounceTicket) -> M) -> Self {
        Self { ticket, tx, wrap }
    }
}

#[async_trait]
impl<M: Send + 'static> Command for SettleSearchCmd<M> {
    fn name(&self) -> String {
        "settle search".to_string()
    }

    async fn execute(self: Box<Self>) -> Result<()> {
        tokio::time::sleep(self.ticket.delay()).await;
        let _ = self.tx.send((self.wrap)(self.ticket));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::sync::{mpsc, oneshot};

    use crate::grid::{Browser, Commit};

    use super::*;

    enum Msg {
        Loaded(u64, Result<PageData<String>>),
        Settled(DebounceTicket),
    }

    /// Source whose responses block until the test releases them, so
    /// completion order can be scripted per search text.
    struct Scripted {
        gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    }

    impl Scripted {
        fn new(gates: impl IntoIterator<Item = (&'static str, oneshot::Receiver<()>)>) -> Self {
            Self {
                gates: Mutex::new(
                    gates
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl PageSource for Scripted {
        type Row = String;

        async fn fetch_page(&self, query: &PageQuery) -> Result<PageData<Self::Row>> {
            let gate = self.gates.lock().unwrap().remove(&query.search);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(PageData {
                rows: vec![query.search.clone()],
                total_count: Some(1),
                has_next: Some(false),
                has_previous: Some(false),
            })
        }
    }

    fn spawn(command: impl Command) {
        tokio::spawn(Box::new(command).execute());
    }

    #[tokio::test]
    async fn newest_fetch_wins_even_when_older_finishes_last() {
        let (slow_tx, slow_rx) = oneshot::channel();
        let (fast_tx, fast_rx) = oneshot::channel();
        let source = Arc::new(Scripted::new([("", slow_rx), ("dev", fast_rx)]));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut browser = Browser::<String>::server(9);

        // First fetch goes out with an empty search.
        let (seq_a, query_a) = browser.begin_fetch();
        spawn(FetchPageCmd::new(
            Arc::clone(&source),
            seq_a,
            query_a,
            tx.clone(),
            Msg::Loaded,
        ));

        // The user types before it returns; a second fetch supersedes it.
        let ticket = browser.edit_search("dev");
        assert!(browser.settle_search(ticket));
        let (seq_b, query_b) = browser.begin_fetch();
        spawn(FetchPageCmd::new(
            Arc::clone(&source),
            seq_b,
            query_b,
            tx.clone(),
            Msg::Loaded,
        ));

        // The newer fetch completes first, then the stale one.
        fast_tx.send(()).unwrap();
        let Some(Msg::Loaded(seq, result)) = rx.recv().await else {
            panic!("expected a page result");
        };
        assert_eq!(seq, seq_b);
        assert_eq!(browser.commit(seq, result), Commit::Committed);
        assert_eq!(browser.rows(), ["dev"]);

        slow_tx.send(()).unwrap();
        let Some(Msg::Loaded(seq, result)) = rx.recv().await else {
            panic!("expected a page result");
        };
        assert_eq!(seq, seq_a);
        assert_eq!(browser.commit(seq, result), Commit::Stale);
        assert_eq!(browser.rows(), ["dev"]);
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_latest_keystroke_settles() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut browser = Browser::<String>::server(9);

        let first = browser.edit_search("d");
        spawn(SettleSearchCmd::new(first, tx.clone(), Msg::Settled));
        let second = browser.edit_search("de");
        spawn(SettleSearchCmd::new(second, tx.clone(), Msg::Settled));

        let mut settled = 0;
        for _ in 0..2 {
            let Some(Msg::Settled(ticket)) = rx.recv().await else {
                panic!("expected a settle message");
            };
            if browser.settle_search(ticket) {
                settled += 1;
            }
        }
        assert_eq!(settled, 1);
        assert_eq!(browser.search().effective(), "de");
    }
}

