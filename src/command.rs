//! Async command pattern for side effects.
//!
//! Commands represent async operations that run outside the main event
//! loop: API calls, debounce timers, mutations. Pages return commands from
//! their update funnel, the [`crate::app::App`] spawns them, and completion
//! re-enters the owning page via its message channel.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::mpsc::UnboundedSender;

#[async_trait]
pub trait Command: Send + 'static {
    /// Human-readable name for logging and failure toasts.
    fn name(&self) -> String;

    /// Execute the command. Expected failures (a fetch that 404s, a login
    /// that is rejected) are delivered through the page's channel and
    /// return `Ok`; an `Err` here means the command itself broke.
    async fn execute(self: Box<Self>) -> Result<()>;
}

type MutationFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// One-shot write against the API (create, update, delete, set-default).
/// The outcome goes back to the owning page, which decides whether to
/// toast, refetch, or both.
pub struct MutationCmd<M: Send + 'static> {
    name: String,
    run: MutationFuture,
    tx: UnboundedSender<M>,
    wrap: fn(Result<()>) -> M,
}

impl<M: Send + 'static> MutationCmd<M> {
    pub fn new(
        name: impl Into<String>,
        run: impl Future<Output = Result<()>> + Send + 'static,
        tx: UnboundedSender<M>,
        wrap: fn(Result<()>) -> M,
    ) -> Self {
        Self {
            name: name.into(),
            run: Box::pin(run),
            tx,
            wrap,
        }
    }
}

#[async_trait]
impl<M: Send + 'static> Command for MutationCmd<M> {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(self: Box<Self>) -> Result<()> {
        let result = self.run.await;
        let _ = self.tx.send((self.wrap)(result));
        Ok(())
    }
}
