// src/exec/action.rs

//! The callable attached to every task vertex.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Boxed, sendable future used by every async trait in the crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What an action gets to know about the attempt it is running.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub task: String,
    /// 1-based attempt counter (retries increment it).
    pub attempt: u32,
    /// Cancelled when the run is cancelled. Long actions may watch it to
    /// stop early; the executor stops waiting on the action regardless.
    pub cancel: CancellationToken,
}

/// An external action. `Ok(())` is success; any error is recorded on the
/// vertex as `Failed`.
pub trait TaskAction: Send + Sync {
    fn run(&self, ctx: ActionContext) -> BoxFuture<'static, anyhow::Result<()>>;

    /// Short label for reports and dry-run output.
    fn describe(&self) -> String {
        "action".to_string()
    }
}

/// Adapter turning an async closure into a [`TaskAction`].
pub struct FnAction<F> {
    f: F,
    label: String,
}

impl<F, Fut> TaskAction for FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn run(&self, ctx: ActionContext) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin((self.f)(ctx))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").field("label", &self.label).finish()
    }
}

/// Wrap an async closure as a shareable action.
pub fn action_fn<F, Fut>(label: impl Into<String>, f: F) -> Arc<dyn TaskAction>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnAction {
        f,
        label: label.into(),
    })
}
