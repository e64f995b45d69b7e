//! Hierarchical cancellation scopes.
//!
//! ```text
//! Runtime ── root Scope
//!              ├── request Scope   (cancelled when the request finishes)
//!              ├── request Scope
//!              └── …
//! ```
//!
//! Cancelling a scope cancels every scope derived from it, including scopes
//! derived *after* the cancellation. Cancellation is advisory: code that spawns
//! sub-work must observe [`Scope::cancelled`] or [`Scope::is_cancelled`]
//! itself, nothing is aborted forcibly.

use std::sync::Arc;

use tokio::sync::watch;

use crate::handler::BoxFuture;

/// A cancellable execution scope. Cloning is cheap and clones share state.
#[derive(Clone, Debug)]
pub struct Scope {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<bool>,
    parent: Option<Scope>,
}

impl Scope {
    /// A scope with no parent. Only the [`Runtime`](crate::Runtime) creates one
    /// in normal operation.
    pub fn root() -> Self {
        Self::with_parent(None)
    }

    /// Derives a scope that is cancelled when `self` is.
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    fn with_parent(parent: Option<Scope>) -> Self {
        let (tx, _) = watch::channel(false);
        Self { inner: Arc::new(Inner { tx, parent }) }
    }

    /// Cancels this scope and, transitively, every scope derived from it.
    pub fn cancel(&self) {
        self.inner.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.tx.borrow()
            || self.inner.parent.as_ref().is_some_and(Scope::is_cancelled)
    }

    /// Resolves once this scope or one of its ancestors is cancelled.
    pub fn cancelled(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut rx = self.inner.tx.subscribe();
            match &self.inner.parent {
                None => wait_for_cancel(&mut rx).await,
                Some(parent) => {
                    tokio::select! {
                        () = wait_for_cancel(&mut rx) => {}
                        () = parent.cancelled() => {}
                    }
                }
            }
        })
    }

    /// Returns a guard that cancels this scope when dropped.
    pub fn cancel_on_drop(&self) -> CancelGuard {
        CancelGuard(self.clone())
    }
}

// The sender lives in the scope that owns `rx`, so `changed` only fails once
// that scope is gone, and then nobody is waiting on it anymore.
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Cancels its scope on drop, whether the owner returned, failed or unwound.
#[derive(Debug)]
pub struct CancelGuard(Scope);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
