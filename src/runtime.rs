//! The process-wide runtime object.

use crate::scope::Scope;

/// Process-wide state shared by every service and request.
///
/// Build one at startup and hand clones to each [`Service`](crate::Service).
/// Every request scope derives from the runtime's root scope, so
/// [`cancel`](Runtime::cancel) reaches every in-flight request, and any
/// request started afterwards begins already cancelled.
#[derive(Clone, Debug)]
pub struct Runtime {
    root: Scope,
}

impl Runtime {
    pub fn new() -> Self {
        Self { root: Scope::root() }
    }

    /// Signals cancellation to all active and future request scopes.
    ///
    /// A running [`Server`](crate::Server) also stops accepting connections
    /// and drains.
    pub fn cancel(&self) {
        self.root.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn root(&self) -> &Scope {
        &self.root
    }

    pub(crate) fn request_scope(&self) -> Scope {
        self.root.child()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
