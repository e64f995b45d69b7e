//! Narrow capabilities shared by services, controllers and contexts.

use tracing::Span;

use crate::error_handler::ErrorHandler;
use crate::handler::Middleware;
use crate::version::Version;

/// Something that logs under its own span.
pub trait Logger {
    fn span(&self) -> &Span;
}

/// Something carrying a middleware chain and an error handler.
pub trait Middlewared {
    /// Appends `m` to the chain. Earlier middleware wraps later middleware.
    fn use_middleware(&mut self, m: Middleware);

    /// The effective chain, outermost first.
    fn middleware_chain(&self) -> Vec<Middleware>;

    /// The error handler set at this level, if any.
    fn error_handler(&self) -> Option<ErrorHandler>;

    fn set_error_handler(&mut self, handler: ErrorHandler);
}

/// Something holding named API versions.
pub trait Versioned {
    /// Returns the version called `name`, creating it on first reference.
    fn version(&mut self, name: &str) -> &mut Version;

    /// The unversioned scope.
    fn default_version(&mut self) -> &mut Version {
        self.version("")
    }
}
