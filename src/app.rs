//! The frozen application a server dispatches into.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use tracing::{Span, debug};

use crate::handler::Incoming;
use crate::response::{Response, status_only};
use crate::runtime::Runtime;
use crate::version::{FrozenVersion, Version, VersionSelector};

/// A configured service, ready to serve. Immutable; share it behind an `Arc`.
pub struct App {
    name: Arc<str>,
    runtime: Runtime,
    span: Span,
    default: FrozenVersion,
    versions: HashMap<String, FrozenVersion>,
    selector: VersionSelector,
}

impl App {
    pub(crate) fn new(
        name: Arc<str>,
        runtime: Runtime,
        span: Span,
        mut versions: HashMap<String, FrozenVersion>,
        selector: VersionSelector,
    ) -> Self {
        let default = versions
            .remove("")
            .unwrap_or_else(|| Version::new("").freeze());
        Self { name, runtime, span, default, versions, selector }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Routes one request through the selected version's mux and runs the
    /// matched action. Unrouted requests get an empty `404`.
    pub async fn dispatch(&self, req: http::Request<Bytes>) -> Response {
        let version = self
            .selector
            .select(&req)
            .and_then(|name| self.versions.get(name))
            .unwrap_or(&self.default);

        let Some((handle, params)) = version.mux.lookup(req.method(), req.uri().path()) else {
            debug!(parent: &self.span, method = %req.method(), path = %req.uri().path(), "no route");
            return status_only(StatusCode::NOT_FOUND);
        };

        handle(Incoming::new(req, params, Arc::clone(&version.codecs))).await
    }
}
