//! Radix-tree request mux.
//!
//! One tree per HTTP method. O(path-length) lookup. Register a method and a
//! path pattern, get a [`HandleFunc`] and its path parameters back.
//!
//! Patterns use `{name}` for a segment and `{*name}` for a trailing wildcard
//! that captures the rest of the path. The `:name` and `*name` spellings are
//! accepted and rewritten to the braced form.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;
use tracing::info;

use crate::error::MountError;
use crate::handler::HandleFunc;

/// Path parameters extracted by the mux, by name.
pub type Params = HashMap<String, String>;

/// A version's routing table.
#[derive(Default)]
pub struct Mux {
    routes: HashMap<Method, MatchitRouter<HandleFunc>>,
}

impl Mux {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers `handle` for `method` + `pattern`.
    ///
    /// ```rust
    /// # use keel::{Mux, HandleFunc};
    /// # fn demo(mut mux: Mux, show: HandleFunc, list: HandleFunc) -> Result<(), keel::MountError> {
    /// mux.handle(http::Method::GET, "/bottles/:id", show)?;
    /// mux.handle(http::Method::GET, "/bottles", list)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn handle(&mut self, method: Method, pattern: &str, handle: HandleFunc) -> Result<(), MountError> {
        let route = normalize(pattern);
        self.routes
            .entry(method.clone())
            .or_default()
            .insert(route.clone(), handle)
            .map_err(|source| MountError::Route { pattern: pattern.to_owned(), source })?;
        info!(%method, %route, "mount");
        Ok(())
    }

    /// Finds the handler for a request, with its extracted parameters.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(HandleFunc, Params)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handle = Arc::clone(matched.value);
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handle, params))
    }
}

/// Rewrites `:name` and `*name` segments into matchit's braced syntax.
pub(crate) fn normalize(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                segment.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
