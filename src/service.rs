//! The service registry: application-wide settings, versions, controllers.
//!
//! A [`Service`] is mutable only while it is being configured. Serving
//! consumes it: [`into_app`](Service::into_app) freezes every version into an
//! immutable [`App`], so nothing can be registered while requests are in
//! flight.
//!
//! ```rust,no_run
//! use keel::{Middlewared, Runtime, Service, middleware};
//!
//! # async fn run() -> Result<(), keel::Error> {
//! let mut service = Service::new("cellar", Runtime::new());
//! service.use_middleware(middleware::request_id());
//! service.use_middleware(middleware::log_request());
//!
//! let bottles = service.new_controller("bottle");
//! // bottles.handle_func(…) for each action, registered on service.mux()
//! # let _ = bottles;
//! service.listen_and_serve("0.0.0.0:8080").await
//! # }
//! ```

use std::collections::HashMap;
#[cfg(feature = "tls")]
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{Span, info, info_span};

use crate::app::App;
use crate::capability::{Logger, Middlewared, Versioned};
use crate::codec::{Decoder, Encoder};
use crate::config::Config;
use crate::controller::Controller;
use crate::error::Error;
use crate::error_handler::{ErrorHandler, default_error_handler};
use crate::handler::Middleware;
use crate::mux::Mux;
use crate::runtime::Runtime;
use crate::server::Server;
use crate::version::{Version, VersionSelector};

/// State shared between a service and its controllers.
pub(crate) struct Shared {
    pub(crate) name: Arc<str>,
    pub(crate) runtime: Runtime,
    pub(crate) span: Span,
    pub(crate) settings: RwLock<Settings>,
}

pub(crate) struct Settings {
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) error_handler: ErrorHandler,
}

/// An application under configuration.
pub struct Service {
    shared: Arc<Shared>,
    versions: HashMap<String, Version>,
    selector: VersionSelector,
}

impl Service {
    /// A service with the verbose error handler, no middleware and an empty
    /// default version.
    pub fn new(name: &str, runtime: Runtime) -> Self {
        let shared = Shared {
            name: Arc::from(name),
            runtime,
            span: info_span!("app", app = %name),
            settings: RwLock::new(Settings {
                middleware: Vec::new(),
                error_handler: default_error_handler(),
            }),
        };
        let mut versions = HashMap::new();
        versions.insert(String::new(), Version::new(""));
        Self { shared: Arc::new(shared), versions, selector: VersionSelector::default() }
    }

    /// A service named and configured from `config`.
    pub fn from_config(config: &Config, runtime: Runtime) -> Self {
        let mut service = Self::new(&config.name, runtime);
        service.set_error_handler(config.errors.handler());
        service
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn runtime(&self) -> &Runtime {
        &self.shared.runtime
    }

    /// The default version's mux.
    pub fn mux(&mut self) -> &mut Mux {
        self.default_version().mux()
    }

    /// Registers a decoder factory on `version` (empty for unversioned
    /// endpoints). See [`Codecs::set_decoder`](crate::codec::Codecs::set_decoder).
    pub fn set_decoder<F, D>(&mut self, factory: F, version: &str, make_default: bool, content_types: &[&str])
    where
        F: Fn() -> D + Send + Sync + 'static,
        D: Decoder + 'static,
    {
        self.version(version).set_decoder(factory, make_default, content_types);
    }

    /// Encoder counterpart of [`set_decoder`](Service::set_decoder).
    pub fn set_encoder<F, E>(&mut self, factory: F, version: &str, make_default: bool, content_types: &[&str])
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: Encoder + 'static,
    {
        self.version(version).set_encoder(factory, make_default, content_types);
    }

    /// Chooses how requests pick a version. Defaults to the `X-Api-Version`
    /// header.
    pub fn select_version(&mut self, selector: VersionSelector) {
        self.selector = selector;
    }

    /// A controller for the resource `resource`, logging under its own span.
    pub fn new_controller(&self, resource: &str) -> Controller {
        Controller::new(resource, Arc::clone(&self.shared))
    }

    /// Ends configuration and freezes every version.
    pub fn into_app(self) -> App {
        let versions = self
            .versions
            .into_iter()
            .map(|(name, version)| (name, version.freeze()))
            .collect();
        App::new(
            Arc::clone(&self.shared.name),
            self.shared.runtime.clone(),
            self.shared.span.clone(),
            versions,
            self.selector,
        )
    }

    /// Serves plain HTTP on `addr` until shutdown.
    pub async fn listen_and_serve(self, addr: &str) -> Result<(), Error> {
        self.shared.span.in_scope(|| info!(%addr, "listen"));
        Server::bind(addr)?.serve(self.into_app()).await
    }

    /// Serves HTTPS on `addr` with a PEM certificate chain and private key.
    #[cfg(feature = "tls")]
    pub async fn listen_and_serve_tls(
        self,
        addr: &str,
        cert_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<(), Error> {
        self.shared.span.in_scope(|| info!(%addr, "listen ssl"));
        Server::bind(addr)?
            .serve_tls(self.into_app(), cert_file.as_ref(), key_file.as_ref())
            .await
    }

    /// Serves according to `config`: HTTPS when it has a `[tls]` table.
    pub async fn listen(self, config: &Config) -> Result<(), Error> {
        match &config.tls {
            #[cfg(feature = "tls")]
            Some(tls) => self.listen_and_serve_tls(&config.addr, &tls.cert, &tls.key).await,
            #[cfg(not(feature = "tls"))]
            Some(_) => Err(Error::internal("TLS configured but the `tls` feature is disabled")),
            None => self.listen_and_serve(&config.addr).await,
        }
    }
}

impl Versioned for Service {
    fn version(&mut self, name: &str) -> &mut Version {
        self.versions
            .entry(name.to_owned())
            .or_insert_with(|| Version::new(name))
    }
}

impl Middlewared for Service {
    fn use_middleware(&mut self, m: Middleware) {
        self.shared.settings.write().middleware.push(m);
    }

    fn middleware_chain(&self) -> Vec<Middleware> {
        self.shared.settings.read().middleware.clone()
    }

    /// Always set: a service starts with [`default_error_handler`].
    fn error_handler(&self) -> Option<ErrorHandler> {
        Some(self.shared.settings.read().error_handler.clone())
    }

    fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.shared.settings.write().error_handler = handler;
    }
}

impl Logger for Service {
    fn span(&self) -> &Span {
        &self.shared.span
    }
}
