//! # keel
//!
//! A request-dispatch runtime for HTTP services: middleware chains composed
//! per action, a write-once request context with cooperative cancellation,
//! and content-negotiated decoding and encoding through pooled codecs.
//!
//! ## The pieces
//!
//! - [`Service`]: the registry. Application-wide middleware, the error
//!   handler, and one [`Version`] per API version, each with its own
//!   [`Mux`] and codec table.
//! - [`Controller`]: the actions of one resource. It builds one
//!   [`HandleFunc`] per action; you register that on a mux.
//! - [`Context`]: per-request state. The response is written exactly once;
//!   a request that never writes one still gets exactly one, via the error
//!   handler.
//! - [`Runtime`]: the process-wide root [`Scope`]. Cancelling it reaches
//!   every in-flight request and stops the [`Server`].
//!
//! Configuration and serving are separate phases: [`Service::into_app`]
//! freezes everything into an immutable [`App`], so nothing can be
//! registered while requests are in flight.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::{Method, StatusCode};
//! use keel::codec::{JsonDecoder, JsonEncoder};
//! use keel::{Context, Error, Middlewared, Runtime, Service, handler, middleware};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, Serialize)]
//! struct Bottle {
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut service = Service::new("cellar", Runtime::new());
//!     service.set_decoder(|| JsonDecoder, "", true, &["application/json"]);
//!     service.set_encoder(JsonEncoder::default, "", true, &["application/json"]);
//!     service.use_middleware(middleware::request_id());
//!
//!     let bottles = service.new_controller("bottle");
//!     let create = bottles.handle_func(
//!         "create",
//!         handler(|ctx: Context| async move {
//!             let bottle: Bottle = ctx.take_payload().ok_or_else(|| Error::validation("missing body"))?;
//!             ctx.respond(StatusCode::CREATED, &bottle)
//!         }),
//!         Some(handler(|ctx: Context| async move {
//!             let bottle: Bottle = ctx.decode_request()?;
//!             ctx.set_payload(bottle);
//!             Ok(())
//!         })),
//!     );
//!     service.mux().handle(Method::POST, "/bottles", create)?;
//!
//!     service.listen_and_serve("0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```

mod app;
mod capability;
mod config;
mod context;
mod controller;
mod error;
mod error_handler;
mod files;
mod handler;
mod mux;
mod response;
mod runtime;
mod scope;
mod server;
mod service;
mod version;

pub mod codec;
pub mod middleware;

pub use app::App;
pub use capability::{Logger, Middlewared, Versioned};
pub use config::{Config, ConfigError, ErrorMode, TlsConfig};
pub use context::Context;
pub use controller::Controller;
pub use error::{Error, Kind, MountError};
pub use error_handler::{ErrorHandler, default_error_handler, terse_error_handler};
pub use handler::{BoxFuture, HandleFunc, Handler, Incoming, Middleware, compose, handler, middleware};
pub use mux::{Mux, Params};
pub use response::{ContentType, Response};
pub use runtime::Runtime;
pub use scope::{CancelGuard, Scope};
pub use server::Server;
pub use service::Service;
pub use version::{Version, VersionSelector};
