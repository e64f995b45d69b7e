//! Controllers and per-action dispatch.
//!
//! A controller groups the actions of one resource. It owns no routes: for
//! each action it builds a [`HandleFunc`] that the caller registers on a mux.
//!
//! # What one request goes through
//!
//! ```text
//! HandleFunc(incoming)
//!   ├─ derive request Scope from the runtime root (cancelled on exit)
//!   ├─ build Context + `action` span
//!   ├─ body declared and decoder given? decode
//!   │     └─ failed: swap the action for a 400 "invalid request" writer,
//!   │        still wrapped by the full middleware chain
//!   ├─ run chain ── … ── terminal: action, errors → error handler
//!   └─ nothing written? error handler with `unhandled request`
//! ```

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::StatusCode;
use serde::Serialize;
use tracing::{Instrument, Span, debug, info_span};

use crate::capability::{Logger, Middlewared};
use crate::context::Context;
use crate::error::Error;
use crate::error_handler::ErrorHandler;
use crate::handler::{BoxFuture, HandleFunc, Handler, Incoming, Middleware, compose, handler};
use crate::response::{ContentType, Response};
use crate::service::Shared;

/// The actions of one resource, with their shared middleware and error
/// handler override.
pub struct Controller {
    name: String,
    service: Arc<Shared>,
    span: Span,
    error_handler: Option<ErrorHandler>,
    middleware: Vec<Middleware>,
}

impl Controller {
    pub(crate) fn new(name: &str, service: Arc<Shared>) -> Self {
        let span = info_span!(parent: &service.span, "ctrl", ctrl = %name);
        Self { name: name.to_owned(), service, span, error_handler: None, middleware: Vec::new() }
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routes `err` to the controller's error handler, else the service's.
    pub fn handle_error(&self, ctx: &Context, err: &Error) {
        self.error_route().handle(ctx, err);
    }

    fn error_route(&self) -> ErrorRoute {
        ErrorRoute {
            controller: self.error_handler.clone(),
            service: self.service.settings.read().error_handler.clone(),
        }
    }

    /// Builds the request-entry function for one action.
    ///
    /// The middleware chain (service-wide first, then controller-specific)
    /// and both error handlers are captured now; registering more middleware
    /// afterwards does not affect the returned function.
    ///
    /// `decode` runs before the chain when the request declares a body. It
    /// typically calls [`Context::decode_request`] and stores the result with
    /// [`Context::set_payload`].
    pub fn handle_func(&self, action_name: &str, action: Handler, decode: Option<Handler>) -> HandleFunc {
        let chain: Arc<[Middleware]> = self.middleware_chain().into();
        let errors = Arc::new(self.error_route());

        let terminal = {
            let errors = Arc::clone(&errors);
            handler(move |ctx: Context| {
                let action = Arc::clone(&action);
                let errors = Arc::clone(&errors);
                async move {
                    if ctx.response_written() {
                        return Ok(());
                    }
                    if let Err(err) = action(ctx.clone()).await {
                        if ctx.response_written() {
                            debug!(err = %err, "action failed after responding");
                        } else {
                            errors.handle(&ctx, &err);
                        }
                    }
                    Ok(())
                }
            })
        };
        let composed = compose(&chain, terminal);

        let service = Arc::clone(&self.service);
        let ctrl_span = self.span.clone();
        let action_name: Arc<str> = Arc::from(action_name);

        Arc::new(move |incoming: Incoming| -> BoxFuture<'static, Response> {
            let scope = service.runtime.request_scope();
            let cancel = scope.cancel_on_drop();
            let span = info_span!(parent: &ctrl_span, "action", action = %action_name);
            let ctx = Context::new(Arc::clone(&service.name), incoming, scope, span.clone());

            let chain = Arc::clone(&chain);
            let mut run = Arc::clone(&composed);
            let decode = decode.clone();
            let errors = Arc::clone(&errors);

            Box::pin(
                async move {
                    let _cancel = cancel;

                    if let Some(decode) = decode.filter(|_| declares_body(ctx.request())) {
                        if let Err(err) = decode(ctx.clone()).await {
                            debug!(err = %err, "invalid request payload");
                            run = compose(&chain, invalid_request(&err));
                        }
                    }

                    if let Err(err) = run(ctx.clone()).await {
                        if ctx.response_written() {
                            debug!(err = %err, "chain failed after responding");
                        } else {
                            errors.handle(&ctx, &err);
                        }
                    }

                    if !ctx.response_written() {
                        errors.handle(&ctx, &Error::unhandled());
                    }

                    ctx.take_response()
                }
                .instrument(span),
            )
        })
    }
}

impl Middlewared for Controller {
    fn use_middleware(&mut self, m: Middleware) {
        self.middleware.push(m);
    }

    /// Service-wide middleware followed by the controller's own.
    fn middleware_chain(&self) -> Vec<Middleware> {
        let mut chain = self.service.settings.read().middleware.clone();
        chain.extend(self.middleware.iter().cloned());
        chain
    }

    fn error_handler(&self) -> Option<ErrorHandler> {
        self.error_handler.clone()
    }

    fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }
}

impl Logger for Controller {
    fn span(&self) -> &Span {
        &self.span
    }
}

/// Controller-level handler first, service-level otherwise.
struct ErrorRoute {
    controller: Option<ErrorHandler>,
    service: ErrorHandler,
}

impl ErrorRoute {
    fn handle(&self, ctx: &Context, err: &Error) {
        let route = self.controller.as_ref().unwrap_or(&self.service);
        route(ctx, err);
    }
}

/// A declared `Content-Length` decides; without one, whatever arrived does.
fn declares_body(req: &http::Request<Bytes>) -> bool {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    match declared {
        Some(len) => len > 0,
        None => !req.body().is_empty(),
    }
}

#[derive(Serialize)]
struct InvalidRequest<'a> {
    kind: &'static str,
    msg: &'a str,
}

/// The stand-in action used when the payload failed to decode.
fn invalid_request(err: &Error) -> Handler {
    let msg = err.to_string();
    let body = serde_json::to_vec(&InvalidRequest { kind: "invalid request", msg: &msg })
        .map(Bytes::from)
        .unwrap_or_default();
    handler(move |ctx: Context| {
        let body = body.clone();
        async move {
            ctx.set_header(CONTENT_TYPE, ContentType::Json.header_value());
            ctx.respond_bytes(StatusCode::BAD_REQUEST, body)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_length_wins_over_the_body() {
        let req = http::Request::builder()
            .header(CONTENT_LENGTH, "0")
            .body(Bytes::from_static(b"stray"))
            .unwrap();
        assert!(!declares_body(&req));

        let req = http::Request::builder().body(Bytes::from_static(b"{}")).unwrap();
        assert!(declares_body(&req));

        let req = http::Request::builder().body(Bytes::new()).unwrap();
        assert!(!declares_body(&req));
    }

    #[test]
    fn invalid_request_body_has_the_documented_shape() {
        let body = serde_json::to_string(&InvalidRequest { kind: "invalid request", msg: "bad \"x\"" })
            .unwrap();
        assert_eq!(body, r#"{"kind":"invalid request","msg":"bad \"x\""}"#);
    }
}
