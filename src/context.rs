//! Per-request state.
//!
//! A [`Context`] is created when a routed request enters its action's
//! [`HandleFunc`](crate::HandleFunc) and dropped when the response leaves.
//! Middleware layers share it by cloning the handle; it is never shared
//! across requests.

use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{Span, debug, warn};

use crate::capability::Logger;
use crate::codec::Codecs;
use crate::error::Error;
use crate::handler::Incoming;
use crate::mux::Params;
use crate::response::{Response, ResponseState};
use crate::scope::Scope;

/// Handle to the state of one in-flight request.
///
/// The response can be written exactly once: the first call to
/// [`respond_bytes`](Context::respond_bytes) or [`respond`](Context::respond)
/// fixes status, headers and body, later calls fail with an internal error.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    service: Arc<str>,
    request: http::Request<Bytes>,
    params: Params,
    codecs: Arc<Codecs>,
    scope: Scope,
    span: Span,
    response: Mutex<ResponseState>,
    payload: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Context {
    pub(crate) fn new(service: Arc<str>, incoming: Incoming, scope: Scope, span: Span) -> Self {
        let Incoming { request, params, codecs } = incoming;
        Self {
            inner: Arc::new(Inner {
                service,
                request,
                params,
                codecs,
                scope,
                span,
                response: Mutex::new(ResponseState::default()),
                payload: Mutex::new(None),
            }),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service
    }

    pub fn request(&self) -> &http::Request<Bytes> {
        &self.inner.request
    }

    pub fn method(&self) -> &Method {
        self.inner.request.method()
    }

    pub fn path(&self) -> &str {
        self.inner.request.uri().path()
    }

    /// Request header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.request.headers().get(name)?.to_str().ok()
    }

    pub fn params(&self) -> &Params {
        &self.inner.params
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner.params.get(name).map(String::as_str)
    }

    /// The request's cancellation scope. It is cancelled when the request
    /// finishes or when the [`Runtime`](crate::Runtime) is cancelled.
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// The request-scoped logger: an `action` span nested in the controller's
    /// and service's spans.
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Sets a response header. Ignored once the response has been written.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        let mut res = self.inner.response.lock();
        if res.status.is_some() {
            debug!(header = %name, "response already written, header ignored");
            return;
        }
        res.headers.insert(name, value);
    }

    /// Writes the response. Fails if a response was already written.
    pub fn respond_bytes(&self, status: StatusCode, body: impl Into<Bytes>) -> Result<(), Error> {
        self.write(status, None, body.into())
    }

    /// Encodes `value` with the codec negotiated from the request's `Accept`
    /// header and writes it with the matching `Content-Type`.
    pub fn respond<T: Serialize>(&self, status: StatusCode, value: &T) -> Result<(), Error> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::internal(format!("serialize response: {e}")).with_source(e))?;
        let (content_type, body) = self.inner.codecs.encode(self.header(ACCEPT.as_str()), &value)?;
        let content_type = HeaderValue::from_str(&content_type)
            .map_err(|e| Error::internal(format!("content type `{content_type}`: {e}")))?;
        self.write(status, Some(content_type), body)
    }

    fn write(&self, status: StatusCode, content_type: Option<HeaderValue>, body: Bytes) -> Result<(), Error> {
        let mut res = self.inner.response.lock();
        if let Some(previous) = res.status {
            warn!(%previous, attempted = %status, "response already written");
            return Err(Error::internal(format!(
                "response already written with status {previous}"
            )));
        }
        if let Some(ct) = content_type {
            res.headers.insert(CONTENT_TYPE, ct);
        }
        res.status = Some(status);
        res.body = body;
        Ok(())
    }

    /// The status written so far, `None` while no response exists.
    pub fn response_status(&self) -> Option<StatusCode> {
        self.inner.response.lock().status
    }

    pub fn response_written(&self) -> bool {
        self.response_status().is_some()
    }

    /// Decodes the request body with the decoder negotiated from the
    /// request's `Content-Type` header.
    pub fn decode_request<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = self
            .inner
            .codecs
            .decode(self.header(CONTENT_TYPE.as_str()), self.inner.request.body())?;
        serde_json::from_value(value).map_err(|e| Error::decode(e.to_string()).with_source(e))
    }

    /// Stores the decoded payload for the action. Replaces any previous one.
    pub fn set_payload<T: Any + Send>(&self, payload: T) {
        *self.inner.payload.lock() = Some(Box::new(payload));
    }

    /// Takes the payload stored by the decode function, if it has type `T`.
    pub fn take_payload<T: Any>(&self) -> Option<T> {
        let mut slot = self.inner.payload.lock();
        match slot.take()?.downcast::<T>() {
            Ok(payload) => Some(*payload),
            Err(other) => {
                *slot = Some(other);
                None
            }
        }
    }

    pub(crate) fn take_response(&self) -> Response {
        self.inner.response.lock().take()
    }
}

impl Logger for Context {
    fn span(&self) -> &Span {
        &self.inner.span
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", self.method())
            .field("path", &self.path())
            .field("params", &self.inner.params)
            .field("status", &self.response_status())
            .finish_non_exhaustive()
    }
}

/// A context over an empty codec table, detached from any service.
#[cfg(test)]
pub(crate) fn test_context(request: http::Request<Bytes>) -> Context {
    test_context_with(request, Params::new(), Arc::new(Codecs::new()))
}

#[cfg(test)]
pub(crate) fn test_context_with(request: http::Request<Bytes>, params: Params, codecs: Arc<Codecs>) -> Context {
    Context::new(
        Arc::from("test"),
        Incoming::new(request, params, codecs),
        Scope::root().child(),
        Span::none(),
    )
}
