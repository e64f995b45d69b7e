//! Handlers, middleware and chain composition.
//!
//! # How async handlers are stored
//!
//! A middleware chain mixes closures of *different* types: the action, the
//! decoder, every middleware layer. Rust collections hold one concrete type,
//! so each of them is erased behind a trait object and stored as an `Arc`:
//!
//! ```text
//! async fn show(ctx: Context) -> Result<(), Error> { … }   ← user writes this
//!        ↓ handler(show)
//! Arc<dyn Fn(Context) -> BoxFuture<Result<(), Error>>>     ← Handler
//!        ↓ middleware(|next| handler(…next…))
//! Arc<dyn Fn(Handler) -> Handler>                          ← Middleware
//!        ↓ compose(&chain, terminal)
//! one Handler that runs the whole chain                   ← per action
//! ```
//!
//! Each layer costs one `Arc` clone and one virtual call per request.
//!
//! # Ordering
//!
//! [`compose`] folds the chain from the last element to the first. The last
//! registered middleware wraps the terminal handler, every earlier one wraps
//! the result, so the first registered middleware ends up outermost: its
//! pre-logic runs first and its post-logic runs last.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::Codecs;
use crate::context::Context;
use crate::error::Error;
use crate::mux::Params;
use crate::response::Response;

/// A heap-allocated, type-erased future.
///
/// `Send` lets tokio move it across worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request handler: an action, a decode function or a wrapped chain.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// A decorator turning a handler into a new handler.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// The request-entry function a controller builds for one action. This is
/// what gets registered on a [`Mux`](crate::Mux).
pub type HandleFunc = Arc<dyn Fn(Incoming) -> BoxFuture<'static, Response> + Send + Sync>;

/// A routed request, as handed to a [`HandleFunc`].
pub struct Incoming {
    pub request: http::Request<Bytes>,
    pub params: Params,
    /// The codec table of the version that matched the request.
    pub codecs: Arc<Codecs>,
}

impl Incoming {
    pub fn new(request: http::Request<Bytes>, params: Params, codecs: Arc<Codecs>) -> Self {
        Self { request, params, codecs }
    }
}

/// Erases an async function into a [`Handler`].
///
/// ```rust
/// use keel::{handler, Context, Error};
/// use http::StatusCode;
///
/// let ping = handler(|ctx: Context| async move {
///     ctx.respond_bytes(StatusCode::OK, "pong")
/// });
/// # let _ = ping;
/// ```
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Arc::new(move |ctx: Context| -> BoxFuture<'static, Result<(), Error>> { Box::pin(f(ctx)) })
}

/// Erases a handler transformation into a [`Middleware`].
///
/// ```rust
/// use keel::{handler, middleware, Context, Handler};
///
/// let noisy = middleware(|next: Handler| {
///     handler(move |ctx: Context| {
///         let next = next.clone();
///         async move {
///             tracing::info!("before");
///             let res = next(ctx).await;
///             tracing::info!("after");
///             res
///         }
///     })
/// });
/// # let _ = noisy;
/// ```
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps `terminal` in `chain`, first element outermost.
pub fn compose(chain: &[Middleware], terminal: Handler) -> Handler {
    chain.iter().rev().fold(terminal, |next, m| m(next))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::context::test_context;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Middleware {
        let log = Arc::clone(log);
        middleware(move |next: Handler| {
            let log = Arc::clone(&log);
            handler(move |ctx: Context| {
                let next = next.clone();
                let log = Arc::clone(&log);
                async move {
                    log.lock().push(format!("{name} pre"));
                    let res = next(ctx).await;
                    log.lock().push(format!("{name} post"));
                    res
                }
            })
        })
    }

    #[tokio::test]
    async fn first_registered_middleware_runs_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![
            recording(&log, "m1"),
            recording(&log, "m2"),
            recording(&log, "m3"),
        ];
        let terminal = {
            let log = Arc::clone(&log);
            handler(move |_ctx: Context| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().push("action".to_owned());
                    Ok(())
                }
            })
        };

        compose(&chain, terminal)(test_context(http::Request::new(Bytes::new())))
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            ["m1 pre", "m2 pre", "m3 pre", "action", "m3 post", "m2 post", "m1 post"]
        );
    }

    #[tokio::test]
    async fn empty_chain_is_the_terminal_handler() {
        let terminal = handler(|_ctx: Context| async { Err(Error::validation("nope")) });
        let err = compose(&[], terminal)(test_context(http::Request::new(Bytes::new())))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "nope");
    }
}
