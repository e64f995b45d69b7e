//! Request logging.

use std::time::Instant;

use tracing::{info, warn};

use crate::context::Context;
use crate::handler::{Handler, Middleware, handler, middleware};

/// Logs one event when a request starts and one when the chain returns,
/// with method, path, status and elapsed time.
pub fn log_request() -> Middleware {
    middleware(|next: Handler| {
        handler(move |ctx: Context| {
            let next = next.clone();
            async move {
                let start = Instant::now();
                info!(method = %ctx.method(), path = %ctx.path(), "started");

                let res = next(ctx.clone()).await;

                let elapsed = start.elapsed();
                match (&res, ctx.response_status()) {
                    (Err(err), _) => warn!(?elapsed, err = %err, "failed"),
                    (Ok(()), Some(status)) => info!(status = status.as_u16(), ?elapsed, "completed"),
                    (Ok(()), None) => info!(?elapsed, "completed without response"),
                }
                res
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::context::test_context;
    use crate::error::Error;
    use crate::handler::compose;

    #[tokio::test]
    async fn result_passes_through() {
        let ctx = test_context(http::Request::new(Bytes::new()));
        let ok = handler(|ctx: Context| async move { ctx.respond_bytes(StatusCode::CREATED, "") });
        compose(&[log_request()], ok)(ctx.clone()).await.unwrap();
        assert_eq!(ctx.response_status(), Some(StatusCode::CREATED));

        let ctx = test_context(http::Request::new(Bytes::new()));
        let fail = handler(|_ctx: Context| async move { Err(Error::validation("nope")) });
        let err = compose(&[log_request()], fail)(ctx).await.unwrap_err();
        assert_eq!(err.message(), "nope");
    }
}
