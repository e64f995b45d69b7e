//! Per-request deadlines.

use std::time::Duration;

use tracing::warn;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{Handler, Middleware, handler, middleware};

/// Bounds the rest of the chain to `limit`.
///
/// On expiry the wrapped future is dropped, the request scope is cancelled so
/// work spawned from it can stop, and the chain fails with an internal error.
pub fn timeout(limit: Duration) -> Middleware {
    middleware(move |next: Handler| {
        handler(move |ctx: Context| {
            let next = next.clone();
            async move {
                match tokio::time::timeout(limit, next(ctx.clone())).await {
                    Ok(res) => res,
                    Err(_) => {
                        warn!(?limit, "request timed out");
                        ctx.scope().cancel();
                        Err(Error::internal(format!("request timed out after {limit:?}")))
                    }
                }
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
    use crate::handler::compose;

    #[tokio::test(start_paused = true)]
    async fn slow_chain_is_cut_off_and_scope_cancelled() {
        let slow = handler(|ctx: Context| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ctx.respond_bytes(StatusCode::OK, "late")
        });
        let ctx = test_context(http::Request::new(Bytes::new()));

        let err = compose(&[timeout(Duration::from_secs(1))], slow)(ctx.clone())
            .await
            .unwrap_err();
        assert!(err.message().starts_with("request timed out"));
        assert!(ctx.scope().is_cancelled());
        assert!(!ctx.response_written());
    }

    #[tokio::test]
    async fn fast_chain_is_untouched() {
        let fast = handler(|ctx: Context| async move { ctx.respond_bytes(StatusCode::OK, "") });
        let ctx = test_context(http::Request::new(Bytes::new()));

        compose(&[timeout(Duration::from_secs(5))], fast)(ctx.clone()).await.unwrap();
        assert!(!ctx.scope().is_cancelled());
        assert_eq!(ctx.response_status(), Some(StatusCode::OK));
    }
}
