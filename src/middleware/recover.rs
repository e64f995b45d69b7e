//! Panic recovery.
//!
//! A panic in an action would otherwise unwind through the connection task
//! and drop the request without a response.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::error;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{Handler, Middleware, handler, middleware};

/// Turns a panic anywhere below this layer into an internal error, which the
/// dispatcher then routes to the error handler.
pub fn recover() -> Middleware {
    middleware(|next: Handler| {
        handler(move |ctx: Context| {
            let next = next.clone();
            async move {
                match AssertUnwindSafe(next(ctx)).catch_unwind().await {
                    Ok(res) => res,
                    Err(payload) => {
                        let msg = panic_message(payload.as_ref());
                        error!(panic = %msg, "handler panicked");
                        Err(Error::internal(format!("panic: {msg}")))
                    }
                }
            }
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::context::test_context;
    use crate::error::Kind;
    use crate::handler::compose;

    #[tokio::test]
    async fn panic_becomes_an_internal_error() {
        let boom = handler(|_ctx: Context| async move {
            if true {
                panic!("cellar flooded");
            }
            Ok(())
        });
        let ctx = test_context(http::Request::new(Bytes::new()));

        let err = compose(&[recover()], boom)(ctx).await.unwrap_err();
        assert_eq!(err.kind(), Kind::Internal);
        assert_eq!(err.message(), "panic: cellar flooded");
    }

    #[test]
    fn formatted_panics_keep_their_message() {
        let payload: Box<dyn Any + Send> = Box::new(format!("bottle {}", 7));
        assert_eq!(panic_message(payload.as_ref()), "bottle 7");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
