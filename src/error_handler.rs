//! Error-handling strategies.
//!
//! An [`ErrorHandler`] turns an [`Error`] into the request's response. Both
//! built-ins classify by [`Kind`](crate::Kind): client-caused errors become a
//! `400` with a JSON content type, everything else a `500`. They differ only
//! in what the `500` body reveals.

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use tracing::error;

use crate::context::Context;
use crate::error::Error;
use crate::response::ContentType;

/// Writes the response for a failed request.
pub type ErrorHandler = Arc<dyn Fn(&Context, &Error) + Send + Sync>;

/// Responds with the error message as body for every kind of error.
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|ctx: &Context, err: &Error| respond(ctx, err, true))
}

/// Like [`default_error_handler`] but leaves the body of `500` responses
/// empty, so internal details never reach clients.
pub fn terse_error_handler() -> ErrorHandler {
    Arc::new(|ctx: &Context, err: &Error| respond(ctx, err, false))
}

fn respond(ctx: &Context, err: &Error, verbose: bool) {
    let status = err.kind().status();
    let body = if status.is_client_error() {
        ctx.set_header(CONTENT_TYPE, ContentType::Json.header_value());
        Bytes::from(err.to_string())
    } else if verbose {
        Bytes::from(err.to_string())
    } else {
        Bytes::new()
    };
    if let Err(e) = ctx.respond_bytes(status, body) {
        error!(err = %e, cause = %err, "failed to send error response");
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::context::test_context;
    use crate::response::Response;

    fn run(handler: ErrorHandler, err: Error) -> Response {
        let ctx = test_context(http::Request::new(Bytes::new()));
        handler(&ctx, &err);
        ctx.take_response()
    }

    async fn body(res: Response) -> Bytes {
        use http_body_util::BodyExt;
        res.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn verbose_strategy_reveals_internal_errors() {
        let res = run(default_error_handler(), Error::internal("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(res).await, "boom");
    }

    #[tokio::test]
    async fn terse_strategy_hides_internal_errors() {
        let res = run(terse_error_handler(), Error::internal("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(res).await.is_empty());
    }

    #[tokio::test]
    async fn both_strategies_report_validation_errors() {
        for handler in [default_error_handler(), terse_error_handler()] {
            let res = run(handler, Error::validation("boom"));
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
            assert_eq!(body(res).await, "boom");
        }
    }

    #[tokio::test]
    async fn unhandled_requests_are_internal_errors() {
        let res = run(default_error_handler(), Error::unhandled());
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(res).await, "unhandled request");
    }

    #[test]
    fn write_failure_is_swallowed() {
        let ctx = test_context(http::Request::new(Bytes::new()));
        ctx.respond_bytes(StatusCode::OK, "done").unwrap();

        default_error_handler()(&ctx, &Error::internal("late"));
        assert_eq!(ctx.response_status(), Some(StatusCode::OK));
    }
}
