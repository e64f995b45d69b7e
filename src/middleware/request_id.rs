//! Request ids, echoed back on the response.

use http::header::{HeaderName, HeaderValue};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::context::Context;
use crate::handler::{Handler, Middleware, handler, middleware};

/// `X-Request-Id`.
pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Tags each request with an id: the incoming `X-Request-Id` when the client
/// sent a usable one, a fresh UUIDv4 otherwise.
///
/// The id is echoed on the response and recorded as the `request_id` field
/// of a span around the rest of the chain.
pub fn request_id() -> Middleware {
    middleware(|next: Handler| {
        handler(move |ctx: Context| {
            let next = next.clone();
            async move {
                let id = incoming_id(&ctx).unwrap_or_else(|| Uuid::new_v4().to_string());
                if let Ok(value) = HeaderValue::from_str(&id) {
                    ctx.set_header(REQUEST_ID, value);
                }
                let span = info_span!(parent: ctx.span(), "request", request_id = %id);
                next(ctx).instrument(span).await
            }
        })
    })
}

fn incoming_id(ctx: &Context) -> Option<String> {
    let id = ctx.header(REQUEST_ID.as_str())?.trim();
    (!id.is_empty() && id.len() <= 128).then(|| id.to_owned())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::context::test_context;
    use crate::handler::compose;

    fn ok() -> Handler {
        handler(|ctx: Context| async move { ctx.respond_bytes(StatusCode::OK, "") })
    }

    #[tokio::test]
    async fn incoming_id_is_echoed() {
        let req = http::Request::builder()
            .header("X-Request-Id", "abc-123")
            .body(Bytes::new())
            .unwrap();
        let ctx = test_context(req);
        compose(&[request_id()], ok())(ctx.clone()).await.unwrap();

        let res = ctx.take_response();
        assert_eq!(res.headers()[&REQUEST_ID], "abc-123");
    }

    #[tokio::test]
    async fn missing_id_gets_a_uuid() {
        let ctx = test_context(http::Request::new(Bytes::new()));
        compose(&[request_id()], ok())(ctx.clone()).await.unwrap();

        let res = ctx.take_response();
        let id = res.headers()[&REQUEST_ID].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
