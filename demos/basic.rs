//! Minimal keel example: a JSON resource, a static directory and built-in
//! middleware.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8080/bottles/42
//!   curl -X POST http://localhost:8080/bottles \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"Margaux","vintage":2010}'
//!   curl -X POST http://localhost:8080/bottles -d 'not json'
//!   curl http://localhost:8080/static/basic.rs

use std::time::Duration;

use http::{Method, StatusCode};
use keel::codec::{JsonDecoder, JsonEncoder};
use keel::{Context, Error, Middlewared, Runtime, Service, handler, middleware};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
struct Bottle {
    name: String,
    vintage: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut service = Service::new("cellar", Runtime::new());
    service.set_decoder(|| JsonDecoder, "", true, &["application/json"]);
    service.set_encoder(JsonEncoder::default, "", true, &["application/json"]);

    service.use_middleware(middleware::request_id());
    service.use_middleware(middleware::log_request());
    service.use_middleware(middleware::recover());
    service.use_middleware(middleware::timeout(Duration::from_secs(10)));

    let bottles = service.new_controller("bottle");
    let show = bottles.handle_func("show", handler(show_bottle), None);
    let create = bottles.handle_func("create", handler(create_bottle), Some(handler(decode_bottle)));
    service.mux().handle(Method::GET, "/bottles/:id", show)?;
    service.mux().handle(Method::POST, "/bottles", create)?;

    service.serve_files("/static/*filepath", "demos")?;

    service.listen_and_serve("0.0.0.0:8080").await?;
    Ok(())
}

async fn show_bottle(ctx: Context) -> Result<(), Error> {
    let id: u16 = ctx
        .param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| Error::validation("id must be a number"))?;
    ctx.respond(StatusCode::OK, &Bottle { name: format!("bottle #{id}"), vintage: 2000 + id % 25 })
}

async fn decode_bottle(ctx: Context) -> Result<(), Error> {
    let bottle: Bottle = ctx.decode_request()?;
    ctx.set_payload(bottle);
    Ok(())
}

async fn create_bottle(ctx: Context) -> Result<(), Error> {
    let bottle: Bottle = ctx
        .take_payload()
        .ok_or_else(|| Error::validation("request body is required"))?;
    tracing::info!(name = %bottle.name, "created");
    ctx.respond(StatusCode::CREATED, &bottle)
}
