//! Full round trips over TCP.

use std::time::Duration;

use http::{Method, StatusCode};
use keel::{Context, Runtime, Server, Service, handler};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn serves_until_the_runtime_is_cancelled() {
    let runtime = Runtime::new();
    let mut service = Service::new("cellar", runtime.clone());
    let ctrl = service.new_controller("ping");
    let ping = ctrl.handle_func(
        "ping",
        handler(|ctx: Context| async move { ctx.respond_bytes(StatusCode::OK, "pong") }),
        None,
    );
    service.mux().handle(Method::GET, "/ping", ping).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(Server::from_listener(listener).serve(service.into_app()));

    let res = roundtrip(addr, "GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.ends_with("pong"), "{res}");

    let res = roundtrip(addr, "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found"), "{res}");

    runtime.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not shut down")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn bad_listen_address_is_an_error() {
    assert!(Server::bind("not-an-address").is_err());

    let service = Service::new("cellar", Runtime::new());
    assert!(service.listen_and_serve("cellar:80:80").await.is_err());
}
