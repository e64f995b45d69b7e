//! HTTP server and graceful shutdown.
//!
//! # Shutdown
//!
//! The server stops on the first of:
//! - **SIGTERM** or **SIGINT** (Ctrl-C), after which it cancels the app's
//!   [`Runtime`](crate::Runtime) so in-flight handlers see their scopes
//!   cancelled;
//! - the runtime being cancelled by the application itself.
//!
//! Then it:
//! 1. stops `listener.accept()`, so no new connections are made;
//! 2. asks every open connection to finish its current request and close;
//! 3. returns from [`Server::serve`] once all connections are gone.

use std::convert::Infallible;
use std::net::SocketAddr;
#[cfg(feature = "tls")]
use std::path::Path;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::body::Incoming as Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::Error;
use crate::response::{Response, status_only};

/// The HTTP server.
pub struct Server {
    listen: Listen,
}

enum Listen {
    Addr(SocketAddr),
    Listener(TcpListener),
}

#[derive(Clone)]
enum Transport {
    Plain,
    #[cfg(feature = "tls")]
    Tls(tokio_rustls::TlsAcceptor),
}

impl Server {
    /// Configures the server to bind to `addr` when it starts serving.
    ///
    /// ```rust
    /// use keel::Server;
    /// let server = Server::bind("0.0.0.0:3000").unwrap();
    /// # let _ = server;
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::internal(format!("invalid socket address `{addr}`: {e}")))?;
        Ok(Self { listen: Listen::Addr(addr) })
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listen: Listen::Listener(listener) }
    }

    /// Accepts plain HTTP connections and dispatches them into `app`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let listener = self.listen.bind().await?;
        accept_loop(listener, Arc::new(app), Transport::Plain).await
    }

    /// Accepts TLS connections, negotiating HTTP/2 or HTTP/1.1 over ALPN.
    #[cfg(feature = "tls")]
    pub async fn serve_tls(self, app: App, cert_file: &Path, key_file: &Path) -> Result<(), Error> {
        let acceptor = tls::acceptor(cert_file, key_file)?;
        let listener = self.listen.bind().await?;
        accept_loop(listener, Arc::new(app), Transport::Tls(acceptor)).await
    }
}

impl Listen {
    async fn bind(self) -> Result<TcpListener, Error> {
        match self {
            Self::Addr(addr) => Ok(TcpListener::bind(addr).await?),
            Self::Listener(listener) => Ok(listener),
        }
    }
}

async fn accept_loop(listener: TcpListener, app: Arc<App>, transport: Transport) -> Result<(), Error> {
    let local = listener.local_addr()?;
    info!(parent: app.span(), addr = %local, "serve");

    // JoinSet tracks every spawned connection task so we can wait for them
    // all to finish during graceful shutdown.
    let mut tasks = tokio::task::JoinSet::new();

    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            // Shutdown arms first: once asked to stop, queued connections
            // are not accepted anymore.
            biased;

            () = &mut signal => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                app.runtime().cancel();
                break;
            }

            () = app.runtime().root().cancelled() => {
                info!(in_flight = tasks.len(), "runtime cancelled, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let app = Arc::clone(&app);
                let transport = transport.clone();
                tasks.spawn(async move {
                    match transport {
                        Transport::Plain => serve_connection(stream, app, peer).await,
                        #[cfg(feature = "tls")]
                        Transport::Tls(acceptor) => match acceptor.accept(stream).await {
                            Ok(stream) => serve_connection(stream, app, peer).await,
                            Err(e) => warn!(%peer, "tls handshake failed: {e}"),
                        },
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    // Drain: wait for every in-flight connection to finish before we return.
    while tasks.join_next().await.is_some() {}

    info!(parent: app.span(), "stopped");
    Ok(())
}

/// Serves one connection until the peer closes it or shutdown asks it to
/// wind down.
async fn serve_connection<S>(stream: S, app: Arc<App>, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let svc = {
        let app = Arc::clone(&app);
        // Called once per request on the connection.
        service_fn(move |req| {
            let app = Arc::clone(&app);
            async move { Ok::<_, Infallible>(handle(&app, req).await) }
        })
    };

    // `auto::Builder` handles both HTTP/1.1 and HTTP/2, whatever the client
    // negotiates.
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        () = app.runtime().root().cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = res {
        error!(%peer, "connection error: {e}");
    }
}

/// Buffers the request body and hands the request to the app.
async fn handle(app: &App, req: hyper::Request<Body>) -> Response {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = %parts.uri.path(), "failed to read request body: {e}");
            return status_only(http::StatusCode::BAD_REQUEST);
        }
    };
    app.dispatch(http::Request::from_parts(parts, body)).await
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT**. On Windows only
/// Ctrl-C is available. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves: on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}

#[cfg(feature = "tls")]
mod tls {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::sync::Arc;

    use tokio_rustls::TlsAcceptor;
    use tokio_rustls::rustls::ServerConfig;

    use crate::error::Error;

    /// Loads a PEM certificate chain and private key into an acceptor.
    pub(super) fn acceptor(cert_file: &Path, key_file: &Path) -> Result<TlsAcceptor, Error> {
        let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_file)?))
            .collect::<Result<Vec<_>, _>>()?;
        let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_file)?))?
            .ok_or_else(|| Error::internal(format!("no private key in {}", key_file.display())))?;

        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| Error::internal(format!("tls config: {e}")).with_source(e))?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}
