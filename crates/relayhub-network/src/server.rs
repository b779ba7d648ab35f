//! HTTP server for the relay API.
//!
//! Connections are served one at a time: accept, let hyper parse one
//! request, dispatch, write the response, close. Keep-alive is off, so each
//! connection carries exactly one exchange and the next accept waits until
//! it is done. The [`Router`] sits behind a single mutex and every request is
//! dispatched on tokio's blocking pool, since USB and sysfs I/O block.
//!
//! ```text
//!  accept ─► hyper http1 ─► spawn_blocking(router.handle) ─► hyper writes ─► close
//!    ▲                                                                         │
//!    └───────────────────────── unless /quit or shutdown signal ───────────────┘
//! ```
//!
//! Requests hyper cannot parse are answered by hyper itself (`400`).
//!
//! # Example Usage
//!
//! ```no_run
//! use relayhub_boards::{BoardStore, ServerConfig};
//! use relayhub_hardware::{DriverRegistry, ShadowCache};
//! use relayhub_network::{HttpServer, HttpServerConfig, Router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = DriverRegistry::new(ShadowCache::new());
//! let router = Router::new(registry, BoardStore::default(), ServerConfig::default());
//!
//! let config = HttpServerConfig {
//!     bind_addr: "127.0.0.1:8000".parse()?,
//! };
//! let server = HttpServer::bind(config, router).await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

use crate::html;
use crate::response::HttpResponse;
use crate::router::{Dispatch, Router};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use relayhub_boards::ServerConfig;
use relayhub_core::constants::DEFAULT_SERVER_PORT;
use std::convert::Infallible;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, trace, warn};

/// Largest request body read. Bodies are drained and ignored.
const MAX_BODY_LEN: usize = 4 * 1024;

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_SERVER_PORT)),
        }
    }
}

impl From<&ServerConfig> for HttpServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.socket_addr(),
        }
    }
}

/// Errors that can occur during HTTP server operations
#[derive(Debug, Error)]
pub enum HttpServerError {
    /// Failed to bind to address
    #[error("Failed to bind to {0}")]
    BindFailed(SocketAddr),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sequential HTTP server.
#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    router: Arc<Mutex<Router>>,
}

fn lock(router: &Mutex<Router>) -> MutexGuard<'_, Router> {
    router.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HttpServer {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError::BindFailed` if the address cannot be bound.
    pub async fn bind(config: HttpServerConfig, router: Router) -> Result<Self, HttpServerError> {
        let listener = TcpListener::bind(config.bind_addr).await.map_err(|e| {
            error!(addr = %config.bind_addr, error = %e, "Cannot bind HTTP server");
            HttpServerError::BindFailed(config.bind_addr)
        })?;

        info!(addr = %config.bind_addr, "HTTP server listening");

        Ok(Self {
            listener,
            router: Arc::new(Mutex::new(router)),
        })
    }

    /// Address the server is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, HttpServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until a `/quit` request.
    pub async fn run(self) -> Result<(), HttpServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until a `/quit` request or until `shutdown` completes.
    ///
    /// The router is shut down (shadow cache cleared) before returning.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), HttpServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };

            if self.serve_connection(stream, peer).await {
                break;
            }
        }

        lock(&self.router).shutdown();
        info!("HTTP server stopped");
        Ok(())
    }

    /// Serve one connection. Returns `true` when the server should stop.
    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr) -> bool {
        trace!(peer = %peer, "Connection accepted");

        let stop = Arc::new(AtomicBool::new(false));
        let service = service_fn(|request: Request<Incoming>| {
            let router = Arc::clone(&self.router);
            let stop = Arc::clone(&stop);
            async move {
                let dispatch = dispatch(router, request, peer).await;
                if dispatch.shutdown {
                    stop.store(true, Ordering::Release);
                }
                Ok::<_, Infallible>(dispatch.response.into_hyper())
            }
        });

        let connection = http1::Builder::new()
            .keep_alive(false)
            .title_case_headers(true)
            .serve_connection(TokioIo::new(stream), service);
        if let Err(e) = connection.await {
            debug!(peer = %peer, error = %e, "Connection ended with error");
        }

        stop.load(Ordering::Acquire)
    }
}

/// Drain the body, then run the router on the blocking pool.
async fn dispatch(
    router: Arc<Mutex<Router>>,
    request: Request<Incoming>,
    peer: SocketAddr,
) -> Dispatch {
    let (parts, body) = request.into_parts();
    match Limited::new(body, MAX_BODY_LEN).collect().await {
        Ok(body) => trace!(peer = %peer, len = body.to_bytes().len(), "Request body drained"),
        Err(e) => debug!(peer = %peer, error = %e, "Request body discarded"),
    }

    let method = parts.method;
    let path = parts.uri.path().to_string();
    match tokio::task::spawn_blocking(move || lock(&router).handle(&method, &path)).await {
        Ok(dispatch) => dispatch,
        Err(e) => {
            error!(peer = %peer, error = %e, "Request handler failed");
            Dispatch::from(HttpResponse::html(
                StatusCode::INTERNAL_SERVER_ERROR,
                html::error_page("internal error"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(
            HttpServerConfig::default().bind_addr,
            "0.0.0.0:8000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_config_from_server_options() {
        let options = ServerConfig {
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(HttpServerConfig::from(&options).bind_addr.port(), 8080);
    }

    #[test]
    fn test_error_display() {
        let addr: SocketAddr = "127.0.0.1:80".parse().unwrap();
        assert_eq!(
            HttpServerError::BindFailed(addr).to_string(),
            "Failed to bind to 127.0.0.1:80"
        );
    }
}
