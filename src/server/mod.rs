//! HTTP server
//!
//! Accepts connections on a bound listener and serves each one on its own
//! task with hyper's HTTP/1.1 implementation. Every request passes through the
//! correlation middleware before it reaches the router.
//!
//! Shutdown is graceful: once the shutdown future resolves (Ctrl-C or SIGTERM
//! for [`Server::run`]) the listener is closed and in-flight connections are
//! given [`DRAIN_TIMEOUT`] to finish.

use crate::handlers::{self, AppState};
use crate::middleware;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// How long in-flight connections may take to finish after shutdown starts
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// HTTP server bound to a local address
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind to `address`
    ///
    /// Port 0 asks the OS for a free port; see [`Server::local_addr`].
    pub async fn bind(address: &str, state: Arc<AppState>) -> Result<Self, ServerError> {
        let addr = parse_address(address)?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!(address = %local_addr, "Server bound");

        Ok(Self {
            state,
            listener,
            local_addr,
        })
    }

    /// The address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves, then drain open connections
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let state = Arc::clone(&self.state);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move {
                            let response = middleware::track(req, Some(peer), |req| {
                                handlers::route(state, req)
                            })
                            .await;
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let conn = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn);

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            debug!(peer = %peer, error = %e, "Connection closed with error");
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, draining connections");
                    break;
                }
            }
        }

        drop(self.listener);

        tokio::select! {
            _ = graceful.shutdown() => {
                info!("All connections closed");
            }
            _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
                warn!(timeout = ?DRAIN_TIMEOUT, "Timed out waiting for connections to close");
            }
        }

        Ok(())
    }
}

fn parse_address(address: &str) -> Result<SocketAddr, ServerError> {
    address
        .parse()
        .map_err(|e| ServerError::BindError(format!("Invalid address {}: {}", address, e)))
}

/// Resolve on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("127.0.0.1:8080").unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_parse_invalid_address() {
        assert!(matches!(
            parse_address("invalid"),
            Err(ServerError::BindError(_))
        ));
        assert!(parse_address(":8080").is_err());
    }
}
