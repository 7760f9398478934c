//! Admin HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use custos_authz::Custos;
use custos_config::ServerConfig;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::{ServerError, ServerResult};
use crate::routes::AdminApi;

/// Admin server.
pub struct AdminServer {
    /// Bind address.
    addr: String,
    /// Route handlers.
    api: Arc<AdminApi>,
}

impl AdminServer {
    /// Create a server for `custos` configured by `config`.
    pub fn new(custos: Custos, config: &ServerConfig) -> Self {
        Self {
            addr: config.http_addr.clone(),
            api: Arc::new(
                AdminApi::new(custos, config.service_name.as_str(), config.identity_header.clone())
                    .with_max_body_bytes(config.max_body_bytes),
            ),
        }
    }

    /// The route handlers.
    pub fn api(&self) -> &AdminApi {
        &self.api
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn run(self) -> ServerResult<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` completes.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr: SocketAddr = self
            .addr
            .parse()
            .map_err(|e| ServerError::config(format!("invalid listen address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::server(format!("failed to bind: {e}")))?;

        self.serve_with_shutdown(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    ///
    /// Connections in flight when `shutdown` fires are not awaited.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "custos admin server listening");

        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown signal received, stopping admin server");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let api = self.api.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let api = api.clone();
                    async move { Ok::<_, std::convert::Infallible>(api.handle(req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(peer = %peer_addr, "Connection error: {}", e);
                }
            });
        }
    }
}
