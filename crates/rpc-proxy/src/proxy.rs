//! Core proxy server implementation

use crate::{error::ProxyError, forward::Forwarder, intercept};
use axum::{
    extract::{Request, State},
    response::Response,
    Router,
};
use eyre::Result;
use reqwest::Url;
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Builder for configuring ProxyServer with a fluent API
#[derive(Debug, Clone, Default)]
pub struct ProxyServerBuilder {
    upstream_url: Option<String>,
}

impl ProxyServerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upstream RPC URL every request is forwarded to
    pub fn upstream_url<S: Into<String>>(mut self, url: S) -> Self {
        self.upstream_url = Some(url.into());
        self
    }

    /// Build the ProxyServer with the configured settings
    ///
    /// Fails when no upstream URL was given or it is not an absolute
    /// `http`/`https` URL.
    pub fn build(self) -> Result<ProxyServer> {
        let raw = self.upstream_url.ok_or_else(|| eyre::eyre!("upstream RPC URL is required"))?;
        let upstream = Url::parse(&raw)?;

        if !matches!(upstream.scheme(), "http" | "https") || upstream.host_str().is_none() {
            return Err(eyre::eyre!("unsupported upstream RPC URL: {raw}"));
        }

        ProxyServer::new(upstream)
    }
}

/// Reverse proxy in front of a single JSON-RPC node
///
/// Every method and path is forwarded. Responses to batches containing
/// `eth_getBlockByNumber` have null-sender transactions normalized, see
/// [`crate::rewrite`].
///
/// Use ProxyServerBuilder for configuration:
/// ```no_run
/// # use telos_rpc_proxy::proxy::ProxyServerBuilder;
/// # async fn example() -> eyre::Result<()> {
/// let proxy = ProxyServerBuilder::new().upstream_url("https://rpc.telos.net/evm").build()?;
/// proxy.serve("0.0.0.0:8545".parse()?).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProxyServer {
    /// Upstream transport shared by all requests
    pub forwarder: Arc<Forwarder>,
}

#[derive(Clone)]
struct AppState {
    proxy: ProxyServer,
}

impl ProxyServer {
    /// Creates a new proxy server forwarding to `upstream`
    fn new(upstream: Url) -> Result<Self> {
        info!("Telos RPC Proxy upstream: {upstream}");

        let forwarder = Arc::new(Forwarder::new(upstream)?);

        Ok(Self { forwarder })
    }

    /// Returns the configured upstream URL
    pub fn upstream(&self) -> &Url {
        self.forwarder.upstream()
    }

    /// Builds the axum router serving every method and path
    pub fn router(self) -> Router {
        Router::new()
            .fallback(handle_proxy)
            .layer(TraceLayer::new_for_http())
            .with_state(AppState { proxy: self })
    }

    /// Starts the proxy server listening on the specified address
    ///
    /// Runs until the server fails; see [`ProxyServer::serve_with_shutdown`]
    /// for a stoppable server.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves
    ///
    /// In-flight requests are allowed to finish before returning.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Telos RPC Proxy listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router()).with_graceful_shutdown(shutdown).await?;

        info!("Telos RPC Proxy stopped");
        Ok(())
    }
}

async fn handle_proxy(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ProxyError> {
    intercept::round_trip(&state.proxy.forwarder, request).await
}
