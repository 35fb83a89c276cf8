//! HTTP MCP Server: hyper accept loop, path routing and CORS

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use minimcp_server::MiniMcp;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::cors::CorsLayer;
use crate::plain_http::{BoxError, DEFAULT_MAX_BODY_SIZE, HttpTransport, empty_response};
use crate::streamable_http::{DEFAULT_KEEP_ALIVE_INTERVAL, StreamableHttpTransport};
use crate::{HttpMcpError, McpBody, Result};

/// Configuration for the HTTP MCP server
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path for the MCP endpoint
    pub mcp_path: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Upgrade to SSE when a handler notifies; plain JSON replies otherwise
    pub streaming: bool,
    /// Keep-alive period on open event streams
    pub keep_alive_interval: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            mcp_path: "/mcp".to_string(),
            enable_cors: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            streaming: true,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }
}

#[derive(Clone)]
enum Transport {
    Plain(HttpTransport),
    Streamable(StreamableHttpTransport),
}

/// HTTP MCP Server
#[derive(Clone)]
pub struct HttpMcpServer {
    config: Arc<HttpServerConfig>,
    transport: Transport,
}

impl HttpMcpServer {
    /// Create a new builder around a built runtime
    pub fn builder(server: MiniMcp) -> HttpMcpServerBuilder {
        HttpMcpServerBuilder::new(server)
    }

    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until the process exits
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let local = listener.local_addr()?;
        info!("HTTP MCP server listening on {}", local);
        info!(
            "MCP endpoint available at: {} ({})",
            self.config.mcp_path,
            if self.config.streaming {
                "streamable"
            } else {
                "plain JSON"
            }
        );

        tokio::pin!(shutdown);
        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("HTTP MCP server on {} shutting down", local);
                    return Ok(());
                }
            };
            debug!("New connection from {}", peer_addr);

            let server = self.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.route(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    // Clients closing mid-response are routine
                    if err.is_incomplete_message() || err.is_canceled() {
                        debug!("Client {} disconnected: {}", peer_addr, err);
                    } else {
                        error!("Error serving connection from {}: {}", peer_addr, err);
                    }
                }
            });
        }
    }

    /// Route one request: the MCP path goes to the transport, OPTIONS is the
    /// CORS preflight when enabled, anything else is 404.
    pub async fn route<B>(&self, req: Request<B>) -> Response<McpBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let mut response = if req.uri().path() != self.config.mcp_path {
            debug!(path = req.uri().path(), "no route");
            empty_response(StatusCode::NOT_FOUND)
        } else if self.config.enable_cors && req.method() == Method::OPTIONS {
            empty_response(StatusCode::NO_CONTENT)
        } else {
            match &self.transport {
                Transport::Plain(transport) => transport.handle(req).await,
                Transport::Streamable(transport) => transport.handle(req).await,
            }
        };

        if self.config.enable_cors {
            CorsLayer::apply_cors_headers(response.headers_mut());
        }
        response
    }
}

/// Builder for [`HttpMcpServer`]
pub struct HttpMcpServerBuilder {
    server: MiniMcp,
    config: HttpServerConfig,
}

impl HttpMcpServerBuilder {
    pub fn new(server: MiniMcp) -> Self {
        Self {
            server,
            config: HttpServerConfig::default(),
        }
    }

    pub fn config(mut self, config: HttpServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn mcp_path(mut self, path: impl Into<String>) -> Self {
        self.config.mcp_path = path.into();
        self
    }

    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Choose the smart streamable transport (default) or plain JSON replies
    pub fn streaming(mut self, enable: bool) -> Self {
        self.config.streaming = enable;
        self
    }

    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.config.keep_alive_interval = interval;
        self
    }

    pub fn build(self) -> Result<HttpMcpServer> {
        let config = self.config;
        if !config.mcp_path.starts_with('/') {
            return Err(HttpMcpError::Configuration(format!(
                "mcp_path must start with '/': {:?}",
                config.mcp_path
            )));
        }
        if config.max_body_size == 0 {
            return Err(HttpMcpError::Configuration(
                "max_body_size must be greater than zero".to_string(),
            ));
        }
        if config.streaming && config.keep_alive_interval.is_zero() {
            return Err(HttpMcpError::Configuration(
                "keep_alive_interval must be greater than zero".to_string(),
            ));
        }

        let transport = if config.streaming {
            Transport::Streamable(
                StreamableHttpTransport::new(self.server)
                    .with_max_body_size(config.max_body_size)
                    .with_keep_alive_interval(config.keep_alive_interval),
            )
        } else {
            Transport::Plain(
                HttpTransport::new(self.server).with_max_body_size(config.max_body_size),
            )
        };

        Ok(HttpMcpServer {
            config: Arc::new(config),
            transport,
        })
    }
}
