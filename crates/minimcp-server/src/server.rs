//! The dispatcher.
//!
//! [`MiniMcp::handle`] is the whole transport-facing surface: raw message in,
//! raw response (or [`HandleResult::NoMessage`]) out. Each request runs
//! under a [`Limiter`] slot with its own [`Context`] and [`Responder`], and
//! every failure is classified here, never in a transport.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use minimcp_json_rpc::{
    Decoded, ErrorKind, InvalidMessageError, JsonRpcError, JsonRpcErrorObject, JsonRpcMessage,
    JsonRpcNotification, JsonRpcRequest, RequestId, RequestParams, code_to_http_status, decode,
    decode_bytes, encode,
};
use minimcp_protocol::ProgressToken;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::builder::{McpServerBuilder, ServerConfig};
use crate::context::{Context, Scope};
use crate::error::{McpError, McpResult};
use crate::handlers::McpHandler;
use crate::limiter::{IdleHandle, Limiter};
use crate::responder::{NotificationSink, Responder};

/// Outcome of [`MiniMcp::handle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleResult {
    /// A success envelope, or a batch reply array
    Message(String),
    /// An error envelope and its JSON-RPC code
    Error { message: String, code: i64 },
    /// The input held only notifications; nothing is sent back
    NoMessage,
}

impl HandleResult {
    /// Encoded reply, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            HandleResult::Message(text) | HandleResult::Error { message: text, .. } => Some(text),
            HandleResult::NoMessage => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            HandleResult::Message(text) | HandleResult::Error { message: text, .. } => Some(text),
            HandleResult::NoMessage => None,
        }
    }

    /// HTTP status a plain (non-streamed) reply should carry
    pub fn http_status(&self) -> u16 {
        match self {
            HandleResult::Message(_) => 200,
            HandleResult::Error { code, .. } => code_to_http_status(*code),
            HandleResult::NoMessage => 202,
        }
    }
}

/// Per-request execution states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Accepted,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
    Released,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Logs state transitions of one message. Dropping it before a terminal
/// state was reached means the caller abandoned the request.
struct Lifecycle {
    id: Option<RequestId>,
    method: String,
    state: RequestState,
}

impl Lifecycle {
    fn accept(id: Option<RequestId>, method: &str) -> Self {
        let lifecycle = Self {
            id,
            method: method.to_string(),
            state: RequestState::Accepted,
        };
        lifecycle.log();
        lifecycle
    }

    fn transition(&mut self, next: RequestState) {
        self.state = next;
        self.log();
    }

    fn log(&self) {
        match &self.id {
            Some(id) => debug!(request_id = %id, method = %self.method, state = %self.state, "request"),
            None => debug!(method = %self.method, state = %self.state, "notification"),
        }
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if matches!(self.state, RequestState::Accepted | RequestState::Running) {
            self.transition(RequestState::Cancelled);
        }
        self.transition(RequestState::Released);
    }
}

/// Stateless MCP server. Cheap to clone; all clones share one limiter and
/// one immutable method table.
#[derive(Clone)]
pub struct MiniMcp {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    limiter: Limiter,
    requests: HashMap<&'static str, Arc<dyn McpHandler>>,
    notifications: HashMap<&'static str, Arc<dyn McpHandler>>,
}

impl MiniMcp {
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ServerConfig,
        limiter: Limiter,
        requests: HashMap<&'static str, Arc<dyn McpHandler>>,
        notifications: HashMap<&'static str, Arc<dyn McpHandler>>,
    ) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                limiter,
                requests,
                notifications,
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn limiter(&self) -> &Limiter {
        &self.inner.limiter
    }

    /// Handle one raw message (or batch).
    ///
    /// `send` carries notifications back while the handler runs; without it
    /// notifications are dropped. `scope` is passed to handlers untouched.
    /// Envelope-level decode failures are returned as [`InvalidMessageError`]
    /// for the transport to present.
    pub async fn handle(
        &self,
        message: &str,
        send: Option<Arc<dyn NotificationSink>>,
        scope: Option<Scope>,
    ) -> Result<HandleResult, InvalidMessageError> {
        let decoded = decode(message)?;
        Ok(self.dispatch(decoded, send, scope).await)
    }

    /// [`handle`](Self::handle) for raw bytes; invalid UTF-8 is a parse error.
    pub async fn handle_bytes(
        &self,
        message: &[u8],
        send: Option<Arc<dyn NotificationSink>>,
        scope: Option<Scope>,
    ) -> Result<HandleResult, InvalidMessageError> {
        let decoded = decode_bytes(message)?;
        Ok(self.dispatch(decoded, send, scope).await)
    }

    async fn dispatch(
        &self,
        decoded: Decoded,
        send: Option<Arc<dyn NotificationSink>>,
        scope: Option<Scope>,
    ) -> HandleResult {
        match decoded {
            Decoded::Single(message) => match self.handle_message(message, send, scope).await {
                Some(reply) => finish(&reply),
                None => HandleResult::NoMessage,
            },
            Decoded::Batch(items) => {
                let replies = join_all(items.into_iter().map(|item| {
                    let send = send.clone();
                    let scope = scope.clone();
                    async move {
                        match item {
                            Ok(message) => self.handle_message(message, send, scope).await,
                            Err(invalid) => {
                                warn!("Invalid batch element: {}", invalid);
                                Some(JsonRpcMessage::Error(invalid.to_response()))
                            }
                        }
                    }
                }))
                .await;

                let replies: Vec<JsonRpcMessage> = replies.into_iter().flatten().collect();
                if replies.is_empty() {
                    return HandleResult::NoMessage;
                }
                match encode(&replies) {
                    Ok(text) => HandleResult::Message(text),
                    Err(e) => {
                        error!("Failed to encode batch reply: {}", e);
                        encode_failure(None, e.to_string())
                    }
                }
            }
        }
    }

    async fn handle_message(
        &self,
        message: JsonRpcMessage,
        send: Option<Arc<dyn NotificationSink>>,
        scope: Option<Scope>,
    ) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => {
                Some(self.handle_request(request, send, scope).await)
            }
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification, scope).await;
                None
            }
            // The inbound decoder only yields requests and notifications.
            other => Some(JsonRpcMessage::Error(JsonRpcError::new(
                other.id().cloned(),
                JsonRpcErrorObject::new(ErrorKind::InvalidRequest),
            ))),
        }
    }

    async fn handle_request(
        &self,
        request: JsonRpcRequest,
        send: Option<Arc<dyn NotificationSink>>,
        scope: Option<Scope>,
    ) -> JsonRpcMessage {
        let id = request.id.clone();
        let method = request.method.clone();
        // Locals drop in reverse: token, then slot, then the `Released` log line.
        let mut lifecycle = Lifecycle::accept(Some(id.clone()), &method);

        let guard = match self.inner.limiter.acquire().await {
            Ok(guard) => guard,
            Err(e) => {
                lifecycle.transition(RequestState::Failed);
                return JsonRpcMessage::Error(JsonRpcError::new(Some(id), e.to_error_object()));
            }
        };
        let idle = guard.idle_handle();
        let cancellation = CancellationToken::new();
        let _cancel_on_exit = cancellation.clone().drop_guard();

        let params = request.params.as_ref().map(RequestParams::to_value);
        let progress_token = request
            .params
            .as_ref()
            .and_then(RequestParams::progress_token)
            .and_then(|token| serde_json::from_value::<ProgressToken>(token.clone()).ok());
        let responder = Responder::new(Some(id.clone()), progress_token, send, idle.clone());
        let ctx = Context::new(
            JsonRpcMessage::Request(request),
            scope,
            responder.clone(),
            idle.clone(),
            cancellation.clone(),
        );

        lifecycle.transition(RequestState::Running);
        let handler = self.inner.requests.get(method.as_str()).cloned();
        let outcome = execute(handler, &method, params, ctx, &idle, &cancellation).await;

        lifecycle.transition(match &outcome {
            Ok(_) => RequestState::Completed,
            Err(McpError::Timeout(_)) => RequestState::TimedOut,
            Err(_) => RequestState::Failed,
        });

        let terminal = match outcome {
            Ok(result) => responder.resolve(result).await,
            Err(e) => {
                match e.kind() {
                    ErrorKind::InternalError => error!("Request {} ({}) failed: {}", id, method, e),
                    _ => warn!("Request {} ({}) failed: {}", id, method, e),
                }
                responder.reject(e.kind(), e.detail()).await
            }
        };

        terminal.unwrap_or_else(|e| {
            error!("Request {} ({}): {}", id, method, e);
            JsonRpcMessage::Error(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorObject::with_detail(ErrorKind::InternalError, e.to_string()),
            ))
        })
    }

    /// Run a notification handler if one exists. Never produces a reply;
    /// failures are only logged.
    async fn handle_notification(&self, notification: JsonRpcNotification, scope: Option<Scope>) {
        let Some(handler) = self
            .inner
            .notifications
            .get(notification.method.as_str())
            .cloned()
        else {
            debug!("No handler for notification {}", notification.method);
            return;
        };
        let method = notification.method.clone();
        let mut lifecycle = Lifecycle::accept(None, &method);

        let guard = match self.inner.limiter.acquire().await {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Dropping notification {}: {}", method, e);
                lifecycle.transition(RequestState::Failed);
                return;
            }
        };
        let idle = guard.idle_handle();
        let cancellation = CancellationToken::new();
        let _cancel_on_exit = cancellation.clone().drop_guard();

        let params = notification.params.as_ref().map(RequestParams::to_value);
        let ctx = Context::new(
            JsonRpcMessage::Notification(notification),
            scope,
            Responder::new(None, None, None, idle.clone()),
            idle.clone(),
            cancellation.clone(),
        );

        lifecycle.transition(RequestState::Running);
        match execute(Some(handler), &method, params, ctx, &idle, &cancellation).await {
            Ok(_) => lifecycle.transition(RequestState::Completed),
            Err(e) => {
                warn!("Notification handler for {} failed: {}", method, e);
                lifecycle.transition(match e {
                    McpError::Timeout(_) => RequestState::TimedOut,
                    _ => RequestState::Failed,
                });
            }
        }
    }
}

/// Invoke `handler` with `ctx` bound as current, racing it against the idle
/// watchdog. Panics are caught and reported as internal errors.
async fn execute(
    handler: Option<Arc<dyn McpHandler>>,
    method: &str,
    params: Option<Value>,
    ctx: Context,
    idle: &IdleHandle,
    cancellation: &CancellationToken,
) -> McpResult<Value> {
    let Some(handler) = handler else {
        return Err(McpError::MethodNotFound(method.to_string()));
    };

    let invocation = AssertUnwindSafe(ctx.clone().bind(handler.handle(params, ctx))).catch_unwind();

    tokio::select! {
        biased;
        result = invocation => result.unwrap_or_else(|panic| {
            Err(McpError::internal(format!("Handler panicked: {}", panic_message(&*panic))))
        }),
        _ = idle.expired() => {
            cancellation.cancel();
            Err(McpError::Timeout(idle.timeout()))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn finish(reply: &JsonRpcMessage) -> HandleResult {
    match encode(reply) {
        Ok(text) => match reply {
            JsonRpcMessage::Error(e) => HandleResult::Error {
                message: text,
                code: e.error.code,
            },
            _ => HandleResult::Message(text),
        },
        Err(e) => {
            error!("Failed to encode reply: {}", e);
            encode_failure(reply.id().cloned(), e.to_string())
        }
    }
}

fn encode_failure(id: Option<RequestId>, detail: String) -> HandleResult {
    let error = JsonRpcError::new(
        id,
        JsonRpcErrorObject::with_detail(ErrorKind::InternalError, detail),
    );
    let message = encode(&error).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
            .to_string()
    });
    HandleResult::Error {
        message,
        code: ErrorKind::InternalError.code(),
    }
}
