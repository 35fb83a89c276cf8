//! Per-request responder.
//!
//! A [`Responder`] mediates everything one request sends back: zero or more
//! notifications pushed through the transport's [`NotificationSink`] while
//! the handler runs, then exactly one terminal outcome. Sends and
//! termination are serialized on one lock, so a transport always observes
//! every notification before the terminal response.

use std::sync::Arc;

use async_trait::async_trait;
use minimcp_json_rpc::{
    ErrorKind, JsonRpcError, JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification,
    JsonRpcResponse, RequestId, encode,
};
use minimcp_protocol::methods::NOTIFICATION_PROGRESS;
use minimcp_protocol::{ProgressNotificationParams, ProgressToken};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::error::{ResponderError, SinkError};
use crate::limiter::IdleHandle;

/// Transport-provided channel for server to client notifications.
/// Receives one encoded JSON-RPC message per call.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: String) -> Result<(), SinkError>;
}

#[async_trait]
impl NotificationSink for mpsc::Sender<String> {
    async fn send(&self, message: String) -> Result<(), SinkError> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl NotificationSink for mpsc::UnboundedSender<String> {
    async fn send(&self, message: String) -> Result<(), SinkError> {
        mpsc::UnboundedSender::send(self, message).map_err(|_| SinkError::Closed)
    }
}

#[derive(Debug, Default)]
struct ResponderState {
    terminated: bool,
    sent: usize,
}

/// Outgoing side of one in-flight request
#[derive(Clone)]
pub struct Responder {
    inner: Arc<ResponderInner>,
}

struct ResponderInner {
    request_id: Option<RequestId>,
    progress_token: Option<ProgressToken>,
    sink: Option<Arc<dyn NotificationSink>>,
    idle: IdleHandle,
    state: Mutex<ResponderState>,
}

impl Responder {
    pub fn new(
        request_id: Option<RequestId>,
        progress_token: Option<ProgressToken>,
        sink: Option<Arc<dyn NotificationSink>>,
        idle: IdleHandle,
    ) -> Self {
        Self {
            inner: Arc::new(ResponderInner {
                request_id,
                progress_token,
                sink,
                idle,
                state: Mutex::new(ResponderState::default()),
            }),
        }
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.inner.request_id.as_ref()
    }

    pub fn progress_token(&self) -> Option<&ProgressToken> {
        self.inner.progress_token.as_ref()
    }

    /// Whether notifications can reach the client at all
    pub fn can_notify(&self) -> bool {
        self.inner.sink.is_some()
    }

    /// Number of notifications delivered to the sink so far
    pub async fn sent(&self) -> usize {
        self.inner.state.lock().await.sent
    }

    pub async fn is_terminated(&self) -> bool {
        self.inner.state.lock().await.terminated
    }

    /// Push a notification to the transport now.
    ///
    /// Returns `Ok(false)` when the transport is unidirectional and the
    /// notification was dropped. Fails with [`ResponderError::Terminated`]
    /// once the terminal outcome has been produced. A delivered
    /// notification resets the idle watchdog.
    pub async fn notify(&self, notification: JsonRpcNotification) -> Result<bool, ResponderError> {
        let mut state = self.inner.state.lock().await;
        if state.terminated {
            return Err(ResponderError::Terminated);
        }
        let Some(sink) = &self.inner.sink else {
            debug!(
                method = %notification.method,
                "No notification sink; dropping notification"
            );
            return Ok(false);
        };

        let text = encode(&JsonRpcMessage::Notification(notification))?;
        sink.send(text).await?;
        state.sent += 1;
        self.inner.idle.reset();
        Ok(true)
    }

    /// Send `notifications/progress` for this request.
    ///
    /// Returns `Ok(false)` when the client did not ask for progress
    /// (no `_meta.progressToken`) or the transport cannot carry it.
    pub async fn report_progress(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    ) -> Result<bool, ResponderError> {
        let Some(token) = self.inner.progress_token.clone() else {
            warn!("report_progress called but the request carries no progress token");
            return Ok(false);
        };
        let params = ProgressNotificationParams {
            progress_token: token,
            progress,
            total,
            message,
        };
        let params = serde_json::to_value(params)
            .map_err(|e| ResponderError::Encode(e.into()))?;
        self.notify(JsonRpcNotification::with_value(NOTIFICATION_PROGRESS, params))
            .await
    }

    /// Terminal success. May be called once.
    pub async fn resolve(&self, result: Value) -> Result<JsonRpcMessage, ResponderError> {
        let id = self.terminate().await?;
        Ok(JsonRpcMessage::Response(JsonRpcResponse::new(id, result)))
    }

    /// Terminal failure. May be called once.
    pub async fn reject(
        &self,
        kind: ErrorKind,
        detail: Option<String>,
    ) -> Result<JsonRpcMessage, ResponderError> {
        let id = self.terminate().await?;
        let error = match detail {
            Some(detail) => JsonRpcErrorObject::with_detail(kind, detail),
            None => JsonRpcErrorObject::new(kind),
        };
        Ok(JsonRpcMessage::Error(JsonRpcError::new(Some(id), error)))
    }

    async fn terminate(&self) -> Result<RequestId, ResponderError> {
        let mut state = self.inner.state.lock().await;
        if state.terminated {
            return Err(ResponderError::AlreadyTerminated);
        }
        let id = self
            .inner
            .request_id
            .clone()
            .ok_or(ResponderError::NoRequestId)?;
        state.terminated = true;
        Ok(id)
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("request_id", &self.inner.request_id)
            .field("can_notify", &self.can_notify())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::Limiter;
    use serde_json::json;
    use std::time::Duration;

    async fn idle() -> IdleHandle {
        let limiter = Limiter::new(1, Duration::from_secs(30));
        let guard = limiter.acquire().await.unwrap();
        guard.idle_handle()
    }

    #[tokio::test]
    async fn test_notifications_precede_terminal_outcome() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let responder = Responder::new(
            Some(RequestId::from(1)),
            Some(ProgressToken::Number(7)),
            Some(Arc::new(tx)),
            idle().await,
        );

        assert!(responder.report_progress(1.0, Some(2.0), None).await.unwrap());
        assert!(
            responder
                .notify(JsonRpcNotification::with_value("notifications/message", json!({"level": "info"})))
                .await
                .unwrap()
        );
        let terminal = responder.resolve(json!({"ok": true})).await.unwrap();

        let first: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["method"], "notifications/progress");
        assert_eq!(first["params"]["progressToken"], 7);
        let second: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(second["method"], "notifications/message");
        assert!(matches!(terminal, JsonRpcMessage::Response(_)));
        assert_eq!(responder.sent().await, 2);
    }

    #[tokio::test]
    async fn test_terminates_exactly_once() {
        let responder = Responder::new(Some(RequestId::from("a")), None, None, idle().await);
        responder.resolve(json!({})).await.unwrap();

        assert!(matches!(
            responder.reject(ErrorKind::InternalError, None).await,
            Err(ResponderError::AlreadyTerminated)
        ));
        assert!(matches!(
            responder
                .notify(JsonRpcNotification::new("notifications/message", None))
                .await,
            Err(ResponderError::Terminated)
        ));
    }

    #[tokio::test]
    async fn test_without_sink_notifications_are_dropped() {
        let responder = Responder::new(Some(RequestId::from(3)), None, None, idle().await);
        assert!(
            !responder
                .notify(JsonRpcNotification::new("notifications/message", None))
                .await
                .unwrap()
        );
        // No progress token on the request.
        assert!(!responder.report_progress(0.5, None, None).await.unwrap());

        let outcome = responder
            .reject(ErrorKind::InvalidParams, Some("bad".into()))
            .await
            .unwrap();
        let JsonRpcMessage::Error(error) = outcome else {
            panic!("expected an error envelope");
        };
        assert_eq!(error.id, Some(RequestId::from(3)));
        assert_eq!(error.error.code, -32602);
    }

    #[tokio::test]
    async fn test_closed_sink_surfaces_error() {
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(rx);
        let responder = Responder::new(Some(RequestId::from(1)), None, Some(Arc::new(tx)), idle().await);
        let err = responder
            .notify(JsonRpcNotification::new("notifications/message", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ResponderError::Sink(SinkError::Closed)));
    }
}
