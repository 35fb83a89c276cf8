//! Per-request execution context.
//!
//! A [`Context`] is created for each accepted message and dropped when its
//! handler returns or is cancelled. Handlers receive it as an argument; code
//! further down the call chain can reach it with [`Context::current`], which
//! reads a task-local bound only while the handler future is being polled.

use std::any::{Any, type_name};
use std::future::Future;
use std::sync::Arc;

use minimcp_json_rpc::{JsonRpcMessage, JsonRpcNotification, RequestId, RequestParams};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ContextError, ResponderError};
use crate::limiter::IdleHandle;
use crate::responder::Responder;

/// Caller-supplied value passed through `handle()` untouched, e.g. HTTP
/// headers or an authenticated principal.
pub type Scope = Arc<dyn Any + Send + Sync>;

tokio::task_local! {
    static CURRENT: Context;
}

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    message: JsonRpcMessage,
    scope: Option<Scope>,
    responder: Responder,
    idle: IdleHandle,
    cancellation: CancellationToken,
}

impl Context {
    pub(crate) fn new(
        message: JsonRpcMessage,
        scope: Option<Scope>,
        responder: Responder,
        idle: IdleHandle,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                message,
                scope,
                responder,
                idle,
                cancellation,
            }),
        }
    }

    /// The context of the handler invocation currently running on this task.
    pub fn current() -> Result<Context, ContextError> {
        CURRENT
            .try_with(|ctx| ctx.clone())
            .map_err(|_| ContextError::NoContext)
    }

    /// Run `fut` with this context bound as current. The binding ends when
    /// `fut` completes or is dropped.
    pub(crate) async fn bind<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    pub fn message(&self) -> &JsonRpcMessage {
        &self.inner.message
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.inner.message.id()
    }

    pub fn method(&self) -> &str {
        self.inner.message.method().unwrap_or_default()
    }

    pub fn params(&self) -> Option<&RequestParams> {
        match &self.inner.message {
            JsonRpcMessage::Request(r) => r.params.as_ref(),
            JsonRpcMessage::Notification(n) => n.params.as_ref(),
            _ => None,
        }
    }

    /// The raw scope, if the caller supplied one
    pub fn raw_scope(&self) -> Option<&Scope> {
        self.inner.scope.as_ref()
    }

    /// The scope downcast to the type the transport supplied.
    pub fn scope<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ContextError> {
        self.inner
            .scope
            .clone()
            .and_then(|scope| scope.downcast::<T>().ok())
            .ok_or(ContextError::ScopeUnavailable(type_name::<T>()))
    }

    pub fn responder(&self) -> &Responder {
        &self.inner.responder
    }

    /// Restart the idle window. Returns false once the watchdog has fired.
    pub fn reset_idle(&self) -> bool {
        self.inner.idle.reset()
    }

    pub fn idle_handle(&self) -> &IdleHandle {
        &self.inner.idle
    }

    /// Cancelled when the watchdog fires or the request is abandoned.
    /// Work spawned off the handler task should watch this token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    pub async fn notify(
        &self,
        method: impl Into<String>,
        params: Value,
    ) -> Result<bool, ResponderError> {
        self.inner
            .responder
            .notify(JsonRpcNotification::with_value(method, params))
            .await
    }

    pub async fn report_progress(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    ) -> Result<bool, ResponderError> {
        self.inner
            .responder
            .report_progress(progress, total, message)
            .await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id())
            .field("method", &self.method())
            .field("has_scope", &self.inner.scope.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::Limiter;
    use minimcp_json_rpc::JsonRpcRequest;
    use std::time::Duration;

    async fn context(scope: Option<Scope>) -> Context {
        let limiter = Limiter::new(1, Duration::from_secs(30));
        let idle = limiter.acquire().await.unwrap().idle_handle();
        let id = RequestId::from(1);
        Context::new(
            JsonRpcMessage::Request(JsonRpcRequest::new(id.clone(), "ping", None)),
            scope,
            Responder::new(Some(id), None, None, idle.clone()),
            idle,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_current_outside_handler_is_an_error() {
        assert_eq!(Context::current().unwrap_err(), ContextError::NoContext);
    }

    #[tokio::test]
    async fn test_current_is_bound_only_inside() {
        let ctx = context(None).await;
        let seen = ctx
            .clone()
            .bind(async { Context::current().map(|c| c.method().to_string()) })
            .await;
        assert_eq!(seen.unwrap(), "ping");
        assert!(Context::current().is_err());
    }

    #[tokio::test]
    async fn test_scope_downcast() {
        #[derive(Debug, PartialEq)]
        struct Principal(&'static str);

        let ctx = context(Some(Arc::new(Principal("alice")))).await;
        assert_eq!(*ctx.scope::<Principal>().unwrap(), Principal("alice"));
        assert!(matches!(
            ctx.scope::<String>(),
            Err(ContextError::ScopeUnavailable(_))
        ));

        let bare = context(None).await;
        assert!(bare.scope::<Principal>().is_err());
    }
}
