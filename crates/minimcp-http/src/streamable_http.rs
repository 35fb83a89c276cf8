//! Smart streamable HTTP transport.
//!
//! Each POST runs its handler on a spawned task that reports, over one
//! ordered channel, every notification it sends followed by its terminal
//! outcome. The first event on that channel fixes the reply shape:
//!
//! - terminal outcome first: a plain `application/json` reply, no stream
//! - notification first: a `text/event-stream` reply that relays that
//!   notification, every later one, and finally the terminal response
//!
//! Because notifications and the outcome share a channel, the decision
//! cannot observe them out of order. Dropping the response (the client went
//! away) cancels the handler task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HeaderValue};
use http::{Request, Response, StatusCode};
use http_body::{Body, Frame};
use http_body_util::{BodyExt, StreamBody};
use minimcp_json_rpc::{ErrorKind, InvalidMessageError};
use minimcp_server::{HandleResult, MiniMcp, NotificationSink, Scope, SinkError};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};

use crate::McpBody;
use crate::plain_http::{BoxError, DEFAULT_MAX_BODY_SIZE, admit, json_response, reply};
use crate::protocol::TEXT_EVENT_STREAM;
use crate::sse::SseEvent;

/// Interval between keep-alive comments on an open stream
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Notifications buffered per request before the handler is backpressured
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

enum StreamEvent {
    Notification(String),
    Done(Result<HandleResult, InvalidMessageError>),
}

/// Notification sink feeding the per-request event channel
struct EventSink {
    events: mpsc::Sender<StreamEvent>,
}

#[async_trait]
impl NotificationSink for EventSink {
    async fn send(&self, message: String) -> Result<(), SinkError> {
        self.events
            .send(StreamEvent::Notification(message))
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// HTTP transport that upgrades to SSE only when a handler notifies
#[derive(Clone)]
pub struct StreamableHttpTransport {
    server: MiniMcp,
    max_body_size: usize,
    keep_alive_interval: Duration,
    channel_capacity: usize,
}

impl StreamableHttpTransport {
    pub fn new(server: MiniMcp) -> Self {
        Self {
            server,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Keep-alive period on open streams. Zero is raised to one millisecond.
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn server(&self) -> &MiniMcp {
        &self.server
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    /// Handle one POST
    pub async fn handle<B>(&self, req: Request<B>) -> Response<McpBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        self.handle_with_scope(req, None).await
    }

    /// Handle one POST, passing `scope` through to the handlers
    pub async fn handle_with_scope<B>(&self, req: Request<B>, scope: Option<Scope>) -> Response<McpBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let body = match admit(req, self.max_body_size, true).await {
            Ok(body) => body,
            Err(rejection) => return rejection,
        };

        let (events, mut rx) = mpsc::channel(self.channel_capacity);
        let token = CancellationToken::new();
        // Dropped with this future before the decision, or with the stream body after it.
        let guard = token.clone().drop_guard();
        tokio::spawn(run_handler(self.server.clone(), body, scope, events, token));

        match rx.recv().await {
            Some(StreamEvent::Done(outcome)) => {
                debug!("resolved without notifications; replying with a single JSON body");
                reply(outcome)
            }
            Some(StreamEvent::Notification(first)) => {
                debug!("first notification queued; upgrading to an event stream");
                self.event_stream(first, rx, guard)
            }
            None => {
                error!("handler task ended without an outcome");
                let failure = InvalidMessageError {
                    kind: ErrorKind::InternalError,
                    detail: "Handler task ended without an outcome".to_string(),
                    id: None,
                };
                json_response(StatusCode::INTERNAL_SERVER_ERROR, failure.to_json())
            }
        }
    }

    fn event_stream(
        &self,
        first: String,
        mut rx: mpsc::Receiver<StreamEvent>,
        guard: DropGuard,
    ) -> Response<McpBody> {
        let period = self.keep_alive_interval;

        let frames = async_stream::stream! {
            let _guard = guard;
            yield frame(SseEvent::Message(first));

            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let next = tokio::select! {
                    event = rx.recv() => Next::Event(event),
                    _ = ticks.tick() => Next::KeepAlive,
                };
                match next {
                    Next::KeepAlive => {
                        yield frame(SseEvent::KeepAlive);
                    }
                    Next::Event(Some(StreamEvent::Notification(message))) => {
                        yield frame(SseEvent::Message(message));
                    }
                    Next::Event(Some(StreamEvent::Done(outcome))) => {
                        if let Some(message) = final_message(outcome) {
                            yield frame(SseEvent::Message(message));
                        }
                        debug!("terminal response sent; closing event stream");
                        break;
                    }
                    Next::Event(None) => {
                        warn!("handler task ended mid-stream without an outcome");
                        break;
                    }
                }
            }
        };

        let mut response = Response::new(StreamBody::new(frames).boxed_unsync());
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_EVENT_STREAM));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        response
    }
}

enum Next {
    Event(Option<StreamEvent>),
    KeepAlive,
}

async fn run_handler(
    server: MiniMcp,
    body: Bytes,
    scope: Option<Scope>,
    events: mpsc::Sender<StreamEvent>,
    token: CancellationToken,
) {
    let sink: Arc<dyn NotificationSink> = Arc::new(EventSink {
        events: events.clone(),
    });
    let outcome = tokio::select! {
        outcome = server.handle_bytes(&body, Some(sink), scope) => outcome,
        _ = token.cancelled() => {
            debug!("client disconnected; abandoning in-flight request");
            return;
        }
    };
    if events.send(StreamEvent::Done(outcome)).await.is_err() {
        debug!("client disconnected before the reply was delivered");
    }
}

fn frame(event: SseEvent) -> Result<Frame<Bytes>, hyper::Error> {
    Ok(Frame::data(event.into_bytes()))
}

fn final_message(outcome: Result<HandleResult, InvalidMessageError>) -> Option<String> {
    match outcome {
        Ok(result) => result.into_text(),
        Err(err) => Some(err.to_json()),
    }
}
