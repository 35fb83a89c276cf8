//! Plain HTTP transport: one POST in, one `application/json` reply out.
//!
//! The request checks and reply mapping here are shared with the
//! streamable transport.

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use minimcp_json_rpc::InvalidMessageError;
use minimcp_server::{HandleResult, MiniMcp, Scope};
use tracing::{debug, warn};

use crate::McpBody;
use crate::protocol::{
    APPLICATION_JSON, TEXT_EVENT_STREAM, accepts, extract_protocol_version, is_initialize,
    is_json_content,
};

/// Largest request body accepted by default (1 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Boxed error type of request bodies the transports accept
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// HTTP transport that never streams. Notifications sent by handlers are
/// dropped; only the terminal reply reaches the client.
#[derive(Clone)]
pub struct HttpTransport {
    server: MiniMcp,
    max_body_size: usize,
}

impl HttpTransport {
    pub fn new(server: MiniMcp) -> Self {
        Self {
            server,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn server(&self) -> &MiniMcp {
        &self.server
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
        let body = match admit(req, self.max_body_size, false).await {
            Ok(body) => body,
            Err(rejection) => return rejection,
        };
        reply(self.server.handle_bytes(&body, None, scope).await)
    }
}

/// Validate method and headers, then read the body.
///
/// `streaming` additionally requires the client to accept `text/event-stream`.
/// On failure the returned response is ready to send.
pub(crate) async fn admit<B>(
    req: Request<B>,
    max_body_size: usize,
    streaming: bool,
) -> Result<Bytes, Response<McpBody>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();

    if parts.method != Method::POST {
        debug!(method = %parts.method, "rejecting non-POST request");
        let mut response = reject(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method {} not allowed; use POST", parts.method),
        );
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("POST"));
        return Err(response);
    }

    let accepts_json = accepts(&parts.headers, APPLICATION_JSON);
    if !accepts_json || (streaming && !accepts(&parts.headers, TEXT_EVENT_STREAM)) {
        let wanted = if streaming {
            "application/json and text/event-stream"
        } else {
            "application/json"
        };
        return Err(reject(
            StatusCode::NOT_ACCEPTABLE,
            format!("Accept header must include {}", wanted),
        ));
    }

    if !is_json_content(&parts.headers) {
        return Err(reject(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Type must be application/json",
        ));
    }

    let body = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.is::<LengthLimitError>() => {
            return Err(reject(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body exceeds {} bytes", max_body_size),
            ));
        }
        Err(err) => {
            return Err(reject(
                StatusCode::BAD_REQUEST,
                format!("Failed to read request body: {}", err),
            ));
        }
    };

    if let Err(detail) = extract_protocol_version(&parts.headers) {
        if !is_initialize(&body) {
            return Err(reject(StatusCode::BAD_REQUEST, detail));
        }
    }

    Ok(body)
}

/// Map the dispatcher outcome onto a plain HTTP reply
pub(crate) fn reply(outcome: Result<HandleResult, InvalidMessageError>) -> Response<McpBody> {
    match outcome {
        Err(err) => {
            warn!(kind = %err.kind, "invalid message: {}", err.detail);
            json_response(status_from(err.http_status()), err.to_json())
        }
        Ok(HandleResult::NoMessage) => empty_response(StatusCode::ACCEPTED),
        Ok(result) => {
            let status = status_from(result.http_status());
            match result.into_text() {
                Some(text) => json_response(status, text),
                None => empty_response(status),
            }
        }
    }
}

/// An id-less `InvalidRequest` envelope carrying `detail`, sent with `status`
pub(crate) fn reject(status: StatusCode, detail: impl Into<String>) -> Response<McpBody> {
    json_response(
        status,
        InvalidMessageError::invalid_request(detail, None).to_json(),
    )
}

pub(crate) fn json_response(status: StatusCode, json: String) -> Response<McpBody> {
    let mut response = Response::new(full(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

pub(crate) fn empty_response(status: StatusCode) -> Response<McpBody> {
    let mut response = Response::new(full(Bytes::new()));
    *response.status_mut() = status;
    response
}

pub(crate) fn full(bytes: impl Into<Bytes>) -> McpBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub(crate) fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
