//! CORS (Cross-Origin Resource Sharing) support

use hyper::HeaderMap;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, HeaderValue,
};

/// CORS layer for adding appropriate headers
pub struct CorsLayer;

impl CorsLayer {
    /// Apply permissive CORS headers to a response. Only POST carries MCP
    /// messages; OPTIONS answers the preflight.
    pub fn apply_cors_headers(headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Accept, Authorization, MCP-Protocol-Version"),
        );
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("MCP-Protocol-Version"),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    }

    /// Same as [`apply_cors_headers`](Self::apply_cors_headers) but bound to
    /// one origin. An origin that is not a valid header value leaves the
    /// headers untouched.
    pub fn apply_cors_headers_for_origin(headers: &mut HeaderMap, origin: &str) {
        let Ok(origin) = HeaderValue::from_str(origin) else {
            return;
        };
        Self::apply_cors_headers(headers);
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
}
