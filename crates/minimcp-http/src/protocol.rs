//! Request header checks shared by the HTTP transports

use hyper::HeaderMap;
use hyper::header::{ACCEPT, CONTENT_TYPE};
use minimcp_protocol::{McpVersion, methods};
use serde_json::Value;

pub const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";
pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_EVENT_STREAM: &str = "text/event-stream";

/// Whether the `Accept` header admits `media`, honouring `*/*` and `type/*` ranges.
/// A missing header admits nothing.
pub fn accepts(headers: &HeaderMap, media: &str) -> bool {
    let kind = media.split('/').next().unwrap_or(media);
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|range| {
            range
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .any(|range| range == media || range == "*/*" || range.strip_suffix("/*") == Some(kind))
}

/// `Content-Type: application/json`, parameters such as `charset` ignored
pub fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(APPLICATION_JSON))
}

/// Protocol version from the `MCP-Protocol-Version` header. A missing header
/// means the client predates it, so the default negotiated version applies.
pub fn extract_protocol_version(headers: &HeaderMap) -> Result<McpVersion, String> {
    let Some(value) = headers.get(MCP_PROTOCOL_VERSION_HEADER) else {
        return Ok(McpVersion::DEFAULT_NEGOTIATED);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| McpVersion::parse(v.trim()))
        .ok_or_else(|| {
            format!(
                "Unsupported MCP-Protocol-Version {:?}; supported: {}",
                value,
                McpVersion::supported_list()
            )
        })
}

/// Whether a body holds an `initialize` request, alone or inside a batch.
/// Version negotiation happens there, so the header check is skipped.
pub fn is_initialize(body: &[u8]) -> bool {
    fn is_init(message: &Value) -> bool {
        message.get("method").and_then(Value::as_str) == Some(methods::INITIALIZE)
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(items)) => items.iter().any(is_init),
        Ok(message) => is_init(&message),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_accept_ranges() {
        let both = headers(&[("accept", "application/json, text/event-stream")]);
        assert!(accepts(&both, APPLICATION_JSON));
        assert!(accepts(&both, TEXT_EVENT_STREAM));

        let wildcard = headers(&[("accept", "*/*")]);
        assert!(accepts(&wildcard, TEXT_EVENT_STREAM));

        let app = headers(&[("accept", "application/*;q=0.8")]);
        assert!(accepts(&app, APPLICATION_JSON));
        assert!(!accepts(&app, TEXT_EVENT_STREAM));

        assert!(!accepts(&HeaderMap::new(), APPLICATION_JSON));
    }

    #[test]
    fn test_content_type() {
        assert!(is_json_content(&headers(&[(
            "content-type",
            "application/json; charset=utf-8"
        )])));
        assert!(is_json_content(&headers(&[("content-type", "Application/JSON")])));
        assert!(!is_json_content(&headers(&[("content-type", "text/plain")])));
        assert!(!is_json_content(&HeaderMap::new()));
    }

    #[test]
    fn test_protocol_version_header() {
        assert_eq!(
            extract_protocol_version(&HeaderMap::new()),
            Ok(McpVersion::V2025_03_26)
        );
        assert_eq!(
            extract_protocol_version(&headers(&[("MCP-Protocol-Version", "2025-06-18")])),
            Ok(McpVersion::V2025_06_18)
        );
        let err = extract_protocol_version(&headers(&[("MCP-Protocol-Version", "1999-01-01")]))
            .unwrap_err();
        assert!(err.contains("2025-06-18"));
    }

    #[test]
    fn test_is_initialize() {
        assert!(is_initialize(br#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#));
        assert!(is_initialize(
            br#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","id":2,"method":"initialize"}]"#
        ));
        assert!(!is_initialize(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#));
        assert!(!is_initialize(b"not json"));
    }
}
