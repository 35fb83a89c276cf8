//! Server-Sent Events framing

use bytes::Bytes;

/// One frame of an MCP event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// An encoded JSON-RPC message (notification or final response)
    Message(String),
    /// Comment frame that keeps intermediaries from closing an idle stream
    KeepAlive,
}

impl SseEvent {
    /// Format as SSE text. Messages are single-line JSON, so one `data:` line suffices.
    pub fn format(&self) -> String {
        match self {
            SseEvent::Message(json) => format!("event: message\ndata: {}\n\n", json),
            SseEvent::KeepAlive => ": ping\n\n".to_string(),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.format())
    }
}

/// Split a complete SSE payload back into the `data:` lines of its message events.
/// Keep-alive comments are skipped.
#[cfg(test)]
pub(crate) fn parse_messages(payload: &str) -> Vec<String> {
    payload
        .split("\n\n")
        .filter(|frame| !frame.is_empty() && !frame.starts_with(':'))
        .filter_map(|frame| {
            frame
                .lines()
                .find_map(|line| line.strip_prefix("data: "))
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_framing() {
        let event = SseEvent::Message(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#.to_string());
        assert_eq!(
            event.format(),
            "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n"
        );
        assert_eq!(SseEvent::KeepAlive.format(), ": ping\n\n");
    }

    #[test]
    fn test_parse_messages_skips_keep_alive() {
        let payload = format!(
            "{}{}{}",
            SseEvent::Message("{\"a\":1}".into()).format(),
            SseEvent::KeepAlive.format(),
            SseEvent::Message("{\"b\":2}".into()).format(),
        );
        assert_eq!(parse_messages(&payload), vec!["{\"a\":1}", "{\"b\":2}"]);
    }
}
