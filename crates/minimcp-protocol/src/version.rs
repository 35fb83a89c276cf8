//! MCP Protocol Version Support
//!
//! ## Version History
//! - **2024-11-05**: First MCP revision, HTTP+SSE transport
//! - **2025-03-26**: Introduced Streamable HTTP and tool annotations
//! - **2025-06-18**: Structured tool output, `MCP-Protocol-Version` header

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported MCP protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum McpVersion {
    #[serde(rename = "2024-11-05")]
    V2024_11_05,
    #[serde(rename = "2025-03-26")]
    V2025_03_26,
    #[serde(rename = "2025-06-18")]
    V2025_06_18,
}

impl McpVersion {
    /// Newest version this runtime speaks
    pub const LATEST: McpVersion = McpVersion::V2025_06_18;

    /// Version assumed when an HTTP client omits the `MCP-Protocol-Version` header
    pub const DEFAULT_NEGOTIATED: McpVersion = McpVersion::V2025_03_26;

    /// All versions accepted during negotiation, oldest first
    pub const SUPPORTED: [McpVersion; 3] = [
        McpVersion::V2024_11_05,
        McpVersion::V2025_03_26,
        McpVersion::V2025_06_18,
    ];

    /// Parse a version string like "2025-06-18"
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2024-11-05" => Some(McpVersion::V2024_11_05),
            "2025-03-26" => Some(McpVersion::V2025_03_26),
            "2025-06-18" => Some(McpVersion::V2025_06_18),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            McpVersion::V2024_11_05 => "2024-11-05",
            McpVersion::V2025_03_26 => "2025-03-26",
            McpVersion::V2025_06_18 => "2025-06-18",
        }
    }

    /// The version a server answers with: the client's own if supported, else the latest.
    pub fn negotiate(requested: &str) -> Self {
        Self::parse(requested).unwrap_or(Self::LATEST)
    }

    /// Comma separated list of supported versions, for error messages
    pub fn supported_list() -> String {
        Self::SUPPORTED
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for McpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate() {
        assert_eq!(McpVersion::negotiate("2024-11-05"), McpVersion::V2024_11_05);
        assert_eq!(McpVersion::negotiate("1999-01-01"), McpVersion::LATEST);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&McpVersion::V2025_06_18).unwrap(),
            r#""2025-06-18""#
        );
        assert_eq!(
            McpVersion::supported_list(),
            "2024-11-05, 2025-03-26, 2025-06-18"
        );
    }
}
