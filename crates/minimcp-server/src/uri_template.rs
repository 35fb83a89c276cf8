//! URI templates for parameterized resources.
//!
//! Supports the simple `{name}` form: each variable matches exactly one
//! path segment (`[^/]+`). Everything else in the pattern matches literally.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{McpError, McpResult};

/// A compiled URI template
#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    normalized: String,
    regex: Regex,
    variables: Vec<String>,
}

impl UriTemplate {
    pub fn new(pattern: &str) -> McpResult<Self> {
        let mut regex_pattern = String::from("^");
        let mut normalized = String::new();
        let mut variables = Vec::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            let close = rest[open..].find('}').map(|i| open + i).ok_or_else(|| {
                McpError::Configuration(format!("Unclosed variable in URI template '{}'", pattern))
            })?;
            let name = &rest[open + 1..close];
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(McpError::Configuration(format!(
                    "Invalid variable name '{}' in URI template '{}'",
                    name, pattern
                )));
            }
            if variables.iter().any(|v| v == name) {
                return Err(McpError::Configuration(format!(
                    "Duplicate variable '{}' in URI template '{}'",
                    name, pattern
                )));
            }

            regex_pattern.push_str(&regex::escape(&rest[..open]));
            regex_pattern.push_str(&format!("(?P<{}>[^/]+)", name));
            normalized.push_str(&rest[..open]);
            normalized.push_str("{}");
            variables.push(name.to_string());
            rest = &rest[close + 1..];
        }
        regex_pattern.push_str(&regex::escape(rest));
        regex_pattern.push('$');
        normalized.push_str(rest);

        if variables.is_empty() {
            return Err(McpError::Configuration(format!(
                "URI template '{}' has no variables",
                pattern
            )));
        }

        let regex = Regex::new(&regex_pattern).map_err(|e| {
            McpError::Configuration(format!("Invalid URI template '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            normalized,
            regex,
            variables,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The pattern with every variable name erased: `a/{x}/b` becomes `a/{}/b`.
    /// Templates that differ only in variable names share this key.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Variables extracted from `uri`, or `None` if it does not match.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(uri)?;
        Some(
            self.variables
                .iter()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_extracts_variables() {
        let template = UriTemplate::new("math://tables/{n}/rows/{row}").unwrap();
        let vars = template.match_uri("math://tables/7/rows/3").unwrap();
        assert_eq!(vars["n"], "7");
        assert_eq!(vars["row"], "3");
        assert_eq!(template.variables(), ["n", "row"]);
    }

    #[test]
    fn test_variables_do_not_span_segments() {
        let template = UriTemplate::new("file:///{name}.txt").unwrap();
        assert!(template.match_uri("file:///notes.txt").is_some());
        assert!(template.match_uri("file:///a/b.txt").is_none());
        assert!(template.match_uri("file:///notes.txt.bak").is_none());
    }

    #[test]
    fn test_literal_parts_are_escaped() {
        let template = UriTemplate::new("db://q?id={id}").unwrap();
        assert!(template.match_uri("db://q?id=5").is_some());
        assert!(template.match_uri("db://qXid=5").is_none());
    }

    #[test]
    fn test_normalized_erases_variable_names() {
        let a = UriTemplate::new("math://tables/{n}/rows/{row}").unwrap();
        let b = UriTemplate::new("math://tables/{m}/rows/{r}").unwrap();
        assert_eq!(a.normalized(), "math://tables/{}/rows/{}");
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn test_invalid_templates() {
        assert!(UriTemplate::new("math://{unclosed").is_err());
        assert!(UriTemplate::new("math://{}").is_err());
        assert!(UriTemplate::new("math://{a}/{a}").is_err());
        assert!(UriTemplate::new("math://plain").is_err());
    }
}
