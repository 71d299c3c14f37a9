//! Connect request overrides and the connection parameters the broker returns.
//!
//! The `connect_to_vm` request carries the user's display preferences as
//! `qvd.client.*` query parameters.  On success the broker answers with a
//! JSON object whose `link` field tells the display launcher how to reach the
//! tunneled session:
//!
//! ```text
//! {"link": "nx/nx,link=lan,cache=8M:localhost:40", "session_id": "..."}
//! ```
//!
//! Fields other than `link` are kept verbatim in [`ConnectionParams::extra`]
//! for the launcher.

use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::geometry::Geometry;

/// User display preferences sent with the connect request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOverrides {
    pub geometry: Option<Geometry>,
    pub fullscreen: bool,
    /// X display the session should be shown on (`DISPLAY`).
    pub display: Option<String>,
    /// Directory for the display program's state (`NX_HOME`).
    pub home: Option<String>,
}

impl ConnectOverrides {
    /// Query parameters for the overrides that are set, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(geometry) = self.geometry {
            pairs.push(("qvd.client.geometry", geometry.to_string()));
        }
        if self.fullscreen {
            pairs.push(("qvd.client.fullscreen", "1".to_string()));
        }
        if let Some(display) = &self.display {
            pairs.push(("qvd.client.display", display.clone()));
        }
        if let Some(home) = &self.home {
            pairs.push(("qvd.client.home", home.clone()));
        }
        pairs
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectParamsError {
    #[error("connect response is not valid JSON: {0}")]
    Malformed(String),

    #[error("connect response has no usable `link`")]
    MissingLink,
}

/// Connection parameters returned by a successful `connect_to_vm`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectionParams {
    /// Descriptor used by the display launcher to reach the tunneled session.
    pub link: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ConnectionParams {
    /// Parses a connect response body.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectParamsError::Malformed`] for invalid JSON and
    /// [`ConnectParamsError::MissingLink`] when `link` is absent, not a
    /// string, or blank.
    pub fn parse(body: &[u8]) -> Result<Self, ConnectParamsError> {
        let root: Value =
            serde_json::from_slice(body).map_err(|e| ConnectParamsError::Malformed(e.to_string()))?;
        match root.get("link") {
            Some(Value::String(link)) if !link.trim().is_empty() => {}
            _ => return Err(ConnectParamsError::MissingLink),
        }
        serde_json::from_value(root).map_err(|e| ConnectParamsError::Malformed(e.to_string()))
    }
}

/// `true` once `body` starts with one complete JSON value.
///
/// After a `101 Switching Protocols` answer the connection stays open, so the
/// end of the parameters cannot be signalled by EOF.
pub fn holds_complete_json(body: &[u8]) -> bool {
    let mut values = serde_json::Deserializer::from_slice(body).into_iter::<IgnoredAny>();
    matches!(values.next(), Some(Ok(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_overrides_produce_no_query_pairs() {
        assert!(ConnectOverrides::default().query_pairs().is_empty());
    }

    #[test]
    fn test_fullscreen_false_is_omitted() {
        let overrides = ConnectOverrides {
            geometry: Some("800x600".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(
            overrides.query_pairs(),
            vec![("qvd.client.geometry", "800x600".to_string())]
        );
    }

    #[test]
    fn test_parse_link_and_keep_extra_fields() {
        // Arrange
        let body = br#"{"link": "nx/nx,link=lan:localhost:40", "session": 12}"#;

        // Act
        let params = ConnectionParams::parse(body).unwrap();

        // Assert
        assert_eq!(params.link, "nx/nx,link=lan:localhost:40");
        assert_eq!(params.extra.get("session"), Some(&Value::from(12)));
        assert!(!params.extra.contains_key("link"));
    }

    #[test]
    fn test_parse_rejects_missing_or_blank_link() {
        assert_eq!(
            ConnectionParams::parse(br#"{"other": 1}"#),
            Err(ConnectParamsError::MissingLink)
        );
        assert_eq!(
            ConnectionParams::parse(br#"{"link": "  "}"#),
            Err(ConnectParamsError::MissingLink)
        );
        assert_eq!(
            ConnectionParams::parse(br#"{"link": 5}"#),
            Err(ConnectParamsError::MissingLink)
        );
        assert_eq!(
            ConnectionParams::parse(br#"["link"]"#),
            Err(ConnectParamsError::MissingLink)
        );
    }

    #[test]
    fn test_parse_keeps_nested_extra_fields_verbatim() {
        // Arrange
        let body = br#"{"link": "nx/nx:40", "tunnel": {"port": 40, "tls": true}, "note": null}"#;

        // Act
        let params = ConnectionParams::parse(body).unwrap();

        // Assert
        assert_eq!(params.extra.len(), 2);
        assert_eq!(params.extra["tunnel"]["port"], Value::from(40));
        assert_eq!(params.extra["note"], Value::Null);
    }

    #[test]
    fn test_holds_complete_json_waits_for_closing_brace() {
        assert!(!holds_complete_json(b""));
        assert!(!holds_complete_json(br#"{"link": "nx/nx"#));
        assert!(holds_complete_json(br#"{"link": "nx/nx:40"}"#));
        assert!(holds_complete_json(b"  {\"link\": \"a\"}\n"));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            ConnectionParams::parse(b"link=abc"),
            Err(ConnectParamsError::Malformed(_))
        ));
    }
}
