//! Error types for the Jingle signaling engine
//!
//! Every handler reports failures synchronously through [`JingleError`].
//! The manager turns them into stanza-level error replies using
//! [`JingleError::condition`] and [`JingleError::jingle_condition`].

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, JingleError>;

/// Errors raised while negotiating or managing a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JingleError {
    /// Malformed or missing attributes, unknown creator, duplicate content name
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Action is not legal in the current session state
    #[error("Out of order: {message}")]
    OutOfOrder { message: String },

    /// session-info carried children, none of which were understood
    #[error("Unsupported info: {message}")]
    UnsupportedInfo { message: String },

    /// Description namespace has no registered content type
    #[error("Unknown content type: {namespace}")]
    UnknownContentType { namespace: String },

    /// No session exists for this peer and session id
    #[error("Unknown session: {sid}")]
    UnknownSession { sid: String },

    /// Stanza text could not be parsed as XML
    #[error("XML error: {message}")]
    Xml { message: String },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl JingleError {
    /// Create a bad-request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an out-of-order error
    pub fn out_of_order(message: impl Into<String>) -> Self {
        Self::OutOfOrder {
            message: message.into(),
        }
    }

    /// Create an unsupported-info error
    pub fn unsupported_info(message: impl Into<String>) -> Self {
        Self::UnsupportedInfo {
            message: message.into(),
        }
    }

    /// Create an unknown-content-type error
    pub fn unknown_content_type(namespace: impl Into<String>) -> Self {
        Self::UnknownContentType {
            namespace: namespace.into(),
        }
    }

    /// Create an XML parse error
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for errors reported to the peer as `bad-request`
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::BadRequest { .. } | Self::UnknownContentType { .. } | Self::Xml { .. }
        )
    }

    /// XMPP stanza error condition used when replying to the peer
    pub fn condition(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } | Self::UnknownContentType { .. } | Self::Xml { .. } => {
                "bad-request"
            }
            Self::OutOfOrder { .. } => "unexpected-request",
            Self::UnsupportedInfo { .. } => "feature-not-implemented",
            Self::UnknownSession { .. } => "item-not-found",
            Self::Config { .. } => "internal-server-error",
        }
    }

    /// Jingle-specific error condition, if any
    pub fn jingle_condition(&self) -> Option<&'static str> {
        match self {
            Self::OutOfOrder { .. } => Some("out-of-order"),
            Self::UnsupportedInfo { .. } => Some("unsupported-info"),
            Self::UnknownSession { .. } => Some("unknown-session"),
            _ => None,
        }
    }

    /// XMPP error type attribute (`cancel` or `modify`)
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } | Self::Xml { .. } => "modify",
            _ => "cancel",
        }
    }
}

impl From<quick_xml::Error> for JingleError {
    fn from(err: quick_xml::Error) -> Self {
        Self::xml(err.to_string())
    }
}

impl From<serde_yaml::Error> for JingleError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_follow_error_family() {
        assert_eq!(JingleError::bad_request("x").condition(), "bad-request");
        assert_eq!(
            JingleError::unknown_content_type("urn:x").condition(),
            "bad-request"
        );
        assert_eq!(
            JingleError::out_of_order("x").jingle_condition(),
            Some("out-of-order")
        );
        assert_eq!(
            JingleError::UnknownSession { sid: "s1".into() }.jingle_condition(),
            Some("unknown-session")
        );
        assert!(JingleError::bad_request("x").jingle_condition().is_none());
    }
}
