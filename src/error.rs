// Error type shared by the HTTP client, WebSocket channels and sessions.

use thiserror::Error;

/// Every way a call against the robot hub backend can fail.
#[derive(Debug, Error)]
pub enum HubError {
    /// The request never produced a response (connect, timeout, reset).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status} from {path}")]
    Http { status: u16, path: String },

    /// The body could not be decoded as the expected JSON shape.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A 2xx response that carries an `error` field.
    #[error("{0}")]
    Server(String),

    #[error("robot '{0}' not found")]
    NotFound(String),

    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The MJPEG stream is not framed the way it claims to be.
    #[error("video stream error: {0}")]
    Stream(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<url::ParseError> for HubError {
    fn from(e: url::ParseError) -> Self {
        HubError::InvalidUrl(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for HubError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        HubError::WebSocket(e.to_string())
    }
}

pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = HubError::Http {
            status: 503,
            path: "/api/robots".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from /api/robots");

        assert_eq!(HubError::Server("busy".into()).to_string(), "busy");
        assert_eq!(
            HubError::NotFound("spot-001".into()).to_string(),
            "robot 'spot-001' not found"
        );
    }

    #[test]
    fn test_from_url_parse_error() {
        let err: HubError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, HubError::InvalidUrl(_)));
    }
}
