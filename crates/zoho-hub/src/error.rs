/// Errors surfaced by [`Connection`](crate::Connection) calls
///
/// Only authentication problems are raised from response bodies. Every other
/// embedded error code is handed back to the caller as an ordinary body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API rejected the credentials and they could not be recovered.
    /// Displays exactly the message extracted from the response.
    #[error("{0}")]
    Api(String),
    #[error("Token refresh failed: {0}")]
    Refresh(#[source] anyhow::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl ApiError {
    /// Returns true if this error carries an API-reported message
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_message_verbatim() {
        let err = ApiError::Api("invalid oauth token".to_string());
        assert_eq!(err.to_string(), "invalid oauth token");
        assert!(err.is_api());
    }

    #[test]
    fn refresh_error_keeps_source() {
        let err = ApiError::Refresh(anyhow::anyhow!("invalid_code"));
        assert_eq!(err.to_string(), "Token refresh failed: invalid_code");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_api());
    }

    #[test]
    fn url_errors_convert() {
        let err: ApiError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ApiError::Url(_)));
    }
}
