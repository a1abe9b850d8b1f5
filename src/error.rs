//! Error types for the render service

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while servicing a render request
#[derive(Error, Debug)]
pub enum Error {
    /// Request body carried no chart option
    #[error("missing option")]
    MissingOption,

    /// Failed to launch the browser process
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Failed to open or size a page
    #[error("Failed to open page: {0}")]
    PageOpen(String),

    /// Failed to load the page document
    #[error("Failed to load page content: {0}")]
    PageLoad(String),

    /// Failed to inject the charting bundle into the page
    #[error("Script injection failed: {0}")]
    ScriptInject(String),

    /// In-page chart construction threw or returned an unexpected value
    #[error("Chart evaluation failed: {0}")]
    ChartEval(String),

    /// The chart canvas never materialized inside the container
    #[error("Timed out after {0}ms waiting for chart canvas")]
    CanvasTimeout(u64),

    /// Element lookup or screenshot capture failed
    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    /// Chart option could not be serialized for page injection
    #[error("Invalid chart option: {0}")]
    OptionEncode(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP status this error maps to: only a missing chart option is a
    /// client error, everything else is a render-stage failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingOption => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_option_is_client_error() {
        assert_eq!(Error::MissingOption.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::MissingOption.to_string(), "missing option");
    }

    #[test]
    fn render_stage_failures_are_server_errors() {
        let errors = [
            Error::Launch("no chrome".into()),
            Error::PageOpen("tab".into()),
            Error::PageLoad("nav".into()),
            Error::ScriptInject("bundle".into()),
            Error::ChartEval("boom".into()),
            Error::CanvasTimeout(8000),
            Error::Screenshot("clip".into()),
            Error::Other("misc".into()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn canvas_timeout_message_names_the_budget() {
        let msg = Error::CanvasTimeout(8000).to_string();
        assert!(msg.contains("8000ms"), "unexpected message: {msg}");
    }
}
