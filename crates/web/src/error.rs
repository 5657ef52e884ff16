//! Panel responses for failed and completed actions

use axum::{
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use conveyor_common::Error;
use serde::Serialize;
use tracing::{error, warn};

/// Where the plan index lives in the panel.
pub const INDEX_URL: &str = "/plans";

/// A failed panel request: the underlying error plus the message an
/// operator gets to see.
#[derive(Debug)]
pub struct PanelError {
    pub error: Error,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    redirect: &'a str,
}

impl PanelError {
    /// Wraps `error`, shown as `message` when the details should stay
    /// server-side.
    pub fn new(error: Error, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }

    /// Text sent to the client. Backend and internal failures only get the
    /// generic message; input problems are described as they are.
    pub fn user_message(&self) -> String {
        if self.error.is_backend() {
            return self.message.clone();
        }
        match &self.error {
            Error::Normalize(_) | Error::Validation(_) | Error::NotFound { .. } => {
                format!("{} {}", self.message, self.error)
            }
            _ => self.message.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<Error> for PanelError {
    fn from(error: Error) -> Self {
        PanelError::new(error, "Request failed.")
    }
}

impl From<JsonRejection> for PanelError {
    fn from(rejection: JsonRejection) -> Self {
        PanelError::new(Error::validation(rejection.body_text()), "Malformed request body.")
    }
}

impl From<FormRejection> for PanelError {
    fn from(rejection: FormRejection) -> Self {
        PanelError::new(Error::validation(rejection.body_text()), "Malformed form data.")
    }
}

impl From<QueryRejection> for PanelError {
    fn from(rejection: QueryRejection) -> Self {
        PanelError::new(Error::validation(rejection.body_text()), "Malformed query string.")
    }
}

impl IntoResponse for PanelError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.error, message = %self.message, "panel request failed");
        } else {
            warn!(error = %self.error, message = %self.message, "panel request rejected");
        }
        let message = self.user_message();
        let body = ErrorBody {
            success: false,
            error: &message,
            redirect: INDEX_URL,
        };
        (status, Json(body)).into_response()
    }
}

/// Outcome of a submitted form
#[derive(Debug, Serialize)]
pub struct FormOutcome {
    pub success: bool,
    pub message: String,
    pub redirect: &'static str,
}

impl FormOutcome {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            redirect: INDEX_URL,
        }
    }
}

impl IntoResponse for FormOutcome {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Attaches an operator-facing message to a fallible result.
pub trait Context<T> {
    fn context(self, message: impl Into<String>) -> Result<T, PanelError>;
}

impl<T> Context<T> for conveyor_common::Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T, PanelError> {
        self.map_err(|e| PanelError::new(e, message))
    }
}
