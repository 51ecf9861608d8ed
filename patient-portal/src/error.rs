use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use triage_flow::FlowError;

/// How an error should be surfaced to the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid fields, shown inline next to each field
    Validation,
    /// Backend unreachable or answered with an error, shown as a page message
    Network,
    /// An earlier step of the flow is missing, the user must restart
    Precondition,
    /// Unknown session or resource
    NotFound,
    Internal,
}

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Validation failed: {message}")]
    Validation { fields: Vec<String>, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned {status}")]
    Server { status: u16, message: Option<String> },

    #[error("Could not decode backend response: {0}")]
    Decode(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request superseded by a newer view")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow error: {0}")]
    Flow(#[from] FlowError),
}

pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PortalError::Validation {
            fields: vec![field.into()],
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PortalError::Validation { .. } => ErrorCategory::Validation,
            PortalError::Network(_) | PortalError::Server { .. } | PortalError::Decode(_) => {
                ErrorCategory::Network
            }
            PortalError::Precondition(_) | PortalError::Cancelled => ErrorCategory::Precondition,
            PortalError::NotFound(_) | PortalError::Flow(FlowError::SessionNotFound(_)) => {
                ErrorCategory::NotFound
            }
            PortalError::Flow(FlowError::Rejected(_)) => ErrorCategory::Precondition,
            PortalError::Config(_) | PortalError::Flow(_) => ErrorCategory::Internal,
        }
    }

    /// Swap the technical detail of a backend failure for the message the
    /// page shows. Other errors are returned unchanged.
    pub fn for_page(self, message: &str) -> Self {
        match self {
            PortalError::Network(_) | PortalError::Decode(_) => PortalError::Server {
                status: 502,
                message: Some(message.to_string()),
            },
            PortalError::Server { status, .. } => PortalError::Server {
                status,
                message: Some(message.to_string()),
            },
            other => other,
        }
    }

    /// Message from the backend body, when it sent one.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            PortalError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PortalError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            PortalError::Server {
                status: status.as_u16(),
                message: None,
            }
        } else {
            PortalError::Network(err.to_string())
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let category = self.category();
        let status = match category {
            ErrorCategory::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Network => StatusCode::BAD_GATEWAY,
            ErrorCategory::Precondition => StatusCode::CONFLICT,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            PortalError::Validation { fields, message } => json!({
                "error": message,
                "fields": fields,
            }),
            PortalError::Server { message, .. } => json!({
                "error": message.clone().unwrap_or_else(|| self.to_string()),
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_status_codes() {
        let cases = [
            (PortalError::validation("nome", "manca"), StatusCode::UNPROCESSABLE_ENTITY),
            (PortalError::Network("down".into()), StatusCode::BAD_GATEWAY),
            (PortalError::Precondition("ricomincia".into()), StatusCode::CONFLICT),
            (PortalError::Cancelled, StatusCode::CONFLICT),
            (PortalError::NotFound("session x".into()), StatusCode::NOT_FOUND),
            (
                PortalError::Flow(FlowError::Rejected("not reached".into())),
                StatusCode::CONFLICT,
            ),
            (
                PortalError::Flow(FlowError::SessionNotFound("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (PortalError::Config("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn page_message_replaces_transport_detail() {
        let err = PortalError::Network("connection refused".into()).for_page("Riprova");
        assert!(matches!(
            &err,
            PortalError::Server { status: 502, message: Some(m) } if m == "Riprova"
        ));

        let err = PortalError::Server {
            status: 400,
            message: Some("bad".into()),
        }
        .for_page("Riprova");
        assert!(matches!(err, PortalError::Server { status: 400, .. }));
        assert_eq!(err.backend_message(), Some("Riprova"));

        let err = PortalError::validation("rating", "manca").for_page("Riprova");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}
