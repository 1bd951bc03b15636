pub mod alerts;
pub mod health;
pub mod reports;
pub mod test_routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

// ─── Error classification ────────────────────────────────────────

/// Response extension naming the error a handler failed with.
/// The sampling middleware reads it to classify the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorKind(pub String);

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    /// A failure carrying its own kind name, e.g. "ValueError"
    Raised { kind: String, message: String },
}

impl AppError {
    pub fn kind(&self) -> &str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::BadRequest(_) => "BadRequest",
            Self::Internal(_) => "InternalServerError",
            Self::Raised { kind, .. } => kind,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = ErrorKind(self.kind().to_string());
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Self::Raised { kind, message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{kind}: {message}"))
            }
        };

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(kind);
        response
    }
}
