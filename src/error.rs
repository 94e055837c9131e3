use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Request-level failure taxonomy. Failures inside individual risk evaluators
/// never reach this type; they are absorbed into per-evaluator defaults.
#[derive(Debug, thiserror::Error)]
pub enum SafewalkError {
    #[error("missing configuration: {0}")]
    Configuration(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no walkable route found between the requested points")]
    NoRouteFound,

    /// Routing provider unreachable. Only route acquisition aborts a request;
    /// weather/traffic/report failures degrade to defaults instead.
    #[error("routing provider unavailable: {0}")]
    Upstream(anyhow::Error),
}

impl IntoResponse for SafewalkError {
    fn into_response(self) -> Response {
        let status = match self {
            SafewalkError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SafewalkError::NoRouteFound => StatusCode::NOT_FOUND,
            SafewalkError::Upstream(_) => StatusCode::BAD_GATEWAY,
            SafewalkError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
