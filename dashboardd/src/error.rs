use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Failures surfaced by the dashboard. Enrichment-path failures (NAT,
/// monitoring, discovery) are not represented here; those degrade to
/// placeholders via `Enrichment` instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Node {0} not found")]
    NodeNotFound(u32),

    #[error("A node with the name \"{0}\" already exists. Please use a unique name.")]
    DuplicateName(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport error or non-2xx from a node's management API.
    #[error("Failed to {capability}: {cause}")]
    RemoteCallFailed {
        capability: &'static str,
        cause: String,
    },

    /// Non-success from the market-data API, carrying its status and body.
    #[error("Market-data API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("No data found for the requested token")]
    MissingData,

    #[error("Service type is required")]
    ServiceTypeRequired,

    #[error("No identities found on node")]
    NoIdentities,

    #[error("API key is required")]
    ApiKeyRequired,

    #[error("Help topic \"{0}\" not found")]
    TopicNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NodeNotFound(_) | Error::TopicNotFound(_) | Error::MissingData => {
                StatusCode::NOT_FOUND
            }
            Error::DuplicateName(_) => StatusCode::CONFLICT,
            Error::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            Error::RemoteCallFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::ServiceTypeRequired | Error::NoIdentities | Error::ApiKeyRequired => {
                StatusCode::BAD_REQUEST
            }
            Error::Io(_) | Error::Json(_) | Error::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
