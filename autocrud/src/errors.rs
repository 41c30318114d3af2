//! # Error handling for the generated endpoints
//!
//! Every handler returns `Result<_, CrudError>`. Each variant maps to one
//! HTTP status, and the body is always `{"error": "<message>"}`.
//!
//! Persistence errors are logged with `tracing` and replaced with a generic
//! message before they reach the client. The one exception is
//! `DbErr::RecordNotFound`, which becomes a 404.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum CrudError {
    /// 400: the request body or a parameter could not be decoded.
    BindFailed { message: String },

    /// 400: the route did not carry the model's identity.
    MissingIdentifier { param: String },

    /// 400: a nested route did not carry the parent's identity.
    MissingParentIdentifier { param: String },

    /// 400: an update tried to change the identity field.
    IdentityMismatch { field: String },

    /// 404: the addressed record does not exist.
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// 422: the persistence layer rejected the operation (details logged,
    /// not exposed).
    ProcessFailed { message: String, internal: DbErr },
}

impl CrudError {
    pub fn bind_failed(message: impl fmt::Display) -> Self {
        Self::BindFailed {
            message: format!("bind failed: {message}"),
        }
    }

    pub fn missing_identifier(param: impl Into<String>) -> Self {
        Self::MissingIdentifier {
            param: param.into(),
        }
    }

    pub fn missing_parent_identifier(param: impl Into<String>) -> Self {
        Self::MissingParentIdentifier {
            param: param.into(),
        }
    }

    pub fn identity_mismatch(field: impl Into<String>) -> Self {
        Self::IdentityMismatch {
            field: field.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn process_failed(internal: DbErr) -> Self {
        Self::ProcessFailed {
            message: "process failed".to_string(),
            internal,
        }
    }

    /// Builds a 422 whose message is safe to show, e.g. "field not found".
    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::ProcessFailed {
            internal: DbErr::Custom(message.clone()),
            message,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BindFailed { .. }
            | Self::MissingIdentifier { .. }
            | Self::MissingParentIdentifier { .. }
            | Self::IdentityMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ProcessFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::BindFailed { message } | Self::ProcessFailed { message, .. } => message.clone(),
            Self::MissingIdentifier { param } => format!("missing id: {param}"),
            Self::MissingParentIdentifier { param } => format!("missing parent id: {param}"),
            Self::IdentityMismatch { field } => format!("{field} can not be updated"),
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
        }
    }

    fn log_internal(&self) {
        match self {
            Self::ProcessFailed { internal, .. } => {
                tracing::error!(error = ?internal, "Persistence error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "CRUD request rejected"
                );
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        self.log_internal();
        let body = ErrorResponse {
            error: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl fmt::Display for CrudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for CrudError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ProcessFailed { internal, .. } => Some(internal),
            _ => None,
        }
    }
}

/// - `DbErr::RecordNotFound` becomes 404
/// - everything else becomes 422 with a generic message
impl From<DbErr> for CrudError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(msg) => {
                let resource = msg.split_whitespace().next().unwrap_or("Record");
                Self::not_found(resource, None)
            }
            other => Self::process_failed(other),
        }
    }
}
