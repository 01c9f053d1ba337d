//! Error taxonomy shared by every store, and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dbforum_shared::{Forum, Thread, User};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForumError>;

/// Rows that already hold the unique key a create tried to claim.
#[derive(Debug, Clone, PartialEq)]
pub enum Existing {
    Forum(Forum),
    Thread(Thread),
    /// Every user matching the nickname or the email (one or two rows).
    Users(Vec<User>),
}

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("Can't find forum by slug: {0}")]
    ForumNotFound(String),

    #[error("Can't find thread by slug or id: {0}")]
    ThreadNotFound(String),

    #[error("Can't find user by nickname: {0}")]
    UserNotFound(String),

    #[error("Can't find post with id: {0}")]
    PostNotFound(i64),

    #[error("Parent post was created in another thread")]
    NoParent,

    #[error("entity already exists")]
    Duplicate(Existing),

    #[error("This email is already registered by user: {0}")]
    Conflict(String),

    #[error("SQLite error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Task join error: {0}")]
    Join(String),
}

impl ForumError {
    /// Storage or runtime failures that carry no domain meaning.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Pool(_) | Self::Join(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::ForumNotFound(_)
            | Self::ThreadNotFound(_)
            | Self::UserNotFound(_)
            | Self::PostNotFound(_) => StatusCode::NOT_FOUND,
            Self::NoParent | Self::Duplicate(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Pool(_) | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ForumError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Duplicate(Existing::Forum(forum)) => (status, Json(forum)).into_response(),
            Self::Duplicate(Existing::Thread(thread)) => (status, Json(thread)).into_response(),
            Self::Duplicate(Existing::Users(users)) => (status, Json(users)).into_response(),
            err if err.is_internal() => {
                tracing::error!(error = %err, "request failed");
                status.into_response()
            }
            err => (status, Json(serde_json::json!({ "message": err.to_string() }))).into_response(),
        }
    }
}
