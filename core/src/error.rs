use thiserror::Error;

use crate::model::task::TaskId;

pub const UNAUTHORIZED: u16 = 401;

/// Input rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title cannot be blank")]
    BlankTitle,

    #[error("Unknown key: '{0}'")]
    UnknownKey(String),

    #[error("Ambiguous key: '{key}' matches {matches:?}")]
    AmbiguousKey { key: String, matches: Vec<String> },
}

/// Failure reported by a task repository client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RepositoryError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(UNAUTHORIZED)
    }
}

impl From<reqwest::Error> for RepositoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RepositoryError::Timeout
        } else if err.is_decode() {
            RepositoryError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RepositoryError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            RepositoryError::Transport(err.to_string())
        }
    }
}

/// Everything a task store operation can report back to the presentation layer.
///
/// Only `Fetch` moves the store into its error phase. Mutation failures leave
/// the list usable and are meant to be shown as dismissible notices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to load tasks")]
    Fetch(#[source] RepositoryError),

    #[error("Failed to add task")]
    AddTask(#[source] RepositoryError),

    #[error("Failed to update task {id}")]
    UpdateTask {
        id: TaskId,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to delete task {id}")]
    DeleteTask {
        id: TaskId,
        #[source]
        source: RepositoryError,
    },

    #[error("Session is no longer valid, signed out")]
    AuthFailure,

    #[error("Not signed in")]
    NotSignedIn,
}

impl StoreError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, StoreError::AuthFailure)
    }

    /// The repository failure behind this error, if any.
    pub fn repository_error(&self) -> Option<&RepositoryError> {
        match self {
            StoreError::Fetch(e) | StoreError::AddTask(e) => Some(e),
            StoreError::UpdateTask { source, .. } | StoreError::DeleteTask { source, .. } => {
                Some(source)
            }
            StoreError::Validation(_) | StoreError::AuthFailure | StoreError::NotSignedIn => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_401_is_an_authorization_failure() {
        let unauthorized = RepositoryError::Status {
            status: 401,
            body: String::new(),
        };
        let forbidden = RepositoryError::Status {
            status: 403,
            body: String::new(),
        };
        assert!(unauthorized.is_unauthorized());
        assert!(!forbidden.is_unauthorized());
        assert!(!RepositoryError::Timeout.is_unauthorized());
        assert_eq!(RepositoryError::Timeout.status(), None);
    }

    #[test]
    fn test_store_error_exposes_cause() {
        let err = StoreError::DeleteTask {
            id: 3,
            source: RepositoryError::Transport("connection reset".into()),
        };
        assert_eq!(err.to_string(), "Failed to delete task 3");
        assert_eq!(
            err.repository_error(),
            Some(&RepositoryError::Transport("connection reset".into()))
        );
        assert_eq!(StoreError::from(ValidationError::BlankTitle).to_string(), "Title cannot be blank");
    }
}
