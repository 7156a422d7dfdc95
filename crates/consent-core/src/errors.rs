//! Structured error type for the consent engine.
//!
//! Every failure surfaces as one [`ConsentError`] carrying a kind, a
//! human-readable message and, for storage failures, the underlying cause.
//! Callers branch on [`ConsentError::kind`], never on message text.

use thiserror::Error;

/// Error kind discriminant, stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced entity does not exist, or exists in a different organization.
    NotFound,
    /// A precondition on current state does not hold.
    Conflict,
    /// Malformed or missing mandatory input.
    InvalidArgument,
    /// The underlying transactional store rejected or could not complete the operation.
    Storage,
}

/// Engine error. One type for all operations.
#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage failure: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },
}

impl ConsentError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }
}

impl From<rusqlite::Error> for ConsentError {
    fn from(e: rusqlite::Error) -> Self {
        ConsentError::Storage {
            message: e.to_string(),
            source: Some(e),
        }
    }
}

impl From<serde_json::Error> for ConsentError {
    fn from(e: serde_json::Error) -> Self {
        ConsentError::Storage {
            message: format!("snapshot serialization failed: {e}"),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            ConsentError::not_found("consent", "c1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ConsentError::conflict("already terminal").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            ConsentError::invalid_argument("blank id").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            ConsentError::storage("disk full").kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn sqlite_errors_map_to_storage_kind() {
        let e: ConsentError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(e.kind(), ErrorKind::Storage);
    }

    #[test]
    fn not_found_message_names_entity_and_id() {
        let e = ConsentError::not_found("authorization", "auth-9");
        assert_eq!(e.to_string(), "authorization not found: auth-9");
    }
}
