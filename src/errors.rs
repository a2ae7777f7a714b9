//! Error types for onbase operations.

use handled::Handle;

use crate::api::ApiError;

/// Errors raised by a [`Session`](crate::Session) or its provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No connection could be acquired from the provider.
    Unavailable(String),
    /// The session was used after it was closed.
    Closed,
    /// The line buffer did not report its terminal status within the fetch limit.
    Overrun(usize),
    /// The database rejected or failed a statement.
    Database(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "Connection unavailable: {}", msg),
            Self::Closed => write!(f, "Session already closed"),
            Self::Overrun(limit) => {
                write!(f, "Line buffer not exhausted after {} fetches", limit)
            }
            Self::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                SessionError::Unavailable(e.to_string())
            }
            _ => SessionError::Database(e.to_string()),
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors raised while turning raw lines into records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordParseError {
    /// A key field was absent or empty.
    MissingField {
        /// Attribute name of the field.
        field: &'static str,
        /// Position of the field within the line.
        position: usize,
    },
    /// A numeric field held text that is not a number.
    InvalidNumber {
        /// Attribute name of the field.
        field: &'static str,
        /// The offending text.
        value: String,
    },
    /// The procedure produced no line where exactly one was expected.
    NoRecord,
}

impl std::fmt::Display for RecordParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { field, position } => {
                write!(f, "Missing field {} at position {}", field, position)
            }
            Self::InvalidNumber { field, value } => {
                write!(f, "Field {} is not numeric: {:?}", field, value)
            }
            Self::NoRecord => write!(f, "Procedure returned no record"),
        }
    }
}

impl std::error::Error for RecordParseError {}

/// The failure taxonomy of every onbase operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnBaseError {
    /// The person or record does not exist.
    NotFound(String),
    /// The procedure rejected the request for one or more reasons.
    BadRequest(Vec<String>),
    /// The record being created already exists.
    Conflict(String),
    /// A line could not be parsed.
    Parse(RecordParseError),
    /// The session or provider failed.
    Transport(SessionError),
}

impl std::fmt::Display for OnBaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(reason) => write!(f, "Not found: {}", reason),
            Self::BadRequest(reasons) => write!(f, "Bad request: {}", reasons.join("; ")),
            Self::Conflict(reason) => write!(f, "Conflict: {}", reason),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for OnBaseError {}

impl From<SessionError> for OnBaseError {
    fn from(e: SessionError) -> Self {
        OnBaseError::Transport(e)
    }
}

impl From<RecordParseError> for OnBaseError {
    fn from(e: RecordParseError) -> Self {
        OnBaseError::Parse(e)
    }
}

impl Handle<ApiError> for OnBaseError {
    fn handle(&self) -> Option<ApiError> {
        Some(match self {
            Self::NotFound(reason) => ApiError::not_found(reason.clone()),
            Self::BadRequest(reasons) => ApiError::bad_request(reasons.clone()),
            Self::Conflict(_) => ApiError::conflict(
                "Record with the same document ID and field name has existed.",
            ),
            Self::Parse(_) | Self::Transport(_) => ApiError::internal(self.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_pool_timeout_is_unavailable() {
        let err: SessionError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, SessionError::Unavailable(_)));
    }

    #[test]
    fn sqlx_row_not_found_is_database() {
        let err: SessionError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, SessionError::Database(_)));
    }

    #[test]
    fn display_names_the_field() {
        let err = RecordParseError::InvalidNumber {
            field: "applicationNumber",
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Field applicationNumber is not numeric: \"abc\""
        );
    }

    #[test]
    fn not_found_extracts_404() {
        let api = OnBaseError::NotFound("123456789 - No person exists".to_string())
            .handle()
            .unwrap();
        assert_eq!(api.status.as_u16(), 404);
        assert_eq!(api.details, vec!["123456789 - No person exists".to_string()]);
    }

    #[test]
    fn transport_extracts_500_without_detail() {
        let api = OnBaseError::Transport(SessionError::Closed).handle().unwrap();
        assert_eq!(api.status.as_u16(), 500);
        assert!(api.details.is_empty());
    }
}
