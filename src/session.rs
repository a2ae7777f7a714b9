//! # Sessions and Statements
//!
//! The OnBase procedures live behind a stateful database session. A session
//! executes one [`Statement`] at a time with a set of named [`Binds`] and
//! reports the output binds of the line buffer alongside any query rows.
//!
//! ```text
//! ConnectionProvider ──get_connection──► Session
//!                                          │ execute(Statement, Binds)
//!                                          ▼
//!                                      Execution { out_binds: { line, status }, rows }
//! ```
//!
//! Sessions are exclusively owned by the operation that acquired them and
//! must be closed exactly once, whatever the outcome of that operation. An
//! owner dropped before it could close (a cancelled request) abandons the
//! session instead, and an abandoned session is never reused.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::SessionError;

/// Named bind parameters for a statement.
pub type Binds = Map<String, Value>;

/// One row returned by a query statement.
pub type Row = Vec<Option<String>>;

/// The procedures and queries the OnBase integration issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Lightweight existence query for a person.
    PersonExists,
    /// Fetch the next line of buffered output.
    GetLine,
    /// Queue the admission lines for a person.
    GetApplications,
    /// Update an application checklist and queue the resulting admission lines.
    PatchApplications,
    /// Queue the financial aid tracking requirement lines for a person.
    GetTrackingRequirements,
    /// Update a tracking requirement and queue the resulting lines.
    PatchTrackingRequirements,
    /// Queue the hold lines for a person.
    GetHolds,
    /// Index a document and queue its line.
    PostDocument,
}

impl Statement {
    /// Every statement, in declaration order.
    pub const ALL: [Statement; 8] = [
        Statement::PersonExists,
        Statement::GetLine,
        Statement::GetApplications,
        Statement::PatchApplications,
        Statement::GetTrackingRequirements,
        Statement::PatchTrackingRequirements,
        Statement::GetHolds,
        Statement::PostDocument,
    ];

    /// A short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Statement::PersonExists => "person_exists",
            Statement::GetLine => "get_line",
            Statement::GetApplications => "get_applications",
            Statement::PatchApplications => "patch_applications",
            Statement::GetTrackingRequirements => "get_tracking_requirements",
            Statement::PatchTrackingRequirements => "patch_tracking_requirements",
            Statement::GetHolds => "get_holds",
            Statement::PostDocument => "post_document",
        }
    }

    /// The SQL text, with positional placeholders in [`Statement::parameters`] order.
    pub fn sql(&self) -> &'static str {
        match self {
            Statement::PersonExists => {
                "SELECT spriden_id FROM spriden WHERE spriden_id = $1 AND spriden_change_ind IS NULL"
            }
            Statement::GetLine => "SELECT line, status FROM dbms_output.get_line()",
            Statement::GetApplications => "CALL onbase.get_applications($1)",
            Statement::PatchApplications => "CALL onbase.patch_applications($1, $2, $3, $4, $5)",
            Statement::GetTrackingRequirements => {
                "CALL onbase.get_tracking_requirements($1, $2)"
            }
            Statement::PatchTrackingRequirements => {
                "CALL onbase.patch_tracking_requirements($1, $2, $3, $4, $5)"
            }
            Statement::GetHolds => "CALL onbase.get_holds($1)",
            Statement::PostDocument => {
                "CALL onbase.post_document($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
            }
        }
    }

    /// Names of the input binds, in placeholder order.
    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            Statement::PersonExists => &["osuId"],
            Statement::GetLine => &[],
            Statement::GetApplications => &["osuId"],
            Statement::PatchApplications => &[
                "osuId",
                "termCode",
                "applicationNumber",
                "checklistCode",
                "checklistReceiveDate",
            ],
            Statement::GetTrackingRequirements => &["osuId", "financialAidYear"],
            Statement::PatchTrackingRequirements => &[
                "osuId",
                "aidYear",
                "requirementCode",
                "statusCode",
                "statusDate",
            ],
            Statement::GetHolds => &["osuId"],
            Statement::PostDocument => &[
                "osuId",
                "documentId",
                "documentTypeName",
                "documentReceiveDate",
                "keywordName",
                "keywordValue",
                "termCode",
                "applicationNumber",
                "aidYear",
                "sequenceNumber",
                "source",
                "comment",
            ],
        }
    }

    /// Whether the statement returns rows rather than feeding the line buffer.
    pub fn is_query(&self) -> bool {
        matches!(self, Statement::PersonExists | Statement::GetLine)
    }
}

/// Output binds of the get-line call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutBinds {
    /// The fetched line, absent when no output remains.
    pub line: Option<String>,
    /// The status; `1` means no more output.
    pub status: Option<i64>,
}

/// The outcome of executing a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// Output binds, populated by [`Statement::GetLine`].
    pub out_binds: OutBinds,
    /// Rows, populated by query statements.
    pub rows: Vec<Row>,
}

impl Execution {
    /// An execution that carried one line-buffer fetch.
    pub fn fetched(line: Option<&str>, status: i64) -> Self {
        Self {
            out_binds: OutBinds {
                line: line.map(str::to_string),
                status: Some(status),
            },
            rows: Vec::new(),
        }
    }

    /// An execution that returned rows.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            out_binds: OutBinds::default(),
            rows,
        }
    }
}

/// A stateful connection to the database.
///
/// Calls on one session are strictly sequential; the `&mut self` receiver
/// guarantees no two statements are in flight at once.
#[async_trait]
pub trait Session: Send {
    /// Executes a statement with the given binds.
    async fn execute(
        &mut self,
        statement: Statement,
        binds: &Binds,
    ) -> Result<Execution, SessionError>;

    /// Releases the session. Closing twice is a no-op.
    async fn close(&mut self);

    /// Releases the session without awaiting; used when the owner is dropped
    /// before `close`. The underlying connection must not be reused.
    fn abandon(&mut self);
}

/// Source of sessions, typically a connection pool.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Acquires a fresh session.
    async fn get_connection(&self) -> Result<Box<dyn Session>, SessionError>;
}

/// Renders a bind value as the text parameter the procedures take.
///
/// Strings pass through, numbers use their JSON text, booleans become the
/// `Y`/`N` flag convention and null or absent values bind SQL NULL.
pub fn bind_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("Y".to_string()),
        Value::Bool(false) => Some("N".to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholders_match_parameters() {
        for statement in Statement::ALL {
            let placeholders = statement.sql().matches('$').count();
            assert_eq!(
                placeholders,
                statement.parameters().len(),
                "{}",
                statement.name()
            );
        }
    }

    #[test]
    fn only_lookups_are_queries() {
        assert!(Statement::GetLine.is_query());
        assert!(Statement::PersonExists.is_query());
        assert!(!Statement::GetHolds.is_query());
    }

    #[test]
    fn bind_text_conventions() {
        assert_eq!(bind_text(None), None);
        assert_eq!(bind_text(Some(&Value::Null)), None);
        assert_eq!(bind_text(Some(&json!("201901"))), Some("201901".to_string()));
        assert_eq!(bind_text(Some(&json!(3))), Some("3".to_string()));
        assert_eq!(bind_text(Some(&json!(true))), Some("Y".to_string()));
        assert_eq!(bind_text(Some(&json!(false))), Some("N".to_string()));
    }

    #[test]
    fn fetched_execution() {
        let execution = Execution::fetched(Some("a;b"), 0);
        assert_eq!(execution.out_binds.line.as_deref(), Some("a;b"));
        assert_eq!(execution.out_binds.status, Some(0));
        assert!(execution.rows.is_empty());
    }
}
