//! # OnBase: Student Records over a Line-Buffer Protocol
//!
//! The OnBase integration exposes admission applications, financial aid
//! tracking requirements, registration holds and indexed documents as JSON:API
//! resources. The records live behind stored procedures that do not return
//! result sets; instead they write delimited text lines into a per-session
//! output buffer which the caller drains one line at a time.
//!
//! This crate provides:
//!
//! - **Sessions**: the [`Session`] and [`ConnectionProvider`] traits, a
//!   PostgreSQL implementation in [`sql`], and an in-memory scripted double for
//!   tests
//! - **Line reading**: [`LineReader`] drains the buffer to its terminal status
//!   with a bounded loop
//! - **Error signals**: procedures report failures in a positional field of the
//!   first line; [`error_signal`] extracts and classifies them
//! - **Record parsing**: positional [`Fields`] and per-resource parsers that
//!   group related lines into nested resources
//! - **HTTP API**: axum routes speaking JSON:API under `/api/v1`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HTTP API Layer (axum routes, JSON:API)  │
//! ├─────────────────────────────────────────┤
//! │ Operations (OnBase pipeline)            │
//! ├─────────────────────────────────────────┤
//! │ Error signal + record parsing           │
//! ├─────────────────────────────────────────┤
//! │ Line reader                             │
//! ├─────────────────────────────────────────┤
//! │ Session (sqlx pool or scripted double)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! # use std::sync::Arc;
//! # use onbase::{OnBase, OsuId, ScriptedConnectionProvider, ScriptedSession};
//! # tokio_test_block(async {
//! let provider = Arc::new(ScriptedConnectionProvider::new());
//! provider.push(ScriptedSession::for_person(&[
//!     "931234567;AR;Accounts Receivable;;;;;;;;;;;;125.00;BUS;N;",
//! ]));
//! let onbase = OnBase::new(provider.clone());
//! let osu_id = OsuId::new("931234567").unwrap();
//! let holds = onbase.get_holds(&osu_id, None).await.unwrap();
//! assert_eq!(holds.holds[0].code, "AR");
//! assert_eq!(provider.closes(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

mod errors;
mod line_reader;
mod operations;
mod osu_id;
mod record;
mod scripted;

/// Admission applications and their checklists.
pub mod admission;

/// JSON:API documents, error responses and shared router state.
pub mod api;

/// Service configuration from flags, YAML and the environment.
pub mod config;

/// Indexed documents.
pub mod document;

/// Extraction and classification of procedure error signals.
pub mod error_signal;

/// Financial aid tracking requirements.
pub mod financial_aid;

/// Registration holds.
pub mod holds;

/// The combined router.
pub mod router;

/// Statements, binds and the session traits.
pub mod session;

/// PostgreSQL sessions.
pub mod sql;

pub use errors::{OnBaseError, RecordParseError, SessionError};
pub use line_reader::{DEFAULT_FETCH_LIMIT, LineReader, NO_MORE_LINES, drain};
pub use operations::OnBase;
pub use osu_id::{OsuId, OsuIdParseError};
pub use record::{
    DEFAULT_DELIMITER, Fields, LineFormat, LineFormats, REASON_SEPARATOR, ResourceKind,
};
pub use router::create_router;
pub use scripted::{ScriptedConnectionProvider, ScriptedSession, fetches};
pub use session::{Binds, ConnectionProvider, Execution, OutBinds, Row, Session, Statement};
