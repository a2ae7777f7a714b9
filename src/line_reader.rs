//! Draining the buffered-output line protocol.
//!
//! After an initiating procedure call, its output sits in a per-session line
//! buffer. Each get-line fetch returns at most one line plus a status; status
//! `1` means the buffer is exhausted. Fetches must be issued one at a time on
//! the same session and are never retried: the buffer is a single cursor.

use serde_json::Map;

use crate::{Session, SessionError, Statement};

/// Status reported by get-line once no more output remains.
pub const NO_MORE_LINES: i64 = 1;

/// Default cap on get-line fetches for a single drain.
pub const DEFAULT_FETCH_LIMIT: usize = 100_000;

/// Reads a session's line buffer to exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineReader {
    fetch_limit: usize,
}

impl LineReader {
    /// Creates a reader that gives up after `fetch_limit` fetches.
    pub fn new(fetch_limit: usize) -> Self {
        Self { fetch_limit }
    }

    /// The maximum number of fetches per drain.
    pub fn fetch_limit(&self) -> usize {
        self.fetch_limit
    }

    /// Fetches lines until the terminal status, returning them in emission order.
    ///
    /// A fetch without a line (or with an empty one) contributes nothing but is
    /// not an error. An empty result is valid and means the procedure produced
    /// no rows.
    pub async fn drain<S>(&self, session: &mut S) -> Result<Vec<String>, SessionError>
    where
        S: Session + ?Sized,
    {
        let binds = Map::new();
        let mut lines = Vec::new();
        for _ in 0..self.fetch_limit {
            let execution = session.execute(Statement::GetLine, &binds).await?;
            if let Some(line) = execution.out_binds.line.filter(|l| !l.is_empty()) {
                lines.push(line);
            }
            if execution.out_binds.status == Some(NO_MORE_LINES) {
                tracing::debug!(lines = lines.len(), "line buffer drained");
                return Ok(lines);
            }
        }
        tracing::error!(limit = self.fetch_limit, "line buffer never reported completion");
        Err(SessionError::Overrun(self.fetch_limit))
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_LIMIT)
    }
}

/// Drains `session` with the default fetch limit.
pub async fn drain<S>(session: &mut S) -> Result<Vec<String>, SessionError>
where
    S: Session + ?Sized,
{
    LineReader::default().drain(session).await
}
