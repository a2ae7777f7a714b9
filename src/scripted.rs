//! # Scripted Sessions
//!
//! An in-memory [`ConnectionProvider`] whose sessions replay a fixed script of
//! executions. Every executed statement, its binds, every `close()` and every
//! abandoned session are recorded in a journal shared between the provider
//! and its sessions, so a test can assert on the exact protocol traffic after
//! a session is gone.
//!
//! ```rust
//! use onbase::{ScriptedConnectionProvider, ScriptedSession};
//!
//! let provider = ScriptedConnectionProvider::new();
//! provider.push(ScriptedSession::for_person(&["0;201901;3"]));
//! assert_eq!(provider.pending(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::line_reader::NO_MORE_LINES;
use crate::{Binds, ConnectionProvider, Execution, Session, SessionError, Statement};

#[derive(Debug, Default)]
struct Journal {
    executed: Vec<(Statement, Binds)>,
    closes: usize,
    abandoned: usize,
    acquired: usize,
}

/// A session that answers each `execute` with the next scripted execution.
#[derive(Debug)]
pub struct ScriptedSession {
    script: VecDeque<Execution>,
    failure: Option<(usize, SessionError)>,
    stall: Option<usize>,
    calls: usize,
    closed: bool,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedSession {
    /// Creates a session that replays `script` in order.
    pub fn new(script: Vec<Execution>) -> Self {
        Self {
            script: script.into(),
            failure: None,
            stall: None,
            calls: 0,
            closed: false,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    /// Script for an existing person: the existence row, the initiating call,
    /// then one fetch per line with the terminal status on the last.
    pub fn for_person(lines: &[&str]) -> Self {
        let mut script = vec![
            Execution::with_rows(vec![vec![Some("exists".to_string())]]),
            Execution::default(),
        ];
        script.extend(fetches(lines));
        Self::new(script)
    }

    /// Script for a person the existence query does not find.
    pub fn for_missing_person() -> Self {
        Self::new(vec![Execution::with_rows(Vec::new())])
    }

    /// Makes every call after the first `calls` fail with `error`.
    pub fn fail_after(&mut self, calls: usize, error: SessionError) {
        self.failure = Some((calls, error));
    }

    /// Makes every call after the first `calls` wait forever.
    pub fn stall_after(&mut self, calls: usize) {
        self.stall = Some(calls);
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<Statement> {
        self.journal
            .lock()
            .unwrap()
            .executed
            .iter()
            .map(|(statement, _)| *statement)
            .collect()
    }
}

/// Fetch executions that yield `lines` and then report exhaustion.
pub fn fetches(lines: &[&str]) -> Vec<Execution> {
    if lines.is_empty() {
        return vec![Execution::fetched(None, NO_MORE_LINES)];
    }
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let status = if idx + 1 == lines.len() { NO_MORE_LINES } else { 0 };
            Execution::fetched(Some(line), status)
        })
        .collect()
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(
        &mut self,
        statement: Statement,
        binds: &Binds,
    ) -> Result<Execution, SessionError> {
        self.journal
            .lock()
            .unwrap()
            .executed
            .push((statement, binds.clone()));
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.calls += 1;
        if self.stall.is_some_and(|after| self.calls > after) {
            std::future::pending::<()>().await;
        }
        if let Some((limit, error)) = &self.failure {
            if self.calls > *limit {
                return Err(error.clone());
            }
        }
        self.script.pop_front().ok_or_else(|| {
            SessionError::Database(format!("no scripted result for {}", statement.name()))
        })
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.journal.lock().unwrap().closes += 1;
        }
    }

    fn abandon(&mut self) {
        if !self.closed {
            self.closed = true;
            self.journal.lock().unwrap().abandoned += 1;
        }
    }
}

/// A provider handing out pre-scripted sessions in push order.
#[derive(Debug, Default)]
pub struct ScriptedConnectionProvider {
    sessions: Mutex<VecDeque<ScriptedSession>>,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedConnectionProvider {
    /// Creates a provider with no sessions queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a session for the next `get_connection`.
    pub fn push(&self, mut session: ScriptedSession) {
        session.journal = self.journal.clone();
        self.sessions.lock().unwrap().push_back(session);
    }

    /// Number of queued sessions not yet handed out.
    pub fn pending(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Number of sessions handed out.
    pub fn acquired(&self) -> usize {
        self.journal.lock().unwrap().acquired
    }

    /// Number of sessions closed.
    pub fn closes(&self) -> usize {
        self.journal.lock().unwrap().closes
    }

    /// Number of sessions abandoned without a close.
    pub fn abandoned(&self) -> usize {
        self.journal.lock().unwrap().abandoned
    }

    /// Statements executed across all sessions, in order.
    pub fn executed(&self) -> Vec<Statement> {
        self.journal
            .lock()
            .unwrap()
            .executed
            .iter()
            .map(|(statement, _)| *statement)
            .collect()
    }

    /// Binds of the most recent execution of `statement`.
    pub fn binds_for(&self, statement: Statement) -> Option<Binds> {
        self.journal
            .lock()
            .unwrap()
            .executed
            .iter()
            .rev()
            .find(|(s, _)| *s == statement)
            .map(|(_, binds)| binds.clone())
    }
}

#[async_trait]
impl ConnectionProvider for ScriptedConnectionProvider {
    async fn get_connection(&self) -> Result<Box<dyn Session>, SessionError> {
        let session = self.sessions.lock().unwrap().pop_front();
        match session {
            Some(session) => {
                self.journal.lock().unwrap().acquired += 1;
                Ok(Box::new(session))
            }
            None => Err(SessionError::Unavailable(
                "no scripted session queued".to_string(),
            )),
        }
    }
}
