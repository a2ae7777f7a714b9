use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use crate::session::{OutBinds, bind_text};
use crate::{Binds, ConnectionProvider, Execution, Session, SessionError, Statement};

const ENABLE_OUTPUT: &str = "SELECT dbms_output.enable()";
const DISABLE_OUTPUT: &str = "SELECT dbms_output.disable()";

/// Binds for `statement` as text parameters in placeholder order.
///
/// Parameters missing from `binds` bind SQL NULL.
pub fn ordered_binds(statement: Statement, binds: &Binds) -> Vec<Option<String>> {
    statement
        .parameters()
        .iter()
        .map(|name| bind_text(binds.get(*name)))
        .collect()
}

/////////////////////////////////////////// PgConnectionProvider ///////////////////////////////////////

/// A sqlx pool handing out [`PgSession`]s.
#[derive(Debug, Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
}

impl PgConnectionProvider {
    /// Connects a pool of at most `max_connections` to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, SessionError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    async fn get_connection(&self) -> Result<Box<dyn Session>, SessionError> {
        let mut conn = self.pool.acquire().await?;
        // Disabling first clears anything a previous owner left in the buffer.
        sqlx::query(DISABLE_OUTPUT).execute(&mut *conn).await?;
        sqlx::query(ENABLE_OUTPUT).execute(&mut *conn).await?;
        Ok(Box::new(PgSession { conn: Some(conn) }))
    }
}

///////////////////////////////////////////////// PgSession ////////////////////////////////////////////

/// A pooled connection with the output buffer enabled.
///
/// Closing disables the buffer, discarding unread lines, and returns the
/// connection to the pool. If the buffer cannot be reset, or the session is
/// dropped without a close, the connection is detached from the pool and
/// closed rather than handed to the next request.
pub struct PgSession {
    conn: Option<PoolConnection<Postgres>>,
}

#[async_trait]
impl Session for PgSession {
    async fn execute(
        &mut self,
        statement: Statement,
        binds: &Binds,
    ) -> Result<Execution, SessionError> {
        let conn = self.conn.as_mut().ok_or(SessionError::Closed)?;
        let params = ordered_binds(statement, binds);
        match statement {
            Statement::GetLine => {
                let (line, status) = sqlx::query_as::<_, (Option<String>, Option<i32>)>(
                    statement.sql(),
                )
                .fetch_one(&mut **conn)
                .await?;
                Ok(Execution {
                    out_binds: OutBinds {
                        line,
                        status: status.map(i64::from),
                    },
                    rows: Vec::new(),
                })
            }
            Statement::PersonExists => {
                let mut query = sqlx::query_as::<_, (Option<String>,)>(statement.sql());
                for param in params {
                    query = query.bind(param);
                }
                let rows = query.fetch_all(&mut **conn).await?;
                Ok(Execution::with_rows(
                    rows.into_iter().map(|(id,)| vec![id]).collect(),
                ))
            }
            _ => {
                let mut query = sqlx::query(statement.sql());
                for param in params {
                    query = query.bind(param);
                }
                query.execute(&mut **conn).await?;
                Ok(Execution::default())
            }
        }
    }

    async fn close(&mut self) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        let reset = sqlx::query(DISABLE_OUTPUT).execute(&mut **conn).await;
        match reset {
            Ok(_) => self.conn = None,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "failed to reset output buffer; discarding connection"
                );
                self.abandon();
            }
        }
    }

    fn abandon(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("detaching connection from the pool");
            drop(conn.detach());
        }
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_reader::NO_MORE_LINES;
    use serde_json::json;

    #[test]
    fn binds_follow_parameter_order() {
        let mut binds = Binds::new();
        binds.insert("checklistCode".to_string(), json!("TRAN"));
        binds.insert("osuId".to_string(), json!("123456789"));
        binds.insert("applicationNumber".to_string(), json!(3));
        binds.insert("termCode".to_string(), json!("201901"));
        assert_eq!(
            ordered_binds(Statement::PatchApplications, &binds),
            vec![
                Some("123456789".to_string()),
                Some("201901".to_string()),
                Some("3".to_string()),
                Some("TRAN".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn get_line_binds_nothing() {
        let mut binds = Binds::new();
        binds.insert("osuId".to_string(), json!("123456789"));
        assert!(ordered_binds(Statement::GetLine, &binds).is_empty());
    }

    #[tokio::test]
    async fn empty_buffer_reports_no_more_lines() {
        let Some(pool) = crate::sql::tests::connect_test_db().await else {
            return;
        };
        let provider = PgConnectionProvider::from_pool(pool);
        let mut session = provider.get_connection().await.unwrap();
        let execution = session
            .execute(Statement::GetLine, &Binds::new())
            .await
            .unwrap();
        assert_eq!(execution.out_binds.status, Some(NO_MORE_LINES));
        session.close().await;
        let err = session
            .execute(Statement::GetLine, &Binds::new())
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Closed);
    }

    #[tokio::test]
    async fn acquire_discards_leftover_output() {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            return;
        };
        // One connection, so the session below reuses the one written to here.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query(ENABLE_OUTPUT).execute(&mut *conn).await.unwrap();
        sqlx::query("SELECT dbms_output.put_line('left behind')")
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);

        let provider = PgConnectionProvider::from_pool(pool);
        let mut session = provider.get_connection().await.unwrap();
        let execution = session
            .execute(Statement::GetLine, &Binds::new())
            .await
            .unwrap();
        assert_eq!(execution.out_binds.line, None);
        assert_eq!(execution.out_binds.status, Some(NO_MORE_LINES));
        session.close().await;
    }
}
