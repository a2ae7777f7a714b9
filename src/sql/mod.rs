//! PostgreSQL sessions for the OnBase procedures.
//!
//! The procedures are installed in an `onbase` schema and write their output
//! through orafce's `dbms_output` package. A [`PgConnectionProvider`] hands out
//! pooled connections with the output buffer enabled.

/// Pooled connections implementing [`crate::Session`].
pub mod session;

pub use session::{PgConnectionProvider, PgSession, ordered_binds};

#[cfg(test)]
/// Test utilities for PostgreSQL sessions.
pub mod tests {
    use sqlx::PgPool;

    /// Connects to `TEST_DATABASE_URL`, or `None` when it is unset.
    ///
    /// Database-backed tests skip themselves without a configured database.
    pub async fn connect_test_db() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        Some(
            PgPool::connect(&url)
                .await
                .expect("Failed to connect to test database"),
        )
    }
}
