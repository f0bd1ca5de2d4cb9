//! Request-scoped database session
//!
//! The session transaction starts at the first write. Until then reads run on a
//! pooled connection and hold no lock, so upstream calls made before the first
//! write never keep other writers waiting. Units of work run in save-points from
//! [`DbSession::begin_nested`], which roll back when dropped uncommitted.
//! Dropping the session itself rolls back everything not yet committed.

use sqlx::pool::PoolConnection;
use sqlx::{Connection, Sqlite, SqliteConnection, Transaction};
use std::ops::{Deref, DerefMut};
use tracing::debug;

use super::{DatabaseError, DbPool};

/// A write statement that touches no rows. Running it first makes the deferred
/// `BEGIN` take the write lock at once, the way `BEGIN IMMEDIATE` does, so a
/// busy database is waited on through `busy_timeout` instead of failing later
/// on a read-to-write upgrade.
const TAKE_WRITE_LOCK: &str = "DELETE FROM portfolio_entries WHERE 0";

pub struct DbSession {
    pool: DbPool,
    tx: Option<Transaction<'static, Sqlite>>,
}

/// Connection handed out for reads: the session transaction once it exists,
/// a pooled autocommit connection before that.
pub enum SessionConn<'a> {
    Session(&'a mut SqliteConnection),
    Pooled(PoolConnection<Sqlite>),
}

impl Deref for SessionConn<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match self {
            SessionConn::Session(conn) => conn,
            SessionConn::Pooled(conn) => conn,
        }
    }
}

impl DerefMut for SessionConn<'_> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match self {
            SessionConn::Session(conn) => conn,
            SessionConn::Pooled(conn) => conn,
        }
    }
}

impl DbSession {
    pub fn begin(pool: &DbPool) -> Self {
        Self {
            pool: pool.clone(),
            tx: None,
        }
    }

    /// Whether the session has written anything yet
    pub fn is_writing(&self) -> bool {
        self.tx.is_some()
    }

    async fn writer(&mut self) -> Result<&mut Transaction<'static, Sqlite>, DatabaseError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                let mut tx = self.pool.begin().await?;
                sqlx::query(TAKE_WRITE_LOCK).execute(&mut *tx).await?;
                debug!("Session write transaction started");
                tx
            }
        };
        Ok(self.tx.insert(tx))
    }

    /// Open a save-point inside the session transaction, starting it if needed
    pub async fn begin_nested(&mut self) -> Result<Transaction<'_, Sqlite>, DatabaseError> {
        let tx = self.writer().await?;
        let savepoint = Connection::begin(&mut **tx).await?;
        Ok(savepoint)
    }

    /// Connection for reads outside any save-point
    pub async fn conn(&mut self) -> Result<SessionConn<'_>, DatabaseError> {
        match self.tx.as_mut() {
            Some(tx) => Ok(SessionConn::Session(&mut **tx)),
            None => Ok(SessionConn::Pooled(self.pool.acquire().await?)),
        }
    }

    pub async fn commit(self) -> Result<(), DatabaseError> {
        if let Some(tx) = self.tx {
            tx.commit().await?;
            debug!("Session committed");
        }
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), DatabaseError> {
        if let Some(tx) = self.tx {
            tx.rollback().await?;
            debug!("Session rolled back");
        }
        Ok(())
    }
}
