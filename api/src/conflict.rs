//! Unique-key collisions on create.
//!
//! Creates never pre-check for an existing row. They attempt the insert and,
//! when storage reports a unique violation, roll back and look up the rows that
//! own the key so the caller can show them.

use rusqlite::{ffi, Connection, Transaction};

use crate::{
    db,
    error::{Existing, ForumError, Result},
};

pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Runs `insert` in a write transaction and commits it, or turns a unique
/// violation into [`ForumError::Duplicate`] carrying whatever `existing` finds
/// once the transaction has been rolled back.
pub fn insert_or_existing<T>(
    conn: &mut Connection,
    insert: impl FnOnce(&Transaction<'_>) -> Result<T>,
    existing: impl FnOnce(&Connection) -> Result<Existing>,
) -> Result<T> {
    let tx = db::write_tx(conn)?;
    let outcome = insert(&tx);
    match outcome {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(ForumError::Storage(err)) if is_unique_violation(&err) => {
            tx.rollback()?;
            let found = existing(conn)?;
            tracing::debug!(existing = ?found, "unique key already taken");
            Err(ForumError::Duplicate(found))
        }
        Err(err) => Err(err),
    }
}
