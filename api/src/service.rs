use axum::{extract::State, Json};
use dbforum_shared::Status;
use rusqlite::Connection;

use crate::{db, error::Result, AppState};

/// Deletes every row, children before parents, in one transaction.
pub fn clear(conn: &mut Connection) -> Result<()> {
    let tx = db::write_tx(conn)?;
    tx.execute_batch(
        "DELETE FROM votes;
         DELETE FROM posts;
         DELETE FROM forum_users;
         DELETE FROM threads;
         DELETE FROM forums;
         DELETE FROM users;",
    )?;
    tx.commit()?;
    tracing::warn!("all forum data cleared");
    Ok(())
}

pub fn status(conn: &mut Connection) -> Result<Status> {
    let tx = conn.transaction()?;
    let count = |table: &str| -> rusqlite::Result<i64> {
        tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
    };
    let status = Status {
        user: count("users")?,
        forum: count("forums")?,
        thread: count("threads")?,
        post: count("posts")?,
    };
    tx.commit()?;
    Ok(status)
}

/// POST /api/service/clear
pub async fn clear_all(State(state): State<AppState>) -> Result<()> {
    db::run(&state.db, clear).await
}

/// GET /api/service/status
pub async fn service_status(State(state): State<AppState>) -> Result<Json<Status>> {
    let status = db::run(&state.db, status).await?;
    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::create_batch;
    use crate::testing::{post, seed_world};
    use crate::threads::ThreadRef;
    use crate::votes;
    use dbforum_shared::{Vote, Voice};

    #[test]
    fn status_counts_and_clear_empties_everything() {
        let (_dir, pool) = db::temp_pool();
        let mut conn = pool.get().unwrap();
        let thread = seed_world(&mut conn);
        let at = ThreadRef::Id(thread.id);
        create_batch(&mut conn, &at, &[post("alice", 0), post("alice", 0)]).unwrap();
        let ballot = Vote {
            nickname: "alice".into(),
            voice: Voice::Up,
        };
        votes::cast(&mut conn, &at, &ballot).unwrap();

        assert_eq!(
            status(&mut conn).unwrap(),
            Status { user: 1, forum: 1, thread: 1, post: 2 }
        );

        clear(&mut conn).unwrap();
        assert_eq!(
            status(&mut conn).unwrap(),
            Status { user: 0, forum: 0, thread: 0, post: 0 }
        );

        // ids keep increasing after a clear
        let again = seed_world(&mut conn);
        assert!(again.id > thread.id);
    }
}
