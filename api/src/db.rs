use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    config::Config,
    error::{ForumError, Result},
    DbPool,
};

/// Builds the connection pool and brings the schema up to date.
pub fn open(config: &Config) -> Result<DbPool> {
    let busy_timeout = config.busy_timeout;
    let manager = SqliteConnectionManager::file(&config.database_url).with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )
    });
    let pool = r2d2::Pool::builder()
        .max_size(config.pool_size)
        .build(manager)?;

    run_migrations(&pool)?;
    tracing::info!(database = %config.database_url, "database ready");
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            nickname    TEXT PRIMARY KEY COLLATE NOCASE,
            fullname    TEXT NOT NULL DEFAULT '',
            about       TEXT NOT NULL DEFAULT '',
            email       TEXT UNIQUE NOT NULL COLLATE NOCASE
        );

        CREATE TABLE IF NOT EXISTS forums (
            slug        TEXT PRIMARY KEY COLLATE NOCASE,
            title       TEXT NOT NULL,
            owner       TEXT NOT NULL REFERENCES users(nickname),
            posts       INTEGER NOT NULL DEFAULT 0,
            threads     INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS threads (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            slug        TEXT UNIQUE COLLATE NOCASE,
            forum       TEXT NOT NULL REFERENCES forums(slug),
            author      TEXT NOT NULL REFERENCES users(nickname),
            title       TEXT NOT NULL,
            message     TEXT NOT NULL,
            votes       INTEGER NOT NULL DEFAULT 0,
            created     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_threads_forum ON threads(forum, created);

        -- path/path_desc are written right after the insert, once the id is known
        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            parent      INTEGER NOT NULL DEFAULT 0,
            author      TEXT NOT NULL REFERENCES users(nickname),
            message     TEXT NOT NULL,
            is_edited   INTEGER NOT NULL DEFAULT 0,
            thread      INTEGER NOT NULL REFERENCES threads(id),
            forum       TEXT NOT NULL,
            created     TEXT NOT NULL,
            path        BLOB NOT NULL DEFAULT X'',
            path_desc   BLOB NOT NULL DEFAULT X'',
            root        INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_posts_thread_id ON posts(thread, id);
        CREATE INDEX IF NOT EXISTS idx_posts_thread_path ON posts(thread, path);
        CREATE INDEX IF NOT EXISTS idx_posts_thread_path_desc ON posts(thread, path_desc);
        CREATE INDEX IF NOT EXISTS idx_posts_thread_roots ON posts(thread, parent, id);
        CREATE INDEX IF NOT EXISTS idx_posts_root_path ON posts(root, path);

        CREATE TABLE IF NOT EXISTS votes (
            thread      INTEGER NOT NULL REFERENCES threads(id),
            nickname    TEXT NOT NULL COLLATE NOCASE REFERENCES users(nickname),
            voice       INTEGER NOT NULL CHECK (voice IN (-1, 1)),
            PRIMARY KEY (thread, nickname)
        );

        CREATE TABLE IF NOT EXISTS forum_users (
            forum       TEXT NOT NULL COLLATE NOCASE REFERENCES forums(slug),
            nickname    TEXT NOT NULL COLLATE NOCASE REFERENCES users(nickname),
            PRIMARY KEY (forum, nickname)
        );
        ",
    )?;

    Ok(())
}

/// Starts a write transaction that holds the database write lock from its
/// first statement, so reads inside it cannot go stale before the update.
pub fn write_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Runs blocking storage work on the blocking pool with a pooled connection.
pub async fn run<F, T>(pool: &DbPool, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut *conn)
    })
    .await
    .map_err(|e| ForumError::Join(e.to_string()))?
}

#[cfg(test)]
pub(crate) fn temp_pool() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::TempDir::new().unwrap();
    let config = Config {
        database_url: dir.path().join("forum.db").to_string_lossy().into_owned(),
        pool_size: 4,
        ..Config::default()
    };
    let pool = open(&config).unwrap();
    (dir, pool)
}
