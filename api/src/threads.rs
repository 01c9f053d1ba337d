use std::fmt;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use dbforum_shared::{NewThread, Thread, ThreadUpdate};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::{
    conflict, db, forum,
    error::{Existing, ForumError, Result},
    users, AppState, DEFAULT_LIMIT,
};

/// A thread addressed either by numeric id or by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadRef {
    Id(i64),
    Slug(String),
}

impl From<&str> for ThreadRef {
    fn from(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(id) => ThreadRef::Id(id),
            Err(_) => ThreadRef::Slug(raw.to_string()),
        }
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadRef::Id(id) => write!(f, "{id}"),
            ThreadRef::Slug(slug) => f.write_str(slug),
        }
    }
}

pub(crate) const THREAD_COLUMNS: &str = "id, title, author, forum, message, votes, slug, created";

pub(crate) fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        forum: row.get(3)?,
        message: row.get(4)?,
        votes: row.get(5)?,
        slug: row.get(6)?,
        created: row.get(7)?,
    })
}

fn select_by_ref(conn: &Connection, thread: &ThreadRef) -> rusqlite::Result<Option<Thread>> {
    match thread {
        ThreadRef::Id(id) => conn.query_row(
            &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1"),
            [id],
            thread_from_row,
        ),
        ThreadRef::Slug(slug) => conn.query_row(
            &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE slug = ?1"),
            [slug],
            thread_from_row,
        ),
    }
    .optional()
}

pub fn find(conn: &Connection, thread: &ThreadRef) -> Result<Thread> {
    select_by_ref(conn, thread)?
        .ok_or_else(|| ForumError::ThreadNotFound(thread.to_string()))
}

/// Thread id and forum slug, the two facts every post operation needs.
pub fn resolve(conn: &Connection, thread: &ThreadRef) -> Result<(i64, String)> {
    let found = match thread {
        ThreadRef::Id(id) => conn.query_row(
            "SELECT id, forum FROM threads WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ),
        ThreadRef::Slug(slug) => conn.query_row(
            "SELECT id, forum FROM threads WHERE slug = ?1",
            [slug],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ),
    }
    .optional()?;
    found.ok_or_else(|| ForumError::ThreadNotFound(thread.to_string()))
}

pub fn create(conn: &mut Connection, forum_slug: &str, new: &NewThread) -> Result<Thread> {
    let slug = new.slug.clone().filter(|s| !s.is_empty());
    let created = new.created.unwrap_or_else(Utc::now);

    let thread = conflict::insert_or_existing(
        conn,
        |tx| {
            let forum = forum::canonical_slug(tx, forum_slug)?;
            let author = users::canonical_nickname(tx, &new.author)?;

            tx.execute(
                "INSERT INTO threads (slug, forum, author, title, message, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![slug, forum, author, new.title, new.message, created],
            )?;
            let id = tx.last_insert_rowid();

            forum::add_member(tx, &forum, &author)?;
            tx.execute(
                "UPDATE forums SET threads = threads + 1 WHERE slug = ?1",
                [&forum],
            )?;

            Ok(Thread {
                id,
                title: new.title.clone(),
                author,
                forum,
                message: new.message.clone(),
                votes: 0,
                slug: slug.clone(),
                created,
            })
        },
        |conn| {
            let taken = ThreadRef::Slug(slug.clone().unwrap_or_default());
            find(conn, &taken).map(Existing::Thread)
        },
    )?;

    tracing::info!(thread = thread.id, forum = %thread.forum, "thread created");
    Ok(thread)
}

/// Replaces title and message; absent or empty fields keep their stored value.
pub fn update(conn: &mut Connection, thread: &ThreadRef, changes: &ThreadUpdate) -> Result<Thread> {
    let tx = db::write_tx(conn)?;
    let mut current = find(&tx, thread)?;

    if let Some(title) = changes.title.as_ref().filter(|t| !t.is_empty()) {
        current.title = title.clone();
    }
    if let Some(message) = changes.message.as_ref().filter(|m| !m.is_empty()) {
        current.message = message.clone();
    }

    tx.execute(
        "UPDATE threads SET title = ?2, message = ?3 WHERE id = ?1",
        rusqlite::params![current.id, current.title, current.message],
    )?;
    tx.commit()?;
    Ok(current)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadListParams {
    pub limit: Option<u32>,
    /// Inclusive lower (or, descending, upper) bound on `created`.
    pub since: Option<DateTime<Utc>>,
    pub desc: Option<bool>,
}

pub fn list_for_forum(conn: &Connection, forum_slug: &str, params: &ThreadListParams) -> Result<Vec<Thread>> {
    let forum = forum::canonical_slug(conn, forum_slug)?;
    let limit = params.limit.filter(|&n| n > 0).unwrap_or(DEFAULT_LIMIT);

    let sql = if params.desc.unwrap_or(false) {
        format!(
            "SELECT {THREAD_COLUMNS} FROM threads
             WHERE forum = ?1 AND (?2 IS NULL OR created <= ?2)
             ORDER BY created DESC, id DESC
             LIMIT ?3"
        )
    } else {
        format!(
            "SELECT {THREAD_COLUMNS} FROM threads
             WHERE forum = ?1 AND (?2 IS NULL OR created >= ?2)
             ORDER BY created, id
             LIMIT ?3"
        )
    };

    let mut stmt = conn.prepare(&sql)?;
    let threads = stmt
        .query_map(rusqlite::params![forum, params.since, limit], thread_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(threads)
}

// ── Handlers ──

/// GET /api/thread/{slug_or_id}/details
pub async fn thread_details(
    State(state): State<AppState>,
    Path(slug_or_id): Path<String>,
) -> Result<Json<Thread>> {
    let thread = db::run(&state.db, move |conn| {
        find(conn, &ThreadRef::from(slug_or_id.as_str()))
    })
    .await?;
    Ok(Json(thread))
}

/// POST /api/thread/{slug_or_id}/details
pub async fn update_thread(
    State(state): State<AppState>,
    Path(slug_or_id): Path<String>,
    Json(payload): Json<ThreadUpdate>,
) -> Result<Json<Thread>> {
    let thread = db::run(&state.db, move |conn| {
        update(conn, &ThreadRef::from(slug_or_id.as_str()), &payload)
    })
    .await?;
    Ok(Json(thread))
}
