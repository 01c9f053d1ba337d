//! Thread post listings in `flat`, `tree` and `parent_tree` order.
//!
//! Every mode pages with an exclusive `since` cursor: the anchor itself is
//! never returned again.
//!
//! - `flat` orders by id, i.e. arrival order. The cursor is an id.
//! - `tree` orders by materialized path (depth-first preorder). The cursor is
//!   the id of a post in the thread, compared by its path; an id from elsewhere
//!   filters by id instead. Descending reverses siblings at every depth but
//!   still lists a post before its replies.
//! - `parent_tree` pages over root posts; `limit` and `since` apply to root ids
//!   only, and each selected root comes back with its whole subtree in
//!   preorder. Descending picks the largest root ids first.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use dbforum_shared::Post;
use rusqlite::{types::Value, Connection, OptionalExtension};
use serde::Deserialize;

use crate::{
    db,
    error::Result,
    path::PostPath,
    posts::{post_from_row, POST_COLUMNS},
    threads::{self, ThreadRef},
    AppState, DEFAULT_LIMIT,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    Flat,
    Tree,
    ParentTree,
}

impl SortMode {
    /// Unknown or missing tokens fall back to `flat`.
    pub fn parse(token: Option<&str>) -> Self {
        match token {
            Some("tree") => SortMode::Tree,
            Some("parent_tree") => SortMode::ParentTree,
            _ => SortMode::Flat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub limit: u32,
    pub since: Option<i64>,
    pub sort: SortMode,
    pub desc: bool,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            since: None,
            sort: SortMode::Flat,
            desc: false,
        }
    }
}

impl PostQuery {
    /// `(comparison, order)` SQL fragments for the requested direction.
    fn direction(&self) -> (&'static str, &'static str) {
        if self.desc {
            ("<", "DESC")
        } else {
            (">", "ASC")
        }
    }
}

pub fn list(conn: &mut Connection, thread: &ThreadRef, query: &PostQuery) -> Result<Vec<Post>> {
    let tx = conn.transaction()?;
    let (thread_id, _) = threads::resolve(&tx, thread)?;

    let posts = match query.sort {
        SortMode::Flat => flat(&tx, thread_id, query)?,
        SortMode::Tree => tree(&tx, thread_id, query)?,
        SortMode::ParentTree => parent_tree(&tx, thread_id, query)?,
    };
    tx.commit()?;

    tracing::debug!(thread = thread_id, ?query, returned = posts.len(), "posts listed");
    Ok(posts)
}

fn collect(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Post>> {
    let mut stmt = conn.prepare(sql)?;
    let posts = stmt
        .query_map(params, post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

fn flat(conn: &Connection, thread: i64, query: &PostQuery) -> Result<Vec<Post>> {
    let (cmp, order) = query.direction();
    collect(
        conn,
        &format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE thread = ?1 AND (?2 IS NULL OR id {cmp} ?2)
             ORDER BY id {order}
             LIMIT ?3"
        ),
        rusqlite::params![thread, query.since, query.limit],
    )
}

fn tree(conn: &Connection, thread: i64, query: &PostQuery) -> Result<Vec<Post>> {
    let key = if query.desc { "path_desc" } else { "path" };
    let (cmp, _) = query.direction();

    // An anchor outside the thread still pages, by id like `flat`.
    let (filter, cursor) = match query.since {
        None => ("?2 IS NULL".to_string(), Value::Null),
        Some(id) => match anchor_path(conn, thread, id)? {
            Some(path) if query.desc => (format!("{key} > ?2"), Value::Blob(path.descending_key())),
            Some(path) => (format!("{key} > ?2"), Value::Blob(path.ascending_key())),
            None => (format!("id {cmp} ?2"), Value::Integer(id)),
        },
    };

    collect(
        conn,
        &format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE thread = ?1 AND {filter}
             ORDER BY {key}
             LIMIT ?3"
        ),
        rusqlite::params![thread, cursor, query.limit],
    )
}

fn parent_tree(conn: &Connection, thread: i64, query: &PostQuery) -> Result<Vec<Post>> {
    let (cmp, order) = query.direction();
    collect(
        conn,
        &format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE thread = ?1 AND root IN (
                 SELECT id FROM posts
                 WHERE thread = ?1 AND parent = 0 AND (?2 IS NULL OR id {cmp} ?2)
                 ORDER BY id {order}
                 LIMIT ?3
             )
             ORDER BY root {order}, path"
        ),
        rusqlite::params![thread, query.since, query.limit],
    )
}

fn anchor_path(conn: &Connection, thread: i64, id: i64) -> Result<Option<PostPath>> {
    let path = conn
        .query_row(
            "SELECT path FROM posts WHERE id = ?1 AND thread = ?2",
            [id, thread],
            |row| row.get(0),
        )
        .optional()?;
    Ok(path)
}

// ── Handlers ──

#[derive(Debug, Default, Deserialize)]
pub struct PostListParams {
    limit: Option<u32>,
    since: Option<i64>,
    sort: Option<String>,
    desc: Option<bool>,
}

impl From<PostListParams> for PostQuery {
    fn from(params: PostListParams) -> Self {
        Self {
            limit: params.limit.filter(|&n| n > 0).unwrap_or(DEFAULT_LIMIT),
            // 0 is how clients spell "from the start"
            since: params.since.filter(|&id| id > 0),
            sort: SortMode::parse(params.sort.as_deref()),
            desc: params.desc.unwrap_or(false),
        }
    }
}

/// GET /api/thread/{slug_or_id}/posts?limit=10&since=4&sort=tree&desc=false
pub async fn thread_posts(
    State(state): State<AppState>,
    Path(slug_or_id): Path<String>,
    Query(params): Query<PostListParams>,
) -> Result<Json<Vec<Post>>> {
    let query = PostQuery::from(params);
    let posts = db::run(&state.db, move |conn| {
        list(conn, &ThreadRef::from(slug_or_id.as_str()), &query)
    })
    .await?;
    Ok(Json(posts))
}
