use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use dbforum_shared::{NewPost, Post, PostInfo, PostUpdate};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::{
    db, forum,
    error::{ForumError, Result},
    path::PostPath,
    threads::{self, ThreadRef},
    users, AppState,
};

pub(crate) const POST_COLUMNS: &str =
    "id, parent, author, message, is_edited, forum, thread, created, path";

pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let path: PostPath = row.get(8)?;
    Ok(Post {
        id: row.get(0)?,
        parent: row.get(1)?,
        author: row.get(2)?,
        message: row.get(3)?,
        is_edited: row.get(4)?,
        forum: row.get(5)?,
        thread: row.get(6)?,
        created: row.get(7)?,
        path: path.into_ids(),
    })
}

/// Path of `parent`, provided it is a post of `thread`.
fn parent_path(conn: &Connection, parent: i64, thread: i64) -> Result<PostPath> {
    conn.query_row(
        "SELECT path FROM posts WHERE id = ?1 AND thread = ?2",
        [parent, thread],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(ForumError::NoParent)
}

/// Creates every post of the batch, or none of them.
///
/// The thread is resolved first, so an empty batch still reports an unknown
/// thread. Each post is inserted to obtain its id, then its path (the parent's
/// path plus that id) is written in the same transaction. Ids are assigned in
/// submission order, so siblings from one batch keep that order in `tree`
/// listings. A later element may reply to an earlier one.
pub fn create_batch(conn: &mut Connection, thread: &ThreadRef, batch: &[NewPost]) -> Result<Vec<Post>> {
    let tx = db::write_tx(conn)?;
    let (thread_id, forum) = threads::resolve(&tx, thread)?;
    let created = Utc::now();
    let mut posts = Vec::with_capacity(batch.len());

    {
        let mut insert = tx.prepare_cached(
            "INSERT INTO posts (parent, author, message, thread, forum, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut set_path = tx.prepare_cached(
            "UPDATE posts SET path = ?2, path_desc = ?3, root = ?4 WHERE id = ?1",
        )?;

        for new in batch {
            let author = users::canonical_nickname(&tx, &new.author)?;
            let parent = match new.parent {
                0 => None,
                parent => Some(parent_path(&tx, parent, thread_id)?),
            };

            let id = insert.insert(rusqlite::params![
                new.parent,
                author,
                new.message,
                thread_id,
                forum,
                created
            ])?;
            let path = match parent {
                Some(parent) => parent.child(id),
                None => PostPath::root(id),
            };
            set_path.execute(rusqlite::params![
                id,
                path.ascending_key(),
                path.descending_key(),
                path.root_id()
            ])?;

            forum::add_member(&tx, &forum, &author)?;

            posts.push(Post {
                id,
                parent: new.parent,
                author,
                message: new.message.clone(),
                is_edited: false,
                forum: forum.clone(),
                thread: thread_id,
                created,
                path: path.into_ids(),
            });
        }
    }

    if !posts.is_empty() {
        tx.execute(
            "UPDATE forums SET posts = posts + ?2 WHERE slug = ?1",
            rusqlite::params![forum, posts.len() as i64],
        )?;
    }
    tx.commit()?;

    tracing::info!(thread = thread_id, count = posts.len(), "posts created");
    Ok(posts)
}

pub fn get(conn: &Connection, id: i64) -> Result<Post> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
        [id],
        post_from_row,
    )
    .optional()?
    .ok_or(ForumError::PostNotFound(id))
}

/// Overwrites the message verbatim and marks the post edited.
pub fn change_message(conn: &mut Connection, id: i64, message: &str) -> Result<Post> {
    let tx = db::write_tx(conn)?;
    let changed = tx.execute(
        "UPDATE posts SET message = ?2, is_edited = 1 WHERE id = ?1",
        rusqlite::params![id, message],
    )?;
    if changed == 0 {
        return Err(ForumError::PostNotFound(id));
    }
    let post = get(&tx, id)?;
    tx.commit()?;
    Ok(post)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Related {
    User,
    Thread,
    Forum,
}

impl Related {
    /// Parses `user,thread,forum`; unknown entries are ignored.
    pub fn parse_list(raw: &str) -> Vec<Related> {
        raw.split(',')
            .filter_map(|item| match item.trim() {
                "user" => Some(Related::User),
                "thread" => Some(Related::Thread),
                "forum" => Some(Related::Forum),
                _ => None,
            })
            .collect()
    }
}

pub fn details(conn: &Connection, id: i64, related: &[Related]) -> Result<PostInfo> {
    let post = get(conn, id)?;
    let mut info = PostInfo {
        post,
        author: None,
        thread: None,
        forum: None,
    };

    for item in related {
        match item {
            Related::User => info.author = Some(users::profile(conn, &info.post.author)?),
            Related::Thread => {
                info.thread = Some(threads::find(conn, &ThreadRef::Id(info.post.thread))?)
            }
            Related::Forum => info.forum = Some(forum::details(conn, &info.post.forum)?),
        }
    }
    Ok(info)
}

// ── Handlers ──

#[derive(Deserialize)]
pub struct DetailsParams {
    related: Option<String>,
}

/// POST /api/thread/{slug_or_id}/create
pub async fn create_posts(
    State(state): State<AppState>,
    Path(slug_or_id): Path<String>,
    Json(payload): Json<Vec<NewPost>>,
) -> Result<(StatusCode, Json<Vec<Post>>)> {
    let posts = db::run(&state.db, move |conn| {
        create_batch(conn, &ThreadRef::from(slug_or_id.as_str()), &payload)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(posts)))
}

/// GET /api/post/{id}/details?related=user,thread,forum
pub async fn post_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<DetailsParams>,
) -> Result<Json<PostInfo>> {
    let related = params
        .related
        .as_deref()
        .map(Related::parse_list)
        .unwrap_or_default();
    let info = db::run(&state.db, move |conn| details(conn, id, &related)).await?;
    Ok(Json(info))
}

/// POST /api/post/{id}/details
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PostUpdate>,
) -> Result<Json<Post>> {
    let post = db::run(&state.db, move |conn| change_message(conn, id, &payload.message)).await?;
    Ok(Json(post))
}
