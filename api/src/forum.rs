use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use dbforum_shared::{Forum, NewForum, NewThread, Thread, User};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::{
    conflict, db,
    error::{Existing, ForumError, Result},
    threads::{self, ThreadListParams},
    users::{self, user_from_row},
    AppState, DEFAULT_LIMIT,
};

// ── Query params ──

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListParams {
    pub limit: Option<u32>,
    /// Exclusive nickname cursor.
    pub since: Option<String>,
    pub desc: Option<bool>,
}

// ── Storage ──

fn forum_from_row(row: &Row<'_>) -> rusqlite::Result<Forum> {
    Ok(Forum {
        slug: row.get(0)?,
        title: row.get(1)?,
        user: row.get(2)?,
        posts: row.get(3)?,
        threads: row.get(4)?,
    })
}

/// Returns the slug as stored, which may differ in case from the input.
pub fn canonical_slug(conn: &Connection, slug: &str) -> Result<String> {
    conn.query_row("SELECT slug FROM forums WHERE slug = ?1", [slug], |row| row.get(0))
        .optional()?
        .ok_or_else(|| ForumError::ForumNotFound(slug.to_string()))
}

pub fn details(conn: &Connection, slug: &str) -> Result<Forum> {
    conn.query_row(
        "SELECT slug, title, owner, posts, threads FROM forums WHERE slug = ?1",
        [slug],
        forum_from_row,
    )
    .optional()?
    .ok_or_else(|| ForumError::ForumNotFound(slug.to_string()))
}

pub fn create(conn: &mut Connection, new: &NewForum) -> Result<Forum> {
    let forum = conflict::insert_or_existing(
        conn,
        |tx| {
            let owner = users::canonical_nickname(tx, &new.user)?;
            tx.execute(
                "INSERT INTO forums (slug, title, owner) VALUES (?1, ?2, ?3)",
                rusqlite::params![new.slug, new.title, owner],
            )?;
            Ok(Forum {
                slug: new.slug.clone(),
                title: new.title.clone(),
                user: owner,
                posts: 0,
                threads: 0,
            })
        },
        |conn| details(conn, &new.slug).map(Existing::Forum),
    )?;

    tracing::info!(forum = %forum.slug, owner = %forum.user, "forum created");
    Ok(forum)
}

/// Records that `nickname` contributed to `forum`. Repeats are no-ops.
pub fn add_member(conn: &Connection, forum: &str, nickname: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO forum_users (forum, nickname) VALUES (?1, ?2)",
        [forum, nickname],
    )?;
    Ok(())
}

/// Users who posted or opened a thread in the forum, ordered by nickname.
pub fn list_users(conn: &Connection, slug: &str, params: &UserListParams) -> Result<Vec<User>> {
    let forum = canonical_slug(conn, slug)?;
    let limit = params.limit.filter(|&n| n > 0).unwrap_or(DEFAULT_LIMIT);
    let (cmp, order) = if params.desc.unwrap_or(false) {
        ("<", "DESC")
    } else {
        (">", "ASC")
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT u.nickname, u.fullname, u.about, u.email
         FROM forum_users fu
         JOIN users u ON u.nickname = fu.nickname
         WHERE fu.forum = ?1 AND (?2 IS NULL OR fu.nickname {cmp} ?2)
         ORDER BY fu.nickname {order}
         LIMIT ?3"
    ))?;
    let users = stmt
        .query_map(rusqlite::params![forum, params.since, limit], user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

// ── Handlers ──

/// POST /api/forum/create
pub async fn create_forum(
    State(state): State<AppState>,
    Json(payload): Json<NewForum>,
) -> Result<(StatusCode, Json<Forum>)> {
    let forum = db::run(&state.db, move |conn| create(conn, &payload)).await?;
    Ok((StatusCode::CREATED, Json(forum)))
}

/// GET /api/forum/{slug}/details
pub async fn forum_details(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Forum>> {
    let forum = db::run(&state.db, move |conn| details(conn, &slug)).await?;
    Ok(Json(forum))
}

/// POST /api/forum/{slug}/create
pub async fn create_thread(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<NewThread>,
) -> Result<(StatusCode, Json<Thread>)> {
    let thread = db::run(&state.db, move |conn| threads::create(conn, &slug, &payload)).await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

/// GET /api/forum/{slug}/threads?limit=10&since=2024-01-01T00:00:00Z&desc=true
pub async fn list_threads(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<ThreadListParams>,
) -> Result<Json<Vec<Thread>>> {
    let threads = db::run(&state.db, move |conn| {
        threads::list_for_forum(conn, &slug, &params)
    })
    .await?;
    Ok(Json(threads))
}

/// GET /api/forum/{slug}/users?limit=10&since=alice&desc=false
pub async fn forum_users(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<UserListParams>,
) -> Result<Json<Vec<User>>> {
    let users = db::run(&state.db, move |conn| list_users(conn, &slug, &params)).await?;
    Ok(Json(users))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_forum, seed_thread, seed_user};

    #[test]
    fn create_requires_owner_and_uses_stored_nickname() {
        let (_dir, pool) = db::temp_pool();
        let mut conn = pool.get().unwrap();
        seed_user(&mut conn, "Alice");

        let new = NewForum {
            slug: "rust".into(),
            title: "Rust".into(),
            user: "ghost".into(),
        };
        assert!(matches!(create(&mut conn, &new), Err(ForumError::UserNotFound(_))));

        let forum = create(&mut conn, &NewForum { user: "alice".into(), ..new }).unwrap();
        assert_eq!(forum.user, "Alice");
        assert_eq!(details(&conn, "RUST").unwrap(), forum);
    }

    #[test]
    fn duplicate_slug_returns_the_existing_forum() {
        let (_dir, pool) = db::temp_pool();
        let mut conn = pool.get().unwrap();
        seed_user(&mut conn, "alice");
        seed_user(&mut conn, "bob");
        let original = seed_forum(&mut conn, "rust", "alice");

        let again = NewForum {
            slug: "Rust".into(),
            title: "Another".into(),
            user: "bob".into(),
        };
        match create(&mut conn, &again) {
            Err(ForumError::Duplicate(Existing::Forum(found))) => assert_eq!(found, original),
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn members_are_listed_by_nickname_with_exclusive_cursor() {
        let (_dir, pool) = db::temp_pool();
        let mut conn = pool.get().unwrap();
        for nick in ["carol", "alice", "bob", "dave"] {
            seed_user(&mut conn, nick);
        }
        seed_forum(&mut conn, "rust", "dave");
        for nick in ["carol", "alice", "bob"] {
            seed_thread(&mut conn, "rust", nick, None);
        }
        seed_thread(&mut conn, "rust", "alice", None);

        let nicks = |users: Vec<User>| users.into_iter().map(|u| u.nickname).collect::<Vec<_>>();

        let all = list_users(&conn, "rust", &UserListParams::default()).unwrap();
        assert_eq!(nicks(all), vec!["alice", "bob", "carol"]);

        let page = UserListParams {
            limit: Some(1),
            since: Some("alice".into()),
            desc: None,
        };
        assert_eq!(nicks(list_users(&conn, "rust", &page).unwrap()), vec!["bob"]);

        let desc = UserListParams {
            limit: None,
            since: Some("carol".into()),
            desc: Some(true),
        };
        assert_eq!(nicks(list_users(&conn, "rust", &desc).unwrap()), vec!["bob", "alice"]);

        let zero = UserListParams {
            limit: Some(0),
            ..UserListParams::default()
        };
        assert_eq!(nicks(list_users(&conn, "rust", &zero).unwrap()).len(), 3);
    }
}
