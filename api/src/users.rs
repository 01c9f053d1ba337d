use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use dbforum_shared::{NewUser, User, UserUpdate};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    conflict, db,
    error::{Existing, ForumError, Result},
    AppState,
};

pub(crate) const USER_COLUMNS: &str = "nickname, fullname, about, email";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        nickname: row.get(0)?,
        fullname: row.get(1)?,
        about: row.get(2)?,
        email: row.get(3)?,
    })
}

/// Returns the nickname as stored, which may differ in case from the input.
pub fn canonical_nickname(conn: &Connection, nickname: &str) -> Result<String> {
    conn.query_row(
        "SELECT nickname FROM users WHERE nickname = ?1",
        [nickname],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| ForumError::UserNotFound(nickname.to_string()))
}

pub fn profile(conn: &Connection, nickname: &str) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE nickname = ?1"),
        [nickname],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| ForumError::UserNotFound(nickname.to_string()))
}

/// Every user whose nickname or email collides with the given pair.
pub fn matching(conn: &Connection, nickname: &str, email: &str) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE nickname = ?1 OR email = ?2
         ORDER BY nickname"
    ))?;
    let users = stmt
        .query_map([nickname, email], user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn create(conn: &mut Connection, nickname: &str, new: &NewUser) -> Result<User> {
    let user = User {
        nickname: nickname.to_string(),
        fullname: new.fullname.clone(),
        about: new.about.clone(),
        email: new.email.clone(),
    };

    conflict::insert_or_existing(
        conn,
        |tx| {
            tx.execute(
                "INSERT INTO users (nickname, fullname, about, email) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user.nickname, user.fullname, user.about, user.email],
            )?;
            Ok(())
        },
        |conn| matching(conn, nickname, &new.email).map(Existing::Users),
    )?;

    tracing::debug!(nickname, "user created");
    Ok(user)
}

pub fn update(conn: &mut Connection, nickname: &str, changes: &UserUpdate) -> Result<User> {
    let tx = db::write_tx(conn)?;
    let mut user = profile(&tx, nickname)?;

    let overwrite = |field: &Option<String>, old: &mut String| {
        if let Some(value) = field.as_ref().filter(|v| !v.is_empty()) {
            *old = value.clone();
        }
    };
    overwrite(&changes.fullname, &mut user.fullname);
    overwrite(&changes.about, &mut user.about);
    overwrite(&changes.email, &mut user.email);

    let updated = tx.execute(
        "UPDATE users SET fullname = ?2, about = ?3, email = ?4 WHERE nickname = ?1",
        rusqlite::params![user.nickname, user.fullname, user.about, user.email],
    );
    match updated {
        Ok(_) => {
            tx.commit()?;
            Ok(user)
        }
        Err(err) if conflict::is_unique_violation(&err) => {
            tx.rollback()?;
            let owner: String = conn.query_row(
                "SELECT nickname FROM users WHERE email = ?1",
                [&user.email],
                |row| row.get(0),
            )?;
            Err(ForumError::Conflict(owner))
        }
        Err(err) => Err(err.into()),
    }
}

// ── Handlers ──

/// POST /api/user/{nickname}/create
pub async fn create_user(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    let user = db::run(&state.db, move |conn| create(conn, &nickname, &payload)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/user/{nickname}/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
) -> Result<Json<User>> {
    let user = db::run(&state.db, move |conn| profile(conn, &nickname)).await?;
    Ok(Json(user))
}

/// POST /api/user/{nickname}/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<User>> {
    let user = db::run(&state.db, move |conn| update(conn, &nickname, &payload)).await?;
    Ok(Json(user))
}
