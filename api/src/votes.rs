use axum::{
    extract::{Path, State},
    Json,
};
use dbforum_shared::{Thread, Vote};
use rusqlite::{Connection, OptionalExtension};

use crate::{
    db,
    error::Result,
    threads::{self, ThreadRef},
    users, AppState,
};

/// Records `vote` for the thread and returns the thread with its new tally.
///
/// One vote per (thread, user): a first vote adds its voice, repeating the
/// same voice changes nothing, and switching adds the difference. The read of
/// the previous vote and the tally update share an immediate transaction, so
/// concurrent casts on the same thread cannot lose an increment.
pub fn cast(conn: &mut Connection, thread: &ThreadRef, vote: &Vote) -> Result<Thread> {
    let tx = db::write_tx(conn)?;
    let (thread_id, _) = threads::resolve(&tx, thread)?;
    let nickname = users::canonical_nickname(&tx, &vote.nickname)?;
    let voice = vote.voice.value();

    let previous: Option<i64> = tx
        .query_row(
            "SELECT voice FROM votes WHERE thread = ?1 AND nickname = ?2",
            rusqlite::params![thread_id, nickname],
            |row| row.get(0),
        )
        .optional()?;

    let delta = match previous {
        None => {
            tx.execute(
                "INSERT INTO votes (thread, nickname, voice) VALUES (?1, ?2, ?3)",
                rusqlite::params![thread_id, nickname, voice],
            )?;
            voice
        }
        Some(old) if old == voice => 0,
        Some(old) => {
            tx.execute(
                "UPDATE votes SET voice = ?3 WHERE thread = ?1 AND nickname = ?2",
                rusqlite::params![thread_id, nickname, voice],
            )?;
            voice - old
        }
    };

    if delta != 0 {
        tx.execute(
            "UPDATE threads SET votes = votes + ?2 WHERE id = ?1",
            [thread_id, delta],
        )?;
    }
    let updated = threads::find(&tx, &ThreadRef::Id(thread_id))?;
    tx.commit()?;

    tracing::debug!(
        thread = thread_id,
        %nickname,
        voice,
        ?previous,
        delta,
        votes = updated.votes,
        "vote cast"
    );
    Ok(updated)
}

/// POST /api/thread/{slug_or_id}/vote
pub async fn vote_thread(
    State(state): State<AppState>,
    Path(slug_or_id): Path<String>,
    Json(payload): Json<Vote>,
) -> Result<Json<Thread>> {
    let thread = db::run(&state.db, move |conn| {
        cast(conn, &ThreadRef::from(slug_or_id.as_str()), &payload)
    })
    .await?;
    Ok(Json(thread))
}
