use std::thread;

use dbforum_api::{
    config::Config,
    db, forum,
    ordering::{self, PostQuery, SortMode},
    posts, threads,
    threads::ThreadRef,
    users, votes, DbPool,
};
use dbforum_shared::{NewForum, NewPost, NewThread, NewUser, Thread, Vote, Voice};
use tempfile::TempDir;

const WORKERS: usize = 12;

fn open_pool() -> (TempDir, DbPool) {
    let dir = TempDir::new().unwrap();
    let config = Config {
        database_url: dir.path().join("forum.db").to_string_lossy().into_owned(),
        ..Config::default()
    };
    let pool = db::open(&config).unwrap();
    (dir, pool)
}

fn nickname(i: usize) -> String {
    format!("user{i:02}")
}

/// One forum with a thread and `WORKERS` registered users.
fn seed(pool: &DbPool) -> Thread {
    let mut conn = pool.get().unwrap();
    for i in 0..WORKERS {
        let new = NewUser {
            email: format!("{}@example.com", nickname(i)),
            ..NewUser::default()
        };
        users::create(&mut conn, &nickname(i), &new).unwrap();
    }
    forum::create(
        &mut conn,
        &NewForum {
            slug: "busy".into(),
            title: "Busy".into(),
            user: nickname(0),
        },
    )
    .unwrap();
    let new = NewThread {
        title: "hot topic".into(),
        author: nickname(0),
        message: "vote here".into(),
        slug: Some("hot".into()),
        created: None,
    };
    threads::create(&mut conn, "busy", &new).unwrap()
}

fn cast_from_every_user(pool: &DbPool, thread: i64, voice: Voice) {
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let pool = pool.clone();
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                let vote = Vote {
                    nickname: nickname(i),
                    voice,
                };
                votes::cast(&mut conn, &ThreadRef::Id(thread), &vote).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn concurrent_votes_lose_no_updates() {
    let (_dir, pool) = open_pool();
    let thread = seed(&pool);

    cast_from_every_user(&pool, thread.id, Voice::Up);
    let conn = pool.get().unwrap();
    assert_eq!(threads::find(&conn, &ThreadRef::Id(thread.id)).unwrap().votes, WORKERS as i64);

    cast_from_every_user(&pool, thread.id, Voice::Down);
    assert_eq!(
        threads::find(&conn, &ThreadRef::Id(thread.id)).unwrap().votes,
        -(WORKERS as i64)
    );

    // repeats are no-ops even when they race
    cast_from_every_user(&pool, thread.id, Voice::Down);
    let tally: i64 = conn
        .query_row("SELECT COALESCE(SUM(voice), 0) FROM votes WHERE thread = ?1", [thread.id], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(tally, -(WORKERS as i64));
    assert_eq!(threads::find(&conn, &ThreadRef::Id(thread.id)).unwrap().votes, tally);
}

#[test]
fn concurrent_batches_keep_paths_consistent() {
    let (_dir, pool) = open_pool();
    let thread = seed(&pool);
    let root = {
        let mut conn = pool.get().unwrap();
        let root = NewPost {
            parent: 0,
            author: nickname(0),
            message: "root".into(),
        };
        posts::create_batch(&mut conn, &ThreadRef::Id(thread.id), &[root]).unwrap()[0].id
    };

    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let pool = pool.clone();
            let at = ThreadRef::Id(thread.id);
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                let reply = NewPost {
                    parent: root,
                    author: nickname(i),
                    message: format!("reply {i}"),
                };
                let first = posts::create_batch(&mut conn, &at, &[reply]).unwrap();
                let nested = NewPost {
                    parent: first[0].id,
                    author: nickname(i),
                    message: format!("nested {i}"),
                };
                posts::create_batch(&mut conn, &at, &[nested]).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut conn = pool.get().unwrap();
    let query = PostQuery {
        sort: SortMode::Tree,
        ..PostQuery::default()
    };
    let tree = ordering::list(&mut conn, &ThreadRef::Id(thread.id), &query).unwrap();
    assert_eq!(tree.len(), 1 + 2 * WORKERS);

    for (i, post) in tree.iter().enumerate() {
        assert_eq!(post.path.last(), Some(&post.id));
        if post.parent == 0 {
            assert_eq!(post.path, vec![post.id]);
            continue;
        }
        let parent = posts::get(&conn, post.parent).unwrap();
        assert_eq!(post.path[..post.path.len() - 1], parent.path[..]);
        let parent_at = tree.iter().position(|p| p.id == parent.id).unwrap();
        assert!(parent_at < i, "parent {} listed after reply {}", parent.id, post.id);
    }

    let forum = forum::details(&conn, "busy").unwrap();
    assert_eq!(forum.posts, (1 + 2 * WORKERS) as i64);
    assert_eq!(forum::list_users(&conn, "busy", &Default::default()).unwrap().len(), WORKERS);
}
