//! Fixtures shared by the unit tests.

use dbforum_shared::{Forum, NewForum, NewPost, NewThread, NewUser, Post, Thread, User};
use rusqlite::Connection;

use crate::{forum, threads, users};

pub fn user(email: &str) -> NewUser {
    NewUser {
        fullname: String::new(),
        about: String::new(),
        email: email.to_string(),
    }
}

pub fn seed_user(conn: &mut Connection, nickname: &str) -> User {
    let new = NewUser {
        fullname: nickname.to_string(),
        about: format!("about {nickname}"),
        email: format!("{nickname}@example.com"),
    };
    users::create(conn, nickname, &new).unwrap()
}

pub fn seed_forum(conn: &mut Connection, slug: &str, owner: &str) -> Forum {
    let new = NewForum {
        slug: slug.to_string(),
        title: format!("{slug} forum"),
        user: owner.to_string(),
    };
    forum::create(conn, &new).unwrap()
}

pub fn new_thread(author: &str, slug: Option<&str>) -> NewThread {
    NewThread {
        title: "a thread".to_string(),
        author: author.to_string(),
        message: "opening message".to_string(),
        slug: slug.map(str::to_string),
        created: None,
    }
}

pub fn seed_thread(conn: &mut Connection, forum: &str, author: &str, slug: Option<&str>) -> Thread {
    threads::create(conn, forum, &new_thread(author, slug)).unwrap()
}

/// A user, a forum and one thread, returned as the thread.
pub fn seed_world(conn: &mut Connection) -> Thread {
    seed_user(conn, "alice");
    seed_forum(conn, "rust", "alice");
    seed_thread(conn, "rust", "alice", Some("ownership"))
}

pub fn post(author: &str, parent: i64) -> NewPost {
    NewPost {
        parent,
        author: author.to_string(),
        message: format!("reply to {parent}"),
    }
}

pub fn ids(posts: &[Post]) -> Vec<i64> {
    posts.iter().map(|p| p.id).collect()
}
