use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Users ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub nickname: String,
    pub fullname: String,
    pub about: String,
    pub email: String,
}

/// Body of `POST /user/{nickname}/create`; the nickname comes from the path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub about: String,
    pub email: String,
}

/// Partial profile update. Absent or empty fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub fullname: Option<String>,
    pub about: Option<String>,
    pub email: Option<String>,
}

// ── Forums ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    pub slug: String,
    pub title: String,
    pub user: String,
    pub posts: i64,
    pub threads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewForum {
    pub slug: String,
    pub title: String,
    pub user: String,
}

// ── Threads ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub forum: String,
    pub message: String,
    pub votes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewThread {
    pub title: String,
    pub author: String,
    pub message: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadUpdate {
    pub title: Option<String>,
    pub message: Option<String>,
}

// ── Posts ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub parent: i64,
    pub author: String,
    pub message: String,
    #[serde(rename = "isEdited")]
    pub is_edited: bool,
    pub forum: String,
    pub thread: i64,
    pub created: DateTime<Utc>,
    /// Ancestor ids ending in this post's own id.
    #[serde(skip)]
    pub path: Vec<i64>,
}

/// One element of a post batch. `parent == 0` makes a root post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub parent: i64,
    pub author: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostUpdate {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostInfo {
    pub post: Post,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forum: Option<Forum>,
}

// ── Votes ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Voice {
    Up,
    Down,
}

impl Voice {
    pub fn value(self) -> i64 {
        match self {
            Voice::Up => 1,
            Voice::Down => -1,
        }
    }
}

impl TryFrom<i32> for Voice {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Voice::Up),
            -1 => Ok(Voice::Down),
            other => Err(format!("voice must be 1 or -1, got {other}")),
        }
    }
}

impl From<Voice> for i32 {
    fn from(voice: Voice) -> Self {
        voice.value() as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub nickname: String,
    pub voice: Voice,
}

// ── Service ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub user: i64,
    pub forum: i64,
    pub thread: i64,
    pub post: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_rejects_out_of_range_values() {
        let vote: Vote = serde_json::from_str(r#"{"nickname":"a","voice":-1}"#).unwrap();
        assert_eq!(vote.voice, Voice::Down);
        assert!(serde_json::from_str::<Vote>(r#"{"nickname":"a","voice":2}"#).is_err());
        assert!(serde_json::from_str::<Vote>(r#"{"nickname":"a","voice":0}"#).is_err());
    }

    #[test]
    fn post_uses_is_edited_key_and_hides_path() {
        let post = Post {
            id: 7,
            parent: 3,
            author: "alice".into(),
            message: "hi".into(),
            is_edited: true,
            forum: "rust".into(),
            thread: 1,
            created: DateTime::<Utc>::UNIX_EPOCH,
            path: vec![3, 7],
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["isEdited"], true);
        assert!(json.get("path").is_none());
    }

    #[test]
    fn new_post_defaults_to_root() {
        let spec: NewPost = serde_json::from_str(r#"{"author":"a","message":"m"}"#).unwrap();
        assert_eq!(spec.parent, 0);
    }
}
