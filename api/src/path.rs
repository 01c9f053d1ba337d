//! Materialized paths for reply trees.
//!
//! A post's path is its ancestor ids followed by its own id. Each path has two
//! byte encodings that SQLite can compare with `memcmp`:
//!
//! - the ascending key stores every id as 8 big-endian bytes, so byte order is
//!   the lexicographic order of the id sequence, with a prefix sorting before
//!   its extensions (depth-first preorder, siblings by id);
//! - the descending key stores the bitwise complement of every segment, which
//!   flips sibling order at every depth while an ancestor still sorts before
//!   its descendants.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};

const SEGMENT: usize = std::mem::size_of::<u64>();

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostPath(Vec<i64>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedKey(pub usize);

impl fmt::Display for MalformedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path key of {} bytes is not a multiple of {SEGMENT}", self.0)
    }
}

impl std::error::Error for MalformedKey {}

impl PostPath {
    pub fn root(id: i64) -> Self {
        Self(vec![id])
    }

    /// Path of a new reply whose id was just assigned by storage.
    pub fn child(&self, id: i64) -> Self {
        let mut ids = Vec::with_capacity(self.0.len() + 1);
        ids.extend_from_slice(&self.0);
        ids.push(id);
        Self(ids)
    }

    pub fn into_ids(self) -> Vec<i64> {
        self.0
    }

    pub fn root_id(&self) -> i64 {
        self.0.first().copied().unwrap_or_default()
    }

    pub fn ascending_key(&self) -> Vec<u8> {
        self.0.iter().flat_map(|&id| (id as u64).to_be_bytes()).collect()
    }

    pub fn descending_key(&self) -> Vec<u8> {
        self.0.iter().flat_map(|&id| (!(id as u64)).to_be_bytes()).collect()
    }

    pub fn from_ascending_key(key: &[u8]) -> Result<Self, MalformedKey> {
        if key.len() % SEGMENT != 0 {
            return Err(MalformedKey(key.len()));
        }
        let ids = key
            .chunks_exact(SEGMENT)
            .map(|chunk| {
                let mut bytes = [0u8; SEGMENT];
                bytes.copy_from_slice(chunk);
                u64::from_be_bytes(bytes) as i64
            })
            .collect();
        Ok(Self(ids))
    }
}

/// Reads the ascending key stored in the `path` column.
impl FromSql for PostPath {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let key = value.as_blob()?;
        PostPath::from_ascending_key(key).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
