//! Key layout for records kept in a [`StorageBackend`](crate::StorageBackend).
//!
//! ```text
//! users/{hex(user_id)}                              -> JSON User
//! tasks/{hex(user_id)}/{YYYY-MM-DD}/{seq:010}       -> JSON Task
//! task-counts/{hex(user_id)}/{YYYY-MM-DD}           -> decimal row count
//! ```
//!
//! User ids are hex-encoded so that a `/` inside an id cannot bleed into the
//! next path segment, and so that byte ordering is preserved for scans. The
//! zero-padded sequence number makes a day's rows scan in insertion order.

use std::ops::Bound;

use crate::{
    error::{StorageError, StorageResult},
    types::{CalendarDay, UserId},
};

const USERS: &str = "users/";
const TASKS: &str = "tasks/";
const TASK_COUNTS: &str = "task-counts/";

pub(crate) fn user_key(user: &UserId) -> Vec<u8> {
    format!("{USERS}{}", hex::encode(user.as_str())).into_bytes()
}

pub(crate) fn task_key(user: &UserId, day: CalendarDay, seq: u64) -> Vec<u8> {
    format!("{TASKS}{}/{day}/{seq:010}", hex::encode(user.as_str())).into_bytes()
}

pub(crate) fn user_tasks_prefix(user: &UserId) -> Vec<u8> {
    format!("{TASKS}{}/", hex::encode(user.as_str())).into_bytes()
}

pub(crate) fn day_tasks_prefix(user: &UserId, day: CalendarDay) -> Vec<u8> {
    format!("{TASKS}{}/{day}/", hex::encode(user.as_str())).into_bytes()
}

pub(crate) fn task_count_key(user: &UserId, day: CalendarDay) -> Vec<u8> {
    format!("{TASK_COUNTS}{}/{day}", hex::encode(user.as_str())).into_bytes()
}

/// The range covering every key that starts with `prefix`.
pub(crate) fn prefix_range(prefix: Vec<u8>) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let mut end = prefix.clone();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return (Bound::Included(prefix), Bound::Excluded(end));
        }
    }
    (Bound::Included(prefix), Bound::Unbounded)
}

pub(crate) fn encode_count(count: u64) -> Vec<u8> {
    count.to_string().into_bytes()
}

pub(crate) fn decode_count(raw: &[u8]) -> StorageResult<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StorageError::serialization("task counter is not a decimal integer"))
}
