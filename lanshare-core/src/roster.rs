//! Decoding of the roster display strings served by the peer service.
//!
//! Each entry is `"<username>"` optionally followed by markers such as
//! `" (自己)"` for the local node or `" (屏蔽)"` for a blocked peer. The
//! username is the token before the first whitespace.

use crate::model::{User, Username};
use crate::SELF_MARKER;

pub fn username_of(entry: &str) -> Option<&str> {
    entry.split_whitespace().next()
}

pub fn is_self_entry(entry: &str) -> bool {
    entry.contains(SELF_MARKER)
}

/// Parses every entry into a [`User`]; blank entries are skipped.
pub fn parse_roster(entries: &[String]) -> Vec<User> {
    entries
        .iter()
        .filter_map(|entry| {
            username_of(entry).map(|username| User {
                username: username.to_owned(),
                is_self: is_self_entry(entry),
            })
        })
        .collect()
}

/// Returns the local identity when exactly one roster entry is marked as self.
///
/// Zero or several self entries yield `None`; the caller keeps its prior value.
pub fn resolve_local_identity(users: &[User]) -> Option<Username> {
    let mut selves = users.iter().filter(|user| user.is_self);
    match (selves.next(), selves.next()) {
        (Some(only), None) => Some(only.username.clone()),
        _ => None,
    }
}
