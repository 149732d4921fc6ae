use crate::model::{BlockList, User, Username};
use crate::{BLOCK_COMMAND, UNBLOCK_COMMAND};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub username: Username,
    pub is_blocked: bool,
}

/// Roster entries other than the local user, annotated from the block list.
pub fn render(roster: &[User], block_list: &BlockList) -> Vec<UserView> {
    roster
        .iter()
        .filter(|user| !user.is_self)
        .map(|user| UserView {
            username: user.username.clone(),
            is_blocked: block_list.contains(&user.username),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIntent {
    pub username: Username,
    pub block: bool,
}

impl BlockIntent {
    /// The intent that flips `username`'s current state in `block_list`.
    pub fn toggle(username: &str, block_list: &BlockList) -> Self {
        Self {
            username: username.to_owned(),
            block: !block_list.contains(username),
        }
    }

    /// Command text submitted through the message channel.
    pub fn command(&self) -> String {
        let verb = if self.block {
            BLOCK_COMMAND
        } else {
            UNBLOCK_COMMAND
        };
        format!("{verb} {}", self.username)
    }
}
