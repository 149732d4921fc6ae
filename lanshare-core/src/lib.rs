pub mod acl;
pub mod api;
pub mod compose;
pub mod emoji;
pub mod liveness;
pub mod model;
pub mod roster;
pub mod router;
pub mod store;
pub mod transfers;

use thiserror::Error;

pub use acl::{BlockIntent, UserView};
pub use compose::{Composer, gate_send};
pub use liveness::{Liveness, LivenessTracker, Transition};
pub use model::{
    BlockList, ChatContext, FileId, FileTransferOffer, Message, MessageContent, ResourceKind,
    TransferDirection, TransferStatus, User, Username, WireMessage,
};
pub use router::filter_messages;
pub use store::{ChangeSignal, ReconciliationStore, Snapshot};
pub use transfers::{
    PromptState, PromptUpdate, TransferPrompt, TransferPromptController, TransferResponse,
    format_bytes,
};

pub const BROADCAST_CONTEXT_ID: &str = "all";
pub const BROADCAST_RECIPIENT: &str = "all";
pub const SELF_MARKER: &str = "(自己)";
pub const BLOCKED_MARKER: &str = "(屏蔽)";
pub const EMOJI_PREFIX: &str = "emoji:";
pub const PRIVATE_COMMAND: &str = "/to";
pub const BLOCK_COMMAND: &str = "/block";
pub const UNBLOCK_COMMAND: &str = "/unblock";

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("{0} is blocked; unblock them before sending")]
    RecipientBlocked(Username),
    #[error("unknown emoji id {0}")]
    UnknownEmoji(String),
    #[error("no file transfer prompt is open")]
    NoOpenPrompt,
    #[error("file transfer {0} is not awaiting a response")]
    NotAwaitingResponse(FileId),
}
