use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BROADCAST_CONTEXT_ID, BROADCAST_RECIPIENT, EMOJI_PREFIX};

pub type Username = String;
pub type FileId = String;

/// Usernames the local user has blocked, as last reported by the peer service.
pub type BlockList = BTreeSet<Username>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Messages,
    Roster,
    Transfers,
    BlockList,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Messages,
        ResourceKind::Roster,
        ResourceKind::Transfers,
        ResourceKind::BlockList,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Messages => "messages",
            ResourceKind::Roster => "roster",
            ResourceKind::Transfers => "transfers",
            ResourceKind::BlockList => "block list",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Emoji(String),
}

impl MessageContent {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(EMOJI_PREFIX) {
            Some(id) => MessageContent::Emoji(id.split(':').next().unwrap_or_default().to_owned()),
            None => MessageContent::Text(raw.to_owned()),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Emoji(id) => format!("{EMOJI_PREFIX}{id}"),
        }
    }
}

/// Chat message exactly as the peer service serialises it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_own: bool,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Username,
    /// `None` for broadcast messages.
    pub recipient: Option<Username>,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    pub is_own: bool,
}

impl Message {
    pub fn is_private(&self) -> bool {
        self.recipient.is_some()
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        let recipient = if wire.is_private {
            Some(wire.recipient)
        } else {
            None
        };
        Self {
            sender: wire.sender,
            recipient,
            content: MessageContent::parse(&wire.content),
            timestamp: wire.timestamp,
            is_own: wire.is_own,
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            sender: message.sender.clone(),
            recipient: message
                .recipient
                .clone()
                .unwrap_or_else(|| BROADCAST_RECIPIENT.to_owned()),
            content: message.content.encode(),
            timestamp: message.timestamp,
            is_own: message.is_own,
            is_private: message.is_private(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: Username,
    pub is_self: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Send,
    Receive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Transferring,
    Completed,
    Failed,
    Rejected,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileTransferOffer {
    pub file_id: FileId,
    pub file_name: String,
    pub file_size: u64,
    #[serde(default)]
    pub progress: u64,
    pub status: TransferStatus,
    pub direction: TransferDirection,
    pub peer_name: Username,
}

impl FileTransferOffer {
    pub fn is_pending_inbound(&self) -> bool {
        self.direction == TransferDirection::Receive && self.status == TransferStatus::Pending
    }
}

/// The conversation currently being viewed and composed into.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChatContext {
    #[default]
    Broadcast,
    Private { peer: Username },
}

impl ChatContext {
    pub fn private(peer: impl Into<Username>) -> Self {
        ChatContext::Private { peer: peer.into() }
    }

    /// Parses a context id: `"all"` is the broadcast room, anything else names a peer.
    pub fn from_id(id: &str) -> Self {
        let id = id.trim();
        if id.is_empty() || id == BROADCAST_CONTEXT_ID {
            ChatContext::Broadcast
        } else {
            ChatContext::private(id)
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ChatContext::Broadcast => BROADCAST_CONTEXT_ID,
            ChatContext::Private { peer } => peer,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ChatContext::Broadcast => "Public",
            ChatContext::Private { peer } => peer,
        }
    }

    pub fn peer(&self) -> Option<&str> {
        match self {
            ChatContext::Broadcast => None,
            ChatContext::Private { peer } => Some(peer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(is_private: bool, recipient: &str) -> WireMessage {
        WireMessage {
            sender: "bob".to_owned(),
            recipient: recipient.to_owned(),
            content: "hi".to_owned(),
            timestamp: DateTime::parse_from_rfc3339("2025-03-01T10:00:00+08:00")
                .unwrap()
                .with_timezone(&Utc),
            is_own: false,
            is_private,
        }
    }

    #[test]
    fn broadcast_wire_message_has_no_recipient() {
        let message = Message::from(wire(false, "all"));
        assert_eq!(message.recipient, None);
        assert!(!message.is_private());
    }

    #[test]
    fn private_wire_message_keeps_recipient() {
        let message = Message::from(wire(true, "alice"));
        assert_eq!(message.recipient.as_deref(), Some("alice"));
        assert!(message.is_private());
    }

    #[test]
    fn emoji_content_is_tagged() {
        assert_eq!(
            MessageContent::parse("emoji:fire"),
            MessageContent::Emoji("fire".to_owned())
        );
        assert_eq!(
            MessageContent::parse("emoji is fun"),
            MessageContent::Text("emoji is fun".to_owned())
        );
        assert_eq!(MessageContent::Emoji("star".to_owned()).encode(), "emoji:star");
    }

    #[test]
    fn decodes_go_style_message_json() {
        let json = r#"{"sender":"bob","recipient":"all","content":"emoji:smile",
            "timestamp":"2025-03-01T10:00:00.123456789+08:00","isOwn":false,"isPrivate":false}"#;
        let wire: WireMessage = serde_json::from_str(json).unwrap();
        let message = Message::from(wire);
        assert_eq!(message.content, MessageContent::Emoji("smile".to_owned()));
        assert_eq!(message.timestamp.to_rfc3339(), "2025-03-01T02:00:00.123456789+00:00");
    }

    #[test]
    fn unknown_transfer_status_decodes_as_other() {
        let json = r#"{"fileId":"f1","fileName":"a.txt","fileSize":10,"progress":0,
            "status":"expired","direction":"receive","peerName":"bob","startTime":"0001-01-01T00:00:00Z"}"#;
        let offer: FileTransferOffer = serde_json::from_str(json).unwrap();
        assert_eq!(offer.status, TransferStatus::Other);
        assert!(!offer.is_pending_inbound());
    }

    #[test]
    fn context_ids() {
        assert_eq!(ChatContext::from_id("all"), ChatContext::Broadcast);
        assert_eq!(ChatContext::from_id(" bob "), ChatContext::private("bob"));
        assert_eq!(ChatContext::private("bob").id(), "bob");
        assert_eq!(ChatContext::Broadcast.id(), "all");
    }
}
