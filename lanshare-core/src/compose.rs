use crate::model::{BlockList, ChatContext, MessageContent};
use crate::{CoreError, PRIVATE_COMMAND};

/// Draft text of the compose input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Empties the draft, returning what was discarded.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.draft)
    }
}

/// Wire text for `content` sent into `context`.
pub fn encode_outbound(context: &ChatContext, content: &MessageContent) -> String {
    let body = content.encode();
    match context.peer() {
        Some(peer) => format!("{PRIVATE_COMMAND} {peer} {body}"),
        None => body,
    }
}

/// Local checks run before a send is dispatched.
///
/// Refuses blank text and private sends to a peer present in the cached
/// block list. On success returns the wire text to submit.
pub fn gate_send(
    context: &ChatContext,
    block_list: &BlockList,
    content: &MessageContent,
) -> Result<String, CoreError> {
    let content = match content {
        MessageContent::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(CoreError::EmptyMessage);
            }
            MessageContent::Text(trimmed.to_owned())
        }
        MessageContent::Emoji(id) => {
            if crate::emoji::lookup(id).is_none() {
                return Err(CoreError::UnknownEmoji(id.clone()));
            }
            MessageContent::Emoji(id.clone())
        }
    };

    if let Some(peer) = context.peer()
        && block_list.contains(peer)
    {
        return Err(CoreError::RecipientBlocked(peer.to_owned()));
    }

    Ok(encode_outbound(context, &content))
}
