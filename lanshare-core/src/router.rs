use crate::model::{ChatContext, Message};

/// Returns whether `message` belongs in `context`.
///
/// A private thread with peer `P` shows what `P` sent to the local user and
/// what the local user sent to `P`, nothing else. Until the local identity is
/// known, messages from the peer cannot be matched and are left out.
pub fn belongs_to(message: &Message, context: &ChatContext, local_identity: Option<&str>) -> bool {
    match context {
        ChatContext::Broadcast => !message.is_private(),
        ChatContext::Private { peer } => {
            let Some(recipient) = message.recipient.as_deref() else {
                return false;
            };
            let from_peer = message.sender == *peer && Some(recipient) == local_identity;
            let to_peer = message.is_own && recipient == peer.as_str();
            from_peer || to_peer
        }
    }
}

/// Filters the message log down to the messages visible in `context`, in log order.
pub fn filter_messages(
    messages: &[Message],
    context: &ChatContext,
    local_identity: Option<&str>,
) -> Vec<Message> {
    messages
        .iter()
        .filter(|message| belongs_to(message, context, local_identity))
        .cloned()
        .collect()
}
