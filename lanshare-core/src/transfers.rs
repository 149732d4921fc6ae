use std::collections::{HashMap, HashSet};

use crate::CoreError;
use crate::model::{FileId, FileTransferOffer, Username};

const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
pub const DEFAULT_SIZE_DECIMALS: usize = 2;

/// Formats a byte count with 1024-based units and two decimals, trailing zeros trimmed.
pub fn format_bytes(bytes: u64) -> String {
    format_bytes_with(bytes, DEFAULT_SIZE_DECIMALS)
}

pub fn format_bytes_with(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_owned();
    }

    let mut unit_index = 0;
    let mut unit_size = 1_u64;
    while unit_index < BYTE_UNITS.len() - 1 && bytes / unit_size >= 1024 {
        unit_size *= 1024;
        unit_index += 1;
    }

    let value = bytes as f64 / unit_size as f64;
    let mut number = format!("{value:.decimals$}");
    if number.contains('.') {
        let trimmed = number.trim_end_matches('0').trim_end_matches('.').len();
        number.truncate(trimmed);
    }
    format!("{number} {}", BYTE_UNITS[unit_index])
}

/// What the accept/reject dialog shows for one inbound offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPrompt {
    pub file_id: FileId,
    pub file_name: String,
    pub file_size: u64,
    pub size_label: String,
    pub peer_name: Username,
}

impl From<&FileTransferOffer> for TransferPrompt {
    fn from(offer: &FileTransferOffer) -> Self {
        Self {
            file_id: offer.file_id.clone(),
            file_name: offer.file_name.clone(),
            file_size: offer.file_size,
            size_label: format_bytes(offer.file_size),
            peer_name: offer.peer_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Prompted,
    /// The user chose; the response mutation is in flight.
    Answered { accepted: bool },
    Accepted,
    Rejected,
    /// The response mutation failed. The offer is not surfaced again.
    Failed,
    /// The offer stopped pending remotely before the user answered.
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptUpdate {
    Raised(TransferPrompt),
    /// The open prompt's offer is no longer pending remotely.
    Withdrawn(FileId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResponse {
    pub file_id: FileId,
    pub accepted: bool,
}

/// Surfaces each pending inbound offer to the user at most once.
///
/// Only one prompt is open at a time. Ids enter the prompted set when the
/// prompt is raised, before the user answers, and never leave it.
#[derive(Debug, Default)]
pub struct TransferPromptController {
    prompted: HashSet<FileId>,
    states: HashMap<FileId, PromptState>,
    open: Option<TransferPrompt>,
}

impl TransferPromptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_prompt(&self) -> Option<&TransferPrompt> {
        self.open.as_ref()
    }

    pub fn state(&self, file_id: &str) -> Option<PromptState> {
        self.states.get(file_id).copied()
    }

    pub fn was_prompted(&self, file_id: &str) -> bool {
        self.prompted.contains(file_id)
    }

    /// Inspects the latest transfer queue.
    pub fn scan(&mut self, transfers: &[FileTransferOffer]) -> Vec<PromptUpdate> {
        let mut updates = Vec::new();

        if let Some(open) = &self.open {
            let still_pending = transfers
                .iter()
                .any(|offer| offer.file_id == open.file_id && offer.is_pending_inbound());
            if still_pending {
                return updates;
            }
            self.states
                .insert(open.file_id.clone(), PromptState::Withdrawn);
            updates.push(PromptUpdate::Withdrawn(open.file_id.clone()));
            self.open = None;
        }

        let next = transfers
            .iter()
            .find(|offer| offer.is_pending_inbound() && !self.prompted.contains(&offer.file_id));
        if let Some(offer) = next {
            let prompt = TransferPrompt::from(offer);
            self.prompted.insert(prompt.file_id.clone());
            self.states
                .insert(prompt.file_id.clone(), PromptState::Prompted);
            self.open = Some(prompt.clone());
            updates.push(PromptUpdate::Raised(prompt));
        }

        updates
    }

    /// Answers the open prompt and closes it.
    pub fn respond(&mut self, accepted: bool) -> Result<TransferResponse, CoreError> {
        let file_id = self
            .open
            .as_ref()
            .map(|prompt| prompt.file_id.clone())
            .ok_or(CoreError::NoOpenPrompt)?;
        self.respond_to(&file_id, accepted)
    }

    /// Answers a specific prompted offer. Closes the dialog if it is the open one.
    pub fn respond_to(
        &mut self,
        file_id: &str,
        accepted: bool,
    ) -> Result<TransferResponse, CoreError> {
        if self.states.get(file_id) != Some(&PromptState::Prompted) {
            return Err(CoreError::NotAwaitingResponse(file_id.to_owned()));
        }
        self.states
            .insert(file_id.to_owned(), PromptState::Answered { accepted });
        if self
            .open
            .as_ref()
            .is_some_and(|prompt| prompt.file_id == file_id)
        {
            self.open = None;
        }
        Ok(TransferResponse {
            file_id: file_id.to_owned(),
            accepted,
        })
    }

    /// Records the outcome of a response mutation.
    pub fn complete(&mut self, file_id: &str, succeeded: bool) {
        let Some(state) = self.states.get_mut(file_id) else {
            return;
        };
        if let PromptState::Answered { accepted } = *state {
            *state = match (succeeded, accepted) {
                (false, _) => PromptState::Failed,
                (true, true) => PromptState::Accepted,
                (true, false) => PromptState::Rejected,
            };
        }
    }
}
