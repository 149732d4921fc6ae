use std::collections::{HashMap, HashSet};

use crate::model::{BlockList, FileId, FileTransferOffer, Message, ResourceKind, User, Username};
use crate::roster::{parse_roster, resolve_local_identity};

/// Freshly fetched state of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Messages(Vec<Message>),
    /// Raw roster display strings.
    Roster(Vec<String>),
    Transfers(Vec<FileTransferOffer>),
    BlockList(BlockList),
}

impl Snapshot {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Snapshot::Messages(_) => ResourceKind::Messages,
            Snapshot::Roster(_) => ResourceKind::Roster,
            Snapshot::Transfers(_) => ResourceKind::Transfers,
            Snapshot::BlockList(_) => ResourceKind::BlockList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSignal {
    Changed,
    Unchanged,
    /// An older response arrived after a newer one had been applied; it was dropped.
    Stale,
}

impl ChangeSignal {
    pub fn is_changed(self) -> bool {
        self == ChangeSignal::Changed
    }
}

/// Last-known snapshots of every polled resource.
///
/// Messages and roster are compared by element count only: a snapshot with the
/// same length as the stored one is reported `Unchanged` and is not stored,
/// even when its contents differ, unless it arrives through [`Self::refresh`].
/// Transfers change when a previously unseen `fileId` appears. The block list
/// is replaced on every poll.
#[derive(Debug, Default)]
pub struct ReconciliationStore {
    messages: Vec<Message>,
    roster: Vec<User>,
    transfers: Vec<FileTransferOffer>,
    seen_file_ids: HashSet<FileId>,
    block_list: BlockList,
    local_identity: Option<Username>,
    last_applied: HashMap<ResourceKind, u64>,
}

impl ReconciliationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn roster(&self) -> &[User] {
        &self.roster
    }

    pub fn transfers(&self) -> &[FileTransferOffer] {
        &self.transfers
    }

    pub fn block_list(&self) -> &BlockList {
        &self.block_list
    }

    pub fn local_identity(&self) -> Option<&str> {
        self.local_identity.as_deref()
    }

    pub fn is_blocked(&self, username: &str) -> bool {
        self.block_list.contains(username)
    }

    /// Applies a response tagged with the sequence number it was issued under.
    ///
    /// Responses are taken in arrival order; one whose sequence is lower than
    /// the last applied sequence for the same resource is dropped. A `forced`
    /// response goes through [`Self::refresh`] instead of [`Self::apply`].
    pub fn apply_in_order(&mut self, seq: u64, snapshot: Snapshot, forced: bool) -> ChangeSignal {
        let kind = snapshot.kind();
        if let Some(last) = self.last_applied.get(&kind)
            && seq < *last
        {
            return ChangeSignal::Stale;
        }
        self.last_applied.insert(kind, seq);
        if forced {
            self.refresh(snapshot)
        } else {
            self.apply(snapshot)
        }
    }

    pub fn apply(&mut self, snapshot: Snapshot) -> ChangeSignal {
        self.reconcile(snapshot, false)
    }

    /// Like [`Self::apply`], but a same-length message log or roster is stored
    /// too. The signal is still decided by count.
    pub fn refresh(&mut self, snapshot: Snapshot) -> ChangeSignal {
        self.reconcile(snapshot, true)
    }

    fn reconcile(&mut self, snapshot: Snapshot, store_unchanged: bool) -> ChangeSignal {
        match snapshot {
            Snapshot::Messages(messages) => {
                let changed = messages.len() != self.messages.len();
                if changed || store_unchanged {
                    self.messages = messages;
                }
                signal(changed)
            }
            Snapshot::Roster(entries) => {
                let users = parse_roster(&entries);
                if let Some(identity) = resolve_local_identity(&users) {
                    self.local_identity = Some(identity);
                }
                let changed = users.len() != self.roster.len();
                if changed || store_unchanged {
                    self.roster = users;
                }
                signal(changed)
            }
            Snapshot::Transfers(transfers) => {
                let mut changed = false;
                for offer in &transfers {
                    changed |= self.seen_file_ids.insert(offer.file_id.clone());
                }
                self.transfers = transfers;
                signal(changed)
            }
            Snapshot::BlockList(block_list) => {
                let changed = block_list != self.block_list;
                self.block_list = block_list;
                signal(changed)
            }
        }
    }
}

fn signal(changed: bool) -> ChangeSignal {
    if changed {
        ChangeSignal::Changed
    } else {
        ChangeSignal::Unchanged
    }
}
