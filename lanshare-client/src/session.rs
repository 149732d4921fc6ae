//! The reconciliation coordinator.
//!
//! A [`Session`] owns the only [`SessionState`]. Timers, in-flight requests
//! and user intents are multiplexed onto one task; every handler runs to
//! completion before the next event is taken, so nothing else writes the
//! state while a reconciliation pass is running.

use std::{collections::HashMap, path::PathBuf};

use futures::{
    FutureExt, StreamExt,
    future::LocalBoxFuture,
    stream::FuturesUnordered,
};
use lanshare_core::{
    BlockIntent, ChangeSignal, ChatContext, Composer, CoreError, FileId, Liveness,
    LivenessTracker, Message, MessageContent, PromptUpdate, ReconciliationStore, ResourceKind,
    Snapshot, TransferPrompt, TransferPromptController, TransferResponse, UserView, Username,
    acl, filter_messages, gate_send,
};
use tokio::{
    sync::mpsc,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, warn};

use crate::config::PollIntervals;
use crate::service::{ClientError, PeerService};

/// Intents from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SwitchContext(ChatContext),
    UpdateDraft(String),
    SubmitDraft,
    SendEmoji(String),
    /// Answers whichever transfer prompt is open.
    RespondToPrompt { accepted: bool },
    RespondToTransfer { file_id: FileId, accepted: bool },
    ToggleBlock(Username),
    SetBlocked { username: Username, blocked: bool },
    SendFile { path: PathBuf, target: Username },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Derived data pushed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    MessagesUpdated {
        context: ChatContext,
        messages: Vec<Message>,
    },
    RosterUpdated(Vec<UserView>),
    ContextSwitched {
        context: ChatContext,
        discarded_draft: bool,
    },
    DraftCleared,
    TransferPrompt(TransferPrompt),
    PromptClosed {
        file_id: FileId,
    },
    ConnectionChanged(Liveness),
    ResourceUnreachable {
        resource: ResourceKind,
        reason: String,
    },
    Notice {
        level: NoticeLevel,
        text: String,
    },
}

pub trait Observer {
    fn notify(&mut self, event: UiEvent);
}

impl Observer for mpsc::UnboundedSender<UiEvent> {
    fn notify(&mut self, event: UiEvent) {
        let _ = self.send(event);
    }
}

impl Observer for Vec<UiEvent> {
    fn notify(&mut self, event: UiEvent) {
        self.push(event);
    }
}

fn notice(observer: &mut impl Observer, level: NoticeLevel, text: impl Into<String>) {
    observer.notify(UiEvent::Notice {
        level,
        text: text.into(),
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendPurpose {
    Compose,
    Emoji,
    Block(BlockIntent),
}

/// Work handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `force` re-publishes the derived view even if nothing changed.
    Fetch { resource: ResourceKind, force: bool },
    Probe,
    SendText { text: String, purpose: SendPurpose },
    SendFile { path: PathBuf, target: Username },
    Respond(TransferResponse),
}

impl Request {
    fn fetch(resource: ResourceKind) -> Self {
        Request::Fetch {
            resource,
            force: false,
        }
    }

    fn forced(resource: ResourceKind) -> Self {
        Request::Fetch {
            resource,
            force: true,
        }
    }
}

#[derive(Debug)]
pub enum Completion {
    Fetched {
        resource: ResourceKind,
        seq: u64,
        force: bool,
        result: Result<Snapshot, ClientError>,
    },
    Probed {
        result: Result<(), ClientError>,
    },
    Sent {
        purpose: SendPurpose,
        result: Result<(), ClientError>,
    },
    FileOffered {
        path: PathBuf,
        target: Username,
        result: Result<(), ClientError>,
    },
    Responded {
        response: TransferResponse,
        result: Result<(), ClientError>,
    },
}

/// Snapshots plus client-local state. Only the session mutates it.
#[derive(Debug, Default)]
pub struct SessionState {
    store: ReconciliationStore,
    prompts: TransferPromptController,
    context: ChatContext,
    composer: Composer,
    liveness: LivenessTracker,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    pub fn prompts(&self) -> &TransferPromptController {
        &self.prompts
    }

    pub fn context(&self) -> &ChatContext {
        &self.context
    }

    pub fn draft(&self) -> &str {
        self.composer.draft()
    }

    pub fn liveness(&self) -> Option<Liveness> {
        self.liveness.current()
    }

    pub fn visible_messages(&self) -> Vec<Message> {
        filter_messages(
            self.store.messages(),
            &self.context,
            self.store.local_identity(),
        )
    }

    pub fn users(&self) -> Vec<UserView> {
        acl::render(self.store.roster(), self.store.block_list())
    }

    fn publish_messages(&self, observer: &mut impl Observer) {
        observer.notify(UiEvent::MessagesUpdated {
            context: self.context.clone(),
            messages: self.visible_messages(),
        });
    }

    fn publish_roster(&self, observer: &mut impl Observer) {
        observer.notify(UiEvent::RosterUpdated(self.users()));
    }

    pub fn handle_command(
        &mut self,
        command: Command,
        observer: &mut impl Observer,
    ) -> Vec<Request> {
        match command {
            Command::SwitchContext(context) => {
                self.context = context;
                let discarded_draft = !self.composer.take().is_empty();
                info!(context = self.context.id(), "switched conversation");
                observer.notify(UiEvent::ContextSwitched {
                    context: self.context.clone(),
                    discarded_draft,
                });
                self.publish_messages(observer);
                Vec::new()
            }
            Command::UpdateDraft(text) => {
                self.composer.set_draft(text);
                Vec::new()
            }
            Command::SubmitDraft => {
                let content = MessageContent::Text(self.composer.draft().to_owned());
                self.gated_send(content, SendPurpose::Compose, observer)
            }
            Command::SendEmoji(id) => {
                self.gated_send(MessageContent::Emoji(id), SendPurpose::Emoji, observer)
            }
            Command::RespondToPrompt { accepted } => {
                let open = self.prompts.open_prompt().map(|p| p.file_id.clone());
                match open {
                    Some(file_id) => self.respond(&file_id, accepted, observer),
                    None => {
                        notice(observer, NoticeLevel::Warning, CoreError::NoOpenPrompt.to_string());
                        Vec::new()
                    }
                }
            }
            Command::RespondToTransfer { file_id, accepted } => {
                self.respond(&file_id, accepted, observer)
            }
            Command::ToggleBlock(username) => {
                let intent = BlockIntent::toggle(&username, self.store.block_list());
                self.block_request(intent)
            }
            Command::SetBlocked { username, blocked } => self.block_request(BlockIntent {
                username,
                block: blocked,
            }),
            Command::SendFile { path, target } => {
                if target.trim().is_empty() {
                    notice(observer, NoticeLevel::Warning, "choose a peer to send the file to");
                    return Vec::new();
                }
                vec![Request::SendFile { path, target }]
            }
            Command::Shutdown => Vec::new(),
        }
    }

    fn gated_send(
        &mut self,
        content: MessageContent,
        purpose: SendPurpose,
        observer: &mut impl Observer,
    ) -> Vec<Request> {
        match gate_send(&self.context, self.store.block_list(), &content) {
            Ok(text) => vec![Request::SendText { text, purpose }],
            Err(err) => {
                debug!("send refused locally: {err}");
                notice(observer, NoticeLevel::Warning, err.to_string());
                Vec::new()
            }
        }
    }

    fn respond(
        &mut self,
        file_id: &str,
        accepted: bool,
        observer: &mut impl Observer,
    ) -> Vec<Request> {
        let was_open = self
            .prompts
            .open_prompt()
            .is_some_and(|prompt| prompt.file_id == file_id);
        match self.prompts.respond_to(file_id, accepted) {
            Ok(response) => {
                if was_open {
                    observer.notify(UiEvent::PromptClosed {
                        file_id: response.file_id.clone(),
                    });
                }
                vec![Request::Respond(response)]
            }
            Err(err) => {
                notice(observer, NoticeLevel::Warning, err.to_string());
                Vec::new()
            }
        }
    }

    fn block_request(&self, intent: BlockIntent) -> Vec<Request> {
        vec![Request::SendText {
            text: intent.command(),
            purpose: SendPurpose::Block(intent),
        }]
    }

    pub fn handle_completion(
        &mut self,
        completion: Completion,
        observer: &mut impl Observer,
    ) -> Vec<Request> {
        match completion {
            Completion::Fetched {
                resource,
                seq,
                force,
                result,
            } => match result {
                Ok(snapshot) => {
                    self.reconcile(seq, force, snapshot, observer);
                    Vec::new()
                }
                Err(err) => {
                    warn!(%resource, "fetch failed, keeping last snapshot: {err}");
                    observer.notify(UiEvent::ResourceUnreachable {
                        resource,
                        reason: err.to_string(),
                    });
                    if err.is_unreachable() {
                        self.observe_liveness(false, observer)
                    } else {
                        Vec::new()
                    }
                }
            },
            Completion::Probed { result } => {
                if let Err(err) = &result {
                    debug!("liveness probe failed: {err}");
                }
                self.observe_liveness(result.is_ok(), observer)
            }
            Completion::Sent { purpose, result } => self.sent(purpose, result, observer),
            Completion::FileOffered {
                path,
                target,
                result,
            } => {
                match result {
                    Ok(()) => {
                        info!(path = %path.display(), %target, "file offer sent");
                        notice(
                            observer,
                            NoticeLevel::Success,
                            format!("file offer sent to {target}"),
                        );
                    }
                    Err(err) => {
                        warn!(path = %path.display(), %target, "file offer failed: {err}");
                        notice(
                            observer,
                            NoticeLevel::Error,
                            format!("could not offer {} to {target}: {err}", path.display()),
                        );
                    }
                }
                Vec::new()
            }
            Completion::Responded { response, result } => {
                self.prompts.complete(&response.file_id, result.is_ok());
                let verb = if response.accepted {
                    "accepted"
                } else {
                    "rejected"
                };
                match result {
                    Ok(()) => {
                        info!(file_id = %response.file_id, "file transfer {verb}");
                        notice(observer, NoticeLevel::Success, format!("file transfer {verb}"));
                    }
                    Err(err) => {
                        warn!(file_id = %response.file_id, "transfer response failed: {err}");
                        notice(
                            observer,
                            NoticeLevel::Error,
                            format!("could not send transfer response: {err}"),
                        );
                    }
                }
                Vec::new()
            }
        }
    }

    fn reconcile(
        &mut self,
        seq: u64,
        force: bool,
        snapshot: Snapshot,
        observer: &mut impl Observer,
    ) {
        let resource = snapshot.kind();
        let identity_before = self.store.local_identity().map(str::to_owned);
        let signal = self.store.apply_in_order(seq, snapshot, force);
        debug!(%resource, seq, ?signal, "reconciled");
        if signal == ChangeSignal::Stale {
            return;
        }
        let publish = signal.is_changed() || force;

        match resource {
            ResourceKind::Messages => {
                if publish {
                    self.publish_messages(observer);
                }
            }
            ResourceKind::Roster => {
                let identity_changed = self.store.local_identity() != identity_before.as_deref();
                if identity_changed {
                    info!(identity = ?self.store.local_identity(), "local identity resolved");
                }
                if publish {
                    self.publish_roster(observer);
                }
                if identity_changed {
                    self.publish_messages(observer);
                }
            }
            ResourceKind::BlockList => {
                if publish {
                    self.publish_roster(observer);
                }
            }
            ResourceKind::Transfers => {
                for update in self.prompts.scan(self.store.transfers()) {
                    match update {
                        PromptUpdate::Raised(prompt) => {
                            info!(
                                file_id = %prompt.file_id,
                                peer = %prompt.peer_name,
                                "incoming file offer"
                            );
                            observer.notify(UiEvent::TransferPrompt(prompt));
                        }
                        PromptUpdate::Withdrawn(file_id) => {
                            info!(%file_id, "file offer no longer pending");
                            observer.notify(UiEvent::PromptClosed { file_id });
                        }
                    }
                }
            }
        }
    }

    fn observe_liveness(&mut self, reachable: bool, observer: &mut impl Observer) -> Vec<Request> {
        let Some(transition) = self.liveness.observe(reachable) else {
            return Vec::new();
        };
        info!(state = ?transition.to, "peer service connection changed");
        observer.notify(UiEvent::ConnectionChanged(transition.to));
        if transition.is_reconnect() {
            vec![
                Request::forced(ResourceKind::Messages),
                Request::forced(ResourceKind::Roster),
            ]
        } else {
            Vec::new()
        }
    }

    fn sent(
        &mut self,
        purpose: SendPurpose,
        result: Result<(), ClientError>,
        observer: &mut impl Observer,
    ) -> Vec<Request> {
        match (purpose, result) {
            (SendPurpose::Compose, Ok(())) => {
                self.composer.take();
                observer.notify(UiEvent::DraftCleared);
                Vec::new()
            }
            (SendPurpose::Emoji, Ok(())) => Vec::new(),
            (SendPurpose::Block(intent), Ok(())) => {
                info!(user = %intent.username, block = intent.block, "block list change confirmed");
                vec![
                    Request::forced(ResourceKind::BlockList),
                    Request::forced(ResourceKind::Roster),
                ]
            }
            (SendPurpose::Block(intent), Err(err)) => {
                warn!(user = %intent.username, "block toggle failed: {err}");
                let verb = if intent.block { "block" } else { "unblock" };
                notice(
                    observer,
                    NoticeLevel::Error,
                    format!("could not {verb} {}: {err}", intent.username),
                );
                Vec::new()
            }
            (_, Err(err)) => {
                warn!("send failed: {err}");
                notice(
                    observer,
                    NoticeLevel::Error,
                    format!("message not sent: {err}"),
                );
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub intervals: PollIntervals,
    pub max_offer_bytes: u64,
}

/// Drives a [`SessionState`] against a [`PeerService`].
pub struct Session<S> {
    service: S,
    state: SessionState,
    settings: SessionSettings,
}

impl<S: PeerService> Session<S> {
    pub fn new(service: S, settings: SessionSettings) -> Self {
        Self {
            service,
            state: SessionState::new(),
            settings,
        }
    }

    /// Runs until [`Command::Shutdown`] arrives or the command channel closes.
    pub async fn run<O: Observer>(
        self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut observer: O,
    ) -> SessionState {
        let Session {
            service,
            mut state,
            settings,
        } = self;
        let mut dispatcher = Dispatcher {
            service: &service,
            max_offer_bytes: settings.max_offer_bytes,
            sequences: HashMap::new(),
        };
        let mut in_flight: FuturesUnordered<LocalBoxFuture<'_, Completion>> =
            FuturesUnordered::new();

        for resource in ResourceKind::ALL {
            in_flight.push(dispatcher.dispatch(Request::forced(resource)));
        }
        in_flight.push(dispatcher.dispatch(Request::Probe));

        let intervals = settings.intervals;
        let mut messages_timer = periodic(intervals.messages);
        let mut roster_timer = periodic(intervals.roster);
        let mut transfers_timer = periodic(intervals.transfers);
        let mut liveness_timer = periodic(intervals.liveness);
        info!(?intervals, "session started");

        loop {
            let requests = tokio::select! {
                _ = messages_timer.tick() => vec![Request::fetch(ResourceKind::Messages)],
                _ = roster_timer.tick() => vec![
                    Request::fetch(ResourceKind::Roster),
                    Request::fetch(ResourceKind::BlockList),
                ],
                _ = transfers_timer.tick() => vec![Request::fetch(ResourceKind::Transfers)],
                _ = liveness_timer.tick() => vec![Request::Probe],
                Some(completion) = in_flight.next() => {
                    state.handle_completion(completion, &mut observer)
                }
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => state.handle_command(command, &mut observer),
                },
            };
            for request in requests {
                in_flight.push(dispatcher.dispatch(request));
            }
        }

        info!(abandoned = in_flight.len(), "session stopped");
        state
    }
}

fn periodic(period: std::time::Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

struct Dispatcher<'a, S> {
    service: &'a S,
    max_offer_bytes: u64,
    sequences: HashMap<ResourceKind, u64>,
}

impl<'a, S: PeerService> Dispatcher<'a, S> {
    fn next_seq(&mut self, resource: ResourceKind) -> u64 {
        let seq = self.sequences.entry(resource).or_insert(0);
        *seq += 1;
        *seq
    }

    fn dispatch(&mut self, request: Request) -> LocalBoxFuture<'a, Completion> {
        let service = self.service;
        match request {
            Request::Fetch { resource, force } => {
                let seq = self.next_seq(resource);
                async move {
                    let result = fetch(service, resource).await;
                    Completion::Fetched {
                        resource,
                        seq,
                        force,
                        result,
                    }
                }
                .boxed_local()
            }
            Request::Probe => async move {
                Completion::Probed {
                    result: service.probe().await,
                }
            }
            .boxed_local(),
            Request::SendText { text, purpose } => async move {
                let result = service.send_message(&text).await;
                Completion::Sent { purpose, result }
            }
            .boxed_local(),
            Request::SendFile { path, target } => {
                let max = self.max_offer_bytes;
                async move {
                    let result = offer_file(service, &path, &target, max).await;
                    Completion::FileOffered {
                        path,
                        target,
                        result,
                    }
                }
                .boxed_local()
            }
            Request::Respond(response) => async move {
                let result = service
                    .respond_to_transfer(&response.file_id, response.accepted)
                    .await;
                Completion::Responded { response, result }
            }
            .boxed_local(),
        }
    }
}

async fn fetch<S: PeerService>(
    service: &S,
    resource: ResourceKind,
) -> Result<Snapshot, ClientError> {
    Ok(match resource {
        ResourceKind::Messages => Snapshot::Messages(service.fetch_messages().await?),
        ResourceKind::Roster => Snapshot::Roster(service.fetch_roster().await?),
        ResourceKind::Transfers => Snapshot::Transfers(service.fetch_transfers().await?),
        ResourceKind::BlockList => Snapshot::BlockList(service.fetch_block_list().await?),
    })
}

async fn offer_file<S: PeerService>(
    service: &S,
    path: &std::path::Path,
    target: &str,
    max_offer_bytes: u64,
) -> Result<(), ClientError> {
    let io_err = |source| ClientError::Io {
        path: path.display().to_string(),
        source,
    };
    let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();
    if size > max_offer_bytes {
        return Err(ClientError::FileTooLarge {
            size,
            max: max_offer_bytes,
        });
    }
    let payload = tokio::fs::read(path).await.map_err(io_err)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_owned());
    service.send_file_offer(&file_name, payload, target).await
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use lanshare_core::{
        BlockList, FileTransferOffer, PromptState, TransferDirection, TransferStatus,
    };

    use super::*;

    fn text(sender: &str, recipient: Option<&str>, is_own: bool, body: &str) -> Message {
        Message {
            sender: sender.to_owned(),
            recipient: recipient.map(str::to_owned),
            content: MessageContent::Text(body.to_owned()),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            is_own,
        }
    }

    fn fetched(seq: u64, snapshot: Snapshot) -> Completion {
        Completion::Fetched {
            resource: snapshot.kind(),
            seq,
            force: false,
            result: Ok(snapshot),
        }
    }

    fn failed_fetch(resource: ResourceKind, seq: u64) -> Completion {
        Completion::Fetched {
            resource,
            seq,
            force: false,
            result: Err(ClientError::Status {
                path: "/messages",
                status: 503,
            }),
        }
    }

    fn probed(ok: bool) -> Completion {
        Completion::Probed {
            result: if ok {
                Ok(())
            } else {
                Err(ClientError::Status {
                    path: "/ping",
                    status: 502,
                })
            },
        }
    }

    fn roster(entries: &[&str]) -> Snapshot {
        Snapshot::Roster(entries.iter().map(|s| (*s).to_owned()).collect())
    }

    fn blocked(names: &[&str]) -> Snapshot {
        Snapshot::BlockList(names.iter().map(|s| (*s).to_owned()).collect::<BlockList>())
    }

    fn inbound(file_id: &str) -> FileTransferOffer {
        FileTransferOffer {
            file_id: file_id.to_owned(),
            file_name: "photo.jpg".to_owned(),
            file_size: 1_048_576,
            progress: 0,
            status: TransferStatus::Pending,
            direction: TransferDirection::Receive,
            peer_name: "bob".to_owned(),
        }
    }

    fn count<F: Fn(&UiEvent) -> bool>(events: &[UiEvent], pred: F) -> usize {
        events.iter().filter(|e| pred(*e)).count()
    }

    #[test]
    fn same_length_message_poll_does_not_republish() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        let a = text("bob", None, false, "A");
        let b = text("bob", None, false, "B");
        let c = text("bob", None, false, "C");

        state.handle_completion(fetched(1, Snapshot::Messages(vec![a.clone(), b])), &mut events);
        state.handle_completion(fetched(2, Snapshot::Messages(vec![a, c])), &mut events);

        assert_eq!(
            count(&events, |e| matches!(e, UiEvent::MessagesUpdated { .. })),
            1
        );
    }

    #[test]
    fn forced_fetch_republishes_unchanged_log() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_completion(
            Completion::Fetched {
                resource: ResourceKind::Messages,
                seq: 1,
                force: true,
                result: Ok(Snapshot::Messages(Vec::new())),
            },
            &mut events,
        );
        assert_eq!(
            events,
            vec![UiEvent::MessagesUpdated {
                context: ChatContext::Broadcast,
                messages: Vec::new()
            }]
        );
    }

    #[test]
    fn switching_context_discards_draft_and_rerenders() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_completion(fetched(1, roster(&["alice (自己)", "bob"])), &mut events);
        state.handle_completion(
            fetched(
                1,
                Snapshot::Messages(vec![
                    text("bob", None, false, "hello all"),
                    text("bob", Some("alice"), false, "psst"),
                ]),
            ),
            &mut events,
        );
        events.clear();

        state.handle_command(Command::UpdateDraft("half a thought".to_owned()), &mut events);
        let requests = state.handle_command(
            Command::SwitchContext(ChatContext::private("bob")),
            &mut events,
        );

        assert!(requests.is_empty());
        assert_eq!(state.draft(), "");
        assert_eq!(
            events[0],
            UiEvent::ContextSwitched {
                context: ChatContext::private("bob"),
                discarded_draft: true
            }
        );
        match &events[1] {
            UiEvent::MessagesUpdated { messages, .. } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].content, MessageContent::Text("psst".to_owned()));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn blocked_private_send_makes_no_request() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_completion(fetched(1, blocked(&["carol"])), &mut events);
        state.handle_command(
            Command::SwitchContext(ChatContext::private("carol")),
            &mut events,
        );
        events.clear();

        state.handle_command(Command::UpdateDraft("hi".to_owned()), &mut events);
        let requests = state.handle_command(Command::SubmitDraft, &mut events);

        assert!(requests.is_empty());
        assert!(matches!(
            &events[..],
            [UiEvent::Notice { level: NoticeLevel::Warning, text }] if text.contains("carol")
        ));
        assert_eq!(state.draft(), "hi");
    }

    #[test]
    fn successful_send_clears_draft() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_command(
            Command::SwitchContext(ChatContext::private("bob")),
            &mut events,
        );
        state.handle_command(Command::UpdateDraft("see you".to_owned()), &mut events);
        let requests = state.handle_command(Command::SubmitDraft, &mut events);
        assert_eq!(
            requests,
            vec![Request::SendText {
                text: "/to bob see you".to_owned(),
                purpose: SendPurpose::Compose
            }]
        );
        assert_eq!(state.draft(), "see you");

        events.clear();
        state.handle_completion(
            Completion::Sent {
                purpose: SendPurpose::Compose,
                result: Ok(()),
            },
            &mut events,
        );
        assert_eq!(state.draft(), "");
        assert_eq!(events, vec![UiEvent::DraftCleared]);
    }

    #[test]
    fn reconnect_forces_exactly_one_refresh() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        let mut refreshes = Vec::new();

        for ok in [true, true, false, false, false, true, true] {
            refreshes.extend(state.handle_completion(probed(ok), &mut events));
        }

        assert_eq!(
            refreshes,
            vec![
                Request::forced(ResourceKind::Messages),
                Request::forced(ResourceKind::Roster),
            ]
        );
        let changes: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                UiEvent::ConnectionChanged(liveness) => Some(*liveness),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            vec![Liveness::Connected, Liveness::Disconnected, Liveness::Connected]
        );
    }

    #[test]
    fn fetch_failure_keeps_snapshot_and_marks_disconnected() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_completion(probed(true), &mut events);
        state.handle_completion(
            fetched(1, Snapshot::Messages(vec![text("bob", None, false, "A")])),
            &mut events,
        );
        events.clear();

        state.handle_completion(failed_fetch(ResourceKind::Messages, 2), &mut events);

        assert_eq!(state.store().messages().len(), 1);
        assert_eq!(state.liveness(), Some(Liveness::Disconnected));
        assert!(matches!(
            events[0],
            UiEvent::ResourceUnreachable {
                resource: ResourceKind::Messages,
                ..
            }
        ));

        let refresh = state.handle_completion(probed(true), &mut events);
        assert_eq!(refresh.len(), 2);
    }

    #[test]
    fn undecodable_body_does_not_flap_connection() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        let mut follow_ups = Vec::new();
        for seq in 1..=3 {
            follow_ups.extend(state.handle_completion(probed(true), &mut events));
            follow_ups.extend(state.handle_completion(
                Completion::Fetched {
                    resource: ResourceKind::Transfers,
                    seq,
                    force: false,
                    result: Err(ClientError::Malformed {
                        path: "/filetransfers",
                        reason: "expected value at line 1 column 1".to_owned(),
                    }),
                },
                &mut events,
            ));
        }

        assert_eq!(
            count(&events, |e| matches!(e, UiEvent::ConnectionChanged(_))),
            1
        );
        assert_eq!(
            count(&events, |e| matches!(e, UiEvent::ResourceUnreachable { .. })),
            3
        );
        assert_eq!(state.liveness(), Some(Liveness::Connected));
        assert!(follow_ups.is_empty());
    }

    #[test]
    fn transfer_prompt_fires_once_across_polls() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        for seq in 1..=20 {
            state.handle_completion(
                fetched(seq, Snapshot::Transfers(vec![inbound("f1")])),
                &mut events,
            );
        }
        assert_eq!(
            count(&events, |e| matches!(e, UiEvent::TransferPrompt(_))),
            1
        );
        assert!(state.prompts().was_prompted("f1"));
    }

    #[test]
    fn answering_prompt_closes_it_and_records_outcome() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_completion(
            fetched(1, Snapshot::Transfers(vec![inbound("f1")])),
            &mut events,
        );
        events.clear();

        let requests = state.handle_command(Command::RespondToPrompt { accepted: true }, &mut events);
        let [Request::Respond(response)] = &requests[..] else {
            panic!("unexpected requests {requests:?}");
        };
        assert_eq!(response.file_id, "f1");
        assert_eq!(
            events,
            vec![UiEvent::PromptClosed {
                file_id: "f1".to_owned()
            }]
        );

        state.handle_completion(
            Completion::Responded {
                response: response.clone(),
                result: Err(ClientError::Status {
                    path: "/fileresponse",
                    status: 500,
                }),
            },
            &mut events,
        );
        assert_eq!(state.prompts().state("f1"), Some(PromptState::Failed));
        assert!(matches!(
            events.last(),
            Some(UiEvent::Notice {
                level: NoticeLevel::Error,
                ..
            })
        ));
    }

    #[test]
    fn confirmed_block_toggle_refreshes_block_list_and_roster() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        let requests = state.handle_command(Command::ToggleBlock("bob".to_owned()), &mut events);
        let intent = BlockIntent {
            username: "bob".to_owned(),
            block: true,
        };
        assert_eq!(
            requests,
            vec![Request::SendText {
                text: "/block bob".to_owned(),
                purpose: SendPurpose::Block(intent.clone())
            }]
        );
        assert!(!state.store().is_blocked("bob"));

        let follow_up = state.handle_completion(
            Completion::Sent {
                purpose: SendPurpose::Block(intent),
                result: Ok(()),
            },
            &mut events,
        );
        assert_eq!(
            follow_up,
            vec![
                Request::forced(ResourceKind::BlockList),
                Request::forced(ResourceKind::Roster),
            ]
        );
    }

    #[test]
    fn block_list_change_updates_roster_view() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_completion(fetched(1, roster(&["alice (自己)", "bob", "carol"])), &mut events);
        events.clear();

        state.handle_completion(fetched(1, blocked(&["carol"])), &mut events);
        assert_eq!(
            events,
            vec![UiEvent::RosterUpdated(vec![
                UserView {
                    username: "bob".to_owned(),
                    is_blocked: false
                },
                UserView {
                    username: "carol".to_owned(),
                    is_blocked: true
                },
            ])]
        );
    }

    #[test]
    fn stale_roster_response_is_ignored() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_completion(fetched(2, roster(&["alice (自己)", "bob"])), &mut events);
        events.clear();
        state.handle_completion(fetched(1, roster(&["alice (自己)"])), &mut events);
        assert!(events.is_empty());
        assert_eq!(state.users().len(), 1);
    }

    #[test]
    fn late_identity_reveals_private_messages() {
        let mut state = SessionState::new();
        let mut events = Vec::new();
        state.handle_command(
            Command::SwitchContext(ChatContext::private("bob")),
            &mut events,
        );
        state.handle_completion(
            fetched(1, Snapshot::Messages(vec![text("bob", Some("alice"), false, "hi")])),
            &mut events,
        );
        assert!(state.visible_messages().is_empty());

        events.clear();
        state.handle_completion(fetched(1, roster(&["alice (自己)", "bob"])), &mut events);
        assert!(events.iter().any(|e| matches!(
            e,
            UiEvent::MessagesUpdated { messages, .. } if messages.len() == 1
        )));
    }
}
