//! In-memory stand-in for a LANShare peer's local HTTP interface.
//!
//! Serves the same resources the client polls and mutates, with peers,
//! inbound messages and inbound file offers injected through [`AppState`].

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use lanshare_core::{
    BLOCK_COMMAND, BLOCKED_MARKER, BROADCAST_RECIPIENT, FileId, FileTransferOffer,
    PRIVATE_COMMAND, SELF_MARKER, TransferDirection, TransferStatus, UNBLOCK_COMMAND, Username,
    WireMessage,
    api::{
        AclBody, FORM_FIELD_FILE, FORM_FIELD_TARGET, FileResponseRequest, MessagesBody, PATH_ACL,
        PATH_FILE_RESPONSE, PATH_MESSAGES, PATH_PING, PATH_SEND, PATH_SEND_FILE, PATH_TRANSFERS,
        PATH_USERS, SendRequest, TransfersBody, UsersBody,
    },
};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};

/// Only the most recent messages are kept.
pub const MESSAGE_LOG_CAP: usize = 100;
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

type Rejection = (StatusCode, String);

#[derive(Debug)]
struct PeerState {
    name: Username,
    peers: BTreeSet<Username>,
    blocked: BTreeSet<Username>,
    messages: Vec<WireMessage>,
    transfers: Vec<FileTransferOffer>,
}

impl PeerState {
    fn push_message(&mut self, message: WireMessage) {
        self.messages.push(message);
        if self.messages.len() > MESSAGE_LOG_CAP {
            let excess = self.messages.len() - MESSAGE_LOG_CAP;
            self.messages.drain(..excess);
        }
    }

    fn require_peer(&self, username: &str) -> Result<(), Rejection> {
        if self.peers.contains(username) {
            Ok(())
        } else {
            Err((StatusCode::NOT_FOUND, format!("user {username} is not online")))
        }
    }

    fn own_message(&self, recipient: Option<&str>, content: &str) -> WireMessage {
        WireMessage {
            sender: self.name.clone(),
            recipient: recipient.unwrap_or(BROADCAST_RECIPIENT).to_owned(),
            content: content.to_owned(),
            timestamp: Utc::now(),
            is_own: true,
            is_private: recipient.is_some(),
        }
    }

    /// Applies text submitted to `/send`: a command or a broadcast.
    fn submit(&mut self, text: &str) -> Result<(), Rejection> {
        if !text.starts_with('/') {
            let message = self.own_message(None, text);
            self.push_message(message);
            return Ok(());
        }

        let mut parts = text.splitn(3, ' ');
        let verb = parts.next().unwrap_or_default();
        let target = parts.next().map(str::trim).unwrap_or_default();
        let usage = || (StatusCode::BAD_REQUEST, format!("usage: {verb} <user> ..."));
        match verb {
            PRIVATE_COMMAND => {
                let body = parts.next().filter(|body| !body.trim().is_empty());
                let Some(body) = body.filter(|_| !target.is_empty()) else {
                    return Err(usage());
                };
                self.require_peer(target)?;
                let message = self.own_message(Some(target), body);
                self.push_message(message);
            }
            BLOCK_COMMAND | UNBLOCK_COMMAND => {
                if target.is_empty() {
                    return Err(usage());
                }
                self.require_peer(target)?;
                if verb == BLOCK_COMMAND {
                    self.blocked.insert(target.to_owned());
                } else {
                    self.blocked.remove(target);
                }
                info!(user = target, blocked = verb == BLOCK_COMMAND, "block list updated");
            }
            other => {
                return Err((StatusCode::BAD_REQUEST, format!("unknown command {other}")));
            }
        }
        Ok(())
    }

    fn roster(&self) -> Vec<String> {
        let mut users = vec![format!("{} {SELF_MARKER}", self.name)];
        users.extend(self.peers.iter().map(|peer| {
            if self.blocked.contains(peer) {
                format!("{peer} {BLOCKED_MARKER}")
            } else {
                peer.clone()
            }
        }));
        users
    }

    fn respond(&mut self, request: &FileResponseRequest) -> Result<(), Rejection> {
        let Some(offer) = self
            .transfers
            .iter_mut()
            .find(|offer| offer.file_id == request.file_id)
        else {
            return Err((
                StatusCode::NOT_FOUND,
                format!("unknown file transfer {}", request.file_id),
            ));
        };
        if !offer.is_pending_inbound() {
            return Err((
                StatusCode::CONFLICT,
                format!("file transfer {} is not awaiting a response", offer.file_id),
            ));
        }
        offer.status = if request.accepted {
            TransferStatus::Transferring
        } else {
            TransferStatus::Rejected
        };
        info!(file_id = %offer.file_id, accepted = request.accepted, "file transfer answered");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<RwLock<PeerState>>,
    next_file_id: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(name: impl Into<Username>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(PeerState {
                name: name.into(),
                peers: BTreeSet::new(),
                blocked: BTreeSet::new(),
                messages: Vec::new(),
                transfers: Vec::new(),
            })),
            next_file_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn allocate_file_id(&self) -> FileId {
        format!("file-{}", self.next_file_id.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn add_peer(&self, name: impl Into<Username>) {
        let name = name.into();
        info!(peer = %name, "peer online");
        self.inner.write().await.peers.insert(name);
    }

    pub async fn remove_peer(&self, name: &str) {
        info!(peer = name, "peer offline");
        self.inner.write().await.peers.remove(name);
    }

    /// Records a message from `from`. Messages from blocked peers are dropped.
    ///
    /// Returns whether the message was recorded.
    pub async fn receive_message(&self, from: &str, content: &str, private: bool) -> bool {
        let mut state = self.inner.write().await;
        if state.blocked.contains(from) {
            info!(peer = from, "dropping message from blocked peer");
            return false;
        }
        let recipient = if private {
            state.name.clone()
        } else {
            BROADCAST_RECIPIENT.to_owned()
        };
        state.push_message(WireMessage {
            sender: from.to_owned(),
            recipient,
            content: content.to_owned(),
            timestamp: Utc::now(),
            is_own: false,
            is_private: private,
        });
        true
    }

    /// Queues an inbound file offer from `from` and returns its id.
    pub async fn offer_file(&self, from: &str, file_name: &str, file_size: u64) -> FileId {
        let file_id = self.allocate_file_id();
        self.inner.write().await.transfers.push(FileTransferOffer {
            file_id: file_id.clone(),
            file_name: file_name.to_owned(),
            file_size,
            progress: 0,
            status: TransferStatus::Pending,
            direction: TransferDirection::Receive,
            peer_name: from.to_owned(),
        });
        info!(%file_id, peer = from, "inbound file offer queued");
        file_id
    }

    /// Moves a transfer to `status`, e.g. to simulate an offer expiring.
    pub async fn set_transfer_status(&self, file_id: &str, status: TransferStatus) -> bool {
        let mut state = self.inner.write().await;
        match state.transfers.iter_mut().find(|offer| offer.file_id == file_id) {
            Some(offer) => {
                offer.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn transfers(&self) -> Vec<FileTransferOffer> {
        self.inner.read().await.transfers.clone()
    }

    pub async fn messages(&self) -> Vec<WireMessage> {
        self.inner.read().await.messages.clone()
    }

    pub async fn blocked(&self) -> BTreeSet<Username> {
        self.inner.read().await.blocked.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(PATH_PING, get(ping_handler))
        .route(PATH_MESSAGES, get(messages_handler))
        .route(PATH_USERS, get(users_handler))
        .route(PATH_ACL, get(acl_handler))
        .route(PATH_TRANSFERS, get(transfers_handler))
        .route(PATH_SEND, post(send_handler))
        .route(PATH_FILE_RESPONSE, post(file_response_handler))
        .route(PATH_SEND_FILE, post(send_file_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), String> {
    info!(
        "dev peer listening on {}",
        listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_owned())
    );
    axum::serve(listener, build_router(state))
        .await
        .map_err(|err| err.to_string())
}

async fn ping_handler() -> StatusCode {
    StatusCode::OK
}

async fn messages_handler(State(state): State<AppState>) -> Json<MessagesBody> {
    Json(MessagesBody {
        messages: state.messages().await,
    })
}

async fn users_handler(State(state): State<AppState>) -> Json<UsersBody> {
    Json(UsersBody {
        users: state.inner.read().await.roster(),
    })
}

async fn acl_handler(State(state): State<AppState>) -> Json<AclBody> {
    Json(AclBody {
        blocked: state.blocked().await.into_iter().collect(),
    })
}

async fn transfers_handler(State(state): State<AppState>) -> Json<TransfersBody> {
    Json(TransfersBody {
        transfers: state.transfers().await,
    })
}

async fn send_handler(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<StatusCode, Rejection> {
    let result = state.inner.write().await.submit(&request.message);
    if let Err((status, reason)) = &result {
        warn!(%status, "send refused: {reason}");
    }
    result.map(|()| StatusCode::OK)
}

async fn file_response_handler(
    State(state): State<AppState>,
    Json(request): Json<FileResponseRequest>,
) -> Result<StatusCode, Rejection> {
    state.inner.write().await.respond(&request)?;
    Ok(StatusCode::OK)
}

async fn send_file_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<StatusCode, Rejection> {
    let bad_request = |reason: String| (StatusCode::BAD_REQUEST, reason);
    let mut file: Option<(String, usize)> = None;
    let mut target: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request(err.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FORM_FIELD_FILE) => {
                let file_name = field.file_name().unwrap_or("upload").to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| bad_request(err.to_string()))?;
                file = Some((file_name, bytes.len()));
            }
            Some(FORM_FIELD_TARGET) => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| bad_request(err.to_string()))?;
                target = Some(text.trim().to_owned());
            }
            _ => {}
        }
    }

    let (file_name, size) = file.ok_or_else(|| bad_request("missing file".to_owned()))?;
    let target = target
        .filter(|target| !target.is_empty())
        .ok_or_else(|| bad_request("missing target".to_owned()))?;
    if size > MAX_UPLOAD_BYTES {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("{size} bytes exceeds the upload limit"),
        ));
    }

    let file_id = state.allocate_file_id();
    let mut peer = state.inner.write().await;
    peer.require_peer(&target)?;
    peer.transfers.push(FileTransferOffer {
        file_id: file_id.clone(),
        file_name,
        file_size: size as u64,
        progress: 0,
        status: TransferStatus::Pending,
        direction: TransferDirection::Send,
        peer_name: target.clone(),
    });
    info!(%file_id, %target, size, "outbound file offer queued");
    Ok(StatusCode::OK)
}
