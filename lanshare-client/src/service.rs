use std::{future::Future, time::Duration};

use lanshare_core::api::{
    AclBody, FORM_FIELD_FILE, FORM_FIELD_TARGET, FileResponseRequest, MessagesBody, PATH_ACL,
    PATH_FILE_RESPONSE, PATH_MESSAGES, PATH_PING, PATH_SEND, PATH_SEND_FILE, PATH_TRANSFERS,
    PATH_USERS, SendRequest, TransfersBody, UsersBody,
};
use lanshare_core::{BlockList, FileTransferOffer, Message};
use reqwest::{Response, multipart};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{path} answered HTTP {status}")]
    Status { path: &'static str, status: u16 },
    #[error("unexpected response from {path}: {reason}")]
    Malformed { path: &'static str, reason: String },
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("file is {size} bytes, over the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },
}

impl ClientError {
    /// Whether the service could not be reached or refused the request.
    /// A body that fails to decode came from a live service and does not count.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

/// The remote resources a session polls and mutates.
pub trait PeerService {
    fn fetch_messages(&self) -> impl Future<Output = Result<Vec<Message>, ClientError>>;

    /// Raw roster display strings, one of them carrying the self marker.
    fn fetch_roster(&self) -> impl Future<Output = Result<Vec<String>, ClientError>>;

    fn fetch_transfers(&self)
    -> impl Future<Output = Result<Vec<FileTransferOffer>, ClientError>>;

    fn fetch_block_list(&self) -> impl Future<Output = Result<BlockList, ClientError>>;

    fn probe(&self) -> impl Future<Output = Result<(), ClientError>>;

    fn send_message(&self, text: &str) -> impl Future<Output = Result<(), ClientError>>;

    fn send_file_offer(
        &self,
        file_name: &str,
        payload: Vec<u8>,
        target: &str,
    ) -> impl Future<Output = Result<(), ClientError>>;

    fn respond_to_transfer(
        &self,
        file_id: &str,
        accepted: bool,
    ) -> impl Future<Output = Result<(), ClientError>>;
}

/// [`PeerService`] over the peer's local HTTP interface.
#[derive(Debug, Clone)]
pub struct HttpPeerService {
    http: reqwest::Client,
    base: Url,
}

impl HttpPeerService {
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(server_url)?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, ClientError> {
        let response = self.http.get(self.endpoint(path)?).send().await?;
        let body = ensure_success(path, response)?.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| ClientError::Malformed {
            path,
            reason: err.to_string(),
        })
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &'static str,
        body: &B,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        ensure_success(path, response)?;
        Ok(())
    }
}

fn ensure_success(path: &'static str, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            path,
            status: status.as_u16(),
        });
    }
    Ok(response)
}

impl PeerService for HttpPeerService {
    async fn fetch_messages(&self) -> Result<Vec<Message>, ClientError> {
        let body: MessagesBody = self.get_json(PATH_MESSAGES).await?;
        Ok(body.messages.into_iter().map(Message::from).collect())
    }

    async fn fetch_roster(&self) -> Result<Vec<String>, ClientError> {
        let body: UsersBody = self.get_json(PATH_USERS).await?;
        Ok(body.users)
    }

    async fn fetch_transfers(&self) -> Result<Vec<FileTransferOffer>, ClientError> {
        let body: TransfersBody = self.get_json(PATH_TRANSFERS).await?;
        Ok(body.transfers)
    }

    async fn fetch_block_list(&self) -> Result<BlockList, ClientError> {
        let body: AclBody = self.get_json(PATH_ACL).await?;
        Ok(body.blocked.into_iter().collect())
    }

    async fn probe(&self) -> Result<(), ClientError> {
        let response = self.http.get(self.endpoint(PATH_PING)?).send().await?;
        ensure_success(PATH_PING, response)?;
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<(), ClientError> {
        debug!(len = text.len(), "sending message");
        self.post_json(
            PATH_SEND,
            &SendRequest {
                message: text.to_owned(),
            },
        )
        .await
    }

    async fn send_file_offer(
        &self,
        file_name: &str,
        payload: Vec<u8>,
        target: &str,
    ) -> Result<(), ClientError> {
        let part = multipart::Part::bytes(payload).file_name(file_name.to_owned());
        let form = multipart::Form::new()
            .part(FORM_FIELD_FILE, part)
            .text(FORM_FIELD_TARGET, target.to_owned());
        let response = self
            .http
            .post(self.endpoint(PATH_SEND_FILE)?)
            .multipart(form)
            .send()
            .await?;
        ensure_success(PATH_SEND_FILE, response)?;
        Ok(())
    }

    async fn respond_to_transfer(&self, file_id: &str, accepted: bool) -> Result<(), ClientError> {
        self.post_json(
            PATH_FILE_RESPONSE,
            &FileResponseRequest {
                file_id: file_id.to_owned(),
                accepted,
            },
        )
        .await
    }
}
