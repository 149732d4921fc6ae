//! HTTP resource contract of the peer service: paths and JSON bodies.

use serde::{Deserialize, Serialize};

use crate::model::{FileId, FileTransferOffer, WireMessage};

pub const PATH_PING: &str = "/ping";
pub const PATH_MESSAGES: &str = "/messages";
pub const PATH_USERS: &str = "/users";
pub const PATH_TRANSFERS: &str = "/filetransfers";
pub const PATH_ACL: &str = "/acl";
pub const PATH_SEND: &str = "/send";
pub const PATH_SEND_FILE: &str = "/sendfile";
pub const PATH_FILE_RESPONSE: &str = "/fileresponse";

pub const FORM_FIELD_FILE: &str = "file";
pub const FORM_FIELD_TARGET: &str = "targetName";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesBody {
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsersBody {
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransfersBody {
    pub transfers: Vec<FileTransferOffer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AclBody {
    pub blocked: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileResponseRequest {
    pub file_id: FileId,
    pub accepted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_response_uses_camel_case() {
        let body = serde_json::to_value(FileResponseRequest {
            file_id: "f1".to_owned(),
            accepted: true,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"fileId": "f1", "accepted": true}));
    }

    #[test]
    fn missing_field_is_rejected() {
        assert!(serde_json::from_str::<UsersBody>(r#"{"peers": []}"#).is_err());
    }
}
