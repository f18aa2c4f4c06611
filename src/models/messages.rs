use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::delta::EditorDelta;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct JoinMessage {
    #[serde(default, rename = "reportid")]
    pub report_id: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

/// A single live edit. Also the envelope used inside `contents` maps and
/// the shape stored per subsection: `{"type": "delta", "delta": {...}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeltaMessage {
    pub delta: EditorDelta,
}

/// Full section state pushed by a client, keyed by editor id.
///
/// `sync` and `updateRepo` share this shape.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ContentsMessage {
    #[serde(default, rename = "reportid")]
    pub report_id: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    pub contents: HashMap<String, DeltaMessage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CloseMessage {
    #[serde(default)]
    pub section: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ReceivedMessage {
    #[serde(rename = "join")]
    Join(JoinMessage),
    #[serde(rename = "sync")]
    Sync(ContentsMessage),
    #[serde(rename = "updateRepo")]
    UpdateRepo(ContentsMessage),
    #[serde(rename = "delta")]
    Delta(DeltaMessage),
    #[serde(rename = "close")]
    Close(CloseMessage),
    #[serde(other)]
    Unknown,
}

impl ReceivedMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ReceivedMessage::Join(_) => "join",
            ReceivedMessage::Sync(_) => "sync",
            ReceivedMessage::UpdateRepo(_) => "updateRepo",
            ReceivedMessage::Delta(_) => "delta",
            ReceivedMessage::Close(_) => "close",
            ReceivedMessage::Unknown => "unknown",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "delta")]
    Delta(DeltaMessage),
}

/// Control messages addressed to a single peer. Discriminated by `action`
/// rather than `type` so clients never confuse them with edits.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action")]
pub enum ControlMessage {
    #[serde(rename = "request_contents")]
    RequestContents,
}
