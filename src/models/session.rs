use serde::{Deserialize, Serialize};

use super::command::Command;

/// Durable identity and lifecycle of one presentation session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub upload_id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub started: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<String>,
}

/// What the registry knows about a session's owner.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOwner {
    pub owner_id: String,
    pub session_id: i64,
    pub ended: Option<String>,
}

/// Row of the owner's session list.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub started: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<String>,
}

/// Public view of a session, including its replayable command log.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub title: String,
    pub upload_id: String,
    pub owner: bool,
    pub page: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<String>,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Deserialize)]
pub struct StartSession {
    pub upload_id: String,
}
