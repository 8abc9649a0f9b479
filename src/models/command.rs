use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of presenter actions carried on the wire and in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    #[serde(rename = "gotoPage")]
    GotoPage,
    #[serde(rename = "drawLine", alias = "draw")]
    DrawLine,
    #[serde(rename = "clearSlide")]
    ClearSlide,
    #[serde(rename = "close")]
    Close,
}

impl CommandKind {
    /// Column value used by the command log.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::GotoPage => "gotoPage",
            CommandKind::DrawLine => "drawLine",
            CommandKind::ClearSlide => "clearSlide",
            CommandKind::Close => "close",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gotoPage" => Some(CommandKind::GotoPage),
            "drawLine" | "draw" => Some(CommandKind::DrawLine),
            "clearSlide" => Some(CommandKind::ClearSlide),
            "close" => Some(CommandKind::Close),
            _ => None,
        }
    }
}

/// One unit of presenter action.
///
/// `id` and `session_id` never cross the wire. `timestamp` goes out but is
/// never read back: the server assigns all three, so anything a client
/// sends for them is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(skip)]
    pub id: Option<i64>,
    #[serde(skip)]
    pub session_id: i64,
    #[serde(skip_deserializing, default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub cmd: CommandKind,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coords: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(rename = "canvasWidth", skip_serializing_if = "Option::is_none")]
    pub canvas_width: Option<i64>,
    #[serde(rename = "canvasHeight", skip_serializing_if = "Option::is_none")]
    pub canvas_height: Option<i64>,
}

fn default_page() -> i64 {
    1
}

impl Command {
    /// A payload-free command stamped with the current time.
    pub fn new(session_id: i64, cmd: CommandKind, page: i64) -> Self {
        Self {
            id: None,
            session_id,
            timestamp: Utc::now(),
            cmd,
            page,
            coords: None,
            color: None,
            width: None,
            canvas_width: None,
            canvas_height: None,
        }
    }

    /// Synthetic terminal command published when a session is stopped.
    pub fn close(session_id: i64) -> Self {
        Self::new(session_id, CommandKind::Close, default_page())
    }

    pub fn is_close(&self) -> bool {
        self.cmd == CommandKind::Close
    }
}
