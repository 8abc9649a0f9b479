use super::events::close_code;
use crate::error::AppError;

/// Why a connection ended abnormally. Each variant maps to the close frame
/// the client receives, if the socket is still writable.
#[derive(Debug)]
pub enum GatewayError {
    SessionNotFound,
    Decode(String),
    Protocol(String),
    HandshakeTimeout,
    SubscriberOverrun,
    /// Evicted while a write to the peer was stuck; no close frame can be
    /// delivered, so the socket is just dropped.
    Stalled,
    Infrastructure(AppError),
    Internal(String),
    /// The peer went away mid-write or mid-read.
    Transport,
}

impl GatewayError {
    pub fn close_code(&self) -> Option<u16> {
        match self {
            GatewayError::SessionNotFound => Some(close_code::SESSION_NOT_FOUND),
            GatewayError::Decode(_) | GatewayError::Protocol(_) => Some(close_code::DECODE_ERROR),
            GatewayError::HandshakeTimeout => Some(close_code::HANDSHAKE_TIMEOUT),
            GatewayError::SubscriberOverrun => Some(close_code::SUBSCRIBER_OVERRUN),
            GatewayError::Infrastructure(_) | GatewayError::Internal(_) => {
                Some(close_code::INTERNAL_ERROR)
            }
            GatewayError::Stalled | GatewayError::Transport => None,
        }
    }

    /// Reason text for the close frame. It never echoes client input or
    /// infrastructure detail; `Display` carries those for the logs.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::SessionNotFound => "unknown session",
            GatewayError::Decode(_) => "decode error",
            GatewayError::Protocol(_) => "protocol error",
            GatewayError::HandshakeTimeout => "handshake timed out",
            GatewayError::SubscriberOverrun | GatewayError::Stalled => "spectator fell behind",
            GatewayError::Infrastructure(_) | GatewayError::Internal(_) => "internal error",
            GatewayError::Transport => "",
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Decode(msg) => write!(f, "decode error: {msg}"),
            GatewayError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            GatewayError::Infrastructure(e) => write!(f, "{e}"),
            GatewayError::Internal(msg) => write!(f, "internal error: {msg}"),
            GatewayError::Stalled => write!(f, "evicted spectator stopped reading"),
            GatewayError::Transport => write!(f, "transport closed"),
            other => write!(f, "{}", other.reason()),
        }
    }
}

impl From<AppError> for GatewayError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::NotFound(_) => GatewayError::SessionNotFound,
            other => GatewayError::Infrastructure(other),
        }
    }
}
