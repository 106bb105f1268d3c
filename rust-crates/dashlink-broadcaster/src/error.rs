use thiserror::Error;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Unknown topic path: {0}")]
    UnknownTopic(String),

    #[error("Connection {0} is closed")]
    ConnectionClosed(u64),

    #[error("Invalid dashboard settings: {0}")]
    InvalidSettings(String),

    #[error("WebSocket handshake timed out")]
    HandshakeTimeout,

    #[error("Broadcaster not started")]
    NotStarted,

    #[error("Broadcaster already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;

/// Malformed or unsupported inbound message.
///
/// Logged and dropped; never sent back to the client. Display text never
/// includes client-supplied values since it ends up in dashboard log
/// payloads; use `Debug` for the details.
#[derive(Error, Debug, PartialEq)]
pub enum ProtocolError {
    #[error("Message has no request field")]
    MissingRequest,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} is not a number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Unknown request")]
    UnknownRequest(String),

    #[error("Unknown value type")]
    UnknownValueType(String),

    #[error("Unknown mode")]
    UnknownMode(String),

    #[error("No such vector")]
    UnknownVector(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display_omits_client_text() {
        let errors = [
            ProtocolError::UnknownRequest("x~$#$~dial".to_string()),
            ProtocolError::UnknownValueType("a*$#$*b".to_string()),
            ProtocolError::UnknownMode("m&n=o".to_string()),
            ProtocolError::UnknownVector("v~w".to_string()),
            ProtocolError::InvalidNumber {
                field: "value",
                value: "1~$#$~2".to_string(),
            },
        ];

        for error in errors {
            assert!(!crate::wire::contains_reserved(&error.to_string()), "{}", error);
        }
    }
}
