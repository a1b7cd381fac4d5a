//! Wire protocol for chitai reading sessions.
//!
//! Every frame on the session channel is a JSON object of the form
//! `{"type": <kind>, "payload": {...}}`.
//!
//! - **Client messages** (client → server): the closed set of mutations a
//!   connected party may request (`start_session`, `end_session`, `add_item`,
//!   `advance_word`, `next_item`).
//! - **Server messages** (server → client): the full session `state` snapshot,
//!   or an `error` addressed to the connection whose request failed.
//!
//! # Example
//!
//! ```
//! use chitai_protocol::{ClientMessage, ItemSource};
//!
//! let msg = ClientMessage::parse(r#"{"type":"add_item","payload":{"text":"cat"}}"#).unwrap();
//! assert!(matches!(
//!     msg,
//!     ClientMessage::AddItem { source: ItemSource::Text(ref t), .. } if t == "cat"
//! ));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Shared Types
// ============================================================================

/// Language of a session and of the content items read in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    De,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::De => "de",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Language::Ru),
            "de" => Ok(Language::De),
            "en" => Ok(Language::En),
            other => Err(ProtocolError::UnknownLanguage(other.to_string())),
        }
    }
}

/// Role label a connection announces when it joins.
///
/// The label only selects which presentation a client renders. It grants no
/// protocol authority: every role may send every client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Controller,
    Display,
    Observer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Controller => "controller",
            Role::Display => "display",
            Role::Observer => "observer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Client Messages (client → server)
// ============================================================================

/// Where the content of an `add_item` request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSource {
    /// Free text, resolved (and deduplicated) against the session language.
    Text(String),
    /// Identifier of an item that already exists in storage.
    ItemId(String),
}

/// Messages a connected party may send.
///
/// Serialized as `{"type": <kind>, "payload": {...}}`. Decoding goes through
/// [`ClientMessage::parse`] to get a classified [`ProtocolError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Frame", into = "Frame")]
pub enum ClientMessage {
    StartSession {
        language: Option<Language>,
    },
    EndSession,
    AddItem {
        source: ItemSource,
        language: Option<Language>,
    },
    AdvanceWord {
        delta: i64,
    },
    NextItem,
}

/// Wire shape of a client frame. The payload may be absent, `null` or `{}`
/// for kinds without fields.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
enum Frame {
    StartSession(Option<StartSessionPayload>),
    EndSession(Option<EmptyPayload>),
    AddItem(Option<AddItemPayload>),
    AdvanceWord(Option<AdvanceWordPayload>),
    NextItem(Option<EmptyPayload>),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EmptyPayload {}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StartSessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<Language>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AddItemPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<Language>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AdvanceWordPayload {
    #[serde(default = "default_delta")]
    delta: i64,
}

impl Default for AdvanceWordPayload {
    fn default() -> Self {
        Self {
            delta: default_delta(),
        }
    }
}

fn default_delta() -> i64 {
    1
}

/// Just the tag, read first so a rejected frame can be classified.
#[derive(Deserialize)]
struct Tag {
    #[serde(rename = "type")]
    kind: String,
}

impl ClientMessage {
    /// Every `type` a client may send.
    pub const KINDS: &'static [&'static str] = &[
        "start_session",
        "end_session",
        "add_item",
        "advance_word",
        "next_item",
    ];

    /// Parse and validate one inbound text frame.
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(frame)?;
        let Tag { kind } = Tag::deserialize(&value)?;
        if !Self::KINDS.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        let frame = Frame::deserialize(value)
            .map_err(|e| ProtocolError::invalid_payload(&kind, e.to_string()))?;
        ClientMessage::try_from(frame)
    }

    /// Message kind as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::StartSession { .. } => "start_session",
            ClientMessage::EndSession => "end_session",
            ClientMessage::AddItem { .. } => "add_item",
            ClientMessage::AdvanceWord { .. } => "advance_word",
            ClientMessage::NextItem => "next_item",
        }
    }
}

impl TryFrom<Frame> for ClientMessage {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let message = match frame {
            Frame::StartSession(payload) => ClientMessage::StartSession {
                language: payload.unwrap_or_default().language,
            },
            Frame::EndSession(_) => ClientMessage::EndSession,
            Frame::AddItem(payload) => {
                let kind = "add_item";
                let payload = payload.unwrap_or_default();
                let source = match (payload.text, payload.item_id) {
                    (Some(text), None) if !text.trim().is_empty() => ItemSource::Text(text),
                    (Some(_), None) => {
                        return Err(ProtocolError::invalid_payload(kind, "text is blank"));
                    }
                    (None, Some(id)) if !id.trim().is_empty() => ItemSource::ItemId(id),
                    (None, Some(_)) => {
                        return Err(ProtocolError::invalid_payload(kind, "item_id is blank"));
                    }
                    (Some(_), Some(_)) => {
                        return Err(ProtocolError::invalid_payload(
                            kind,
                            "text and item_id are mutually exclusive",
                        ));
                    }
                    (None, None) => {
                        return Err(ProtocolError::invalid_payload(
                            kind,
                            "one of text or item_id is required",
                        ));
                    }
                };
                ClientMessage::AddItem {
                    source,
                    language: payload.language,
                }
            }
            Frame::AdvanceWord(payload) => ClientMessage::AdvanceWord {
                delta: payload.unwrap_or_default().delta,
            },
            Frame::NextItem(_) => ClientMessage::NextItem,
        };
        Ok(message)
    }
}

impl From<ClientMessage> for Frame {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::StartSession { language } => {
                Frame::StartSession(Some(StartSessionPayload { language }))
            }
            ClientMessage::EndSession => Frame::EndSession(Some(EmptyPayload {})),
            ClientMessage::AddItem { source, language } => {
                let (text, item_id) = match source {
                    ItemSource::Text(text) => (Some(text), None),
                    ItemSource::ItemId(id) => (None, Some(id)),
                };
                Frame::AddItem(Some(AddItemPayload {
                    text,
                    item_id,
                    language,
                }))
            }
            ClientMessage::AdvanceWord { delta } => {
                Frame::AdvanceWord(Some(AdvanceWordPayload { delta }))
            }
            ClientMessage::NextItem => Frame::NextItem(Some(EmptyPayload {})),
        }
    }
}

// ============================================================================
// Server Messages (server → client)
// ============================================================================

/// Messages the server pushes to connected parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full session snapshot. Broadcast after every state change and sent once
    /// on connect.
    State(StatePayload),
    /// A request from this connection could not be committed.
    Error(ErrorPayload),
}

/// Snapshot of "what is on screen right now".
///
/// `current_word_index == None` with non-empty `words` means the current item
/// is completed; empty `words` means nothing is loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub session_id: Option<String>,
    pub language: Option<Language>,
    pub words: Vec<String>,
    pub syllables: Vec<Vec<String>>,
    pub current_word_index: Option<usize>,
    pub illustration_id: Option<String>,
    pub queue: Vec<QueueItem>,
}

/// One pending entry of the session queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub session_item_id: String,
    pub item_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorPayload {
            code: code.into(),
            message: message.into(),
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons an inbound frame is rejected.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("unknown language '{0}'")]
    UnknownLanguage(String),
}

impl ProtocolError {
    fn invalid_payload(kind: &str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidPayload {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds_without_payload() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"next_item"}"#).unwrap(),
            ClientMessage::NextItem
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"next_item","payload":{}}"#).unwrap(),
            ClientMessage::NextItem
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"end_session","payload":null}"#).unwrap(),
            ClientMessage::EndSession
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"start_session"}"#).unwrap(),
            ClientMessage::StartSession { language: None }
        );
    }

    #[test]
    fn test_parse_start_session_with_language() {
        let msg =
            ClientMessage::parse(r#"{"type":"start_session","payload":{"language":"en"}}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartSession {
                language: Some(Language::En)
            }
        );
    }

    #[test]
    fn test_parse_advance_word_default_delta() {
        let msg = ClientMessage::parse(r#"{"type":"advance_word","payload":{}}"#).unwrap();
        assert_eq!(msg, ClientMessage::AdvanceWord { delta: 1 });

        let msg =
            ClientMessage::parse(r#"{"type":"advance_word","payload":{"delta":-3}}"#).unwrap();
        assert_eq!(msg, ClientMessage::AdvanceWord { delta: -3 });
    }

    #[test]
    fn test_parse_advance_word_rejects_non_integer_delta() {
        let err = ClientMessage::parse(r#"{"type":"advance_word","payload":{"delta":"two"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref kind, .. } if kind == "advance_word"));
    }

    #[test]
    fn test_parse_add_item_sources() {
        let msg = ClientMessage::parse(r#"{"type":"add_item","payload":{"item_id":"01J"}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::AddItem {
                source: ItemSource::ItemId("01J".to_string()),
                language: None,
            }
        );

        let msg = ClientMessage::parse(
            r#"{"type":"add_item","payload":{"text":"молоко","language":"ru"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::AddItem {
                source: ItemSource::Text("молоко".to_string()),
                language: Some(Language::Ru),
            }
        );
    }

    #[test]
    fn test_parse_add_item_requires_exactly_one_source() {
        for frame in [
            r#"{"type":"add_item","payload":{}}"#,
            r#"{"type":"add_item","payload":{"text":"a","item_id":"b"}}"#,
            r#"{"type":"add_item","payload":{"text":"   "}}"#,
        ] {
            let err = ClientMessage::parse(frame).unwrap_err();
            assert!(
                matches!(err, ProtocolError::InvalidPayload { .. }),
                "expected invalid payload for {frame}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_unknown_type_and_garbage() {
        let err = ClientMessage::parse(r#"{"type":"set_text","payload":{"text":"x"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref t) if t == "set_text"));

        let err = ClientMessage::parse("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));

        let err = ClientMessage::parse(r#"{"payload":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_client_message_serializes_as_frame() {
        let msg = ClientMessage::AddItem {
            source: ItemSource::Text("dog".to_string()),
            language: Some(Language::En),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "add_item");
        assert_eq!(json["payload"], serde_json::json!({"text": "dog", "language": "en"}));
        assert_eq!(ClientMessage::parse(&json.to_string()).unwrap(), msg);

        let json = serde_json::to_value(ClientMessage::NextItem).unwrap();
        assert_eq!(json, serde_json::json!({"type": "next_item", "payload": {}}));
    }

    #[test]
    fn test_deserialize_applies_validation() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"payload":{"delta":2},"type":"advance_word"}"#).unwrap();
        assert_eq!(msg, ClientMessage::AdvanceWord { delta: 2 });

        let err =
            serde_json::from_str::<ClientMessage>(r#"{"type":"add_item","payload":{"text":""}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("text is blank"));
    }

    #[test]
    fn test_state_message_shape() {
        let msg = ServerMessage::State(StatePayload {
            session_id: Some("s1".to_string()),
            language: Some(Language::En),
            words: vec!["cat".to_string()],
            syllables: vec![vec!["cat".to_string()]],
            current_word_index: None,
            illustration_id: None,
            queue: vec![],
        });

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["payload"]["language"], "en");
        assert_eq!(json["payload"]["words"], serde_json::json!(["cat"]));
        assert!(json["payload"]["current_word_index"].is_null());
        assert!(json["payload"]["illustration_id"].is_null());
    }

    #[test]
    fn test_error_message_shape() {
        let json = serde_json::to_value(ServerMessage::error("storage", "disk full")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["code"], "storage");
        assert_eq!(json["payload"]["message"], "disk full");
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("RU".parse::<Language>().unwrap(), Language::Ru);
        assert_eq!(" de ".parse::<Language>().unwrap(), Language::De);
        assert!("fr".parse::<Language>().is_err());
    }
}
