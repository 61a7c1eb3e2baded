//! Wire format of the host <-> iframe channel.
//!
//! Outbound requests carry a `requestId`; the iframe answers with `<type>/RESPONSE` echoing it.
//! Anything inbound without a `requestId` is either the readiness signal or a broadcast event.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const READY: &str = "@DIAL_OVERLAY/READY";
pub const SET_OVERLAY_OPTIONS: &str = "@DIAL_OVERLAY/SET_OVERLAY_OPTIONS";
pub const GET_MESSAGES: &str = "@DIAL_OVERLAY/GET_MESSAGES";
pub const SEND_MESSAGE: &str = "@DIAL_OVERLAY/SEND_MESSAGE";
pub const SET_SYSTEM_PROMPT: &str = "@DIAL_OVERLAY/SET_SYSTEM_PROMPT";
pub const GET_CONVERSATIONS: &str = "@DIAL_OVERLAY/GET_CONVERSATIONS";
pub const CREATE_CONVERSATION: &str = "@DIAL_OVERLAY/CREATE_CONVERSATION";
pub const SELECT_CONVERSATION: &str = "@DIAL_OVERLAY/SELECT_CONVERSATION";

/// Broadcast when the embedded chat starts streaming an answer.
pub const GPT_START_GENERATING: &str = "@DIAL_OVERLAY/GPT_START_GENERATING";
/// Broadcast when the embedded chat finishes streaming an answer.
pub const GPT_END_GENERATING: &str = "@DIAL_OVERLAY/GPT_END_GENERATING";

pub const RESPONSE_SUFFIX: &str = "/RESPONSE";

/// The response type the iframe uses to answer `request_type`.
pub fn response_type(request_type: &str) -> String {
    format!("{request_type}{RESPONSE_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub request_id: String,
}

impl OutboundMessage {
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Ready,
    Response {
        message_type: String,
        request_id: String,
        payload: Value,
    },
    Event {
        message_type: String,
        payload: Value,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInbound {
    #[serde(rename = "type", default)]
    message_type: Option<Value>,
    #[serde(default)]
    request_id: Option<Value>,
    #[serde(default)]
    payload: Option<Value>,
}

impl InboundMessage {
    /// Classifies untyped message data. Returns `None` for data that isn't an object with a
    /// string `type`, which the overlay ignores.
    pub fn parse(data: &Value) -> Option<Self> {
        if !data.is_object() {
            return None;
        }
        let raw = RawInbound::deserialize(data).ok()?;
        let message_type = match raw.message_type {
            Some(Value::String(message_type)) if !message_type.is_empty() => message_type,
            _ => return None,
        };

        if message_type == READY {
            return Some(InboundMessage::Ready);
        }

        let payload = raw.payload.unwrap_or(Value::Null);
        match raw.request_id {
            Some(Value::String(request_id)) => Some(InboundMessage::Response {
                message_type,
                request_id,
                payload,
            }),
            Some(Value::Null) | None => Some(InboundMessage::Event {
                message_type,
                payload,
            }),
            // Ids are always generated as strings, nothing could correlate with anything else.
            Some(_) => None,
        }
    }
}

pub fn send_message_payload(content: &str) -> Value {
    json!({ "content": content })
}

pub fn system_prompt_payload(system_prompt: &str) -> Value {
    json!({ "systemPrompt": system_prompt })
}

pub fn create_conversation_payload(parent_path: Option<&str>) -> Value {
    json!({ "parentPath": parent_path })
}

pub fn select_conversation_payload(conversation_id: &str) -> Value {
    json!({ "id": conversation_id })
}
