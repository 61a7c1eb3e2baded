//! A stand-in for the chat application that normally runs inside the iframe. It announces
//! readiness after a delay and answers every request the way the real app would.

use dial_overlay_core::platform::memory::{FramePost, MemoryHost};
use dial_overlay_core::platform::ElementId;
use dial_overlay_core::protocol::{self, response_type};
use log::{debug, trace, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const ORIGIN: &str = "https://chat.example";

#[derive(Default)]
struct FrameState {
    system_prompt: Option<String>,
    conversations: Vec<Value>,
    selected: Option<String>,
    messages: Vec<Value>,
}

pub struct FrameApp {
    host: Arc<MemoryHost>,
    frames: HashMap<ElementId, FrameState>,
    next_conversation: usize,
}

impl FrameApp {
    pub fn new(host: Arc<MemoryHost>) -> Self {
        Self {
            host,
            frames: HashMap::new(),
            next_conversation: 1,
        }
    }

    /// Runs until every overlay frame is gone and the host drops the post stream.
    pub async fn run(mut self, mut posts: mpsc::UnboundedReceiver<FramePost>, ready_delay: Duration) {
        tokio::time::sleep(ready_delay).await;
        debug!("Chat app loaded, announcing readiness");
        self.host
            .dispatch_message(json!({ "type": protocol::READY }), ORIGIN);

        while let Some(post) = posts.recv().await {
            self.handle(post);
        }
    }

    fn handle(&mut self, post: FramePost) {
        let message = &post.message;
        let (Some(request_type), Some(request_id)) =
            (message["type"].as_str(), message["requestId"].as_str())
        else {
            warn!("Chat app received a message without type or requestId: {}", message);
            return;
        };
        trace!("Chat app handling {} ({})", request_type, request_id);

        let payload = &message["payload"];
        let frame = post.frame;
        let response = match request_type {
            protocol::SET_OVERLAY_OPTIONS => Value::Null,
            protocol::GET_MESSAGES => {
                let state = self.state(frame);
                json!({ "conversationId": state.selected, "messages": state.messages })
            }
            protocol::SEND_MESSAGE => {
                let content = payload["content"].as_str().unwrap_or_default().to_string();
                self.generate(frame, &content);
                json!({ "ok": true })
            }
            protocol::SET_SYSTEM_PROMPT => {
                self.state(frame).system_prompt = payload["systemPrompt"].as_str().map(str::to_string);
                json!({ "ok": true })
            }
            protocol::GET_CONVERSATIONS => {
                json!({ "conversations": self.state(frame).conversations })
            }
            protocol::CREATE_CONVERSATION => {
                let id = format!("conversation-{}", self.next_conversation);
                self.next_conversation += 1;
                let conversation = json!({
                    "id": id,
                    "name": "New conversation",
                    "folderId": payload["parentPath"],
                });
                self.state(frame).conversations.push(conversation.clone());
                conversation
            }
            protocol::SELECT_CONVERSATION => {
                let id = payload["id"].as_str().map(str::to_string);
                let state = self.state(frame);
                let found = state
                    .conversations
                    .iter()
                    .find(|conversation| conversation["id"].as_str() == id.as_deref())
                    .cloned();
                if found.is_some() {
                    state.selected = id;
                    state.messages.clear();
                }
                json!({ "conversation": found })
            }
            other => {
                warn!("Chat app does not understand {}", other);
                return;
            }
        };

        self.host.dispatch_message(
            json!({
                "type": response_type(request_type),
                "requestId": request_id,
                "payload": response,
            }),
            ORIGIN,
        );
    }

    /// Streams a canned answer, bracketed by the generating events.
    fn generate(&mut self, frame: ElementId, content: &str) {
        self.host
            .dispatch_message(json!({ "type": protocol::GPT_START_GENERATING }), ORIGIN);

        let state = self.state(frame);
        let answer = match &state.system_prompt {
            Some(prompt) => format!("({prompt}) You said: {content}"),
            None => format!("You said: {content}"),
        };
        state.messages.push(json!({ "role": "user", "content": content }));
        state.messages.push(json!({ "role": "assistant", "content": answer }));

        self.host
            .dispatch_message(json!({ "type": protocol::GPT_END_GENERATING }), ORIGIN);
    }

    fn state(&mut self, frame: ElementId) -> &mut FrameState {
        self.frames.entry(frame).or_default()
    }
}
