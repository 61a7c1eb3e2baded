use crate::error::{OverlayError, OverlayResult};
use crate::protocol::{response_type, OutboundMessage};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// One outstanding request. Settles exactly once: the first reply (or rejection) wins and
/// later ones are ignored.
pub struct DeferredRequest {
    request_type: String,
    request_id: String,
    payload: Option<Value>,
    deadline: Instant,
    is_replied: bool,
    sender: Option<oneshot::Sender<OverlayResult<Value>>>,
}

impl DeferredRequest {
    /// Creates the request and the awaitable half. The timeout clock starts now.
    pub fn new(
        request_type: impl Into<String>,
        payload: Option<Value>,
        timeout: Duration,
    ) -> (Self, PendingReply) {
        let request_type = request_type.into();
        let (sender, receiver) = oneshot::channel();
        let deadline = Instant::now() + timeout;

        let request = Self {
            request_type: request_type.clone(),
            request_id: Uuid::new_v4().to_string(),
            payload,
            deadline,
            is_replied: false,
            sender: Some(sender),
        };
        let pending = PendingReply {
            request_type,
            timeout,
            deadline,
            receiver: Some(receiver),
        };
        (request, pending)
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn is_replied(&self) -> bool {
        self.is_replied
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn to_post_message(&self) -> OutboundMessage {
        OutboundMessage {
            message_type: self.request_type.clone(),
            payload: self.payload.clone(),
            request_id: self.request_id.clone(),
        }
    }

    pub fn matches(&self, incoming_type: &str, incoming_request_id: &str) -> bool {
        incoming_request_id == self.request_id && incoming_type == response_type(&self.request_type)
    }

    pub fn reply(&mut self, payload: Value) {
        self.settle(Ok(payload));
    }

    pub fn reject(&mut self, error: OverlayError) {
        self.settle(Err(error));
    }

    fn settle(&mut self, result: OverlayResult<Value>) {
        if self.is_replied {
            return;
        }
        self.is_replied = true;
        if let Some(sender) = self.sender.take() {
            // The receiver is gone after a timeout, which is fine: nobody observes the result.
            let _ = sender.send(result);
        }
    }
}

/// The caller's side of a [`DeferredRequest`]. Await it to get the reply payload.
#[must_use = "a pending reply does nothing unless awaited"]
pub struct PendingReply {
    request_type: String,
    timeout: Duration,
    deadline: Instant,
    receiver: Option<oneshot::Receiver<OverlayResult<Value>>>,
}

impl PendingReply {
    /// A reply that fails immediately with `error`.
    pub fn failed(request_type: impl Into<String>, error: OverlayError) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(Err(error));
        Self {
            request_type: request_type.into(),
            timeout: Duration::ZERO,
            deadline: Instant::now(),
            receiver: Some(receiver),
        }
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn wait(mut self) -> OverlayResult<Value> {
        let Some(receiver) = self.receiver.take() else {
            return Err(OverlayError::Closed);
        };

        match tokio::time::timeout_at(self.deadline, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OverlayError::Closed),
            Err(_) => Err(OverlayError::Timeout {
                request_type: self.request_type.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Waits for the reply and deserializes its payload.
    pub async fn json<T: DeserializeOwned>(self) -> OverlayResult<T> {
        let payload = self.wait().await?;
        Ok(serde_json::from_value(payload)?)
    }
}

impl IntoFuture for PendingReply {
    type Output = OverlayResult<Value>;
    type IntoFuture = Pin<Box<dyn Future<Output = OverlayResult<Value>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_are_unique_uuids() {
        let (first, _a) = DeferredRequest::new("A", None, DEFAULT_REQUEST_TIMEOUT);
        let (second, _b) = DeferredRequest::new("A", None, DEFAULT_REQUEST_TIMEOUT);
        assert_ne!(first.request_id(), second.request_id());
        assert!(Uuid::parse_str(first.request_id()).is_ok());
    }

    #[test]
    fn test_post_message_shape() {
        let (request, _pending) = DeferredRequest::new(
            "@DIAL_OVERLAY/SEND_MESSAGE",
            Some(json!({"content": "hi"})),
            DEFAULT_REQUEST_TIMEOUT,
        );
        let message = request.to_post_message();
        assert_eq!(message.message_type, "@DIAL_OVERLAY/SEND_MESSAGE");
        assert_eq!(message.payload.as_ref(), request.payload());
        assert_eq!(request.payload(), Some(&json!({"content": "hi"})));
        assert_eq!(message.request_id, request.request_id());
    }

    #[test]
    fn test_match_requires_response_type_and_id() {
        let (request, _pending) = DeferredRequest::new("T", None, DEFAULT_REQUEST_TIMEOUT);
        let id = request.request_id().to_string();

        assert!(request.matches("T/RESPONSE", &id));
        assert!(!request.matches("T", &id));
        assert!(!request.matches("U/RESPONSE", &id));
        assert!(!request.matches("T/RESPONSE", "other"));
    }

    #[tokio::test]
    async fn test_reply_is_idempotent() {
        let (mut request, pending) = DeferredRequest::new("T", None, DEFAULT_REQUEST_TIMEOUT);
        request.reply(json!(1));
        request.reply(json!(2));
        request.reject(OverlayError::Closed);

        assert!(request.is_replied());
        assert_eq!(pending.await.unwrap(), json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_names_request_type() {
        let (_request, pending) =
            DeferredRequest::new("@DIAL_OVERLAY/GET_MESSAGES", None, Duration::from_millis(20));

        match pending.await {
            Err(OverlayError::Timeout {
                request_type,
                timeout_ms,
            }) => {
                assert_eq!(request_type, "@DIAL_OVERLAY/GET_MESSAGES");
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_after_timeout_is_silent() {
        let (mut request, pending) = DeferredRequest::new("T", None, Duration::from_millis(5));
        assert!(matches!(pending.await, Err(OverlayError::Timeout { .. })));
        assert!(request.is_expired());

        request.reply(json!("late"));
        assert!(request.is_replied());
    }

    #[tokio::test]
    async fn test_dropped_request_closes_reply() {
        let (request, pending) = DeferredRequest::new("T", None, DEFAULT_REQUEST_TIMEOUT);
        drop(request);
        assert!(matches!(pending.await, Err(OverlayError::Closed)));
    }

    #[tokio::test]
    async fn test_json_deserializes_payload() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Ack {
            ok: bool,
        }

        let (mut request, pending) = DeferredRequest::new("T", None, DEFAULT_REQUEST_TIMEOUT);
        request.reply(json!({"ok": true}));
        assert_eq!(pending.json::<Ack>().await.unwrap(), Ack { ok: true });
    }
}
