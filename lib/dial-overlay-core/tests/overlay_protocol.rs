use dial_overlay_core::platform::memory::MemoryHost;
use dial_overlay_core::platform::{Host, HostDocument};
use dial_overlay_core::protocol::{self, response_type};
use dial_overlay_core::{ChatOverlay, ChatOverlayOptions, OverlayError};
use serde_json::{json, Value};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

const ORIGIN: &str = "https://chat.example";

fn options(timeout_ms: u64) -> ChatOverlayOptions {
    let mut options = ChatOverlayOptions::new(ORIGIN, "https://host.example");
    options.request_timeout = Some(timeout_ms);
    options
}

fn mount(timeout_ms: u64) -> (Arc<MemoryHost>, ChatOverlay) {
    let host = MemoryHost::new(1280, 800);
    let root = host.create_element("div");
    host.append_child(host.body(), root).unwrap();
    let overlay = ChatOverlay::new(Host::from_shared(host.clone()), root, options(timeout_ms))
        .expect("Error creating overlay");
    (host, overlay)
}

fn ready(host: &MemoryHost) {
    host.dispatch_message(json!({"type": protocol::READY}), ORIGIN);
}

/// The last posted request of the given type.
fn posted_request(host: &MemoryHost, overlay: &ChatOverlay, request_type: &str) -> Value {
    host.posted_messages(overlay.frame())
        .into_iter()
        .rev()
        .find(|message| message["type"] == request_type)
        .unwrap_or_else(|| panic!("{request_type} was never posted"))
}

fn respond(host: &MemoryHost, request: &Value, payload: Value) {
    host.dispatch_message(
        json!({
            "type": response_type(request["type"].as_str().unwrap()),
            "requestId": request["requestId"].clone(),
            "payload": payload,
        }),
        ORIGIN,
    );
}

#[tokio::test]
async fn test_responses_correlate_by_request_id() {
    let (host, overlay) = mount(10_000);
    ready(&host);

    let messages = tokio::spawn(overlay.get_messages().into_future());
    let conversations = tokio::spawn(overlay.get_conversations().into_future());
    let messages_request = posted_request(&host, &overlay, protocol::GET_MESSAGES);
    let conversations_request = posted_request(&host, &overlay, protocol::GET_CONVERSATIONS);

    // Right type, wrong id
    host.dispatch_message(
        json!({
            "type": response_type(protocol::GET_MESSAGES),
            "requestId": conversations_request["requestId"].clone(),
            "payload": "wrong"
        }),
        ORIGIN,
    );
    // Right id, wrong type
    host.dispatch_message(
        json!({
            "type": response_type(protocol::SEND_MESSAGE),
            "requestId": messages_request["requestId"].clone(),
            "payload": "wrong"
        }),
        ORIGIN,
    );
    tokio::task::yield_now().await;
    assert!(!messages.is_finished());
    assert!(!conversations.is_finished());

    // Out of order
    respond(&host, &conversations_request, json!([{"id": "c1"}]));
    respond(&host, &messages_request, json!([{"role": "user", "content": "hi"}]));

    assert_eq!(
        messages.await.unwrap().unwrap(),
        json!([{"role": "user", "content": "hi"}])
    );
    assert_eq!(conversations.await.unwrap().unwrap(), json!([{"id": "c1"}]));
}

#[tokio::test]
async fn test_queued_requests_flush_in_call_order() {
    let (host, overlay) = mount(10_000);
    let mut frame = host.frame_messages();

    let _prompt = overlay.set_system_prompt("Be brief");
    let _first = overlay.send_message("first");
    let _second = overlay.send_message("second");
    let _conversation = overlay.create_conversation(Some("folder/a"));
    assert!(frame.try_recv().is_err());

    ready(&host);

    let mut posted = Vec::new();
    while let Ok(post) = frame.try_recv() {
        assert_eq!(post.target_origin, "*");
        posted.push((post.message["type"].clone(), post.message["payload"].clone()));
    }
    assert_eq!(
        posted[1..],
        [
            (json!(protocol::SET_SYSTEM_PROMPT), json!({"systemPrompt": "Be brief"})),
            (json!(protocol::SEND_MESSAGE), json!({"content": "first"})),
            (json!(protocol::SEND_MESSAGE), json!({"content": "second"})),
            (json!(protocol::CREATE_CONVERSATION), json!({"parentPath": "folder/a"})),
        ]
    );
    assert_eq!(posted[0].0, json!(protocol::SET_OVERLAY_OPTIONS));

    // Once ready, requests go out immediately
    let _select = overlay.select_conversation("c1");
    let post = frame.try_recv().unwrap();
    assert_eq!(post.message["type"], protocol::SELECT_CONVERSATION);
    assert_eq!(post.message["payload"], json!({"id": "c1"}));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_late_reply_is_ignored() {
    let (host, overlay) = mount(30);
    ready(&host);

    let reply = overlay.get_messages();
    let request = posted_request(&host, &overlay, protocol::GET_MESSAGES);

    match reply.await {
        Err(OverlayError::Timeout {
            request_type,
            timeout_ms,
        }) => {
            assert_eq!(request_type, protocol::GET_MESSAGES);
            assert_eq!(timeout_ms, 30);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let pending = overlay.pending_requests();
    respond(&host, &request, json!("late"));
    assert_eq!(overlay.pending_requests(), pending - 1);

    // Replaying the same response is a no-op
    respond(&host, &request, json!("late"));
    assert_eq!(overlay.pending_requests(), pending - 1);
}

#[tokio::test(start_paused = true)]
async fn test_requests_expired_before_ready_are_not_posted() {
    let (host, overlay) = mount(20);

    let reply = overlay.get_messages();
    assert!(reply.await.is_err());

    ready(&host);
    assert!(host
        .posted_messages(overlay.frame())
        .iter()
        .all(|message| message["type"] != protocol::GET_MESSAGES));
    assert_eq!(overlay.pending_requests(), 0);
}

#[tokio::test]
async fn test_broadcast_fans_out_to_matching_subscribers() {
    let (host, overlay) = mount(10_000);
    let received = Arc::new(std::sync::Mutex::new(Vec::new()));

    let record = |label: &'static str| {
        let received = received.clone();
        move |payload: &Value| received.lock().unwrap().push((label, payload.clone()))
    };
    let first = overlay.subscribe(protocol::GPT_END_GENERATING, record("first"));
    let _second = overlay.subscribe(protocol::GPT_END_GENERATING, record("second"));
    let _other = overlay.subscribe(protocol::GPT_START_GENERATING, record("other"));

    let payload = json!({"conversationId": "c1"});
    host.dispatch_message(
        json!({"type": protocol::GPT_END_GENERATING, "payload": payload}),
        ORIGIN,
    );
    assert_eq!(
        *received.lock().unwrap(),
        vec![("first", payload.clone()), ("second", payload.clone())]
    );

    first.unsubscribe();
    received.lock().unwrap().clear();
    host.dispatch_message(
        json!({"type": protocol::GPT_END_GENERATING, "payload": payload}),
        ORIGIN,
    );
    assert_eq!(*received.lock().unwrap(), vec![("second", payload)]);
}

#[tokio::test]
async fn test_malformed_messages_are_ignored() {
    let (host, overlay) = mount(10_000);

    host.dispatch_message(json!("@DIAL_OVERLAY/READY"), ORIGIN);
    host.dispatch_message(json!({"payload": 1}), ORIGIN);
    host.dispatch_message(json!({"type": 5}), ORIGIN);
    host.dispatch_message(json!({"type": "X/RESPONSE", "requestId": "unknown"}), ORIGIN);
    assert!(!overlay.is_ready());

    ready(&host);
    assert!(overlay.is_ready());
    assert!(overlay.ready().await.unwrap());
}

#[tokio::test]
async fn test_overlays_do_not_cross_deliver() {
    let host = MemoryHost::new(1280, 800);
    let mut overlays = Vec::new();
    for _ in 0..2 {
        let root = host.create_element("div");
        host.append_child(host.body(), root).unwrap();
        overlays.push(
            ChatOverlay::new(Host::from_shared(host.clone()), root, options(10_000)).unwrap(),
        );
    }
    ready(&host);

    let first = tokio::spawn(overlays[0].get_messages().into_future());
    let second = tokio::spawn(overlays[1].get_messages().into_future());
    let request = posted_request(&host, &overlays[1], protocol::GET_MESSAGES);
    respond(&host, &request, json!("second"));

    assert_eq!(second.await.unwrap().unwrap(), json!("second"));
    tokio::task::yield_now().await;
    assert!(!first.is_finished());
    assert_eq!(overlays[0].pending_requests(), 2);
}

#[tokio::test]
async fn test_detached_frame_rejects_requests() {
    let (host, overlay) = mount(10_000);
    ready(&host);

    host.remove_element(overlay.frame());
    assert!(matches!(
        overlay.get_messages().await,
        Err(OverlayError::NoContentWindow)
    ));
}

#[tokio::test]
async fn test_set_overlay_options_round_trip() {
    let (host, overlay) = mount(10_000);
    ready(&host);
    tokio::task::yield_now().await;

    let mut options = options(10_000);
    options.theme = Some("dark".to_string());
    let sync = tokio::spawn(overlay.set_overlay_options(options));
    tokio::task::yield_now().await;
    assert!(overlay.is_loader_visible());

    let request = posted_request(&host, &overlay, protocol::SET_OVERLAY_OPTIONS);
    assert_eq!(request["payload"]["theme"], "dark");
    respond(&host, &request, Value::Null);

    sync.await.unwrap().unwrap();
    assert_eq!(overlay.options().theme.as_deref(), Some("dark"));
    // The initial sync is still unanswered
    assert!(overlay.is_loader_visible());

    let initial = host
        .posted_messages(overlay.frame())
        .into_iter()
        .find(|message| message["type"] == protocol::SET_OVERLAY_OPTIONS)
        .unwrap();
    respond(&host, &initial, Value::Null);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!overlay.is_loader_visible());
}

#[tokio::test]
async fn test_invalid_options_are_rejected_up_front() {
    let (_host, overlay) = mount(10_000);
    let invalid = ChatOverlayOptions::new("", "https://host.example");

    assert!(matches!(
        overlay.set_overlay_options(invalid).await,
        Err(OverlayError::InvalidOptions(_))
    ));
    assert_eq!(overlay.options().domain, ORIGIN);
    // Only the initial sync is outstanding
    assert_eq!(overlay.pending_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_releases_waiters() {
    let (host, overlay) = mount(10_000);
    let waiter = tokio::spawn({
        let overlay = overlay.clone();
        async move { overlay.ready().await }
    });
    let reply = tokio::spawn(overlay.send_message("hi").into_future());
    tokio::time::sleep(Duration::from_millis(5)).await;

    overlay.destroy();
    assert!(matches!(
        waiter.await.unwrap(),
        Err(OverlayError::TaskFailed(_))
    ));
    assert!(matches!(reply.await.unwrap(), Err(OverlayError::Closed)));

    // A READY arriving after destroy is not delivered anymore
    ready(&host);
    assert!(!overlay.is_ready());
}
