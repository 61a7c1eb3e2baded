use dial_overlay_core::layout::{OverlayPosition, VISIBLE_TRANSFORM};
use dial_overlay_core::platform::memory::MemoryHost;
use dial_overlay_core::platform::{Host, HostDocument};
use dial_overlay_core::protocol::{self, response_type};
use dial_overlay_core::{ChatOverlayManager, ChatOverlayManagerOptions, ChatOverlayOptions, OverlayError};
use serde_json::json;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ORIGIN: &str = "https://chat.example";

fn options(id: &str, timeout_ms: Option<u64>) -> ChatOverlayManagerOptions {
    let mut overlay = ChatOverlayOptions::new(ORIGIN, "https://host.example");
    overlay.request_timeout = timeout_ms;
    ChatOverlayManagerOptions::new(id, overlay)
}

fn setup(width: u32, height: u32) -> (Arc<MemoryHost>, ChatOverlayManager) {
    let host = MemoryHost::new(width, height);
    let manager = ChatOverlayManager::new(Host::from_shared(host.clone()));
    (host, manager)
}

#[tokio::test(start_paused = true)]
async fn test_message_sent_before_ready_resolves_after_ready() {
    let (host, manager) = setup(1280, 800);
    manager.create_overlay(options("a", Some(50))).unwrap();
    let frame = manager.get_overlay("a").unwrap().frame();

    let reply = tokio::spawn(manager.send_message("a", "hi").unwrap().into_future());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!reply.is_finished());

    host.dispatch_message(json!({"type": protocol::READY}), ORIGIN);
    let request = host
        .posted_messages(frame)
        .into_iter()
        .find(|message| message["type"] == protocol::SEND_MESSAGE)
        .expect("SEND_MESSAGE was not posted after READY");
    assert_eq!(request["payload"], json!({"content": "hi"}));

    host.dispatch_message(
        json!({
            "type": "@DIAL_OVERLAY/SEND_MESSAGE/RESPONSE",
            "requestId": request["requestId"].clone(),
            "payload": {"ok": true}
        }),
        ORIGIN,
    );

    let started = tokio::time::Instant::now();
    assert_eq!(reply.await.unwrap().unwrap(), json!({"ok": true}));
    assert!(started.elapsed() < Duration::from_millis(40));

    manager.destroy();
}

#[tokio::test(start_paused = true)]
async fn test_never_ready_overlay_times_out() {
    let (_host, manager) = setup(1280, 800);
    manager.create_overlay(options("a", Some(20))).unwrap();

    let started = tokio::time::Instant::now();
    let error = manager.get_messages("a").unwrap().await.unwrap_err();
    assert!(started.elapsed() <= Duration::from_millis(25));
    assert!(matches!(error, OverlayError::Timeout { .. }));
    assert!(error.to_string().contains("@DIAL_OVERLAY/GET_MESSAGES"));
    assert!(error.to_string().contains("20ms"));

    manager.destroy();
}

#[tokio::test]
async fn test_mobile_viewport_overrides_corner() {
    let (host, manager) = setup(390, 700);
    let mut options = options("a", None);
    options.position = OverlayPosition::LeftTop;
    options.width = Some("320px".to_string());
    manager.create_overlay(options).unwrap();
    manager.show_overlay("a").unwrap();

    let container = manager.container("a").unwrap();
    for edge in ["top", "left", "right", "bottom"] {
        assert_eq!(host.style(container, edge).as_deref(), Some("0"), "{edge}");
    }
    assert_eq!(host.style(container, "width").as_deref(), Some("100vw"));
    assert_eq!(host.style(container, "height").as_deref(), Some("700px"));

    // Landscape phones count as mobile too
    host.set_viewport(700, 390);
    assert_eq!(host.style(container, "height").as_deref(), Some("390px"));

    host.set_viewport(1440, 900);
    assert_eq!(host.style(container, "top").as_deref(), Some("20px"));
    assert_eq!(host.style(container, "left").as_deref(), Some("20px"));
    assert_eq!(host.style(container, "width").as_deref(), Some("320px"));

    manager.destroy();
}

#[tokio::test]
async fn test_show_hide_transform_symmetry() {
    let (host, manager) = setup(1280, 800);
    manager.create_overlay(options("a", None)).unwrap();
    let container = manager.container("a").unwrap();
    let hidden = manager.hidden_transform("a").unwrap();
    assert_eq!(hidden, "scale(0.5) translate(2560px, 1600px)");

    manager.show_overlay("a").unwrap();
    manager.hide_overlay("a").unwrap();
    assert_eq!(host.style(container, "transform"), Some(hidden));

    manager.hide_overlay("a").unwrap();
    manager.show_overlay("a").unwrap();
    assert_eq!(
        host.style(container, "transform").as_deref(),
        Some(VISIBLE_TRANSFORM)
    );

    manager.destroy();
}

#[tokio::test]
async fn test_removed_overlay_is_unknown() {
    let (_host, manager) = setup(1280, 800);
    manager.create_overlay(options("a", None)).unwrap();
    manager.remove_overlay("a").unwrap();

    assert!(matches!(
        manager.send_message("a", "hi"),
        Err(OverlayError::UnknownOverlay(id)) if id == "a"
    ));
    assert!(manager.get_conversations("a").is_err());
    assert!(manager.create_conversation("a", None).is_err());
    assert!(manager.select_conversation("a", "c1").is_err());
    assert!(manager.set_system_prompt("a", "x").is_err());
    assert!(manager.is_hidden("a").is_err());
    assert!(manager.get_overlay("a").is_err());

    // The id can be reused
    manager.create_overlay(options("a", None)).unwrap();
    manager.destroy();
}

#[tokio::test]
async fn test_forwarded_calls_reach_the_right_frame() {
    let (host, manager) = setup(1280, 800);
    manager.create_overlay(options("a", None)).unwrap();
    manager.create_overlay(options("b", None)).unwrap();
    host.dispatch_message(json!({"type": protocol::READY}), ORIGIN);

    let generating = Arc::new(AtomicUsize::new(0));
    let _subscription = manager
        .subscribe("b", protocol::GPT_START_GENERATING, {
            let generating = generating.clone();
            move |_| {
                generating.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

    let reply = manager.select_conversation("b", "c42").unwrap();
    let frame_a = manager.get_overlay("a").unwrap().frame();
    let frame_b = manager.get_overlay("b").unwrap().frame();
    assert!(host
        .posted_messages(frame_a)
        .iter()
        .all(|message| message["type"] != protocol::SELECT_CONVERSATION));

    let request = host
        .posted_messages(frame_b)
        .into_iter()
        .find(|message| message["type"] == protocol::SELECT_CONVERSATION)
        .unwrap();
    assert_eq!(request["payload"], json!({"id": "c42"}));

    host.dispatch_message(json!({"type": protocol::GPT_START_GENERATING}), ORIGIN);
    assert_eq!(generating.load(Ordering::SeqCst), 1);

    host.dispatch_message(
        json!({
            "type": response_type(protocol::SELECT_CONVERSATION),
            "requestId": request["requestId"].clone(),
            "payload": {"selected": "c42"}
        }),
        ORIGIN,
    );
    assert_eq!(reply.await.unwrap(), json!({"selected": "c42"}));

    manager.destroy();
}

#[tokio::test]
async fn test_set_overlay_options_updates_registry() {
    let (host, manager) = setup(1280, 800);
    manager.create_overlay(options("a", None)).unwrap();
    host.dispatch_message(json!({"type": protocol::READY}), ORIGIN);

    let mut updated = ChatOverlayOptions::new(ORIGIN, "https://host.example");
    updated.model_id = Some("gpt-4".to_string());
    let sync = tokio::spawn(manager.set_overlay_options("a", updated).unwrap());
    assert_eq!(
        manager.options("a").unwrap().overlay.model_id.as_deref(),
        Some("gpt-4")
    );

    let frame = manager.get_overlay("a").unwrap().frame();
    let request = host
        .posted_messages(frame)
        .into_iter()
        .rev()
        .find(|message| message["type"] == protocol::SET_OVERLAY_OPTIONS)
        .unwrap();
    assert_eq!(request["payload"]["modelId"], "gpt-4");

    host.dispatch_message(
        json!({
            "type": response_type(protocol::SET_OVERLAY_OPTIONS),
            "requestId": request["requestId"].clone()
        }),
        ORIGIN,
    );
    sync.await.unwrap().unwrap();

    manager.destroy();
}
