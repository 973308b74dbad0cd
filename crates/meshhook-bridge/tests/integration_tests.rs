//! Integration tests for the mesh-to-webhook bridge
//!
//! These tests verify end-to-end behavior of the full pipeline: payload
//! classification, identity persistence, routing decisions, and webhook
//! dispatch through a recording mock sink.

use meshhook_bridge::test_utils::{memory_store, MockSink};
use meshhook_bridge::{
    classify, DeliveryIntent, Dispatcher, DropReason, InboundMessage, MeshBridge, NodeStore,
    RouteDecision, Router, UpsertOutcome, WebhookMap,
};
use tokio::sync::mpsc;

fn two_channel_map() -> WebhookMap {
    let mut map = WebhookMap::new();
    map.insert(0, "https://example.com/hook0");
    map.insert(1, "https://example.com/hook1");
    map
}

async fn pipeline() -> (NodeStore, Router, Dispatcher<MockSink>, MockSink) {
    let store = memory_store().await;
    let sink = MockSink::new();
    let router = Router::new(store.clone(), two_channel_map());
    let dispatcher = Dispatcher::new(sink.clone(), two_channel_map());
    (store, router, dispatcher, sink)
}

async fn process(router: &Router, dispatcher: &Dispatcher<MockSink>, raw: &[u8]) -> RouteDecision {
    let event = classify(raw).unwrap();
    let decision = router.route(event).await.unwrap();
    if let RouteDecision::Forward(intent) = &decision {
        dispatcher.dispatch(intent.clone()).await.unwrap();
    }
    decision
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn nodeinfo_creates_identity_without_delivery() {
    let (store, router, dispatcher, sink) = pipeline().await;

    let decision = process(
        &router,
        &dispatcher,
        br#"{"type":"nodeinfo","from":42,"payload":{"longname":"Base Station"}}"#,
    )
    .await;

    assert_eq!(decision, RouteDecision::Identity(UpsertOutcome::Created));
    assert_eq!(store.display_name(42).await, "Base Station");
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(sink.deliveries().is_empty());
}

#[tokio::test]
async fn text_from_known_node_is_delivered_with_name() {
    let (store, router, dispatcher, sink) = pipeline().await;
    store.upsert(42, "Base Station").await.unwrap();

    let decision = process(
        &router,
        &dispatcher,
        br#"{"type":"text","from":42,"channel":0,"payload":{"text":"hello"}}"#,
    )
    .await;

    assert_eq!(
        decision,
        RouteDecision::Forward(DeliveryIntent {
            channel: 0,
            sender_name: "Base Station".to_string(),
            body: "hello".to_string(),
        })
    );

    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "https://example.com/hook0");
    assert!(deliveries[0].1.contains("Base Station"));
    assert!(deliveries[0].1.contains("hello"));
}

#[tokio::test]
async fn text_on_unmapped_channel_is_dropped_without_side_effects() {
    let (store, router, dispatcher, sink) = pipeline().await;

    let decision = process(
        &router,
        &dispatcher,
        br#"{"type":"text","from":99,"channel":5,"payload":{"text":"hi"}}"#,
    )
    .await;

    assert_eq!(decision, RouteDecision::Dropped(DropReason::UnmappedChannel));
    assert!(sink.deliveries().is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_payload_reports_parse_error_and_mutates_nothing() {
    let (store, _router, _dispatcher, sink) = pipeline().await;

    assert!(classify(b"\xc3\x28 not utf8 \xff").is_err());
    assert!(classify(b"{ truncated").is_err());

    assert_eq!(store.count().await.unwrap(), 0);
    assert!(sink.deliveries().is_empty());
}

#[tokio::test]
async fn reannouncement_updates_stored_name() {
    let (store, router, dispatcher, _sink) = pipeline().await;

    process(
        &router,
        &dispatcher,
        br#"{"type":"nodeinfo","from":42,"payload":{"longname":"Base Station"}}"#,
    )
    .await;
    let decision = process(
        &router,
        &dispatcher,
        br#"{"type":"nodeinfo","from":42,"payload":{"longname":"Relay One"}}"#,
    )
    .await;

    assert_eq!(decision, RouteDecision::Identity(UpsertOutcome::Updated));
    assert_eq!(store.display_name(42).await, "Relay One");
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_sender_falls_back_to_numeric_name() {
    let (_store, router, dispatcher, sink) = pipeline().await;

    process(
        &router,
        &dispatcher,
        br#"{"type":"text","from":3735928559,"channel":1,"payload":{"text":"ping"}}"#,
    )
    .await;

    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "https://example.com/hook1");
    assert!(deliveries[0].1.contains("3735928559"));
}

#[tokio::test]
async fn telemetry_and_position_are_ignored() {
    let (store, router, dispatcher, sink) = pipeline().await;

    for raw in [
        br#"{"type":"telemetry","from":42,"payload":{"battery":95}}"#.as_slice(),
        br#"{"type":"position","from":42,"payload":{"lat":52.1,"lon":4.3}}"#.as_slice(),
        br#"{"type":"traceroute","from":42}"#.as_slice(),
    ] {
        let decision = process(&router, &dispatcher, raw).await;
        assert_eq!(decision, RouteDecision::Dropped(DropReason::Unclassified));
    }

    assert_eq!(store.count().await.unwrap(), 0);
    assert!(sink.deliveries().is_empty());
}

// ============================================================================
// Full service loop
// ============================================================================

#[tokio::test]
async fn bridge_loop_processes_mixed_traffic_in_order() {
    let store = memory_store().await;
    let sink = MockSink::new();
    let (inbound_tx, inbound_rx) = mpsc::channel(32);
    let (bridge, handle) = MeshBridge::new(store.clone(), two_channel_map(), sink.clone(), inbound_rx);
    let task = tokio::spawn(bridge.run());

    let payloads: Vec<&[u8]> = vec![
        br#"{"type":"nodeinfo","from":42,"payload":{"longname":"Base Station"}}"#,
        b"garbage that does not parse",
        br#"{"type":"telemetry","from":42,"payload":{"battery":80}}"#,
        br#"{"type":"text","from":42,"channel":0,"payload":{"text":"first"}}"#,
        br#"{"type":"nodeinfo","from":42,"payload":{"longname":"Relay One"}}"#,
        br#"{"type":"text","from":42,"channel":0,"payload":{"text":"second"}}"#,
    ];
    for payload in payloads {
        inbound_tx
            .send(InboundMessage {
                topic: "msh/EU_868/2/json/LongFast/!deadbeef".to_string(),
                payload: payload.to_vec(),
            })
            .await
            .unwrap();
    }

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.events_received, 6);
    assert_eq!(stats.parse_errors, 1);
    assert_eq!(stats.identities_created, 1);
    assert_eq!(stats.identities_updated, 1);
    assert_eq!(stats.messages_forwarded, 2);
    assert_eq!(stats.messages_dropped, 1);

    // The second message is attributed to the re-announced name because the
    // identity write completed before the later lookup.
    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries[0].1.contains("Base Station"));
    assert!(deliveries[0].1.contains("first"));
    assert!(deliveries[1].1.contains("Relay One"));
    assert!(deliveries[1].1.contains("second"));

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn bridge_loop_stops_when_inbound_closes() {
    let store = memory_store().await;
    let (inbound_tx, inbound_rx) = mpsc::channel(4);
    let (bridge, _handle) =
        MeshBridge::new(store, WebhookMap::new(), MockSink::new(), inbound_rx);
    let task = tokio::spawn(bridge.run());

    drop(inbound_tx);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn channel_zero_traffic_is_not_dropped() {
    // Regression guard: channel 0 must be checked by key presence,
    // not treated as "no channel".
    let (_store, router, dispatcher, sink) = pipeline().await;

    process(
        &router,
        &dispatcher,
        br#"{"type":"text","from":7,"channel":0,"payload":{"text":"zero"}}"#,
    )
    .await;

    assert_eq!(sink.deliveries().len(), 1);
    assert_eq!(sink.deliveries()[0].0, "https://example.com/hook0");
}
