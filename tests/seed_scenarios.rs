//! End-to-end scenarios driving a [`land_transport::TransportAdapter`]
//! against a real [`land_keeper::LandKeeper`] through an in-memory
//! [`land_transport::Transport`] double — no network, no manager/router
//! layer, just the join handshake, event dispatch, and sync fan-out a land
//! actually performs on the wire.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use land_keeper::{ClientID, FieldEntry, LandKeeper, LandState, RuleTable, SendTarget, SessionID};
use land_protocol::{
    Direction, EncodingConfig, EventFrame, JoinFrame, MessageEncoding, StateUpdateEncoding, TransportMessage,
    WireEncoding,
};
use land_transport::{Transport, TransportAdapter};

#[derive(Debug, Clone, PartialEq)]
struct Counter {
    count: i64,
}

impl LandState for Counter {
    fn fields(&self) -> Vec<FieldEntry> {
        vec![FieldEntry::broadcast("/count", json!(self.count))]
    }
}

fn counter_rules() -> RuleTable<Counter> {
    RuleTable::new().on_event("Increment", |state, _payload, _ctx| {
        state.count += 1;
        Ok(())
    })
}

fn object_encoding() -> EncodingConfig {
    EncodingConfig::new(MessageEncoding::Json, StateUpdateEncoding::OpcodeJson)
}

fn join_bytes(land_type: &str, player_id: Option<&str>) -> Vec<u8> {
    let join = TransportMessage::Join(JoinFrame {
        request_id: "r1".to_owned(),
        land_type: land_type.to_owned(),
        land_instance_id: None,
        player_id: player_id.map(str::to_owned),
        device_id: None,
        metadata: Default::default(),
    });
    land_protocol::encode(&join, WireEncoding::Object).unwrap()
}

fn increment_bytes() -> Vec<u8> {
    let event = TransportMessage::Event(EventFrame {
        direction: Direction::FromClient,
        event_type: "Increment".to_owned(),
        payload: json!({}),
        raw_body: None,
    });
    land_protocol::encode(&event, WireEncoding::Object).unwrap()
}

/// Records every frame sent, in order, keyed by session.
#[derive(Default)]
struct RecordingTransport {
    sent: StdMutex<Vec<(SessionID, Vec<u8>)>>,
}

impl RecordingTransport {
    fn sent_messages(&self, session_id: &SessionID) -> Vec<TransportMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == session_id)
            .map(|(_, bytes)| land_protocol::decode(bytes).unwrap())
            .collect()
    }

    fn all_messages(&self) -> Vec<(SessionID, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, session_id: &SessionID, bytes: Vec<u8>) -> Result<(), String> {
        self.sent.lock().unwrap().push((session_id.clone(), bytes));
        Ok(())
    }

    async fn disconnect(&self, _session_id: &SessionID) {}
}

/// Like [`RecordingTransport`], but every `joinResponse` it sends
/// immediately triggers a `syncNow` on the same adapter before `send`
/// returns — simulating a concurrent sync racing the handshake. The
/// adapter reference is filled in after construction since the two are
/// mutually referential.
#[derive(Default)]
struct ConcurrentSyncTransport {
    sent: StdMutex<Vec<(SessionID, Vec<u8>)>>,
    adapter: std::sync::OnceLock<std::sync::Weak<TransportAdapter<Counter>>>,
}

impl ConcurrentSyncTransport {
    fn sent_messages(&self, session_id: &SessionID) -> Vec<TransportMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == session_id)
            .map(|(_, bytes)| land_protocol::decode(bytes).unwrap())
            .collect()
    }
}

#[async_trait]
impl Transport for ConcurrentSyncTransport {
    async fn send(&self, session_id: &SessionID, bytes: Vec<u8>) -> Result<(), String> {
        let is_join_response = matches!(land_protocol::decode(&bytes), Ok(TransportMessage::JoinResponse(_)));
        self.sent.lock().unwrap().push((session_id.clone(), bytes));
        if is_join_response {
            if let Some(adapter) = self.adapter.get().and_then(std::sync::Weak::upgrade) {
                adapter.sync_now().await.unwrap();
            }
        }
        Ok(())
    }

    async fn disconnect(&self, _session_id: &SessionID) {}
}

/// Scenario 1: an `Increment` event mutates state and a subsequent
/// `syncNow` sends the subscriber exactly the diff it caused.
#[tokio::test]
async fn increment_mutates_state_and_sync_now_sends_the_diff() {
    let keeper = Arc::new(LandKeeper::new(Counter { count: 0 }, counter_rules()));
    let transport = Arc::new(RecordingTransport::default());
    let adapter = Arc::new(TransportAdapter::new(keeper.clone(), transport.clone(), "test-land"));
    keeper.set_transport(adapter.clone()).await;

    let session_id = SessionID::new("s1");
    let services: () = ();
    adapter
        .on_connect(session_id.clone(), ClientID::new("c1"), WireEncoding::Object, object_encoding(), None, &services)
        .await
        .unwrap();
    adapter.on_message(&session_id, &join_bytes("test-land", Some("alice")), &services).await.unwrap();

    let after_join = transport.sent_messages(&session_id);
    assert!(matches!(after_join[0], TransportMessage::JoinResponse(_)));
    let TransportMessage::StateUpdate(frame) = &after_join[1] else { panic!("expected firstSync") };
    assert_eq!(frame.update, land_protocol::StateUpdate::FirstSync { snapshot: [("/count".to_owned(), json!(0))].into() });

    adapter.on_message(&session_id, &increment_bytes(), &services).await.unwrap();
    assert_eq!(keeper.current_state().await.count, 1);

    adapter.sync_now().await.unwrap();
    let after_sync = transport.sent_messages(&session_id);
    let TransportMessage::StateUpdate(diff_frame) = after_sync.last().unwrap() else { panic!("expected a diff") };
    assert_eq!(
        diff_frame.update,
        land_protocol::StateUpdate::Diff {
            patches: vec![land_protocol::StatePatch { path: "/count".to_owned(), op: land_protocol::PatchOp::Set(json!(1)) }]
        }
    );
}

/// Scenario 2: a transport that, upon seeing a `joinResponse` go out,
/// immediately calls back into `syncNow` on the very same session must
/// still see `firstSync` arrive strictly after `joinResponse` — the
/// `initial_syncing` guard must suppress the race, not merely reorder it.
#[tokio::test]
async fn join_response_precedes_first_sync_even_under_a_concurrent_sync_now() {
    let keeper = Arc::new(LandKeeper::new(Counter { count: 0 }, counter_rules()));
    let transport = Arc::new(ConcurrentSyncTransport::default());
    let adapter = Arc::new(TransportAdapter::new(keeper.clone(), transport.clone(), "lobby").with_legacy_join(true));
    keeper.set_transport(adapter.clone()).await;
    transport.adapter.set(Arc::downgrade(&adapter)).ok();

    let session_id = SessionID::new("legacy-1");
    let services: () = ();
    adapter
        .on_connect(session_id.clone(), ClientID::new("c1"), WireEncoding::Object, object_encoding(), None, &services)
        .await
        .unwrap();

    let messages = transport.sent_messages(&session_id);
    assert_eq!(messages.len(), 2, "the reentrant sync_now must not add a second diff for a session still mid-handshake");
    assert!(matches!(messages[0], TransportMessage::JoinResponse(_)));
    assert!(matches!(messages[1], TransportMessage::StateUpdate(_)));
}

/// Scenario 3: after a session disconnects, a fresh session rejoining
/// under the same `playerID` gets its own `joinResponse`/`firstSync` pair.
#[tokio::test]
async fn rejoin_after_disconnect_gets_a_fresh_join_response_and_first_sync() {
    let keeper = Arc::new(LandKeeper::new(Counter { count: 0 }, counter_rules()));
    let transport = Arc::new(RecordingTransport::default());
    let adapter = Arc::new(TransportAdapter::new(keeper.clone(), transport.clone(), "test-land"));
    keeper.set_transport(adapter.clone()).await;
    let services: () = ();

    let session_1 = SessionID::new("s1");
    adapter
        .on_connect(session_1.clone(), ClientID::new("c1"), WireEncoding::Object, object_encoding(), None, &services)
        .await
        .unwrap();
    adapter.on_message(&session_1, &join_bytes("test-land", Some("player-1")), &services).await.unwrap();
    adapter.handle_disconnect(&session_1, &services).await;
    assert_eq!(keeper.player_count().await, 0);

    let session_2 = SessionID::new("s2");
    adapter
        .on_connect(session_2.clone(), ClientID::new("c2"), WireEncoding::Object, object_encoding(), None, &services)
        .await
        .unwrap();
    adapter.on_message(&session_2, &join_bytes("test-land", Some("player-1")), &services).await.unwrap();

    let messages = transport.sent_messages(&session_2);
    assert_eq!(messages.len(), 2);
    assert!(matches!(messages[0], TransportMessage::JoinResponse(_)));
    assert!(matches!(messages[1], TransportMessage::StateUpdate(_)));
    assert_eq!(keeper.player_count().await, 1);
}

/// Scenario 4: a `join` naming a `landType` other than the adapter's own is
/// rejected outright, with no player ever registered.
#[tokio::test]
async fn mismatched_land_type_is_rejected_without_touching_the_keeper() {
    let keeper = Arc::new(LandKeeper::new(Counter { count: 0 }, counter_rules()));
    let transport = Arc::new(RecordingTransport::default());
    let adapter = Arc::new(TransportAdapter::new(keeper.clone(), transport.clone(), "jwt-error-test"));
    keeper.set_transport(adapter.clone()).await;
    let services: () = ();

    let session_id = SessionID::new("s1");
    adapter
        .on_connect(session_id.clone(), ClientID::new("c1"), WireEncoding::Object, object_encoding(), None, &services)
        .await
        .unwrap();
    adapter.on_message(&session_id, &join_bytes("wrong", Some("alice")), &services).await.unwrap();

    let messages = transport.sent_messages(&session_id);
    assert_eq!(messages.len(), 1);
    let TransportMessage::JoinResponse(response) = &messages[0] else { panic!("expected joinResponse") };
    assert!(!response.success);
    assert_eq!(response.reason.as_deref(), Some("mismatched-land"));
    assert!(!adapter.is_joined(&session_id).await);
    assert_eq!(keeper.player_count().await, 0);
}

/// Scenario 5: a second `join` on a session that already joined is
/// rejected; only the first succeeds and exactly one player is registered.
#[tokio::test]
async fn duplicate_join_on_the_same_session_only_succeeds_once() {
    let keeper = Arc::new(LandKeeper::new(Counter { count: 0 }, counter_rules()));
    let transport = Arc::new(RecordingTransport::default());
    let adapter = Arc::new(TransportAdapter::new(keeper.clone(), transport.clone(), "test-land"));
    keeper.set_transport(adapter.clone()).await;
    let services: () = ();

    let session_id = SessionID::new("s1");
    adapter
        .on_connect(session_id.clone(), ClientID::new("c1"), WireEncoding::Object, object_encoding(), None, &services)
        .await
        .unwrap();
    adapter.on_message(&session_id, &join_bytes("test-land", Some("alice")), &services).await.unwrap();
    adapter.on_message(&session_id, &join_bytes("test-land", Some("alice")), &services).await.unwrap();

    let messages = transport.sent_messages(&session_id);
    let join_responses: Vec<_> = messages
        .iter()
        .filter_map(|m| match m {
            TransportMessage::JoinResponse(frame) => Some(frame),
            _ => None,
        })
        .collect();
    assert_eq!(join_responses.len(), 2);
    assert!(join_responses[0].success);
    assert!(!join_responses[1].success);
    assert_eq!(keeper.player_count().await, 1);
}

/// Scenario 6: opcode-107 bundling. A targeted (non-broadcast) server event
/// is never bundled — it goes out as its own frame the moment it's sent —
/// while the dirty cycle's state diff rides alone in the opcode-107 bundle
/// at the next `syncNow`. Exercised against both a bundle-compatible
/// encoding and a mismatched one, to confirm the targeted event is never
/// dropped either way.
#[tokio::test]
async fn targeted_events_bypass_the_bundle_while_the_diff_travels_in_opcode_107() {
    for (message_encoding, state_update_encoding) in
        [(MessageEncoding::MessagePack, StateUpdateEncoding::OpcodeMessagePack), (MessageEncoding::Json, StateUpdateEncoding::OpcodeMessagePack)]
    {
        let keeper = Arc::new(LandKeeper::new(Counter { count: 0 }, counter_rules()));
        let transport = Arc::new(RecordingTransport::default());
        let adapter = Arc::new(TransportAdapter::new(keeper.clone(), transport.clone(), "test-land"));
        keeper.set_transport(adapter.clone()).await;
        let services: () = ();

        let encoding = EncodingConfig::new(message_encoding, state_update_encoding);
        let session_id = SessionID::new("s1");
        let client_id = ClientID::new("c1");
        adapter
            .on_connect(session_id.clone(), client_id.clone(), WireEncoding::Opcode, encoding, None, &services)
            .await
            .unwrap();
        adapter
            .on_message(&session_id, &land_protocol::encode(&TransportMessage::Join(JoinFrame {
                request_id: "r1".to_owned(),
                land_type: "test-land".to_owned(),
                land_instance_id: None,
                player_id: Some("alice".to_owned()),
                device_id: None,
                metadata: Default::default(),
            }), WireEncoding::Opcode).unwrap(), &services)
            .await
            .unwrap();
        transport.sent.lock().unwrap().clear();

        adapter
            .on_message(&session_id, &land_protocol::encode(&TransportMessage::Event(EventFrame {
                direction: Direction::FromClient,
                event_type: "Increment".to_owned(),
                payload: json!({}),
                raw_body: None,
            }), WireEncoding::Opcode).unwrap(), &services)
            .await
            .unwrap();

        let whisper = TransportMessage::Event(EventFrame {
            direction: Direction::FromServer,
            event_type: "Whisper".to_owned(),
            payload: json!({"to": "alice"}),
            raw_body: None,
        });
        adapter.send_event(whisper.clone(), SendTarget::Client(client_id)).await.unwrap();

        adapter.sync_now().await.unwrap();

        let sent = transport.all_messages();
        assert_eq!(sent.len(), 2, "exactly one standalone frame and one opcode-107 bundle, for {message_encoding:?}/{state_update_encoding:?}");

        let first_value: Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert!(first_value.is_array(), "the targeted event must be sent immediately as a standalone opcode frame");

        let bundle_value: Value = serde_json::from_slice(&sent[1].1).unwrap();
        let bundle_array = bundle_value.as_array().unwrap();
        let (update, events) =
            land_protocol::codec::decode_bundle(bundle_array, state_update_encoding).unwrap();
        assert!(matches!(update, land_protocol::StateUpdate::Diff { .. }));
        assert!(events.is_empty(), "the targeted whisper must not ride along in the bundle");
    }
}
