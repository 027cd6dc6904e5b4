use serde_json::{Map, json};
use std::sync::Arc;
use std::time::Duration;
use tablelink_core::{DeviceId, MessageBody};
use tablelink_session::{
    PollingConfig, SessionConfig, SessionOrchestrator, SessionStatus, WebrtcTransportFactory,
};

use crate::integration::{hello, init_tracing};
use crate::utils::{MemoryRelay, Recorded, RecordingCallbacks};

const CONNECT_WAIT: Duration = Duration::from_secs(30);

fn loopback_config() -> SessionConfig {
    let fast = PollingConfig {
        initial_interval: Duration::from_millis(50),
        max_interval: Duration::from_millis(500),
        multiplier: 2.0,
        quiet_period: Duration::ZERO,
    };
    SessionConfig {
        mailbox_poll: fast,
        discovery_poll: fast,
        heartbeat: fast,
        ice_servers: Vec::new(),
        ..SessionConfig::default()
    }
}

fn orchestrator(relay: &MemoryRelay, device: &str) -> SessionOrchestrator {
    SessionOrchestrator::new(
        loopback_config(),
        DeviceId::from(device),
        Arc::new(relay.clone()),
        Arc::new(WebrtcTransportFactory::new(Vec::new())),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_host_and_two_guests_exchange_messages() {
    init_tracing();

    let relay = MemoryRelay::new();
    let host = orchestrator(&relay, "gm");
    let alice = orchestrator(&relay, "alice");
    let bob = orchestrator(&relay, "bob");

    let host_events = RecordingCallbacks::new();
    let alice_events = RecordingCallbacks::new();
    let bob_events = RecordingCallbacks::new();

    let room = host.start_host_session(host_events.clone()).await.unwrap();
    alice
        .start_player_session(room.room_id.clone(), hello("Alice"), alice_events.clone())
        .await
        .unwrap();
    bob.start_player_session(room.room_id.clone(), hello("Bob"), bob_events.clone())
        .await
        .unwrap();

    assert!(
        host_events
            .wait_for(2, CONNECT_WAIT, |r| matches!(r, Recorded::Connected { .. }))
            .await,
        "host should connect to both guests"
    );
    for guest in [&alice_events, &bob_events] {
        assert!(
            guest
                .wait_for(1, CONNECT_WAIT, |r| *r == Recorded::Status(SessionStatus::Connected))
                .await
        );
        // The host acknowledges every hello.
        assert!(
            guest
                .wait_for(1, CONNECT_WAIT, |r| {
                    matches!(r, Recorded::Message { message, .. } if message.kind() == "ack")
                })
                .await
        );
    }

    assert!(host.send_chat_message("Roll initiative!", "GM", None).await);
    for guest in [&alice_events, &bob_events] {
        assert!(
            guest
                .wait_for(1, CONNECT_WAIT, |r| matches!(
                    r,
                    Recorded::Message { message, .. }
                        if matches!(&message.body, MessageBody::ChatMessage(chat) if chat.text == "Roll initiative!")
                ))
                .await
        );
    }

    let mut roll = Map::new();
    roll.insert("total".to_owned(), json!(17));
    assert!(bob.send_dice_roll(roll).await);
    assert!(
        host_events
            .wait_for(1, CONNECT_WAIT, |r| matches!(
                r,
                Recorded::Message { peer, message }
                    if peer == &DeviceId::from("bob") && message.kind() == "diceRoll"
            ))
            .await
    );

    let state = host.session_state().await.unwrap();
    assert_eq!(state.peers.len(), 2);
    assert_eq!(
        state.peers[&DeviceId::from("alice")].info,
        Some(hello("Alice"))
    );

    alice.end_session().await;
    bob.end_session().await;
    host.end_session().await;
    assert!(relay.is_closed(&room.room_id).await);
}
