use std::time::Duration;

use meshroom_core::{Destination, PeerId, RoomId, ServerFrame, SignalMessage};

use crate::integration::init_tracing;
use crate::utils::{TestMember, TestRelay};

#[tokio::test]
async fn test_spoofed_sender_rejected() {
    init_tracing();
    let relay = TestRelay::start().await;

    let mut mallory = TestMember::connect(&relay.url(), 6).await.unwrap();
    let mut bob = TestMember::connect(&relay.url(), 2).await.unwrap();
    bob.subscribe(Destination::SignalInbox(PeerId(2))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let forged = SignalMessage::offer(PeerId(1), PeerId(2), "v=0\r\n");
    mallory
        .publish(
            Destination::SignalPublish(RoomId::from("42")),
            serde_json::to_value(&forged).unwrap(),
        )
        .await
        .unwrap();

    match mallory.next_frame().await.unwrap() {
        ServerFrame::Error { message } => assert!(message.contains("cannot send signals as 1")),
        other => panic!("Expected an error frame, got {other:?}"),
    }
    bob.expect_silence(Duration::from_millis(200))
        .await
        .expect("Forged offer must not be delivered");
}

#[tokio::test]
async fn test_malformed_frame_gets_error() {
    init_tracing();
    let relay = TestRelay::start().await;
    let mut member = TestMember::connect(&relay.url(), 4).await.unwrap();

    member
        .publish(
            Destination::SignalPublish(RoomId::from("42")),
            serde_json::json!({"type": "offer"}),
        )
        .await
        .unwrap();

    assert!(matches!(
        member.next_frame().await.unwrap(),
        ServerFrame::Error { .. }
    ));
    assert_eq!(relay.service.session_count(), 1, "Connection stays open");
}
