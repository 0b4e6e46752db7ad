use std::time::Duration;

use meshroom_core::{ClientFrame, Destination, RoomId};

use crate::integration::init_tracing;
use crate::utils::{TestMember, TestRelay};

#[tokio::test]
async fn test_roster_shrinks_on_disconnect() {
    init_tracing();
    let relay = TestRelay::start().await;
    let topic = Destination::Participants(RoomId::from("42"));

    let mut alice = TestMember::connect(&relay.url(), 1).await.unwrap();
    let alice_sub = alice.subscribe(topic.clone()).await.unwrap();
    let mut bob = TestMember::connect(&relay.url(), 2).await.unwrap();
    let bob_sub = bob.subscribe(topic).await.unwrap();
    bob.wait_for_roster(bob_sub, &[1, 2]).await.unwrap();
    alice.wait_for_roster(alice_sub, &[1, 2]).await.unwrap();

    bob.close().await.unwrap();

    alice.wait_for_roster(alice_sub, &[1]).await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_takes_member_offline() {
    init_tracing();
    let relay = TestRelay::start().await;
    let room = RoomId::from("42");
    let topic = Destination::Participants(room.clone());

    let mut alice = TestMember::connect(&relay.url(), 1).await.unwrap();
    let alice_sub = alice.subscribe(topic.clone()).await.unwrap();
    let mut bob = TestMember::connect(&relay.url(), 2).await.unwrap();
    let bob_sub = bob.subscribe(topic).await.unwrap();
    alice.wait_for_roster(alice_sub, &[1, 2]).await.unwrap();

    bob.send(ClientFrame::Unsubscribe { id: bob_sub }).await.unwrap();

    alice.wait_for_roster(alice_sub, &[1]).await.unwrap();
    assert_eq!(relay.service.session_count(), 2, "Bob stays connected");
}

#[tokio::test]
async fn test_reconnect_replaces_stale_session() {
    init_tracing();
    let relay = TestRelay::start().await;
    let room = RoomId::from("42");
    let topic = Destination::Participants(room.clone());

    let mut alice = TestMember::connect(&relay.url(), 1).await.unwrap();
    let alice_sub = alice.subscribe(topic.clone()).await.unwrap();

    let mut bob_old = TestMember::connect(&relay.url(), 2).await.unwrap();
    bob_old.subscribe(topic.clone()).await.unwrap();
    alice.wait_for_roster(alice_sub, &[1, 2]).await.unwrap();

    let mut bob_new = TestMember::connect(&relay.url(), 2).await.unwrap();
    let bob_sub = bob_new.subscribe(topic).await.unwrap();
    bob_new.wait_for_roster(bob_sub, &[1, 2]).await.unwrap();

    // The old socket closing must not take the new session offline.
    bob_old.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let ids: Vec<u64> = relay
        .service
        .participants(&room)
        .into_iter()
        .map(|p| p.user_id.0)
        .collect();
    assert_eq!(ids, [1, 2]);
}
