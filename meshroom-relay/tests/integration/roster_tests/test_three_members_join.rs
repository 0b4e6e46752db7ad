use meshroom_core::{Destination, RoomId};

use crate::integration::init_tracing;
use crate::utils::{TestMember, TestRelay};

#[tokio::test]
async fn test_three_members_join() {
    init_tracing();
    let relay = TestRelay::start().await;
    let room = RoomId::from("42");
    let topic = Destination::Participants(room.clone());

    let mut alice = TestMember::connect(&relay.url(), 1).await.unwrap();
    let alice_sub = alice.subscribe(topic.clone()).await.unwrap();
    alice.wait_for_roster(alice_sub, &[1]).await.unwrap();

    let mut bob = TestMember::connect(&relay.url(), 2).await.unwrap();
    let bob_sub = bob.subscribe(topic.clone()).await.unwrap();
    bob.wait_for_roster(bob_sub, &[1, 2]).await.unwrap();
    alice.wait_for_roster(alice_sub, &[1, 2]).await.unwrap();

    let mut carol = TestMember::connect(&relay.url(), 3).await.unwrap();
    let carol_sub = carol.subscribe(topic).await.unwrap();
    carol.wait_for_roster(carol_sub, &[1, 2, 3]).await.unwrap();
    bob.wait_for_roster(bob_sub, &[1, 2, 3]).await.unwrap();
    alice.wait_for_roster(alice_sub, &[1, 2, 3]).await.unwrap();

    assert_eq!(relay.service.participants(&room).len(), 3);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    init_tracing();
    let relay = TestRelay::start().await;

    let mut alice = TestMember::connect(&relay.url(), 1).await.unwrap();
    let mut bob = TestMember::connect(&relay.url(), 2).await.unwrap();
    let alice_sub = alice
        .subscribe(Destination::Participants(RoomId::from("a")))
        .await
        .unwrap();
    let bob_sub = bob
        .subscribe(Destination::Participants(RoomId::from("b")))
        .await
        .unwrap();

    alice.wait_for_roster(alice_sub, &[1]).await.unwrap();
    bob.wait_for_roster(bob_sub, &[2]).await.unwrap();
    alice
        .expect_silence(std::time::Duration::from_millis(200))
        .await
        .expect("Room b changes are not broadcast to room a");
}
