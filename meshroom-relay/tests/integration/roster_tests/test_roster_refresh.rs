use meshroom_core::{Destination, RoomId};
use serde_json::Value;

use crate::integration::init_tracing;
use crate::utils::{TestMember, TestRelay};

#[tokio::test]
async fn test_roster_refresh_request() {
    init_tracing();
    let relay = TestRelay::start().await;
    let room = RoomId::from("42");

    let mut alice = TestMember::connect(&relay.url(), 1).await.unwrap();
    let mut bob = TestMember::connect(&relay.url(), 2).await.unwrap();
    let alice_sub = alice
        .subscribe(Destination::Participants(room.clone()))
        .await
        .unwrap();
    let bob_sub = bob
        .subscribe(Destination::Participants(room.clone()))
        .await
        .unwrap();
    bob.wait_for_roster(bob_sub, &[1, 2]).await.unwrap();
    alice.wait_for_roster(alice_sub, &[1, 2]).await.unwrap();

    alice
        .publish(Destination::RequestParticipants(room), Value::Null)
        .await
        .unwrap();

    // Every subscriber gets the refreshed roster, not just the requester.
    alice.wait_for_roster(alice_sub, &[1, 2]).await.unwrap();
    bob.wait_for_roster(bob_sub, &[1, 2]).await.unwrap();
}
