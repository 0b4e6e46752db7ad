use meshroom_client::session::NegotiationState;
use meshroom_core::{PeerId, SignalKind, SignalMessage};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::TestPeer;

#[tokio::test]
async fn test_inbound_offer_during_offer_creation_wins() {
    init_tracing();
    let alice = TestPeer::ready(1).await;
    alice.factory.behavior.hold_offers();

    alice.session.connect_to_peer(PeerId(2)).await;
    let connection = alice.factory.wait_for_connection(PeerId(2), 1).await;

    // Our offer is still being created when theirs arrives.
    alice
        .deliver(SignalMessage::offer(PeerId(2), PeerId(1), "their-offer"))
        .await;
    alice.signaling.wait_for(PeerId(2), SignalKind::Answer, 1).await;

    alice.factory.behavior.release_offers();

    let view = alice
        .wait_view(|v| v.pending_offers.contains(&PeerId(2)))
        .await;
    assert_eq!(view.links[&PeerId(2)].negotiation, NegotiationState::Stable);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        alice.signaling.offers_to(PeerId(2)).is_empty(),
        "The raced offer is never applied or sent"
    );
    assert_eq!(alice.factory.connections_for(PeerId(2)).len(), 1);
    assert_eq!(
        connection.remote_description().unwrap().sdp,
        "their-offer",
        "The inbound offer was accepted on the existing connection"
    );
}
