use meshroom_core::{PeerId, SignalKind};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{TestPeer, eventually};

#[tokio::test(start_paused = true)]
async fn test_unanswered_offer_is_reissued() {
    init_tracing();
    let alice = TestPeer::ready(1).await;
    alice.roster(&[1, 2]).await;
    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    let first = alice.factory.wait_for_connection(PeerId(2), 1).await;

    tokio::time::sleep(Duration::from_secs(10)).await;

    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 2).await;
    alice.factory.wait_for_connection(PeerId(2), 2).await;
    eventually("first connection closed", || first.is_closed()).await;
}

#[tokio::test(start_paused = true)]
async fn test_departed_peer_is_not_reoffered() {
    init_tracing();
    let alice = TestPeer::ready(1).await;
    alice.roster(&[1, 2]).await;
    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    let connection = alice.factory.wait_for_connection(PeerId(2), 1).await;

    alice.roster(&[1]).await;
    tokio::time::sleep(Duration::from_secs(45)).await;

    assert_eq!(alice.factory.connections_for(PeerId(2)).len(), 1);
    assert_eq!(alice.signaling.offers_to(PeerId(2)).len(), 1);
    eventually("abandoned connection closed", || connection.is_closed()).await;

    let view = alice.session.snapshot();
    assert!(!view.links.contains_key(&PeerId(2)));
    assert!(!view.pending_offers.contains(&PeerId(2)));
}
