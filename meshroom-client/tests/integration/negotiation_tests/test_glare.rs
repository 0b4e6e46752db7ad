use meshroom_client::GlarePolicy;
use meshroom_client::session::NegotiationState;
use meshroom_core::{PeerId, SignalKind, SignalMessage};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{TestPeer, TestPeerOptions, eventually};

#[tokio::test]
async fn test_inbound_offer_wins_by_default() {
    init_tracing();
    let alice = TestPeer::ready(2).await;
    alice.roster(&[1, 2]).await;
    alice.signaling.wait_for(PeerId(1), SignalKind::Offer, 1).await;
    let ours = alice.factory.wait_for_connection(PeerId(1), 1).await;

    alice
        .deliver(SignalMessage::offer(PeerId(1), PeerId(2), "their-offer"))
        .await;

    alice.signaling.wait_for(PeerId(1), SignalKind::Answer, 1).await;
    let theirs = alice.factory.wait_for_connection(PeerId(1), 2).await;
    eventually("defeated connection closed", || ours.is_closed()).await;
    assert_eq!(theirs.remote_description().unwrap().sdp, "their-offer");

    let view = alice
        .wait_view(|v| {
            v.links
                .get(&PeerId(1))
                .is_some_and(|l| l.negotiation == NegotiationState::Stable)
        })
        .await;
    assert!(!view.links[&PeerId(1)].awaiting_answer);
}

#[tokio::test]
async fn test_higher_id_keeps_offer_when_lower_yields() {
    init_tracing();
    let higher = TestPeer::start_with(
        TestPeerOptions::new(2).glare_policy(GlarePolicy::LowerIdYields),
    );
    higher.wait_view(|v| v.media_ready).await;
    higher.roster(&[1, 2]).await;
    higher.signaling.wait_for(PeerId(1), SignalKind::Offer, 1).await;

    higher
        .deliver(SignalMessage::offer(PeerId(1), PeerId(2), "their-offer"))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(higher.signaling.answers_to(PeerId(1)).is_empty());
    assert_eq!(higher.factory.connections_for(PeerId(1)).len(), 1);
    let view = higher.session.snapshot();
    assert_eq!(view.links[&PeerId(1)].negotiation, NegotiationState::HaveLocalOffer);
}

#[tokio::test]
async fn test_crossed_offers_settle_on_one_stable_link() {
    init_tracing();
    let alice = TestPeer::start_with(
        TestPeerOptions::new(1).glare_policy(GlarePolicy::LowerIdYields),
    );
    let bob = TestPeer::start_with(
        TestPeerOptions::new(2).glare_policy(GlarePolicy::LowerIdYields),
    );
    alice.wait_view(|v| v.media_ready).await;
    bob.wait_view(|v| v.media_ready).await;
    alice.signaling.route_to(bob.session.clone());
    bob.signaling.route_to(alice.session.clone());

    alice.roster(&[1, 2]).await;
    bob.roster(&[1, 2]).await;

    let stable_with = |peer: u64| {
        move |v: &meshroom_client::SessionView| {
            v.links
                .get(&PeerId(peer))
                .is_some_and(|l| l.negotiation == NegotiationState::Stable)
        }
    };
    alice.wait_view(stable_with(2)).await;
    bob.wait_view(stable_with(1)).await;

    let live = |peer: &TestPeer, other: u64| {
        peer.factory
            .connections_for(PeerId(other))
            .into_iter()
            .filter(|c| !c.is_closed())
            .collect::<Vec<_>>()
    };
    eventually("one live connection per end", || {
        live(&alice, 2).len() == 1 && live(&bob, 1).len() == 1
    })
    .await;
    let alice_live = live(&alice, 2);
    let bob_live = live(&bob, 1);

    // The two surviving connections describe the same offer/answer pair.
    let alice_local = alice_live[0].local_description().unwrap().sdp;
    let alice_remote = alice_live[0].remote_description().unwrap().sdp;
    assert_eq!(bob_live[0].remote_description().unwrap().sdp, alice_local);
    assert_eq!(bob_live[0].local_description().unwrap().sdp, alice_remote);
}

#[tokio::test]
async fn test_crossed_offers_mismatch_when_inbound_wins() {
    init_tracing();
    let alice = TestPeer::ready(1).await;
    let bob = TestPeer::ready(2).await;

    alice.roster(&[1, 2]).await;
    bob.roster(&[1, 2]).await;
    let alice_offer = alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    let bob_offer = bob.signaling.wait_for(PeerId(1), SignalKind::Offer, 1).await;
    let alice_first = alice.factory.wait_for_connection(PeerId(2), 1).await;
    let bob_first = bob.factory.wait_for_connection(PeerId(1), 1).await;

    // Both offers are in flight before either side hears from the other.
    alice.deliver(bob_offer[0].clone()).await;
    bob.deliver(alice_offer[0].clone()).await;
    let alice_answer = alice.signaling.wait_for(PeerId(2), SignalKind::Answer, 1).await;
    let bob_answer = bob.signaling.wait_for(PeerId(1), SignalKind::Answer, 1).await;
    alice.deliver(bob_answer[0].clone()).await;
    bob.deliver(alice_answer[0].clone()).await;

    let stable_with = |peer: u64| {
        move |v: &meshroom_client::SessionView| {
            v.links
                .get(&PeerId(peer))
                .is_some_and(|l| l.negotiation == NegotiationState::Stable)
        }
    };
    alice.wait_view(stable_with(2)).await;
    bob.wait_view(stable_with(1)).await;

    // Each side yielded and answered an offer the other already discarded.
    eventually("both original offers discarded", || {
        alice_first.is_closed() && bob_first.is_closed()
    })
    .await;
    let alice_live = alice.factory.wait_for_connection(PeerId(2), 2).await;
    let bob_live = bob.factory.wait_for_connection(PeerId(1), 2).await;
    assert_eq!(
        alice_live.remote_description().unwrap().sdp,
        bob_first.local_description().unwrap().sdp
    );
    assert_eq!(
        bob_live.remote_description().unwrap().sdp,
        alice_first.local_description().unwrap().sdp
    );
    assert_ne!(
        alice_live.remote_description().unwrap().sdp,
        bob_live.local_description().unwrap().sdp
    );
    assert_ne!(
        bob_live.remote_description().unwrap().sdp,
        alice_live.local_description().unwrap().sdp
    );
}
