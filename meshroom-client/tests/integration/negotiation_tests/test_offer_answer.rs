use meshroom_client::media::{RemoteTrack, TrackKind};
use meshroom_client::session::NegotiationState;
use meshroom_client::transport::{PeerConnection, SignalingState};
use meshroom_core::{PeerId, SdpType, Signal, SignalKind, SignalMessage};

use crate::integration::init_tracing;
use crate::utils::{MockMediaDevices, TestPeer, TestPeerOptions, eventually};

#[tokio::test]
async fn test_roster_update_sends_offer() {
    init_tracing();
    let alice = TestPeer::ready(1).await;

    alice.roster(&[1, 2]).await;

    let offers = alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    assert_eq!(offers[0].sender_id, PeerId(1));
    let Ok(Signal::Offer(offer)) = offers[0].decode() else {
        panic!("Expected an offer payload");
    };
    assert_eq!(offer.sdp_type, SdpType::Offer);

    let view = alice
        .wait_view(|v| v.links.get(&PeerId(2)).is_some_and(|l| l.awaiting_answer))
        .await;
    assert_eq!(view.links[&PeerId(2)].negotiation, NegotiationState::HaveLocalOffer);
    assert!(!view.links.contains_key(&PeerId(1)), "No link to self");
    assert_eq!(alice.factory.total(), 1);
}

#[tokio::test]
async fn test_fresh_offer_is_answered() {
    init_tracing();
    let bob = TestPeer::ready(2).await;

    bob.deliver(SignalMessage::offer(PeerId(1), PeerId(2), "remote-offer"))
        .await;

    let answers = bob.signaling.wait_for(PeerId(1), SignalKind::Answer, 1).await;
    assert_eq!(answers[0].sender_id, PeerId(2));

    let view = bob
        .wait_view(|v| {
            v.links
                .get(&PeerId(1))
                .is_some_and(|l| l.negotiation == NegotiationState::Stable)
        })
        .await;
    assert!(!view.links[&PeerId(1)].awaiting_answer);

    let connection = bob.factory.wait_for_connection(PeerId(1), 1).await;
    assert_eq!(connection.remote_description().unwrap().sdp, "remote-offer");
    assert_eq!(connection.signaling_state(), SignalingState::Stable);
    assert!(bob.signaling.offers_to(PeerId(1)).is_empty());
}

#[tokio::test]
async fn test_answer_completes_negotiation() {
    init_tracing();
    let alice = TestPeer::ready(1).await;
    alice.roster(&[1, 2]).await;
    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;

    alice
        .deliver(SignalMessage::answer(PeerId(2), PeerId(1), "remote-answer"))
        .await;

    let view = alice
        .wait_view(|v| {
            v.links
                .get(&PeerId(2))
                .is_some_and(|l| l.negotiation == NegotiationState::Stable)
        })
        .await;
    assert!(!view.links[&PeerId(2)].awaiting_answer);
    assert!(view.pending_offers.is_empty());
}

#[tokio::test]
async fn test_connect_twice_creates_one_connection() {
    init_tracing();
    let alice = TestPeer::ready(1).await;

    alice.session.connect_to_peer(PeerId(2)).await;
    alice.session.connect_to_peer(PeerId(2)).await;

    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    alice.session.connect_to_peer(PeerId(2)).await;
    alice.wait_view(|v| v.links.contains_key(&PeerId(2))).await;

    assert_eq!(alice.factory.connections_for(PeerId(2)).len(), 1);
    assert_eq!(alice.signaling.offers_to(PeerId(2)).len(), 1);
}

#[tokio::test]
async fn test_force_offer_replaces_link() {
    init_tracing();
    let alice = TestPeer::ready(1).await;
    alice.session.connect_to_peer(PeerId(2)).await;
    let first = alice.factory.wait_for_connection(PeerId(2), 1).await;

    alice.session.connect_to_peer_force_offer(PeerId(2)).await;

    let second = alice.factory.wait_for_connection(PeerId(2), 2).await;
    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 2).await;
    eventually("first connection closed", || first.is_closed()).await;
    assert!(!second.is_closed());
}

#[tokio::test]
async fn test_offer_dropped_without_media() {
    init_tracing();
    let bob = TestPeer::start_with(TestPeerOptions::new(2).devices(MockMediaDevices::held()));

    bob.deliver(SignalMessage::offer(PeerId(1), PeerId(2), "early-offer"))
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert_eq!(bob.factory.total(), 0);
    assert!(bob.signaling.answers_to(PeerId(1)).is_empty());

    bob.devices.release_camera();
    bob.wait_view(|v| v.media_ready).await;
    assert_eq!(bob.factory.total(), 0, "A dropped offer is not replayed");
}

#[tokio::test]
async fn test_remote_tracks_surface_in_view() {
    init_tracing();
    let bob = TestPeer::ready(2).await;
    bob.deliver(SignalMessage::offer(PeerId(1), PeerId(2), "remote-offer"))
        .await;
    let connection = bob.factory.wait_for_connection(PeerId(1), 1).await;

    connection
        .emit_track(RemoteTrack::new("a1", "cam-1", TrackKind::Audio))
        .await;
    connection
        .emit_track(RemoteTrack::new("v1", "cam-1", TrackKind::Video))
        .await;

    let view = bob
        .wait_view(|v| v.remote_streams.get(&PeerId(1)).is_some_and(|s| s.tracks.len() == 2))
        .await;
    let stream = &view.remote_streams[&PeerId(1)];
    assert!(stream.has(TrackKind::Audio) && stream.has(TrackKind::Video));
}

#[tokio::test]
async fn test_local_candidates_are_signaled() {
    init_tracing();
    let alice = TestPeer::ready(1).await;
    alice.session.connect_to_peer(PeerId(2)).await;
    let connection = alice.factory.wait_for_connection(PeerId(2), 1).await;

    connection
        .emit_candidate(meshroom_core::IceCandidate {
            candidate: "candidate:1 1 udp 1 10.0.0.1 4000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
        })
        .await;

    let sent = alice
        .signaling
        .wait_for(PeerId(2), SignalKind::IceCandidate, 1)
        .await;
    assert_eq!(sent[0].payload.sdp_mid.as_deref(), Some("0"));
}
