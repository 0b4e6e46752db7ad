use meshroom_client::SessionEvent;
use meshroom_client::media::{RemoteTrack, TrackKind};
use meshroom_client::transport::{MediaState, PeerConnection};
use meshroom_core::{PeerId, SignalKind, SignalMessage};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{TestPeer, eventually};

#[tokio::test]
async fn test_late_terminal_event_from_replaced_connection_is_ignored() {
    init_tracing();
    let mut alice = TestPeer::ready(1).await;
    alice.roster(&[1, 2]).await;
    let old = alice.factory.wait_for_connection(PeerId(2), 1).await;

    alice.session.connect_to_peer_force_offer(PeerId(2)).await;
    let current = alice.factory.wait_for_connection(PeerId(2), 2).await;
    current
        .emit_track(RemoteTrack::new("v", "cam-2", TrackKind::Video))
        .await;
    alice
        .wait_view(|v| v.remote_streams.contains_key(&PeerId(2)))
        .await;

    old.emit_state(MediaState::Failed).await;
    old.emit_track(RemoteTrack::new("ghost", "old", TrackKind::Audio))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let view = alice.session.snapshot();
    assert!(view.links.contains_key(&PeerId(2)));
    assert_eq!(view.remote_streams[&PeerId(2)].tracks.len(), 1);
    assert_eq!(alice.factory.connections_for(PeerId(2)).len(), 2);
    assert!(
        !alice
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::PeerDisconnected(_))),
    );
}

#[tokio::test]
async fn test_stale_offer_from_replaced_connection_is_dropped() {
    init_tracing();
    let alice = TestPeer::ready(1).await;
    alice.factory.behavior.hold_offers();

    alice.session.connect_to_peer(PeerId(2)).await;
    alice.factory.wait_for_connection(PeerId(2), 1).await;
    alice.session.connect_to_peer_force_offer(PeerId(2)).await;
    let current = alice.factory.wait_for_connection(PeerId(2), 2).await;

    alice.factory.behavior.release_offers();

    let offers = alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(alice.signaling.offers_to(PeerId(2)).len(), 1);
    assert_eq!(
        offers[0].payload.sdp.as_deref(),
        Some(format!("offer-{}", current.id()).as_str())
    );
}

#[tokio::test]
async fn test_terminal_state_tears_down_and_reoffers() {
    init_tracing();
    let mut alice = TestPeer::ready(1).await;
    alice.roster(&[1, 2]).await;
    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    alice
        .deliver(SignalMessage::answer(PeerId(2), PeerId(1), "answer"))
        .await;
    let first = alice.factory.wait_for_connection(PeerId(2), 1).await;

    first.emit_state(MediaState::Connected).await;
    first
        .emit_track(RemoteTrack::new("a", "cam-2", TrackKind::Audio))
        .await;
    alice
        .wait_event(|e| matches!(e, SessionEvent::PeerConnected(PeerId(2))))
        .await;
    alice
        .wait_view(|v| v.remote_streams.contains_key(&PeerId(2)))
        .await;

    first.emit_state(MediaState::Failed).await;

    alice
        .wait_event(|e| matches!(e, SessionEvent::PeerDisconnected(PeerId(2))))
        .await;
    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 2).await;
    let second = alice.factory.wait_for_connection(PeerId(2), 2).await;
    eventually("failed connection closed", || first.is_closed()).await;
    assert!(!second.is_closed());
    assert!(!alice.session.snapshot().remote_streams.contains_key(&PeerId(2)));
}
