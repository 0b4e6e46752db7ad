use meshroom_client::SessionEvent;
use meshroom_core::{PeerId, SignalKind, SignalMessage};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

use crate::integration::init_tracing;
use crate::utils::TestPeer;

#[tokio::test(start_paused = true)]
async fn test_cooldown_suppresses_offers_then_retries() {
    init_tracing();
    let mut alice = TestPeer::ready(1).await;
    alice.factory.behavior.fail_create.store(true, Ordering::SeqCst);

    alice.roster(&[1, 2]).await;
    alice
        .wait_event(|e| matches!(e, SessionEvent::CooldownStarted))
        .await;
    let engaged = Instant::now();
    alice.factory.behavior.fail_create.store(false, Ordering::SeqCst);

    // A roster change inside the window only adds to the pending set.
    alice.roster(&[1, 2, 3]).await;
    let view = alice.wait_view(|v| v.pending_offers.len() == 2).await;
    assert!(view.cooling_down);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(alice.factory.total(), 0);
    assert!(alice.signaling.sent().is_empty());

    alice
        .wait_event(|e| matches!(e, SessionEvent::CooldownCleared))
        .await;
    assert!(engaged.elapsed() >= Duration::from_secs(3) - Duration::from_millis(50));

    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    alice.signaling.wait_for(PeerId(3), SignalKind::Offer, 1).await;
    assert!(!alice.session.snapshot().cooling_down);
}

#[tokio::test(start_paused = true)]
async fn test_failure_during_cooldown_restarts_window() {
    init_tracing();
    let mut alice = TestPeer::ready(1).await;
    alice.factory.behavior.fail_create.store(true, Ordering::SeqCst);
    alice.roster(&[1, 2]).await;
    alice
        .wait_event(|e| matches!(e, SessionEvent::CooldownStarted))
        .await;
    alice.factory.behavior.fail_create.store(false, Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(2)).await;

    // Inbound offers are still answered during cooldown; this one fails.
    alice
        .factory
        .behavior
        .fail_remote_description
        .store(true, Ordering::SeqCst);
    alice
        .deliver(SignalMessage::offer(PeerId(5), PeerId(1), "bad-offer"))
        .await;
    alice
        .wait_event(|e| matches!(e, SessionEvent::CooldownStarted))
        .await;
    alice
        .factory
        .behavior
        .fail_remote_description
        .store(false, Ordering::SeqCst);
    let restarted = Instant::now();

    // The first window's timer fires here and must not clear the second.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(alice.session.snapshot().cooling_down);
    assert!(alice.signaling.offers_to(PeerId(2)).is_empty());

    alice
        .wait_event(|e| matches!(e, SessionEvent::CooldownCleared))
        .await;
    assert!(restarted.elapsed() >= Duration::from_secs(3) - Duration::from_millis(50));

    let view = alice.wait_view(|v| !v.cooling_down).await;
    assert!(view.pending_offers.contains(&PeerId(2)));
    alice.signaling.wait_for(PeerId(2), SignalKind::Offer, 1).await;
    alice.signaling.wait_for(PeerId(5), SignalKind::Offer, 1).await;
}
