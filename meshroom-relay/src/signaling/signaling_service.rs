use crate::error::RelayError;
use crate::signaling::online_registry::{OnlineRegistry, SessionId};
use dashmap::DashMap;
use meshroom_core::{
    ClientFrame, Destination, OnlineParticipant, PeerId, RoomId, ServerFrame, SignalMessage,
    SubscriptionId,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Session {
    member: PeerId,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Subscriber {
    session: SessionId,
    id: SubscriptionId,
}

struct SignalingInner {
    sessions: DashMap<SessionId, Session>,
    topics: DashMap<Destination, Vec<Subscriber>>,
    registry: OnlineRegistry,
    heartbeat_interval: Duration,
}

/// Topic router shared by every WebSocket connection.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                sessions: DashMap::new(),
                topics: DashMap::new(),
                registry: OnlineRegistry::new(),
                heartbeat_interval,
            }),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.inner.heartbeat_interval
    }

    pub fn add_session(&self, member: PeerId, tx: mpsc::UnboundedSender<ServerFrame>) -> SessionId {
        let session = SessionId::new();
        self.inner.sessions.insert(session, Session { member, tx });
        debug!("Session {} opened for member {}", session, member);
        session
    }

    /// Forgets the session and its subscriptions, and rebroadcasts the
    /// roster of every room it was online in.
    pub fn remove_session(&self, session: SessionId) {
        let Some((_, removed)) = self.inner.sessions.remove(&session) else {
            return;
        };

        for mut topic in self.inner.topics.iter_mut() {
            topic.value_mut().retain(|sub| sub.session != session);
        }
        self.inner.topics.retain(|_, subs| !subs.is_empty());

        for room in self.inner.registry.leave_session(session) {
            info!("Member {} left room {}", removed.member, room);
            self.broadcast_roster(&room);
        }
    }

    pub fn participants(&self, room: &RoomId) -> Vec<OnlineParticipant> {
        self.inner.registry.participants(room)
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn send_to(&self, session: SessionId, frame: ServerFrame) {
        if let Some(target) = self.inner.sessions.get(&session) {
            if target.tx.send(frame).is_err() {
                warn!("Session {} is no longer writable", session);
            }
        }
    }

    pub fn handle_frame(&self, session: SessionId, frame: ClientFrame) -> Result<(), RelayError> {
        let Some(member) = self.inner.sessions.get(&session).map(|s| s.member) else {
            return Ok(());
        };

        match frame {
            ClientFrame::Subscribe { id, destination } => self.subscribe(session, member, id, &destination),
            ClientFrame::Unsubscribe { id } => {
                self.unsubscribe(session, member, id);
                Ok(())
            }
            ClientFrame::Send { destination, body } => self.publish(member, &destination, body),
            ClientFrame::Heartbeat => {
                self.send_to(session, ServerFrame::Heartbeat);
                Ok(())
            }
        }
    }

    fn subscribe(
        &self,
        session: SessionId,
        member: PeerId,
        id: SubscriptionId,
        raw: &str,
    ) -> Result<(), RelayError> {
        let destination: Destination = raw.parse()?;
        if !destination.is_subscribable() {
            return Err(RelayError::NotSubscribable(raw.to_string()));
        }
        if let Destination::SignalInbox(owner) = destination {
            if owner != member {
                return Err(RelayError::ForbiddenSubscription {
                    member,
                    destination: raw.to_string(),
                });
            }
        }

        let subscriber = Subscriber { session, id };
        {
            let mut subs = self.inner.topics.entry(destination.clone()).or_default();
            if subs.contains(&subscriber) {
                debug!("Session {} re-subscribed to {}", session, destination);
                return Ok(());
            }
            subs.push(subscriber);
        }
        debug!("Member {} subscribed to {}", member, destination);

        if let Destination::Participants(room) = &destination {
            if let Some(previous) = self.inner.registry.join(room, member, session) {
                debug!("Member {} replaced session {} in room {}", member, previous, room);
            }
            info!("Member {} is online in room {}", member, room);
            self.broadcast_roster(room);
        }
        Ok(())
    }

    fn unsubscribe(&self, session: SessionId, member: PeerId, id: SubscriptionId) {
        let mut removed_from = Vec::new();
        for mut topic in self.inner.topics.iter_mut() {
            let before = topic.value().len();
            topic
                .value_mut()
                .retain(|sub| !(sub.session == session && sub.id == id));
            if topic.value().len() != before {
                removed_from.push(topic.key().clone());
            }
        }
        self.inner.topics.retain(|_, subs| !subs.is_empty());

        for destination in removed_from {
            if let Destination::Participants(room) = destination {
                if self.inner.registry.leave(&room, member, session) {
                    info!("Member {} went offline in room {}", member, room);
                    self.broadcast_roster(&room);
                }
            }
        }
    }

    fn publish(&self, member: PeerId, raw: &str, body: Value) -> Result<(), RelayError> {
        match raw.parse::<Destination>()? {
            Destination::SignalPublish(room) => {
                let message: SignalMessage = serde_json::from_value(body)?;
                if message.sender_id != member {
                    return Err(RelayError::SpoofedSender {
                        member,
                        claimed: message.sender_id,
                    });
                }

                let inbox = Destination::SignalInbox(message.receiver_id);
                let body = serde_json::to_value(&message)?;
                let delivered = self.deliver(&inbox, body);
                if delivered == 0 {
                    warn!(
                        "Signal {:?} from {} in room {}: receiver {} is offline",
                        message.kind, member, room, message.receiver_id
                    );
                }
                Ok(())
            }
            Destination::RequestParticipants(room) => {
                debug!("Member {} requested the roster of room {}", member, room);
                self.broadcast_roster(&room);
                Ok(())
            }
            _ => Err(RelayError::NotPublishable(raw.to_string())),
        }
    }

    fn broadcast_roster(&self, room: &RoomId) {
        let roster = self.participants(room);
        match serde_json::to_value(&roster) {
            Ok(body) => {
                self.deliver(&Destination::Participants(room.clone()), body);
            }
            Err(e) => warn!("Failed to encode roster of room {}: {}", room, e),
        }
    }

    /// Pushes `body` to every subscriber of `destination`. Returns how many
    /// sessions accepted it.
    fn deliver(&self, destination: &Destination, body: Value) -> usize {
        let subscribers = match self.inner.topics.get(destination) {
            Some(subs) => subs.clone(),
            None => return 0,
        };
        let name = destination.to_string();

        subscribers
            .into_iter()
            .filter(|sub| {
                let frame = ServerFrame::Message {
                    subscription: sub.id,
                    destination: name.clone(),
                    body: body.clone(),
                };
                self.inner
                    .sessions
                    .get(&sub.session)
                    .is_some_and(|target| target.tx.send(frame).is_ok())
            })
            .count()
    }
}
