use crate::error::MeshError;
use crate::transport::TransportConfig;
use meshroom_core::utils::DEFAULT_RELAY_URL;
use meshroom_core::{IceServerConfig, PeerId, RoomId};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How crossed offers between two peers are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlarePolicy {
    /// The inbound offer always defeats a pending local offer. Two peers that
    /// offer at the same instant can both yield and end up answering
    /// connections the other side already discarded.
    #[default]
    InboundWins,
    /// Only the peer with the lower id yields; the higher id keeps its own
    /// offer and ignores the inbound one.
    LowerIdYields,
}

impl FromStr for GlarePolicy {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound-wins" => Ok(Self::InboundWins),
            "lower-id-yields" => Ok(Self::LowerIdYields),
            other => Err(MeshError::Config(format!("unknown glare policy `{other}`"))),
        }
    }
}

impl fmt::Display for GlarePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InboundWins => f.write_str("inbound-wins"),
            Self::LowerIdYields => f.write_str("lower-id-yields"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub local_id: PeerId,
    /// Window after a negotiation failure during which no offers are originated.
    pub cooldown: Duration,
    /// How long a sent offer may stay unanswered before the peer is retried.
    pub answer_timeout: Duration,
    pub glare_policy: GlarePolicy,
}

impl SessionConfig {
    pub fn new(local_id: PeerId) -> Self {
        Self {
            local_id,
            ..Default::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_id: PeerId(0),
            cooldown: Duration::from_secs(3),
            answer_timeout: Duration::from_secs(10),
            glare_policy: GlarePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Relay base URL, e.g. `ws://127.0.0.1:8080`.
    pub url: String,
    pub auth_token: Option<String>,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RELAY_URL.to_owned(),
            auth_token: None,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

/// Everything a headless participant needs to join a room.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub room: RoomId,
    pub session: SessionConfig,
    pub signaling: SignalingConfig,
    pub transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(room: impl Into<RoomId>, local_id: PeerId) -> Self {
        Self {
            room: room.into(),
            session: SessionConfig::new(local_id),
            ..Default::default()
        }
    }

    /// Reads `MESHROOM_ROOM` and `MESHROOM_MEMBER_ID` (required) plus the
    /// optional `MESHROOM_RELAY_URL`, `MESHROOM_TOKEN`, `MESHROOM_GLARE_POLICY`,
    /// `MESHROOM_COOLDOWN_MS` and `MESHROOM_ICE_SERVERS` (comma separated).
    pub fn from_env() -> Result<Self, MeshError> {
        let room = required("MESHROOM_ROOM")?;
        let local_id: PeerId = required("MESHROOM_MEMBER_ID")?.parse()?;

        let mut config = Self::new(room, local_id);

        if let Ok(url) = env::var("MESHROOM_RELAY_URL") {
            config.signaling.url = url;
        }
        config.signaling.auth_token = env::var("MESHROOM_TOKEN").ok();

        if let Ok(policy) = env::var("MESHROOM_GLARE_POLICY") {
            config.session.glare_policy = policy.parse()?;
        }

        if let Ok(ms) = env::var("MESHROOM_COOLDOWN_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| MeshError::Config(format!("MESHROOM_COOLDOWN_MS: `{ms}`")))?;
            config.session.cooldown = Duration::from_millis(ms);
        }

        if let Ok(servers) = env::var("MESHROOM_ICE_SERVERS") {
            let urls: Vec<String> = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
            config.transport.ice_servers = if urls.is_empty() {
                Vec::new()
            } else {
                vec![IceServerConfig {
                    urls,
                    username: None,
                    credential: None,
                }]
            };
        }

        Ok(config)
    }
}

fn required(name: &str) -> Result<String, MeshError> {
    env::var(name).map_err(|_| MeshError::Config(format!("{name} is not set")))
}
