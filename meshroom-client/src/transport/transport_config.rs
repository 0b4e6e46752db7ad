use meshroom_core::IceServerConfig;
use meshroom_core::utils::{
    DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, DEFAULT_STUN_ADDR_3, DEFAULT_STUN_ADDR_4,
};

/// ICE configuration handed to every peer connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl TransportConfig {
    /// Host candidates only; used for loopback meshes.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: [
                    DEFAULT_STUN_ADDR,
                    DEFAULT_STUN_ADDR_2,
                    DEFAULT_STUN_ADDR_3,
                    DEFAULT_STUN_ADDR_4,
                ]
                .map(String::from)
                .to_vec(),
                username: None,
                credential: None,
            }],
        }
    }
}
