use std::time::Duration;
use tablelink_core::IceServerConfig;
use tablelink_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};

/// Everything a host or guest session needs to know before it starts.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the signaling relay, e.g. `https://relay.example.org`.
    pub relay_url: String,
    pub request_timeout: Duration,
    pub ice_servers: Vec<IceServerConfig>,
    pub mailbox_poll: PollingConfig,
    pub discovery_poll: PollingConfig,
    pub heartbeat: PollingConfig,
    pub link: LinkConfig,
    /// Host -> guest `ping` cadence over open channels.
    pub keepalive_interval: Duration,
    /// Inbound silence after which a connected guest is treated as dropping.
    pub silence_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:5000".to_owned(),
            request_timeout: Duration::from_secs(10),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
            mailbox_poll: PollingConfig {
                initial_interval: Duration::from_secs(2),
                max_interval: Duration::from_secs(30),
                multiplier: 2.5,
                quiet_period: Duration::from_millis(500),
            },
            discovery_poll: PollingConfig {
                initial_interval: Duration::from_secs(3),
                max_interval: Duration::from_secs(30),
                multiplier: 2.5,
                quiet_period: Duration::ZERO,
            },
            heartbeat: PollingConfig {
                initial_interval: Duration::from_secs(10),
                max_interval: Duration::from_secs(60),
                multiplier: 2.0,
                quiet_period: Duration::ZERO,
            },
            link: LinkConfig::default(),
            keepalive_interval: Duration::from_secs(3),
            silence_timeout: Duration::from_secs(9),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Pause after a fetch that produced data. Zero disables it.
    pub quiet_period: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(30),
            multiplier: 2.5,
            quiet_period: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub grace_period: Duration,
    pub restart_cap: u32,
    /// Upper bound on waiting for local candidate gathering.
    pub discovery_timeout: Duration,
    /// Ceiling on one negotiation attempt, from offer to open channel.
    pub connect_timeout: Duration,
    pub channel_label: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(12),
            restart_cap: 3,
            discovery_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(20),
            channel_label: "tablelink".to_owned(),
        }
    }
}
