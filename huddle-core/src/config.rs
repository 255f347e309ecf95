use std::time::Duration;

/// The configuration of the session engine
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a user must wait between starting two streams
    pub stream_cooldown: Duration,
    /// How many streams a single user may host at the same time
    pub max_streams_per_user: usize,
    /// How many streams may be live across the whole server
    pub max_active_streams: usize,
    /// How many viewers a single stream accepts, the host is not counted
    pub max_viewers_per_stream: usize,
    /// How often connections are probed with a ping
    pub heartbeat_interval: Duration,
    /// The longest chat message accepted, in characters
    pub max_message_length: usize,
}

impl Config {
    /// How long a connection may stay silent before the heartbeat reports it as stale
    pub fn stale_after(&self) -> Duration {
        self.heartbeat_interval * 2
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream_cooldown: Duration::from_secs(30),
            max_streams_per_user: 1,
            max_active_streams: 100,
            max_viewers_per_stream: 100,
            heartbeat_interval: Duration::from_secs(30),
            max_message_length: 2000,
        }
    }
}
