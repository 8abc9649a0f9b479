use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:slidecast.db?mode=rwc";
pub const DEFAULT_SPECTATOR_BUFFER: usize = 256;
pub const DEFAULT_BUS_IDLE_SECS: u64 = 600;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Regular commands a spectator may have queued before it is dropped.
    pub spectator_buffer: usize,
    /// Bus channels with no traffic and nobody attached for this long are reaped.
    pub bus_idle: Duration,
    pub handshake_timeout: Duration,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT").unwrap_or(DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            spectator_buffer: env_parse::<usize>("SLIDECAST_SPECTATOR_BUFFER")
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_SPECTATOR_BUFFER),
            bus_idle: Duration::from_secs(
                env_parse("SLIDECAST_BUS_IDLE_SECS").unwrap_or(DEFAULT_BUS_IDLE_SECS),
            ),
            handshake_timeout: Duration::from_secs(
                env_parse::<u64>("SLIDECAST_HANDSHAKE_TIMEOUT_SECS")
                    .filter(|n| *n > 0)
                    .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            spectator_buffer: DEFAULT_SPECTATOR_BUFFER,
            bus_idle: Duration::from_secs(DEFAULT_BUS_IDLE_SECS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        }
    }
}
