//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS ("*" allows any)
    pub client_origin: String,

    /// Inbound messages per second accepted from one socket
    pub input_rate_limit: u32,
    /// Period of transport-level ping frames
    pub heartbeat_interval: Duration,
    /// Idle time after which a socket is treated as disconnected
    pub client_timeout: Duration,

    /// Gameplay rules handed to the arena
    pub rules: GameRules,
}

/// Tunable rules of the authoritative simulation
#[derive(Clone, Debug)]
pub struct GameRules {
    /// Maximum concurrent combatants
    pub max_players: usize,
    /// Scheduler frequency in Hz
    pub tick_rate: u32,
    /// Ticks between heartbeat leaderboard broadcasts
    pub leaderboard_interval_ticks: u32,
    /// Movement ceiling in units per second
    pub max_speed: f32,
    /// Lower bound applied to the elapsed time of a movement sample (ms)
    pub min_move_window_ms: u64,
    /// When true, teammates can damage each other
    pub hardcore_mode: bool,
    /// Delay before a collected item comes back (ms)
    pub item_respawn_ms: u64,
    /// Planar pickup radius
    pub pickup_radius: f32,
    /// Seed for spawn selection (None = from entropy)
    pub seed: Option<u64>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_players: 8,
            tick_rate: 60,
            leaderboard_interval_ticks: 120,
            max_speed: 300.0,
            min_move_window_ms: 50,
            hardcore_mode: false,
            item_respawn_ms: 30_000,
            pickup_radius: 32.0,
            seed: None,
        }
    }
}

impl GameRules {
    /// Duration of one scheduler tick
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT takes precedence for hosted deployments
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string())
        };

        let defaults = GameRules::default();
        let rules = GameRules {
            max_players: parse_or("MAX_PLAYERS", defaults.max_players)?,
            tick_rate: parse_or("TICK_RATE", defaults.tick_rate)?,
            leaderboard_interval_ticks: parse_or(
                "LEADERBOARD_INTERVAL_TICKS",
                defaults.leaderboard_interval_ticks,
            )?,
            max_speed: parse_or("MAX_SPEED", defaults.max_speed)?,
            min_move_window_ms: parse_or("MIN_MOVE_WINDOW_MS", defaults.min_move_window_ms)?,
            hardcore_mode: parse_or("HARDCORE_MODE", defaults.hardcore_mode)?,
            item_respawn_ms: parse_or("ITEM_RESPAWN_MS", defaults.item_respawn_ms)?,
            pickup_radius: parse_or("PICKUP_RADIUS", defaults.pickup_radius)?,
            seed: match env::var("ARENA_SEED") {
                Ok(raw) => Some(parse_value("ARENA_SEED", raw)?),
                Err(_) => None,
            },
        };

        if rules.max_players == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_PLAYERS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            input_rate_limit: parse_or("INPUT_RATE_LIMIT", 240)?,
            heartbeat_interval: Duration::from_secs(parse_or("HEARTBEAT_INTERVAL_SECS", 15)?),
            client_timeout: Duration::from_secs(parse_or("CLIENT_TIMEOUT_SECS", 45)?),
            rules,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_value(key, raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value: raw })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = GameRules::default();
        assert_eq!(rules.max_players, 8);
        assert_eq!(rules.tick_rate, 60);
        assert_eq!(rules.leaderboard_interval_ticks, 120);
        assert!(!rules.hardcore_mode);
        assert_eq!(rules.tick_period(), Duration::from_micros(16_666));
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let err = parse_value::<u32>("TICK_RATE", "fast".to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TICK_RATE", .. }));

        let ok: bool = parse_value("HARDCORE_MODE", " true ".to_string()).unwrap();
        assert!(ok);
    }
}
