//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated, empty = any)
    pub client_origin: String,
    /// Number of independent worlds hosted by this process
    pub world_count: usize,
    /// Simulation tuning shared by every world
    pub sim: SimConfig,
}

/// Tuning for one simulated world
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    /// Simulation ticks per second
    pub tick_rate_hz: u32,
    /// Broadcast on every n-th non-empty tick (1 = every tick)
    pub broadcast_every: u32,
    /// Distance within which a peer is replicated in detail
    pub nearby_range: f64,
    /// Heading error (degrees) under which the heading snaps to the target
    pub angular_tolerance: f64,
    /// Turn rate in degrees per second
    pub turn_speed: f64,
    /// Linear speed in world units per second
    pub move_speed: f64,
    /// Players spawn uniformly within this distance of the origin
    pub spawn_radius: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            broadcast_every: 2,
            nearby_range: 1500.0,
            angular_tolerance: 64.0,
            turn_speed: 450.0,
            move_speed: 180.0,
            spawn_radius: 1000.0,
        }
    }
}

impl SimConfig {
    /// Squared nearby range, compared against squared distances
    pub fn nearby_range_sq(&self) -> f64 {
        self.nearby_range * self.nearby_range
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid("TICK_RATE_HZ", "must be at least 1".into()));
        }
        if self.broadcast_every == 0 {
            return Err(ConfigError::Invalid("BROADCAST_EVERY", "must be at least 1".into()));
        }
        let reals = [
            ("NEARBY_RANGE", self.nearby_range),
            ("ANGULAR_TOLERANCE", self.angular_tolerance),
            ("TURN_SPEED", self.turn_speed),
            ("MOVE_SPEED", self.move_speed),
            ("SPAWN_RADIUS", self.spawn_radius),
        ];
        for (name, value) in reals {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(name, format!("{value} is not a finite non-negative number")));
            }
        }
        Ok(())
    }
}

/// Tuning for the client playback side
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// How far behind the mapped server time playback runs (ms)
    pub render_delay_ms: f64,
    /// Minimum gap between two input samples (ms)
    pub input_interval_ms: u64,
    /// Unacknowledged inputs older than this are forgotten (ms)
    pub pending_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            render_delay_ms: 100.0,
            input_interval_ms: 20,
            pending_timeout_ms: 5_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let defaults = SimConfig::default();
        let sim = SimConfig {
            tick_rate_hz: parse_or("TICK_RATE_HZ", defaults.tick_rate_hz)?,
            broadcast_every: parse_or("BROADCAST_EVERY", defaults.broadcast_every)?,
            nearby_range: parse_or("NEARBY_RANGE", defaults.nearby_range)?,
            angular_tolerance: parse_or("ANGULAR_TOLERANCE", defaults.angular_tolerance)?,
            turn_speed: parse_or("TURN_SPEED", defaults.turn_speed)?,
            move_speed: parse_or("MOVE_SPEED", defaults.move_speed)?,
            spawn_radius: parse_or("SPAWN_RADIUS", defaults.spawn_radius)?,
        };
        sim.validate()?;

        let world_count = parse_or("WORLD_COUNT", 1usize)?;
        if world_count == 0 {
            return Err(ConfigError::Invalid("WORLD_COUNT", "must be at least 1".into()));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),
            world_count,
            sim,
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, format!("cannot parse {raw:?}"))),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimConfig::default().validate().is_ok());
        assert_eq!(SimConfig::default().nearby_range_sq(), 2_250_000.0);
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let sim = SimConfig {
            broadcast_every: 0,
            ..SimConfig::default()
        };
        assert!(matches!(sim.validate(), Err(ConfigError::Invalid("BROADCAST_EVERY", _))));
    }

    #[test]
    fn non_finite_tuning_is_rejected() {
        let sim = SimConfig {
            turn_speed: f64::NAN,
            ..SimConfig::default()
        };
        assert!(matches!(sim.validate(), Err(ConfigError::Invalid("TURN_SPEED", _))));
    }
}
