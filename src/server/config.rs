//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Shortest allowed ping period
pub const MIN_PING_PERIOD: Duration = Duration::from_millis(1);

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent subscribers (0 = unlimited)
    pub max_connections: usize,

    /// Deadline for each write to a subscriber
    pub write_wait: Duration,

    /// How long a subscriber may go without answering a ping
    pub pong_wait: Duration,

    /// Interval between pings, shorter than `pong_wait` and never below
    /// [`MIN_PING_PERIOD`]
    pub ping_period: Duration,

    /// Largest accepted inbound message
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7745)),
            max_connections: 0, // Unlimited
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: ping_period_for(pong_wait),
            max_message_size: 64 * 1024, // Control messages are tiny
        }
    }
}

/// Nine tenths of the pong wait, at least [`MIN_PING_PERIOD`]
fn ping_period_for(pong_wait: Duration) -> Duration {
    (pong_wait * 9 / 10).max(MIN_PING_PERIOD)
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the write deadline
    pub fn write_wait(mut self, wait: Duration) -> Self {
        self.write_wait = wait;
        self
    }

    /// Set the pong wait; the ping period follows at nine tenths of it
    pub fn pong_wait(mut self, wait: Duration) -> Self {
        self.pong_wait = wait;
        self.ping_period = ping_period_for(wait);
        self
    }

    /// Set the ping period, capped below the pong wait
    pub fn ping_period(mut self, period: Duration) -> Self {
        self.ping_period = period
            .min(ping_period_for(self.pong_wait))
            .max(MIN_PING_PERIOD);
        self
    }

    /// Set the maximum inbound message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 7745);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.write_wait, Duration::from_secs(10));
        assert_eq!(config.pong_wait, Duration::from_secs(60));
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert_eq!(config.max_message_size, 64 * 1024);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:7746".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 7746);
    }

    #[test]
    fn test_builder_bind() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        let config = ServerConfig::default().bind(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_max_connections() {
        let config = ServerConfig::default().max_connections(100);

        assert_eq!(config.max_connections, 100);
    }

    #[test]
    fn test_builder_pong_wait_moves_ping_period() {
        let config = ServerConfig::default().pong_wait(Duration::from_secs(10));

        assert_eq!(config.pong_wait, Duration::from_secs(10));
        assert_eq!(config.ping_period, Duration::from_secs(9));
    }

    #[test]
    fn test_builder_ping_period_capped() {
        let config = ServerConfig::default()
            .pong_wait(Duration::from_secs(10))
            .ping_period(Duration::from_secs(30));

        assert_eq!(config.ping_period, Duration::from_secs(9));

        let config = ServerConfig::default().ping_period(Duration::from_secs(5));
        assert_eq!(config.ping_period, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_zero_timings_clamped() {
        let config = ServerConfig::default().pong_wait(Duration::ZERO);
        assert_eq!(config.ping_period, MIN_PING_PERIOD);

        let config = ServerConfig::default().ping_period(Duration::ZERO);
        assert_eq!(config.ping_period, MIN_PING_PERIOD);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:7745".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .write_wait(Duration::from_secs(2))
            .pong_wait(Duration::from_secs(20))
            .max_message_size(1024);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.write_wait, Duration::from_secs(2));
        assert_eq!(config.ping_period, Duration::from_secs(18));
        assert_eq!(config.max_message_size, 1024);
    }
}
