//! Session state machine
//!
//! Tracks one subscriber connection from upgrade to close.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::hub::SubscriberKey;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Upgraded, not yet registered with the hub
    Connected,
    /// Mailbox registered, pumps running
    Active,
    /// Pumps stopped, unsubscribing and closing the socket
    Closing,
    /// Session closed
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Hub registration key
    pub key: SubscriberKey,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Time the mailbox was registered
    pub activated_at: Option<Instant>,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            key: SubscriberKey::for_peer(peer_addr, id),
            phase: SessionPhase::Connected,
            connected_at: Instant::now(),
            activated_at: None,
        }
    }

    /// Mailbox registered
    pub fn activate(&mut self) {
        if self.phase == SessionPhase::Connected {
            self.phase = SessionPhase::Active;
            self.activated_at = Some(Instant::now());
        }
    }

    /// Start closing the session
    pub fn close(&mut self) {
        if matches!(self.phase, SessionPhase::Connected | SessionPhase::Active) {
            self.phase = SessionPhase::Closing;
        }
    }

    /// Session fully torn down
    pub fn finish(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7745)
    }

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new(1, addr());
        assert_eq!(state.phase, SessionPhase::Connected);
        assert!(!state.is_active());

        state.activate();
        assert_eq!(state.phase, SessionPhase::Active);
        assert!(state.activated_at.is_some());
        assert!(state.is_active());

        state.close();
        assert_eq!(state.phase, SessionPhase::Closing);

        state.finish();
        assert_eq!(state.phase, SessionPhase::Closed);
    }

    #[test]
    fn test_close_before_activate() {
        let mut state = SessionState::new(1, addr());
        state.close();
        assert_eq!(state.phase, SessionPhase::Closing);

        // Closing is not undone
        state.activate();
        assert_eq!(state.phase, SessionPhase::Closing);
        assert!(state.activated_at.is_none());
    }

    #[test]
    fn test_keys_per_session() {
        let a = SessionState::new(1, addr());
        let b = SessionState::new(2, addr());
        assert_ne!(a.key, b.key);
    }
}
