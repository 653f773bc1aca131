//! Session context
//!
//! Read-only identity of a connection, handed to both pump loops.

use std::net::SocketAddr;

use super::state::SessionState;
use crate::hub::SubscriberKey;

/// Identity of one subscriber connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Hub registration key
    pub key: SubscriberKey,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr, key: SubscriberKey) -> Self {
        Self {
            session_id,
            peer_addr,
            key,
        }
    }
}

impl From<&SessionState> for SessionContext {
    fn from(state: &SessionState) -> Self {
        Self::new(state.id, state.peer_addr, state.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_state() {
        let peer: SocketAddr = "10.0.0.2:41000".parse().unwrap();
        let state = SessionState::new(9, peer);
        let ctx = SessionContext::from(&state);

        assert_eq!(ctx.session_id, 9);
        assert_eq!(ctx.peer_addr, peer);
        assert_eq!(ctx.key, state.key);
    }
}
