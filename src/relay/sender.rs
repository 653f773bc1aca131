//! Control endpoint capability

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};

use super::osc::OscMessage;
use crate::error::RelayError;

/// Sends addressed messages to the external control endpoint
#[async_trait]
pub trait ControlSender: Send + Sync {
    async fn send(&self, msg: &OscMessage) -> Result<(), RelayError>;
}

/// Sends OSC datagrams over UDP
pub struct UdpControlSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpControlSender {
    /// Resolve `host:port` and bind an ephemeral local socket for it
    pub async fn connect(host: &str, port: u16) -> Result<Self, RelayError> {
        let endpoint = format!("{}:{}", host, port);
        let target = lookup_host(&endpoint)
            .await
            .map_err(|_| RelayError::Unresolved(endpoint.clone()))?
            .next()
            .ok_or_else(|| RelayError::Unresolved(endpoint.clone()))?;

        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| RelayError::Send {
                address: endpoint,
                source,
            })?;

        tracing::info!(target = %target, "Control endpoint resolved");

        Ok(Self { socket, target })
    }

    /// Resolved endpoint address
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl ControlSender for UdpControlSender {
    async fn send(&self, msg: &OscMessage) -> Result<(), RelayError> {
        let packet = msg.encode();
        self.socket
            .send_to(&packet, self.target)
            .await
            .map_err(|source| RelayError::Send {
                address: msg.address.clone(),
                source,
            })?;

        tracing::debug!(
            address = %msg.address,
            target = %self.target,
            len = packet.len(),
            "Control message sent"
        );
        Ok(())
    }
}
