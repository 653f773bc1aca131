//! Signal to message mapping

use std::sync::Arc;

use super::osc::OscMessage;
use super::sender::ControlSender;
use super::signal::ControlSignal;
use crate::error::RelayError;

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address for "start playback of X"
    pub play_address: String,

    /// Address for "stop playback"
    pub stop_address: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            play_address: "max/play".to_string(),
            stop_address: "max/stop".to_string(),
        }
    }
}

impl RelayConfig {
    /// Set the playback address
    pub fn play_address(mut self, address: impl Into<String>) -> Self {
        self.play_address = address.into();
        self
    }

    /// Set the stop address
    pub fn stop_address(mut self, address: impl Into<String>) -> Self {
        self.stop_address = address.into();
        self
    }
}

/// Acknowledgement of a relayed signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Address the message was sent to
    pub address: String,
}

/// Forwards subscriber signals to the control endpoint
#[derive(Clone)]
pub struct ControlRelay {
    sender: Arc<dyn ControlSender>,
    config: RelayConfig,
}

impl ControlRelay {
    pub fn new(sender: Arc<dyn ControlSender>) -> Self {
        Self::with_config(sender, RelayConfig::default())
    }

    pub fn with_config(sender: Arc<dyn ControlSender>, config: RelayConfig) -> Self {
        Self { sender, config }
    }

    /// Message a signal maps to
    pub fn message_for(&self, signal: &ControlSignal) -> OscMessage {
        match signal {
            ControlSignal::OnScreen { file_name } => {
                OscMessage::new(&self.config.play_address).arg(file_name.as_str())
            }
            ControlSignal::OffScreen => OscMessage::new(&self.config.stop_address),
        }
    }

    /// Send the message for `signal`
    pub async fn relay(&self, signal: &ControlSignal) -> Result<Ack, RelayError> {
        let msg = self.message_for(signal);
        self.sender.send(&msg).await?;
        Ok(Ack {
            address: msg.address,
        })
    }
}
