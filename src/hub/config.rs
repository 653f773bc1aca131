//! Hub configuration

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Events each subscriber mailbox can hold before `publish` waits
    pub mailbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 50,
        }
    }
}

impl HubConfig {
    /// Set the mailbox capacity (at least 1, so replay always fits)
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}
