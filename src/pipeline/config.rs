//! Pipeline configuration

use std::time::Duration;

use crate::record::{ColumnMapping, KeyScheme};

/// Pipeline configuration options
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Column positions of the decoded fields
    pub mapping: ColumnMapping,

    /// How content keys are derived
    pub scheme: KeyScheme,

    /// How long subscribers keep receiving once draining starts
    pub grace_period: Duration,

    /// Upper bound on waiting for connections to finish after the grace period
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mapping: ColumnMapping::default(),
            scheme: KeyScheme::default(),
            grace_period: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl PipelineConfig {
    /// Set the column mapping
    pub fn mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Set the content-key scheme
    pub fn scheme(mut self, scheme: KeyScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the grace period
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Set the shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}
