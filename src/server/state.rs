//! Shared server state.

use std::time::{Duration, Instant};

use super::config::ServerConfig;
use crate::detector::Detector;
use crate::storage::QueryLog;

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Two-stage detector
    pub detector: Detector,
    /// Persistent decision log
    pub log: QueryLog,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig, detector: Detector, log: QueryLog) -> Self {
        Self {
            config,
            detector,
            log,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
