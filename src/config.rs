//! Session configuration
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! usual RobotStudio setup: listen on `127.0.0.1:6511` and learn the
//! controller address from its first datagram.
//!
//! ```yaml
//! local_addr: 127.0.0.1:6511
//! remote_addr: null
//! receive_mode: background   # or polled
//! segment_duration_secs: 2.0
//! home_position: [0, 0, 0, 0, 0, 0]
//! rapid_module_name: Module1
//! export_path: Waypoints.mod
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{EgmError, Result};
use crate::sequencer::{DEFAULT_EXPORT_FILE, DEFAULT_MODULE_NAME, DEFAULT_SEGMENT_DURATION};
use crate::transport::DEFAULT_EGM_PORT;
use crate::types::JointVector;

/// Where inbound datagrams are received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMode {
    /// A tokio task receives continuously; `tick` picks up the latest snapshot.
    #[default]
    Background,
    /// `tick` receives at most one queued datagram itself.
    Polled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EgmConfig {
    pub local_addr: SocketAddr,
    /// Controller endpoint; learned from the first datagram when unset
    pub remote_addr: Option<SocketAddr>,
    pub receive_mode: ReceiveMode,
    pub segment_duration_secs: f64,
    pub home_position: JointVector,
    pub rapid_module_name: String,
    pub export_path: PathBuf,
}

impl Default for EgmConfig {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_EGM_PORT)),
            remote_addr: None,
            receive_mode: ReceiveMode::default(),
            segment_duration_secs: DEFAULT_SEGMENT_DURATION.as_secs_f64(),
            home_position: JointVector::ZERO,
            rapid_module_name: DEFAULT_MODULE_NAME.to_string(),
            export_path: PathBuf::from(DEFAULT_EXPORT_FILE),
        }
    }
}

impl EgmConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml =
            std::fs::read_to_string(path).map_err(|e| EgmError::file_error(path.to_path_buf(), e))?;
        let config = Self::parse(&yaml, path)?;
        debug!(path = %path.display(), ?config, "Configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::parse(yaml, Path::new("<inline>"))
    }

    fn parse(yaml: &str, path: &Path) -> Result<Self> {
        // serde_yaml_ng rejects an empty document for a struct
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml)
                .map_err(|e| EgmError::config_error(path.to_path_buf(), e.to_string()))?
        };
        config.validate().map_err(|details| EgmError::config_error(path.to_path_buf(), details))?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.segment_duration_secs.is_finite() || self.segment_duration_secs < 0.0 {
            return Err(format!(
                "segment_duration_secs must be a non-negative number, got {}",
                self.segment_duration_secs
            ));
        }
        if Duration::try_from_secs_f64(self.segment_duration_secs).is_err() {
            return Err(format!(
                "segment_duration_secs is too large, got {}",
                self.segment_duration_secs
            ));
        }
        if self.rapid_module_name.trim().is_empty() {
            return Err("rapid_module_name must not be empty".to_string());
        }
        Ok(())
    }

    /// Segment duration; an invalid value set in code falls back to the default.
    pub fn segment_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.segment_duration_secs).unwrap_or(DEFAULT_SEGMENT_DURATION)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| EgmError::config_error(PathBuf::from("<inline>"), e.to_string()))
    }
}
