//! Rust link to ABB robot controllers over EGM (Externally Guided Motion).
//!
//! egm-bridge keeps a live copy of a six-axis arm's joint state, sends joint
//! targets back to the controller, and records waypoints that can be played
//! back or exported as a RAPID program.
//!
//! # Features
//!
//! - **EGM protocol**: protobuf `EgmRobot`/`EgmSensor` messages over UDP
//! - **Consistent state**: joint angles and controller state always change together
//! - **Tick driven**: `initialize` / `tick` / `shutdown` for render or game loops
//! - **Waypoints**: smooth joint-space playback, homing and RAPID export
//!
//! # Quick Start
//!
//! Configure EGM in RobotStudio to send to `127.0.0.1:6511`, then:
//!
//! ```rust,no_run
//! use egm_bridge::{Egm, EgmConfig, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> egm_bridge::Result<()> {
//!     let session = Egm::connect(EgmConfig::default()).await?;
//!     let mut updates = session.updates(UpdateRate::Max(30));
//!
//!     while let Some(snapshot) = updates.next().await {
//!         println!("{} {}", snapshot.state, snapshot.joints);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire and socket layers
pub mod protocol;
pub mod transport;

// Session architecture
pub mod command;
pub mod config;
pub mod driver;
pub mod sequencer;
pub mod session;
pub mod state;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use command::CommandSender;
pub use config::{EgmConfig, ReceiveMode};
pub use protocol::{InboundMessage, MessageType, OutboundMessage, ProtocolHeader};
pub use sequencer::{Sequencer, SequencerState, Waypoint};
pub use session::EgmSession;
pub use state::{JointSnapshot, JointStateReader, JointStateStore};
pub use transport::{Transport, UdpTransport};

/// Unified entry point for EGM sessions.
///
/// # Examples
///
/// ## Default RobotStudio setup
/// ```rust,no_run
/// use egm_bridge::{Egm, EgmConfig};
///
/// #[tokio::main]
/// async fn main() -> egm_bridge::Result<()> {
///     let mut session = Egm::connect(EgmConfig::default()).await?;
///     session.shutdown().await;
///     Ok(())
/// }
/// ```
///
/// ## From a configuration file
/// ```rust,no_run
/// use egm_bridge::Egm;
///
/// #[tokio::main]
/// async fn main() -> egm_bridge::Result<()> {
///     let session = Egm::open("egm.yaml").await?;
///     println!("{}", session.status_text());
///     Ok(())
/// }
/// ```
pub struct Egm;

impl Egm {
    /// Bind the local EGM endpoint and start receiving controller feedback.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another socket already holds the local address
    /// - The address cannot be bound on this host
    pub async fn connect(config: EgmConfig) -> Result<EgmSession> {
        EgmSession::initialize(config).await
    }

    /// Load a YAML configuration file and connect with it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or is not valid configuration
    /// - Binding the configured address fails
    pub async fn open<P: AsRef<std::path::Path>>(path: P) -> Result<EgmSession> {
        let config = EgmConfig::load(path)?;
        EgmSession::initialize(config).await
    }
}
