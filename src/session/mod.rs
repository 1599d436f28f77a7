//! Tick-driven EGM session
//!
//! An [`EgmSession`] owns the link to one controller: the transport, the
//! joint state store, the command sender, the waypoint sequencer and (in
//! background mode) the receive task. A host loop drives it:
//!
//! ```rust,no_run
//! use egm_bridge::{EgmConfig, EgmSession};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> egm_bridge::Result<()> {
//! let mut session = EgmSession::initialize(EgmConfig::default()).await?;
//! for _ in 0..600 {
//!     session.tick(Duration::from_millis(16)).await;
//!     println!("{} {:.2}", session.status_text(), session.joint_position(0));
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::command::CommandSender;
use crate::config::{EgmConfig, ReceiveMode};
use crate::driver::{Driver, DriverHandle, apply_datagram};
use crate::error::{Result, TransportError};
use crate::sequencer::{Sequencer, SequencerState, Waypoint};
use crate::state::{JointSnapshot, JointStateReader, JointStateStore};
use crate::transport::{Transport, UdpTransport};
use crate::types::{CommunicationState, JointVector, UpdateRate};


const STATUS_PREFIX: &str = "EGM State: ";

/// Link to one robot controller, driven by the host's frame loop.
pub struct EgmSession {
    config: EgmConfig,
    store: Arc<JointStateStore>,
    reader: JointStateReader,
    transport: Option<Arc<dyn Transport>>,
    sender: CommandSender,
    driver: Option<DriverHandle>,
    sequencer: Sequencer,
    last_state: CommunicationState,
}

impl EgmSession {
    /// Bind the configured local endpoint and start receiving.
    pub async fn initialize(config: EgmConfig) -> Result<Self> {
        info!(
            local_addr = %config.local_addr,
            mode = ?config.receive_mode,
            "Initializing EGM session"
        );
        let transport = bind(&config).await?;
        Ok(Self::with_transport(config, transport))
    }

    /// Build a session on an already bound transport.
    ///
    /// Must be called inside a tokio runtime when the receive mode is
    /// [`ReceiveMode::Background`].
    pub fn with_transport(config: EgmConfig, transport: Arc<dyn Transport>) -> Self {
        let store = Arc::new(JointStateStore::new());
        let reader = store.reader();
        let sequencer = Sequencer::new(config.segment_duration());
        let sender = CommandSender::new(Arc::clone(&transport));

        let mut session = Self {
            config,
            store,
            reader,
            transport: None,
            sender,
            driver: None,
            sequencer,
            last_state: CommunicationState::Undefined,
        };
        session.attach(transport);
        session
    }

    fn attach(&mut self, transport: Arc<dyn Transport>) {
        if self.config.receive_mode == ReceiveMode::Background {
            self.driver = Some(Driver::spawn(Arc::clone(&transport), Arc::clone(&self.store)));
        }
        self.sender.replace_transport(Arc::clone(&transport));
        self.transport = Some(transport);
    }

    /// One host frame: take in controller feedback, advance playback and
    /// send the resulting target. Never waits on the network when nothing
    /// is queued.
    pub async fn tick(&mut self, dt: Duration) {
        let Some(transport) = self.transport.clone() else {
            return;
        };

        let received = match self.config.receive_mode {
            ReceiveMode::Polled => {
                if transport.poll_available() {
                    match transport.receive().await {
                        Ok((bytes, _)) => {
                            apply_datagram(&self.store, &bytes);
                        }
                        Err(e) => warn!("Receive failed: {}", e),
                    }
                }
                self.store.snapshot()
            }
            // The receive task may have published several snapshots since
            // the last tick; only the latest matters here
            ReceiveMode::Background => self.reader.mark_seen(),
        };
        self.note_state(received.state);

        if let Some(target) = self.sequencer.advance(dt) {
            if let Err(e) = self.sender.send_target(&target).await {
                warn!("Failed to send playback target: {}", e);
            }
        }
    }

    fn note_state(&mut self, state: CommunicationState) {
        if state != self.last_state {
            info!(from = %self.last_state, to = %state, "EGM state changed");
            self.last_state = state;
        }
    }

    /// Stop receiving and release the socket. Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        if self.transport.is_none() {
            return;
        }
        info!("Shutting down EGM session");
        self.sequencer.stop();
        if let Some(driver) = self.driver.take() {
            let stats = driver.stop().await;
            debug!(?stats, "Receive task stopped");
        }
        self.release_transport();
    }

    /// Tear the link down and bind it again with the same configuration.
    ///
    /// Joint state and the outbound sequence counter carry over.
    pub async fn reconnect(&mut self) -> Result<()> {
        info!(local_addr = %self.config.local_addr, "Reconnecting EGM session");
        self.shutdown().await;
        let transport = bind(&self.config).await?;
        self.attach(transport);
        Ok(())
    }

    fn release_transport(&mut self) {
        self.sender.detach_transport();
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn config(&self) -> &EgmConfig {
        &self.config
    }

    /// Angle of one joint in degrees.
    ///
    /// An index outside `0..6` is logged and reads as `0.0`.
    pub fn joint_position(&self, index: usize) -> f64 {
        match self.store.joint(index) {
            Ok(angle) => angle,
            Err(e) => {
                error!("{}", e);
                0.0
            }
        }
    }

    pub fn current_state(&self) -> CommunicationState {
        self.store.current_state()
    }

    pub fn snapshot(&self) -> Arc<JointSnapshot> {
        self.store.snapshot()
    }

    /// `"EGM State: <state>"` for the latest snapshot in the store.
    pub fn status_text(&self) -> String {
        format!("{}{}", STATUS_PREFIX, self.store.current_state())
    }

    /// Handle for observers in other tasks or threads.
    pub fn reader(&self) -> JointStateReader {
        self.store.reader()
    }

    pub fn updates(
        &self,
        rate: UpdateRate,
    ) -> impl Stream<Item = Arc<JointSnapshot>> + use<> {
        self.store.reader().updates(rate)
    }

    /// Record the current joint configuration as a waypoint.
    pub fn add_waypoint(&mut self, position: Option<[f64; 3]>) {
        let (joints, _) = self.store.read();
        self.sequencer.add_waypoint(joints, position);
    }

    pub fn clear_waypoints(&mut self) {
        self.sequencer.clear();
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        self.sequencer.waypoints()
    }

    pub fn sequencer_state(&self) -> SequencerState {
        self.sequencer.state()
    }

    /// Play the recorded waypoints from the current position.
    pub fn play(&mut self) -> Result<()> {
        let (current, _) = self.store.read();
        Ok(self.sequencer.play(current)?)
    }

    /// Move smoothly to the configured home position.
    pub fn home(&mut self) {
        let (current, _) = self.store.read();
        self.sequencer.home(current, self.config.home_position);
    }

    pub fn stop(&mut self) {
        self.sequencer.stop();
    }

    /// Command a single joint, keeping the others at their current angle.
    pub async fn set_joint(&self, index: usize, angle: f64) -> Result<usize> {
        let (current, _) = self.store.read();
        self.sender.send_joint(&current, index, angle).await
    }

    pub async fn send_target(&self, joints: &JointVector) -> Result<usize> {
        Ok(self.sender.send_target(joints).await?)
    }

    pub fn export_rapid(&self) -> Result<String> {
        Ok(self.sequencer.export_rapid(&self.config.rapid_module_name)?)
    }

    pub fn export_rapid_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.sequencer.export_rapid_to_file(&self.config.rapid_module_name, path)
    }

    /// Export to the configured `export_path`.
    pub fn save_waypoints(&self) -> Result<()> {
        self.export_rapid_to_file(&self.config.export_path)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        let transport = self.transport.as_ref().ok_or(TransportError::SocketClosed)?;
        Ok(transport.local_addr()?)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.transport.as_ref().and_then(|t| t.remote())
    }
}

impl Drop for EgmSession {
    fn drop(&mut self) {
        debug!("Dropping EGM session");
        // Cancel the receive task; it drops its transport handle on exit
        if let Some(driver) = self.driver.take() {
            driver.cancel.cancel();
        }
        self.release_transport();
    }
}

async fn bind(config: &EgmConfig) -> Result<Arc<dyn Transport>> {
    let transport = UdpTransport::bind(config.local_addr, config.remote_addr).await?;
    Ok(Arc::new(transport))
}
