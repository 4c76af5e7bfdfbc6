//! Fluent builder for [`LocoNetStation`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use locolib_core::{ControlBus, Error, Result, StationEvent, StationInfo, Transport};

use crate::io::{spawn_io_task, IoConfig};
use crate::station::{LocoNetStation, StationState};

/// How inbound bytes map to frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingMode {
    /// A raw byte stream (serial, TCP): frames are recovered by scanning
    /// and may span reads.
    #[default]
    Stream,
    /// Each transport read delivers whole frames (UDP-style bridges).
    Datagram,
}

/// Per-class timeouts, fixed at build time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timeouts {
    pub slot: Duration,
    pub programming: Duration,
    pub lncv: Duration,
    pub discovery_window: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            slot: Duration::from_secs(3),
            programming: Duration::from_secs(5),
            lncv: Duration::from_secs(5),
            discovery_window: Duration::from_secs(3),
        }
    }
}

/// Builder for a [`LocoNetStation`].
///
/// ```no_run
/// use locolib_loconet::{FramingMode, LocoNetBuilder};
/// use std::time::Duration;
///
/// # async fn example(transport: Box<dyn locolib_core::Transport>) -> locolib_core::Result<()> {
/// let station = LocoNetBuilder::new()
///     .description("layout bus via serial bridge")
///     .framing(FramingMode::Stream)
///     .slot_timeout(Duration::from_secs(2))
///     .build_with_transport(transport)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct LocoNetBuilder {
    description: String,
    framing: FramingMode,
    validate_checksum: bool,
    timeouts: Timeouts,
    event_capacity: usize,
}

impl LocoNetBuilder {
    pub fn new() -> Self {
        LocoNetBuilder {
            description: "LocoNet command station".to_string(),
            framing: FramingMode::Stream,
            validate_checksum: true,
            timeouts: Timeouts::default(),
            event_capacity: 64,
        }
    }

    /// Human-readable description carried in [`StationInfo`].
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn framing(mut self, framing: FramingMode) -> Self {
        self.framing = framing;
        self
    }

    /// Disable checksum validation on inbound frames (diagnostic use).
    pub fn validate_checksum(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Timeout for slot lookups (default 3s).
    pub fn slot_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.slot = timeout;
        self
    }

    /// Timeout for CV programming operations (default 5s).
    pub fn programming_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.programming = timeout;
        self
    }

    /// Timeout for LNCV session/read/write operations (default 5s).
    pub fn lncv_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.lncv = timeout;
        self
    }

    /// How long a discovery broadcast collects replies (default 3s).
    pub fn discovery_window(mut self, window: Duration) -> Self {
        self.timeouts.discovery_window = window;
        self
    }

    /// Capacity of the event broadcast channel (default 64).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Spawn the IO task over an already-open transport and return the
    /// station handle.
    pub async fn build_with_transport(
        self,
        transport: Box<dyn Transport>,
    ) -> Result<LocoNetStation> {
        if !transport.is_connected() {
            return Err(Error::NotConnected);
        }

        let (event_tx, _) = broadcast::channel(self.event_capacity.max(1));
        let state = Arc::new(StationState::new(event_tx.clone()));

        let io = spawn_io_task(
            transport,
            IoConfig {
                framing: self.framing,
                validate_checksum: self.validate_checksum,
            },
            Arc::clone(&state),
        );

        let info = StationInfo {
            bus: ControlBus::LocoNet,
            description: self.description,
        };

        let _ = event_tx.send(StationEvent::Connected);

        Ok(LocoNetStation::new(info, self.timeouts, state, io))
    }
}

impl Default for LocoNetBuilder {
    fn default() -> Self {
        Self::new()
    }
}
