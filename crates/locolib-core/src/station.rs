//! The `CommandStation` trait -- unified interface for all backends.
//!
//! This trait is the primary API surface of locolib. Layout controllers
//! and automation tools program against `dyn CommandStation` without
//! needing to know which wire protocol is in use.
//!
//! Each bus backend (locolib-loconet today; an XpressNet/Z21 backend would
//! follow the same pattern) provides a concrete type implementing this
//! trait. Bus-specific extensions -- such as LNCV programming on LocoNet --
//! are inherent methods on the backend type rather than trait methods.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::events::StationEvent;
use crate::types::{Direction, StationInfo, SwitchDirection};

/// Unified asynchronous interface for controlling a command station.
///
/// All methods that talk to the station are `async` because the underlying
/// transport involves serial I/O or network round-trips. Operations that
/// wait for a device reply (slot resolution, CV programming) are bounded by
/// per-class timeouts inside the backend; fire-and-forget operations return
/// as soon as the frame is handed to the transport.
///
/// # Event Subscription
///
/// Use [`subscribe()`](CommandStation::subscribe) to obtain a broadcast
/// receiver for real-time state change notifications. This is the only way
/// to observe changes made by other throttles on a shared bus.
#[async_trait]
pub trait CommandStation: Send + Sync {
    /// Return static information about the connected command station.
    fn info(&self) -> &StationInfo;

    /// Switch track power on.
    async fn power_on(&self) -> Result<()>;

    /// Switch track power off.
    async fn power_off(&self) -> Result<()>;

    /// Set the speed and direction of a locomotive.
    ///
    /// `speed` is the raw slot speed 0-127: 0 = stop, 1 = emergency stop,
    /// 2-127 = running. Function states are preserved.
    async fn drive(&self, address: u16, speed: u8, direction: Direction) -> Result<()>;

    /// Emergency-stop a single locomotive.
    async fn emergency_stop(&self, address: u16) -> Result<()>;

    /// Switch a decoder function F0-F8 on or off.
    async fn set_function(&self, address: u16, function: u8, on: bool) -> Result<()>;

    /// Set a turnout position and output state.
    ///
    /// `address` is the 1-based user address. Passing `on = true` energizes
    /// the drive output; most callers follow up with `on = false` after the
    /// turnout has moved.
    async fn set_turnout(&self, address: u16, direction: SwitchDirection, on: bool)
        -> Result<()>;

    /// Ask the command station to report the state of a turnout.
    ///
    /// The reply arrives asynchronously as a
    /// [`StationEvent::TurnoutChanged`] notification.
    async fn request_turnout_state(&self, address: u16) -> Result<()>;

    /// Read a configuration variable on the programming track.
    async fn read_cv(&self, _cv: u16) -> Result<u8> {
        Err(crate::error::Error::Unsupported(
            "CV programming not supported".into(),
        ))
    }

    /// Write a configuration variable on the programming track.
    async fn write_cv(&self, _cv: u16, _value: u8) -> Result<()> {
        Err(crate::error::Error::Unsupported(
            "CV programming not supported".into(),
        ))
    }

    /// Subscribe to real-time station events.
    ///
    /// Returns a broadcast receiver. The channel is bounded; if the
    /// consumer falls behind, older events will be dropped (lagged).
    fn subscribe(&self) -> Result<broadcast::Receiver<StationEvent>>;
}
