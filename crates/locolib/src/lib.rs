//! # locolib -- Async Model Railway Control
//!
//! `locolib` is an asynchronous Rust library for driving digital model
//! railway layouts through a command station. It targets throttle
//! applications, layout automation, and control panels that need
//! low-latency locomotive control plus real-time feedback from the track
//! (occupancy sensors, turnout feedback, transponding).
//!
//! ## Quick Start
//!
//! Add `locolib` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! locolib = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to a command station and run a locomotive:
//!
//! ```no_run
//! use locolib::{CommandStation, Direction};
//! use locolib::loconet::LocoNetBuilder;
//!
//! # async fn example(transport: Box<dyn locolib::Transport>) -> locolib::Result<()> {
//! let station = LocoNetBuilder::new()
//!     .description("layout bus")
//!     .build_with_transport(transport)
//!     .await?;
//!
//! station.power_on().await?;
//! station.drive(3, 64, Direction::Forward).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                         |
//! |------------------------|-------------------------------------------------|
//! | `locolib-core`         | Traits ([`CommandStation`], [`Transport`]), types, errors |
//! | `locolib-loconet`      | LocoNet protocol engine: framer, codec, slot core |
//! | `locolib-test-harness` | Mock transport for deterministic tests          |
//! | **`locolib`**          | This facade crate -- re-exports everything      |
//!
//! Station drivers implement the [`CommandStation`] trait, so application
//! code can work with `dyn CommandStation` and remain bus-agnostic.
//!
//! ## The `CommandStation` Trait
//!
//! The [`CommandStation`] trait is the central abstraction. It provides
//! async methods for the common layout operations:
//!
//! - **Power**: [`power_on`](CommandStation::power_on), [`power_off`](CommandStation::power_off)
//! - **Driving**: [`drive`](CommandStation::drive), [`emergency_stop`](CommandStation::emergency_stop), [`set_function`](CommandStation::set_function)
//! - **Accessories**: [`set_turnout`](CommandStation::set_turnout), [`request_turnout_state`](CommandStation::request_turnout_state)
//! - **Decoder programming**: [`read_cv`](CommandStation::read_cv), [`write_cv`](CommandStation::write_cv)
//! - **Events**: [`subscribe`](CommandStation::subscribe) for feedback without polling
//!
//! ## Event Subscription
//!
//! Stations emit [`StationEvent`]s through a broadcast channel. Subscribe
//! to receive locomotive updates, turnout feedback, sensor and
//! transponder reports:
//!
//! ```no_run
//! use locolib::{CommandStation, StationEvent};
//! # async fn example(station: &dyn CommandStation) -> locolib::Result<()> {
//! let mut events = station.subscribe()?;
//! loop {
//!     match events.recv().await {
//!         Ok(StationEvent::SensorChanged { address, active }) => {
//!             println!("sensor {address}: {active}");
//!         }
//!         Ok(event) => println!("{event:?}"),
//!         Err(_) => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub use locolib_core::*;

/// LocoNet protocol backend.
///
/// Provides [`LocoNetStation`](loconet::LocoNetStation) and
/// [`LocoNetBuilder`](loconet::LocoNetBuilder) for driving a layout over
/// the LocoNet multi-master bus, including slot management, CV and LNCV
/// programming, and module discovery.
#[cfg(feature = "loconet")]
pub mod loconet {
    pub use locolib_loconet::*;
}
