//! locolib-loconet: LocoNet protocol engine.
//!
//! LocoNet is a multi-drop serial bus: every device sees every message,
//! replies arrive as unsolicited notifications, and the first byte of each
//! frame (the only byte with its high bit set) selects both the message
//! semantics and the frame length. This crate turns that byte stream into
//! a typed, awaitable command-station API:
//!
//! - [`checksum`] / [`framer`] -- frame recovery from a noisy byte stream
//! - [`messages`] / [`lack`] / [`pxct1`] -- the message codec
//! - [`slots`] -- the locomotive slot cache
//! - [`station`] -- [`LocoNetStation`], the public façade, built via
//!   [`LocoNetBuilder`]
//!
//! # Example
//!
//! ```no_run
//! use locolib_core::{CommandStation, Direction};
//! use locolib_loconet::LocoNetBuilder;
//!
//! # async fn example(transport: Box<dyn locolib_core::Transport>) -> locolib_core::Result<()> {
//! let station = LocoNetBuilder::new().build_with_transport(transport).await?;
//! station.power_on().await?;
//! station.drive(3, 64, Direction::Forward).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod checksum;
pub mod commands;
pub mod framer;
mod gates;
mod io;
pub mod lack;
pub mod messages;
pub mod pxct1;
pub mod slots;
pub mod station;

pub use builder::{FramingMode, LocoNetBuilder};
pub use lack::LackOutcome;
pub use messages::{LocoNetMessage, ProgrammingStatus};
pub use slots::{ConsistStatus, SlotCache, SlotRecord};
pub use station::{LncvDevice, LocoNetStation};
