//! locolib-core: Core traits, types, and error definitions for locolib.
//!
//! This crate defines the bus-agnostic abstractions that all locolib
//! backends implement. Layout controllers and other applications depend on
//! these types without pulling in any specific command-station driver.
//!
//! # Key types
//!
//! - [`CommandStation`] -- the unified trait for controlling any command station
//! - [`Transport`] -- byte-level communication channel
//! - [`StationEvent`] -- asynchronous state change notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod station;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use locolib_core::*`.
pub use error::{Error, Result};
pub use events::StationEvent;
pub use station::CommandStation;
pub use transport::Transport;
pub use types::*;
