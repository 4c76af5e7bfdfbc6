//! Transport trait for command-station communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a command
//! station. Real implementations (serial port, TCP, UDP/multicast) live
//! outside this workspace; the protocol engines here only consume the
//! trait, which also enables deterministic unit testing with
//! `MockTransport` from the `locolib-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a command station.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Protocol-level concerns (LocoNet framing, opcode dispatch) are
/// handled by the protocol engines that consume this trait.
///
/// Serial-backed transports deliver a raw byte stream that the protocol
/// engine must frame itself; IP-backed transports deliver already-framed
/// datagrams, one message per `receive` call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the command station.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying transport (serial TX buffer, socket, etc.).
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the command station into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if no data is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
