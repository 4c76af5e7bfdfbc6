//! locolib-test-harness: deterministic transports for protocol testing.
//!
//! Provides [`MockTransport`], an in-memory [`Transport`](locolib_core::Transport)
//! implementation with pre-loaded request/response expectations and
//! unsolicited-byte injection, so protocol engines can be exercised
//! without real hardware on the bus.

mod mock_transport;

pub use mock_transport::MockTransport;
