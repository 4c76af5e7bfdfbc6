//! IO task types and implementation.
//!
//! A single spawned task owns the transport exclusively. Outbound frames
//! arrive over a command channel; inbound bytes are framed and handed to
//! the dispatch path, which updates the slot cache, resolves pending
//! gates and fans events out to subscribers. LocoNet is a broadcast bus,
//! so unlike a request/reply wire there is no pairing at this layer --
//! every send is fire-and-forget and every receive goes through dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use locolib_core::{Error, Result, Transport};

use crate::builder::FramingMode;
use crate::checksum;
use crate::framer::Framer;
use crate::station::StationState;

/// Configuration for the IO task.
pub(crate) struct IoConfig {
    pub framing: FramingMode,
    /// Setting this to `false` admits checksum-damaged frames, useful
    /// when eavesdropping on a marginal bus.
    pub validate_checksum: bool,
}

/// A request sent from station methods to the IO task.
pub(crate) enum Request {
    /// Transmit one complete frame.
    Send {
        frame: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Graceful shutdown; returns the transport for test recovery.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Handle to the IO task. Stored inside `LocoNetStation`.
pub(crate) struct StationIo {
    pub cmd_tx: mpsc::Sender<Request>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl StationIo {
    /// Transmit a frame and wait for the transport-level result.
    pub async fn send(&self, frame: Vec<u8>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Send {
                frame,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        // Safety-net timeout; the transport enforces its own deadline.
        match tokio::time::timeout(Duration::from_secs(2), reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Shut down the IO task and recover the transport.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await;
        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = self.task.await;
        Ok(transport)
    }
}

/// Spawn the IO task. Returns the handle for sending frames.
pub(crate) fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    state: Arc<StationState>,
) -> StationIo {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(transport, config, state, cmd_rx, cancel_clone));

    StationIo {
        cmd_tx,
        cancel,
        task,
    }
}

/// Inter-byte timeout: bytes within one frame arrive back-to-back, so a
/// gap this long means the remainder of a partial frame is never coming.
const IDLE_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Outbound frame dispatch
/// 3. Idle inbound reading
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    state: Arc<StationState>,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut framer = Framer::with_checksum_validation(config.validate_checksum);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("IO task cancelled");
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Request::Send { frame, reply }) => {
                        let result = transport.send(&frame).await;
                        let _ = reply.send(result);
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!("IO task shutdown requested");
                        state.connection_closed();
                        let _ = reply.send(transport);
                        return;
                    }
                    None => {
                        debug!("all command senders dropped, exiting IO task");
                        break;
                    }
                }
            }

            // Idle: read inbound bus traffic.
            _ = async {
                let mut buf = [0u8; 256];
                match transport.receive(&mut buf, IDLE_RECEIVE_TIMEOUT).await {
                    Ok(n) if n > 0 => match config.framing {
                        FramingMode::Stream => {
                            framer.extend(&buf[..n]);
                            drain_framer(&mut framer, &state);
                        }
                        FramingMode::Datagram => {
                            dispatch_datagram(&buf[..n], config.validate_checksum, &state);
                        }
                    },
                    Ok(_) => {}
                    Err(Error::Timeout) => {
                        framer.discard_partial();
                        // Yield briefly so the loop can check for
                        // commands or cancellation.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "transport receive failed");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            } => {}
        }
    }

    state.connection_closed();
    let _ = transport.close().await;
}

/// Dispatch every complete frame currently held by the framer. Framing
/// errors resynchronize and never take the loop down.
fn drain_framer(framer: &mut Framer, state: &StationState) {
    loop {
        match framer.next_message() {
            Ok(Some(frame)) => state.dispatch(&frame),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed inbound frame, resyncing");
                framer.resync();
            }
        }
    }
}

/// Datagram mode: each received chunk carries whole frames, so the buffer
/// is validated in place without inter-read reassembly.
fn dispatch_datagram(mut chunk: &[u8], validate_checksum: bool, state: &StationState) {
    while !chunk.is_empty() {
        let total = match checksum::frame_length(chunk) {
            Ok(Some(total)) if total <= chunk.len() => total,
            Ok(_) => {
                warn!(chunk = ?chunk, "truncated datagram, dropping");
                return;
            }
            Err(e) => {
                warn!(error = %e, "malformed datagram, dropping");
                return;
            }
        };
        let frame = &chunk[..total];
        if !validate_checksum || checksum::verify(frame) {
            state.dispatch(frame);
        } else {
            debug!(frame = ?frame, "datagram checksum mismatch, dropping");
        }
        chunk = &chunk[total..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::append_checksum;
    use crate::commands;
    use locolib_core::StationEvent;
    use locolib_core::SwitchDirection;
    use locolib_test_harness::MockTransport;
    use tokio::sync::broadcast;

    fn test_config() -> IoConfig {
        IoConfig {
            framing: FramingMode::Stream,
            validate_checksum: true,
        }
    }

    fn test_state() -> (Arc<StationState>, broadcast::Receiver<StationEvent>) {
        let (event_tx, event_rx) = broadcast::channel(16);
        (Arc::new(StationState::new(event_tx)), event_rx)
    }

    #[tokio::test]
    async fn send_delivers_frame_to_transport() {
        let mut mock = MockTransport::new();
        let frame = commands::power_on();
        mock.expect(&frame, &[]);

        let (state, _rx) = test_state();
        let io = spawn_io_task(Box::new(mock), test_config(), state);

        io.send(frame).await.unwrap();
        let _ = io.shutdown().await;
    }

    #[tokio::test]
    async fn send_after_io_task_gone_is_not_connected() {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        drop(cmd_rx);
        let io = StationIo {
            cmd_tx,
            cancel: CancellationToken::new(),
            task: tokio::spawn(async {}),
        };
        let result = io.send(commands::power_on()).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn inbound_broadcast_reaches_subscribers() {
        let mut mock = MockTransport::new();
        let frame = append_checksum(&[0xB1, 0x00, 0x31]);
        mock.inject(&frame);

        let (state, mut event_rx) = test_state();
        let io = spawn_io_task(Box::new(mock), test_config(), state);

        let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .expect("no event within deadline")
            .unwrap();
        match event {
            StationEvent::TurnoutChanged {
                address,
                direction,
                on,
            } => {
                assert_eq!(address, 129);
                assert_eq!(direction, SwitchDirection::Closed);
                assert!(on);
            }
            other => panic!("expected TurnoutChanged, got {other:?}"),
        }

        let _ = io.shutdown().await;
    }

    #[tokio::test]
    async fn corrupt_inbound_frame_does_not_kill_the_loop() {
        let mut mock = MockTransport::new();
        let mut bad = append_checksum(&[0xB1, 0x00, 0x31]);
        *bad.last_mut().unwrap() ^= 0x01;
        let good = append_checksum(&[0xB2, 0x05, 0x10]);
        mock.inject(&bad);
        mock.inject(&good);

        let (state, mut event_rx) = test_state();
        let io = spawn_io_task(Box::new(mock), test_config(), state);

        let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .expect("no event within deadline")
            .unwrap();
        assert!(matches!(
            event,
            StationEvent::SensorChanged {
                address: 11,
                active: true
            }
        ));

        let _ = io.shutdown().await;
    }

    #[tokio::test]
    async fn datagram_mode_dispatches_chunk_frames() {
        let mut mock = MockTransport::new();
        let frame = append_checksum(&[0xB2, 0x05, 0x10]);
        mock.inject(&frame);

        let (state, mut event_rx) = test_state();
        let config = IoConfig {
            framing: FramingMode::Datagram,
            validate_checksum: true,
        };
        let io = spawn_io_task(Box::new(mock), config, state);

        let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .expect("no event within deadline")
            .unwrap();
        assert!(matches!(event, StationEvent::SensorChanged { .. }));

        let _ = io.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_recovers_transport() {
        let mock = MockTransport::new();
        let (state, _rx) = test_state();
        let io = spawn_io_task(Box::new(mock), test_config(), state);

        let transport = io.shutdown().await.unwrap();
        assert!(transport.is_connected());
    }
}
