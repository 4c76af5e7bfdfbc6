//! The LocoNet command station: dispatch path and public operations.
//!
//! `StationState` is the shared heart of the engine. The IO task feeds it
//! every inbound frame via [`StationState::dispatch`]; public operations
//! on [`LocoNetStation`] register with the per-class gates and wait for
//! dispatch to resolve them. Unsolicited traffic updates the slot cache
//! and fans out as [`StationEvent`]s.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use locolib_core::{
    CommandStation, Direction, Error, Result, StationEvent, StationInfo, SwitchDirection,
    Transport,
};

use crate::builder::Timeouts;
use crate::commands;
use crate::gates::{DiscoveryGate, ResponseGate};
use crate::io::StationIo;
use crate::lack::{lack_outcome, LackOutcome};
use crate::messages::{LocoNetMessage, ProgrammingStatus};
use crate::slots::{SlotCache, SlotRecord};

/// An LNCV-capable module that answered a discovery broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LncvDevice {
    pub article: u16,
    pub module_address: u16,
}

/// Replies routed through the LNCV gate.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LncvReply {
    SessionAck { article: u16, module_address: u16 },
    ReadReply { article: u16, cv: u16, value: u16 },
    WriteAck,
}

/// Shared state between the IO task and station methods.
pub(crate) struct StationState {
    slots: StdMutex<SlotCache>,
    slot_gate: ResponseGate<u16, SlotRecord>,
    cv_gate: ResponseGate<(), (ProgrammingStatus, u8)>,
    lncv_gate: ResponseGate<(), LncvReply>,
    discovery: DiscoveryGate<LncvDevice>,
    event_tx: broadcast::Sender<StationEvent>,
}

impl StationState {
    pub(crate) fn new(event_tx: broadcast::Sender<StationEvent>) -> Self {
        StationState {
            slots: StdMutex::new(SlotCache::new()),
            slot_gate: ResponseGate::new(),
            cv_gate: ResponseGate::new(),
            lncv_gate: ResponseGate::new(),
            discovery: DiscoveryGate::new(),
            event_tx,
        }
    }

    fn emit(&self, event: StationEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn connection_closed(&self) {
        self.emit(StationEvent::Disconnected);
    }

    /// Process one validated inbound frame: update the cache, resolve
    /// pending gates, emit events. Never fails -- undecodable traffic is
    /// surfaced as [`StationEvent::UnsupportedMessage`] or logged.
    pub(crate) fn dispatch(&self, frame: &[u8]) {
        let msg = match LocoNetMessage::decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, frame = ?frame, "dropping undecodable frame");
                return;
            }
        };
        trace!(?msg, "dispatch");

        match msg {
            LocoNetMessage::PowerOn => self.emit(StationEvent::PowerChanged { on: true }),
            LocoNetMessage::PowerOff => self.emit(StationEvent::PowerChanged { on: false }),
            LocoNetMessage::ForceIdle => {
                debug!("force idle broadcast");
            }
            LocoNetMessage::LocoSpeed { slot, speed } => {
                self.slot_updated(slot, |r| r.apply_speed(speed));
            }
            LocoNetMessage::LocoDirFun {
                slot,
                direction,
                f0_f4,
            } => {
                self.slot_updated(slot, |r| r.apply_dirf(direction, f0_f4));
            }
            LocoNetMessage::LocoSound { slot, f5_f8 } => {
                self.slot_updated(slot, |r| r.apply_snd(f5_f8));
            }
            LocoNetMessage::SwitchRequest {
                address,
                direction,
                on,
            }
            | LocoNetMessage::SwitchReport {
                address,
                direction,
                on,
            } => {
                self.emit(StationEvent::TurnoutChanged {
                    address,
                    direction,
                    on,
                });
            }
            LocoNetMessage::SensorReport { address, active } => {
                self.emit(StationEvent::SensorChanged { address, active });
            }
            LocoNetMessage::LongAck { opcode, code } => self.handle_lack(opcode, code),
            LocoNetMessage::Transponder {
                zone,
                address,
                present,
            } => {
                self.emit(StationEvent::TransponderChanged {
                    zone,
                    address,
                    present,
                });
            }
            LocoNetMessage::LissyReport {
                unit,
                address,
                direction,
            } => {
                self.emit(StationEvent::LissyReport {
                    unit,
                    address,
                    direction,
                });
            }
            LocoNetMessage::SlotData(record) => {
                {
                    let mut slots = match self.slots.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    slots.insert(record.clone());
                }
                self.slot_gate.fulfill(&record.address, record.clone());
                self.emit(locomotive_event(&record));
            }
            LocoNetMessage::ProgrammingResult { status, value, .. } => {
                self.cv_gate.fulfill(&(), (status, value));
            }
            LocoNetMessage::LncvSessionAck {
                article,
                module_address,
            } => {
                // A broadcast discovery and a targeted session-open get
                // the same reply shape; offer it to both gates, each is a
                // no-op when idle.
                self.discovery.offer(LncvDevice {
                    article,
                    module_address,
                });
                self.lncv_gate.fulfill(
                    &(),
                    LncvReply::SessionAck {
                        article,
                        module_address,
                    },
                );
                self.emit(StationEvent::LncvDeviceFound {
                    article,
                    module_address,
                });
            }
            LocoNetMessage::LncvReadReply { article, cv, value } => {
                self.lncv_gate
                    .fulfill(&(), LncvReply::ReadReply { article, cv, value });
            }
            // Requests from other bus masters: nothing for us to do.
            LocoNetMessage::SlotMove { .. }
            | LocoNetMessage::SlotDataRequest { .. }
            | LocoNetMessage::SwitchStateRequest { .. }
            | LocoNetMessage::LocoAddressRequest { .. }
            | LocoNetMessage::LncvRequest { .. }
            | LocoNetMessage::WriteSlotData { .. } => {
                trace!("ignoring other master's request");
            }
            LocoNetMessage::Unsupported { raw } => {
                self.emit(StationEvent::UnsupportedMessage { raw });
            }
        }
    }

    /// Fold a slot write from the bus into the cache, then re-emit the
    /// slot's state if known.
    fn slot_updated(&self, slot: u8, f: impl FnOnce(&mut SlotRecord)) {
        let record = {
            let mut slots = match self.slots.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            slots.update(slot, f);
            slots.get(slot).cloned()
        };
        match record {
            Some(record) => self.emit(locomotive_event(&record)),
            None => debug!(slot, "update for unknown slot"),
        }
    }

    fn handle_lack(&self, opcode: u8, code: u8) {
        match lack_outcome(opcode, code) {
            LackOutcome::Success => match opcode {
                // Blind programming ack: no readback will follow.
                0xEF if code == 0x40 => {
                    self.cv_gate.fulfill(&(), (ProgrammingStatus::Success, 0));
                }
                0xED => {
                    self.lncv_gate.fulfill(&(), LncvReply::WriteAck);
                }
                _ => {}
            },
            LackOutcome::Failure(err) => match opcode {
                0xBF | 0xBA => {
                    self.slot_gate
                        .reject_pending(|address| Error::NoSlot(*address));
                }
                0xEF => {
                    self.cv_gate.reject(&(), err);
                }
                0xED => {
                    self.lncv_gate.reject(&(), err);
                }
                _ => debug!(opcode, code, "unroutable LACK failure"),
            },
            LackOutcome::Undecided => {
                trace!(opcode, code, "LACK does not settle anything");
            }
        }
    }
}

fn locomotive_event(record: &SlotRecord) -> StationEvent {
    StationEvent::LocomotiveChanged {
        address: record.address,
        speed: record.speed,
        direction: record.direction,
        functions: record.functions,
    }
}

/// A connected LocoNet command station.
///
/// All control flows through one IO task that owns the transport; the
/// station handle itself is cheap to share behind an `Arc`. Dropping the
/// station cancels the IO task.
pub struct LocoNetStation {
    info: StationInfo,
    timeouts: Timeouts,
    state: Arc<StationState>,
    io: Option<StationIo>,
}

impl LocoNetStation {
    pub(crate) fn new(
        info: StationInfo,
        timeouts: Timeouts,
        state: Arc<StationState>,
        io: StationIo,
    ) -> Self {
        LocoNetStation {
            info,
            timeouts,
            state,
            io: Some(io),
        }
    }

    fn io(&self) -> Result<&StationIo> {
        self.io.as_ref().ok_or(Error::NotConnected)
    }

    async fn send(&self, frame: Vec<u8>) -> Result<()> {
        self.io()?.send(frame).await
    }

    /// Resolve a locomotive address to its refresh slot, asking the
    /// station if the cache has no answer. Timeout and station denial
    /// both surface as [`Error::NoSlot`].
    async fn resolve_slot(&self, address: u16) -> Result<u8> {
        {
            let slots = self
                .state
                .slots
                .lock()
                .map_err(|_| Error::Protocol("slot cache poisoned".into()))?;
            if let Some(slot) = slots.slot_for_address(address) {
                return Ok(slot);
            }
        }

        let io = self.io()?;
        let request = commands::loco_address_request(address)?;
        let record = self
            .state
            .slot_gate
            .request(address, self.timeouts.slot, &io.cancel, io.send(request))
            .await
            .map_err(|e| match e {
                Error::Timeout => Error::NoSlot(address),
                other => other,
            })?;
        Ok(record.slot)
    }

    /// Cached function states for a slot, defaulting to all-off.
    fn cached_functions(&self, slot: u8) -> [bool; 9] {
        self.state
            .slots
            .lock()
            .ok()
            .and_then(|slots| slots.get(slot).map(|r| r.functions))
            .unwrap_or([false; 9])
    }

    fn cache_update(&self, slot: u8, f: impl FnOnce(&mut SlotRecord)) {
        if let Ok(mut slots) = self.state.slots.lock() {
            slots.update(slot, f);
        }
    }

    /// Shut down the IO task and recover the transport.
    pub async fn shutdown(mut self) -> Result<Box<dyn Transport>> {
        let io = self.io.take().ok_or(Error::NotConnected)?;
        io.shutdown().await
    }

    /// Open an LNCV programming session on a module; returns the module
    /// address the device confirmed.
    pub async fn start_lncv_session(&self, article: u16, module_address: u16) -> Result<u16> {
        let io = self.io()?;
        let frame = commands::lncv_session_start(article, module_address);
        let reply = self
            .state
            .lncv_gate
            .request((), self.timeouts.lncv, &io.cancel, io.send(frame))
            .await?;
        match reply {
            LncvReply::SessionAck { module_address, .. } => Ok(module_address),
            other => Err(Error::Protocol(format!(
                "unexpected LNCV reply to session open: {other:?}"
            ))),
        }
    }

    /// Close an LNCV programming session. The module does not reply.
    pub async fn end_lncv_session(&self, article: u16, module_address: u16) -> Result<()> {
        self.send(commands::lncv_session_end(article, module_address))
            .await
    }

    /// Read one LNCV within an open session.
    pub async fn read_lncv(&self, article: u16, cv: u16) -> Result<u16> {
        let io = self.io()?;
        let frame = commands::lncv_read(article, cv);
        let reply = self
            .state
            .lncv_gate
            .request((), self.timeouts.lncv, &io.cancel, io.send(frame))
            .await?;
        match reply {
            LncvReply::ReadReply { value, .. } => Ok(value),
            other => Err(Error::Protocol(format!(
                "unexpected LNCV reply to read: {other:?}"
            ))),
        }
    }

    /// Write one LNCV within an open session; waits for the module's
    /// acknowledge.
    pub async fn write_lncv(&self, article: u16, cv: u16, value: u16) -> Result<()> {
        let io = self.io()?;
        let frame = commands::lncv_write(article, cv, value);
        let reply = self
            .state
            .lncv_gate
            .request((), self.timeouts.lncv, &io.cancel, io.send(frame))
            .await?;
        match reply {
            LncvReply::WriteAck => Ok(()),
            other => Err(Error::Protocol(format!(
                "unexpected LNCV reply to write: {other:?}"
            ))),
        }
    }

    /// Broadcast a discovery request and collect every module that
    /// answers within the discovery window.
    pub async fn discover_lncv_modules(&self) -> Result<Vec<LncvDevice>> {
        let io = self.io()?;
        let frame = commands::lncv_discovery();
        self.state
            .discovery
            .collect(self.timeouts.discovery_window, &io.cancel, io.send(frame))
            .await
    }
}

#[async_trait]
impl CommandStation for LocoNetStation {
    fn info(&self) -> &StationInfo {
        &self.info
    }

    async fn power_on(&self) -> Result<()> {
        self.send(commands::power_on()).await
    }

    async fn power_off(&self) -> Result<()> {
        self.send(commands::power_off()).await
    }

    async fn drive(&self, address: u16, speed: u8, direction: Direction) -> Result<()> {
        let slot = self.resolve_slot(address).await?;
        let functions = self.cached_functions(slot);
        let mut f0_f4 = [false; 5];
        f0_f4.copy_from_slice(&functions[..5]);

        self.send(commands::loco_dir_fun(slot, direction, f0_f4)?)
            .await?;
        self.send(commands::loco_speed(slot, speed)?).await?;

        self.cache_update(slot, |r| {
            r.apply_dirf(direction, f0_f4);
            r.apply_speed(speed);
        });
        Ok(())
    }

    async fn emergency_stop(&self, address: u16) -> Result<()> {
        let slot = self.resolve_slot(address).await?;
        // Speed step 1 is the emergency-stop code.
        self.send(commands::loco_speed(slot, 0x01)?).await?;
        self.cache_update(slot, |r| r.apply_speed(0x01));
        Ok(())
    }

    async fn set_function(&self, address: u16, function: u8, on: bool) -> Result<()> {
        if function > 8 {
            return Err(Error::InvalidParameter(format!(
                "function F{function} not addressable over a slot write"
            )));
        }
        let slot = self.resolve_slot(address).await?;
        let mut functions = self.cached_functions(slot);
        functions[function as usize] = on;

        let frame = if function < 5 {
            let direction = self
                .state
                .slots
                .lock()
                .ok()
                .and_then(|slots| slots.get(slot).map(|r| r.direction))
                .unwrap_or(Direction::Forward);
            let mut f0_f4 = [false; 5];
            f0_f4.copy_from_slice(&functions[..5]);
            commands::loco_dir_fun(slot, direction, f0_f4)?
        } else {
            let mut f5_f8 = [false; 4];
            f5_f8.copy_from_slice(&functions[5..]);
            commands::loco_sound(slot, f5_f8)?
        };
        self.send(frame).await?;

        self.cache_update(slot, |r| r.functions[function as usize] = on);
        Ok(())
    }

    async fn set_turnout(&self, address: u16, direction: SwitchDirection, on: bool) -> Result<()> {
        self.send(commands::switch_request(address, direction, on)?)
            .await
    }

    async fn request_turnout_state(&self, address: u16) -> Result<()> {
        self.send(commands::switch_state_request(address)?).await
    }

    async fn read_cv(&self, cv: u16) -> Result<u8> {
        let io = self.io()?;
        let frame = commands::cv_read(cv)?;
        let (status, value) = self
            .state
            .cv_gate
            .request((), self.timeouts.programming, &io.cancel, io.send(frame))
            .await?;
        match status {
            ProgrammingStatus::Success => Ok(value),
            other => Err(Error::Protocol(format!("CV {cv} read failed: {other:?}"))),
        }
    }

    async fn write_cv(&self, cv: u16, value: u8) -> Result<()> {
        let io = self.io()?;
        let frame = commands::cv_write(cv, value)?;
        let (status, _) = self
            .state
            .cv_gate
            .request((), self.timeouts.programming, &io.cancel, io.send(frame))
            .await?;
        match status {
            ProgrammingStatus::Success => Ok(()),
            other => Err(Error::Protocol(format!("CV {cv} write failed: {other:?}"))),
        }
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<StationEvent>> {
        Ok(self.state.event_tx.subscribe())
    }
}

impl Drop for LocoNetStation {
    fn drop(&mut self) {
        if let Some(io) = self.io.take() {
            io.cancel.cancel();
            io.task.abort();
        }
    }
}
