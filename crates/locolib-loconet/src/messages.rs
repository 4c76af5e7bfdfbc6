//! Typed decoding of LocoNet messages.
//!
//! [`LocoNetMessage::decode`] maps a validated frame (as produced by the
//! [`Framer`](crate::framer::Framer)) to a typed variant. Opcodes the
//! engine does not understand decode to [`LocoNetMessage::Unsupported`]
//! rather than an error, because a shared bus routinely carries traffic
//! from devices we don't model.

use locolib_core::{Direction, Error, Result, SwitchDirection};

use crate::checksum::frame_length;
use crate::pxct1;
use crate::slots::SlotRecord;

/// Outcome of a CV programming attempt, decoded from the programmer
/// slot's status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgrammingStatus {
    Success,
    /// No decoder detected on the programming track.
    NoDecoder,
    /// The decoder did not acknowledge the write.
    WriteFailed,
    /// The read-compare cycle failed.
    ReadFailed,
    /// The programmer aborted or is otherwise occupied.
    Busy,
}

impl ProgrammingStatus {
    fn from_pstat(pstat: u8) -> Self {
        if pstat == 0 {
            ProgrammingStatus::Success
        } else if pstat & 0x01 != 0 {
            ProgrammingStatus::NoDecoder
        } else if pstat & 0x02 != 0 {
            ProgrammingStatus::WriteFailed
        } else if pstat & 0x04 != 0 {
            ProgrammingStatus::ReadFailed
        } else {
            ProgrammingStatus::Busy
        }
    }
}

/// A decoded LocoNet message, command or notification alike.
///
/// Addresses in accessory and sensor variants are user-facing (1-based);
/// the zero-based wire encoding is handled during decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocoNetMessage {
    /// Global power on (0x83).
    PowerOn,
    /// Global power off (0x82).
    PowerOff,
    /// Force-idle / emergency stop broadcast (0x85).
    ForceIdle,
    /// Slot speed update (0xA0).
    LocoSpeed { slot: u8, speed: u8 },
    /// Slot direction + F0-F4 update (0xA1).
    LocoDirFun {
        slot: u8,
        direction: Direction,
        f0_f4: [bool; 5],
    },
    /// Slot F5-F8 update (0xA2).
    LocoSound { slot: u8, f5_f8: [bool; 4] },
    /// Switch/turnout command (0xB0).
    SwitchRequest {
        address: u16,
        direction: SwitchDirection,
        on: bool,
    },
    /// Switch/turnout feedback report (0xB1).
    SwitchReport {
        address: u16,
        direction: SwitchDirection,
        on: bool,
    },
    /// Occupancy sensor report (0xB2).
    SensorReport { address: u16, active: bool },
    /// Long acknowledge (0xB4). `opcode` is the acknowledged opcode with
    /// its high bit restored.
    LongAck { opcode: u8, code: u8 },
    /// Slot move / null move (0xBA).
    SlotMove { from: u8, to: u8 },
    /// Request slot data (0xBB).
    SlotDataRequest { slot: u8 },
    /// Request switch state (0xBC).
    SwitchStateRequest { address: u16 },
    /// Request a slot for a locomotive address (0xBF).
    LocoAddressRequest { address: u16 },
    /// Transponder enter/exit report (0xD0).
    Transponder {
        zone: u16,
        address: u16,
        present: bool,
    },
    /// Lissy infrared locomotive report (0xE4, 8 bytes).
    LissyReport {
        unit: u8,
        address: u16,
        direction: Direction,
    },
    /// LNCV session acknowledgment reply (0xE5, PRON flag set).
    LncvSessionAck { article: u16, module_address: u16 },
    /// LNCV read reply (0xE5).
    LncvReadReply { article: u16, cv: u16, value: u16 },
    /// LNCV request as seen on the bus (0xED).
    LncvRequest {
        command: u8,
        article: u16,
        cv: u16,
        value: u16,
        flags: u8,
    },
    /// Slot data report (0xE7), for a regular locomotive slot.
    SlotData(SlotRecord),
    /// Slot data report for the programmer slot (0x7C).
    ProgrammingResult {
        status: ProgrammingStatus,
        cv: u16,
        value: u8,
    },
    /// Write slot data (0xEF). Only the slot number is decoded; the engine
    /// emits these but never needs to interpret inbound ones.
    WriteSlotData { slot: u8 },
    /// A structurally valid frame this engine does not model.
    Unsupported { raw: Vec<u8> },
}

impl LocoNetMessage {
    /// Decode a complete frame (checksum byte included).
    ///
    /// Returns `Err(Protocol)` when the buffer length contradicts the
    /// opcode's length class; unknown opcodes and sub-formats yield
    /// [`LocoNetMessage::Unsupported`].
    pub fn decode(buf: &[u8]) -> Result<LocoNetMessage> {
        let expected = frame_length(buf)?.ok_or_else(|| {
            Error::Protocol(format!("truncated message: {buf:02X?}"))
        })?;
        if buf.len() != expected {
            return Err(Error::Protocol(format!(
                "message length {} does not match opcode 0x{:02X} (expected {})",
                buf.len(),
                buf[0],
                expected
            )));
        }

        let msg = match buf[0] {
            0x82 => LocoNetMessage::PowerOff,
            0x83 => LocoNetMessage::PowerOn,
            0x85 => LocoNetMessage::ForceIdle,
            0xA0 => LocoNetMessage::LocoSpeed {
                slot: buf[1],
                speed: buf[2],
            },
            0xA1 => {
                let dirf = buf[2];
                LocoNetMessage::LocoDirFun {
                    slot: buf[1],
                    direction: direction_from_dirf(dirf),
                    f0_f4: functions_from_dirf(dirf),
                }
            }
            0xA2 => {
                let snd = buf[2];
                LocoNetMessage::LocoSound {
                    slot: buf[1],
                    f5_f8: [
                        snd & 0x01 != 0,
                        snd & 0x02 != 0,
                        snd & 0x04 != 0,
                        snd & 0x08 != 0,
                    ],
                }
            }
            0xB0 | 0xB1 => {
                let (address, direction, on) = decode_switch_args(buf[1], buf[2]);
                if buf[0] == 0xB0 {
                    LocoNetMessage::SwitchRequest {
                        address,
                        direction,
                        on,
                    }
                } else {
                    LocoNetMessage::SwitchReport {
                        address,
                        direction,
                        on,
                    }
                }
            }
            0xB2 => {
                let (sw1, sw2) = (buf[1] as u16, buf[2] as u16);
                // Sensors are reported in address pairs; the select bit in
                // bit 5 picks the half.
                let address = (sw1 | ((sw2 & 0x0F) << 7)) * 2 + ((sw2 >> 5) & 1) + 1;
                LocoNetMessage::SensorReport {
                    address,
                    active: buf[2] & 0x10 != 0,
                }
            }
            0xB4 => LocoNetMessage::LongAck {
                opcode: buf[1] | 0x80,
                code: buf[2],
            },
            0xBA => LocoNetMessage::SlotMove {
                from: buf[1],
                to: buf[2],
            },
            0xBB => LocoNetMessage::SlotDataRequest { slot: buf[1] },
            0xBC => {
                let (address, _, _) = decode_switch_args(buf[1], buf[2]);
                LocoNetMessage::SwitchStateRequest { address }
            }
            0xBF => LocoNetMessage::LocoAddressRequest {
                address: ((buf[1] as u16) << 7) | buf[2] as u16,
            },
            0xD0 => match decode_multi_sense(buf) {
                Some(msg) => msg,
                None => LocoNetMessage::Unsupported { raw: buf.to_vec() },
            },
            0xE4 if buf[1] == 0x08 => LocoNetMessage::LissyReport {
                unit: buf[3],
                address: ((buf[4] as u16) << 7) | buf[5] as u16,
                direction: if buf[2] & 0x20 != 0 {
                    Direction::Reverse
                } else {
                    Direction::Forward
                },
            },
            0xE5 | 0xED => match decode_lncv(buf) {
                Some(msg) => msg,
                None => LocoNetMessage::Unsupported { raw: buf.to_vec() },
            },
            0xE7 if buf[1] == 0x0E => {
                if buf[2] == PROGRAMMER_SLOT {
                    decode_programming_result(buf)
                } else {
                    LocoNetMessage::SlotData(SlotRecord::decode(buf)?)
                }
            }
            0xEF if buf[1] == 0x0E => LocoNetMessage::WriteSlotData { slot: buf[2] },
            _ => LocoNetMessage::Unsupported { raw: buf.to_vec() },
        };
        Ok(msg)
    }
}

/// The dedicated programmer slot number.
pub const PROGRAMMER_SLOT: u8 = 0x7C;

pub(crate) fn direction_from_dirf(dirf: u8) -> Direction {
    if dirf & 0x20 != 0 {
        Direction::Reverse
    } else {
        Direction::Forward
    }
}

pub(crate) fn functions_from_dirf(dirf: u8) -> [bool; 5] {
    [
        dirf & 0x10 != 0, // F0 sits above F1-F4
        dirf & 0x01 != 0,
        dirf & 0x02 != 0,
        dirf & 0x04 != 0,
        dirf & 0x08 != 0,
    ]
}

/// Decode the two switch argument bytes to a 1-based user address,
/// direction and output state.
fn decode_switch_args(sw1: u8, sw2: u8) -> (u16, SwitchDirection, bool) {
    let address = (((sw2 as u16 & 0x0F) << 7) | sw1 as u16) + 1;
    let direction = if sw2 & 0x20 != 0 {
        SwitchDirection::Closed
    } else {
        SwitchDirection::Thrown
    };
    (address, direction, sw2 & 0x10 != 0)
}

fn decode_multi_sense(buf: &[u8]) -> Option<LocoNetMessage> {
    let present = match (buf[1] >> 5) & 0x03 {
        0b00 => false,
        0b01 => true,
        // Power-management and other multi-sense subtypes are not modeled.
        _ => return None,
    };
    let zone = ((buf[1] as u16 & 0x1F) << 7) | buf[2] as u16;
    // 0x7D in the high byte flags a short address carried whole in the
    // low byte.
    let address = if buf[3] == 0x7D {
        buf[4] as u16
    } else {
        ((buf[3] as u16) << 7) | buf[4] as u16
    };
    Some(LocoNetMessage::Transponder {
        zone,
        address,
        present,
    })
}

/// Fixed source/destination prefix that marks the LNCV sub-protocol
/// within the 0xE5/0xED opcodes.
pub(crate) const LNCV_DESTINATION: [u8; 3] = [0x01, 0x49, 0x4B];

fn decode_lncv(buf: &[u8]) -> Option<LocoNetMessage> {
    if buf[1] != 0x0F || buf[2..5] != LNCV_DESTINATION {
        return None;
    }
    let command = buf[5];
    let mut data = [0u8; 7];
    data.copy_from_slice(&buf[7..14]);
    pxct1::decode(buf[6], &mut data);

    let article = data[0] as u16 | ((data[1] as u16) << 8);
    let cv = data[2] as u16 | ((data[3] as u16) << 8);
    let value = data[4] as u16 | ((data[5] as u16) << 8);
    let flags = data[6];

    let msg = if buf[0] == 0xED {
        LocoNetMessage::LncvRequest {
            command,
            article,
            cv,
            value,
            flags,
        }
    } else if flags & 0x80 != 0 {
        // Session acknowledgment: the value field carries the module
        // address of the answering device.
        LocoNetMessage::LncvSessionAck {
            article,
            module_address: value,
        }
    } else {
        LocoNetMessage::LncvReadReply { article, cv, value }
    };
    Some(msg)
}

fn decode_programming_result(buf: &[u8]) -> LocoNetMessage {
    let pstat = buf[4];
    let cvh = buf[8];
    let cvl = buf[9];
    let data7 = buf[10];
    let cv = cvl as u16
        | ((cvh as u16 & 0x01) << 7)
        | ((cvh as u16 & 0x30) << 4);
    let value = data7 | ((cvh & 0x02) << 6);
    LocoNetMessage::ProgrammingResult {
        status: ProgrammingStatus::from_pstat(pstat),
        cv,
        value,
    }
}
