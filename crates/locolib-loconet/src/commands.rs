//! Command frame builders.
//!
//! Each function produces a complete frame, checksum included, ready to
//! hand to the transport. Argument validation happens here so the IO
//! layer only ever sees well-formed frames.

use bytes::{BufMut, BytesMut};

use locolib_core::{Direction, Error, Result, SwitchDirection};

use crate::checksum::checksum;
use crate::messages::{LNCV_DESTINATION, PROGRAMMER_SLOT};
use crate::pxct1;

/// Highest accessory (switch/turnout) address: 11 wire bits, 1-based.
pub const MAX_SWITCH_ADDRESS: u16 = 2048;
/// Highest locomotive address: 14 wire bits.
pub const MAX_LOCO_ADDRESS: u16 = 0x3FFF;
/// Highest CV number reachable through the programmer slot (10 wire bits,
/// 1-based).
pub const MAX_CV: u16 = 1024;

fn finish(mut frame: BytesMut) -> Vec<u8> {
    let ck = checksum(&frame);
    frame.put_u8(ck);
    frame.to_vec()
}

pub fn power_on() -> Vec<u8> {
    let mut f = BytesMut::with_capacity(2);
    f.put_u8(0x83);
    finish(f)
}

pub fn power_off() -> Vec<u8> {
    let mut f = BytesMut::with_capacity(2);
    f.put_u8(0x82);
    finish(f)
}

/// Broadcast force-idle: emergency-stops every locomotive without
/// cutting track power.
pub fn force_idle() -> Vec<u8> {
    let mut f = BytesMut::with_capacity(2);
    f.put_u8(0x85);
    finish(f)
}

pub fn loco_speed(slot: u8, speed: u8) -> Result<Vec<u8>> {
    check_slot(slot)?;
    if speed > 0x7F {
        return Err(Error::InvalidParameter(format!("speed {speed} exceeds 127")));
    }
    let mut f = BytesMut::with_capacity(4);
    f.put_u8(0xA0);
    f.put_u8(slot);
    f.put_u8(speed);
    Ok(finish(f))
}

pub fn loco_dir_fun(slot: u8, direction: Direction, f0_f4: [bool; 5]) -> Result<Vec<u8>> {
    check_slot(slot)?;
    let mut dirf = 0u8;
    if direction == Direction::Reverse {
        dirf |= 0x20;
    }
    if f0_f4[0] {
        dirf |= 0x10;
    }
    for (i, on) in f0_f4[1..].iter().enumerate() {
        if *on {
            dirf |= 1 << i;
        }
    }
    let mut f = BytesMut::with_capacity(4);
    f.put_u8(0xA1);
    f.put_u8(slot);
    f.put_u8(dirf);
    Ok(finish(f))
}

pub fn loco_sound(slot: u8, f5_f8: [bool; 4]) -> Result<Vec<u8>> {
    check_slot(slot)?;
    let mut snd = 0u8;
    for (i, on) in f5_f8.iter().enumerate() {
        if *on {
            snd |= 1 << i;
        }
    }
    let mut f = BytesMut::with_capacity(4);
    f.put_u8(0xA2);
    f.put_u8(slot);
    f.put_u8(snd);
    Ok(finish(f))
}

pub fn switch_request(address: u16, direction: SwitchDirection, on: bool) -> Result<Vec<u8>> {
    let (sw1, sw2) = encode_switch_args(address, direction, on)?;
    let mut f = BytesMut::with_capacity(4);
    f.put_u8(0xB0);
    f.put_u8(sw1);
    f.put_u8(sw2);
    Ok(finish(f))
}

pub fn switch_state_request(address: u16) -> Result<Vec<u8>> {
    let (sw1, sw2) = encode_switch_args(address, SwitchDirection::Thrown, false)?;
    let mut f = BytesMut::with_capacity(4);
    f.put_u8(0xBC);
    f.put_u8(sw1);
    f.put_u8(sw2);
    Ok(finish(f))
}

pub fn slot_data_request(slot: u8) -> Result<Vec<u8>> {
    check_slot(slot)?;
    let mut f = BytesMut::with_capacity(4);
    f.put_u8(0xBB);
    f.put_u8(slot);
    f.put_u8(0x00);
    Ok(finish(f))
}

pub fn slot_move(from: u8, to: u8) -> Result<Vec<u8>> {
    check_slot(from)?;
    check_slot(to)?;
    let mut f = BytesMut::with_capacity(4);
    f.put_u8(0xBA);
    f.put_u8(from);
    f.put_u8(to);
    Ok(finish(f))
}

pub fn loco_address_request(address: u16) -> Result<Vec<u8>> {
    if address == 0 || address > MAX_LOCO_ADDRESS {
        return Err(Error::InvalidParameter(format!(
            "locomotive address {address} out of range 1..={MAX_LOCO_ADDRESS}"
        )));
    }
    let mut f = BytesMut::with_capacity(4);
    f.put_u8(0xBF);
    f.put_u8((address >> 7) as u8);
    f.put_u8((address & 0x7F) as u8);
    Ok(finish(f))
}

/// Byte-direct read of a CV on the programming track. `cv` is 1-based.
pub fn cv_read(cv: u16) -> Result<Vec<u8>> {
    programmer_frame(0x28, cv, 0)
}

/// Byte-direct write of a CV on the programming track. `cv` is 1-based.
pub fn cv_write(cv: u16, value: u8) -> Result<Vec<u8>> {
    programmer_frame(0x68, cv, value)
}

fn programmer_frame(pcmd: u8, cv: u16, value: u8) -> Result<Vec<u8>> {
    if cv == 0 || cv > MAX_CV {
        return Err(Error::InvalidParameter(format!(
            "CV {cv} out of range 1..={MAX_CV}"
        )));
    }
    let wire_cv = cv - 1;
    let cvl = (wire_cv & 0x7F) as u8;
    let cvh = ((wire_cv >> 4) & 0x30) as u8
        | ((wire_cv >> 7) & 0x01) as u8
        | ((value >> 6) & 0x02);
    let mut f = BytesMut::with_capacity(14);
    f.put_u8(0xEF);
    f.put_u8(0x0E);
    f.put_u8(PROGRAMMER_SLOT);
    f.put_u8(pcmd);
    f.put_u8(0x00); // pstat
    f.put_u8(0x00); // hopsa
    f.put_u8(0x00); // lopsa
    f.put_u8(0x00); // trk
    f.put_u8(cvh);
    f.put_u8(cvl);
    f.put_u8(value & 0x7F);
    f.put_u8(0x00);
    f.put_u8(0x00);
    Ok(finish(f))
}

/// LNCV command-data flag: open a programming session.
pub const LNCV_FLAG_PRON: u8 = 0x80;
/// LNCV command-data flag: close a programming session.
pub const LNCV_FLAG_PROFF: u8 = 0x40;
/// Broadcast article/module wildcard used for device discovery.
pub const LNCV_BROADCAST: u16 = 0xFFFF;

/// Generic LNCV request frame with PXCT1 packing of the 7 data bytes.
pub fn lncv_request(command: u8, article: u16, cv: u16, value: u16, flags: u8) -> Vec<u8> {
    let mut data = [
        (article & 0xFF) as u8,
        (article >> 8) as u8,
        (cv & 0xFF) as u8,
        (cv >> 8) as u8,
        (value & 0xFF) as u8,
        (value >> 8) as u8,
        flags,
    ];
    let control = pxct1::encode(&mut data);
    let mut f = BytesMut::with_capacity(15);
    f.put_u8(0xED);
    f.put_u8(0x0F);
    f.put_slice(&LNCV_DESTINATION);
    f.put_u8(command);
    f.put_u8(control);
    f.put_slice(&data);
    finish(f)
}

/// Open an LNCV programming session on a specific module.
pub fn lncv_session_start(article: u16, module_address: u16) -> Vec<u8> {
    lncv_request(0x21, article, 0, module_address, LNCV_FLAG_PRON)
}

/// Close a previously opened LNCV programming session.
pub fn lncv_session_end(article: u16, module_address: u16) -> Vec<u8> {
    lncv_request(0x21, article, 0, module_address, LNCV_FLAG_PROFF)
}

/// Read one LNCV within an open session.
pub fn lncv_read(article: u16, cv: u16) -> Vec<u8> {
    lncv_request(0x21, article, cv, 0, 0)
}

/// Write one LNCV within an open session.
pub fn lncv_write(article: u16, cv: u16, value: u16) -> Vec<u8> {
    lncv_request(0x20, article, cv, value, 0)
}

/// Broadcast session-open that every LNCV-capable module answers.
pub fn lncv_discovery() -> Vec<u8> {
    lncv_request(0x21, LNCV_BROADCAST, 0, LNCV_BROADCAST, LNCV_FLAG_PRON)
}

fn check_slot(slot: u8) -> Result<()> {
    if slot > 0x7F {
        return Err(Error::InvalidParameter(format!("slot {slot} exceeds 127")));
    }
    Ok(())
}

fn encode_switch_args(address: u16, direction: SwitchDirection, on: bool) -> Result<(u8, u8)> {
    if address == 0 || address > MAX_SWITCH_ADDRESS {
        return Err(Error::InvalidParameter(format!(
            "switch address {address} out of range 1..={MAX_SWITCH_ADDRESS}"
        )));
    }
    let wire = address - 1;
    let sw1 = (wire & 0x7F) as u8;
    let mut sw2 = ((wire >> 7) & 0x0F) as u8;
    if on {
        sw2 |= 0x10;
    }
    if direction == SwitchDirection::Closed {
        sw2 |= 0x20;
    }
    Ok((sw1, sw2))
}
