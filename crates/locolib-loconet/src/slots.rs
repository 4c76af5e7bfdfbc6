//! Locomotive slot records and the address-to-slot cache.
//!
//! A command station exposes locomotives through numbered refresh slots.
//! Callers think in locomotive addresses; the engine resolves them to
//! slots once (via a slot request on the bus) and caches the mapping so
//! follow-up drive commands need no round trip. The cache also folds in
//! the slot write traffic other throttles put on the bus, so its view of
//! speed, direction and functions stays current.

use std::collections::HashMap;

use locolib_core::{Direction, Error, Result, SpeedSteps};

use crate::messages::{direction_from_dirf, functions_from_dirf};

/// Consist membership of a slot, from the two link bits of the slot
/// status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistStatus {
    NotInConsist,
    /// Linked below another slot.
    SubMember,
    /// Head of a consist.
    Top,
    /// Linked both above and below.
    Mid,
}

impl ConsistStatus {
    fn from_stat(stat: u8) -> Self {
        match (stat & 0x40 != 0, stat & 0x08 != 0) {
            (false, false) => ConsistStatus::NotInConsist,
            (false, true) => ConsistStatus::SubMember,
            (true, false) => ConsistStatus::Top,
            (true, true) => ConsistStatus::Mid,
        }
    }
}

fn speed_steps_from_stat(stat: u8) -> SpeedSteps {
    match stat & 0x07 {
        0b010 => SpeedSteps::Steps14,
        0b011 => SpeedSteps::Steps128,
        0b100 => SpeedSteps::Steps28Advanced,
        0b111 => SpeedSteps::Steps128Advanced,
        _ => SpeedSteps::Steps28,
    }
}

/// Decoded contents of one slot data report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRecord {
    pub slot: u8,
    pub address: u16,
    pub speed: u8,
    pub direction: Direction,
    /// F0 through F8.
    pub functions: [bool; 9],
    pub consist: ConsistStatus,
    pub speed_steps: SpeedSteps,
    pub track_status: u8,
}

impl SlotRecord {
    /// Decode a 14-byte slot data report (0xE7), checksum included.
    pub fn decode(buf: &[u8]) -> Result<SlotRecord> {
        if buf.len() != 14 || buf[0] != 0xE7 || buf[1] != 0x0E {
            return Err(Error::Protocol(format!(
                "not a slot data report: {buf:02X?}"
            )));
        }
        let stat = buf[3];
        let dirf = buf[6];
        let snd = buf[10];
        let mut functions = [false; 9];
        functions[..5].copy_from_slice(&functions_from_dirf(dirf));
        for i in 0..4 {
            functions[5 + i] = snd & (1 << i) != 0;
        }
        Ok(SlotRecord {
            slot: buf[2],
            address: buf[4] as u16 | ((buf[9] as u16) << 7),
            speed: buf[5],
            direction: direction_from_dirf(dirf),
            functions,
            consist: ConsistStatus::from_stat(stat),
            speed_steps: speed_steps_from_stat(stat),
            track_status: buf[7],
        })
    }

    /// Fold a speed update (0xA0) into the record.
    pub fn apply_speed(&mut self, speed: u8) {
        self.speed = speed;
    }

    /// Fold a direction/F0-F4 update (0xA1) into the record.
    pub fn apply_dirf(&mut self, direction: Direction, f0_f4: [bool; 5]) {
        self.direction = direction;
        self.functions[..5].copy_from_slice(&f0_f4);
    }

    /// Fold an F5-F8 update (0xA2) into the record.
    pub fn apply_snd(&mut self, f5_f8: [bool; 4]) {
        self.functions[5..].copy_from_slice(&f5_f8);
    }
}

/// Cache of known slots, indexed both ways.
///
/// When a slot report reassigns an address already mapped elsewhere, the
/// newer report wins and the stale mapping is dropped.
#[derive(Debug, Default)]
pub struct SlotCache {
    by_slot: HashMap<u8, SlotRecord>,
    by_address: HashMap<u16, u8>,
}

impl SlotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a slot record. Address 0 marks a free slot and
    /// is never indexed.
    pub fn insert(&mut self, record: SlotRecord) {
        if let Some(old) = self.by_slot.get(&record.slot) {
            if old.address != record.address {
                self.by_address.remove(&old.address);
            }
        }
        if record.address != 0 {
            self.by_address.insert(record.address, record.slot);
        }
        self.by_slot.insert(record.slot, record);
    }

    pub fn get(&self, slot: u8) -> Option<&SlotRecord> {
        self.by_slot.get(&slot)
    }

    /// Slot currently holding the given locomotive address.
    pub fn slot_for_address(&self, address: u16) -> Option<u8> {
        self.by_address.get(&address).copied()
    }

    /// Apply an update closure to a cached slot, if present.
    pub fn update(&mut self, slot: u8, f: impl FnOnce(&mut SlotRecord)) {
        if let Some(record) = self.by_slot.get_mut(&slot) {
            f(record);
        }
    }

    /// Drop everything, e.g. after a reconnect.
    pub fn clear(&mut self) {
        self.by_slot.clear();
        self.by_address.clear();
    }

    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::append_checksum;

    fn report(slot: u8, adr: u8, adr2: u8, stat: u8, spd: u8, dirf: u8, snd: u8) -> Vec<u8> {
        append_checksum(&[
            0xE7, 0x0E, slot, stat, adr, spd, dirf, 0x07, 0x00, adr2, snd, 0x00, 0x00,
        ])
    }

    #[test]
    fn decode_full_record() {
        let record = SlotRecord::decode(&report(5, 0x23, 0x09, 0x33, 0x40, 0x32, 0x09)).unwrap();
        assert_eq!(record.slot, 5);
        assert_eq!(record.address, 1187);
        assert_eq!(record.speed, 0x40);
        assert_eq!(record.direction, Direction::Reverse);
        assert_eq!(
            record.functions,
            [true, false, true, false, false, true, false, false, true]
        );
        assert_eq!(record.speed_steps, SpeedSteps::Steps128);
        assert_eq!(record.consist, ConsistStatus::NotInConsist);
        assert_eq!(record.track_status, 0x07);
    }

    #[test]
    fn decode_rejects_other_frames() {
        assert!(SlotRecord::decode(&[0xB0, 0x00, 0x31, 0x4E]).is_err());
        assert!(SlotRecord::decode(&report(5, 0x23, 0x09, 0, 0, 0, 0)[..13]).is_err());
    }

    #[test]
    fn speed_step_variants() {
        for (stat, expected) in [
            (0b000u8, SpeedSteps::Steps28),
            (0b010, SpeedSteps::Steps14),
            (0b011, SpeedSteps::Steps128),
            (0b100, SpeedSteps::Steps28Advanced),
            (0b111, SpeedSteps::Steps128Advanced),
            (0b001, SpeedSteps::Steps28),
        ] {
            let record = SlotRecord::decode(&report(1, 3, 0, stat, 0, 0, 0)).unwrap();
            assert_eq!(record.speed_steps, expected, "stat {stat:#05b}");
        }
    }

    #[test]
    fn apply_updates() {
        let mut record = SlotRecord::decode(&report(5, 3, 0, 0, 0, 0, 0)).unwrap();
        record.apply_speed(0x20);
        assert_eq!(record.speed, 0x20);
        record.apply_dirf(Direction::Reverse, [true, false, false, false, true]);
        assert_eq!(record.direction, Direction::Reverse);
        assert!(record.functions[0]);
        assert!(record.functions[4]);
        record.apply_snd([false, true, false, false]);
        assert!(record.functions[6]);
    }

    #[test]
    fn cache_resolves_both_ways() {
        let mut cache = SlotCache::new();
        cache.insert(SlotRecord::decode(&report(5, 3, 0, 0, 0, 0, 0)).unwrap());
        assert_eq!(cache.slot_for_address(3), Some(5));
        assert_eq!(cache.get(5).unwrap().address, 3);
        assert_eq!(cache.slot_for_address(4), None);
    }

    #[test]
    fn newer_report_wins() {
        let mut cache = SlotCache::new();
        cache.insert(SlotRecord::decode(&report(5, 3, 0, 0, 0, 0, 0)).unwrap());
        // The station reassigns slot 5 to a different locomotive.
        cache.insert(SlotRecord::decode(&report(5, 7, 0, 0, 0, 0, 0)).unwrap());
        assert_eq!(cache.slot_for_address(3), None);
        assert_eq!(cache.slot_for_address(7), Some(5));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn free_slot_address_is_not_indexed() {
        let mut cache = SlotCache::new();
        cache.insert(SlotRecord::decode(&report(5, 0x00, 0x00, 0, 0, 0, 0)).unwrap());
        assert_eq!(cache.slot_for_address(0), None);
        assert!(cache.get(5).is_some());
    }

    #[test]
    fn update_folds_bus_traffic() {
        let mut cache = SlotCache::new();
        cache.insert(SlotRecord::decode(&report(5, 3, 0, 0, 0, 0, 0)).unwrap());
        cache.update(5, |r| r.apply_speed(0x55));
        assert_eq!(cache.get(5).unwrap().speed, 0x55);
        // Unknown slots are ignored.
        cache.update(9, |r| r.apply_speed(0x10));
        assert!(cache.get(9).is_none());
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = SlotCache::new();
        cache.insert(SlotRecord::decode(&report(5, 3, 0, 0, 0, 0, 0)).unwrap());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.slot_for_address(3), None);
    }
}
