//! PXCT1 bit packing for 7-bit-clean payloads.
//!
//! LocoNet distinguishes opcode bytes from payload by the high bit, so a
//! payload byte may never have bit 7 set on the wire. Extended LNCV
//! messages need full 8-bit data bytes; PXCT1 is the side channel that
//! makes this work: the high bits of up to seven payload bytes are
//! collected into one control byte (bit 0 for data byte 0, bit 1 for data
//! byte 1, ...), and the payload bytes themselves are transmitted with
//! bit 7 cleared.
//!
//! [`encode`] and [`decode`] are exact inverses for every byte value.

/// Strip the high bits of up to 7 data bytes into a PXCT1 control byte.
///
/// `data` is mutated in place to be 7-bit clean; the returned control byte
/// records which bytes had bit 7 set. Inputs shorter than 7 bytes simply
/// leave the corresponding control bits unused.
///
/// # Example
///
/// ```
/// use locolib_loconet::pxct1;
///
/// let mut data = [0x85, 0x30, 0xFF, 0x00, 0x80, 0x7F, 0x01];
/// let control = pxct1::encode(&mut data);
/// assert_eq!(control, 0b0010101);
/// assert_eq!(data, [0x05, 0x30, 0x7F, 0x00, 0x00, 0x7F, 0x01]);
/// ```
pub fn encode(data: &mut [u8]) -> u8 {
    debug_assert!(data.len() <= 7);
    let mut control = 0u8;
    for (i, byte) in data.iter_mut().enumerate().take(7) {
        if *byte & 0x80 != 0 {
            *byte &= 0x7F;
            control |= 1 << i;
        }
    }
    control
}

/// Restore the high bits recorded in a PXCT1 control byte.
///
/// Inverse of [`encode`]: for every bit set in `control`, bit 7 of the
/// corresponding data byte is set.
pub fn decode(control: u8, data: &mut [u8]) {
    debug_assert!(data.len() <= 7);
    for (i, byte) in data.iter_mut().enumerate().take(7) {
        if control & (1 << i) != 0 {
            *byte |= 0x80;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        let original = [0x85, 0x30, 0xFF, 0x00, 0x80, 0x7F, 0x01];
        let mut data = original;
        let control = encode(&mut data);
        assert_eq!(control, 0b0010101);
        assert_eq!(data, [0x05, 0x30, 0x7F, 0x00, 0x00, 0x7F, 0x01]);

        decode(control, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn all_zero() {
        let mut data = [0u8; 7];
        let control = encode(&mut data);
        assert_eq!(control, 0);
        assert_eq!(data, [0u8; 7]);
        decode(control, &mut data);
        assert_eq!(data, [0u8; 7]);
    }

    #[test]
    fn all_ff() {
        let mut data = [0xFFu8; 7];
        let control = encode(&mut data);
        assert_eq!(control, 0x7F);
        assert_eq!(data, [0x7Fu8; 7]);
        decode(control, &mut data);
        assert_eq!(data, [0xFFu8; 7]);
    }

    #[test]
    fn round_trip_all_high_bit_combinations() {
        // Every pattern of bit-7 presence across the seven bytes, with a
        // varying low-7-bit payload underneath.
        for pattern in 0u8..128 {
            let mut original = [0u8; 7];
            for (i, byte) in original.iter_mut().enumerate() {
                *byte = ((pattern as usize * 31 + i * 13) % 128) as u8;
                if pattern & (1 << i) != 0 {
                    *byte |= 0x80;
                }
            }
            let mut data = original;
            let control = encode(&mut data);
            assert_eq!(control, pattern);
            assert!(data.iter().all(|b| b & 0x80 == 0));
            decode(control, &mut data);
            assert_eq!(data, original);
        }
    }

    #[test]
    fn short_input() {
        let mut data = [0x80, 0x42, 0x90];
        let control = encode(&mut data);
        assert_eq!(control, 0b101);
        assert_eq!(data, [0x00, 0x42, 0x10]);
        decode(control, &mut data);
        assert_eq!(data, [0x80, 0x42, 0x90]);
    }
}
