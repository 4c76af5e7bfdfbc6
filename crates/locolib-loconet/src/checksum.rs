//! LocoNet checksum and frame-length primitives.
//!
//! Every LocoNet frame ends in a checksum byte that is the bitwise
//! complement of the XOR of all preceding bytes. Consequently a complete,
//! undamaged frame XORs to `0xFF` over all of its bytes, checksum
//! included -- that is the receive-side validity test.
//!
//! Frame length is derived from bits 6-5 of the opcode byte: `00` = 2
//! bytes, `01` = 4 bytes, `10` = 6 bytes, `11` = variable, with the byte
//! following the opcode giving the total frame length (opcode, length
//! byte, and checksum included).

use locolib_core::{Error, Result};

/// Compute the checksum byte for a frame body (without checksum).
///
/// # Example
///
/// ```
/// use locolib_loconet::checksum::checksum;
///
/// // Global power on: opcode 0x83.
/// assert_eq!(checksum(&[0x83]), 0x7C);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Return a new buffer with the checksum byte appended.
pub fn append_checksum(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(bytes);
    out.push(checksum(bytes));
    out
}

/// Verify a complete frame, checksum byte included.
///
/// Returns `true` iff the XOR of all bytes equals `0xFF`.
pub fn verify(frame: &[u8]) -> bool {
    !frame.is_empty() && frame.iter().fold(0u8, |acc, b| acc ^ b) == 0xFF
}

/// Frame-length class of an opcode, from bits 6-5 of the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthClass {
    /// Total frame length is fixed: 2, 4, or 6 bytes.
    Fixed(usize),
    /// The byte following the opcode carries the total frame length.
    Variable,
}

/// Classify an opcode byte into its length class.
///
/// The caller must pass a real opcode (high bit set); bytes with the high
/// bit clear are payload and have no length class.
pub fn length_class(opcode: u8) -> Result<LengthClass> {
    if opcode & 0x80 == 0 {
        return Err(Error::Protocol(format!(
            "0x{opcode:02X} is not an opcode (high bit clear)"
        )));
    }
    Ok(match (opcode >> 5) & 0x03 {
        0b00 => LengthClass::Fixed(2),
        0b01 => LengthClass::Fixed(4),
        0b10 => LengthClass::Fixed(6),
        _ => LengthClass::Variable,
    })
}

/// Determine the total frame length for a buffer starting at an opcode.
///
/// Returns `Ok(None)` when the opcode is variable-length and the length
/// byte has not arrived yet. A declared variable length below 3 (opcode +
/// length byte + checksum) is a format violation, reported as a hard
/// protocol error -- it indicates a framing bug, not bus noise.
pub fn frame_length(buf: &[u8]) -> Result<Option<usize>> {
    let opcode = *buf
        .first()
        .ok_or_else(|| Error::Protocol("empty buffer has no frame length".into()))?;
    match length_class(opcode)? {
        LengthClass::Fixed(n) => Ok(Some(n)),
        LengthClass::Variable => match buf.get(1) {
            None => Ok(None),
            Some(&len) if (len as usize) < 3 => Err(Error::Protocol(format!(
                "variable-length frame declares illegal length {len}"
            ))),
            Some(&len) => Ok(Some(len as usize)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_power_on() {
        // !(0x83) = 0x7C
        assert_eq!(checksum(&[0x83]), 0x7C);
    }

    #[test]
    fn checksum_multi_byte() {
        // Switch request: 0xB0 0x05 0x30 -> !(0xB0 ^ 0x05 ^ 0x30) = !(0x85)
        assert_eq!(checksum(&[0xB0, 0x05, 0x30]), 0x7A);
    }

    #[test]
    fn append_and_verify_round_trip() {
        let bodies: &[&[u8]] = &[
            &[0x83],
            &[0xB0, 0x05, 0x30],
            &[0xBF, 0x00, 0x03],
            &[0xD0, 0x21, 0x10, 0x7D, 0x03],
        ];
        for body in bodies {
            let frame = append_checksum(body);
            assert!(verify(&frame), "frame {frame:02X?} should verify");
        }
    }

    #[test]
    fn verify_rejects_any_single_bit_flip() {
        let frame = append_checksum(&[0xA0, 0x05, 0x40]);
        for byte in 0..frame.len() {
            for bit in 0..8 {
                let mut damaged = frame.clone();
                damaged[byte] ^= 1 << bit;
                assert!(
                    !verify(&damaged),
                    "flipping byte {byte} bit {bit} must fail validation"
                );
            }
        }
    }

    #[test]
    fn verify_rejects_empty() {
        assert!(!verify(&[]));
    }

    #[test]
    fn length_class_from_opcode_bits() {
        assert_eq!(length_class(0x83).unwrap(), LengthClass::Fixed(2));
        assert_eq!(length_class(0xB0).unwrap(), LengthClass::Fixed(4));
        assert_eq!(length_class(0xD0).unwrap(), LengthClass::Fixed(6));
        assert_eq!(length_class(0xE7).unwrap(), LengthClass::Variable);
        assert_eq!(length_class(0xED).unwrap(), LengthClass::Variable);
    }

    #[test]
    fn length_class_rejects_payload_byte() {
        assert!(length_class(0x05).is_err());
    }

    #[test]
    fn frame_length_fixed() {
        assert_eq!(frame_length(&[0x83]).unwrap(), Some(2));
        assert_eq!(frame_length(&[0xA0]).unwrap(), Some(4));
        assert_eq!(frame_length(&[0xD0]).unwrap(), Some(6));
    }

    #[test]
    fn frame_length_variable_needs_length_byte() {
        assert_eq!(frame_length(&[0xE7]).unwrap(), None);
        assert_eq!(frame_length(&[0xE7, 0x0E]).unwrap(), Some(14));
        assert_eq!(frame_length(&[0xED, 0x0F]).unwrap(), Some(15));
    }

    #[test]
    fn frame_length_zero_is_hard_error() {
        assert!(frame_length(&[0xE7, 0x00]).is_err());
        assert!(frame_length(&[0xE7, 0x02]).is_err());
    }
}
