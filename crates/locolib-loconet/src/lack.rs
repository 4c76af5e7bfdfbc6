//! Long-acknowledge (0xB4) interpretation.
//!
//! A LACK carries the opcode it acknowledges and a status code whose
//! meaning depends on that opcode. Some combinations settle an operation
//! immediately (e.g. "no free slot"), some merely admit it ("programming
//! started, result follows"), and many are informational noise from other
//! bus masters. [`lack_outcome`] classifies a LACK into one of those
//! three buckets so the dispatch path knows whether to fail a pending
//! request, keep waiting, or ignore the message.

use locolib_core::Error;

/// How a long acknowledge bears on a pending operation.
#[derive(Debug)]
pub enum LackOutcome {
    /// The acknowledged operation completed (or was accepted and no
    /// further reply will come).
    Success,
    /// The acknowledged operation failed; the error describes why.
    Failure(Error),
    /// The combination does not settle anything; keep waiting.
    Undecided,
}

/// Classify a long acknowledge by acknowledged opcode and status code.
pub fn lack_outcome(opcode: u8, code: u8) -> LackOutcome {
    match (opcode, code) {
        // Switch request accepted / FIFO full.
        (0xB0, 0x7F) => LackOutcome::Success,
        (0xB0, 0x00) => LackOutcome::Failure(Error::Protocol(
            "switch command rejected: FIFO full".into(),
        )),

        (0xBA, 0x00) => LackOutcome::Failure(Error::Protocol("illegal slot move".into())),

        // Slot request denied; the address is filled in by the caller.
        (0xBF, 0x00) => LackOutcome::Failure(Error::Protocol(
            "no free slot available".into(),
        )),

        // Write slot data: the programmer replies with a LACK before the
        // eventual programming result.
        (0xEF, 0x00) => LackOutcome::Failure(Error::Protocol("programmer busy".into())),
        (0xEF, 0x01) => LackOutcome::Success,
        // Accepted blind: no read-back will follow.
        (0xEF, 0x40) => LackOutcome::Success,
        (0xEF, 0x7F) => LackOutcome::Success,

        (0xED, 0x7F) => LackOutcome::Success,
        (0xED, 0x00) => LackOutcome::Failure(Error::Protocol(
            "LNCV request rejected".into(),
        )),

        _ => LackOutcome::Undecided,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_acks() {
        assert!(matches!(lack_outcome(0xB0, 0x7F), LackOutcome::Success));
        assert!(matches!(lack_outcome(0xB0, 0x00), LackOutcome::Failure(_)));
    }

    #[test]
    fn slot_request_denied() {
        assert!(matches!(lack_outcome(0xBF, 0x00), LackOutcome::Failure(_)));
        assert!(matches!(lack_outcome(0xBA, 0x00), LackOutcome::Failure(_)));
    }

    #[test]
    fn programming_acks() {
        assert!(matches!(lack_outcome(0xEF, 0x00), LackOutcome::Failure(_)));
        assert!(matches!(lack_outcome(0xEF, 0x01), LackOutcome::Success));
        assert!(matches!(lack_outcome(0xEF, 0x40), LackOutcome::Success));
        assert!(matches!(lack_outcome(0xEF, 0x7F), LackOutcome::Success));
    }

    #[test]
    fn lncv_acks() {
        assert!(matches!(lack_outcome(0xED, 0x7F), LackOutcome::Success));
        assert!(matches!(lack_outcome(0xED, 0x00), LackOutcome::Failure(_)));
    }

    #[test]
    fn unmapped_combination_is_undecided() {
        assert!(matches!(lack_outcome(0xA0, 0x00), LackOutcome::Undecided));
        assert!(matches!(lack_outcome(0xBF, 0x55), LackOutcome::Undecided));
    }
}
