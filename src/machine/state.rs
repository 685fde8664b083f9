//! Machine state record, snapshots and fingerprints.

use sha3::{Digest, Sha3_256};
use std::fmt;

use crate::ternary::Word;

/// Complete mutable state of a Malbolge machine.
///
/// A value of this type captured from an interpreter is a snapshot: a deep
/// copy that never shares tape storage with the interpreter that produced
/// it, safe to keep around and resume from. `a` is the accumulator, `c` the
/// code pointer, `d` the data pointer; all three stay in `[0, 59049)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Machine {
    /// Accumulator.
    pub a: Word,
    /// Code pointer.
    pub c: Word,
    /// Data pointer.
    pub d: Word,
    /// Memory tape. Cells hold the position-enciphered program text at load;
    /// data cells written by `*` and `p` hold full trit words.
    pub tape: Vec<Word>,
    /// Whether the machine reached a terminal state.
    pub halted: bool,
}

impl Machine {
    /// Creates an empty, unloaded machine.
    pub fn new() -> Machine {
        Machine::default()
    }

    /// Clears registers and the halt flag; the tape is left untouched.
    pub fn reset_registers(&mut self) {
        self.a = 0;
        self.c = 0;
        self.d = 0;
        self.halted = false;
    }

    /// Replaces the tape with position-enciphered program text and clears
    /// the registers.
    pub fn load_tape(&mut self, cells: Vec<Word>) {
        self.tape = cells;
        self.reset_registers();
    }

    /// Computes the identity of this state given the output produced so far.
    pub fn fingerprint(&self, output_len: u64) -> Fingerprint {
        let mut hasher = Sha3_256::new();
        for cell in &self.tape {
            hasher.update(cell.to_le_bytes());
        }
        Fingerprint {
            a: self.a,
            c: self.c,
            d: self.d,
            tape_digest: hasher.finalize().into(),
            output_len,
        }
    }
}

/// Identity of a machine snapshot, used for snapshot caching and
/// repeated-state detection.
///
/// Carries the registers, a Sha3-256 digest of the tape contents and the
/// output length. The derived lexicographic ordering supplies the
/// deterministic "lowest fingerprint" tie-break.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub a: Word,
    pub c: Word,
    pub d: Word,
    pub tape_digest: [u8; 32],
    pub output_len: u64,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}:", self.a, self.c, self.d, self.output_len)?;
        for byte in &self.tape_digest[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_clone_is_deep() {
        let mut machine = Machine::new();
        machine.load_tape(vec![98, 40, 50]);
        let snapshot = machine.clone();

        machine.tape[0] = 7;
        machine.a = 3;

        assert_eq!(snapshot.tape[0], 98);
        assert_eq!(snapshot.a, 0);
    }

    #[test]
    fn fingerprint_tracks_state_content() {
        let mut machine = Machine::new();
        machine.load_tape(vec![98, 40]);
        let base = machine.fingerprint(0);

        assert_eq!(machine.fingerprint(0), base);

        machine.tape[1] = 41;
        assert_ne!(machine.fingerprint(0), base);

        machine.tape[1] = 40;
        machine.d = 1;
        assert_ne!(machine.fingerprint(0), base);

        machine.d = 0;
        assert_ne!(machine.fingerprint(1), base);
        assert_eq!(machine.fingerprint(0), base);
    }

    #[test]
    fn load_tape_resets_registers() {
        let mut machine = Machine {
            a: 5,
            c: 6,
            d: 7,
            tape: vec![1],
            halted: true,
        };
        machine.load_tape(vec![98]);
        assert_eq!((machine.a, machine.c, machine.d), (0, 0, 0));
        assert!(!machine.halted);
    }
}
