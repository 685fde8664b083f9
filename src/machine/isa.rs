//! Instruction set of the Malbolge machine.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode table and invokes a callback macro for code generation, so other
//! modules can generate opcode-indexed code without duplicating the table.
//!
//! The eight operation symbols form the alphabet `i</*jpov`. Programs are
//! strings over this alphabet; the ASCII source form is derived from it by
//! the position-dependent cipher in [`encoding`](crate::encoding).

use std::fmt;

/// Invokes a callback macro with the complete opcode definition list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            /// `j` ; d <- tape[d] (data pointer indirection)
            MovD = 0, b'j', "movd",
            /// `i` ; c <- tape[d] (jump; re-encryption then applies to the target cell)
            Jmp = 1, b'i', "jmp",
            /// `*` ; tape[d] <- rotate_right(tape[d]); a <- tape[d]
            Rot = 2, b'*', "rot",
            /// `p` ; tape[d] <- crz(tape[d], a); a <- tape[d]
            Crz = 3, b'p', "crz",
            /// `<` ; append a mod 256 to the output buffer
            Out = 4, b'<', "out",
            /// `/` ; read input; rejected at load, input_underflow at runtime
            In = 5, b'/', "in",
            /// `o` ; no-op
            Nop = 6, b'o', "nop",
            /// `v` ; halt
            Halt = 7, b'v', "halt",
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $index:literal, $symbol:literal, $mnemonic:literal
        ),* $(,)?
    ) => {
        /// One of the eight canonical Malbolge operations.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $index,
            )*
        }

        impl Opcode {
            /// Number of operations in the instruction set.
            pub const COUNT: usize = 8;

            /// All opcodes in discriminant order.
            pub const ALL: [Opcode; Self::COUNT] = [ $( Opcode::$name, )* ];

            /// Returns the canonical source symbol for this opcode.
            pub const fn symbol(self) -> u8 {
                match self {
                    $( Opcode::$name => $symbol, )*
                }
            }

            /// Returns the mnemonic used in diagnostics.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Looks up an opcode by its source symbol.
            pub const fn from_symbol(symbol: u8) -> Option<Opcode> {
                match symbol {
                    $( $symbol => Some(Opcode::$name), )*
                    _ => None,
                }
            }
        }
    };
}

for_each_opcode!(define_opcodes);

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol() as char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_symbol(op.symbol()), Some(op));
        }
    }

    #[test]
    fn symbol_alphabet_is_complete() {
        let alphabet: Vec<u8> = Opcode::ALL.iter().map(|op| op.symbol()).collect();
        for symbol in b"i</*jpov" {
            assert!(alphabet.contains(symbol));
        }
        assert_eq!(alphabet.len(), Opcode::COUNT);
    }

    #[test]
    fn from_symbol_rejects_unknown() {
        assert_eq!(Opcode::from_symbol(b'x'), None);
        assert_eq!(Opcode::from_symbol(b' '), None);
    }

    #[test]
    fn display_prints_symbol() {
        assert_eq!(Opcode::Halt.to_string(), "v");
        assert_eq!(Opcode::Out.to_string(), "<");
    }
}
