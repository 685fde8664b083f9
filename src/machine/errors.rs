//! Load-time error taxonomy for the Malbolge machine.
//!
//! Runtime terminations are never errors: they are reported as data through
//! [`HaltReason`](crate::machine::interpreter::HaltReason). Only validation
//! failures while parsing or loading program text surface as `Err` values.

use malbolge_derive::Error;

/// Errors raised while validating or loading program text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// Opcode sequence is empty.
    #[error("program contains no opcodes")]
    EmptyProgram,
    /// Program does not fit the address space or the configured memory limit.
    #[error("program length {length} exceeds limit {limit}")]
    ProgramTooLong { length: usize, limit: usize },
    /// Symbol outside the eight-opcode alphabet in an opcode string.
    #[error("invalid opcode symbol '{symbol}' at index {index}")]
    InvalidOpcodeSymbol { symbol: char, index: usize },
    /// ASCII source character that does not decode to an opcode at its position.
    #[error("source character '{ch}' at index {index} does not decode to an opcode")]
    InvalidSourceChar { ch: char, index: usize },
    /// The input opcode `/` appeared in a program; input is not supported.
    #[error("input opcode at index {index}: input-consuming programs are not supported")]
    InputNotSupported { index: usize },
}
