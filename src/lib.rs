//! Malbolge program synthesis toolkit.
//!
//! Malbolge is deliberately hostile to direct authorship: every executed
//! instruction rewrites its own memory cell through a position-dependent
//! encryption table, addressing is ternary, and the output path runs
//! through a base-3 "crazy" operation. This crate provides the two pieces
//! that make the language usable anyway:
//!
//! - [`Interpreter`]: a virtual machine with an explicit halt taxonomy,
//!   snapshot capture/resume and cycle diagnostics;
//! - [`Generator`]: a bounded, cache-aware search that synthesizes a
//!   program printing a chosen target string.
//!
//! ```no_run
//! use malbolge::{GenerationConfig, Generator, Interpreter};
//!
//! let config = GenerationConfig {
//!     random_seed: Some(42),
//!     ..GenerationConfig::default()
//! };
//! let result = Generator::new().generate_for_string("Hi", &config)?;
//! assert_eq!(result.machine_output, b"Hi");
//!
//! let output = Interpreter::default().run(&result.opcodes)?;
//! assert_eq!(output, b"Hi");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod encoding;
pub mod generator;
pub mod machine;
pub mod ternary;
pub mod utils;

pub use generator::{
    GenerationConfig, GenerationError, GenerationResult, GenerationStats, Generator, TraceEvent,
    TraceReason,
};
pub use machine::errors::MachineError;
pub use machine::interpreter::{
    ExecutionResult, HaltMetadata, HaltReason, Interpreter, InterpreterConfig,
};
pub use machine::isa::Opcode;
pub use machine::state::{Fingerprint, Machine};
