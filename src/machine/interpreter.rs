//! Core Malbolge interpreter.
//!
//! Executes opcode programs one step at a time, applying the
//! position-dependent re-encryption to every executed cell. The interpreter
//! owns an explicit [`Machine`] instead of globals and keeps the hot loop
//! free of allocations.
//!
//! All runtime terminations are reported in the [`ExecutionResult`] via
//! [`HaltReason`]; only load-time validation returns `Err`. A single
//! interpreter serializes its public entry points through `&mut self`;
//! independent instances (or independent snapshots) parallelize freely.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::encoding::{self, ENCRYPT_TABLE, PRINTABLE_END, PRINTABLE_MIN};
use crate::machine::errors::MachineError;
use crate::machine::isa::Opcode;
use crate::machine::state::{Fingerprint, Machine};
use crate::ternary::{self, Word, MAX_ADDRESS_SPACE};


/// Default capacity of the cycle tracker.
pub const DEFAULT_CYCLE_DETECTION_LIMIT: usize = 100_000;

/// Default number of steps between cycle-tracker samples.
pub const DEFAULT_CYCLE_SAMPLING_PERIOD: u64 = 64;

/// Interpreter construction parameters.
///
/// All fields are named, typed and defaulted; `Default` gives the standard
/// configuration.
#[derive(Clone, Debug)]
pub struct InterpreterConfig {
    /// Grow the tape on demand past the loaded program.
    pub allow_memory_expansion: bool,
    /// Upper bound on tape length, clamped to [`MAX_ADDRESS_SPACE`].
    pub memory_limit: usize,
    /// Execution halts with `StepLimitExceeded` once this many steps ran.
    pub max_steps: u64,
    /// Capacity of the cycle tracker. 0 disables inserts and latches
    /// `cycle_tracking_limited`.
    pub cycle_detection_limit: usize,
    /// Steps between cycle-tracker samples, at least 1.
    pub cycle_sampling_period: u64,
    /// Cooperative cancellation flag, checked once per step.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            allow_memory_expansion: true,
            memory_limit: MAX_ADDRESS_SPACE as usize,
            max_steps: u64::MAX,
            cycle_detection_limit: DEFAULT_CYCLE_DETECTION_LIMIT,
            cycle_sampling_period: DEFAULT_CYCLE_SAMPLING_PERIOD,
            cancel: None,
        }
    }
}

/// Why execution stopped. Terminal conditions are data, not errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HaltReason {
    /// The `v` opcode executed.
    HaltOpcode,
    /// The code pointer ran off the end of the loaded program.
    EndOfProgram,
    /// The executed cell was out of range or deciphered outside the opcode set.
    InvalidOpcode,
    /// The input opcode executed; no input is ever available.
    InputUnderflow,
    /// The configured step budget was exhausted. Resumable.
    StepLimitExceeded,
    /// The tape could not grow to a required address.
    MemoryLimitExceeded,
    /// The cancellation flag was raised. Resumable.
    Cancelled,
}

impl HaltReason {
    /// Stable snake_case name, used in reports and CLI output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HaltReason::HaltOpcode => "halt_opcode",
            HaltReason::EndOfProgram => "end_of_program",
            HaltReason::InvalidOpcode => "invalid_opcode",
            HaltReason::InputUnderflow => "input_underflow",
            HaltReason::StepLimitExceeded => "step_limit_exceeded",
            HaltReason::MemoryLimitExceeded => "memory_limit_exceeded",
            HaltReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic details accompanying every termination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HaltMetadata {
    /// Last instruction dispatched before termination.
    pub last_instruction: Option<Opcode>,
    /// Target of the most recent `i` or `j` indirection, if any executed.
    pub last_jump_target: Option<Word>,
    /// A sampled state fingerprint repeated during this run.
    pub cycle_detected: bool,
    /// Step distance between the repeated samples.
    pub cycle_repeat_length: Option<u64>,
    /// The tracker hit its capacity and stopped recording new states.
    pub cycle_tracking_limited: bool,
}

/// Structured outcome of one execution.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// Bytes produced by the output opcode, in order.
    pub output: Vec<u8>,
    /// Whether the machine reached a non-resumable terminal state.
    pub halted: bool,
    /// Number of completed steps.
    pub steps: u64,
    pub halt_reason: HaltReason,
    pub halt_metadata: HaltMetadata,
    /// Number of tape growth events.
    pub memory_expansions: u64,
    /// High-water mark of the tape length.
    pub peak_memory_cells: usize,
    /// Final machine snapshot, when capture was requested.
    pub machine: Option<Machine>,
}

/// Sampled-fingerprint cycle detector.
///
/// Fingerprints are recorded every `period` steps up to `capacity` entries;
/// a repeat flags `detected` with the step distance, and running out of
/// capacity flags `limited` instead of evicting.
pub(crate) struct CycleTracker {
    seen: HashMap<Fingerprint, u64>,
    pub(crate) capacity: usize,
    pub(crate) period: u64,
    pub(crate) detected: bool,
    pub(crate) repeat_length: Option<u64>,
    pub(crate) limited: bool,
}

impl CycleTracker {
    pub(crate) fn new(capacity: usize, period: u64) -> CycleTracker {
        CycleTracker {
            seen: HashMap::new(),
            capacity,
            // capacity 0 means tracking is off; the tracker is at its
            // limit before the first sample.
            limited: capacity == 0,
            period: period.max(1),
            detected: false,
            repeat_length: None,
        }
    }

    pub(crate) fn observe(&mut self, fingerprint: Fingerprint, step: u64) {
        if let Some(&first_seen) = self.seen.get(&fingerprint) {
            if !self.detected {
                self.detected = true;
                self.repeat_length = Some(step - first_seen);
            }
            return;
        }
        if self.seen.len() >= self.capacity {
            self.limited = true;
            return;
        }
        self.seen.insert(fingerprint, step);
    }
}

/// Executes Malbolge opcode programs and captures their output.
///
/// One interpreter instance can run multiple programs sequentially; loading
/// a program replaces the machine state.
pub struct Interpreter {
    machine: Machine,
    config: InterpreterConfig,
    program_length: usize,
    memory_expansions: u64,
    peak_cells: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new(InterpreterConfig::default())
    }
}

impl Interpreter {
    /// Creates an interpreter with the given configuration.
    pub fn new(config: InterpreterConfig) -> Interpreter {
        Interpreter {
            machine: Machine::new(),
            config,
            program_length: 0,
            memory_expansions: 0,
            peak_cells: 0,
        }
    }

    /// Returns the current machine state. Clone it to take a snapshot.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Parses an opcode symbol string, loads it and runs it to termination.
    pub fn execute(
        &mut self,
        opcodes: &str,
        capture_machine: bool,
    ) -> Result<ExecutionResult, MachineError> {
        let program = encoding::parse_symbols(opcodes)?;
        self.execute_opcodes(&program, capture_machine)
    }

    /// Loads an opcode program and runs it to termination.
    pub fn execute_opcodes(
        &mut self,
        program: &[Opcode],
        capture_machine: bool,
    ) -> Result<ExecutionResult, MachineError> {
        self.load_program(program)?;
        Ok(self.execute_loaded(capture_machine))
    }

    /// Convenience wrapper returning only the output bytes.
    pub fn run(&mut self, opcodes: &str) -> Result<Vec<u8>, MachineError> {
        self.execute(opcodes, false).map(|result| result.output)
    }

    /// Resumes a snapshot with extra opcodes appended past its tape.
    ///
    /// The suffix is enciphered at the positions it will occupy, so the
    /// extended program is byte-identical to loading the whole opcode
    /// sequence from scratch. Registers and prior tape mutations are kept;
    /// output restarts from the resume point.
    pub fn execute_from_snapshot(
        &mut self,
        snapshot: &Machine,
        suffix: &[Opcode],
        capture_machine: bool,
    ) -> Result<ExecutionResult, MachineError> {
        let mut machine = snapshot.clone();
        let prefix_length = machine.tape.len();
        let total = prefix_length + suffix.len();
        let limit = self.config.memory_limit.min(MAX_ADDRESS_SPACE as usize);
        if total > limit {
            return Err(MachineError::ProgramTooLong {
                length: total,
                limit,
            });
        }
        if !suffix.is_empty() {
            let text = encoding::encode_opcodes(suffix, prefix_length)?;
            machine.tape.extend(text.bytes().map(Word::from));
        }
        self.machine = machine;
        self.program_length = total;
        self.reset_diagnostics();
        Ok(self.execute_loaded(capture_machine))
    }

    /// Continues the loaded program, e.g. after `step_limit_exceeded`.
    /// Diagnostics reset; output restarts from the resume point.
    pub fn resume_execution(&mut self, capture_machine: bool) -> ExecutionResult {
        self.reset_diagnostics();
        self.execute_loaded(capture_machine)
    }

    fn load_program(&mut self, program: &[Opcode]) -> Result<(), MachineError> {
        if program.is_empty() {
            return Err(MachineError::EmptyProgram);
        }
        let limit = self.config.memory_limit.min(MAX_ADDRESS_SPACE as usize);
        if program.len() > limit {
            return Err(MachineError::ProgramTooLong {
                length: program.len(),
                limit,
            });
        }
        let text = encoding::encode_opcodes(program, 0)?;
        self.machine.load_tape(text.bytes().map(Word::from).collect());
        self.program_length = program.len();
        self.reset_diagnostics();
        Ok(())
    }

    fn reset_diagnostics(&mut self) {
        self.memory_expansions = 0;
        self.peak_cells = self.machine.tape.len();
    }

    fn is_cancelled(&self) -> bool {
        self.config
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn execute_loaded(&mut self, capture_machine: bool) -> ExecutionResult {
        self.machine.halted = false;
        let mut output: Vec<u8> = Vec::new();
        let mut steps: u64 = 0;
        let mut metadata = HaltMetadata::default();
        let mut tracker = CycleTracker::new(
            self.config.cycle_detection_limit,
            self.config.cycle_sampling_period,
        );

        let halt_reason = loop {
            if self.is_cancelled() {
                break HaltReason::Cancelled;
            }
            if steps >= self.config.max_steps {
                break HaltReason::StepLimitExceeded;
            }
            if self.machine.c as usize >= self.program_length {
                break HaltReason::EndOfProgram;
            }
            if let Err(reason) = self.ensure_capacity(self.machine.c as usize) {
                break reason;
            }
            let cell = self.machine.tape[self.machine.c as usize];
            let Some(op) = encoding::decode_cell(cell, self.machine.c) else {
                break HaltReason::InvalidOpcode;
            };

            if tracker.capacity > 0 && steps % tracker.period == 0 {
                tracker.observe(self.machine.fingerprint(output.len() as u64), steps);
            }

            metadata.last_instruction = Some(op);

            let mut halting: Option<HaltReason> = None;
            let action = match op {
                Opcode::MovD => self.op_movd(&mut metadata),
                Opcode::Jmp => self.op_jmp(&mut metadata),
                Opcode::Rot => self.op_rot(),
                Opcode::Crz => self.op_crz(),
                Opcode::Out => {
                    output.push((self.machine.a % 256) as u8);
                    Ok(())
                }
                Opcode::In => Err(HaltReason::InputUnderflow),
                Opcode::Nop => Ok(()),
                Opcode::Halt => {
                    halting = Some(HaltReason::HaltOpcode);
                    Ok(())
                }
            };
            if let Err(reason) = action {
                break reason;
            }

            // Re-encrypt the executed cell; for a jump this is the target.
            if let Err(reason) = self.encrypt_current_cell() {
                break reason;
            }

            self.machine.c = (self.machine.c + 1) % MAX_ADDRESS_SPACE;
            self.machine.d = (self.machine.d + 1) % MAX_ADDRESS_SPACE;
            steps += 1;

            if let Some(reason) = halting {
                break reason;
            }
        };

        self.machine.halted = !matches!(
            halt_reason,
            HaltReason::StepLimitExceeded | HaltReason::Cancelled
        );
        metadata.cycle_detected = tracker.detected;
        metadata.cycle_repeat_length = tracker.repeat_length;
        metadata.cycle_tracking_limited = tracker.limited;

        ExecutionResult {
            output,
            halted: self.machine.halted,
            steps,
            halt_reason,
            halt_metadata: metadata,
            memory_expansions: self.memory_expansions,
            peak_memory_cells: self.peak_cells,
            machine: capture_machine.then(|| self.machine.clone()),
        }
    }

    /// `j` ; d <- tape[d]
    fn op_movd(&mut self, metadata: &mut HaltMetadata) -> Result<(), HaltReason> {
        let d = self.machine.d as usize;
        self.ensure_capacity(d)?;
        let target = self.machine.tape[d];
        self.machine.d = target;
        metadata.last_jump_target = Some(target);
        Ok(())
    }

    /// `i` ; c <- tape[d]
    fn op_jmp(&mut self, metadata: &mut HaltMetadata) -> Result<(), HaltReason> {
        let d = self.machine.d as usize;
        self.ensure_capacity(d)?;
        let target = self.machine.tape[d];
        self.machine.c = target;
        metadata.last_jump_target = Some(target);
        Ok(())
    }

    /// `*` ; tape[d] <- rotate_right(tape[d]); a <- tape[d]
    fn op_rot(&mut self) -> Result<(), HaltReason> {
        let d = self.machine.d as usize;
        self.ensure_capacity(d)?;
        let rotated = ternary::rotate_right(self.machine.tape[d]);
        self.machine.tape[d] = rotated;
        self.machine.a = rotated;
        Ok(())
    }

    /// `p` ; tape[d] <- crz(tape[d], a); a <- tape[d]
    fn op_crz(&mut self) -> Result<(), HaltReason> {
        let d = self.machine.d as usize;
        self.ensure_capacity(d)?;
        let crazed = ternary::crz(self.machine.tape[d], self.machine.a);
        self.machine.tape[d] = crazed;
        self.machine.a = crazed;
        Ok(())
    }

    /// Replaces the cell at `c` with its re-encryption.
    fn encrypt_current_cell(&mut self) -> Result<(), HaltReason> {
        let c = self.machine.c as usize;
        self.ensure_capacity(c)?;
        let value = self.machine.tape[c];
        if !(PRINTABLE_MIN..PRINTABLE_END).contains(&value) {
            return Err(HaltReason::InvalidOpcode);
        }
        self.machine.tape[c] = ENCRYPT_TABLE[(value - PRINTABLE_MIN) as usize] as Word;
        Ok(())
    }

    /// Grows the tape to cover `index`, backfilling with the ternary rule.
    fn ensure_capacity(&mut self, index: usize) -> Result<(), HaltReason> {
        if index < self.machine.tape.len() {
            return Ok(());
        }
        if !self.config.allow_memory_expansion {
            return Err(HaltReason::MemoryLimitExceeded);
        }
        let limit = self.config.memory_limit.min(MAX_ADDRESS_SPACE as usize);
        if index >= limit {
            return Err(HaltReason::MemoryLimitExceeded);
        }
        while self.machine.tape.len() <= index {
            let next = ternary::backfill(&self.machine.tape);
            self.machine.tape.push(next);
            if self.machine.tape.len() >= limit {
                break;
            }
        }
        if index >= self.machine.tape.len() {
            return Err(HaltReason::MemoryLimitExceeded);
        }
        self.memory_expansions += 1;
        if self.machine.tape.len() > self.peak_cells {
            self.peak_cells = self.machine.tape.len();
        }
        Ok(())
    }
}
