//! Malbolge program synthesis.
//!
//! Discovers an opcode sequence whose output equals a target byte string by
//! driving the interpreter through a bounded, cache-aware layered search.
//!
//! The search starts from a fixed bootstrap (`i` followed by a runway of 99
//! `o`s): the jump lands the code pointer near the end of the runway, so
//! every appended opcode executes exactly once while the data pointer walks
//! the runway cells behind it. For each target byte the generator expands a
//! depth-limited tree over the construction opcodes (`o`, `p`, `*`),
//! probing every node with the output opcode `<`; candidates that leave the
//! target prefix or revisit an explored state are pruned, snapshots are
//! reused through a fingerprint-keyed cache, and when the exhaustive depth
//! is spent the frontier is advanced by a seeded random draw and the search
//! restarts. The finished program always ends in `v` and is re-executed on
//! a fresh interpreter before it is returned.

mod cache;
mod trace;

#[cfg(test)]
mod tests;

pub use trace::{GenerationStats, TraceEvent, TraceReason};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use malbolge_derive::Error;

use crate::encoding;
use crate::machine::errors::MachineError;
use crate::machine::interpreter::{Interpreter, InterpreterConfig};
use crate::machine::isa::Opcode;
use crate::machine::state::Fingerprint;
use crate::ternary::MAX_ADDRESS_SPACE;
use crate::utils::log::Logger;
use cache::{SearchState, SnapshotCache};

/// Construction opcodes the search may schedule between output probes.
const CONSTRUCTION_CHOICES: [Opcode; 3] = [Opcode::Nop, Opcode::Crz, Opcode::Rot];

/// Length of the no-op runway behind the bootstrap jump.
const BOOTSTRAP_RUNWAY: usize = 99;

/// Default exhaustive search depth per target byte.
pub const DEFAULT_MAX_SEARCH_DEPTH: usize = 5;

/// Default per-character cap on randomized extension draws.
pub const DEFAULT_MAX_RANDOM_EXTENSIONS: u32 = 4096;

/// Generator configuration.
///
/// With a fixed `random_seed` the whole run is deterministic: opcodes,
/// trace and stats are byte-identical across runs (except `duration_ns`).
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    /// Construction opcodes tried at each expansion; a non-empty subset of
    /// `"op*"`, in tie-break order.
    pub opcode_choices: String,
    /// Exhaustive tree depth per target byte.
    pub max_search_depth: usize,
    /// Seed for the randomized-extension stream (xoshiro256**); `None`
    /// draws an entropy seed.
    pub random_seed: Option<u64>,
    /// Upper bound on the emitted opcode count.
    pub max_program_length: usize,
    /// Per-character cap on randomized extension draws.
    pub max_random_extensions: u32,
    /// Capture one trace event per candidate evaluation.
    pub capture_trace: bool,
    /// Cooperative cancellation flag, checked at least once per candidate.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            opcode_choices: "op*".to_string(),
            max_search_depth: DEFAULT_MAX_SEARCH_DEPTH,
            random_seed: None,
            max_program_length: MAX_ADDRESS_SPACE as usize,
            max_random_extensions: DEFAULT_MAX_RANDOM_EXTENSIONS,
            capture_trace: false,
            cancel: None,
        }
    }
}

/// Errors raised by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// `opcode_choices` contained something other than `o`, `p`, `*`.
    #[error("opcode choices {choices:?} must be a non-empty subset of \"op*\"")]
    InvalidOpcodeChoices { choices: String },
    /// The program under construction outgrew `max_program_length`.
    #[error("generated program length {length} exceeds limit {limit}")]
    ProgramLengthExceeded { length: usize, limit: usize },
    /// The randomized-extension budget ran out for one target byte.
    #[error("search exhausted at target byte {byte_index} after {draws} randomized draws")]
    GenerationExhausted { byte_index: usize, draws: u32 },
    /// The final re-execution printed something other than the target.
    /// This is a bug-level failure and is never silently adjusted.
    #[error("verification failed: program printed {actual:?}, expected {expected:?}")]
    VerificationFailed { expected: Vec<u8>, actual: Vec<u8> },
    /// The cancellation flag was raised.
    #[error("generation cancelled")]
    Cancelled,
    /// Program text failed to load or re-encode.
    #[error("program load failed: {0}")]
    Load(MachineError),
}

impl From<MachineError> for GenerationError {
    fn from(err: MachineError) -> Self {
        GenerationError::Load(err)
    }
}

/// Finished synthesis: the program in both representations, the verified
/// output, and the search statistics.
#[derive(Clone, Debug)]
pub struct GenerationResult {
    /// The requested target string.
    pub target: String,
    /// Opcode symbols of the generated program; always ends in `v`.
    pub opcodes: String,
    /// ASCII source equivalent of `opcodes` under the position cipher.
    pub ascii_source: String,
    /// Output observed during the final verification run; equals the
    /// target bytes.
    pub machine_output: Vec<u8>,
    pub stats: GenerationStats,
    /// Per-candidate events, present when tracing was enabled.
    pub trace: Option<Vec<TraceEvent>>,
}

/// Synthesizes Malbolge programs that print a chosen target string.
pub struct Generator {
    log: Logger,
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}

impl Generator {
    pub fn new() -> Generator {
        Generator {
            log: Logger::new("generator"),
        }
    }

    /// Generates a program whose output is exactly `target`.
    ///
    /// The empty target yields the bootstrap followed by the halt opcode.
    pub fn generate_for_string(
        &self,
        target: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult, GenerationError> {
        let started = Instant::now();
        let mut run = SearchRun::new(target.as_bytes(), config)?;

        for index in 0..run.target.len() {
            if let Err(err) = run.search_byte(index) {
                self.log
                    .warn(&format!("generation aborted at byte {index}: {err}"));
                return Err(err);
            }
        }

        run.program.push(Opcode::Halt);

        // Re-execute the whole program on a fresh interpreter: the search
        // worked on incremental snapshots, the caller gets a verified run.
        let mut verifier = Interpreter::default();
        let verified = verifier.execute_opcodes(&run.program, false)?;
        if verified.output.as_slice() != run.target {
            return Err(GenerationError::VerificationFailed {
                expected: run.target.to_vec(),
                actual: verified.output,
            });
        }

        let trace_length = if config.capture_trace {
            run.trace.len()
        } else {
            0
        };
        let mut stats = run.stats;
        stats.finalize(started.elapsed().as_nanos(), trace_length);

        let opcodes = encoding::render_symbols(&run.program);
        let ascii_source = encoding::encode_opcodes(&run.program, 0)?;

        self.log.info(&format!(
            "generated {} opcodes for {} target bytes ({} evaluations, {} pruned, {} cache hits, {} cached snapshots)",
            run.program.len(),
            run.target.len(),
            stats.evaluations,
            stats.pruned,
            stats.cache_hits,
            run.cache.len(),
        ));

        Ok(GenerationResult {
            target: target.to_string(),
            opcodes,
            ascii_source,
            machine_output: verified.output,
            stats,
            trace: config.capture_trace.then_some(run.trace),
        })
    }
}

/// One node of the expansion tree: the opcode suffix relative to the
/// committed program, and the machine state it leads to.
struct Node {
    suffix: Vec<Opcode>,
    state: Arc<SearchState>,
}

/// Mutable state of one generation run.
struct SearchRun<'a> {
    target: &'a [u8],
    choices: Vec<Opcode>,
    max_depth: usize,
    max_program_length: usize,
    max_random_extensions: u32,
    capture_trace: bool,
    cancel: Option<Arc<AtomicBool>>,
    interpreter: Interpreter,
    cache: SnapshotCache,
    stats: GenerationStats,
    trace: Vec<TraceEvent>,
    rng: Xoshiro256StarStar,
    /// Committed opcodes, starting with the bootstrap.
    program: Vec<Opcode>,
    /// Snapshot after the last committed opcode.
    frontier: Arc<SearchState>,
}

impl<'a> SearchRun<'a> {
    fn new(target: &'a [u8], config: &GenerationConfig) -> Result<SearchRun<'a>, GenerationError> {
        let choices = parse_choices(&config.opcode_choices)?;
        let seed = config
            .random_seed
            .unwrap_or_else(|| rand::thread_rng().gen());

        // The search fingerprints states itself; the interpreter's own
        // cycle tracking would only duplicate the hashing.
        let mut interpreter = Interpreter::new(InterpreterConfig {
            cycle_detection_limit: 0,
            ..InterpreterConfig::default()
        });

        let mut program = vec![Opcode::Jmp];
        program.extend(std::iter::repeat(Opcode::Nop).take(BOOTSTRAP_RUNWAY));
        if program.len() + 1 > config.max_program_length {
            return Err(GenerationError::ProgramLengthExceeded {
                length: program.len() + 1,
                limit: config.max_program_length,
            });
        }

        let bootstrapped = interpreter.execute_opcodes(&program, false)?;
        let machine = interpreter.machine().clone();
        let fingerprint = machine.fingerprint(bootstrapped.output.len() as u64);
        let frontier = Arc::new(SearchState {
            machine,
            output: bootstrapped.output,
            fingerprint,
        });

        Ok(SearchRun {
            target,
            choices,
            max_depth: config.max_search_depth.max(1),
            max_program_length: config.max_program_length,
            max_random_extensions: config.max_random_extensions,
            capture_trace: config.capture_trace,
            cancel: config.cancel.clone(),
            interpreter,
            cache: SnapshotCache::new(),
            stats: GenerationStats::default(),
            trace: Vec::new(),
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            program,
            frontier,
        })
    }

    /// Extends the committed program until its output equals
    /// `target[..=index]`.
    fn search_byte(&mut self, index: usize) -> Result<(), GenerationError> {
        let target_prefix: Vec<u8> = self.target[..=index].to_vec();
        let choices = self.choices.clone();
        let mut draws: u32 = 0;

        loop {
            self.check_cancel()?;

            // The repeated-state set spans one expansion round. Carrying it
            // across randomized restarts would kill every restart outright:
            // a restart's shallow nodes are the previous round's deep nodes.
            let mut repeated: HashSet<Fingerprint> = HashSet::new();
            let mut level = vec![Node {
                suffix: Vec::new(),
                state: self.frontier.clone(),
            }];

            for depth in 1..=self.max_depth {
                let mut next_level: Vec<Node> = Vec::new();
                let mut winners: Vec<Node> = Vec::new();

                for node in &level {
                    self.check_cancel()?;
                    for &opcode in &choices {
                        self.guard_length(node.suffix.len() + 2)?;

                        let parent_fingerprint = node.state.fingerprint;
                        let (child, child_hit) = self.cached_step(&node.state, opcode)?;
                        self.stats.evaluations += 1;

                        if !repeated.insert(child.fingerprint) {
                            self.stats.pruned += 1;
                            self.stats.repeated_state_pruned += 1;
                            self.record(
                                depth,
                                &parent_fingerprint,
                                opcode,
                                TraceReason::RepeatedState,
                                &child,
                            );
                            continue;
                        }

                        if !target_prefix.starts_with(&child.output) {
                            self.stats.pruned += 1;
                            self.record(
                                depth,
                                &parent_fingerprint,
                                opcode,
                                TraceReason::PrefixMismatch,
                                &child,
                            );
                            continue;
                        }

                        let (probe, probe_hit) = self.cached_step(&child, Opcode::Out)?;
                        let mut suffix = node.suffix.clone();
                        suffix.push(opcode);

                        if probe.output == target_prefix {
                            self.record(
                                depth,
                                &parent_fingerprint,
                                opcode,
                                TraceReason::Accepted,
                                &probe,
                            );
                            let mut winning = suffix.clone();
                            winning.push(Opcode::Out);
                            winners.push(Node {
                                suffix: winning,
                                state: probe,
                            });
                        } else {
                            self.stats.pruned += 1;
                            let reason = if child_hit && probe_hit {
                                TraceReason::CacheHit
                            } else {
                                TraceReason::PrefixMismatch
                            };
                            self.record(depth, &parent_fingerprint, opcode, reason, &probe);
                        }

                        next_level.push(Node {
                            suffix,
                            state: child,
                        });
                    }
                }

                if !winners.is_empty() {
                    // Shortest suffix first (all winners in one round share a
                    // depth), then opcode_choices order, then fingerprint.
                    winners.sort_by_key(|node| {
                        (
                            node.suffix.len(),
                            suffix_rank(&node.suffix, &choices),
                            node.state.fingerprint,
                        )
                    });
                    let winner = winners.remove(0);
                    self.program.extend_from_slice(&winner.suffix);
                    self.frontier = winner.state;
                    return Ok(());
                }

                level = next_level;
                if level.is_empty() {
                    break;
                }
            }

            if draws >= self.max_random_extensions {
                return Err(GenerationError::GenerationExhausted {
                    byte_index: index,
                    draws,
                });
            }
            draws += 1;

            // Advance the frontier by one seeded draw and search again.
            self.guard_length(1)?;
            let opcode = choices[self.rng.gen_range(0..choices.len())];
            let frontier = self.frontier.clone();
            let (state, _) = self.cached_step(&frontier, opcode)?;
            self.stats.evaluations += 1;
            self.record(0, &frontier.fingerprint, opcode, TraceReason::Accepted, &state);
            self.program.push(opcode);
            self.frontier = state;
        }
    }

    /// Applies one opcode to a parent state, consulting the snapshot cache
    /// before touching the interpreter.
    fn cached_step(
        &mut self,
        parent: &Arc<SearchState>,
        opcode: Opcode,
    ) -> Result<(Arc<SearchState>, bool), GenerationError> {
        let symbol = opcode.symbol();
        if let Some(hit) = self.cache.get(&parent.fingerprint, symbol) {
            self.stats.cache_hits += 1;
            return Ok((hit, true));
        }

        let result = self
            .interpreter
            .execute_from_snapshot(&parent.machine, &[opcode], false)?;
        let machine = self.interpreter.machine().clone();
        let mut output = parent.output.clone();
        output.extend_from_slice(&result.output);
        let fingerprint = machine.fingerprint(output.len() as u64);
        let state = Arc::new(SearchState {
            machine,
            output,
            fingerprint,
        });
        self.cache.insert(parent.fingerprint, symbol, state.clone());
        Ok((state, false))
    }

    fn record(
        &mut self,
        depth: usize,
        parent: &Fingerprint,
        opcode: Opcode,
        reason: TraceReason,
        state: &SearchState,
    ) {
        if !self.capture_trace {
            return;
        }
        self.trace.push(TraceEvent {
            depth,
            parent_fingerprint: parent.to_string(),
            symbol: opcode.symbol() as char,
            reason,
            output_length: state.output.len(),
            fingerprint: state.fingerprint.to_string(),
        });
    }

    /// Checks that `extra` more opcodes plus the final halt still fit.
    fn guard_length(&self, extra: usize) -> Result<(), GenerationError> {
        let length = self.program.len() + extra + 1;
        if length > self.max_program_length {
            return Err(GenerationError::ProgramLengthExceeded {
                length,
                limit: self.max_program_length,
            });
        }
        Ok(())
    }

    fn check_cancel(&self) -> Result<(), GenerationError> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(GenerationError::Cancelled);
        }
        Ok(())
    }
}

/// Validates `opcode_choices` and returns them in tie-break order.
fn parse_choices(choices: &str) -> Result<Vec<Opcode>, GenerationError> {
    let invalid = || GenerationError::InvalidOpcodeChoices {
        choices: choices.to_string(),
    };
    let mut parsed: Vec<Opcode> = Vec::new();
    for ch in choices.chars() {
        let op = u8::try_from(ch as u32)
            .ok()
            .and_then(Opcode::from_symbol)
            .ok_or_else(invalid)?;
        if !CONSTRUCTION_CHOICES.contains(&op) || parsed.contains(&op) {
            return Err(invalid());
        }
        parsed.push(op);
    }
    if parsed.is_empty() {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Maps a suffix to its position ranks in the configured choice order.
fn suffix_rank(suffix: &[Opcode], choices: &[Opcode]) -> Vec<usize> {
    suffix
        .iter()
        .map(|op| {
            choices
                .iter()
                .position(|choice| choice == op)
                .unwrap_or(choices.len())
        })
        .collect()
}
