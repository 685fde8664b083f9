use super::*;
use crate::machine::interpreter::HaltReason;

fn config_with_seed(seed: u64) -> GenerationConfig {
    GenerationConfig {
        random_seed: Some(seed),
        ..GenerationConfig::default()
    }
}

fn bootstrap_symbols() -> String {
    format!("i{}", "o".repeat(99))
}

// ==================== Basic generation ====================

#[test]
fn generates_a_single_byte_target() {
    let result = Generator::new()
        .generate_for_string("A", &config_with_seed(0))
        .expect("generation failed");

    assert_eq!(result.target, "A");
    assert_eq!(result.machine_output, b"A");
    assert!(result.opcodes.starts_with(&bootstrap_symbols()));
    assert!(result.opcodes.ends_with('v'));
    assert!(result.stats.evaluations >= 1);
    assert!(result.stats.pruned <= result.stats.evaluations);
    assert!(result.stats.duration_ns > 0);
    assert!(result.trace.is_none());
}

#[test]
fn generated_program_reexecutes_to_the_target() {
    let result = Generator::new()
        .generate_for_string("A", &config_with_seed(0))
        .expect("generation failed");

    let executed = Interpreter::default()
        .execute(&result.opcodes, false)
        .expect("load failed");
    assert_eq!(executed.output, b"A");
    assert_eq!(executed.halt_reason, HaltReason::HaltOpcode);

    // The bootstrap jump lands on cell 98, so exactly the cells from there
    // on execute once each and the tape never grows during synthesis.
    let length = result.opcodes.len() as u64;
    assert_eq!(executed.steps, length - 98);
    assert_eq!(executed.peak_memory_cells, result.opcodes.len());
    assert_eq!(executed.memory_expansions, 0);
}

#[test]
fn ascii_source_decodes_back_to_the_opcodes() {
    let result = Generator::new()
        .generate_for_string("A", &config_with_seed(3))
        .expect("generation failed");

    let from_ascii = crate::encoding::decode_source(&result.ascii_source).unwrap();
    let from_symbols = crate::encoding::parse_symbols(&result.opcodes).unwrap();
    assert_eq!(from_ascii, from_symbols);
}

#[test]
fn empty_target_yields_bootstrap_plus_halt() {
    let result = Generator::new()
        .generate_for_string("", &config_with_seed(0))
        .expect("generation failed");

    assert_eq!(result.opcodes, format!("{}v", bootstrap_symbols()));
    assert_eq!(result.machine_output, b"");
    assert_eq!(result.stats.evaluations, 0);
    assert_eq!(result.stats.pruned, 0);
}

// ==================== Determinism ====================

#[test]
fn identical_configs_generate_identical_programs() {
    let config = GenerationConfig {
        capture_trace: true,
        ..config_with_seed(7)
    };

    let first = Generator::new()
        .generate_for_string("Hi", &config)
        .expect("generation failed");
    let second = Generator::new()
        .generate_for_string("Hi", &config)
        .expect("generation failed");

    assert_eq!(first.opcodes, second.opcodes);
    assert_eq!(first.ascii_source, second.ascii_source);
    assert_eq!(first.machine_output, b"Hi");
    assert_eq!(first.machine_output, second.machine_output);
    assert_eq!(first.trace, second.trace);

    let mut stats_one = first.stats.clone();
    let mut stats_two = second.stats.clone();
    stats_one.duration_ns = 0;
    stats_two.duration_ns = 0;
    assert_eq!(stats_one, stats_two);
}

#[test]
fn seed_changes_the_search_but_never_the_output() {
    let first = Generator::new()
        .generate_for_string("A", &config_with_seed(0))
        .expect("generation failed");
    let second = Generator::new()
        .generate_for_string("A", &config_with_seed(1))
        .expect("generation failed");

    assert_eq!(first.machine_output, b"A");
    assert_eq!(second.machine_output, b"A");
}

// ==================== Configuration validation ====================

#[test]
fn opcode_choices_must_be_construction_opcodes() {
    let generator = Generator::new();
    for choices in ["", "xq", "op<", "ov", "oo"] {
        let config = GenerationConfig {
            opcode_choices: choices.to_string(),
            ..config_with_seed(0)
        };
        let err = generator
            .generate_for_string("A", &config)
            .expect_err("expected invalid choices");
        assert_eq!(
            err,
            GenerationError::InvalidOpcodeChoices {
                choices: choices.to_string()
            }
        );
    }
}

#[test]
fn subset_choice_order_is_accepted() {
    // "*po" is a permutation of the full set; it changes tie-breaking
    // order but must still generate correctly.
    let config = GenerationConfig {
        opcode_choices: "*po".to_string(),
        ..config_with_seed(5)
    };
    let result = Generator::new()
        .generate_for_string("A", &config)
        .expect("generation failed");
    assert_eq!(result.machine_output, b"A");
}

#[test]
fn bootstrap_must_fit_the_program_length_limit() {
    let config = GenerationConfig {
        max_program_length: 100,
        ..config_with_seed(0)
    };
    let err = Generator::new()
        .generate_for_string("A", &config)
        .expect_err("expected length error");
    assert_eq!(
        err,
        GenerationError::ProgramLengthExceeded {
            length: 101,
            limit: 100
        }
    );
}

// ==================== Exhaustion and cancellation ====================

#[test]
fn nop_only_choices_exhaust_the_random_budget() {
    // With only `o` available the accumulator never changes, so no probe
    // can ever produce a nonzero byte.
    let config = GenerationConfig {
        opcode_choices: "o".to_string(),
        max_random_extensions: 4,
        ..config_with_seed(9)
    };
    let err = Generator::new()
        .generate_for_string("A", &config)
        .expect_err("expected exhaustion");
    assert_eq!(
        err,
        GenerationError::GenerationExhausted {
            byte_index: 0,
            draws: 4
        }
    );
}

#[test]
fn cancellation_aborts_the_search() {
    let flag = Arc::new(AtomicBool::new(true));
    let config = GenerationConfig {
        cancel: Some(flag),
        ..config_with_seed(0)
    };
    let err = Generator::new()
        .generate_for_string("A", &config)
        .expect_err("expected cancellation");
    assert_eq!(err, GenerationError::Cancelled);
}

// ==================== Statistics and trace ====================

#[test]
fn pruning_counters_obey_the_law() {
    let result = Generator::new()
        .generate_for_string("Hi", &config_with_seed(42))
        .expect("generation failed");

    let stats = &result.stats;
    assert!(stats.pruned <= stats.evaluations);
    assert!(stats.repeated_state_pruned <= stats.pruned);
    assert!((0.0..=1.0).contains(&stats.pruned_ratio));
    assert!((0.0..=1.0).contains(&stats.repeated_state_ratio));
}

#[test]
fn trace_records_one_event_per_evaluation() {
    let config = GenerationConfig {
        capture_trace: true,
        ..config_with_seed(0)
    };
    let result = Generator::new()
        .generate_for_string("A", &config)
        .expect("generation failed");

    let trace = result.trace.as_ref().expect("trace missing");
    assert_eq!(trace.len() as u64, result.stats.evaluations);
    assert_eq!(trace.len(), result.stats.trace_length);

    let pruned_events = trace
        .iter()
        .filter(|event| {
            matches!(
                event.reason,
                TraceReason::PrefixMismatch | TraceReason::RepeatedState | TraceReason::CacheHit
            )
        })
        .count() as u64;
    let accepted_events = trace
        .iter()
        .filter(|event| event.reason == TraceReason::Accepted)
        .count() as u64;

    assert_eq!(pruned_events, result.stats.pruned);
    assert_eq!(accepted_events + pruned_events, result.stats.evaluations);
}

#[test]
fn trace_is_absent_when_disabled() {
    let result = Generator::new()
        .generate_for_string("A", &config_with_seed(0))
        .expect("generation failed");
    assert!(result.trace.is_none());
    assert_eq!(result.stats.trace_length, 0);
}
