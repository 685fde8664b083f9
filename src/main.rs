//! Malbolge toolkit command line.
//!
//! # Usage
//! ```text
//! malbolge <command> [OPTIONS]
//! ```
//!
//! # Commands
//! - `generate --text T [--seed N] [--max-depth D] [--opcodes STR] [--trace]`
//!   Synthesize a program printing `T`; prints the opcodes, the ASCII
//!   source, the verified output and the search stats as JSON.
//! - `run (--opcodes S | --opcodes-file P | --ascii S | --ascii-file P)
//!   [--cycle-limit N | --no-cycle-detection] [--max-steps N]`
//!   Execute a program and print its output plus `key=value` diagnostics.
//! - `bench [--module interpreter|generator|all]`
//!   Built-in micro-benchmarks, reported as JSON.
//!
//! A global `--log-level info|warn|error` flag configures stderr logging.
//! Exit code 0 on success; 1 on load errors, abnormal halts, or generator
//! failure.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::process;
use std::time::Instant;

use malbolge::utils::log::{self, Level, Logger};
use malbolge::{
    encoding, GenerationConfig, Generator, HaltReason, Interpreter, InterpreterConfig, TraceReason,
};

fn main() {
    process::exit(run(env::args().skip(1).collect()));
}

fn run(mut args: Vec<String>) -> i32 {
    let log = Logger::new("cli");

    let mut level = Level::Warn;
    if let Some(position) = args.iter().position(|arg| arg == "--log-level") {
        let Some(name) = args.get(position + 1) else {
            eprintln!("error: --log-level requires a value");
            return 1;
        };
        let Some(parsed) = Level::parse(name) else {
            eprintln!("error: unknown log level '{name}'");
            return 1;
        };
        level = parsed;
        args.drain(position..=position + 1);
    }
    log::init(level);

    let Some(command) = args.first().cloned() else {
        print_usage();
        return 1;
    };

    let outcome = match command.as_str() {
        "generate" => generate_command(&args[1..]),
        "run" => run_command(&args[1..]),
        "bench" => bench_command(&args[1..]),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(0)
        }
        other => Err(format!("unknown command '{other}'")),
    };

    match outcome {
        Ok(code) => code,
        Err(message) => {
            log.error(&message);
            eprintln!("error: {message}");
            1
        }
    }
}

fn print_usage() {
    eprintln!("usage: malbolge [--log-level LEVEL] <command> [OPTIONS]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  generate --text T [--seed N] [--max-depth D] [--opcodes STR] [--trace]");
    eprintln!("  run (--opcodes S | --opcodes-file P | --ascii S | --ascii-file P)");
    eprintln!("      [--cycle-limit N | --no-cycle-detection] [--max-steps N]");
    eprintln!("  bench [--module interpreter|generator|all]");
}

/// Returns the value following a flag, advancing the cursor past both.
fn take_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str, String> {
    *index += 1;
    let value = args
        .get(*index)
        .ok_or_else(|| format!("{flag} requires a value"))?;
    *index += 1;
    Ok(value)
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{flag} expects a number, got '{value}'"))
}

// ==================== generate ====================

fn generate_command(args: &[String]) -> Result<i32, String> {
    let mut text: Option<String> = None;
    let mut config = GenerationConfig::default();

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--text" => text = Some(take_value(args, &mut index, "--text")?.to_string()),
            "--seed" => {
                let value = take_value(args, &mut index, "--seed")?;
                config.random_seed = Some(parse_number(value, "--seed")?);
            }
            "--max-depth" => {
                let value = take_value(args, &mut index, "--max-depth")?;
                config.max_search_depth = parse_number(value, "--max-depth")?;
            }
            "--opcodes" => {
                config.opcode_choices = take_value(args, &mut index, "--opcodes")?.to_string();
            }
            "--trace" => {
                config.capture_trace = true;
                index += 1;
            }
            other => return Err(format!("generate: unknown option '{other}'")),
        }
    }

    let target = text.ok_or("generate requires --text")?;
    let result = Generator::new()
        .generate_for_string(&target, &config)
        .map_err(|err| err.to_string())?;

    println!("{}", result.opcodes);
    println!("{}", result.ascii_source);
    println!("{}", String::from_utf8_lossy(&result.machine_output));
    let stats = serde_json::to_string(&result.stats).map_err(|err| err.to_string())?;
    println!("stats={stats}");

    if let Some(trace) = &result.trace {
        let rendered = serde_json::to_string(trace).map_err(|err| err.to_string())?;
        println!("trace={rendered}");

        let mut reasons: BTreeMap<&str, u64> = BTreeMap::new();
        for event in trace {
            *reasons.entry(reason_name(event.reason)).or_default() += 1;
        }
        let summary = serde_json::to_string(&reasons).map_err(|err| err.to_string())?;
        println!("trace_summary={summary}");
    }

    Ok(0)
}

fn reason_name(reason: TraceReason) -> &'static str {
    match reason {
        TraceReason::Accepted => "accepted",
        TraceReason::PrefixMismatch => "prefix_mismatch",
        TraceReason::RepeatedState => "repeated_state",
        TraceReason::CacheHit => "cache_hit",
    }
}

// ==================== run ====================

enum ProgramText {
    Opcodes(String),
    Ascii(String),
}

fn run_command(args: &[String]) -> Result<i32, String> {
    let mut program: Option<ProgramText> = None;
    let mut cycle_limit: Option<usize> = None;
    let mut no_cycle_detection = false;
    let mut max_steps: Option<u64> = None;

    fn set_program(slot: &mut Option<ProgramText>, text: ProgramText) -> Result<(), String> {
        if slot.is_some() {
            return Err(
                "run takes exactly one of --opcodes, --opcodes-file, --ascii, --ascii-file"
                    .to_string(),
            );
        }
        *slot = Some(text);
        Ok(())
    }

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--opcodes" => {
                let value = take_value(args, &mut index, "--opcodes")?.to_string();
                set_program(&mut program, ProgramText::Opcodes(value))?;
            }
            "--opcodes-file" => {
                let path = take_value(args, &mut index, "--opcodes-file")?;
                let value = fs::read_to_string(path)
                    .map_err(|err| format!("failed to read {path}: {err}"))?;
                set_program(&mut program, ProgramText::Opcodes(value))?;
            }
            "--ascii" => {
                let value = take_value(args, &mut index, "--ascii")?.to_string();
                set_program(&mut program, ProgramText::Ascii(value))?;
            }
            "--ascii-file" => {
                let path = take_value(args, &mut index, "--ascii-file")?;
                let value = fs::read_to_string(path)
                    .map_err(|err| format!("failed to read {path}: {err}"))?;
                set_program(&mut program, ProgramText::Ascii(value))?;
            }
            "--cycle-limit" => {
                let value = take_value(args, &mut index, "--cycle-limit")?;
                cycle_limit = Some(parse_number(value, "--cycle-limit")?);
            }
            "--no-cycle-detection" => {
                no_cycle_detection = true;
                index += 1;
            }
            "--max-steps" => {
                let value = take_value(args, &mut index, "--max-steps")?;
                max_steps = Some(parse_number(value, "--max-steps")?);
            }
            other => return Err(format!("run: unknown option '{other}'")),
        }
    }

    if no_cycle_detection && cycle_limit.is_some() {
        return Err("--cycle-limit conflicts with --no-cycle-detection".to_string());
    }

    let opcodes = match program.ok_or("run requires a program")? {
        ProgramText::Opcodes(text) => {
            let stripped: String = text.split_whitespace().collect();
            encoding::parse_symbols(&stripped).map_err(|err| err.to_string())?
        }
        ProgramText::Ascii(text) => {
            encoding::decode_source(&text).map_err(|err| err.to_string())?
        }
    };

    let mut config = InterpreterConfig::default();
    if no_cycle_detection {
        config.cycle_detection_limit = 0;
    } else if let Some(limit) = cycle_limit {
        config.cycle_detection_limit = limit;
    }
    if let Some(limit) = max_steps {
        config.max_steps = limit;
    }

    let mut interpreter = Interpreter::new(config);
    let result = interpreter
        .execute_opcodes(&opcodes, true)
        .map_err(|err| err.to_string())?;

    println!("{}", String::from_utf8_lossy(&result.output));
    println!("halt_reason={}", result.halt_reason);
    println!("steps={}", result.steps);
    if let Some(instruction) = result.halt_metadata.last_instruction {
        println!("halt_instruction={instruction}");
    }
    if let Some(target) = result.halt_metadata.last_jump_target {
        println!("last_jump_target={target}");
    }
    println!("cycle_detected={}", result.halt_metadata.cycle_detected);
    println!(
        "cycle_tracking_limited={}",
        result.halt_metadata.cycle_tracking_limited
    );
    if let Some(length) = result.halt_metadata.cycle_repeat_length {
        println!("cycle_repeat_length={length}");
    }
    println!("memory_expansions={}", result.memory_expansions);
    println!("peak_tape_cells={}", result.peak_memory_cells);
    if let Some(machine) = &result.machine {
        println!("tape_length={}", machine.tape.len());
    }

    match result.halt_reason {
        HaltReason::HaltOpcode | HaltReason::EndOfProgram => Ok(0),
        _ => Ok(1),
    }
}

// ==================== bench ====================

fn bench_command(args: &[String]) -> Result<i32, String> {
    let mut module = "all".to_string();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--module" => module = take_value(args, &mut index, "--module")?.to_string(),
            other => return Err(format!("bench: unknown option '{other}'")),
        }
    }

    match module.as_str() {
        "interpreter" => print_report(bench_interpreter())?,
        "generator" => print_report(bench_generator()?)?,
        "all" => {
            print_report(bench_interpreter())?;
            print_report(bench_generator()?)?;
        }
        other => return Err(format!("bench: unknown module '{other}'")),
    }
    Ok(0)
}

fn print_report(report: serde_json::Value) -> Result<(), String> {
    let rendered = serde_json::to_string(&report).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn measure(name: &str, iterations: u32, mut work: impl FnMut()) -> serde_json::Value {
    let started = Instant::now();
    for _ in 0..iterations {
        work();
    }
    let total_ns = started.elapsed().as_nanos() as u64;
    serde_json::json!({
        "name": name,
        "iterations": iterations,
        "total_ns": total_ns,
        "ns_per_iteration": total_ns / u64::from(iterations.max(1)),
    })
}

fn bench_interpreter() -> serde_json::Value {
    let bootstrap = format!("i{}", "o".repeat(99));

    let halt = measure("execute_halt", 1000, || {
        let _ = Interpreter::default().execute("v", false);
    });
    let runway = measure("execute_bootstrap", 500, || {
        let _ = Interpreter::default().execute(&bootstrap, false);
    });

    serde_json::json!({
        "module": "interpreter",
        "benchmarks": [halt, runway],
    })
}

fn bench_generator() -> Result<serde_json::Value, String> {
    let config = GenerationConfig {
        random_seed: Some(42),
        ..GenerationConfig::default()
    };
    let generator = Generator::new();

    let mut failure: Option<String> = None;
    let generate = measure("generate_hi", 3, || {
        if let Err(err) = generator.generate_for_string("Hi", &config) {
            failure = Some(err.to_string());
        }
    });
    if let Some(message) = failure {
        return Err(format!("generator benchmark failed: {message}"));
    }

    Ok(serde_json::json!({
        "module": "generator",
        "benchmarks": [generate],
    }))
}
