use criterion::{black_box, criterion_group, criterion_main, Criterion};
use malbolge::Interpreter;

fn bench_halt_program(c: &mut Criterion) {
    c.bench_function("interpreter/execute_halt", |b| {
        b.iter(|| {
            let mut interpreter = Interpreter::default();
            black_box(interpreter.execute(black_box("v"), false).unwrap());
        })
    });
}

fn bench_bootstrap_program(c: &mut Criterion) {
    let bootstrap = format!("i{}", "o".repeat(99));
    c.bench_function("interpreter/execute_bootstrap", |b| {
        b.iter(|| {
            let mut interpreter = Interpreter::default();
            black_box(interpreter.execute(black_box(&bootstrap), false).unwrap());
        })
    });
}

fn bench_snapshot_extension(c: &mut Criterion) {
    let bootstrap = format!("i{}", "o".repeat(99));
    let mut interpreter = Interpreter::default();
    let result = interpreter.execute(&bootstrap, true).unwrap();
    let snapshot = result.machine.unwrap();
    let suffix = [malbolge::Opcode::Crz, malbolge::Opcode::Out];

    c.bench_function("interpreter/extend_snapshot", |b| {
        b.iter(|| {
            black_box(
                interpreter
                    .execute_from_snapshot(&snapshot, black_box(&suffix), false)
                    .unwrap(),
            );
        })
    });
}

criterion_group!(
    benches,
    bench_halt_program,
    bench_bootstrap_program,
    bench_snapshot_extension
);
criterion_main!(benches);
