// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use viper_il::transform::{OptLevel, PassManager};
use viper_vm::{DispatchKind, Program, RuntimeRegistry, Slot, Vm, VmConfig};

/// Entry point for `viper_vm` dispatch benchmarks.
///
/// Each scenario runs under both dispatch strategies so the two can be compared directly.
fn bench_dispatch(c: &mut Criterion) {
    bench_loop_sum(c);
    bench_recursive_call(c);
    bench_string_concat(c);
}

const STRATEGIES: [DispatchKind; 2] = [DispatchKind::Switch, DispatchKind::Threaded];

fn load(src: &str, level: OptLevel) -> Program {
    let mut module = viper_il::text::parse_module(src).unwrap();
    let mut diags = viper_il::Diagnostics::new();
    assert!(
        PassManager::for_level(level).run(&mut module, &mut diags),
        "pipeline failed: {:?}",
        diags.errors()
    );
    Program::load(&module, &RuntimeRegistry::with_defaults()).unwrap()
}

const LOOP_SUM: &str = "il 0.1.2
func @sum(i64 %n) -> i64 {
entry:
  br loop(0, 0)
loop(%i: i64, %acc: i64):
  %done = scmp_ge %i, %n
  cbr %done, exit(%acc), body
body:
  %acc2 = add.i64 %acc, %i
  %i2 = add.i64 %i, 1
  br loop(%i2, %acc2)
exit(%r: i64):
  ret %r
}
";

fn bench_loop_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("loop_sum");
    let program = load(LOOP_SUM, OptLevel::O1);
    for dispatch in STRATEGIES {
        for &n in &[1_000_i64, 100_000] {
            let mut vm = Vm::new(VmConfig::new().with_dispatch(dispatch));
            group.bench_with_input(
                BenchmarkId::new(format!("{dispatch:?}"), n),
                &n,
                |b, &n| {
                    b.iter(|| {
                        let out = vm.run(&program, "sum", &[Slot::I64(black_box(n))]);
                        black_box(out).unwrap();
                    });
                },
            );
        }
    }
    group.finish();
}

const FIB: &str = "il 0.1.2
func @fib(i64 %n) -> i64 {
entry:
  %small = scmp_lt %n, 2
  cbr %small, base, rec
base:
  ret %n
rec:
  %a = sub.i64 %n, 1
  %fa = call @fib(%a)
  %b = sub.i64 %n, 2
  %fb = call @fib(%b)
  %r = add.i64 %fa, %fb
  ret %r
}
";

fn bench_recursive_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("recursive_fib");
    let program = load(FIB, OptLevel::O2);
    for dispatch in STRATEGIES {
        let mut vm = Vm::new(VmConfig::new().with_dispatch(dispatch));
        group.bench_function(format!("{dispatch:?}/20"), |b| {
            b.iter(|| {
                let out = vm.run(&program, "fib", &[Slot::I64(black_box(20))]);
                black_box(out).unwrap();
            });
        });
    }
    group.finish();
}

const CONCAT: &str = "il 0.1.2
extern @rt_concat(str, str) -> str
extern @rt_str_len(str) -> i64
func @build(i64 %n) -> i64 {
entry:
  %empty = const_str \"\"
  br loop(0, %empty)
loop(%i: i64, %s: str):
  %done = scmp_ge %i, %n
  cbr %done, exit(%s), body
body:
  %piece = const_str \"ab\"
  %s2 = call @rt_concat(%s, %piece)
  release %s
  %i2 = add.i64 %i, 1
  br loop(%i2, %s2)
exit(%r: str):
  %len = call @rt_str_len(%r)
  release %r
  ret %len
}
";

fn bench_string_concat(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_concat");
    let program = load(CONCAT, OptLevel::O0);
    for dispatch in STRATEGIES {
        let mut vm = Vm::new(VmConfig::new().with_dispatch(dispatch));
        group.bench_function(format!("{dispatch:?}/256"), |b| {
            b.iter(|| {
                let out = vm.run(&program, "build", &[Slot::I64(black_box(256))]);
                black_box(out).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
