// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use viper_conformance::compile;
use viper_il::transform::OptLevel;
use viper_vm::{Slot, Vm, VmConfig};

// The base case returns 37 + len(s) so it only yields 42 if `s` survived every tail call.
const COUNTDOWN: &str = "il 0.1.2
extern @rt_concat(str, str) -> str
extern @rt_str_len(str) -> i64
func @countdown(i64 %n, str %s) -> i64 {
entry:
  %z = icmp_eq %n, 0
  cbr %z, done, again
done:
  %len = call @rt_str_len(%s)
  %r = add.i64 %len, 37
  ret %r
again:
  %m = sub.i64 %n, 1
  %t = call @countdown(%m, %s)
  ret %t
}
func @start(i64 %n) -> i64 {
entry:
  %a = const_str \"hel\"
  %b = const_str \"lo\"
  %s = call @rt_concat(%a, %b)
  %r = call @countdown(%n, %s)
  release %s
  ret %r
}
";

#[test]
fn string_argument_survives_self_tail_calls() {
    let program = compile(COUNTDOWN, OptLevel::O0).unwrap();
    let mut vm = Vm::new(VmConfig::new());
    assert_eq!(
        vm.run(&program, "start", &[Slot::I64(5)]),
        Ok(Some(Slot::I64(42)))
    );
    let live = vm.context().heap.live_objects();
    assert_eq!(
        vm.run(&program, "start", &[Slot::I64(5)]),
        Ok(Some(Slot::I64(42)))
    );
    assert_eq!(
        vm.context().heap.live_objects(),
        live,
        "the concatenated string is released after each run"
    );
}

#[test]
fn tail_calls_run_in_constant_frame_depth() {
    let program = compile(COUNTDOWN, OptLevel::O1).unwrap();
    let mut config = VmConfig::new();
    config.limits.max_call_depth = 4;

    let mut vm = Vm::new(config);
    assert_eq!(
        vm.run(&program, "start", &[Slot::I64(1000)]),
        Ok(Some(Slot::I64(42)))
    );

    config.tail_calls = false;
    let mut vm = Vm::new(config);
    let err = vm.run(&program, "start", &[Slot::I64(1000)]).unwrap_err();
    assert_eq!(err.message.as_deref(), Some("call depth exceeded"));
    assert_eq!(&*err.function, "countdown");
}

#[test]
fn plain_calls_and_tail_calls_leave_the_same_heap() {
    let program = compile(COUNTDOWN, OptLevel::O0).unwrap();
    let mut counts = Vec::new();
    for tail_calls in [true, false] {
        let mut config = VmConfig::new();
        config.tail_calls = tail_calls;
        let mut vm = Vm::new(config);
        assert_eq!(
            vm.run(&program, "start", &[Slot::I64(20)]),
            Ok(Some(Slot::I64(42)))
        );
        counts.push(vm.context().heap.live_objects());
    }
    assert_eq!(counts[0], counts[1], "tail calls must not leak or over-release");
}
