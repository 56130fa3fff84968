// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use viper_conformance::{compile, execute};
use viper_il::transform::OptLevel;
use viper_rt::TrapKind;
use viper_vm::{DispatchKind, Slot, VmConfig};

// `@peek` sits at the depth `@leak` vacated, so only the activation id tells the frames apart.
const LEAKED_LOCAL: &str = "il 0.1.2
func @leak() -> ptr {
entry:
  %p = alloca 8
  store.i64 %p, 7
  ret %p
}
func @peek(ptr %q) -> i64 {
entry:
  %own = alloca 8
  store.i64 %own, 99
  %v = load.i64 %q
  ret %v
}
func @main() -> i64 {
entry:
  %q = call @leak()
  %v = call @peek(%q)
  %w = add.i64 %v, 0
  ret %w
}
";

#[test]
fn load_through_a_returned_frame_traps() {
    for level in [OptLevel::O0, OptLevel::O2] {
        let program = compile(LEAKED_LOCAL, level).unwrap();
        for dispatch in [DispatchKind::Switch, DispatchKind::Threaded] {
            let out = execute(&program, VmConfig::new().with_dispatch(dispatch), "main", &[]);
            let err = out.result.unwrap_err();
            assert_eq!(err.kind, TrapKind::InvalidOperation, "{level:?} {dispatch:?}");
            assert_eq!(err.message.as_deref(), Some("dangling stack pointer"));
            assert_eq!(&*err.function, "peek");
        }
    }
}

const CALLER_LOCAL: &str = "il 0.1.2
func @fill(ptr %p) -> void {
entry:
  store.i64 %p, 41
  ret
}
func @main() -> i64 {
entry:
  %p = alloca 8
  call @fill(%p)
  %v = load.i64 %p
  %r = add.i64 %v, 1
  ret %r
}
";

#[test]
fn callee_may_write_through_a_live_caller_pointer() {
    for level in [OptLevel::O0, OptLevel::O2] {
        let program = compile(CALLER_LOCAL, level).unwrap();
        let out = execute(&program, VmConfig::new(), "main", &[]);
        assert_eq!(out.result, Ok(Some(Slot::I64(42))), "{level:?}");
    }
}
