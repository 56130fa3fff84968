// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use viper_conformance::{compile, execute};
use viper_il::transform::OptLevel;
use viper_vm::{Slot, VmConfig};

#[test]
fn printed_output_is_captured() {
    let src = "il 0.1.2
extern @rt_print_str(str) -> void
extern @rt_print_i64(i64) -> void
extern @rt_print_newline() -> void
func @main() -> i64 {
entry:
  %s = const_str \"answer=\"
  call @rt_print_str(%s)
  %x = mul.i64 6, 7
  call @rt_print_i64(%x)
  call @rt_print_newline()
  ret 0
}
";
    for level in [OptLevel::O0, OptLevel::O2] {
        let program = compile(src, level).unwrap();
        let out = execute(&program, VmConfig::new(), "main", &[]);
        assert_eq!(out.result, Ok(Some(Slot::I64(0))));
        assert_eq!(out.output, "answer=42\n", "{level:?}");
    }
}

#[test]
fn string_helpers_compose() {
    let src = "il 0.1.2
extern @rt_ucase(str) -> str
extern @rt_trim(str) -> str
extern @rt_mid(str, i64) -> str
extern @rt_instr(str, str) -> i64
extern @rt_print_str(str) -> void
func @main() -> i64 {
entry:
  %raw = const_str \"  viper il  \"
  %t = call @rt_trim(%raw)
  %u = call @rt_ucase(%t)
  release %t
  %tail = call @rt_mid(%u, 6)
  call @rt_print_str(%tail)
  %needle = const_str \"IL\"
  %pos = call @rt_instr(%u, %needle)
  release %u
  release %tail
  ret %pos
}
";
    let program = compile(src, OptLevel::O1).unwrap();
    let out = execute(&program, VmConfig::new(), "main", &[]);
    assert_eq!(out.result, Ok(Some(Slot::I64(7))));
    assert_eq!(out.output, "IL");
}

#[test]
fn exceptions_unwind_across_frames() {
    let src = "il 0.1.2
extern @rt_exc_create(str) -> ptr
extern @rt_exc_message(ptr) -> str
extern @rt_print_str(str) -> void
func @inner(i64 %n) -> i64 {
entry:
  %bad = scmp_lt %n, 0
  cbr %bad, raise, fine
raise:
  %m = const_str \"negative\"
  %e = call @rt_exc_create(%m)
  throw %e
fine:
  ret %n
}
func @outer(i64 %n) -> i64 {
entry:
  %r = call @inner(%n)
  %s = add.i64 %r, 1
  ret %s
}
func @main(i64 %n) -> i64 {
entry:
  eh.push catch
  %r = call @outer(%n)
  eh.pop
  ret %r
catch(%e: ptr):
  %msg = call @rt_exc_message(%e)
  call @rt_print_str(%msg)
  ret -1
}
";
    let program = compile(src, OptLevel::O0).unwrap();
    let out = execute(&program, VmConfig::new(), "main", &[Slot::I64(4)]);
    assert_eq!(out.result, Ok(Some(Slot::I64(5))));
    assert_eq!(out.output, "");

    let out = execute(&program, VmConfig::new(), "main", &[Slot::I64(-4)]);
    assert_eq!(out.result, Ok(Some(Slot::I64(-1))));
    assert_eq!(out.output, "negative");
}

#[test]
fn globals_are_zeroed_and_addressable() {
    let src = "il 0.1.2
global i64 @total
func @bump(i64 %by) -> void {
entry:
  %g = addr_of @total
  %old = load.i64 %g
  %new = add.i64 %old, %by
  store.i64 %g, %new
  ret
}
func @main() -> i64 {
entry:
  call @bump(40)
  call @bump(2)
  %g = addr_of @total
  %v = load.i64 %g
  ret %v
}
";
    let program = compile(src, OptLevel::O2).unwrap();
    let out = execute(&program, VmConfig::new(), "main", &[]);
    assert_eq!(out.result, Ok(Some(Slot::I64(42))));
}
