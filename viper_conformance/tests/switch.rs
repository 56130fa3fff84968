// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use viper_conformance::{compile, execute};
use viper_il::transform::OptLevel;
use viper_vm::{DispatchKind, Slot, VmConfig};

const PICK: &str = "il 0.1.2
func @pick(i32 %v) -> i64 {
entry:
  switch.i32 %v, default l_d, 0 -> l_0, 1 -> l_1, 2 -> l_2
l_0:
  ret 100
l_1:
  ret 101
l_2:
  ret 102
l_d:
  ret 99
}
func @dup(i32 %v) -> i64 {
entry:
  switch.i32 %v, default l_d, 1 -> l_a, 1 -> l_b
l_a:
  ret 1
l_b:
  ret 2
l_d:
  ret 0
}
";

#[test]
fn switch_selects_the_matching_case_or_default() {
    for level in [OptLevel::O0, OptLevel::O2] {
        let program = compile(PICK, level).unwrap();
        for dispatch in [DispatchKind::Switch, DispatchKind::Threaded] {
            let config = VmConfig::new().with_dispatch(dispatch);
            for (arg, want) in [(0, 100), (1, 101), (2, 102), (37, 99), (-1, 99)] {
                let out = execute(&program, config, "pick", &[Slot::I64(arg)]);
                assert_eq!(
                    out.result,
                    Ok(Some(Slot::I64(want))),
                    "pick({arg}) at {level:?} under {dispatch:?}"
                );
            }
        }
    }
}

#[test]
fn duplicate_case_values_take_the_first_target() {
    let program = compile(PICK, OptLevel::O0).unwrap();
    let out = execute(&program, VmConfig::new(), "dup", &[Slot::I64(1)]);
    assert_eq!(out.result, Ok(Some(Slot::I64(1))));
    let out = execute(&program, VmConfig::new(), "dup", &[Slot::I64(5)]);
    assert_eq!(out.result, Ok(Some(Slot::I64(0))));
}

#[test]
fn constant_scrutinee_folds_to_a_branch() {
    let src = "il 0.1.2
func @main() -> i64 {
entry:
  switch.i32 2, default l_d, 1 -> l_1, 2 -> l_2
l_1:
  ret 1
l_2:
  ret 2
l_d:
  ret 0
}
";
    let mut module = viper_il::text::parse_module(src).unwrap();
    let mut pm = viper_il::transform::PassManager::new();
    pm.add_named("simplify-cfg");
    assert!(pm.run(&mut module, &mut viper_il::Diagnostics::new()), "simplify-cfg runs");
    let f = &module.functions[0];
    assert!(
        f.blocks
            .iter()
            .flat_map(|b| &b.instrs)
            .all(|i| i.op != viper_il::Opcode::SwitchI32),
        "the switch was folded away"
    );

    let program = compile(src, OptLevel::O1).unwrap();
    let out = execute(&program, VmConfig::new(), "main", &[]);
    assert_eq!(out.result, Ok(Some(Slot::I64(2))));
}
