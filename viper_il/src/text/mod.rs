// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IL text format: parser and canonical printer.

mod lexer;
mod parse;
mod print;

pub use parse::{ParseError, parse_module};
pub use print::{print_module, write_function, write_instr, write_module};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;
    use crate::types::Type;
    use crate::value::Value;

    const BITWISE: &str = "il 0.1.2
func @main() -> i64 {
entry:
  %a = iconst.i64 0xFF00FF00
  %b = iconst.i64 0x00000100
  %c = and.i64 %a, %b
  %d = or.i64 %c, 0x2
  %e = xor.i64 %d, 0x5
  ret %e
}
";

    #[test]
    fn parses_the_bitwise_program() {
        let m = parse_module(BITWISE).unwrap();
        let f = m.function("main").unwrap();
        assert_eq!(f.ret_ty, Type::I64);
        let entry = &f.blocks[0];
        assert_eq!(entry.instrs.len(), 6);
        assert_eq!(entry.instrs[0].op, Opcode::IConst);
        assert_eq!(entry.instrs[0].operands[0], Value::ConstInt(0xFF00_FF00));
        assert_eq!(entry.instrs[2].op, Opcode::And);
        assert_eq!(entry.instrs[2].ty, Type::I64);
        assert_eq!(entry.instrs[5].op, Opcode::Ret);
    }

    #[test]
    fn printed_form_parses_back_to_the_same_module() {
        let src = r#"il 0.1.2
extern @rt_print_str(str) -> void
global const str @greeting = "hi\n"

func @f(i64 %n, str %s) -> i64 {
entry:
  .loc 1 3 5
  %c = scmp_gt %n, 0
  cbr %c, body(%n), done
body(%k: i64):
  %m = iadd.ovf.i64 %k, -1
  call @rt_print_str(%s)
  switch.i32 %m, default done, 0 -> done, 7 -> body(%m)
done:
  %x = fconst.f64 2.5
  ret 1
}
"#;
        let m = parse_module(src).unwrap();
        let printed = print_module(&m);
        let again = parse_module(&printed).unwrap();
        assert_eq!(m, again, "{printed}");
        let f = again.function("f").unwrap();
        assert_eq!(f.blocks[0].instrs[0].loc.line, 3);
        assert_eq!(f.blocks[1].instrs[2].labels.len(), 3);
    }

    #[test]
    fn call_result_type_comes_from_the_callee() {
        let src = "il 0.1.2
extern @rt_pow_f64(f64, f64) -> f64
func @main() -> f64 {
entry:
  %r = call @rt_pow_f64(2.0, 3.0)
  ret %r
}
";
        let m = parse_module(src).unwrap();
        let call = &m.functions[0].blocks[0].instrs[0];
        assert_eq!(call.ty, Type::F64);
        assert_eq!(call.callee.as_deref(), Some("rt_pow_f64"));
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = parse_module("il 0.1.2\nfunc @f() -> void {\nentry:\n  frob 1\n}\n").unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("frob"), "{err}");

        let err = parse_module("func @f() -> void {\n}\n").unwrap_err();
        assert_eq!(err.line, 1);

        let err =
            parse_module("il 0.1.2\nfunc @f() -> i64 {\nentry:\n  ret %nope\n}\n").unwrap_err();
        assert!(err.message.contains("undefined temp"), "{err}");
    }

    #[test]
    fn string_literals_intern_into_the_pool() {
        let src = r#"il 0.1.2
global const str @.L0 = "hello"
func @main() -> void {
entry:
  %a = const_str .L0
  %b = const_str "hello"
  %c = const_str "other"
  ret
}
"#;
        let m = parse_module(src).unwrap();
        let ops: alloc::vec::Vec<_> = m.functions[0].blocks[0]
            .instrs
            .iter()
            .take(3)
            .map(|i| i.operands[0].clone())
            .collect();
        assert_eq!(ops[0], ops[1]);
        assert_ne!(ops[0], ops[2]);
        assert_eq!(m.literals().len(), 2);
    }
}
