// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canonical IL text printer.

use alloc::string::String;
use core::fmt::{self, Write};

use crate::IL_VERSION;
use crate::instr::{Instr, SourceLoc};
use crate::module::{Function, Module, Param};
use crate::opcode::{OpClass, Opcode};
use crate::text::lexer::escape;
use crate::types::Type;
use crate::value::{Value, fmt_float};

/// Renders `module` in the canonical text form accepted by [`parse_module`](super::parse_module).
#[must_use]
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    // Writing into a `String` cannot fail.
    let _ = write_module(&mut out, module);
    out
}

/// Writes `module` in canonical text form.
pub fn write_module(out: &mut dyn Write, module: &Module) -> fmt::Result {
    writeln!(out, "il {IL_VERSION}")?;
    for e in &module.externs {
        write!(out, "extern @{}(", e.name)?;
        for (i, t) in e.params.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            write!(out, "{t}")?;
        }
        writeln!(out, ") -> {}", e.ret_ty)?;
    }
    for (i, lit) in module.literals().iter().enumerate() {
        writeln!(out, "global const str @.L{i} = \"{}\"", escape(lit))?;
    }
    for g in &module.globals {
        let kw = if g.is_const { "const " } else { "" };
        write!(out, "global {kw}{} @{}", g.ty, g.name)?;
        if let Some(lit) = g.init.and_then(|id| module.literal(id)) {
            write!(out, " = \"{}\"", escape(lit))?;
        }
        out.write_char('\n')?;
    }
    for f in &module.functions {
        out.write_char('\n')?;
        write_function(out, f)?;
    }
    Ok(())
}

struct Temp<'a>(&'a Function, crate::value::TempId);

impl fmt::Display for Temp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.value_name(self.1) {
            Some(name) => write!(f, "%{name}"),
            None => write!(f, "%t{}", self.1.0),
        }
    }
}

struct Operand<'a>(&'a Function, &'a Value);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.1 {
            Value::Temp(t) => Temp(self.0, *t).fmt(f),
            Value::ConstFloat(v) => fmt_float(*v, f),
            other => other.fmt(f),
        }
    }
}

fn write_params(out: &mut dyn Write, f: &Function, params: &[Param]) -> fmt::Result {
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{}: {}", Temp(f, p.id), p.ty)?;
    }
    Ok(())
}

fn write_values(out: &mut dyn Write, f: &Function, values: &[Value]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{}", Operand(f, v))?;
    }
    Ok(())
}

fn write_target(out: &mut dyn Write, f: &Function, instr: &Instr, i: usize) -> fmt::Result {
    let label = instr.labels.get(i).map_or("?", |l| &**l);
    out.write_str(label)?;
    let args = instr.args_for(i);
    if !args.is_empty() {
        out.write_char('(')?;
        write_values(out, f, args)?;
        out.write_char(')')?;
    }
    Ok(())
}

/// Whether the printed mnemonic carries a `.type` suffix.
fn prints_suffix(instr: &Instr) -> bool {
    if instr.ty == Type::Void {
        return false;
    }
    let class = instr.op.info().class;
    !matches!(class, OpClass::IntCompare | OpClass::FloatCompare)
        && !matches!(
            instr.op,
            Opcode::Trunc1
                | Opcode::ConstStr
                | Opcode::ConstNull
                | Opcode::Alloca
                | Opcode::Gep
                | Opcode::AddrOf
                | Opcode::Sitofp
        )
}

/// Writes one function.
pub fn write_function(out: &mut dyn Write, f: &Function) -> fmt::Result {
    write!(out, "func @{}(", f.name)?;
    write_params(out, f, &f.params)?;
    writeln!(out, ") -> {} {{", f.ret_ty)?;
    let mut loc = SourceLoc::default();
    for (bi, block) in f.blocks.iter().enumerate() {
        out.write_str(&block.label)?;
        if bi != 0 && !block.params.is_empty() {
            out.write_char('(')?;
            write_params(out, f, &block.params)?;
            out.write_char(')')?;
        }
        out.write_str(":\n")?;
        for instr in &block.instrs {
            if instr.loc.is_known() && instr.loc != loc {
                writeln!(
                    out,
                    "  .loc {} {} {}",
                    instr.loc.file, instr.loc.line, instr.loc.column
                )?;
                loc = instr.loc;
            }
            out.write_str("  ")?;
            write_instr(out, f, instr)?;
            out.write_char('\n')?;
        }
    }
    out.write_str("}\n")
}

/// Writes one instruction (no indentation or newline).
pub fn write_instr(out: &mut dyn Write, f: &Function, instr: &Instr) -> fmt::Result {
    if let Some(r) = instr.result {
        write!(out, "{} = ", Temp(f, r))?;
    }
    out.write_str(instr.op.mnemonic())?;
    if instr.op == Opcode::SwitchI32 {
        out.write_str(".i32")?;
    } else if prints_suffix(instr) {
        write!(out, ".{}", instr.ty)?;
    }
    match instr.op {
        Opcode::Br => {
            out.write_char(' ')?;
            write_target(out, f, instr, 0)?;
        }
        Opcode::CBr => {
            out.write_char(' ')?;
            write_values(out, f, &instr.operands)?;
            out.write_str(", ")?;
            write_target(out, f, instr, 0)?;
            out.write_str(", ")?;
            write_target(out, f, instr, 1)?;
        }
        Opcode::SwitchI32 => {
            out.write_char(' ')?;
            if let Some(v) = instr.operands.first() {
                write!(out, "{}", Operand(f, v))?;
            }
            out.write_str(", default ")?;
            write_target(out, f, instr, 0)?;
            for (k, case) in instr.operands.iter().skip(1).enumerate() {
                write!(out, ", {} -> ", Operand(f, case))?;
                write_target(out, f, instr, k + 1)?;
            }
        }
        Opcode::EhPush => {
            out.write_char(' ')?;
            write_target(out, f, instr, 0)?;
        }
        Opcode::Call => {
            write!(out, " @{}(", instr.callee.as_deref().unwrap_or("?"))?;
            write_values(out, f, &instr.operands)?;
            out.write_char(')')?;
        }
        _ => {
            if !instr.operands.is_empty() {
                out.write_char(' ')?;
                write_values(out, f, &instr.operands)?;
            }
        }
    }
    Ok(())
}
