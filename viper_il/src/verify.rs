// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural and type verification of IL modules.
//!
//! The verifier checks, per function:
//! - every block ends in exactly one terminator, and terminators appear nowhere else;
//! - block labels are unique and every branch label resolves;
//! - branch argument lists match the target block's parameters in arity and type;
//! - `ret` matches the function's return type;
//! - callees resolve among the module's functions, its externs, or a caller-supplied
//!   [`CalleeResolver`], and arguments match the resolved signature;
//! - temps are defined exactly once and every use in a reachable block is dominated by its
//!   definition;
//! - operand types agree with the opcode class.
//!
//! Integer constants fit any integer type, float constants fit `f64`, string literals fit `str`,
//! and `null` fits `ptr`/`str`. Temps must match exactly.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashSet;

use crate::analysis::cfg::FunctionCfg;
use crate::analysis::dominators::DomTree;
use crate::diag::Diagnostics;
use crate::instr::Instr;
use crate::module::{Function, Module};
use crate::opcode::{OpClass, Opcode, Successors};
use crate::types::Type;
use crate::value::{TempId, Value};

/// A verification failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyError {
    /// Function the error was found in (`None` for module-level errors).
    pub function: Option<Box<str>>,
    /// Block label, when the error is local to a block.
    pub block: Option<Box<str>>,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(func) = &self.function {
            write!(f, "@{func}")?;
            if let Some(block) = &self.block {
                write!(f, ":{block}")?;
            }
            f.write_str(": ")?;
        }
        f.write_str(&self.message)
    }
}

impl core::error::Error for VerifyError {}

/// Supplies signatures for callees that are neither module functions nor declared externs
/// (typically the runtime registry).
pub trait CalleeResolver {
    /// Returns `(params, ret)` for `name`, if known.
    fn signature(&self, name: &str) -> Option<(Vec<Type>, Type)>;
}

impl CalleeResolver for () {
    fn signature(&self, _name: &str) -> Option<(Vec<Type>, Type)> {
        None
    }
}

/// Verifies `module`, returning the first error.
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    verify_module_with(module, &())
}

/// Verifies `module` using `resolver` for callees outside the module.
pub fn verify_module_with(
    module: &Module,
    resolver: &dyn CalleeResolver,
) -> Result<(), VerifyError> {
    match collect_errors(module, resolver).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Verifies `module` and records every error in `diags`. Returns `true` when the module is valid.
pub fn verify_into(
    module: &Module,
    resolver: &dyn CalleeResolver,
    diags: &mut Diagnostics,
) -> bool {
    let errors = collect_errors(module, resolver);
    for e in &errors {
        diags.error(format!("verify: {e}"));
    }
    errors.is_empty()
}

/// Runs every check and returns all errors found.
#[must_use]
pub fn collect_errors(module: &Module, resolver: &dyn CalleeResolver) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    let mut names: HashSet<&str> = HashSet::new();
    for f in &module.functions {
        if !names.insert(&*f.name) {
            errors.push(VerifyError {
                function: None,
                block: None,
                message: format!("duplicate function @{}", f.name),
            });
        }
    }
    let mut externs: HashSet<&str> = HashSet::new();
    for e in &module.externs {
        if !externs.insert(&*e.name) {
            errors.push(VerifyError {
                function: None,
                block: None,
                message: format!("duplicate extern @{}", e.name),
            });
        }
    }
    for f in &module.functions {
        FunctionVerifier::new(module, resolver, f, &mut errors).run();
    }
    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "module failed verification");
    }
    errors
}

/// Where a temp is defined: `(block, instruction index)`; `None` for parameters.
type DefSite = (usize, Option<usize>);

struct FunctionVerifier<'a> {
    module: &'a Module,
    resolver: &'a dyn CalleeResolver,
    f: &'a Function,
    errors: &'a mut Vec<VerifyError>,
    cfg: FunctionCfg,
    types: Vec<Option<Type>>,
    defs: Vec<Option<DefSite>>,
}

impl<'a> FunctionVerifier<'a> {
    fn new(
        module: &'a Module,
        resolver: &'a dyn CalleeResolver,
        f: &'a Function,
        errors: &'a mut Vec<VerifyError>,
    ) -> Self {
        let n = f.temp_count();
        Self {
            module,
            resolver,
            f,
            errors,
            cfg: FunctionCfg::new(f),
            types: vec![None; n],
            defs: vec![None; n],
        }
    }

    fn err(&mut self, block: Option<usize>, message: String) {
        self.errors.push(VerifyError {
            function: Some(self.f.name.clone()),
            block: block.and_then(|b| self.f.blocks.get(b)).map(|b| b.label.clone()),
            message,
        });
    }

    fn run(mut self) {
        let f = self.f;
        if f.blocks.is_empty() {
            self.err(None, "function has no blocks".into());
            return;
        }

        let mut labels: HashSet<&str> = HashSet::new();
        for (bi, b) in f.blocks.iter().enumerate() {
            if !labels.insert(&*b.label) {
                self.err(Some(bi), format!("duplicate label '{}'", b.label));
            }
        }
        if f.blocks[0].params != f.params {
            self.err(Some(0), "entry block parameters differ from the function parameters".into());
        }

        self.collect_definitions();
        let dt = DomTree::compute(&self.cfg);

        for (bi, block) in f.blocks.iter().enumerate() {
            match block.instrs.last() {
                None => self.err(Some(bi), "empty block".into()),
                Some(last) if !last.is_terminator() => {
                    self.err(Some(bi), "block does not end in a terminator".into());
                }
                Some(_) => {}
            }
            for (ii, instr) in block.instrs.iter().enumerate() {
                if instr.is_terminator() && ii + 1 != block.instrs.len() {
                    self.err(
                        Some(bi),
                        format!("terminator '{}' is not the last instruction", instr.op.mnemonic()),
                    );
                }
                self.check_result(bi, instr);
                self.check_uses(bi, ii, instr, &dt);
                self.check_operands(bi, instr);
                self.check_targets(bi, instr);
            }
        }
    }

    fn define(&mut self, block: usize, t: TempId, ty: Type, site: Option<usize>) {
        let Some(slot) = self.types.get_mut(t.index()) else {
            self.err(Some(block), format!("temp %t{} out of range", t.0));
            return;
        };
        if slot.is_some() {
            let name = self.f.value_name(t).map_or_else(|| format!("t{}", t.0), String::from);
            self.err(Some(block), format!("temp %{name} defined more than once"));
            return;
        }
        *slot = Some(ty);
        self.defs[t.index()] = Some((block, site));
    }

    fn collect_definitions(&mut self) {
        let f = self.f;
        for (bi, block) in f.blocks.iter().enumerate() {
            for p in &block.params {
                self.define(bi, p.id, p.ty, None);
            }
            for (ii, instr) in block.instrs.iter().enumerate() {
                if let Some(r) = instr.result {
                    self.define(bi, r, instr.ty, Some(ii));
                }
            }
        }
    }

    fn check_result(&mut self, bi: usize, instr: &Instr) {
        let info = instr.op.info();
        match (info.has_result, instr.result) {
            (false, Some(_)) => {
                self.err(Some(bi), format!("'{}' does not produce a value", info.mnemonic));
            }
            (true, None) if instr.op != Opcode::Call => {
                self.err(Some(bi), format!("'{}' result is missing", info.mnemonic));
            }
            (true, Some(_)) if instr.ty == Type::Void => {
                self.err(Some(bi), format!("'{}' result cannot be void", info.mnemonic));
            }
            _ => {}
        }
    }

    fn check_uses(&mut self, bi: usize, ii: usize, instr: &Instr, dt: &DomTree) {
        if !dt.is_reachable(bi) {
            return;
        }
        for t in instr.used_temps() {
            let Some(Some((db, site))) = self.defs.get(t.index()).copied() else {
                self.err(Some(bi), format!("use of undefined temp %t{}", t.0));
                continue;
            };
            let ok = if db == bi {
                site.is_none_or(|di| di < ii)
            } else {
                dt.dominates(db, bi)
            };
            if !ok {
                let name = self.f.value_name(t).map_or_else(|| format!("t{}", t.0), String::from);
                self.err(Some(bi), format!("use of %{name} is not dominated by its definition"));
            }
        }
    }

    fn type_of(&self, v: &Value) -> Option<Type> {
        match v {
            Value::Temp(t) => self.types.get(t.index()).copied().flatten(),
            Value::ConstFloat(_) => Some(Type::F64),
            Value::ConstStr(_) => Some(Type::Str),
            Value::Global(_) => Some(Type::Ptr),
            Value::ConstInt(_) | Value::Null => None,
        }
    }

    fn fits(&self, v: &Value, ty: Type) -> bool {
        match v {
            Value::ConstInt(_) => ty.is_integer(),
            Value::Null => matches!(ty, Type::Ptr | Type::Str),
            _ => self.type_of(v) == Some(ty),
        }
    }

    fn expect(&mut self, bi: usize, instr: &Instr, idx: usize, ty: Type) {
        let Some(v) = instr.operands.get(idx) else {
            self.err(Some(bi), format!("'{}' is missing operand {idx}", instr.op.mnemonic()));
            return;
        };
        if !self.fits(v, ty) {
            self.err(
                Some(bi),
                format!(
                    "'{}' operand {idx} ({v}) is not of type {ty}",
                    instr.op.mnemonic()
                ),
            );
        }
    }

    fn expect_count(&mut self, bi: usize, instr: &Instr) -> bool {
        if let Some(n) = instr.op.info().operands
            && instr.operands.len() != usize::from(n)
        {
            self.err(
                Some(bi),
                format!(
                    "'{}' expects {n} operand(s), found {}",
                    instr.op.mnemonic(),
                    instr.operands.len()
                ),
            );
            return false;
        }
        true
    }

    fn expect_int_result(&mut self, bi: usize, instr: &Instr) {
        if !instr.ty.is_integer() {
            self.err(
                Some(bi),
                format!("'{}' must produce an integer, not {}", instr.op.mnemonic(), instr.ty),
            );
        }
    }

    fn check_operands(&mut self, bi: usize, instr: &Instr) {
        if !self.expect_count(bi, instr) {
            return;
        }
        let op = instr.op;
        match op.info().class {
            OpClass::IntBinary => {
                self.expect_int_result(bi, instr);
                self.expect(bi, instr, 0, instr.ty);
                self.expect(bi, instr, 1, instr.ty);
            }
            OpClass::IntCompare => {
                let ty = instr
                    .operands
                    .iter()
                    .find_map(|v| self.type_of(v))
                    .unwrap_or(Type::I64);
                let equality = matches!(op, Opcode::ICmpEq | Opcode::ICmpNe);
                if !(ty.is_integer() || (equality && ty.is_pointer())) {
                    self.err(Some(bi), format!("'{}' cannot compare {ty}", op.mnemonic()));
                }
                self.expect(bi, instr, 0, ty);
                self.expect(bi, instr, 1, ty);
            }
            OpClass::FloatBinary => {
                self.expect(bi, instr, 0, Type::F64);
                self.expect(bi, instr, 1, Type::F64);
            }
            OpClass::FloatCompare => {
                self.expect(bi, instr, 0, Type::F64);
                self.expect(bi, instr, 1, Type::F64);
            }
            OpClass::Constant => self.check_constant(bi, instr),
            OpClass::Memory => self.check_memory(bi, instr),
            OpClass::Cast => self.check_cast(bi, instr),
            OpClass::Call => self.check_call(bi, instr),
            OpClass::Control => self.check_control(bi, instr),
            OpClass::RefCount => {
                let handles = instr
                    .operands
                    .iter()
                    .all(|v| self.fits(v, Type::Str) || self.fits(v, Type::Ptr));
                if !handles {
                    self.err(Some(bi), format!("'{}' needs a str or ptr operand", op.mnemonic()));
                }
            }
            OpClass::Exception => {
                if op == Opcode::Throw {
                    self.expect(bi, instr, 0, Type::Ptr);
                }
            }
        }
    }

    fn check_constant(&mut self, bi: usize, instr: &Instr) {
        match instr.op {
            Opcode::IConst => {
                self.expect_int_result(bi, instr);
                if instr.operands[0].as_const_int().is_none() {
                    self.err(Some(bi), "'iconst' needs an integer literal".into());
                }
            }
            Opcode::FConst => {
                if !matches!(instr.operands[0], Value::ConstFloat(_) | Value::ConstInt(_)) {
                    self.err(Some(bi), "'fconst' needs a numeric literal".into());
                }
            }
            Opcode::ConstStr => match &instr.operands[0] {
                Value::ConstStr(id) if self.module.literal(*id).is_some() => {}
                Value::Global(name)
                    if self.module.global(name).is_some_and(|g| g.ty == Type::Str) => {}
                other => {
                    let msg = format!("'const_str' needs a string literal, found {other}");
                    self.err(Some(bi), msg);
                }
            },
            _ => {}
        }
    }

    fn check_memory(&mut self, bi: usize, instr: &Instr) {
        match instr.op {
            Opcode::Alloca => {
                let ok = match &instr.operands[0] {
                    Value::ConstInt(n) => *n >= 0,
                    v => self.type_of(v).is_some_and(Type::is_integer),
                };
                if !ok {
                    self.err(Some(bi), "'alloca' needs a non-negative byte count".into());
                }
            }
            Opcode::Load => {
                self.expect(bi, instr, 0, Type::Ptr);
                if instr.ty == Type::Void {
                    self.err(Some(bi), "'load' cannot load void".into());
                }
            }
            Opcode::Store => {
                self.expect(bi, instr, 0, Type::Ptr);
                self.expect(bi, instr, 1, instr.ty);
            }
            Opcode::Gep => {
                self.expect(bi, instr, 0, Type::Ptr);
                self.expect(bi, instr, 1, Type::I64);
            }
            Opcode::AddrOf => match &instr.operands[0] {
                Value::Global(name) if self.module.global(name).is_some() => {}
                other => self.err(Some(bi), format!("'addr_of' needs a global, found {other}")),
            },
            _ => {}
        }
    }

    fn check_cast(&mut self, bi: usize, instr: &Instr) {
        let (from_int, to_int) = match instr.op {
            Opcode::Trunc1 => (true, true),
            Opcode::Zext1 => {
                self.expect(bi, instr, 0, Type::I1);
                self.expect_int_result(bi, instr);
                return;
            }
            Opcode::Sitofp => (true, false),
            Opcode::Fptosi | Opcode::CastFpToSiRteChk | Opcode::CastFpToUiRteChk => (false, true),
            _ => (true, true),
        };
        if from_int {
            let ok = match &instr.operands[0] {
                Value::ConstInt(_) => true,
                v => self.type_of(v).is_some_and(Type::is_integer),
            };
            if !ok {
                self.err(Some(bi), format!("'{}' needs an integer operand", instr.op.mnemonic()));
            }
        } else {
            self.expect(bi, instr, 0, Type::F64);
        }
        if to_int {
            self.expect_int_result(bi, instr);
        } else if instr.ty != Type::F64 {
            self.err(Some(bi), format!("'{}' must produce f64", instr.op.mnemonic()));
        }
    }

    fn check_call(&mut self, bi: usize, instr: &Instr) {
        let Some(callee) = instr.callee.as_deref() else {
            self.err(Some(bi), "'call' without a callee".into());
            return;
        };
        let Some((params, ret)) = self
            .module
            .signature(callee)
            .or_else(|| self.resolver.signature(callee))
        else {
            self.err(Some(bi), format!("unknown callee @{callee}"));
            return;
        };
        if params.len() != instr.operands.len() {
            self.err(
                Some(bi),
                format!(
                    "call to @{callee} passes {} argument(s), expected {}",
                    instr.operands.len(),
                    params.len()
                ),
            );
            return;
        }
        for (i, ty) in params.iter().enumerate() {
            self.expect(bi, instr, i, *ty);
        }
        if instr.result.is_some() && (ret == Type::Void || instr.ty != ret) {
            self.err(
                Some(bi),
                format!("call to @{callee} returns {ret}, result typed {}", instr.ty),
            );
        }
    }

    fn check_control(&mut self, bi: usize, instr: &Instr) {
        match instr.op {
            Opcode::CBr => self.expect(bi, instr, 0, Type::I1),
            Opcode::SwitchI32 => {
                let ok = match instr.operands.first() {
                    Some(Value::ConstInt(_)) => true,
                    Some(v) => self.type_of(v).is_some_and(Type::is_integer),
                    None => false,
                };
                if !ok {
                    self.err(Some(bi), "'switch' needs an integer scrutinee".into());
                }
                if instr.operands.iter().skip(1).any(|v| v.as_const_int().is_none()) {
                    self.err(Some(bi), "'switch' case values must be integer literals".into());
                }
            }
            Opcode::Ret => {
                let ret_ty = self.f.ret_ty;
                match (ret_ty, instr.operands.len()) {
                    (Type::Void, 0) => {}
                    (Type::Void, _) => self.err(Some(bi), "void function returns a value".into()),
                    (_, 1) => self.expect(bi, instr, 0, ret_ty),
                    (_, _) => {
                        self.err(Some(bi), format!("'ret' must return one {ret_ty} value"));
                    }
                }
            }
            _ => {}
        }
    }

    fn check_targets(&mut self, bi: usize, instr: &Instr) {
        let expected = match instr.op.info().successors {
            Successors::None => {
                if !instr.labels.is_empty() {
                    self.err(Some(bi), format!("'{}' takes no labels", instr.op.mnemonic()));
                }
                return;
            }
            Successors::One => 1,
            Successors::Two => 2,
            Successors::Switch => instr.operands.len().max(1),
        };
        if instr.labels.len() != expected {
            self.err(
                Some(bi),
                format!(
                    "'{}' expects {expected} label(s), found {}",
                    instr.op.mnemonic(),
                    instr.labels.len()
                ),
            );
            return;
        }
        let f = self.f;
        for (i, label) in instr.labels.iter().enumerate() {
            let Some(target) = self.cfg.block_of(label) else {
                self.err(Some(bi), format!("unknown label '{label}'"));
                continue;
            };
            let params = &f.blocks[target].params;
            if instr.op == Opcode::EhPush {
                if params.len() != 1 || params[0].ty != Type::Ptr {
                    self.err(
                        Some(bi),
                        format!("handler '{label}' must take exactly one ptr parameter"),
                    );
                }
                continue;
            }
            let args = instr.args_for(i);
            if args.len() != params.len() {
                self.err(
                    Some(bi),
                    format!(
                        "branch to '{label}' passes {} argument(s), expected {}",
                        args.len(),
                        params.len()
                    ),
                );
                continue;
            }
            for (k, (arg, p)) in args.iter().zip(params).enumerate() {
                if !self.fits(arg, p.ty) {
                    self.err(
                        Some(bi),
                        format!("branch to '{label}' argument {k} ({arg}) is not of type {}", p.ty),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;

    fn errors(src: &str) -> Vec<String> {
        let m = parse_module(src).unwrap();
        collect_errors(&m, &()).iter().map(alloc::string::ToString::to_string).collect()
    }

    #[test]
    fn accepts_a_well_formed_module() {
        let src = "il 0.1.2
extern @rt_print_i64(i64) -> void
func @f(i64 %n) -> i64 {
entry:
  %p = alloca 8
  store.i64 %p, %n
  %v = load.i64 %p
  %c = scmp_gt %v, 0
  cbr %c, pos(%v), done(0)
pos(%x: i64):
  call @rt_print_i64(%x)
  br done(%x)
done(%r: i64):
  ret %r
}
";
        assert_eq!(errors(src), Vec::<String>::new());
    }

    #[test]
    fn reports_branch_arity_and_type_mismatches() {
        let src = "il 0.1.2
func @f(f64 %x) -> void {
entry:
  br next(%x, 1)
next(%a: i64):
  ret
}
";
        let errs = errors(src);
        assert!(errs.iter().any(|e| e.contains("passes 2 argument(s), expected 1")), "{errs:?}");

        let src = "il 0.1.2
func @f(f64 %x) -> void {
entry:
  br next(%x)
next(%a: i64):
  ret
}
";
        let errs = errors(src);
        assert!(errs.iter().any(|e| e.contains("is not of type i64")), "{errs:?}");
    }

    #[test]
    fn reports_missing_terminators_and_bad_returns() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  %a = add.i64 1, 2
}
";
        let errs = errors(src);
        assert!(errs.iter().any(|e| e.contains("does not end in a terminator")), "{errs:?}");

        let src = "il 0.1.2
func @f() -> void {
entry:
  ret 1
}
";
        assert!(errors(src).iter().any(|e| e.contains("void function returns a value")));
    }

    #[test]
    fn reports_uses_not_dominated_by_definitions() {
        let src = "il 0.1.2
func @f(i1 %c) -> i64 {
entry:
  cbr %c, a, b
a:
  %x = add.i64 1, 2
  br b
b:
  ret %x
}
";
        let errs = errors(src);
        assert!(errs.iter().any(|e| e.contains("not dominated")), "{errs:?}");
    }

    #[test]
    fn resolves_callees_through_the_resolver() {
        struct Rt;
        impl CalleeResolver for Rt {
            fn signature(&self, name: &str) -> Option<(Vec<Type>, Type)> {
                (name == "rt_abs").then(|| (alloc::vec![Type::I64], Type::I64))
            }
        }
        let src = "il 0.1.2
func @main() -> i64 {
entry:
  %r = call.i64 @rt_abs(-3)
  ret %r
}
";
        let m = parse_module(src).unwrap();
        assert!(verify_module(&m).is_err());
        assert_eq!(verify_module_with(&m, &Rt), Ok(()));
    }

    #[test]
    fn duplicate_switch_cases_are_accepted() {
        let src = "il 0.1.2
func @f(i32 %v) -> i64 {
entry:
  switch.i32 %v, default d, 1 -> a, 1 -> b
a:
  ret 1
b:
  ret 2
d:
  ret 0
}
";
        assert_eq!(errors(src), Vec::<String>::new());
    }

    #[test]
    fn diagnostics_receive_every_error() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  %x = fadd 1.0, 2
  br nowhere
}
";
        let m = parse_module(src).unwrap();
        let mut diags = Diagnostics::new();
        assert!(!verify_into(&m, &(), &mut diags));
        assert!(diags.errors().len() >= 2, "{:?}", diags.errors());
        assert!(diags.errors()[0].starts_with("verify: @f:entry: "));
    }
}
