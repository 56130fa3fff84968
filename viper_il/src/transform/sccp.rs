// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sparse conditional constant propagation.
//!
//! Each temp (block parameters included) sits in a three-level lattice: not yet seen, one known
//! constant, or varying. Only edges whose branch condition can still go their way are followed,
//! so a block parameter fed a constant along every live edge stays constant even when a dead
//! edge would disagree. Afterwards constant temps are replaced by their values, decided branches
//! become `br`, and blocks that never became executable are removed.
//!
//! Folding itself is [`peephole::simplify`], so the pass never folds an instruction that would
//! trap at run time.

use alloc::vec;
use alloc::vec::Vec;

use crate::analysis::cfg::FunctionCfg;
use crate::diag::Diagnostics;
use crate::instr::Instr;
use crate::module::{Function, Module};
use crate::opcode::{OpClass, Opcode};
use crate::transform::pass_manager::Pass;
use crate::transform::peephole::simplify;
use crate::transform::simplify_cfg::{folded_target, remove_unreachable};
use crate::transform::util::apply_substitutions;
use crate::value::{TempId, Value};

/// The `sccp` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct Sccp;

impl Pass for Sccp {
    fn name(&self) -> &'static str {
        "sccp"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut stats = SccpStats::default();
        for f in &mut module.functions {
            stats += propagate_constants(f);
        }
        tracing::debug!(
            constants = stats.constants,
            branches = stats.branches,
            blocks = stats.blocks,
            "sccp finished"
        );
        true
    }
}

/// What one run of [`propagate_constants`] changed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SccpStats {
    /// Instructions replaced by a constant.
    pub constants: usize,
    /// Conditional branches and switches rewritten to `br`.
    pub branches: usize,
    /// Blocks removed as never executable.
    pub blocks: usize,
}

impl SccpStats {
    /// Returns `true` when nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl core::ops::AddAssign for SccpStats {
    fn add_assign(&mut self, rhs: Self) {
        self.constants += rhs.constants;
        self.branches += rhs.branches;
        self.blocks += rhs.blocks;
    }
}

#[derive(Clone, Debug)]
enum Lattice {
    Unknown,
    Const(Value),
    Varying,
}

impl Lattice {
    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Unknown, x) | (x, Self::Unknown) => x.clone(),
            (Self::Const(a), Self::Const(b)) if a.same_as(b) => self.clone(),
            _ => Self::Varying,
        }
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unknown, Self::Unknown) | (Self::Varying, Self::Varying) => true,
            (Self::Const(a), Self::Const(b)) => a.same_as(b),
            _ => false,
        }
    }
}

/// Opcodes [`simplify`] can evaluate; none of them has side effects.
fn foldable(op: Opcode) -> bool {
    match op.info().class {
        OpClass::IntBinary
        | OpClass::IntCompare
        | OpClass::FloatBinary
        | OpClass::FloatCompare
        | OpClass::Cast => true,
        OpClass::Constant => matches!(op, Opcode::IConst | Opcode::FConst),
        _ => false,
    }
}

struct Solver<'f> {
    f: &'f Function,
    cfg: FunctionCfg,
    values: Vec<Lattice>,
    executable: Vec<bool>,
    changed: bool,
}

impl<'f> Solver<'f> {
    fn new(f: &'f Function) -> Self {
        let cfg = FunctionCfg::new(f);
        let mut solver = Self {
            f,
            values: vec![Lattice::Unknown; f.temp_count()],
            executable: vec![false; f.blocks.len()],
            cfg,
            changed: false,
        };
        for p in &f.params {
            solver.lower(p.id, &Lattice::Varying);
        }
        solver.enter(0, None);
        solver
    }

    fn lower(&mut self, t: TempId, v: &Lattice) {
        let Some(slot) = self.values.get_mut(t.index()) else {
            return;
        };
        let next = slot.meet(v);
        if !next.same(slot) {
            *slot = next;
            self.changed = true;
        }
    }

    fn value_of(&self, v: &Value) -> Lattice {
        match v {
            Value::Temp(t) => self.values.get(t.index()).cloned().unwrap_or(Lattice::Varying),
            Value::ConstInt(_) | Value::ConstFloat(_) => Lattice::Const(v.clone()),
            _ => Lattice::Varying,
        }
    }

    /// Marks block `b` executable and feeds its parameters. `None` makes them varying.
    fn enter(&mut self, b: usize, args: Option<&[Value]>) {
        let Some(block) = self.f.blocks.get(b) else {
            return;
        };
        if !self.executable[b] {
            self.executable[b] = true;
            self.changed = true;
        }
        for (i, p) in block.params.iter().enumerate() {
            let v = match args.and_then(|a| a.get(i)) {
                Some(arg) => self.value_of(arg),
                None => Lattice::Varying,
            };
            self.lower(p.id, &v);
        }
    }

    fn evaluate(&self, ins: &Instr) -> Lattice {
        if !foldable(ins.op) {
            return Lattice::Varying;
        }
        let mut candidate = ins.clone();
        for v in &mut candidate.operands {
            match self.value_of(v) {
                Lattice::Unknown => return Lattice::Unknown,
                Lattice::Const(c) => *v = c,
                Lattice::Varying => {}
            }
        }
        match simplify(&candidate) {
            Some(v @ (Value::ConstInt(_) | Value::ConstFloat(_))) => Lattice::Const(v),
            _ => Lattice::Varying,
        }
    }

    /// Label indices of `term` that may be taken.
    fn live_edges(&self, term: &Instr) -> Vec<usize> {
        let all = || (0..term.labels.len()).collect();
        if !matches!(term.op, Opcode::CBr | Opcode::SwitchI32) {
            return all();
        }
        let Some(scrutinee) = term.operands.first() else {
            return all();
        };
        match self.value_of(scrutinee) {
            Lattice::Unknown => Vec::new(),
            Lattice::Varying => all(),
            Lattice::Const(c) => {
                let mut decided = term.clone();
                decided.operands[0] = c;
                folded_target(&decided).map_or_else(all, |i| vec![i])
            }
        }
    }

    fn visit(&mut self, b: usize) {
        let f = self.f;
        for ins in &f.blocks[b].instrs {
            if ins.is_terminator() {
                for i in self.live_edges(ins) {
                    let Some(target) = ins.labels.get(i).and_then(|l| self.cfg.block_of(l)) else {
                        continue;
                    };
                    self.enter(target, Some(ins.args_for(i)));
                }
            } else if !ins.labels.is_empty() {
                // Handler entries receive values from the unwinder.
                for label in &ins.labels {
                    if let Some(target) = self.cfg.block_of(label) {
                        self.enter(target, None);
                    }
                }
            }
            if let Some(r) = ins.result {
                let v = self.evaluate(ins);
                self.lower(r, &v);
            }
        }
    }

    fn solve(&mut self) {
        let order = self.cfg.reverse_post_order();
        loop {
            self.changed = false;
            for &b in &order {
                if self.executable[b] {
                    self.visit(b);
                }
            }
            if !self.changed {
                return;
            }
        }
    }
}

/// Propagates constants through `f` and prunes what they decide.
pub fn propagate_constants(f: &mut Function) -> SccpStats {
    if f.blocks.is_empty() {
        return SccpStats::default();
    }
    let (values, executable) = {
        let mut solver = Solver::new(f);
        solver.solve();
        (solver.values, solver.executable)
    };
    let subst: Vec<Option<Value>> = values
        .into_iter()
        .map(|l| match l {
            Lattice::Const(v) => Some(v),
            _ => None,
        })
        .collect();

    let mut stats = SccpStats::default();
    for (b, block) in f.blocks.iter_mut().enumerate() {
        if !executable[b] {
            continue;
        }
        block.instrs.retain(|ins| {
            let constant = ins
                .result
                .is_some_and(|r| subst.get(r.index()).is_some_and(Option::is_some));
            if constant && foldable(ins.op) {
                stats.constants += 1;
                return false;
            }
            true
        });
    }
    apply_substitutions(f, &subst);

    for (b, block) in f.blocks.iter_mut().enumerate() {
        if !executable[b] {
            continue;
        }
        let Some(term) = block.terminator_mut() else {
            continue;
        };
        if !matches!(term.op, Opcode::CBr | Opcode::SwitchI32)
            || !term.operands.first().is_some_and(Value::is_constant)
        {
            continue;
        }
        let Some(taken) = folded_target(term) else {
            continue;
        };
        let (Some(label), Some(args)) = (term.labels.get(taken), term.br_args.get(taken)) else {
            continue;
        };
        let mut br = Instr::br(label.clone(), args.clone());
        br.loc = term.loc;
        *term = br;
        stats.branches += 1;
    }

    let before = f.blocks.len();
    if remove_unreachable(f) {
        stats.blocks = before - f.blocks.len();
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{parse_module, print_module};
    use crate::verify::verify_module;

    #[test]
    fn constants_flow_through_block_parameters() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  %a = iconst.i64 6
  %b = mul.i64 %a, 7
  br join(%b)
join(%v: i64):
  %w = add.i64 %v, 0
  ret %w
}
";
        let mut m = parse_module(src).unwrap();
        let stats = propagate_constants(&mut m.functions[0]);
        assert_eq!(stats.constants, 3, "{}", print_module(&m));
        let f = &m.functions[0];
        assert_eq!(f.blocks[1].instrs, [Instr::ret(Some(Value::ConstInt(42)))]);
        verify_module(&m).unwrap();
    }

    #[test]
    fn a_dead_edge_does_not_spoil_a_parameter() {
        // The `other` edge would pass 2, but the condition never lets it run.
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  %c = scmp_lt 1, 2
  cbr %c, join(1), other
other:
  br join(2)
join(%v: i64):
  %r = mul.i64 %v, 10
  ret %r
}
";
        let mut m = parse_module(src).unwrap();
        let stats = propagate_constants(&mut m.functions[0]);
        assert_eq!(stats.branches, 1);
        assert_eq!(stats.blocks, 1, "`other` is never executable");
        let f = &m.functions[0];
        assert_eq!(f.blocks.len(), 2);
        assert_eq!(f.blocks[1].instrs, [Instr::ret(Some(Value::ConstInt(10)))]);
        verify_module(&m).unwrap();
    }

    #[test]
    fn loop_carried_values_stay_varying() {
        let src = "il 0.1.2
func @f(i64 %n) -> i64 {
entry:
  br loop(0, 5)
loop(%i: i64, %k: i64):
  %i2 = add.i64 %i, 1
  %k2 = mul.i64 %k, 1
  %c = scmp_lt %i2, %n
  cbr %c, loop(%i2, %k2), done
done:
  ret %k2
}
";
        let mut m = parse_module(src).unwrap();
        let stats = propagate_constants(&mut m.functions[0]);
        let text = print_module(&m);
        assert_eq!(stats.constants, 1, "only %k2 is constant: {text}");
        assert_eq!(stats.branches, 0);
        let f = &m.functions[0];
        assert_eq!(f.blocks[2].instrs, [Instr::ret(Some(Value::ConstInt(5)))]);
        assert_eq!(f.blocks[1].instrs[0].op, Opcode::IAdd, "the counter still varies");
        verify_module(&m).unwrap();
    }

    #[test]
    fn trapping_folds_are_left_alone() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  %z = iconst.i64 0
  %q = sdiv.i64 10, %z
  %o = iadd.ovf.i64 9223372036854775807, 1
  %s = add.i64 %q, %o
  ret %s
}
";
        let mut m = parse_module(src).unwrap();
        let stats = propagate_constants(&mut m.functions[0]);
        assert_eq!(stats.constants, 1, "only the iconst folds");
        let ops: Vec<Opcode> = m.functions[0].blocks[0].instrs.iter().map(|i| i.op).collect();
        assert_eq!(ops, [Opcode::SDiv, Opcode::IAddOvf, Opcode::IAdd, Opcode::Ret]);
        assert_eq!(m.functions[0].blocks[0].instrs[0].operands[1], Value::ConstInt(0));
        verify_module(&m).unwrap();
    }

    #[test]
    fn constant_switch_prunes_the_other_cases() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  %k = add.i64 1, 1
  switch.i32 %k, default d, 1 -> a, 2 -> b
a:
  ret 10
b:
  ret 20
d:
  ret 0
}
";
        let mut m = parse_module(src).unwrap();
        let stats = propagate_constants(&mut m.functions[0]);
        assert_eq!(stats, SccpStats { constants: 1, branches: 1, blocks: 2 });
        let f = &m.functions[0];
        assert_eq!(f.blocks.len(), 2);
        assert_eq!(&*f.blocks[1].label, "b");
        verify_module(&m).unwrap();
    }

    #[test]
    fn nan_constants_reach_a_fixpoint() {
        let src = "il 0.1.2
func @f(i64 %n) -> i64 {
entry:
  %nan = fdiv 0.0, 0.0
  br loop(0, %nan)
loop(%i: i64, %x: f64):
  %i2 = add.i64 %i, 1
  %c = scmp_lt %i2, %n
  cbr %c, loop(%i2, %x), done
done:
  %u = fcmp_uno %x, %x
  %r = zext1 %u
  ret %r
}
";
        let mut m = parse_module(src).unwrap();
        propagate_constants(&mut m.functions[0]);
        let f = &m.functions[0];
        assert_eq!(f.blocks[2].instrs, [Instr::ret(Some(Value::ConstInt(1)))]);
        verify_module(&m).unwrap();
    }
}
