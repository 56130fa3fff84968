// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatch strategies.
//!
//! Both strategies route each instruction to the same handler functions in [`crate::ops`]; they
//! differ only in how the handler is selected. [`SwitchDispatch`] matches on the opcode.
//! [`ThreadedDispatch`] indexes a table built once at compile time, whose final slot is a
//! sentinel that traps.

use viper_il::Opcode;
use viper_il::opcode::OpClass;
use viper_rt::{RtTrap, TrapKind};

use crate::program::LoadedInstr;
use crate::slot::Slot;
use crate::vm::Exec;

mod switch;
mod threaded;

pub(crate) use switch::SwitchDispatch;
pub(crate) use threaded::ThreadedDispatch;

/// What the loop does after a handler returns.
#[derive(Debug)]
pub(crate) enum Flow {
    /// Advance to the next instruction.
    Next,
    /// The handler repositioned the current frame.
    Jumped,
    /// The entry frame returned.
    Halt(Option<Slot>),
}

pub(crate) type OpResult = Result<Flow, RtTrap>;

/// An opcode handler.
pub(crate) type OpFn = fn(&mut Exec<'_, '_>, &LoadedInstr) -> OpResult;

/// Selects and runs the handler for one instruction.
pub(crate) trait Dispatch {
    fn execute(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult;
}

fn is_int(s: &Slot) -> bool {
    matches!(s, Slot::I64(_))
}

fn is_float(s: &Slot) -> bool {
    matches!(s, Slot::F64(_))
}

fn is_ref(s: &Slot) -> bool {
    matches!(s, Slot::Ptr(_) | Slot::Str(_))
}

/// Checks the runtime kinds of `ins`'s operands against its opcode.
pub(crate) fn check_operands(ex: &Exec<'_, '_>, ins: &LoadedInstr) -> Result<(), RtTrap> {
    let mut slots = Vec::with_capacity(ins.operands.len());
    for op in &ins.operands {
        slots.push(ex.eval(op)?);
    }
    let all = |pred: fn(&Slot) -> bool| slots.iter().all(pred);
    let first = |pred: fn(&Slot) -> bool| slots.first().is_some_and(pred);
    let ok = match ins.op.info().class {
        OpClass::IntBinary => all(is_int),
        OpClass::IntCompare => {
            all(is_int) || (matches!(ins.op, Opcode::ICmpEq | Opcode::ICmpNe) && all(is_ref))
        }
        OpClass::FloatBinary | OpClass::FloatCompare => all(is_float),
        OpClass::Cast => match ins.op {
            Opcode::Fptosi | Opcode::CastFpToSiRteChk | Opcode::CastFpToUiRteChk => all(is_float),
            _ => all(is_int),
        },
        OpClass::Memory => match ins.op {
            Opcode::Load | Opcode::Store | Opcode::Gep => first(is_ref),
            Opcode::Alloca => all(is_int),
            _ => true,
        },
        OpClass::Control => match ins.op {
            Opcode::CBr | Opcode::SwitchI32 => first(is_int),
            _ => true,
        },
        OpClass::RefCount => all(is_ref),
        OpClass::Exception => ins.op != Opcode::Throw || first(is_ref),
        OpClass::Constant | OpClass::Call => true,
    };
    if ok {
        Ok(())
    } else {
        let kinds = slots.iter().map(Slot::kind).collect::<Vec<_>>().join(", ");
        Err(RtTrap::with_message(
            TrapKind::MalformedIr,
            format!("'{}' cannot take operands ({kinds})", ins.op.mnemonic()),
        ))
    }
}
