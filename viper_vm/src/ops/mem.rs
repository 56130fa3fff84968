// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Constants, memory access, and reference counting.

use viper_il::{Opcode, Type};
use viper_rt::RtTrap;

use crate::dispatch::{Flow, OpResult};
use crate::program::LoadedInstr;
use crate::slot::{Ptr, Slot};
use crate::vm::{Exec, invalid, malformed};

pub(crate) fn constant(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let v = match ins.op {
        Opcode::IConst => Slot::I64(ins.ty.wrap_int(ex.operand(ins, 0)?.int()?)),
        Opcode::FConst => match ex.operand(ins, 0)? {
            Slot::I64(n) => Slot::F64(n as f64),
            other => Slot::F64(other.float()?),
        },
        Opcode::ConstStr => Slot::Str(ex.operand(ins, 0)?.str()?),
        Opcode::ConstNull if ins.ty == Type::Str => Slot::Str(None),
        Opcode::ConstNull => Slot::Ptr(Ptr::Null),
        _ => return Err(malformed("not a constant opcode")),
    };
    ex.set(ins, v);
    Ok(Flow::Next)
}

pub(crate) fn alloca(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let n = ex.operand(ins, 0)?.int()?;
    let n = u32::try_from(n).map_err(|_| invalid("invalid alloca size"))?;
    let p = ex.alloca(n)?;
    ex.set(ins, Slot::Ptr(p));
    Ok(Flow::Next)
}

pub(crate) fn load(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let p = ex.operand(ins, 0)?.ptr()?;
    let v = ex.load(p, ins.ty)?;
    ex.set(ins, v);
    Ok(Flow::Next)
}

pub(crate) fn store(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let p = ex.operand(ins, 0)?.ptr()?;
    let v = ex.operand(ins, 1)?;
    ex.store(p, ins.ty, v)?;
    Ok(Flow::Next)
}

fn offset_by(base: u32, delta: i64) -> Result<u32, RtTrap> {
    i64::from(base)
        .checked_add(delta)
        .and_then(|o| u32::try_from(o).ok())
        .ok_or_else(|| invalid("pointer arithmetic out of range"))
}

/// Byte-offset pointer arithmetic. No scaling by element type.
pub(crate) fn gep(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let p = ex.operand(ins, 0)?.ptr()?;
    let delta = ex.operand(ins, 1)?.int()?;
    let q = match p {
        Ptr::Stack {
            frame,
            activation,
            offset,
        } => Ptr::Stack {
            frame,
            activation,
            offset: offset_by(offset, delta)?,
        },
        Ptr::Global { offset } => Ptr::Global {
            offset: offset_by(offset, delta)?,
        },
        Ptr::Null | Ptr::Obj(_) if delta == 0 => p,
        Ptr::Null | Ptr::Obj(_) => {
            return Err(invalid("pointer arithmetic on a non-memory pointer"));
        }
    };
    ex.set(ins, Slot::Ptr(q));
    Ok(Flow::Next)
}

pub(crate) fn addr_of(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let p = ex.operand(ins, 0)?.ptr()?;
    ex.set(ins, Slot::Ptr(p));
    Ok(Flow::Next)
}

/// `retain` and `release`. Null operands are ignored.
pub(crate) fn refcount(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let obj = ex.operand(ins, 0)?.object();
    match ins.op {
        Opcode::Retain => ex.cx.heap.retain(obj)?,
        Opcode::Release => {
            ex.cx.heap.release(obj)?;
        }
        _ => return Err(malformed("not a refcount opcode")),
    }
    Ok(Flow::Next)
}
