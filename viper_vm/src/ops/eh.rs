// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured exception handling.
//!
//! Each frame keeps a stack of handler blocks. `throw` transfers to the innermost handler of the
//! nearest frame that has one, unwinding intervening frames; the handler receives the exception
//! object as its single block argument. A throw with no handler anywhere is a trap.

use viper_rt::{RtTrap, TrapKind};

use crate::dispatch::{Flow, OpResult};
use crate::program::LoadedInstr;
use crate::slot::{Ptr, Slot};
use crate::vm::{Exec, malformed};

pub(crate) fn eh_push(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let handler = ins
        .targets
        .first()
        .ok_or_else(|| malformed("'eh.push' without a handler"))?;
    ex.current.handlers.push(handler.block);
    Ok(Flow::Next)
}

pub(crate) fn eh_pop(ex: &mut Exec<'_, '_>, _ins: &LoadedInstr) -> OpResult {
    ex.current.handlers.pop();
    Ok(Flow::Next)
}

fn describe(ex: &Exec<'_, '_>, exc: Ptr) -> String {
    let Ptr::Obj(o) = exc else {
        return "unhandled exception".into();
    };
    match ex.cx.heap.exc_message(o) {
        Ok(Some(msg)) => match ex.cx.heap.str_lossy(msg) {
            Ok(text) => format!("unhandled exception: {text}"),
            Err(_) => "unhandled exception".into(),
        },
        _ => "unhandled exception".into(),
    }
}

pub(crate) fn throw(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let exc = ex.operand(ins, 0)?.ptr()?;
    let has_handler = !ex.current.handlers.is_empty()
        || ex.callers.iter().any(|f| !f.handlers.is_empty());
    if !has_handler {
        return Err(RtTrap::with_message(
            TrapKind::InvalidOperation,
            describe(ex, exc),
        ));
    }
    while ex.current.handlers.is_empty() {
        if ex.pop_frame()?.is_none() {
            return Err(malformed("handler vanished during unwinding"));
        }
    }
    let block = ex
        .current
        .handlers
        .pop()
        .ok_or_else(|| malformed("handler vanished during unwinding"))?;
    tracing::trace!(block, depth = ex.depth(), "exception caught");
    ex.enter_block(block, &[Slot::Ptr(exc)])?;
    Ok(Flow::Jumped)
}
