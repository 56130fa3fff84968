// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Direct calls to IL functions and runtime helpers.

use crate::dispatch::{Flow, OpResult};
use crate::program::{Callee, FuncId, LoadedInstr, RuntimeId};
use crate::slot::{Ptr, Slot};
use crate::trace::ScopeKind;
use crate::vm::{Exec, malformed};

pub(crate) fn call(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    match ins.callee {
        Some(Callee::Runtime(id)) => runtime(ex, ins, id),
        Some(Callee::Function(id)) => function(ex, ins, id),
        None => Err(malformed("call without a callee")),
    }
}

/// Marshals arguments into the helper. Arguments the helper consumes are retained first so the
/// caller's references survive the call.
fn runtime(ex: &mut Exec<'_, '_>, ins: &LoadedInstr, id: RuntimeId) -> OpResult {
    let program = ex.program;
    let desc = program
        .runtime(id)
        .ok_or_else(|| malformed("call to a missing runtime helper"))?;
    let mut args = ex.take_scratch();
    for (i, op) in ins.operands.iter().enumerate() {
        let v = ex.eval(op)?;
        if desc.consumes(i) {
            ex.cx.heap.retain(v.object())?;
        }
        args.push(v);
    }
    let ip = ex.current.ip;
    ex.trace_enter(ScopeKind::RuntimeCall { desc: id }, ip);
    let result = (desc.handler)(ex.cx, &args);
    ex.trace_exit(ScopeKind::RuntimeCall { desc: id });
    ex.put_scratch(args);
    ex.set(ins, result?);
    Ok(Flow::Next)
}

fn function(ex: &mut Exec<'_, '_>, ins: &LoadedInstr, id: FuncId) -> OpResult {
    let mut args = Vec::with_capacity(ins.operands.len());
    for op in &ins.operands {
        args.push(ex.eval(op)?);
    }
    // A pointer into this frame's stack would dangle once the frame is reused.
    let live = ex.current.activation;
    let escapes = args.iter().any(|a| {
        matches!(a, Slot::Ptr(Ptr::Stack { activation, .. }) if *activation == live)
    });
    if ex.config.tail_calls && ins.tail && !escapes {
        ex.reenter_frame(id, &args)?;
    } else {
        ex.push_frame(id, &args, ins.result)?;
    }
    Ok(Flow::Jumped)
}
