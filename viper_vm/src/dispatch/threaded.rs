// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use viper_il::Opcode;
use viper_rt::{RtTrap, TrapKind};

use super::{Dispatch, OpFn, OpResult};
use crate::ops::handler_for;
use crate::program::LoadedInstr;
use crate::vm::Exec;

fn unimplemented_opcode(_ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    Err(RtTrap::with_message(
        TrapKind::InvalidOperation,
        format!("no handler for '{}'", ins.op.mnemonic()),
    ))
}

/// One slot per opcode, indexed by [`Opcode::index`], plus a trailing sentinel.
static TABLE: [OpFn; Opcode::COUNT + 1] = {
    let mut table = [unimplemented_opcode as OpFn; Opcode::COUNT + 1];
    let mut i = 0;
    while i < Opcode::COUNT {
        table[Opcode::ALL[i].index()] = handler_for(Opcode::ALL[i]);
        i += 1;
    }
    table
};

/// Table strategy: the opcode indexes a handler table built at compile time.
#[derive(Debug)]
pub(crate) struct ThreadedDispatch;

impl Dispatch for ThreadedDispatch {
    #[inline]
    fn execute(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
        let handler = TABLE
            .get(ins.op.index())
            .copied()
            .unwrap_or(TABLE[Opcode::COUNT]);
        handler(ex, ins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_has_a_handler() {
        let sentinel = TABLE[Opcode::COUNT];
        for op in Opcode::ALL {
            assert!(
                !core::ptr::fn_addr_eq(TABLE[op.index()], sentinel),
                "{} falls through to the sentinel",
                op.mnemonic()
            );
        }
    }
}
