// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use viper_il::Opcode as O;

use super::{Dispatch, OpResult};
use crate::ops::{call, cast, control, eh, float, int, mem};
use crate::program::LoadedInstr;
use crate::vm::Exec;

/// Reference strategy: a `match` on the opcode with direct calls into the handlers.
#[derive(Debug)]
pub(crate) struct SwitchDispatch;

impl Dispatch for SwitchDispatch {
    #[inline]
    fn execute(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
        match ins.op {
            O::IAdd | O::ISub | O::IMul | O::SDiv | O::UDiv | O::SRem | O::URem => {
                int::arith(ex, ins)
            }
            O::IAddOvf | O::ISubOvf | O::IMulOvf => int::checked(ex, ins),
            O::And | O::Or | O::Xor | O::Shl | O::LShr | O::AShr => int::bitwise(ex, ins),
            O::ICmpEq
            | O::ICmpNe
            | O::SCmpLt
            | O::SCmpLe
            | O::SCmpGt
            | O::SCmpGe
            | O::UCmpLt
            | O::UCmpLe
            | O::UCmpGt
            | O::UCmpGe => int::compare(ex, ins),
            O::FAdd | O::FSub | O::FMul | O::FDiv => float::arith(ex, ins),
            O::FCmpEq
            | O::FCmpNe
            | O::FCmpLt
            | O::FCmpLe
            | O::FCmpGt
            | O::FCmpGe
            | O::FCmpOrd
            | O::FCmpUno => float::compare(ex, ins),
            O::IConst | O::FConst | O::ConstStr | O::ConstNull => mem::constant(ex, ins),
            O::Alloca => mem::alloca(ex, ins),
            O::Load => mem::load(ex, ins),
            O::Store => mem::store(ex, ins),
            O::Gep => mem::gep(ex, ins),
            O::AddrOf => mem::addr_of(ex, ins),
            O::Trunc1
            | O::Zext1
            | O::Sitofp
            | O::Fptosi
            | O::CastSiNarrowChk
            | O::CastUiNarrowChk
            | O::CastFpToSiRteChk
            | O::CastFpToUiRteChk => cast::cast(ex, ins),
            O::Call => call::call(ex, ins),
            O::Br => control::br(ex, ins),
            O::CBr => control::cbr(ex, ins),
            O::SwitchI32 => control::switch_i32(ex, ins),
            O::Ret => control::ret(ex, ins),
            O::Trap => control::trap(ex, ins),
            O::Retain | O::Release => mem::refcount(ex, ins),
            O::EhPush => eh::eh_push(ex, ins),
            O::EhPop => eh::eh_pop(ex, ins),
            O::Throw => eh::throw(ex, ins),
        }
    }
}
