// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Opcode handler bodies shared by every dispatch strategy.

use viper_il::Opcode;

use crate::dispatch::OpFn;

pub(crate) mod call;
pub(crate) mod cast;
pub(crate) mod control;
pub(crate) mod eh;
pub(crate) mod float;
pub(crate) mod int;
pub(crate) mod mem;

/// The handler for `op`.
pub(crate) const fn handler_for(op: Opcode) -> OpFn {
    use Opcode as O;
    match op {
        O::IAdd | O::ISub | O::IMul | O::SDiv | O::UDiv | O::SRem | O::URem => int::arith,
        O::IAddOvf | O::ISubOvf | O::IMulOvf => int::checked,
        O::And | O::Or | O::Xor | O::Shl | O::LShr | O::AShr => int::bitwise,
        O::ICmpEq
        | O::ICmpNe
        | O::SCmpLt
        | O::SCmpLe
        | O::SCmpGt
        | O::SCmpGe
        | O::UCmpLt
        | O::UCmpLe
        | O::UCmpGt
        | O::UCmpGe => int::compare,
        O::FAdd | O::FSub | O::FMul | O::FDiv => float::arith,
        O::FCmpEq
        | O::FCmpNe
        | O::FCmpLt
        | O::FCmpLe
        | O::FCmpGt
        | O::FCmpGe
        | O::FCmpOrd
        | O::FCmpUno => float::compare,
        O::IConst | O::FConst | O::ConstStr | O::ConstNull => mem::constant,
        O::Alloca => mem::alloca,
        O::Load => mem::load,
        O::Store => mem::store,
        O::Gep => mem::gep,
        O::AddrOf => mem::addr_of,
        O::Trunc1
        | O::Zext1
        | O::Sitofp
        | O::Fptosi
        | O::CastSiNarrowChk
        | O::CastUiNarrowChk
        | O::CastFpToSiRteChk
        | O::CastFpToUiRteChk => cast::cast,
        O::Call => call::call,
        O::Br => control::br,
        O::CBr => control::cbr,
        O::SwitchI32 => control::switch_i32,
        O::Ret => control::ret,
        O::Trap => control::trap,
        O::Retain | O::Release => mem::refcount,
        O::EhPush => eh::eh_push,
        O::EhPop => eh::eh_pop,
        O::Throw => eh::throw,
    }
}
