// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The closed IL opcode set and its static metadata table.
//!
//! Every consumer (parser, verifier, passes, VM dispatch tables) keys off [`Opcode`] and
//! [`OpcodeInfo`]; adding an opcode means adding one enum variant and one table row.

/// An IL opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
#[allow(missing_docs, reason = "mnemonics are documented by `OpcodeInfo::mnemonic`")]
pub enum Opcode {
    // Integer arithmetic.
    IAdd,
    ISub,
    IMul,
    SDiv,
    UDiv,
    SRem,
    URem,
    IAddOvf,
    ISubOvf,
    IMulOvf,
    // Bitwise.
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    // Integer compares.
    ICmpEq,
    ICmpNe,
    SCmpLt,
    SCmpLe,
    SCmpGt,
    SCmpGe,
    UCmpLt,
    UCmpLe,
    UCmpGt,
    UCmpGe,
    // Float.
    FAdd,
    FSub,
    FMul,
    FDiv,
    FCmpEq,
    FCmpNe,
    FCmpLt,
    FCmpLe,
    FCmpGt,
    FCmpGe,
    FCmpOrd,
    FCmpUno,
    // Constants.
    IConst,
    FConst,
    ConstStr,
    ConstNull,
    // Memory.
    Alloca,
    Load,
    Store,
    Gep,
    AddrOf,
    // Casts.
    Trunc1,
    Zext1,
    Sitofp,
    Fptosi,
    CastSiNarrowChk,
    CastUiNarrowChk,
    CastFpToSiRteChk,
    CastFpToUiRteChk,
    // Calls and control flow.
    Call,
    Br,
    CBr,
    SwitchI32,
    Ret,
    Trap,
    // Reference counting.
    Retain,
    Release,
    // Exceptions.
    EhPush,
    EhPop,
    Throw,
}

/// Broad semantic class of an opcode; drives operand checking.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpClass {
    /// Two integer operands, integer result of the instruction type.
    IntBinary,
    /// Two integer operands, `i1` result.
    IntCompare,
    /// Two `f64` operands, `f64` result.
    FloatBinary,
    /// Two `f64` operands, `i1` result.
    FloatCompare,
    /// Constant materialization.
    Constant,
    /// Stack/global memory access.
    Memory,
    /// Scalar conversions.
    Cast,
    /// Direct call.
    Call,
    /// Branches, returns, and traps.
    Control,
    /// Reference-count maintenance.
    RefCount,
    /// Exception handling.
    Exception,
}

/// Successor shape of a terminator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Successors {
    /// Not a branch.
    None,
    /// One label (`br`, `eh.push` handler).
    One,
    /// Two labels (`cbr`).
    Two,
    /// Default label plus one label per case (`switch.i32`).
    Switch,
}

/// Static metadata for one opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Text-format mnemonic (without the optional `.type` suffix).
    pub mnemonic: &'static str,
    /// Semantic class.
    pub class: OpClass,
    /// Number of value operands; `None` means variadic.
    pub operands: Option<u8>,
    /// Whether the instruction defines a result temp.
    pub has_result: bool,
    /// Whether this is a block terminator.
    pub terminator: bool,
    /// Label shape.
    pub successors: Successors,
    /// Whether the instruction may have effects beyond its result (memory, calls, refcounts).
    pub side_effects: bool,
    /// Whether execution may trap.
    pub may_trap: bool,
}

const fn row(
    mnemonic: &'static str,
    class: OpClass,
    operands: Option<u8>,
    has_result: bool,
) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        class,
        operands,
        has_result,
        terminator: false,
        successors: Successors::None,
        side_effects: false,
        may_trap: false,
    }
}

const fn trapping(mut info: OpcodeInfo) -> OpcodeInfo {
    info.may_trap = true;
    info
}

const fn effectful(mut info: OpcodeInfo) -> OpcodeInfo {
    info.side_effects = true;
    info
}

const fn terminator(mut info: OpcodeInfo, successors: Successors) -> OpcodeInfo {
    info.terminator = true;
    info.successors = successors;
    info.side_effects = true;
    info
}

impl Opcode {
    /// Number of opcodes.
    pub const COUNT: usize = Self::ALL.len();

    /// Every opcode, in discriminant order.
    pub const ALL: [Self; 66] = [
        Self::IAdd,
        Self::ISub,
        Self::IMul,
        Self::SDiv,
        Self::UDiv,
        Self::SRem,
        Self::URem,
        Self::IAddOvf,
        Self::ISubOvf,
        Self::IMulOvf,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Shl,
        Self::LShr,
        Self::AShr,
        Self::ICmpEq,
        Self::ICmpNe,
        Self::SCmpLt,
        Self::SCmpLe,
        Self::SCmpGt,
        Self::SCmpGe,
        Self::UCmpLt,
        Self::UCmpLe,
        Self::UCmpGt,
        Self::UCmpGe,
        Self::FAdd,
        Self::FSub,
        Self::FMul,
        Self::FDiv,
        Self::FCmpEq,
        Self::FCmpNe,
        Self::FCmpLt,
        Self::FCmpLe,
        Self::FCmpGt,
        Self::FCmpGe,
        Self::FCmpOrd,
        Self::FCmpUno,
        Self::IConst,
        Self::FConst,
        Self::ConstStr,
        Self::ConstNull,
        Self::Alloca,
        Self::Load,
        Self::Store,
        Self::Gep,
        Self::AddrOf,
        Self::Trunc1,
        Self::Zext1,
        Self::Sitofp,
        Self::Fptosi,
        Self::CastSiNarrowChk,
        Self::CastUiNarrowChk,
        Self::CastFpToSiRteChk,
        Self::CastFpToUiRteChk,
        Self::Call,
        Self::Br,
        Self::CBr,
        Self::SwitchI32,
        Self::Ret,
        Self::Trap,
        Self::Retain,
        Self::Release,
        Self::EhPush,
        Self::EhPop,
        Self::Throw,
    ];

    /// Returns the opcode's static metadata.
    #[must_use]
    pub const fn info(self) -> OpcodeInfo {
        use OpClass::*;
        match self {
            Self::IAdd => row("add", IntBinary, Some(2), true),
            Self::ISub => row("sub", IntBinary, Some(2), true),
            Self::IMul => row("mul", IntBinary, Some(2), true),
            Self::SDiv => trapping(row("sdiv", IntBinary, Some(2), true)),
            Self::UDiv => trapping(row("udiv", IntBinary, Some(2), true)),
            Self::SRem => trapping(row("srem", IntBinary, Some(2), true)),
            Self::URem => trapping(row("urem", IntBinary, Some(2), true)),
            Self::IAddOvf => trapping(row("iadd.ovf", IntBinary, Some(2), true)),
            Self::ISubOvf => trapping(row("isub.ovf", IntBinary, Some(2), true)),
            Self::IMulOvf => trapping(row("imul.ovf", IntBinary, Some(2), true)),
            Self::And => row("and", IntBinary, Some(2), true),
            Self::Or => row("or", IntBinary, Some(2), true),
            Self::Xor => row("xor", IntBinary, Some(2), true),
            Self::Shl => row("shl", IntBinary, Some(2), true),
            Self::LShr => row("lshr", IntBinary, Some(2), true),
            Self::AShr => row("ashr", IntBinary, Some(2), true),
            Self::ICmpEq => row("icmp_eq", IntCompare, Some(2), true),
            Self::ICmpNe => row("icmp_ne", IntCompare, Some(2), true),
            Self::SCmpLt => row("scmp_lt", IntCompare, Some(2), true),
            Self::SCmpLe => row("scmp_le", IntCompare, Some(2), true),
            Self::SCmpGt => row("scmp_gt", IntCompare, Some(2), true),
            Self::SCmpGe => row("scmp_ge", IntCompare, Some(2), true),
            Self::UCmpLt => row("ucmp_lt", IntCompare, Some(2), true),
            Self::UCmpLe => row("ucmp_le", IntCompare, Some(2), true),
            Self::UCmpGt => row("ucmp_gt", IntCompare, Some(2), true),
            Self::UCmpGe => row("ucmp_ge", IntCompare, Some(2), true),
            Self::FAdd => row("fadd", FloatBinary, Some(2), true),
            Self::FSub => row("fsub", FloatBinary, Some(2), true),
            Self::FMul => row("fmul", FloatBinary, Some(2), true),
            Self::FDiv => row("fdiv", FloatBinary, Some(2), true),
            Self::FCmpEq => row("fcmp_eq", FloatCompare, Some(2), true),
            Self::FCmpNe => row("fcmp_ne", FloatCompare, Some(2), true),
            Self::FCmpLt => row("fcmp_lt", FloatCompare, Some(2), true),
            Self::FCmpLe => row("fcmp_le", FloatCompare, Some(2), true),
            Self::FCmpGt => row("fcmp_gt", FloatCompare, Some(2), true),
            Self::FCmpGe => row("fcmp_ge", FloatCompare, Some(2), true),
            Self::FCmpOrd => row("fcmp_ord", FloatCompare, Some(2), true),
            Self::FCmpUno => row("fcmp_uno", FloatCompare, Some(2), true),
            Self::IConst => row("iconst", Constant, Some(1), true),
            Self::FConst => row("fconst", Constant, Some(1), true),
            Self::ConstStr => row("const_str", Constant, Some(1), true),
            Self::ConstNull => row("const_null", Constant, Some(0), true),
            Self::Alloca => effectful(trapping(row("alloca", Memory, Some(1), true))),
            Self::Load => trapping(row("load", Memory, Some(1), true)),
            Self::Store => effectful(trapping(row("store", Memory, Some(2), false))),
            Self::Gep => row("gep", Memory, Some(2), true),
            Self::AddrOf => row("addr_of", Memory, Some(1), true),
            Self::Trunc1 => row("trunc1", Cast, Some(1), true),
            Self::Zext1 => row("zext1", Cast, Some(1), true),
            Self::Sitofp => row("sitofp", Cast, Some(1), true),
            Self::Fptosi => trapping(row("fptosi", Cast, Some(1), true)),
            Self::CastSiNarrowChk => trapping(row("cast.si_narrow.chk", Cast, Some(1), true)),
            Self::CastUiNarrowChk => trapping(row("cast.ui_narrow.chk", Cast, Some(1), true)),
            Self::CastFpToSiRteChk => {
                trapping(row("cast.fp_to_si.rte.chk", Cast, Some(1), true))
            }
            Self::CastFpToUiRteChk => {
                trapping(row("cast.fp_to_ui.rte.chk", Cast, Some(1), true))
            }
            Self::Call => effectful(trapping(row("call", Call, None, true))),
            Self::Br => terminator(row("br", Control, Some(0), false), Successors::One),
            Self::CBr => terminator(row("cbr", Control, Some(1), false), Successors::Two),
            Self::SwitchI32 => {
                terminator(row("switch", Control, None, false), Successors::Switch)
            }
            Self::Ret => terminator(row("ret", Control, None, false), Successors::None),
            Self::Trap => terminator(
                trapping(row("trap", Control, Some(0), false)),
                Successors::None,
            ),
            Self::Retain => effectful(row("retain", RefCount, Some(1), false)),
            Self::Release => effectful(row("release", RefCount, Some(1), false)),
            Self::EhPush => {
                let mut info = effectful(row("eh.push", Exception, Some(0), false));
                info.successors = Successors::One;
                info
            }
            Self::EhPop => effectful(row("eh.pop", Exception, Some(0), false)),
            Self::Throw => terminator(
                trapping(row("throw", Exception, Some(1), false)),
                Successors::None,
            ),
        }
    }

    /// Text-format mnemonic.
    #[inline]
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    /// Returns `true` for block terminators.
    #[inline]
    #[must_use]
    pub const fn is_terminator(self) -> bool {
        self.info().terminator
    }

    /// Returns `true` for ops that can be removed or duplicated when their result is unused or
    /// recomputed: no side effects and no possible trap.
    #[inline]
    #[must_use]
    pub const fn is_pure(self) -> bool {
        let info = self.info();
        !info.side_effects && !info.may_trap && !info.terminator
    }

    /// Dense index of this opcode (its discriminant).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks up an opcode by mnemonic. Accepts the `iadd`/`isub`/`imul` aliases.
    #[must_use]
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "iadd" => return Some(Self::IAdd),
            "isub" => return Some(Self::ISub),
            "imul" => return Some(Self::IMul),
            "switch.i32" => return Some(Self::SwitchI32),
            _ => {}
        }
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_in_discriminant_order() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.index(), i, "{op:?} out of order");
        }
    }

    #[test]
    fn mnemonics_are_unique_and_resolve() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("iadd"), Some(Opcode::IAdd));
        assert_eq!(Opcode::from_mnemonic("frobnicate"), None);
    }

    #[test]
    fn terminators() {
        assert!(Opcode::Br.is_terminator());
        assert!(Opcode::Throw.is_terminator());
        assert!(!Opcode::Call.is_terminator());
        assert!(Opcode::IAdd.is_pure());
        assert!(!Opcode::SDiv.is_pure());
        assert!(!Opcode::Load.is_pure());
    }
}
