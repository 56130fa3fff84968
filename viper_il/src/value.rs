// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IL operand values.

use alloc::boxed::Box;
use core::fmt;

/// An SSA temp id, dense within its function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(pub u32);

impl TempId {
    /// Returns the id as an index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into a module's literal pool (rendered as `.L<n>`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiteralId(pub u32);

/// An immutable IL operand.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Integer constant (also used for `i1`).
    ConstInt(i64),
    /// Float constant.
    ConstFloat(f64),
    /// Interned string literal.
    ConstStr(LiteralId),
    /// The null pointer.
    Null,
    /// SSA temp.
    Temp(TempId),
    /// Module-level symbol.
    Global(Box<str>),
}

impl Value {
    /// Shorthand for `Value::Temp(TempId(id))`.
    #[inline]
    #[must_use]
    pub const fn temp(id: u32) -> Self {
        Self::Temp(TempId(id))
    }

    /// Returns the temp id if this is a temp.
    #[inline]
    #[must_use]
    pub fn as_temp(&self) -> Option<TempId> {
        match self {
            Self::Temp(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the integer payload if this is an integer constant.
    #[inline]
    #[must_use]
    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Self::ConstInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` for embedded constants (`ConstInt`, `ConstFloat`, `ConstStr`, `Null`).
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Self::ConstInt(_) | Self::ConstFloat(_) | Self::ConstStr(_) | Self::Null
        )
    }

    /// Structural equality that treats floats bitwise (so `NaN == NaN`).
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ConstFloat(a), Self::ConstFloat(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstInt(v) => write!(f, "{v}"),
            Self::ConstFloat(v) => fmt_float(*v, f),
            Self::ConstStr(id) => write!(f, ".L{}", id.0),
            Self::Null => f.write_str("null"),
            Self::Temp(t) => write!(f, "%t{}", t.0),
            Self::Global(name) => write!(f, "@{name}"),
        }
    }
}

/// Formats a float so that the text parser reads it back as a float.
pub(crate) fn fmt_float(v: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if v.is_nan() {
        f.write_str("nan")
    } else if v.is_infinite() {
        f.write_str(if v > 0.0 { "inf" } else { "-inf" })
    } else if v == v.trunc() && v.abs() < 1e16 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v:?}")
    }
}
