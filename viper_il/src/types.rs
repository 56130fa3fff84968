// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IL scalar types.

use core::fmt;

/// A scalar IL type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// No value.
    Void,
    /// Boolean (`0` or `1`).
    I1,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// IEEE-754 binary64.
    F64,
    /// Pointer (stack, global, or heap object).
    Ptr,
    /// Reference-counted string handle.
    Str,
}

impl Type {
    /// All types, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Void,
        Self::I1,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::F64,
        Self::Ptr,
        Self::Str,
    ];

    /// Returns `true` for `i1`, `i16`, `i32`, and `i64`.
    #[inline]
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I1 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns `true` for `f64`.
    #[inline]
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64)
    }

    /// Returns `true` for integer and float types.
    #[inline]
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Returns `true` for `ptr`.
    #[inline]
    #[must_use]
    pub const fn is_pointer(self) -> bool {
        matches!(self, Self::Ptr)
    }

    /// Returns `true` for `i1`.
    #[inline]
    #[must_use]
    pub const fn is_bool(self) -> bool {
        matches!(self, Self::I1)
    }

    /// Size of a value of this type in bytes.
    #[inline]
    #[must_use]
    pub const fn size_in_bytes(self) -> u32 {
        match self {
            Self::Void => 0,
            Self::I1 => 1,
            Self::I16 => 2,
            Self::I32 => 4,
            Self::I64 | Self::F64 | Self::Ptr | Self::Str => 8,
        }
    }

    /// Bit width for integer types (`0` otherwise).
    #[inline]
    #[must_use]
    pub const fn bit_width(self) -> u32 {
        match self {
            Self::I1 => 1,
            Self::I16 => 16,
            Self::I32 => 32,
            Self::I64 => 64,
            _ => 0,
        }
    }

    /// Smallest representable signed value for integer types.
    #[must_use]
    pub const fn int_min(self) -> Option<i64> {
        match self {
            Self::I1 => Some(0),
            Self::I16 => Some(i16::MIN as i64),
            Self::I32 => Some(i32::MIN as i64),
            Self::I64 => Some(i64::MIN),
            _ => None,
        }
    }

    /// Largest representable signed value for integer types.
    #[must_use]
    pub const fn int_max(self) -> Option<i64> {
        match self {
            Self::I1 => Some(1),
            Self::I16 => Some(i16::MAX as i64),
            Self::I32 => Some(i32::MAX as i64),
            Self::I64 => Some(i64::MAX),
            _ => None,
        }
    }

    /// Largest representable unsigned value for integer types.
    #[must_use]
    pub const fn uint_max(self) -> Option<u64> {
        match self {
            Self::I1 => Some(1),
            Self::I16 => Some(u16::MAX as u64),
            Self::I32 => Some(u32::MAX as u64),
            Self::I64 => Some(u64::MAX),
            _ => None,
        }
    }

    /// Normalizes `v` to this type's width: `i1` keeps the low bit, narrower integers are
    /// truncated and sign-extended. Non-integer types return `v` unchanged.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "truncation to the type width is the point")]
    pub const fn wrap_int(self, v: i64) -> i64 {
        match self {
            Self::I1 => v & 1,
            Self::I16 => v as i16 as i64,
            Self::I32 => v as i32 as i64,
            _ => v,
        }
    }

    /// Reinterprets a normalized value as unsigned at this type's width.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "truncation to the type width is the point")]
    pub const fn as_unsigned(self, v: i64) -> u64 {
        match self {
            Self::I1 => (v & 1) as u64,
            Self::I16 => v as u16 as u64,
            Self::I32 => v as u32 as u64,
            _ => v as u64,
        }
    }

    /// Returns the type name used by the text format.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::I1 => "i1",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F64 => "f64",
            Self::Ptr => "ptr",
            Self::Str => "str",
        }
    }

    /// Parses a type name (`i64`, `str`, ...).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == s)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the type two operands are promoted to.
///
/// `a` if equal; `f64` if either is float; the wider integer for two integers; `void` otherwise.
#[must_use]
pub fn common_type(a: Type, b: Type) -> Type {
    if a == b {
        return a;
    }
    if a.is_float() || b.is_float() {
        if a.is_numeric() && b.is_numeric() {
            return Type::F64;
        }
        return Type::Void;
    }
    if a.is_integer() && b.is_integer() {
        return if a.bit_width() >= b.bit_width() { a } else { b };
    }
    Type::Void
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_the_abi() {
        assert_eq!(Type::I1.size_in_bytes(), 1);
        assert_eq!(Type::I16.size_in_bytes(), 2);
        assert_eq!(Type::I32.size_in_bytes(), 4);
        assert_eq!(Type::Str.size_in_bytes(), 8);
        assert_eq!(Type::Void.size_in_bytes(), 0);
    }

    #[test]
    fn common_type_rules() {
        assert_eq!(common_type(Type::I32, Type::I32), Type::I32);
        assert_eq!(common_type(Type::I16, Type::F64), Type::F64);
        assert_eq!(common_type(Type::I16, Type::I64), Type::I64);
        assert_eq!(common_type(Type::I64, Type::I1), Type::I64);
        assert_eq!(common_type(Type::Str, Type::I64), Type::Void);
        assert_eq!(common_type(Type::Ptr, Type::F64), Type::Void);
    }

    #[test]
    fn names_parse_back() {
        for t in Type::ALL {
            assert_eq!(Type::parse(t.name()), Some(t));
        }
        assert_eq!(Type::parse("u8"), None);
    }
}
