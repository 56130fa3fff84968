// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime values held in registers and memory.

use std::fmt;

use viper_rt::{ObjRef, RtTrap, TrapKind};

/// A pointer value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ptr {
    /// The null pointer.
    #[default]
    Null,
    /// Byte offset into the stack area of the frame at depth `frame`.
    Stack {
        /// Frame depth (0 is the entry frame).
        frame: u32,
        /// Activation that allocated the slot. A pointer is dangling once the frame at `frame`
        /// belongs to a different activation.
        activation: u32,
        /// Byte offset.
        offset: u32,
    },
    /// Byte offset into module global storage.
    Global {
        /// Byte offset.
        offset: u32,
    },
    /// A heap object.
    Obj(ObjRef),
}

/// A register value.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Slot {
    /// Unset, or the result of a `void` call.
    #[default]
    None,
    /// Any integer type, normalized to its width and sign-extended.
    I64(i64),
    /// `f64`.
    F64(f64),
    /// `ptr`.
    Ptr(Ptr),
    /// `str`; `None` is the null string.
    Str(Option<ObjRef>),
}

fn mismatch(expected: &str, found: &Slot) -> RtTrap {
    RtTrap::with_message(
        TrapKind::MalformedIr,
        format!("expected {expected} operand, found {}", found.kind()),
    )
}

impl Slot {
    /// Kind name for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::I64(_) => "int",
            Self::F64(_) => "f64",
            Self::Ptr(_) => "ptr",
            Self::Str(_) => "str",
        }
    }

    /// The integer payload.
    pub fn int(&self) -> Result<i64, RtTrap> {
        match self {
            Self::I64(v) => Ok(*v),
            other => Err(mismatch("int", other)),
        }
    }

    /// The float payload.
    pub fn float(&self) -> Result<f64, RtTrap> {
        match self {
            Self::F64(v) => Ok(*v),
            other => Err(mismatch("f64", other)),
        }
    }

    /// The pointer payload. A null string reads as the null pointer.
    pub fn ptr(&self) -> Result<Ptr, RtTrap> {
        match self {
            Self::Ptr(p) => Ok(*p),
            Self::Str(None) => Ok(Ptr::Null),
            other => Err(mismatch("ptr", other)),
        }
    }

    /// The string handle; the null pointer reads as the null string.
    pub fn str(&self) -> Result<Option<ObjRef>, RtTrap> {
        match self {
            Self::Str(s) => Ok(*s),
            Self::Ptr(Ptr::Null) => Ok(None),
            other => Err(mismatch("str", other)),
        }
    }

    /// The heap object behind a `str` or object pointer, if any.
    #[must_use]
    pub fn object(&self) -> Option<ObjRef> {
        match self {
            Self::Str(s) => *s,
            Self::Ptr(Ptr::Obj(o)) => Some(*o),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("void"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F64(v) => f.write_str(&viper_rt::string::format_f64(*v)),
            Self::Ptr(Ptr::Null) | Self::Str(None) => f.write_str("null"),
            Self::Ptr(Ptr::Stack {
                frame,
                activation,
                offset,
            }) => write!(f, "stack:{frame}.{activation}+{offset}"),
            Self::Ptr(Ptr::Global { offset }) => write!(f, "global+{offset}"),
            Self::Ptr(Ptr::Obj(o)) | Self::Str(Some(o)) => write!(f, "obj#{}", o.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_check_kinds() {
        assert_eq!(Slot::I64(3).int(), Ok(3));
        assert_eq!(Slot::F64(1.5).float(), Ok(1.5));
        let err = Slot::F64(1.0).int().unwrap_err();
        assert_eq!(err.kind, TrapKind::MalformedIr);
        assert_eq!(Slot::Ptr(Ptr::Null).str(), Ok(None));
        assert_eq!(Slot::Str(None).ptr(), Ok(Ptr::Null));
        assert!(Slot::None.ptr().is_err());
        assert_eq!(Slot::I64(-7).to_string(), "-7");
        assert_eq!(Slot::F64(2.0).to_string(), "2");
    }
}
