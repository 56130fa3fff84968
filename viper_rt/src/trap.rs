// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trap kinds shared by the runtime and the VM.

use std::fmt;

/// Category of an unrecoverable runtime error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrapKind {
    /// Signed overflow in a checked operation.
    Overflow,
    /// Integer division or remainder by zero.
    DivideByZero,
    /// Narrowing or float-to-int conversion out of range.
    InvalidCast,
    /// Invalid pointer, bad handle, or misuse of a runtime object.
    InvalidOperation,
    /// Math function evaluated outside its domain.
    DomainError,
    /// Explicit `trap`.
    Unreachable,
    /// IL that should have been rejected by the verifier.
    MalformedIr,
    /// Host I/O failure.
    IoError,
    /// Missing file.
    FileNotFound,
    /// Read past end of input.
    Eof,
}

impl TrapKind {
    /// Canonical name used in trap reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Overflow => "Overflow",
            Self::DivideByZero => "DivideByZero",
            Self::InvalidCast => "InvalidCast",
            Self::InvalidOperation => "InvalidOperation",
            Self::DomainError => "DomainError",
            Self::Unreachable => "Unreachable",
            Self::MalformedIr => "MalformedIR",
            Self::IoError => "IOError",
            Self::FileNotFound => "FileNotFound",
            Self::Eof => "EOF",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A trap raised by a runtime helper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RtTrap {
    /// Category.
    pub kind: TrapKind,
    /// Secondary code (`Err_*` value for I/O traps, otherwise 0).
    pub code: i32,
    /// Optional detail, rendered after the kind.
    pub message: Option<Box<str>>,
}

impl RtTrap {
    /// A trap with no message and code 0.
    #[must_use]
    pub const fn new(kind: TrapKind) -> Self {
        Self {
            kind,
            code: 0,
            message: None,
        }
    }

    /// A trap carrying a message.
    #[must_use]
    pub fn with_message(kind: TrapKind, message: impl Into<Box<str>>) -> Self {
        Self {
            kind,
            code: 0,
            message: Some(message.into()),
        }
    }

    /// Sets the secondary code.
    #[must_use]
    pub const fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }
}

impl fmt::Display for RtTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl core::error::Error for RtTrap {}
