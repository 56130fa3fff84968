// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics sink shared by passes, the verifier, and frontends.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Accumulates error and warning messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Diagnostics {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error.
    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Records a warning.
    pub fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Returns `true` if any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if any warning was recorded.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Recorded errors.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Recorded warnings.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Writes every error to `err` and every warning to `warn` (or `err` when `None`), one message
    /// per line.
    pub fn flush(
        &self,
        err: &mut dyn fmt::Write,
        warn: Option<&mut dyn fmt::Write>,
    ) -> fmt::Result {
        for e in &self.errors {
            write_line(err, e)?;
        }
        match warn {
            Some(w) => {
                for m in &self.warnings {
                    write_line(w, m)?;
                }
            }
            None => {
                for m in &self.warnings {
                    write_line(err, m)?;
                }
            }
        }
        Ok(())
    }
}

fn write_line(out: &mut dyn fmt::Write, msg: &str) -> fmt::Result {
    out.write_str(msg)?;
    if !msg.ends_with('\n') {
        out.write_char('\n')?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_terminates_every_message() {
        let mut d = Diagnostics::new();
        d.error("bad thing");
        d.error("already terminated\n");
        d.warning("careful");
        assert!(d.has_errors());
        assert!(d.has_warnings());

        let mut err = String::new();
        let mut warn = String::new();
        d.flush(&mut err, Some(&mut warn)).unwrap();
        assert_eq!(err, "bad thing\nalready terminated\n");
        assert_eq!(warn, "careful\n");

        let mut both = String::new();
        d.flush(&mut both, None).unwrap();
        assert_eq!(both, "bad thing\nalready terminated\ncareful\n");
    }
}
