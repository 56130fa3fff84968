// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-program runtime state.

use std::string::String;

use crate::channel::ChannelTable;
use crate::heap::{Heap, HeapError, ObjRef};
use crate::random::Rng;
use crate::string::format_f64;

/// Everything a running program mutates outside its own frames: the object heap, the random
/// generator, open file channels, and buffered console output.
#[derive(Debug, Default)]
pub struct RtContext {
    /// Object heap.
    pub heap: Heap,
    /// Random number generator.
    pub rng: Rng,
    /// Open file channels.
    pub channels: ChannelTable,
    output: String,
}

impl RtContext {
    /// A fresh context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends string object `s` to the output.
    pub fn print_str(&mut self, s: ObjRef) -> Result<(), HeapError> {
        let text = self.heap.str_lossy(s)?;
        self.output.push_str(&text);
        Ok(())
    }

    /// Appends a decimal integer.
    pub fn print_i64(&mut self, v: i64) {
        self.output.push_str(&v.to_string());
    }

    /// Appends a float in runtime number format.
    pub fn print_f64(&mut self, v: f64) {
        self.output.push_str(&format_f64(v));
    }

    /// Appends raw text.
    pub fn print_text(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Appends a newline.
    pub fn print_newline(&mut self) {
        self.output.push('\n');
    }

    /// Output produced so far, without draining it.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Drains buffered output.
    pub fn take_output(&mut self) -> String {
        core::mem::take(&mut self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_buffers_until_taken() {
        let mut cx = RtContext::new();
        let s = cx.heap.str_from("n=");
        cx.print_str(s).unwrap();
        cx.print_i64(-3);
        cx.print_text(" ");
        cx.print_f64(2.5);
        cx.print_newline();
        assert_eq!(cx.output(), "n=-3 2.5\n");
        assert_eq!(cx.take_output(), "n=-3 2.5\n");
        assert!(cx.output().is_empty());
    }
}
