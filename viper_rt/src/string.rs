// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable byte strings.
//!
//! Positions are byte offsets. `left`/`right`/`mid` take 0-based starts; `instr` reports
//! 1-based positions with 0 meaning "not found". Trimming strips spaces and tabs only.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::format;
use std::string::String;

use crate::heap::{Heap, HeapError, ObjRef};
use crate::trap::{RtTrap, TrapKind};

/// String payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RtString(Box<[u8]>);

impl RtString {
    /// The bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for RtString {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

impl From<Vec<u8>> for RtString {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }
}

impl From<&str> for RtString {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().into())
    }
}

fn negative(what: &str, arg: &str, v: i64) -> RtTrap {
    RtTrap::with_message(
        TrapKind::InvalidOperation,
        format!("{what}: {arg} must be >= 0 (got {v})"),
    )
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Formats a float with the shortest representation that reads back to the same value.
/// Integral values print without a fractional part.
#[must_use]
pub fn format_f64(v: f64) -> String {
    if v.is_nan() {
        return "NaN".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Inf".into() } else { "-Inf".into() };
    }
    format!("{v}")
}

/// Parses the longest numeric prefix of `bytes` after leading whitespace; 0 when there is none.
#[must_use]
pub fn parse_val(bytes: &[u8]) -> f64 {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let s = &bytes[start..];
    let mut end = 0;
    if matches!(s.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_digits = s[end..].iter().take_while(|b| b.is_ascii_digit()).count();
    end += int_digits;
    let mut frac_digits = 0;
    if s.get(end) == Some(&b'.') {
        frac_digits = s[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return 0.0;
    }
    if matches!(s.get(end), Some(b'e' | b'E')) {
        let mut e = end + 1;
        if matches!(s.get(e), Some(b'+' | b'-')) {
            e += 1;
        }
        let exp_digits = s[e.min(s.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if exp_digits > 0 {
            end = e + exp_digits;
        }
    }
    core::str::from_utf8(&s[..end])
        .ok()
        .and_then(|t| t.parse::<f64>().ok())
        .unwrap_or(0.0)
}

impl Heap {
    /// Allocates a string from bytes.
    pub fn str_new(&mut self, bytes: &[u8]) -> ObjRef {
        self.alloc(RtString::from(bytes))
    }

    /// Allocates a string from UTF-8 text.
    pub fn str_from(&mut self, s: &str) -> ObjRef {
        self.str_new(s.as_bytes())
    }

    /// Borrows the bytes of string `s`.
    pub fn str_bytes(&self, s: ObjRef) -> Result<&[u8], HeapError> {
        self.borrow::<RtString>(s).map(RtString::as_bytes)
    }

    /// Lossy UTF-8 view of string `s`.
    pub fn str_lossy(&self, s: ObjRef) -> Result<Cow<'_, str>, HeapError> {
        self.str_bytes(s).map(String::from_utf8_lossy)
    }

    /// Length of `s` in bytes.
    pub fn str_len(&self, s: ObjRef) -> Result<i64, HeapError> {
        self.str_bytes(s)
            .map(|b| i64::try_from(b.len()).unwrap_or(i64::MAX))
    }

    /// Byte-wise comparison.
    pub fn str_cmp(&self, a: ObjRef, b: ObjRef) -> Result<Ordering, HeapError> {
        Ok(self.str_bytes(a)?.cmp(self.str_bytes(b)?))
    }

    /// Content equality.
    pub fn str_eq(&self, a: ObjRef, b: ObjRef) -> Result<bool, HeapError> {
        Ok(self.str_cmp(a, b)? == Ordering::Equal)
    }

    /// A new string holding `a` followed by `b`. The inputs are not consumed.
    pub fn str_concat(&mut self, a: ObjRef, b: ObjRef) -> Result<ObjRef, HeapError> {
        let mut out = self.str_bytes(a)?.to_vec();
        out.extend_from_slice(self.str_bytes(b)?);
        Ok(self.alloc(RtString::from(out)))
    }

    /// `len` bytes starting at `start`, clamped to the string.
    pub fn str_substring(&mut self, s: ObjRef, start: i64, len: i64) -> Result<ObjRef, RtTrap> {
        if start < 0 {
            return Err(negative("MID$", "start", start));
        }
        if len < 0 {
            return Err(negative("MID$", "len", len));
        }
        let bytes = self.str_bytes(s)?;
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(bytes.len());
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        let end = start.saturating_add(len).min(bytes.len());
        let out = bytes[start..end].to_vec();
        Ok(self.alloc(RtString::from(out)))
    }

    /// The first `n` bytes.
    pub fn str_left(&mut self, s: ObjRef, n: i64) -> Result<ObjRef, RtTrap> {
        if n < 0 {
            return Err(negative("LEFT$", "len", n));
        }
        self.str_substring(s, 0, n)
    }

    /// The last `n` bytes.
    pub fn str_right(&mut self, s: ObjRef, n: i64) -> Result<ObjRef, RtTrap> {
        if n < 0 {
            return Err(negative("RIGHT$", "len", n));
        }
        let len = self.str_len(s)?;
        let start = len.saturating_sub(n).max(0);
        self.str_substring(s, start, n)
    }

    /// Everything from `start` on.
    pub fn str_mid(&mut self, s: ObjRef, start: i64) -> Result<ObjRef, RtTrap> {
        self.str_substring(s, start, i64::MAX)
    }

    fn str_map(&mut self, s: ObjRef, f: impl Fn(u8) -> u8) -> Result<ObjRef, HeapError> {
        let out: Vec<u8> = self.str_bytes(s)?.iter().map(|&b| f(b)).collect();
        Ok(self.alloc(RtString::from(out)))
    }

    /// ASCII uppercase.
    pub fn str_ucase(&mut self, s: ObjRef) -> Result<ObjRef, HeapError> {
        self.str_map(s, |b| b.to_ascii_uppercase())
    }

    /// ASCII lowercase.
    pub fn str_lcase(&mut self, s: ObjRef) -> Result<ObjRef, HeapError> {
        self.str_map(s, |b| b.to_ascii_lowercase())
    }

    fn str_trim_with(&mut self, s: ObjRef, left: bool, right: bool) -> Result<ObjRef, HeapError> {
        let bytes = self.str_bytes(s)?;
        let mut start = 0;
        let mut end = bytes.len();
        if left {
            while start < end && is_blank(bytes[start]) {
                start += 1;
            }
        }
        if right {
            while end > start && is_blank(bytes[end - 1]) {
                end -= 1;
            }
        }
        let out = bytes[start..end].to_vec();
        Ok(self.alloc(RtString::from(out)))
    }

    /// Strips leading and trailing blanks.
    pub fn str_trim(&mut self, s: ObjRef) -> Result<ObjRef, HeapError> {
        self.str_trim_with(s, true, true)
    }

    /// Strips leading blanks.
    pub fn str_ltrim(&mut self, s: ObjRef) -> Result<ObjRef, HeapError> {
        self.str_trim_with(s, true, false)
    }

    /// Strips trailing blanks.
    pub fn str_rtrim(&mut self, s: ObjRef) -> Result<ObjRef, HeapError> {
        self.str_trim_with(s, false, true)
    }

    /// One-byte string from a code in `0..=255`.
    pub fn str_chr(&mut self, code: i64) -> Result<ObjRef, RtTrap> {
        let b = u8::try_from(code).map_err(|_| {
            RtTrap::with_message(
                TrapKind::InvalidOperation,
                format!("CHR$: code must be 0-255 (got {code})"),
            )
        })?;
        Ok(self.alloc(RtString::from(&[b][..])))
    }

    /// Code of the first byte, 0 for the empty string.
    pub fn str_asc(&self, s: ObjRef) -> Result<i64, HeapError> {
        Ok(self.str_bytes(s)?.first().map_or(0, |&b| i64::from(b)))
    }

    /// 1-based position of `needle` in `hay`, 0 when absent; an empty needle is found at 1.
    pub fn str_instr(&self, hay: ObjRef, needle: ObjRef) -> Result<i64, HeapError> {
        self.str_instr_from(1, hay, needle)
    }

    /// Like [`Heap::str_instr`], searching from the 1-based position `start`.
    pub fn str_instr_from(
        &self,
        start: i64,
        hay: ObjRef,
        needle: ObjRef,
    ) -> Result<i64, HeapError> {
        let hay = self.str_bytes(hay)?;
        let needle = self.str_bytes(needle)?;
        let pos = usize::try_from(start.saturating_sub(1))
            .unwrap_or(0)
            .min(hay.len());
        let to_i64 = |i: usize| i64::try_from(i).unwrap_or(i64::MAX);
        if needle.is_empty() {
            return Ok(to_i64(pos + 1));
        }
        Ok(hay[pos..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map_or(0, |i| to_i64(pos + i + 1)))
    }

    /// Numeric value of the longest numeric prefix.
    pub fn str_val(&self, s: ObjRef) -> Result<f64, RtTrap> {
        let v = parse_val(self.str_bytes(s)?);
        if !v.is_finite() {
            return Err(RtTrap::with_message(TrapKind::Overflow, "rt_val: overflow"));
        }
        Ok(v)
    }

    /// Decimal rendering of an integer.
    pub fn str_from_i64(&mut self, v: i64) -> ObjRef {
        self.str_from(&format!("{v}"))
    }

    /// Shortest round-trip rendering of a float.
    pub fn str_from_f64(&mut self, v: f64) -> ObjRef {
        self.str_from(&format_f64(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(heap: &Heap, s: ObjRef) -> String {
        heap.str_lossy(s).unwrap().into_owned()
    }

    #[test]
    fn slicing_clamps_and_rejects_negative_lengths() {
        let mut heap = Heap::new();
        let s = heap.str_from("hello world");
        let l = heap.str_left(s, 5).unwrap();
        let r = heap.str_right(s, 5).unwrap();
        let m = heap.str_mid(s, 6).unwrap();
        let sub = heap.str_substring(s, 4, 100).unwrap();
        assert_eq!(text(&heap, l), "hello");
        assert_eq!(text(&heap, r), "world");
        assert_eq!(text(&heap, m), "world");
        assert_eq!(text(&heap, sub), "o world");
        let err = heap.str_left(s, -1).unwrap_err();
        assert_eq!(err.kind, TrapKind::InvalidOperation);
        assert_eq!(err.message.as_deref(), Some("LEFT$: len must be >= 0 (got -1)"));
    }

    #[test]
    fn trims_blanks_only() {
        let mut heap = Heap::new();
        let s = heap.str_from(" \tab c\t \n");
        let t = heap.str_trim(s).unwrap();
        assert_eq!(text(&heap, t), "ab c\t \n");
        let s = heap.str_from("  x  ");
        let l = heap.str_ltrim(s).unwrap();
        let r = heap.str_rtrim(s).unwrap();
        assert_eq!(text(&heap, l), "x  ");
        assert_eq!(text(&heap, r), "  x");
    }

    #[test]
    fn instr_is_one_based() {
        let mut heap = Heap::new();
        let hay = heap.str_from("abcabc");
        let needle = heap.str_from("bc");
        let empty = heap.str_from("");
        assert_eq!(heap.str_instr(hay, needle).unwrap(), 2);
        assert_eq!(heap.str_instr_from(3, hay, needle).unwrap(), 5);
        assert_eq!(heap.str_instr_from(6, hay, needle).unwrap(), 0);
        assert_eq!(heap.str_instr(hay, empty).unwrap(), 1);
        assert_eq!(heap.str_instr_from(100, hay, empty).unwrap(), 7);
    }

    #[test]
    fn val_reads_the_numeric_prefix() {
        assert_eq!(parse_val(b"  42abc"), 42.0);
        assert_eq!(parse_val(b"-3.5e2x"), -350.0);
        assert_eq!(parse_val(b"1e"), 1.0);
        assert_eq!(parse_val(b".5"), 0.5);
        assert_eq!(parse_val(b"abc"), 0.0);
        assert_eq!(parse_val(b"-"), 0.0);
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_f64(3.0), "3");
        assert_eq!(format_f64(0.1), "0.1");
        assert_eq!(format_f64(-2.5), "-2.5");
        assert_eq!(format_f64(f64::INFINITY), "Inf");
    }

    #[test]
    fn chr_asc_and_case() {
        let mut heap = Heap::new();
        let a = heap.str_chr(65).unwrap();
        assert_eq!(heap.str_asc(a).unwrap(), 65);
        assert!(heap.str_chr(256).is_err());
        let s = heap.str_from("MiXeD");
        let u = heap.str_ucase(s).unwrap();
        let l = heap.str_lcase(s).unwrap();
        assert_eq!(text(&heap, u), "MIXED");
        assert_eq!(text(&heap, l), "mixed");
        let c = heap.str_concat(u, l).unwrap();
        assert_eq!(text(&heap, c), "MIXEDmixed");
        assert_eq!(heap.str_cmp(l, u).unwrap(), Ordering::Greater);
    }
}
