// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Byte-addressed memory regions backing frame stacks and module globals.
//!
//! Scalars are stored little-endian in the byte buffer. Pointers and strings cannot be
//! represented as bytes, so they live in a side table keyed by their (8-byte aligned) offset;
//! any scalar store that overlaps such an entry discards it.

use hashbrown::HashMap;

use viper_il::Type;
use viper_rt::{RtTrap, TrapKind};

use crate::slot::Slot;

const WORD: u32 = 8;

/// A fixed-capacity memory region with a bump allocator.
#[derive(Clone, Debug, Default)]
pub struct Region {
    bytes: Vec<u8>,
    refs: HashMap<u32, Slot>,
    used: u32,
}

fn invalid(msg: &str) -> RtTrap {
    RtTrap::with_message(TrapKind::InvalidOperation, msg)
}

impl Region {
    /// A region of `capacity` bytes with nothing allocated.
    #[must_use]
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            bytes: vec![0; capacity as usize],
            refs: HashMap::new(),
            used: 0,
        }
    }

    /// A region of `size` bytes, all allocated and zeroed.
    #[must_use]
    pub fn zeroed(size: u32) -> Self {
        Self {
            bytes: vec![0; size as usize],
            refs: HashMap::new(),
            used: size,
        }
    }

    /// Bytes handed out so far.
    #[must_use]
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Frees everything.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        self.refs.clear();
        self.used = 0;
    }

    /// Allocates `n` zeroed bytes at 8-byte alignment, returning the offset.
    pub fn alloca(&mut self, n: u32) -> Result<u32, RtTrap> {
        let start = self.used.next_multiple_of(WORD);
        let end = start
            .checked_add(n)
            .filter(|&end| end as usize <= self.bytes.len())
            .ok_or_else(|| invalid("stack overflow in alloca"))?;
        self.used = end;
        Ok(start)
    }

    fn check(&self, offset: u32, size: u32) -> Result<core::ops::Range<usize>, RtTrap> {
        if size > 1 && offset % size != 0 {
            return Err(invalid("misaligned memory access"));
        }
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= self.used)
            .ok_or_else(|| invalid("memory access out of bounds"))?;
        Ok(offset as usize..end as usize)
    }

    /// Reads a value of type `ty` at `offset`.
    pub fn load(&self, offset: u32, ty: Type) -> Result<Slot, RtTrap> {
        let size = ty.size_in_bytes();
        let range = self.check(offset, size)?;
        if matches!(ty, Type::Ptr | Type::Str) {
            let slot = self.refs.get(&offset).copied();
            return Ok(match (ty, slot) {
                (_, Some(s)) => s,
                (Type::Str, None) => Slot::Str(None),
                _ => Slot::Ptr(crate::slot::Ptr::Null),
            });
        }
        let mut buf = [0_u8; 8];
        buf[..range.len()].copy_from_slice(&self.bytes[range]);
        let raw = u64::from_le_bytes(buf);
        Ok(match ty {
            Type::F64 => Slot::F64(f64::from_bits(raw)),
            _ => Slot::I64(ty.wrap_int(raw.cast_signed())),
        })
    }

    /// Writes `value` as type `ty` at `offset`.
    pub fn store(&mut self, offset: u32, ty: Type, value: Slot) -> Result<(), RtTrap> {
        let size = ty.size_in_bytes();
        let range = self.check(offset, size)?;
        let word = offset - offset % WORD;
        self.refs.remove(&word);
        if matches!(ty, Type::Ptr | Type::Str) {
            self.bytes[range].fill(0);
            self.refs.insert(offset, value);
            return Ok(());
        }
        let raw = match ty {
            Type::F64 => value.float()?.to_bits(),
            _ => value.int()?.cast_unsigned(),
        };
        let len = range.len();
        self.bytes[range].copy_from_slice(&raw.to_le_bytes()[..len]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Ptr;

    #[test]
    fn scalars_round_trip_with_width() {
        let mut r = Region::with_capacity(64);
        let a = r.alloca(8).unwrap();
        let b = r.alloca(2).unwrap();
        assert_eq!((a, b), (0, 8));
        r.store(a, Type::I64, Slot::I64(-2)).unwrap();
        assert_eq!(r.load(a, Type::I64).unwrap(), Slot::I64(-2));
        r.store(b, Type::I16, Slot::I64(0x1_8000)).unwrap();
        assert_eq!(r.load(b, Type::I16).unwrap(), Slot::I64(-32768));
        r.store(a, Type::F64, Slot::F64(0.25)).unwrap();
        assert_eq!(r.load(a, Type::F64).unwrap(), Slot::F64(0.25));
    }

    #[test]
    fn pointers_live_in_the_side_table() {
        let mut r = Region::zeroed(16);
        let p = Slot::Ptr(Ptr::Global { offset: 8 });
        r.store(0, Type::Ptr, p).unwrap();
        assert_eq!(r.load(0, Type::Ptr).unwrap(), p);
        r.store(0, Type::I32, Slot::I64(1)).unwrap();
        assert_eq!(r.load(0, Type::Ptr).unwrap(), Slot::Ptr(Ptr::Null), "clobbered");
        assert_eq!(r.load(8, Type::Str).unwrap(), Slot::Str(None));
    }

    #[test]
    fn bad_accesses_trap() {
        let mut r = Region::with_capacity(16);
        r.alloca(8).unwrap();
        assert_eq!(r.load(4, Type::I64).unwrap_err().kind, TrapKind::InvalidOperation);
        assert!(r.load(8, Type::I64).is_err(), "past the allocated area");
        assert!(r.alloca(16).is_err());
        r.reset();
        assert_eq!(r.used(), 0);
    }
}
