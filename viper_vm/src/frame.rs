// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Activation records.

use viper_rt::{Heap, HeapError, ObjRef, RtTrap, TrapKind};

use crate::memory::Region;
use crate::program::{FuncId, LoadedFunction};
use crate::slot::Slot;

/// One function activation.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) func: FuncId,
    /// Unique per activation; a tail call gets a fresh one.
    pub(crate) activation: u32,
    pub(crate) block: u32,
    pub(crate) ip: u32,
    pub(crate) regs: Vec<Slot>,
    /// Allocated on the first `alloca`.
    pub(crate) stack: Option<Region>,
    /// Handler blocks pushed by `eh.push`, innermost last.
    pub(crate) handlers: Vec<u32>,
    /// Caller register receiving the return value.
    pub(crate) ret_dest: Option<u32>,
    /// String parameters retained on entry; released when the frame goes away.
    pub(crate) owned: Vec<ObjRef>,
}

impl Frame {
    /// A frame for `f` with `args` bound to its parameters. String arguments are retained.
    pub(crate) fn enter(
        heap: &mut Heap,
        id: FuncId,
        activation: u32,
        f: &LoadedFunction,
        args: &[Slot],
        ret_dest: Option<u32>,
    ) -> Result<Self, RtTrap> {
        let mut frame = Self {
            func: id,
            activation,
            block: 0,
            ip: 0,
            regs: vec![Slot::None; f.temp_count],
            stack: None,
            handlers: Vec::new(),
            ret_dest,
            owned: Vec::new(),
        };
        frame.bind(heap, f, args)?;
        Ok(frame)
    }

    fn bind(&mut self, heap: &mut Heap, f: &LoadedFunction, args: &[Slot]) -> Result<(), RtTrap> {
        if args.len() != f.params.len() {
            return Err(RtTrap::with_message(
                TrapKind::MalformedIr,
                format!(
                    "@{} expects {} argument(s), got {}",
                    f.name,
                    f.params.len(),
                    args.len()
                ),
            ));
        }
        for (&(reg, _), arg) in f.params.iter().zip(args) {
            let slot = self.regs.get_mut(reg as usize).ok_or_else(|| {
                RtTrap::with_message(TrapKind::MalformedIr, "parameter register out of range")
            })?;
            *slot = *arg;
            if let Slot::Str(Some(s)) = arg {
                heap.retain(*s)?;
                self.owned.push(*s);
            }
        }
        Ok(())
    }

    /// Reuses this frame for a tail call to `f` as activation `activation`. New string
    /// arguments are retained before the old parameter bindings are released, so a string
    /// passed through stays alive.
    pub(crate) fn reenter(
        &mut self,
        heap: &mut Heap,
        id: FuncId,
        activation: u32,
        f: &LoadedFunction,
        args: &[Slot],
    ) -> Result<(), RtTrap> {
        let old = core::mem::take(&mut self.owned);
        self.func = id;
        self.activation = activation;
        self.block = 0;
        self.ip = 0;
        self.regs.clear();
        self.regs.resize(f.temp_count, Slot::None);
        self.stack = None;
        self.handlers.clear();
        let bound = self.bind(heap, f, args);
        release_all(heap, old)?;
        bound
    }

    /// Releases the frame's owned references.
    pub(crate) fn leave(self, heap: &mut Heap) -> Result<(), HeapError> {
        release_all(heap, self.owned)
    }
}

fn release_all(heap: &mut Heap, refs: Vec<ObjRef>) -> Result<(), HeapError> {
    let mut first = Ok(());
    for s in refs {
        if let Err(e) = heap.release(s) {
            first = first.and(Err(e));
        }
    }
    first
}
