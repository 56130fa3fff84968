// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interpreter: execution state, the fetch loop, and trap reporting.

use std::fmt;

use viper_il::Type;
use viper_rt::{ObjRef, RtContext, RtTrap, TrapKind};

use crate::config::{DispatchKind, VmConfig};
use crate::dispatch::{Dispatch, Flow, SwitchDispatch, ThreadedDispatch, check_operands};
use crate::frame::Frame;
use crate::memory::Region;
use crate::program::{FuncId, LoadedFunction, LoadedInstr, Operand, Program, Target};
use crate::slot::{Ptr, Slot};
use crate::trace::{InstrSite, ScopeKind, TraceMask, TraceSink};

/// A trap with the location it was raised at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrapInfo {
    /// Function name.
    pub function: Box<str>,
    /// Block label.
    pub block: Box<str>,
    /// Instruction index within the block.
    pub ip: u32,
    /// Source line, or `-1` when unknown.
    pub line: i64,
    /// Category.
    pub kind: TrapKind,
    /// Secondary code.
    pub code: i32,
    /// Detail.
    pub message: Option<Box<str>>,
}

impl fmt::Display for TrapInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trap @{}:{}#{} line {}: {}",
            self.function, self.block, self.ip, self.line, self.kind
        )?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        write!(f, " (code={})", self.code)
    }
}

impl core::error::Error for TrapInfo {}

/// An interpreter instance. Owns the runtime context, so heap objects and output persist across
/// runs until taken.
#[derive(Debug, Default)]
pub struct Vm {
    config: VmConfig,
    cx: RtContext,
}

impl Vm {
    /// A VM with a fresh runtime context.
    #[must_use]
    pub fn new(config: VmConfig) -> Self {
        Self {
            config,
            cx: RtContext::new(),
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The runtime context.
    #[must_use]
    pub fn context(&self) -> &RtContext {
        &self.cx
    }

    /// The runtime context, mutably. Useful for building string arguments.
    pub fn context_mut(&mut self) -> &mut RtContext {
        &mut self.cx
    }

    /// Takes the buffered program output.
    pub fn take_output(&mut self) -> String {
        self.cx.take_output()
    }

    /// Runs `entry` with `args`.
    pub fn run(
        &mut self,
        program: &Program,
        entry: &str,
        args: &[Slot],
    ) -> Result<Option<Slot>, TrapInfo> {
        self.run_traced(program, entry, args, None)
    }

    /// Runs `entry` with `args`, reporting events to `sink`.
    pub fn run_traced(
        &mut self,
        program: &Program,
        entry: &str,
        args: &[Slot],
        sink: Option<&mut dyn TraceSink>,
    ) -> Result<Option<Slot>, TrapInfo> {
        let Some(id) = program.function_id(entry) else {
            return Err(TrapInfo {
                function: entry.into(),
                block: "".into(),
                ip: 0,
                line: -1,
                kind: TrapKind::InvalidOperation,
                code: 0,
                message: Some(format!("no function named @{entry}").into()),
            });
        };
        tracing::debug!(entry, dispatch = ?self.config.dispatch, "run start");

        let mut ex = match Exec::new(program, &mut self.cx, &self.config, sink, id, args) {
            Ok(ex) => ex,
            Err(trap) => return Err(site(program, id, 0, 0, trap)),
        };
        let result = match self.config.dispatch {
            DispatchKind::Switch => ex.run::<SwitchDispatch>(),
            DispatchKind::Threaded => ex.run::<ThreadedDispatch>(),
        };
        let result = result.map_err(|trap| ex.fault(trap));
        let steps = ex.steps;
        ex.teardown();

        match &result {
            Ok(_) => tracing::debug!(entry, steps, "run finished"),
            Err(info) => tracing::debug!(entry, steps, kind = %info.kind, "run trapped"),
        }
        result
    }
}

fn site(program: &Program, func: FuncId, block: u32, ip: u32, trap: RtTrap) -> TrapInfo {
    let f = program.function(func);
    let b = f.and_then(|f| f.blocks.get(block as usize));
    let line = b
        .and_then(|b| b.instrs.get(ip as usize))
        .map_or(-1, |i| i.line);
    TrapInfo {
        function: f.map_or_else(|| "?".into(), |f| f.name.clone()),
        block: b.map_or_else(|| "?".into(), |b| b.label.clone()),
        ip,
        line,
        kind: trap.kind,
        code: trap.code,
        message: trap.message,
    }
}

pub(crate) fn malformed(msg: &str) -> RtTrap {
    RtTrap::with_message(TrapKind::MalformedIr, msg)
}

pub(crate) fn invalid(msg: &str) -> RtTrap {
    RtTrap::with_message(TrapKind::InvalidOperation, msg)
}

/// State of one run.
pub(crate) struct Exec<'a, 's> {
    pub(crate) program: &'a Program,
    pub(crate) cx: &'a mut RtContext,
    pub(crate) config: &'a VmConfig,
    /// The executing frame.
    pub(crate) current: Frame,
    /// Suspended frames, outermost first.
    pub(crate) callers: Vec<Frame>,
    pub(crate) globals: Region,
    /// Id of the most recent activation.
    activations: u32,
    literals: Vec<ObjRef>,
    scratch: Vec<Slot>,
    steps: u64,
    sink: Option<&'s mut dyn TraceSink>,
    mask: TraceMask,
}

impl<'a, 's> Exec<'a, 's> {
    fn new(
        program: &'a Program,
        cx: &'a mut RtContext,
        config: &'a VmConfig,
        sink: Option<&'s mut dyn TraceSink>,
        entry: FuncId,
        args: &[Slot],
    ) -> Result<Self, RtTrap> {
        let literals = program
            .literals()
            .iter()
            .map(|s| cx.heap.intern(s.as_bytes()))
            .collect::<Vec<_>>();
        let mut globals = Region::zeroed(program.global_bytes());
        for g in program.globals() {
            if let Some(lit) = g.init.and_then(|i| literals.get(i as usize)) {
                globals.store(g.offset, Type::Str, Slot::Str(Some(*lit)))?;
            }
        }
        let f = program
            .function(entry)
            .ok_or_else(|| malformed("entry function missing"))?;
        let current = Frame::enter(&mut cx.heap, entry, 0, f, args, None)?;
        let mask = sink.as_ref().map_or(TraceMask::NONE, |s| s.mask());
        let mut ex = Self {
            program,
            cx,
            config,
            current,
            callers: Vec::new(),
            globals,
            activations: 0,
            literals,
            scratch: Vec::new(),
            steps: 0,
            sink,
            mask,
        };
        ex.trace_enter(ScopeKind::CallFrame { func: entry }, 0);
        Ok(ex)
    }

    fn run<D: Dispatch>(&mut self) -> Result<Option<Slot>, RtTrap> {
        loop {
            let ins = self.fetch()?;
            self.steps += 1;
            if let Some(max) = self.config.max_steps
                && self.steps > max
            {
                return Err(invalid("step budget exhausted"));
            }
            if self.mask.contains(TraceMask::INSTR) {
                self.trace_instr(ins);
            }
            if self.config.verify_operands {
                check_operands(self, ins)?;
            }
            match D::execute(self, ins)? {
                Flow::Next => self.current.ip += 1,
                Flow::Jumped => {}
                Flow::Halt(value) => return Ok(value),
            }
        }
    }

    fn fetch(&self) -> Result<&'a LoadedInstr, RtTrap> {
        let f = self.func(self.current.func)?;
        let block = f
            .blocks
            .get(self.current.block as usize)
            .ok_or_else(|| malformed("branch to a missing block"))?;
        block.instrs.get(self.current.ip as usize).ok_or_else(|| {
            RtTrap::with_message(
                TrapKind::MalformedIr,
                format!("fell off the end of block {}", block.label),
            )
        })
    }

    /// The function with id `id`.
    pub(crate) fn func(&self, id: FuncId) -> Result<&'a LoadedFunction, RtTrap> {
        let program: &'a Program = self.program;
        program
            .function(id)
            .ok_or_else(|| malformed("call to a missing function"))
    }

    /// Call depth of the executing frame (0 for the entry frame).
    pub(crate) fn depth(&self) -> usize {
        self.callers.len()
    }

    /// Evaluates an operand in the current frame.
    pub(crate) fn eval(&self, op: &Operand) -> Result<Slot, RtTrap> {
        Ok(match *op {
            Operand::Temp(t) => *self
                .current
                .regs
                .get(t as usize)
                .ok_or_else(|| malformed("register out of range"))?,
            Operand::Int(v) => Slot::I64(v),
            Operand::Float(v) => Slot::F64(v),
            Operand::Str(lit) => Slot::Str(Some(
                *self
                    .literals
                    .get(lit as usize)
                    .ok_or_else(|| malformed("string literal out of range"))?,
            )),
            Operand::Null => Slot::Ptr(Ptr::Null),
            Operand::Global(offset) => Slot::Ptr(Ptr::Global { offset }),
        })
    }

    /// Evaluates operand `i` of `ins`.
    pub(crate) fn operand(&self, ins: &LoadedInstr, i: usize) -> Result<Slot, RtTrap> {
        let op = ins.operands.get(i).ok_or_else(|| {
            RtTrap::with_message(
                TrapKind::MalformedIr,
                format!("'{}' is missing operand {i}", ins.op.mnemonic()),
            )
        })?;
        self.eval(op)
    }

    /// Writes `value` to the result register of `ins`, if it has one.
    pub(crate) fn set(&mut self, ins: &LoadedInstr, value: Slot) {
        if let Some(r) = ins.result {
            self.set_reg(r, value);
        }
    }

    pub(crate) fn set_reg(&mut self, reg: u32, value: Slot) {
        if let Some(slot) = self.current.regs.get_mut(reg as usize) {
            *slot = value;
        }
    }

    /// Borrows the scratch argument buffer, emptied.
    pub(crate) fn take_scratch(&mut self) -> Vec<Slot> {
        let mut v = core::mem::take(&mut self.scratch);
        v.clear();
        v
    }

    /// Returns the scratch buffer for reuse.
    pub(crate) fn put_scratch(&mut self, v: Vec<Slot>) {
        self.scratch = v;
    }

    /// Branches to `target`, binding its arguments.
    pub(crate) fn jump(&mut self, target: &Target) -> Result<Flow, RtTrap> {
        let mut args = self.take_scratch();
        for a in &target.args {
            args.push(self.eval(a)?);
        }
        let r = self.enter_block(target.block, &args);
        self.put_scratch(args);
        r.map(|()| Flow::Jumped)
    }

    /// Moves the current frame to the start of `block` with `args` bound to its parameters.
    pub(crate) fn enter_block(&mut self, block: u32, args: &[Slot]) -> Result<(), RtTrap> {
        let f = self.func(self.current.func)?;
        let b = f
            .blocks
            .get(block as usize)
            .ok_or_else(|| malformed("branch to a missing block"))?;
        if b.params.len() != args.len() {
            return Err(RtTrap::with_message(
                TrapKind::MalformedIr,
                format!(
                    "block {} expects {} argument(s), got {}",
                    b.label,
                    b.params.len(),
                    args.len()
                ),
            ));
        }
        for (&reg, &arg) in b.params.iter().zip(args) {
            self.set_reg(reg, arg);
        }
        self.current.block = block;
        self.current.ip = 0;
        Ok(())
    }

    fn region_mut(&mut self, p: Ptr) -> Result<(&mut Region, u32), RtTrap> {
        match p {
            Ptr::Null => Err(invalid("null pointer dereference")),
            Ptr::Obj(_) => Err(invalid("object handle used as a memory address")),
            Ptr::Global { offset } => Ok((&mut self.globals, offset)),
            Ptr::Stack {
                frame,
                activation,
                offset,
            } => {
                let depth = frame as usize;
                let f = if depth == self.callers.len() {
                    Some(&mut self.current)
                } else {
                    self.callers.get_mut(depth)
                };
                let region = f
                    .filter(|f| f.activation == activation)
                    .and_then(|f| f.stack.as_mut())
                    .ok_or_else(|| invalid("dangling stack pointer"))?;
                Ok((region, offset))
            }
        }
    }

    /// Reads `ty` through `p`.
    pub(crate) fn load(&mut self, p: Ptr, ty: Type) -> Result<Slot, RtTrap> {
        let (region, offset) = self.region_mut(p)?;
        region.load(offset, ty)
    }

    /// Writes `value` as `ty` through `p`.
    pub(crate) fn store(&mut self, p: Ptr, ty: Type, value: Slot) -> Result<(), RtTrap> {
        let (region, offset) = self.region_mut(p)?;
        region.store(offset, ty, value)
    }

    /// Allocates `n` bytes in the current frame.
    pub(crate) fn alloca(&mut self, n: u32) -> Result<Ptr, RtTrap> {
        let frame = u32::try_from(self.depth()).map_err(|_| invalid("call depth exceeded"))?;
        let capacity = self.config.limits.frame_stack_bytes;
        let offset = self
            .current
            .stack
            .get_or_insert_with(|| Region::with_capacity(capacity))
            .alloca(n)?;
        Ok(Ptr::Stack {
            frame,
            activation: self.current.activation,
            offset,
        })
    }

    fn next_activation(&mut self) -> Result<u32, RtTrap> {
        self.activations = self
            .activations
            .checked_add(1)
            .ok_or_else(|| invalid("activation ids exhausted"))?;
        Ok(self.activations)
    }

    /// Pushes a frame for `id` as a call from the current instruction.
    pub(crate) fn push_frame(
        &mut self,
        id: FuncId,
        args: &[Slot],
        ret_dest: Option<u32>,
    ) -> Result<(), RtTrap> {
        if self.callers.len() + 1 >= self.config.limits.max_call_depth {
            return Err(invalid("call depth exceeded"));
        }
        let f = self.func(id)?;
        let activation = self.next_activation()?;
        let frame = Frame::enter(&mut self.cx.heap, id, activation, f, args, ret_dest)?;
        let ip = self.current.ip;
        let caller = core::mem::replace(&mut self.current, frame);
        self.callers.push(caller);
        self.trace_enter(ScopeKind::CallFrame { func: id }, ip);
        Ok(())
    }

    /// Reuses the current frame for a tail call to `id`.
    pub(crate) fn reenter_frame(&mut self, id: FuncId, args: &[Slot]) -> Result<(), RtTrap> {
        let f = self.func(id)?;
        let old = self.current.func;
        let ip = self.current.ip;
        let activation = self.next_activation()?;
        self.current.reenter(&mut self.cx.heap, id, activation, f, args)?;
        self.trace_exit(ScopeKind::CallFrame { func: old });
        self.trace_enter(ScopeKind::CallFrame { func: id }, ip);
        Ok(())
    }

    /// Pops the current frame, resuming its caller. Returns the popped frame's result register,
    /// or `None` when the entry frame is current.
    pub(crate) fn pop_frame(&mut self) -> Result<Option<Option<u32>>, RtTrap> {
        let Some(caller) = self.callers.pop() else {
            return Ok(None);
        };
        let done = core::mem::replace(&mut self.current, caller);
        self.trace_exit_at(ScopeKind::CallFrame { func: done.func }, self.callers.len() + 1);
        let dest = done.ret_dest;
        done.leave(&mut self.cx.heap)?;
        Ok(Some(dest))
    }

    pub(crate) fn trace_enter(&mut self, kind: ScopeKind, ip: u32) {
        if !self.mask.contains(scope_mask(kind)) {
            return;
        }
        let depth = self.depth();
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.scope_enter(self.program, kind, depth, ip);
        }
    }

    pub(crate) fn trace_exit(&mut self, kind: ScopeKind) {
        self.trace_exit_at(kind, self.depth());
    }

    fn trace_exit_at(&mut self, kind: ScopeKind, depth: usize) {
        if !self.mask.contains(scope_mask(kind)) {
            return;
        }
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.scope_exit(self.program, kind, depth);
        }
    }

    fn trace_instr(&mut self, ins: &LoadedInstr) {
        let site = InstrSite {
            func: self.current.func,
            block: self.current.block,
            ip: self.current.ip,
            op: ins.op,
        };
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.instr(self.program, site);
        }
    }

    /// Renders a trap raised at the current position.
    fn fault(&self, trap: RtTrap) -> TrapInfo {
        site(
            self.program,
            self.current.func,
            self.current.block,
            self.current.ip,
            trap,
        )
    }

    /// Unwinds every frame, releasing owned references.
    fn teardown(mut self) {
        loop {
            let func = self.current.func;
            self.trace_exit(ScopeKind::CallFrame { func });
            let next = self.callers.pop();
            let done = match next {
                Some(caller) => core::mem::replace(&mut self.current, caller),
                None => {
                    let last = core::mem::take(&mut self.current.owned);
                    for s in last {
                        if let Err(e) = self.cx.heap.release(s) {
                            tracing::warn!(error = %e, "release failed during teardown");
                        }
                    }
                    return;
                }
            };
            if let Err(e) = done.leave(&mut self.cx.heap) {
                tracing::warn!(error = %e, "release failed during teardown");
            }
        }
    }
}

fn scope_mask(kind: ScopeKind) -> TraceMask {
    match kind {
        ScopeKind::CallFrame { .. } => TraceMask::CALL,
        ScopeKind::RuntimeCall { .. } => TraceMask::RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeRegistry;

    fn load(src: &str) -> Program {
        let m = viper_il::text::parse_module(src).unwrap();
        match Program::load(&m, &RuntimeRegistry::with_defaults()) {
            Ok(p) => p,
            Err(e) => panic!("load failed: {e}"),
        }
    }

    fn run(src: &str, config: VmConfig) -> Result<Option<Slot>, TrapInfo> {
        Vm::new(config).run(&load(src), "main", &[])
    }

    const MEMORY: &str = "il 0.1.2
global i64 @counter
func @main() -> i64 {
entry:
  %p = alloca 16
  %q = gep %p, 8
  store.i64 %q, -5
  %v = load.i64 %q
  %g = addr_of @counter
  store.i64 %g, 7
  %w = load.i64 %g
  %r = add.i64 %v, %w
  ret %r
}
";

    #[test]
    fn stack_and_global_memory() {
        assert_eq!(run(MEMORY, VmConfig::new()), Ok(Some(Slot::I64(2))));
    }

    const THROWING: &str = "il 0.1.2
extern @rt_exc_create(str) -> ptr
extern @rt_exc_message(ptr) -> str
extern @rt_str_len(str) -> i64
func @fail() -> i64 {
entry:
  %m = const_str \"boom!\"
  %e = call @rt_exc_create(%m)
  throw %e
}
func @main() -> i64 {
entry:
  eh.push handler
  %x = call @fail()
  eh.pop
  ret %x
handler(%e: ptr):
  %m = call @rt_exc_message(%e)
  %n = call @rt_str_len(%m)
  ret %n
}
";

    #[test]
    fn throw_unwinds_to_the_nearest_handler() {
        assert_eq!(run(THROWING, VmConfig::new()), Ok(Some(Slot::I64(5))));
    }

    #[test]
    fn unhandled_throw_traps_with_the_message() {
        let p = load(THROWING);
        let err = Vm::new(VmConfig::new()).run(&p, "fail", &[]).unwrap_err();
        assert_eq!(err.kind, TrapKind::InvalidOperation);
        assert_eq!(err.message.as_deref(), Some("unhandled exception: boom!"));
        assert_eq!((&*err.function, &*err.block, err.ip), ("fail", "entry", 2));
    }

    const SPIN: &str = "il 0.1.2
func @main() -> i64 {
entry:
  br loop(0)
loop(%i: i64):
  %j = add.i64 %i, 1
  br loop(%j)
}
";

    #[test]
    fn step_budget_stops_runaway_loops() {
        let err = run(SPIN, VmConfig::new().with_max_steps(100)).unwrap_err();
        assert_eq!(err.kind, TrapKind::InvalidOperation);
        assert_eq!(err.message.as_deref(), Some("step budget exhausted"));
    }

    const DEEP: &str = "il 0.1.2
func @down(i64 %n) -> i64 {
entry:
  %m = add.i64 %n, 1
  %r = call @down(%m)
  %s = add.i64 %r, 1
  ret %s
}
func @main() -> i64 {
entry:
  %r = call @down(0)
  ret %r
}
";

    #[test]
    fn call_depth_is_bounded() {
        let mut config = VmConfig::new();
        config.limits.max_call_depth = 64;
        let err = run(DEEP, config).unwrap_err();
        assert_eq!(err.message.as_deref(), Some("call depth exceeded"));
        assert_eq!(&*err.function, "down");
    }

    #[test]
    fn dispatch_strategies_agree() {
        for src in [MEMORY, THROWING] {
            let switch = run(src, VmConfig::new().with_dispatch(DispatchKind::Switch));
            let threaded = run(src, VmConfig::new().with_dispatch(DispatchKind::Threaded));
            assert_eq!(switch, threaded);
        }
    }

    #[test]
    fn operand_verification_accepts_well_typed_code() {
        let mut config = VmConfig::new();
        config.verify_operands = true;
        assert_eq!(run(MEMORY, config), Ok(Some(Slot::I64(2))));
    }

    #[test]
    fn unknown_entry_is_reported() {
        let p = load(MEMORY);
        let err = Vm::new(VmConfig::new()).run(&p, "nope", &[]).unwrap_err();
        assert_eq!(err.message.as_deref(), Some("no function named @nope"));
    }

    const ESCAPED_LOCAL: &str = "il 0.1.2
func @leak() -> ptr {
entry:
  %p = alloca 8
  store.i64 %p, 5
  ret %p
}
func @peek(ptr %q) -> i64 {
entry:
  %own = alloca 8
  store.i64 %own, 99
  %v = load.i64 %q
  ret %v
}
func @main() -> i64 {
entry:
  %q = call @leak()
  %v = call @peek(%q)
  ret %v
}
";

    #[test]
    fn pointer_into_a_returned_frame_is_dangling() {
        let err = run(ESCAPED_LOCAL, VmConfig::new()).unwrap_err();
        assert_eq!(err.kind, TrapKind::InvalidOperation);
        assert_eq!(err.message.as_deref(), Some("dangling stack pointer"));
        assert_eq!((&*err.function, err.ip), ("peek", 2));
    }

    const REUSED_FRAME: &str = "il 0.1.2
global ptr @saved
func @first() -> i64 {
entry:
  %p = alloca 8
  store.i64 %p, 5
  %g = addr_of @saved
  store.ptr %g, %p
  %r = call @second()
  ret %r
}
func @second() -> i64 {
entry:
  %own = alloca 8
  store.i64 %own, 99
  %g = addr_of @saved
  %s = load.ptr %g
  %v = load.i64 %s
  ret %v
}
func @main() -> i64 {
entry:
  %r = call @first()
  ret %r
}
";

    #[test]
    fn tail_call_retires_the_previous_activation() {
        let err = run(REUSED_FRAME, VmConfig::new()).unwrap_err();
        assert_eq!(err.message.as_deref(), Some("dangling stack pointer"));
        assert_eq!((&*err.function, err.ip), ("second", 4));

        let mut config = VmConfig::new();
        config.tail_calls = false;
        assert_eq!(run(REUSED_FRAME, config), Ok(Some(Slot::I64(5))));
    }

    #[test]
    fn trap_lines_render_kind_message_and_code() {
        let info = TrapInfo {
            function: "main".into(),
            block: "entry".into(),
            ip: 0,
            line: 1,
            kind: TrapKind::Overflow,
            code: 0,
            message: None,
        };
        assert_eq!(info.to_string(), "Trap @main:entry#0 line 1: Overflow (code=0)");
        let info = TrapInfo {
            kind: TrapKind::DomainError,
            ip: 2,
            message: Some("overflow in exponentiation".into()),
            ..info
        };
        assert_eq!(
            info.to_string(),
            "Trap @main:entry#2 line 1: DomainError: overflow in exponentiation (code=0)"
        );
    }
}
