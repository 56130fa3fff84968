// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cursor-style IL construction API used by frontend lowerers and tests.
//!
//! A [`FunctionBuilder`] always has a valid insertion block: it creates the `entry` block when the
//! function is started, and [`FunctionBuilder::switch_to`] only accepts block ids it handed out.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::instr::{Instr, SourceLoc};
use crate::module::{BasicBlock, Extern, Function, Global, Module, Param};
use crate::opcode::Opcode;
use crate::support::NameMangler;
use crate::types::Type;
use crate::value::{LiteralId, Value};

/// Handle to a block created by a [`FunctionBuilder`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockId(pub usize);

/// Module-level builder.
#[derive(Debug)]
pub struct IrBuilder<'m> {
    module: &'m mut Module,
}

impl<'m> IrBuilder<'m> {
    /// Wraps `module`.
    pub fn new(module: &'m mut Module) -> Self {
        Self { module }
    }

    /// Declares an extern function.
    pub fn add_extern(&mut self, name: &str, params: &[Type], ret_ty: Type) {
        self.module.externs.push(Extern {
            name: name.into(),
            params: params.to_vec(),
            ret_ty,
        });
    }

    /// Declares a global string initialized with `content`.
    pub fn add_global_str(&mut self, name: &str, content: &str) -> LiteralId {
        let id = self.module.intern(content);
        self.module.globals.push(Global {
            name: name.into(),
            ty: Type::Str,
            is_const: true,
            init: Some(id),
        });
        id
    }

    /// Declares a zero-initialized mutable global.
    pub fn add_global(&mut self, name: &str, ty: Type) {
        self.module.globals.push(Global {
            name: name.into(),
            ty,
            is_const: false,
            init: None,
        });
    }

    /// Interns a string literal.
    pub fn intern_str(&mut self, s: &str) -> LiteralId {
        self.module.intern(s)
    }

    /// Starts a new function with an `entry` block holding the parameters.
    pub fn start_function(
        &mut self,
        name: &str,
        ret_ty: Type,
        params: &[(&str, Type)],
    ) -> FunctionBuilder<'_> {
        let mut f = Function::new(name, ret_ty);
        for (pname, ty) in params {
            let id = f.fresh_temp(Some(pname));
            f.params.push(Param { id, ty: *ty });
        }
        let mut entry = BasicBlock::new("entry");
        entry.params = f.params.clone();
        f.blocks.push(entry);
        self.module.functions.push(f);
        let func = self.module.functions.len() - 1;
        let mut names = NameMangler::new();
        names.block("entry");
        FunctionBuilder {
            module: self.module,
            func,
            current: 0,
            loc: SourceLoc::default(),
            names,
        }
    }
}

/// Builder positioned inside one function.
#[derive(Debug)]
pub struct FunctionBuilder<'a> {
    module: &'a mut Module,
    func: usize,
    current: usize,
    loc: SourceLoc,
    names: NameMangler,
}

impl FunctionBuilder<'_> {
    fn function(&mut self) -> &mut Function {
        &mut self.module.functions[self.func]
    }

    /// Value of the `i`-th function parameter.
    #[must_use]
    pub fn param(&self, i: usize) -> Option<Value> {
        self.module.functions[self.func]
            .params
            .get(i)
            .map(|p| Value::Temp(p.id))
    }

    /// The entry block.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    /// Creates a block labeled after `hint` (suffixed on collision).
    pub fn new_block(&mut self, hint: &str) -> BlockId {
        self.new_block_with_params(hint, &[]).0
    }

    /// Creates a block with typed parameters; returns the block and the parameter values.
    pub fn new_block_with_params(&mut self, hint: &str, params: &[Type]) -> (BlockId, Vec<Value>) {
        let label = self.names.block(hint);
        let f = self.function();
        let mut block = BasicBlock::new(label);
        let mut values = Vec::with_capacity(params.len());
        for ty in params {
            let id = f.fresh_temp(None);
            block.params.push(Param { id, ty: *ty });
            values.push(Value::Temp(id));
        }
        f.blocks.push(block);
        (BlockId(f.blocks.len() - 1), values)
    }

    /// Label of `block`.
    #[must_use]
    pub fn label(&self, block: BlockId) -> Box<str> {
        self.module.functions[self.func].blocks[block.0].label.clone()
    }

    /// Moves the insertion point to the end of `block`.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block.0;
    }

    /// Sets the source location attached to subsequently emitted instructions.
    pub fn set_loc(&mut self, loc: SourceLoc) {
        self.loc = loc;
    }

    /// Appends `instr` (stamped with the current location) to the current block.
    pub fn push(&mut self, mut instr: Instr) {
        instr.loc = self.loc;
        let current = self.current;
        let block = &mut self.function().blocks[current];
        if instr.is_terminator() {
            block.terminated = true;
        }
        block.instrs.push(instr);
    }

    /// Emits a value-producing instruction and returns its result.
    pub fn emit(&mut self, op: Opcode, ty: Type, operands: Vec<Value>) -> Value {
        let id = self.function().fresh_temp(None);
        self.push(Instr::new(op, ty, Some(id), operands));
        Value::Temp(id)
    }

    /// Emits a two-operand instruction.
    pub fn binary(&mut self, op: Opcode, ty: Type, a: Value, b: Value) -> Value {
        self.emit(op, ty, alloc::vec![a, b])
    }

    /// Emits `iconst.ty v`.
    pub fn iconst(&mut self, ty: Type, v: i64) -> Value {
        self.emit(Opcode::IConst, ty, alloc::vec![Value::ConstInt(v)])
    }

    /// Emits `const_str "s"`.
    pub fn const_str(&mut self, s: &str) -> Value {
        let id = self.module.intern(s);
        self.emit(Opcode::ConstStr, Type::Str, alloc::vec![Value::ConstStr(id)])
    }

    /// Emits `alloca bytes`.
    pub fn alloca(&mut self, bytes: i64) -> Value {
        self.emit(Opcode::Alloca, Type::Ptr, alloc::vec![Value::ConstInt(bytes)])
    }

    /// Emits `load.ty ptr`.
    pub fn load(&mut self, ty: Type, ptr: Value) -> Value {
        self.emit(Opcode::Load, ty, alloc::vec![ptr])
    }

    /// Emits `store.ty ptr, value`.
    pub fn store(&mut self, ty: Type, ptr: Value, value: Value) {
        self.push(Instr::new(Opcode::Store, ty, None, alloc::vec![ptr, value]));
    }

    /// Emits `call @callee(args)`; returns the result for non-void calls.
    pub fn call(&mut self, callee: &str, ret_ty: Type, args: Vec<Value>) -> Option<Value> {
        let result = (ret_ty != Type::Void).then(|| self.function().fresh_temp(None));
        let mut instr = Instr::new(Opcode::Call, ret_ty, result, args);
        instr.callee = Some(callee.into());
        self.push(instr);
        result.map(Value::Temp)
    }

    /// Emits `br target(args)`.
    pub fn br(&mut self, target: BlockId, args: Vec<Value>) {
        let label = self.label(target);
        self.push(Instr::br(label, args));
    }

    /// Emits `cbr cond, t(targs), f(fargs)`.
    pub fn cbr(
        &mut self,
        cond: Value,
        t: BlockId,
        targs: Vec<Value>,
        f: BlockId,
        fargs: Vec<Value>,
    ) {
        let mut instr = Instr::new(Opcode::CBr, Type::Void, None, alloc::vec![cond]);
        instr.labels = alloc::vec![self.label(t), self.label(f)];
        instr.br_args = alloc::vec![targs, fargs];
        self.push(instr);
    }

    /// Emits `switch.i32 v, default, (case -> target)*` with no branch arguments.
    pub fn switch_i32(&mut self, v: Value, default: BlockId, cases: &[(i64, BlockId)]) {
        let mut instr = Instr::new(Opcode::SwitchI32, Type::Void, None, alloc::vec![v]);
        instr.labels.push(self.label(default));
        instr.br_args.push(Vec::new());
        for (k, target) in cases {
            instr.operands.push(Value::ConstInt(*k));
            instr.labels.push(self.label(*target));
            instr.br_args.push(Vec::new());
        }
        self.push(instr);
    }

    /// Emits `ret v?`.
    pub fn ret(&mut self, v: Option<Value>) {
        self.push(Instr::ret(v));
    }

    /// Emits `trap`.
    pub fn trap(&mut self) {
        self.push(Instr::new(Opcode::Trap, Type::Void, None, Vec::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_two_block_function() {
        let mut m = Module::new();
        let mut b = IrBuilder::new(&mut m);
        b.add_extern("rt_print_i64", &[Type::I64], Type::Void);
        {
            let mut f = b.start_function("add1", Type::I64, &[("x", Type::I64)]);
            let x = f.param(0).unwrap();
            let (exit, vals) = f.new_block_with_params("exit", &[Type::I64]);
            let y = f.binary(Opcode::IAdd, Type::I64, x, Value::ConstInt(1));
            f.br(exit, alloc::vec![y]);
            f.switch_to(exit);
            f.ret(Some(vals[0].clone()));
        }
        let f = m.function("add1").unwrap();
        assert_eq!(f.blocks.len(), 2);
        assert_eq!(&*f.blocks[1].label, "exit");
        assert!(f.blocks[0].terminated);
        assert_eq!(f.blocks[0].params, f.params);
        assert_eq!(f.temp_count(), 3);
    }

    #[test]
    fn block_labels_do_not_collide() {
        let mut m = Module::new();
        let mut b = IrBuilder::new(&mut m);
        let mut f = b.start_function("f", Type::Void, &[]);
        let a = f.new_block("loop");
        let c = f.new_block("loop");
        let e = f.new_block("entry");
        assert_eq!(&*f.label(a), "loop");
        assert_eq!(&*f.label(c), "loop1");
        assert_eq!(&*f.label(e), "entry1");
    }
}
