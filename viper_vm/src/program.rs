// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loading a verified [`Module`] into the pre-resolved form the interpreter executes.
//!
//! Loading resolves every symbolic reference once: branch labels become block indices, callees
//! become [`FuncId`]s or [`RuntimeId`]s, globals become byte offsets, and temps become register
//! indices. Calls in tail position are flagged here so the dispatch loop never inspects the
//! following instruction.

use std::fmt;

use hashbrown::HashMap;

use viper_il::verify::{VerifyError, verify_module_with};
use viper_il::{Function, Instr, Module, Opcode, Type, Value};

use crate::runtime::{RuntimeDescriptor, RuntimeRegistry};

/// Index of a function in a [`Program`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// Index of a runtime descriptor referenced by a [`Program`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeId(pub u32);

/// A pre-resolved operand.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Operand {
    /// Register index.
    Temp(u32),
    /// Integer immediate.
    Int(i64),
    /// Float immediate.
    Float(f64),
    /// Index into [`Program::literals`].
    Str(u32),
    /// The null pointer.
    Null,
    /// Byte offset of a global.
    Global(u32),
}

/// A branch target with its block arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    /// Block index within the function.
    pub block: u32,
    /// Arguments bound to the block's parameters.
    pub args: Vec<Operand>,
}

/// A resolved call target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Callee {
    /// An IL function.
    Function(FuncId),
    /// A runtime helper.
    Runtime(RuntimeId),
}

/// One executable instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedInstr {
    /// Opcode.
    pub op: Opcode,
    /// Instruction type (result type, or stored type for `store`).
    pub ty: Type,
    /// Type of the first typed operand; selects the width for compares and casts.
    pub src_ty: Type,
    /// Destination register.
    pub result: Option<u32>,
    /// Value operands. For `switch.i32`, the scrutinee followed by the case values.
    pub operands: Vec<Operand>,
    /// Successors in label order.
    pub targets: Vec<Target>,
    /// Resolved callee for `call`.
    pub callee: Option<Callee>,
    /// Source line, or `-1` when unknown.
    pub line: i64,
    /// `call` whose result is returned immediately by a function without handlers.
    pub tail: bool,
}

/// A basic block.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedBlock {
    /// Label.
    pub label: Box<str>,
    /// Parameter registers.
    pub params: Vec<u32>,
    /// Instructions, ending in a terminator.
    pub instrs: Vec<LoadedInstr>,
}

/// A function ready to execute.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedFunction {
    /// Symbol name.
    pub name: Box<str>,
    /// Return type.
    pub ret_ty: Type,
    /// Parameter registers and types.
    pub params: Vec<(u32, Type)>,
    /// Blocks; block 0 is the entry.
    pub blocks: Vec<LoadedBlock>,
    /// Register file size.
    pub temp_count: usize,
}

/// A module global placed in global storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalSlot {
    /// Symbol name.
    pub name: Box<str>,
    /// Declared type.
    pub ty: Type,
    /// Byte offset in global storage.
    pub offset: u32,
    /// Initial string literal.
    pub init: Option<u32>,
}

/// Failure to load a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// The module failed verification.
    Verify(VerifyError),
    /// An extern has no runtime implementation.
    UnresolvedExtern(Box<str>),
    /// A call names neither a function nor a runtime helper.
    UnknownCallee {
        /// Calling function.
        function: Box<str>,
        /// Missing symbol.
        callee: Box<str>,
    },
    /// A branch names a missing block.
    UnknownLabel {
        /// Function.
        function: Box<str>,
        /// Missing label.
        label: Box<str>,
    },
    /// An operand names a missing global.
    UnknownGlobal {
        /// Function.
        function: Box<str>,
        /// Missing symbol.
        name: Box<str>,
    },
    /// The module exceeds an addressing limit.
    TooLarge(&'static str),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verify(e) => write!(f, "verify: {e}"),
            Self::UnresolvedExtern(name) => {
                write!(f, "extern @{name} has no runtime implementation")
            }
            Self::UnknownCallee { function, callee } => {
                write!(f, "@{function}: unknown callee @{callee}")
            }
            Self::UnknownLabel { function, label } => {
                write!(f, "@{function}: unknown label {label}")
            }
            Self::UnknownGlobal { function, name } => {
                write!(f, "@{function}: unknown global @{name}")
            }
            Self::TooLarge(what) => write!(f, "too many {what}"),
        }
    }
}

impl core::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Verify(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VerifyError> for LoadError {
    fn from(e: VerifyError) -> Self {
        Self::Verify(e)
    }
}

/// An executable program.
#[derive(Clone, Debug)]
pub struct Program {
    functions: Vec<LoadedFunction>,
    by_name: HashMap<Box<str>, FuncId>,
    runtime: Vec<RuntimeDescriptor>,
    literals: Vec<Box<str>>,
    globals: Vec<GlobalSlot>,
    global_bytes: u32,
}

fn index_u32(n: usize, what: &'static str) -> Result<u32, LoadError> {
    u32::try_from(n).map_err(|_| LoadError::TooLarge(what))
}

impl Program {
    /// Verifies `module` against `registry` and resolves it for execution.
    pub fn load(module: &Module, registry: &RuntimeRegistry) -> Result<Self, LoadError> {
        verify_module_with(module, registry)?;
        for ext in &module.externs {
            if module.function(&ext.name).is_none() && registry.lookup(&ext.name).is_none() {
                return Err(LoadError::UnresolvedExtern(ext.name.clone()));
            }
        }

        let mut by_name = HashMap::new();
        for (i, f) in module.functions.iter().enumerate() {
            by_name.insert(f.name.clone(), FuncId(index_u32(i, "functions")?));
        }

        let mut globals = Vec::with_capacity(module.globals.len());
        let mut global_offsets = HashMap::new();
        for (i, g) in module.globals.iter().enumerate() {
            let offset = index_u32(i, "globals")?
                .checked_mul(8)
                .ok_or(LoadError::TooLarge("globals"))?;
            global_offsets.insert(&*g.name, offset);
            globals.push(GlobalSlot {
                name: g.name.clone(),
                ty: g.ty,
                offset,
                init: g.init.map(|id| id.0),
            });
        }
        let global_bytes = index_u32(globals.len(), "globals")?
            .checked_mul(8)
            .ok_or(LoadError::TooLarge("globals"))?;

        let mut loader = Loader {
            module,
            registry,
            by_name: &by_name,
            global_offsets: &global_offsets,
            runtime: Vec::new(),
            runtime_ids: HashMap::new(),
        };
        let mut functions = Vec::with_capacity(module.functions.len());
        for f in &module.functions {
            functions.push(loader.function(f)?);
        }
        let runtime = loader.runtime;

        tracing::debug!(
            functions = functions.len(),
            runtime = runtime.len(),
            globals = globals.len(),
            "program loaded"
        );
        Ok(Self {
            functions,
            by_name,
            runtime,
            literals: module.literals().to_vec(),
            globals,
            global_bytes,
        })
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function_id(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    /// The function with id `id`.
    #[must_use]
    pub fn function(&self, id: FuncId) -> Option<&LoadedFunction> {
        self.functions.get(id.0 as usize)
    }

    /// All functions in module order.
    #[must_use]
    pub fn functions(&self) -> &[LoadedFunction] {
        &self.functions
    }

    /// The runtime descriptor with id `id`.
    #[must_use]
    pub fn runtime(&self, id: RuntimeId) -> Option<&RuntimeDescriptor> {
        self.runtime.get(id.0 as usize)
    }

    /// Symbol name of function `id`.
    #[must_use]
    pub fn function_name(&self, id: FuncId) -> Option<&str> {
        self.function(id).map(|f| &*f.name)
    }

    /// Symbol name of runtime helper `id`.
    #[must_use]
    pub fn runtime_name(&self, id: RuntimeId) -> Option<&'static str> {
        self.runtime(id).map(|d| d.name)
    }

    /// The string literal pool.
    #[must_use]
    pub fn literals(&self) -> &[Box<str>] {
        &self.literals
    }

    /// Module globals.
    #[must_use]
    pub fn globals(&self) -> &[GlobalSlot] {
        &self.globals
    }

    /// Bytes of global storage.
    #[must_use]
    pub fn global_bytes(&self) -> u32 {
        self.global_bytes
    }
}

struct Loader<'a> {
    module: &'a Module,
    registry: &'a RuntimeRegistry,
    by_name: &'a HashMap<Box<str>, FuncId>,
    global_offsets: &'a HashMap<&'a str, u32>,
    runtime: Vec<RuntimeDescriptor>,
    runtime_ids: HashMap<&'static str, RuntimeId>,
}

impl Loader<'_> {
    fn function(&mut self, f: &Function) -> Result<LoadedFunction, LoadError> {
        let types = temp_types(f);
        let has_handlers = f
            .blocks
            .iter()
            .flat_map(|b| &b.instrs)
            .any(|i| i.op == Opcode::EhPush);

        let mut blocks = Vec::with_capacity(f.blocks.len());
        for block in &f.blocks {
            let mut instrs = Vec::with_capacity(block.instrs.len());
            for (i, instr) in block.instrs.iter().enumerate() {
                let mut loaded = self.instr(f, instr, &types)?;
                loaded.tail = !has_handlers
                    && matches!(loaded.callee, Some(Callee::Function(_)))
                    && block
                        .instrs
                        .get(i + 1)
                        .is_some_and(|next| returns_result_of(instr, next));
                instrs.push(loaded);
            }
            blocks.push(LoadedBlock {
                label: block.label.clone(),
                params: block.params.iter().map(|p| p.id.0).collect(),
                instrs,
            });
        }

        Ok(LoadedFunction {
            name: f.name.clone(),
            ret_ty: f.ret_ty,
            params: f.params.iter().map(|p| (p.id.0, p.ty)).collect(),
            blocks,
            temp_count: f.temp_count(),
        })
    }

    fn instr(
        &mut self,
        f: &Function,
        instr: &Instr,
        types: &[Option<Type>],
    ) -> Result<LoadedInstr, LoadError> {
        let mut operands = Vec::with_capacity(instr.operands.len());
        for v in &instr.operands {
            operands.push(self.operand(f, instr.op, v)?);
        }

        let mut targets = Vec::with_capacity(instr.labels.len());
        for (i, label) in instr.labels.iter().enumerate() {
            let block = f
                .block_index(label)
                .ok_or_else(|| LoadError::UnknownLabel {
                    function: f.name.clone(),
                    label: label.clone(),
                })?;
            let mut args = Vec::new();
            for v in instr.args_for(i) {
                args.push(self.operand(f, instr.op, v)?);
            }
            targets.push(Target {
                block: index_u32(block, "blocks")?,
                args,
            });
        }

        let callee = match &instr.callee {
            Some(name) => Some(self.callee(f, name)?),
            None => None,
        };

        let src_ty = instr
            .operands
            .iter()
            .find_map(|v| operand_type(v, types))
            .unwrap_or(Type::I64);

        Ok(LoadedInstr {
            op: instr.op,
            ty: instr.ty,
            src_ty,
            result: instr.result.map(|t| t.0),
            operands,
            targets,
            callee,
            line: if instr.loc.is_known() {
                i64::from(instr.loc.line)
            } else {
                -1
            },
            tail: false,
        })
    }

    fn operand(&self, f: &Function, op: Opcode, v: &Value) -> Result<Operand, LoadError> {
        Ok(match v {
            Value::Temp(t) => Operand::Temp(t.0),
            Value::ConstInt(n) => Operand::Int(*n),
            Value::ConstFloat(x) => Operand::Float(*x),
            Value::ConstStr(id) => Operand::Str(id.0),
            Value::Null => Operand::Null,
            Value::Global(name) if op == Opcode::ConstStr => {
                match self.module.global(name).and_then(|g| g.init) {
                    Some(id) => Operand::Str(id.0),
                    None => Operand::Null,
                }
            }
            Value::Global(name) => match self.global_offsets.get(&**name) {
                Some(&offset) => Operand::Global(offset),
                None => {
                    return Err(LoadError::UnknownGlobal {
                        function: f.name.clone(),
                        name: name.clone(),
                    });
                }
            },
        })
    }

    fn callee(&mut self, f: &Function, name: &str) -> Result<Callee, LoadError> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(Callee::Function(id));
        }
        let Some(desc) = self.registry.lookup(name) else {
            return Err(LoadError::UnknownCallee {
                function: f.name.clone(),
                callee: name.into(),
            });
        };
        if let Some(&id) = self.runtime_ids.get(desc.name) {
            return Ok(Callee::Runtime(id));
        }
        let id = RuntimeId(index_u32(self.runtime.len(), "runtime helpers")?);
        self.runtime.push(*desc);
        self.runtime_ids.insert(desc.name, id);
        Ok(Callee::Runtime(id))
    }
}

fn returns_result_of(call: &Instr, next: &Instr) -> bool {
    if next.op != Opcode::Ret {
        return false;
    }
    match (call.result, next.operands.first()) {
        (Some(r), Some(Value::Temp(t))) => r == *t && next.operands.len() == 1,
        (None, None) => call.ty == Type::Void,
        _ => false,
    }
}

fn temp_types(f: &Function) -> Vec<Option<Type>> {
    let mut types = vec![None; f.temp_count()];
    let mut set = |t: viper_il::TempId, ty: Type| {
        if let Some(slot) = types.get_mut(t.index()) {
            *slot = Some(ty);
        }
    };
    for p in &f.params {
        set(p.id, p.ty);
    }
    for b in &f.blocks {
        for p in &b.params {
            set(p.id, p.ty);
        }
        for i in &b.instrs {
            if let Some(r) = i.result {
                set(r, i.ty);
            }
        }
    }
    types
}

fn operand_type(v: &Value, types: &[Option<Type>]) -> Option<Type> {
    match v {
        Value::Temp(t) => types.get(t.index()).copied().flatten(),
        Value::ConstFloat(_) => Some(Type::F64),
        Value::ConstStr(_) => Some(Type::Str),
        Value::Global(_) => Some(Type::Ptr),
        Value::ConstInt(_) | Value::Null => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viper_il::text::parse_module;

    fn load(src: &str) -> Result<Program, LoadError> {
        let m = parse_module(src).unwrap();
        Program::load(&m, &RuntimeRegistry::with_defaults())
    }

    #[test]
    fn resolves_labels_callees_and_tail_position() {
        let p = load(
            "il 0.1.2\n\
             extern @rt_abs_i64(i64) -> i64\n\
             func @f(i64 %n) -> i64 {\n\
             entry:\n\
             \x20 %c = scmp_gt %n, 0\n\
             \x20 cbr %c, rec, done\n\
             rec:\n\
             \x20 %m = isub.i64 %n, 1\n\
             \x20 %r = call @f(%m)\n\
             \x20 ret %r\n\
             done:\n\
             \x20 %x = call @rt_abs_i64(%n)\n\
             \x20 ret %x\n\
             }\n",
        );
        let p = match p {
            Ok(p) => p,
            Err(e) => panic!("load failed: {e}"),
        };
        let id = p.function_id("f").unwrap();
        let f = p.function(id).unwrap();
        let cbr = &f.blocks[0].instrs[1];
        assert_eq!(cbr.targets[0].block, 1);
        assert_eq!(cbr.targets[1].block, 2);
        let call = &f.blocks[1].instrs[1];
        assert_eq!(call.callee, Some(Callee::Function(id)));
        assert!(call.tail, "self call followed by ret of its result");
        let rt = &f.blocks[2].instrs[0];
        assert!(!rt.tail, "runtime calls are never tail calls");
        let Some(Callee::Runtime(r)) = rt.callee else {
            panic!("expected a runtime callee");
        };
        assert_eq!(p.runtime_name(r), Some("rt_abs_i64"));
    }

    #[test]
    fn unresolved_extern_is_rejected() {
        let err = load(
            "il 0.1.2\n\
             extern @no_such_helper(i64) -> i64\n\
             func @main() -> i64 {\n\
             entry:\n\
             \x20 %r = call @no_such_helper(1)\n\
             \x20 ret %r\n\
             }\n",
        )
        .unwrap_err();
        assert_eq!(err, LoadError::UnresolvedExtern("no_such_helper".into()));
    }
}
