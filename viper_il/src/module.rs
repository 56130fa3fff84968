// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Modules, functions, and basic blocks.

use alloc::boxed::Box;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::instr::Instr;
use crate::types::Type;
use crate::value::{LiteralId, TempId};

/// A typed parameter (function or block).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Temp bound by the parameter.
    pub id: TempId,
    /// Parameter type.
    pub ty: Type,
}

/// A labeled basic block.
#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    /// Label, unique within the function.
    pub label: Box<str>,
    /// Block parameters (the IL's merge form).
    pub params: Vec<Param>,
    /// Instructions; the last one is the terminator.
    pub instrs: Vec<Instr>,
    /// Authoring hint set by builders once a terminator was emitted.
    pub terminated: bool,
}

impl BasicBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new(label: impl Into<Box<str>>) -> Self {
        Self {
            label: label.into(),
            params: Vec::new(),
            instrs: Vec::new(),
            terminated: false,
        }
    }

    /// Returns the terminator, if the last instruction is one.
    #[must_use]
    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last().filter(|i| i.is_terminator())
    }

    /// Mutable access to the terminator.
    pub fn terminator_mut(&mut self) -> Option<&mut Instr> {
        self.instrs.last_mut().filter(|i| i.is_terminator())
    }
}

/// An IL function.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    /// Symbol name (without `@`).
    pub name: Box<str>,
    /// Return type.
    pub ret_ty: Type,
    /// Parameters; mirrored by the entry block's parameters.
    pub params: Vec<Param>,
    /// Blocks; block 0 is the entry.
    pub blocks: Vec<BasicBlock>,
    /// Optional source-level name per temp id. Its length is the function's temp count.
    pub value_names: Vec<Option<Box<str>>>,
}

impl Function {
    /// Creates a function with no blocks.
    #[must_use]
    pub fn new(name: impl Into<Box<str>>, ret_ty: Type) -> Self {
        Self {
            name: name.into(),
            ret_ty,
            params: Vec::new(),
            blocks: Vec::new(),
            value_names: Vec::new(),
        }
    }

    /// Number of temp ids allocated in this function.
    #[inline]
    #[must_use]
    pub fn temp_count(&self) -> usize {
        self.value_names.len()
    }

    /// Allocates a fresh temp id.
    pub fn fresh_temp(&mut self, name: Option<&str>) -> TempId {
        let id = TempId(u32::try_from(self.value_names.len()).unwrap_or(u32::MAX));
        self.value_names.push(name.map(Into::into));
        id
    }

    /// Looks up a block index by label.
    #[must_use]
    pub fn block_index(&self, label: &str) -> Option<usize> {
        self.blocks.iter().position(|b| &*b.label == label)
    }

    /// Returns the source-level name of `t`, if recorded.
    #[must_use]
    pub fn value_name(&self, t: TempId) -> Option<&str> {
        self.value_names.get(t.index()).and_then(|n| n.as_deref())
    }
}

/// An external function declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extern {
    /// Symbol name (without `@`).
    pub name: Box<str>,
    /// Parameter types.
    pub params: Vec<Type>,
    /// Return type.
    pub ret_ty: Type,
}

/// A module-level global.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Global {
    /// Symbol name (without `@`).
    pub name: Box<str>,
    /// Value type.
    pub ty: Type,
    /// Read-only global.
    pub is_const: bool,
    /// String initializer.
    pub init: Option<LiteralId>,
}

/// A compilation unit.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// Functions in definition order.
    pub functions: Vec<Function>,
    /// Extern declarations.
    pub externs: Vec<Extern>,
    /// Globals (excluding literal-pool entries).
    pub globals: Vec<Global>,
    literals: Vec<Box<str>>,
    literal_index: HashMap<Box<str>, LiteralId>,
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.functions == other.functions
            && self.externs == other.externs
            && self.globals == other.globals
            && self.literals == other.literals
    }
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s` into the literal pool; equal contents share one id.
    pub fn intern(&mut self, s: &str) -> LiteralId {
        if let Some(id) = self.literal_index.get(s) {
            return *id;
        }
        let id = LiteralId(u32::try_from(self.literals.len()).unwrap_or(u32::MAX));
        self.literals.push(s.into());
        self.literal_index.insert(s.into(), id);
        id
    }

    /// Returns the contents of literal `id`.
    #[must_use]
    pub fn literal(&self, id: LiteralId) -> Option<&str> {
        self.literals.get(id.0 as usize).map(|s| &**s)
    }

    /// All literals in id order.
    #[must_use]
    pub fn literals(&self) -> &[Box<str>] {
        &self.literals
    }

    /// Finds a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| &*f.name == name)
    }

    /// Finds a function by name (mutable).
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| &*f.name == name)
    }

    /// Finds an extern by name.
    #[must_use]
    pub fn extern_decl(&self, name: &str) -> Option<&Extern> {
        self.externs.iter().find(|e| &*e.name == name)
    }

    /// Finds a global by name.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| &*g.name == name)
    }

    /// Returns the `(params, ret)` signature of a function or extern named `name`.
    #[must_use]
    pub fn signature(&self, name: &str) -> Option<(Vec<Type>, Type)> {
        if let Some(f) = self.function(name) {
            return Some((f.params.iter().map(|p| p.ty).collect(), f.ret_ty));
        }
        self.extern_decl(name).map(|e| (e.params.clone(), e.ret_ty))
    }
}
