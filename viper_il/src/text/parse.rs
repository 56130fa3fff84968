// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IL text parser.
//!
//! The format is line oriented: one declaration, label, directive, or instruction per line.
//! Externs and globals are collected in a first sweep so functions may reference literals and
//! callees declared anywhere in the file.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashMap;

use crate::instr::{Instr, SourceLoc};
use crate::module::{BasicBlock, Extern, Function, Global, Module, Param};
use crate::opcode::Opcode;
use crate::text::lexer::{Tok, strip_comment, tokenize};
use crate::types::Type;
use crate::value::{LiteralId, TempId, Value};

/// A text-format error with its 1-based line number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based source line.
    pub line: usize,
    /// Description.
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl core::error::Error for ParseError {}

type PResult<T> = Result<T, String>;

struct Cursor<'t> {
    toks: &'t [Tok],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(toks: &'t [Tok]) -> Self {
        Self { toks, pos: 0 }
    }

    fn peek(&self) -> Option<&'t Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Tok> {
        let t = self.toks.get(self.pos);
        self.pos += 1;
        t
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> PResult<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(format!("expected {what}"))
        }
    }

    fn ident(&mut self, what: &str) -> PResult<&'t str> {
        match self.next() {
            Some(Tok::Ident(s)) => Ok(s.as_str()),
            _ => Err(format!("expected {what}")),
        }
    }

    fn global(&mut self, what: &str) -> PResult<&'t str> {
        match self.next() {
            Some(Tok::Global(s)) => Ok(s.as_str()),
            _ => Err(format!("expected {what}")),
        }
    }

    fn ty(&mut self) -> PResult<Type> {
        let name = self.ident("a type")?;
        Type::parse(name).ok_or_else(|| format!("unknown type '{name}'"))
    }

    fn finish(&self) -> PResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err("unexpected trailing tokens".into())
        }
    }
}

struct FnState {
    func: Function,
    temps: HashMap<String, TempId>,
    defined: Vec<bool>,
    loc: SourceLoc,
    current: Option<usize>,
    header_line: usize,
}

impl FnState {
    fn temp(&mut self, name: &str) -> TempId {
        if let Some(t) = self.temps.get(name) {
            return *t;
        }
        let t = self.func.fresh_temp(Some(name));
        self.temps.insert(name.to_string(), t);
        self.defined.push(false);
        t
    }

    fn define(&mut self, name: &str) -> TempId {
        let t = self.temp(name);
        self.defined[t.index()] = true;
        t
    }
}

struct Parser {
    module: Module,
    literal_labels: HashMap<String, LiteralId>,
    pending_calls: Vec<(usize, usize, usize, usize)>,
}

/// Parses a module from its text form.
pub fn parse_module(src: &str) -> Result<Module, ParseError> {
    let mut lines: Vec<(usize, &str)> = Vec::new();
    for (i, raw) in src.lines().enumerate() {
        let text = strip_comment(raw).trim();
        if !text.is_empty() {
            lines.push((i + 1, text));
        }
    }

    let Some(&(first_line, header)) = lines.first() else {
        return Err(ParseError {
            line: 1,
            message: "missing 'il <version>' header".into(),
        });
    };
    let version = header.strip_prefix("il").map(str::trim).unwrap_or("");
    if version.is_empty() || !header.starts_with("il ") {
        return Err(ParseError {
            line: first_line,
            message: "missing 'il <version>' header".into(),
        });
    }

    let mut p = Parser {
        module: Module::new(),
        literal_labels: HashMap::new(),
        pending_calls: Vec::new(),
    };

    let mut tokenized: Vec<(usize, Vec<Tok>)> = Vec::with_capacity(lines.len());
    for &(line, text) in &lines[1..] {
        let toks = tokenize(text).map_err(|message| ParseError { line, message })?;
        tokenized.push((line, toks));
    }

    for (line, toks) in &tokenized {
        let res = match toks.first() {
            Some(Tok::Ident(k)) if k == "extern" => p.parse_extern(toks),
            Some(Tok::Ident(k)) if k == "global" => p.parse_global(toks),
            _ => Ok(()),
        };
        res.map_err(|message| ParseError {
            line: *line,
            message,
        })?;
    }

    let mut state: Option<FnState> = None;
    for (line, toks) in &tokenized {
        let line = *line;
        let err = |message: String| ParseError { line, message };
        match toks.first() {
            Some(Tok::Ident(k)) if k == "extern" || k == "global" => {
                if state.is_some() {
                    return Err(err(format!("'{k}' inside a function body")));
                }
            }
            Some(Tok::Ident(k)) if k == "func" => {
                if state.is_some() {
                    return Err(err("nested 'func'".into()));
                }
                state = Some(p.parse_func_header(toks, line).map_err(err)?);
            }
            Some(Tok::RBrace) => {
                let Some(fs) = state.take() else {
                    return Err(err("unmatched '}'".into()));
                };
                if toks.len() != 1 {
                    return Err(err("unexpected tokens after '}'".into()));
                }
                p.finish_function(fs).map_err(|e| ParseError {
                    line: e.0,
                    message: e.1,
                })?;
            }
            Some(_) => {
                let Some(fs) = state.as_mut() else {
                    return Err(err("instruction outside of a function".into()));
                };
                p.parse_body_line(fs, toks, line).map_err(err)?;
            }
            None => {}
        }
    }
    if let Some(fs) = state {
        return Err(ParseError {
            line: fs.header_line,
            message: format!("function @{} is missing its closing '}}'", fs.func.name),
        });
    }

    p.resolve_call_types()?;
    Ok(p.module)
}

fn split_mnemonic(word: &str) -> Option<(Opcode, Option<Type>)> {
    if let Some(op) = Opcode::from_mnemonic(word) {
        return Some((op, None));
    }
    let (base, suffix) = word.rsplit_once('.')?;
    let ty = Type::parse(suffix)?;
    Opcode::from_mnemonic(base).map(|op| (op, Some(ty)))
}

fn default_type(op: Opcode, suffix: Option<Type>) -> Type {
    use crate::opcode::OpClass;
    let info = op.info();
    match info.class {
        OpClass::IntCompare | OpClass::FloatCompare => Type::I1,
        OpClass::FloatBinary => Type::F64,
        _ => match op {
            Opcode::Trunc1 => Type::I1,
            Opcode::Sitofp | Opcode::FConst => Type::F64,
            Opcode::ConstStr => Type::Str,
            Opcode::ConstNull | Opcode::Alloca | Opcode::Gep | Opcode::AddrOf => Type::Ptr,
            Opcode::Call => suffix.unwrap_or(Type::Void),
            _ if info.class == OpClass::Control
                || info.class == OpClass::RefCount
                || info.class == OpClass::Exception =>
            {
                Type::Void
            }
            _ => suffix.unwrap_or(Type::I64),
        },
    }
}

impl Parser {
    fn parse_extern(&mut self, toks: &[Tok]) -> PResult<()> {
        let mut c = Cursor::new(&toks[1..]);
        let name = c.global("extern name")?;
        c.expect(&Tok::LParen, "'('")?;
        let mut params = Vec::new();
        if !c.eat(&Tok::RParen) {
            loop {
                params.push(c.ty()?);
                if c.eat(&Tok::RParen) {
                    break;
                }
                c.expect(&Tok::Comma, "',' or ')'")?;
            }
        }
        c.expect(&Tok::Arrow, "'->'")?;
        let ret_ty = c.ty()?;
        c.finish()?;
        if self.module.extern_decl(name).is_some() {
            return Err(format!("duplicate extern @{name}"));
        }
        self.module.externs.push(Extern {
            name: name.into(),
            params,
            ret_ty,
        });
        Ok(())
    }

    fn parse_global(&mut self, toks: &[Tok]) -> PResult<()> {
        let mut c = Cursor::new(&toks[1..]);
        let is_const = c.eat(&Tok::Ident("const".into()));
        let ty = c.ty()?;
        let name = c.global("global name")?;
        let init = if c.eat(&Tok::Eq) {
            match c.next() {
                Some(Tok::Str(s)) => Some(self.module.intern(s)),
                _ => return Err("expected a string initializer".into()),
            }
        } else {
            None
        };
        c.finish()?;
        if init.is_some() && ty != Type::Str {
            return Err(format!("initializer on non-str global @{name}"));
        }
        match init {
            Some(id) if is_literal_label(name) => {
                self.literal_labels.insert(name.to_string(), id);
            }
            _ => {
                if self.module.global(name).is_some() {
                    return Err(format!("duplicate global @{name}"));
                }
                self.module.globals.push(Global {
                    name: name.into(),
                    ty,
                    is_const,
                    init,
                });
            }
        }
        Ok(())
    }

    fn parse_func_header(&mut self, toks: &[Tok], line: usize) -> PResult<FnState> {
        let mut c = Cursor::new(&toks[1..]);
        let name = c.global("function name")?;
        if self.module.function(name).is_some() {
            return Err(format!("duplicate function @{name}"));
        }
        let mut fs = FnState {
            func: Function::new(name, Type::Void),
            temps: HashMap::new(),
            defined: Vec::new(),
            loc: SourceLoc::default(),
            current: None,
            header_line: line,
        };
        c.expect(&Tok::LParen, "'('")?;
        fs.func.params = parse_params(&mut c, &mut fs)?;
        c.expect(&Tok::Arrow, "'->'")?;
        fs.func.ret_ty = c.ty()?;
        c.expect(&Tok::LBrace, "'{'")?;
        c.finish()?;
        Ok(fs)
    }

    fn parse_body_line(&mut self, fs: &mut FnState, toks: &[Tok], line: usize) -> PResult<()> {
        // `.loc file line col`
        if let Some(Tok::Ident(d)) = toks.first()
            && d == ".loc"
        {
            let nums: Vec<u32> = toks[1..]
                .iter()
                .map(|t| match t {
                    Tok::Int(v) => u32::try_from(*v).map_err(|_| "bad .loc operand".to_string()),
                    _ => Err("bad .loc operand".to_string()),
                })
                .collect::<PResult<_>>()?;
            let [file, line, column] = nums[..] else {
                return Err("'.loc' expects file, line, and column".into());
            };
            fs.loc = SourceLoc { file, line, column };
            return Ok(());
        }

        // `label:` / `label(params):`
        if let (Some(Tok::Ident(label)), Some(Tok::Colon)) = (toks.first(), toks.last())
            && matches!(toks.get(1), Some(Tok::Colon | Tok::LParen))
        {
            if fs.func.block_index(label).is_some() {
                return Err(format!("duplicate label '{label}'"));
            }
            let mut block = BasicBlock::new(label.as_str());
            let mut c = Cursor::new(&toks[1..toks.len() - 1]);
            if c.eat(&Tok::LParen) {
                block.params = parse_params(&mut c, fs)?;
            }
            c.finish()?;
            fs.func.blocks.push(block);
            fs.current = Some(fs.func.blocks.len() - 1);
            return Ok(());
        }

        let Some(bi) = fs.current else {
            return Err("instruction before the first block label".into());
        };
        let instr = self.parse_instr(fs, toks)?;
        let pending = instr.op == Opcode::Call && instr.ty == Type::Void && instr.result.is_some();
        let block = &mut fs.func.blocks[bi];
        if instr.is_terminator() {
            block.terminated = true;
        }
        block.instrs.push(instr);
        if pending {
            let fi = self.module.functions.len();
            self.pending_calls
                .push((fi, bi, block.instrs.len() - 1, line));
        }
        Ok(())
    }

    fn parse_instr(&mut self, fs: &mut FnState, toks: &[Tok]) -> PResult<Instr> {
        let mut c = Cursor::new(toks);
        let result = if let (Some(Tok::Temp(name)), Some(Tok::Eq)) = (toks.first(), toks.get(1)) {
            c.pos = 2;
            Some(name.as_str())
        } else {
            None
        };
        let word = c.ident("an opcode")?;
        let (op, suffix) = split_mnemonic(word).ok_or_else(|| format!("unknown opcode '{word}'"))?;
        let info = op.info();
        if info.has_result && result.is_none() && op != Opcode::Call {
            return Err(format!("'{}' produces a value and needs a result", info.mnemonic));
        }
        if !info.has_result && result.is_some() {
            return Err(format!("'{}' does not produce a value", info.mnemonic));
        }
        let mut instr = Instr::new(op, default_type(op, suffix), None, Vec::new());
        instr.loc = fs.loc;

        match op {
            Opcode::Br => {
                self.parse_target(&mut c, fs, &mut instr)?;
            }
            Opcode::CBr => {
                instr.operands.push(self.parse_value(&mut c, fs)?);
                c.expect(&Tok::Comma, "','")?;
                self.parse_target(&mut c, fs, &mut instr)?;
                c.expect(&Tok::Comma, "','")?;
                self.parse_target(&mut c, fs, &mut instr)?;
            }
            Opcode::SwitchI32 => {
                instr.ty = Type::Void;
                instr.operands.push(self.parse_value(&mut c, fs)?);
                c.expect(&Tok::Comma, "','")?;
                c.eat(&Tok::Ident("default".into()));
                self.parse_target(&mut c, fs, &mut instr)?;
                while c.eat(&Tok::Comma) {
                    let Some(Tok::Int(k)) = c.next() else {
                        return Err("expected an integer case value".into());
                    };
                    instr.operands.push(Value::ConstInt(*k));
                    c.eat(&Tok::Arrow);
                    self.parse_target(&mut c, fs, &mut instr)?;
                }
            }
            Opcode::EhPush => {
                let label = c.ident("a handler label")?;
                instr.labels.push(label.into());
                instr.br_args.push(Vec::new());
            }
            Opcode::Call => {
                let callee = c.global("a callee")?;
                instr.callee = Some(callee.into());
                c.expect(&Tok::LParen, "'('")?;
                instr.operands = self.parse_value_list(&mut c, fs)?;
            }
            _ => {
                if !c.at_end() {
                    instr.operands.push(self.parse_value(&mut c, fs)?);
                    while c.eat(&Tok::Comma) {
                        instr.operands.push(self.parse_value(&mut c, fs)?);
                    }
                }
            }
        }
        c.finish()?;

        if let Some(n) = info.operands
            && instr.operands.len() != usize::from(n)
        {
            return Err(format!(
                "'{}' expects {n} operand(s), found {}",
                info.mnemonic,
                instr.operands.len()
            ));
        }
        if op == Opcode::Ret && instr.operands.len() > 1 {
            return Err("'ret' takes at most one operand".into());
        }
        if let Some(name) = result {
            instr.result = Some(fs.define(name));
        }
        Ok(instr)
    }

    fn parse_target(
        &mut self,
        c: &mut Cursor<'_>,
        fs: &mut FnState,
        instr: &mut Instr,
    ) -> PResult<()> {
        let label = c.ident("a label")?;
        let args = if c.eat(&Tok::LParen) {
            self.parse_value_list(c, fs)?
        } else {
            Vec::new()
        };
        instr.labels.push(label.into());
        instr.br_args.push(args);
        Ok(())
    }

    /// Parses `v, v, ... )` (the opening parenthesis is already consumed).
    fn parse_value_list(&mut self, c: &mut Cursor<'_>, fs: &mut FnState) -> PResult<Vec<Value>> {
        let mut out = Vec::new();
        if c.eat(&Tok::RParen) {
            return Ok(out);
        }
        loop {
            out.push(self.parse_value(c, fs)?);
            if c.eat(&Tok::RParen) {
                return Ok(out);
            }
            c.expect(&Tok::Comma, "',' or ')'")?;
        }
    }

    fn parse_value(&mut self, c: &mut Cursor<'_>, fs: &mut FnState) -> PResult<Value> {
        match c.next() {
            Some(Tok::Temp(name)) => Ok(Value::Temp(fs.temp(name))),
            Some(Tok::Int(v)) => Ok(Value::ConstInt(*v)),
            Some(Tok::Float(v)) => Ok(Value::ConstFloat(*v)),
            Some(Tok::Str(s)) => Ok(Value::ConstStr(self.module.intern(s))),
            Some(Tok::Global(name)) => Ok(match self.literal_labels.get(name.as_str()) {
                Some(id) => Value::ConstStr(*id),
                None => Value::Global(name.as_str().into()),
            }),
            Some(Tok::Ident(word)) => match word.as_str() {
                "null" => Ok(Value::Null),
                "true" => Ok(Value::ConstInt(1)),
                "false" => Ok(Value::ConstInt(0)),
                w => self
                    .literal_labels
                    .get(w)
                    .map(|id| Value::ConstStr(*id))
                    .ok_or_else(|| format!("unknown operand '{w}'")),
            },
            _ => Err("expected an operand".into()),
        }
    }

    fn finish_function(&mut self, mut fs: FnState) -> Result<(), (usize, String)> {
        let line = fs.header_line;
        if fs.func.blocks.is_empty() {
            return Err((line, format!("function @{} has no blocks", fs.func.name)));
        }
        for (t, defined) in fs.defined.iter().enumerate() {
            if !defined {
                let name = fs
                    .func
                    .value_name(TempId(u32::try_from(t).unwrap_or(u32::MAX)))
                    .unwrap_or("?");
                return Err((line, format!("use of undefined temp %{name} in @{}", fs.func.name)));
            }
        }
        if fs.func.blocks[0].params.is_empty() {
            fs.func.blocks[0].params = fs.func.params.clone();
        }
        self.module.functions.push(fs.func);
        Ok(())
    }

    fn resolve_call_types(&mut self) -> Result<(), ParseError> {
        for &(fi, bi, ii, line) in &self.pending_calls {
            let Some(callee) = self.module.functions[fi].blocks[bi].instrs[ii].callee.clone() else {
                continue;
            };
            let Some((_, ret)) = self.module.signature(&callee) else {
                return Err(ParseError {
                    line,
                    message: format!(
                        "cannot infer the result type of a call to undeclared @{callee}; \
                         add a type suffix"
                    ),
                });
            };
            self.module.functions[fi].blocks[bi].instrs[ii].ty = ret;
        }
        Ok(())
    }
}

fn parse_params(c: &mut Cursor<'_>, fs: &mut FnState) -> PResult<Vec<Param>> {
    let mut params = Vec::new();
    if c.eat(&Tok::RParen) {
        return Ok(params);
    }
    loop {
        let (name, ty) = match c.next() {
            Some(Tok::Temp(name)) => {
                c.expect(&Tok::Colon, "':'")?;
                (name.as_str(), c.ty()?)
            }
            Some(Tok::Ident(ty)) => {
                let ty = Type::parse(ty).ok_or_else(|| format!("unknown type '{ty}'"))?;
                match c.next() {
                    Some(Tok::Temp(name)) => (name.as_str(), ty),
                    _ => return Err("expected a parameter name".into()),
                }
            }
            _ => return Err("expected a parameter".into()),
        };
        if ty == Type::Void {
            return Err("parameters cannot be void".into());
        }
        params.push(Param {
            id: fs.define(name),
            ty,
        });
        if c.eat(&Tok::RParen) {
            return Ok(params);
        }
        c.expect(&Tok::Comma, "',' or ')'")?;
    }
}

fn is_literal_label(name: &str) -> bool {
    name.strip_prefix(".L")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
