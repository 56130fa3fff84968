// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The runtime descriptor table: every helper an IL program can `call` by name.
//!
//! A descriptor carries the helper's IL signature, its handler, and a retain mask. Bit `i` of
//! the mask marks a string argument the helper consumes; the VM retains those arguments before
//! the call so the caller's references stay valid. The same table resolves callee signatures for
//! the verifier. Helpers for the runtime object classes live in `classes`.

mod classes;

use hashbrown::HashMap;

use viper_il::Type;
use viper_il::verify::CalleeResolver;
use viper_rt::channel::{ErrCode, OpenMode};
use viper_rt::{ObjRef, RtContext, RtTrap, TrapKind, clock, math, term};

use crate::slot::{Ptr, Slot};

/// A runtime helper. Receives the evaluated arguments; returns [`Slot::None`] for `void`.
pub type Handler = fn(&mut RtContext, &[Slot]) -> Result<Slot, RtTrap>;

/// Describes one runtime helper.
#[derive(Copy, Clone, Debug)]
pub struct RuntimeDescriptor {
    /// Symbol name used by `call @name`.
    pub name: &'static str,
    /// Parameter types.
    pub params: &'static [Type],
    /// Result type.
    pub ret: Type,
    /// String arguments the helper consumes (bit per argument).
    pub retain_mask: u32,
    /// Implementation.
    pub handler: Handler,
}

impl RuntimeDescriptor {
    /// Returns `true` if argument `i` is consumed by the helper.
    #[inline]
    #[must_use]
    pub const fn consumes(&self, i: usize) -> bool {
        i < 32 && self.retain_mask & (1 << i) != 0
    }
}

const fn desc(
    name: &'static str,
    params: &'static [Type],
    ret: Type,
    handler: Handler,
) -> RuntimeDescriptor {
    RuntimeDescriptor {
        name,
        params,
        ret,
        retain_mask: 0,
        handler,
    }
}

const fn consuming(mut d: RuntimeDescriptor, mask: u32) -> RuntimeDescriptor {
    d.retain_mask = mask;
    d
}

/// Name-indexed descriptor table.
#[derive(Clone, Debug, Default)]
pub struct RuntimeRegistry {
    descs: Vec<RuntimeDescriptor>,
    by_name: HashMap<&'static str, usize>,
}

impl RuntimeRegistry {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard helper set.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut r = Self::empty();
        for d in DEFAULTS.iter().chain(classes::CLASSES) {
            r.register(*d);
        }
        for (alias, target) in ALIASES {
            r.alias(alias, target);
        }
        r
    }

    /// Adds or replaces a descriptor.
    pub fn register(&mut self, d: RuntimeDescriptor) {
        match self.by_name.get(d.name) {
            Some(&i) => self.descs[i] = d,
            None => {
                self.by_name.insert(d.name, self.descs.len());
                self.descs.push(d);
            }
        }
    }

    /// Makes `alias` resolve to the descriptor registered as `target`.
    pub fn alias(&mut self, alias: &'static str, target: &str) -> bool {
        let Some(&i) = self.by_name.get(target) else {
            return false;
        };
        self.by_name.insert(alias, i);
        true
    }

    /// Looks up `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&RuntimeDescriptor> {
        self.by_name.get(name).and_then(|&i| self.descs.get(i))
    }

    /// Number of distinct descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descs.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }
}

impl CalleeResolver for RuntimeRegistry {
    fn signature(&self, name: &str) -> Option<(Vec<Type>, Type)> {
        self.lookup(name).map(|d| (d.params.to_vec(), d.ret))
    }
}

struct Args<'a>(&'a [Slot]);

impl Args<'_> {
    fn get(&self, i: usize) -> Result<&Slot, RtTrap> {
        self.0.get(i).ok_or_else(|| {
            RtTrap::with_message(TrapKind::MalformedIr, "runtime call is missing an argument")
        })
    }

    fn int(&self, i: usize) -> Result<i64, RtTrap> {
        self.get(i)?.int()
    }

    fn float(&self, i: usize) -> Result<f64, RtTrap> {
        self.get(i)?.float()
    }

    fn flag(&self, i: usize) -> Result<bool, RtTrap> {
        Ok(self.int(i)? != 0)
    }

    fn opt_str(&self, i: usize) -> Result<Option<ObjRef>, RtTrap> {
        self.get(i)?.str()
    }

    fn string(&self, i: usize) -> Result<ObjRef, RtTrap> {
        self.opt_str(i)?
            .ok_or_else(|| RtTrap::with_message(TrapKind::InvalidOperation, "null string"))
    }

    fn object(&self, i: usize) -> Result<ObjRef, RtTrap> {
        match self.get(i)?.ptr()? {
            Ptr::Obj(o) => Ok(o),
            _ => Err(RtTrap::with_message(TrapKind::InvalidOperation, "null object")),
        }
    }
}

fn str_slot(o: ObjRef) -> Slot {
    Slot::Str(Some(o))
}

fn bool_slot(b: bool) -> Slot {
    Slot::I64(i64::from(b))
}

fn bytes(cx: &RtContext, s: Option<ObjRef>) -> Result<Vec<u8>, RtTrap> {
    match s {
        Some(s) => Ok(cx.heap.str_bytes(s)?.to_vec()),
        None => Ok(Vec::new()),
    }
}

// Console.

fn rt_print_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    if let Some(s) = Args(a).opt_str(0)? {
        cx.print_str(s)?;
    }
    Ok(Slot::None)
}

fn rt_print_i64(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    cx.print_i64(Args(a).int(0)?);
    Ok(Slot::None)
}

fn rt_print_f64(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    cx.print_f64(Args(a).float(0)?);
    Ok(Slot::None)
}

fn rt_print_newline(cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    cx.print_newline();
    Ok(Slot::None)
}

// Strings.

fn rt_concat(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let (l, r) = (args.opt_str(0)?, args.opt_str(1)?);
    let mut out = bytes(cx, l)?;
    out.extend_from_slice(&bytes(cx, r)?);
    let joined = cx.heap.str_new(&out);
    cx.heap.release(l)?;
    cx.heap.release(r)?;
    Ok(str_slot(joined))
}

fn rt_str_len(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    match Args(a).opt_str(0)? {
        Some(s) => Ok(Slot::I64(cx.heap.str_len(s)?)),
        None => Ok(Slot::I64(0)),
    }
}

fn rt_str_eq(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(bool_slot(bytes(cx, args.opt_str(0)?)? == bytes(cx, args.opt_str(1)?)?))
}

fn rt_str_lt(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(bool_slot(bytes(cx, args.opt_str(0)?)? < bytes(cx, args.opt_str(1)?)?))
}

fn rt_substr(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let s = cx
        .heap
        .str_substring(args.string(0)?, args.int(1)?, args.int(2)?)?;
    Ok(str_slot(s))
}

fn rt_left(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(str_slot(cx.heap.str_left(args.string(0)?, args.int(1)?)?))
}

fn rt_right(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(str_slot(cx.heap.str_right(args.string(0)?, args.int(1)?)?))
}

fn rt_mid(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(str_slot(cx.heap.str_mid(args.string(0)?, args.int(1)?)?))
}

fn rt_ucase(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(str_slot(cx.heap.str_ucase(Args(a).string(0)?)?))
}

fn rt_lcase(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(str_slot(cx.heap.str_lcase(Args(a).string(0)?)?))
}

fn rt_trim(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(str_slot(cx.heap.str_trim(Args(a).string(0)?)?))
}

fn rt_ltrim(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(str_slot(cx.heap.str_ltrim(Args(a).string(0)?)?))
}

fn rt_rtrim(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(str_slot(cx.heap.str_rtrim(Args(a).string(0)?)?))
}

fn rt_chr(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(str_slot(cx.heap.str_chr(Args(a).int(0)?)?))
}

fn rt_asc(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    match Args(a).opt_str(0)? {
        Some(s) => Ok(Slot::I64(cx.heap.str_asc(s)?)),
        None => Ok(Slot::I64(0)),
    }
}

fn rt_instr(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(Slot::I64(cx.heap.str_instr(args.string(0)?, args.string(1)?)?))
}

fn rt_instr_from(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let pos = cx
        .heap
        .str_instr_from(args.int(0)?, args.string(1)?, args.string(2)?)?;
    Ok(Slot::I64(pos))
}

fn rt_val(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    match Args(a).opt_str(0)? {
        Some(s) => Ok(Slot::F64(cx.heap.str_val(s)?)),
        None => Ok(Slot::F64(0.0)),
    }
}

fn rt_int_to_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(str_slot(cx.heap.str_from_i64(Args(a).int(0)?)))
}

fn rt_f64_to_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(str_slot(cx.heap.str_from_f64(Args(a).float(0)?)))
}

// Math.

fn rt_pow_f64(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(Slot::F64(math::rt_pow_f64(args.float(0)?, args.float(1)?)?))
}

fn rt_abs_i64(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::I64(math::abs_i64(Args(a).int(0)?)?))
}

fn rt_sqrt(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::F64(math::sqrt_chk(Args(a).float(0)?)?))
}

fn rt_floor(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::F64(math::floor(Args(a).float(0)?)))
}

fn rt_ceil(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::F64(math::ceil(Args(a).float(0)?)))
}

fn rt_round_even(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::F64(math::round_even(Args(a).float(0)?)))
}

fn rt_fmod(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(Slot::F64(math::fmod(args.float(0)?, args.float(1)?)))
}

// Random.

fn rt_randomize(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    cx.rng.randomize(Args(a).int(0)?);
    Ok(Slot::None)
}

fn rt_rnd(cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::F64(cx.rng.rnd()))
}

fn rt_rand_int(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::I64(cx.rng.rand_int(Args(a).int(0)?)))
}

fn rt_rand_range(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(Slot::I64(cx.rng.rand_range(args.int(0)?, args.int(1)?)))
}

fn rt_rand_gaussian(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(Slot::F64(cx.rng.rand_gaussian(args.float(0)?, args.float(1)?)))
}

fn rt_rand_exponential(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::F64(cx.rng.rand_exponential(Args(a).float(0)?)))
}

fn rt_rand_dice(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::I64(cx.rng.rand_dice(Args(a).int(0)?)))
}

fn rt_rand_chance(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(bool_slot(cx.rng.rand_chance(Args(a).float(0)?)))
}

// Clock.

fn rt_clock_ticks_ms(_cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::I64(clock::clock_ticks_ms()))
}

fn rt_clock_ticks_us(_cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::I64(clock::clock_ticks_us()))
}

fn rt_sleep_ms(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    clock::sleep_ms(Args(a).int(0)?);
    Ok(Slot::None)
}

// Exceptions.

fn rt_exc_create(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let e = cx.heap.exc_create(Args(a).opt_str(0)?)?;
    Ok(Slot::Ptr(Ptr::Obj(e)))
}

fn rt_exc_message(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let msg = cx.heap.exc_message(Args(a).object(0)?)?;
    cx.heap.retain(msg)?;
    Ok(Slot::Str(msg))
}

// Containers.

fn rt_seq_new(cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::Ptr(Ptr::Obj(cx.heap.seq_new())))
}

fn rt_seq_len(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let n = cx.heap.seq_len(Args(a).object(0)?)?;
    Ok(Slot::I64(i64::try_from(n).unwrap_or(i64::MAX)))
}

fn rt_seq_push_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    cx.heap.seq_push(args.object(0)?, args.opt_str(1)?)?;
    Ok(Slot::None)
}

fn rt_seq_get_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let v = cx.heap.seq_get(args.object(0)?, args.int(1)?)?;
    cx.heap.retain(v)?;
    Ok(Slot::Str(v))
}

fn rt_map_new(cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::Ptr(Ptr::Obj(cx.heap.map_new())))
}

fn rt_map_len(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let n = cx.heap.map_len(Args(a).object(0)?)?;
    Ok(Slot::I64(i64::try_from(n).unwrap_or(i64::MAX)))
}

fn rt_map_set_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let key = bytes(cx, args.opt_str(1)?)?;
    cx.heap.map_set(args.object(0)?, &key, args.opt_str(2)?)?;
    Ok(Slot::None)
}

fn rt_map_get_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let key = bytes(cx, args.opt_str(1)?)?;
    let v = cx.heap.map_get(args.object(0)?, &key)?;
    cx.heap.retain(v)?;
    Ok(Slot::Str(v))
}

fn rt_map_has(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let key = bytes(cx, args.opt_str(1)?)?;
    Ok(bool_slot(cx.heap.map_has(args.object(0)?, &key)?))
}

// File channels.

fn open_mode(m: i64) -> Option<OpenMode> {
    match m {
        0 => Some(OpenMode::Input),
        1 => Some(OpenMode::Output),
        2 => Some(OpenMode::Append),
        3 => Some(OpenMode::Binary),
        _ => None,
    }
}

fn channel_no(v: i64) -> Result<i32, RtTrap> {
    i32::try_from(v).map_err(|_| RtTrap::from(ErrCode::InvalidOperation))
}

fn err_slot(r: Result<(), ErrCode>) -> Slot {
    Slot::I64(i64::from(r.err().unwrap_or(ErrCode::None).code()))
}

fn rt_open(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let path = String::from_utf8_lossy(&bytes(cx, args.opt_str(0)?)?).into_owned();
    let Some(mode) = open_mode(args.int(1)?) else {
        return Ok(err_slot(Err(ErrCode::InvalidOperation)));
    };
    let ch = channel_no(args.int(2)?)?;
    Ok(err_slot(cx.channels.open(path, mode, ch)))
}

fn rt_close(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let ch = channel_no(Args(a).int(0)?)?;
    Ok(err_slot(cx.channels.close(ch)))
}

fn rt_print_ch(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let ch = channel_no(args.int(0)?)?;
    let text = bytes(cx, args.opt_str(1)?)?;
    Ok(err_slot(cx.channels.print(ch, &text)))
}

fn rt_line_input(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let ch = channel_no(Args(a).int(0)?)?;
    let line = cx.channels.line_input(ch)?;
    Ok(str_slot(cx.heap.str_new(&line)))
}

fn rt_read_byte(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let ch = channel_no(Args(a).int(0)?)?;
    Ok(Slot::I64(i64::from(cx.channels.read_byte(ch)?)))
}

fn rt_eof(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let ch = channel_no(Args(a).int(0)?)?;
    Ok(bool_slot(cx.channels.eof(ch)?))
}

fn rt_seek(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let ch = channel_no(args.int(0)?)?;
    Ok(err_slot(cx.channels.seek(ch, args.int(1)?)))
}

fn rt_tell(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let ch = channel_no(Args(a).int(0)?)?;
    Ok(Slot::I64(cx.channels.tell(ch)?))
}

// Terminal.

fn rt_term_encode_mod(_cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let mods = term::KeyMods {
        shift: args.flag(0)?,
        alt: args.flag(1)?,
        ctrl: args.flag(2)?,
        meta: args.flag(3)?,
    };
    Ok(Slot::I64(i64::from(term::encode_mod(mods))))
}

use Type::{F64, I1, I64, Ptr as P, Str as S, Void};

const DEFAULTS: &[RuntimeDescriptor] = &[
    desc("rt_print_str", &[S], Void, rt_print_str),
    desc("rt_print_i64", &[I64], Void, rt_print_i64),
    desc("rt_print_f64", &[F64], Void, rt_print_f64),
    desc("rt_print_newline", &[], Void, rt_print_newline),
    consuming(desc("rt_concat", &[S, S], S, rt_concat), 0b11),
    desc("rt_str_len", &[S], I64, rt_str_len),
    desc("rt_str_eq", &[S, S], I1, rt_str_eq),
    desc("rt_str_lt", &[S, S], I1, rt_str_lt),
    desc("rt_substr", &[S, I64, I64], S, rt_substr),
    desc("rt_left", &[S, I64], S, rt_left),
    desc("rt_right", &[S, I64], S, rt_right),
    desc("rt_mid", &[S, I64], S, rt_mid),
    desc("rt_ucase", &[S], S, rt_ucase),
    desc("rt_lcase", &[S], S, rt_lcase),
    desc("rt_trim", &[S], S, rt_trim),
    desc("rt_ltrim", &[S], S, rt_ltrim),
    desc("rt_rtrim", &[S], S, rt_rtrim),
    desc("rt_chr", &[I64], S, rt_chr),
    desc("rt_asc", &[S], I64, rt_asc),
    desc("rt_instr", &[S, S], I64, rt_instr),
    desc("rt_instr_from", &[I64, S, S], I64, rt_instr_from),
    desc("rt_val", &[S], F64, rt_val),
    desc("rt_int_to_str", &[I64], S, rt_int_to_str),
    desc("rt_f64_to_str", &[F64], S, rt_f64_to_str),
    desc("rt_pow_f64", &[F64, F64], F64, rt_pow_f64),
    desc("rt_abs_i64", &[I64], I64, rt_abs_i64),
    desc("rt_sqrt", &[F64], F64, rt_sqrt),
    desc("rt_floor", &[F64], F64, rt_floor),
    desc("rt_ceil", &[F64], F64, rt_ceil),
    desc("rt_round_even", &[F64], F64, rt_round_even),
    desc("rt_fmod", &[F64, F64], F64, rt_fmod),
    desc("rt_randomize", &[I64], Void, rt_randomize),
    desc("rt_rnd", &[], F64, rt_rnd),
    desc("rt_rand_int", &[I64], I64, rt_rand_int),
    desc("rt_rand_range", &[I64, I64], I64, rt_rand_range),
    desc("rt_rand_gaussian", &[F64, F64], F64, rt_rand_gaussian),
    desc("rt_rand_exponential", &[F64], F64, rt_rand_exponential),
    desc("rt_rand_dice", &[I64], I64, rt_rand_dice),
    desc("rt_rand_chance", &[F64], I1, rt_rand_chance),
    desc("rt_clock_ticks_ms", &[], I64, rt_clock_ticks_ms),
    desc("rt_clock_ticks_us", &[], I64, rt_clock_ticks_us),
    desc("rt_sleep_ms", &[I64], Void, rt_sleep_ms),
    desc("rt_exc_create", &[S], P, rt_exc_create),
    desc("rt_exc_message", &[P], S, rt_exc_message),
    desc("rt_seq_new", &[], P, rt_seq_new),
    desc("rt_seq_len", &[P], I64, rt_seq_len),
    desc("rt_seq_push_str", &[P, S], Void, rt_seq_push_str),
    desc("rt_seq_get_str", &[P, I64], S, rt_seq_get_str),
    desc("rt_map_new", &[], P, rt_map_new),
    desc("rt_map_len", &[P], I64, rt_map_len),
    desc("rt_map_set_str", &[P, S, S], Void, rt_map_set_str),
    desc("rt_map_get_str", &[P, S], S, rt_map_get_str),
    desc("rt_map_has", &[P, S], I1, rt_map_has),
    desc("rt_open", &[S, I64, I64], I64, rt_open),
    desc("rt_close", &[I64], I64, rt_close),
    desc("rt_print_ch", &[I64, S], I64, rt_print_ch),
    desc("rt_line_input", &[I64], S, rt_line_input),
    desc("rt_read_byte", &[I64], I64, rt_read_byte),
    desc("rt_eof", &[I64], I1, rt_eof),
    desc("rt_seek", &[I64, I64], I64, rt_seek),
    desc("rt_tell", &[I64], I64, rt_tell),
    desc("rt_term_encode_mod", &[I1, I1, I1, I1], I64, rt_term_encode_mod),
];

const ALIASES: &[(&str, &str)] = &[
    ("Viper.Console.PrintStr", "rt_print_str"),
    ("Viper.Console.PrintI64", "rt_print_i64"),
    ("Viper.Strings.Concat", "rt_concat"),
    ("Viper.Strings.Len", "rt_str_len"),
    ("Viper.Math.Pow", "rt_pow_f64"),
    ("Viper.Math.Sqrt", "rt_sqrt"),
    ("Viper.Random.Next", "rt_rnd"),
    ("Viper.Time.Clock.Ticks", "rt_clock_ticks_ms"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_by_name_and_alias() {
        let r = RuntimeRegistry::with_defaults();
        let concat = r.lookup("rt_concat").unwrap();
        assert!(concat.consumes(0) && concat.consumes(1));
        assert!(!r.lookup("rt_str_len").unwrap().consumes(0));
        assert_eq!(r.lookup("Viper.Math.Pow").unwrap().name, "rt_pow_f64");
        assert_eq!(
            r.signature("rt_pow_f64"),
            Some((vec![Type::F64, Type::F64], Type::F64))
        );
        assert!(r.lookup("rt_nope").is_none());
        assert_eq!(r.len(), DEFAULTS.len() + classes::CLASSES.len());
        assert_eq!(
            r.signature("rt_quadtree_insert").map(|(params, _)| params.len()),
            Some(6)
        );
    }

    #[test]
    fn concat_consumes_its_arguments() {
        let mut cx = RtContext::new();
        let a = cx.heap.str_from("ab");
        let b = cx.heap.str_from("cd");
        let out = rt_concat(&mut cx, &[Slot::Str(Some(a)), Slot::Str(Some(b))]).unwrap();
        let Slot::Str(Some(o)) = out else {
            panic!("expected a string, got {out:?}");
        };
        assert_eq!(cx.heap.str_bytes(o).unwrap(), b"abcd");
        assert!(!cx.heap.is_live(a), "input released");
        assert!(!cx.heap.is_live(b), "input released");
    }

    #[test]
    fn pow_domain_error_surfaces_as_trap() {
        let mut cx = RtContext::new();
        let t = rt_pow_f64(&mut cx, &[Slot::F64(-2.0), Slot::F64(0.5)]).unwrap_err();
        assert_eq!(t.kind, TrapKind::DomainError);
        assert_eq!(
            t.to_string(),
            "DomainError: negative base with fractional exponent"
        );
    }
}
