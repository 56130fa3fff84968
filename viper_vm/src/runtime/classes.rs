// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Descriptors for the runtime object classes: sets, bags, count maps, frozen collections,
//! lazies, union-find, quadtrees, and clocks.
//!
//! Objects travel through IL as `ptr`. Helpers that store a string or object retain it
//! themselves, so none of these descriptors consume their arguments.

use viper_il::Type::{I1, I64, Ptr as P, Str as S, Void};
use viper_rt::clock::{Countdown, Stopwatch, Timer};
use viper_rt::countmap::CountMap;
use viper_rt::frozen::{FrozenMap, FrozenSet};
use viper_rt::quadtree::{Quadtree, Rect};
use viper_rt::set::Bag;
use viper_rt::union_find::UnionFind;
use viper_rt::{ObjRef, RtContext, RtTrap};

use super::{Args, RuntimeDescriptor, bool_slot, bytes, desc, str_slot};
use crate::slot::{Ptr, Slot};

fn obj_slot(o: ObjRef) -> Slot {
    Slot::Ptr(Ptr::Obj(o))
}

fn count_slot(n: usize) -> Slot {
    Slot::I64(i64::try_from(n).unwrap_or(i64::MAX))
}

fn wide_slot(n: u64) -> Slot {
    Slot::I64(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Negative indices map past any container.
fn index(v: i64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

/// Negative durations clamp to zero.
fn millis(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

fn key(cx: &RtContext, args: &Args<'_>, i: usize) -> Result<Vec<u8>, RtTrap> {
    bytes(cx, args.opt_str(i)?)
}

// Identity sets.

fn rt_set_new(cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.set_new()))
}

fn rt_set_add(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(bool_slot(cx.heap.set_add(args.object(0)?, args.object(1)?)?))
}

fn rt_set_remove(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(bool_slot(cx.heap.set_remove(args.object(0)?, args.object(1)?)?))
}

fn rt_set_has(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(bool_slot(cx.heap.set_has(args.object(0)?, args.object(1)?)?))
}

fn rt_set_len(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(count_slot(cx.heap.set_len(Args(a).object(0)?)?))
}

fn rt_set_items(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.set_items(Args(a).object(0)?)?))
}

// Bags.

fn rt_bag_new(cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.bag_new()))
}

fn rt_bag_put(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let k = key(cx, &args, 1)?;
    Ok(bool_slot(cx.heap.borrow_mut::<Bag>(args.object(0)?)?.put(&k)))
}

fn rt_bag_drop(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let k = key(cx, &args, 1)?;
    Ok(bool_slot(cx.heap.borrow_mut::<Bag>(args.object(0)?)?.drop_key(&k)))
}

fn rt_bag_has(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let k = key(cx, &args, 1)?;
    Ok(bool_slot(cx.heap.borrow::<Bag>(args.object(0)?)?.has(&k)))
}

fn rt_bag_len(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(count_slot(cx.heap.borrow::<Bag>(Args(a).object(0)?)?.len()))
}

fn rt_bag_items(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.bag_items(Args(a).object(0)?)?))
}

fn bag_combine(
    cx: &mut RtContext,
    a: &[Slot],
    op: fn(&Bag, &Bag) -> Bag,
) -> Result<Slot, RtTrap> {
    let args = Args(a);
    Ok(obj_slot(cx.heap.bag_combine(args.object(0)?, args.object(1)?, op)?))
}

fn rt_bag_merge(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    bag_combine(cx, a, Bag::merge)
}

fn rt_bag_common(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    bag_combine(cx, a, Bag::common)
}

fn rt_bag_diff(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    bag_combine(cx, a, Bag::diff)
}

// Count maps.

fn rt_countmap_new(cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.alloc(CountMap::new())))
}

fn countmap_update(
    cx: &mut RtContext,
    a: &[Slot],
    f: impl FnOnce(&mut CountMap, &[u8]) -> i64,
) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let k = key(cx, &args, 1)?;
    Ok(Slot::I64(f(cx.heap.borrow_mut::<CountMap>(args.object(0)?)?, &k)))
}

fn rt_countmap_inc(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    countmap_update(cx, a, CountMap::inc)
}

fn rt_countmap_dec(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    countmap_update(cx, a, CountMap::dec)
}

fn rt_countmap_inc_by(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let n = Args(a).int(2)?;
    countmap_update(cx, a, |c, k| c.inc_by(k, n))
}

fn rt_countmap_set(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let n = Args(a).int(2)?;
    countmap_update(cx, a, |c, k| c.set(k, n))
}

fn rt_countmap_get(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let k = key(cx, &args, 1)?;
    Ok(Slot::I64(cx.heap.borrow::<CountMap>(args.object(0)?)?.get(&k)))
}

fn rt_countmap_len(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(count_slot(cx.heap.borrow::<CountMap>(Args(a).object(0)?)?.len()))
}

fn rt_countmap_total(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(Slot::I64(cx.heap.borrow::<CountMap>(Args(a).object(0)?)?.total()))
}

fn rt_countmap_most_common(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let seq = cx
        .heap
        .countmap_most_common(args.object(0)?, index(args.int(1)?))?;
    Ok(obj_slot(seq))
}

// Frozen sets and maps.

fn rt_frozenset_from_seq(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.frozen_set_from_seq(Args(a).object(0)?)?))
}

fn rt_frozenset_len(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(count_slot(cx.heap.borrow::<FrozenSet>(Args(a).object(0)?)?.len()))
}

fn rt_frozenset_has(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let k = key(cx, &args, 1)?;
    Ok(bool_slot(cx.heap.borrow::<FrozenSet>(args.object(0)?)?.has(&k)))
}

fn rt_frozenset_items(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.frozen_set_items(Args(a).object(0)?)?))
}

fn rt_frozenset_merge(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let merged = cx
        .heap
        .borrow::<FrozenSet>(args.object(0)?)?
        .merge(cx.heap.borrow::<FrozenSet>(args.object(1)?)?);
    Ok(obj_slot(cx.heap.alloc(merged)))
}

fn rt_frozenmap_from_seqs(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let m = cx
        .heap
        .frozen_map_from_seqs(args.object(0)?, args.object(1)?)?;
    Ok(obj_slot(m))
}

fn rt_frozenmap_len(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(count_slot(cx.heap.borrow::<FrozenMap>(Args(a).object(0)?)?.len()))
}

fn rt_frozenmap_has(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let k = key(cx, &args, 1)?;
    let found = cx.heap.borrow::<FrozenMap>(args.object(0)?)?.get(&k);
    Ok(bool_slot(found.is_some()))
}

/// Returns a new reference to the value; absent keys and null values read as the null string.
fn rt_frozenmap_get_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let k = key(cx, &args, 1)?;
    let v = cx.heap.frozen_map_get(args.object(0)?, &k)?;
    cx.heap.retain(v)?;
    Ok(Slot::Str(v))
}

fn rt_frozenmap_keys(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.frozen_map_keys(Args(a).object(0)?)?))
}

fn rt_frozenmap_values(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.frozen_map_values(Args(a).object(0)?)?))
}

fn rt_frozenmap_merge(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let m = cx.heap.frozen_map_merge(args.object(0)?, args.object(1)?)?;
    Ok(obj_slot(m))
}

// Lazies.

fn rt_lazy_of(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.lazy_of(Args(a).opt_str(0)?)?))
}

/// A lazy holding the concatenation of two string lazies, forced on first read.
fn rt_lazy_concat(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let (l, r) = (args.object(0)?, args.object(1)?);
    let lazy = cx.heap.lazy_new(&[l, r], move |heap| {
        let x = heap.lazy_get(l)?;
        let y = heap.lazy_get(r)?;
        let mut out = match x {
            Some(x) => heap.str_bytes(x)?.to_vec(),
            None => Vec::new(),
        };
        if let Some(y) = y {
            out.extend_from_slice(heap.str_bytes(y)?);
        }
        Ok(Some(heap.str_new(&out)))
    })?;
    Ok(obj_slot(lazy))
}

fn rt_lazy_get_str(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let v = cx.heap.lazy_get(Args(a).object(0)?)?;
    cx.heap.retain(v)?;
    Ok(Slot::Str(v))
}

fn rt_lazy_is_evaluated(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(bool_slot(cx.heap.lazy_is_evaluated(Args(a).object(0)?)?))
}

// Union-find.

fn rt_unionfind_new(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let n = usize::try_from(Args(a).int(0)?).unwrap_or(0);
    Ok(obj_slot(cx.heap.alloc(UnionFind::new(n))))
}

fn union_find<'a>(cx: &'a mut RtContext, args: &Args<'_>) -> Result<&'a mut UnionFind, RtTrap> {
    Ok(cx.heap.borrow_mut::<UnionFind>(args.object(0)?)?)
}

/// Representative of an element, or -1 when out of range.
fn rt_unionfind_find(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let x = index(args.int(1)?);
    let root = union_find(cx, &args)?.find(x);
    Ok(Slot::I64(root.and_then(|r| i64::try_from(r).ok()).unwrap_or(-1)))
}

fn rt_unionfind_union(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let (x, y) = (index(args.int(1)?), index(args.int(2)?));
    Ok(bool_slot(union_find(cx, &args)?.union(x, y)))
}

fn rt_unionfind_connected(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let (x, y) = (index(args.int(1)?), index(args.int(2)?));
    Ok(bool_slot(union_find(cx, &args)?.connected(x, y)))
}

fn rt_unionfind_count(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(count_slot(union_find(cx, &Args(a))?.count()))
}

fn rt_unionfind_set_size(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let x = index(args.int(1)?);
    Ok(count_slot(union_find(cx, &args)?.set_size(x)))
}

fn rt_unionfind_reset(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    union_find(cx, &Args(a))?.reset();
    Ok(Slot::None)
}

// Quadtrees.

fn rect(args: &Args<'_>, first: usize) -> Result<[i64; 4], RtTrap> {
    Ok([
        args.int(first)?,
        args.int(first + 1)?,
        args.int(first + 2)?,
        args.int(first + 3)?,
    ])
}

fn quadtree<'a>(cx: &'a mut RtContext, args: &Args<'_>) -> Result<&'a mut Quadtree, RtTrap> {
    Ok(cx.heap.borrow_mut::<Quadtree>(args.object(0)?)?)
}

fn rt_quadtree_new(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let [x, y, w, h] = rect(&Args(a), 0)?;
    Ok(obj_slot(cx.heap.alloc(Quadtree::new(Rect { x, y, w, h }))))
}

fn rt_quadtree_insert(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let id = args.int(1)?;
    let [px, py, w, h] = rect(&args, 2)?;
    Ok(bool_slot(quadtree(cx, &args)?.insert(id, px, py, w, h)))
}

fn rt_quadtree_update(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let id = args.int(1)?;
    let [px, py, w, h] = rect(&args, 2)?;
    Ok(bool_slot(quadtree(cx, &args)?.update(id, px, py, w, h)))
}

fn rt_quadtree_remove(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let id = args.int(1)?;
    Ok(bool_slot(quadtree(cx, &args)?.remove(id)))
}

fn rt_quadtree_item_count(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(count_slot(quadtree(cx, &Args(a))?.len()))
}

fn rt_quadtree_query_rect(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let [x, y, w, h] = rect(&args, 1)?;
    Ok(count_slot(quadtree(cx, &args)?.run_query(Rect { x, y, w, h })))
}

fn rt_quadtree_query_point(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let (x, y, r) = (args.int(1)?, args.int(2)?, args.int(3)?);
    let side = r.saturating_mul(2);
    let area = Rect {
        x: x.saturating_sub(r),
        y: y.saturating_sub(r),
        w: side,
        h: side,
    };
    Ok(count_slot(quadtree(cx, &args)?.run_query(area)))
}

fn rt_quadtree_query_was_truncated(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(bool_slot(quadtree(cx, &Args(a))?.last_truncated()))
}

/// Id at an index of the last query, or -1.
fn rt_quadtree_get_result(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let i = index(args.int(1)?);
    Ok(Slot::I64(quadtree(cx, &args)?.result(i).unwrap_or(-1)))
}

fn rt_quadtree_get_pairs(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(count_slot(quadtree(cx, &Args(a))?.run_pairs()))
}

fn rt_quadtree_pair_first(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let i = index(args.int(1)?);
    Ok(Slot::I64(quadtree(cx, &args)?.pair(i).map_or(-1, |p| p.0)))
}

fn rt_quadtree_pair_second(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let args = Args(a);
    let i = index(args.int(1)?);
    Ok(Slot::I64(quadtree(cx, &args)?.pair(i).map_or(-1, |p| p.1)))
}

// Stopwatches, timers, and countdowns.

fn stopwatch<'a>(cx: &'a mut RtContext, a: &[Slot]) -> Result<&'a mut Stopwatch, RtTrap> {
    Ok(cx.heap.borrow_mut::<Stopwatch>(Args(a).object(0)?)?)
}

fn rt_stopwatch_new(cx: &mut RtContext, _a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(obj_slot(cx.heap.alloc(Stopwatch::new())))
}

fn rt_stopwatch_start(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    stopwatch(cx, a)?.start();
    Ok(Slot::None)
}

fn rt_stopwatch_stop(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    stopwatch(cx, a)?.stop();
    Ok(Slot::None)
}

fn rt_stopwatch_reset(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    stopwatch(cx, a)?.reset();
    Ok(Slot::None)
}

fn rt_stopwatch_restart(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    stopwatch(cx, a)?.restart();
    Ok(Slot::None)
}

fn rt_stopwatch_is_running(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(bool_slot(stopwatch(cx, a)?.is_running()))
}

fn rt_stopwatch_elapsed_ms(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(wide_slot(stopwatch(cx, a)?.elapsed_ms()))
}

fn rt_stopwatch_elapsed_us(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(wide_slot(stopwatch(cx, a)?.elapsed_us()))
}

fn rt_timer_new(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let period = millis(Args(a).int(0)?);
    Ok(obj_slot(cx.heap.alloc(Timer::new(period))))
}

fn rt_timer_poll(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let fired = cx.heap.borrow_mut::<Timer>(Args(a).object(0)?)?.poll();
    Ok(wide_slot(fired))
}

fn rt_timer_reset(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    cx.heap.borrow_mut::<Timer>(Args(a).object(0)?)?.reset();
    Ok(Slot::None)
}

fn countdown<'a>(cx: &'a mut RtContext, a: &[Slot]) -> Result<&'a mut Countdown, RtTrap> {
    Ok(cx.heap.borrow_mut::<Countdown>(Args(a).object(0)?)?)
}

fn rt_countdown_new(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let interval = millis(Args(a).int(0)?);
    Ok(obj_slot(cx.heap.alloc(Countdown::new(interval))))
}

fn rt_countdown_start(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    countdown(cx, a)?.start();
    Ok(Slot::None)
}

fn rt_countdown_stop(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    countdown(cx, a)?.stop();
    Ok(Slot::None)
}

fn rt_countdown_reset(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    countdown(cx, a)?.reset();
    Ok(Slot::None)
}

fn rt_countdown_elapsed(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(wide_slot(countdown(cx, a)?.elapsed()))
}

fn rt_countdown_remaining(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(wide_slot(countdown(cx, a)?.remaining()))
}

fn rt_countdown_expired(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(bool_slot(countdown(cx, a)?.expired()))
}

fn rt_countdown_interval(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(wide_slot(countdown(cx, a)?.interval()))
}

fn rt_countdown_set_interval(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    let ms = millis(Args(a).int(1)?);
    countdown(cx, a)?.set_interval(ms);
    Ok(Slot::None)
}

fn rt_countdown_is_running(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    Ok(bool_slot(countdown(cx, a)?.is_running()))
}

fn rt_countdown_wait(cx: &mut RtContext, a: &[Slot]) -> Result<Slot, RtTrap> {
    countdown(cx, a)?.wait();
    Ok(Slot::None)
}

pub(super) const CLASSES: &[RuntimeDescriptor] = &[
    desc("rt_set_new", &[], P, rt_set_new),
    desc("rt_set_add", &[P, P], I1, rt_set_add),
    desc("rt_set_remove", &[P, P], I1, rt_set_remove),
    desc("rt_set_has", &[P, P], I1, rt_set_has),
    desc("rt_set_len", &[P], I64, rt_set_len),
    desc("rt_set_items", &[P], P, rt_set_items),
    desc("rt_bag_new", &[], P, rt_bag_new),
    desc("rt_bag_put", &[P, S], I1, rt_bag_put),
    desc("rt_bag_drop", &[P, S], I1, rt_bag_drop),
    desc("rt_bag_has", &[P, S], I1, rt_bag_has),
    desc("rt_bag_len", &[P], I64, rt_bag_len),
    desc("rt_bag_items", &[P], P, rt_bag_items),
    desc("rt_bag_merge", &[P, P], P, rt_bag_merge),
    desc("rt_bag_common", &[P, P], P, rt_bag_common),
    desc("rt_bag_diff", &[P, P], P, rt_bag_diff),
    desc("rt_countmap_new", &[], P, rt_countmap_new),
    desc("rt_countmap_inc", &[P, S], I64, rt_countmap_inc),
    desc("rt_countmap_dec", &[P, S], I64, rt_countmap_dec),
    desc("rt_countmap_inc_by", &[P, S, I64], I64, rt_countmap_inc_by),
    desc("rt_countmap_set", &[P, S, I64], I64, rt_countmap_set),
    desc("rt_countmap_get", &[P, S], I64, rt_countmap_get),
    desc("rt_countmap_len", &[P], I64, rt_countmap_len),
    desc("rt_countmap_total", &[P], I64, rt_countmap_total),
    desc("rt_countmap_most_common", &[P, I64], P, rt_countmap_most_common),
    desc("rt_frozenset_from_seq", &[P], P, rt_frozenset_from_seq),
    desc("rt_frozenset_len", &[P], I64, rt_frozenset_len),
    desc("rt_frozenset_has", &[P, S], I1, rt_frozenset_has),
    desc("rt_frozenset_items", &[P], P, rt_frozenset_items),
    desc("rt_frozenset_merge", &[P, P], P, rt_frozenset_merge),
    desc("rt_frozenmap_from_seqs", &[P, P], P, rt_frozenmap_from_seqs),
    desc("rt_frozenmap_len", &[P], I64, rt_frozenmap_len),
    desc("rt_frozenmap_has", &[P, S], I1, rt_frozenmap_has),
    desc("rt_frozenmap_get_str", &[P, S], S, rt_frozenmap_get_str),
    desc("rt_frozenmap_keys", &[P], P, rt_frozenmap_keys),
    desc("rt_frozenmap_values", &[P], P, rt_frozenmap_values),
    desc("rt_frozenmap_merge", &[P, P], P, rt_frozenmap_merge),
    desc("rt_lazy_of", &[S], P, rt_lazy_of),
    desc("rt_lazy_concat", &[P, P], P, rt_lazy_concat),
    desc("rt_lazy_get_str", &[P], S, rt_lazy_get_str),
    desc("rt_lazy_is_evaluated", &[P], I1, rt_lazy_is_evaluated),
    desc("rt_unionfind_new", &[I64], P, rt_unionfind_new),
    desc("rt_unionfind_find", &[P, I64], I64, rt_unionfind_find),
    desc("rt_unionfind_union", &[P, I64, I64], I1, rt_unionfind_union),
    desc("rt_unionfind_connected", &[P, I64, I64], I1, rt_unionfind_connected),
    desc("rt_unionfind_count", &[P], I64, rt_unionfind_count),
    desc("rt_unionfind_set_size", &[P, I64], I64, rt_unionfind_set_size),
    desc("rt_unionfind_reset", &[P], Void, rt_unionfind_reset),
    desc("rt_quadtree_new", &[I64, I64, I64, I64], P, rt_quadtree_new),
    desc("rt_quadtree_insert", &[P, I64, I64, I64, I64, I64], I1, rt_quadtree_insert),
    desc("rt_quadtree_update", &[P, I64, I64, I64, I64, I64], I1, rt_quadtree_update),
    desc("rt_quadtree_remove", &[P, I64], I1, rt_quadtree_remove),
    desc("rt_quadtree_item_count", &[P], I64, rt_quadtree_item_count),
    desc("rt_quadtree_query_rect", &[P, I64, I64, I64, I64], I64, rt_quadtree_query_rect),
    desc("rt_quadtree_query_point", &[P, I64, I64, I64], I64, rt_quadtree_query_point),
    desc("rt_quadtree_query_was_truncated", &[P], I1, rt_quadtree_query_was_truncated),
    desc("rt_quadtree_get_result", &[P, I64], I64, rt_quadtree_get_result),
    desc("rt_quadtree_get_pairs", &[P], I64, rt_quadtree_get_pairs),
    desc("rt_quadtree_pair_first", &[P, I64], I64, rt_quadtree_pair_first),
    desc("rt_quadtree_pair_second", &[P, I64], I64, rt_quadtree_pair_second),
    desc("rt_stopwatch_new", &[], P, rt_stopwatch_new),
    desc("rt_stopwatch_start", &[P], Void, rt_stopwatch_start),
    desc("rt_stopwatch_stop", &[P], Void, rt_stopwatch_stop),
    desc("rt_stopwatch_reset", &[P], Void, rt_stopwatch_reset),
    desc("rt_stopwatch_restart", &[P], Void, rt_stopwatch_restart),
    desc("rt_stopwatch_is_running", &[P], I1, rt_stopwatch_is_running),
    desc("rt_stopwatch_elapsed_ms", &[P], I64, rt_stopwatch_elapsed_ms),
    desc("rt_stopwatch_elapsed_us", &[P], I64, rt_stopwatch_elapsed_us),
    desc("rt_timer_new", &[I64], P, rt_timer_new),
    desc("rt_timer_poll", &[P], I64, rt_timer_poll),
    desc("rt_timer_reset", &[P], Void, rt_timer_reset),
    desc("rt_countdown_new", &[I64], P, rt_countdown_new),
    desc("rt_countdown_start", &[P], Void, rt_countdown_start),
    desc("rt_countdown_stop", &[P], Void, rt_countdown_stop),
    desc("rt_countdown_reset", &[P], Void, rt_countdown_reset),
    desc("rt_countdown_elapsed", &[P], I64, rt_countdown_elapsed),
    desc("rt_countdown_remaining", &[P], I64, rt_countdown_remaining),
    desc("rt_countdown_expired", &[P], I1, rt_countdown_expired),
    desc("rt_countdown_interval", &[P], I64, rt_countdown_interval),
    desc("rt_countdown_set_interval", &[P, I64], Void, rt_countdown_set_interval),
    desc("rt_countdown_is_running", &[P], I1, rt_countdown_is_running),
    desc("rt_countdown_wait", &[P], Void, rt_countdown_wait),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(s: Slot) -> ObjRef {
        match s {
            Slot::Ptr(Ptr::Obj(o)) => o,
            other => panic!("expected an object, got {other:?}"),
        }
    }

    #[test]
    fn no_class_helper_consumes_its_arguments() {
        assert!(CLASSES.iter().all(|d| d.retain_mask == 0));
    }

    #[test]
    fn bag_helpers_copy_keys() {
        let mut cx = RtContext::new();
        let bag = rt_bag_new(&mut cx, &[]).unwrap();
        let k = cx.heap.str_from("k");
        let args = [bag, str_slot(k)];
        assert_eq!(rt_bag_put(&mut cx, &args), Ok(Slot::I64(1)));
        assert_eq!(rt_bag_put(&mut cx, &args), Ok(Slot::I64(0)));
        assert_eq!(cx.heap.refcount(k), Ok(1), "bags copy key bytes");
        assert_eq!(rt_bag_len(&mut cx, &[bag]), Ok(Slot::I64(1)));
        assert_eq!(rt_bag_drop(&mut cx, &args), Ok(Slot::I64(1)));
        assert_eq!(rt_bag_has(&mut cx, &args), Ok(Slot::I64(0)));
    }

    #[test]
    fn lazy_concat_forces_once() {
        let mut cx = RtContext::new();
        let a = cx.heap.str_from("ab");
        let b = cx.heap.str_from("cd");
        let la = rt_lazy_of(&mut cx, &[str_slot(a)]).unwrap();
        let lb = rt_lazy_of(&mut cx, &[str_slot(b)]).unwrap();
        let both = rt_lazy_concat(&mut cx, &[la, lb]).unwrap();
        assert_eq!(rt_lazy_is_evaluated(&mut cx, &[both]), Ok(Slot::I64(0)));
        let Slot::Str(Some(s)) = rt_lazy_get_str(&mut cx, &[both]).unwrap() else {
            panic!("expected a string");
        };
        assert_eq!(cx.heap.str_bytes(s).unwrap(), b"abcd");
        assert_eq!(rt_lazy_is_evaluated(&mut cx, &[both]), Ok(Slot::I64(1)));
        cx.heap.release(s).unwrap();
        for o in [both, la, lb] {
            cx.heap.release(obj(o)).unwrap();
        }
        cx.heap.release(a).unwrap();
        cx.heap.release(b).unwrap();
        assert_eq!(cx.heap.live_objects(), 0);
    }

    #[test]
    fn wrong_class_is_an_invalid_operation() {
        let mut cx = RtContext::new();
        let bag = rt_bag_new(&mut cx, &[]).unwrap();
        let err = rt_unionfind_count(&mut cx, &[bag]).unwrap_err();
        assert_eq!(err.kind, viper_rt::TrapKind::InvalidOperation);
        assert_eq!(err.message.as_deref(), Some("expected union-find, found bag"));
    }
}
