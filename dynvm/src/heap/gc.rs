//! Four-generation mark-sweep collection with promotion.
//!
//! Newly allocated values land in generation 0. Every collection sweeps
//! generation 0 and promotes its survivors to generation 1; an older
//! generation is processed only when a previous promotion pushed it to
//! within [`GC_HEADROOM`] handles of its capacity. Generations 0–2 promote
//! survivors upward; generation 3 is terminal and sweeps in place.
//!
//! Tracing is index-based: mark and scan-guard bits live in the pool's
//! flag array, parallel to the value slab. Constants never enter a
//! generation, so they are never swept.

use std::collections::HashMap;

use super::pool::{FLAG_MARK, FLAG_SCAN};
use super::Heap;
use crate::value::{Value, ValueRef};

/// Collection headroom: a generation is considered full when it is within
/// this many handles of its capacity.
const GC_HEADROOM: usize = 32;

/// The engine-side root set for one collection.
///
/// Holds every location the engine can reach a value from: the calculation
/// stack, the data stack of every live frame (current one included), the
/// host-call scratch arguments, and the global variable table.
#[derive(Debug)]
pub struct Roots<'a> {
    pub calc_stack: &'a [ValueRef],
    pub data_stacks: Vec<&'a [ValueRef]>,
    pub call_parameters: &'a [ValueRef],
    pub globals: &'a HashMap<String, ValueRef>,
}

impl<'a> Roots<'a> {
    /// A root set with nothing in it, for tests and teardown paths.
    pub fn empty(globals: &'a HashMap<String, ValueRef>) -> Self {
        Roots {
            calc_stack: &[],
            data_stacks: Vec::new(),
            call_parameters: &[],
            globals,
        }
    }
}

impl Heap {
    /// Collection trigger, polled after every dispatched instruction.
    pub fn needs_collect(&self) -> bool {
        let gen0 = &self.generations[0];
        gen0.len() > gen0.capacity().saturating_sub(GC_HEADROOM)
    }

    /// Run one collection pass: any full older generation first (oldest to
    /// youngest), then generation 0 unconditionally.
    pub fn collect(&mut self, roots: &Roots<'_>) {
        for gen in (1..=3).rev() {
            if self.full[gen] {
                self.clear_marks(gen);
                self.mark_roots(roots);
                if gen == 3 {
                    self.sweep_oldest();
                } else {
                    self.sweep_and_promote(gen);
                }
            }
        }
        self.clear_marks(0);
        self.mark_roots(roots);
        self.sweep_and_promote(0);
    }

    fn clear_marks(&mut self, gen: usize) {
        for &r in &self.generations[gen] {
            self.pool.flags[r.index()] &= !FLAG_MARK;
        }
    }

    fn mark_roots(&mut self, roots: &Roots<'_>) {
        for &r in roots.call_parameters {
            self.mark_value(r);
        }
        for stack in &roots.data_stacks {
            for &r in *stack {
                self.mark_value(r);
            }
        }
        for &r in roots.calc_stack {
            self.mark_value(r);
        }
        for &r in roots.globals.values() {
            self.mark_value(r);
        }
    }

    /// Mark one value, descending into array elements. The scan-guard bit
    /// is held while an array's elements are traversed so that cyclic
    /// arrays are visited once.
    pub(crate) fn mark_value(&mut self, r: ValueRef) {
        let idx = r.index();
        self.pool.flags[idx] |= FLAG_MARK;
        if !matches!(self.pool.slots[idx], Value::Array(_)) {
            return;
        }
        if self.pool.flags[idx] & FLAG_SCAN != 0 {
            return;
        }
        self.pool.flags[idx] |= FLAG_SCAN;
        let count = match &self.pool.slots[idx] {
            Value::Array(arr) => arr.cells().len(),
            _ => 0,
        };
        for cell in 0..count {
            let element = match &self.pool.slots[idx] {
                Value::Array(arr) => arr.cells()[cell],
                _ => break,
            };
            self.mark_value(element);
        }
        self.pool.flags[idx] &= !FLAG_SCAN;
    }

    /// Sweep a young generation: unmarked values go back to the pool,
    /// survivors are promoted to the next generation. Sets the next
    /// generation's full-flag when promotion leaves it near capacity.
    fn sweep_and_promote(&mut self, gen: usize) {
        self.full[gen] = false;
        let mut source = std::mem::take(&mut self.generations[gen]);
        while let Some(r) = source.pop() {
            if self.pool.flags[r.index()] & FLAG_MARK != 0 {
                self.generations[gen + 1].push(r);
            } else {
                self.pool.free(r);
            }
        }
        // Keep the emptied vector so its reserved capacity survives.
        self.generations[gen] = source;

        let next = &self.generations[gen + 1];
        if next.len() > next.capacity().saturating_sub(GC_HEADROOM) {
            self.full[gen + 1] = true;
        }
    }

    /// Sweep the terminal generation in place.
    fn sweep_oldest(&mut self) {
        self.full[3] = false;
        let mut generation = std::mem::take(&mut self.generations[3]);
        generation.retain(|&r| {
            if self.pool.flags[r.index()] & FLAG_MARK != 0 {
                true
            } else {
                self.pool.free(r);
                false
            }
        });
        self.generations[3] = generation;
    }
}
