//! The garbage-collected value heap.
//!
//! [`Heap`] fronts the size-classed [`pool`] with generation tracking: the
//! `new_*` factories allocate and register the value in generation 0, while
//! the `constant_*` factories take the raw pool path for engine-owned,
//! GC-exempt values (the constant pool and array constants). Collection
//! itself lives in [`gc`].

pub mod gc;
pub mod pool;

use crate::value::{Value, ValueKind, ValueRef};
use crate::wide;

pub use gc::Roots;
pub use pool::{PoolStats, ValuePool};

use pool::FLAG_MARK;

/// Reserve hints per generation, in value handles.
const GENERATION_RESERVE: [usize; 4] = [16 * 1024, 64 * 1024, 128 * 1024, 512 * 1024];

#[derive(Debug)]
pub struct Heap {
    pool: ValuePool,
    generations: [Vec<ValueRef>; 4],
    full: [bool; 4],
}

/// Occupancy snapshot across the pool and all generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub generation_counts: [usize; 4],
    pub pool: PoolStats,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            pool: ValuePool::new(),
            generations: Default::default(),
            full: [false; 4],
        }
    }

    /// Reset generation bookkeeping and apply the reserve hints.
    /// Called once at the top of `run()`.
    pub fn start(&mut self) {
        self.clean();
        self.full = [false; 4];
        for (generation, reserve) in self.generations.iter_mut().zip(GENERATION_RESERVE) {
            generation.reserve(reserve);
        }
    }

    /// Free every tracked value and release the pool's retained buffers.
    /// Constants are engine-owned and not touched here.
    pub fn clean(&mut self) {
        for g in 0..self.generations.len() {
            let generation = std::mem::take(&mut self.generations[g]);
            for r in &generation {
                self.pool.free(*r);
            }
            // Put the (now empty) vector back so its capacity survives.
            self.generations[g] = generation;
            self.generations[g].clear();
        }
        self.pool.clean();
    }

    pub fn boolean(&self, value: bool) -> ValueRef {
        self.pool.boolean(value)
    }

    pub fn false_ref(&self) -> ValueRef {
        ValueRef::FALSE
    }

    pub fn true_ref(&self) -> ValueRef {
        ValueRef::TRUE
    }

    pub fn value(&self, r: ValueRef) -> &Value {
        self.pool.value(r)
    }

    pub fn kind(&self, r: ValueRef) -> ValueKind {
        self.pool.value(r).kind()
    }

    fn track(&mut self, r: ValueRef) -> ValueRef {
        self.generations[0].push(r);
        r
    }

    // --- GC-aware factories: allocate and register in generation 0 ---

    pub fn new_integer(&mut self, value: i64) -> ValueRef {
        let r = self.pool.alloc_integer(value);
        self.track(r)
    }

    pub fn new_real(&mut self, value: f64) -> ValueRef {
        let r = self.pool.alloc_real(value);
        self.track(r)
    }

    pub fn new_string(&mut self, value: &str) -> ValueRef {
        let units = wide::encode(value);
        let r = self.pool.alloc_str(&units);
        self.track(r)
    }

    pub fn new_string_units(&mut self, units: &[u16]) -> ValueRef {
        let r = self.pool.alloc_str(units);
        self.track(r)
    }

    /// Boolean results are always the shared singletons, which are exempt
    /// from generation tracking.
    pub fn new_boolean(&mut self, value: bool) -> ValueRef {
        self.pool.boolean(value)
    }

    pub fn new_array(&mut self, rows: usize, cols: usize, fill: Option<ValueRef>) -> ValueRef {
        let fill = fill.unwrap_or(ValueRef::FALSE);
        let r = self.pool.alloc_array(rows, cols, fill);
        self.track(r)
    }

    // --- Raw factories: engine-owned permanent values (constants) ---

    pub fn constant_integer(&mut self, value: i64) -> ValueRef {
        self.pool.alloc_integer(value)
    }

    pub fn constant_real(&mut self, value: f64) -> ValueRef {
        self.pool.alloc_real(value)
    }

    pub fn constant_string(&mut self, value: &str) -> ValueRef {
        let units = wide::encode(value);
        self.pool.alloc_str(&units)
    }

    pub fn constant_array(&mut self, rows: usize, cols: usize) -> ValueRef {
        self.pool.alloc_array(rows, cols, ValueRef::FALSE)
    }

    /// Return a constant (or any untracked value) to the pool.
    pub fn free_constant(&mut self, r: ValueRef) {
        self.pool.free(r);
    }

    // --- Array element access ---

    /// Bounds-checked element read. Out-of-range coordinates and non-array
    /// values read as the `false` singleton; element slots are never empty.
    pub fn array_get(&self, r: ValueRef, row: usize, col: usize) -> ValueRef {
        match self.pool.value(r) {
            Value::Array(arr) => arr.get(row, col).unwrap_or(ValueRef::FALSE),
            _ => ValueRef::FALSE,
        }
    }

    /// Bounds-checked element write; silently ignored when out of range or
    /// the target is not an array. When the array is currently marked live,
    /// the stored value is marked too, preserving the tri-color invariant
    /// across mutations during a trace.
    pub fn array_set(&mut self, r: ValueRef, row: usize, col: usize, value: ValueRef) {
        let idx = r.index();
        let in_bounds = match &self.pool.slots[idx] {
            Value::Array(arr) => arr.in_bounds(row, col),
            _ => false,
        };
        if !in_bounds {
            return;
        }
        if self.pool.flags[idx] & FLAG_MARK != 0 {
            self.mark_value(value);
        }
        if let Value::Array(arr) = &mut self.pool.slots[idx] {
            arr.set(row, col, value);
        }
    }

    pub fn array_rows(&self, r: ValueRef) -> usize {
        match self.pool.value(r) {
            Value::Array(arr) => arr.rows(),
            _ => 0,
        }
    }

    pub fn array_cols(&self, r: ValueRef) -> usize {
        match self.pool.value(r) {
            Value::Array(arr) => arr.cols(),
            _ => 0,
        }
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            generation_counts: [
                self.generations[0].len(),
                self.generations[1].len(),
                self.generations[2].len(),
                self.generations[3].len(),
            ],
            pool: self.pool.stats(),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
