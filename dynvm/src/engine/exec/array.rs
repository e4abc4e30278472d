//! Array handlers.
//!
//! Shapes come off the stack through the real coercion and truncate to
//! sizes; negative values clamp to zero. Out-of-range reads produce the
//! `false` singleton and out-of-range writes are dropped, per the value
//! model's bounds rules.

use super::Engine;
use crate::error::VmError;

impl Engine {
    pub(super) fn exec_array_make(&mut self) -> Result<(), VmError> {
        let fill = self.calc_pop()?;
        let cols = self.calc_pop()?;
        let rows = self.calc_pop()?;
        let heap = self.heap_mut();
        let rows = heap.as_real(rows) as usize;
        let cols = heap.as_real(cols) as usize;
        let array = heap.new_array(rows, cols, Some(fill));
        self.calc_push(array);
        Ok(())
    }

    pub(super) fn exec_array_read(&mut self, slot: usize) -> Result<(), VmError> {
        let col = self.calc_pop()?;
        let row = self.calc_pop()?;
        let array = self.data_get(slot)?;
        let heap = self.heap();
        let row = heap.as_real(row) as usize;
        let col = heap.as_real(col) as usize;
        let element = heap.array_get(array, row, col);
        self.calc_push(element);
        Ok(())
    }

    pub(super) fn exec_array_write(&mut self, slot: usize) -> Result<(), VmError> {
        let value = self.calc_pop()?;
        let col = self.calc_pop()?;
        let row = self.calc_pop()?;
        let array = self.data_get(slot)?;
        let heap = self.heap_mut();
        let row = heap.as_real(row) as usize;
        let col = heap.as_real(col) as usize;
        heap.array_set(array, row, col, value);
        Ok(())
    }
}
