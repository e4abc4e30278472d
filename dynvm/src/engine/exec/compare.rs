//! Logical and comparison handlers.
//!
//! Logical operands coerce through `as_boolean`; both operands are
//! already on the calculation stack, so there is no short-circuiting at
//! this level. Ordered comparison with a string operand compares by
//! code-unit length.

use super::Engine;
use crate::error::VmError;
use crate::value::ValueKind;

impl Engine {
    pub(super) fn exec_and(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let value = self.heap().as_boolean(a) && self.heap().as_boolean(b);
        let result = self.heap_mut().new_boolean(value);
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_or(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let value = self.heap().as_boolean(a) || self.heap().as_boolean(b);
        let result = self.heap_mut().new_boolean(value);
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_not(&mut self) -> Result<(), VmError> {
        let a = self.calc_pop()?;
        let value = !self.heap().as_boolean(a);
        let result = self.heap_mut().new_boolean(value);
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_eq(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let value = self.heap().vequals(a, b);
        let result = self.heap_mut().new_boolean(value);
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_ne(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let value = !self.heap().vequals(a, b);
        let result = self.heap_mut().new_boolean(value);
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_gt(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let value = self.ordered(a, b, |x, y| x > y, |x, y| x > y);
        let result = self.heap_mut().new_boolean(value);
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_lt(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let value = self.ordered(a, b, |x, y| x < y, |x, y| x < y);
        let result = self.heap_mut().new_boolean(value);
        self.calc_push(result);
        Ok(())
    }

    fn ordered(
        &self,
        a: crate::value::ValueRef,
        b: crate::value::ValueRef,
        by_len: fn(usize, usize) -> bool,
        by_real: fn(f64, f64) -> bool,
    ) -> bool {
        let heap = self.heap();
        if heap.kind(a) == ValueKind::Str || heap.kind(b) == ValueKind::Str {
            by_len(heap.as_units(a).len(), heap.as_units(b).len())
        } else {
            by_real(heap.as_real(a), heap.as_real(b))
        }
    }
}
