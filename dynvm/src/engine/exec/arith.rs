//! Arithmetic handlers.
//!
//! Mixed-type dispatch follows the runtime's coercion rules: a string
//! operand turns ADD into concatenation (and SUB into the trimmed
//! concatenation used for message building); two integers stay in integer
//! arithmetic; everything else widens to real. Integer division and
//! remainder by zero yield 0; real division follows IEEE-754.

use super::Engine;
use crate::error::VmError;
use crate::value::ValueKind;
use crate::wide;

impl Engine {
    pub(super) fn exec_add(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let heap = self.heap_mut();
        let result = match (heap.kind(a), heap.kind(b)) {
            (ValueKind::Str, _) | (_, ValueKind::Str) => {
                let mut units = heap.as_units(a);
                units.extend(heap.as_units(b));
                heap.new_string_units(&units)
            }
            (ValueKind::Integer, ValueKind::Integer) => {
                let sum = heap.as_integer(a).wrapping_add(heap.as_integer(b));
                heap.new_integer(sum)
            }
            _ => {
                let sum = heap.as_real(a) + heap.as_real(b);
                heap.new_real(sum)
            }
        };
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_sub(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let heap = self.heap_mut();
        let result = match (heap.kind(a), heap.kind(b)) {
            // Two strings concatenate as-is.
            (ValueKind::Str, ValueKind::Str) => {
                let mut units = heap.as_units(a);
                units.extend(heap.as_units(b));
                heap.new_string_units(&units)
            }
            (ValueKind::Integer, ValueKind::Integer) => {
                let diff = heap.as_integer(a).wrapping_sub(heap.as_integer(b));
                heap.new_integer(diff)
            }
            // A string against anything else: trim the seam, then join.
            (ValueKind::Str, _) | (_, ValueKind::Str) => {
                let left = heap.as_units(a);
                let right = heap.as_units(b);
                let mut units = wide::trim_end_spaces(&left).to_vec();
                units.extend_from_slice(wide::trim_start_spaces(&right));
                heap.new_string_units(&units)
            }
            _ => {
                let diff = heap.as_real(a) - heap.as_real(b);
                heap.new_real(diff)
            }
        };
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_mul(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let heap = self.heap_mut();
        let result = if heap.kind(a) == ValueKind::Integer && heap.kind(b) == ValueKind::Integer {
            let product = heap.as_integer(a).wrapping_mul(heap.as_integer(b));
            heap.new_integer(product)
        } else {
            let product = heap.as_real(a) * heap.as_real(b);
            heap.new_real(product)
        };
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_div(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let heap = self.heap_mut();
        let result = if heap.kind(a) == ValueKind::Integer && heap.kind(b) == ValueKind::Integer {
            let quotient = heap
                .as_integer(a)
                .checked_div(heap.as_integer(b))
                .unwrap_or(0);
            heap.new_integer(quotient)
        } else {
            let quotient = heap.as_real(a) / heap.as_real(b);
            heap.new_real(quotient)
        };
        self.calc_push(result);
        Ok(())
    }

    pub(super) fn exec_mod(&mut self) -> Result<(), VmError> {
        let b = self.calc_pop()?;
        let a = self.calc_pop()?;
        let heap = self.heap_mut();
        let remainder = heap
            .as_integer(a)
            .checked_rem(heap.as_integer(b))
            .unwrap_or(0);
        let result = heap.new_integer(remainder);
        self.calc_push(result);
        Ok(())
    }
}
