//! Control-flow handlers.
//!
//! Targets are zero-based instruction indices; the fetch loop has already
//! advanced the instruction pointer, so a taken jump just assigns it.

use super::Engine;
use crate::error::VmError;

impl Engine {
    pub(super) fn exec_jump(&mut self, target: usize) -> Result<(), VmError> {
        self.set_ip(target);
        Ok(())
    }

    pub(super) fn exec_jump_if(&mut self, target: usize) -> Result<(), VmError> {
        let condition = self.calc_pop()?;
        if self.heap().as_boolean(condition) {
            self.set_ip(target);
        }
        Ok(())
    }

    pub(super) fn exec_jump_if_not(&mut self, target: usize) -> Result<(), VmError> {
        let condition = self.calc_pop()?;
        if !self.heap().as_boolean(condition) {
            self.set_ip(target);
        }
        Ok(())
    }
}
