//! Call, frame, and data-stack handlers.
//!
//! CALL saves the resume point and the caller's data stack in a frame;
//! the callee is expected to begin with ALLOCDSTK, which installs its own
//! freshly sized data stack. RET restores both and drops the callee's
//! stack. Host calls capture their arguments into the rooted scratch
//! buffer before handing control to the host.

use super::Engine;
use crate::error::VmError;

impl Engine {
    pub(super) fn exec_alloc_data(&mut self, size: usize) -> Result<(), VmError> {
        self.alloc_data_stack(size);
        Ok(())
    }

    pub(super) fn exec_load_data(&mut self, slot: usize) -> Result<(), VmError> {
        let value = self.data_get(slot)?;
        self.calc_push(value);
        Ok(())
    }

    pub(super) fn exec_store_data(&mut self, slot: usize) -> Result<(), VmError> {
        let value = self.calc_pop()?;
        self.data_put(slot, value)
    }

    pub(super) fn exec_call(&mut self, target: usize) -> Result<(), VmError> {
        self.push_frame(target);
        Ok(())
    }

    pub(super) fn exec_ret(&mut self) -> Result<(), VmError> {
        self.pop_frame()
    }

    pub(super) fn exec_call_host(&mut self, argc: usize, index: usize) -> Result<(), VmError> {
        let call = self.host_call(index)?;
        let argv = self.capture_call_parameters(argc)?;
        let result = call(self, &argv)?;
        self.release_call_parameters();
        self.calc_push(result);
        Ok(())
    }
}
