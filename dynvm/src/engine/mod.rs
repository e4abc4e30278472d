//! The execution engine.
//!
//! [`Engine`] owns the instruction array, the constant pool, the three
//! stack structures (calculation stack, per-frame data stacks, call
//! stack), the global variable table, the host-call registry, and the
//! heap. `run()` is a fetch loop: the instruction pointer is advanced
//! before dispatch, so control-flow handlers assign the target index
//! directly. After every instruction the GC trigger is polled.

mod exec;

use std::collections::HashMap;
use std::io::Read;
use std::rc::Rc;

use crate::error::VmError;
use crate::heap::{Heap, Roots};
use crate::image::{self, Const, Program};
use crate::instr::Instr;
use crate::value::ValueRef;

pub type HostResult = Result<ValueRef, VmError>;

/// A registered host function. Hosts receive the engine (for heap access
/// and globals) and the argument handles, first argument the last value
/// pushed before the call.
pub type HostCall = Rc<dyn Fn(&mut Engine, &[ValueRef]) -> HostResult>;

/// One call-stack entry: where to resume and the caller's data stack.
#[derive(Debug)]
pub struct CallFrame {
    return_ip: usize,
    data_stack: Vec<ValueRef>,
}

pub struct Engine {
    host_calls: Vec<HostCall>,
    constants: Vec<ValueRef>,
    code: Vec<Instr>,
    ip: usize,
    call_parameters: Vec<ValueRef>,
    call_stack: Vec<CallFrame>,
    calc_stack: Vec<ValueRef>,
    data_stack: Vec<ValueRef>,
    globals: HashMap<String, ValueRef>,
    heap: Heap,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            host_calls: Vec::new(),
            constants: Vec::new(),
            code: Vec::new(),
            ip: 0,
            call_parameters: Vec::with_capacity(1024),
            call_stack: Vec::new(),
            calc_stack: Vec::new(),
            data_stack: Vec::new(),
            globals: HashMap::new(),
            heap: Heap::new(),
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Register a host function, returning its index. Indices ascend from
    /// zero in registration order and are part of the compiled-program
    /// ABI.
    pub fn append_host_call(&mut self, call: HostCall) -> usize {
        self.host_calls.push(call);
        self.host_calls.len() - 1
    }

    pub fn set_global_variable(&mut self, name: &str, value: ValueRef) {
        self.globals.insert(name.to_string(), value);
    }

    /// Read a global; missing names read as the `false` singleton.
    pub fn global_variable(&self, name: &str) -> ValueRef {
        self.globals
            .get(name)
            .copied()
            .unwrap_or_else(|| self.heap.false_ref())
    }

    /// Parse a program image from a byte stream positioned at its start
    /// and install it, replacing any previous program.
    pub fn load_program(&mut self, reader: &mut impl Read) -> Result<(), VmError> {
        let program = image::read_program(reader)?;
        self.load_image(program);
        Ok(())
    }

    /// Install an already-parsed program image.
    pub fn load_image(&mut self, program: Program) {
        self.clear_program();
        self.constants = program
            .constants
            .iter()
            .map(|constant| intern_const(&mut self.heap, constant))
            .collect();
        self.code = program.code;
    }

    /// Drop the loaded program: constants go back to the pool, stacks and
    /// globals are emptied, and the heap is torn down.
    ///
    /// Only the top-level constants are freed here: elements of constant
    /// arrays may have been swapped for collector-tracked values at
    /// runtime, and those are reclaimed by the heap teardown instead.
    /// Untouched nested constant elements stay in the slab until the heap
    /// itself drops.
    pub fn clear_program(&mut self) {
        let constants = std::mem::take(&mut self.constants);
        for r in constants {
            self.heap.free_constant(r);
        }
        self.code.clear();
        self.ip = 0;
        self.call_stack.clear();
        self.calc_stack.clear();
        self.data_stack.clear();
        self.call_parameters.clear();
        self.globals.clear();
        self.heap.clean();
    }

    /// Execute the loaded program to completion. Returns the top of the
    /// calculation stack coerced to real and truncated.
    pub fn run(&mut self) -> Result<i64, VmError> {
        let end = self.code.len();
        self.ip = 0;
        // Sentinel frame: RET from the outermost level lands on `end`,
        // terminating the loop.
        self.call_stack.push(CallFrame {
            return_ip: end,
            data_stack: Vec::new(),
        });
        self.heap.start();
        while self.ip < end {
            let instr = self.code[self.ip];
            self.ip += 1;

            #[cfg(debug_assertions)]
            if std::env::var("DYNVM_TRACE").is_ok() {
                eprintln!("vm: ip={}, instr={:?}", self.ip - 1, instr);
            }

            self.step(instr)?;
            self.maybe_collect();
        }
        let top = self.calc_pop()?;
        Ok(self.heap.as_real(top) as i64)
    }

    pub(crate) fn calc_push(&mut self, value: ValueRef) {
        self.calc_stack.push(value);
    }

    pub(crate) fn calc_pop(&mut self) -> Result<ValueRef, VmError> {
        self.calc_stack.pop().ok_or(VmError::StackUnderflow)
    }

    pub(crate) fn data_get(&self, slot: usize) -> Result<ValueRef, VmError> {
        self.data_stack
            .get(slot)
            .copied()
            .ok_or(VmError::DataIndexOutOfBounds(slot))
    }

    pub(crate) fn data_put(&mut self, slot: usize, value: ValueRef) -> Result<(), VmError> {
        match self.data_stack.get_mut(slot) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(VmError::DataIndexOutOfBounds(slot)),
        }
    }

    pub(crate) fn constant(&self, index: usize) -> Result<ValueRef, VmError> {
        self.constants
            .get(index)
            .copied()
            .ok_or(VmError::ConstantOutOfBounds(index))
    }

    pub(crate) fn set_ip(&mut self, target: usize) {
        self.ip = target;
    }

    pub(crate) fn push_frame(&mut self, target: usize) {
        self.call_stack.push(CallFrame {
            return_ip: self.ip,
            data_stack: std::mem::take(&mut self.data_stack),
        });
        self.ip = target;
    }

    pub(crate) fn pop_frame(&mut self) -> Result<(), VmError> {
        let frame = self.call_stack.pop().ok_or(VmError::CallStackUnderflow)?;
        self.ip = frame.return_ip;
        self.data_stack = frame.data_stack;
        Ok(())
    }

    pub(crate) fn alloc_data_stack(&mut self, size: usize) {
        self.data_stack = vec![self.heap.false_ref(); size];
    }

    pub(crate) fn host_call(&self, index: usize) -> Result<HostCall, VmError> {
        self.host_calls
            .get(index)
            .cloned()
            .ok_or(VmError::HostIndexOutOfBounds(index))
    }

    pub(crate) fn capture_call_parameters(
        &mut self,
        argc: usize,
    ) -> Result<Vec<ValueRef>, VmError> {
        self.call_parameters.clear();
        for _ in 0..argc {
            let value = self.calc_pop()?;
            self.call_parameters.push(value);
        }
        // The scratch buffer stays populated (and rooted) for the duration
        // of the host call; the callee gets its own copy of the handles.
        Ok(self.call_parameters.clone())
    }

    pub(crate) fn release_call_parameters(&mut self) {
        self.call_parameters.clear();
    }

    /// Poll the collection trigger and collect with the engine's full
    /// root set.
    fn maybe_collect(&mut self) {
        if !self.heap.needs_collect() {
            return;
        }
        let mut data_stacks: Vec<&[ValueRef]> = Vec::with_capacity(self.call_stack.len() + 1);
        for frame in &self.call_stack {
            data_stacks.push(&frame.data_stack);
        }
        data_stacks.push(&self.data_stack);
        let roots = Roots {
            calc_stack: &self.calc_stack,
            data_stacks,
            call_parameters: &self.call_parameters,
            globals: &self.globals,
        };
        self.heap.collect(&roots);
    }

    /// Calculation-stack height, for invariant checks in embedders and
    /// tests.
    pub fn calc_depth(&self) -> usize {
        self.calc_stack.len()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.clear_program();
    }
}

/// Intern an image constant as an engine-owned, GC-exempt value.
fn intern_const(heap: &mut Heap, constant: &Const) -> ValueRef {
    match constant {
        Const::Integer(v) => heap.constant_integer(*v),
        Const::Real(v) => heap.constant_real(*v),
        Const::Str(s) => heap.constant_string(s),
        Const::Boolean(v) => heap.boolean(*v),
        Const::Array { rows, cols, cells } => {
            let (rows, cols) = (*rows as usize, *cols as usize);
            let array = heap.constant_array(rows, cols);
            let mut cell = cells.iter();
            for row in 0..rows {
                for col in 0..cols {
                    if let Some(element) = cell.next() {
                        let element = intern_const(heap, element);
                        heap.array_set(array, row, col, element);
                    }
                }
            }
            array
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Program;
    use crate::value::Value;

    fn engine_with(constants: Vec<Const>, code: Vec<Instr>) -> Engine {
        let mut engine = Engine::new();
        engine.load_image(Program { constants, code });
        engine
    }

    #[test]
    fn test_add_integers() {
        // LC 5, LC 3, ADD => 8
        let mut engine = engine_with(
            vec![Const::Integer(5), Const::Integer(3)],
            vec![Instr::LoadConst(0), Instr::LoadConst(1), Instr::Add],
        );
        assert_eq!(engine.run().unwrap(), 8);
    }

    #[test]
    fn test_globals_default_to_false() {
        let engine = Engine::new();
        assert_eq!(engine.global_variable("missing"), engine.heap().false_ref());
    }

    #[test]
    fn test_set_and_get_global() {
        let mut engine = Engine::new();
        let v = engine.heap_mut().new_integer(9);
        engine.set_global_variable("nine", v);
        assert_eq!(engine.global_variable("nine"), v);
    }

    #[test]
    fn test_constant_interning() {
        let engine = engine_with(
            vec![
                Const::Str("hi".to_string()),
                Const::Array {
                    rows: 1,
                    cols: 2,
                    cells: vec![Const::Integer(1), Const::Boolean(true)],
                },
            ],
            vec![],
        );
        let s = engine.constant(0).unwrap();
        assert!(matches!(engine.heap().value(s), Value::Str(_)));
        let arr = engine.constant(1).unwrap();
        assert_eq!(engine.heap().array_rows(arr), 1);
        let first = engine.heap().array_get(arr, 0, 0);
        assert!(matches!(engine.heap().value(first), Value::Integer(1)));
        assert_eq!(engine.heap().array_get(arr, 0, 1), ValueRef::TRUE);
    }

    #[test]
    fn test_empty_program_reports_underflow() {
        let mut engine = engine_with(vec![], vec![]);
        assert_eq!(engine.run().unwrap_err(), VmError::StackUnderflow);
    }

    #[test]
    fn test_constant_index_out_of_bounds() {
        let mut engine = engine_with(vec![], vec![Instr::LoadConst(3)]);
        assert_eq!(
            engine.run().unwrap_err(),
            VmError::ConstantOutOfBounds(3)
        );
    }

    #[test]
    fn test_clear_program_resets_engine() {
        let mut engine = engine_with(
            vec![Const::Integer(1)],
            vec![Instr::LoadConst(0)],
        );
        let v = engine.heap_mut().new_integer(5);
        engine.set_global_variable("g", v);
        engine.clear_program();
        assert_eq!(engine.constants.len(), 0);
        assert_eq!(engine.code.len(), 0);
        assert_eq!(engine.global_variable("g"), ValueRef::FALSE);
    }

    #[test]
    fn test_host_call_dispatch_and_arg_order() {
        // Arguments arrive reversed: argv[0] is the last value pushed.
        let mut engine = engine_with(
            vec![Const::Integer(10), Const::Integer(20)],
            vec![
                Instr::LoadConst(0),
                Instr::LoadConst(1),
                Instr::CallHost { argc: 2, index: 0 },
            ],
        );
        engine.append_host_call(Rc::new(|engine: &mut Engine, argv: &[ValueRef]| {
            let first = engine.heap().as_integer(argv[0]);
            let second = engine.heap().as_integer(argv[1]);
            Ok(engine.heap_mut().new_integer(first * 100 + second))
        }));
        // argv[0] = 20 (top of stack), argv[1] = 10.
        assert_eq!(engine.run().unwrap(), 2010);
    }

    #[test]
    fn test_host_index_out_of_bounds() {
        let mut engine = engine_with(
            vec![],
            vec![Instr::CallHost { argc: 0, index: 5 }],
        );
        let err = engine.run().unwrap_err();
        assert_eq!(err, VmError::HostIndexOutOfBounds(5));
        assert_eq!(err.code(), 20001);
    }
}
