//! Shared helpers for the integration suites.

// Not every suite uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use dynvm::{image, Engine, Program, ValueRef};

/// Serialize a program to image bytes.
pub fn build_image(program: &Program) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::write_program(&mut bytes, program).expect("writing to a Vec cannot fail");
    bytes
}

/// Load a program into a fresh engine by way of its binary image, so every
/// test also exercises the loader.
pub fn engine_loaded(program: &Program) -> Engine {
    let mut engine = Engine::new();
    engine
        .load_program(&mut Cursor::new(build_image(program)))
        .expect("image should load");
    engine
}

/// Register a host call that records the display form of every argument it
/// receives and returns `false`. Returns the recording buffer.
pub fn install_capture_host(engine: &mut Engine) -> Rc<RefCell<Vec<String>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    engine.append_host_call(Rc::new(move |engine: &mut Engine, argv: &[ValueRef]| {
        for &arg in argv {
            sink.borrow_mut().push(engine.heap().as_display(arg));
        }
        Ok(engine.heap().false_ref())
    }));
    seen
}
