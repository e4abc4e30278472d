//! A stack-based bytecode virtual machine for a small dynamically typed
//! language.
//!
//! Programs arrive as binary images (a constant pool plus a flat
//! instruction array) produced by a separate compiler. The engine
//! executes them over a tagged value model — integers, reals, UTF-16
//! strings, shared boolean singletons, and fixed-shape 2D arrays — backed
//! by a size-class pooled allocator and a four-generation mark-sweep
//! garbage collector. Hosts extend the machine by registering native
//! functions that bytecode invokes by index.
//!
//! ```no_run
//! use std::fs::File;
//! use dynvm::Engine;
//!
//! let mut engine = Engine::new();
//! let mut image = File::open("program.img")?;
//! engine.load_program(&mut image)?;
//! let _exit_code = engine.run()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Prevent accidental debug output in library code; binaries report errors
// themselves.
#![deny(clippy::print_stdout)]

pub mod convert;
pub mod engine;
pub mod error;
pub mod heap;
pub mod image;
pub mod instr;
pub mod value;
pub mod wide;

pub use engine::{Engine, HostCall, HostResult};
pub use error::{SourcedVmError, VmError};
pub use heap::{Heap, HeapStats, Roots};
pub use image::{Const, Program, MAGIC};
pub use instr::Instr;
pub use value::{ArrayValue, Value, ValueKind, ValueRef};
