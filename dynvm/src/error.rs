//! Typed VM failures.
//!
//! Every failure carries a stable numeric code alongside its message: the
//! 10xxx family is raised while parsing a program image, the 20xxx family
//! during execution. Image codes match the format the compiler emits
//! against, so they are part of the external contract.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// The 16-byte image magic did not match.
    #[error("File is not in the correct format.")]
    InvalidMagic,

    /// A constant record used an unknown or malformed type tag.
    #[error("Data type is not supported.")]
    UnsupportedValueTag(u8),

    /// An instruction record used an unknown opcode.
    #[error("Unrecognized instruction.")]
    UnknownOpcode(u16),

    /// The image ended before the declared records were read.
    #[error("Unexpected end of program image.")]
    TruncatedImage,

    /// CALLSYS named a host-function index past the registered range.
    #[error("Function index out of bounds.")]
    HostIndexOutOfBounds(usize),

    /// A pop was issued against an empty calculation stack.
    #[error("Calculation stack underflow.")]
    StackUnderflow,

    /// RET was issued with no frame to return to.
    #[error("Call stack underflow.")]
    CallStackUnderflow,

    /// LC named a constant index past the constant pool.
    #[error("Constant index {0} out of bounds.")]
    ConstantOutOfBounds(usize),

    /// LD/SD or an array opcode named a data-stack slot that was never
    /// allocated.
    #[error("Data stack index {0} out of bounds.")]
    DataIndexOutOfBounds(usize),

    /// A host function reported a failure of its own.
    #[error("Host call failed: {0}")]
    HostFailure(String),
}

impl VmError {
    /// The stable numeric code reported to embedders (and used as the
    /// process exit code by the loader).
    pub fn code(&self) -> i32 {
        match self {
            VmError::InvalidMagic | VmError::TruncatedImage => 10001,
            VmError::UnsupportedValueTag(_) => 10002,
            VmError::UnknownOpcode(_) => 10003,
            VmError::HostIndexOutOfBounds(_) => 20001,
            VmError::StackUnderflow | VmError::CallStackUnderflow => 20002,
            VmError::ConstantOutOfBounds(_) => 20003,
            VmError::DataIndexOutOfBounds(_) => 20004,
            VmError::HostFailure(_) => 20005,
        }
    }

    /// Attach a source file (and optionally a line) for reporting.
    pub fn with_file(self, file: impl Into<String>) -> SourcedVmError {
        SourcedVmError {
            error: self,
            file: Some(file.into()),
            line: None,
        }
    }
}

/// A [`VmError`] plus the optional (filename, line) context the reporting
/// boundary may know about. Produced where errors leave the VM; the inner
/// error stays available for matching and for its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedVmError {
    pub error: VmError,
    pub file: Option<String>,
    pub line: Option<u64>,
}

impl SourcedVmError {
    pub fn code(&self) -> i32 {
        self.error.code()
    }
}

impl From<VmError> for SourcedVmError {
    fn from(error: VmError) -> Self {
        SourcedVmError {
            error,
            file: None,
            line: None,
        }
    }
}

impl std::fmt::Display for SourcedVmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} ({}:{})", self.error, file, line),
            (Some(file), None) => write!(f, "{} ({})", self.error, file),
            _ => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for SourcedVmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
