use std::fmt;

/// Failure modes the core can surface. Each variant maps to a distinct bit in
/// the process exit status so that teardown can OR several failures together
/// instead of short-circuiting on the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `step` decoded a byte with no entry in the instruction table.
    UnimplementedOpcode(u8),
    /// A cartridge declared a mapper number the core does not implement.
    UnimplementedMapper(u16),
    /// A cartridge image failed basic shape checks (bank sizes, length).
    BadCartridgeImage,
    /// A presentation backend failed to initialize and was not registered.
    BackendInitFailed,
}

impl Error {
    /// Single-bit exit code identifying this failure, suitable for
    /// bitwise-OR accumulation across teardown paths.
    pub const fn exit_bit(self) -> u32 {
        match self {
            Self::UnimplementedOpcode(_) => 0b0001,
            Self::UnimplementedMapper(_) => 0b0010,
            Self::BadCartridgeImage => 0b0100,
            Self::BackendInitFailed => 0b1000,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnimplementedOpcode(opcode) => {
                write!(f, "opcode {opcode:#04X} has no instruction table entry")
            }
            Self::UnimplementedMapper(mapper) => {
                write!(f, "mapper {mapper} is not implemented")
            }
            Self::BadCartridgeImage => write!(f, "cartridge image failed validation"),
            Self::BackendInitFailed => write!(f, "backend failed to initialize"),
        }
    }
}

impl std::error::Error for Error {}
