use std::{error::Error, fmt};

use super::command::CommandName;

/// Error parsing a command line.
#[derive(Debug, PartialEq)]
pub enum CommandError {
    Unknown {
        command_name: String,
    },
    InvalidArgument {
        command_name: CommandName,
        error: ArgumentError,
    },
}

/// Error parsing the operands of a known command.
#[derive(Debug, PartialEq)]
pub enum ArgumentError {
    /// Missing or unexpected operands, with the expected usage.
    Missing { usage: &'static str },
    /// Memory range is reversed or outside of memory.
    InvalidIndices,
    InvalidValue {
        argument_name: &'static str,
        error: ValueError,
    },
}

/// Error parsing a single operand value.
#[derive(Debug, PartialEq)]
pub enum ValueError {
    /// Not a number or expression.
    Malformed,
    Negative,
    OutOfRange { max: u32 },
    UnknownRegister,
    OddAddress,
}

impl Error for CommandError {}
impl Error for ArgumentError {}
impl Error for ValueError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { .. } => write!(f, "Unknown command"),
            Self::InvalidArgument { error, .. } => write!(f, "{}", error),
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { usage } => write!(f, "Expected value: {}", usage),
            Self::InvalidIndices => write!(f, "Error: Invalid indices"),
            Self::InvalidValue {
                argument_name,
                error: ValueError::Malformed,
            } => write!(f, "Error: Invalid number <{}>", argument_name),
            Self::InvalidValue { error, .. } => write!(f, "Error: {}", error),
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "Invalid number"),
            Self::Negative => write!(f, "Value must be a number >= 0"),
            Self::OutOfRange { max } => write!(f, "Value must be in range [0, 0x{:X}]", max),
            Self::UnknownRegister => write!(f, "Unrecognized register"),
            Self::OddAddress => write!(f, "Program counter must be even"),
        }
    }
}
