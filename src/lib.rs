// Assembling
pub mod symbol;
pub mod expr;
pub mod air;
pub use air::Air;
pub mod parser;
pub use parser::{assemble, assemble_lines, AsmParser};
pub mod encode;
pub mod error;
pub use error::{AsmError, AsmErrorKind};

// Disassembling
pub mod opcode;
pub mod disasm;
pub use disasm::disassemble;

// Running
pub mod device;
pub mod breakpoint;
pub mod runtime;
pub use runtime::{Cpu, Stop};
#[macro_use]
pub mod output;
pub mod debugger;
pub use debugger::{Debugger, DebuggerOptions};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
