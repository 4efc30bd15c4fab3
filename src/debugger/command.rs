use std::fmt;

use super::error::{ArgumentError, CommandError, ValueError};
use crate::expr;
use crate::runtime::MEMORY_SIZE;

#[derive(Debug, PartialEq)]
pub enum Command {
    Run,
    Stop,
    Step,
    /// Enable or disable all breakpoints, or list them.
    Breakpoints { enable: Option<bool> },
    /// Toggle each address.
    Breakpoint { addresses: Vec<u16> },
    Registers,
    Set { register: Register, value: u16 },
    /// Inclusive byte range.
    Mem { start: usize, end: usize },
    Stack,
    Disassemble { count: usize },
    Reset,
    Screen,
    Key { key: u8, down: bool },
    Help,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandName {
    Run,
    Stop,
    Step,
    Breakpoints,
    Breakpoint,
    Registers,
    Set,
    Mem,
    Stack,
    Disassemble,
    Reset,
    Screen,
    Key,
    Help,
    Quit,
}

/// Register which may be changed with `set`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Register {
    V(u8),
    I,
    Dt,
    St,
    Pc,
    Sp,
}

impl CommandName {
    fn parse(name: &str) -> Option<Self> {
        let name = match name.to_ascii_lowercase().as_str() {
            "run" => Self::Run,
            "stop" | "pause" => Self::Stop,
            "step" => Self::Step,
            "breakpoints" => Self::Breakpoints,
            "breakpoint" => Self::Breakpoint,
            "registers" => Self::Registers,
            "set" => Self::Set,
            "mem" => Self::Mem,
            "stack" => Self::Stack,
            "disassemble" => Self::Disassemble,
            "reset" => Self::Reset,
            "screen" => Self::Screen,
            "key" => Self::Key,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Stop => write!(f, "stop"),
            Self::Step => write!(f, "step"),
            Self::Breakpoints => write!(f, "breakpoints"),
            Self::Breakpoint => write!(f, "breakpoint"),
            Self::Registers => write!(f, "registers"),
            Self::Set => write!(f, "set"),
            Self::Mem => write!(f, "mem"),
            Self::Stack => write!(f, "stack"),
            Self::Disassemble => write!(f, "disassemble"),
            Self::Reset => write!(f, "reset"),
            Self::Screen => write!(f, "screen"),
            Self::Key => write!(f, "key"),
            Self::Help => write!(f, "help"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

impl Register {
    fn parse(name: &str) -> Option<Self> {
        let name = name.to_ascii_uppercase();
        let register = match name.as_str() {
            "I" => Self::I,
            "DT" => Self::Dt,
            "ST" => Self::St,
            "PC" => Self::Pc,
            "SP" => Self::Sp,
            _ => {
                let index = name.strip_prefix('V')?;
                if index.len() != 1 {
                    return None;
                }
                Self::V(u8::from_str_radix(index, 16).ok()?)
            }
        };
        Some(register)
    }

    /// Largest value the register holds.
    pub fn max(self) -> u32 {
        match self {
            Self::V(_) | Self::Dt | Self::St => 0xFF,
            Self::I | Self::Pc => 0xFFFF,
            Self::Sp => 0xF,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V(index) => write!(f, "V{:X}", index),
            Self::I => write!(f, "I register"),
            Self::Dt => write!(f, "DT register"),
            Self::St => write!(f, "ST register"),
            Self::Pc => write!(f, "program counter"),
            Self::Sp => write!(f, "stack pointer"),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let command_name = CommandName::parse(name).ok_or_else(|| CommandError::Unknown {
            command_name: name.to_string(),
        })?;

        // Operands may be separated by commas as well as whitespace
        let operands: Vec<&str> = words
            .flat_map(|word| word.split(','))
            .filter(|operand| !operand.is_empty())
            .collect();

        Command::parse_arguments(command_name, &operands).map_err(|error| {
            CommandError::InvalidArgument {
                command_name,
                error,
            }
        })
    }
}

impl Command {
    fn parse_arguments(name: CommandName, operands: &[&str]) -> Result<Self, ArgumentError> {
        let command = match name {
            CommandName::Run => Self::Run,
            CommandName::Stop => Self::Stop,
            CommandName::Step => Self::Step,
            CommandName::Registers => Self::Registers,
            CommandName::Stack => Self::Stack,
            CommandName::Reset => Self::Reset,
            CommandName::Screen => Self::Screen,
            CommandName::Help => Self::Help,
            CommandName::Quit => Self::Quit,

            CommandName::Breakpoints => {
                let enable = match operands.first() {
                    None => None,
                    Some(word) if word.eq_ignore_ascii_case("on") => Some(true),
                    Some(word) if word.eq_ignore_ascii_case("off") => Some(false),
                    Some(_) => return Err(ArgumentError::Missing { usage: "[on|off]" }),
                };
                Self::Breakpoints { enable }
            }
            CommandName::Breakpoint => {
                if operands.is_empty() {
                    return Err(ArgumentError::Missing { usage: "<address>" });
                }
                let addresses = operands
                    .iter()
                    .map(|operand| {
                        let value = parse_unsigned(operand, "address")?;
                        u16::try_from(value).map_err(|_| ArgumentError::InvalidValue {
                            argument_name: "address",
                            error: ValueError::OutOfRange { max: 0xFFFF },
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::Breakpoint { addresses }
            }

            CommandName::Set => {
                let [register, value] = operands else {
                    return Err(ArgumentError::Missing {
                        usage: "<register> <value>",
                    });
                };
                let value = parse_unsigned(value, "value")?;
                let register = Register::parse(register).ok_or(ArgumentError::InvalidValue {
                    argument_name: "register",
                    error: ValueError::UnknownRegister,
                })?;
                if value > register.max() as u64 {
                    return Err(ArgumentError::InvalidValue {
                        argument_name: "value",
                        error: ValueError::OutOfRange {
                            max: register.max(),
                        },
                    });
                }
                if register == Register::Pc && value % 2 != 0 {
                    return Err(ArgumentError::InvalidValue {
                        argument_name: "value",
                        error: ValueError::OddAddress,
                    });
                }
                Self::Set {
                    register,
                    value: value as u16,
                }
            }

            CommandName::Mem => {
                let [start, end] = operands else {
                    return Err(ArgumentError::Missing {
                        usage: "<start> <end>",
                    });
                };
                let (Some(start), Some(end)) = (expr::eval(start), expr::eval(end)) else {
                    return Err(ArgumentError::InvalidIndices);
                };
                let in_memory = |index: i64| (0..MEMORY_SIZE as i64).contains(&index);
                if !in_memory(start) || !in_memory(end) || end < start {
                    return Err(ArgumentError::InvalidIndices);
                }
                Self::Mem {
                    start: start as usize,
                    end: end as usize,
                }
            }

            CommandName::Disassemble => {
                let count = match operands.first() {
                    Some(operand) => parse_unsigned(operand, "n")? as usize,
                    None => 1,
                };
                Self::Disassemble { count }
            }

            CommandName::Key => {
                let usage = "<key> [up|down]";
                let (key, down) = match operands {
                    [key] => (key, true),
                    [key, state] if state.eq_ignore_ascii_case("down") => (key, true),
                    [key, state] if state.eq_ignore_ascii_case("up") => (key, false),
                    _ => return Err(ArgumentError::Missing { usage }),
                };
                let key = parse_unsigned(key, "key")?;
                if key > 0xF {
                    return Err(ArgumentError::InvalidValue {
                        argument_name: "key",
                        error: ValueError::OutOfRange { max: 0xF },
                    });
                }
                Self::Key {
                    key: key as u8,
                    down,
                }
            }
        };
        Ok(command)
    }
}

/// Evaluate an operand which must not be negative.
fn parse_unsigned(operand: &str, argument_name: &'static str) -> Result<u64, ArgumentError> {
    let value = expr::eval(operand).ok_or(ArgumentError::InvalidValue {
        argument_name,
        error: ValueError::Malformed,
    })?;
    u64::try_from(value).map_err(|_| ArgumentError::InvalidValue {
        argument_name,
        error: ValueError::Negative,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, String> {
        Command::try_from(line).map_err(|error| error.to_string())
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse("run"), Ok(Command::Run));
        assert_eq!(parse("RUN"), Ok(Command::Run));
        assert_eq!(parse("pause"), Ok(Command::Stop));
        assert_eq!(parse("  step  "), Ok(Command::Step));
        assert_eq!(parse("exit"), Ok(Command::Quit));
        assert_eq!(parse("jump 0x200"), Err("Unknown command".to_string()));
    }

    #[test]
    fn breakpoints() {
        assert_eq!(parse("breakpoints"), Ok(Command::Breakpoints { enable: None }));
        assert_eq!(
            parse("breakpoints ON"),
            Ok(Command::Breakpoints { enable: Some(true) })
        );
        assert_eq!(parse("breakpoints maybe"), Err("Expected value: [on|off]".to_string()));
        assert_eq!(
            parse("breakpoint 0x200, 0x204 520"),
            Ok(Command::Breakpoint {
                addresses: vec![0x200, 0x204, 0x208]
            })
        );
        assert_eq!(parse("breakpoint"), Err("Expected value: <address>".to_string()));
        assert_eq!(
            parse("breakpoint here"),
            Err("Error: Invalid number <address>".to_string())
        );
    }

    #[test]
    fn set() {
        assert_eq!(
            parse("set va 0xFF"),
            Ok(Command::Set {
                register: Register::V(0xA),
                value: 0xFF
            })
        );
        assert_eq!(
            parse("set sp 3"),
            Ok(Command::Set {
                register: Register::Sp,
                value: 3
            })
        );
        assert_eq!(
            parse("set v1 0x100"),
            Err("Error: Value must be in range [0, 0xFF]".to_string())
        );
        assert_eq!(
            parse("set sp 16"),
            Err("Error: Value must be in range [0, 0xF]".to_string())
        );
        assert_eq!(parse("set vg 1"), Err("Error: Unrecognized register".to_string()));
        assert_eq!(parse("set v10 1"), Err("Error: Unrecognized register".to_string()));
        assert_eq!(
            parse("set v1 -1"),
            Err("Error: Value must be a number >= 0".to_string())
        );
        assert_eq!(
            parse("set pc 0x201"),
            Err("Error: Program counter must be even".to_string())
        );
        assert_eq!(parse("set v1"), Err("Expected value: <register> <value>".to_string()));
    }

    #[test]
    fn mem() {
        assert_eq!(
            parse("mem 0x200 0x21F"),
            Ok(Command::Mem {
                start: 0x200,
                end: 0x21F
            })
        );
        assert_eq!(parse("mem 0x200 0x1000"), Err("Error: Invalid indices".to_string()));
        assert_eq!(parse("mem 0x210 0x200"), Err("Error: Invalid indices".to_string()));
        assert_eq!(parse("mem a b"), Err("Error: Invalid indices".to_string()));
        assert_eq!(parse("mem 0x200"), Err("Expected value: <start> <end>".to_string()));
    }

    #[test]
    fn disassemble_and_key() {
        assert_eq!(parse("disassemble"), Ok(Command::Disassemble { count: 1 }));
        assert_eq!(parse("disassemble 4"), Ok(Command::Disassemble { count: 4 }));
        assert_eq!(parse("disassemble x"), Err("Error: Invalid number <n>".to_string()));
        assert_eq!(parse("key 0xA"), Ok(Command::Key { key: 0xA, down: true }));
        assert_eq!(parse("key 3 up"), Ok(Command::Key { key: 3, down: false }));
        assert_eq!(
            parse("key 16"),
            Err("Error: Value must be in range [0, 0xF]".to_string())
        );
        assert_eq!(parse("key 1 sideways"), Err("Expected value: <key> [up|down]".to_string()));
    }
}
