mod command;
mod error;
mod source;

use std::time::Duration;

use miette::Result;

pub use self::command::{Command, CommandName, Register};
pub use self::error::{ArgumentError, CommandError, ValueError};
use self::source::{SourceMode, SourceReader};
use crate::breakpoint::Toggle;
use crate::disasm::disassemble;
use crate::dprintln;
use crate::env;
use crate::runtime::{Cpu, Stop, AVAILABLE_RAM, STACK_SIZE};

/// ANSI color of the prompt.
pub const DEBUGGER_COLOR: u8 = 34;

/// Bytes per line of a memory dump.
const MEM_ROW: usize = 16;

const HELP: &[&str] = &[
    "run                     Run the application",
    "stop                    Pause the application",
    "step                    Execute next operation",
    "breakpoints [on|off]    Toggle all breakpoints, or list them",
    "breakpoint <addr>...    Add/remove breakpoints",
    "registers               Display all registers",
    "set <register> <value>  Store value in register",
    "mem <start> <end>       Display memory data",
    "stack                   Display stack data",
    "disassemble [<n>]       Display next n opcodes",
    "reset                   Reload the program",
    "screen                  Display the screen",
    "key <k> [up|down]       Press or release a key",
    "help                    Show this message",
    "quit                    Exit the debugger",
];

/// Leave this as a struct, in case more options are added in the future.
#[derive(Debug, Default)]
pub struct DebuggerOptions {
    pub command: Option<String>,
}

/// Line-oriented command processor driving a [`Cpu`].
pub struct Debugger {
    cpu: Cpu,
    /// Loaded on creation and on `reset`
    image: Vec<u16>,
    should_quit: bool,
}

impl Debugger {
    pub fn new(image: Vec<u16>) -> Result<Self> {
        let mut cpu = Cpu::default();
        cpu.load(&image)?;
        Ok(Self {
            cpu,
            image,
            should_quit: false,
        })
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// Whether a `quit` command was executed.
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Execute a single command line. Every outcome, including errors, is reported as output
    /// lines.
    pub fn execute(&mut self, line: &str) -> Vec<String> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        match Command::try_from(line) {
            Ok(command) => self.execute_command(command),
            Err(error) => vec![error.to_string()],
        }
    }

    fn execute_command(&mut self, command: Command) -> Vec<String> {
        match command {
            Command::Run => {
                if self.cpu.is_running() {
                    return vec!["Application is already running".to_string()];
                }
                // Resuming from a breakpoint executes that instruction first
                if !self.cpu.start() {
                    self.cpu.step();
                    if !self.cpu.start() {
                        return vec![format!("Reached breakpoint at 0x{:03x}", self.cpu.pc())];
                    }
                }
                vec!["Application is running".to_string()]
            }
            Command::Stop => {
                self.cpu.pause();
                vec!["Application stopped".to_string()]
            }
            Command::Step => {
                self.cpu.step();
                vec![format!("Stepping into 0x{:03x}", self.cpu.pc())]
            }

            Command::Breakpoints { enable: Some(true) } => {
                self.cpu.set_breakpoints_enabled(true);
                vec!["Enabling breakpoints".to_string()]
            }
            Command::Breakpoints { enable: Some(false) } => {
                self.cpu.set_breakpoints_enabled(false);
                vec!["Disabling breakpoints".to_string()]
            }
            Command::Breakpoints { enable: None } => {
                let mut lines = vec![self.list_breakpoints()];
                if !self.cpu.breakpoints_enabled() {
                    lines.push("Breakpoints are disabled".to_string());
                }
                lines
            }
            Command::Breakpoint { addresses } => {
                let breakpoints = self.cpu.breakpoints_mut();
                let mut lines: Vec<String> = addresses
                    .into_iter()
                    .map(|address| match breakpoints.toggle(address) {
                        Toggle::Added => format!("Adding breakpoint at 0x{:x}", address),
                        Toggle::Removed => format!("Removing breakpoint at 0x{:x}", address),
                    })
                    .collect();
                if breakpoints.is_empty() {
                    lines.push("No active breakpoints".to_string());
                }
                lines
            }

            Command::Registers => self.registers(),
            Command::Set { register, value } => {
                match register {
                    Register::V(index) => self.cpu.set_v(index as usize, value as u8),
                    Register::I => self.cpu.set_i(value),
                    Register::Dt => self.cpu.set_dt(value as u8),
                    Register::St => self.cpu.set_st(value as u8),
                    Register::Pc => {
                        // Parity is checked while parsing
                        self.cpu.set_pc(value);
                    }
                    Register::Sp => self.cpu.set_sp(value as usize),
                }
                vec![format!("Setting {} to 0x{:x}", register, value)]
            }

            Command::Mem { start, end } => self.memory(start, end),
            Command::Stack => {
                let slots: Vec<String> = self
                    .cpu
                    .stack()
                    .iter()
                    .map(|addr| format!("0x{:03x}", addr))
                    .collect();
                debug_assert_eq!(slots.len(), STACK_SIZE);
                vec![slots.join(" ")]
            }
            Command::Disassemble { count } => self.disassemble(count),

            Command::Reset => {
                self.cpu.reset();
                if let Err(report) = self.cpu.load(&self.image) {
                    return vec![format!("Error: {}", report)];
                }
                vec!["Reset program to initial state".to_string()]
            }
            Command::Screen => self
                .cpu
                .display()
                .to_string()
                .lines()
                .map(String::from)
                .collect(),
            Command::Key { key, down: true } => {
                self.cpu.keypad_mut().press(key);
                vec![format!("Pressing key 0x{:x}", key)]
            }
            Command::Key { key, down: false } => {
                self.cpu.keypad_mut().release(key);
                vec![format!("Releasing key 0x{:x}", key)]
            }

            Command::Help => HELP.iter().map(|line| line.to_string()).collect(),
            Command::Quit => {
                self.should_quit = true;
                Vec::new()
            }
        }
    }

    /// Run until the machine stops or `limit` ticks pass, reporting why it stopped.
    pub fn resume(&mut self, interval: Duration, limit: u64) -> Vec<String> {
        let line = match self.cpu.run(interval, limit) {
            Stop::Paused => return Vec::new(),
            Stop::Breakpoint(addr) => format!("Reached breakpoint at 0x{:03x}", addr),
            Stop::EndOfMemory => "Reached end of memory".to_string(),
            Stop::Limit => format!(
                "Step limit reached, application paused at 0x{:03x}",
                self.cpu.pc()
            ),
        };
        vec![line]
    }

    fn list_breakpoints(&self) -> String {
        let breakpoints = self.cpu.breakpoints();
        if breakpoints.is_empty() {
            return "No active breakpoints".to_string();
        }
        breakpoints
            .iter()
            .map(|addr| format!("0x{:03x}", addr))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Seven rows of three columns: V0..VF followed by I, DT, ST, PC, SP.
    fn registers(&self) -> Vec<String> {
        let cpu = &self.cpu;
        let mut cells: Vec<String> = (0..16)
            .map(|index| format!("V{:X}: 0x{:02x}", index, cpu.v(index)))
            .collect();
        cells.push(format!("I : 0x{:03x}", cpu.i()));
        cells.push(format!("DT: 0x{:02x}", cpu.dt()));
        cells.push(format!("ST: 0x{:02x}", cpu.st()));
        cells.push(format!("PC: 0x{:03x}", cpu.pc()));
        cells.push(format!("SP: 0x{:01x}", cpu.sp()));

        (0..7)
            .map(|row| format!("{}   {}   {}", cells[row], cells[row + 7], cells[row + 14]))
            .collect()
    }

    /// Inclusive range, two groups of eight bytes per line.
    fn memory(&self, start: usize, end: usize) -> Vec<String> {
        let memory = self.cpu.memory();
        let hex = |bytes: &[u8]| {
            bytes
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect::<Vec<_>>()
                .join(" ")
        };
        (start..=end)
            .step_by(MEM_ROW)
            .map(|row| {
                let bytes = &memory[row..=end.min(row + MEM_ROW - 1)];
                let (left, right) = bytes.split_at(bytes.len().min(MEM_ROW / 2));
                if right.is_empty() {
                    format!("0x{:03x}: {}", row, hex(left))
                } else {
                    format!("0x{:03x}: {}  {}", row, hex(left), hex(right))
                }
            })
            .collect()
    }

    /// Next `count` words from the program counter, without executing them.
    fn disassemble(&self, count: usize) -> Vec<String> {
        let start = self.cpu.pc() as usize;
        (0..count)
            .map(|offs| start + offs * 2)
            .take_while(|&addr| addr < AVAILABLE_RAM as usize)
            .map(|addr| {
                let word = self.cpu.fetch(addr as u16);
                format!("0x{:03x}: {}", addr, disassemble(word))
            })
            .collect()
    }
}

/// Read commands from the configured source until EOF or `quit`, printing results.
pub fn run_session(image: Vec<u16>, opts: DebuggerOptions) -> Result<()> {
    let mut debugger = Debugger::new(image)?;
    let mut source = SourceMode::from(opts.command);

    while let Some(line) = source.read() {
        for output in debugger.execute(line) {
            dprintln!(Always, "{}", output);
        }
        if debugger.should_quit() {
            break;
        }
        if debugger.cpu().is_running() {
            for output in debugger.resume(env::tick_interval(), env::run_limit()) {
                dprintln!(Always, "{}", output);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::assemble;

    fn debugger(src: &str) -> Debugger {
        Debugger::new(assemble(src).unwrap()).unwrap()
    }

    #[test]
    fn unknown_and_empty() {
        let mut dbg = debugger("CLS");
        assert_eq!(dbg.execute("frobnicate"), ["Unknown command"]);
        assert!(dbg.execute("   ").is_empty());
    }

    #[test]
    fn breakpoint_toggle_is_idempotent() {
        let mut dbg = debugger("CLS");
        assert_eq!(dbg.execute("breakpoint 0x200"), ["Adding breakpoint at 0x200"]);
        assert_eq!(dbg.execute("breakpoints"), ["0x200"]);
        assert_eq!(
            dbg.execute("breakpoint 0x200"),
            ["Removing breakpoint at 0x200", "No active breakpoints"]
        );
        assert_eq!(dbg.execute("breakpoints"), ["No active breakpoints"]);
        assert_eq!(dbg.execute("breakpoint"), ["Expected value: <address>"]);
    }

    #[test]
    fn breakpoints_enable() {
        let mut dbg = debugger("CLS");
        assert_eq!(dbg.execute("breakpoints off"), ["Disabling breakpoints"]);
        assert!(!dbg.cpu().breakpoints_enabled());
        assert_eq!(
            dbg.execute("breakpoints"),
            ["No active breakpoints", "Breakpoints are disabled"]
        );
        assert_eq!(dbg.execute("breakpoints on"), ["Enabling breakpoints"]);
        assert!(dbg.cpu().breakpoints_enabled());
    }

    #[test]
    fn registers_table() {
        let mut dbg = debugger("LD VA, 0x3C\nLD I, 0x123");
        dbg.execute("step");
        dbg.execute("step");
        let lines = dbg.execute("registers");
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "V0: 0x00   V7: 0x00   VE: 0x00");
        assert_eq!(lines[2], "V2: 0x00   V9: 0x00   I : 0x123");
        assert_eq!(lines[3], "V3: 0x00   VA: 0x3c   DT: 0x00");
        assert_eq!(lines[6], "V6: 0x00   VD: 0x00   SP: 0x0");
        assert_eq!(lines[5], "V5: 0x00   VC: 0x00   PC: 0x204");
    }

    #[test]
    fn set_register() {
        let mut dbg = debugger("CLS");
        assert_eq!(dbg.execute("set v3 0x7f"), ["Setting V3 to 0x7f"]);
        assert_eq!(dbg.cpu().v(3), 0x7F);
        assert_eq!(dbg.execute("set pc 0x300"), ["Setting program counter to 0x300"]);
        assert_eq!(dbg.cpu().pc(), 0x300);
        assert_eq!(
            dbg.execute("set dt 256"),
            ["Error: Value must be in range [0, 0xFF]"]
        );
        assert_eq!(dbg.execute("set q 1"), ["Error: Unrecognized register"]);
        assert_eq!(dbg.cpu().dt(), 0);
    }

    #[test]
    fn step_and_disassemble() {
        let mut dbg = debugger("LD V1, 0x23\nJP 0x200");
        assert_eq!(
            dbg.execute("disassemble 2"),
            ["0x200: LD V1, 0x23", "0x202: JP 0x200"]
        );
        assert_eq!(dbg.execute("step"), ["Stepping into 0x202"]);
        assert_eq!(dbg.execute("disassemble"), ["0x202: JP 0x200"]);
        assert_eq!(dbg.execute("step"), ["Stepping into 0x200"]);
    }

    #[test]
    fn disassemble_stops_at_end_of_memory() {
        let mut dbg = debugger("CLS");
        dbg.execute("set pc 0xFFC");
        assert_eq!(dbg.execute("disassemble 5").len(), 2);
    }

    #[test]
    fn memory_dump() {
        let mut dbg = debugger("LD V1, 0x23\nJP 0x200");
        assert_eq!(dbg.execute("mem 0x200 0x203"), ["0x200: 61 23 12 00"]);
        assert_eq!(
            dbg.execute("mem 0 0x11"),
            [
                "0x000: f0 90 90 90 f0 20 60 20  20 70 f0 10 f0 80 f0 f0",
                "0x010: 10 f0",
            ]
        );
        assert_eq!(dbg.execute("mem 0x20 0x10"), ["Error: Invalid indices"]);
    }

    #[test]
    fn run_until_breakpoint_and_resume() {
        let mut dbg = debugger("CLS\nCLS\nCLS\nJP 0x200");
        dbg.execute("breakpoint 0x204");
        assert_eq!(dbg.execute("run"), ["Application is running"]);
        assert_eq!(dbg.execute("run"), ["Application is already running"]);
        assert_eq!(
            dbg.resume(Duration::ZERO, 0),
            ["Reached breakpoint at 0x204"]
        );
        // Continues past the breakpoint it is sitting on
        assert_eq!(dbg.execute("run"), ["Application is running"]);
        assert_eq!(dbg.cpu().pc(), 0x206);
        assert_eq!(
            dbg.resume(Duration::ZERO, 0),
            ["Reached breakpoint at 0x204"]
        );
        dbg.execute("breakpoints off");
        dbg.execute("run");
        assert_eq!(
            dbg.resume(Duration::ZERO, 3),
            ["Step limit reached, application paused at 0x202"]
        );
        assert_eq!(dbg.execute("stop"), ["Application stopped"]);
    }

    #[test]
    fn reset_reloads_image() {
        let mut dbg = debugger("LD V0, 9\nCLS");
        dbg.execute("step");
        dbg.execute("set v1 4");
        dbg.execute("breakpoint 0x202");
        assert_eq!(dbg.execute("reset"), ["Reset program to initial state"]);
        assert_eq!(dbg.cpu().pc(), 0x200);
        assert_eq!((dbg.cpu().v(0), dbg.cpu().v(1)), (0, 0));
        assert_eq!(dbg.cpu().fetch(0x200), 0x6009);
        assert!(dbg.cpu().breakpoints().contains(0x202));
    }

    #[test]
    fn keys_and_screen() {
        let mut dbg = debugger("LD V2, K\nLD F, V2\nDRW V0, V0, 5");
        dbg.execute("step");
        assert_eq!(dbg.cpu().pc(), 0x200);
        assert_eq!(dbg.execute("key 0x7"), ["Pressing key 0x7"]);
        dbg.execute("step");
        assert_eq!(dbg.cpu().v(2), 7);
        assert_eq!(dbg.execute("key 7 up"), ["Releasing key 0x7"]);
        dbg.execute("step");
        dbg.execute("step");
        let screen = dbg.execute("screen");
        assert_eq!(screen.len(), 32);
        assert!(screen[0].starts_with("####."));
        assert!(screen[1].starts_with("...#."));
    }

    #[test]
    fn stack_and_quit() {
        let mut dbg = debugger("CALL 0x204\nCLS\nCLS");
        dbg.execute("step");
        let stack = dbg.execute("stack");
        assert_eq!(stack.len(), 1);
        assert!(stack[0].starts_with("0x000 0x202 0x000"));
        assert!(!dbg.should_quit());
        assert!(dbg.execute("quit").is_empty());
        assert!(dbg.should_quit());
    }
}
