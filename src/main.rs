use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, Result};

use chasm::output::Output;
use chasm::runtime::Stop;
use chasm::{debugger, disassemble, error, Cpu, DebuggerOptions};

/// Chasm is an assembler, disassembler, emulator and debugger for CHIP-8 programs.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.ch8s` or `.ch8` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.ch8s` or binary `.ch8` file headless and print the final screen
    Run {
        /// `.ch8s` or `.ch8` file to run
        name: PathBuf,
        /// Maximum instructions to execute, 0 for no limit
        #[arg(short, long, default_value_t = DEFAULT_STEPS)]
        steps: u64,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Run file with debugger
    Debug {
        /// `.ch8s` or `.ch8` file to run
        name: PathBuf,
        /// Read debugger commands from argument
        #[arg(short, long)]
        command: Option<String>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Create binary `.ch8` file to run later
    Assemble {
        /// `.ch8s` file to assemble
        name: PathBuf,
        /// Destination to output `.ch8` file
        dest: Option<PathBuf>,
    },
    /// Check a `.ch8s` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print each word of a program with its disassembly
    Disassemble {
        /// `.ch8s` or `.ch8` file to disassemble
        name: PathBuf,
    },
    /// Place a watch on a `.ch8s` file to receive constant assembler updates
    Watch {
        /// `.ch8s` file to watch
        name: PathBuf,
    },
}

const DEFAULT_STEPS: u64 = 1000;

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    chasm::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(chasm::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&path, DEFAULT_STEPS, false);
        }
        println!("\n~ chasm v{VERSION} ~");
        println!("{SHORT_INFO}");
        return Ok(());
    };

    match command {
        Command::Run {
            name,
            steps,
            minimal,
        } => run(&name, steps, minimal),
        Command::Debug {
            name,
            command,
            minimal,
        } => {
            Output::set_minimal(minimal);
            let image = load(&name)?;
            message(Green, "Debugging", "loaded program");
            debugger::run_session(image, DebuggerOptions { command })?;
            Output::Debugger(chasm::output::Condition::Always).start_new_line();
            file_message(Green, "Completed", &name);
            Ok(())
        }
        Command::Assemble { name, dest } => {
            file_message(Green, "Assembling", &name);
            let src = fs::read_to_string(&name).into_diagnostic()?;
            let words = assemble(&src)?;

            let out_file_name = dest.unwrap_or_else(|| name.with_extension("ch8"));
            let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
            let mut file = File::create(&out_file_name).into_diagnostic()?;
            file.write_all(&bytes).into_diagnostic()?;

            message(Green, "Finished", "emit binary");
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let src = fs::read_to_string(&name).into_diagnostic()?;
            let _ = assemble(&src)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Disassemble { name } => {
            let words = load(&name)?;
            for (offs, word) in words.iter().enumerate() {
                let addr = chasm::runtime::PROGRAM_START as usize + offs * 2;
                println!("0x{:03x}: {:04x}  {}", addr, word, disassemble(*word));
            }
            Ok(())
        }
        Command::Watch { name } => watch(name),
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

/// Execute headless for up to `steps` instructions, then print the screen.
fn run(name: &Path, steps: u64, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    let image = load(name)?;

    let mut cpu = Cpu::default();
    cpu.load(&image)?;
    message(MsgColor::Green, "Running", "loaded program");
    cpu.start();
    let reason = match cpu.run(Duration::ZERO, steps) {
        Stop::EndOfMemory => "reached end of memory",
        Stop::Limit => "step limit reached",
        Stop::Breakpoint(_) | Stop::Paused => "paused",
    };

    Output::Normal.print_str(&cpu.display().to_string());
    message(MsgColor::Cyan, "Halted", reason);
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

/// Read a binary `.ch8` image, or assemble any other file as source.
fn load(name: &Path) -> Result<Vec<u16>> {
    if name.extension().is_some_and(|ext| ext == "ch8") {
        let buffer = fs::read(name).into_diagnostic()?;
        if buffer.len() % 2 != 0 {
            bail!("File is not aligned to 16 bits");
        }
        return Ok(buffer
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]))
            .collect());
    }
    file_message(MsgColor::Green, "Assembling", name);
    let src = fs::read_to_string(name).into_diagnostic()?;
    assemble(&src)
}

/// Assemble source, reporting failures against the source text.
fn assemble(src: &str) -> Result<Vec<u16>> {
    chasm::assemble(src).map_err(|err| error::report(&err, src))
}

fn watch(name: PathBuf) -> Result<()> {
    use MsgColor::*;
    if !name.exists() {
        bail!("File does not exist. Exiting...")
    }
    // Vim breaks if watching a single file
    let folder_path = match name.parent() {
        Some(pth) if pth.is_dir() => pth.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    // Clear screen and move cursor to top left
    print!("\x1B[2J\x1B[2;1H");
    file_message(Green, "Watching", &name);
    message(Cyan, "Help", "press CTRL+C to exit");

    let mut watcher =
        Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;

    watcher
        .watch(folder_path, move |event: Event| match event.kind {
            // Watch remove for vim changes
            EventKind::Modify(_) | EventKind::Remove(_) => {
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Green, "Re-checking", "file change detected");
                message(Cyan, "Help", "press CTRL+C to exit");

                sleep(Duration::from_millis(50));

                let src = match fs::read_to_string(&name) {
                    Ok(src) => src,
                    Err(e) => {
                        eprintln!("{e}. Exiting...");
                        return Flow::Exit;
                    }
                };
                match assemble(&src) {
                    Ok(words) => {
                        let summary = format!("{} words, no errors found!", words.len());
                        message(Green, "Success", &summary);
                    }
                    Err(e) => println!("\n{:?}", e),
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        })
        .into_diagnostic()?;
    watcher.run();
    Ok(())
}

const SHORT_INFO: &str = r"
Welcome to chasm, an all-in-one toolchain for CHIP-8 assembly code.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
