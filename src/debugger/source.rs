use std::io::{self, BufRead, IsTerminal, Write};

use console::Key;

use super::DEBUGGER_COLOR;
use crate::dprintln;

/// Where debugger commands are read from.
#[allow(private_interfaces)]
#[derive(Debug)]
pub enum SourceMode {
    Argument(Argument),
    Stdin(Stdin),
    Terminal(Terminal),
}

/// Commands given on the command line, separated by `;` or newlines.
#[derive(Debug)]
struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

/// Stdin which is not attached to a terminal, i.e. piped.
#[derive(Debug)]
struct Stdin {
    /// Remaining commands of the current line
    pending: Vec<String>,
    current: String,
}

/// Interactive unbuffered terminal with history.
#[derive(Debug)]
struct Terminal {
    term: console::Term,
    buffer: String,
    /// Byte index of next command in `buffer`, 0 when a new line must be read
    cursor: usize,
    history: Vec<String>,
    /// Focused item in history, or new entry if index==length
    history_index: usize,
    /// Visible line cursor in terminal
    visible_cursor: usize,
}

pub trait SourceReader {
    /// `None` indicates EOF.
    /// Returned string slice MAY include leading or trailing whitespace.
    fn read(&mut self) -> Option<&str>;
}

impl SourceMode {
    pub fn from(argument: Option<String>) -> Self {
        if let Some(argument) = argument {
            return SourceMode::Argument(Argument::from(argument));
        }
        if io::stdin().is_terminal() {
            return SourceMode::Terminal(Terminal::new());
        }
        SourceMode::Stdin(Stdin::new())
    }
}

impl SourceReader for SourceMode {
    fn read(&mut self) -> Option<&str> {
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
            // Terminal echoes as it is typed
            Self::Terminal(terminal) => return terminal.read(),
        };
        if let Some(command) = command {
            dprintln!(Sometimes, "\x1b[1mCommand: \x1b[0m{}", command.trim());
        }
        command
    }
}

impl Argument {
    pub fn from(source: String) -> Self {
        Self {
            buffer: source,
            cursor: 0,
        }
    }
}

impl SourceReader for Argument {
    fn read(&mut self) -> Option<&str> {
        if self.cursor >= self.buffer.len() {
            return None;
        }
        let rest = &self.buffer[self.cursor..];
        let end = rest.find(['\n', ';']).unwrap_or(rest.len());
        // Skip the delimiter
        self.cursor += end + 1;
        Some(&rest[..end])
    }
}

impl Stdin {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            current: String::new(),
        }
    }
}

impl SourceReader for Stdin {
    fn read(&mut self) -> Option<&str> {
        while self.pending.is_empty() {
            let mut line = String::new();
            // Read errors are treated as EOF
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => (),
            }
            let line = line.trim_end_matches(['\n', '\r']);
            self.pending = line.split(';').rev().map(String::from).collect();
        }
        self.current = self.pending.pop()?;
        Some(&self.current)
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            term: console::Term::stdout(),
            buffer: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_index: 0,
            visible_cursor: 0,
        }
    }

    fn is_next(&self) -> bool {
        self.history_index >= self.history.len()
    }

    /// If focused on a historic item, copy it to the buffer before editing.
    fn update_next(&mut self) {
        if let Some(entry) = self.history.get(self.history_index) {
            self.buffer = entry.clone();
            self.history_index = self.history.len();
        }
    }

    fn current(&self) -> &str {
        self.history
            .get(self.history_index)
            .unwrap_or(&self.buffer)
    }

    fn print_prompt(&mut self) -> io::Result<()> {
        self.term.clear_line()?;
        write!(self.term, "\x1b[1;{}mCommand: \x1b[0m", DEBUGGER_COLOR)?;
        let current = self.current().to_string();
        write!(self.term, "{}", current)?;
        self.term
            .move_cursor_left(current.len().saturating_sub(self.visible_cursor))?;
        self.term.flush()
    }

    /// Returns `true` once a command line is complete.
    fn read_key(&mut self) -> io::Result<bool> {
        match self.term.read_key()? {
            Key::Enter | Key::Char('\n') => {
                if self.is_next() && self.buffer.trim().is_empty() {
                    self.buffer.clear();
                    self.visible_cursor = 0;
                    writeln!(self.term)?;
                } else {
                    self.update_next();
                    return Ok(true);
                }
            }

            // Ignore ASCII control characters
            Key::Char('\x00'..='\x1f' | '\x7f') => (),
            Key::Char(ch) if ch.is_ascii() => {
                self.update_next();
                self.buffer.insert(self.visible_cursor, ch);
                self.visible_cursor += 1;
            }

            Key::Backspace => {
                self.update_next();
                if self.visible_cursor > 0 && self.visible_cursor <= self.buffer.len() {
                    self.visible_cursor -= 1;
                    self.buffer.remove(self.visible_cursor);
                }
            }
            Key::Del => {
                self.update_next();
                if self.visible_cursor < self.buffer.len() {
                    self.buffer.remove(self.visible_cursor);
                }
            }

            Key::ArrowLeft => self.visible_cursor = self.visible_cursor.saturating_sub(1),
            Key::ArrowRight => {
                if self.visible_cursor < self.current().len() {
                    self.visible_cursor += 1;
                }
            }

            Key::ArrowUp => {
                if self.history_index > 0 {
                    self.history_index -= 1;
                    self.visible_cursor = self.current().len();
                }
            }
            Key::ArrowDown => {
                if self.history_index < self.history.len() {
                    self.history_index += 1;
                    self.visible_cursor = self.current().len();
                }
            }

            _ => (),
        }
        Ok(false)
    }

    /// Read an entire (multi-command) line.
    fn read_line(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.visible_cursor = 0;
        loop {
            self.print_prompt()?;
            if self.read_key()? {
                break;
            }
        }
        writeln!(self.term)?;

        if self.history.last() != Some(&self.buffer) {
            self.history.push(self.buffer.clone());
        }
        self.history_index = self.history.len();
        Ok(())
    }

    fn next_command(&mut self) -> &str {
        let rest = &self.buffer[self.cursor..];
        match rest.find(';') {
            Some(index) => {
                self.cursor += index + 1;
                &rest[..index]
            }
            None => {
                self.cursor = 0;
                rest
            }
        }
    }
}

impl SourceReader for Terminal {
    fn read(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            // Terminal errors (e.g. closed input) end the session
            self.read_line().ok()?;
        }
        Some(self.next_command())
    }
}
