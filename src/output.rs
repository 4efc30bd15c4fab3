use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

/// Print a line of debugger output to stderr, at a [`Condition`] level.
#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        $crate::output::Output::Debugger($cond).print_str("\n");
    }};
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($cond).print_str(&s);
    }};
}

#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Program output, to stdout.
    Normal,
    /// Debugger output, to stderr.
    Debugger(Condition),
}

/// Whether a debugger line is still printed with `--minimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    Sometimes,
}

/// Characters of a string with ANSI escape sequences removed.
struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start(new_value: bool) {
        Self::IS_LINE_START.with(|value| value.replace(new_value));
    }
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    fn set_line_start_from_str(string: &str) {
        if let Some(ch) = Decolored::new(string).last() {
            Self::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                // Screen output is never colored, so `--minimal` leaves it alone
                print!("{}", string);
                Self::set_line_start_from_str(string);
            }
            Self::Debugger(condition) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    eprint!("{}", ColoredString::from(string).blue());
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Always) => {
                    eprint!("{}", Decolored::new(string).collect::<String>());
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Sometimes) => (),
            },
        }
    }

    /// Finish a partially printed line.
    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("V0: 0x00").collect::<String>(), "V0: 0x00");
        assert_eq!(
            Decolored::new("\x1b[1mCommand: \x1b[0mstep").collect::<String>(),
            "Command: step"
        );
        assert_eq!(Decolored::new("run\x1b[0xyz").collect::<String>(), "run");
        assert_eq!(
            Decolored::new("mem\x1bw[0bxyzm 0 4").collect::<String>(),
            "mem 0 4"
        );
    }

    #[test]
    fn minimal_flag_is_per_thread() {
        let previous = Output::set_minimal(true);
        assert!(Output::is_minimal());
        Output::set_minimal(previous);
        assert_eq!(Output::is_minimal(), previous);
    }
}
