use std::error::Error;
use std::fmt;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::symbol::SymbolError;

/// Error which aborts a whole assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsmError {
    pub kind: AsmErrorKind,
    /// 0-based source line.
    pub line: usize,
    /// Original text of the source line.
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmErrorKind {
    /// Line is not a label, define or instruction, or has a malformed operand.
    Syntax,
    /// Label or define name is not an identifier, or is a keyword.
    Name { name: String },
    /// Symbol defined twice.
    Redeclaration { name: String },
    /// Label used but never defined.
    UnresolvedLabel { name: String },
    /// No encoding matches the mnemonic and operands.
    Unrecognized,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, line: usize, text: impl Into<String>) -> Self {
        AsmError {
            kind,
            line,
            text: text.into(),
        }
    }

    pub fn from_symbol(error: SymbolError, line: usize, text: impl Into<String>) -> Self {
        let kind = match error {
            SymbolError::Duplicate { name } => AsmErrorKind::Redeclaration { name },
            SymbolError::Reserved { name } | SymbolError::InvalidName { name } => {
                AsmErrorKind::Name { name }
            }
        };
        Self::new(kind, line, text)
    }

    fn code(&self) -> &'static str {
        match self.kind {
            AsmErrorKind::Syntax => "asm::syntax",
            AsmErrorKind::Name { .. } => "asm::name",
            AsmErrorKind::Redeclaration { .. } => "asm::redeclaration",
            AsmErrorKind::UnresolvedLabel { .. } => "asm::unresolved_label",
            AsmErrorKind::Unrecognized => "asm::unrecognized",
        }
    }

    fn help(&self) -> &'static str {
        match self.kind {
            AsmErrorKind::Syntax => "expected `label:`, `DEFINE name value` or `MNEMONIC operand, ...`",
            AsmErrorKind::Name { .. } => {
                "names must match [A-Za-z_][A-Za-z0-9_]* and must not be a register or mnemonic"
            }
            AsmErrorKind::Redeclaration { .. } => "each label or define may only be declared once",
            AsmErrorKind::UnresolvedLabel { .. } => "declare the label with `name:` or `DEFINE`",
            AsmErrorKind::Unrecognized => "check the operands for this instruction",
        }
    }
}

impl Error for AsmError {}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: ", self.line)?;
        match &self.kind {
            AsmErrorKind::Syntax => write!(f, "Syntax error")?,
            AsmErrorKind::Name { name } => write!(f, "Invalid name `{}`", name)?,
            AsmErrorKind::Redeclaration { name } => write!(f, "Symbol declared twice `{}`", name)?,
            AsmErrorKind::UnresolvedLabel { name } => write!(f, "Unresolved label `{}`", name)?,
            AsmErrorKind::Unrecognized => write!(f, "Unrecognized instruction")?,
        }
        write!(f, ": {}", self.text.trim())
    }
}

/// Convert to a diagnostic which points at the offending line of `src`.
pub fn report(error: &AsmError, src: &str) -> Report {
    let (offs, len) = line_span(src, error.line);
    miette!(
        severity = Severity::Error,
        code = error.code(),
        help = error.help(),
        labels = vec![LabeledSpan::at(offs..offs + len, "here")],
        "{}",
        error,
    )
    .with_source_code(src.to_string())
}

/// Byte offset and length of line `index`, excluding the line terminator.
fn line_span(src: &str, index: usize) -> (usize, usize) {
    let mut offs = 0;
    for (i, line) in src.split_inclusive('\n').enumerate() {
        let content = line.trim_end_matches(['\n', '\r']);
        if i == index {
            return (offs, content.len());
        }
        offs += line.len();
    }
    (src.len(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line() {
        let error = AsmError::new(
            AsmErrorKind::UnresolvedLabel {
                name: "LOOP".to_string(),
            },
            3,
            "  JP loop",
        );
        assert_eq!(error.to_string(), "Line 3: Unresolved label `LOOP`: JP loop");
    }

    #[test]
    fn symbol_errors_map_to_kinds() {
        let duplicate = SymbolError::Duplicate {
            name: "X".to_string(),
        };
        assert_eq!(
            AsmError::from_symbol(duplicate, 0, "x:").kind,
            AsmErrorKind::Redeclaration {
                name: "X".to_string()
            }
        );
        let reserved = SymbolError::Reserved {
            name: "V0".to_string(),
        };
        assert!(matches!(
            AsmError::from_symbol(reserved, 0, "v0:").kind,
            AsmErrorKind::Name { .. }
        ));
    }

    #[test]
    fn line_spans() {
        let src = "CLS\r\nJP 0x200\nRET";
        assert_eq!(line_span(src, 0), (0, 3));
        assert_eq!(line_span(src, 1), (5, 8));
        assert_eq!(line_span(src, 2), (14, 3));
        assert_eq!(line_span(src, 7), (17, 0));
    }
}
