use crate::{
    air::{Air, AsmLine, Operand},
    error::{AsmError, AsmErrorKind},
    expr,
    symbol::Value,
};

/// Address of the first instruction.
pub const BASE_ADDR: i64 = 0x200;

/// Assemble source text into a load image.
pub fn assemble(src: &str) -> Result<Vec<u16>, AsmError> {
    let mut air = AsmParser::new(src).parse()?;
    air.backpatch()?;
    air.emit()
}

/// Assemble pre-split source lines into a load image.
pub fn assemble_lines<S: AsRef<str>>(lines: &[S]) -> Result<Vec<u16>, AsmError> {
    let mut air = AsmParser::from_lines(lines.iter().map(AsRef::as_ref).collect()).parse()?;
    air.backpatch()?;
    air.emit()
}

/// First assembly pass: builds the symbol table and the instruction list, leaving label
/// operands unresolved.
pub struct AsmParser<'a> {
    /// Raw source lines
    lines: Vec<&'a str>,
    /// Assembly intermediate representation
    air: Air,
    /// Address the next emitted instruction will be loaded at
    addr: i64,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::from_lines(src.lines().collect())
    }

    pub fn from_lines(lines: Vec<&'a str>) -> Self {
        AsmParser {
            lines,
            air: Air::new(),
            addr: BASE_ADDR,
        }
    }

    /// Create AIR out of the source lines
    pub fn parse(mut self) -> Result<Air, AsmError> {
        for (line, raw) in self.lines.iter().enumerate() {
            let text = normalize(raw);
            let rest = extract_labels(&mut self.air, &text, self.addr, line, raw)?;
            if rest.is_empty() {
                continue;
            }
            if parse_define(&mut self.air, rest, line, raw)? {
                continue;
            }
            let stmt = parse_instr(rest, line, raw)?;
            self.air.add_stmt(stmt);
            self.addr += 2;
        }
        // Consume self to return AIR
        Ok(self.air)
    }
}

/// Upper-case, collapse whitespace, strip any `;` comment and expand `#` hex shorthand.
fn normalize(raw: &str) -> String {
    let code = raw.split(';').next().unwrap_or_default();
    code.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
        .replace('#', "0X")
}

/// Store every `label:` prefix at `addr` and return the remainder of the line.
fn extract_labels<'t>(
    air: &mut Air,
    text: &'t str,
    addr: i64,
    line: usize,
    raw: &str,
) -> Result<&'t str, AsmError> {
    let mut parts: Vec<&str> = text.split(':').map(str::trim).collect();
    let rest = parts.pop().unwrap_or_default();
    for label in parts {
        air.symbols_mut()
            .store(label, Value::Int(addr))
            .map_err(|e| AsmError::from_symbol(e, line, raw))?;
    }
    Ok(rest)
}

/// Handle `DEFINE name value`. Returns `false` if the line is not a define.
fn parse_define(air: &mut Air, text: &str, line: usize, raw: &str) -> Result<bool, AsmError> {
    let mut words = text.splitn(3, ' ');
    if words.next() != Some("DEFINE") {
        return Ok(false);
    }
    let (Some(name), Some(value)) = (words.next(), words.next()) else {
        return Err(AsmError::new(AsmErrorKind::Syntax, line, raw));
    };
    air.symbols_mut()
        .store(name, Value::from(value))
        .map_err(|e| AsmError::from_symbol(e, line, raw))?;
    Ok(true)
}

/// Split into mnemonic and comma-separated operands.
fn parse_instr(text: &str, line: usize, raw: &str) -> Result<AsmLine, AsmError> {
    // Raw word, possibly written as an expression
    if expr::eval(text).is_some() {
        return Ok(AsmLine::new(text.to_string(), Vec::new(), raw.to_string(), line));
    }

    let (mnemonic, operands) = match text.split_once(' ') {
        Some((mnemonic, rest)) => {
            let operands = rest
                .split(',')
                .map(|token| {
                    Operand::parse(token)
                        .ok_or_else(|| AsmError::new(AsmErrorKind::Syntax, line, raw))
                })
                .collect::<Result<Vec<_>, _>>()?;
            (mnemonic, operands)
        }
        None => (text, Vec::new()),
    };
    Ok(AsmLine::new(
        mnemonic.to_string(),
        operands,
        raw.to_string(),
        line,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_instructions() {
        assert_eq!(assemble("SYS 0x000"), Ok(vec![0x0000]));
        assert_eq!(assemble("JP 0x154"), Ok(vec![0x1154]));
        assert_eq!(assemble("ADD V4, 0x5"), Ok(vec![0x7405]));
        assert_eq!(assemble("DRW V1, V2, 0x3"), Ok(vec![0xD123]));
        assert_eq!(assemble("DRW VF, V0, 10"), Ok(vec![0xDF0A]));
        assert_eq!(assemble("LD V0, 5 + 1"), Ok(vec![0x6006]));
        assert_eq!(assemble("0xDF0A"), Ok(vec![0xDF0A]));
        assert_eq!(assemble("ld [i], v4"), Ok(vec![0xF455]));
        assert_eq!(assemble("  se  vf ,   0xff  ; compare"), Ok(vec![0x3FFF]));
    }

    #[test]
    fn unrecognized_instructions() {
        for src in [
            "SE V0, 0x400",
            "SYS 0x1111",
            "ADD V7",
            "ADD V7, V6, V5",
            "CLS 0x5",
            "RET 0xF, 0x46",
            "SYS V0",
            "ADD I, F",
            "VD V3, 0xFF1",
        ] {
            let error = assemble(src).unwrap_err();
            assert_eq!(error.kind, AsmErrorKind::Unrecognized, "{}", src);
        }
    }

    #[test]
    fn syntax_errors() {
        for src in [
            "ADD I  V6",
            "ADD V7,",
            "LD V0, $5",
            "DEFINE ONLY",
            "LD V0, 1 2",
            "JP 0x2 00",
            "LD V0, 4 * 1.5",
        ] {
            let error = assemble(src).unwrap_err();
            assert_eq!(error.kind, AsmErrorKind::Syntax, "{}", src);
        }
    }

    #[test]
    fn spaced_numbers_are_not_a_raw_word() {
        let error = assemble("1 2").unwrap_err();
        assert_eq!(error.kind, AsmErrorKind::Unrecognized);
        assert_eq!(assemble("0x12 + 0x34"), Ok(vec![0x46]));
    }

    #[test]
    fn hash_hex_shorthand() {
        assert_eq!(assemble("LD V0, #FF"), Ok(vec![0x60FF]));
        assert_eq!(assemble("jp #2a0"), Ok(vec![0x12A0]));
        assert_eq!(assemble("#00E0"), Ok(vec![0x00E0]));
        assert_eq!(assemble("CLS ; #1"), Ok(vec![0x00E0]));
    }

    #[test]
    fn doubling_define_chain() {
        let mut src = String::from("DEFINE A0 1\n");
        for i in 1..40 {
            src.push_str(&format!("DEFINE A{} A{} + A{}\n", i, i - 1, i - 1));
        }
        src.push_str("LD V0, A39 >> 32\n");
        assert_eq!(assemble(&src), Ok(vec![0x6080]));
    }

    #[test]
    fn unresolved_labels() {
        let error = assemble("CLS\nADD I, Vx").unwrap_err();
        assert_eq!(
            error.kind,
            AsmErrorKind::UnresolvedLabel {
                name: "VX".to_string()
            }
        );
        assert_eq!(error.line, 1);
        assert_eq!(error.text, "ADD I, Vx");
    }

    #[test]
    fn forward_reference() {
        let src = "\
            JP end\n\
            CLS\n\
            end: JP end\n";
        assert_eq!(assemble(src), Ok(vec![0x1204, 0x00E0, 0x1204]));
    }

    #[test]
    fn label_lines_do_not_advance() {
        let src = "\
            start:\n\
            ; comment only\n\
            \n\
            a: b: CLS\n\
            CALL b\n\
            JP start\n";
        assert_eq!(assemble(src), Ok(vec![0x00E0, 0x2200, 0x1200]));
    }

    #[test]
    fn defines() {
        let src = "\
            define counter v3\n\
            DEFINE step 2 * 4\n\
            DEFINE sprite 0x300\n\
            ADD counter, step\n\
            LD I, sprite + 5\n\
            LD I, later\n\
            later: RET\n";
        assert_eq!(assemble(src), Ok(vec![0x7308, 0xA305, 0xA206, 0x00EE]));
    }

    #[test]
    fn name_errors() {
        let error = assemble("v0: CLS").unwrap_err();
        assert!(matches!(error.kind, AsmErrorKind::Name { .. }));
        let error = assemble("DEFINE 9lives 3").unwrap_err();
        assert!(matches!(error.kind, AsmErrorKind::Name { .. }));
        let error = assemble("x: CLS\nx: RET").unwrap_err();
        assert_eq!(
            error.kind,
            AsmErrorKind::Redeclaration {
                name: "X".to_string()
            }
        );
        assert_eq!(error.line, 1);
    }

    #[test]
    fn circular_defines_fail() {
        let src = "DEFINE a b\nDEFINE b a\nJP a";
        assert!(matches!(
            assemble(src).unwrap_err().kind,
            AsmErrorKind::UnresolvedLabel { .. }
        ));
    }

    #[test]
    fn split_lines() {
        assert_eq!(assemble_lines(&["CLS", "RET"]), Ok(vec![0x00E0, 0x00EE]));
        assert_eq!(assemble("CLS\r\nRET\r\n"), Ok(vec![0x00E0, 0x00EE]));
        assert_eq!(assemble(""), Ok(vec![]));
    }

    #[test]
    fn parse_keeps_source() {
        let mut air = AsmParser::new("\n  jp Loop ; back\n").parse().unwrap();
        let error = air.backpatch().unwrap_err();
        assert_eq!(
            error.kind,
            AsmErrorKind::UnresolvedLabel {
                name: "LOOP".to_string()
            }
        );
        assert_eq!(error.text, "  jp Loop ; back");
        assert_eq!(error.line, 1);
    }
}
