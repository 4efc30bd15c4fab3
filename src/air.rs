use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::encode;
use crate::error::{AsmError, AsmErrorKind};
use crate::expr;
use crate::symbol::{SymbolTable, Value, KEYWORDS};

lazy_static! {
    static ref REGISTER: Regex = Regex::new(r"^[Vv]([0-9A-Fa-f])$").expect("valid register pattern");
}

/// Assembly intermediate representation: the symbol table built by the first pass and the list
/// of instructions still to be encoded.
pub struct Air {
    symbols: SymbolTable<Value>,
    ast: Vec<AsmLine>,
}

/// Single instruction, with the source line it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsmLine {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
    /// Original source text.
    pub src: String,
    /// 0-based source line.
    pub line: usize,
}

/// Parsed operand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// `V0`..`VF`
    Reg(u8),
    /// Address register `I`
    I,
    /// Font glyph pointer `F`
    F,
    /// BCD pointer `B`
    B,
    /// Key press wait `K`
    K,
    /// Delay timer `DT`
    Dt,
    /// Sound timer `ST`
    St,
    /// Memory at the address register, `[I]`
    IndirectI,
    Num(i64),
    /// Name or symbolic expression, provisional until backpatched.
    Label(String),
}

/// What an encoding expects at one operand position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    V,
    /// Only `V0`.
    V0,
    I,
    F,
    B,
    K,
    Dt,
    St,
    IndirectI,
    /// 4-bit number
    Nibble,
    /// 8-bit number
    Byte,
    /// 12-bit number
    Addr,
}

impl Operand {
    /// Parse a single operand token. Returns `None` if it matches no operand grammar.
    pub fn parse(text: &str) -> Option<Operand> {
        let text = text.trim();
        if let Some(captures) = REGISTER.captures(text) {
            let index = u8::from_str_radix(&captures[1], 16).ok()?;
            return Some(Operand::Reg(index));
        }

        let keyword = match text.to_ascii_uppercase().as_str() {
            "I" => Some(Operand::I),
            "F" => Some(Operand::F),
            "B" => Some(Operand::B),
            "K" => Some(Operand::K),
            "DT" => Some(Operand::Dt),
            "ST" => Some(Operand::St),
            "[I]" => Some(Operand::IndirectI),
            _ => None,
        };
        if keyword.is_some() {
            return keyword;
        }

        if let Some(value) = expr::eval(text) {
            return Some(Operand::Num(value));
        }

        // Anything else must be an expression over names, resolved later
        match expr::symbols_in(text) {
            Some(names) if !names.is_empty() => Some(Operand::Label(text.to_string())),
            _ => None,
        }
    }

    /// Whether this operand may be used where `shape` is expected.
    pub fn fits(&self, shape: Shape) -> bool {
        match (self, shape) {
            (Operand::Reg(_), Shape::V) => true,
            (Operand::Reg(0), Shape::V0) => true,
            (Operand::I, Shape::I)
            | (Operand::F, Shape::F)
            | (Operand::B, Shape::B)
            | (Operand::K, Shape::K)
            | (Operand::Dt, Shape::Dt)
            | (Operand::St, Shape::St)
            | (Operand::IndirectI, Shape::IndirectI) => true,
            (Operand::Num(value), Shape::Nibble) => (0..=0xF).contains(value),
            (Operand::Num(value), Shape::Byte) => (0..=0xFF).contains(value),
            (Operand::Num(value), Shape::Addr) => (0..=0xFFF).contains(value),
            _ => false,
        }
    }

    /// Raw value passed to an encoder. Only meaningful once the operand fits its shape.
    pub fn value(&self) -> u16 {
        match self {
            Operand::Reg(index) => *index as u16,
            Operand::Num(value) => *value as u16,
            _ => 0,
        }
    }

    /// Resolve a label operand against the symbol table.
    ///
    /// A symbol's value is parsed again as an operand, so a define can stand for a register or
    /// for another symbol.
    fn resolve(&self, symbols: &SymbolTable<Value>) -> Option<Operand> {
        let mut visited: Vec<String> = Vec::new();
        let mut operand = self.clone();
        loop {
            let Operand::Label(text) = &operand else {
                return Some(operand);
            };
            let key = text.to_ascii_uppercase();
            if visited.contains(&key) || visited.len() >= expr::MAX_DEPTH {
                return None;
            }
            let next = match symbols.retrieve(text) {
                Some(Value::Int(value)) => Operand::Num(*value),
                Some(Value::Deferred(body)) => Operand::parse(body)?,
                None => Operand::Num(expr::eval_with(text, symbols)?),
            };
            visited.push(key);
            operand = next;
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(index) => write!(f, "V{:X}", index),
            Operand::I => write!(f, "I"),
            Operand::F => write!(f, "F"),
            Operand::B => write!(f, "B"),
            Operand::K => write!(f, "K"),
            Operand::Dt => write!(f, "DT"),
            Operand::St => write!(f, "ST"),
            Operand::IndirectI => write!(f, "[I]"),
            Operand::Num(value) => write!(f, "0x{:X}", value),
            Operand::Label(text) => write!(f, "{}", text),
        }
    }
}

impl AsmLine {
    pub fn new(mnemonic: String, operands: Vec<Operand>, src: String, line: usize) -> Self {
        AsmLine {
            mnemonic,
            operands,
            src,
            line,
        }
    }

    /// Replace every label operand with its resolved value.
    pub fn backpatch(&mut self, symbols: &SymbolTable<Value>) -> Result<(), AsmError> {
        for operand in &mut self.operands {
            if !matches!(operand, Operand::Label(_)) {
                continue;
            }
            match operand.resolve(symbols) {
                Some(resolved) => *operand = resolved,
                None => {
                    return Err(AsmError::new(
                        AsmErrorKind::UnresolvedLabel {
                            name: operand.to_string(),
                        },
                        self.line,
                        self.src.clone(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Encode into a machine word. Label operands must already be backpatched.
    pub fn emit(&self) -> Result<u16, AsmError> {
        encode::encode(&self.mnemonic, &self.operands).ok_or_else(|| {
            AsmError::new(AsmErrorKind::Unrecognized, self.line, self.src.clone())
        })
    }
}

impl Default for Air {
    fn default() -> Self {
        Self::new()
    }
}

impl Air {
    pub fn new() -> Self {
        Air {
            symbols: SymbolTable::with_keywords(KEYWORDS),
            ast: Vec::new(),
        }
    }

    pub fn add_stmt(&mut self, stmt: AsmLine) {
        self.ast.push(stmt)
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable<Value> {
        &mut self.symbols
    }

    /// Resolve all labels, including those declared after their use.
    pub fn backpatch(&mut self) -> Result<(), AsmError> {
        for stmt in &mut self.ast {
            stmt.backpatch(&self.symbols)?;
        }
        Ok(())
    }

    /// Encode every instruction, in source order.
    pub fn emit(&self) -> Result<Vec<u16>, AsmError> {
        self.ast.iter().map(AsmLine::emit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_operands() {
        assert_eq!(Operand::parse("V0"), Some(Operand::Reg(0)));
        assert_eq!(Operand::parse("vf"), Some(Operand::Reg(15)));
        assert_eq!(Operand::parse("[I]"), Some(Operand::IndirectI));
        assert_eq!(Operand::parse("dt"), Some(Operand::Dt));
        assert_eq!(Operand::parse("0x1F"), Some(Operand::Num(0x1F)));
        assert_eq!(Operand::parse("5 + 1"), Some(Operand::Num(6)));
        assert_eq!(Operand::parse("LOOP"), Some(Operand::Label("LOOP".to_string())));
        assert_eq!(
            Operand::parse("SPRITE + 5"),
            Some(Operand::Label("SPRITE + 5".to_string()))
        );
        assert_eq!(Operand::parse("VG"), Some(Operand::Label("VG".to_string())));
        assert_eq!(Operand::parse("I V6"), None);
        assert_eq!(Operand::parse("1 2"), None);
        assert_eq!(Operand::parse("#1"), None);
        assert_eq!(Operand::parse(""), None);
        assert_eq!(Operand::parse("$$"), None);
    }

    #[test]
    fn numbers_fit_by_width() {
        assert!(Operand::Num(0xF).fits(Shape::Nibble));
        assert!(!Operand::Num(0x10).fits(Shape::Nibble));
        assert!(Operand::Num(0xFF).fits(Shape::Byte));
        assert!(!Operand::Num(0x400).fits(Shape::Byte));
        assert!(Operand::Num(0xFFF).fits(Shape::Addr));
        assert!(!Operand::Num(0x1111).fits(Shape::Addr));
        assert!(!Operand::Num(-1).fits(Shape::Byte));
        assert!(!Operand::Reg(1).fits(Shape::Byte));
    }

    #[test]
    fn register_zero_fits_v0() {
        assert!(Operand::Reg(0).fits(Shape::V0));
        assert!(Operand::Reg(0).fits(Shape::V));
        assert!(!Operand::Reg(1).fits(Shape::V0));
    }

    #[test]
    fn resolve_through_defines() {
        let mut symbols = SymbolTable::with_keywords(KEYWORDS);
        symbols.store("start", Value::Int(0x200)).unwrap();
        symbols.store("counter", Value::from("V3")).unwrap();
        symbols.store("alias", Value::from("counter")).unwrap();
        symbols.store("loop_a", Value::from("loop_b")).unwrap();
        symbols.store("loop_b", Value::from("loop_a")).unwrap();

        let label = |text: &str| Operand::Label(text.to_string());
        assert_eq!(label("START").resolve(&symbols), Some(Operand::Num(0x200)));
        assert_eq!(label("alias").resolve(&symbols), Some(Operand::Reg(3)));
        assert_eq!(label("START + 4").resolve(&symbols), Some(Operand::Num(0x204)));
        assert_eq!(label("missing").resolve(&symbols), None);
        assert_eq!(label("loop_a").resolve(&symbols), None);
    }

    #[test]
    fn backpatch_reports_unresolved_label() {
        let symbols = SymbolTable::new();
        let mut stmt = AsmLine::new(
            "JP".to_string(),
            vec![Operand::Label("NOWHERE".to_string())],
            "jp nowhere".to_string(),
            4,
        );
        let error = stmt.backpatch(&symbols).unwrap_err();
        assert_eq!(
            error.kind,
            AsmErrorKind::UnresolvedLabel {
                name: "NOWHERE".to_string()
            }
        );
        assert_eq!(error.line, 4);
    }
}
