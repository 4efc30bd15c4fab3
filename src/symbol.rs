use std::error::Error;
use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

// Symbol table of NAME -> value, in declaration order
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

lazy_static! {
    static ref NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid name pattern");
}

/// Register names, operand keywords and mnemonics. None of these may name a label or define.
pub const KEYWORDS: &[&str] = &[
    "V0", "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "VA", "VB", "VC", "VD", "VE",
    "VF", "I", "[I]", "F", "B", "K", "DT", "ST", "CLS", "RET", "SYS", "JP", "CALL", "SE", "SNE",
    "LD", "ADD", "OR", "AND", "XOR", "SUB", "SHR", "SUBN", "SHL", "RND", "DRW", "SKP", "SKNP",
    "DEFINE",
];

/// Value bound to a symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Text which is only evaluated when the symbol is used, e.g. the body of a `DEFINE`.
    Deferred(String),
    Int(i64),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Deferred(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Deferred(text) => write!(f, "{}", text),
            Value::Int(value) => write!(f, "{}", value),
        }
    }
}

/// Error storing a symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolError {
    /// Name already exists and replacement was not requested.
    Duplicate { name: String },
    /// Name collides with a keyword.
    Reserved { name: String },
    /// Name is not an identifier.
    InvalidName { name: String },
}

impl Error for SymbolError {}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { name } => write!(f, "Duplicate symbol: `{}`", name),
            Self::Reserved { name } => write!(f, "Cannot use a keyword as a symbol: `{}`", name),
            Self::InvalidName { name } => write!(f, "Invalid symbol name: `{}`", name),
        }
    }
}

/// Case-insensitive store of name -> value.
///
/// Entries are write-once unless replacement is explicitly requested.
#[derive(Clone, Debug)]
pub struct SymbolTable<T> {
    keywords: &'static [&'static str],
    symbols: FxMap<String, T>,
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SymbolTable<T> {
    /// Table without any reserved names.
    pub fn new() -> Self {
        Self::with_keywords(&[])
    }

    /// Table which refuses any name in `keywords` (compared case-insensitively).
    pub fn with_keywords(keywords: &'static [&'static str]) -> Self {
        SymbolTable {
            keywords,
            symbols: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Store a new symbol. Fails if the name already exists.
    pub fn store(&mut self, name: &str, value: T) -> Result<(), SymbolError> {
        self.store_with(name, value, false)
    }

    pub fn store_with(&mut self, name: &str, value: T, allow_replace: bool) -> Result<(), SymbolError> {
        if !NAME.is_match(name) {
            return Err(SymbolError::InvalidName {
                name: name.to_string(),
            });
        }
        let key = name.to_ascii_uppercase();
        if self.keywords.iter().any(|keyword| *keyword == key) {
            return Err(SymbolError::Reserved {
                name: name.to_string(),
            });
        }
        if !allow_replace && self.symbols.contains_key(&key) {
            return Err(SymbolError::Duplicate {
                name: name.to_string(),
            });
        }
        self.symbols.insert(key, value);
        Ok(())
    }

    pub fn retrieve(&self, name: &str) -> Option<&T> {
        self.symbols.get(&name.to_ascii_uppercase())
    }

    pub fn has(&self, name: &str) -> bool {
        self.symbols.contains_key(&name.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in declaration order, with upper-case names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.symbols.iter().map(|(name, value)| (name.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_retrieve() {
        let mut table = SymbolTable::new();
        table.store("loop", Value::Int(0x200)).unwrap();
        assert!(table.has("LOOP"));
        assert!(table.has("Loop"));
        assert_eq!(table.retrieve("loop"), Some(&Value::Int(0x200)));
        assert_eq!(table.retrieve("missing"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn duplicate_requires_replace() {
        let mut table = SymbolTable::new();
        table.store("x", 1).unwrap();
        assert_eq!(
            table.store("X", 2),
            Err(SymbolError::Duplicate {
                name: "X".to_string()
            })
        );
        assert_eq!(table.retrieve("x"), Some(&1));
        table.store_with("x", 3, true).unwrap();
        assert_eq!(table.retrieve("x"), Some(&3));
    }

    #[test]
    fn keywords_are_reserved() {
        let mut table = SymbolTable::with_keywords(KEYWORDS);
        for name in ["v0", "VF", "ve", "dt", "Call", "define"] {
            assert!(
                matches!(table.store(name, 0), Err(SymbolError::Reserved { .. })),
                "`{}` should be reserved",
                name
            );
        }
        table.store("sprite", 0).unwrap();
    }

    #[test]
    fn invalid_names() {
        let mut table = SymbolTable::new();
        for name in ["", "1abc", "a-b", "a b", "[I]", "é"] {
            assert!(
                matches!(table.store(name, 0), Err(SymbolError::InvalidName { .. })),
                "`{}` should be invalid",
                name
            );
        }
        table.store("_under_score9", 0).unwrap();
    }

    #[test]
    fn keeps_declaration_order() {
        let mut table = SymbolTable::new();
        table.store("b", 1).unwrap();
        table.store("a", 2).unwrap();
        let names: Vec<_> = table.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["B", "A"]);
    }
}
