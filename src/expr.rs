//! Integer expression evaluator.
//!
//! Expressions are evaluated in stages over a flat token list: symbol substitution, literal
//! conversion, parentheses, unary operators, then binary operators in [`Operator::ALL`] order.
//! Every stage returns `None` when the expression cannot be resolved, so callers can tell
//! "not an expression" apart from a hard error.

use fxhash::FxHashMap;

use crate::symbol::{SymbolTable, Value};

/// Deepest parenthesis or symbol nesting that is still evaluated.
pub const MAX_DEPTH: usize = 256;

/// Operators in precedence order. Earlier operators bind tighter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Open,
    Close,
    Not,
    Invert,
    Pow,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl Operator {
    pub const ALL: [Operator; 23] = [
        Self::Open,
        Self::Close,
        Self::Not,
        Self::Invert,
        Self::Pow,
        Self::Mul,
        Self::Div,
        Self::Rem,
        Self::Add,
        Self::Sub,
        Self::Shl,
        Self::Shr,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Eq,
        Self::Ne,
        Self::BitAnd,
        Self::BitXor,
        Self::BitOr,
        Self::And,
        Self::Or,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Open => "(",
            Self::Close => ")",
            Self::Not => "!",
            Self::Invert => "~",
            Self::Pow => "**",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::BitAnd => "&",
            Self::BitXor => "^",
            Self::BitOr => "|",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    fn is_unary(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Invert | Self::Not)
    }

    /// Longest operator at the start of `text`.
    fn longest_prefix(text: &str) -> Option<Operator> {
        Self::ALL
            .iter()
            .filter(|op| text.starts_with(op.symbol()))
            .max_by_key(|op| op.symbol().len())
            .copied()
    }

    fn apply_unary(self, value: i64) -> Option<i64> {
        match self {
            Self::Add => Some(value),
            Self::Sub => value.checked_neg(),
            Self::Invert => Some(!value),
            Self::Not => Some((value == 0) as i64),
            _ => None,
        }
    }

    fn apply_binary(self, l: i64, r: i64) -> Option<i64> {
        let value = match self {
            Self::Pow => l.checked_pow(u32::try_from(r).ok()?)?,
            Self::Mul => l.checked_mul(r)?,
            Self::Div => l.checked_div(r)?,
            Self::Rem => l.checked_rem(r)?,
            Self::Add => l.checked_add(r)?,
            Self::Sub => l.checked_sub(r)?,
            Self::Shl if (0..64).contains(&r) => l << r,
            Self::Shr if (0..64).contains(&r) => l >> r,
            Self::Lt => (l < r) as i64,
            Self::Le => (l <= r) as i64,
            Self::Gt => (l > r) as i64,
            Self::Ge => (l >= r) as i64,
            Self::Eq => (l == r) as i64,
            Self::Ne => (l != r) as i64,
            Self::BitAnd => l & r,
            Self::BitXor => l ^ r,
            Self::BitOr => l | r,
            // Value semantics, as opposed to strict booleans
            Self::And => {
                if l == 0 {
                    l
                } else {
                    r
                }
            }
            Self::Or => {
                if l != 0 {
                    l
                } else {
                    r
                }
            }
            _ => return None,
        };
        Some(value)
    }
}

/// Token before literal conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Part<'a> {
    Op(Operator),
    Text(&'a str),
}

/// Token after literal conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Item {
    Op(Operator),
    Num(i64),
}

/// Evaluate an expression without symbols.
///
/// Whitespace may only appear next to an operator, so `1 2` is not read as `12`.
pub fn eval(expr: &str) -> Option<i64> {
    if !is_spaced_by_operators(expr) {
        return None;
    }
    let stripped = strip_whitespace(expr);
    let parts = tokenize(&stripped);
    let items = resolve_constants(&parts, |_| None)?;
    resolve_items(items, 0)
}

/// Evaluate an expression, substituting any known symbol with its (recursively evaluated)
/// value. A symbol which depends on itself makes the whole expression fail.
pub fn eval_with(expr: &str, symbols: &SymbolTable<Value>) -> Option<i64> {
    let mut resolver = Resolver {
        symbols,
        resolving: Vec::new(),
        resolved: FxHashMap::default(),
    };
    resolver.eval(expr)
}

/// Names referenced by an expression, or `None` if the text is not a well-formed expression
/// over numbers and identifiers. Whitespace follows the same rule as in [`eval`].
pub fn symbols_in(expr: &str) -> Option<Vec<String>> {
    if !is_spaced_by_operators(expr) {
        return None;
    }

    let stripped = strip_whitespace(expr);
    let mut names = Vec::new();
    for part in tokenize(&stripped) {
        if let Part::Text(text) = part {
            if parse_number(text).is_some() {
                continue;
            }
            if !is_identifier(text) {
                return None;
            }
            names.push(text.to_string());
        }
    }
    Some(names)
}

/// Convert a single integer literal: decimal, `0x` hex, `0b` binary or `0o` octal.
pub fn parse_number(text: &str) -> Option<i64> {
    let radix_digits = |prefix_lower: &str, prefix_upper: &str| {
        text.strip_prefix(prefix_lower)
            .or_else(|| text.strip_prefix(prefix_upper))
    };

    let (digits, radix) = if let Some(digits) = radix_digits("0x", "0X") {
        (digits, 16)
    } else if let Some(digits) = radix_digits("0b", "0B") {
        (digits, 2)
    } else if let Some(digits) = radix_digits("0o", "0O") {
        (digits, 8)
    } else {
        (text, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    i64::from_str_radix(digits, radix).ok()
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_operator_char(c: char) -> bool {
    "()!~*/%+-<>=&^|".contains(c)
}

/// Adjacent words must be joined by an operator on at least one side.
fn is_spaced_by_operators(expr: &str) -> bool {
    let words: Vec<&str> = expr.split_whitespace().collect();
    words.windows(2).all(|pair| {
        pair[0].ends_with(is_operator_char) || pair[1].starts_with(is_operator_char)
    })
}

fn strip_whitespace(expr: &str) -> String {
    expr.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Symbol substitution state for a single [`eval_with`] call.
struct Resolver<'s> {
    symbols: &'s SymbolTable<Value>,
    /// Symbols currently being evaluated, upper-cased
    resolving: Vec<String>,
    /// Every symbol evaluated so far, upper-cased
    resolved: FxHashMap<String, Option<i64>>,
}

impl Resolver<'_> {
    fn eval(&mut self, expr: &str) -> Option<i64> {
        if !is_spaced_by_operators(expr) {
            return None;
        }
        let stripped = strip_whitespace(expr);
        let parts = tokenize(&stripped);
        let items = resolve_constants(&parts, |name| {
            if !self.symbols.has(name) {
                return None;
            }
            Some(self.resolve_symbol(name))
        })?;
        resolve_items(items, 0)
    }

    /// Returns `None` for a cycle or an unresolvable value.
    fn resolve_symbol(&mut self, name: &str) -> Option<i64> {
        let key = name.to_ascii_uppercase();
        if let Some(value) = self.resolved.get(&key) {
            return *value;
        }
        if self.resolving.contains(&key) || self.resolving.len() >= MAX_DEPTH {
            return None;
        }
        let symbols = self.symbols;
        let value = match symbols.retrieve(name)? {
            Value::Int(value) => Some(*value),
            Value::Deferred(text) => {
                self.resolving.push(key.clone());
                let value = self.eval(text);
                self.resolving.pop();
                value
            }
        };
        self.resolved.insert(key, value);
        value
    }
}

/// Split on operators, longest match first.
fn tokenize(expr: &str) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while cursor < expr.len() {
        let rest = &expr[cursor..];
        if let Some(op) = Operator::longest_prefix(rest) {
            if text_start < cursor {
                parts.push(Part::Text(&expr[text_start..cursor]));
            }
            parts.push(Part::Op(op));
            cursor += op.symbol().len();
            text_start = cursor;
        } else {
            cursor += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    if text_start < expr.len() {
        parts.push(Part::Text(&expr[text_start..]));
    }
    parts
}

/// Replace every text token with a number, either a symbol value (from `lookup`) or a literal.
///
/// `lookup` returns `None` for unknown names, or `Some(None)` for a name which exists but could
/// not be evaluated.
fn resolve_constants<'a, F>(parts: &[Part<'a>], mut lookup: F) -> Option<Vec<Item>>
where
    F: FnMut(&'a str) -> Option<Option<i64>>,
{
    parts
        .iter()
        .map(|part| match *part {
            Part::Op(op) => Some(Item::Op(op)),
            Part::Text(text) => match lookup(text) {
                Some(value) => value.map(Item::Num),
                None => parse_number(text).map(Item::Num),
            },
        })
        .collect()
}

fn resolve_items(mut items: Vec<Item>, depth: usize) -> Option<i64> {
    resolve_parens(&mut items, depth)?;
    resolve_unary(&mut items)?;
    resolve_binary(&mut items)?;
    match items.as_slice() {
        [Item::Num(value)] => Some(*value),
        _ => None,
    }
}

/// Evaluate each parenthesized group, outermost group first, its contents recursively.
fn resolve_parens(items: &mut Vec<Item>, depth: usize) -> Option<()> {
    while let Some(open) = items.iter().position(|item| *item == Item::Op(Operator::Open)) {
        if depth >= MAX_DEPTH {
            return None;
        }
        let close = matching_paren(items, open)?;
        let inner = items[open + 1..close].to_vec();
        let value = resolve_items(inner, depth + 1)?;
        items.splice(open..=close, [Item::Num(value)]);
    }
    Some(())
}

fn matching_paren(items: &[Item], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, item) in items.iter().enumerate().skip(open) {
        match item {
            Item::Op(Operator::Open) => depth += 1,
            Item::Op(Operator::Close) => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => (),
        }
    }
    None
}

/// A unary operator is one not preceded by a number. Runs of unary operators apply
/// right-to-left to the number that follows them.
fn resolve_unary(items: &mut Vec<Item>) -> Option<()> {
    let mut i = 0;
    while i < items.len() {
        let is_unary_op = matches!(items[i], Item::Op(op) if op.is_unary());
        let follows_number = i > 0 && matches!(items[i - 1], Item::Num(_));
        if is_unary_op && !follows_number {
            let operand = (i..items.len()).find(|&j| matches!(items[j], Item::Num(_)))?;
            let Item::Num(mut value) = items[operand] else {
                unreachable!("operand index points to a number");
            };
            for item in items[i..operand].iter().rev() {
                match item {
                    Item::Op(op) if op.is_unary() => value = op.apply_unary(value)?,
                    _ => return None,
                }
            }
            items.splice(i..=operand, [Item::Num(value)]);
        }
        i += 1;
    }
    Some(())
}

/// Repeatedly apply the tightest-binding operator left in the expression, leftmost first.
fn resolve_binary(items: &mut Vec<Item>) -> Option<()> {
    loop {
        let Some(position) = Operator::ALL
            .iter()
            .find_map(|op| items.iter().position(|item| *item == Item::Op(*op)))
        else {
            return Some(());
        };

        let Item::Op(op) = items[position] else {
            unreachable!("position points to an operator");
        };
        let left = position.checked_sub(1).and_then(|i| items.get(i));
        let right = items.get(position + 1);
        let (Some(Item::Num(l)), Some(Item::Num(r))) = (left, right) else {
            return None;
        };
        let value = op.apply_binary(*l, *r)?;
        items.splice(position - 1..=position + 1, [Item::Num(value)]);
    }
}
