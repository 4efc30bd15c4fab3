use std::fmt;

/// Operation selected by a machine word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Cls,
    Ret,
    Sys,
    Jp,
    Call,
    SeByte,
    SneByte,
    SeReg,
    LdByte,
    AddByte,
    LdReg,
    Or,
    And,
    Xor,
    AddReg,
    Sub,
    Shr,
    Subn,
    Shl,
    SneReg,
    LdI,
    JpV0,
    Rnd,
    Drw,
    Skp,
    Sknp,
    LdFromDt,
    LdKey,
    LdToDt,
    LdToSt,
    AddI,
    LdFont,
    LdBcd,
    Store,
    Load,
}

/// Fixed bits and the mask selecting which bits of a word are fixed.
#[derive(Clone, Copy, Debug)]
pub struct Pattern {
    pub bits: u16,
    pub mask: u16,
    pub op: Op,
}

impl Pattern {
    const fn new(bits: u16, mask: u16, op: Op) -> Self {
        Pattern { bits, mask, op }
    }

    pub fn matches(&self, word: u16) -> bool {
        (word ^ self.bits) & self.mask == 0
    }
}

/// Dispatch order. Overlapping masks are resolved by position, so `00E0` and `00EE` must come
/// before `0nnn`.
pub static PATTERNS: [Pattern; 35] = [
    Pattern::new(0x00E0, 0xFFFF, Op::Cls),
    Pattern::new(0x00EE, 0xFFFF, Op::Ret),
    Pattern::new(0x0000, 0xF000, Op::Sys),
    Pattern::new(0x1000, 0xF000, Op::Jp),
    Pattern::new(0x2000, 0xF000, Op::Call),
    Pattern::new(0x3000, 0xF000, Op::SeByte),
    Pattern::new(0x4000, 0xF000, Op::SneByte),
    Pattern::new(0x5000, 0xF00F, Op::SeReg),
    Pattern::new(0x6000, 0xF000, Op::LdByte),
    Pattern::new(0x7000, 0xF000, Op::AddByte),
    Pattern::new(0x8000, 0xF00F, Op::LdReg),
    Pattern::new(0x8001, 0xF00F, Op::Or),
    Pattern::new(0x8002, 0xF00F, Op::And),
    Pattern::new(0x8003, 0xF00F, Op::Xor),
    Pattern::new(0x8004, 0xF00F, Op::AddReg),
    Pattern::new(0x8005, 0xF00F, Op::Sub),
    Pattern::new(0x8006, 0xF00F, Op::Shr),
    Pattern::new(0x8007, 0xF00F, Op::Subn),
    Pattern::new(0x800E, 0xF00F, Op::Shl),
    Pattern::new(0x9000, 0xF00F, Op::SneReg),
    Pattern::new(0xA000, 0xF000, Op::LdI),
    Pattern::new(0xB000, 0xF000, Op::JpV0),
    Pattern::new(0xC000, 0xF000, Op::Rnd),
    Pattern::new(0xD000, 0xF000, Op::Drw),
    Pattern::new(0xE09E, 0xF0FF, Op::Skp),
    Pattern::new(0xE0A1, 0xF0FF, Op::Sknp),
    Pattern::new(0xF007, 0xF0FF, Op::LdFromDt),
    Pattern::new(0xF00A, 0xF0FF, Op::LdKey),
    Pattern::new(0xF015, 0xF0FF, Op::LdToDt),
    Pattern::new(0xF018, 0xF0FF, Op::LdToSt),
    Pattern::new(0xF01E, 0xF0FF, Op::AddI),
    Pattern::new(0xF029, 0xF0FF, Op::LdFont),
    Pattern::new(0xF033, 0xF0FF, Op::LdBcd),
    Pattern::new(0xF055, 0xF0FF, Op::Store),
    Pattern::new(0xF065, 0xF0FF, Op::Load),
];

/// First operation whose pattern matches `word`.
pub fn decode(word: u16) -> Option<Op> {
    PATTERNS
        .iter()
        .find(|pattern| pattern.matches(word))
        .map(|pattern| pattern.op)
}

/// Fields of a machine word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Word(pub u16);

impl Word {
    /// Second nibble, `_x__`
    pub fn x(self) -> usize {
        ((self.0 & 0x0F00) >> 8) as usize
    }

    /// Third nibble, `__y_`
    pub fn y(self) -> usize {
        ((self.0 & 0x00F0) >> 4) as usize
    }

    /// Lowest nibble
    pub fn n(self) -> u8 {
        (self.0 & 0x000F) as u8
    }

    /// Lowest byte
    pub fn kk(self) -> u8 {
        (self.0 & 0x00FF) as u8
    }

    /// Lowest 12 bits
    pub fn nnn(self) -> u16 {
        self.0 & 0x0FFF
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_patterns_win() {
        assert_eq!(decode(0x00E0), Some(Op::Cls));
        assert_eq!(decode(0x00EE), Some(Op::Ret));
        assert_eq!(decode(0x00E1), Some(Op::Sys));
        assert_eq!(decode(0x0000), Some(Op::Sys));
    }

    #[test]
    fn decodes_each_family() {
        assert_eq!(decode(0x1234), Some(Op::Jp));
        assert_eq!(decode(0x5120), Some(Op::SeReg));
        assert_eq!(decode(0x800E), Some(Op::Shl));
        assert_eq!(decode(0x8AB7), Some(Op::Subn));
        assert_eq!(decode(0xE39E), Some(Op::Skp));
        assert_eq!(decode(0xF465), Some(Op::Load));
    }

    #[test]
    fn unknown_words() {
        assert_eq!(decode(0x5121), None);
        assert_eq!(decode(0x8008), None);
        assert_eq!(decode(0x9001), None);
        assert_eq!(decode(0xE000), None);
        assert_eq!(decode(0xF0FF), None);
    }

    #[test]
    fn fields() {
        let word = Word(0xD12F);
        assert_eq!(word.x(), 1);
        assert_eq!(word.y(), 2);
        assert_eq!(word.n(), 0xF);
        assert_eq!(word.kk(), 0x2F);
        assert_eq!(word.nnn(), 0x12F);
        assert_eq!(word.to_string(), "0xD12F");
    }
}
