use std::fmt;

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// Monochrome screen the CPU draws sprites into.
pub trait Display {
    fn clear(&mut self);

    /// XOR one pixel with `on`. Returns `true` if a lit pixel was turned off.
    fn xor_pixel(&mut self, x: u8, y: u8, on: bool) -> bool;
}

/// Hexadecimal keypad, keys `0x0`..=`0xF`.
pub trait Keypad {
    fn is_pressed(&self, key: u8) -> bool;

    /// Any currently pressed key.
    fn next_pressed(&self) -> Option<u8> {
        (0..16).find(|&key| self.is_pressed(key))
    }
}

/// In-memory 64x32 screen, one row per word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    rows: [u64; HEIGHT],
}

impl Default for FrameBuffer {
    fn default() -> Self {
        FrameBuffer { rows: [0; HEIGHT] }
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= WIDTH || y >= HEIGHT {
            return false;
        }
        self.rows[y] & Self::bit(x) != 0
    }

    /// Number of lit pixels.
    pub fn lit(&self) -> u32 {
        self.rows.iter().map(|row| row.count_ones()).sum()
    }

    fn bit(x: usize) -> u64 {
        1 << (WIDTH - 1 - x)
    }
}

impl Display for FrameBuffer {
    fn clear(&mut self) {
        self.rows = [0; HEIGHT];
    }

    fn xor_pixel(&mut self, x: u8, y: u8, on: bool) -> bool {
        let (x, y) = (x as usize % WIDTH, y as usize % HEIGHT);
        if !on {
            return false;
        }
        let bit = Self::bit(x);
        let collided = self.rows[y] & bit != 0;
        self.rows[y] ^= bit;
        collided
    }
}

impl fmt::Display for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..HEIGHT {
            let line: String = (0..WIDTH)
                .map(|x| if self.get(x, y) { '#' } else { '.' })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Set of pressed keys, one bit per key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyState(u16);

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: u8) {
        self.0 |= 1 << (key & 0xF);
    }

    pub fn release(&mut self, key: u8) {
        self.0 &= !(1 << (key & 0xF));
    }

    pub fn release_all(&mut self) {
        self.0 = 0;
    }
}

impl Keypad for KeyState {
    fn is_pressed(&self, key: u8) -> bool {
        key < 16 && self.0 & (1 << key) != 0
    }
}
