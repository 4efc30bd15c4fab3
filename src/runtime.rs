use std::{
    thread,
    time::{Duration, Instant},
};

use miette::{bail, Result};
use rand_core::{OsRng, RngCore};

use crate::{
    breakpoint::Breakpoints,
    device::{Display, FrameBuffer, KeyState, Keypad, HEIGHT, WIDTH},
    opcode::{decode, Op, Word},
};

/// 4KB of byte-addressable memory.
pub const MEMORY_SIZE: usize = 0x1000;
/// Highest address the program counter may execute from.
pub const AVAILABLE_RAM: u16 = 0xFFF;
pub const STACK_SIZE: usize = 16;
/// Load address of programs.
pub const PROGRAM_START: u16 = 0x200;
/// Bytes per font glyph.
pub const FONT_SIZE: u16 = 5;

/// Glyphs `0`..=`F`, loaded at address 0.
const FONT_DATA: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Timers count down at 60Hz.
const TIMER_PERIOD: Duration = Duration::from_nanos(1_000_000_000 / 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Idle,
    Running,
    /// Paused before executing the instruction at a breakpoint.
    Breakpoint,
    /// Program counter ran past the end of memory.
    Halted,
}

/// Why a call to [`Cpu::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stop {
    /// Not running, or paused by the caller.
    Paused,
    Breakpoint(u16),
    EndOfMemory,
    /// Step limit reached; the CPU is paused.
    Limit,
}

/// Complete machine state during runtime, drawing to `D` and reading keys from `K`.
pub struct Cpu<D = FrameBuffer, K = KeyState> {
    mem: Box<[u8; MEMORY_SIZE]>,
    /// V0..VF, VF doubles as the flag register
    v: [u8; 16],
    /// Address register
    i: u16,
    /// Delay timer
    dt: u8,
    /// Sound timer
    st: u8,
    /// Program counter, always even
    pc: u16,
    stack: [u16; STACK_SIZE],
    /// Stack pointer, wraps modulo 16
    sp: usize,
    status: Status,
    breakpoints: Breakpoints,
    breakpoints_enabled: bool,
    /// Time not yet turned into timer ticks
    timer_residue: Duration,
    last_step: Option<Instant>,
    display: D,
    keypad: K,
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu::new(FrameBuffer::new(), KeyState::new())
    }
}

impl<D: Display, K: Keypad> Cpu<D, K> {
    pub fn new(display: D, keypad: K) -> Self {
        Cpu {
            mem: Self::init_memory(),
            v: [0; 16],
            i: 0,
            dt: 0,
            st: 0,
            pc: PROGRAM_START,
            stack: [0; STACK_SIZE],
            sp: 0,
            status: Status::Idle,
            breakpoints: Breakpoints::new(),
            breakpoints_enabled: true,
            timer_residue: Duration::ZERO,
            last_step: None,
            display,
            keypad,
        }
    }

    fn init_memory() -> Box<[u8; MEMORY_SIZE]> {
        let mut mem = Box::new([0; MEMORY_SIZE]);
        mem[..FONT_DATA.len()].copy_from_slice(&FONT_DATA);
        mem
    }

    /// Write words big-endian starting at the program counter.
    pub fn load(&mut self, words: &[u16]) -> Result<()> {
        let start = self.pc as usize;
        if start + words.len() * 2 > MEMORY_SIZE {
            bail!(
                "Program of {} words does not fit in memory starting at 0x{:03x}.",
                words.len(),
                start
            );
        }
        for (offs, word) in words.iter().enumerate() {
            let [upper, lower] = word.to_be_bytes();
            self.mem[start + offs * 2] = upper;
            self.mem[start + offs * 2 + 1] = lower;
        }
        Ok(())
    }

    /// Blank, font-seeded machine. Breakpoints and devices are kept.
    pub fn reset(&mut self) {
        self.mem = Self::init_memory();
        self.v = [0; 16];
        self.i = 0;
        self.dt = 0;
        self.st = 0;
        self.pc = PROGRAM_START;
        self.stack = [0; STACK_SIZE];
        self.sp = 0;
        self.status = Status::Idle;
        self.timer_residue = Duration::ZERO;
        self.last_step = None;
        self.display.clear();
    }

    /// Enter the running state. Fails if sitting on an enabled breakpoint.
    pub fn start(&mut self) -> bool {
        if self.at_breakpoint() {
            return false;
        }
        self.status = Status::Running;
        true
    }

    pub fn pause(&mut self) {
        if self.status == Status::Running {
            self.status = Status::Idle;
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    fn at_breakpoint(&self) -> bool {
        self.breakpoints_enabled && self.breakpoints.contains(self.pc)
    }

    /// One scheduled tick of a running machine: stops at the end of memory or at a breakpoint,
    /// otherwise executes one instruction.
    pub fn tick(&mut self) -> Option<Stop> {
        if self.status != Status::Running {
            return Some(Stop::Paused);
        }
        if self.pc > AVAILABLE_RAM {
            self.status = Status::Halted;
            return Some(Stop::EndOfMemory);
        }
        if self.at_breakpoint() {
            self.status = Status::Breakpoint;
            return Some(Stop::Breakpoint(self.pc));
        }
        self.step();
        None
    }

    /// Tick every `interval` until stopped. A `limit` of 0 runs without a step limit.
    pub fn run(&mut self, interval: Duration, limit: u64) -> Stop {
        let mut steps = 0;
        loop {
            if let Some(stop) = self.tick() {
                return stop;
            }
            steps += 1;
            if limit != 0 && steps >= limit {
                self.pause();
                return Stop::Limit;
            }
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
    }

    /// Execute a single instruction, counting down timers by the time since the last step.
    pub fn step(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_step {
            self.tick_timers(now.duration_since(last));
        }
        self.last_step = Some(now);
        let word = self.fetch(self.pc);
        self.execute(word);
    }

    /// Count both timers down at 60Hz, clamped at zero.
    pub fn tick_timers(&mut self, elapsed: Duration) {
        self.timer_residue += elapsed;
        let ticks = self.timer_residue.as_nanos() / TIMER_PERIOD.as_nanos();
        self.timer_residue -= TIMER_PERIOD * ticks as u32;
        let ticks = ticks.min(u8::MAX as u128) as u8;
        self.dt = self.dt.saturating_sub(ticks);
        self.st = self.st.saturating_sub(ticks);
    }

    /// Big-endian word at `addr`.
    pub fn fetch(&self, addr: u16) -> u16 {
        let upper = self.mem[addr as usize % MEMORY_SIZE];
        let lower = self.mem[(addr as usize + 1) % MEMORY_SIZE];
        u16::from_be_bytes([upper, lower])
    }

    /// Perform a word's side effects, ignoring the current program counter contents. Words
    /// without an operation are skipped.
    pub fn execute(&mut self, word: u16) {
        let w = Word(word);
        let (x, y, kk, nnn) = (w.x(), w.y(), w.kk(), w.nnn());
        let Some(op) = decode(word) else {
            self.next(1);
            return;
        };
        match op {
            Op::Cls => {
                self.display.clear();
                self.next(1);
            }
            Op::Ret => {
                let addr = self.stack[self.sp];
                self.sp = (self.sp + STACK_SIZE - 1) % STACK_SIZE;
                self.jump(addr);
            }
            // Machine code routines are not supported
            Op::Sys => self.next(1),
            Op::Jp => self.jump(nnn),
            Op::Call => {
                self.sp = (self.sp + 1) % STACK_SIZE;
                self.stack[self.sp] = self.pc.wrapping_add(2);
                self.jump(nnn);
            }
            Op::SeByte => self.skip_if(self.v[x] == kk),
            Op::SneByte => self.skip_if(self.v[x] != kk),
            Op::SeReg => self.skip_if(self.v[x] == self.v[y]),
            Op::LdByte => {
                self.v[x] = kk;
                self.next(1);
            }
            Op::AddByte => {
                self.v[x] = self.v[x].wrapping_add(kk);
                self.next(1);
            }
            Op::LdReg => self.alu(x, |_, vy| (vy, None), y),
            Op::Or => self.alu(x, |vx, vy| (vx | vy, None), y),
            Op::And => self.alu(x, |vx, vy| (vx & vy, None), y),
            Op::Xor => self.alu(x, |vx, vy| (vx ^ vy, None), y),
            Op::AddReg => self.alu(
                x,
                |vx, vy| {
                    let (sum, carry) = vx.overflowing_add(vy);
                    (sum, Some(carry as u8))
                },
                y,
            ),
            Op::Sub => self.alu(x, |vx, vy| (vx.wrapping_sub(vy), Some((vx > vy) as u8)), y),
            Op::Shr => self.alu(x, |vx, _| (vx >> 1, Some(vx & 0x1)), y),
            Op::Subn => self.alu(x, |vx, vy| (vy.wrapping_sub(vx), Some((vy > vx) as u8)), y),
            Op::Shl => self.alu(x, |vx, _| (vx << 1, Some(vx >> 7)), y),
            Op::SneReg => self.skip_if(self.v[x] != self.v[y]),
            Op::LdI => {
                self.i = nnn;
                self.next(1);
            }
            Op::JpV0 => self.jump(nnn.wrapping_add(self.v[0] as u16)),
            Op::Rnd => {
                self.v[x] = (OsRng.next_u32() as u8) & kk;
                self.next(1);
            }
            Op::Drw => {
                self.draw(x, y, w.n());
                self.next(1);
            }
            Op::Skp => self.skip_if(self.keypad.is_pressed(self.v[x])),
            Op::Sknp => self.skip_if(!self.keypad.is_pressed(self.v[x])),
            Op::LdFromDt => {
                self.v[x] = self.dt;
                self.next(1);
            }
            Op::LdKey => {
                // Busy-wait: re-executed until a key is down
                if let Some(key) = self.keypad.next_pressed() {
                    self.v[x] = key;
                    self.next(1);
                }
            }
            Op::LdToDt => {
                self.dt = self.v[x];
                self.next(1);
            }
            Op::LdToSt => {
                self.st = self.v[x];
                self.next(1);
            }
            Op::AddI => {
                self.i = self.i.wrapping_add(self.v[x] as u16) % 0x100;
                self.next(1);
            }
            Op::LdFont => {
                self.i = self.v[x] as u16 * FONT_SIZE;
                self.next(1);
            }
            Op::LdBcd => {
                let value = self.v[x];
                self.write(self.i, value / 100);
                self.write(self.i.wrapping_add(1), value % 100 / 10);
                self.write(self.i.wrapping_add(2), value % 10);
                self.next(1);
            }
            Op::Store => {
                for r in 0..=x {
                    self.write(self.i.wrapping_add(r as u16), self.v[r]);
                }
                self.next(1);
            }
            Op::Load => {
                for r in 0..=x {
                    self.v[r] = self.read(self.i.wrapping_add(r as u16));
                }
                self.next(1);
            }
        }
    }

    /// `Vx = f(Vx, Vy)`, writing VF first if `f` produces a flag.
    fn alu<F>(&mut self, x: usize, f: F, y: usize)
    where
        F: Fn(u8, u8) -> (u8, Option<u8>),
    {
        let (value, flag) = f(self.v[x], self.v[y]);
        if let Some(flag) = flag {
            self.v[0xF] = flag;
        }
        self.v[x] = value;
        self.next(1);
    }

    fn draw(&mut self, x: usize, y: usize, height: u8) {
        let mut collision = false;
        for row in 0..height as u16 {
            let sprite = self.read(self.i.wrapping_add(row));
            for col in 0..8 {
                let px = (self.v[x] as usize + col) % WIDTH;
                let py = (self.v[y] as usize + row as usize) % HEIGHT;
                let on = sprite & (0x80 >> col) != 0;
                collision |= self.display.xor_pixel(px as u8, py as u8, on);
            }
        }
        self.v[0xF] = collision as u8;
    }

    #[inline]
    fn next(&mut self, words: u16) {
        self.pc = self.pc.wrapping_add(words * 2);
    }

    #[inline]
    fn skip_if(&mut self, condition: bool) {
        self.next(if condition { 2 } else { 1 });
    }

    #[inline]
    fn jump(&mut self, addr: u16) {
        // Keep the program counter word-aligned
        self.pc = addr & 0xFFFE;
    }

    #[inline]
    fn read(&self, addr: u16) -> u8 {
        self.mem[addr as usize % MEMORY_SIZE]
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        self.mem[addr as usize % MEMORY_SIZE] = value;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Set the program counter. Odd addresses are rejected.
    pub fn set_pc(&mut self, pc: u16) -> bool {
        if pc % 2 != 0 {
            return false;
        }
        self.pc = pc;
        true
    }

    pub fn v(&self, index: usize) -> u8 {
        self.v[index & 0xF]
    }

    pub fn set_v(&mut self, index: usize, value: u8) {
        self.v[index & 0xF] = value;
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn set_i(&mut self, value: u16) {
        self.i = value;
    }

    pub fn dt(&self) -> u8 {
        self.dt
    }

    pub fn set_dt(&mut self, value: u8) {
        self.dt = value;
    }

    pub fn st(&self) -> u8 {
        self.st
    }

    pub fn set_st(&mut self, value: u8) {
        self.st = value;
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn set_sp(&mut self, value: usize) {
        self.sp = value % STACK_SIZE;
    }

    pub fn stack(&self) -> &[u16; STACK_SIZE] {
        &self.stack
    }

    pub fn memory(&self) -> &[u8] {
        &self.mem[..]
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        &mut self.breakpoints
    }

    pub fn breakpoints_enabled(&self) -> bool {
        self.breakpoints_enabled
    }

    pub fn set_breakpoints_enabled(&mut self, enabled: bool) {
        self.breakpoints_enabled = enabled;
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn keypad(&self) -> &K {
        &self.keypad
    }

    pub fn keypad_mut(&mut self) -> &mut K {
        &mut self.keypad
    }
}
