use chasm::{assemble, disassemble, Cpu};
use proptest::prelude::*;

/// Words which neither jump, skip, wait for a key nor write to memory.
fn straight_line_word() -> impl Strategy<Value = u16> {
    let x = 0u16..16;
    let y = 0u16..16;
    prop_oneof![
        Just(0x00E0),
        (x.clone(), any::<u8>()).prop_map(|(x, kk)| 0x6000 | x << 8 | kk as u16),
        (x.clone(), any::<u8>()).prop_map(|(x, kk)| 0x7000 | x << 8 | kk as u16),
        (x.clone(), y, prop::sample::select(vec![0u16, 1, 2, 3, 4, 5, 6, 7, 0xE]))
            .prop_map(|(x, y, n)| 0x8000 | x << 8 | y << 4 | n),
        (0u16..0x1000).prop_map(|nnn| 0xA000 | nnn),
        (x.clone(), any::<u8>()).prop_map(|(x, kk)| 0xC000 | x << 8 | kk as u16),
        (x, prop::sample::select(vec![0x07u16, 0x15, 0x18, 0x1E, 0x29, 0x65]))
            .prop_map(|(x, low)| 0xF000 | x << 8 | low),
    ]
}

proptest! {
    #[test]
    fn straight_line_code_advances_by_words(words in prop::collection::vec(straight_line_word(), 1..64)) {
        let mut cpu = Cpu::default();
        cpu.load(&words).unwrap();
        for _ in 0..words.len() {
            cpu.step();
        }
        prop_assert_eq!(cpu.pc() as usize, 0x200 + 2 * words.len());
    }

    #[test]
    fn program_counter_stays_even(words in prop::collection::vec(any::<u16>(), 1..64), steps in 1usize..256) {
        let mut cpu = Cpu::default();
        cpu.load(&words).unwrap();
        // Key waits would stall forever
        cpu.keypad_mut().press(0);
        for _ in 0..steps {
            cpu.step();
            prop_assert_eq!(cpu.pc() % 2, 0);
        }
    }

    #[test]
    fn disassembly_reassembles(word in any::<u16>()) {
        let text = disassemble(word);
        prop_assert_eq!(assemble(&text).unwrap(), vec![word]);
    }
}
