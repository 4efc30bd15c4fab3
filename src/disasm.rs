use crate::opcode::{decode, Op, Word};

/// Render a word as assembly text which assembles back to the same word.
///
/// Words without an operation are rendered as a raw hex literal.
pub fn disassemble(word: u16) -> String {
    let w = Word(word);
    let (x, y, n, kk, nnn) = (w.x(), w.y(), w.n(), w.kk(), w.nnn());
    let Some(op) = decode(word) else {
        return w.to_string();
    };
    match op {
        Op::Cls => "CLS".to_string(),
        Op::Ret => "RET".to_string(),
        Op::Sys => format!("SYS 0x{:03X}", nnn),
        Op::Jp => format!("JP 0x{:03X}", nnn),
        Op::Call => format!("CALL 0x{:03X}", nnn),
        Op::SeByte => format!("SE V{:X}, 0x{:02X}", x, kk),
        Op::SneByte => format!("SNE V{:X}, 0x{:02X}", x, kk),
        Op::SeReg => format!("SE V{:X}, V{:X}", x, y),
        Op::LdByte => format!("LD V{:X}, 0x{:02X}", x, kk),
        Op::AddByte => format!("ADD V{:X}, 0x{:02X}", x, kk),
        Op::LdReg => format!("LD V{:X}, V{:X}", x, y),
        Op::Or => format!("OR V{:X}, V{:X}", x, y),
        Op::And => format!("AND V{:X}, V{:X}", x, y),
        Op::Xor => format!("XOR V{:X}, V{:X}", x, y),
        Op::AddReg => format!("ADD V{:X}, V{:X}", x, y),
        Op::Sub => format!("SUB V{:X}, V{:X}", x, y),
        Op::Subn => format!("SUBN V{:X}, V{:X}", x, y),
        Op::Shr | Op::Shl => {
            let name = if op == Op::Shr { "SHR" } else { "SHL" };
            // Vy is ignored when executing, only kept for a faithful round trip
            if y == 0 {
                format!("{} V{:X}", name, x)
            } else {
                format!("{} V{:X}, V{:X}", name, x, y)
            }
        }
        Op::SneReg => format!("SNE V{:X}, V{:X}", x, y),
        Op::LdI => format!("LD I, 0x{:03X}", nnn),
        Op::JpV0 => format!("JP V0, 0x{:03X}", nnn),
        Op::Rnd => format!("RND V{:X}, 0x{:02X}", x, kk),
        Op::Drw => format!("DRW V{:X}, V{:X}, 0x{:X}", x, y, n),
        Op::Skp => format!("SKP V{:X}", x),
        Op::Sknp => format!("SKNP V{:X}", x),
        Op::LdFromDt => format!("LD V{:X}, DT", x),
        Op::LdKey => format!("LD V{:X}, K", x),
        Op::LdToDt => format!("LD DT, V{:X}", x),
        Op::LdToSt => format!("LD ST, V{:X}", x),
        Op::AddI => format!("ADD I, V{:X}", x),
        Op::LdFont => format!("LD F, V{:X}", x),
        Op::LdBcd => format!("LD B, V{:X}", x),
        Op::Store => format!("LD [I], V{:X}", x),
        Op::Load => format!("LD V{:X}, [I]", x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::assemble;

    #[test]
    fn sys() {
        assert_eq!(disassemble(0x0000), "SYS 0x000");
        assert_eq!(disassemble(0x0111), "SYS 0x111");
        assert_eq!(disassemble(0x01FA), "SYS 0x1FA");
        assert_eq!(disassemble(0x0FFF), "SYS 0xFFF");
    }

    #[test]
    fn operand_widths() {
        assert_eq!(disassemble(0x7056), "ADD V0, 0x56");
        assert_eq!(disassemble(0x1000), "JP 0x000");
        assert_eq!(disassemble(0x6005), "LD V0, 0x05");
        assert_eq!(disassemble(0x64FF), "LD V4, 0xFF");
        assert_eq!(disassemble(0xF455), "LD [I], V4");
        assert_eq!(disassemble(0x4443), "SNE V4, 0x43");
        assert_eq!(disassemble(0xD123), "DRW V1, V2, 0x3");
        assert_eq!(disassemble(0xB2A0), "JP V0, 0x2A0");
    }

    #[test]
    fn shifts() {
        assert_eq!(disassemble(0x8306), "SHR V3");
        assert_eq!(disassemble(0x834E), "SHL V3, V4");
    }

    #[test]
    fn raw_fallback() {
        assert_eq!(disassemble(0x5121), "0x5121");
        assert_eq!(disassemble(0xFFFF), "0xFFFF");
    }

    #[test]
    fn round_trip_through_assembler() {
        let words = [
            0x00E0, 0x00EE, 0x0123, 0x1ABC, 0x2FFF, 0x3A12, 0x4B00, 0x5CD0, 0x6E7F, 0x7F01,
            0x8120, 0x8121, 0x8122, 0x8123, 0x8124, 0x8125, 0x8106, 0x8127, 0x812E, 0x9120,
            0xA321, 0xB400, 0xC5AA, 0xD67F, 0xE79E, 0xE8A1, 0xF907, 0xFA0A, 0xFB15, 0xFC18,
            0xFD1E, 0xFE29, 0xF033, 0xF155, 0xF265, 0x5121,
        ];
        for word in words {
            let text = disassemble(word);
            assert_eq!(assemble(&text), Ok(vec![word]), "{}", text);
        }
    }
}
