use crate::air::{Operand, Shape};
use crate::expr;

/// One encoding alternative of a mnemonic.
pub struct Form {
    pub shapes: &'static [Shape],
    /// Receives the operand values in order.
    pub encode: fn(&[u16]) -> u16,
}

use Shape::*;

/// Alternatives are tried in order; the first whose shapes all fit is used.
static TABLE: &[(&str, &[Form])] = &[
    (
        "ADD",
        &[
            Form { shapes: &[I, V], encode: |v| 0xF01E | v[1] << 8 },
            Form { shapes: &[V, Byte], encode: |v| 0x7000 | v[0] << 8 | v[1] },
            Form { shapes: &[V, V], encode: |v| 0x8004 | v[0] << 8 | v[1] << 4 },
        ],
    ),
    ("AND", &[Form { shapes: &[V, V], encode: |v| 0x8002 | v[0] << 8 | v[1] << 4 }]),
    ("CALL", &[Form { shapes: &[Addr], encode: |v| 0x2000 | v[0] }]),
    ("CLS", &[Form { shapes: &[], encode: |_| 0x00E0 }]),
    (
        "DRW",
        &[Form {
            shapes: &[V, V, Nibble],
            encode: |v| 0xD000 | v[0] << 8 | v[1] << 4 | v[2],
        }],
    ),
    (
        "JP",
        &[
            Form { shapes: &[Addr], encode: |v| 0x1000 | v[0] },
            Form { shapes: &[V0, Addr], encode: |v| 0xB000 | v[1] },
        ],
    ),
    (
        "LD",
        &[
            Form { shapes: &[B, V], encode: |v| 0xF033 | v[1] << 8 },
            Form { shapes: &[Dt, V], encode: |v| 0xF015 | v[1] << 8 },
            Form { shapes: &[F, V], encode: |v| 0xF029 | v[1] << 8 },
            Form { shapes: &[I, Addr], encode: |v| 0xA000 | v[1] },
            Form { shapes: &[IndirectI, V], encode: |v| 0xF055 | v[1] << 8 },
            Form { shapes: &[St, V], encode: |v| 0xF018 | v[1] << 8 },
            Form { shapes: &[V, Byte], encode: |v| 0x6000 | v[0] << 8 | v[1] },
            Form { shapes: &[V, Dt], encode: |v| 0xF007 | v[0] << 8 },
            Form { shapes: &[V, IndirectI], encode: |v| 0xF065 | v[0] << 8 },
            Form { shapes: &[V, K], encode: |v| 0xF00A | v[0] << 8 },
            Form { shapes: &[V, V], encode: |v| 0x8000 | v[0] << 8 | v[1] << 4 },
        ],
    ),
    ("OR", &[Form { shapes: &[V, V], encode: |v| 0x8001 | v[0] << 8 | v[1] << 4 }]),
    ("RET", &[Form { shapes: &[], encode: |_| 0x00EE }]),
    ("RND", &[Form { shapes: &[V, Byte], encode: |v| 0xC000 | v[0] << 8 | v[1] }]),
    (
        "SE",
        &[
            Form { shapes: &[V, Byte], encode: |v| 0x3000 | v[0] << 8 | v[1] },
            Form { shapes: &[V, V], encode: |v| 0x5000 | v[0] << 8 | v[1] << 4 },
        ],
    ),
    (
        "SHL",
        &[
            Form { shapes: &[V], encode: |v| 0x800E | v[0] << 8 },
            Form { shapes: &[V, V], encode: |v| 0x800E | v[0] << 8 | v[1] << 4 },
        ],
    ),
    (
        "SHR",
        &[
            Form { shapes: &[V], encode: |v| 0x8006 | v[0] << 8 },
            Form { shapes: &[V, V], encode: |v| 0x8006 | v[0] << 8 | v[1] << 4 },
        ],
    ),
    ("SKNP", &[Form { shapes: &[V], encode: |v| 0xE0A1 | v[0] << 8 }]),
    ("SKP", &[Form { shapes: &[V], encode: |v| 0xE09E | v[0] << 8 }]),
    (
        "SNE",
        &[
            Form { shapes: &[V, Byte], encode: |v| 0x4000 | v[0] << 8 | v[1] },
            Form { shapes: &[V, V], encode: |v| 0x9000 | v[0] << 8 | v[1] << 4 },
        ],
    ),
    ("SUB", &[Form { shapes: &[V, V], encode: |v| 0x8005 | v[0] << 8 | v[1] << 4 }]),
    ("SUBN", &[Form { shapes: &[V, V], encode: |v| 0x8007 | v[0] << 8 | v[1] << 4 }]),
    ("SYS", &[Form { shapes: &[Addr], encode: |v| v[0] }]),
    ("XOR", &[Form { shapes: &[V, V], encode: |v| 0x8003 | v[0] << 8 | v[1] << 4 }]),
];

/// Encoding alternatives for a mnemonic, if it is known.
pub fn forms(mnemonic: &str) -> Option<&'static [Form]> {
    TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(mnemonic))
        .map(|(_, forms)| *forms)
}

/// Encode a mnemonic and its (resolved) operands into a word.
///
/// A numeric mnemonic without operands is taken as a raw word.
pub fn encode(mnemonic: &str, operands: &[Operand]) -> Option<u16> {
    if operands.is_empty() {
        if let Some(raw) = expr::eval(mnemonic) {
            return u16::try_from(raw).ok();
        }
    }

    let form = forms(mnemonic)?.iter().find(|form| {
        form.shapes.len() == operands.len()
            && form
                .shapes
                .iter()
                .zip(operands)
                .all(|(shape, operand)| operand.fits(*shape))
    })?;
    let values: Vec<u16> = operands.iter().map(Operand::value).collect();
    Some((form.encode)(&values))
}
