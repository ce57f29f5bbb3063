//! Décodage des mots d'instruction : table des opcodes et modes de paramètre.

use core::fmt;

use crate::error::Fault;

/// Plus grand nombre de paramètres d'un opcode.
pub const MAX_PARAMS: usize = 3;

/* ─────────────────────────── Modes ─────────────────────────── */

/// Mode d'adressage d'un paramètre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// L'opérande est une adresse.
    #[default]
    Position,
    /// L'opérande est la valeur elle-même.
    Immediate,
    /// L'opérande est une adresse décalée par la base relative.
    Relative,
}

impl Mode {
    /// Mode pour un chiffre décimal.
    pub const fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(Self::Position),
            1 => Some(Self::Immediate),
            2 => Some(Self::Relative),
            _ => None,
        }
    }
}

/* ─────────────────────────── Opcodes ─────────────────────────── */

/// Jeu d'instructions (fixe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    /// `dst = a + b`
    Add = 1,
    /// `dst = a * b`
    Mul = 2,
    /// `dst = <input>`
    Input = 3,
    /// `<output> = a`
    Output = 4,
    /// `if a != 0 { ip = b }`
    JumpIfTrue = 5,
    /// `if a == 0 { ip = b }`
    JumpIfFalse = 6,
    /// `dst = (a < b) as i64`
    LessThan = 7,
    /// `dst = (a == b) as i64`
    Equals = 8,
    /// `base += a`
    AdjustBase = 9,
    /// Arrêt.
    Halt = 99,
}

impl Opcode {
    /// Opcode des deux chiffres de poids faible d'un mot d'instruction.
    pub const fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => Self::Add,
            2 => Self::Mul,
            3 => Self::Input,
            4 => Self::Output,
            5 => Self::JumpIfTrue,
            6 => Self::JumpIfFalse,
            7 => Self::LessThan,
            8 => Self::Equals,
            9 => Self::AdjustBase,
            99 => Self::Halt,
            _ => return None,
        })
    }

    /// Nombre de paramètres qui suivent le mot d'instruction.
    pub const fn param_count(self) -> usize {
        match self {
            Self::Add | Self::Mul | Self::LessThan | Self::Equals => 3,
            Self::JumpIfTrue | Self::JumpIfFalse => 2,
            Self::Input | Self::Output | Self::AdjustBase => 1,
            Self::Halt => 0,
        }
    }

    /// Index du paramètre écrit, s'il y en a un.
    pub const fn dst_index(self) -> Option<usize> {
        match self {
            Self::Add | Self::Mul | Self::LessThan | Self::Equals => Some(2),
            Self::Input => Some(0),
            _ => None,
        }
    }

    /// Distance jusqu'à l'instruction suivante quand aucun saut n'est pris.
    pub const fn width(self) -> usize { self.param_count() + 1 }

    /// Mnémonique court, utilisé dans les traces.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Mul => "mul",
            Self::Input => "in",
            Self::Output => "out",
            Self::JumpIfTrue => "jnz",
            Self::JumpIfFalse => "jz",
            Self::LessThan => "lt",
            Self::Equals => "eq",
            Self::AdjustBase => "arb",
            Self::Halt => "halt",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.mnemonic()) }
}

/* ─────────────────────────── Instruction ─────────────────────────── */

/// Un mot d'instruction décodé.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Opération à effectuer.
    pub opcode: Opcode,
    modes: [Mode; MAX_PARAMS],
}

impl Instruction {
    /// Décode `word`, la valeur à `ip`.
    ///
    /// Seuls les chiffres des paramètres déclarés sont lus ; les chiffres plus
    /// hauts sont ignorés. Une destination en mode immédiat est refusée ici,
    /// avant toute lecture d'opérande.
    pub fn decode(word: i64, ip: usize) -> Result<Self, Fault> {
        if word < 0 {
            return Err(Fault::UnknownOpcode { opcode: word % 100, ip });
        }
        let code = word % 100;
        let opcode = Opcode::from_code(code).ok_or(Fault::UnknownOpcode { opcode: code, ip })?;

        let mut modes = [Mode::Position; MAX_PARAMS];
        let mut digits = word / 100;
        for slot in modes.iter_mut().take(opcode.param_count()) {
            let digit = digits % 10;
            *slot = Mode::from_digit(digit).ok_or(Fault::InvalidMode { mode: digit, ip })?;
            digits /= 10;
        }
        if let Some(dst) = opcode.dst_index() {
            if modes[dst] == Mode::Immediate {
                return Err(Fault::ImmediateWrite { ip });
            }
        }
        Ok(Self { opcode, modes })
    }

    /// Mode du paramètre `index` (à partir de 0).
    #[inline]
    pub fn mode(&self, index: usize) -> Mode { self.modes[index] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn decodes_modes_least_significant_first() -> Result<(), Fault> {
        let i = Instruction::decode(1002, 0)?;
        assert_eq!(i.opcode, Opcode::Mul);
        assert_eq!(i.mode(0), Mode::Position);
        assert_eq!(i.mode(1), Mode::Immediate);
        assert_eq!(i.mode(2), Mode::Position);

        let i = Instruction::decode(21_107, 0)?;
        assert_eq!(i.opcode, Opcode::LessThan);
        assert_eq!([i.mode(0), i.mode(1), i.mode(2)], [Mode::Immediate, Mode::Immediate, Mode::Relative]);
        Ok(())
    }

    #[test]
    fn unknown_and_negative_words_fault() {
        assert_eq!(Instruction::decode(42, 5), Err(Fault::UnknownOpcode { opcode: 42, ip: 5 }));
        assert_eq!(Instruction::decode(0, 0), Err(Fault::UnknownOpcode { opcode: 0, ip: 0 }));
        assert_eq!(Instruction::decode(-1, 3), Err(Fault::UnknownOpcode { opcode: -1, ip: 3 }));
    }

    #[test]
    fn bad_mode_digit_faults() {
        assert_eq!(Instruction::decode(301, 9), Err(Fault::InvalidMode { mode: 3, ip: 9 }));
        // chiffre au-delà des paramètres déclarés : jamais lu
        assert!(Instruction::decode(30_004, 0).is_ok());
        assert!(Instruction::decode(399, 0).is_ok());
    }

    #[test]
    fn immediate_destination_is_rejected_at_decode() {
        assert_eq!(Instruction::decode(103, 4), Err(Fault::ImmediateWrite { ip: 4 }));
        assert_eq!(Instruction::decode(10_001, 0), Err(Fault::ImmediateWrite { ip: 0 }));
        assert_eq!(Instruction::decode(11_108, 2), Err(Fault::ImmediateWrite { ip: 2 }));
        // sources immédiates OK ; sauts et sortie n'ont pas de destination
        assert!(Instruction::decode(1_101, 0).is_ok());
        assert!(Instruction::decode(104, 0).is_ok());
        assert!(Instruction::decode(1_105, 0).is_ok());
    }

    #[test]
    fn widths_follow_param_counts() {
        assert_eq!(Opcode::Add.width(), 4);
        assert_eq!(Opcode::JumpIfFalse.width(), 3);
        assert_eq!(Opcode::AdjustBase.width(), 2);
        assert_eq!(Opcode::Halt.width(), 1);
    }

    proptest! {
        #[test]
        fn decode_recovers_encoded_modes(
            code in prop::sample::select(vec![1i64, 2, 3, 4, 5, 6, 7, 8, 9, 99]),
            m in prop::array::uniform3(0i64..3),
        ) {
            let word = code + 100 * m[0] + 1_000 * m[1] + 10_000 * m[2];
            let opcode = Opcode::from_code(code).unwrap();
            prop_assume!(opcode.dst_index().map_or(true, |d| m[d] != 1));
            let instr = Instruction::decode(word, 0).unwrap();
            prop_assert_eq!(instr.opcode as i64, code);
            for i in 0..instr.opcode.param_count() {
                prop_assert_eq!(Some(instr.mode(i)), Mode::from_digit(m[i]));
            }
        }
    }
}
