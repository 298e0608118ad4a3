use core::fmt;
use static_assertions::{const_assert, const_assert_eq};

/// Returns the number of operand bytes which follow the given opcode
///
/// This is encoded in the top two bits of the instruction.
#[inline]
pub const fn operand_count(ir: u8) -> u8 {
    ir >> 6
}

/// Checks whether the instruction sets `PC` itself
///
/// If bit 4 is set, the run loop does not advance `PC` after the handler
/// returns.
#[inline]
pub const fn sets_pc(ir: u8) -> bool {
    (ir >> 4) & 1 != 0
}

/// Checks whether the instruction is executed by the ALU (bit 5)
#[inline]
pub const fn uses_alu(ir: u8) -> bool {
    (ir >> 5) & 1 != 0
}

/// Instructions understood by the CPU
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Halt the CPU and exit
    Hlt = 0b0000_0001,
    /// Load an immediate into a register
    Ldi = 0b1000_0010,
    /// Print a register as a decimal integer
    Prn = 0b0100_0111,
    /// Add two registers
    Add = 0b1010_0000,
    /// Multiply two registers
    Mul = 0b1010_0010,
    /// Compare two registers, setting flags
    Cmp = 0b1010_0111,
    /// Bitwise-and two registers
    And = 0b1010_1000,
    /// Push a register onto the stack
    Push = 0b0100_0101,
    /// Pop the top of the stack into a register
    Pop = 0b0100_0110,
    /// Call the subroutine at the address in a register
    Call = 0b0101_0000,
    /// Return from a subroutine
    Ret = 0b0001_0001,
    /// Jump to the address in a register
    Jmp = 0b0101_0100,
    /// Jump if the `EQUAL` flag is set
    Jeq = 0b0101_0101,
    /// Jump if the `EQUAL` flag is clear
    Jne = 0b0101_0110,
}

impl Opcode {
    /// Every opcode, in encoding table order
    pub const ALL: [Opcode; 14] = [
        Opcode::Hlt,
        Opcode::Ldi,
        Opcode::Prn,
        Opcode::Add,
        Opcode::Mul,
        Opcode::Cmp,
        Opcode::And,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Jmp,
        Opcode::Jeq,
        Opcode::Jne,
    ];

    /// Decodes an instruction byte, returning `None` if it has no handler
    #[inline]
    pub const fn from_byte(ir: u8) -> Option<Self> {
        let op = match ir {
            0b0000_0001 => Opcode::Hlt,
            0b1000_0010 => Opcode::Ldi,
            0b0100_0111 => Opcode::Prn,
            0b1010_0000 => Opcode::Add,
            0b1010_0010 => Opcode::Mul,
            0b1010_0111 => Opcode::Cmp,
            0b1010_1000 => Opcode::And,
            0b0100_0101 => Opcode::Push,
            0b0100_0110 => Opcode::Pop,
            0b0101_0000 => Opcode::Call,
            0b0001_0001 => Opcode::Ret,
            0b0101_0100 => Opcode::Jmp,
            0b0101_0101 => Opcode::Jeq,
            0b0101_0110 => Opcode::Jne,
            _ => return None,
        };
        Some(op)
    }

    /// Returns the encoded instruction byte
    #[inline]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Returns the number of operand bytes for this opcode
    #[inline]
    pub const fn operands(self) -> u8 {
        operand_count(self as u8)
    }

    /// Returns the assembly mnemonic, e.g. `"LDI"`
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Ldi => "LDI",
            Opcode::Prn => "PRN",
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Cmp => "CMP",
            Opcode::And => "AND",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// The run loop trusts these bits instead of special-casing opcodes
const_assert_eq!(operand_count(Opcode::Hlt as u8), 0);
const_assert_eq!(operand_count(Opcode::Ret as u8), 0);
const_assert_eq!(operand_count(Opcode::Prn as u8), 1);
const_assert_eq!(operand_count(Opcode::Push as u8), 1);
const_assert_eq!(operand_count(Opcode::Pop as u8), 1);
const_assert_eq!(operand_count(Opcode::Call as u8), 1);
const_assert_eq!(operand_count(Opcode::Jmp as u8), 1);
const_assert_eq!(operand_count(Opcode::Jeq as u8), 1);
const_assert_eq!(operand_count(Opcode::Jne as u8), 1);
const_assert_eq!(operand_count(Opcode::Ldi as u8), 2);
const_assert_eq!(operand_count(Opcode::Add as u8), 2);
const_assert_eq!(operand_count(Opcode::Mul as u8), 2);
const_assert_eq!(operand_count(Opcode::Cmp as u8), 2);
const_assert_eq!(operand_count(Opcode::And as u8), 2);

const_assert!(sets_pc(Opcode::Call as u8));
const_assert!(sets_pc(Opcode::Ret as u8));
const_assert!(sets_pc(Opcode::Jmp as u8));
const_assert!(sets_pc(Opcode::Jeq as u8));
const_assert!(sets_pc(Opcode::Jne as u8));
const_assert!(!sets_pc(Opcode::Hlt as u8));
const_assert!(!sets_pc(Opcode::Ldi as u8));
const_assert!(!sets_pc(Opcode::Prn as u8));
const_assert!(!sets_pc(Opcode::Push as u8));
const_assert!(!sets_pc(Opcode::Pop as u8));

const_assert!(uses_alu(Opcode::Add as u8));
const_assert!(uses_alu(Opcode::Mul as u8));
const_assert!(uses_alu(Opcode::Cmp as u8));
const_assert!(uses_alu(Opcode::And as u8));
const_assert!(!sets_pc(Opcode::Add as u8));
const_assert!(!sets_pc(Opcode::Mul as u8));
const_assert!(!sets_pc(Opcode::Cmp as u8));
const_assert!(!sets_pc(Opcode::And as u8));

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_roundtrip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(op.byte()), Some(op), "{op}");
        }
        let known = (0..=255u8)
            .filter(|&b| Opcode::from_byte(b).is_some())
            .count();
        assert_eq!(known, Opcode::ALL.len());
        assert_eq!(Opcode::from_byte(0), None);
    }

    #[test]
    fn operand_counts() {
        let expected = [
            ("HLT", 0),
            ("LDI", 2),
            ("PRN", 1),
            ("ADD", 2),
            ("MUL", 2),
            ("CMP", 2),
            ("AND", 2),
            ("PUSH", 1),
            ("POP", 1),
            ("CALL", 1),
            ("RET", 0),
            ("JMP", 1),
            ("JEQ", 1),
            ("JNE", 1),
        ];
        for (op, (name, n)) in Opcode::ALL.iter().zip(expected) {
            assert_eq!(op.mnemonic(), name);
            assert_eq!(op.operands(), n, "{name}");
        }
    }

    #[test]
    fn alu_bit() {
        let alu: Vec<_> = Opcode::ALL
            .into_iter()
            .filter(|op| uses_alu(op.byte()))
            .map(|op| op.mnemonic())
            .collect();
        assert_eq!(alu, ["ADD", "MUL", "CMP", "AND"]);
    }
}
