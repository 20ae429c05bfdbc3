//! NCS opcode and operand-type encoding.
//!
//! Every instruction is one opcode byte plus one auxiliary byte selecting
//! the operand-type pairing, followed by big-endian operands. Opcodes are
//! data, not behaviour: the generator emits them through typed helpers and
//! the disassembler decodes them through [`operand_shape`], so neither
//! side grows a parallel format table.

/// Opcode bytes.
#[rustfmt::skip]
pub mod op {
    /// Copy the top of stack down to an SP-relative slot
    pub const CPDOWNSP: u8      = 0x01;
    /// Reserve a default-initialized stack slot (aux selects the type)
    pub const RSADD: u8         = 0x02;
    /// Copy an SP-relative range to the top of stack
    pub const CPTOPSP: u8       = 0x03;
    /// Push a constant (aux selects the type)
    pub const CONST: u8         = 0x04;
    /// Invoke an engine action: u16 action id, u8 argument count
    pub const ACTION: u8        = 0x05;
    /// Logical AND of two ints
    pub const LOGAND: u8        = 0x06;
    /// Logical OR of two ints
    pub const LOGOR: u8         = 0x07;
    /// Bitwise inclusive OR
    pub const INCOR: u8         = 0x08;
    /// Bitwise exclusive OR
    pub const EXCOR: u8         = 0x09;
    /// Bitwise AND
    pub const BOOLAND: u8       = 0x0A;
    /// Equality comparison
    pub const EQUAL: u8         = 0x0B;
    /// Inequality comparison
    pub const NEQUAL: u8        = 0x0C;
    /// Greater-or-equal
    pub const GEQ: u8           = 0x0D;
    /// Greater-than
    pub const GT: u8            = 0x0E;
    /// Less-than
    pub const LT: u8            = 0x0F;
    /// Less-or-equal
    pub const LEQ: u8           = 0x10;
    /// Shift left
    pub const SHLEFT: u8        = 0x11;
    /// Arithmetic shift right
    pub const SHRIGHT: u8       = 0x12;
    /// Unsigned shift right
    pub const USHRIGHT: u8      = 0x13;
    /// Addition / string concatenation / vector addition
    pub const ADD: u8           = 0x14;
    /// Subtraction
    pub const SUB: u8           = 0x15;
    /// Multiplication / vector scaling
    pub const MUL: u8           = 0x16;
    /// Division
    pub const DIV: u8           = 0x17;
    /// Modulus (int only)
    pub const MOD: u8           = 0x18;
    /// Arithmetic negation
    pub const NEG: u8           = 0x19;
    /// Bitwise complement
    pub const COMP: u8          = 0x1A;
    /// Adjust SP by a signed byte count (negative pops)
    pub const MOVSP: u8         = 0x1B;
    /// Legacy whole-stack state capture
    pub const STORE_STATEALL: u8 = 0x1C;
    /// Unconditional relative jump
    pub const JMP: u8           = 0x1D;
    /// Relative subroutine call
    pub const JSR: u8           = 0x1E;
    /// Jump if top of stack is zero (pops it)
    pub const JZ: u8            = 0x1F;
    /// Return from subroutine
    pub const RETN: u8          = 0x20;
    /// Pop a structure keeping one slice of it
    pub const DESTRUCT: u8      = 0x21;
    /// Logical NOT of an int
    pub const NOT: u8           = 0x22;
    /// Decrement an SP-relative int in place
    pub const DECISP: u8        = 0x23;
    /// Increment an SP-relative int in place
    pub const INCISP: u8        = 0x24;
    /// Jump if top of stack is non-zero (pops it)
    pub const JNZ: u8           = 0x25;
    /// Copy the top of stack down to a BP-relative slot
    pub const CPDOWNBP: u8      = 0x26;
    /// Copy a BP-relative range to the top of stack
    pub const CPTOPBP: u8       = 0x27;
    /// Decrement a BP-relative int in place
    pub const DECIBP: u8        = 0x28;
    /// Increment a BP-relative int in place
    pub const INCIBP: u8        = 0x29;
    /// Push BP and rebase it to SP (enters the global frame)
    pub const SAVEBP: u8        = 0x2A;
    /// Pop the saved BP
    pub const RESTOREBP: u8     = 0x2B;
    /// Capture stack state for a deferred action closure
    pub const STORE_STATE: u8   = 0x2C;
    /// No operation
    pub const NOP: u8           = 0x2D;
    /// Size record pseudo-opcode after the file header
    pub const SIZE: u8          = 0x42;
}

/// Auxiliary type-selector bytes.
#[rustfmt::skip]
pub mod aux {
    pub const NONE: u8          = 0x00;
    /// Raw stack range (copy/destruct operations)
    pub const STACK: u8         = 0x01;
    pub const INT: u8           = 0x03;
    pub const FLOAT: u8         = 0x04;
    pub const STRING: u8        = 0x05;
    pub const OBJECT: u8        = 0x06;
    /// Engine type n encodes as `ENGINE0 + n`
    pub const ENGINE0: u8       = 0x10;
    pub const INT_INT: u8       = 0x20;
    pub const FLOAT_FLOAT: u8   = 0x21;
    pub const OBJECT_OBJECT: u8 = 0x22;
    pub const STRING_STRING: u8 = 0x23;
    /// Structure pairing; carries an extra u16 byte count
    pub const STRUCT_STRUCT: u8 = 0x24;
    pub const INT_FLOAT: u8     = 0x25;
    pub const FLOAT_INT: u8     = 0x26;
    /// Engine pairing n encodes as `ENGINE0_PAIR + n`
    pub const ENGINE0_PAIR: u8  = 0x30;
    pub const VECTOR_VECTOR: u8 = 0x3A;
    pub const VECTOR_FLOAT: u8  = 0x3B;
    pub const FLOAT_VECTOR: u8  = 0x3C;
    /// STORE_STATE marker
    pub const STATE: u8         = 0x10;
}

/// 8-byte magic at offset 0.
pub const FILE_MAGIC: &[u8; 8] = b"NCS V1.0";

/// Offset of the first instruction: magic (8) + size record (5).
pub const HEADER_SIZE: u32 = 13;

/// Operand layout of one decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// No operands
    None,
    /// Signed 32-bit (MOVSP, INCISP family)
    Int32,
    /// Signed 32-bit jump displacement
    Rel32,
    /// i32 offset + u16 byte count (stack copies)
    OffsetSize,
    /// u16 total size + u16 offset + u16 kept size
    Destruct,
    /// u16 structure byte count (structure comparison)
    StructSize,
    /// Constant payload; layout depends on the aux byte
    Const,
    /// u16 action id + u8 argument count
    Action,
    /// u32 base-region size + u32 local-region size
    StoreState,
    /// u32 total file length
    Size,
}

/// Operand shape for an (opcode, aux) pair, or `None` for an unknown
/// opcode.
pub fn operand_shape(opcode: u8, aux_byte: u8) -> Option<OperandShape> {
    use OperandShape as S;
    Some(match opcode {
        op::CPDOWNSP | op::CPTOPSP | op::CPDOWNBP | op::CPTOPBP => S::OffsetSize,
        op::RSADD => S::None,
        op::CONST => S::Const,
        op::ACTION => S::Action,
        op::LOGAND | op::LOGOR | op::INCOR | op::EXCOR | op::BOOLAND => S::None,
        op::EQUAL | op::NEQUAL => {
            if aux_byte == aux::STRUCT_STRUCT {
                S::StructSize
            } else {
                S::None
            }
        }
        op::GEQ | op::GT | op::LT | op::LEQ => S::None,
        op::SHLEFT | op::SHRIGHT | op::USHRIGHT => S::None,
        op::ADD | op::SUB | op::MUL | op::DIV | op::MOD => S::None,
        op::NEG | op::COMP | op::NOT => S::None,
        op::MOVSP => S::Int32,
        op::JMP | op::JSR | op::JZ | op::JNZ => S::Rel32,
        op::RETN | op::SAVEBP | op::RESTOREBP | op::NOP => S::None,
        op::DESTRUCT => S::Destruct,
        op::DECISP | op::INCISP | op::DECIBP | op::INCIBP => S::Int32,
        op::STORE_STATE | op::STORE_STATEALL => S::StoreState,
        op::SIZE => S::Size,
        _ => return None,
    })
}

/// Base mnemonic of an opcode.
pub fn mnemonic(opcode: u8) -> &'static str {
    match opcode {
        op::CPDOWNSP => "CPDOWNSP",
        op::RSADD => "RSADD",
        op::CPTOPSP => "CPTOPSP",
        op::CONST => "CONST",
        op::ACTION => "ACTION",
        op::LOGAND => "LOGAND",
        op::LOGOR => "LOGOR",
        op::INCOR => "INCOR",
        op::EXCOR => "EXCOR",
        op::BOOLAND => "BOOLAND",
        op::EQUAL => "EQUAL",
        op::NEQUAL => "NEQUAL",
        op::GEQ => "GEQ",
        op::GT => "GT",
        op::LT => "LT",
        op::LEQ => "LEQ",
        op::SHLEFT => "SHLEFT",
        op::SHRIGHT => "SHRIGHT",
        op::USHRIGHT => "USHRIGHT",
        op::ADD => "ADD",
        op::SUB => "SUB",
        op::MUL => "MUL",
        op::DIV => "DIV",
        op::MOD => "MOD",
        op::NEG => "NEG",
        op::COMP => "COMP",
        op::MOVSP => "MOVSP",
        op::STORE_STATEALL => "STORESTATEALL",
        op::JMP => "JMP",
        op::JSR => "JSR",
        op::JZ => "JZ",
        op::RETN => "RETN",
        op::DESTRUCT => "DESTRUCT",
        op::NOT => "NOT",
        op::DECISP => "DECISP",
        op::INCISP => "INCISP",
        op::JNZ => "JNZ",
        op::CPDOWNBP => "CPDOWNBP",
        op::CPTOPBP => "CPTOPBP",
        op::DECIBP => "DECIBP",
        op::INCIBP => "INCIBP",
        op::SAVEBP => "SAVEBP",
        op::RESTOREBP => "RESTOREBP",
        op::STORE_STATE => "STORESTATE",
        op::NOP => "NOP",
        op::SIZE => "T",
        _ => "??",
    }
}

/// Type suffix spelled by an aux byte (`CONST` + `I` = `CONSTI`).
pub fn aux_suffix(aux_byte: u8) -> &'static str {
    match aux_byte {
        aux::NONE | aux::STACK => "",
        aux::INT => "I",
        aux::FLOAT => "F",
        aux::STRING => "S",
        aux::OBJECT => "O",
        aux::INT_INT => "II",
        aux::FLOAT_FLOAT => "FF",
        aux::OBJECT_OBJECT => "OO",
        aux::STRING_STRING => "SS",
        aux::STRUCT_STRUCT => "TT",
        aux::INT_FLOAT => "IF",
        aux::FLOAT_INT => "FI",
        aux::VECTOR_VECTOR => "VV",
        aux::VECTOR_FLOAT => "VF",
        aux::FLOAT_VECTOR => "FV",
        aux::STATE => "",
        b if (aux::ENGINE0..aux::ENGINE0 + 10).contains(&b) => {
            const NAMES: [&str; 10] = [
                "E0", "E1", "E2", "E3", "E4", "E5", "E6", "E7", "E8", "E9",
            ];
            NAMES[(b - aux::ENGINE0) as usize]
        }
        b if (aux::ENGINE0_PAIR..aux::ENGINE0_PAIR + 10).contains(&b) => {
            const NAMES: [&str; 10] = [
                "E0E0", "E1E1", "E2E2", "E3E3", "E4E4", "E5E5", "E6E6", "E7E7", "E8E8", "E9E9",
            ];
            NAMES[(b - aux::ENGINE0_PAIR) as usize]
        }
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics() {
        assert_eq!(mnemonic(op::CONST), "CONST");
        assert_eq!(mnemonic(op::JSR), "JSR");
        assert_eq!(mnemonic(0xF0), "??");
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(aux_suffix(aux::INT), "I");
        assert_eq!(aux_suffix(aux::INT_FLOAT), "IF");
        assert_eq!(aux_suffix(aux::ENGINE0 + 2), "E2");
        assert_eq!(aux_suffix(aux::VECTOR_VECTOR), "VV");
    }

    #[test]
    fn test_operand_shapes() {
        assert_eq!(
            operand_shape(op::CPTOPSP, aux::STACK),
            Some(OperandShape::OffsetSize)
        );
        assert_eq!(operand_shape(op::CONST, aux::INT), Some(OperandShape::Const));
        assert_eq!(operand_shape(op::RETN, aux::NONE), Some(OperandShape::None));
        assert_eq!(operand_shape(0xEE, 0), None);
    }
}
