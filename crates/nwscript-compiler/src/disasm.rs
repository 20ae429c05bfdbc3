//! NCS disassembler.
//!
//! Walks a compiled byte stream from offset 0, decoding each instruction
//! by its (opcode, aux) pair through the shared operand-shape table, and
//! prints one instruction per line: absolute offset, mnemonic, operands.
//! With debug symbols, function entries are labelled with their names and
//! call/jump targets resolve symbolically; with a loaded prototype table,
//! engine-action ids resolve to action names.

use crate::actions::ActionPrototype;
use crate::ndb::NdbInfo;
use crate::opcode::{aux, aux_suffix, mnemonic, op, operand_shape, OperandShape, FILE_MAGIC, HEADER_SIZE};
use nwscript_ast::{Diagnostic, ErrorKind, Span};

/// Disassemble a compiled script into a printable listing.
pub fn disassemble(
    code: &[u8],
    ndb: Option<&NdbInfo>,
    actions: Option<&[ActionPrototype]>,
) -> Result<String, Diagnostic> {
    let bad = |message: String| Diagnostic::error(ErrorKind::Codegen, Span::zero(0), message);

    if code.len() < HEADER_SIZE as usize {
        return Err(bad("file too short for an NCS header".to_string()));
    }
    if &code[0..8] != FILE_MAGIC {
        return Err(bad("missing 'NCS V1.0' magic".to_string()));
    }
    if code[8] != op::SIZE {
        return Err(bad("missing size record after header".to_string()));
    }
    let declared = u32::from_be_bytes([code[9], code[10], code[11], code[12]]);
    if declared as usize != code.len() {
        return Err(bad(format!(
            "size record says {} bytes, file has {}",
            declared,
            code.len()
        )));
    }

    let mut out = String::new();
    out.push_str(&format!("; NCS V1.0, {} bytes\n", declared));

    let mut cursor = Cursor {
        code,
        pos: HEADER_SIZE as usize,
    };
    while !cursor.at_end() {
        let addr = cursor.pos as u32;

        if let Some(name) = ndb.and_then(|info| info.function_at(addr)) {
            out.push_str(&format!("{}:\n", name));
        }

        let opcode = cursor.u8()?;
        let aux_byte = cursor.u8()?;
        let Some(shape) = operand_shape(opcode, aux_byte) else {
            return Err(bad(format!(
                "unknown opcode {:02X} {:02X} at {:08X}",
                opcode, aux_byte, addr
            )));
        };

        let name = format!("{}{}", mnemonic(opcode), aux_suffix(aux_byte));
        let operands = decode_operands(&mut cursor, opcode, aux_byte, shape, addr, ndb, actions)?;
        if operands.is_empty() {
            out.push_str(&format!("{:08X}  {}\n", addr, name));
        } else {
            out.push_str(&format!("{:08X}  {:<12} {}\n", addr, name, operands));
        }
    }

    Ok(out)
}

fn decode_operands(
    cursor: &mut Cursor,
    opcode: u8,
    aux_byte: u8,
    shape: OperandShape,
    addr: u32,
    ndb: Option<&NdbInfo>,
    actions: Option<&[ActionPrototype]>,
) -> Result<String, Diagnostic> {
    Ok(match shape {
        OperandShape::None => String::new(),
        OperandShape::Int32 => format!("{}", cursor.i32()?),
        OperandShape::Rel32 => {
            let rel = cursor.i32()?;
            let target = (addr as i64 + rel as i64) as u32;
            match ndb.and_then(|info| info.function_at(target)) {
                Some(name) if opcode == op::JSR => name.to_string(),
                _ => format!("off_{:08X}", target),
            }
        }
        OperandShape::OffsetSize => {
            let offset = cursor.i32()?;
            let size = cursor.u16()?;
            format!("{}, {}", offset, size)
        }
        OperandShape::Destruct => {
            let total = cursor.u16()?;
            let offset = cursor.u16()?;
            let keep = cursor.u16()?;
            format!("{}, {}, {}", total, offset, keep)
        }
        OperandShape::StructSize => format!("{}", cursor.u16()?),
        OperandShape::Const => match aux_byte {
            aux::INT => format!("{}", cursor.i32()?),
            aux::FLOAT => format!("{:?}", cursor.f32()?),
            aux::OBJECT => format!("{}", cursor.u32()?),
            aux::STRING => {
                let len = cursor.u16()? as usize;
                let bytes = cursor.bytes(len)?;
                let text: String = bytes
                    .iter()
                    .flat_map(|&b| (b as char).escape_default())
                    .collect();
                format!("\"{}\"", text)
            }
            other => {
                return Err(Diagnostic::error(
                    ErrorKind::Codegen,
                    Span::zero(0),
                    format!("bad CONST type byte {:02X} at {:08X}", other, addr),
                ));
            }
        },
        OperandShape::Action => {
            let id = cursor.u16()?;
            let argc = cursor.u8()?;
            match actions.and_then(|table| table.get(id as usize)) {
                Some(proto) => format!("{}, {}  ; {}", id, argc, proto.name),
                None => format!("{}, {}", id, argc),
            }
        }
        OperandShape::StoreState => {
            let base = cursor.u32()?;
            let local = cursor.u32()?;
            format!("{}, {}", base, local)
        }
        OperandShape::Size => format!("{}", cursor.u32()?),
    })
}

struct Cursor<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], Diagnostic> {
        if self.pos + n > self.code.len() {
            return Err(Diagnostic::error(
                ErrorKind::Codegen,
                Span::zero(0),
                format!("truncated instruction at {:08X}", self.pos),
            ));
        }
        let slice = &self.code[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, Diagnostic> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Diagnostic> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn i32(&mut self) -> Result<i32, Diagnostic> {
        let b = self.bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32(&mut self) -> Result<u32, Diagnostic> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32, Diagnostic> {
        let b = self.bytes(4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
