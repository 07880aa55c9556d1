//! The binary artifact produced by the compiler.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! magic       "BRCC"
//! version     u16
//! max_locals  u16
//! strings     u16 count, then per string: u16 length + UTF-8 bytes
//! code        u32 length, then the instruction bytes
//! ```
use super::emitter::Instruction;
use super::opcode::{self, Branch, LocalOp, Opcode};
use std::fmt::Write;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"BRCC";
pub const VERSION: u16 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not a module: bad magic number")]
    BadMagic,
    #[error("unsupported module version {0}")]
    UnsupportedVersion(u16),
    #[error("unexpected end of data at byte {0}")]
    UnexpectedEnd(usize),
    #[error("string constant #{0} is not valid UTF-8")]
    InvalidUtf8(usize),
    #[error("{0} unexpected byte(s) after the code")]
    TrailingBytes(usize),
    #[error("unknown opcode {byte:#04x} at {address}")]
    UnknownOpcode { address: usize, byte: u8 },
    #[error("instruction at {address} refers to missing string #{index}")]
    InvalidStringIndex { address: usize, index: u16 },
    #[error("jump at {address} doesn't land on an instruction")]
    InvalidBranchTarget { address: usize },
}

/// A compiled program.
///
/// Only built by the emitter or by [`Module::decode`], both of which keep the
/// string table and the code within the sizes the header can describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    max_locals: u16,
    strings: Vec<String>,
    code: Vec<u8>,
}

impl Module {
    pub(crate) fn new(max_locals: u16, strings: Vec<String>, code: Vec<u8>) -> Self {
        Self {
            max_locals,
            strings,
            code,
        }
    }

    pub const fn max_locals(&self) -> u16 {
        self.max_locals
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn encode(&self) -> Vec<u8> {
        let strings_len: usize = self.strings.iter().map(|s| 2 + s.len()).sum();
        let mut out = Vec::with_capacity(14 + strings_len + self.code.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&self.max_locals.to_be_bytes());
        out.extend_from_slice(&(self.strings.len() as u16).to_be_bytes());
        for string in &self.strings {
            out.extend_from_slice(&(string.len() as u16).to_be_bytes());
            out.extend_from_slice(string.as_bytes());
        }
        out.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.code);
        out
    }

    /// Reads a module back, checking that every instruction is well formed.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes, 0);
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = reader.u16()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let max_locals = reader.u16()?;
        let count = reader.u16()?;
        let strings = (0..usize::from(count))
            .map(|index| {
                let len = reader.u16()?;
                let raw = reader.take(usize::from(len))?;
                String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8(index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let code_len = reader.u32()? as usize;
        let code = reader.take(code_len)?.to_vec();
        if reader.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }

        let module = Self::new(max_locals, strings, code);
        module.validate()?;
        tracing::debug!(
            target: "emitter",
            "decoded module: {} bytes of code, {} strings",
            module.code.len(),
            module.strings.len()
        );
        Ok(module)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        let mut starts = vec![false; self.code.len()];
        let mut branches = Vec::new();
        for decoded in self.instructions() {
            let (address, instr) = decoded?;
            starts[address] = true;
            match instr {
                Instruction::StringConstant(index) if usize::from(index) >= self.strings.len() => {
                    return Err(DecodeError::InvalidStringIndex { address, index });
                }
                Instruction::Branch(_, offset) => branches.push((address, offset)),
                _ => {}
            }
        }
        for (address, offset) in branches {
            let lands = usize::try_from(address as i64 + i64::from(offset))
                .ok()
                .and_then(|target| starts.get(target).copied())
                .unwrap_or(false);
            if !lands {
                return Err(DecodeError::InvalidBranchTarget { address });
            }
        }
        Ok(())
    }

    /// Decodes the code one instruction at a time, with its address.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            code: &self.code,
            address: 0,
            failed: false,
        }
    }

    /// Textual form of the module, with jump targets as absolute addresses.
    pub fn disassemble(&self) -> Result<String, DecodeError> {
        let mut out = String::new();
        // writing to a String can't fail
        let _ = writeln!(out, "max locals: {}", self.max_locals);
        let _ = writeln!(out, "strings:");
        for (index, string) in self.strings.iter().enumerate() {
            let _ = writeln!(out, "    #{} = {:?}", index, string);
        }
        let _ = writeln!(out, "code:");
        for decoded in self.instructions() {
            let (address, instr) = decoded?;
            let _ = match instr {
                Instruction::Branch(branch, offset) => writeln!(
                    out,
                    "{:6}: {} {}",
                    address,
                    branch,
                    address as i64 + i64::from(offset)
                ),
                instr => writeln!(out, "{:6}: {}", address, instr),
            };
        }
        Ok(out)
    }
}

pub struct Instructions<'a> {
    code: &'a [u8],
    address: usize,
    failed: bool,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<(usize, Instruction<i16>), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.address >= self.code.len() {
            return None;
        }
        let address = self.address;
        match Instruction::decode(self.code, address) {
            Ok(instr) => {
                self.address += instr.encoded_len();
                Some(Ok((address, instr)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl Instruction<i16> {
    /// Decodes the instruction starting at `address` in `code`.
    pub fn decode(code: &[u8], address: usize) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(code, address);
        let byte = reader.u8()?;
        if let Some(op) = Opcode::from_byte(byte) {
            return Ok(Self::NoArg(op));
        }
        if let Some(branch) = Branch::from_byte(byte) {
            return Ok(Self::Branch(branch, i16::from_be_bytes(reader.array()?)));
        }
        if let Some(op) = LocalOp::from_byte(byte) {
            return Ok(Self::Local(op, reader.u16()?));
        }
        match byte {
            opcode::ICONST => Ok(Self::IntConstant(i32::from_be_bytes(reader.array()?))),
            opcode::DCONST => Ok(Self::DoubleConstant(f64::from_be_bytes(reader.array()?))),
            opcode::LDC => Ok(Self::StringConstant(reader.u16()?)),
            byte => Err(DecodeError::UnknownOpcode { address, byte }),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8], offset: usize) -> Self {
        Self { bytes, offset }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::UnexpectedEnd(self.offset))?;
        let taken = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(taken)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        self.array::<1>().map(|[byte]| byte)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        self.array().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_be_bytes)
    }

    const fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}
