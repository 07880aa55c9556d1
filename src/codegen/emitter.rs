use super::module::Module;
use super::opcode::{self, Branch, LocalOp, Opcode};
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A position in the code, issued by [`Emitter::create_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    num: usize,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ".L{}", self.num)
    }
}

/// A single instruction. Jumps point to a `Target`: a [`Label`] while the
/// code is being emitted, a relative offset once it's encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction<Target = Label> {
    NoArg(Opcode),
    Branch(Branch, Target),
    Local(LocalOp, u16),
    IntConstant(i32),
    DoubleConstant(f64),
    /// Index into the module's string table.
    StringConstant(u16),
}

impl<T> Instruction<T> {
    /// Size in bytes once encoded.
    pub const fn encoded_len(&self) -> usize {
        match self {
            Self::NoArg(_) => 1,
            Self::Branch(..) | Self::Local(..) | Self::StringConstant(_) => 3,
            Self::IntConstant(_) => 5,
            Self::DoubleConstant(_) => 9,
        }
    }

    pub fn map_target<U, E, F>(self, mapper: F) -> Result<Instruction<U>, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        Ok(match self {
            Self::Branch(branch, target) => Instruction::Branch(branch, mapper(target)?),
            Self::NoArg(op) => Instruction::NoArg(op),
            Self::Local(op, slot) => Instruction::Local(op, slot),
            Self::IntConstant(value) => Instruction::IntConstant(value),
            Self::DoubleConstant(value) => Instruction::DoubleConstant(value),
            Self::StringConstant(index) => Instruction::StringConstant(index),
        })
    }
}

impl<T: fmt::Display> fmt::Display for Instruction<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoArg(op) => write!(f, "{}", op),
            Self::Branch(branch, target) => write!(f, "{} {}", branch, target),
            Self::Local(op, slot) => write!(f, "{} {}", op, slot),
            Self::IntConstant(value) => write!(f, "iconst {}", value),
            Self::DoubleConstant(value) => write!(f, "dconst {:?}", value),
            Self::StringConstant(index) => write!(f, "ldc #{}", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    Label(Label),
    Instruction(Instruction),
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Label(label) => write!(f, "{}:", label),
            Self::Instruction(instr) => write!(f, "\t{}", instr),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("label {0} is bound twice")]
    LabelRebound(Label),
    #[error("label {0} was never bound")]
    UnboundLabel(Label),
    #[error("label {0} doesn't belong to this emitter")]
    UnknownLabel(Label),
    #[error("jump from {from} to {to} doesn't fit in 16 bits")]
    BranchTooFar { from: usize, to: usize },
    #[error("too many distinct string constants")]
    TooManyStrings,
    #[error("string constant of {0} bytes is too long")]
    StringTooLong(usize),
    #[error("code size of {0} bytes is too large")]
    CodeTooLarge(usize),
}

/// Collects instructions in order and resolves labels into offsets.
///
/// Labels are numbered per emitter, starting at zero. Every label must be
/// bound exactly once before [`Emitter::finish`].
#[derive(Debug, Default)]
pub struct Emitter {
    code: Vec<Code>,
    // address each label was bound at
    labels: Vec<Option<usize>>,
    address: usize,
    strings: Vec<String>,
    string_indices: HashMap<String, u16>,
    max_locals: u16,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_label(&mut self) -> Label {
        let label = Label {
            num: self.labels.len(),
        };
        self.labels.push(None);
        label
    }

    /// Binds `label` to the address of the next instruction.
    pub fn add_label(&mut self, label: Label) -> Result<(), EmitError> {
        let address = self.address;
        match self.labels.get_mut(label.num) {
            None => Err(EmitError::UnknownLabel(label)),
            Some(Some(_)) => Err(EmitError::LabelRebound(label)),
            Some(slot @ None) => {
                *slot = Some(address);
                tracing::trace!(target: "emitter", "{} bound at {}", label, address);
                self.code.push(Code::Label(label));
                Ok(())
            }
        }
    }

    pub fn add_branch_instruction(&mut self, branch: Branch, label: Label) -> Result<(), EmitError> {
        if label.num >= self.labels.len() {
            return Err(EmitError::UnknownLabel(label));
        }
        self.push(Instruction::Branch(branch, label));
        Ok(())
    }

    pub fn add_no_arg_instruction(&mut self, op: Opcode) {
        self.push(Instruction::NoArg(op));
    }

    pub fn add_local_instruction(&mut self, op: LocalOp, slot: u16) {
        self.max_locals = self.max_locals.max(slot.saturating_add(1));
        self.push(Instruction::Local(op, slot));
    }

    pub fn add_int_constant(&mut self, value: i32) {
        self.push(Instruction::IntConstant(value));
    }

    pub fn add_double_constant(&mut self, value: f64) {
        self.push(Instruction::DoubleConstant(value));
    }

    /// Pushes a string, sharing the table entry with equal strings.
    pub fn add_string_constant(&mut self, value: &str) -> Result<(), EmitError> {
        let index = match self.string_indices.get(value) {
            Some(index) => *index,
            None => {
                if u16::try_from(value.len()).is_err() {
                    return Err(EmitError::StringTooLong(value.len()));
                }
                let index =
                    u16::try_from(self.strings.len()).map_err(|_| EmitError::TooManyStrings)?;
                self.strings.push(value.to_string());
                self.string_indices.insert(value.to_string(), index);
                index
            }
        };
        self.push(Instruction::StringConstant(index));
        Ok(())
    }

    /// Reserves at least `count` local slots, used or not.
    pub fn reserve_locals(&mut self, count: u16) {
        self.max_locals = self.max_locals.max(count);
    }

    pub fn code(&self) -> &[Code] {
        &self.code
    }

    /// Human readable listing of what has been emitted so far.
    pub fn listing(&self) -> String {
        self.code.iter().join("\n")
    }

    fn push(&mut self, instr: Instruction) {
        self.address += instr.encoded_len();
        self.code.push(Code::Instruction(instr));
    }

    /// Resolves every jump and encodes the code into a [`Module`].
    pub fn finish(self) -> Result<Module, EmitError> {
        let addresses = self
            .labels
            .iter()
            .enumerate()
            .map(|(num, address)| address.ok_or(EmitError::UnboundLabel(Label { num })))
            .collect::<Result<Vec<_>, _>>()?;
        if u32::try_from(self.address).is_err() {
            return Err(EmitError::CodeTooLarge(self.address));
        }

        let mut bytes = Vec::with_capacity(self.address);
        for instr in self.code.iter().filter_map(|code| match code {
            Code::Instruction(instr) => Some(*instr),
            Code::Label(_) => None,
        }) {
            let from = bytes.len();
            let resolved = instr.map_target(|label| {
                let to = addresses[label.num];
                i16::try_from(to as i64 - from as i64)
                    .map_err(|_| EmitError::BranchTooFar { from, to })
            })?;
            resolved.encode(&mut bytes);
        }
        tracing::debug!(
            target: "emitter",
            "{} bytes of code, {} labels, {} strings",
            bytes.len(),
            addresses.len(),
            self.strings.len()
        );
        Ok(Module::new(self.max_locals, self.strings, bytes))
    }
}

impl Instruction<i16> {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Self::NoArg(op) => out.push(op.byte()),
            Self::Branch(branch, offset) => {
                out.push(branch.byte());
                out.extend_from_slice(&offset.to_be_bytes());
            }
            Self::Local(op, slot) => {
                out.push(op.byte());
                out.extend_from_slice(&slot.to_be_bytes());
            }
            Self::IntConstant(value) => {
                out.push(opcode::ICONST);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Self::DoubleConstant(value) => {
                out.push(opcode::DCONST);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Self::StringConstant(index) => {
                out.push(opcode::LDC);
                out.extend_from_slice(&index.to_be_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_resolve_to_relative_offsets() {
        let mut emitter = Emitter::new();
        let top = emitter.create_label();
        let out = emitter.create_label();
        emitter.add_label(top).unwrap();
        emitter.add_int_constant(1);
        emitter.add_branch_instruction(Branch::IfEq, out).unwrap();
        emitter.add_branch_instruction(Branch::Goto, top).unwrap();
        emitter.add_label(out).unwrap();
        emitter.add_no_arg_instruction(Opcode::Return);
        assert_eq!(
            emitter.listing(),
            ".L0:\n\ticonst 1\n\tifeq .L1\n\tgoto .L0\n.L1:\n\treturn"
        );
        let module = emitter.finish().unwrap();
        assert_eq!(
            module.code(),
            &[0x13, 0, 0, 0, 1, 0x99, 0, 6, 0xa7, 0xff, 0xf8, 0xb1]
        );
    }

    #[test]
    fn binding_twice_is_an_error() {
        let mut emitter = Emitter::new();
        let label = emitter.create_label();
        emitter.add_label(label).unwrap();
        assert_eq!(emitter.add_label(label), Err(EmitError::LabelRebound(label)));
    }

    #[test]
    fn unbound_label_fails_finish() {
        let mut emitter = Emitter::new();
        let bound = emitter.create_label();
        let dangling = emitter.create_label();
        emitter.add_label(bound).unwrap();
        emitter.add_branch_instruction(Branch::Goto, dangling).unwrap();
        assert_eq!(emitter.finish().unwrap_err(), EmitError::UnboundLabel(dangling));
    }

    #[test]
    fn labels_belong_to_their_emitter() {
        let mut other = Emitter::new();
        other.create_label();
        let foreign = other.create_label();
        let mut emitter = Emitter::new();
        assert_eq!(
            emitter.add_branch_instruction(Branch::Goto, foreign),
            Err(EmitError::UnknownLabel(foreign))
        );
        assert_eq!(emitter.add_label(foreign), Err(EmitError::UnknownLabel(foreign)));
    }

    #[test]
    fn strings_are_interned() {
        let mut emitter = Emitter::new();
        emitter.add_string_constant("a").unwrap();
        emitter.add_string_constant("b").unwrap();
        emitter.add_string_constant("a").unwrap();
        emitter.add_local_instruction(LocalOp::AStore, 4);
        let module = emitter.finish().unwrap();
        assert_eq!(module.strings(), &["a".to_string(), "b".to_string()]);
        assert_eq!(module.max_locals(), 5);
    }
}
