//! Code generation: a single linear walk over the analyzed tree, feeding an
//! [`Emitter`].
//!
//! Boolean expressions have two ways of being generated. As a value (through
//! [`Codegen`]) they leave `1` or `0` on the stack; as a condition (through
//! [`Conditional`]) they jump to a label when they evaluate to a given
//! boolean, which is what loops and the ternary operator use.
use crate::ast::{Expr, Program};
use crate::types::Type;
use thiserror::Error;

mod condition;
pub mod emitter;
mod expr;
pub mod module;
pub mod opcode;
mod statement;

pub use condition::Conditional;
pub use emitter::{Code, EmitError, Emitter, Instruction, Label};
pub use module::{DecodeError, Module};
pub use opcode::{Branch, LocalOp, Opcode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("line {line}: expression has no resolved type")]
    Unresolved { line: usize },
    #[error(transparent)]
    Emit(#[from] EmitError),
}

pub type CodegenResult<T> = Result<T, CodegenError>;

pub trait Codegen {
    fn codegen(&self, output: &mut Emitter) -> CodegenResult<()>;
}

/// Type of an expression that went through analysis without errors.
fn resolved_type(expr: &Expr) -> CodegenResult<Type> {
    match expr.ty {
        None | Some(Type::Any) => Err(CodegenError::Unresolved { line: expr.line }),
        Some(ty) => Ok(ty),
    }
}

/// Generates the code of a whole program, ending it with `return`.
pub fn generate(program: &Program, max_locals: u16) -> CodegenResult<Module> {
    let mut output = Emitter::new();
    output.reserve_locals(max_locals);
    for statement in &program.body {
        statement.codegen(&mut output)?;
    }
    output.add_no_arg_instruction(Opcode::Return);
    tracing::trace!(target: "codegen", "listing:\n{}", output.listing());
    Ok(output.finish()?)
}
