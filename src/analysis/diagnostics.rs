use crate::types::Type;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticErrorKind {
    #[error("incompatible types: expected {expected}, found {found}")]
    TypeMismatch { expected: Type, found: Type },
    #[error("invalid operand types for {operator}: {lhs} and {rhs}")]
    InvalidOperands {
        operator: &'static str,
        lhs: Type,
        rhs: Type,
    },
    #[error("invalid operand type for unary {operator}: {ty}")]
    InvalidOperand { operator: &'static str, ty: Type },
    #[error("cannot find variable `{0}` in this scope")]
    UnknownVariable(String),
    #[error("variable `{0}` is already defined in this scope")]
    Redeclared(String),
    #[error("left side of an assignment must be a variable")]
    InvalidAssignmentTarget,
    #[error("branches of the conditional expression have different types: {value_true} and {value_false}")]
    BranchTypeMismatch { value_true: Type, value_false: Type },
    #[error("expression doesn't produce a value")]
    NoValue,
    #[error("too many local variables")]
    TooManyLocals,
}

/// A semantic error attached to the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: SemanticErrorKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: error: {}", self.line, self.kind)
    }
}

/// Collects semantic errors of a compilation unit. Reporting never stops the
/// analysis; the driver looks at the whole list once it is done.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn report(&mut self, line: usize, kind: SemanticErrorKind) {
        tracing::debug!(target: "analysis", line, "{}", kind);
        self.entries.push(Diagnostic { line, kind });
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for diagnostic in self {
            writeln!(f, "{}", diagnostic)?;
        }
        write!(f, "{} error(s)", self.len())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
