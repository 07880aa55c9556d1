use crate::analysis::{Diagnostics, SemanticErrorKind};
use std::fmt;

/// The closed set of types a value can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Double,
    Boolean,
    String,
    /// Result of expressions that don't leave a value behind.
    Void,
    /// Error type: compatible with everything so one mistake is reported once.
    Any,
}

impl Type {
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Double)
    }

    pub fn matches_expected(self, expected: Type) -> bool {
        self == expected || self == Self::Any || expected == Self::Any
    }

    /// Reports a type mismatch at `line` unless `self` is compatible with `expected`.
    pub fn must_match_expected(
        self,
        line: usize,
        expected: Type,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let matches = self.matches_expected(expected);
        if !matches {
            diagnostics.report(
                line,
                SemanticErrorKind::TypeMismatch {
                    expected,
                    found: self,
                },
            );
        }
        matches
    }

    /// Result type of an arithmetic operator applied to `lhs` and `rhs`.
    ///
    /// `int` with `double` gives `int`: the right operand is the one that
    /// gets converted, whichever side it is on.
    pub const fn promote(lhs: Type, rhs: Type) -> Option<Type> {
        match (lhs, rhs) {
            (Self::Int, Self::Int) | (Self::Int, Self::Double) => Some(Self::Int),
            (Self::Double, Self::Int) | (Self::Double, Self::Double) => Some(Self::Double),
            _ => None,
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Type> {
        Some(match keyword {
            "int" => Self::Int,
            "double" => Self::Double,
            "boolean" => Self::Boolean,
            "String" => Self::String,
            _ => return None,
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::String => "String",
            Self::Void => "void",
            Self::Any => "any",
        })
    }
}
