//! Type resolution and checking.
//!
//! Every node is analyzed by value: [`Analyze::analyze`] consumes it and
//! returns the node that takes its place in the tree, which is the node
//! itself with its type filled in, or a rewritten node (`+` on strings
//! becomes a concatenation). Errors are recorded in [`Diagnostics`] and the
//! faulty node gets [`Type::Any`], so a single walk reports everything.
use crate::ast::Program;
use crate::types::Type;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

mod diagnostics;
mod expr;
mod statement;

pub use diagnostics::{Diagnostic, Diagnostics, SemanticErrorKind};

pub trait Analyze: Sized {
    fn analyze(self, ctx: &mut Context) -> Self;
}

impl<T: Analyze> Analyze for Box<T> {
    fn analyze(self, ctx: &mut Context) -> Self {
        Box::new((*self).analyze(ctx))
    }
}

/// How the two branches of `c ? a : b` are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchTyping {
    /// Both branches must have the same type.
    #[default]
    Identical,
    /// Numeric branches are promoted like the operands of arithmetic.
    Promote,
}

impl FromStr for BranchTyping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identical" => Ok(Self::Identical),
            "promote" => Ok(Self::Promote),
            other => Err(format!(
                "unknown branch typing `{}` (expected `identical` or `promote`)",
                other
            )),
        }
    }
}

impl fmt::Display for BranchTyping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Identical => "identical",
            Self::Promote => "promote",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub ternary_branches: BranchTyping,
}

#[derive(Debug, Clone, Copy)]
struct LocalBinding {
    slot: u16,
    ty: Type,
}

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, LocalBinding>,
    first_slot: u16,
}

/// Names in scope, the slots they live in and the errors found so far.
///
/// Slots of a scope are released when it is popped and reused by the next
/// sibling scope.
#[derive(Debug)]
pub struct Context {
    scopes: Vec<Scope>,
    next_slot: u16,
    max_locals: u16,
    options: AnalysisOptions,
    diagnostics: Diagnostics,
}

impl Context {
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            scopes: vec![Scope::default()],
            next_slot: 0,
            max_locals: 0,
            options,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope {
            bindings: HashMap::new(),
            first_slot: self.next_slot,
        });
    }

    pub fn pop_scope(&mut self) {
        // the outermost scope lives as long as the context
        if self.scopes.len() > 1 {
            if let Some(scope) = self.scopes.pop() {
                self.next_slot = scope.first_slot;
            }
        }
    }

    /// Binds `name` in the innermost scope and gives it a fresh slot.
    pub fn declare(&mut self, name: &str, ty: Type, line: usize) -> Option<u16> {
        let slot = self.next_slot;
        let scope = self.scopes.last_mut()?;
        if scope.bindings.contains_key(name) {
            self.diagnostics
                .report(line, SemanticErrorKind::Redeclared(name.to_string()));
            return None;
        }
        let next_slot = match slot.checked_add(1) {
            Some(next) => next,
            None => {
                self.diagnostics.report(line, SemanticErrorKind::TooManyLocals);
                return None;
            }
        };
        scope
            .bindings
            .insert(name.to_string(), LocalBinding { slot, ty });
        self.next_slot = next_slot;
        self.max_locals = self.max_locals.max(next_slot);
        tracing::trace!(target: "analysis", "`{}`: {} in slot {}", name, ty, slot);
        Some(slot)
    }

    /// Slot and type of `name`, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<(u16, Type)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
            .map(|binding| (binding.slot, binding.ty))
    }

    pub fn report(&mut self, line: usize, kind: SemanticErrorKind) {
        self.diagnostics.report(line, kind);
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub const fn options(&self) -> AnalysisOptions {
        self.options
    }

    /// Number of slots the generated code needs.
    pub const fn max_locals(&self) -> u16 {
        self.max_locals
    }
}

/// A fully analyzed program, ready for code generation if `diagnostics` is
/// empty.
#[derive(Debug)]
pub struct Analysis {
    pub program: Program,
    pub diagnostics: Diagnostics,
    pub max_locals: u16,
}

pub fn analyze_program(program: Program, options: AnalysisOptions) -> Analysis {
    let mut ctx = Context::new(options);
    let program = program.analyze(&mut ctx);
    tracing::debug!(
        target: "analysis",
        "analysis done: {} error(s), {} local(s)",
        ctx.diagnostics.len(),
        ctx.max_locals
    );
    Analysis {
        program,
        max_locals: ctx.max_locals,
        diagnostics: ctx.diagnostics,
    }
}

impl Analyze for Program {
    fn analyze(self, ctx: &mut Context) -> Self {
        Program {
            body: self
                .body
                .into_iter()
                .map(|statement| statement.analyze(ctx))
                .collect(),
        }
    }
}
