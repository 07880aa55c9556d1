use super::{Analyze, BranchTyping, Context, SemanticErrorKind};
use crate::ast::*;
use crate::types::Type;

impl Analyze for Expr {
    /// Resolves the type of the expression. Nodes that already carry a type
    /// are returned untouched.
    fn analyze(self, ctx: &mut Context) -> Self {
        if self.ty.is_some() {
            return self;
        }
        let line = self.line;
        let analyzed = match self.kind {
            ExprKind::Literal(literal) => {
                let ty = literal.ty();
                Expr::new(line, ExprKind::Literal(literal)).typed(ty)
            }
            ExprKind::Variable { name, .. } => variable(ctx, line, name),
            ExprKind::Unary { operator, expr } => unary(ctx, line, operator, expr),
            ExprKind::Binary { operator, lhs, rhs } => {
                let lhs = lhs.analyze(ctx);
                let rhs = rhs.analyze(ctx);
                match operator {
                    BinaryOp::Arithmetic(op) => arithmetic(ctx, line, op, lhs, rhs),
                    BinaryOp::Bit(op) => {
                        lhs.ty()
                            .must_match_expected(line, Type::Int, ctx.diagnostics_mut());
                        rhs.ty()
                            .must_match_expected(line, Type::Int, ctx.diagnostics_mut());
                        Expr::binary(line, BinaryOp::Bit(op), *lhs, *rhs).typed(Type::Int)
                    }
                    BinaryOp::Logic(op) => {
                        lhs.ty()
                            .must_match_expected(line, Type::Boolean, ctx.diagnostics_mut());
                        rhs.ty()
                            .must_match_expected(line, Type::Boolean, ctx.diagnostics_mut());
                        Expr::binary(line, BinaryOp::Logic(op), *lhs, *rhs).typed(Type::Boolean)
                    }
                    BinaryOp::Relational(relation) => {
                        check_comparison(ctx, line, relation, &lhs, &rhs);
                        Expr::binary(line, BinaryOp::Relational(relation), *lhs, *rhs)
                            .typed(Type::Boolean)
                    }
                    BinaryOp::Assignment => assignment(ctx, line, lhs, rhs),
                }
            }
            ExprKind::Concat { lhs, rhs } => concat(ctx, line, lhs, rhs),
            ExprKind::Ternary {
                condition,
                value_true,
                value_false,
            } => ternary(ctx, line, condition, value_true, value_false),
        };
        tracing::trace!(target: "analysis", line, "expression typed {}", analyzed.ty());
        analyzed
    }
}

fn variable(ctx: &mut Context, line: usize, name: String) -> Expr {
    match ctx.lookup(&name) {
        Some((slot, ty)) => Expr::new(
            line,
            ExprKind::Variable {
                name,
                slot: Some(slot),
            },
        )
        .typed(ty),
        None => {
            ctx.report(line, SemanticErrorKind::UnknownVariable(name.clone()));
            Expr::new(line, ExprKind::Variable { name, slot: None }).typed(Type::Any)
        }
    }
}

fn unary(ctx: &mut Context, line: usize, operator: UnaryOp, expr: Box<Expr>) -> Expr {
    let expr = expr.analyze(ctx);
    let ty = match operator {
        UnaryOp::Negate if expr.ty().is_numeric() || expr.ty() == Type::Any => expr.ty(),
        UnaryOp::Negate => {
            ctx.report(
                line,
                SemanticErrorKind::InvalidOperand {
                    operator: operator.symbol(),
                    ty: expr.ty(),
                },
            );
            Type::Any
        }
        UnaryOp::LogicNot => {
            expr.ty()
                .must_match_expected(line, Type::Boolean, ctx.diagnostics_mut());
            Type::Boolean
        }
    };
    Expr::new(line, ExprKind::Unary { operator, expr }).typed(ty)
}

/// `+` with a `String` on either side turns into a concatenation; every
/// other combination follows the numeric promotion table.
fn arithmetic(ctx: &mut Context, line: usize, op: ArithmeticOp, lhs: Box<Expr>, rhs: Box<Expr>) -> Expr {
    let (lhs_ty, rhs_ty) = (lhs.ty(), rhs.ty());
    if op == ArithmeticOp::Add && (lhs_ty == Type::String || rhs_ty == Type::String) {
        tracing::trace!(target: "analysis", line, "`+` on {} and {} is a concatenation", lhs_ty, rhs_ty);
        return Expr::new(line, ExprKind::Concat { lhs, rhs }).analyze(ctx);
    }
    let ty = match Type::promote(lhs_ty, rhs_ty) {
        Some(ty) => ty,
        // already reported further down the tree
        None if lhs_ty == Type::Any || rhs_ty == Type::Any => Type::Any,
        None => {
            ctx.report(
                line,
                SemanticErrorKind::InvalidOperands {
                    operator: op.symbol(),
                    lhs: lhs_ty,
                    rhs: rhs_ty,
                },
            );
            Type::Any
        }
    };
    Expr::binary(line, BinaryOp::Arithmetic(op), *lhs, *rhs).typed(ty)
}

// anything with a value can be turned into text, `void` has nothing to turn
fn concat(ctx: &mut Context, line: usize, lhs: Box<Expr>, rhs: Box<Expr>) -> Expr {
    let lhs = lhs.analyze(ctx);
    let rhs = rhs.analyze(ctx);
    let mut ty = Type::String;
    for operand in [&lhs, &rhs] {
        if operand.ty() == Type::Void {
            ctx.report(operand.line, SemanticErrorKind::NoValue);
            ty = Type::Any;
        }
    }
    Expr::new(line, ExprKind::Concat { lhs, rhs }).typed(ty)
}

// ordering needs numbers, equality also accepts booleans; both sides must agree
fn check_comparison(ctx: &mut Context, line: usize, relation: Relational, lhs: &Expr, rhs: &Expr) {
    let (lhs_ty, rhs_ty) = (lhs.ty(), rhs.ty());
    if lhs_ty == Type::Any || rhs_ty == Type::Any {
        return;
    }
    let comparable = lhs_ty.is_numeric() || (relation.is_equality() && lhs_ty == Type::Boolean);
    if !comparable || lhs_ty != rhs_ty {
        ctx.report(
            line,
            SemanticErrorKind::InvalidOperands {
                operator: relation.symbol(),
                lhs: lhs_ty,
                rhs: rhs_ty,
            },
        );
    }
}

fn assignment(ctx: &mut Context, line: usize, lhs: Box<Expr>, rhs: Box<Expr>) -> Expr {
    let ty = if let ExprKind::Variable { .. } = lhs.kind {
        rhs.ty()
            .must_match_expected(rhs.line, lhs.ty(), ctx.diagnostics_mut());
        lhs.ty()
    } else {
        ctx.report(line, SemanticErrorKind::InvalidAssignmentTarget);
        Type::Any
    };
    Expr::binary(line, BinaryOp::Assignment, *lhs, *rhs).typed(ty)
}

fn ternary(
    ctx: &mut Context,
    line: usize,
    condition: Box<Expr>,
    value_true: Box<Expr>,
    value_false: Option<Box<Expr>>,
) -> Expr {
    let condition = condition.analyze(ctx);
    condition
        .ty()
        .must_match_expected(condition.line, Type::Boolean, ctx.diagnostics_mut());
    let value_true = value_true.analyze(ctx);
    let value_false = value_false.map(|value| value.analyze(ctx));

    let ty = match &value_false {
        None => Type::Void,
        Some(value_false) => branch_type(ctx, line, value_true.ty(), value_false.ty()),
    };
    Expr::new(
        line,
        ExprKind::Ternary {
            condition,
            value_true,
            value_false,
        },
    )
    .typed(ty)
}

fn branch_type(ctx: &mut Context, line: usize, value_true: Type, value_false: Type) -> Type {
    if value_true == value_false {
        return value_true;
    }
    if value_true == Type::Any || value_false == Type::Any {
        return Type::Any;
    }
    let promoted = match ctx.options().ternary_branches {
        BranchTyping::Identical => None,
        BranchTyping::Promote => Type::promote(value_true, value_false),
    };
    promoted.unwrap_or_else(|| {
        ctx.report(
            line,
            SemanticErrorKind::BranchTypeMismatch {
                value_true,
                value_false,
            },
        );
        Type::Any
    })
}
