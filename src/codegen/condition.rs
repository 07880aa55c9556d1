use super::{resolved_type, Branch, Codegen, CodegenResult, Emitter, Label, Opcode};
use crate::ast::{BinaryOp, Expr, ExprKind, Literal, LogicOp, Relational, UnaryOp};
use crate::types::Type;

/// Code generation of an expression used as a condition.
pub trait Conditional {
    /// Emits code that jumps to `target` when the expression evaluates to
    /// `on_true`, and falls through otherwise.
    fn codegen_branch(&self, output: &mut Emitter, target: Label, on_true: bool)
        -> CodegenResult<()>;
}

impl Conditional for Expr {
    fn codegen_branch(
        &self,
        output: &mut Emitter,
        target: Label,
        on_true: bool,
    ) -> CodegenResult<()> {
        resolved_type(self)?;
        match &self.kind {
            ExprKind::Literal(Literal::Boolean(value)) => {
                if *value == on_true {
                    output.add_branch_instruction(Branch::Goto, target)?;
                }
            }
            ExprKind::Unary {
                operator: UnaryOp::LogicNot,
                expr,
            } => expr.codegen_branch(output, target, !on_true)?,
            ExprKind::Binary {
                operator: BinaryOp::Logic(op),
                lhs,
                rhs,
            } => logic_branch(output, *op, lhs, rhs, target, on_true)?,
            ExprKind::Binary {
                operator: BinaryOp::Relational(relation),
                lhs,
                rhs,
            } => relational_branch(output, *relation, lhs, rhs, target, on_true)?,
            // anything else producing a boolean leaves 1 or 0 on the stack
            _ => {
                self.codegen(output)?;
                let branch = if on_true { Branch::IfNe } else { Branch::IfEq };
                output.add_branch_instruction(branch, target)?;
            }
        }
        Ok(())
    }
}

fn logic_branch(
    output: &mut Emitter,
    op: LogicOp,
    lhs: &Expr,
    rhs: &Expr,
    target: Label,
    on_true: bool,
) -> CodegenResult<()> {
    // `a || b` jumping on x is `!a && !b` jumping on !x, so both share the
    // same shape: a deciding left side that may short-circuit past the right
    let short_circuits_on = op == LogicOp::Or;
    if on_true == short_circuits_on {
        lhs.codegen_branch(output, target, on_true)?;
        rhs.codegen_branch(output, target, on_true)?;
    } else {
        let skip = output.create_label();
        lhs.codegen_branch(output, skip, short_circuits_on)?;
        rhs.codegen_branch(output, target, on_true)?;
        output.add_label(skip)?;
    }
    Ok(())
}

fn relational_branch(
    output: &mut Emitter,
    relation: Relational,
    lhs: &Expr,
    rhs: &Expr,
    target: Label,
    on_true: bool,
) -> CodegenResult<()> {
    lhs.codegen(output)?;
    rhs.codegen(output)?;
    let jump_on = if on_true { relation } else { relation.negate() };
    if resolved_type(lhs)? == Type::Double {
        // NaN must make the written relation false, whatever is jumped on
        let compare = match relation {
            Relational::Less | Relational::LessEqual => Opcode::DCmpG,
            _ => Opcode::DCmpL,
        };
        output.add_no_arg_instruction(compare);
        output.add_branch_instruction(Branch::zero_compare(jump_on), target)?;
    } else {
        output.add_branch_instruction(Branch::int_compare(jump_on), target)?;
    }
    Ok(())
}

/// Value of a boolean operator: `1` if it holds, `0` otherwise.
pub(super) fn materialize(expr: &Expr, output: &mut Emitter) -> CodegenResult<()> {
    let is_false = output.create_label();
    let end = output.create_label();
    expr.codegen_branch(output, is_false, false)?;
    output.add_int_constant(1);
    output.add_branch_instruction(Branch::Goto, end)?;
    output.add_label(is_false)?;
    output.add_int_constant(0);
    output.add_label(end)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boolean(value: bool) -> Expr {
        Expr::new(1, ExprKind::Literal(Literal::Boolean(value))).typed(Type::Boolean)
    }

    fn var(slot: u16, ty: Type) -> Expr {
        Expr::new(
            1,
            ExprKind::Variable {
                name: format!("v{}", slot),
                slot: Some(slot),
            },
        )
        .typed(ty)
    }

    fn binary(operator: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(1, operator, lhs, rhs).typed(Type::Boolean)
    }

    fn branch_listing(expr: &Expr, on_true: bool) -> String {
        let mut output = Emitter::new();
        let target = output.create_label();
        expr.codegen_branch(&mut output, target, on_true).unwrap();
        output.listing()
    }

    #[test]
    fn literals_jump_or_fall_through() {
        assert_eq!(branch_listing(&boolean(true), true), "\tgoto .L0");
        assert_eq!(branch_listing(&boolean(true), false), "");
        assert_eq!(branch_listing(&boolean(false), false), "\tgoto .L0");
    }

    #[test]
    fn not_flips_the_sense() {
        let not = Expr::new(
            1,
            ExprKind::Unary {
                operator: UnaryOp::LogicNot,
                expr: Box::new(var(0, Type::Boolean)),
            },
        )
        .typed(Type::Boolean);
        assert_eq!(branch_listing(&not, true), "\tiload 0\n\tifeq .L0");
    }

    #[test]
    fn and_short_circuits() {
        let and = binary(
            BinaryOp::Logic(LogicOp::And),
            var(0, Type::Boolean),
            var(1, Type::Boolean),
        );
        assert_eq!(
            branch_listing(&and, false),
            "\tiload 0\n\tifeq .L0\n\tiload 1\n\tifeq .L0"
        );
        assert_eq!(
            branch_listing(&and, true),
            "\tiload 0\n\tifeq .L1\n\tiload 1\n\tifne .L0\n.L1:"
        );
    }

    #[test]
    fn or_short_circuits() {
        let or = binary(
            BinaryOp::Logic(LogicOp::Or),
            var(0, Type::Boolean),
            var(1, Type::Boolean),
        );
        assert_eq!(
            branch_listing(&or, true),
            "\tiload 0\n\tifne .L0\n\tiload 1\n\tifne .L0"
        );
        assert_eq!(
            branch_listing(&or, false),
            "\tiload 0\n\tifne .L1\n\tiload 1\n\tifeq .L0\n.L1:"
        );
    }

    #[test]
    fn comparisons_pick_the_right_jump() {
        let less = binary(
            BinaryOp::Relational(Relational::Less),
            var(0, Type::Int),
            var(1, Type::Int),
        );
        assert_eq!(branch_listing(&less, true), "\tiload 0\n\tiload 1\n\tif_icmplt .L0");
        assert_eq!(branch_listing(&less, false), "\tiload 0\n\tiload 1\n\tif_icmpge .L0");

        let greater = binary(
            BinaryOp::Relational(Relational::Greater),
            var(0, Type::Double),
            var(1, Type::Double),
        );
        assert_eq!(
            branch_listing(&greater, false),
            "\tdload 0\n\tdload 1\n\tdcmpl\n\tifle .L0"
        );
    }

    #[test]
    fn value_of_a_comparison() {
        let equal = binary(
            BinaryOp::Relational(Relational::Equals),
            var(0, Type::Boolean),
            boolean(true),
        );
        let mut output = Emitter::new();
        materialize(&equal, &mut output).unwrap();
        assert_eq!(
            output.listing(),
            "\tiload 0\n\ticonst 1\n\tif_icmpne .L0\n\ticonst 1\n\tgoto .L1\n.L0:\n\ticonst 0\n.L1:"
        );
    }
}
