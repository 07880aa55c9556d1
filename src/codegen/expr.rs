use super::condition::{materialize, Conditional};
use super::{
    resolved_type, Branch, Codegen, CodegenError, CodegenResult, Emitter, LocalOp, Opcode,
};
use crate::ast::{ArithmeticOp, BinaryOp, BitOp, Expr, ExprKind, Literal, UnaryOp};
use crate::types::Type;

impl Codegen for Expr {
    /// Leaves the value of the expression on top of the stack (nothing for
    /// `void` expressions).
    fn codegen(&self, output: &mut Emitter) -> CodegenResult<()> {
        let ty = resolved_type(self)?;
        match &self.kind {
            ExprKind::Literal(literal) => push_literal(literal, output)?,
            ExprKind::Variable { slot, .. } => {
                let (op, slot) = local_access(self, *slot, LocalOp::load)?;
                output.add_local_instruction(op, slot);
            }
            ExprKind::Unary {
                operator: UnaryOp::Negate,
                expr,
            } => {
                expr.codegen(output)?;
                output.add_no_arg_instruction(if ty == Type::Double {
                    Opcode::DNeg
                } else {
                    Opcode::INeg
                });
            }
            ExprKind::Unary {
                operator: UnaryOp::LogicNot,
                ..
            } => materialize(self, output)?,
            ExprKind::Binary { operator, lhs, rhs } => match operator {
                BinaryOp::Arithmetic(op) => arithmetic(output, *op, ty, lhs, rhs)?,
                BinaryOp::Bit(op) => {
                    lhs.codegen(output)?;
                    rhs.codegen(output)?;
                    output.add_no_arg_instruction(match op {
                        BitOp::And => Opcode::IAnd,
                        BitOp::Or => Opcode::IOr,
                        BitOp::Xor => Opcode::IXor,
                    });
                }
                BinaryOp::Logic(_) | BinaryOp::Relational(_) => materialize(self, output)?,
                BinaryOp::Assignment => {
                    let slot = match lhs.kind {
                        ExprKind::Variable { slot, .. } => slot,
                        _ => None,
                    };
                    let (store, slot) = local_access(lhs, slot, LocalOp::store)?;
                    rhs.codegen(output)?;
                    // the assignment's own value
                    output.add_no_arg_instruction(Opcode::Dup);
                    output.add_local_instruction(store, slot);
                }
            },
            ExprKind::Concat { lhs, rhs } => {
                lhs.codegen(output)?;
                rhs.codegen(output)?;
                output.add_no_arg_instruction(Opcode::Concat);
            }
            ExprKind::Ternary {
                condition,
                value_true,
                value_false,
            } => ternary(output, ty, condition, value_true, value_false.as_deref())?,
        }
        Ok(())
    }
}

fn push_literal(literal: &Literal, output: &mut Emitter) -> CodegenResult<()> {
    match literal {
        Literal::Int(value) => output.add_int_constant(*value),
        Literal::Double(value) => output.add_double_constant(*value),
        Literal::Boolean(value) => output.add_int_constant(i32::from(*value)),
        Literal::Str(value) => output.add_string_constant(value)?,
    }
    Ok(())
}

fn local_access(
    expr: &Expr,
    slot: Option<u16>,
    op_for: fn(Type) -> Option<LocalOp>,
) -> CodegenResult<(LocalOp, u16)> {
    let unresolved = || CodegenError::Unresolved { line: expr.line };
    let op = op_for(resolved_type(expr)?).ok_or_else(unresolved)?;
    Ok((op, slot.ok_or_else(unresolved)?))
}

/// Converts the value on top of the stack from `from` to `to`.
fn convert(output: &mut Emitter, from: Type, to: Type) {
    match (from, to) {
        (Type::Int, Type::Double) => output.add_no_arg_instruction(Opcode::I2D),
        (Type::Double, Type::Int) => output.add_no_arg_instruction(Opcode::D2I),
        _ => {}
    }
}

fn arithmetic(
    output: &mut Emitter,
    op: ArithmeticOp,
    ty: Type,
    lhs: &Expr,
    rhs: &Expr,
) -> CodegenResult<()> {
    lhs.codegen(output)?;
    rhs.codegen(output)?;
    // only the right operand (top of the stack) is ever converted
    convert(output, resolved_type(rhs)?, ty);
    let double = ty == Type::Double;
    output.add_no_arg_instruction(match op {
        ArithmeticOp::Add if double => Opcode::DAdd,
        ArithmeticOp::Add => Opcode::IAdd,
        ArithmeticOp::Subtract if double => Opcode::DSub,
        ArithmeticOp::Subtract => Opcode::ISub,
        ArithmeticOp::Multiply if double => Opcode::DMul,
        ArithmeticOp::Multiply => Opcode::IMul,
        ArithmeticOp::Divide if double => Opcode::DDiv,
        ArithmeticOp::Divide => Opcode::IDiv,
        ArithmeticOp::Modulo if double => Opcode::DRem,
        ArithmeticOp::Modulo => Opcode::IRem,
    });
    Ok(())
}

fn ternary(
    output: &mut Emitter,
    ty: Type,
    condition: &Expr,
    value_true: &Expr,
    value_false: Option<&Expr>,
) -> CodegenResult<()> {
    let else_label = output.create_label();
    condition.codegen_branch(output, else_label, false)?;
    value_true.codegen(output)?;
    let true_ty = resolved_type(value_true)?;
    match value_false {
        Some(value_false) => {
            convert(output, true_ty, ty);
            let end = output.create_label();
            output.add_branch_instruction(Branch::Goto, end)?;
            output.add_label(else_label)?;
            value_false.codegen(output)?;
            convert(output, resolved_type(value_false)?, ty);
            output.add_label(end)?;
        }
        None => {
            // nothing to pair the value with, drop it
            if true_ty != Type::Void {
                output.add_no_arg_instruction(Opcode::Pop);
            }
            output.add_label(else_label)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(literal: Literal) -> Expr {
        let ty = literal.ty();
        Expr::new(1, ExprKind::Literal(literal)).typed(ty)
    }

    fn arith(op: ArithmeticOp, lhs: Expr, rhs: Expr, ty: Type) -> Expr {
        Expr::binary(1, BinaryOp::Arithmetic(op), lhs, rhs).typed(ty)
    }

    fn listing(expr: &Expr) -> String {
        let mut output = Emitter::new();
        expr.codegen(&mut output).unwrap();
        output.listing()
    }

    #[test]
    fn coercion_follows_the_right_operand() {
        let mixed = arith(
            ArithmeticOp::Multiply,
            lit(Literal::Int(2)),
            lit(Literal::Double(1.5)),
            Type::Int,
        );
        assert_eq!(listing(&mixed), "\ticonst 2\n\tdconst 1.5\n\td2i\n\timul");
        let mixed = arith(
            ArithmeticOp::Modulo,
            lit(Literal::Double(1.5)),
            lit(Literal::Int(2)),
            Type::Double,
        );
        assert_eq!(listing(&mixed), "\tdconst 1.5\n\ticonst 2\n\ti2d\n\tdrem");
        let same = arith(
            ArithmeticOp::Subtract,
            lit(Literal::Int(2)),
            lit(Literal::Int(1)),
            Type::Int,
        );
        assert_eq!(listing(&same), "\ticonst 2\n\ticonst 1\n\tisub");
    }

    #[test]
    fn assignment_keeps_its_value() {
        let target = Expr::new(
            1,
            ExprKind::Variable {
                name: "s".to_string(),
                slot: Some(3),
            },
        )
        .typed(Type::String);
        let assign = Expr::binary(
            1,
            BinaryOp::Assignment,
            target,
            lit(Literal::Str("x".to_string())),
        )
        .typed(Type::String);
        assert_eq!(listing(&assign), "\tldc #0\n\tdup\n\tastore 3");
    }

    #[test]
    fn ternary_without_false_branch_drops_its_value() {
        let ternary = Expr::new(
            1,
            ExprKind::Ternary {
                condition: Box::new(lit(Literal::Boolean(false))),
                value_true: Box::new(lit(Literal::Int(1))),
                value_false: None,
            },
        )
        .typed(Type::Void);
        assert_eq!(listing(&ternary), "\tgoto .L0\n\ticonst 1\n\tpop\n.L0:");
    }

    #[test]
    fn unanalyzed_expressions_are_rejected() {
        let mut output = Emitter::new();
        let raw = Expr::new(4, ExprKind::Literal(Literal::Int(1)));
        assert_eq!(
            raw.codegen(&mut output),
            Err(CodegenError::Unresolved { line: 4 })
        );
        let any = Expr::new(5, ExprKind::Literal(Literal::Int(1))).typed(Type::Any);
        assert_eq!(
            any.codegen(&mut output),
            Err(CodegenError::Unresolved { line: 5 })
        );
    }
}
