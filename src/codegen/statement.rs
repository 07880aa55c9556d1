use super::{
    resolved_type, Branch, Codegen, CodegenError, CodegenResult, Conditional, Emitter, LocalOp,
    Opcode,
};
use crate::ast::{ForLoop, Statement, VarDeclarator};
use crate::types::Type;

impl Codegen for VarDeclarator {
    fn codegen(&self, output: &mut Emitter) -> CodegenResult<()> {
        let init = match &self.init {
            Some(init) => init,
            None => return Ok(()),
        };
        let unresolved = || CodegenError::Unresolved { line: self.line };
        let store = LocalOp::store(self.ty).ok_or_else(unresolved)?;
        let slot = self.slot.ok_or_else(unresolved)?;
        init.codegen(output)?;
        output.add_local_instruction(store, slot);
        Ok(())
    }
}

impl Codegen for Statement {
    fn codegen(&self, output: &mut Emitter) -> CodegenResult<()> {
        match self {
            Statement::VarDecl(decl) => {
                for declarator in &decl.declarators {
                    declarator.codegen(output)?;
                }
            }
            Statement::Expr(expr) => {
                expr.codegen(output)?;
                if resolved_type(expr)? != Type::Void {
                    output.add_no_arg_instruction(Opcode::Pop);
                }
            }
            Statement::Print { expr, .. } => {
                expr.codegen(output)?;
                output.add_no_arg_instruction(Opcode::Print);
            }
            Statement::Block { statements, .. } => {
                for statement in statements {
                    statement.codegen(output)?;
                }
            }
            Statement::DoWhile {
                line,
                body,
                condition,
            } => {
                tracing::trace!(target: "codegen", line, "do-while loop");
                let test = output.create_label();
                let out = output.create_label();
                output.add_label(test)?;
                body.codegen(output)?;
                condition.codegen_branch(output, out, false)?;
                output.add_branch_instruction(Branch::Goto, test)?;
                output.add_label(out)?;
            }
            Statement::For(for_loop) => for_loop.codegen(output)?,
        }
        Ok(())
    }
}

impl Codegen for ForLoop {
    fn codegen(&self, output: &mut Emitter) -> CodegenResult<()> {
        tracing::trace!(target: "codegen", line = self.line, "for loop");
        for declaration in &self.init_declarations {
            declaration.codegen(output)?;
        }
        for statement in &self.init_statements {
            statement.codegen(output)?;
        }
        let test = output.create_label();
        let out = output.create_label();
        output.add_label(test)?;
        // no condition: loops until something else leaves the program
        if let Some(condition) = &self.condition {
            condition.codegen_branch(output, out, false)?;
        }
        self.body.codegen(output)?;
        for update in &self.update {
            update.codegen(output)?;
        }
        output.add_branch_instruction(Branch::Goto, test)?;
        output.add_label(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{analyze_program, AnalysisOptions};
    use crate::codegen::{Codegen, Emitter};
    use crate::error::SourceFile;
    use crate::grammar::Parser;

    fn listing(input: &str) -> String {
        let source = SourceFile::new(input);
        let program = Parser::new(&source).parse_program().unwrap();
        let analysis = analyze_program(program, AnalysisOptions::default());
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        let mut output = Emitter::new();
        for statement in &analysis.program.body {
            statement.codegen(&mut output).unwrap();
        }
        output.listing()
    }

    #[test]
    fn do_while_shape() {
        assert_eq!(
            listing("int n = 2; do n = n - 1; while (n > 0);"),
            "\ticonst 2\n\tistore 0\n\
             .L0:\n\
             \tiload 0\n\ticonst 1\n\tisub\n\tdup\n\tistore 0\n\tpop\n\
             \tiload 0\n\ticonst 0\n\tif_icmple .L1\n\
             \tgoto .L0\n\
             .L1:"
        );
    }

    #[test]
    fn for_shape() {
        assert_eq!(
            listing("for (int i = 0; i < 3; i = i + 1) print(i);"),
            "\ticonst 0\n\tistore 0\n\
             .L0:\n\
             \tiload 0\n\ticonst 3\n\tif_icmpge .L1\n\
             \tiload 0\n\tprint\n\
             \tiload 0\n\ticonst 1\n\tiadd\n\tdup\n\tistore 0\n\tpop\n\
             \tgoto .L0\n\
             .L1:"
        );
    }

    #[test]
    fn for_without_condition_has_no_conditional_jump() {
        let listing = listing("int i = 0; for (;;) { i = i + 1; }");
        assert!(!listing.contains("if"), "{listing}");
        assert!(listing.ends_with("\tgoto .L0\n.L1:"), "{listing}");
    }

    #[test]
    fn declarations_without_initializer_emit_nothing() {
        assert_eq!(listing("double d; String s = \"a\";"), "\tldc #0\n\tastore 1");
    }
}
