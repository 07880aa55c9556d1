use super::{Analyze, Context, SemanticErrorKind};
use crate::ast::{ForLoop, Statement, VarDecl, VarDeclarator};
use crate::types::Type;

impl Analyze for VarDeclarator {
    /// The initializer is analyzed before the name is bound, so `int a = a;`
    /// refers to an outer `a`.
    fn analyze(self, ctx: &mut Context) -> Self {
        let init = self.init.map(|init| init.analyze(ctx));
        if let Some(init) = &init {
            init.ty()
                .must_match_expected(init.line, self.ty, ctx.diagnostics_mut());
        }
        let slot = ctx.declare(&self.name, self.ty, self.line);
        VarDeclarator { init, slot, ..self }
    }
}

fn analyze_all<T: Analyze>(items: Vec<T>, ctx: &mut Context) -> Vec<T> {
    items.into_iter().map(|item| item.analyze(ctx)).collect()
}

fn check_condition(condition: &crate::ast::Expr, ctx: &mut Context) {
    condition
        .ty()
        .must_match_expected(condition.line, Type::Boolean, ctx.diagnostics_mut());
}

impl Analyze for Statement {
    fn analyze(self, ctx: &mut Context) -> Self {
        match self {
            Statement::VarDecl(VarDecl {
                line,
                ty,
                declarators,
            }) => Statement::VarDecl(VarDecl {
                line,
                ty,
                declarators: analyze_all(declarators, ctx),
            }),
            Statement::Expr(expr) => Statement::Expr(expr.analyze(ctx)),
            Statement::Print { line, expr } => {
                let expr = expr.analyze(ctx);
                if expr.ty() == Type::Void {
                    ctx.report(expr.line, SemanticErrorKind::NoValue);
                }
                Statement::Print { line, expr }
            }
            Statement::Block { line, statements } => {
                ctx.push_scope();
                let statements = analyze_all(statements, ctx);
                ctx.pop_scope();
                Statement::Block { line, statements }
            }
            Statement::DoWhile {
                line,
                body,
                condition,
            } => {
                let condition = condition.analyze(ctx);
                check_condition(&condition, ctx);
                let body = body.analyze(ctx);
                Statement::DoWhile {
                    line,
                    body,
                    condition,
                }
            }
            Statement::For(for_loop) => {
                ctx.push_scope();
                let for_loop = analyze_for(for_loop, ctx);
                ctx.pop_scope();
                Statement::For(for_loop)
            }
        }
    }
}

// declarations, init statements, condition, body, updates; in that order
fn analyze_for(for_loop: ForLoop, ctx: &mut Context) -> ForLoop {
    let init_declarations = analyze_all(for_loop.init_declarations, ctx);
    let init_statements = analyze_all(for_loop.init_statements, ctx);
    let condition = for_loop.condition.map(|condition| {
        let condition = condition.analyze(ctx);
        check_condition(&condition, ctx);
        condition
    });
    let body = for_loop.body.analyze(ctx);
    let update = analyze_all(for_loop.update, ctx);
    ForLoop {
        line: for_loop.line,
        init_declarations,
        init_statements,
        condition,
        update,
        body,
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{analyze_program, AnalysisOptions, SemanticErrorKind};
    use crate::ast::{ExprKind, Statement};
    use crate::error::SourceFile;
    use crate::grammar::Parser;
    use crate::types::Type;

    fn analyze(input: &str) -> crate::analysis::Analysis {
        let source = SourceFile::new(input);
        let program = Parser::new(&source).parse_program().unwrap();
        analyze_program(program, AnalysisOptions::default())
    }

    fn errors(input: &str) -> Vec<(usize, SemanticErrorKind)> {
        analyze(input)
            .diagnostics
            .iter()
            .map(|d| (d.line, d.kind.clone()))
            .collect()
    }

    #[test]
    fn declarations_get_slots() {
        let analysis = analyze("int a = 1, b;\ndouble c = 2.0 + a;\nprint(c);");
        assert!(analysis.diagnostics.is_empty());
        assert_eq!(analysis.max_locals, 3);
        let Statement::Print { expr, .. } = &analysis.program.body[2] else {
            panic!("not a print: {:?}", analysis.program);
        };
        assert_eq!(expr.ty(), Type::Double);
        assert!(matches!(expr.kind, ExprKind::Variable { slot: Some(2), .. }));
    }

    #[test]
    fn initializer_type_must_match() {
        assert_eq!(
            errors("int a = 1.5;\nboolean b = a;"),
            vec![
                (
                    1,
                    SemanticErrorKind::TypeMismatch {
                        expected: Type::Int,
                        found: Type::Double
                    }
                ),
                (
                    2,
                    SemanticErrorKind::TypeMismatch {
                        expected: Type::Boolean,
                        found: Type::Int
                    }
                ),
            ]
        );
    }

    #[test]
    fn for_variables_are_scoped_to_the_loop() {
        assert_eq!(
            errors("for (int i = 0; i < 3; i = i + 1) print(i);\nprint(i);"),
            vec![(2, SemanticErrorKind::UnknownVariable("i".to_string()))]
        );
    }

    #[test]
    fn loop_conditions_must_be_boolean() {
        assert_eq!(
            errors("int n = 2;\ndo n = n - 1; while (n);\nfor (; n; ) { }").len(),
            2
        );
    }

    #[test]
    fn do_while_condition_cannot_see_body_declarations() {
        assert_eq!(
            errors("do { int k = 1; } while (k > 0);"),
            vec![(1, SemanticErrorKind::UnknownVariable("k".to_string()))]
        );
    }

    #[test]
    fn printing_nothing_is_an_error() {
        assert_eq!(
            errors("boolean b = true;\nprint(b ? 1);"),
            vec![(2, SemanticErrorKind::NoValue)]
        );
    }
}
