//! Indented, XML-like rendering of the syntax tree, showing for every node
//! its line, its resolved type and its operator.
use crate::ast::*;
use crate::types::Type;
use itertools::Itertools;

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct TreeDump {
    out: String,
    depth: usize,
}

fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            '"' => "&quot;".to_string(),
            '\n' => "\\n".to_string(),
            c => c.to_string(),
        })
        .collect()
}

fn type_name(ty: Option<Type>) -> String {
    ty.map(|ty| ty.to_string()).unwrap_or_default()
}

impl TreeDump {
    pub fn program(program: &Program) -> String {
        let mut dump = Self::default();
        dump.open("Program", &[]);
        for statement in &program.body {
            dump.statement(statement);
        }
        dump.close("Program");
        dump.out
    }

    pub fn expression(expr: &Expr) -> String {
        let mut dump = Self::default();
        dump.expr(expr);
        dump.out
    }

    fn tag(&mut self, tag: &str, attributes: &[(&str, String)], end: &str) {
        let attributes = attributes
            .iter()
            .map(|(name, value)| format!(" {}=\"{}\"", name, escape(value)))
            .join("");
        self.out.push_str(&INDENT.repeat(self.depth));
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push_str(&attributes);
        self.out.push_str(end);
        self.out.push('\n');
    }

    fn open(&mut self, tag: &str, attributes: &[(&str, String)]) {
        self.tag(tag, attributes, ">");
        self.depth += 1;
    }

    fn leaf(&mut self, tag: &str, attributes: &[(&str, String)]) {
        self.tag(tag, attributes, "/>");
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.out.push_str(&INDENT.repeat(self.depth));
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push_str(">\n");
    }

    fn wrapped(&mut self, tag: &str, expr: &Expr) {
        self.open(tag, &[]);
        self.expr(expr);
        self.close(tag);
    }

    fn statements(&mut self, tag: &str, statements: &[Statement]) {
        if statements.is_empty() {
            return;
        }
        self.open(tag, &[]);
        for statement in statements {
            self.statement(statement);
        }
        self.close(tag);
    }

    fn declarator(&mut self, declarator: &VarDeclarator) {
        let mut attributes = vec![
            ("line", declarator.line.to_string()),
            ("name", declarator.name.clone()),
            ("type", declarator.ty.to_string()),
        ];
        if let Some(slot) = declarator.slot {
            attributes.push(("slot", slot.to_string()));
        }
        match &declarator.init {
            Some(init) => {
                self.open("VariableDeclarator", &attributes);
                self.wrapped("Initializer", init);
                self.close("VariableDeclarator");
            }
            None => self.leaf("VariableDeclarator", &attributes),
        }
    }

    fn statement(&mut self, statement: &Statement) {
        let line = statement.line().to_string();
        match statement {
            Statement::VarDecl(decl) => {
                self.open("VariableDeclaration", &[("line", line), ("type", decl.ty.to_string())]);
                for declarator in &decl.declarators {
                    self.declarator(declarator);
                }
                self.close("VariableDeclaration");
            }
            Statement::Expr(expr) => {
                self.open("ExpressionStatement", &[("line", line)]);
                self.expr(expr);
                self.close("ExpressionStatement");
            }
            Statement::Print { expr, .. } => {
                self.open("PrintStatement", &[("line", line)]);
                self.expr(expr);
                self.close("PrintStatement");
            }
            Statement::Block { statements, .. } => {
                self.open("Block", &[("line", line)]);
                for statement in statements {
                    self.statement(statement);
                }
                self.close("Block");
            }
            Statement::DoWhile {
                body, condition, ..
            } => {
                self.open("DoWhileStatement", &[("line", line)]);
                self.open("Body", &[]);
                self.statement(body);
                self.close("Body");
                self.wrapped("Condition", condition);
                self.close("DoWhileStatement");
            }
            Statement::For(for_loop) => {
                self.open("ForStatement", &[("line", line)]);
                if !for_loop.init_declarations.is_empty() {
                    self.open("ForInitDeclarations", &[]);
                    for declarator in &for_loop.init_declarations {
                        self.declarator(declarator);
                    }
                    self.close("ForInitDeclarations");
                }
                self.statements("ForInitStatements", &for_loop.init_statements);
                if let Some(condition) = &for_loop.condition {
                    self.wrapped("Condition", condition);
                }
                self.statements("ForUpdate", &for_loop.update);
                self.open("Body", &[]);
                self.statement(&for_loop.body);
                self.close("Body");
                self.close("ForStatement");
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        let line = ("line", expr.line.to_string());
        let ty = ("type", type_name(expr.ty));
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let value = match literal {
                    Literal::Int(value) => value.to_string(),
                    Literal::Double(value) => format!("{:?}", value),
                    Literal::Boolean(value) => value.to_string(),
                    Literal::Str(value) => value.clone(),
                };
                self.leaf("Literal", &[line, ty, ("value", value)]);
            }
            ExprKind::Variable { name, slot } => {
                let mut attributes = vec![line, ty, ("name", name.clone())];
                if let Some(slot) = slot {
                    attributes.push(("slot", slot.to_string()));
                }
                self.leaf("Variable", &attributes);
            }
            ExprKind::Unary { operator, expr } => {
                self.open(
                    "UnaryExpression",
                    &[line, ty, ("operator", operator.symbol().to_string())],
                );
                self.wrapped("Operand", expr);
                self.close("UnaryExpression");
            }
            ExprKind::Binary { operator, lhs, rhs } => {
                self.open(
                    "BinaryExpression",
                    &[line, ty, ("operator", operator.symbol().to_string())],
                );
                self.wrapped("Lhs", lhs);
                self.wrapped("Rhs", rhs);
                self.close("BinaryExpression");
            }
            ExprKind::Concat { lhs, rhs } => {
                self.open("StringConcatenation", &[line, ty, ("operator", "+".to_string())]);
                self.wrapped("Lhs", lhs);
                self.wrapped("Rhs", rhs);
                self.close("StringConcatenation");
            }
            ExprKind::Ternary {
                condition,
                value_true,
                value_false,
            } => {
                self.open(
                    "ConditionalExpression",
                    &[line, ty, ("operator", "?:".to_string())],
                );
                self.wrapped("Condition", condition);
                self.wrapped("ValueTrue", value_true);
                if let Some(value_false) = value_false {
                    self.wrapped("ValueFalse", value_false);
                }
                self.close("ConditionalExpression");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_expression_layout() {
        let expr = Expr::binary(
            3,
            BinaryOp::Relational(Relational::Less),
            Expr::new(3, ExprKind::Literal(Literal::Int(1))).typed(Type::Int),
            Expr::new(
                3,
                ExprKind::Variable {
                    name: "x".to_string(),
                    slot: Some(0),
                },
            ),
        )
        .typed(Type::Boolean);
        assert_eq!(
            TreeDump::expression(&expr),
            "\
<BinaryExpression line=\"3\" type=\"boolean\" operator=\"&lt;\">
    <Lhs>
        <Literal line=\"3\" type=\"int\" value=\"1\"/>
    </Lhs>
    <Rhs>
        <Variable line=\"3\" type=\"\" name=\"x\" slot=\"0\"/>
    </Rhs>
</BinaryExpression>
"
        );
    }

    #[test]
    fn loops_show_their_parts() {
        let program = Program {
            body: vec![Statement::For(ForLoop {
                line: 1,
                init_declarations: Vec::new(),
                init_statements: Vec::new(),
                condition: None,
                update: Vec::new(),
                body: Box::new(Statement::Block {
                    line: 1,
                    statements: Vec::new(),
                }),
            })],
        };
        assert_eq!(
            TreeDump::program(&program),
            "\
<Program>
    <ForStatement line=\"1\">
        <Body>
            <Block line=\"1\">
            </Block>
        </Body>
    </ForStatement>
</Program>
"
        );
    }
}
