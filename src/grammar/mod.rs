use crate::ast::Program;
use crate::error::*;
use thiserror::Error;

mod expr;
pub mod lexer;
mod statement;

use lexer::*;

pub struct Parser<'source> {
    lexer: Lexer<'source>,
    current_tok: Option<Token<'source>>,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source SourceFile<'source>) -> Self {
        Self {
            lexer: Lexer::new(source),
            current_tok: None,
        }
    }

    /// Parses a whole compilation unit: statements up to the end of input.
    pub fn parse_program(&mut self) -> ParseRes<Program> {
        let mut body = Vec::new();
        while self.peek_token()?.is_some() {
            body.push(self.parse()?);
        }
        tracing::debug!(target: "parser", "parsed {} top-level statements", body.len());
        Ok(Program { body })
    }

    pub fn peek_token(&mut self) -> ParseRes<Option<TokenKind>> {
        if self.current_tok.is_none() {
            let next_tok_opt = self
                .lexer
                .next_token()
                .map_err(|e| e.map_kind(ParseErrorKind::LexError))?;
            self.current_tok = next_tok_opt;
        }
        Ok(self.current_tok.map(|x| x.kind))
    }
    pub fn current_token_span(&mut self) -> Span {
        match self.current_tok {
            Some(tok) => tok.source.span,
            None => self.lexer.current_span(),
        }
    }
    pub fn current_token_source(&self) -> &'source str {
        self.current_tok.map_or("", |x| x.source.source)
    }
    /// Line of the next token (or of the end of input).
    pub fn current_line(&mut self) -> ParseRes<usize> {
        self.peek_token()?;
        let span = self.current_token_span();
        Ok(self.lexer.get_metadata().line_of(span.offset))
    }
    pub fn accept_current(&mut self) {
        self.current_tok = None;
    }
    pub fn emit_error_at<T>(&self, span: Span, kind: ParseErrorKind) -> ParseRes<T> {
        Err(ParseError::new(kind).with_source(span, self.lexer.get_metadata()))
    }
    pub fn expect_a_token(&mut self, wanted: WantedSpec<TokenKind>) -> ParseRes<TokenKind> {
        match self.peek_token()? {
            Some(tok) => Ok(tok),
            None => {
                let span = self.lexer.current_span();
                self.emit_error_at(span, ParseErrorKind::UnexpectedEOF { wanted })
            }
        }
    }
    pub fn reject_current_token<T>(&mut self, reason: ParseErrorKind) -> ParseRes<T> {
        let span = self.current_token_span();
        self.emit_error_at(span, reason)
    }
    pub fn expect_token(&mut self, kind: TokenKind) -> ParseRes<()> {
        let tok = self.expect_a_token(WantedSpec::Specific(kind))?;
        if tok != kind {
            self.reject_current_token(ParseErrorKind::Expected {
                wanted: WantedSpec::Specific(kind),
                found: tok,
            })
        } else {
            Ok(())
        }
    }
    /// Expects `kind` and moves past it.
    pub fn consume(&mut self, kind: TokenKind) -> ParseRes<()> {
        self.expect_token(kind)?;
        self.accept_current();
        Ok(())
    }
    pub fn keyword(&mut self, kw: Keyword) -> ParseRes<()> {
        self.consume(TokenKind::Keyword(kw))
            .map_err(|e| e.add_context("parsing keyword"))
    }
    pub fn parse<T>(&mut self) -> ParseRes<T>
    where
        T: Parse<'source>,
    {
        T::parse(self)
    }
    pub fn with_context<F, T>(&mut self, context: &'static str, mut cont: F) -> ParseRes<T>
    where
        F: FnMut(&mut Self) -> ParseRes<T>,
    {
        cont(self).map_err(|x| x.add_context(context))
    }
}

pub type ParseRes<T> = Result<T, ParseError>;
pub type ParseError = Error<ParseErrorKind>;

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("error while lexing source: {0}")]
    LexError(#[source] LexErrorKind),
    #[error("expected {wanted}, but found instead {found}")]
    Expected {
        wanted: WantedSpec<TokenKind>,
        found: TokenKind,
    },
    #[error("unexpected end of input, expected {wanted}")]
    UnexpectedEOF { wanted: WantedSpec<TokenKind> },
    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),
    #[error("invalid string literal: {0}")]
    InvalidString(#[source] LexErrorKind),
}

pub trait Parse<'source>: Sized {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::types::Type;

    fn parse(input: &str) -> ParseRes<Program> {
        let source = SourceFile::new(input);
        Parser::new(&source).parse_program()
    }

    fn parse_expr(input: &str) -> Expr {
        let source = SourceFile::new(input);
        Parser::new(&source).parse().unwrap()
    }

    fn var(line: usize, name: &str) -> Expr {
        Expr::new(
            line,
            ExprKind::Variable {
                name: name.to_string(),
                slot: None,
            },
        )
    }

    fn int(value: i32) -> Expr {
        Expr::new(1, ExprKind::Literal(Literal::Int(value)))
    }

    #[test]
    fn precedence_climbing() {
        let add = BinaryOp::Arithmetic(ArithmeticOp::Add);
        let mul = BinaryOp::Arithmetic(ArithmeticOp::Multiply);
        assert_eq!(
            parse_expr("1 + 2 * 3"),
            Expr::binary(1, add, int(1), Expr::binary(1, mul, int(2), int(3)))
        );
        let sub = BinaryOp::Arithmetic(ArithmeticOp::Subtract);
        assert_eq!(
            parse_expr("1 - 2 - 3"),
            Expr::binary(1, sub, Expr::binary(1, sub, int(1), int(2)), int(3))
        );
        let or = BinaryOp::Bit(BitOp::Or);
        let and = BinaryOp::Bit(BitOp::And);
        assert_eq!(
            parse_expr("1 | 2 & 3"),
            Expr::binary(1, or, int(1), Expr::binary(1, and, int(2), int(3)))
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(
            parse_expr("a = b = 1"),
            Expr::binary(
                1,
                BinaryOp::Assignment,
                var(1, "a"),
                Expr::binary(1, BinaryOp::Assignment, var(1, "b"), int(1))
            )
        );
    }

    #[test]
    fn nested_ternaries() {
        let expr = parse_expr("a ? 1 : b ? 2 : 3");
        let ExprKind::Ternary {
            condition,
            value_false: Some(value_false),
            ..
        } = expr.kind
        else {
            panic!("not a ternary: {expr:?}");
        };
        assert_eq!(*condition, var(1, "a"));
        assert!(matches!(value_false.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn ternary_without_false_branch() {
        let expr = parse_expr("a ? print_me");
        assert!(matches!(
            expr.kind,
            ExprKind::Ternary {
                value_false: None,
                ..
            }
        ));
    }

    #[test]
    fn unary_operators_and_literals() {
        let expr = parse_expr("!(x < -2.5)");
        let ExprKind::Unary {
            operator: UnaryOp::LogicNot,
            expr: inner,
        } = expr.kind
        else {
            panic!("not a negation: {expr:?}");
        };
        let ExprKind::Binary { rhs, .. } = inner.kind else {
            panic!("not a comparison: {inner:?}");
        };
        assert_eq!(
            *rhs,
            Expr::new(
                1,
                ExprKind::Unary {
                    operator: UnaryOp::Negate,
                    expr: Box::new(Expr::new(1, ExprKind::Literal(Literal::Double(2.5)))),
                }
            )
        );
    }

    #[test]
    fn minus_is_folded_into_int_literals() {
        let literal = |value| Expr::new(1, ExprKind::Literal(Literal::Int(value)));
        assert_eq!(parse_expr("-2147483648"), literal(i32::MIN));
        assert_eq!(
            parse_expr("--5"),
            Expr::new(
                1,
                ExprKind::Unary {
                    operator: UnaryOp::Negate,
                    expr: Box::new(literal(-5)),
                }
            )
        );
        assert_eq!(
            parse_expr("3 - 1"),
            Expr::binary(1, BinaryOp::Arithmetic(ArithmeticOp::Subtract), literal(3), literal(1))
        );
        let source = SourceFile::new("2147483648");
        let err = Parser::new(&source).parse::<Expr>().unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidNumber(_)), "{err}");
    }

    #[test]
    fn for_loop_parts() {
        let program =
            parse("for (int i = 0, j = 10; i < j; i = i + 1, j = j - 1)\n  print(i);").unwrap();
        let [Statement::For(for_loop)] = program.body.as_slice() else {
            panic!("not a single for loop: {program:?}");
        };
        assert_eq!(for_loop.init_declarations.len(), 2);
        assert_eq!(for_loop.init_declarations[1].name, "j");
        assert_eq!(for_loop.init_declarations[1].ty, Type::Int);
        assert!(for_loop.init_statements.is_empty());
        assert!(for_loop.condition.is_some());
        assert_eq!(for_loop.update.len(), 2);
        assert_eq!(for_loop.body.line(), 2);
    }

    #[test]
    fn for_loop_with_empty_parts() {
        let program = parse("int i; for (i = 0; ; ) { }").unwrap();
        let Statement::For(for_loop) = &program.body[1] else {
            panic!("not a for loop: {program:?}");
        };
        assert!(for_loop.init_declarations.is_empty());
        assert_eq!(for_loop.init_statements.len(), 1);
        assert!(for_loop.condition.is_none());
        assert!(for_loop.update.is_empty());
    }

    #[test]
    fn do_while_and_lines() {
        let program = parse("int n = 3;\ndo {\n  n = n - 1;\n} while (n > 0);").unwrap();
        let Statement::DoWhile {
            line,
            body,
            condition,
        } = &program.body[1]
        else {
            panic!("not a do-while: {program:?}");
        };
        assert_eq!(*line, 2);
        assert_eq!(body.line(), 2);
        assert_eq!(condition.line, 4);
    }

    #[test]
    fn string_literals_are_unescaped() {
        let expr = parse_expr(r#""a\"b" + 1"#);
        let ExprKind::Binary { lhs, .. } = expr.kind else {
            panic!("not a binary expression: {expr:?}");
        };
        assert_eq!(lhs.kind, ExprKind::Literal(Literal::Str("a\"b".to_string())));
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let err = parse("int a = 1\nprint(a);").unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::Expected {
                found: TokenKind::Keyword(Keyword::Print),
                ..
            }
        ));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn eof_inside_block() {
        let err = parse("{ print(1);").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEOF { .. }));
    }

    #[test]
    fn compound_assignment_is_rejected() {
        assert!(parse("int a = 0; a += 1;").is_err());
    }
}
