use super::lexer::{self, Keyword, Operator, TokenKind};
use super::{Parse, ParseErrorKind, ParseRes, Parser};
use crate::ast::*;
use crate::error::WantedSpec;

/// An operator seen after an operand, before its right side is parsed.
#[derive(Debug, Clone, Copy)]
enum PendingOp {
    Binary(BinaryOp),
    /// `?`, binding just above assignment.
    Ternary,
}

impl PendingOp {
    const fn precedence(self) -> u8 {
        match self {
            Self::Binary(op) => op.precedence(),
            Self::Ternary => 15 - 13,
        }
    }
    fn is_right_associative(self) -> bool {
        match self {
            Self::Binary(op) => op.associativity() == Associativity::Right,
            Self::Ternary => true,
        }
    }
}

/// An operator whose middle part (if any) has already been consumed.
enum AcceptedOp {
    Binary(BinaryOp),
    Ternary { value_true: Expr },
}

impl AcceptedOp {
    fn build(self, line: usize, lhs: Expr, rhs: Expr) -> Expr {
        match self {
            Self::Binary(operator) => Expr::binary(line, operator, lhs, rhs),
            Self::Ternary { value_true } => ternary(line, lhs, value_true, Some(rhs)),
        }
    }
}

fn ternary(line: usize, condition: Expr, value_true: Expr, value_false: Option<Expr>) -> Expr {
    Expr::new(
        line,
        ExprKind::Ternary {
            condition: Box::new(condition),
            value_true: Box::new(value_true),
            value_false: value_false.map(Box::new),
        },
    )
}

fn peek_binary_op(parser: &mut Parser) -> ParseRes<Option<PendingOp>> {
    Ok(parser
        .peek_token()?
        .and_then(TokenKind::as_operator)
        .and_then(|op| match op {
            (Operator::Question, false) => Some(PendingOp::Ternary),
            op => BinaryOp::from_operator(op).map(PendingOp::Binary),
        }))
}

// precedence climbing over an already parsed left operand
fn parse_binary_expression(
    parser: &mut Parser,
    mut lhs: Expr,
    min_precedence: u8,
) -> ParseRes<Expr> {
    while let Some(op) = peek_binary_op(parser)?.filter(|op| op.precedence() >= min_precedence) {
        let line = parser.current_line()?;
        parser.accept_current();
        let accepted = match op {
            PendingOp::Binary(operator) => AcceptedOp::Binary(operator),
            PendingOp::Ternary => {
                let value_true: Expr =
                    parser.with_context("parsing ternary expression", |p| p.parse())?;
                if parser.peek_token()? != Some(TokenKind::Colon) {
                    lhs = ternary(line, lhs, value_true, None);
                    continue;
                }
                parser.accept_current();
                AcceptedOp::Ternary { value_true }
            }
        };
        let mut rhs = parse_primary(parser)?;
        while let Some(next) = peek_binary_op(parser)? {
            let (this, other) = (op.precedence(), next.precedence());
            if other > this {
                rhs = parse_binary_expression(parser, rhs, this + 1)?;
            } else if other == this && next.is_right_associative() {
                rhs = parse_binary_expression(parser, rhs, this)?;
            } else {
                break;
            }
        }
        lhs = accepted.build(line, lhs, rhs);
    }
    Ok(lhs)
}

// `negative` folds a leading `-` into an int literal, so that `-2147483648`
// can be written
fn parse_literal(parser: &mut Parser, line: usize, kind: TokenKind, negative: bool) -> ParseRes<Expr> {
    let text = parser.current_token_source();
    let literal = match kind {
        TokenKind::Number => match text
            .parse::<i64>()
            .ok()
            .map(|value| if negative { -value } else { value })
            .and_then(|value| i32::try_from(value).ok())
        {
            Some(value) => Literal::Int(value),
            None => {
                return parser
                    .reject_current_token(ParseErrorKind::InvalidNumber(text.to_string()))
            }
        },
        TokenKind::Decimal => match text.parse() {
            Ok(value) => Literal::Double(value),
            Err(_) => {
                return parser
                    .reject_current_token(ParseErrorKind::InvalidNumber(text.to_string()))
            }
        },
        TokenKind::Str => match lexer::unescape(text) {
            Ok(value) => Literal::Str(value),
            Err(e) => return parser.reject_current_token(ParseErrorKind::InvalidString(e)),
        },
        TokenKind::Keyword(Keyword::True) => Literal::Boolean(true),
        TokenKind::Keyword(Keyword::False) => Literal::Boolean(false),
        found => {
            return parser.reject_current_token(ParseErrorKind::Expected {
                wanted: WantedSpec::Description("literal"),
                found,
            })
        }
    };
    parser.accept_current();
    Ok(Expr::new(line, ExprKind::Literal(literal)))
}

/// An operand: prefix operators applied to a literal, a variable or a
/// parenthesized expression.
fn parse_primary(parser: &mut Parser) -> ParseRes<Expr> {
    let mut prefixes = Vec::new();
    while let Some(op) = parser
        .peek_token()?
        .and_then(TokenKind::as_operator)
        .and_then(UnaryOp::from_operator)
    {
        prefixes.push((parser.current_line()?, op));
        parser.accept_current();
    }

    let line = parser.current_line()?;
    let operand = match parser.expect_a_token(WantedSpec::Description("expression"))? {
        TokenKind::OpenParen => {
            parser.accept_current();
            let inner = parser.parse()?;
            parser.consume(TokenKind::CloseParen)?;
            inner
        }
        TokenKind::Identifier => {
            let name = parser.current_token_source().to_string();
            parser.accept_current();
            Expr::new(line, ExprKind::Variable { name, slot: None })
        }
        TokenKind::Number if matches!(prefixes.last(), Some((_, UnaryOp::Negate))) => {
            prefixes.pop();
            parse_literal(parser, line, TokenKind::Number, true)?
        }
        kind @ (TokenKind::Number
        | TokenKind::Decimal
        | TokenKind::Str
        | TokenKind::Keyword(Keyword::True | Keyword::False)) => {
            parse_literal(parser, line, kind, false)?
        }
        found => {
            return parser.reject_current_token(ParseErrorKind::Expected {
                wanted: WantedSpec::Description("expression"),
                found,
            })
        }
    };

    Ok(prefixes
        .into_iter()
        .rev()
        .fold(operand, |expr, (line, operator)| {
            Expr::new(
                line,
                ExprKind::Unary {
                    operator,
                    expr: Box::new(expr),
                },
            )
        }))
}

impl<'source> Parse<'source> for Expr {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing expression", |parser| {
            let lhs = parse_primary(parser)?;
            parse_binary_expression(parser, lhs, 0)
        })
    }
}
