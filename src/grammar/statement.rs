use super::{
    lexer::{Keyword, Operator, TokenKind},
    Parse, ParseErrorKind, ParseRes, Parser,
};
use crate::ast::{Expr, ForLoop, Statement, VarDecl, VarDeclarator};
use crate::error::WantedSpec;
use crate::types::Type;

impl<'source> Parse<'source> for Statement {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing statement", |parser| {
            let line = parser.current_line()?;
            Ok(
                match parser.expect_a_token(WantedSpec::Description("statement"))? {
                    TokenKind::OpenBrace => block(parser, line)?,
                    TokenKind::Keyword(kw) if kw.is_type() => {
                        let decl = var_decl(parser)?;
                        parser.consume(TokenKind::Semicolon)?;
                        Statement::VarDecl(decl)
                    }
                    TokenKind::Keyword(Keyword::Do) => {
                        parser.with_context("parsing do-while loop", |p| do_while(p, line))?
                    }
                    TokenKind::Keyword(Keyword::For) => {
                        parser.with_context("parsing for loop", |p| for_loop(p, line))?
                    }
                    TokenKind::Keyword(Keyword::Print) => {
                        parser.accept_current();
                        let expr = parenthesized(parser)?;
                        parser.consume(TokenKind::Semicolon)?;
                        Statement::Print { line, expr }
                    }
                    _ => {
                        let expr = parser.parse()?;
                        parser.consume(TokenKind::Semicolon)?;
                        Statement::Expr(expr)
                    }
                },
            )
        })
    }
}

fn block(parser: &mut Parser, line: usize) -> ParseRes<Statement> {
    parser.consume(TokenKind::OpenBrace)?;
    let mut statements = Vec::new();
    while parser.expect_a_token(WantedSpec::Specific(TokenKind::CloseBrace))?
        != TokenKind::CloseBrace
    {
        statements.push(parser.parse()?);
    }
    parser.accept_current();
    Ok(Statement::Block { line, statements })
}

fn parenthesized(parser: &mut Parser) -> ParseRes<Expr> {
    parser.consume(TokenKind::OpenParen)?;
    let expr = parser.parse()?;
    parser.consume(TokenKind::CloseParen)?;
    Ok(expr)
}

/// `type name [= init], ...` without the trailing semicolon.
fn var_decl(parser: &mut Parser) -> ParseRes<VarDecl> {
    let line = parser.current_line()?;
    let ty = match Type::from_keyword(parser.current_token_source()) {
        Some(ty) => ty,
        None => {
            let found = parser.expect_a_token(WantedSpec::Description("type"))?;
            return parser.reject_current_token(ParseErrorKind::Expected {
                wanted: WantedSpec::Description("type"),
                found,
            });
        }
    };
    parser.accept_current();

    let mut declarators = Vec::new();
    loop {
        let line = parser.current_line()?;
        parser.expect_token(TokenKind::Identifier)?;
        let name = parser.current_token_source().to_string();
        parser.accept_current();
        let init = if let Some(TokenKind::Operator {
            kind: Operator::Equals,
            has_equal: false,
        }) = parser.peek_token()?
        {
            parser.accept_current();
            Some(parser.with_context("parsing variable initializer", |p| p.parse())?)
        } else {
            None
        };
        declarators.push(VarDeclarator {
            line,
            name,
            ty,
            init,
            slot: None,
        });
        if parser.peek_token()? != Some(TokenKind::Comma) {
            break;
        }
        parser.accept_current();
    }
    Ok(VarDecl {
        line,
        ty,
        declarators,
    })
}

fn do_while(parser: &mut Parser, line: usize) -> ParseRes<Statement> {
    parser.keyword(Keyword::Do)?;
    let body = parser.parse()?;
    parser.keyword(Keyword::While)?;
    let condition = parenthesized(parser)?;
    parser.consume(TokenKind::Semicolon)?;
    Ok(Statement::DoWhile {
        line,
        body: Box::new(body),
        condition,
    })
}

// comma separated expression statements, up to (not including) `end`
fn expression_list(parser: &mut Parser, end: TokenKind) -> ParseRes<Vec<Statement>> {
    let mut statements = Vec::new();
    if parser.peek_token()? == Some(end) {
        return Ok(statements);
    }
    loop {
        statements.push(Statement::Expr(parser.parse()?));
        if parser.peek_token()? != Some(TokenKind::Comma) {
            return Ok(statements);
        }
        parser.accept_current();
    }
}

fn for_loop(parser: &mut Parser, line: usize) -> ParseRes<Statement> {
    parser.keyword(Keyword::For)?;
    parser.consume(TokenKind::OpenParen)?;

    let (init_declarations, init_statements) = match parser.peek_token()? {
        Some(TokenKind::Keyword(kw)) if kw.is_type() => (var_decl(parser)?.declarators, Vec::new()),
        _ => (Vec::new(), expression_list(parser, TokenKind::Semicolon)?),
    };
    parser.consume(TokenKind::Semicolon)?;

    let condition = if parser.peek_token()? == Some(TokenKind::Semicolon) {
        None
    } else {
        Some(parser.with_context("parsing loop condition", |p| p.parse())?)
    };
    parser.consume(TokenKind::Semicolon)?;

    let update = expression_list(parser, TokenKind::CloseParen)?;
    parser.consume(TokenKind::CloseParen)?;

    let body = parser.parse()?;
    Ok(Statement::For(ForLoop {
        line,
        init_declarations,
        init_statements,
        condition,
        update,
        body: Box::new(body),
    }))
}
