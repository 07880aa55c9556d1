use crate::error::{self, SourceFile, Span, WantedSpec};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, Keyword> = {
        let mut keywords = HashMap::new();
        keywords.insert("int", Keyword::Int);
        keywords.insert("double", Keyword::Double);
        keywords.insert("boolean", Keyword::Boolean);
        keywords.insert("String", Keyword::String);
        keywords.insert("true", Keyword::True);
        keywords.insert("false", Keyword::False);
        keywords.insert("do", Keyword::Do);
        keywords.insert("while", Keyword::While);
        keywords.insert("for", Keyword::For);
        keywords.insert("print", Keyword::Print);
        keywords
    };
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::CloseBrace => write!(f, "closing brace '}}'"),
            Self::OpenBrace => write!(f, "opening brace '{{'"),
            Self::Identifier => write!(f, "identifier"),
            Self::Keyword(kw) => write!(f, "keyword `{}`", kw),
            Self::Number => write!(f, "number"),
            Self::Decimal => write!(f, "decimal number"),
            Self::Str => write!(f, "string literal"),
            Self::OpenParen => write!(f, "opening parentheses '('"),
            Self::CloseParen => write!(f, "closing parentheses ')'"),
            Self::Semicolon => write!(f, "semicolon ';'"),
            Self::Comma => write!(f, "comma ','"),
            Self::Colon => write!(f, "colon ':'"),
            Self::Operator { kind, has_equal } => write!(
                f,
                "operator `{}{}`",
                kind,
                if *has_equal { "=" } else { "" }
            ),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::ExclamationMark => "!",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Percentage => "%",
            Operator::And => "&",
            Operator::Pipe => "|",
            Operator::Hat => "^",
            Operator::DoubleAnd => "&&",
            Operator::DoublePipe => "||",
            Operator::AngleRight => ">",
            Operator::AngleLeft => "<",
            Operator::Equals => "=",
            Operator::Question => "?",
        })
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Keyword::Int => "int",
            Keyword::Double => "double",
            Keyword::Boolean => "boolean",
            Keyword::String => "String",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Do => "do",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::Print => "print",
        })
    }
}

pub type LexError = error::Error<LexErrorKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub source: Source<'a>,
}

impl<'a> Token<'a> {
    pub const fn new(kind: TokenKind, source: Source<'a>) -> Self {
        Self { kind, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Semicolon,
    Comma,
    Colon,
    Number,
    Decimal,
    Str,
    Identifier,
    Keyword(Keyword),
    Operator { kind: Operator, has_equal: bool },
}

impl TokenKind {
    pub const fn as_operator(self) -> Option<(Operator, bool)> {
        if let TokenKind::Operator { kind, has_equal } = self {
            Some((kind, has_equal))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Int,
    Double,
    Boolean,
    String,
    True,
    False,
    Do,
    While,
    For,
    Print,
}

impl Keyword {
    pub const fn is_type(self) -> bool {
        matches!(self, Self::Int | Self::Double | Self::Boolean | Self::String)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    ExclamationMark,
    Star,
    Slash,
    Percentage,
    And,
    Pipe,
    Hat,
    DoubleAnd,
    DoublePipe,
    AngleRight,
    AngleLeft,
    Equals,
    Question,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source<'source> {
    pub span: Span,
    pub source: &'source str,
}

#[derive(Debug, Error)]
pub enum LexErrorKind {
    #[error("unexpected {found:?}, expected {wanted}")]
    Expected {
        wanted: WantedSpec<char>,
        found: char,
    },
    #[error("unexpected {0:?}")]
    UnexpectedChar(char),
    #[error("string literal is never closed")]
    UnterminatedString,
    #[error("unknown escape sequence `\\{0}`")]
    UnknownEscape(char),
}

pub struct Lexer<'a> {
    input: std::iter::Peekable<std::str::CharIndices<'a>>,
    metadata: &'a SourceFile<'a>,
}

impl<'source> Lexer<'source> {
    pub fn new(input: &'source SourceFile<'source>) -> Self {
        Self {
            input: input.input().char_indices().peekable(),
            metadata: input,
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token<'source>>, LexError> {
        self.skip_trivia();
        let (start, ch) = match self.input.peek().copied() {
            Some(next) => next,
            None => return Ok(None),
        };
        let single = match ch {
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            '{' => Some(TokenKind::OpenBrace),
            '}' => Some(TokenKind::CloseBrace),
            ';' => Some(TokenKind::Semicolon),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(Some(Token::new(kind, self.source_from_len(start, 1))));
        }
        if ch == '"' {
            return self.string().map(Some);
        }
        if let Some(src) = self.identifier() {
            let kind = KEYWORDS
                .get(src.source)
                .map_or(TokenKind::Identifier, |kw| TokenKind::Keyword(*kw));
            return Ok(Some(Token::new(kind, src)));
        }
        if let Some(kind) = self.operator() {
            let has_equal = self.skip_if(|x| x == '=').is_some();
            return Ok(Some(Token::new(
                TokenKind::Operator { kind, has_equal },
                self.source_until_current(start),
            )));
        }
        if let Some(token) = self.number()? {
            return Ok(Some(token));
        }
        Err(self.error(start, LexErrorKind::UnexpectedChar(ch)))
    }

    fn operator(&mut self) -> Option<Operator> {
        let op = match self.input.peek()?.1 {
            '<' => Operator::AngleLeft,
            '>' => Operator::AngleRight,
            '|' => {
                self.advance();
                return Some(if self.skip_if(|c| c == '|').is_some() {
                    Operator::DoublePipe
                } else {
                    Operator::Pipe
                });
            }
            '&' => {
                self.advance();
                return Some(if self.skip_if(|c| c == '&').is_some() {
                    Operator::DoubleAnd
                } else {
                    Operator::And
                });
            }
            '^' => Operator::Hat,
            '=' => Operator::Equals,
            '!' => Operator::ExclamationMark,
            '+' => Operator::Plus,
            '-' => Operator::Minus,
            '/' => Operator::Slash,
            '*' => Operator::Star,
            '%' => Operator::Percentage,
            '?' => Operator::Question,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn identifier(&mut self) -> Option<Source<'source>> {
        let (start, _) = self.skip_if(|c| c.is_ascii_alphabetic() || c == '_')?;
        self.skip_while(|c| c.is_ascii_alphanumeric() || c == '_');
        Some(self.source_until_current(start))
    }

    fn number(&mut self) -> Result<Option<Token<'source>>, LexError> {
        let start = match self.skip_if(|c| c.is_ascii_digit()) {
            Some((pos, _)) => pos,
            None => return Ok(None),
        };
        self.skip_while(|c| c.is_ascii_digit());
        let mut kind = TokenKind::Number;
        if self.skip_if(|c| c == '.').is_some() {
            kind = TokenKind::Decimal;
            if self.skip_if(|c| c.is_ascii_digit()).is_none() {
                let (pos, found) = self.peek_or_eof();
                return Err(self.error(
                    pos,
                    LexErrorKind::Expected {
                        wanted: WantedSpec::Description("digit after decimal point"),
                        found,
                    },
                ));
            }
            self.skip_while(|c| c.is_ascii_digit());
        }
        if let Some((pos, ch)) = self
            .input
            .peek()
            .filter(|(_, ch)| !is_delimiter(*ch))
            .copied()
        {
            return Err(self.error(
                pos,
                LexErrorKind::Expected {
                    wanted: WantedSpec::Description("delimiter or space after number"),
                    found: ch,
                },
            ));
        }
        Ok(Some(Token::new(kind, self.source_until_current(start))))
    }

    // the token keeps the quotes; `unescape` produces the literal's value
    fn string(&mut self) -> Result<Token<'source>, LexError> {
        let start = self.current_offset();
        self.advance();
        loop {
            match self.input.next() {
                None | Some((_, '\n')) => {
                    return Err(self.error(start, LexErrorKind::UnterminatedString))
                }
                Some((_, '"')) => break,
                Some((_, '\\')) => {
                    self.advance();
                }
                Some(_) => {}
            }
        }
        Ok(Token::new(TokenKind::Str, self.source_until_current(start)))
    }

    fn skip_while<F>(&mut self, filter: F)
    where
        F: Fn(char) -> bool,
    {
        while self.input.peek().filter(|(_, ch)| filter(*ch)).is_some() {
            self.input.next();
        }
    }

    fn skip_if<F>(&mut self, filter: F) -> Option<(usize, char)>
    where
        F: Fn(char) -> bool,
    {
        let (pos, ch) = *self.input.peek()?;
        if filter(ch) {
            self.advance();
            Some((pos, ch))
        } else {
            None
        }
    }

    // whitespace and `//` comments
    fn skip_trivia(&mut self) {
        loop {
            self.skip_while(char::is_whitespace);
            let offset = self.current_offset();
            if self.metadata.input()[offset..].starts_with("//") {
                self.skip_while(|c| c != '\n');
            } else {
                break;
            }
        }
    }

    fn advance(&mut self) {
        self.input.next();
    }

    fn peek_or_eof(&mut self) -> (usize, char) {
        let offset = self.current_offset();
        self.input.peek().copied().unwrap_or((offset, '\0'))
    }

    fn source_until_current(&mut self, start: usize) -> Source<'source> {
        let current = self.current_offset();
        self.source_from(start, current)
    }

    fn source_from(&self, start: usize, end: usize) -> Source<'source> {
        Source {
            span: Span {
                offset: start,
                len: end - start,
            },
            source: &self.metadata.input()[start..end],
        }
    }

    fn source_from_len(&self, start: usize, len: usize) -> Source<'source> {
        self.source_from(start, start + len)
    }

    fn error(&self, position: usize, kind: LexErrorKind) -> LexError {
        LexError::new(kind).with_source(Span::new(position), self.metadata)
    }

    pub fn current_span(&mut self) -> Span {
        Span::new(self.current_offset())
    }

    pub const fn get_metadata(&self) -> &'source SourceFile<'source> {
        self.metadata
    }

    fn current_offset(&mut self) -> usize {
        self.input
            .peek()
            .map(|(x, _)| *x)
            .unwrap_or_else(|| self.metadata.input().len())
    }
}

/// Value of a string literal token, quotes included.
pub fn unescape(literal: &str) -> Result<String, LexErrorKind> {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or(LexErrorKind::UnterminatedString)?;
    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }
        value.push(match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('"') => '"',
            Some('\\') => '\\',
            Some(other) => return Err(LexErrorKind::UnknownEscape(other)),
            None => return Err(LexErrorKind::UnterminatedString),
        });
    }
    Ok(value)
}

#[inline]
fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || (ch.is_ascii_punctuation() && ch != '_' && ch != '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let source = SourceFile::new(input);
        let mut lexer = Lexer::new(&source);
        let mut kinds = Vec::new();
        while let Some(token) = lexer.next_token().unwrap() {
            kinds.push(token.kind);
        }
        kinds
    }

    #[test]
    fn operators_and_equal_signs() {
        assert_eq!(
            kinds("a <= b && c != d || !e"),
            vec![
                TokenKind::Identifier,
                TokenKind::Operator {
                    kind: Operator::AngleLeft,
                    has_equal: true
                },
                TokenKind::Identifier,
                TokenKind::Operator {
                    kind: Operator::DoubleAnd,
                    has_equal: false
                },
                TokenKind::Identifier,
                TokenKind::Operator {
                    kind: Operator::ExclamationMark,
                    has_equal: true
                },
                TokenKind::Identifier,
                TokenKind::Operator {
                    kind: Operator::DoublePipe,
                    has_equal: false
                },
                TokenKind::Operator {
                    kind: Operator::ExclamationMark,
                    has_equal: false
                },
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn keywords_numbers_and_strings() {
        assert_eq!(
            kinds("for (int i = 0; i < 2.5; ) print(\"a\\\"b\"); // trailing"),
            vec![
                TokenKind::Keyword(Keyword::For),
                TokenKind::OpenParen,
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Identifier,
                TokenKind::Operator {
                    kind: Operator::Equals,
                    has_equal: false
                },
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::Operator {
                    kind: Operator::AngleLeft,
                    has_equal: false
                },
                TokenKind::Decimal,
                TokenKind::Semicolon,
                TokenKind::CloseParen,
                TokenKind::Keyword(Keyword::Print),
                TokenKind::OpenParen,
                TokenKind::Str,
                TokenKind::CloseParen,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn unescapes_literals() {
        assert_eq!(unescape("\"a\\tb\\n\"").unwrap(), "a\tb\n");
        assert!(matches!(
            unescape("\"\\q\""),
            Err(LexErrorKind::UnknownEscape('q'))
        ));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let source = SourceFile::new("print(\"oops);\n");
        let mut lexer = Lexer::new(&source);
        assert_eq!(lexer.next_token().unwrap().unwrap().kind, TokenKind::Keyword(Keyword::Print));
        assert_eq!(lexer.next_token().unwrap().unwrap().kind, TokenKind::OpenParen);
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err.kind, LexErrorKind::UnterminatedString));
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn number_glued_to_identifier() {
        let source = SourceFile::new("12abc");
        let err = Lexer::new(&source).next_token().unwrap_err();
        assert!(matches!(
            err.kind,
            LexErrorKind::Expected { found: 'a', .. }
        ));
    }
}
