//! Syntax tree shared by the parser, the analyzer and the code generator.
//!
//! Every expression carries its source line and its resolved [`Type`], which
//! stays `None` until [`Expr::analyze`](crate::analysis) has run on it.
use crate::grammar::lexer::Operator;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    VarDecl(VarDecl),
    /// An expression evaluated for its side effects; its value is dropped.
    Expr(Expr),
    /// `print(expr);`
    Print { line: usize, expr: Expr },
    Block { line: usize, statements: Vec<Statement> },
    /// `do body while (condition);`
    DoWhile {
        line: usize,
        body: Box<Statement>,
        condition: Expr,
    },
    For(ForLoop),
}

impl Statement {
    pub fn line(&self) -> usize {
        match self {
            Self::VarDecl(decl) => decl.line,
            Self::Expr(expr) => expr.line,
            Self::Print { line, .. }
            | Self::Block { line, .. }
            | Self::DoWhile { line, .. } => *line,
            Self::For(for_loop) => for_loop.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub line: usize,
    pub ty: Type,
    pub declarators: Vec<VarDeclarator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub line: usize,
    pub name: String,
    pub ty: Type,
    pub init: Option<Expr>,
    /// Local slot, assigned during analysis.
    pub slot: Option<u16>,
}

/// `for (init; condition; update) body`
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub line: usize,
    pub init_declarations: Vec<VarDeclarator>,
    pub init_statements: Vec<Statement>,
    pub condition: Option<Expr>,
    pub update: Vec<Statement>,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub line: usize,
    pub ty: Option<Type>,
    pub kind: ExprKind,
}

impl Expr {
    pub const fn new(line: usize, kind: ExprKind) -> Self {
        Self {
            line,
            ty: None,
            kind,
        }
    }
    #[must_use]
    pub fn typed(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }
    /// The resolved type, or [`Type::Any`] if analysis hasn't reached this node.
    pub fn ty(&self) -> Type {
        self.ty.unwrap_or(Type::Any)
    }
    pub fn binary(line: usize, operator: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(
            line,
            ExprKind::Binary {
                operator,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable {
        name: String,
        slot: Option<u16>,
    },
    Unary {
        operator: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        operator: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// String concatenation. Never produced by the parser: `+` is rewritten
    /// into this during analysis when one operand is a `String`.
    Concat {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        value_true: Box<Expr>,
        value_false: Option<Box<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Double(f64),
    Boolean(bool),
    Str(String),
}

impl Literal {
    pub const fn ty(&self) -> Type {
        match self {
            Self::Int(_) => Type::Int,
            Self::Double(_) => Type::Double,
            Self::Boolean(_) => Type::Boolean,
            Self::Str(_) => Type::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    LogicNot,
}

impl UnaryOp {
    pub const fn from_operator((op, has_equal): (Operator, bool)) -> Option<Self> {
        if has_equal {
            return None;
        }
        Some(match op {
            Operator::Minus => Self::Negate,
            Operator::ExclamationMark => Self::LogicNot,
            _ => return None,
        })
    }
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::LogicNot => "!",
        }
    }
}

/// Includes anything that is related to basic arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// `+` operator
    Add,
    /// `-` (binary) operator
    Subtract,
    /// `*` operator
    Multiply,
    /// `/` operator
    Divide,
    /// `%` operator
    Modulo,
}

/// Bitwise operators; only defined on `int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    /// `|` operator
    Or,
    /// `^` operator
    Xor,
    /// `&` operator
    And,
}

/// The short-circuiting `&&` and `||`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relational {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equals,
    NotEquals,
}

/// Includes any kind of operator that needs two values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Arithmetic(ArithmeticOp),
    Bit(BitOp),
    Logic(LogicOp),
    Relational(Relational),
    Assignment,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Associativity {
    Right,
    Left,
}

impl ArithmeticOp {
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Subtract => 15 - 4,
            Self::Multiply | Self::Divide | Self::Modulo => 15 - 3,
        }
    }
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
        }
    }
}

impl BitOp {
    pub const fn precedence(self) -> u8 {
        match self {
            Self::And => 15 - 8,
            Self::Xor => 15 - 9,
            Self::Or => 15 - 10,
        }
    }
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Or => "|",
            Self::Xor => "^",
            Self::And => "&",
        }
    }
}

impl LogicOp {
    pub const fn precedence(self) -> u8 {
        match self {
            Self::And => 15 - 11,
            Self::Or => 15 - 12,
        }
    }
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

impl Relational {
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => 15 - 6,
            Self::Equals | Self::NotEquals => 15 - 7,
        }
    }
    /// The relation that holds exactly when `self` doesn't.
    pub const fn negate(self) -> Self {
        match self {
            Self::Less => Self::GreaterEqual,
            Self::LessEqual => Self::Greater,
            Self::Greater => Self::LessEqual,
            Self::GreaterEqual => Self::Less,
            Self::Equals => Self::NotEquals,
            Self::NotEquals => Self::Equals,
        }
    }
    pub const fn is_equality(self) -> bool {
        matches!(self, Self::Equals | Self::NotEquals)
    }
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Equals => "==",
            Self::NotEquals => "!=",
        }
    }
}

impl BinaryOp {
    pub const fn associativity(self) -> Associativity {
        match self {
            Self::Arithmetic(_) | Self::Logic(_) | Self::Bit(_) | Self::Relational(_) => {
                Associativity::Left
            }
            Self::Assignment => Associativity::Right,
        }
    }
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Arithmetic(arithm) => arithm.precedence(),
            Self::Logic(logic) => logic.precedence(),
            Self::Bit(bit) => bit.precedence(),
            Self::Relational(relation) => relation.precedence(),
            Self::Assignment => 15 - 14,
        }
    }
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Arithmetic(arithm) => arithm.symbol(),
            Self::Logic(logic) => logic.symbol(),
            Self::Bit(bit) => bit.symbol(),
            Self::Relational(relation) => relation.symbol(),
            Self::Assignment => "=",
        }
    }
    /// Operators producing a `boolean`, which generate code through branches.
    pub const fn is_conditional(self) -> bool {
        matches!(self, Self::Logic(_) | Self::Relational(_))
    }
    pub const fn from_operator((op, has_equal): (Operator, bool)) -> Option<Self> {
        Some(match (op, has_equal) {
            (Operator::Plus, false) => Self::Arithmetic(ArithmeticOp::Add),
            (Operator::Minus, false) => Self::Arithmetic(ArithmeticOp::Subtract),
            (Operator::Star, false) => Self::Arithmetic(ArithmeticOp::Multiply),
            (Operator::Slash, false) => Self::Arithmetic(ArithmeticOp::Divide),
            (Operator::Percentage, false) => Self::Arithmetic(ArithmeticOp::Modulo),
            (Operator::Pipe, false) => Self::Bit(BitOp::Or),
            (Operator::Hat, false) => Self::Bit(BitOp::Xor),
            (Operator::And, false) => Self::Bit(BitOp::And),
            (Operator::DoubleAnd, false) => Self::Logic(LogicOp::And),
            (Operator::DoublePipe, false) => Self::Logic(LogicOp::Or),
            (Operator::AngleLeft, false) => Self::Relational(Relational::Less),
            (Operator::AngleLeft, true) => Self::Relational(Relational::LessEqual),
            (Operator::AngleRight, false) => Self::Relational(Relational::Greater),
            (Operator::AngleRight, true) => Self::Relational(Relational::GreaterEqual),
            (Operator::Equals, true) => Self::Relational(Relational::Equals),
            (Operator::ExclamationMark, true) => Self::Relational(Relational::NotEquals),
            (Operator::Equals, false) => Self::Assignment,
            // compound assignments (`+=`, ...) and the prefix-only operators
            _ => return None,
        })
    }
}
