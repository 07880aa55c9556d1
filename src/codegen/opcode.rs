//! Instruction set of the target machine.
//!
//! Opcode numbers follow the JVM where an equivalent exists. `ldc`, `iconst`
//! and `dconst` carry inline operands, and `concat`/`print` replace the
//! library calls a real class file would make.
use crate::ast::Relational;
use crate::types::Type;
use std::fmt;

/// Instructions without operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Pop,
    Dup,
    IAdd,
    DAdd,
    ISub,
    DSub,
    IMul,
    DMul,
    IDiv,
    DDiv,
    IRem,
    DRem,
    INeg,
    DNeg,
    IAnd,
    IOr,
    IXor,
    I2D,
    D2I,
    /// Compares two doubles, pushing -1, 0 or 1; NaN gives -1.
    DCmpL,
    /// Compares two doubles, pushing -1, 0 or 1; NaN gives 1.
    DCmpG,
    /// Pops two values and pushes the concatenation of their textual forms.
    Concat,
    /// Pops a value and prints it on its own line.
    Print,
    Return,
}

macro_rules! byte_table {
    ($name:ident { $($variant:ident = $byte:literal => $mnemonic:literal),* $(,)? }) => {
        impl $name {
            pub const fn byte(self) -> u8 {
                match self {
                    $(Self::$variant => $byte),*
                }
            }
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Self::$variant),)*
                    _ => None,
                }
            }
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$variant => $mnemonic),*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.mnemonic())
            }
        }
    };
}

byte_table!(Opcode {
    Pop = 0x57 => "pop",
    Dup = 0x59 => "dup",
    IAdd = 0x60 => "iadd",
    DAdd = 0x63 => "dadd",
    ISub = 0x64 => "isub",
    DSub = 0x67 => "dsub",
    IMul = 0x68 => "imul",
    DMul = 0x6b => "dmul",
    IDiv = 0x6c => "idiv",
    DDiv = 0x6f => "ddiv",
    IRem = 0x70 => "irem",
    DRem = 0x73 => "drem",
    INeg = 0x74 => "ineg",
    DNeg = 0x77 => "dneg",
    IAnd = 0x7e => "iand",
    IOr = 0x80 => "ior",
    IXor = 0x82 => "ixor",
    I2D = 0x87 => "i2d",
    D2I = 0x8e => "d2i",
    DCmpL = 0x97 => "dcmpl",
    DCmpG = 0x98 => "dcmpg",
    Concat = 0xcb => "concat",
    Print = 0xcc => "print",
    Return = 0xb1 => "return",
});

/// Jumps. All of them take a signed 16 bit offset, relative to the address
/// of the jump itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    IfEq,
    IfNe,
    IfLt,
    IfGe,
    IfGt,
    IfLe,
    IfICmpEq,
    IfICmpNe,
    IfICmpLt,
    IfICmpGe,
    IfICmpGt,
    IfICmpLe,
    Goto,
}

byte_table!(Branch {
    IfEq = 0x99 => "ifeq",
    IfNe = 0x9a => "ifne",
    IfLt = 0x9b => "iflt",
    IfGe = 0x9c => "ifge",
    IfGt = 0x9d => "ifgt",
    IfLe = 0x9e => "ifle",
    IfICmpEq = 0x9f => "if_icmpeq",
    IfICmpNe = 0xa0 => "if_icmpne",
    IfICmpLt = 0xa1 => "if_icmplt",
    IfICmpGe = 0xa2 => "if_icmpge",
    IfICmpGt = 0xa3 => "if_icmpgt",
    IfICmpLe = 0xa4 => "if_icmple",
    Goto = 0xa7 => "goto",
});

impl Branch {
    /// Jump taken when `lhs <relation> rhs` holds for the two ints on the stack.
    pub const fn int_compare(relation: Relational) -> Self {
        match relation {
            Relational::Equals => Self::IfICmpEq,
            Relational::NotEquals => Self::IfICmpNe,
            Relational::Less => Self::IfICmpLt,
            Relational::GreaterEqual => Self::IfICmpGe,
            Relational::Greater => Self::IfICmpGt,
            Relational::LessEqual => Self::IfICmpLe,
        }
    }
    /// Jump taken when `value <relation> 0` holds for the int on the stack.
    pub const fn zero_compare(relation: Relational) -> Self {
        match relation {
            Relational::Equals => Self::IfEq,
            Relational::NotEquals => Self::IfNe,
            Relational::Less => Self::IfLt,
            Relational::GreaterEqual => Self::IfGe,
            Relational::Greater => Self::IfGt,
            Relational::LessEqual => Self::IfLe,
        }
    }
    pub const fn is_conditional(self) -> bool {
        !matches!(self, Self::Goto)
    }
}

/// Loads and stores of local variable slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOp {
    ILoad,
    DLoad,
    ALoad,
    IStore,
    DStore,
    AStore,
}

byte_table!(LocalOp {
    ILoad = 0x15 => "iload",
    DLoad = 0x18 => "dload",
    ALoad = 0x19 => "aload",
    IStore = 0x36 => "istore",
    DStore = 0x39 => "dstore",
    AStore = 0x3a => "astore",
});

impl LocalOp {
    /// Booleans live in int slots; `void` and `any` have no slot.
    pub const fn load(ty: Type) -> Option<Self> {
        match ty {
            Type::Int | Type::Boolean => Some(Self::ILoad),
            Type::Double => Some(Self::DLoad),
            Type::String => Some(Self::ALoad),
            Type::Void | Type::Any => None,
        }
    }
    pub const fn store(ty: Type) -> Option<Self> {
        match ty {
            Type::Int | Type::Boolean => Some(Self::IStore),
            Type::Double => Some(Self::DStore),
            Type::String => Some(Self::AStore),
            Type::Void | Type::Any => None,
        }
    }
    pub const fn is_store(self) -> bool {
        matches!(self, Self::IStore | Self::DStore | Self::AStore)
    }
}

/// `ldc #index`: pushes a string from the module's string table.
pub const LDC: u8 = 0x12;
/// `iconst value`: pushes a 32 bit int.
pub const ICONST: u8 = 0x13;
/// `dconst value`: pushes a 64 bit double.
pub const DCONST: u8 = 0x14;
