use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

pub mod assemble;
pub mod isa;
pub mod lex;
pub mod parse;
pub mod register;
pub mod render;

pub use self::assemble::{assemble, AssembleError, Assembler, Assembly};
pub use self::isa::{Mode, Opcode, OperandKind};
pub use self::parse::{ParseError, Parser};
pub use self::register::Register;
pub use self::render::RenderContext;

pub type Address = u16;

/// A parsed program. Names are interned in `si`.
#[derive(Debug, Default)]
pub struct Program {
    pub si: StringInterner<DefaultBackend>,
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn resolve(&self, symbol: DefaultSymbol) -> &str {
        self.si.resolve(symbol).unwrap_or("<unknown>")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Label {
        name: DefaultSymbol,
    },
    Constant {
        name: DefaultSymbol,
        value: u16,
        export: bool,
    },
    Structure {
        name: DefaultSymbol,
        /// member name and size in bytes, in declaration order
        members: Vec<(DefaultSymbol, u16)>,
        export: bool,
    },
    Data {
        name: DefaultSymbol,
        width: DataWidth,
        values: Vec<u16>,
        export: bool,
    },
    Instruction {
        opcode: Opcode,
        operands: Vec<Operand>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    Byte,
    Word,
}

impl DataWidth {
    pub const fn bytes(self) -> u16 {
        match self {
            DataWidth::Byte => 1,
            DataWidth::Word => 2,
        }
    }
}

/// An instruction operand. Which [`OperandKind`] it fills is given by the
/// instruction's mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Value(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Hex(u16),
    Variable(DefaultSymbol),
    /// `<structure> symbol.member`
    Member {
        structure: DefaultSymbol,
        symbol: DefaultSymbol,
        member: DefaultSymbol,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Multiply,
}

impl BinOp {
    /// Higher binds first.
    pub const fn priority(self) -> u8 {
        match self {
            BinOp::Multiply => 2,
            BinOp::Plus => 1,
            BinOp::Minus => 0,
        }
    }
    pub const fn symbol(self) -> char {
        match self {
            BinOp::Plus => '+',
            BinOp::Minus => '-',
            BinOp::Multiply => '*',
        }
    }
    pub fn apply(self, lhs: u16, rhs: u16) -> u16 {
        match self {
            BinOp::Plus => lhs.wrapping_add(rhs),
            BinOp::Minus => lhs.wrapping_sub(rhs),
            BinOp::Multiply => lhs.wrapping_mul(rhs),
        }
    }
}
