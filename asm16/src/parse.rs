use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};
use thiserror::Error;

use crate::lex::{is_id_continue, is_id_start, is_inline_space, Cursor, Position, Span};
use crate::{DataWidth, Expr, Mode, Opcode, Operand, OperandKind, Program, Register, Statement};

mod expr;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} at {position}")]
pub struct ParseError {
    pub span: Span,
    pub position: Position,
    pub expected: Expected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Statement,
    Declaration,
    Identifier,
    Mnemonic,
    Register,
    Immediate,
    Element,
    OperatorOr(char),
    HexDigits,
    Word,
    Char(char),
    EndOfLine,
}

impl std::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Expected::*;
        match self {
            Statement => f.write_str("a statement"),
            Declaration => f.write_str("`data8`, `data16`, `constant` or `structure`"),
            Identifier => f.write_str("an identifier"),
            Mnemonic => f.write_str("an instruction mnemonic"),
            Register => f.write_str("a register"),
            Immediate => f.write_str("an immediate value"),
            Element => f.write_str("an expression element"),
            OperatorOr(close) => write!(f, "an operator or `{close}`"),
            HexDigits => f.write_str("hex digits"),
            Word => f.write_str("a 16-bit value"),
            Char(ch) => write!(f, "`{ch}`"),
            EndOfLine => f.write_str("end of line"),
        }
    }
}

/// Recursive descent parser over a whole source file.
///
/// Nothing is resolved here: labels, constants and members stay symbolic
/// until the assembler evaluates them.
#[derive(Debug)]
pub struct Parser<'a> {
    cursor: Cursor<'a>,
    si: StringInterner<DefaultBackend>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            cursor: Cursor::new(src),
            si: StringInterner::default(),
        }
    }

    pub fn parse(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.trivia();
            if self.cursor.is_eof() {
                break;
            }
            statements.push(self.statement()?);
        }
        Ok(Program {
            si: self.si,
            statements,
        })
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let export = self.cursor.eat('+');
        let start = self.cursor.pos();
        if !is_id_start(self.cursor.first()) {
            let expected = if export {
                Expected::Declaration
            } else {
                Expected::Statement
            };
            return Err(self.error(expected));
        }
        let word = self.cursor.eat_while(is_id_continue);
        match word {
            "data8" => self.data(DataWidth::Byte, export),
            "data16" => self.data(DataWidth::Word, export),
            "constant" => self.constant(export),
            "structure" => self.structure(export),
            _ if export => Err(self.error_at(start, Expected::Declaration)),
            _ => {
                let after = self.cursor.pos();
                self.inline();
                if self.cursor.eat(':') {
                    let name = self.si.get_or_intern(word);
                    return Ok(Statement::Label { name });
                }
                self.cursor.reset(after);
                self.instruction(word, start)
            }
        }
    }

    /// Tries each addressing mode of `mnemonic` in table order. When none
    /// match, the error that got furthest into the line is reported.
    fn instruction(&mut self, mnemonic: &str, start: u32) -> Result<Statement, ParseError> {
        let operands_start = self.cursor.pos();
        let mut furthest: Option<ParseError> = None;
        for opcode in Opcode::with_mnemonic(mnemonic) {
            self.cursor.reset(operands_start);
            match self.operands(opcode.mode()) {
                Ok(operands) => return Ok(Statement::Instruction { opcode, operands }),
                Err(err) => {
                    if furthest.as_ref().map_or(true, |f| err.span.from > f.span.from) {
                        furthest = Some(err);
                    }
                }
            }
        }
        Err(furthest.unwrap_or_else(|| self.error_at(start, Expected::Mnemonic)))
    }

    fn operands(&mut self, mode: Mode) -> Result<Vec<Operand>, ParseError> {
        let kinds = mode.operands();
        let mut operands = Vec::with_capacity(kinds.len());
        for (i, &kind) in kinds.iter().enumerate() {
            self.inline();
            if i > 0 {
                self.expect(',')?;
                self.inline();
            }
            operands.push(self.operand(kind)?);
        }
        self.end_of_line()?;
        Ok(operands)
    }

    fn operand(&mut self, kind: OperandKind) -> Result<Operand, ParseError> {
        match kind {
            OperandKind::Reg => self.register().map(Operand::Register),
            OperandKind::RegPtr => {
                self.expect('&')?;
                self.register().map(Operand::Register)
            }
            OperandKind::Imm | OperandKind::Imm8 => self.immediate().map(Operand::Value),
            OperandKind::Mem => self.address().map(Operand::Value),
        }
    }

    fn register(&mut self) -> Result<Register, ParseError> {
        let start = self.cursor.pos();
        let name = self
            .identifier()
            .map_err(|_| self.error_at(start, Expected::Register))?;
        name.parse()
            .map_err(|()| self.error_at(start, Expected::Register))
    }

    fn immediate(&mut self) -> Result<Expr, ParseError> {
        match self.cursor.first() {
            '$' => self.hex().map(Expr::Hex),
            '!' => self.variable(),
            '<' => self.member(),
            '[' => self.bracketed('[', ']'),
            _ => Err(self.error(Expected::Immediate)),
        }
    }

    /// `&1234` or `&[expr]`
    fn address(&mut self) -> Result<Expr, ParseError> {
        self.expect('&')?;
        if self.cursor.first() == '[' {
            return self.bracketed('[', ']');
        }
        // `&acc` is a register pointer even though it spells a hex number
        let mut peek = self.cursor.clone();
        if peek.eat_while(is_id_continue).parse::<Register>().is_ok() {
            return Err(self.error(Expected::HexDigits));
        }
        self.hex_digits().map(Expr::Hex)
    }

    fn variable(&mut self) -> Result<Expr, ParseError> {
        self.expect('!')?;
        self.name().map(Expr::Variable)
    }

    /// `<structure> symbol.member`
    fn member(&mut self) -> Result<Expr, ParseError> {
        self.expect('<')?;
        self.inline();
        let structure = self.name()?;
        self.inline();
        self.expect('>')?;
        self.inline();
        let symbol = self.name()?;
        self.expect('.')?;
        let member = self.name()?;
        Ok(Expr::Member {
            structure,
            symbol,
            member,
        })
    }

    fn hex(&mut self) -> Result<u16, ParseError> {
        self.expect('$')?;
        self.hex_digits()
    }

    fn hex_digits(&mut self) -> Result<u16, ParseError> {
        let start = self.cursor.pos();
        let digits = self.cursor.eat_while(|c| c.is_ascii_hexdigit());
        if digits.is_empty() {
            return Err(self.error(Expected::HexDigits));
        }
        u16::from_str_radix(digits, 16).map_err(|_| ParseError {
            span: Span::new(start, self.cursor.pos()),
            position: self.cursor.position(start),
            expected: Expected::Word,
        })
    }

    /// `data8 name = { $01, $02 }`
    fn data(&mut self, width: DataWidth, export: bool) -> Result<Statement, ParseError> {
        self.inline();
        let name = self.name()?;
        self.inline();
        self.expect('=')?;
        self.inline();
        self.expect('{')?;
        let values = self.braced_list(Self::hex)?;
        self.end_of_line()?;
        Ok(Statement::Data {
            name,
            width,
            values,
            export,
        })
    }

    /// `constant name = $1234`
    fn constant(&mut self, export: bool) -> Result<Statement, ParseError> {
        self.inline();
        let name = self.name()?;
        self.inline();
        self.expect('=')?;
        self.inline();
        let value = self.hex()?;
        self.end_of_line()?;
        Ok(Statement::Constant {
            name,
            value,
            export,
        })
    }

    /// `structure Name { member: $02, other: $01 }`
    fn structure(&mut self, export: bool) -> Result<Statement, ParseError> {
        self.inline();
        let name = self.name()?;
        self.trivia();
        self.expect('{')?;
        let members = self.braced_list(|p| {
            let member = p.name()?;
            p.inline();
            p.expect(':')?;
            p.inline();
            Ok((member, p.hex()?))
        })?;
        self.end_of_line()?;
        Ok(Statement::Structure {
            name,
            members,
            export,
        })
    }

    /// Comma separated items up to a closing `}`. Line breaks and comments
    /// are allowed between items.
    fn braced_list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        self.trivia();
        if self.cursor.eat('}') {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            self.trivia();
            if self.cursor.eat('}') {
                return Ok(items);
            }
            self.expect(',')?;
            self.trivia();
        }
    }

    fn identifier(&mut self) -> Result<&'a str, ParseError> {
        if !is_id_start(self.cursor.first()) {
            return Err(self.error(Expected::Identifier));
        }
        Ok(self.cursor.eat_while(is_id_continue))
    }

    fn name(&mut self) -> Result<DefaultSymbol, ParseError> {
        let ident = self.identifier()?;
        Ok(self.si.get_or_intern(ident))
    }

    fn expect(&mut self, ch: char) -> Result<(), ParseError> {
        if self.cursor.eat(ch) {
            Ok(())
        } else {
            Err(self.error(Expected::Char(ch)))
        }
    }

    /// Optional whitespace and comment, then a line break or the end of input.
    /// The line break itself is left for [`Parser::trivia`].
    fn end_of_line(&mut self) -> Result<(), ParseError> {
        self.inline();
        if self.cursor.first() == ';' {
            self.cursor.eat_while(|c| c != '\n');
        }
        if self.cursor.is_eof() || matches!(self.cursor.first(), '\n' | '\r') {
            Ok(())
        } else {
            Err(self.error(Expected::EndOfLine))
        }
    }

    fn inline(&mut self) {
        self.cursor.eat_while(is_inline_space);
    }

    /// Whitespace, line breaks and `;` comments.
    fn trivia(&mut self) {
        loop {
            self.cursor.eat_while(char::is_whitespace);
            if self.cursor.first() != ';' {
                break;
            }
            self.cursor.eat_while(|c| c != '\n');
        }
    }

    fn error(&self, expected: Expected) -> ParseError {
        self.error_at(self.cursor.pos(), expected)
    }

    fn error_at(&self, pos: u32, expected: Expected) -> ParseError {
        ParseError {
            span: Span::point(pos),
            position: self.cursor.position(pos),
            expected,
        }
    }
}
