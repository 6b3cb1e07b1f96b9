use ahash::AHashMap;
use string_interner::DefaultSymbol;
use thiserror::Error;

use crate::{
    Address, DataWidth, Expr, Opcode, Operand, OperandKind, ParseError, Parser, Program, Statement,
};

#[cfg(test)]
mod test;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("symbol `{0}` is defined more than once")]
    DuplicateSymbol(String),
    #[error("member `{member}` is declared more than once in structure `{structure}`")]
    DuplicateMember { structure: String, member: String },
    #[error("symbol `{0}` wasn't resolved")]
    UnresolvedSymbol(String),
    #[error("structure `{0}` wasn't resolved")]
    UnresolvedStructure(String),
    #[error("structure `{structure}` has no member `{member}`")]
    UnresolvedMember { structure: String, member: String },
    #[error("`{0}` is not a structure")]
    NotAStructure(String),
    #[error("structure `{0}` can't be used as a value")]
    NotAValue(String),
    #[error("program needs {0} bytes, more than the address space holds")]
    ImageTooLarge(u32),
    #[error("operands of `{0}` don't fit its addressing mode")]
    MalformedInstruction(Opcode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// a label or data block
    Address(Address),
    Constant(u16),
    Structure(Structure),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    members: AHashMap<DefaultSymbol, Member>,
    size: u16,
}

impl Structure {
    pub fn member(&self, name: DefaultSymbol) -> Option<Member> {
        self.members.get(&name).copied()
    }
    /// Sum of every member size.
    pub fn size(&self) -> u16 {
        self.size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub offset: u16,
    pub size: u16,
}

/// One namespace for labels, data, constants and structures.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: AHashMap<DefaultSymbol, Symbol>,
}

impl SymbolTable {
    pub fn get(&self, name: DefaultSymbol) -> Option<&Symbol> {
        self.symbols.get(&name)
    }
    fn len(&self) -> usize {
        self.symbols.len()
    }
    /// Returns `false`, leaving the table untouched, when `name` is taken.
    fn bind(&mut self, name: DefaultSymbol, symbol: Symbol) -> bool {
        if self.symbols.contains_key(&name) {
            return false;
        }
        self.symbols.insert(name, symbol);
        true
    }
}

/// Two pass assembler over a parsed [`Program`].
///
/// [`Assembler::allocate`] binds every symbol and sizes the image, then
/// [`Assembler::encode`] emits it. Forward references work because nothing is
/// evaluated until the second pass.
#[derive(Debug)]
pub struct Assembler<'p> {
    program: &'p Program,
    symbols: SymbolTable,
    size: u32,
}

impl<'p> Assembler<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            symbols: SymbolTable::default(),
            size: 0,
        }
    }

    /// Pass 1. Returns the image size in bytes.
    pub fn allocate(&mut self) -> Result<u32, AssembleError> {
        let mut address: u32 = 0;
        for statement in &self.program.statements {
            match statement {
                Statement::Label { name } => {
                    self.bind(*name, Symbol::Address(here(address)?))?
                }
                Statement::Constant { name, value, .. } => {
                    self.bind(*name, Symbol::Constant(*value))?
                }
                Statement::Structure { name, members, .. } => {
                    let structure = self.structure(*name, members)?;
                    self.bind(*name, Symbol::Structure(structure))?
                }
                Statement::Data {
                    name,
                    width,
                    values,
                    ..
                } => {
                    self.bind(*name, Symbol::Address(here(address)?))?;
                    address += values.len() as u32 * u32::from(width.bytes());
                }
                Statement::Instruction { opcode, .. } => address += u32::from(opcode.size()),
            }
            if address > 0x10000 {
                return Err(AssembleError::ImageTooLarge(address));
            }
        }
        self.size = address;
        tracing::debug!(
            bytes = address,
            symbols = self.symbols.len(),
            "allocated program"
        );
        Ok(address)
    }

    /// Pass 2. Emits the image; its length always equals what
    /// [`Assembler::allocate`] returned.
    pub fn encode(&self) -> Result<Vec<u8>, AssembleError> {
        let mut out = Vec::with_capacity(self.size as usize);
        for statement in &self.program.statements {
            match statement {
                Statement::Label { .. }
                | Statement::Constant { .. }
                | Statement::Structure { .. } => (),
                Statement::Data { width, values, .. } => {
                    for &value in values {
                        match width {
                            DataWidth::Byte => out.push(value as u8),
                            DataWidth::Word => out.extend_from_slice(&value.to_be_bytes()),
                        }
                    }
                }
                Statement::Instruction { opcode, operands } => {
                    self.instruction(&mut out, *opcode, operands)?
                }
            }
        }
        debug_assert_eq!(out.len() as u32, self.size);
        Ok(out)
    }

    fn instruction(
        &self,
        out: &mut Vec<u8>,
        opcode: Opcode,
        operands: &[Operand],
    ) -> Result<(), AssembleError> {
        let kinds = opcode.mode().operands();
        if kinds.len() != operands.len() {
            return Err(AssembleError::MalformedInstruction(opcode));
        }
        out.push(opcode as u8);
        for (kind, operand) in kinds.iter().zip(operands) {
            match (kind, operand) {
                (OperandKind::Reg | OperandKind::RegPtr, Operand::Register(reg)) => {
                    out.push(reg.ordinal())
                }
                (OperandKind::Imm | OperandKind::Mem, Operand::Value(expr)) => {
                    out.extend_from_slice(&self.evaluate(expr)?.to_be_bytes())
                }
                (OperandKind::Imm8, Operand::Value(expr)) => out.push(self.evaluate(expr)? as u8),
                _ => return Err(AssembleError::MalformedInstruction(opcode)),
            }
        }
        Ok(())
    }

    /// Reduces an expression to a word, wrapping on overflow.
    pub fn evaluate(&self, expr: &Expr) -> Result<u16, AssembleError> {
        match expr {
            Expr::Hex(value) => Ok(*value),
            Expr::Variable(name) => self.value(*name),
            Expr::Member {
                structure,
                symbol,
                member,
            } => {
                let layout = match self.symbols.get(*structure) {
                    Some(Symbol::Structure(layout)) => layout,
                    Some(_) => return Err(AssembleError::NotAStructure(self.name(*structure))),
                    None => return Err(AssembleError::UnresolvedStructure(self.name(*structure))),
                };
                let Some(Member { offset, .. }) = layout.member(*member) else {
                    return Err(AssembleError::UnresolvedMember {
                        structure: self.name(*structure),
                        member: self.name(*member),
                    });
                };
                Ok(self.value(*symbol)?.wrapping_add(offset))
            }
            Expr::Binary { op, lhs, rhs } => Ok(op.apply(self.evaluate(lhs)?, self.evaluate(rhs)?)),
        }
    }

    fn value(&self, name: DefaultSymbol) -> Result<u16, AssembleError> {
        match self.symbols.get(name) {
            Some(Symbol::Address(value) | Symbol::Constant(value)) => Ok(*value),
            Some(Symbol::Structure(_)) => Err(AssembleError::NotAValue(self.name(name))),
            None => Err(AssembleError::UnresolvedSymbol(self.name(name))),
        }
    }

    fn structure(
        &self,
        name: DefaultSymbol,
        members: &[(DefaultSymbol, u16)],
    ) -> Result<Structure, AssembleError> {
        let mut structure = Structure::default();
        for &(member, size) in members {
            let layout = Member {
                offset: structure.size,
                size,
            };
            if structure.members.insert(member, layout).is_some() {
                return Err(AssembleError::DuplicateMember {
                    structure: self.name(name),
                    member: self.name(member),
                });
            }
            structure.size = structure.size.wrapping_add(size);
        }
        Ok(structure)
    }

    fn bind(&mut self, name: DefaultSymbol, symbol: Symbol) -> Result<(), AssembleError> {
        if self.symbols.bind(name, symbol) {
            Ok(())
        } else {
            Err(AssembleError::DuplicateSymbol(self.name(name)))
        }
    }

    fn name(&self, symbol: DefaultSymbol) -> String {
        self.program.resolve(symbol).to_owned()
    }

    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }
}

/// A label or data block may not start past the last address.
fn here(address: u32) -> Result<Address, AssembleError> {
    Address::try_from(address).map_err(|_| AssembleError::ImageTooLarge(address))
}

/// A finished byte image together with the program and symbols it came from.
#[derive(Debug)]
pub struct Assembly {
    pub bytes: Vec<u8>,
    pub program: Program,
    pub symbols: SymbolTable,
}

impl Assembly {
    /// The address of a label or data block, or the value of a constant.
    pub fn address_of(&self, name: &str) -> Option<u16> {
        let name = self.program.si.get(name)?;
        match self.symbols.get(name)? {
            Symbol::Address(value) | Symbol::Constant(value) => Some(*value),
            Symbol::Structure(_) => None,
        }
    }

    /// Declarations marked with `+`.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &Symbol)> + '_ {
        self.program
            .statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::Constant {
                    name, export: true, ..
                }
                | Statement::Structure {
                    name, export: true, ..
                }
                | Statement::Data {
                    name, export: true, ..
                } => Some(*name),
                _ => None,
            })
            .filter_map(|name| Some((self.program.resolve(name), self.symbols.get(name)?)))
    }
}

/// Parses and assembles `src` into a byte image meant to be loaded at
/// address 0.
pub fn assemble(src: &str) -> Result<Assembly, AssembleError> {
    let program = Parser::new(src).parse()?;
    let mut assembler = Assembler::new(&program);
    assembler.allocate()?;
    let bytes = assembler.encode()?;
    let symbols = assembler.into_symbols();
    Ok(Assembly {
        bytes,
        program,
        symbols,
    })
}
