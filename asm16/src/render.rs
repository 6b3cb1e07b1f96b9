//! Canonical text for a parsed program.
//!
//! Every nested operation is parenthesized so the tree the parser built is
//! visible, and the output parses back into the same program.

use std::fmt::{self, Display, Formatter, Write};

use crate::{DataWidth, Expr, Operand, OperandKind, Program, Statement};

#[derive(Debug)]
pub struct RenderContext {
    /// default = `4`
    pub indent: u32,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self { indent: 4 }
    }
}

pub struct Render<'a> {
    program: &'a Program,
    ctx: &'a RenderContext,
}

impl Program {
    pub fn render<'a>(&'a self, ctx: &'a RenderContext) -> Render<'a> {
        Render { program: self, ctx }
    }
}

impl Display for Render<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for statement in &self.program.statements {
            self.statement(f, statement)?;
            f.write_char('\n')?;
        }
        Ok(())
    }
}

impl Render<'_> {
    fn statement(&self, f: &mut Formatter<'_>, statement: &Statement) -> fmt::Result {
        let p = self.program;
        match statement {
            Statement::Label { name } => write!(f, "{}:", p.resolve(*name)),
            Statement::Constant {
                name,
                value,
                export,
            } => {
                export_marker(f, *export)?;
                write!(f, "constant {} = ${value:04X}", p.resolve(*name))
            }
            Statement::Structure {
                name,
                members,
                export,
            } => {
                export_marker(f, *export)?;
                write!(f, "structure {} {{", p.resolve(*name))?;
                for (i, (member, size)) in members.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    write!(f, "{}: ${size:04X}", p.resolve(*member))?;
                }
                f.write_str(if members.is_empty() { "}" } else { " }" })
            }
            Statement::Data {
                name,
                width,
                values,
                export,
            } => {
                export_marker(f, *export)?;
                let bits = match width {
                    DataWidth::Byte => 8,
                    DataWidth::Word => 16,
                };
                write!(f, "data{bits} {} = {{", p.resolve(*name))?;
                for (i, value) in values.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    match width {
                        DataWidth::Byte => write!(f, "${value:02X}")?,
                        DataWidth::Word => write!(f, "${value:04X}")?,
                    }
                }
                f.write_str(if values.is_empty() { "}" } else { " }" })
            }
            Statement::Instruction { opcode, operands } => {
                for _ in 0..self.ctx.indent {
                    f.write_char(' ')?;
                }
                f.write_str(opcode.mnemonic())?;
                let kinds = opcode.mode().operands();
                for (i, (kind, operand)) in kinds.iter().zip(operands).enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    self.operand(f, *kind, operand)?;
                }
                Ok(())
            }
        }
    }

    fn operand(&self, f: &mut Formatter<'_>, kind: OperandKind, operand: &Operand) -> fmt::Result {
        match (kind, operand) {
            (OperandKind::RegPtr, Operand::Register(reg)) => write!(f, "&{reg}"),
            (_, Operand::Register(reg)) => write!(f, "{reg}"),
            (OperandKind::Mem, Operand::Value(Expr::Hex(value))) => write!(f, "&{value:04X}"),
            (OperandKind::Mem, Operand::Value(expr)) => {
                f.write_str("&[")?;
                self.expr(f, expr)?;
                f.write_char(']')
            }
            (OperandKind::Imm8, Operand::Value(Expr::Hex(value))) => write!(f, "${value:02X}"),
            (_, Operand::Value(expr @ Expr::Binary { .. })) => {
                f.write_char('[')?;
                self.expr(f, expr)?;
                f.write_char(']')
            }
            (_, Operand::Value(expr)) => self.expr(f, expr),
        }
    }

    fn expr(&self, f: &mut Formatter<'_>, expr: &Expr) -> fmt::Result {
        let p = self.program;
        match expr {
            Expr::Hex(value) => write!(f, "${value:04X}"),
            Expr::Variable(name) => write!(f, "!{}", p.resolve(*name)),
            Expr::Member {
                structure,
                symbol,
                member,
            } => write!(
                f,
                "<{}> {}.{}",
                p.resolve(*structure),
                p.resolve(*symbol),
                p.resolve(*member)
            ),
            Expr::Binary { op, lhs, rhs } => {
                self.group(f, lhs)?;
                write!(f, " {} ", op.symbol())?;
                self.group(f, rhs)
            }
        }
    }

    fn group(&self, f: &mut Formatter<'_>, expr: &Expr) -> fmt::Result {
        if let Expr::Binary { .. } = expr {
            f.write_char('(')?;
            self.expr(f, expr)?;
            f.write_char(')')
        } else {
            self.expr(f, expr)
        }
    }
}

fn export_marker(f: &mut Formatter<'_>, export: bool) -> fmt::Result {
    if export {
        f.write_char('+')?;
    }
    Ok(())
}
