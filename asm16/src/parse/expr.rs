use super::{Expected, ParseError, Parser};
use crate::{BinOp, Expr};

impl Parser<'_> {
    /// A flat `[a op b op c ...]` or `(a op b ...)` sequence. Parenthesized
    /// groups nest and are reduced on their own before the outer sequence.
    pub(super) fn bracketed(&mut self, open: char, close: char) -> Result<Expr, ParseError> {
        self.expect(open)?;
        self.inline();
        let head = self.element()?;
        let mut tail = Vec::new();
        loop {
            self.inline();
            if self.cursor.eat(close) {
                break;
            }
            let op = self.operator(close)?;
            self.inline();
            tail.push((op, self.element()?));
        }
        Ok(reduce(head, tail))
    }

    fn element(&mut self) -> Result<Expr, ParseError> {
        match self.cursor.first() {
            '(' => self.bracketed('(', ')'),
            '$' => self.hex().map(Expr::Hex),
            '!' => self.variable(),
            '<' => self.member(),
            _ => Err(self.error(Expected::Element)),
        }
    }

    fn operator(&mut self, close: char) -> Result<BinOp, ParseError> {
        let op = match self.cursor.first() {
            '+' => BinOp::Plus,
            '-' => BinOp::Minus,
            '*' => BinOp::Multiply,
            _ => return Err(self.error(Expected::OperatorOr(close))),
        };
        self.cursor.bump();
        Ok(op)
    }
}

/// Collapses `head (op operand)*` into a single tree.
///
/// The highest priority operator is folded with its two neighbours first,
/// the leftmost one winning ties, until one node is left. Note that this makes
/// minus bind looser than plus: `$5 - $2 + $1` is `$5 - ($2 + $1)`.
pub(crate) fn reduce(mut head: Expr, mut tail: Vec<(BinOp, Expr)>) -> Expr {
    while !tail.is_empty() {
        let mut idx = 0;
        for (i, (op, _)) in tail.iter().enumerate().skip(1) {
            if op.priority() > tail[idx].0.priority() {
                idx = i;
            }
        }
        let (op, rhs) = tail.remove(idx);
        let slot = match idx {
            0 => &mut head,
            _ => &mut tail[idx - 1].1,
        };
        let lhs = std::mem::replace(slot, Expr::Hex(0));
        *slot = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    head
}
