
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    // NOTE: 'from' must come before 'to' for proper ordering
    pub from: u32,
    pub to: u32,
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

impl Span {
    pub fn slice(self, src: &str) -> &str {
        &src[self.from as usize..self.to as usize]
    }
    pub fn point(pos: u32) -> Self {
        Self {
            from: pos,
            to: pos + 1,
        }
    }
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }
    pub fn len(&self) -> u32 {
        self.to - self.from
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A one-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

const EOF_CHAR: char = '\0';

/// Character cursor over assembly source.
///
/// Positions are byte offsets, so a cursor can be rewound with [`Cursor::reset`]
/// when an alternative fails to match.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    pos: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
    fn rest(&self) -> &'a str {
        &self.src[self.pos as usize..]
    }
    pub fn first(&self) -> char {
        self.rest().chars().next().unwrap_or(EOF_CHAR)
    }
    pub fn bump(&mut self) -> Option<char> {
        let ch = self.rest().chars().next()?;
        self.pos += ch.len_utf8() as u32;
        Some(ch)
    }
    /// Consumes `ch` if it is next.
    pub fn eat(&mut self, ch: char) -> bool {
        if !self.is_eof() && self.first() == ch {
            self.bump();
            true
        } else {
            false
        }
    }
    /// Consumes characters while `predicate` holds and returns them.
    pub fn eat_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> &'a str {
        let start = self.pos;
        while !self.is_eof() && predicate(self.first()) {
            self.bump();
        }
        Span::new(start, self.pos).slice(self.src)
    }
    pub fn is_eof(&self) -> bool {
        self.rest().is_empty()
    }
    pub fn pos(&self) -> u32 {
        self.pos
    }
    pub fn reset(&mut self, pos: u32) {
        self.pos = pos;
    }
    pub fn position(&self, offset: u32) -> Position {
        let before = &self.src[..offset as usize];
        let line = before.matches('\n').count() as u32 + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() as u32 + 1;
        Position { line, column }
    }
}

pub fn is_id_start(first: char) -> bool {
    matches!(first, 'a'..='z' | 'A'..='Z' | '_')
}

pub fn is_id_continue(ch: char) -> bool {
    matches!(ch, 'a'..='z' | 'A'..='Z' | '_' | '0'..='9')
}

/// Spaces and tabs, never a line break.
pub fn is_inline_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t')
}
