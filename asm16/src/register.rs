use std::str::FromStr;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// program counter
    Pc,
    /// accumulator, receives every alu result
    Acc,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    /// stack pointer, grows downward
    Sp,
    /// frame pointer
    Fp,
    /// memory bank selector
    Mb,
    /// interrupt mask, bit n enables line n
    Im,
}

impl Register {
    pub const COUNT: usize = 14;

    /// Every register in ordinal order.
    pub const ALL: [Register; Self::COUNT] = [
        Register::Pc,
        Register::Acc,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::R8,
        Register::Sp,
        Register::Fp,
        Register::Mb,
        Register::Im,
    ];

    /// The general purpose registers saved by a call, in push order.
    pub const GENERAL: [Register; 8] = [
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::R8,
    ];

    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Decodes a register byte. Out of range bytes wrap around the register
    /// count instead of failing.
    pub const fn from_ordinal(byte: u8) -> Self {
        Self::ALL[byte as usize % Self::COUNT]
    }

    pub const fn name(self) -> &'static str {
        use Register::*;
        match self {
            Pc => "pc",
            Acc => "acc",
            R1 => "r1",
            R2 => "r2",
            R3 => "r3",
            R4 => "r4",
            R5 => "r5",
            R6 => "r6",
            R7 => "r7",
            R8 => "r8",
            Sp => "sp",
            Fp => "fp",
            Mb => "mb",
            Im => "im",
        }
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().map(|r| r.name())
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}
