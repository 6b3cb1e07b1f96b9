//! The instruction table.
//!
//! Every instruction is declared exactly once in the `define_instructions!`
//! invocation below. The assembler encodes through [`Opcode::mode`] and the
//! machine decodes with `Opcode::try_from`, both generated from the same
//! rows, so the two sides cannot disagree about an opcode or its size.
//!
//! # Encoding
//!
//! - Opcode: 1 byte
//! - Register: 1 byte, the register ordinal
//! - Immediate / address: 2 bytes, big-endian
//! - Short immediate: 1 byte


use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IsaError {
    #[error("undefined opcode {0:#04x}")]
    UndefinedOpcode(u8),
}

/// The shape of a single encoded operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// `r1`
    Reg,
    /// `&r1`, the register holds an address
    RegPtr,
    /// `$1234`, 16 bits
    Imm,
    /// `$12`, 8 bits. Wider values are truncated to their low byte.
    Imm8,
    /// `&1234`, 16 bits
    Mem,
}

impl OperandKind {
    pub const fn width(self) -> u8 {
        match self {
            OperandKind::Reg | OperandKind::RegPtr | OperandKind::Imm8 => 1,
            OperandKind::Imm | OperandKind::Mem => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ImmReg,
    RegImm,
    RegImm8,
    RegReg,
    RegMem,
    MemReg,
    ImmMem,
    RegPtrReg,
    ImmOffReg,
    SingleReg,
    SingleImm,
    NoArgs,
}

impl Mode {
    /// Operands in encoding order.
    pub const fn operands(self) -> &'static [OperandKind] {
        use OperandKind::*;
        match self {
            Mode::ImmReg => &[Imm, Reg],
            Mode::RegImm => &[Reg, Imm],
            Mode::RegImm8 => &[Reg, Imm8],
            Mode::RegReg => &[Reg, Reg],
            Mode::RegMem => &[Reg, Mem],
            Mode::MemReg => &[Mem, Reg],
            Mode::ImmMem => &[Imm, Mem],
            Mode::RegPtrReg => &[RegPtr, Reg],
            Mode::ImmOffReg => &[Imm, RegPtr, Reg],
            Mode::SingleReg => &[Reg],
            Mode::SingleImm => &[Imm],
            Mode::NoArgs => &[],
        }
    }

    /// Encoded size in bytes, opcode included.
    pub const fn size(self) -> u8 {
        let operands = self.operands();
        let mut size = 1;
        let mut i = 0;
        while i < operands.len() {
            size += operands[i].width();
            i += 1;
        }
        size
    }
}

macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal, $mode:ident
        ),* $(,)?
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl Opcode {
            /// Every opcode in table order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            pub const fn mode(self) -> Mode {
                match self {
                    $(Opcode::$name => Mode::$mode,)*
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            type Error = IsaError;

            fn try_from(byte: u8) -> Result<Self, Self::Error> {
                match byte {
                    $($opcode => Ok(Opcode::$name),)*
                    _ => Err(IsaError::UndefinedOpcode(byte)),
                }
            }
        }
    };
}

define_instructions! {
    /// mov r1, r2 ; r2 = r1
    MovRegReg = 0x11, "mov", RegReg,
    /// mov $1234, r1 ; r1 = imm
    MovImmReg = 0x10, "mov", ImmReg,
    /// mov &1234, r1 ; r1 = [addr]
    MovMemReg = 0x13, "mov", MemReg,
    /// mov r1, &1234 ; [addr] = r1
    MovRegMem = 0x12, "mov", RegMem,
    /// mov $1234, &5678 ; [addr] = imm
    MovImmMem = 0x1B, "mov", ImmMem,
    /// mov &r1, r2 ; r2 = [r1]
    MovRegPtrReg = 0x1C, "mov", RegPtrReg,
    /// mov $1234, &r1, r2 ; r2 = [imm + r1]
    MovImmOffReg = 0x1D, "mov", ImmOffReg,

    /// add r1, r2 ; acc = r1 + r2
    AddRegReg = 0x14, "add", RegReg,
    /// add $1234, r1 ; acc = imm + r1
    AddImmReg = 0x3F, "add", ImmReg,
    /// sub r1, r2 ; acc = r1 - r2
    SubRegReg = 0x1F, "sub", RegReg,
    /// sub $1234, r1 ; acc = r1 - imm
    SubImmReg = 0x16, "sub", ImmReg,
    /// sub r1, $1234 ; acc = imm - r1
    SubRegImm = 0x1E, "sub", RegImm,
    /// mul r1, r2 ; acc = r1 * r2
    MulRegReg = 0x21, "mul", RegReg,
    /// mul $1234, r1 ; acc = imm * r1
    MulImmReg = 0x20, "mul", ImmReg,
    /// inc r1 ; r1 += 1
    IncReg = 0x35, "inc", SingleReg,
    /// dec r1 ; r1 -= 1
    DecReg = 0x36, "dec", SingleReg,

    /// lsf r1, r2 ; r1 <<= r2
    LsfRegReg = 0x27, "lsf", RegReg,
    /// lsf r1, $04 ; r1 <<= imm8
    LsfRegImm = 0x26, "lsf", RegImm8,
    /// rsf r1, r2 ; r1 >>= r2
    RsfRegReg = 0x2B, "rsf", RegReg,
    /// rsf r1, $04 ; r1 >>= imm8
    RsfRegImm = 0x2A, "rsf", RegImm8,
    /// and r1, r2 ; acc = r1 & r2
    AndRegReg = 0x2F, "and", RegReg,
    /// and r1, $00FF ; acc = r1 & imm
    AndRegImm = 0x2E, "and", RegImm,
    /// or r1, r2 ; acc = r1 | r2
    OrRegReg = 0x31, "or", RegReg,
    /// or r1, $00FF ; acc = r1 | imm
    OrRegImm = 0x30, "or", RegImm,
    /// xor r1, r2 ; acc = r1 ^ r2
    XorRegReg = 0x33, "xor", RegReg,
    /// xor r1, $00FF ; acc = r1 ^ imm
    XorRegImm = 0x32, "xor", RegImm,
    /// not r1 ; acc = !r1
    Not = 0x34, "not", SingleReg,

    /// jne r1, &1234 ; jump if r1 != acc
    JneReg = 0x40, "jne", RegMem,
    /// jne $1234, &5678 ; jump if imm != acc
    JneImm = 0x15, "jne", ImmMem,
    /// jeq r1, &1234 ; jump if r1 == acc
    JeqReg = 0x3E, "jeq", RegMem,
    /// jeq $1234, &5678 ; jump if imm == acc
    JeqImm = 0x41, "jeq", ImmMem,
    /// jlt r1, &1234 ; jump if r1 < acc
    JltReg = 0x42, "jlt", RegMem,
    /// jlt $1234, &5678 ; jump if imm < acc
    JltImm = 0x43, "jlt", ImmMem,
    /// jgt r1, &1234 ; jump if r1 > acc
    JgtReg = 0x44, "jgt", RegMem,
    /// jgt $1234, &5678 ; jump if imm > acc
    JgtImm = 0x45, "jgt", ImmMem,
    /// jle r1, &1234 ; jump if r1 <= acc
    JleReg = 0x46, "jle", RegMem,
    /// jle $1234, &5678 ; jump if imm <= acc
    JleImm = 0x47, "jle", ImmMem,
    /// jge r1, &1234 ; jump if r1 >= acc
    JgeReg = 0x48, "jge", RegMem,
    /// jge $1234, &5678 ; jump if imm >= acc
    JgeImm = 0x49, "jge", ImmMem,

    /// psh $1234
    PshImm = 0x17, "psh", SingleImm,
    /// psh r1
    PshReg = 0x18, "psh", SingleReg,
    /// pop r1
    Pop = 0x1A, "pop", SingleReg,
    /// cal $1234 ; push state, jump to imm
    CalImm = 0x5E, "cal", SingleImm,
    /// cal r1 ; push state, jump to r1
    CalReg = 0x5F, "cal", SingleReg,
    /// ret ; pop state
    Ret = 0x60, "ret", NoArgs,
    /// int $3 ; raise interrupt imm
    Int = 0xFD, "int", SingleImm,
    /// rti ; return from an interrupt handler
    RetInt = 0xFC, "rti", NoArgs,
    /// hlt ; stop the machine
    Hlt = 0xFF, "hlt", NoArgs,
}

impl Opcode {
    pub const fn size(self) -> u8 {
        self.mode().size()
    }

    /// Every opcode spelled `mnemonic`, in the order the parser should try
    /// them.
    pub fn with_mnemonic(mnemonic: &str) -> impl Iterator<Item = Opcode> + '_ {
        Self::ALL
            .iter()
            .copied()
            .filter(move |op| op.mnemonic().eq_ignore_ascii_case(mnemonic))
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.mnemonic(), self.mode())
    }
}
