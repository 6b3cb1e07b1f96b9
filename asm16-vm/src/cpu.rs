use std::fmt::Write;

use asm16::{Opcode, Register};
use thiserror::Error;

use crate::device::BankSelector;
use crate::memory::{Device, MemoryError, MemoryMapper};

#[cfg(test)]
mod test;

#[derive(Debug, Error)]
pub enum CpuError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("unknown register `{0}`")]
    UnknownRegister(String),
    #[error("invalid opcode {opcode:#04x} at {address:#06x}")]
    InvalidOpcode { opcode: u8, address: u16 },
}

#[derive(Debug, Clone)]
pub struct CpuConfig {
    /// Initial `sp` and `fp`.
    /// default = `0xFFFE`
    pub stack_start: u16,
    /// Base of the 16 word interrupt vector table.
    /// default = `0x1000`
    pub interrupt_vector_address: u16,
    /// Initial `im`, every line enabled.
    /// default = `0xFFFF`
    pub interrupt_mask: u16,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            stack_start: 0xFFFE,
            interrupt_vector_address: 0x1000,
            interrupt_mask: 0xFFFF,
        }
    }
}

/// The execution engine. Owns the register file and every byte it touches
/// goes through its [`MemoryMapper`].
///
/// # Stack frames
///
/// `push` writes at `sp` then moves `sp` down a word. A call saves `r1..r8`,
/// `pc` and the caller's frame size, then points `fp` at the new top. Callers
/// push their arguments followed by the argument count, which `ret` uses to
/// drop them.
#[derive(Debug)]
pub struct Cpu {
    memory: MemoryMapper,
    registers: [u16; Register::COUNT],
    frame_size: u16,
    in_handler: bool,
    halted: bool,
    interrupt_vector_address: u16,
    bank: BankSelector,
}

impl Cpu {
    pub fn new(memory: MemoryMapper, config: CpuConfig) -> Self {
        let mut cpu = Self {
            memory,
            registers: [0; Register::COUNT],
            frame_size: 0,
            in_handler: false,
            halted: false,
            interrupt_vector_address: config.interrupt_vector_address,
            bank: BankSelector::new(),
        };
        cpu.set_reg(Register::Sp, config.stack_start);
        cpu.set_reg(Register::Fp, config.stack_start);
        cpu.set_reg(Register::Im, config.interrupt_mask);
        cpu
    }

    pub fn memory(&self) -> &MemoryMapper {
        &self.memory
    }
    pub fn memory_mut(&mut self) -> &mut MemoryMapper {
        &mut self.memory
    }

    /// Follows every write to `mb`. Hand it to a
    /// [`BankedMemory`](crate::device::BankedMemory).
    pub fn bank_selector(&self) -> BankSelector {
        self.bank.clone()
    }

    pub fn halted(&self) -> bool {
        self.halted
    }
    pub fn in_interrupt_handler(&self) -> bool {
        self.in_handler
    }

    pub fn reg(&self, reg: Register) -> u16 {
        self.registers[reg.ordinal() as usize]
    }
    pub fn set_reg(&mut self, reg: Register, value: u16) {
        self.registers[reg.ordinal() as usize] = value;
        if reg == Register::Mb {
            self.bank.set(value);
        }
    }

    pub fn get_register(&self, name: &str) -> Result<u16, CpuError> {
        Ok(self.reg(Self::register(name)?))
    }
    pub fn set_register(&mut self, name: &str, value: u16) -> Result<(), CpuError> {
        self.set_reg(Self::register(name)?, value);
        Ok(())
    }
    fn register(name: &str) -> Result<Register, CpuError> {
        name.parse()
            .map_err(|()| CpuError::UnknownRegister(name.to_owned()))
    }

    pub fn fetch(&mut self) -> Result<u8, CpuError> {
        let pc = self.reg(Register::Pc);
        let value = self.memory.get8(pc)?;
        self.set_reg(Register::Pc, pc.wrapping_add(1));
        Ok(value)
    }
    pub fn fetch16(&mut self) -> Result<u16, CpuError> {
        let pc = self.reg(Register::Pc);
        let value = self.memory.get16(pc)?;
        self.set_reg(Register::Pc, pc.wrapping_add(2));
        Ok(value)
    }
    /// Register bytes wrap around the register count.
    pub fn fetch_register(&mut self) -> Result<Register, CpuError> {
        Ok(Register::from_ordinal(self.fetch()?))
    }

    pub fn push(&mut self, value: u16) -> Result<(), CpuError> {
        let sp = self.reg(Register::Sp);
        self.memory.set16(sp, value)?;
        self.set_reg(Register::Sp, sp.wrapping_sub(2));
        self.frame_size = self.frame_size.wrapping_add(2);
        Ok(())
    }
    pub fn pop(&mut self) -> Result<u16, CpuError> {
        let sp = self.reg(Register::Sp).wrapping_add(2);
        self.set_reg(Register::Sp, sp);
        self.frame_size = self.frame_size.wrapping_sub(2);
        Ok(self.memory.get16(sp)?)
    }

    fn push_state(&mut self) -> Result<(), CpuError> {
        for reg in Register::GENERAL {
            self.push(self.reg(reg))?;
        }
        self.push(self.reg(Register::Pc))?;
        self.push(self.frame_size.wrapping_add(2))?;
        self.set_reg(Register::Fp, self.reg(Register::Sp));
        self.frame_size = 0;
        Ok(())
    }

    fn pop_state(&mut self) -> Result<(), CpuError> {
        let frame_pointer = self.reg(Register::Fp);
        self.set_reg(Register::Sp, frame_pointer);
        self.frame_size = self.pop()?;
        let frame_size = self.frame_size;
        let pc = self.pop()?;
        self.set_reg(Register::Pc, pc);
        for reg in Register::GENERAL.into_iter().rev() {
            let value = self.pop()?;
            self.set_reg(reg, value);
        }
        let args = self.pop()?;
        for _ in 0..args {
            self.pop()?;
        }
        self.set_reg(Register::Fp, frame_pointer.wrapping_add(frame_size));
        Ok(())
    }

    /// Jumps to the handler for line `value % 16` unless `im` masks it.
    ///
    /// Only the outermost interrupt saves state; a nested one jumps straight
    /// to its handler.
    pub fn handle_interrupt(&mut self, value: u16) -> Result<(), CpuError> {
        let line = value % 16;
        if self.reg(Register::Im) & (1 << line) == 0 {
            tracing::debug!(line, "interrupt masked");
            return Ok(());
        }
        let vector = self.interrupt_vector_address.wrapping_add(line * 2);
        let address = self.memory.get16(vector)?;
        if !self.in_handler {
            self.push(0)?;
            self.push_state()?;
        }
        self.in_handler = true;
        self.set_reg(Register::Pc, address);
        tracing::debug!(line, address, "interrupt");
        Ok(())
    }

    /// Runs one instruction. Returns `true` once the machine has halted.
    pub fn step(&mut self) -> Result<bool, CpuError> {
        if self.halted {
            return Ok(true);
        }
        let address = self.reg(Register::Pc);
        let byte = self.fetch()?;
        let opcode =
            Opcode::try_from(byte).map_err(|_| CpuError::InvalidOpcode { opcode: byte, address })?;
        tracing::trace!(pc = address, %opcode);
        self.execute(opcode)?;
        Ok(self.halted)
    }

    /// Steps until `hlt`, yielding to the runtime between instructions.
    pub async fn run(&mut self) -> Result<(), CpuError> {
        while !self.step()? {
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    fn execute(&mut self, opcode: Opcode) -> Result<(), CpuError> {
        use Opcode::*;
        use Register::Acc;
        match opcode {
            MovRegReg => {
                let from = self.fetch_register()?;
                let to = self.fetch_register()?;
                self.set_reg(to, self.reg(from));
            }
            MovImmReg => {
                let value = self.fetch16()?;
                let to = self.fetch_register()?;
                self.set_reg(to, value);
            }
            MovMemReg => {
                let address = self.fetch16()?;
                let to = self.fetch_register()?;
                let value = self.memory.get16(address)?;
                self.set_reg(to, value);
            }
            MovRegMem => {
                let from = self.fetch_register()?;
                let address = self.fetch16()?;
                self.memory.set16(address, self.reg(from))?;
            }
            MovImmMem => {
                let value = self.fetch16()?;
                let address = self.fetch16()?;
                self.memory.set16(address, value)?;
            }
            MovRegPtrReg => {
                let from = self.fetch_register()?;
                let to = self.fetch_register()?;
                let value = self.memory.get16(self.reg(from))?;
                self.set_reg(to, value);
            }
            MovImmOffReg => {
                let base = self.fetch16()?;
                let offset = self.fetch_register()?;
                let to = self.fetch_register()?;
                let value = self.memory.get16(base.wrapping_add(self.reg(offset)))?;
                self.set_reg(to, value);
            }

            AddRegReg | SubRegReg | MulRegReg | AndRegReg | OrRegReg | XorRegReg => {
                let lhs = self.fetch_register()?;
                let rhs = self.fetch_register()?;
                let (lhs, rhs) = (self.reg(lhs), self.reg(rhs));
                let result = match opcode {
                    AddRegReg => lhs.wrapping_add(rhs),
                    SubRegReg => lhs.wrapping_sub(rhs),
                    MulRegReg => lhs.wrapping_mul(rhs),
                    AndRegReg => lhs & rhs,
                    OrRegReg => lhs | rhs,
                    _ => lhs ^ rhs,
                };
                self.set_reg(Acc, result);
            }
            AddImmReg | SubImmReg | MulImmReg => {
                let value = self.fetch16()?;
                let reg = self.fetch_register()?;
                let reg = self.reg(reg);
                let result = match opcode {
                    AddImmReg => value.wrapping_add(reg),
                    SubImmReg => reg.wrapping_sub(value),
                    _ => value.wrapping_mul(reg),
                };
                self.set_reg(Acc, result);
            }
            SubRegImm | AndRegImm | OrRegImm | XorRegImm => {
                let reg = self.fetch_register()?;
                let value = self.fetch16()?;
                let reg = self.reg(reg);
                let result = match opcode {
                    SubRegImm => value.wrapping_sub(reg),
                    AndRegImm => reg & value,
                    OrRegImm => reg | value,
                    _ => reg ^ value,
                };
                self.set_reg(Acc, result);
            }
            IncReg => {
                let reg = self.fetch_register()?;
                self.set_reg(reg, self.reg(reg).wrapping_add(1));
            }
            DecReg => {
                let reg = self.fetch_register()?;
                self.set_reg(reg, self.reg(reg).wrapping_sub(1));
            }
            Not => {
                let reg = self.fetch_register()?;
                self.set_reg(Acc, !self.reg(reg));
            }

            LsfRegReg | RsfRegReg => {
                let reg = self.fetch_register()?;
                let by = self.fetch_register()?;
                let by = self.reg(by);
                self.shift(opcode == LsfRegReg, reg, by);
            }
            LsfRegImm | RsfRegImm => {
                let reg = self.fetch_register()?;
                let by = u16::from(self.fetch()?);
                self.shift(opcode == LsfRegImm, reg, by);
            }

            JneReg | JeqReg | JltReg | JgtReg | JleReg | JgeReg => {
                let reg = self.fetch_register()?;
                let value = self.reg(reg);
                let address = self.fetch16()?;
                self.jump_if(opcode, value, address);
            }
            JneImm | JeqImm | JltImm | JgtImm | JleImm | JgeImm => {
                let value = self.fetch16()?;
                let address = self.fetch16()?;
                self.jump_if(opcode, value, address);
            }

            PshImm => {
                let value = self.fetch16()?;
                self.push(value)?;
            }
            PshReg => {
                let reg = self.fetch_register()?;
                self.push(self.reg(reg))?;
            }
            Pop => {
                let reg = self.fetch_register()?;
                let value = self.pop()?;
                self.set_reg(reg, value);
            }
            CalImm => {
                let address = self.fetch16()?;
                self.push_state()?;
                self.set_reg(Register::Pc, address);
            }
            CalReg => {
                let reg = self.fetch_register()?;
                let address = self.reg(reg);
                self.push_state()?;
                self.set_reg(Register::Pc, address);
            }
            Ret => self.pop_state()?,
            Int => {
                let value = self.fetch16()?;
                self.handle_interrupt(value)?;
            }
            RetInt => {
                self.in_handler = false;
                self.pop_state()?;
            }
            Hlt => {
                self.halted = true;
                tracing::debug!(pc = self.reg(Register::Pc), "halted");
            }
        }
        Ok(())
    }

    /// The amount is taken modulo 32 and the result truncated to a word.
    fn shift(&mut self, left: bool, reg: Register, by: u16) {
        let value = u32::from(self.reg(reg));
        let by = u32::from(by) & 31;
        let result = if left { value << by } else { value >> by };
        self.set_reg(reg, result as u16);
    }

    /// Jumps compare their operand against `acc`: `jlt` jumps when the
    /// operand is less than `acc`.
    fn jump_if(&mut self, opcode: Opcode, value: u16, address: u16) {
        use Opcode::*;
        let acc = self.reg(Register::Acc);
        let taken = match opcode {
            JneReg | JneImm => value != acc,
            JeqReg | JeqImm => value == acc,
            JltReg | JltImm => value < acc,
            JgtReg | JgtImm => value > acc,
            JleReg | JleImm => value <= acc,
            _ => value >= acc,
        };
        if taken {
            self.set_reg(Register::Pc, address);
        }
    }

    /// Every register, one per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for reg in Register::ALL {
            let _ = writeln!(out, "{:<3} {:#06x}", reg.name(), self.reg(reg));
        }
        out
    }

    /// `n` bytes starting at `address`, as one line.
    pub fn view_memory_at(&self, address: u16, n: u16) -> Result<String, CpuError> {
        let mut out = format!("{address:#06x}:");
        for offset in 0..n {
            let byte = self.memory.get8(address.wrapping_add(offset))?;
            let _ = write!(out, " {byte:#04x}");
        }
        Ok(out)
    }
}
