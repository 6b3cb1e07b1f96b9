use std::cell::{Cell, RefCell};
use std::io::Write;
use std::rc::Rc;

use crate::memory::{Device, MemoryError};


/// Linear RAM.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Box<[u8]>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size].into_boxed_slice(),
        }
    }
    pub fn shared(size: usize) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(size)))
    }
    fn out_of_range(address: u16, len: usize) -> MemoryError {
        MemoryError::OutOfRange { address, len }
    }
}

impl Device for Memory {
    fn get8(&self, address: u16) -> Result<u8, MemoryError> {
        self.bytes
            .get(usize::from(address))
            .copied()
            .ok_or(Self::out_of_range(address, 1))
    }
    fn get16(&self, address: u16) -> Result<u16, MemoryError> {
        let at = usize::from(address);
        match self.bytes.get(at..at + 2) {
            Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
            _ => Err(Self::out_of_range(address, 2)),
        }
    }
    fn set8(&mut self, address: u16, value: u8) -> Result<(), MemoryError> {
        let byte = self
            .bytes
            .get_mut(usize::from(address))
            .ok_or(Self::out_of_range(address, 1))?;
        *byte = value;
        Ok(())
    }
    fn set16(&mut self, address: u16, value: u16) -> Result<(), MemoryError> {
        let at = usize::from(address);
        let word = self
            .bytes
            .get_mut(at..at + 2)
            .ok_or(Self::out_of_range(address, 2))?;
        word.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
}

/// The bank number shared between the cpu's `mb` register and every
/// [`BankedMemory`] built from it.
#[derive(Debug, Clone, Default)]
pub struct BankSelector(Rc<Cell<u16>>);

impl BankSelector {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self) -> u16 {
        self.0.get()
    }
    pub fn set(&self, bank: u16) {
        self.0.set(bank)
    }
}

/// Several equally sized buffers behind one region. The active buffer is the
/// selector value modulo the bank count.
///
/// Map it without `remap` only when the region starts at 0; the device
/// indexes its buffers with whatever address it is handed.
#[derive(Debug)]
pub struct BankedMemory {
    banks: Vec<Memory>,
    selector: BankSelector,
}

impl BankedMemory {
    pub fn new(count: usize, size: usize, selector: BankSelector) -> Self {
        Self {
            banks: (0..count.max(1)).map(|_| Memory::new(size)).collect(),
            selector,
        }
    }
    pub fn shared(count: usize, size: usize, selector: BankSelector) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(count, size, selector)))
    }
    pub fn bank(&self, index: usize) -> Option<&Memory> {
        self.banks.get(index)
    }
    fn current(&self) -> usize {
        usize::from(self.selector.get()) % self.banks.len()
    }
}

impl Device for BankedMemory {
    fn get8(&self, address: u16) -> Result<u8, MemoryError> {
        self.banks[self.current()].get8(address)
    }
    fn get16(&self, address: u16) -> Result<u16, MemoryError> {
        self.banks[self.current()].get16(address)
    }
    fn set8(&mut self, address: u16, value: u8) -> Result<(), MemoryError> {
        let current = self.current();
        self.banks[current].set8(address, value)
    }
    fn set16(&mut self, address: u16, value: u16) -> Result<(), MemoryError> {
        let current = self.current();
        self.banks[current].set16(address, value)
    }
}

/// A 16 column character screen drawn with ANSI escapes.
///
/// A word written at cell `n` carries a command in its high byte and a
/// character in its low byte. Reads return 0 and byte writes are dropped.
#[derive(Debug)]
pub struct Screen<W> {
    out: W,
}

impl<W: Write> Screen<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
    pub fn shared(out: W) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(out)))
    }
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Device for Screen<W> {
    fn get8(&self, _: u16) -> Result<u8, MemoryError> {
        Ok(0)
    }
    fn get16(&self, _: u16) -> Result<u16, MemoryError> {
        Ok(0)
    }
    fn set8(&mut self, _: u16, _: u8) -> Result<(), MemoryError> {
        Ok(())
    }
    fn set16(&mut self, address: u16, value: u16) -> Result<(), MemoryError> {
        let [command, ch] = value.to_be_bytes();
        match command {
            0xFF => self.out.write_all(b"\x1b[2J")?,
            0x01 => self.out.write_all(b"\x1b[1m")?,
            0x02 => self.out.write_all(b"\x1b[0m")?,
            _ => (),
        }
        let x = address % 16 + 1;
        let y = address / 16 + 1;
        write!(self.out, "\x1b[{y};{}H{}", x * 2, char::from(ch))?;
        self.out.flush()?;
        Ok(())
    }
}
