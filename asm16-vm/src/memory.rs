use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;


#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("no device is mapped at {address:#06x}")]
    Unmapped { address: u16 },
    #[error("{len} byte access at {address:#06x} is out of range")]
    OutOfRange { address: u16, len: usize },
    #[error("device io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can sit behind a range of addresses.
///
/// Addresses are local to the device: the mapper subtracts the region start
/// first when the region was mapped with `remap`. Words are big-endian.
pub trait Device {
    fn get8(&self, address: u16) -> Result<u8, MemoryError>;
    fn get16(&self, address: u16) -> Result<u16, MemoryError>;
    fn set8(&mut self, address: u16, value: u8) -> Result<(), MemoryError>;
    fn set16(&mut self, address: u16, value: u16) -> Result<(), MemoryError>;
}

/// A device shared between whoever built it and the mapper.
pub type SharedDevice = Rc<RefCell<dyn Device>>;

/// Handle returned by [`MemoryMapper::map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(u32);

struct Region {
    id: RegionId,
    device: SharedDevice,
    start: u16,
    /// inclusive
    end: u16,
    remap: bool,
}

impl Region {
    fn contains(&self, address: u16) -> bool {
        (self.start..=self.end).contains(&address)
    }
    fn local(&self, address: u16) -> u16 {
        if self.remap {
            address - self.start
        } else {
            address
        }
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} {:#06x}..={:#06x} remap={}",
            self.id, self.start, self.end, self.remap
        )
    }
}

/// Routes every access to the most recently mapped region containing the
/// address, so later regions shadow earlier ones.
#[derive(Debug, Default)]
pub struct MemoryMapper {
    regions: Vec<Region>,
    next_id: u32,
}

impl MemoryMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, device: SharedDevice, start: u16, end: u16, remap: bool) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        tracing::debug!(?id, start, end, remap, "mapped region");
        self.regions.insert(
            0,
            Region {
                id,
                device,
                start,
                end,
                remap,
            },
        );
        id
    }

    /// Removes the region `id` named. Returns `false` if it was already gone.
    pub fn unmap(&mut self, id: RegionId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|region| region.id != id);
        let removed = self.regions.len() != before;
        if removed {
            tracing::debug!(?id, "unmapped region");
        }
        removed
    }

    /// Writes `bytes` one at a time starting at `start`.
    pub fn load(&mut self, start: u16, bytes: &[u8]) -> Result<(), MemoryError> {
        if usize::from(start) + bytes.len() > 0x10000 {
            return Err(MemoryError::OutOfRange {
                address: start,
                len: bytes.len(),
            });
        }
        for (offset, &byte) in bytes.iter().enumerate() {
            self.set8(start + offset as u16, byte)?;
        }
        tracing::debug!(start, len = bytes.len(), "loaded image");
        Ok(())
    }

    fn find(&self, address: u16) -> Result<&Region, MemoryError> {
        self.regions
            .iter()
            .find(|region| region.contains(address))
            .ok_or(MemoryError::Unmapped { address })
    }
}

impl Device for MemoryMapper {
    fn get8(&self, address: u16) -> Result<u8, MemoryError> {
        let region = self.find(address)?;
        region.device.borrow().get8(region.local(address))
    }
    fn get16(&self, address: u16) -> Result<u16, MemoryError> {
        let region = self.find(address)?;
        region.device.borrow().get16(region.local(address))
    }
    fn set8(&mut self, address: u16, value: u8) -> Result<(), MemoryError> {
        let region = self.find(address)?;
        region.device.borrow_mut().set8(region.local(address), value)
    }
    fn set16(&mut self, address: u16, value: u16) -> Result<(), MemoryError> {
        let region = self.find(address)?;
        region.device.borrow_mut().set16(region.local(address), value)
    }
}
