pub mod cpu;
pub mod device;
pub mod memory;

pub use self::cpu::{Cpu, CpuConfig, CpuError};
pub use self::device::{BankSelector, BankedMemory, Memory, Screen};
pub use self::memory::{Device, MemoryError, MemoryMapper, RegionId, SharedDevice};
