//! Register map adapters.
//!
//! [`I2cRegmap`] talks to a real codec over any `embedded-hal` I2C bus
//! (32-bit register addresses, 16-bit values, big endian).  [`MemRegmap`]
//! is a fixed-capacity in-memory map with failure injection for host
//! simulation and tests.

use embedded_hal::i2c::{Error as _, I2c};
use heapless::{FnvIndexMap, Vec};
use log::warn;

use crate::app::ports::RegisterPort;
use crate::error::BusError;

/// 7-bit I2C address of Arizona codecs.
pub const ARIZONA_I2C_ADDR: u8 = 0x1A;

// ───────────────────────────────────────────────────────────────
// I2C
// ───────────────────────────────────────────────────────────────

pub struct I2cRegmap<I> {
    i2c: I,
    addr: u8,
}

impl<I: I2c> I2cRegmap<I> {
    pub fn new(i2c: I, addr: u8) -> Self {
        Self { i2c, addr }
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> RegisterPort for I2cRegmap<I> {
    fn read(&mut self, reg: u32) -> Result<u32, BusError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.addr, &reg.to_be_bytes(), &mut buf)
            .map_err(|e| {
                warn!("I2C read of 0x{:x} failed: {:?}", reg, e.kind());
                BusError::Read(reg)
            })?;
        Ok(u32::from(u16::from_be_bytes(buf)))
    }

    fn write(&mut self, reg: u32, val: u32) -> Result<(), BusError> {
        let [a, b, c, d] = reg.to_be_bytes();
        let [hi, lo] = (val as u16).to_be_bytes();
        self.i2c.write(self.addr, &[a, b, c, d, hi, lo]).map_err(|e| {
            warn!("I2C write of 0x{:x} failed: {:?}", reg, e.kind());
            BusError::Write(reg)
        })
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory
// ───────────────────────────────────────────────────────────────

const MEM_REGMAP_CAP: usize = 128;
const MAX_INJECTED_FAULTS: usize = 8;

/// Sparse register file.  Unwritten registers read as zero.
#[derive(Debug, Clone, Default)]
pub struct MemRegmap {
    regs: FnvIndexMap<u32, u32, MEM_REGMAP_CAP>,
    writes: usize,
    failing_reads: Vec<u32, MAX_INJECTED_FAULTS>,
    failing_writes: Vec<u32, MAX_INJECTED_FAULTS>,
}

impl MemRegmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Make every read of `reg` fail until [`clear_faults`](Self::clear_faults).
    pub fn fail_reads_of(&mut self, reg: u32) {
        let _ = self.failing_reads.push(reg);
    }

    /// Make every write of `reg` fail until [`clear_faults`](Self::clear_faults).
    pub fn fail_writes_to(&mut self, reg: u32) {
        let _ = self.failing_writes.push(reg);
    }

    pub fn clear_faults(&mut self) {
        self.failing_reads.clear();
        self.failing_writes.clear();
    }

    /// Current value, bypassing fault injection.
    pub fn peek(&self, reg: u32) -> u32 {
        self.regs.get(&reg).copied().unwrap_or(0)
    }

    /// Set a register without counting it as a driver write.  Models the
    /// codec updating its own status registers.
    pub fn poke(&mut self, reg: u32, val: u32) {
        if self.regs.insert(reg, val).is_err() {
            warn!("Register map full, dropping 0x{:x}", reg);
        }
    }
}

impl RegisterPort for MemRegmap {
    fn read(&mut self, reg: u32) -> Result<u32, BusError> {
        if self.failing_reads.contains(&reg) {
            return Err(BusError::Read(reg));
        }
        Ok(self.regs.get(&reg).copied().unwrap_or(0))
    }

    fn write(&mut self, reg: u32, val: u32) -> Result<(), BusError> {
        if self.failing_writes.contains(&reg) {
            return Err(BusError::Write(reg));
        }
        self.regs.insert(reg, val).map_err(|_| BusError::Write(reg))?;
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockI2c {
        writes: std::vec::Vec<(u8, std::vec::Vec<u8>)>,
        reply: [u8; 2],
    }

    impl embedded_hal::i2c::ErrorType for MockI2c {
        type Error = core::convert::Infallible;
    }

    impl embedded_hal::i2c::I2c for MockI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [embedded_hal::i2c::Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in operations.iter_mut() {
                match op {
                    embedded_hal::i2c::Operation::Write(data) => {
                        self.writes.push((address, data.to_vec()));
                    }
                    embedded_hal::i2c::Operation::Read(buf) => {
                        buf.copy_from_slice(&self.reply);
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn i2c_write_frames_address_then_value() {
        let mut map = I2cRegmap::new(MockI2c::default(), ARIZONA_I2C_ADDR);
        map.write(0x2A3, 0x1234).unwrap();
        let bus = map.release();
        assert_eq!(
            bus.writes,
            vec![(ARIZONA_I2C_ADDR, vec![0x00, 0x00, 0x02, 0xA3, 0x12, 0x34])]
        );
    }

    #[test]
    fn i2c_read_decodes_big_endian_value() {
        let bus = MockI2c { reply: [0x80, 0x7F], ..MockI2c::default() };
        let mut map = I2cRegmap::new(bus, ARIZONA_I2C_ADDR);
        assert_eq!(map.read(0x29C).unwrap(), 0x807F);
        let bus = map.release();
        assert_eq!(bus.writes[0].1, vec![0x00, 0x00, 0x02, 0x9C]);
    }

    #[test]
    fn unwritten_registers_read_zero() {
        let mut map = MemRegmap::new();
        assert_eq!(map.read(0xD0F).unwrap(), 0);
    }

    #[test]
    fn injected_faults_fail_only_their_register() {
        let mut map = MemRegmap::new();
        map.fail_writes_to(0x293);
        map.fail_reads_of(0x2A5);
        assert_eq!(map.write(0x293, 1), Err(BusError::Write(0x293)));
        assert_eq!(map.read(0x2A5), Err(BusError::Read(0x2A5)));
        assert!(map.write(0x294, 1).is_ok());

        map.clear_faults();
        assert!(map.write(0x293, 1).is_ok());
        assert_eq!(map.write_count(), 2);
    }

    #[test]
    fn poke_is_not_a_driver_write() {
        let mut map = MemRegmap::new();
        map.poke(0x2A5, 0x402);
        assert_eq!(map.read(0x2A5).unwrap(), 0x402);
        assert_eq!(map.write_count(), 0);
    }
}
