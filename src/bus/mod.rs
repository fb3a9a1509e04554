//! Facilities for simulating the physical memory bus.

use std::io::{self, Read};
use thiserror::Error;

mod pmem;

pub use pmem::{DEFAULT_MEM_SIZE, MEM_BASE, PhysMem};

//===========================================================================//

/// A memory access that could not be performed, because no memory is mapped
/// at the given address.
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
#[error("address 0x{addr:08x} (width {width}) is out of bounds")]
pub struct BusFault {
    /// The first byte address of the attempted access.
    pub addr: u32,
    /// The width of the attempted access, in bytes.
    pub width: usize,
}

//===========================================================================//

/// A simulated memory bus.
///
/// Accesses are 1, 2, or 4 bytes wide and little-endian.  Values narrower
/// than 32 bits are zero-extended on read, and truncated on write.
/// Implementations must report unmapped addresses as a [`BusFault`] rather
/// than panicking.
pub trait SimBus {
    /// Returns a human-readable description of this simulated memory bus.
    fn description(&self) -> String;

    /// Returns the value that the processor would read at the given address,
    /// but without performing any side effects that would occur if the
    /// processor actually read it.
    fn peek(&self, addr: u32, width: usize) -> Result<u32, BusFault>;

    /// Reads a value from memory.
    ///
    /// Note that this is a `&mut self` method, since some hardware registers
    /// may have side effects when read.
    fn read(&mut self, addr: u32, width: usize) -> Result<u32, BusFault>;

    /// Writes a value to memory.
    fn write(
        &mut self,
        addr: u32,
        width: usize,
        data: u32,
    ) -> Result<(), BusFault>;
}

//===========================================================================//

/// Adapts a [`SimBus`] into a byte stream, starting at a given address, using
/// side-effect-free reads.  Unmapped bytes read as zero.
pub(crate) struct BusPeeker<'a> {
    bus: &'a dyn SimBus,
    addr: u32,
}

impl<'a> BusPeeker<'a> {
    pub fn new(bus: &'a dyn SimBus, start_addr: u32) -> BusPeeker<'a> {
        BusPeeker { bus, addr: start_addr }
    }
}

impl Read for BusPeeker<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        for byte in buf.iter_mut() {
            *byte = self.bus.peek(self.addr, 1).unwrap_or(0) as u8;
            self.addr = self.addr.wrapping_add(1);
        }
        Ok(buf.len())
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{BusPeeker, PhysMem, SimBus};
    use byteorder::{BigEndian, ReadBytesExt};

    #[test]
    fn peeker_reads_bytes_in_address_order() {
        let mut mem = PhysMem::new(0x1000);
        mem.write(super::MEM_BASE, 4, 0x1234_5678).unwrap();
        let mut peeker = BusPeeker::new(&mem, super::MEM_BASE);
        assert_eq!(peeker.read_u32::<BigEndian>().unwrap(), 0x7856_3412);
    }

    #[test]
    fn peeker_reads_unmapped_bytes_as_zero() {
        let mem = PhysMem::new(0x1000);
        let mut peeker = BusPeeker::new(&mem, 0);
        assert_eq!(peeker.read_u16::<BigEndian>().unwrap(), 0);
    }
}

//===========================================================================//
