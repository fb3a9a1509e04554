use super::{BusFault, SimBus};
use byteorder::{ByteOrder, LittleEndian};

//===========================================================================//

/// The guest physical address at which RAM starts.
pub const MEM_BASE: u32 = 0x8000_0000;

/// The default amount of guest RAM, in bytes.
pub const DEFAULT_MEM_SIZE: usize = 0x800_0000;

//===========================================================================//

/// Simulated physical RAM, mapped at [`MEM_BASE`].  Accesses outside of the
/// mapped range fault.
pub struct PhysMem {
    mem: Box<[u8]>,
}

impl PhysMem {
    /// Returns a new zero-filled RAM of the given size in bytes.
    pub fn new(size: usize) -> PhysMem {
        assert!(size as u64 <= (u32::MAX - MEM_BASE) as u64 + 1);
        PhysMem { mem: vec![0u8; size].into_boxed_slice() }
    }

    /// Returns the number of bytes of RAM.
    pub fn size(&self) -> usize {
        self.mem.len()
    }

    /// Copies `data` into RAM starting at guest address `addr`.
    pub fn load(&mut self, addr: u32, data: &[u8]) -> Result<(), BusFault> {
        let range = self.range(addr, data.len())?;
        self.mem[range].copy_from_slice(data);
        Ok(())
    }

    fn range(
        &self,
        addr: u32,
        width: usize,
    ) -> Result<std::ops::Range<usize>, BusFault> {
        let fault = BusFault { addr, width };
        let offset = addr.checked_sub(MEM_BASE).ok_or(fault)? as usize;
        let end = offset.checked_add(width).ok_or(fault)?;
        if end > self.mem.len() {
            return Err(fault);
        }
        Ok(offset..end)
    }
}

impl SimBus for PhysMem {
    fn description(&self) -> String {
        let size = self.mem.len();
        if size < 1024 {
            format!("{size}B RAM at 0x{MEM_BASE:08x}")
        } else if size < 1024 * 1024 {
            format!("{}kB RAM at 0x{MEM_BASE:08x}", size >> 10)
        } else {
            format!("{}MB RAM at 0x{MEM_BASE:08x}", size >> 20)
        }
    }

    fn peek(&self, addr: u32, width: usize) -> Result<u32, BusFault> {
        let bytes = &self.mem[self.range(addr, width)?];
        match width {
            1 => Ok(u32::from(bytes[0])),
            2 => Ok(u32::from(LittleEndian::read_u16(bytes))),
            4 => Ok(LittleEndian::read_u32(bytes)),
            _ => Err(BusFault { addr, width }),
        }
    }

    fn read(&mut self, addr: u32, width: usize) -> Result<u32, BusFault> {
        self.peek(addr, width)
    }

    fn write(
        &mut self,
        addr: u32,
        width: usize,
        data: u32,
    ) -> Result<(), BusFault> {
        let range = self.range(addr, width)?;
        let bytes = &mut self.mem[range];
        match width {
            1 => bytes[0] = data as u8,
            2 => LittleEndian::write_u16(bytes, data as u16),
            4 => LittleEndian::write_u32(bytes, data),
            _ => return Err(BusFault { addr, width }),
        }
        Ok(())
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{BusFault, MEM_BASE, PhysMem, SimBus};

    #[test]
    fn description() {
        assert_eq!(PhysMem::new(0x10).description(), "16B RAM at 0x80000000");
        assert_eq!(
            PhysMem::new(0x1000).description(),
            "4kB RAM at 0x80000000"
        );
        assert_eq!(
            PhysMem::new(0x800_0000).description(),
            "128MB RAM at 0x80000000"
        );
    }

    #[test]
    fn little_endian_access() {
        let mut mem = PhysMem::new(0x100);
        mem.write(MEM_BASE, 4, 0xdead_beef).unwrap();
        assert_eq!(mem.read(MEM_BASE, 1), Ok(0xef));
        assert_eq!(mem.read(MEM_BASE + 1, 1), Ok(0xbe));
        assert_eq!(mem.read(MEM_BASE, 2), Ok(0xbeef));
        assert_eq!(mem.read(MEM_BASE + 2, 2), Ok(0xdead));
        assert_eq!(mem.read(MEM_BASE, 4), Ok(0xdead_beef));
    }

    #[test]
    fn narrow_writes_truncate() {
        let mut mem = PhysMem::new(0x100);
        mem.write(MEM_BASE + 4, 1, 0x1234_56ab).unwrap();
        mem.write(MEM_BASE + 6, 2, 0xffff_cdef).unwrap();
        assert_eq!(mem.peek(MEM_BASE + 4, 4), Ok(0xcdef_00ab));
    }

    #[test]
    fn out_of_bounds_faults() {
        let mut mem = PhysMem::new(0x100);
        assert_eq!(mem.read(0, 4), Err(BusFault { addr: 0, width: 4 }));
        assert_eq!(
            mem.read(MEM_BASE + 0xfe, 4),
            Err(BusFault { addr: MEM_BASE + 0xfe, width: 4 })
        );
        assert!(mem.write(MEM_BASE + 0x100, 1, 0).is_err());
        assert_eq!(mem.read(MEM_BASE + 0xfc, 4), Ok(0));
    }

    #[test]
    fn load_copies_bytes() {
        let mut mem = PhysMem::new(0x100);
        mem.load(MEM_BASE + 8, &[1, 2, 3, 4]).unwrap();
        assert_eq!(mem.peek(MEM_BASE + 8, 4), Ok(0x0403_0201));
        assert!(mem.load(MEM_BASE + 0xfe, &[1, 2, 3]).is_err());
    }
}

//===========================================================================//
