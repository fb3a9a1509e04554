use super::util::bits;
use super::{SimBreak, SimProc};
use crate::bus::SimBus;
use crate::dis::rv32::disassemble_instruction;

mod inst;

//===========================================================================//

/// The number of general-purpose registers.
pub const NUM_GPRS: usize = 32;

/// The ABI names of the general-purpose registers, indexed by register
/// number.
pub const REG_NAMES: [&str; NUM_GPRS] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1",
    "a2", "a3", "a4", "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// The address of the first instruction executed after reset.
pub const RESET_VECTOR: u32 = 0x8000_0000;

const REG_A0: usize = 10;

//===========================================================================//

/// The architectural state of an RV32 hart.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CpuState {
    /// The general-purpose registers.  `gpr[0]` is zero between
    /// instructions.
    pub gpr: [u32; NUM_GPRS],
    /// The program counter.
    pub pc: u32,
}

impl CpuState {
    /// Returns the state of a freshly reset hart.
    pub fn new() -> CpuState {
        CpuState { gpr: [0; NUM_GPRS], pc: RESET_VECTOR }
    }

    /// Returns the register number for the given register name, accepting ABI
    /// names (with `$0` as an alias for `zero`), and `x0` through `x31`.
    pub fn gpr_index(name: &str) -> Option<usize> {
        if let Some(index) = REG_NAMES.iter().position(|&reg| reg == name) {
            return Some(index);
        }
        if name == "0" || name == "$0" {
            return Some(0);
        }
        let number = name.strip_prefix('x')?;
        if number.is_empty()
            || (number.len() > 1 && number.starts_with('0'))
            || !number.bytes().all(|chr| chr.is_ascii_digit())
        {
            return None;
        }
        number.parse::<usize>().ok().filter(|&index| index < NUM_GPRS)
    }

    /// Returns the value of the named register, which may be any name
    /// accepted by [`CpuState::gpr_index`], or `pc`.
    pub fn register(&self, name: &str) -> Option<u32> {
        if name == "pc" {
            Some(self.pc)
        } else {
            CpuState::gpr_index(name).map(|index| self.gpr[index])
        }
    }
}

impl Default for CpuState {
    fn default() -> CpuState {
        CpuState::new()
    }
}

//===========================================================================//

/// The decoding state for a single instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decode {
    /// The address of the instruction.
    pub pc: u32,
    /// The address of the next sequential instruction.
    pub snpc: u32,
    /// The address of the next instruction to execute, as determined by
    /// executing this one.
    pub dnpc: u32,
    /// The raw instruction word.
    pub inst: u32,
}

impl Decode {
    /// Returns the instruction length in bytes.
    pub fn len(&self) -> usize {
        self.snpc.wrapping_sub(self.pc) as usize
    }
}

//===========================================================================//

/// A simulated RV32IM processor.
pub struct Rv32 {
    cpu: CpuState,
}

impl Rv32 {
    /// Returns a new simulated processor in its reset state.
    pub fn new() -> Rv32 {
        Rv32 { cpu: CpuState::new() }
    }

    /// Returns the architectural state of the processor.
    pub fn state(&self) -> &CpuState {
        &self.cpu
    }

    /// Returns the architectural state of the processor, for modification.
    pub fn state_mut(&mut self) -> &mut CpuState {
        &mut self.cpu
    }

    /// Fetches the instruction at the current PC.
    pub fn fetch(&mut self, bus: &mut dyn SimBus) -> Result<Decode, SimBreak> {
        let pc = self.cpu.pc;
        let inst = bus
            .read(pc, 4)
            .map_err(|fault| SimBreak::BadAddress { pc, fault })?;
        let snpc = pc.wrapping_add(4);
        Ok(Decode { pc, snpc, dnpc: snpc, inst })
    }

    /// Executes a fetched instruction.  On success, the PC is advanced to
    /// the instruction's dynamic next PC; on a break, the PC is left pointing
    /// at the instruction.
    pub fn execute(
        &mut self,
        s: &mut Decode,
        bus: &mut dyn SimBus,
    ) -> Result<(), SimBreak> {
        let result = inst::decode_exec(s, &mut self.cpu, bus);
        self.cpu.gpr[0] = 0;
        result?;
        self.cpu.pc = s.dnpc;
        Ok(())
    }

    /// Fetches and executes one instruction, returning its decoding state.
    pub fn exec_once(
        &mut self,
        bus: &mut dyn SimBus,
    ) -> Result<Decode, SimBreak> {
        let mut s = self.fetch(bus)?;
        self.execute(&mut s, bus)?;
        Ok(s)
    }
}

impl Default for Rv32 {
    fn default() -> Rv32 {
        Rv32::new()
    }
}

impl SimProc for Rv32 {
    fn description(&self) -> String {
        "RISC-V RV32IM".to_string()
    }

    fn disassemble(&self, bus: &dyn SimBus, addr: u32) -> (usize, String) {
        match bus.peek(addr, 4) {
            Ok(inst) if bits(inst, 1, 0) == 0b11 => {
                (4, disassemble_instruction(inst, addr))
            }
            Ok(inst) => (4, format!(".word 0x{inst:08x}")),
            Err(_) => (4, "(unmapped)".to_string()),
        }
    }

    fn pc(&self) -> u32 {
        self.cpu.pc
    }

    fn set_pc(&mut self, addr: u32) {
        self.cpu.pc = addr;
    }

    fn register_names(&self) -> &'static [&'static str] {
        &REG_NAMES
    }

    fn get_register(&self, name: &str) -> Option<u32> {
        self.cpu.register(name)
    }

    fn set_register(&mut self, name: &str, value: u32) {
        if name == "pc" {
            self.cpu.pc = value;
        } else if let Some(index) = CpuState::gpr_index(name) {
            if index != 0 {
                self.cpu.gpr[index] = value;
            }
        }
    }

    fn step(&mut self, bus: &mut dyn SimBus) -> Result<(), SimBreak> {
        self.exec_once(bus).map(|_| ())
    }
}

//===========================================================================//


//===========================================================================//
