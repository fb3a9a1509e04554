//! Facilities for simulating a processor.

use crate::bus::{BusFault, SimBus};

mod rv32;
pub(crate) mod util;

pub use rv32::{CpuState, Decode, NUM_GPRS, REG_NAMES, RESET_VECTOR, Rv32};

//===========================================================================//

/// A condition that halts the simulation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SimBreak {
    /// The instruction word at `pc` doesn't match any known instruction.
    InvalidInstruction {
        /// The address of the offending instruction.
        pc: u32,
        /// The raw instruction word.
        inst: u32,
    },
    /// The program executed the trap instruction, asking the simulator to
    /// stop with the given exit code.
    Trap {
        /// The address of the trap instruction.
        pc: u32,
        /// The exit code, taken from the `a0` register.
        code: u32,
    },
    /// The instruction at `pc` tried to access unmapped memory.
    BadAddress {
        /// The address of the offending instruction.
        pc: u32,
        /// The access that failed.
        fault: BusFault,
    },
}

impl SimBreak {
    /// Returns the address of the instruction that caused the break.
    pub fn pc(&self) -> u32 {
        match *self {
            SimBreak::InvalidInstruction { pc, .. } => pc,
            SimBreak::Trap { pc, .. } => pc,
            SimBreak::BadAddress { pc, .. } => pc,
        }
    }
}

//===========================================================================//

/// A simulated processor.
pub trait SimProc {
    /// Returns a human-readable description of this simulated processor.
    fn description(&self) -> String;

    /// Disassembles the instruction starting at the given address, returning
    /// the length of the instruction in bytes, and a human-readable string
    /// with the assembly code for that instruction.
    fn disassemble(&self, bus: &dyn SimBus, addr: u32) -> (usize, String);

    /// Returns the current address of the program counter.
    fn pc(&self) -> u32;

    /// Sets the current address of the program counter.
    fn set_pc(&mut self, addr: u32);

    /// Returns the names of this processor's general-purpose registers, in
    /// register-number order.
    fn register_names(&self) -> &'static [&'static str];

    /// Returns the current value of the named register, or `None` if the
    /// processor has no such register.
    fn get_register(&self, name: &str) -> Option<u32>;

    /// Sets the value of the named register.  Unknown names are ignored.
    fn set_register(&mut self, name: &str, value: u32);

    /// Advances this processor by one instruction.
    fn step(&mut self, bus: &mut dyn SimBus) -> Result<(), SimBreak>;
}

//===========================================================================//
