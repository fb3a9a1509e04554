use crate::bus::{BusFault, BusPeeker, MEM_BASE, PhysMem, SimBus};
use crate::proc::{CpuState, NUM_GPRS, REG_NAMES, Rv32};
use std::io::{self, Read};
use thiserror::Error;

//===========================================================================//

/// Which way register state is copied between the simulator under test and
/// the reference model.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Direction {
    /// From the reference model to the simulator under test.
    ToDut,
    /// From the simulator under test to the reference model.
    ToRef,
}

/// The register state exchanged with a reference model.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiffContext {
    /// The general-purpose registers.
    pub gpr: [u32; NUM_GPRS],
    /// The program counter.
    pub pc: u32,
}

/// A reference implementation of the ISA, run in lockstep with the
/// simulator to catch execution bugs.
pub trait DiffRef {
    /// Copies bytes into the reference model's memory at the given guest
    /// address.
    fn memcpy(&mut self, addr: u32, bytes: &[u8]) -> Result<(), BusFault>;

    /// Exchanges register state with the reference model.  With
    /// [`Direction::ToDut`], the model's registers are written into `ctx`;
    /// with [`Direction::ToRef`], the model's registers are set from `ctx`.
    fn regcpy(&mut self, ctx: &mut DiffContext, direction: Direction);

    /// Executes `n` instructions on the reference model.
    fn exec(&mut self, n: u64);
}

//===========================================================================//

/// A difference in register state between the reference model and the
/// simulator under test.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error(
    "{name} is different after executing instruction at pc = 0x{pc:08x} \
     (REF = 0x{reference:08x}, DUT = 0x{dut:08x})"
)]
pub struct DiffMismatch {
    /// The name of the differing register, or `pc`.
    pub name: &'static str,
    /// The reference model's value.
    pub reference: u32,
    /// The simulator's value.
    pub dut: u32,
    /// The address of the instruction just executed.
    pub pc: u32,
}

/// Copies all registers and the PC between `cpu` and `ctx`.
pub fn regcpy(cpu: &mut CpuState, ctx: &mut DiffContext, direction: Direction) {
    match direction {
        Direction::ToDut => {
            cpu.gpr = ctx.gpr;
            cpu.pc = ctx.pc;
        }
        Direction::ToRef => {
            ctx.gpr = cpu.gpr;
            ctx.pc = cpu.pc;
        }
    }
}

/// Compares the reference model's registers against the simulator's,
/// checking the general-purpose registers in order and then the PC, and
/// reporting the first difference.  `pc` is the address of the instruction
/// that was just executed.
pub fn check_regs(
    reference: &DiffContext,
    cpu: &CpuState,
    pc: u32,
) -> Result<(), DiffMismatch> {
    let gprs = reference.gpr.iter().zip(cpu.gpr.iter());
    for (index, (&ref_value, &dut_value)) in gprs.enumerate() {
        if ref_value != dut_value {
            return report(DiffMismatch {
                name: REG_NAMES[index],
                reference: ref_value,
                dut: dut_value,
                pc,
            });
        }
    }
    if reference.pc != cpu.pc {
        return report(DiffMismatch {
            name: "pc",
            reference: reference.pc,
            dut: cpu.pc,
            pc,
        });
    }
    Ok(())
}

fn report(mismatch: DiffMismatch) -> Result<(), DiffMismatch> {
    log::error!("difftest: {mismatch}");
    Err(mismatch)
}

//===========================================================================//

/// A difftest session, pairing the simulator with a reference model.
pub struct Difftest {
    reference: Box<dyn DiffRef>,
}

impl Difftest {
    /// Starts a difftest session, copying the first `image_size` bytes of
    /// guest memory and the current register state into the reference
    /// model.
    pub fn init(
        mut reference: Box<dyn DiffRef>,
        cpu: &CpuState,
        bus: &dyn SimBus,
        image_size: usize,
    ) -> io::Result<Difftest> {
        let mut image = vec![0u8; image_size];
        BusPeeker::new(bus, MEM_BASE).read_exact(&mut image)?;
        if let Err(fault) = reference.memcpy(MEM_BASE, &image) {
            invalid_data!("reference model rejected guest image: {}", fault);
        }
        let mut ctx = DiffContext::default();
        let mut cpu = cpu.clone();
        regcpy(&mut cpu, &mut ctx, Direction::ToRef);
        reference.regcpy(&mut ctx, Direction::ToRef);
        log::info!(
            "Differential testing: ON, copied {image_size} bytes to reference"
        );
        Ok(Difftest { reference })
    }

    /// Runs the reference model for one instruction and compares its
    /// registers with `cpu`.  `pc` is the address of the instruction that
    /// the simulator just executed.
    pub fn step(&mut self, cpu: &CpuState, pc: u32) -> Result<(), DiffMismatch> {
        self.reference.exec(1);
        let mut ctx = DiffContext::default();
        self.reference.regcpy(&mut ctx, Direction::ToDut);
        check_regs(&ctx, cpu, pc)
    }
}

//===========================================================================//

/// A reference model built from an independent instance of this crate's
/// own processor and memory.
pub struct RefSim {
    proc: Rv32,
    mem: PhysMem,
}

impl RefSim {
    /// Returns a reference model with the given amount of RAM.
    pub fn new(mem_size: usize) -> RefSim {
        RefSim { proc: Rv32::new(), mem: PhysMem::new(mem_size) }
    }
}

impl DiffRef for RefSim {
    fn memcpy(&mut self, addr: u32, bytes: &[u8]) -> Result<(), BusFault> {
        self.mem.load(addr, bytes)
    }

    fn regcpy(&mut self, ctx: &mut DiffContext, direction: Direction) {
        // The directions are from the simulator's point of view, so they
        // invert here.
        let direction = match direction {
            Direction::ToDut => Direction::ToRef,
            Direction::ToRef => Direction::ToDut,
        };
        regcpy(self.proc.state_mut(), ctx, direction);
    }

    fn exec(&mut self, n: u64) {
        for _ in 0..n {
            if let Err(error) = self.proc.exec_once(&mut self.mem) {
                log::debug!("difftest reference stopped: {error:?}");
                break;
            }
        }
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{
        DiffContext, DiffMismatch, DiffRef, Difftest, Direction, RefSim,
        check_regs, regcpy,
    };
    use crate::bus::{MEM_BASE, PhysMem, SimBus};
    use crate::proc::{CpuState, NUM_GPRS, REG_NAMES, Rv32};

    #[test]
    fn regcpy_both_directions() {
        let mut cpu = CpuState::new();
        cpu.gpr[5] = 55;
        let mut ctx = DiffContext::default();
        regcpy(&mut cpu, &mut ctx, Direction::ToRef);
        assert_eq!(ctx.gpr[5], 55);
        assert_eq!(ctx.pc, cpu.pc);
        ctx.gpr[6] = 66;
        ctx.pc = 0x8000_0040;
        regcpy(&mut cpu, &mut ctx, Direction::ToDut);
        assert_eq!(cpu.gpr[6], 66);
        assert_eq!(cpu.pc, 0x8000_0040);
    }

    #[test]
    fn check_regs_reports_first_difference() {
        let cpu = CpuState::new();
        let mut ctx = DiffContext { gpr: cpu.gpr, pc: cpu.pc };
        assert_eq!(check_regs(&ctx, &cpu, cpu.pc), Ok(()));
        ctx.pc = 0;
        ctx.gpr[11] = 1;
        ctx.gpr[10] = 2;
        assert_eq!(
            check_regs(&ctx, &cpu, 0x8000_0000),
            Err(DiffMismatch { name: "a0", reference: 2, dut: 0, pc: MEM_BASE })
        );
        ctx.gpr = cpu.gpr;
        assert_eq!(
            check_regs(&ctx, &cpu, 0x8000_0000),
            Err(DiffMismatch {
                name: "pc",
                reference: 0,
                dut: MEM_BASE,
                pc: MEM_BASE,
            })
        );
    }

    #[test]
    fn check_regs_names_each_register() {
        let mut cpu = CpuState::new();
        for (index, value) in cpu.gpr.iter_mut().enumerate() {
            *value = index as u32 * 0x1111;
        }
        for index in 0..NUM_GPRS {
            let mut ctx = DiffContext { gpr: cpu.gpr, pc: cpu.pc };
            ctx.gpr[index] ^= 0x8000_0001;
            let mismatch = check_regs(&ctx, &cpu, MEM_BASE).unwrap_err();
            assert_eq!(mismatch.name, REG_NAMES[index]);
            assert_eq!(mismatch.reference, ctx.gpr[index]);
            assert_eq!(mismatch.dut, cpu.gpr[index]);
        }
        let ctx = DiffContext { gpr: cpu.gpr, pc: cpu.pc + 4 };
        let mismatch = check_regs(&ctx, &cpu, MEM_BASE).unwrap_err();
        assert_eq!(mismatch.name, "pc");
        assert_eq!(mismatch.reference, MEM_BASE + 4);
    }

    #[test]
    fn reference_tracks_simulator() {
        let mut bus = PhysMem::new(0x100);
        // addi a0, zero, 5; addi a1, a0, 1
        bus.write(MEM_BASE, 4, 0x0050_0513).unwrap();
        bus.write(MEM_BASE + 4, 4, 0x0015_0593).unwrap();
        let mut proc = Rv32::new();
        let reference = Box::new(RefSim::new(0x100));
        let mut difftest =
            Difftest::init(reference, proc.state(), &bus, 8).unwrap();
        for _ in 0..2 {
            let s = proc.exec_once(&mut bus).unwrap();
            assert_eq!(difftest.step(proc.state(), s.pc), Ok(()));
        }
        assert_eq!(proc.state().gpr[11], 6);
    }

    #[test]
    fn reference_regcpy_round_trip() {
        let mut reference = RefSim::new(0x10);
        let mut ctx = DiffContext::default();
        ctx.gpr[1] = 0x1234;
        ctx.pc = MEM_BASE + 8;
        reference.regcpy(&mut ctx, Direction::ToRef);
        let mut out = DiffContext::default();
        reference.regcpy(&mut out, Direction::ToDut);
        assert_eq!(out, ctx);
    }
}

//===========================================================================//
