use super::difftest::{DiffRef, Difftest, RefSim};
use super::expr::{ExprEnv, ExprError, evaluate};
use super::itrace::ITraceRing;
use super::load::load_image;
use super::watch::WatchPool;
use crate::bus::{DEFAULT_MEM_SIZE, PhysMem, SimBus};
use crate::proc::{Decode, REG_NAMES, Rv32, SimBreak, SimProc};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

//===========================================================================//

/// Trace lines are echoed to the output only when fewer than this many
/// instructions are requested at once.
pub const MAX_INST_TO_PRINT: u64 = 10;

//===========================================================================//

/// Settings for a simulation session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimConfig {
    /// The amount of guest RAM, in bytes.
    pub mem_size: usize,
    /// If true, the debugger runs the program to completion without
    /// prompting for commands.
    pub batch: bool,
    /// If true, every instruction is checked against the built-in reference
    /// model.
    pub difftest: bool,
}

impl Default for SimConfig {
    fn default() -> SimConfig {
        SimConfig { mem_size: DEFAULT_MEM_SIZE, batch: false, difftest: false }
    }
}

//===========================================================================//

/// The run state of the simulator.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SimState {
    /// Instructions are being executed.
    Running,
    /// Execution is paused, and can be resumed.
    Stopped,
    /// The guest program executed the trap instruction.
    Ended {
        /// The address of the trap instruction.
        pc: u32,
        /// The guest program's exit code.
        code: u32,
    },
    /// Execution failed and can't be resumed.
    Aborted {
        /// The address of the instruction that failed.
        pc: u32,
    },
    /// The user quit the debugger.
    Quit,
}

impl SimState {
    /// Returns true if execution can no longer be resumed.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            SimState::Ended { .. } | SimState::Aborted { .. } | SimState::Quit
        )
    }
}

//===========================================================================//

/// A read-only view of the machine, for evaluating expressions.
struct MachineView<'a> {
    proc: &'a Rv32,
    bus: &'a PhysMem,
}

impl ExprEnv for MachineView<'_> {
    fn register(&self, name: &str) -> Option<u32> {
        self.proc.get_register(name)
    }

    fn read_word(&self, addr: u32) -> Option<u32> {
        self.bus.peek(addr, 4).ok()
    }
}

//===========================================================================//

/// A complete simulated machine, along with the debugging state that
/// controls its execution.
pub struct Simulator {
    proc: Rv32,
    bus: PhysMem,
    state: SimState,
    itrace: ITraceRing,
    watchpoints: WatchPool,
    difftest: Option<Difftest>,
    image_size: usize,
    instructions_executed: u64,
    host_time: Duration,
    out: Box<dyn Write>,
}

impl Simulator {
    /// Creates a simulated machine with the given image loaded into memory,
    /// writing its output to stdout.
    pub fn new<R: Read>(config: &SimConfig, image: R) -> io::Result<Simulator> {
        let mut bus = PhysMem::new(config.mem_size);
        let image_size = load_image(image, &mut bus)?;
        let proc = Rv32::new();
        log::info!("Simulating {} with {}", proc.description(), bus.description());
        let mut sim = Simulator {
            proc,
            bus,
            state: SimState::Stopped,
            itrace: ITraceRing::new(),
            watchpoints: WatchPool::new(),
            difftest: None,
            image_size,
            instructions_executed: 0,
            host_time: Duration::ZERO,
            out: Box::new(io::stdout()),
        };
        if config.difftest {
            sim.attach_difftest(Box::new(RefSim::new(config.mem_size)))?;
        }
        Ok(sim)
    }

    /// Redirects the simulator's output.
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    /// Returns the simulator's output stream.
    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    /// Starts checking every executed instruction against the given
    /// reference model.
    pub fn attach_difftest(
        &mut self,
        reference: Box<dyn DiffRef>,
    ) -> io::Result<()> {
        let difftest = Difftest::init(
            reference,
            self.proc.state(),
            &self.bus,
            self.image_size,
        )?;
        self.difftest = Some(difftest);
        Ok(())
    }

    /// Returns the current run state.
    pub fn state(&self) -> SimState {
        self.state
    }

    /// Returns the simulated processor.
    pub fn proc(&self) -> &Rv32 {
        &self.proc
    }

    /// Returns the simulated processor, for modification.
    pub fn proc_mut(&mut self) -> &mut Rv32 {
        &mut self.proc
    }

    /// Returns the guest memory.
    pub fn bus(&self) -> &PhysMem {
        &self.bus
    }

    /// Returns the guest memory, for modification.
    pub fn bus_mut(&mut self) -> &mut PhysMem {
        &mut self.bus
    }

    /// Returns the trace of recently executed instructions.
    pub fn itrace(&self) -> &ITraceRing {
        &self.itrace
    }

    /// Returns the watchpoint pool.
    pub fn watchpoints(&self) -> &WatchPool {
        &self.watchpoints
    }

    /// Returns the watchpoint pool, for modification.
    pub fn watchpoints_mut(&mut self) -> &mut WatchPool {
        &mut self.watchpoints
    }

    /// Returns the total number of guest instructions executed so far.
    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    /// Evaluates a debugger expression against the current machine state.
    pub fn evaluate(&self, expr: &str) -> Result<u32, ExprError> {
        evaluate(expr, &self.view())
    }

    fn view(&self) -> MachineView<'_> {
        MachineView { proc: &self.proc, bus: &self.bus }
    }

    /// Marks the session as ended by the user.
    pub fn quit(&mut self) {
        self.state = SimState::Quit;
        self.statistics();
    }

    /// Returns true if the process should exit with a failure status: that
    /// is, unless the guest trapped with exit code zero or the user quit.
    pub fn is_exit_status_bad(&self) -> bool {
        !matches!(self.state, SimState::Ended { code: 0, .. } | SimState::Quit)
    }

    /// Returns a dump of all registers, one per line.
    pub fn register_dump(&self) -> String {
        let cpu = self.proc.state();
        let lines = REG_NAMES
            .iter()
            .zip(cpu.gpr.iter())
            .map(|(name, &value)| {
                format!("{name:<4}: 0x{value:<10x} {:<10}", value as i32)
            })
            .chain(std::iter::once(format!(
                "pc  : 0x{:<10x} {:<10}",
                cpu.pc, cpu.pc as i32
            )));
        lines.map(|line| line + "\n").collect()
    }

    /// Executes up to `n` instructions, stopping early if the guest halts,
    /// a watchpoint triggers, or the reference model disagrees.
    pub fn exec(&mut self, n: u64) -> io::Result<()> {
        if self.state.is_finished() {
            writeln!(
                self.out,
                "Program execution has ended. To restart the program, exit \
                 and run again."
            )?;
            return Ok(());
        }
        self.state = SimState::Running;
        let print_step = n < MAX_INST_TO_PRINT;
        let start = Instant::now();
        let result = self.execute(n, print_step);
        self.host_time += start.elapsed();
        result?;
        match self.state {
            SimState::Running => self.state = SimState::Stopped,
            SimState::Stopped | SimState::Quit => {}
            SimState::Ended { pc, code } => {
                let verdict =
                    if code == 0 { "HIT GOOD TRAP" } else { "HIT BAD TRAP" };
                self.report_halt(verdict, pc)?;
                self.statistics();
            }
            SimState::Aborted { pc } => {
                self.report_halt("ABORT", pc)?;
                self.statistics();
            }
        }
        Ok(())
    }

    fn execute(&mut self, mut n: u64, print_step: bool) -> io::Result<()> {
        while n > 0 {
            self.exec_once(print_step)?;
            if self.state != SimState::Running {
                break;
            }
            n -= 1;
        }
        Ok(())
    }

    fn exec_once(&mut self, print_step: bool) -> io::Result<()> {
        let mut s = match self.proc.fetch(&mut self.bus) {
            Ok(s) => s,
            Err(brk) => {
                self.halt(brk);
                return Ok(());
            }
        };
        let result = self.proc.execute(&mut s, &mut self.bus);
        self.instructions_executed += 1;
        let line = self.trace_line(&s);
        log::trace!("{line}");
        if print_step {
            writeln!(self.out, "{line}")?;
        }
        self.itrace.push(line);
        if let Err(brk) = result {
            self.halt(brk);
            return Ok(());
        }
        if let Some(difftest) = self.difftest.as_mut() {
            if let Err(mismatch) = difftest.step(self.proc.state(), s.pc) {
                writeln!(self.out, "difftest: {mismatch}")?;
                let dump = self.register_dump();
                self.out.write_all(dump.as_bytes())?;
                self.state = SimState::Aborted { pc: s.pc };
                return Ok(());
            }
        }
        let view = MachineView { proc: &self.proc, bus: &self.bus };
        let hits = self.watchpoints.poll_all(&view);
        for hit in hits.iter() {
            writeln!(self.out, "\n{hit}")?;
        }
        if !hits.is_empty() {
            self.state = SimState::Stopped;
        }
        Ok(())
    }

    fn trace_line(&self, s: &Decode) -> String {
        let bytes = s.inst.to_le_bytes();
        let hex: Vec<String> = bytes[..s.len().min(bytes.len())]
            .iter()
            .rev()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        let (_, asm) = self.proc.disassemble(&self.bus, s.pc);
        format!("0x{:08x}: {} {asm}", s.pc, hex.join(" "))
    }

    fn halt(&mut self, brk: SimBreak) {
        log::debug!("halted at pc = 0x{:08x}: {brk:?}", brk.pc());
        self.state = match brk {
            SimBreak::Trap { pc, code } => SimState::Ended { pc, code },
            SimBreak::InvalidInstruction { pc, inst } => {
                log::error!(
                    "invalid opcode 0x{inst:08x} at pc = 0x{pc:08x}; this \
                     instruction is not implemented"
                );
                SimState::Aborted { pc }
            }
            SimBreak::BadAddress { pc, fault } => {
                log::error!("{fault} at pc = 0x{pc:08x}");
                SimState::Aborted { pc }
            }
        };
    }

    fn report_halt(&mut self, verdict: &str, pc: u32) -> io::Result<()> {
        write!(self.out, "\n{}", self.itrace.render())?;
        writeln!(self.out, "rv32sim: {verdict} at pc = 0x{pc:08x}")?;
        log::info!("{verdict} at pc = 0x{pc:08x}");
        Ok(())
    }

    fn statistics(&self) {
        let micros = self.host_time.as_micros();
        let count = self.instructions_executed;
        log::info!("host time spent = {micros} us");
        log::info!("total guest instructions = {count}");
        if micros > 0 {
            let frequency = u128::from(count) * 1_000_000 / micros;
            log::info!("simulation frequency = {frequency} inst/s");
        } else {
            log::info!(
                "Finish running in less than 1 us and can not calculate the \
                 simulation frequency"
            );
        }
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{SimConfig, SimState, Simulator};
    use crate::db::load::builtin_image;
    use std::io;

    fn config() -> SimConfig {
        SimConfig { mem_size: 0x1000, ..SimConfig::default() }
    }

    fn builtin_sim() -> Simulator {
        let mut sim =
            Simulator::new(&config(), io::Cursor::new(builtin_image())).unwrap();
        sim.set_output(Box::new(io::sink()));
        sim
    }

    #[test]
    fn starts_stopped() {
        let sim = builtin_sim();
        assert_eq!(sim.state(), SimState::Stopped);
        assert_eq!(sim.instructions_executed(), 0);
        assert!(sim.is_exit_status_bad());
    }

    #[test]
    fn builtin_image_hits_good_trap() {
        let mut sim = builtin_sim();
        sim.exec(u64::MAX).unwrap();
        assert_eq!(
            sim.state(),
            SimState::Ended { pc: 0x8000_000c, code: 0 }
        );
        assert_eq!(sim.instructions_executed(), 4);
        assert_eq!(sim.itrace().len(), 4);
        assert!(!sim.is_exit_status_bad());
    }

    #[test]
    fn stepping_stops() {
        let mut sim = builtin_sim();
        sim.exec(2).unwrap();
        assert_eq!(sim.state(), SimState::Stopped);
        assert_eq!(sim.proc().state().pc, 0x8000_0008);
        assert_eq!(sim.proc().state().gpr[5], 0x8000_0000);
    }

    #[test]
    fn finished_session_does_not_run() {
        let mut sim = builtin_sim();
        sim.exec(u64::MAX).unwrap();
        sim.exec(1).unwrap();
        assert_eq!(sim.instructions_executed(), 4);
        sim.quit();
        assert_eq!(sim.state(), SimState::Quit);
        assert!(!sim.is_exit_status_bad());
    }

    #[test]
    fn register_dump_format() {
        let sim = builtin_sim();
        let dump = sim.register_dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 33);
        assert_eq!(lines[0], "zero: 0x0          0         ");
        assert_eq!(lines[32], "pc  : 0x80000000   -2147483648");
    }

    #[test]
    fn evaluates_against_machine() {
        let sim = builtin_sim();
        assert_eq!(sim.evaluate("*0x80000000"), Ok(0x0000_0297));
        assert_eq!(sim.evaluate("$pc + 4"), Ok(0x8000_0004));
        assert_eq!(sim.evaluate("$sp"), Ok(0));
    }
}

//===========================================================================//
