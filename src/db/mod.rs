//! Facilities for simulating and debugging guest programs.

macro_rules! invalid_data {
    ($e:expr) => {
        return Err(::std::io::Error::new(::std::io::ErrorKind::InvalidData,
                                         $e))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err(::std::io::Error::new(::std::io::ErrorKind::InvalidData,
                                         format!($fmt, $($arg)+)))
    };
}

mod cmd;
mod difftest;
mod expr;
mod itrace;
mod load;
mod sim;
mod watch;

pub use cmd::{CommandAst, CommandError, Debugger, InfoTarget};
pub use difftest::{
    DiffContext, DiffMismatch, DiffRef, Difftest, Direction, RefSim,
    check_regs, regcpy,
};
pub use expr::{
    ExprEnv, ExprError, MAX_TOKENS, Token, TokenKind, evaluate, tokenize,
};
pub use itrace::{ITRACE_CAPACITY, ITraceRing};
pub use load::{BUILTIN_IMAGE, builtin_image, load_image};
pub use sim::{MAX_INST_TO_PRINT, SimConfig, SimState, Simulator};
pub use watch::{NUM_WATCHPOINTS, WatchError, WatchHit, WatchPool, Watchpoint};

//===========================================================================//
