//! An instruction-level RV32IM simulator with an interactive debugger.

#![warn(missing_docs)]

pub mod bus;
pub mod db;
pub mod dis;
pub mod logger;
pub mod proc;
