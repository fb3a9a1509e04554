//! Facilities for disassembling binary code.

pub mod rv32;

//===========================================================================//
