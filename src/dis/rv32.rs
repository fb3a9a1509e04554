//! Facilities for disassembling RV32IM machine code.

use crate::proc::REG_NAMES;
use crate::proc::util::{bits, imm_b, imm_i, imm_j, imm_s, imm_u, rd, rs1, rs2};
use std::fmt;

//===========================================================================//

/// An RV32IM instruction mnemonic.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Mnemonic {
    Lui,
    Auipc,
    Jal,
    Jalr,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    Ebreak,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let string = match *self {
            Mnemonic::Lui => "lui",
            Mnemonic::Auipc => "auipc",
            Mnemonic::Jal => "jal",
            Mnemonic::Jalr => "jalr",
            Mnemonic::Beq => "beq",
            Mnemonic::Bne => "bne",
            Mnemonic::Blt => "blt",
            Mnemonic::Bge => "bge",
            Mnemonic::Bltu => "bltu",
            Mnemonic::Bgeu => "bgeu",
            Mnemonic::Lb => "lb",
            Mnemonic::Lh => "lh",
            Mnemonic::Lw => "lw",
            Mnemonic::Lbu => "lbu",
            Mnemonic::Lhu => "lhu",
            Mnemonic::Sb => "sb",
            Mnemonic::Sh => "sh",
            Mnemonic::Sw => "sw",
            Mnemonic::Addi => "addi",
            Mnemonic::Slti => "slti",
            Mnemonic::Sltiu => "sltiu",
            Mnemonic::Xori => "xori",
            Mnemonic::Ori => "ori",
            Mnemonic::Andi => "andi",
            Mnemonic::Slli => "slli",
            Mnemonic::Srli => "srli",
            Mnemonic::Srai => "srai",
            Mnemonic::Add => "add",
            Mnemonic::Sub => "sub",
            Mnemonic::Sll => "sll",
            Mnemonic::Slt => "slt",
            Mnemonic::Sltu => "sltu",
            Mnemonic::Xor => "xor",
            Mnemonic::Srl => "srl",
            Mnemonic::Sra => "sra",
            Mnemonic::Or => "or",
            Mnemonic::And => "and",
            Mnemonic::Mul => "mul",
            Mnemonic::Mulh => "mulh",
            Mnemonic::Mulhsu => "mulhsu",
            Mnemonic::Mulhu => "mulhu",
            Mnemonic::Div => "div",
            Mnemonic::Divu => "divu",
            Mnemonic::Rem => "rem",
            Mnemonic::Remu => "remu",
            Mnemonic::Ebreak => "ebreak",
        };
        formatter.write_str(string)
    }
}

//===========================================================================//

/// The operands of an RV32IM instruction.  Register operands are register
/// numbers; immediates are already sign-extended.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operand {
    /// No operands.
    Implied,
    /// `rd, rs1, rs2`
    Registers(usize, usize, usize),
    /// `rd, rs1, imm`
    Immediate(usize, usize, i32),
    /// `rd, imm(rs1)`, for loads and `jalr`.
    Load(usize, i32, usize),
    /// `rs2, imm(rs1)`
    Store(usize, i32, usize),
    /// `rs1, rs2, target`, with the target relative to the instruction.
    Branch(usize, usize, i32),
    /// `rd, target`, with the target relative to the instruction.
    Jump(usize, i32),
    /// `rd, imm`, where `imm` is the upper 20 bits.
    Upper(usize, u32),
}

impl Operand {
    /// Formats this operand.  `pc` gives the address of the instruction.
    fn format(self, pc: u32) -> String {
        match self {
            Operand::Implied => String::new(),
            Operand::Registers(rd, rs1, rs2) => {
                format!(" {}, {}, {}", reg(rd), reg(rs1), reg(rs2))
            }
            Operand::Immediate(rd, rs1, imm) => {
                format!(" {}, {}, {imm}", reg(rd), reg(rs1))
            }
            Operand::Load(rd, imm, rs1) => {
                format!(" {}, {imm}({})", reg(rd), reg(rs1))
            }
            Operand::Store(rs2, imm, rs1) => {
                format!(" {}, {imm}({})", reg(rs2), reg(rs1))
            }
            Operand::Branch(rs1, rs2, offset) => {
                let dest = pc.wrapping_add(offset as u32);
                format!(" {}, {}, 0x{dest:08x}", reg(rs1), reg(rs2))
            }
            Operand::Jump(rd, offset) => {
                let dest = pc.wrapping_add(offset as u32);
                format!(" {}, 0x{dest:08x}", reg(rd))
            }
            Operand::Upper(rd, imm) => format!(" {}, 0x{imm:x}", reg(rd)),
        }
    }
}

fn reg(index: usize) -> &'static str {
    REG_NAMES[index]
}

//===========================================================================//

/// A complete, decoded RV32IM instruction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Instruction {
    /// The kind of operation to be performed.
    pub mnemonic: Mnemonic,
    /// The operand values.
    pub operand: Operand,
}

impl Instruction {
    /// Decodes a single instruction word, returning `None` if it is not a
    /// valid RV32IM instruction.
    pub fn decode(inst: u32) -> Option<Instruction> {
        let opcode = bits(inst, 6, 0);
        let funct3 = bits(inst, 14, 12);
        let funct7 = bits(inst, 31, 25);
        let (rd, rs1, rs2) = (rd(inst), rs1(inst), rs2(inst));
        let (mnemonic, operand) = match opcode {
            0b011_0111 => (Mnemonic::Lui, Operand::Upper(rd, imm_u(inst) >> 12)),
            0b001_0111 => {
                (Mnemonic::Auipc, Operand::Upper(rd, imm_u(inst) >> 12))
            }
            0b110_1111 => (Mnemonic::Jal, Operand::Jump(rd, imm_j(inst) as i32)),
            0b110_0111 if funct3 == 0 => {
                (Mnemonic::Jalr, Operand::Load(rd, imm_i(inst) as i32, rs1))
            }
            0b110_0011 => {
                let mnemonic = match funct3 {
                    0b000 => Mnemonic::Beq,
                    0b001 => Mnemonic::Bne,
                    0b100 => Mnemonic::Blt,
                    0b101 => Mnemonic::Bge,
                    0b110 => Mnemonic::Bltu,
                    0b111 => Mnemonic::Bgeu,
                    _ => return None,
                };
                (mnemonic, Operand::Branch(rs1, rs2, imm_b(inst) as i32))
            }
            0b000_0011 => {
                let mnemonic = match funct3 {
                    0b000 => Mnemonic::Lb,
                    0b001 => Mnemonic::Lh,
                    0b010 => Mnemonic::Lw,
                    0b100 => Mnemonic::Lbu,
                    0b101 => Mnemonic::Lhu,
                    _ => return None,
                };
                (mnemonic, Operand::Load(rd, imm_i(inst) as i32, rs1))
            }
            0b010_0011 => {
                let mnemonic = match funct3 {
                    0b000 => Mnemonic::Sb,
                    0b001 => Mnemonic::Sh,
                    0b010 => Mnemonic::Sw,
                    _ => return None,
                };
                (mnemonic, Operand::Store(rs2, imm_s(inst) as i32, rs1))
            }
            0b001_0011 => {
                let imm = imm_i(inst) as i32;
                let shamt = bits(inst, 24, 20) as i32;
                match (funct3, funct7) {
                    (0b000, _) => (Mnemonic::Addi, Operand::Immediate(rd, rs1, imm)),
                    (0b010, _) => (Mnemonic::Slti, Operand::Immediate(rd, rs1, imm)),
                    (0b011, _) => {
                        (Mnemonic::Sltiu, Operand::Immediate(rd, rs1, imm))
                    }
                    (0b100, _) => (Mnemonic::Xori, Operand::Immediate(rd, rs1, imm)),
                    (0b110, _) => (Mnemonic::Ori, Operand::Immediate(rd, rs1, imm)),
                    (0b111, _) => (Mnemonic::Andi, Operand::Immediate(rd, rs1, imm)),
                    (0b001, 0b000_0000) => {
                        (Mnemonic::Slli, Operand::Immediate(rd, rs1, shamt))
                    }
                    (0b101, 0b000_0000) => {
                        (Mnemonic::Srli, Operand::Immediate(rd, rs1, shamt))
                    }
                    (0b101, 0b010_0000) => {
                        (Mnemonic::Srai, Operand::Immediate(rd, rs1, shamt))
                    }
                    _ => return None,
                }
            }
            0b011_0011 => {
                let mnemonic = match (funct7, funct3) {
                    (0b000_0000, 0b000) => Mnemonic::Add,
                    (0b010_0000, 0b000) => Mnemonic::Sub,
                    (0b000_0000, 0b001) => Mnemonic::Sll,
                    (0b000_0000, 0b010) => Mnemonic::Slt,
                    (0b000_0000, 0b011) => Mnemonic::Sltu,
                    (0b000_0000, 0b100) => Mnemonic::Xor,
                    (0b000_0000, 0b101) => Mnemonic::Srl,
                    (0b010_0000, 0b101) => Mnemonic::Sra,
                    (0b000_0000, 0b110) => Mnemonic::Or,
                    (0b000_0000, 0b111) => Mnemonic::And,
                    (0b000_0001, 0b000) => Mnemonic::Mul,
                    (0b000_0001, 0b001) => Mnemonic::Mulh,
                    (0b000_0001, 0b010) => Mnemonic::Mulhsu,
                    (0b000_0001, 0b011) => Mnemonic::Mulhu,
                    (0b000_0001, 0b100) => Mnemonic::Div,
                    (0b000_0001, 0b101) => Mnemonic::Divu,
                    (0b000_0001, 0b110) => Mnemonic::Rem,
                    (0b000_0001, 0b111) => Mnemonic::Remu,
                    _ => return None,
                };
                (mnemonic, Operand::Registers(rd, rs1, rs2))
            }
            0b111_0011 if inst == 0x0010_0073 => {
                (Mnemonic::Ebreak, Operand::Implied)
            }
            _ => return None,
        };
        Some(Instruction { mnemonic, operand })
    }

    /// Formats the decoded instruction as a human-readable string.  `pc`
    /// specifies the address of the instruction, and is used to print
    /// branch and jump targets as absolute addresses.
    pub fn format(self, pc: u32) -> String {
        format!("{}{}", self.mnemonic, self.operand.format(pc))
    }
}

/// Disassembles a single instruction word located at `pc`.  Words that
/// aren't valid RV32IM instructions disassemble as `(bad)`.
pub fn disassemble_instruction(inst: u32, pc: u32) -> String {
    match Instruction::decode(inst) {
        Some(instruction) => instruction.format(pc),
        None => "(bad)".to_string(),
    }
}

//===========================================================================//


//===========================================================================//
