use super::{CpuState, Decode, REG_A0};
use crate::bus::SimBus;
use crate::proc::SimBreak;
use crate::proc::util::{imm_b, imm_i, imm_j, imm_s, imm_u, rd, rs1, rs2, sext};

//===========================================================================//

/// How the operands of an instruction are encoded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum InstType {
    I,
    U,
    S,
    B,
    J,
    R,
    N,
}

#[derive(Clone, Copy, Debug, Default)]
struct Operands {
    rd: usize,
    src1: u32,
    src2: u32,
    imm: u32,
}

struct Exec<'a> {
    s: &'a mut Decode,
    cpu: &'a mut CpuState,
    bus: &'a mut dyn SimBus,
}

impl Exec<'_> {
    fn set(&mut self, rd: usize, value: u32) {
        self.cpu.gpr[rd] = value;
    }

    fn load(&mut self, addr: u32, width: usize) -> Result<u32, SimBreak> {
        let pc = self.s.pc;
        self.bus
            .read(addr, width)
            .map_err(|fault| SimBreak::BadAddress { pc, fault })
    }

    fn store(
        &mut self,
        addr: u32,
        width: usize,
        data: u32,
    ) -> Result<(), SimBreak> {
        let pc = self.s.pc;
        self.bus
            .write(addr, width, data)
            .map_err(|fault| SimBreak::BadAddress { pc, fault })
    }

    fn branch_if(&mut self, condition: bool, imm: u32) -> Result<(), SimBreak> {
        if condition {
            self.s.dnpc = self.s.pc.wrapping_add(imm);
        }
        Ok(())
    }
}

type ExecFn = fn(&mut Exec<'_>, Operands) -> Result<(), SimBreak>;

//===========================================================================//

/// One entry in the instruction decoding table.
pub(super) struct InstPattern {
    pub name: &'static str,
    pub mask: u32,
    pub value: u32,
    pub ty: InstType,
    exec: ExecFn,
}

impl InstPattern {
    pub fn matches(&self, inst: u32) -> bool {
        inst & self.mask == self.value
    }
}

/// Converts a textual instruction pattern into a `(mask, value)` pair.  The
/// pattern lists the 32 instruction bits from most to least significant:
/// `0` and `1` are fixed bits, `?` is a don't-care bit, and spaces are
/// ignored.
const fn parse_pattern(pattern: &str) -> (u32, u32) {
    let bytes = pattern.as_bytes();
    let mut mask: u32 = 0;
    let mut value: u32 = 0;
    let mut num_bits = 0;
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'0' => {
                mask = (mask << 1) | 1;
                value <<= 1;
                num_bits += 1;
            }
            b'1' => {
                mask = (mask << 1) | 1;
                value = (value << 1) | 1;
                num_bits += 1;
            }
            b'?' => {
                mask <<= 1;
                value <<= 1;
                num_bits += 1;
            }
            b' ' => {}
            _ => panic!("invalid character in instruction pattern"),
        }
        index += 1;
    }
    assert!(num_bits == 32, "instruction pattern must have 32 bits");
    (mask, value)
}

macro_rules! inst {
    ($pattern:literal, $name:ident, $ty:ident, $exec:ident) => {
        InstPattern {
            name: stringify!($name),
            mask: parse_pattern($pattern).0,
            value: parse_pattern($pattern).1,
            ty: InstType::$ty,
            exec: $exec,
        }
    };
}

/// The decoding table.  Patterns are tried in order, and the first match
/// wins; the table must end with a pattern that matches everything.
pub(super) static PATTERNS: &[InstPattern] = &[
    inst!("??????? ????? ????? ??? ????? 01101 11", lui, U, op_lui),
    inst!("??????? ????? ????? ??? ????? 00101 11", auipc, U, op_auipc),
    inst!("??????? ????? ????? ??? ????? 11011 11", jal, J, op_jal),
    inst!("??????? ????? ????? 000 ????? 11001 11", jalr, I, op_jalr),
    inst!("??????? ????? ????? 000 ????? 11000 11", beq, B, op_beq),
    inst!("??????? ????? ????? 001 ????? 11000 11", bne, B, op_bne),
    inst!("??????? ????? ????? 100 ????? 11000 11", blt, B, op_blt),
    inst!("??????? ????? ????? 101 ????? 11000 11", bge, B, op_bge),
    inst!("??????? ????? ????? 110 ????? 11000 11", bltu, B, op_bltu),
    inst!("??????? ????? ????? 111 ????? 11000 11", bgeu, B, op_bgeu),
    inst!("??????? ????? ????? 000 ????? 00000 11", lb, I, op_lb),
    inst!("??????? ????? ????? 001 ????? 00000 11", lh, I, op_lh),
    inst!("??????? ????? ????? 010 ????? 00000 11", lw, I, op_lw),
    inst!("??????? ????? ????? 100 ????? 00000 11", lbu, I, op_lbu),
    inst!("??????? ????? ????? 101 ????? 00000 11", lhu, I, op_lhu),
    inst!("??????? ????? ????? 000 ????? 01000 11", sb, S, op_sb),
    inst!("??????? ????? ????? 001 ????? 01000 11", sh, S, op_sh),
    inst!("??????? ????? ????? 010 ????? 01000 11", sw, S, op_sw),
    inst!("??????? ????? ????? 000 ????? 00100 11", addi, I, op_addi),
    inst!("??????? ????? ????? 010 ????? 00100 11", slti, I, op_slti),
    inst!("??????? ????? ????? 011 ????? 00100 11", sltiu, I, op_sltiu),
    inst!("??????? ????? ????? 100 ????? 00100 11", xori, I, op_xori),
    inst!("??????? ????? ????? 110 ????? 00100 11", ori, I, op_ori),
    inst!("??????? ????? ????? 111 ????? 00100 11", andi, I, op_andi),
    inst!("0000000 ????? ????? 001 ????? 00100 11", slli, I, op_slli),
    inst!("0000000 ????? ????? 101 ????? 00100 11", srli, I, op_srli),
    inst!("0100000 ????? ????? 101 ????? 00100 11", srai, I, op_srai),
    inst!("0000000 ????? ????? 000 ????? 01100 11", add, R, op_add),
    inst!("0100000 ????? ????? 000 ????? 01100 11", sub, R, op_sub),
    inst!("0000000 ????? ????? 001 ????? 01100 11", sll, R, op_sll),
    inst!("0000000 ????? ????? 010 ????? 01100 11", slt, R, op_slt),
    inst!("0000000 ????? ????? 011 ????? 01100 11", sltu, R, op_sltu),
    inst!("0000000 ????? ????? 100 ????? 01100 11", xor, R, op_xor),
    inst!("0000000 ????? ????? 101 ????? 01100 11", srl, R, op_srl),
    inst!("0100000 ????? ????? 101 ????? 01100 11", sra, R, op_sra),
    inst!("0000000 ????? ????? 110 ????? 01100 11", or, R, op_or),
    inst!("0000000 ????? ????? 111 ????? 01100 11", and, R, op_and),
    inst!("0000001 ????? ????? 000 ????? 01100 11", mul, R, op_mul),
    inst!("0000001 ????? ????? 001 ????? 01100 11", mulh, R, op_mulh),
    inst!("0000001 ????? ????? 010 ????? 01100 11", mulhsu, R, op_mulhsu),
    inst!("0000001 ????? ????? 011 ????? 01100 11", mulhu, R, op_mulhu),
    inst!("0000001 ????? ????? 100 ????? 01100 11", div, R, op_div),
    inst!("0000001 ????? ????? 101 ????? 01100 11", divu, R, op_divu),
    inst!("0000001 ????? ????? 110 ????? 01100 11", rem, R, op_rem),
    inst!("0000001 ????? ????? 111 ????? 01100 11", remu, R, op_remu),
    inst!("0000000 00001 00000 000 00000 11100 11", ebreak, N, op_ebreak),
    inst!("??????? ????? ????? ??? ????? ????? ??", inv, N, op_inv),
];

//===========================================================================//

fn decode_operands(inst: u32, ty: InstType, cpu: &CpuState) -> Operands {
    let src1 = cpu.gpr[rs1(inst)];
    let src2 = cpu.gpr[rs2(inst)];
    let mut ops = Operands { rd: rd(inst), ..Operands::default() };
    match ty {
        InstType::I => {
            ops.src1 = src1;
            ops.imm = imm_i(inst);
        }
        InstType::U => ops.imm = imm_u(inst),
        InstType::S => {
            ops.src1 = src1;
            ops.src2 = src2;
            ops.imm = imm_s(inst);
        }
        InstType::B => {
            ops.src1 = src1;
            ops.src2 = src2;
            ops.imm = imm_b(inst);
        }
        InstType::J => ops.imm = imm_j(inst),
        InstType::R => {
            ops.src1 = src1;
            ops.src2 = src2;
        }
        InstType::N => {}
    }
    ops
}

/// Decodes and executes the instruction in `s`, updating `s.dnpc`.  The
/// caller is responsible for writing back the PC and clearing `x0`.
pub(super) fn decode_exec(
    s: &mut Decode,
    cpu: &mut CpuState,
    bus: &mut dyn SimBus,
) -> Result<(), SimBreak> {
    s.dnpc = s.snpc;
    let inst = s.inst;
    let Some(pattern) = PATTERNS.iter().find(|pattern| pattern.matches(inst))
    else {
        return Err(SimBreak::InvalidInstruction { pc: s.pc, inst });
    };
    let ops = decode_operands(inst, pattern.ty, cpu);
    let mut exec = Exec { s, cpu, bus };
    (pattern.exec)(&mut exec, ops)
}

//===========================================================================//

fn op_lui(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.imm);
    Ok(())
}

fn op_auipc(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, e.s.pc.wrapping_add(o.imm));
    Ok(())
}

fn op_jal(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, e.s.snpc);
    e.s.dnpc = e.s.pc.wrapping_add(o.imm);
    Ok(())
}

fn op_jalr(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    // The target is computed from src1 before rd is written, since rd and
    // rs1 may be the same register.
    e.s.dnpc = o.src1.wrapping_add(o.imm) & !1;
    e.set(o.rd, e.s.snpc);
    Ok(())
}

fn op_beq(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.branch_if(o.src1 == o.src2, o.imm)
}

fn op_bne(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.branch_if(o.src1 != o.src2, o.imm)
}

fn op_blt(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.branch_if((o.src1 as i32) < (o.src2 as i32), o.imm)
}

fn op_bge(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.branch_if((o.src1 as i32) >= (o.src2 as i32), o.imm)
}

fn op_bltu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.branch_if(o.src1 < o.src2, o.imm)
}

fn op_bgeu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.branch_if(o.src1 >= o.src2, o.imm)
}

fn op_lb(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let data = e.load(o.src1.wrapping_add(o.imm), 1)?;
    e.set(o.rd, sext(data, 8));
    Ok(())
}

fn op_lh(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let data = e.load(o.src1.wrapping_add(o.imm), 2)?;
    e.set(o.rd, sext(data, 16));
    Ok(())
}

fn op_lw(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let data = e.load(o.src1.wrapping_add(o.imm), 4)?;
    e.set(o.rd, data);
    Ok(())
}

fn op_lbu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let data = e.load(o.src1.wrapping_add(o.imm), 1)?;
    e.set(o.rd, data);
    Ok(())
}

fn op_lhu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let data = e.load(o.src1.wrapping_add(o.imm), 2)?;
    e.set(o.rd, data);
    Ok(())
}

fn op_sb(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.store(o.src1.wrapping_add(o.imm), 1, o.src2)
}

fn op_sh(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.store(o.src1.wrapping_add(o.imm), 2, o.src2)
}

fn op_sw(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.store(o.src1.wrapping_add(o.imm), 4, o.src2)
}

fn op_addi(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1.wrapping_add(o.imm));
    Ok(())
}

fn op_slti(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, u32::from((o.src1 as i32) < (o.imm as i32)));
    Ok(())
}

fn op_sltiu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, u32::from(o.src1 < o.imm));
    Ok(())
}

fn op_xori(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 ^ o.imm);
    Ok(())
}

fn op_ori(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 | o.imm);
    Ok(())
}

fn op_andi(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 & o.imm);
    Ok(())
}

fn op_slli(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 << (o.imm & 0x1f));
    Ok(())
}

fn op_srli(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 >> (o.imm & 0x1f));
    Ok(())
}

fn op_srai(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, ((o.src1 as i32) >> (o.imm & 0x1f)) as u32);
    Ok(())
}

fn op_add(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1.wrapping_add(o.src2));
    Ok(())
}

fn op_sub(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1.wrapping_sub(o.src2));
    Ok(())
}

fn op_sll(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 << (o.src2 & 0x1f));
    Ok(())
}

fn op_slt(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, u32::from((o.src1 as i32) < (o.src2 as i32)));
    Ok(())
}

fn op_sltu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, u32::from(o.src1 < o.src2));
    Ok(())
}

fn op_xor(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 ^ o.src2);
    Ok(())
}

fn op_srl(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 >> (o.src2 & 0x1f));
    Ok(())
}

fn op_sra(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, ((o.src1 as i32) >> (o.src2 & 0x1f)) as u32);
    Ok(())
}

fn op_or(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 | o.src2);
    Ok(())
}

fn op_and(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1 & o.src2);
    Ok(())
}

fn op_mul(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    e.set(o.rd, o.src1.wrapping_mul(o.src2));
    Ok(())
}

fn op_mulh(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let product = i64::from(o.src1 as i32) * i64::from(o.src2 as i32);
    e.set(o.rd, (product >> 32) as u32);
    Ok(())
}

fn op_mulhsu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let product = i64::from(o.src1 as i32) * i64::from(o.src2);
    e.set(o.rd, (product >> 32) as u32);
    Ok(())
}

fn op_mulhu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let product = u64::from(o.src1) * u64::from(o.src2);
    e.set(o.rd, (product >> 32) as u32);
    Ok(())
}

fn op_div(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    // i32::MIN / -1 overflows; wrapping_div yields i32::MIN, as RISC-V
    // requires.
    let quotient = if o.src2 == 0 {
        u32::MAX
    } else {
        (o.src1 as i32).wrapping_div(o.src2 as i32) as u32
    };
    e.set(o.rd, quotient);
    Ok(())
}

fn op_divu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let quotient = o.src1.checked_div(o.src2).unwrap_or(u32::MAX);
    e.set(o.rd, quotient);
    Ok(())
}

fn op_rem(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let remainder = if o.src2 == 0 {
        o.src1
    } else {
        (o.src1 as i32).wrapping_rem(o.src2 as i32) as u32
    };
    e.set(o.rd, remainder);
    Ok(())
}

fn op_remu(e: &mut Exec<'_>, o: Operands) -> Result<(), SimBreak> {
    let remainder = o.src1.checked_rem(o.src2).unwrap_or(o.src1);
    e.set(o.rd, remainder);
    Ok(())
}

fn op_ebreak(e: &mut Exec<'_>, _: Operands) -> Result<(), SimBreak> {
    Err(SimBreak::Trap { pc: e.s.pc, code: e.cpu.gpr[REG_A0] })
}

fn op_inv(e: &mut Exec<'_>, _: Operands) -> Result<(), SimBreak> {
    Err(SimBreak::InvalidInstruction { pc: e.s.pc, inst: e.s.inst })
}

//===========================================================================//


//===========================================================================//
