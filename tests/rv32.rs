use rv32sim::bus::{BusFault, MEM_BASE, PhysMem, SimBus};
use rv32sim::proc::{Rv32, SimBreak, SimProc};

//===========================================================================//

fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | 0x33
}

fn i_type(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    ((imm as u32 & 0xfff) << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (rd << 7)
        | opcode
}

fn s_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    ((imm >> 5 & 0x7f) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | ((imm & 0x1f) << 7)
        | 0x23
}

fn b_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    ((imm >> 12 & 1) << 31)
        | ((imm >> 5 & 0x3f) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | ((imm >> 1 & 0xf) << 8)
        | ((imm >> 11 & 1) << 7)
        | 0x63
}

fn j_type(imm: i32, rd: u32) -> u32 {
    let imm = imm as u32;
    ((imm >> 20 & 1) << 31)
        | ((imm >> 1 & 0x3ff) << 21)
        | ((imm >> 11 & 1) << 20)
        | ((imm >> 12 & 0xff) << 12)
        | (rd << 7)
        | 0x6f
}

fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x13)
}

const A0: u32 = 10;
const A1: u32 = 11;
const A2: u32 = 12;

//===========================================================================//

fn make_test_bus(code: &[u32]) -> PhysMem {
    let mut mem = PhysMem::new(0x1000);
    for (index, &inst) in code.iter().enumerate() {
        mem.write(MEM_BASE + 4 * index as u32, 4, inst).unwrap();
    }
    mem
}

/// Runs `code` from the reset vector with `a1 = src1` and `a2 = src2`,
/// returning the final value of `a0`.
fn run_with_args(code: &[u32], src1: u32, src2: u32) -> u32 {
    let mut bus = make_test_bus(code);
    let mut proc = Rv32::new();
    proc.set_register("a1", src1);
    proc.set_register("a2", src2);
    for _ in 0..code.len() {
        assert_eq!(proc.step(&mut bus), Ok(()));
    }
    proc.get_register("a0").unwrap()
}

fn test_r_op(funct7: u32, funct3: u32, src1: u32, src2: u32, expected: u32) {
    let inst = r_type(funct7, A2, A1, funct3, A0);
    assert_eq!(
        run_with_args(&[inst], src1, src2),
        expected,
        "funct7={funct7:#x} funct3={funct3} src1={src1:#x} src2={src2:#x}"
    );
}

//===========================================================================//

#[test]
fn disassemble_at_pc() {
    let bus = make_test_bus(&[addi(A0, 0, -1), j_type(-4, 0)]);
    let proc = Rv32::new();
    assert_eq!(proc.disassemble(&bus, MEM_BASE), (4, "addi a0, zero, -1".to_string()));
    assert_eq!(
        proc.disassemble(&bus, MEM_BASE + 4),
        (4, "jal zero, 0x80000000".to_string())
    );
}

#[test]
fn immediate_arithmetic() {
    assert_eq!(run_with_args(&[addi(A0, A1, -1)], 0, 0), 0xffff_ffff);
    assert_eq!(run_with_args(&[addi(A0, A1, 0x7ff)], 1, 0), 0x800);
    // slti/sltiu
    assert_eq!(run_with_args(&[i_type(-1, A1, 2, A0, 0x13)], 0, 0), 0);
    assert_eq!(run_with_args(&[i_type(-1, A1, 3, A0, 0x13)], 0, 0), 1);
    // xori/ori/andi
    assert_eq!(run_with_args(&[i_type(-1, A1, 4, A0, 0x13)], 0x0f, 0), 0xffff_fff0);
    assert_eq!(run_with_args(&[i_type(0x70, A1, 6, A0, 0x13)], 0x0f, 0), 0x7f);
    assert_eq!(run_with_args(&[i_type(0x3c, A1, 7, A0, 0x13)], 0x0f, 0), 0x0c);
    // slli/srli/srai
    assert_eq!(run_with_args(&[i_type(4, A1, 1, A0, 0x13)], 0x8000_0001, 0), 0x10);
    assert_eq!(
        run_with_args(&[i_type(4, A1, 5, A0, 0x13)], 0x8000_0000, 0),
        0x0800_0000
    );
    assert_eq!(
        run_with_args(&[i_type(0x404, A1, 5, A0, 0x13)], 0x8000_0000, 0),
        0xf800_0000
    );
}

#[test]
fn register_arithmetic() {
    test_r_op(0x00, 0, 0xffff_ffff, 2, 1); // add
    test_r_op(0x20, 0, 0, 1, 0xffff_ffff); // sub
    test_r_op(0x00, 1, 1, 33, 2); // sll uses the low five bits
    test_r_op(0x00, 2, 0xffff_ffff, 0, 1); // slt
    test_r_op(0x00, 3, 0xffff_ffff, 0, 0); // sltu
    test_r_op(0x00, 4, 0xff00, 0x0ff0, 0xf0f0); // xor
    test_r_op(0x00, 5, 0x8000_0000, 31, 1); // srl
    test_r_op(0x20, 5, 0x8000_0000, 31, 0xffff_ffff); // sra
    test_r_op(0x00, 6, 0xff00, 0x0ff0, 0xfff0); // or
    test_r_op(0x00, 7, 0xff00, 0x0ff0, 0x0f00); // and
}

#[test]
fn multiply() {
    test_r_op(0x01, 0, 0x1_0001, 0x1_0001, 0x0002_0001); // mul
    test_r_op(0x01, 1, 0xffff_ffff, 0xffff_ffff, 0); // mulh
    test_r_op(0x01, 1, 0x8000_0000, 0x8000_0000, 0x4000_0000); // mulh
    test_r_op(0x01, 2, 0xffff_ffff, 0xffff_ffff, 0xffff_ffff); // mulhsu
    test_r_op(0x01, 3, 0xffff_ffff, 0xffff_ffff, 0xffff_fffe); // mulhu
}

#[test]
fn divide() {
    test_r_op(0x01, 4, 7u32.wrapping_neg(), 2, 3u32.wrapping_neg()); // div
    test_r_op(0x01, 5, 0xffff_fffe, 2, 0x7fff_ffff); // divu
    test_r_op(0x01, 6, 7u32.wrapping_neg(), 2, 1u32.wrapping_neg()); // rem
    test_r_op(0x01, 7, 7, 2, 1); // remu
}

#[test]
fn divide_edge_cases() {
    // Division by zero yields all ones, and remainder yields the dividend.
    test_r_op(0x01, 4, 42, 0, 0xffff_ffff);
    test_r_op(0x01, 5, 42, 0, 0xffff_ffff);
    test_r_op(0x01, 6, 42, 0, 42);
    test_r_op(0x01, 7, 42, 0, 42);
    // Signed overflow.
    test_r_op(0x01, 4, 0x8000_0000, 0xffff_ffff, 0x8000_0000);
    test_r_op(0x01, 6, 0x8000_0000, 0xffff_ffff, 0);
}

#[test]
fn upper_immediates() {
    let lui = (0x12345 << 12) | (A0 << 7) | 0x37;
    assert_eq!(run_with_args(&[lui], 0, 0), 0x1234_5000);
    let auipc = (0x1 << 12) | (A0 << 7) | 0x17;
    assert_eq!(run_with_args(&[auipc], 0, 0), MEM_BASE + 0x1000);
}

#[test]
fn loads_extend() {
    let data = MEM_BASE + 0x100;
    let mut bus = make_test_bus(&[
        i_type(0, A1, 0, A0, 0x03), // lb
        i_type(0, A1, 4, A0, 0x03), // lbu
        i_type(0, A1, 1, A0, 0x03), // lh
        i_type(0, A1, 5, A0, 0x03), // lhu
        i_type(0, A1, 2, A0, 0x03), // lw
    ]);
    bus.write(data, 4, 0x1234_8080).unwrap();
    let mut proc = Rv32::new();
    proc.set_register("a1", data);
    let expected = [0xffff_ff80, 0x80, 0xffff_8080, 0x8080, 0x1234_8080];
    for value in expected {
        assert_eq!(proc.step(&mut bus), Ok(()));
        assert_eq!(proc.get_register("a0"), Some(value));
    }
}

#[test]
fn stores_truncate() {
    let data = MEM_BASE + 0x100;
    let mut bus = make_test_bus(&[
        s_type(0, A2, A1, 2),  // sw
        s_type(4, A2, A1, 1),  // sh
        s_type(-1, A2, A1, 0), // sb
    ]);
    let mut proc = Rv32::new();
    proc.set_register("a1", data);
    proc.set_register("a2", 0xdead_beef);
    for _ in 0..3 {
        assert_eq!(proc.step(&mut bus), Ok(()));
    }
    assert_eq!(bus.peek(data, 4), Ok(0xdead_beef));
    assert_eq!(bus.peek(data + 4, 4), Ok(0x0000_beef));
    assert_eq!(bus.peek(data - 1, 1), Ok(0xef));
}

#[test]
fn branches() {
    // beq taken, bne not taken, blt taken, bge not taken, bltu not taken,
    // bgeu taken.
    let cases = [
        (0, 5, 5, true),
        (1, 5, 5, false),
        (4, 0xffff_ffff, 0, true),
        (5, 0xffff_ffff, 0, false),
        (6, 0xffff_ffff, 0, false),
        (7, 0xffff_ffff, 0, true),
    ];
    for (funct3, src1, src2, taken) in cases {
        let mut bus = make_test_bus(&[b_type(-16, A2, A1, funct3)]);
        let mut proc = Rv32::new();
        proc.set_register("a1", src1);
        proc.set_register("a2", src2);
        assert_eq!(proc.step(&mut bus), Ok(()));
        let expected = if taken { MEM_BASE - 16 } else { MEM_BASE + 4 };
        assert_eq!(proc.pc(), expected, "funct3={funct3}");
    }
}

#[test]
fn jumps_link() {
    let mut bus = make_test_bus(&[j_type(8, 1)]);
    let mut proc = Rv32::new();
    assert_eq!(proc.step(&mut bus), Ok(()));
    assert_eq!(proc.pc(), MEM_BASE + 8);
    assert_eq!(proc.get_register("ra"), Some(MEM_BASE + 4));

    // jalr a1, 3(a1): the target uses the old a1 and clears bit zero.
    let mut bus = make_test_bus(&[i_type(3, A1, 0, A1, 0x67)]);
    let mut proc = Rv32::new();
    proc.set_register("a1", MEM_BASE + 0x20);
    assert_eq!(proc.step(&mut bus), Ok(()));
    assert_eq!(proc.pc(), MEM_BASE + 0x22);
    assert_eq!(proc.get_register("a1"), Some(MEM_BASE + 4));
}

#[test]
fn zero_register_is_hardwired() {
    let mut bus = make_test_bus(&[addi(0, 0, 5), j_type(8, 0)]);
    let mut proc = Rv32::new();
    assert_eq!(proc.step(&mut bus), Ok(()));
    assert_eq!(proc.get_register("zero"), Some(0));
    assert_eq!(proc.step(&mut bus), Ok(()));
    assert_eq!(proc.get_register("x0"), Some(0));
    proc.set_register("zero", 7);
    assert_eq!(proc.get_register("$0"), Some(0));
}

#[test]
fn ebreak_traps_with_exit_code() {
    let mut bus = make_test_bus(&[addi(A0, 0, 3), 0x0010_0073]);
    let mut proc = Rv32::new();
    assert_eq!(proc.step(&mut bus), Ok(()));
    assert_eq!(
        proc.step(&mut bus),
        Err(SimBreak::Trap { pc: MEM_BASE + 4, code: 3 })
    );
    assert_eq!(proc.pc(), MEM_BASE + 4);
}

#[test]
fn invalid_instruction() {
    for inst in [0x0000_0000, 0xffff_ffff, 0x0000_0073] {
        let mut bus = make_test_bus(&[inst]);
        let mut proc = Rv32::new();
        assert_eq!(
            proc.step(&mut bus),
            Err(SimBreak::InvalidInstruction { pc: MEM_BASE, inst })
        );
        assert_eq!(proc.pc(), MEM_BASE);
    }
}

#[test]
fn out_of_bounds_access() {
    let mut bus = make_test_bus(&[i_type(0, 0, 2, A0, 0x03)]);
    let mut proc = Rv32::new();
    assert_eq!(
        proc.step(&mut bus),
        Err(SimBreak::BadAddress {
            pc: MEM_BASE,
            fault: BusFault { addr: 0, width: 4 },
        })
    );

    let mut proc = Rv32::new();
    proc.set_pc(MEM_BASE + 0x1000);
    assert_eq!(
        proc.step(&mut bus),
        Err(SimBreak::BadAddress {
            pc: MEM_BASE + 0x1000,
            fault: BusFault { addr: MEM_BASE + 0x1000, width: 4 },
        })
    );
}

//===========================================================================//
