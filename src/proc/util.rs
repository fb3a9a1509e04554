//===========================================================================//

/// Extracts bits `hi` down to `lo` (inclusive) of `word`.
pub(crate) const fn bits(word: u32, hi: u32, lo: u32) -> u32 {
    (word >> lo) & (u32::MAX >> (31 - (hi - lo)))
}

/// Sign-extends the low `len` bits of `value` to 32 bits.
pub(crate) const fn sext(value: u32, len: u32) -> u32 {
    let shift = 32 - len;
    (((value << shift) as i32) >> shift) as u32
}

pub(crate) const fn rd(inst: u32) -> usize {
    bits(inst, 11, 7) as usize
}

pub(crate) const fn rs1(inst: u32) -> usize {
    bits(inst, 19, 15) as usize
}

pub(crate) const fn rs2(inst: u32) -> usize {
    bits(inst, 24, 20) as usize
}

pub(crate) const fn imm_i(inst: u32) -> u32 {
    sext(bits(inst, 31, 20), 12)
}

pub(crate) const fn imm_u(inst: u32) -> u32 {
    bits(inst, 31, 12) << 12
}

pub(crate) const fn imm_s(inst: u32) -> u32 {
    sext((bits(inst, 31, 25) << 5) | bits(inst, 11, 7), 12)
}

pub(crate) const fn imm_b(inst: u32) -> u32 {
    sext(
        (bits(inst, 31, 31) << 12)
            | (bits(inst, 7, 7) << 11)
            | (bits(inst, 30, 25) << 5)
            | (bits(inst, 11, 8) << 1),
        13,
    )
}

pub(crate) const fn imm_j(inst: u32) -> u32 {
    sext(
        (bits(inst, 31, 31) << 20)
            | (bits(inst, 19, 12) << 12)
            | (bits(inst, 20, 20) << 11)
            | (bits(inst, 30, 21) << 1),
        21,
    )
}

//===========================================================================//


//===========================================================================//
