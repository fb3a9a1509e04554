use crate::bus::{MEM_BASE, PhysMem};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Read};

//===========================================================================//

/// The program run when no image file is given: it stores a zero byte just
/// past the trap instruction, loads it back into `a0`, and traps.
pub const BUILTIN_IMAGE: [u32; 5] = [
    0x0000_0297, // auipc t0, 0x0
    0x0002_8823, // sb zero, 16(t0)
    0x0102_c503, // lbu a0, 16(t0)
    0x0010_0073, // ebreak
    0xdead_beef, // data
];

/// Returns the bytes of [`BUILTIN_IMAGE`].
pub fn builtin_image() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(BUILTIN_IMAGE.len() * 4);
    for &word in BUILTIN_IMAGE.iter() {
        // Writing into a Vec can't fail.
        let _ = bytes.write_u32::<LittleEndian>(word);
    }
    bytes
}

//===========================================================================//

/// Reads a raw binary image and copies it into guest memory at
/// [`MEM_BASE`], returning the size of the image in bytes.
pub fn load_image<R: Read>(mut reader: R, mem: &mut PhysMem) -> io::Result<usize> {
    let mut image = Vec::<u8>::new();
    reader.read_to_end(&mut image)?;
    if image.is_empty() {
        invalid_data!("image file is empty");
    }
    if image.len() > mem.size() {
        invalid_data!(
            "image is too large ({} bytes) for {} bytes of memory",
            image.len(),
            mem.size()
        );
    }
    if let Err(fault) = mem.load(MEM_BASE, &image) {
        invalid_data!("cannot load image: {}", fault);
    }
    log::info!(
        "The image is {} bytes, loaded at 0x{:08x}",
        image.len(),
        MEM_BASE
    );
    Ok(image.len())
}

//===========================================================================//


//===========================================================================//
