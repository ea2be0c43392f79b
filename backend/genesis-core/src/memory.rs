//! Genesis 68000 address map: cartridge ROM, main work RAM, and the Z80/VDP/YM2612 register
//! windows layered on top of [`recompiler_core::memmap`].

use recompiler_core::memmap::{ChunkBacking, ChunkFlags, MemChunk, MemoryMap};

pub const MAIN_RAM_LEN: usize = 64 * 1024;
pub const MAX_ROM_LEN: usize = 4 * 1024 * 1024;

pub const ROM_BUFFER: usize = 0;
pub const MAIN_RAM_BUFFER: usize = 1;

/// Builds the 68000's address map for a cartridge of `rom_len` bytes (rounded up by the caller to
/// a chunk-friendly size). Z80/VDP/YM2612/PSG register windows are pushed by the caller via
/// `ChunkBacking::Dispatch`, since their handlers close over device state this map doesn't own.
pub fn build_main_cpu_map<Ctx>(rom: Vec<u8>) -> MemoryMap<Ctx> {
    let mut map = MemoryMap::new();

    let rom_len = rom.len() as u32;
    map.buffers.push(rom);
    map.buffers.push(vec![0; MAIN_RAM_LEN]);

    map.push_chunk(MemChunk {
        start: 0x000000,
        end: rom_len,
        mask: u32::MAX,
        shift: 0,
        flags: ChunkFlags::READ.union(ChunkFlags::READ_AS_CODE),
        backing: ChunkBacking::Buffer { buffer_index: ROM_BUFFER },
    });

    map.push_chunk(MemChunk {
        start: 0xFF0000,
        end: 0xFF0000 + MAIN_RAM_LEN as u32,
        mask: (MAIN_RAM_LEN - 1) as u32,
        shift: 0,
        flags: ChunkFlags::READ.union(ChunkFlags::WRITE).union(ChunkFlags::READ_AS_CODE).union(ChunkFlags::IS_CODE),
        backing: ChunkBacking::Buffer { buffer_index: MAIN_RAM_BUFFER },
    });

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_and_ram_chunks_are_both_reachable() {
        let map = build_main_cpu_map::<()>(vec![0xAA; 1024]);
        assert!(map.get_native_pointer(0).is_some());
        assert!(map.get_native_pointer(0xFF0000).is_some());
    }
}
