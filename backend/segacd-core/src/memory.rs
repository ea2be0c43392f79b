//! Sub-CPU address map: word RAM, PRG RAM, and the memory-mapped register windows for the CDC,
//! CDD, PCM chip and graphics ASIC, wired up the way [`recompiler_core::memmap`] expects.

pub const PRG_RAM_LEN: usize = 512 * 1024;
pub const WORD_RAM_LEN: usize = 256 * 1024;

use recompiler_core::memmap::{ChunkBacking, ChunkFlags, MemChunk, MemoryMap};

pub const PRG_RAM_BUFFER: usize = 0;
pub const WORD_RAM_BUFFER: usize = 1;

/// Builds the sub-CPU's 68000 address map: PRG RAM at `$000000`, word RAM at `$080000`. Register
/// windows for the CDC/CDD/PCM/graphics peripherals are left to the caller to push via
/// `ChunkBacking::Dispatch`, since their read/write functions close over device state this map
/// has no knowledge of.
pub fn build_sub_cpu_map<Ctx>() -> MemoryMap<Ctx> {
    let mut map = MemoryMap::new();

    map.buffers.push(vec![0; PRG_RAM_LEN]);
    map.buffers.push(vec![0; WORD_RAM_LEN]);

    map.push_chunk(MemChunk {
        start: 0x000000,
        end: PRG_RAM_LEN as u32,
        mask: (PRG_RAM_LEN - 1) as u32,
        shift: 0,
        flags: ChunkFlags::READ.union(ChunkFlags::WRITE).union(ChunkFlags::READ_AS_CODE),
        backing: ChunkBacking::Buffer { buffer_index: PRG_RAM_BUFFER },
    });

    map.push_chunk(MemChunk {
        start: 0x080000,
        end: 0x080000 + WORD_RAM_LEN as u32,
        mask: (WORD_RAM_LEN - 1) as u32,
        shift: 0,
        flags: ChunkFlags::READ.union(ChunkFlags::WRITE),
        backing: ChunkBacking::Buffer { buffer_index: WORD_RAM_BUFFER },
    });

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prg_ram_and_word_ram_chunks_do_not_overlap() {
        let map = build_sub_cpu_map::<()>();
        assert!(map.get_native_pointer(0).is_some());
        assert!(map.get_native_pointer(0x080000).is_some());
    }
}
