//! Guest address space → host realisation.
//!
//! A [`MemoryMap`] is an ordered, non-overlapping list of [`MemChunk`]s. Each chunk says how a
//! range of guest addresses is backed: a direct buffer, an indirect pointer slot resolved through
//! the owning CPU context (for bank-switched overlays), or a pair of dispatch callbacks for
//! memory-mapped I/O. The recompiler's generated code and the interpreter fallback both bottom out
//! here.

use bincode::{Decode, Encode};

/// Generates a minimal bitflags-shaped type without pulling in the `bitflags` crate: this core
/// only ever needs containment/union/intersection, not the full derive surface.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
        pub struct $name($repr);

        impl $name {
            $(pub const $variant: Self = Self($value);)*
            pub const EMPTY: Self = Self(0);

            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }
    };
}

bitflags_like! {
    /// Capability/aliasing flags for a [`MemChunk`].
    pub struct ChunkFlags: u16 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_AS_CODE = 1 << 2;
        const IS_CODE = 1 << 3;
        const PTR_IDX = 1 << 4;
        const AUX_BUFFER = 1 << 5;
        const ONLY_ODD = 1 << 6;
        const ONLY_EVEN = 1 << 7;
        const BYTE_SWAP = 1 << 8;
        const FUNC_NULL = 1 << 9;
    }
}

/// Dispatch callback signature for memory-mapped I/O chunks. `ctx` is an opaque device-context
/// index resolved by the caller; the map itself never touches device state directly.
pub type ReadFn<Ctx> = fn(ctx: &mut Ctx, addr: u32) -> u16;
pub type WriteFn<Ctx> = fn(ctx: &mut Ctx, addr: u32, value: u16);

#[derive(Clone, Copy)]
pub enum ChunkBacking<Ctx> {
    /// A direct guest buffer, addressed as an index into `buffers[buffer_index]`.
    Buffer { buffer_index: usize },
    /// An indirect pointer slot resolved through the CPU context's `mem_pointers` table.
    PtrIndex { slot: usize },
    /// Dispatch callbacks for memory-mapped I/O.
    Dispatch { read: ReadFn<Ctx>, write: WriteFn<Ctx> },
}

pub struct MemChunk<Ctx> {
    pub start: u32,
    pub end: u32,
    pub mask: u32,
    /// Positive = left-shift the intra-chunk offset; negative = right-shift. Used for sub-byte /
    /// mirrored buses.
    pub shift: i8,
    pub flags: ChunkFlags,
    pub backing: ChunkBacking<Ctx>,
}

impl<Ctx> MemChunk<Ctx> {
    #[must_use]
    pub fn contains(&self, addr: u32) -> bool {
        (self.start..self.end).contains(&addr)
    }

    fn offset(&self, addr: u32) -> u32 {
        let local = (addr - self.start) & self.mask;
        if self.shift >= 0 { local << self.shift } else { local >> (-self.shift) }
    }
}

/// The result of specializing an interpreter read/write window to a single chunk, per §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specialization {
    /// The chunk is a plain backing buffer; the data pointer can be read/written directly.
    Direct,
    /// The chunk is resolved through an indirect pointer slot.
    Indexed,
    /// The window falls entirely within a byte-swapped, fully-masked chunk.
    Fixed,
    /// No single-chunk fast path applies; fall back to the general map walk.
    Map,
    /// The window is entirely outside any readable/writable chunk.
    Ignored,
}

pub struct MemoryMap<Ctx> {
    chunks: Vec<MemChunk<Ctx>>,
    pub buffers: Vec<Vec<u8>>,
}

impl<Ctx> MemoryMap<Ctx> {
    #[must_use]
    pub fn new() -> Self {
        Self { chunks: Vec::new(), buffers: Vec::new() }
    }

    /// Append a chunk. Chunks must be pushed in ascending, non-overlapping `start` order; this is
    /// an invariant of the map, not something enforced at runtime (the recompiler builds the map
    /// once at startup from a fixed table).
    pub fn push_chunk(&mut self, chunk: MemChunk<Ctx>) {
        self.chunks.push(chunk);
    }

    /// Linear scan for the first chunk containing `addr` whose flags intersect `flags_mask`
    /// (or any chunk at all, if `flags_mask` is empty). When `size_sum` is `Some`, every chunk
    /// matching `flags_mask` anywhere in the map has its rounded size accumulated into it,
    /// regardless of whether it is the chunk returned — this is how `ram_code_flags` bitmap
    /// layout is sized.
    pub fn find_chunk(
        &self,
        addr: u32,
        flags_mask: ChunkFlags,
        mut size_sum: Option<&mut u32>,
    ) -> Option<&MemChunk<Ctx>> {
        let mut found = None;
        for chunk in &self.chunks {
            let matches_mask = flags_mask == ChunkFlags::EMPTY || chunk.flags.intersects(flags_mask);

            if matches_mask {
                if let Some(sum) = size_sum.as_deref_mut() {
                    *sum += round_up_code_granularity(chunk.end - chunk.start);
                }
            }

            if found.is_none() && chunk.contains(addr) && matches_mask {
                found = Some(chunk);
            }
        }
        found
    }

    /// A direct host pointer into guest RAM/ROM, if the chunk backing `addr` is a readable direct
    /// buffer. Never returns a pointer into dispatch-backed or pointer-indexed chunks.
    #[must_use]
    pub fn get_native_pointer(&self, addr: u32) -> Option<&[u8]> {
        let chunk = self.find_chunk(addr, ChunkFlags::READ, None)?;
        let ChunkBacking::Buffer { buffer_index } = chunk.backing else { return None };
        let offset = chunk.offset(addr) as usize;
        self.buffers.get(buffer_index).map(|buf| &buf[offset..])
    }

    pub fn read_byte(&mut self, ctx: &mut Ctx, addr: u32) -> u8 {
        let Some(chunk) = self.find_chunk(addr, ChunkFlags::READ, None) else { return 0xFF };

        if chunk.flags.contains(ChunkFlags::ONLY_EVEN) && addr & 1 != 0 {
            return 0xFF;
        }
        if chunk.flags.contains(ChunkFlags::ONLY_ODD) && addr & 1 == 0 {
            return 0xFF;
        }

        let mut offset = chunk.offset(addr) as usize;
        if chunk.flags.contains(ChunkFlags::BYTE_SWAP) {
            offset ^= 1;
        }

        match chunk.backing {
            ChunkBacking::Buffer { buffer_index } => {
                self.buffers.get(buffer_index).and_then(|buf| buf.get(offset)).copied().unwrap_or(0xFF)
            }
            ChunkBacking::PtrIndex { .. } => 0xFF,
            ChunkBacking::Dispatch { read, .. } => {
                let word = read(ctx, addr & !1);
                if addr & 1 == 0 { (word >> 8) as u8 } else { word as u8 }
            }
        }
    }

    pub fn write_byte(&mut self, ctx: &mut Ctx, addr: u32, value: u8) {
        let Some(chunk_index) = self.chunk_index_containing(addr, ChunkFlags::WRITE) else { return };
        let chunk = &self.chunks[chunk_index];

        if chunk.flags.contains(ChunkFlags::ONLY_EVEN) && addr & 1 != 0 {
            return;
        }
        if chunk.flags.contains(ChunkFlags::ONLY_ODD) && addr & 1 == 0 {
            return;
        }

        let mut offset = chunk.offset(addr) as usize;
        if chunk.flags.contains(ChunkFlags::BYTE_SWAP) {
            offset ^= 1;
        }

        match chunk.backing {
            ChunkBacking::Buffer { buffer_index } => {
                if let Some(buf) = self.buffers.get_mut(buffer_index) {
                    if let Some(slot) = buf.get_mut(offset) {
                        *slot = value;
                    }
                }
            }
            ChunkBacking::PtrIndex { .. } => {}
            ChunkBacking::Dispatch { write, .. } => {
                let existing = self.read_word_raw(ctx, addr & !1);
                let word = if addr & 1 == 0 {
                    (u16::from(value) << 8) | (existing & 0xFF)
                } else {
                    (existing & 0xFF00) | u16::from(value)
                };
                write(ctx, addr & !1, word);
            }
        }
    }

    pub fn read_word(&mut self, ctx: &mut Ctx, addr: u32) -> u16 {
        let Some(chunk) = self.find_chunk(addr, ChunkFlags::READ, None) else { return 0xFFFF };

        if chunk.flags.contains(ChunkFlags::ONLY_EVEN) {
            return (u16::from(self.read_byte_chunk(chunk, addr)) << 8) | 0x00FF;
        }
        if chunk.flags.contains(ChunkFlags::ONLY_ODD) {
            return 0xFF00 | u16::from(self.read_byte_chunk(chunk, addr));
        }

        match chunk.backing {
            ChunkBacking::Buffer { buffer_index } => {
                let offset = chunk.offset(addr) as usize;
                self.buffers
                    .get(buffer_index)
                    .and_then(|buf| buf.get(offset..offset + 2))
                    .map_or(0xFFFF, |bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
            }
            ChunkBacking::PtrIndex { .. } => 0xFFFF,
            ChunkBacking::Dispatch { read, .. } => read(ctx, addr),
        }
    }

    pub fn write_word(&mut self, ctx: &mut Ctx, addr: u32, value: u16) {
        let Some(chunk_index) = self.chunk_index_containing(addr, ChunkFlags::WRITE) else { return };
        let chunk = &self.chunks[chunk_index];

        if chunk.flags.contains(ChunkFlags::ONLY_EVEN) {
            self.write_byte(ctx, addr, (value >> 8) as u8);
            return;
        }
        if chunk.flags.contains(ChunkFlags::ONLY_ODD) {
            self.write_byte(ctx, addr | 1, value as u8);
            return;
        }

        match chunk.backing {
            ChunkBacking::Buffer { buffer_index } => {
                let offset = chunk.offset(addr) as usize;
                if let Some(buf) = self.buffers.get_mut(buffer_index) {
                    if offset + 2 <= buf.len() {
                        buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
                    }
                }
            }
            ChunkBacking::PtrIndex { .. } => {}
            ChunkBacking::Dispatch { write, .. } => write(ctx, addr, value),
        }
    }

    fn read_word_raw(&mut self, ctx: &mut Ctx, addr: u32) -> u16 {
        self.read_word(ctx, addr)
    }

    fn read_byte_chunk(&self, chunk: &MemChunk<Ctx>, addr: u32) -> u8 {
        let offset = chunk.offset(addr) as usize;
        match chunk.backing {
            ChunkBacking::Buffer { buffer_index } => {
                self.buffers.get(buffer_index).and_then(|buf| buf.get(offset)).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn chunk_index_containing(&self, addr: u32, flags_mask: ChunkFlags) -> Option<usize> {
        self.chunks.iter().position(|chunk| chunk.contains(addr) && chunk.flags.intersects(flags_mask))
    }

    /// §4.1: returns the fast-path variant an interpreter can use for repeated reads/writes in
    /// `[start, end)`, or `Specialization::Map` if no single chunk covers the whole window safely.
    #[must_use]
    pub fn specialize_interp_read(&self, start: u32, end: u32) -> Specialization {
        let Some(chunk) = self.chunks.iter().find(|chunk| chunk.contains(start)) else {
            return Specialization::Ignored;
        };

        if !chunk.contains(end.saturating_sub(1)) {
            return Specialization::Map;
        }
        if !chunk.flags.contains(ChunkFlags::READ) {
            return Specialization::Ignored;
        }
        if chunk.flags.contains(ChunkFlags::FUNC_NULL) {
            return Specialization::Map;
        }
        if chunk.shift != 0
            || chunk.flags.intersects(ChunkFlags::ONLY_ODD | ChunkFlags::ONLY_EVEN)
        {
            return Specialization::Map;
        }

        match chunk.backing {
            ChunkBacking::Buffer { .. } => {
                if chunk.flags.contains(ChunkFlags::BYTE_SWAP) && chunk.mask & 0xFFFF == 0xFFFF {
                    Specialization::Fixed
                } else {
                    Specialization::Direct
                }
            }
            ChunkBacking::PtrIndex { .. } => Specialization::Indexed,
            ChunkBacking::Dispatch { .. } => Specialization::Map,
        }
    }
}

impl<Ctx> Default for MemoryMap<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

fn round_up_code_granularity(size: u32) -> u32 {
    const RAM_FLAGS_SHIFT: u32 = 3;
    let granularity = 1_u32 << (RAM_FLAGS_SHIFT + 3);
    size.div_ceil(granularity) * granularity
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCtx;

    #[test]
    fn shifted_even_only_chunk_resolves_offset() {
        let mut map: MemoryMap<NoCtx> = MemoryMap::new();
        map.buffers.push(vec![0_u8; 0x80]);
        map.buffers[0][0x10] = 0xAB;

        map.push_chunk(MemChunk {
            start: 0,
            end: 0x100,
            mask: 0xFF,
            shift: -1,
            flags: ChunkFlags::READ.union(ChunkFlags::ONLY_EVEN),
            backing: ChunkBacking::Buffer { buffer_index: 0 },
        });

        let mut ctx = NoCtx;
        // addr 0x20: local = 0x20 & 0xFF = 0x20, shift right 1 -> 0x10.
        let value = map.read_byte(&mut ctx, 0x20);
        assert_eq!(value, 0xAB);
    }

    #[test]
    fn find_chunk_accumulates_size_sum() {
        let mut map: MemoryMap<NoCtx> = MemoryMap::new();
        map.buffers.push(vec![0_u8; 0x10000]);
        map.push_chunk(MemChunk {
            start: 0,
            end: 0x10000,
            mask: 0xFFFF,
            shift: 0,
            flags: ChunkFlags::READ.union(ChunkFlags::IS_CODE),
            backing: ChunkBacking::Buffer { buffer_index: 0 },
        });

        let mut sum = 0;
        map.find_chunk(0, ChunkFlags::IS_CODE, Some(&mut sum));
        assert_eq!(sum, 0x10000);
    }
}
