//! Guest PC → translated host code address.
//!
//! The guest address space is divided into fixed-size chunks; each chunk owns a `base` offset
//! into an arena of translated host code plus one signed 32-bit offset per guest byte in that
//! chunk. [`INVALID_OFFSET`] marks a byte that has not been translated; [`EXTENSION_WORD`] marks
//! the second byte of a multi-byte instruction whose real entry point is the previous address.

use bincode::{Decode, Encode};
use std::collections::HashMap;

pub const CHUNK_SIZE: u32 = 256;

pub const INVALID_OFFSET: i32 = -1;
pub const EXTENSION_WORD: i32 = -2;

#[derive(Debug, Clone, Encode, Decode)]
struct CodeChunk {
    base: u32,
    offsets: Box<[i32; CHUNK_SIZE as usize]>,
}

impl CodeChunk {
    fn new(base: u32) -> Self {
        Self { base, offsets: Box::new([INVALID_OFFSET; CHUNK_SIZE as usize]) }
    }
}

/// Maps translated guest addresses to offsets into an owned host-code arena. Arena-indexed rather
/// than pointer-based so the map stays plain, movable, and `Send`.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct NativeCodeMap {
    chunks: HashMap<u32, CodeChunk>,
    /// Owned host translation bytes. Real code emission is the recompiler backend's job; this
    /// arena only needs to track allocation extents for the code map's own bookkeeping.
    arena_len: u32,
}

impl NativeCodeMap {
    #[must_use]
    pub fn new() -> Self {
        Self { chunks: HashMap::new(), arena_len: 0 }
    }

    fn chunk_key(addr: u32) -> u32 {
        addr / CHUNK_SIZE
    }

    #[must_use]
    pub fn lookup(&self, guest_addr: u32) -> Option<u32> {
        let chunk = self.chunks.get(&Self::chunk_key(guest_addr))?;
        let offset = chunk.offsets[(guest_addr % CHUNK_SIZE) as usize];
        (offset != INVALID_OFFSET && offset != EXTENSION_WORD).then(|| chunk.base.wrapping_add(offset as u32))
    }

    /// Record that `guest_addr` translates to arena offset `host_offset`, and that the following
    /// `extension_bytes` addresses are continuations of the same instruction.
    pub fn register(&mut self, guest_addr: u32, host_offset: u32, extension_bytes: u32) {
        let key = Self::chunk_key(guest_addr);
        let chunk = self.chunks.entry(key).or_insert_with(|| CodeChunk::new(host_offset.saturating_sub(host_offset % CHUNK_SIZE)));

        let relative = host_offset.wrapping_sub(chunk.base) as i32;
        chunk.offsets[(guest_addr % CHUNK_SIZE) as usize] = relative;

        for i in 1..=extension_bytes {
            let ext_addr = guest_addr + i;
            let ext_key = Self::chunk_key(ext_addr);
            if ext_key == key {
                chunk.offsets[(ext_addr % CHUNK_SIZE) as usize] = EXTENSION_WORD;
            }
        }

        self.arena_len = self.arena_len.max(host_offset + 1);
    }

    /// Invalidate every translation covering `[start, end)`, e.g. because the guest wrote to a
    /// code region. Addresses map back to [`INVALID_OFFSET`].
    pub fn invalidate_range(&mut self, start: u32, end: u32) {
        let mut addr = start;
        while addr < end {
            if let Some(chunk) = self.chunks.get_mut(&Self::chunk_key(addr)) {
                chunk.offsets[(addr % CHUNK_SIZE) as usize] = INVALID_OFFSET;
            }
            addr += 1;
        }
    }

    pub fn invalidate_all(&mut self) {
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_round_trips() {
        let mut map = NativeCodeMap::new();
        map.register(0x1000, 0x4000, 0);
        assert_eq!(map.lookup(0x1000), Some(0x4000));
        assert_eq!(map.lookup(0x1001), None);
    }

    #[test]
    fn invalidate_clears_lookup() {
        let mut map = NativeCodeMap::new();
        map.register(0x1000, 0x4000, 2);
        assert!(map.lookup(0x1000).is_some());

        map.invalidate_range(0x1000, 0x1001);
        assert_eq!(map.lookup(0x1000), None);
    }
}
