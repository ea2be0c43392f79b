//! Backend-agnostic translation surface.
//!
//! Real host code emission (x86-64 bytes, register allocation, calling convention glue) is a
//! property of a specific recompiler backend and is not implemented here. [`CodeEmitter`] defines
//! the shape every backend must provide; [`InterpreterEmitter`] is the reference implementation
//! used when no native backend is available, translating every guest instruction into a single
//! call back into the architecture's interpreter.

use crate::codemap::NativeCodeMap;
use crate::deferred::DeferredPatcher;
use crate::memmap::MemoryMap;

/// Emits one guest instruction's worth of translated host code.
///
/// A backend receives the guest address, is expected to emit whatever is needed to execute that
/// instruction's effect and to perform the cycle-check/self-modifying-code/retranslation
/// bookkeeping the recompiler design calls for, and returns how many guest bytes it consumed.
pub trait CodeEmitter<Ctx> {
    /// Emits translated code for the instruction at `guest_pc`, appending host bytes to `code`.
    /// Returns the number of guest bytes the instruction occupies.
    fn emit_instruction(&mut self, ctx: &mut Ctx, memory: &MemoryMap<Ctx>, guest_pc: u32, code: &mut Vec<u8>) -> u32;

    /// True if `guest_pc` ends a translation block (unconditional branch, return, or a guest
    /// instruction count/byte budget reached).
    fn ends_block(&self, guest_pc: u32) -> bool;
}

/// Decodes and dispatches exactly one guest instruction via `step`, recording no host code at
/// all; `code` entries are 1:1 placeholders so [`NativeCodeMap`] offsets stay meaningful even
/// though there is nothing to jump into. Used as the fallback path when interpreting is cheaper
/// than translating, or while a real backend is still absent.
pub struct InterpreterEmitter<F> {
    /// Executes one guest instruction at the given PC and returns its length in guest bytes.
    pub step: F,
}

impl<Ctx, F: FnMut(&mut Ctx, u32) -> u32> CodeEmitter<Ctx> for InterpreterEmitter<F> {
    fn emit_instruction(&mut self, ctx: &mut Ctx, _memory: &MemoryMap<Ctx>, guest_pc: u32, code: &mut Vec<u8>) -> u32 {
        let len = (self.step)(ctx, guest_pc);
        code.push(0); // placeholder entry so the code map has a non-empty arena slot to point at
        len.max(1)
    }

    fn ends_block(&self, _guest_pc: u32) -> bool {
        true
    }
}

/// Drives a [`CodeEmitter`] over a translation block, wiring up [`NativeCodeMap`] registration and
/// [`DeferredPatcher`] resolution as each guest address becomes translated.
pub struct Recompiler<Ctx, E> {
    emitter: E,
    code_map: NativeCodeMap,
    deferred: DeferredPatcher,
    arena: Vec<u8>,
    _ctx: std::marker::PhantomData<fn(&mut Ctx)>,
}

impl<Ctx, E: CodeEmitter<Ctx>> Recompiler<Ctx, E> {
    pub fn new(emitter: E) -> Self {
        Self {
            emitter,
            code_map: NativeCodeMap::new(),
            deferred: DeferredPatcher::new(),
            arena: Vec::new(),
            _ctx: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn code_map(&self) -> &NativeCodeMap {
        &self.code_map
    }

    /// Requests a branch to `target_pc` be resolved from `patch_site` (an offset into the host
    /// code arena holding a 4-byte placeholder). If `target_pc` is already translated, the patch
    /// is resolved immediately; otherwise it is deferred until `translate_block` reaches it.
    pub fn request_branch_patch(&mut self, target_pc: u32, patch_site: u32) {
        match self.code_map.lookup(target_pc) {
            Some(native) => self.deferred.resolve(target_pc, native, &mut self.arena),
            None => self.deferred.defer(target_pc, patch_site),
        }
    }

    /// Translates guest instructions starting at `start_pc` until the emitter reports the block
    /// has ended, registering each instruction's entry point and resolving any deferred branches
    /// that were waiting on it.
    pub fn translate_block(&mut self, ctx: &mut Ctx, memory: &MemoryMap<Ctx>, start_pc: u32) -> u32 {
        let mut pc = start_pc;
        loop {
            let host_offset = self.arena.len() as u32;
            let consumed = self.emitter.emit_instruction(ctx, memory, pc, &mut self.arena);

            self.code_map.register(pc, host_offset, consumed.saturating_sub(1));
            self.deferred.resolve(pc, host_offset, &mut self.arena);

            if self.emitter.ends_block(pc) {
                break;
            }
            pc += consumed;
        }
        pc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memmap::MemoryMap;

    #[test]
    fn translating_resolves_pending_branch_to_block_start() {
        let memory = MemoryMap::<()>::new();
        let mut recompiler = Recompiler::new(InterpreterEmitter { step: |_ctx: &mut (), _pc: u32| 2 });

        // Simulate 8 bytes of already-translated code preceding the block under test, with a
        // 4-byte placeholder displacement living at offset 0 inside it.
        recompiler.arena.extend_from_slice(&[0xAAu8; 8]);
        recompiler.request_branch_patch(0x400, 0);

        let mut ctx = ();
        recompiler.translate_block(&mut ctx, &memory, 0x400);

        assert_eq!(recompiler.code_map().lookup(0x400), Some(8));
        assert_eq!(&recompiler.arena[0..4], &4u32.to_le_bytes());
    }
}
