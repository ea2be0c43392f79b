//! Generic state shared by every recompiled CPU core, parameterized over the architecture's own
//! register file.

use bincode::{Decode, Encode};

/// Number of indexed pointer slots available to `PtrIdx` memory chunks.
pub const MEM_POINTER_SLOTS: usize = 16;

/// Code-granularity unit size backing `ram_code_flags`, in guest bytes. Matches the rounding used
/// by [`crate::memmap::MemoryMap::find_chunk`]'s `size_sum` accumulation.
pub const CODE_GRANULARITY: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Breakpoint {
    pub address: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum WatchKind {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Watchpoint {
    pub address: u32,
    pub kind: WatchKind,
}

/// Shared recompiler context: cycle accounting, scheduler deadlines, indexed memory pointers,
/// the self-modifying-code bitmap, and debug tables. `Regs` is the architecture-specific register
/// file (e.g. 68000 data/address registers, Z80 general-purpose registers).
#[derive(Debug, Clone, Encode, Decode)]
pub struct CpuContext<Regs> {
    pub regs: Regs,

    /// Master clock ticks elapsed, not instructions.
    pub cycles: u64,
    /// Scheduler deadline: the recompiled code exits back to the scheduler once `cycles` reaches
    /// this value.
    pub target_cycle: u64,
    /// Cycle at which the CPU last synced with the rest of the system.
    pub sync_cycle: u64,
    /// Earliest cycle at which a pending interrupt becomes visible; `min` of every device's next
    /// scheduled interrupt.
    pub int_cycle: u64,

    pub mem_pointers: [u32; MEM_POINTER_SLOTS],

    /// One bit per [`CODE_GRANULARITY`]-byte unit of writable code-backed memory. A set bit means
    /// a write to that unit must invalidate translated code covering it.
    ram_code_flags: Vec<u64>,

    pub breakpoints: Vec<Breakpoint>,
    pub watchpoints: Vec<Watchpoint>,

    /// Set by [`CpuContext::request_exit`]; the next emitted cycle check exits the running
    /// translation back to the scheduler instead of continuing.
    pub should_return: bool,
}

impl<Regs: Default> CpuContext<Regs> {
    #[must_use]
    pub fn new(ram_code_units: u32) -> Self {
        let words = ram_code_units.div_ceil(64).max(1) as usize;
        Self {
            regs: Regs::default(),
            cycles: 0,
            target_cycle: 0,
            sync_cycle: 0,
            int_cycle: u64::MAX,
            mem_pointers: [0; MEM_POINTER_SLOTS],
            ram_code_flags: vec![0; words],
            breakpoints: Vec::new(),
            watchpoints: Vec::new(),
            should_return: false,
        }
    }
}

impl<Regs> CpuContext<Regs> {
    fn code_unit(addr: u32) -> (usize, u32) {
        let unit = addr / CODE_GRANULARITY;
        ((unit / 64) as usize, unit % 64)
    }

    pub fn mark_code_unit(&mut self, addr: u32) {
        let (word, bit) = Self::code_unit(addr);
        if let Some(slot) = self.ram_code_flags.get_mut(word) {
            *slot |= 1 << bit;
        }
    }

    pub fn clear_code_unit(&mut self, addr: u32) {
        let (word, bit) = Self::code_unit(addr);
        if let Some(slot) = self.ram_code_flags.get_mut(word) {
            *slot &= !(1 << bit);
        }
    }

    #[must_use]
    pub fn is_code_unit(&self, addr: u32) -> bool {
        let (word, bit) = Self::code_unit(addr);
        self.ram_code_flags.get(word).is_some_and(|slot| slot & (1 << bit) != 0)
    }

    /// Sets [`Self::should_return`] and pulls `target_cycle` down to the current cycle, so the
    /// next cycle check emitted by the recompiler exits immediately.
    pub fn request_exit(&mut self) {
        self.should_return = true;
        self.target_cycle = self.cycles;
    }

    #[must_use]
    pub fn hit_breakpoint(&self, pc: u32) -> bool {
        self.breakpoints.iter().any(|bp| bp.enabled && bp.address == pc)
    }

    #[must_use]
    pub fn hit_watchpoint(&self, addr: u32, kind: WatchKind) -> bool {
        self.watchpoints.iter().any(|wp| {
            wp.address == addr
                && (wp.kind == kind
                    || wp.kind == WatchKind::ReadWrite
                    || kind == WatchKind::ReadWrite)
        })
    }

    /// Subtracts `deduction` from every cycle counter, saturating at 0. Called when the scheduler
    /// rebases all 32/64-bit tick counters to avoid overflow.
    pub fn rebase(&mut self, deduction: u64) {
        self.cycles = self.cycles.saturating_sub(deduction);
        self.target_cycle = self.target_cycle.saturating_sub(deduction);
        self.sync_cycle = self.sync_cycle.saturating_sub(deduction);
        if self.int_cycle != u64::MAX {
            self.int_cycle = self.int_cycle.saturating_sub(deduction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, Encode, Decode)]
    struct DummyRegs {
        pc: u32,
    }

    #[test]
    fn code_unit_round_trips_across_word_boundary() {
        let mut ctx = CpuContext::<DummyRegs>::new(4096);
        let addr = CODE_GRANULARITY * 70;
        assert!(!ctx.is_code_unit(addr));
        ctx.mark_code_unit(addr);
        assert!(ctx.is_code_unit(addr));
        ctx.clear_code_unit(addr);
        assert!(!ctx.is_code_unit(addr));
    }

    #[test]
    fn request_exit_pins_target_to_current_cycle() {
        let mut ctx = CpuContext::<DummyRegs>::new(64);
        ctx.cycles = 500;
        ctx.target_cycle = 10_000;
        ctx.request_exit();
        assert!(ctx.should_return);
        assert_eq!(ctx.target_cycle, 500);
    }

    #[test]
    fn rebase_saturates_instead_of_underflowing() {
        let mut ctx = CpuContext::<DummyRegs>::new(64);
        ctx.cycles = 100;
        ctx.rebase(1_000);
        assert_eq!(ctx.cycles, 0);
    }
}
