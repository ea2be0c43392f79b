use crate::registers::M68kRegisters;
use bincode::{Decode, Encode};
use recompiler_core::cpucontext::CpuContext;

/// Supervisor-mode reset vectors live at the very start of the address space: the initial SSP at
/// address 0, the initial PC at address 4.
const RESET_SSP_ADDRESS: u32 = 0x0000_0000;
const RESET_PC_ADDRESS: u32 = 0x0000_0004;

pub type M68kContext = CpuContext<M68kRegisters>;

/// Reads the two reset vectors out of cartridge ROM (via any 32-bit-long-word-capable reader
/// closure) and seeds supervisor mode, SSP, and PC the way real 68000 hardware does on reset.
pub fn load_reset_vectors<F: FnMut(u32) -> u32>(ctx: &mut M68kContext, mut read_long_word: F) {
    ctx.regs.supervisor_mode = true;
    ctx.regs.ssp = read_long_word(RESET_SSP_ADDRESS);
    ctx.regs.pc = read_long_word(RESET_PC_ADDRESS);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct InterruptRequest {
    pub level: u8,
}

/// Raises `int_cycle` to reflect the earliest cycle at which an interrupt of `level` can actually
/// preempt the running translation: immediately, unless the CPU's interrupt priority mask already
/// blocks it, in which case it stays pending past this cycle check.
pub fn request_interrupt(ctx: &mut M68kContext, level: u8, at_cycle: u64) {
    if level > ctx.regs.interrupt_priority_mask {
        ctx.int_cycle = ctx.int_cycle.min(at_cycle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_reset_vectors_sets_supervisor_and_pc() {
        let mut ctx = M68kContext::new(0);
        load_reset_vectors(&mut ctx, |addr| if addr == RESET_SSP_ADDRESS { 0x00FF_0000 } else { 0x0000_0200 });
        assert!(ctx.regs.supervisor_mode);
        assert_eq!(ctx.regs.ssp, 0x00FF_0000);
        assert_eq!(ctx.regs.pc, 0x0000_0200);
    }

    #[test]
    fn request_interrupt_below_mask_lowers_int_cycle() {
        let mut ctx = M68kContext::new(0);
        ctx.regs.interrupt_priority_mask = 2;
        ctx.int_cycle = 1_000;

        request_interrupt(&mut ctx, 1, 50);
        assert_eq!(ctx.int_cycle, 1_000);

        request_interrupt(&mut ctx, 4, 50);
        assert_eq!(ctx.int_cycle, 50);
    }
}
