use crate::registers::Z80Registers;
use recompiler_core::cpucontext::CpuContext;

pub type Z80Context = CpuContext<Z80Registers>;

/// Acknowledges a maskable interrupt in IM1 (the only mode the Genesis ever drives the Z80 in):
/// disables further interrupts until the handler re-enables them and jumps to the fixed vector.
pub fn acknowledge_im1_interrupt(ctx: &mut Z80Context) {
    ctx.regs.iff1 = false;
    ctx.regs.iff2 = false;
    ctx.regs.halted = false;
    ctx.regs.pc = 0x0038;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acknowledging_interrupt_disables_further_interrupts_and_jumps_to_vector() {
        let mut ctx = Z80Context::new(0);
        ctx.regs.iff1 = true;
        ctx.regs.iff2 = true;
        ctx.regs.halted = true;
        ctx.regs.pc = 0x1234;

        acknowledge_im1_interrupt(&mut ctx);

        assert!(!ctx.regs.iff1);
        assert!(!ctx.regs.halted);
        assert_eq!(ctx.regs.pc, 0x0038);
    }
}
