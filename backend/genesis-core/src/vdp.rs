//! Genesis VDP, reduced to the parts the scheduler actually depends on: a master-clock counter
//! and the vertical/horizontal interrupt schedule it publishes. Pixel rendering is out of scope
//! for this core — a full VDP owns its own frame buffer and tick loop layered on top of this
//! timing skeleton.

use bincode::{Decode, Encode};
use recompiler_core::scheduler::Device;

/// NTSC: 262 scanlines/frame, ~3420 VDP mclk ticks/scanline (VDP clock = master clock / 1 in this
/// accounting; callers scale as needed against the 68000's own divider).
const SCANLINES_PER_FRAME: u16 = 262;
const MCLK_PER_SCANLINE: u64 = 3420;
const VBLANK_START_SCANLINE: u16 = 224;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Vdp {
    cycle: u64,
    scanline: u16,
    next_hint_cycle: u64,
    next_vint_cycle: u64,
    hint_interrupt_enabled: bool,
    vint_pending: bool,
    hint_pending: bool,
}

impl Vdp {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycle: 0,
            scanline: 0,
            next_hint_cycle: MCLK_PER_SCANLINE,
            next_vint_cycle: u64::from(VBLANK_START_SCANLINE) * MCLK_PER_SCANLINE,
            hint_interrupt_enabled: false,
            vint_pending: false,
            hint_pending: false,
        }
    }

    pub fn set_hint_interrupt_enabled(&mut self, enabled: bool) {
        self.hint_interrupt_enabled = enabled;
    }

    pub fn vint_pending(&self) -> bool {
        self.vint_pending
    }

    pub fn hint_pending(&self) -> bool {
        self.hint_pending
    }

    pub fn acknowledge_vint(&mut self) {
        self.vint_pending = false;
    }

    pub fn acknowledge_hint(&mut self) {
        self.hint_pending = false;
    }

    /// The earliest cycle at which any pending VDP interrupt becomes relevant; the scheduler
    /// feeds this into the CPU's `int_cycle`.
    #[must_use]
    pub fn next_int_cycle(&self) -> u64 {
        if self.hint_interrupt_enabled {
            self.next_hint_cycle.min(self.next_vint_cycle)
        } else {
            self.next_vint_cycle
        }
    }

    fn advance_scanline(&mut self) {
        self.scanline = (self.scanline + 1) % SCANLINES_PER_FRAME;
        self.next_hint_cycle += MCLK_PER_SCANLINE;

        if self.scanline == VBLANK_START_SCANLINE {
            self.vint_pending = true;
            self.next_vint_cycle += u64::from(SCANLINES_PER_FRAME) * MCLK_PER_SCANLINE;
        }

        if self.hint_interrupt_enabled {
            self.hint_pending = true;
        }
    }
}

impl Default for Vdp {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for Vdp {
    fn cycle(&self) -> u64 {
        self.cycle
    }

    fn run_until(&mut self, target: u64) -> u64 {
        while self.cycle < target {
            self.cycle += 1;
            if self.cycle >= self.next_hint_cycle {
                self.advance_scanline();
            }
        }
        self.cycle
    }

    fn rebase(&mut self, deduction: u64) {
        self.cycle = self.cycle.saturating_sub(deduction);
        self.next_hint_cycle = self.next_hint_cycle.saturating_sub(deduction);
        self.next_vint_cycle = self.next_vint_cycle.saturating_sub(deduction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vint_fires_once_per_frame_at_vblank_scanline() {
        let mut vdp = Vdp::new();
        vdp.run_until(u64::from(VBLANK_START_SCANLINE) * MCLK_PER_SCANLINE + 1);
        assert!(vdp.vint_pending());
    }

    #[test]
    fn hint_never_fires_while_disabled() {
        let mut vdp = Vdp::new();
        vdp.run_until(MCLK_PER_SCANLINE * 10);
        assert!(!vdp.hint_pending());
    }
}
