//! Master System / Game Gear / ColecoVision variant: the simplest consumer of the shared
//! recompiler-core memory map, scheduler, and Z80 CPU context. Unlike the Genesis backend, this
//! variant has a single CPU and a single audio chip, so its [`recompiler_core::scheduler::Device`]
//! wiring is a minimal example of the catch-up model rather than a full console implementation —
//! VDP pixel output and cartridge mapper behavior are out of scope here (see the Genesis backend
//! for the fully wired multi-device case).

pub mod psg;

use bincode::{Decode, Encode};
use psg::{Psg, PsgTickEffect};
use recompiler_core::cpucontext::CpuContext;
use recompiler_core::scheduler::Device;
use z80_emu::Z80Registers;

/// Z80 master clock runs the PSG through a fixed divider; `PSG_DIVIDER` inside [`psg::Psg`]
/// already accounts for the chip's own internal divide, so one [`Device::run_until`] step here
/// corresponds to one Z80 cycle.
#[derive(Debug, Clone, Encode, Decode)]
pub struct SmsGgSystem {
    pub z80: CpuContext<Z80Registers>,
    pub psg: Psg,
    psg_cycle: u64,
}

impl SmsGgSystem {
    #[must_use]
    pub fn new(version: psg::PsgVersion) -> Self {
        Self { z80: CpuContext::new(0), psg: Psg::new(version), psg_cycle: 0 }
    }
}

impl Device for SmsGgSystem {
    fn cycle(&self) -> u64 {
        self.psg_cycle
    }

    fn run_until(&mut self, target: u64) -> u64 {
        while self.psg_cycle < target {
            if let PsgTickEffect::Clocked = self.psg.tick() {
                log::trace!("PSG clocked at cycle {}", self.psg_cycle);
            }
            self.psg_cycle += 1;
        }
        self.psg_cycle
    }

    fn rebase(&mut self, deduction: u64) {
        self.psg_cycle = self.psg_cycle.saturating_sub(deduction);
        self.z80.rebase(deduction);
    }

    fn request_exit(&mut self) {
        self.z80.request_exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_until_advances_psg_cycle_to_target() {
        let mut system = SmsGgSystem::new(psg::PsgVersion::Standard);
        let reached = system.run_until(1000);
        assert_eq!(reached, 1000);
        assert_eq!(system.cycle(), 1000);
    }
}
