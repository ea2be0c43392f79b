//! Shared dynamic-recompiler infrastructure: the guest memory map, the native code map and
//! deferred-branch patcher, per-CPU context state, a backend-agnostic code emission surface, the
//! cross-device cycle scheduler, and the tagged save state format. Architecture-specific crates
//! (`m68000-emu`, `z80-emu`) and system backends build on top of these.

pub mod codemap;
pub mod cpucontext;
pub mod deferred;
pub mod emitter;
pub mod memmap;
pub mod savestate;
pub mod scheduler;
