//! Z80 register file and interrupt-acknowledge sequencing on top of [`recompiler_core::cpucontext`].

pub mod context;
pub mod registers;
pub mod traits;

pub use context::Z80Context;
pub use registers::Z80Registers;
pub use traits::BusInterface;
