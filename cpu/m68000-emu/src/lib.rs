//! Minimal 68000 register file, reset/interrupt sequencing, and a [`recompiler_core::memmap`]
//! backed bus. Instruction decoding and execution are the recompiler backend's job (see
//! `recompiler_core::emitter`); this crate only owns the architectural state the backend operates
//! on.

pub mod bus;
pub mod context;
pub mod registers;
pub mod traits;

pub use context::M68kContext;
pub use registers::M68kRegisters;
pub use traits::BusInterface;
