use crate::traits::BusInterface;
use recompiler_core::memmap::MemoryMap;

/// Adapts a [`MemoryMap`] into the slow-path [`BusInterface`] the interpreter fallback uses.
/// `Ctx` carries whatever state the map's dispatch chunks need (e.g. the VDP, I/O ports); this
/// type only owns the map itself plus a mutable borrow of that context for the duration of a call.
pub struct MemoryMapBus<'a, Ctx> {
    map: &'a mut MemoryMap<Ctx>,
    ctx: &'a mut Ctx,
    interrupt_level: u8,
}

impl<'a, Ctx> MemoryMapBus<'a, Ctx> {
    pub fn new(map: &'a mut MemoryMap<Ctx>, ctx: &'a mut Ctx, interrupt_level: u8) -> Self {
        Self { map, ctx, interrupt_level }
    }
}

impl<Ctx> BusInterface for MemoryMapBus<'_, Ctx> {
    fn read_byte(&mut self, address: u32) -> u8 {
        self.map.read_byte(self.ctx, address & Self::ADDRESS_MASK)
    }

    fn read_word(&mut self, address: u32) -> u16 {
        self.map.read_word(self.ctx, address & Self::ADDRESS_MASK)
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        self.map.write_byte(self.ctx, address & Self::ADDRESS_MASK, value);
    }

    fn write_word(&mut self, address: u32, value: u16) {
        self.map.write_word(self.ctx, address & Self::ADDRESS_MASK, value);
    }

    fn interrupt_level(&self) -> u8 {
        self.interrupt_level
    }

    fn acknowledge_interrupt(&mut self, _interrupt_level: u8) {}

    fn halt(&self) -> bool {
        false
    }

    fn reset(&self) -> bool {
        false
    }
}
