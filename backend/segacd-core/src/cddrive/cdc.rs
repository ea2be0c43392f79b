//! Sanyo LC8951-style CD-ROM decoder & host interface chip (the CDC). Buffers whole sectors
//! pulled off the disc, validates their EDC checksum, and serves the result byte-by-byte (or via
//! DMA) to the sub-CPU / PCM chip / word RAM.

use bincode::{Decode, Encode};
use cdrom::{BYTES_PER_SECTOR, CdRomError};

const BUFFER_RAM_LEN: usize = 16 * 1024;
const BUFFER_RAM_ADDRESS_MASK: u16 = (1 << 14) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum DeviceDestination {
    None,
    MainCpuRegister,
    SubCpuRegister,
    PrgRam,
    WordRam,
    Pcm,
}

impl DeviceDestination {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0b010 => Self::MainCpuRegister,
            0b011 => Self::SubCpuRegister,
            0b100 => Self::Pcm,
            0b101 => Self::PrgRam,
            0b111 => Self::WordRam,
            _ => Self::None,
        }
    }

    fn is_dma(self) -> bool {
        matches!(self, Self::Pcm | Self::PrgRam | Self::WordRam)
    }
}

impl Default for DeviceDestination {
    fn default() -> Self {
        Self::None
    }
}

/// Real-time error correction and host interface processor. `buffer_ram` holds whatever sector
/// was most recently decoded; the register file controls where reads of it are steered.
#[derive(Debug, Clone, Encode, Decode)]
pub struct Rchip {
    buffer_ram: Box<[u8; BUFFER_RAM_LEN]>,
    device_destination: DeviceDestination,
    host_data_buffer: Option<u16>,
    register_address: u8,
    dma_address: u16,
    write_address: u16,
    block_ready: bool,
    data_ready: bool,
    end_of_data_transfer: bool,
    interrupt_enabled: bool,
    interrupt_pending: bool,
    header_data: [u8; 4],
    subheader_data: [u8; 4],
    last_checksum_valid: bool,
}

impl Rchip {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_ram: Box::new([0; BUFFER_RAM_LEN]),
            device_destination: DeviceDestination::None,
            host_data_buffer: None,
            register_address: 0,
            dma_address: 0,
            write_address: 0,
            block_ready: false,
            data_ready: false,
            end_of_data_transfer: false,
            interrupt_enabled: false,
            interrupt_pending: false,
            header_data: [0; 4],
            subheader_data: [0; 4],
            last_checksum_valid: true,
        }
    }

    pub fn register_address(&self) -> u8 {
        self.register_address
    }

    pub fn set_register_address(&mut self, value: u8) {
        self.register_address = value & 0x1F;
    }

    pub fn set_device_destination(&mut self, bits: u8) {
        self.device_destination = DeviceDestination::from_bits(bits);
    }

    pub fn dma_address(&self) -> u16 {
        self.dma_address
    }

    pub fn set_dma_address(&mut self, dma_address: u16) {
        self.dma_address = dma_address & BUFFER_RAM_ADDRESS_MASK;
    }

    pub fn data_ready(&self) -> bool {
        self.data_ready
    }

    pub fn end_of_data_transfer(&self) -> bool {
        self.end_of_data_transfer
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt_pending && self.interrupt_enabled
    }

    pub fn acknowledge_interrupt(&mut self) {
        self.interrupt_pending = false;
    }

    pub fn set_interrupt_enabled(&mut self, enabled: bool) {
        self.interrupt_enabled = enabled;
    }

    /// Reads the next byte from buffer RAM at `dma_address`, advancing it. Used by the sub-CPU
    /// host data register and by word-RAM/PRG-RAM/PCM DMA consumers alike.
    pub fn read_host_data(&mut self) -> u8 {
        let byte = self.buffer_ram[self.dma_address as usize];
        self.dma_address = (self.dma_address + 1) & BUFFER_RAM_ADDRESS_MASK;
        if self.dma_address == self.write_address {
            self.end_of_data_transfer = true;
        }
        self.data_ready = false;
        byte
    }

    pub fn is_dma_destination(&self) -> bool {
        self.device_destination.is_dma()
    }

    /// Decodes a freshly-read 2352-byte sector into buffer RAM, pulling out the header/subheader
    /// fields and validating the sector's EDC. Returns the checksum error the reader would have
    /// reported, if any, so the caller can decide whether to raise a CDC-level fault.
    pub fn decode_block(
        &mut self,
        sector_buffer: &[u8; BYTES_PER_SECTOR as usize],
        track_number: u8,
        sector_number: u32,
    ) -> Result<(), CdRomError> {
        self.header_data.copy_from_slice(&sector_buffer[12..16]);
        self.subheader_data.copy_from_slice(&sector_buffer[16..20]);

        let expected = u32::from_le_bytes(
            sector_buffer[2348..2352].try_into().expect("slice is exactly 4 bytes"),
        );
        let mut actual: u32 = 0;
        for &byte in &sector_buffer[0..2348] {
            actual = actual.wrapping_add(u32::from(byte));
        }
        self.last_checksum_valid = expected == actual;

        self.buffer_ram[..sector_buffer.len()].copy_from_slice(sector_buffer);
        self.write_address = (sector_buffer.len() as u16) & BUFFER_RAM_ADDRESS_MASK;
        self.dma_address = 0;
        self.block_ready = true;
        self.data_ready = true;
        self.end_of_data_transfer = false;
        self.interrupt_pending = true;

        if self.last_checksum_valid {
            Ok(())
        } else {
            Err(CdRomError::DiscReadInvalidChecksum { track_number, sector_number, expected, actual })
        }
    }

    pub fn header_data(&self) -> [u8; 4] {
        self.header_data
    }

    pub fn subheader_data(&self) -> [u8; 4] {
        self.subheader_data
    }

    pub fn reset(&mut self) {
        self.device_destination = DeviceDestination::None;
        self.host_data_buffer = None;
        self.register_address = 0;
        self.dma_address = 0;
        self.write_address = 0;
        self.block_ready = false;
        self.data_ready = false;
        self.end_of_data_transfer = false;
        self.interrupt_pending = false;
    }
}

impl Default for Rchip {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_sector() -> [u8; BYTES_PER_SECTOR as usize] {
        let mut sector = [0u8; BYTES_PER_SECTOR as usize];
        let mut sum: u32 = 0;
        for (i, byte) in sector[0..2348].iter_mut().enumerate() {
            *byte = (i % 251) as u8;
            sum = sum.wrapping_add(u32::from(*byte));
        }
        sector[2348..2352].copy_from_slice(&sum.to_le_bytes());
        sector
    }

    #[test]
    fn decode_block_with_valid_checksum_succeeds() {
        let mut rchip = Rchip::new();
        let sector = valid_sector();
        assert!(rchip.decode_block(&sector, 1, 0).is_ok());
        assert!(rchip.data_ready());
    }

    #[test]
    fn decode_block_with_corrupt_checksum_reports_error() {
        let mut rchip = Rchip::new();
        let mut sector = valid_sector();
        sector[2348] ^= 0xFF;
        let result = rchip.decode_block(&sector, 1, 5);
        assert!(matches!(result, Err(CdRomError::DiscReadInvalidChecksum { sector_number: 5, .. })));
    }

    #[test]
    fn reading_host_data_advances_dma_address_and_flags_end() {
        let mut rchip = Rchip::new();
        let sector = valid_sector();
        rchip.decode_block(&sector, 0, 0).unwrap();
        rchip.set_dma_address(u16::try_from(sector.len() - 1).unwrap());
        let _ = rchip.read_host_data();
        assert!(rchip.end_of_data_transfer());
    }
}
