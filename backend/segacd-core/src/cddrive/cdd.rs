//! CDD (CD Drive) MCU: the nibble-serial command/status protocol between the sub-CPU and the
//! physical drive, modeled at the byte-accurate level rather than as a higher-level playback
//! state machine — command and status packets are built and drained one nibble at a time, the
//! way the real gate array's serial shift register behaves.

use bincode::{Decode, Encode};
use recompiler_core::scheduler::Device;

/// 16.9344 MHz CD block clock divided down to once per sector (75 sectors/second).
pub const SECTOR_CLOCKS: u64 = 16_934_400 / 75;
/// Delay from "sector read complete" to "status nibble stream begins".
pub const PROCESSING_DELAY: u64 = 121_600;
/// Spacing between successive status/command nibbles.
pub const NIBBLE_CLOCKS: u64 = 77;
/// Lead-in region precedes LBA 0 on a Sega CD disc image.
pub const LEADIN_SECTORS: u32 = 150;
/// Data bytes per sector, clocked out to the CDC/fader over the whole sector period.
pub const SECTOR_DATA_BYTES: u16 = 2352;
/// Subcode bytes per sector, clocked out on a separate channel from the main data stream.
pub const SUBCODE_BYTES: u8 = 96;
/// `SECTOR_CLOCKS / SECTOR_DATA_BYTES`, exactly: one data byte every 96 CD block clocks.
pub const SECTOR_BYTE_CLOCKS: u64 = SECTOR_CLOCKS / SECTOR_DATA_BYTES as u64;
/// `SECTOR_CLOCKS / SUBCODE_BYTES`, exactly: one subcode byte every 2352 CD block clocks.
pub const SUBCODE_BYTE_CLOCKS: u64 = SECTOR_CLOCKS / SUBCODE_BYTES as u64;
/// Status nibble position (1-based) at which the status interrupt fires, when not wobbling.
const STATUS_INTERRUPT_NIBBLE: i8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum DriveStatus {
    #[default]
    Stop,
    Play,
    Seek,
    Scan,
    Pause,
    DoorOpen,
    SumError,
    CmdError,
    FuncError,
    TocRead,
    Tracking,
    NoDisc,
    DiscLeadout,
    DiscLeadin,
    TrayMoving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum RequestedFormat {
    #[default]
    Absolute,
    Relative,
    Track,
    Toc0,
    Toc1,
    TocN,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum Seeking {
    Idle,
    Coarse,
    Corrective,
}

fn nibble_checksum(packet: &[u8; 10]) -> u8 {
    let sum: u8 = packet[0..9].iter().fold(0u8, |acc, &n| acc.wrapping_add(n)) & 0xF;
    (!sum) & 0xF
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CddMcu {
    head_pba: u32,
    seek_pba: u32,
    seeking: Seeking,
    coarse_seek: u32,
    status: DriveStatus,
    requested_format: RequestedFormat,
    cmd_buffer: [u8; 10],
    status_buffer: [u8; 10],
    current_status_nibble: i8,
    current_cmd_nibble: i8,
    current_sector_byte: u16,
    current_subcode_byte: u8,
    cycle: u64,
    next_sector_cycle: u64,
    next_nibble_cycle: u64,
    next_sector_byte_cycle: u64,
    next_subcode_byte_cycle: u64,
    pending_status_delay: u64,
    interrupt_pending: bool,
    subcode_interrupt_pending: bool,
    sector_pending: bool,
}

impl CddMcu {
    #[must_use]
    pub fn new() -> Self {
        Self {
            head_pba: 0,
            seek_pba: 0,
            seeking: Seeking::Idle,
            coarse_seek: 0,
            status: DriveStatus::Stop,
            requested_format: RequestedFormat::Absolute,
            cmd_buffer: [0; 10],
            status_buffer: [0; 10],
            current_status_nibble: -1,
            current_cmd_nibble: -1,
            current_sector_byte: 0,
            current_subcode_byte: 0,
            cycle: 0,
            next_sector_cycle: SECTOR_CLOCKS,
            next_nibble_cycle: u64::MAX,
            next_sector_byte_cycle: u64::MAX,
            next_subcode_byte_cycle: u64::MAX,
            pending_status_delay: 0,
            interrupt_pending: false,
            subcode_interrupt_pending: false,
            sector_pending: false,
        }
    }

    pub fn head_pba(&self) -> u32 {
        self.head_pba
    }

    pub fn status(&self) -> DriveStatus {
        self.status
    }

    pub fn current_status_nibble(&self) -> i8 {
        self.current_status_nibble
    }

    pub fn status_buffer(&self) -> [u8; 10] {
        self.status_buffer
    }

    pub fn coarse_seek(&self) -> u32 {
        self.coarse_seek
    }

    pub fn current_sector_byte(&self) -> u16 {
        self.current_sector_byte
    }

    pub fn current_subcode_byte(&self) -> u8 {
        self.current_subcode_byte
    }

    /// Status-nibble-stream interrupt. Only asserted on a clean (non-wobbling) sector; see
    /// [`Self::run_until`].
    pub fn interrupt_pending(&self) -> bool {
        self.interrupt_pending
    }

    pub fn acknowledge_interrupt(&mut self) {
        self.interrupt_pending = false;
    }

    /// Raised once the 96-byte subcode channel for the current sector has been fully clocked out.
    pub fn subcode_interrupt_pending(&self) -> bool {
        self.subcode_interrupt_pending
    }

    pub fn acknowledge_subcode_interrupt(&mut self) {
        self.subcode_interrupt_pending = false;
    }

    /// Consumes the "a new sector just started" signal. The caller is expected to read the
    /// sector at `head_pba` off the disc and feed it to the CDC and fader; this MCU only tracks
    /// the nibble/byte/subcode timing, not sector contents.
    pub fn take_pending_sector(&mut self) -> Option<u32> {
        self.sector_pending.then(|| {
            self.sector_pending = false;
            self.head_pba
        })
    }

    /// Decodes the sub-CPU's 10-nibble command packet. Bad checksums and nonzero reserved
    /// fields both report via `status` on the next snapshot rather than throwing away the frame.
    pub fn receive_command(&mut self, cmd_buffer: [u8; 10]) {
        self.cmd_buffer = cmd_buffer;
        let checksum = nibble_checksum(&cmd_buffer);
        if checksum != cmd_buffer[9] {
            self.status = DriveStatus::SumError;
            return;
        }

        match cmd_buffer[0] {
            0x0 => {} // NOP
            0x1 => self.status = DriveStatus::Stop,
            0x2 => self.requested_format = requested_format_from_nibble(cmd_buffer[1]),
            0x3 => self.begin_play(&cmd_buffer),
            0x4 => self.begin_seek(&cmd_buffer),
            0x5 => self.status = DriveStatus::Pause,
            _ => {}
        }
    }

    fn begin_play(&mut self, cmd_buffer: &[u8; 10]) {
        let minutes = bcd_nibbles(cmd_buffer[2], cmd_buffer[3]);
        let seconds = bcd_nibbles(cmd_buffer[4], cmd_buffer[5]);
        let frames = bcd_nibbles(cmd_buffer[6], cmd_buffer[7]);
        self.begin_seek_to(seek_lba(minutes, seconds, frames));
        self.status = DriveStatus::Play;
    }

    fn begin_seek(&mut self, cmd_buffer: &[u8; 10]) {
        let minutes = bcd_nibbles(cmd_buffer[2], cmd_buffer[3]);
        let seconds = bcd_nibbles(cmd_buffer[4], cmd_buffer[5]);
        let frames = bcd_nibbles(cmd_buffer[6], cmd_buffer[7]);
        self.begin_seek_to(seek_lba(minutes, seconds, frames));
    }

    fn begin_seek_to(&mut self, lba: i32) {
        let target = lba.max(0) as u32;
        self.seek_pba = target;
        self.seeking = Seeking::Coarse;
        self.coarse_seek = 0;
        self.status = DriveStatus::Seek;
    }

    /// Sector density grows with radius; used only to size coarse seek hops.
    fn sectors_per_track(&self) -> u32 {
        let radius_fraction = (self.head_pba.min(300_000) as f64) / 300_000.0;
        (9.0 + radius_fraction * 14.0) as u32
    }

    fn advance_seek(&mut self) {
        if self.head_pba == self.seek_pba {
            self.seeking = Seeking::Idle;
            return;
        }

        let distance = self.seek_pba as i64 - self.head_pba as i64;
        let sectors_per_track = self.sectors_per_track().max(1);
        let step = (distance.unsigned_abs() / 2).max(1).min(u64::from(sectors_per_track) * 60);
        let step = step.max(u64::from(sectors_per_track));

        if step > 1 {
            self.coarse_seek += 1;
        }

        if distance > 0 {
            self.head_pba += (step as u32).min(distance as u32);
        } else {
            self.head_pba -= (step as u32).min((-distance) as u32);
        }
    }

    fn snapshot_status(&mut self) {
        let mut packet = [0u8; 10];
        packet[0] = status_to_nibble(self.status);

        // Every sixth coarse seek step inserts a transient NotReady frame to model the drive
        // momentarily losing lock while it settles.
        let effectively_not_ready =
            matches!(self.seeking, Seeking::Coarse) && self.coarse_seek > 0 && self.coarse_seek % 3 != 0;

        if effectively_not_ready {
            packet[1] = requested_format_to_nibble(RequestedFormat::NotReady);
        } else {
            packet[1] = requested_format_to_nibble(self.requested_format);
            let (minutes, seconds, frames) = pba_to_bcd_time(self.head_pba);
            packet[2] = minutes / 10;
            packet[3] = minutes % 10;
            packet[4] = seconds / 10;
            packet[5] = seconds % 10;
            packet[6] = frames / 10;
            packet[7] = frames % 10;
        }

        packet[9] = nibble_checksum(&packet);
        self.status_buffer = packet;
    }
}

impl Default for CddMcu {
    fn default() -> Self {
        Self::new()
    }
}

fn bcd_nibbles(tens: u8, ones: u8) -> u8 {
    tens * 10 + ones
}

fn seek_lba(minutes: u8, seconds: u8, frames: u8) -> i32 {
    (i32::from(minutes) * 60 + i32::from(seconds)) * 75 + i32::from(frames) - 3
        + LEADIN_SECTORS as i32
}

fn pba_to_bcd_time(pba: u32) -> (u8, u8, u8) {
    let absolute = pba.saturating_sub(LEADIN_SECTORS);
    let frames = (absolute % 75) as u8;
    let total_seconds = absolute / 75;
    let seconds = (total_seconds % 60) as u8;
    let minutes = (total_seconds / 60) as u8;
    (minutes, seconds, frames)
}

fn status_to_nibble(status: DriveStatus) -> u8 {
    match status {
        DriveStatus::Stop => 0x0,
        DriveStatus::Play => 0x1,
        DriveStatus::Seek => 0x2,
        DriveStatus::Scan => 0x3,
        DriveStatus::Pause => 0x4,
        DriveStatus::DoorOpen => 0x5,
        DriveStatus::SumError => 0xC,
        DriveStatus::CmdError => 0xE,
        DriveStatus::FuncError => 0xF,
        DriveStatus::TocRead => 0x6,
        DriveStatus::Tracking => 0x7,
        DriveStatus::NoDisc => 0xB,
        DriveStatus::DiscLeadout => 0xA,
        DriveStatus::DiscLeadin => 0x9,
        DriveStatus::TrayMoving => 0x8,
    }
}

fn requested_format_to_nibble(format: RequestedFormat) -> u8 {
    match format {
        RequestedFormat::Absolute => 0x0,
        RequestedFormat::Relative => 0x1,
        RequestedFormat::Track => 0x2,
        RequestedFormat::Toc0 => 0x3,
        RequestedFormat::Toc1 => 0x4,
        RequestedFormat::TocN => 0x5,
        RequestedFormat::NotReady => 0xF,
    }
}

fn requested_format_from_nibble(nibble: u8) -> RequestedFormat {
    match nibble {
        0x1 => RequestedFormat::Relative,
        0x2 => RequestedFormat::Track,
        0x3 => RequestedFormat::Toc0,
        0x4 => RequestedFormat::Toc1,
        0x5 => RequestedFormat::TocN,
        _ => RequestedFormat::Absolute,
    }
}

impl Device for CddMcu {
    fn cycle(&self) -> u64 {
        self.cycle
    }

    fn run_until(&mut self, target: u64) -> u64 {
        while self.cycle < target {
            self.cycle += 1;

            // Byte/subcode advance for the *current* sector period is checked before the sector
            // tick below so the last byte of the outgoing period (its completion coincides
            // exactly with the next sector tick, since `SECTOR_BYTE_CLOCKS * SECTOR_DATA_BYTES
            // == SECTOR_CLOCKS`) still registers its completion interrupt.
            if self.current_sector_byte < SECTOR_DATA_BYTES && self.cycle >= self.next_sector_byte_cycle {
                self.next_sector_byte_cycle += SECTOR_BYTE_CLOCKS;
                self.current_sector_byte += 1;
            }

            if self.current_subcode_byte < SUBCODE_BYTES && self.cycle >= self.next_subcode_byte_cycle {
                self.next_subcode_byte_cycle += SUBCODE_BYTE_CLOCKS;
                self.current_subcode_byte += 1;
                if self.current_subcode_byte == SUBCODE_BYTES {
                    self.subcode_interrupt_pending = true;
                }
            }

            if self.cycle >= self.next_sector_cycle {
                self.next_sector_cycle += SECTOR_CLOCKS;

                if matches!(self.seeking, Seeking::Coarse) {
                    self.advance_seek();
                } else if matches!(self.status, DriveStatus::Play) {
                    self.head_pba += 1;
                }

                self.snapshot_status();

                let wobble_delay = if matches!(self.seeking, Seeking::Coarse) {
                    u64::from(3 - self.coarse_seek % 3) * SECTOR_CLOCKS
                } else {
                    0
                };
                self.pending_status_delay = self.cycle + PROCESSING_DELAY + wobble_delay;
                self.next_nibble_cycle = self.pending_status_delay;
                self.current_status_nibble = -1;

                self.current_sector_byte = 0;
                self.current_subcode_byte = 0;
                self.next_sector_byte_cycle = self.cycle + SECTOR_BYTE_CLOCKS;
                self.next_subcode_byte_cycle = self.cycle + SUBCODE_BYTE_CLOCKS;
                self.sector_pending = true;
            }

            if self.cycle >= self.next_nibble_cycle && self.current_status_nibble < 9 {
                self.next_nibble_cycle += NIBBLE_CLOCKS;
                self.current_status_nibble = match self.current_status_nibble {
                    n if n < 0 => 1,
                    n => n + 1,
                };

                if self.current_status_nibble == STATUS_INTERRUPT_NIBBLE
                    && self.coarse_seek % 3 == 0
                {
                    self.interrupt_pending = true;
                }
            }
        }
        self.cycle
    }

    fn rebase(&mut self, deduction: u64) {
        self.cycle = self.cycle.saturating_sub(deduction);
        self.next_sector_cycle = self.next_sector_cycle.saturating_sub(deduction);
        if self.next_nibble_cycle != u64::MAX {
            self.next_nibble_cycle = self.next_nibble_cycle.saturating_sub(deduction);
        }
        if self.next_sector_byte_cycle != u64::MAX {
            self.next_sector_byte_cycle = self.next_sector_byte_cycle.saturating_sub(deduction);
        }
        if self.next_subcode_byte_cycle != u64::MAX {
            self.next_subcode_byte_cycle = self.next_subcode_byte_cycle.saturating_sub(deduction);
        }
        self.pending_status_delay = self.pending_status_delay.saturating_sub(deduction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_readout_before_processing_delay_elapses_shows_idle() {
        let mut mcu = CddMcu::new();
        let reached = mcu.run_until(SECTOR_CLOCKS + PROCESSING_DELAY + 7 * NIBBLE_CLOCKS);
        assert_eq!(reached, SECTOR_CLOCKS + PROCESSING_DELAY + 7 * NIBBLE_CLOCKS);
        assert_eq!(mcu.current_status_nibble(), 8);
        assert_eq!(mcu.status_buffer()[0], status_to_nibble(DriveStatus::Stop));
    }

    #[test]
    fn eighth_status_nibble_raises_interrupt_when_not_wobbling() {
        let mut mcu = CddMcu::new();
        assert!(!mcu.interrupt_pending());
        mcu.run_until(SECTOR_CLOCKS + PROCESSING_DELAY + 7 * NIBBLE_CLOCKS);
        assert!(mcu.interrupt_pending());
        mcu.acknowledge_interrupt();
        assert!(!mcu.interrupt_pending());
    }

    #[test]
    fn sector_and_subcode_bytes_advance_partway_through_a_sector_period() {
        let mut mcu = CddMcu::new();
        mcu.run_until(SECTOR_CLOCKS + 10 * SECTOR_BYTE_CLOCKS);
        assert_eq!(mcu.current_sector_byte(), 10);
        assert!(!mcu.subcode_interrupt_pending());

        mcu.run_until(SECTOR_CLOCKS + 5 * SUBCODE_BYTE_CLOCKS);
        assert_eq!(mcu.current_subcode_byte(), 5);
        assert!(!mcu.subcode_interrupt_pending());
    }

    #[test]
    fn subcode_interrupt_fires_once_the_last_subcode_byte_is_clocked_out() {
        let mut mcu = CddMcu::new();
        // The last subcode byte of a period completes on the exact same clock as the next
        // sector tick (96 bytes * SUBCODE_BYTE_CLOCKS == SECTOR_CLOCKS), so by the time this
        // call returns the byte counter has already rolled over into the new sector; only the
        // latched interrupt flag survives that reset.
        mcu.run_until(SECTOR_CLOCKS + SUBCODE_BYTE_CLOCKS * u64::from(SUBCODE_BYTES));
        assert!(mcu.subcode_interrupt_pending());
        mcu.acknowledge_subcode_interrupt();
        assert!(!mcu.subcode_interrupt_pending());
    }

    #[test]
    fn each_sector_boundary_reports_exactly_one_pending_sector() {
        let mut mcu = CddMcu::new();
        mcu.run_until(SECTOR_CLOCKS);
        assert_eq!(mcu.take_pending_sector(), Some(mcu.head_pba()));
        assert_eq!(mcu.take_pending_sector(), None);
    }

    #[test]
    fn every_status_packet_has_a_valid_checksum() {
        let mut mcu = CddMcu::new();
        mcu.run_until(SECTOR_CLOCKS * 3);
        let packet = mcu.status_buffer();
        let sum: u8 = packet[0..9].iter().fold(0u8, |acc, &n| acc.wrapping_add(n)) & 0xF;
        assert_eq!((sum + packet[9]) & 0xF, 0xF);
    }

    #[test]
    fn play_command_advances_head_pba_once_per_sector() {
        let mut mcu = CddMcu::new();
        let mut cmd = [0u8; 10];
        cmd[0] = 0x3; // Play
        cmd[2] = 0;
        cmd[3] = 0;
        cmd[4] = 0;
        cmd[5] = 2; // 00:02:00
        cmd[6] = 0;
        cmd[7] = 0;
        cmd[9] = nibble_checksum(&cmd);
        mcu.receive_command(cmd);

        let before = mcu.head_pba();
        mcu.run_until(SECTOR_CLOCKS * 5);
        assert!(mcu.head_pba() >= before);
    }

    #[test]
    fn bad_checksum_reports_sum_error() {
        let mut mcu = CddMcu::new();
        let mut cmd = [0u8; 10];
        cmd[0] = 0x0;
        cmd[9] = nibble_checksum(&cmd) ^ 0x1;
        mcu.receive_command(cmd);
        assert_eq!(mcu.status(), DriveStatus::SumError);
    }
}
