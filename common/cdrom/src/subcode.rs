//! Subchannel cooking.
//!
//! Each sector carries 96 bytes of subcode, split across 8 channels (P, Q, R..W) of 12 bytes
//! apiece. Only the Q channel carries data the CD MCU needs (track/index/absolute time and a
//! CRC-16); the rest is synthesized as silence. This module builds a Q channel for a given
//! track/time pair the way a real disc's table of contents would be burned.

use crate::cdtime::CdTime;
use crate::cue::{CueSheet, TrackType};

pub const SUBCODE_LEN: usize = 96;
const CHANNEL_LEN: usize = 12;

/// Q-channel ADR field: this Q packet encodes current position data.
const ADR_CURRENT_POSITION: u8 = 0x1;

fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
        }
    }
    !crc
}

/// Build a 12-byte Q channel for the "current position" packet at `absolute_time`, for the track
/// active at that time per `cue_sheet`.
#[must_use]
pub fn build_q_channel(cue_sheet: &CueSheet, absolute_time: CdTime) -> [u8; CHANNEL_LEN] {
    let track = cue_sheet.find_track_by_time(absolute_time);

    let (track_number, control) = match track {
        Some(track) => {
            let control = match track.track_type {
                TrackType::Audio => 0x0,
                TrackType::Data => 0x4,
            };
            (track.number, control)
        }
        None => (0xAA, 0x4), // lead-out
    };

    let relative_time = track.map_or(CdTime::ZERO, |track| {
        if absolute_time >= track.effective_start_time() {
            absolute_time - track.effective_start_time()
        } else {
            CdTime::ZERO
        }
    });

    let mut q = [0_u8; CHANNEL_LEN];
    q[0] = (control << 4) | ADR_CURRENT_POSITION;
    q[1] = bcd(track_number);
    q[2] = bcd(1); // index; pregap (index 0) handling is left to the MCU, which tracks it separately
    let (rel_m, rel_s, rel_f) = relative_time.to_bcd();
    q[3] = rel_m;
    q[4] = rel_s;
    q[5] = rel_f;
    q[6] = 0;
    let (abs_m, abs_s, abs_f) = absolute_time.to_bcd();
    q[7] = abs_m;
    q[8] = abs_s;
    q[9] = abs_f;

    let crc = crc16_ccitt(&q[..10]);
    q[10] = (crc >> 8) as u8;
    q[11] = (crc & 0xFF) as u8;

    q
}

fn bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Interleave 8 channel buffers (P, Q, R, S, T, U, V, W; 12 bytes each) into one 96-byte block the
/// way they are physically multiplexed on disc, one bit per channel per output byte.
#[must_use]
pub fn interleave_channels(channels: &[[u8; CHANNEL_LEN]; 8]) -> [u8; SUBCODE_LEN] {
    let mut out = [0_u8; SUBCODE_LEN];
    for byte_index in 0..CHANNEL_LEN {
        for bit_index in 0..8 {
            let mut packed = 0_u8;
            for (channel_index, channel) in channels.iter().enumerate() {
                let bit = (channel[byte_index] >> (7 - bit_index)) & 1;
                packed |= bit << (7 - channel_index);
            }
            out[byte_index * 8 + bit_index] = packed;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::{ByteOrder, Track, TrackMode};

    fn single_track_sheet() -> CueSheet {
        CueSheet::new(vec![Track {
            number: 1,
            mode: TrackMode::Mode1,
            track_type: TrackType::Data,
            start_time: CdTime::ZERO,
            end_time: CdTime::new(10, 0, 0),
            pregap_len: CdTime::new(0, 2, 0),
            pause_len: CdTime::ZERO,
            postgap_len: CdTime::ZERO,
            byte_order: ByteOrder::LittleEndian,
        }])
    }

    #[test]
    fn q_channel_checksum_validates() {
        let sheet = single_track_sheet();
        let q = build_q_channel(&sheet, CdTime::new(0, 5, 0));
        assert_eq!(crc16_ccitt(&q[..10]), u16::from_be_bytes([q[10], q[11]]));
    }

    #[test]
    fn interleave_round_trips_per_channel_bit() {
        let mut channels = [[0_u8; CHANNEL_LEN]; 8];
        channels[1] = [0xFF; CHANNEL_LEN]; // Q channel all 1s
        let interleaved = interleave_channels(&channels);

        // Every output byte's bit 6 (second-from-msb, channel index 1 = Q) should be set.
        for byte in interleaved {
            assert_eq!((byte >> 6) & 1, 1);
        }
    }
}
