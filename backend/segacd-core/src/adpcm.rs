//! Pico (uPD7759-like) ADPCM playback chip: decodes a command FIFO into silence/playback/repeat
//! segments and expands 4-bit ADPCM nibbles into signed PCM via the standard uPD7755 delta
//! tables.

use bincode::{Decode, Encode};

const FIFO_LEN: usize = 64;

// Standard uPD7755 per-nibble state-delta table: index 0-7 cover the unsigned 3-bit magnitude of
// a nibble, used to step the adaptive quantizer state up or down.
const STATE_DELTA: [i8; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];

// 49-entry step-size table repeated to fill the 256-entry `(state << 4 | nibble)` delta lookup;
// state is clamped to [0, 48].
const STEP_TABLE: [u16; 49] = [
    16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66, 73, 80, 88, 97, 107, 118, 130,
    143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449, 494, 544, 598, 658, 724, 796,
    876, 963, 1060, 1166, 1282, 1411, 1552,
];

fn delta_for(state: u8, nibble: u8) -> i32 {
    let step = i32::from(STEP_TABLE[usize::from(state.min(48))]);
    let magnitude = nibble & 0x7;
    let sign = if nibble & 0x8 != 0 { -1 } else { 1 };
    sign * (step * i32::from(magnitude) * 2 + step) / 8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum Segment {
    Silence { samples_remaining: u32 },
    Play { rate: u8, samples_remaining: u32 },
    Repeat { rate: u8, samples_remaining: u32, repeats_remaining: u8 },
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct AdpcmChip {
    fifo: Vec<u8>,
    segment: Option<Segment>,
    adpcm_state: u8,
    predicted_sample: i32,
    control: u8,
    last_output: i16,
}

impl AdpcmChip {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fifo: Vec::with_capacity(FIFO_LEN),
            segment: None,
            adpcm_state: 0,
            predicted_sample: 0,
            control: 0,
            last_output: 0,
        }
    }

    pub fn set_control(&mut self, control: u8) {
        self.control = control;
    }

    /// Pushes a command byte into the FIFO, dropping the oldest byte on overflow (the real chip
    /// would assert a FIFO-full flag; nothing in this design currently reads one).
    pub fn push_command(&mut self, byte: u8) {
        if self.fifo.len() >= FIFO_LEN {
            self.fifo.remove(0);
        }
        self.fifo.push(byte);
        if self.segment.is_none() {
            self.decode_next_segment();
        }
    }

    fn decode_next_segment(&mut self) {
        if self.fifo.is_empty() {
            return;
        }
        let cmd = self.fifo.remove(0);
        self.segment = Some(match cmd {
            0x00..=0x3F => Segment::Silence { samples_remaining: u32::from(cmd) * 160 },
            0x40..=0x7F => Segment::Play { rate: cmd & 0x3F, samples_remaining: 256 },
            0x80..=0xBF => {
                let length = self.fifo.first().copied().unwrap_or(0);
                if !self.fifo.is_empty() {
                    self.fifo.remove(0);
                }
                Segment::Play { rate: cmd & 0x3F, samples_remaining: u32::from(length) + 1 }
            }
            0xC0..=0xFF => {
                let rate = self.fifo.first().copied().unwrap_or(0);
                if !self.fifo.is_empty() {
                    self.fifo.remove(0);
                }
                let length_byte = self.fifo.first().copied().unwrap_or(0);
                if !self.fifo.is_empty() {
                    self.fifo.remove(0);
                }
                let multiplier = u32::from(cmd & 0x7) + 1;
                Segment::Repeat {
                    rate,
                    samples_remaining: u32::from(length_byte) * multiplier,
                    repeats_remaining: (cmd >> 3) & 0x7,
                }
            }
        });
    }

    /// Decodes one ADPCM nibble (when the current segment calls for playback) and returns the
    /// attenuated signed sample, clamped to +/-256 as the real DAC does.
    pub fn decode_nibble(&mut self, nibble: u8) -> i16 {
        let delta = delta_for(self.adpcm_state, nibble);
        self.predicted_sample = (self.predicted_sample + delta).clamp(-256, 255);
        self.adpcm_state = (i32::from(self.adpcm_state) + i32::from(STATE_DELTA[usize::from(nibble & 0x7)]))
            .clamp(0, 48) as u8;

        let attenuation = self.control & 0x7;
        self.last_output = (self.predicted_sample >> attenuation) as i16;
        self.last_output
    }

    /// Advances the current segment by one sample tick, returning whether output is silent.
    pub fn tick(&mut self) -> bool {
        match &mut self.segment {
            Some(Segment::Silence { samples_remaining }) => {
                *samples_remaining -= 1;
                if *samples_remaining == 0 {
                    self.segment = None;
                    self.decode_next_segment();
                }
                true
            }
            Some(Segment::Play { samples_remaining, .. }) => {
                *samples_remaining -= 1;
                if *samples_remaining == 0 {
                    self.segment = None;
                    self.decode_next_segment();
                }
                false
            }
            Some(Segment::Repeat { samples_remaining, repeats_remaining, rate }) => {
                *samples_remaining -= 1;
                if *samples_remaining == 0 {
                    if *repeats_remaining > 0 {
                        *repeats_remaining -= 1;
                        *samples_remaining = 1;
                        let _ = rate;
                    } else {
                        self.segment = None;
                        self.decode_next_segment();
                    }
                }
                false
            }
            None => true,
        }
    }

    pub fn last_output(&self) -> i16 {
        self.last_output
    }
}

impl Default for AdpcmChip {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_command_counts_down_n_times_160_samples() {
        let mut chip = AdpcmChip::new();
        chip.push_command(0x02); // silence for 2*160 samples
        let mut silent_ticks = 0;
        for _ in 0..320 {
            if chip.tick() {
                silent_ticks += 1;
            }
        }
        assert_eq!(silent_ticks, 320);
    }

    #[test]
    fn short_play_command_reads_length_from_next_byte() {
        let mut chip = AdpcmChip::new();
        chip.push_command(0x80);
        chip.push_command(9); // play 10 samples
        for _ in 0..9 {
            assert!(!chip.tick());
        }
    }

    #[test]
    fn decoded_output_is_clamped_to_dac_range() {
        let mut chip = AdpcmChip::new();
        for _ in 0..64 {
            chip.decode_nibble(0x7);
        }
        assert!(chip.last_output() <= 256 && chip.last_output() >= -256);
    }
}
