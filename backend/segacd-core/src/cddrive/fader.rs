//! CDD fader (LC7883-style): ramps the CD audio volume and accumulates raw little-endian PCM
//! bytes pulled off the disc into stereo samples at the master audio rate.

use bincode::{Decode, Encode};
use std::cmp::Ordering;

const MAX_ATTENUATION: u16 = 1024;
/// Attenuation values below this mute the channel outright rather than producing an audible but
/// vanishingly quiet multiplier.
const MUTE_THRESHOLD: u16 = 4;

#[must_use]
fn attenuation_multiplier(attenuation: u16) -> f64 {
    if attenuation < MUTE_THRESHOLD {
        return 0.0;
    }
    f64::from(attenuation >> 2) / 256.0
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct CddFader {
    current_attenuation: u16,
    dst_attenuation: u16,
    byte_buffer: [u8; 4],
    bytes_buffered: u8,
}

impl CddFader {
    #[must_use]
    pub fn new() -> Self {
        Self { current_attenuation: MAX_ATTENUATION, dst_attenuation: MAX_ATTENUATION, byte_buffer: [0; 4], bytes_buffered: 0 }
    }

    pub fn set_target_attenuation(&mut self, attenuation: u16) {
        self.dst_attenuation = attenuation.min(MAX_ATTENUATION);
    }

    fn step_attenuation(&mut self) {
        match self.current_attenuation.cmp(&self.dst_attenuation) {
            Ordering::Equal => {}
            Ordering::Less => {
                let delta = self.dst_attenuation - self.current_attenuation;
                self.current_attenuation += (delta >> 4).max(1);
                self.current_attenuation = self.current_attenuation.min(self.dst_attenuation);
            }
            Ordering::Greater => {
                let delta = self.current_attenuation - self.dst_attenuation;
                self.current_attenuation -= (delta >> 4).max(1);
                self.current_attenuation = self.current_attenuation.max(self.dst_attenuation);
            }
        }
    }

    /// Feeds one raw PCM byte from the sector stream. Every 4th byte completes a little-endian
    /// stereo sample, which is attenuated and returned.
    pub fn push_byte(&mut self, byte: u8) -> Option<(i16, i16)> {
        self.byte_buffer[self.bytes_buffered as usize] = byte;
        self.bytes_buffered += 1;
        if self.bytes_buffered < 4 {
            return None;
        }
        self.bytes_buffered = 0;

        self.step_attenuation();
        let multiplier = attenuation_multiplier(self.current_attenuation);

        let raw_l = i16::from_le_bytes([self.byte_buffer[0], self.byte_buffer[1]]);
        let raw_r = i16::from_le_bytes([self.byte_buffer[2], self.byte_buffer[3]]);
        Some(((f64::from(raw_l) * multiplier) as i16, (f64::from(raw_r) * multiplier) as i16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_bytes_produce_one_sample() {
        let mut fader = CddFader::new();
        assert!(fader.push_byte(0x00).is_none());
        assert!(fader.push_byte(0x00).is_none());
        assert!(fader.push_byte(0x00).is_none());
        assert!(fader.push_byte(0x00).is_some());
    }

    #[test]
    fn attenuation_below_threshold_mutes() {
        let mut fader = CddFader::new();
        fader.set_target_attenuation(0);
        fader.current_attenuation = 0;

        fader.push_byte(0xFF);
        fader.push_byte(0xFF);
        fader.push_byte(0xFF);
        let (l, r) = fader.push_byte(0xFF).unwrap();
        assert_eq!((l, r), (0, 0));
    }

    #[test]
    fn ramps_toward_target_over_multiple_samples() {
        let mut fader = CddFader::new();
        fader.current_attenuation = 0;
        fader.set_target_attenuation(MAX_ATTENUATION);
        fader.step_attenuation();
        assert!(fader.current_attenuation > 0);
        assert!(fader.current_attenuation < MAX_ATTENUATION);
    }
}
