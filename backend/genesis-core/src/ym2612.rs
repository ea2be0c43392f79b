//! YM2612 FM synthesis chip (OPN2), reduced to register decoding and a simplified operator
//! sample path. Full envelope-generator/phase-generator/LFO/timer precision is out of scope here
//! — the scheduler and memory map are this core's subject, not cycle-exact FM audio — but the
//! register file and channel/operator addressing follow the real chip's layout so a fuller
//! implementation can be dropped in without changing how callers drive it.

use bincode::{Decode, Encode};
use jgenesis_common::num::GetBit;
use std::array;

const CHANNELS: usize = 6;
const OPERATORS_PER_CHANNEL: usize = 4;

#[derive(Debug, Clone, Copy, Encode, Decode)]
struct FmOperator {
    total_level: u8,
    multiple: u8,
    detune: u8,
    attack_rate: u8,
    decay_rate: u8,
    sustain_rate: u8,
    release_rate: u8,
    sustain_level: u8,
    key_on: bool,
    /// 0 = full volume, 0x7F = silent, matching the real envelope generator's attenuation sense.
    envelope_level: u8,
}

impl Default for FmOperator {
    fn default() -> Self {
        Self {
            total_level: 0,
            multiple: 0,
            detune: 0,
            attack_rate: 0,
            decay_rate: 0,
            sustain_rate: 0,
            release_rate: 0,
            sustain_level: 0,
            key_on: false,
            envelope_level: 0x7F,
        }
    }
}

impl FmOperator {
    /// A coarse stand-in for the real 4-stage envelope generator: rises toward full volume on
    /// key-on, decays toward silence on key-off, scaled by `total_level`.
    fn step_envelope(&mut self) {
        let target = if self.key_on { 0 } else { 0x7F };
        if self.envelope_level < target {
            self.envelope_level = self.envelope_level.saturating_add(self.attack_rate.max(1));
        } else if self.envelope_level > target {
            self.envelope_level = self.envelope_level.saturating_sub(self.release_rate.max(1));
        }
    }

    fn sample(&self, phase: u16) -> i16 {
        let attenuation = u16::from(self.total_level) * 2 + u16::from(self.envelope_level);
        let amplitude = i32::from(u8::MAX) - i32::from(attenuation.min(255) as u8);
        let angle = f64::from(phase) / 1024.0 * std::f64::consts::TAU;
        (angle.sin() * f64::from(amplitude)) as i16
    }
}

#[derive(Debug, Clone, Copy, Default, Encode, Decode)]
struct FmChannel {
    operators: [FmOperator; OPERATORS_PER_CHANNEL],
    algorithm: u8,
    feedback: u8,
    f_number: u16,
    block: u8,
    phase_counter: u16,
    left_enabled: bool,
    right_enabled: bool,
}

impl FmChannel {
    fn key_on_off(&mut self, operator_mask: u8, on: bool) {
        for (i, op) in self.operators.iter_mut().enumerate() {
            if operator_mask.bit(i as u8) {
                op.key_on = on;
            }
        }
    }

    fn sample(&self) -> i16 {
        // Algorithm 7 (all operators additive) stands in for the full FM routing matrix.
        let _ = self.algorithm;
        let _ = self.feedback;
        self.operators.iter().map(|op| op.sample(self.phase_counter) / 4).sum()
    }

    fn tick(&mut self) {
        for op in &mut self.operators {
            op.step_envelope();
        }
        self.phase_counter = self.phase_counter.wrapping_add((self.f_number >> 5).max(1));
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ym2612 {
    channels: [FmChannel; CHANNELS],
    address_port0: u8,
    address_port1: u8,
    dac_enabled: bool,
    dac_sample: u8,
}

impl Ym2612 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: array::from_fn(|_| FmChannel::default()),
            address_port0: 0,
            address_port1: 0,
            dac_enabled: false,
            dac_sample: 0x80,
        }
    }

    pub fn write_address_port0(&mut self, address: u8) {
        self.address_port0 = address;
    }

    pub fn write_address_port1(&mut self, address: u8) {
        self.address_port1 = address;
    }

    pub fn write_data_port0(&mut self, value: u8) {
        self.write_register(0, self.address_port0, value);
    }

    pub fn write_data_port1(&mut self, value: u8) {
        self.write_register(1, self.address_port1, value);
    }

    fn channel_index(group: u8, register: u8) -> Option<usize> {
        let local = usize::from(register & 0x03);
        if local == 3 {
            return None;
        }
        Some(local + usize::from(group) * 3)
    }

    fn write_register(&mut self, group: u8, register: u8, value: u8) {
        match register {
            0x28 => {
                // bits 0-1 select channel within the group, bit 2 selects the group itself
                // (channels 4-6 live at indices 3-5 regardless of which port the write came in on)
                let local = value & 0x03;
                if local == 3 {
                    return;
                }
                let group = u8::from(value.bit(2));
                if let Some(channel) = self.channels.get_mut(usize::from(local) + usize::from(group) * 3) {
                    channel.key_on_off(value >> 4, true);
                    channel.key_on_off(!(value >> 4) & 0xF, false);
                }
            }
            0x2A => {
                self.dac_sample = value;
            }
            0x2B => {
                self.dac_enabled = value.bit(7);
            }
            0x30..=0x3F => self.write_operator_field(group, register, value, FmOperator::detune_multiple),
            0x40..=0x4F => self.write_operator_field(group, register, value, |op, v| op.total_level = v & 0x7F),
            0x50..=0x5F => self.write_operator_field(group, register, value, |op, v| op.attack_rate = v & 0x1F),
            0x60..=0x6F => self.write_operator_field(group, register, value, |op, v| op.decay_rate = v & 0x1F),
            0x70..=0x7F => self.write_operator_field(group, register, value, |op, v| op.sustain_rate = v & 0x1F),
            0x80..=0x8F => self.write_operator_field(group, register, value, |op, v| {
                op.sustain_level = v >> 4;
                op.release_rate = (v & 0xF) * 2 + 1;
            }),
            0xA0..=0xA2 => {
                if let Some(i) = Self::channel_index(group, register) {
                    self.channels[i].f_number = (self.channels[i].f_number & 0x700) | u16::from(value);
                }
            }
            0xA4..=0xA6 => {
                if let Some(i) = Self::channel_index(group, register) {
                    self.channels[i].f_number =
                        (self.channels[i].f_number & 0xFF) | (u16::from(value & 0x07) << 8);
                    self.channels[i].block = (value >> 3) & 0x07;
                }
            }
            0xB0..=0xB2 => {
                if let Some(i) = Self::channel_index(group, register) {
                    self.channels[i].algorithm = value & 0x07;
                    self.channels[i].feedback = (value >> 3) & 0x07;
                }
            }
            0xB4..=0xB6 => {
                if let Some(i) = Self::channel_index(group, register) {
                    self.channels[i].left_enabled = value.bit(7);
                    self.channels[i].right_enabled = value.bit(6);
                }
            }
            _ => {}
        }
    }

    fn write_operator_field(
        &mut self,
        group: u8,
        register: u8,
        value: u8,
        apply: impl Fn(&mut FmOperator, u8),
    ) {
        let Some(channel_index) = Self::channel_index(group, register) else { return };
        let operator_index = usize::from((register >> 2) & 0x03);
        apply(&mut self.channels[channel_index].operators[operator_index], value);
    }

    pub fn tick(&mut self) {
        for channel in &mut self.channels {
            channel.tick();
        }
    }

    #[must_use]
    pub fn sample(&self) -> (i16, i16) {
        if self.dac_enabled {
            let dac = (i16::from(self.dac_sample) - 0x80) * 128;
            return (dac, dac);
        }

        let mut left = 0i32;
        let mut right = 0i32;
        for channel in &self.channels {
            let s = i32::from(channel.sample());
            if channel.left_enabled {
                left += s;
            }
            if channel.right_enabled {
                right += s;
            }
        }
        ((left / CHANNELS as i32) as i16, (right / CHANNELS as i32) as i16)
    }
}

impl Default for Ym2612 {
    fn default() -> Self {
        Self::new()
    }
}

impl FmOperator {
    fn detune_multiple(&mut self, value: u8) {
        self.detune = (value >> 4) & 0x07;
        self.multiple = value & 0x0F;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_on_raises_envelope_toward_full_volume() {
        let mut chip = Ym2612::new();
        let initial = chip.channels[0].operators[0].envelope_level;
        chip.channels[0].operators[0].attack_rate = 10;
        chip.channels[0].operators[0].key_on = true;
        for _ in 0..5 {
            chip.tick();
        }
        assert!(chip.channels[0].operators[0].envelope_level < initial);
    }

    #[test]
    fn dac_mode_outputs_raw_sample_centered_at_zero() {
        let mut chip = Ym2612::new();
        chip.write_data_port0(0x80); // select register 0x2B... actually sets address; simulate directly
        chip.dac_enabled = true;
        chip.dac_sample = 0x80;
        let (l, r) = chip.sample();
        assert_eq!((l, r), (0, 0));
    }

    #[test]
    fn frequency_register_write_is_split_across_two_registers() {
        let mut chip = Ym2612::new();
        chip.write_address_port0(0xA0);
        chip.write_data_port0(0xFF);
        chip.write_address_port0(0xA4);
        chip.write_data_port0(0x03);
        assert_eq!(chip.channels[0].f_number, 0x3FF);
    }
}
