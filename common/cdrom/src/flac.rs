//! A FLAC decoder sized for CD-quality audio tracks: 16-bit stereo, block sizes up to 65535.
//!
//! Supports the subset of FLAC actually seen in ripped CD audio and `.flac` standalone tracks:
//! streaminfo parsing, fixed and LPC prediction (orders 1-4 and 1-32 respectively), constant and
//! verbatim subframes, and Rice-coded residuals with the escape-code fallback. Non-audio metadata
//! blocks (seek tables, vorbis comments, pictures) are skipped, not interpreted.

use crate::{CdRomError, CdRomResult};
use std::io::Read;

const FLAC_MAGIC: &[u8; 4] = b"fLaC";

#[derive(Debug, Clone, Copy)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub total_samples: u64,
}

pub struct FlacDecoder<R: Read> {
    reader: BitReader<R>,
    pub stream_info: StreamInfo,
}

impl<R: Read> FlacDecoder<R> {
    /// # Errors
    ///
    /// Returns an error if the stream does not start with a valid FLAC header or STREAMINFO block.
    pub fn new(mut inner: R) -> CdRomResult<Self> {
        let mut magic = [0_u8; 4];
        inner
            .read_exact(&mut magic)
            .map_err(CdRomError::DiscReadIo)?;
        if &magic != FLAC_MAGIC {
            return Err(CdRomError::CueParse("not a FLAC stream".into()));
        }

        let mut reader = BitReader::new(inner);
        let stream_info = read_metadata_blocks(&mut reader)?;

        Ok(Self { reader, stream_info })
    }

    /// Decode the next frame, returning interleaved samples (one `i32` per channel per time step).
    ///
    /// # Errors
    ///
    /// Returns an error if the frame header or any subframe is malformed.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn next_frame(&mut self) -> CdRomResult<Option<Vec<i32>>> {
        if !self.reader.try_fill_byte() {
            return Ok(None);
        }

        let header = FrameHeader::parse(&mut self.reader, &self.stream_info)?;
        let mut channel_samples: Vec<Vec<i32>> =
            vec![Vec::with_capacity(header.block_size as usize); header.channel_count()];

        for (channel_index, samples) in channel_samples.iter_mut().enumerate() {
            let bits_per_sample = header.channel_bits_per_sample(channel_index);
            *samples = decode_subframe(&mut self.reader, header.block_size, bits_per_sample)?;
        }

        header.channel_assignment.undo(&mut channel_samples);

        self.reader.align_to_byte();
        self.reader.skip_bits(16); // frame CRC-16, not independently verified here

        let mut interleaved = Vec::with_capacity(header.block_size as usize * channel_samples.len());
        for i in 0..header.block_size as usize {
            for samples in &channel_samples {
                interleaved.push(samples[i]);
            }
        }

        Ok(Some(interleaved))
    }
}

fn read_metadata_blocks<R: Read>(reader: &mut BitReader<R>) -> CdRomResult<StreamInfo> {
    let mut stream_info = None;
    loop {
        let is_last = reader.read_bits(1)? == 1;
        let block_type = reader.read_bits(7)?;
        let length = reader.read_bits(24)?;

        if block_type == 0 {
            if length != 34 {
                return Err(CdRomError::CueParse("invalid STREAMINFO length".into()));
            }
            stream_info = Some(parse_stream_info(reader)?);
        } else {
            reader.skip_bits(length * 8);
        }

        if is_last {
            break;
        }
    }

    stream_info.ok_or_else(|| CdRomError::CueParse("FLAC stream missing STREAMINFO".into()))
}

fn parse_stream_info<R: Read>(reader: &mut BitReader<R>) -> CdRomResult<StreamInfo> {
    let min_block_size = reader.read_bits(16)? as u16;
    let max_block_size = reader.read_bits(16)? as u16;
    reader.skip_bits(24); // min frame size
    reader.skip_bits(24); // max frame size
    let sample_rate = reader.read_bits(20)?;
    let channels = reader.read_bits(3)? as u8 + 1;
    let bits_per_sample = reader.read_bits(5)? as u8 + 1;
    let total_samples = u64::from(reader.read_bits(18)?) << 18 | u64::from(reader.read_bits(18)?);
    reader.skip_bits(128); // MD5 signature

    Ok(StreamInfo { min_block_size, max_block_size, sample_rate, channels, bits_per_sample, total_samples })
}

#[derive(Debug, Clone, Copy)]
enum ChannelAssignment {
    Independent(u8),
    LeftSide,
    RightSide,
    MidSide,
}

impl ChannelAssignment {
    fn channel_count(self) -> usize {
        match self {
            Self::Independent(n) => n as usize,
            Self::LeftSide | Self::RightSide | Self::MidSide => 2,
        }
    }

    fn undo(self, channels: &mut [Vec<i32>]) {
        match self {
            Self::Independent(_) => {}
            Self::LeftSide => {
                let (left, side) = (channels[0].clone(), channels[1].clone());
                channels[1] = left.iter().zip(&side).map(|(&l, &s)| l - s).collect();
            }
            Self::RightSide => {
                let (side, right) = (channels[0].clone(), channels[1].clone());
                channels[0] = side.iter().zip(&right).map(|(&s, &r)| r + s).collect();
            }
            Self::MidSide => {
                for i in 0..channels[0].len() {
                    let mid = channels[0][i];
                    let side = channels[1][i];
                    let mid = (mid << 1) | (side & 1);
                    let left = (mid + side) >> 1;
                    let right = (mid - side) >> 1;
                    channels[0][i] = left;
                    channels[1][i] = right;
                }
            }
        }
    }
}

struct FrameHeader {
    block_size: u32,
    channel_assignment: ChannelAssignment,
    bits_per_sample: u8,
}

impl FrameHeader {
    fn channel_count(&self) -> usize {
        self.channel_assignment.channel_count()
    }

    fn channel_bits_per_sample(&self, channel_index: usize) -> u8 {
        match self.channel_assignment {
            ChannelAssignment::LeftSide if channel_index == 1 => self.bits_per_sample + 1,
            ChannelAssignment::RightSide if channel_index == 0 => self.bits_per_sample + 1,
            ChannelAssignment::MidSide if channel_index == 1 => self.bits_per_sample + 1,
            _ => self.bits_per_sample,
        }
    }

    fn parse<R: Read>(reader: &mut BitReader<R>, stream_info: &StreamInfo) -> CdRomResult<Self> {
        let sync = reader.read_bits(14)?;
        if sync != 0b11111111111110 {
            return Err(CdRomError::CueParse("bad FLAC frame sync code".into()));
        }
        reader.skip_bits(1); // reserved
        let _blocking_strategy = reader.read_bits(1)?;

        let block_size_code = reader.read_bits(4)?;
        let sample_rate_code = reader.read_bits(4)?;
        let channel_assignment_code = reader.read_bits(4)?;
        let bits_per_sample_code = reader.read_bits(3)?;
        reader.skip_bits(1); // reserved

        // Frame/sample number, UTF-8-like variable length encoding.
        read_utf8_coded_number(reader)?;

        let block_size = match block_size_code {
            0b0001 => 192,
            0b0010..=0b0101 => 576 << (block_size_code - 2),
            0b0110 => reader.read_bits(8)? + 1,
            0b0111 => reader.read_bits(16)? + 1,
            0b1000..=0b1111 => 256 << (block_size_code - 8),
            _ => return Err(CdRomError::CueParse("reserved FLAC block size code".into())),
        };

        if sample_rate_code == 0b1100 {
            reader.skip_bits(8);
        } else if matches!(sample_rate_code, 0b1101 | 0b1110) {
            reader.skip_bits(16);
        }

        let channel_assignment = match channel_assignment_code {
            0..=7 => ChannelAssignment::Independent(channel_assignment_code as u8 + 1),
            8 => ChannelAssignment::LeftSide,
            9 => ChannelAssignment::RightSide,
            10 => ChannelAssignment::MidSide,
            _ => return Err(CdRomError::CueParse("reserved FLAC channel assignment".into())),
        };

        let bits_per_sample = match bits_per_sample_code {
            0b000 => stream_info.bits_per_sample,
            0b001 => 8,
            0b010 => 12,
            0b100 => 16,
            0b101 => 20,
            0b110 => 24,
            _ => return Err(CdRomError::CueParse("reserved FLAC bits-per-sample code".into())),
        };

        reader.skip_bits(8); // header CRC-8, not independently verified here

        Ok(Self { block_size, channel_assignment, bits_per_sample })
    }
}

fn read_utf8_coded_number<R: Read>(reader: &mut BitReader<R>) -> CdRomResult<u64> {
    let first = reader.read_bits(8)?;
    let extra_bytes = if first & 0x80 == 0 {
        return Ok(u64::from(first));
    } else if first & 0xE0 == 0xC0 {
        1
    } else if first & 0xF0 == 0xE0 {
        2
    } else if first & 0xF8 == 0xF0 {
        3
    } else if first & 0xFC == 0xF8 {
        4
    } else if first & 0xFE == 0xFC {
        5
    } else {
        return Err(CdRomError::CueParse("invalid FLAC UTF-8 coded number".into()));
    };

    let mut value = u64::from(first & (0x7F >> (extra_bytes + 1)));
    for _ in 0..extra_bytes {
        let byte = reader.read_bits(8)?;
        value = (value << 6) | u64::from(byte & 0x3F);
    }

    Ok(value)
}

fn decode_subframe<R: Read>(
    reader: &mut BitReader<R>,
    block_size: u32,
    bits_per_sample: u8,
) -> CdRomResult<Vec<i32>> {
    reader.skip_bits(1); // reserved
    let subframe_type = reader.read_bits(6)?;
    let has_wasted_bits = reader.read_bits(1)? == 1;
    let wasted_bits = if has_wasted_bits { 1 + count_leading_zero_bits(reader)? } else { 0 };

    let effective_bps = bits_per_sample - wasted_bits as u8;

    let mut samples = match subframe_type {
        0b000000 => vec![reader.read_signed(effective_bps)?; block_size as usize],
        0b000001 => (0..block_size).map(|_| reader.read_signed(effective_bps)).collect::<Result<_, _>>()?,
        0b001000..=0b001100 => {
            let order = subframe_type - 0b001000;
            decode_fixed(reader, block_size, effective_bps, order)?
        }
        0b100000..=0b111111 => {
            let order = subframe_type - 0b100000 + 1;
            decode_lpc(reader, block_size, effective_bps, order)?
        }
        _ => return Err(CdRomError::CueParse("reserved FLAC subframe type".into())),
    };

    if wasted_bits > 0 {
        for sample in &mut samples {
            *sample <<= wasted_bits;
        }
    }

    Ok(samples)
}

fn count_leading_zero_bits<R: Read>(reader: &mut BitReader<R>) -> CdRomResult<u32> {
    let mut count = 0;
    while reader.read_bits(1)? == 0 {
        count += 1;
    }
    Ok(count)
}

fn decode_fixed<R: Read>(
    reader: &mut BitReader<R>,
    block_size: u32,
    bits_per_sample: u8,
    order: u32,
) -> CdRomResult<Vec<i32>> {
    let mut samples = Vec::with_capacity(block_size as usize);
    for _ in 0..order {
        samples.push(reader.read_signed(bits_per_sample)?);
    }

    let residuals = decode_residual(reader, block_size, order)?;
    for residual in residuals {
        let predicted = match order {
            0 => 0,
            1 => samples[samples.len() - 1],
            2 => 2 * samples[samples.len() - 1] - samples[samples.len() - 2],
            3 => {
                3 * samples[samples.len() - 1] - 3 * samples[samples.len() - 2]
                    + samples[samples.len() - 3]
            }
            4 => {
                4 * samples[samples.len() - 1] - 6 * samples[samples.len() - 2]
                    + 4 * samples[samples.len() - 3]
                    - samples[samples.len() - 4]
            }
            _ => return Err(CdRomError::CueParse("invalid fixed predictor order".into())),
        };
        samples.push(predicted + residual);
    }

    Ok(samples)
}

fn decode_lpc<R: Read>(
    reader: &mut BitReader<R>,
    block_size: u32,
    bits_per_sample: u8,
    order: u32,
) -> CdRomResult<Vec<i32>> {
    let mut samples = Vec::with_capacity(block_size as usize);
    for _ in 0..order {
        samples.push(reader.read_signed(bits_per_sample)?);
    }

    let precision = reader.read_bits(4)? + 1;
    let shift = reader.read_signed(5)?;
    let coefficients: Vec<i32> =
        (0..order).map(|_| reader.read_signed(precision as u8)).collect::<Result<_, _>>()?;

    let residuals = decode_residual(reader, block_size, order)?;
    for residual in residuals {
        let history = &samples[samples.len() - order as usize..];
        let prediction: i64 = coefficients
            .iter()
            .zip(history.iter().rev())
            .map(|(&c, &s)| i64::from(c) * i64::from(s))
            .sum();
        let predicted = (prediction >> shift) as i32;
        samples.push(predicted + residual);
    }

    Ok(samples)
}

fn decode_residual<R: Read>(
    reader: &mut BitReader<R>,
    block_size: u32,
    predictor_order: u32,
) -> CdRomResult<Vec<i32>> {
    let coding_method = reader.read_bits(2)?;
    let partition_order = reader.read_bits(4)?;
    let partition_count = 1_u32 << partition_order;

    let mut residuals = Vec::with_capacity(block_size as usize - predictor_order as usize);
    for partition_index in 0..partition_count {
        let partition_size = if partition_index == 0 {
            (block_size >> partition_order) - predictor_order
        } else {
            block_size >> partition_order
        };

        let rice_param_bits = if coding_method == 0 { 4 } else { 5 };
        let rice_param = reader.read_bits(rice_param_bits)?;

        let escape_marker = (1_u32 << rice_param_bits) - 1;
        if rice_param == escape_marker {
            let raw_bits = reader.read_bits(5)?;
            for _ in 0..partition_size {
                residuals.push(reader.read_signed(raw_bits as u8)?);
            }
        } else {
            for _ in 0..partition_size {
                residuals.push(read_rice_coded(reader, rice_param)?);
            }
        }
    }

    Ok(residuals)
}

fn read_rice_coded<R: Read>(reader: &mut BitReader<R>, param: u32) -> CdRomResult<i32> {
    let mut quotient = 0_u32;
    while reader.read_bits(1)? == 0 {
        quotient += 1;
    }

    let remainder = if param > 0 { reader.read_bits(param)? } else { 0 };
    let zigzag = (quotient << param) | remainder;

    Ok(if zigzag & 1 != 0 { -((zigzag >> 1) as i32) - 1 } else { (zigzag >> 1) as i32 })
}

/// A big-endian, MSB-first bit reader over an arbitrary byte stream.
struct BitReader<R: Read> {
    inner: R,
    current_byte: u8,
    bits_remaining: u8,
}

impl<R: Read> BitReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, current_byte: 0, bits_remaining: 0 }
    }

    fn try_fill_byte(&mut self) -> bool {
        if self.bits_remaining > 0 {
            return true;
        }

        let mut buf = [0_u8; 1];
        match self.inner.read(&mut buf) {
            Ok(1) => {
                self.current_byte = buf[0];
                self.bits_remaining = 8;
                true
            }
            _ => false,
        }
    }

    fn read_bit(&mut self) -> CdRomResult<u32> {
        if self.bits_remaining == 0 {
            let mut buf = [0_u8; 1];
            self.inner.read_exact(&mut buf).map_err(CdRomError::DiscReadIo)?;
            self.current_byte = buf[0];
            self.bits_remaining = 8;
        }

        self.bits_remaining -= 1;
        Ok(u32::from((self.current_byte >> self.bits_remaining) & 1))
    }

    fn read_bits(&mut self, count: u32) -> CdRomResult<u32> {
        let mut value = 0_u32;
        for _ in 0..count {
            value = (value << 1) | self.read_bit()?;
        }
        Ok(value)
    }

    fn read_signed(&mut self, bits: u8) -> CdRomResult<i32> {
        if bits == 0 {
            return Ok(0);
        }
        let raw = self.read_bits(u32::from(bits))?;
        let sign_bit = 1_u32 << (bits - 1);
        Ok(if raw & sign_bit != 0 { (raw as i32) - (1 << bits) } else { raw as i32 })
    }

    fn skip_bits(&mut self, count: u32) {
        for _ in 0..count {
            let _ = self.read_bit();
        }
    }

    fn align_to_byte(&mut self) {
        self.bits_remaining = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_reader_reads_msb_first() {
        let mut reader = BitReader::new(&[0b1010_0000_u8][..]);
        assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
        assert_eq!(reader.read_bits(4).unwrap(), 0);
    }

    #[test]
    fn rice_code_round_trips_small_values() {
        // Rice code for param=0, value=0 is a single stop bit.
        let mut reader = BitReader::new(&[0b1000_0000_u8][..]);
        assert_eq!(read_rice_coded(&mut reader, 0).unwrap(), 0);
    }
}
