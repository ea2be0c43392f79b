//! Tagged section-buffer save state format shared by every backend.
//!
//! A save state is a sequence of `[tag][len_u32][payload]` records. Unknown tags are skipped by
//! length rather than rejected, so old save states stay loadable after new sections are added.
//! Every section is written through the same format regardless of which device it belongs to;
//! backends register one handler per tag they understand.

use bincode::config;
use bincode::{Decode, Encode};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
#[repr(u8)]
pub enum SectionTag {
    Z80 = 0,
    Vdp = 1,
    Psg = 2,
    MainRam = 3,
    Io = 4,
    CartMapper = 5,
    CdMcu = 6,
    Cdc = 7,
    Pcm = 8,
    M68k = 9,
    Ym2612 = 10,
    Graphics = 11,
    Fader = 12,
    Adpcm = 13,
}

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("failed to encode save state section {tag:?}: {source}")]
    Encode {
        tag: SectionTag,
        #[source]
        source: bincode::error::EncodeError,
    },
    #[error("failed to decode save state section {tag:?}: {source}")]
    Decode {
        tag: SectionTag,
        #[source]
        source: bincode::error::DecodeError,
    },
    #[error("save state is truncated: expected {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },
}

pub type SaveStateResult<T> = Result<T, SaveStateError>;

/// A fully assembled save state: an ordered set of sections, one payload per tag. Built and
/// consumed through [`SaveStateWriter`] / [`SaveStateReader`] rather than directly.
#[derive(Debug, Clone, Default)]
pub struct SaveStateWriter {
    sections: BTreeMap<u8, Vec<u8>>,
}

impl SaveStateWriter {
    #[must_use]
    pub fn new() -> Self {
        Self { sections: BTreeMap::new() }
    }

    pub fn write_section<T: Encode>(&mut self, tag: SectionTag, value: &T) -> SaveStateResult<()> {
        let payload = bincode::encode_to_vec(value, config::standard())
            .map_err(|source| SaveStateError::Encode { tag, source })?;
        self.sections.insert(tag as u8, payload);
        Ok(())
    }

    /// Serializes every registered section into the `[tag_u8][len_u32][payload]...` wire format.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        for (tag, payload) in self.sections {
            out.push(tag);
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&payload);
        }
        out
    }
}

/// Parses a tagged section buffer and hands each recognized section's payload to a caller-supplied
/// reader. Sections whose tag has no registered reader are skipped using the length prefix, so
/// future section types never break loading older saves (and vice versa, within reason).
pub struct SaveStateReader<'a> {
    bytes: &'a [u8],
}

impl<'a> SaveStateReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Reads the section tagged `tag`, if present anywhere in the buffer. This always performs a
    /// full scan of the section list; callers load each section once at startup, so scan cost
    /// doesn't matter in practice.
    pub fn read_section<T: Decode<()>>(&self, tag: SectionTag) -> SaveStateResult<Option<T>> {
        let mut cursor = self.bytes;
        while !cursor.is_empty() {
            let (section_tag, payload, rest) = Self::split_one(cursor)?;
            if section_tag == tag as u8 {
                let (value, _) = bincode::decode_from_slice(payload, config::standard())
                    .map_err(|source| SaveStateError::Decode { tag, source })?;
                return Ok(Some(value));
            }
            cursor = rest;
        }
        Ok(None)
    }

    fn split_one(cursor: &[u8]) -> SaveStateResult<(u8, &[u8], &[u8])> {
        if cursor.len() < 5 {
            return Err(SaveStateError::Truncated { expected: 5, found: cursor.len() });
        }
        let tag = cursor[0];
        let len = u32::from_le_bytes([cursor[1], cursor[2], cursor[3], cursor[4]]) as usize;
        let body = &cursor[5..];
        if body.len() < len {
            return Err(SaveStateError::Truncated { expected: len, found: body.len() });
        }
        Ok((tag, &body[..len], &body[len..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Encode, Decode)]
    struct Dummy {
        a: u32,
        b: u8,
    }

    #[test]
    fn round_trips_a_section() {
        let mut writer = SaveStateWriter::new();
        writer.write_section(SectionTag::Vdp, &Dummy { a: 0xDEAD_BEEF, b: 7 }).unwrap();
        let bytes = writer.finish();

        let reader = SaveStateReader::new(&bytes);
        let value: Dummy = reader.read_section(SectionTag::Vdp).unwrap().unwrap();
        assert_eq!(value, Dummy { a: 0xDEAD_BEEF, b: 7 });
    }

    #[test]
    fn unknown_section_is_skipped_without_error() {
        let mut writer = SaveStateWriter::new();
        writer.write_section(SectionTag::Vdp, &Dummy { a: 1, b: 2 }).unwrap();
        writer.write_section(SectionTag::Psg, &Dummy { a: 3, b: 4 }).unwrap();
        let bytes = writer.finish();

        let reader = SaveStateReader::new(&bytes);
        let value: Dummy = reader.read_section(SectionTag::Psg).unwrap().unwrap();
        assert_eq!(value, Dummy { a: 3, b: 4 });
        assert!(reader.read_section::<Dummy>(SectionTag::Z80).unwrap().is_none());
    }
}
