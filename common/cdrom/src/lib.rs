//! CD-ROM media handling: container parsing (CUE/TOC/ISO), disc time arithmetic, sector framing
//! (sync/header synthesis, scrambling), subchannel cooking, and a FLAC decoder for compressed
//! audio tracks.

pub mod cdtime;
pub mod cue;
pub mod flac;
pub mod iso;
pub mod reader;
pub mod scrambler;
pub mod subcode;
pub mod toc;

use std::io;
use thiserror::Error;

/// Data: 16 header bytes + 2048 data bytes + 288 error detection/correction bytes.
/// Audio: 1176 signed 16-bit PCM samples, half for the left channel and half for the right.
pub const BYTES_PER_SECTOR: u64 = 2352;

#[derive(Debug, Error)]
pub enum CdRomError {
    #[error("unable to determine parent directory of disc description file '{0}'")]
    CueParentDir(String),
    #[error("error parsing disc description: {0}")]
    CueParse(String),
    #[error("invalid/unsupported FILE line: {0}")]
    CueInvalidFileLine(String),
    #[error("invalid/unsupported TRACK line: {0}")]
    CueInvalidTrackLine(String),
    #[error("invalid/unsupported INDEX line: {0}")]
    CueInvalidIndexLine(String),
    #[error("invalid/unsupported PREGAP line: {0}")]
    CueInvalidPregapLine(String),
    #[error("unable to get file metadata for file '{path}': {source}")]
    FsMetadata {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("error opening disc description file '{path}': {source}")]
    CueOpen {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("error opening track data file '{path}': {source}")]
    BinOpen {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error reading from disc: {0}")]
    DiscReadIo(#[source] io::Error),
    #[error(
        "CD-ROM error detection check failed for track {track_number} sector {sector_number}; expected={expected:08X}, actual={actual:08X}"
    )]
    DiscReadInvalidChecksum { track_number: u8, sector_number: u32, expected: u32, actual: u32 },
}

pub type CdRomResult<T> = Result<T, CdRomError>;
