//! Unified disc reader: dispatches across CUE/BIN, TOC, and bare ISO containers and produces
//! fully-formed 2352-byte sectors, including synthesized sync/header bytes, scrambling, and a
//! cooked Q subchannel.

use crate::cue::{ByteOrder, CueSheet, Track, TrackMode, TrackType};
use crate::{BYTES_PER_SECTOR, CdRomError, CdRomResult, cdtime::CdTime, cue, iso, scrambler, toc};
use bincode::{Decode, Encode};
use jgenesis_proc_macros::{FakeDecode, FakeEncode};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::mem;
use std::path::Path;
use std::sync::LazyLock;

const SECTOR_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdRomFileFormat {
    CueBin,
    Toc,
    Iso,
}

impl CdRomFileFormat {
    #[must_use]
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        match path.as_ref().extension().and_then(OsStr::to_str) {
            Some("cue") => Some(Self::CueBin),
            Some("toc") => Some(Self::Toc),
            Some("iso") => Some(Self::Iso),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct TrackFile {
    file: BufReader<File>,
    position: u64,
}

#[derive(Debug, Clone, Encode, Decode)]
struct TrackMetadata {
    file_name: String,
    time_in_file: CdTime,
}

#[derive(Debug, FakeEncode, FakeDecode, Default)]
struct DiscFiles {
    files: HashMap<String, TrackFile>,
    track_metadata: Vec<TrackMetadata>,
}

impl DiscFiles {
    fn read_into(
        &mut self,
        track_number: u8,
        relative_sector_number: u32,
        out: &mut [u8],
    ) -> CdRomResult<()> {
        let metadata = &self.track_metadata[(track_number - 1) as usize];
        let TrackFile { file, position } = self
            .files
            .get_mut(&metadata.file_name)
            .expect("track file was not opened on load; this is a bug");

        let sector_number = metadata.time_in_file.to_sector_number() + relative_sector_number;
        let sector_addr = u64::from(sector_number) * BYTES_PER_SECTOR;

        if *position != sector_addr {
            file.seek(SeekFrom::Start(sector_addr)).map_err(CdRomError::DiscReadIo)?;
        }

        file.read_exact(out).map_err(CdRomError::DiscReadIo)?;
        *position = sector_addr + out.len() as u64;

        Ok(())
    }
}

#[derive(Debug, Encode, Decode)]
pub struct CdRom {
    cue_sheet: CueSheet,
    files: DiscFiles,
}

impl CdRom {
    /// # Errors
    ///
    /// Propagates I/O errors and returns an error if the container's metadata is malformed.
    pub fn open<P: AsRef<Path>>(path: P, format: CdRomFileFormat) -> CdRomResult<Self> {
        match format {
            CdRomFileFormat::CueBin => Self::open_cue_bin(path),
            CdRomFileFormat::Toc => Self::open_toc(path),
            CdRomFileFormat::Iso => Self::open_iso(path),
        }
    }

    fn open_cue_bin<P: AsRef<Path>>(cue_path: P) -> CdRomResult<Self> {
        let cue_path = cue_path.as_ref();
        let cue_text = fs::read_to_string(cue_path)
            .map_err(|source| CdRomError::CueOpen { path: cue_path.display().to_string(), source })?;

        let parsed_files = CueParser::new().parse(&cue_text)?;
        let (cue_sheet, track_metadata) = to_cue_sheet(parsed_files, cue_path)?;

        let files = open_track_files(cue_path, &track_metadata)?;
        Ok(Self { cue_sheet, files: DiscFiles { files, track_metadata } })
    }

    fn open_toc<P: AsRef<Path>>(toc_path: P) -> CdRomResult<Self> {
        let toc_path = toc_path.as_ref();
        let toc_text = fs::read_to_string(toc_path)
            .map_err(|source| CdRomError::CueOpen { path: toc_path.display().to_string(), source })?;

        let parent_dir = toc_path
            .parent()
            .ok_or_else(|| CdRomError::CueParentDir(toc_path.display().to_string()))?;

        let parsed = toc::parse_toc_text(&toc_text)?;
        let mut track_metadata = Vec::with_capacity(parsed.len());
        for track in &parsed {
            if let Some(name) = &track.file.file_name {
                track_metadata.push(TrackMetadata { file_name: name.clone(), time_in_file: CdTime::ZERO });
            } else {
                track_metadata.push(TrackMetadata { file_name: String::new(), time_in_file: CdTime::ZERO });
            }
        }

        let cue_sheet = toc::build_cue_sheet(parsed, |name| {
            let file_path = parent_dir.join(name);
            let metadata = fs::metadata(&file_path)
                .map_err(|source| CdRomError::FsMetadata { path: file_path.display().to_string(), source })?;
            Ok((metadata.len() / BYTES_PER_SECTOR) as u32)
        })?;

        let files = open_track_files(toc_path, &track_metadata)?;
        Ok(Self { cue_sheet, files: DiscFiles { files, track_metadata } })
    }

    fn open_iso<P: AsRef<Path>>(iso_path: P) -> CdRomResult<Self> {
        let iso_path = iso_path.as_ref();
        let cue_sheet = iso::build_cue_sheet(iso_path)?;

        let track_metadata =
            vec![TrackMetadata { file_name: "iso".to_string(), time_in_file: CdTime::ZERO }];
        let file = File::open(iso_path)
            .map_err(|source| CdRomError::BinOpen { path: iso_path.display().to_string(), source })?;
        let mut files = HashMap::with_capacity(1);
        files.insert("iso".to_string(), TrackFile { file: BufReader::new(file), position: 0 });

        Ok(Self { cue_sheet, files: DiscFiles { files, track_metadata } })
    }

    #[must_use]
    pub fn cue(&self) -> &CueSheet {
        &self.cue_sheet
    }

    /// Read a full 2352-byte sector, synthesizing sync/header bytes and scrambling MODE1/MODE2
    /// data the way a real pickup would.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the backing file.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than 2352 bytes.
    pub fn read_sector(
        &mut self,
        track_number: u8,
        relative_time: CdTime,
        out: &mut [u8],
    ) -> CdRomResult<()> {
        let track = self.cue_sheet.track(track_number);

        if relative_time < track.pregap_len
            || relative_time >= track.end_time - track.postgap_len - track.start_time
        {
            match track.track_type {
                TrackType::Data => write_fake_pregap(track.mode, relative_time, out),
                TrackType::Audio => out[..BYTES_PER_SECTOR as usize].fill(0),
            }
            return Ok(());
        }

        let relative_sector_number = (relative_time - track.pregap_len).to_sector_number();
        let byte_order = track.byte_order;

        match track.track_type {
            TrackType::Data => {
                write_sync_and_header(track.mode, relative_time, out);
                self.files.read_into(
                    track_number,
                    relative_sector_number,
                    &mut out[SECTOR_HEADER_LEN..BYTES_PER_SECTOR as usize],
                )?;
                if track.mode == TrackMode::Mode1 {
                    scrambler::scramble(&mut out[SECTOR_HEADER_LEN..BYTES_PER_SECTOR as usize]);
                }
            }
            TrackType::Audio => {
                self.files.read_into(
                    track_number,
                    relative_sector_number,
                    &mut out[..BYTES_PER_SECTOR as usize],
                )?;
                if byte_order == ByteOrder::BigEndian {
                    byte_swap_audio(&mut out[..BYTES_PER_SECTOR as usize]);
                }
            }
        }

        Ok(())
    }
}

fn byte_swap_audio(sector: &mut [u8]) {
    for pair in sector.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

fn write_sync_and_header(mode: TrackMode, time: CdTime, out: &mut [u8]) {
    let (bcd_m, bcd_s, bcd_f) = time.to_bcd();
    out[..SECTOR_HEADER_LEN].copy_from_slice(&[
        0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, bcd_m, bcd_s,
        bcd_f, mode.header_byte(),
    ]);
}

fn write_fake_pregap(mode: TrackMode, time: CdTime, out: &mut [u8]) {
    write_sync_and_header(mode, time, out);
    out[SECTOR_HEADER_LEN..BYTES_PER_SECTOR as usize].fill(0);
}

fn open_track_files(
    container_path: &Path,
    track_metadata: &[TrackMetadata],
) -> CdRomResult<HashMap<String, TrackFile>> {
    let parent_dir = container_path
        .parent()
        .ok_or_else(|| CdRomError::CueParentDir(container_path.display().to_string()))?;

    let file_names: HashSet<_> =
        track_metadata.iter().map(|metadata| metadata.file_name.clone()).collect();

    let mut files = HashMap::with_capacity(file_names.len());
    for file_name in file_names {
        if file_name.is_empty() {
            continue;
        }
        let file_path = parent_dir.join(&file_name);
        let file = File::open(&file_path)
            .map_err(|source| CdRomError::BinOpen { path: file_path.display().to_string(), source })?;
        files.insert(file_name, TrackFile { file: BufReader::new(file), position: 0 });
    }

    Ok(files)
}

// ---- CUE parsing -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ParsedTrack {
    number: u8,
    mode: TrackMode,
    byte_order: ByteOrder,
    pregap_len: Option<CdTime>,
    pause_start: Option<CdTime>,
    track_start: CdTime,
}

#[derive(Debug, Clone)]
struct ParsedFile {
    file_name: String,
    tracks: Vec<ParsedTrack>,
}

#[derive(Debug, Clone, Default)]
struct CueParser {
    files: Vec<ParsedFile>,
    tracks: Vec<ParsedTrack>,
    current_file: Option<String>,
    current_byte_order: ByteOrder,
    current_track: Option<(u8, TrackMode)>,
    last_track_number: Option<u8>,
    pregap_len: Option<CdTime>,
    pause_start: Option<CdTime>,
    track_start: Option<CdTime>,
}

impl CueParser {
    fn new() -> Self {
        Self::default()
    }

    fn parse(mut self, file: &str) -> CdRomResult<Vec<ParsedFile>> {
        for line in file.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("FILE ") {
                self.parse_file_line(line)?;
            } else if trimmed.starts_with("TRACK ") {
                self.parse_track_line(line)?;
            } else if trimmed.starts_with("INDEX ") {
                self.parse_index_line(line)?;
            } else if trimmed.starts_with("PREGAP ") {
                self.parse_pregap_line(line)?;
            }
        }

        self.push_file()?;

        if self.files.is_empty() {
            return Err(CdRomError::CueParse("CUE file has no tracks".into()));
        }

        Ok(self.files)
    }

    fn parse_file_line(&mut self, line: &str) -> CdRomResult<()> {
        self.push_file()?;

        static RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r#"FILE "(.*)" (BINARY|MOTOROLA|WAVE)"#).unwrap());

        let captures =
            RE.captures(line).ok_or_else(|| CdRomError::CueInvalidFileLine(line.into()))?;
        self.current_file = Some(captures.get(1).unwrap().as_str().into());
        self.current_byte_order = match captures.get(2).unwrap().as_str() {
            "MOTOROLA" => ByteOrder::BigEndian,
            _ => ByteOrder::LittleEndian,
        };

        Ok(())
    }

    fn parse_track_line(&mut self, line: &str) -> CdRomResult<()> {
        self.push_track()?;

        static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"TRACK ([^ ]*) ([^ ]*)").unwrap());

        let captures =
            RE.captures(line).ok_or_else(|| CdRomError::CueInvalidTrackLine(line.into()))?;
        let track_number = captures
            .get(1)
            .unwrap()
            .as_str()
            .parse::<u8>()
            .map_err(|_| CdRomError::CueInvalidTrackLine(line.into()))?;
        let mode = captures
            .get(2)
            .unwrap()
            .as_str()
            .parse::<TrackMode>()
            .map_err(|_| CdRomError::CueInvalidTrackLine(line.into()))?;

        self.current_track = Some((track_number, mode));

        Ok(())
    }

    fn parse_index_line(&mut self, line: &str) -> CdRomResult<()> {
        static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"INDEX ([^ ]*) ([^ ]*)").unwrap());

        let captures =
            RE.captures(line).ok_or_else(|| CdRomError::CueInvalidIndexLine(line.into()))?;
        let index_number = captures.get(1).unwrap();
        let start_time = captures
            .get(2)
            .unwrap()
            .as_str()
            .parse::<CdTime>()
            .map_err(|_| CdRomError::CueInvalidIndexLine(line.into()))?;

        match index_number.as_str() {
            "00" => self.pause_start = Some(start_time),
            "01" => self.track_start = Some(start_time),
            _ => return Err(CdRomError::CueInvalidIndexLine(line.into())),
        }

        Ok(())
    }

    fn parse_pregap_line(&mut self, line: &str) -> CdRomResult<()> {
        static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PREGAP ([^ ]*)").unwrap());

        let captures =
            RE.captures(line).ok_or_else(|| CdRomError::CueInvalidPregapLine(line.into()))?;
        self.pregap_len = Some(
            captures
                .get(1)
                .unwrap()
                .as_str()
                .parse::<CdTime>()
                .map_err(|_| CdRomError::CueInvalidPregapLine(line.into()))?,
        );

        Ok(())
    }

    fn push_file(&mut self) -> CdRomResult<()> {
        self.push_track()?;

        let Some(current_file) = self.current_file.take() else { return Ok(()) };

        if self.tracks.is_empty() {
            return Err(CdRomError::CueParse(format!("no tracks listed for file '{current_file}'")));
        }

        self.files.push(ParsedFile { file_name: current_file, tracks: mem::take(&mut self.tracks) });

        Ok(())
    }

    fn push_track(&mut self) -> CdRomResult<()> {
        let Some((track_number, mode)) = self.current_track.take() else { return Ok(()) };

        match self.last_track_number {
            None if track_number != 1 => {
                return Err(CdRomError::CueParse(format!(
                    "expected first track to be 01, was {track_number}"
                )));
            }
            Some(last) if track_number != last + 1 => {
                return Err(CdRomError::CueParse(format!(
                    "tracks out of order; track {track_number} after {last}"
                )));
            }
            _ => {}
        }
        self.last_track_number = Some(track_number);

        let Some(track_start) = self.track_start.take() else {
            return Err(CdRomError::CueParse(format!("no start time found for track {track_number}")));
        };

        self.tracks.push(ParsedTrack {
            number: track_number,
            mode,
            byte_order: self.current_byte_order,
            pregap_len: self.pregap_len.take(),
            pause_start: self.pause_start.take(),
            track_start,
        });

        Ok(())
    }
}

fn to_cue_sheet(
    parsed_files: Vec<ParsedFile>,
    cue_path: &Path,
) -> CdRomResult<(CueSheet, Vec<TrackMetadata>)> {
    let cue_parent_dir = cue_path
        .parent()
        .ok_or_else(|| CdRomError::CueParentDir(cue_path.display().to_string()))?;

    let mut absolute_start_time = CdTime::ZERO;
    let mut tracks = Vec::new();
    let mut track_metadata = Vec::new();

    for ParsedFile { file_name, tracks: parsed_tracks } in parsed_files {
        let bin_path = cue_parent_dir.join(&file_name);
        let file_metadata = fs::metadata(&bin_path)
            .map_err(|source| CdRomError::FsMetadata { path: bin_path.display().to_string(), source })?;
        let file_len_sectors = (file_metadata.len() / BYTES_PER_SECTOR) as u32;

        for i in 0..parsed_tracks.len() {
            let track = &parsed_tracks[i];
            let track_type = track.mode.to_type();
            let pregap_len = match track_type {
                TrackType::Data => CdTime::new(0, 2, 0),
                TrackType::Audio => track.pregap_len.unwrap_or(CdTime::ZERO),
            };
            let pause_len =
                track.pause_start.map_or(CdTime::ZERO, |pause_start| track.track_start - pause_start);

            let is_last_track_in_file = i == parsed_tracks.len() - 1;
            let data_end_time = if is_last_track_in_file {
                CdTime::from_sector_number(file_len_sectors)
            } else {
                let next_track = &parsed_tracks[i + 1];
                next_track.pause_start.unwrap_or(next_track.track_start)
            };

            let postgap_len = track_type.default_postgap_len();
            let padded_track_len =
                pregap_len + pause_len + (data_end_time - track.track_start) + postgap_len;

            tracks.push(Track {
                number: track.number,
                mode: track.mode,
                track_type,
                start_time: absolute_start_time,
                end_time: absolute_start_time + padded_track_len,
                pregap_len,
                pause_len,
                postgap_len,
                byte_order: track.byte_order,
            });
            track_metadata.push(TrackMetadata {
                file_name: file_name.clone(),
                time_in_file: track.pause_start.unwrap_or(track.track_start),
            });

            absolute_start_time += padded_track_len;
        }
    }

    cue::finalize_track_list(&mut tracks);

    log::trace!("parsed cue sheet:\n{tracks:#?}");

    assert!(
        cue::tracks_are_continuous(&tracks),
        "tracks in parsed CUE sheet are not continuous; this is a bug"
    );

    Ok((CueSheet::new(tracks), track_metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_line_regex_detects_motorola() {
        let parser = CueParser::new();
        let mut parser = parser;
        parser.parse_file_line(r#"FILE "audio.bin" MOTOROLA"#).unwrap();
        assert_eq!(parser.current_byte_order, ByteOrder::BigEndian);
    }
}
