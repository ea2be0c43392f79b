//! TOC-format (cdrdao) disc descriptions.
//!
//! TOC files share the track/pregap shape of a CUE sheet but use cdrdao's own keyword set:
//! `TRACK <mode> [RW|RW_RAW]`, `DATAFILE "name" [length]`, `FILE "name" offset length`,
//! `SILENCE length`, and `START length` for the pregap. Subcode mode tags (`RW`/`RW_RAW`) are
//! recognised and discarded; this backend always synthesizes its own Q channel on read rather than
//! replaying captured subcode.

use crate::cdtime::CdTime;
use crate::cue;
use crate::cue::{ByteOrder, CueSheet, Track, TrackMode};
use crate::{CdRomError, CdRomResult};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub(crate) struct TocFileRef {
    pub file_name: Option<String>,
    pub is_silence: bool,
    pub length_sectors: Option<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedTocTrack {
    pub number: u8,
    pub mode: TrackMode,
    pub pregap_len: Option<CdTime>,
    pub file: TocFileRef,
}

fn parse_track_mode(token: &str) -> CdRomResult<TrackMode> {
    TrackMode::from_str(token)
        .map_err(|_| CdRomError::CueInvalidTrackLine(format!("TRACK {token}")))
}

/// Parse a `.toc` file's text contents into track metadata. File-length resolution (which
/// requires touching the filesystem) happens in [`crate::reader`].
pub(crate) fn parse_toc_text(text: &str) -> CdRomResult<Vec<ParsedTocTrack>> {
    let mut tracks = Vec::new();
    let mut current_track: Option<(u8, TrackMode)> = None;
    let mut current_pregap: Option<CdTime> = None;
    let mut current_file: Option<TocFileRef> = None;
    let mut next_number: u8 = 1;

    let push_track = |tracks: &mut Vec<ParsedTocTrack>,
                       current_track: &mut Option<(u8, TrackMode)>,
                       current_pregap: &mut Option<CdTime>,
                       current_file: &mut Option<TocFileRef>| {
        if let Some((number, mode)) = current_track.take() {
            tracks.push(ParsedTocTrack {
                number,
                mode,
                pregap_len: current_pregap.take(),
                file: current_file.take().unwrap_or(TocFileRef {
                    file_name: None,
                    is_silence: false,
                    length_sectors: None,
                }),
            });
        }
    };

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if let Some(rest) = line.strip_prefix("TRACK ") {
            push_track(&mut tracks, &mut current_track, &mut current_pregap, &mut current_file);

            let mode_token = rest.split_whitespace().next().unwrap_or("");
            let mode = parse_track_mode(mode_token)?;
            current_track = Some((next_number, mode));
            next_number += 1;
        } else if let Some(rest) = line.strip_prefix("DATAFILE ") {
            let file_name = extract_quoted(rest);
            current_file = Some(TocFileRef { file_name, is_silence: false, length_sectors: None });
        } else if let Some(rest) = line.strip_prefix("FILE ") {
            let file_name = extract_quoted(rest);
            current_file = Some(TocFileRef { file_name, is_silence: false, length_sectors: None });
        } else if let Some(rest) = line.strip_prefix("SILENCE ") {
            let sectors = rest.trim().parse::<u32>().ok();
            current_file = Some(TocFileRef {
                file_name: None,
                is_silence: true,
                length_sectors: sectors,
            });
        } else if let Some(rest) = line.strip_prefix("START ") {
            current_pregap = CdTime::from_str(rest.trim())
                .ok()
                .or_else(|| rest.trim().parse::<u32>().ok().map(CdTime::from_sector_number));
        }
    }

    push_track(&mut tracks, &mut current_track, &mut current_pregap, &mut current_file);

    if tracks.is_empty() {
        return Err(CdRomError::CueParse("TOC file has no tracks".into()));
    }

    Ok(tracks)
}

fn extract_quoted(s: &str) -> Option<String> {
    let start = s.find('"')? + 1;
    let end = start + s[start..].find('"')?;
    Some(s[start..end].to_string())
}

/// Build a [`CueSheet`] from parsed TOC tracks, given each referenced file's length in sectors
/// (already resolved by the caller via filesystem metadata).
pub(crate) fn build_cue_sheet(
    parsed: Vec<ParsedTocTrack>,
    file_len_sectors: impl Fn(&str) -> CdRomResult<u32>,
) -> CdRomResult<CueSheet> {
    let mut absolute_start_time = CdTime::ZERO;
    let mut tracks = Vec::with_capacity(parsed.len());

    for track in &parsed {
        let track_type = track.mode.to_type();
        let pregap_len = track.pregap_len.unwrap_or_else(|| track_type.default_postgap_len());

        let length_sectors = if let Some(len) = track.file.length_sectors {
            len
        } else if let Some(name) = &track.file.file_name {
            file_len_sectors(name)?
        } else {
            0
        };

        let data_len = CdTime::from_sector_number(length_sectors);
        let postgap_len = track_type.default_postgap_len();
        let padded_len = pregap_len + data_len + postgap_len;

        tracks.push(Track {
            number: track.number,
            mode: track.mode,
            track_type,
            start_time: absolute_start_time,
            end_time: absolute_start_time + padded_len,
            pregap_len,
            pause_len: CdTime::ZERO,
            postgap_len,
            byte_order: ByteOrder::LittleEndian,
        });

        absolute_start_time += padded_len;
    }

    cue::finalize_track_list(&mut tracks);

    Ok(CueSheet::new(tracks))
}

pub(crate) fn is_toc_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().extension().and_then(|ext| ext.to_str()) == Some("toc")
}
