//! Parsed representation of a CUE sheet (or an equivalent TOC/ISO layout).

use crate::cdtime::CdTime;
use bincode::{Decode, Encode};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum TrackMode {
    Mode1,
    Mode2,
    Audio,
}

impl TrackMode {
    #[must_use]
    pub fn to_type(self) -> TrackType {
        match self {
            Self::Mode1 | Self::Mode2 => TrackType::Data,
            Self::Audio => TrackType::Audio,
        }
    }

    /// The byte immediately following the synthesized 12-byte sync pattern in a data sector.
    #[must_use]
    pub fn header_byte(self) -> u8 {
        match self {
            Self::Mode1 => 0x01,
            Self::Mode2 => 0x02,
            Self::Audio => 0x00,
        }
    }
}

impl FromStr for TrackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MODE1/2352" | "MODE1" | "MODE1_RAW" => Ok(Self::Mode1),
            "MODE2/2352" | "MODE2/2336" | "MODE2" | "MODE2_RAW" | "MODE2_FORM1"
            | "MODE2_FORM2" => Ok(Self::Mode2),
            "AUDIO" => Ok(Self::Audio),
            _ => Err(format!("unsupported CD track mode: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum TrackType {
    Data,
    Audio,
}

impl TrackType {
    #[must_use]
    pub fn default_postgap_len(self) -> CdTime {
        match self {
            Self::Data => CdTime::new(0, 2, 0),
            Self::Audio => CdTime::ZERO,
        }
    }
}

/// Whether a track's backing audio samples need a 16-bit byte swap on read, as requested by the
/// CUE `FILE ... MOTOROLA` keyword (big-endian source audio).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Track {
    pub number: u8,
    pub mode: TrackMode,
    pub track_type: TrackType,
    pub start_time: CdTime,
    pub end_time: CdTime,
    pub pregap_len: CdTime,
    pub pause_len: CdTime,
    pub postgap_len: CdTime,
    pub byte_order: ByteOrder,
}

impl Track {
    #[must_use]
    pub fn effective_start_time(&self) -> CdTime {
        self.start_time + self.pregap_len + self.pause_len
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CueSheet {
    tracks: Vec<Track>,
    track_start_times: Vec<CdTime>,
}

impl CueSheet {
    /// # Panics
    ///
    /// Panics if the track list is empty.
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        assert!(!tracks.is_empty(), "track list must not be empty");

        let track_start_times = tracks.iter().map(|track| track.start_time).collect();

        Self { tracks, track_start_times }
    }

    #[must_use]
    pub fn track(&self, track_number: u8) -> &Track {
        &self.tracks[(track_number - 1) as usize]
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn first_track(&self) -> &Track {
        self.tracks.first().unwrap()
    }

    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn last_track(&self) -> &Track {
        self.tracks.last().unwrap()
    }

    /// Find the track containing the specified time. Returns `None` if the time is past the end
    /// of the disc.
    #[must_use]
    pub fn find_track_by_time(&self, time: CdTime) -> Option<&Track> {
        match self.track_start_times.binary_search(&time) {
            Ok(i) => Some(&self.tracks[i]),
            Err(i) => {
                if i < self.tracks.len() {
                    Some(&self.tracks[i - 1])
                } else {
                    let last_track = self.last_track();
                    (time <= last_track.end_time).then_some(last_track)
                }
            }
        }
    }
}

#[must_use]
pub(crate) fn tracks_are_continuous(tracks: &[Track]) -> bool {
    if tracks[0].start_time != CdTime::ZERO {
        return false;
    }

    for window in tracks.windows(2) {
        let [track, next] = window else { unreachable!("windows(2)") };
        if next.start_time != track.end_time {
            return false;
        }
    }

    true
}

pub(crate) fn finalize_track_list(tracks: &mut [Track]) {
    let last_track = tracks.last_mut().unwrap();
    if last_track.postgap_len == CdTime::ZERO {
        last_track.postgap_len = CdTime::new(0, 2, 0);
        last_track.end_time += CdTime::new(0, 2, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(number: u8, start: CdTime, end: CdTime) -> Track {
        Track {
            number,
            mode: TrackMode::Mode1,
            track_type: TrackType::Data,
            start_time: start,
            end_time: end,
            pregap_len: CdTime::new(0, 2, 0),
            pause_len: CdTime::ZERO,
            postgap_len: CdTime::ZERO,
            byte_order: ByteOrder::LittleEndian,
        }
    }

    #[test]
    fn find_track_by_time_binary_search() {
        let sheet = CueSheet::new(vec![
            track(1, CdTime::ZERO, CdTime::new(0, 10, 0)),
            track(2, CdTime::new(0, 10, 0), CdTime::new(0, 20, 0)),
        ]);

        assert_eq!(sheet.find_track_by_time(CdTime::new(0, 5, 0)).unwrap().number, 1);
        assert_eq!(sheet.find_track_by_time(CdTime::new(0, 10, 0)).unwrap().number, 2);
        assert_eq!(sheet.find_track_by_time(CdTime::new(0, 25, 0)), None);
    }
}
