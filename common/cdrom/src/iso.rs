//! Heuristic handling of a bare `.iso` image: a single MODE1 data track with a synthesized
//! 2-second pregap and no audio tracks at all.

use crate::cdtime::CdTime;
use crate::cue::{ByteOrder, CueSheet, Track, TrackMode, TrackType};
use crate::{BYTES_PER_SECTOR, CdRomError, CdRomResult};
use std::fs;
use std::path::Path;

/// Build the single-track cue sheet implied by a raw ISO image.
///
/// # Errors
///
/// Returns an error if the file's metadata cannot be read.
pub fn build_cue_sheet<P: AsRef<Path>>(iso_path: P) -> CdRomResult<CueSheet> {
    let iso_path = iso_path.as_ref();
    let metadata = fs::metadata(iso_path)
        .map_err(|source| CdRomError::FsMetadata { path: iso_path.display().to_string(), source })?;

    let len_sectors = (metadata.len() / BYTES_PER_SECTOR) as u32;
    let pregap_len = CdTime::new(0, 2, 0);
    let postgap_len = TrackType::Data.default_postgap_len();
    let data_len = CdTime::from_sector_number(len_sectors);

    let track = Track {
        number: 1,
        mode: TrackMode::Mode1,
        track_type: TrackType::Data,
        start_time: CdTime::ZERO,
        end_time: pregap_len + data_len + postgap_len,
        pregap_len,
        pause_len: CdTime::ZERO,
        postgap_len,
        byte_order: ByteOrder::LittleEndian,
    };

    Ok(CueSheet::new(vec![track]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_track_with_two_second_pregap() {
        let path = std::env::temp_dir().join(format!("cdrom-iso-test-{:x}.iso", std::process::id()));
        fs::write(&path, vec![0_u8; 2352 * 10]).unwrap();

        let sheet = build_cue_sheet(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(sheet.tracks().len(), 1);
        assert_eq!(sheet.track(1).pregap_len, CdTime::new(0, 2, 0));
    }
}
