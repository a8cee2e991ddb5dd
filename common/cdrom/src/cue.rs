//! Code for parsing and representing CUE sheets

#[cfg(test)]
mod tests;

use crate::cdtime::CdTime;
use crate::{DiscError, DiscResult};
use bincode::{Decode, Encode};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum TrackMode {
    // 2048-byte sectors, payload only
    Mode1_2048,
    // 2352-byte raw sectors: 16-byte header + 2048-byte payload + 288 ECC bytes
    Mode1_2352,
    // 2352-byte sectors of interleaved stereo LPCM
    Audio,
}

impl TrackMode {
    /// Byte stride between consecutive sectors in the BIN file
    #[must_use]
    pub fn sector_len(self) -> u64 {
        match self {
            Self::Mode1_2048 => 2048,
            Self::Mode1_2352 | Self::Audio => crate::BYTES_PER_SECTOR,
        }
    }

    /// Byte offset of the 2048-byte data payload within a sector
    #[must_use]
    pub fn data_offset(self) -> u64 {
        match self {
            Self::Mode1_2352 => 16,
            Self::Mode1_2048 | Self::Audio => 0,
        }
    }

    #[must_use]
    pub fn to_type(self) -> TrackType {
        match self {
            Self::Mode1_2048 | Self::Mode1_2352 => TrackType::Data,
            Self::Audio => TrackType::Audio,
        }
    }
}

impl FromStr for TrackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MODE1/2048" => Ok(Self::Mode1_2048),
            "MODE1/2352" => Ok(Self::Mode1_2352),
            "AUDIO" => Ok(Self::Audio),
            _ => Err(format!("unsupported CD track type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum TrackType {
    Data,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Track {
    pub number: u8,
    pub mode: TrackMode,
    pub track_type: TrackType,
    pub file_name: String,
    /// Byte offset of the track's INDEX 01 position within its BIN file
    pub start_byte: u64,
    /// Addressable sectors in the track
    pub sector_len: u32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CueSheet {
    tracks: Vec<Track>,
}

impl CueSheet {
    fn new(tracks: Vec<Track>) -> Self {
        assert!(!tracks.is_empty(), "track list must not be empty");

        Self { tracks }
    }

    #[must_use]
    pub fn track(&self, track_number: u8) -> Option<&Track> {
        track_number.checked_sub(1).and_then(|i| self.tracks.get(usize::from(i)))
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.iter()
    }

    #[must_use]
    pub fn last_track_number(&self) -> u8 {
        self.tracks.len() as u8
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub(crate) struct ParsedTrack {
    number: u8,
    mode: TrackMode,
    pause_start: Option<CdTime>,
    track_start: CdTime,
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub(crate) struct ParsedFile {
    pub(crate) file_name: String,
    tracks: Vec<ParsedTrack>,
}

#[derive(Debug, Clone)]
struct CueParser {
    files: Vec<ParsedFile>,
    tracks: Vec<ParsedTrack>,
    current_file: Option<String>,
    current_track: Option<(u8, TrackMode)>,
    last_track_number: Option<u8>,
    pause_start: Option<CdTime>,
    track_start: Option<CdTime>,
}

impl CueParser {
    fn new() -> Self {
        Self {
            files: vec![],
            tracks: vec![],
            current_file: None,
            current_track: None,
            last_track_number: None,
            pause_start: None,
            track_start: None,
        }
    }

    fn parse(mut self, file: &str) -> DiscResult<Vec<ParsedFile>> {
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
            return Err(DiscError::CueParse("CUE file has no tracks".into()));
        }

        Ok(self.files)
    }

    #[allow(clippy::items_after_statements)]
    fn parse_file_line(&mut self, line: &str) -> DiscResult<()> {
        self.push_file()?;

        static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"FILE "(.*)" BINARY"#).unwrap());

        let captures =
            RE.captures(line).ok_or_else(|| DiscError::CueInvalidFileLine(line.into()))?;
        let file_name = captures.get(1).unwrap();
        self.current_file = Some(file_name.as_str().into());

        Ok(())
    }

    #[allow(clippy::items_after_statements)]
    fn parse_track_line(&mut self, line: &str) -> DiscResult<()> {
        self.push_track()?;

        static RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"TRACK ([^ ]*) ([^ ]*)").unwrap());

        let captures =
            RE.captures(line).ok_or_else(|| DiscError::CueInvalidTrackLine(line.into()))?;
        let track_number = captures
            .get(1)
            .unwrap()
            .as_str()
            .parse::<u8>()
            .map_err(|_| DiscError::CueInvalidTrackLine(line.into()))?;
        let mode = captures
            .get(2)
            .unwrap()
            .as_str()
            .parse::<TrackMode>()
            .map_err(|_| DiscError::CueInvalidTrackLine(line.into()))?;

        self.current_track = Some((track_number, mode));

        Ok(())
    }

    #[allow(clippy::items_after_statements)]
    fn parse_index_line(&mut self, line: &str) -> DiscResult<()> {
        static RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"INDEX ([^ ]*) ([^ ]*)").unwrap());

        let captures =
            RE.captures(line).ok_or_else(|| DiscError::CueInvalidIndexLine(line.into()))?;
        let index_number = captures.get(1).unwrap();
        let start_time = captures
            .get(2)
            .unwrap()
            .as_str()
            .parse::<CdTime>()
            .map_err(|_| DiscError::CueInvalidIndexLine(line.into()))?;

        match index_number.as_str() {
            "00" => {
                self.pause_start = Some(start_time);
            }
            "01" => {
                self.track_start = Some(start_time);
            }
            _ => {
                return Err(DiscError::CueInvalidIndexLine(line.into()));
            }
        }

        Ok(())
    }

    #[allow(clippy::items_after_statements)]
    fn parse_pregap_line(&mut self, line: &str) -> DiscResult<()> {
        static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PREGAP ([^ ]*)").unwrap());

        let captures =
            RE.captures(line).ok_or_else(|| DiscError::CueInvalidPregapLine(line.into()))?;
        let pregap_len = captures
            .get(1)
            .unwrap()
            .as_str()
            .parse::<CdTime>()
            .map_err(|_| DiscError::CueInvalidPregapLine(line.into()))?;

        // Pregap silence is virtual; it occupies no bytes in the BIN file
        log::trace!("Ignoring PREGAP of {pregap_len}");

        Ok(())
    }

    fn push_file(&mut self) -> DiscResult<()> {
        self.push_track()?;

        let Some(current_file) = self.current_file.take() else { return Ok(()) };

        if self.tracks.is_empty() {
            return Err(DiscError::CueParse(format!("No tracks listed for file '{current_file}'")));
        }

        self.files
            .push(ParsedFile { file_name: current_file, tracks: mem::take(&mut self.tracks) });

        Ok(())
    }

    fn push_track(&mut self) -> DiscResult<()> {
        let Some((track_number, mode)) = self.current_track.take() else {
            return Ok(());
        };

        match self.last_track_number {
            None => {
                if track_number != 1 {
                    return Err(DiscError::CueParse(format!(
                        "Expected first track to be 01, was {track_number}"
                    )));
                }
            }
            Some(last_track_number) => {
                if track_number != last_track_number + 1 {
                    return Err(DiscError::CueParse(format!(
                        "Tracks out of order; track {track_number} after {last_track_number}"
                    )));
                }
            }
        }
        self.last_track_number = Some(track_number);

        let Some(track_start) = self.track_start.take() else {
            return Err(DiscError::CueParse(format!(
                "No start time found for track {track_number}"
            )));
        };

        self.tracks.push(ParsedTrack {
            number: track_number,
            mode,
            pause_start: self.pause_start.take(),
            track_start,
        });

        Ok(())
    }
}

pub(crate) fn parse(cue_contents: &str) -> DiscResult<Vec<ParsedFile>> {
    CueParser::new().parse(cue_contents)
}

/// Lay the parsed tracks out over their BIN files and produce the final
/// track list.
///
/// Byte offsets are accumulated per file so that mixed-mode files (a 2048-byte
/// data track followed by 2352-byte audio tracks) address correctly: the gap
/// between two tracks is counted at the stride of whichever track the gap's
/// sectors belong to (the INDEX 00 pause belongs to the following track).
pub(crate) fn to_cue_sheet(
    parsed_files: &[ParsedFile],
    file_len: impl Fn(&str) -> u64,
) -> DiscResult<CueSheet> {
    let mut tracks = Vec::new();

    for ParsedFile { file_name, tracks: parsed_tracks } in parsed_files {
        let file_len_bytes = file_len(file_name);
        let mut start_byte =
            u64::from(parsed_tracks[0].track_start.to_sector_number()) * parsed_tracks[0].mode.sector_len();

        for i in 0..parsed_tracks.len() {
            let track = &parsed_tracks[i];
            let track_start_sector = track.track_start.to_sector_number();

            let is_last_track_in_file = i == parsed_tracks.len() - 1;
            let (sector_len, next_start_byte) = if is_last_track_in_file {
                let remaining = file_len_bytes.saturating_sub(start_byte);
                ((remaining / track.mode.sector_len()) as u32, file_len_bytes)
            } else {
                let next = &parsed_tracks[i + 1];
                let pause_start_sector =
                    next.pause_start.unwrap_or(next.track_start).to_sector_number();
                let next_start_sector = next.track_start.to_sector_number();
                if pause_start_sector < track_start_sector
                    || next_start_sector < pause_start_sector
                {
                    return Err(DiscError::CueParse(format!(
                        "Track {} starts before track {}",
                        next.number, track.number
                    )));
                }

                let sector_len = pause_start_sector - track_start_sector;
                let next_start_byte = start_byte
                    + u64::from(sector_len) * track.mode.sector_len()
                    + u64::from(next_start_sector - pause_start_sector) * next.mode.sector_len();
                (sector_len, next_start_byte)
            };

            tracks.push(Track {
                number: track.number,
                mode: track.mode,
                track_type: track.mode.to_type(),
                file_name: file_name.clone(),
                start_byte,
                sector_len,
            });

            start_byte = next_start_byte;
        }
    }

    log::trace!("Parsed cue sheet:\n{tracks:#?}");

    Ok(CueSheet::new(tracks))
}
