//! CUE/BIN disc image access: CUE sheet parsing, track-aware BIN file reads,
//! and a track/sector/frame cursor over the disc.

pub mod cdtime;
pub mod cue;
pub mod reader;

use std::io;
use thiserror::Error;

/// Raw size of an audio or MODE1/2352 sector in a BIN file
pub const BYTES_PER_SECTOR: u64 = 2352;

/// Data payload surfaced to callers, regardless of the underlying track mode
pub const DATA_SECTOR_LEN: usize = 2048;

/// Stereo sample pairs in one audio sector: 2352 bytes / 4 bytes per frame
pub const AUDIO_FRAMES_PER_SECTOR: u32 = 588;

#[derive(Debug, Error)]
pub enum DiscError {
    #[error("Unable to determine parent directory of CUE file '{0}'")]
    CueParentDir(String),
    #[error("Error parsing CUE file: {0}")]
    CueParse(String),
    #[error("Invalid/unsupported FILE line in CUE file: {0}")]
    CueInvalidFileLine(String),
    #[error("Invalid/unsupported TRACK line in CUE file: {0}")]
    CueInvalidTrackLine(String),
    #[error("Invalid/unsupported INDEX line in CUE file: {0}")]
    CueInvalidIndexLine(String),
    #[error("Invalid/unsupported PREGAP line in CUE file: {0}")]
    CueInvalidPregapLine(String),
    #[error("Error opening CUE file '{path}': {source}")]
    CueOpen {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Error opening BIN file '{path}': {source}")]
    BinOpen {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error reading from disc: {0}")]
    DiscReadIo(#[source] io::Error),
    #[error("Data sector read requested on audio track {track_number}")]
    WrongTrackType { track_number: u8 },
    #[error("Sector {sector} is out of range for track {track_number}")]
    SectorOutOfRange { track_number: u8, sector: u32 },
}

pub type DiscResult<T> = Result<T, DiscError>;
