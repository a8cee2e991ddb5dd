//! Disc image access with a track/sector/frame cursor

mod cuebin;
mod seekvec;

use crate::cue::{CueSheet, Track, TrackType};
use crate::reader::cuebin::CdBinFiles;
use crate::{AUDIO_FRAMES_PER_SECTOR, BYTES_PER_SECTOR, DATA_SECTOR_LEN, DiscError, DiscResult, cue};
use bincode::{Decode, Encode};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::fs::File;
use std::path::Path;

pub use seekvec::SeekableVec;

type CdBinFsFiles = CdBinFiles<File>;
type CdBinMemoryFiles = CdBinFiles<SeekableVec>;

#[derive(Debug)]
enum DiscReader {
    CueBin(CdBinFsFiles),
    CueBinMemory(CdBinMemoryFiles),
}

impl DiscReader {
    fn read_bytes(&mut self, file_name: &str, byte_addr: u64, out: &mut [u8]) -> DiscResult<()> {
        match self {
            Self::CueBin(bin_files) => bin_files.read_bytes(file_name, byte_addr, out),
            Self::CueBinMemory(bin_files) => bin_files.read_bytes(file_name, byte_addr, out),
        }
    }
}

/// Cursor into a disc: the current track, the sector within that track
/// (relative to its INDEX 01), and the audio frame within that sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct DiscPosition {
    pub track_number: u8,
    pub sector: u32,
    pub frame: u32,
}

impl Default for DiscPosition {
    fn default() -> Self {
        Self { track_number: 1, sector: 0, frame: 0 }
    }
}

#[derive(Debug)]
pub struct Disc {
    cue_sheet: CueSheet,
    reader: DiscReader,
    position: DiscPosition,
    sector_buffer: [u8; BYTES_PER_SECTOR as usize],
}

impl Disc {
    /// Open a CUE/BIN disc image, reading from the filesystem as needed.
    ///
    /// # Errors
    ///
    /// Will propagate any I/O error, and will return an error if the CUE
    /// sheet appears invalid.
    pub fn open<P: AsRef<Path>>(cue_path: P) -> DiscResult<Self> {
        let cue_path = cue_path.as_ref();

        let cue_contents = fs::read_to_string(cue_path)
            .map_err(|source| DiscError::CueOpen { path: cue_path.display().to_string(), source })?;
        let parent_dir = cue_path
            .parent()
            .ok_or_else(|| DiscError::CueParentDir(cue_path.display().to_string()))?;

        let parsed_files = cue::parse(&cue_contents)?;
        let bin_files = CdBinFiles::create(referenced_file_names(&parsed_files), |file_name| {
            File::open(parent_dir.join(file_name))
        })?;
        let cue_sheet =
            cue::to_cue_sheet(&parsed_files, |file_name| bin_files.file_len(file_name).unwrap_or(0))?;

        Ok(Self::with_reader(cue_sheet, DiscReader::CueBin(bin_files)))
    }

    /// Open a CUE/BIN disc image from memory.
    ///
    /// # Errors
    ///
    /// Will return an error if the CUE sheet appears invalid or references a
    /// BIN file that is not in `bin_files`.
    pub fn open_in_memory(
        cue_contents: &str,
        bin_files: HashMap<String, Vec<u8>>,
    ) -> DiscResult<Self> {
        let parsed_files = cue::parse(cue_contents)?;
        let bin_files = CdBinFiles::create(referenced_file_names(&parsed_files), |file_name| {
            bin_files.get(file_name).cloned().map(SeekableVec::new).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "BIN file not provided")
            })
        })?;
        let cue_sheet =
            cue::to_cue_sheet(&parsed_files, |file_name| bin_files.file_len(file_name).unwrap_or(0))?;

        Ok(Self::with_reader(cue_sheet, DiscReader::CueBinMemory(bin_files)))
    }

    fn with_reader(cue_sheet: CueSheet, reader: DiscReader) -> Self {
        Self {
            cue_sheet,
            reader,
            position: DiscPosition::default(),
            sector_buffer: [0; BYTES_PER_SECTOR as usize],
        }
    }

    #[must_use]
    pub fn cue(&self) -> &CueSheet {
        &self.cue_sheet
    }

    #[must_use]
    pub fn position(&self) -> DiscPosition {
        self.position
    }

    /// Restore a previously captured cursor. Returns false (leaving the
    /// cursor unchanged) if the position does not exist on this disc.
    pub fn set_position(&mut self, position: DiscPosition) -> bool {
        let Some(track) = self.cue_sheet.track(position.track_number) else { return false };

        // The cursor is allowed to rest exactly at the end of a track
        if position.sector > track.sector_len || position.frame >= AUDIO_FRAMES_PER_SECTOR {
            return false;
        }

        self.position = position;
        true
    }

    /// Move the cursor to the start (INDEX 01) of the given track, returning
    /// the track's type, or `None` if the track does not exist.
    pub fn seek_track(&mut self, track_number: u8) -> Option<TrackType> {
        let track = self.cue_sheet.track(track_number)?;
        let track_type = track.track_type;

        self.position = DiscPosition { track_number, sector: 0, frame: 0 };

        Some(track_type)
    }

    /// Move the cursor to a sector within the current track.
    pub fn seek_sector(&mut self, sector: u32) -> bool {
        if sector >= self.current_track().sector_len {
            return false;
        }

        self.position.sector = sector;
        self.position.frame = 0;
        true
    }

    /// Move the cursor to an audio frame index within the current track.
    pub fn seek_audio_frame(&mut self, frame_index: u32) -> bool {
        let sector = frame_index / AUDIO_FRAMES_PER_SECTOR;
        if sector >= self.current_track().sector_len {
            return false;
        }

        self.position.sector = sector;
        self.position.frame = frame_index % AUDIO_FRAMES_PER_SECTOR;
        true
    }

    /// Read the 2048-byte payload of the sector at the cursor and advance the
    /// cursor by one sector.
    ///
    /// `out` is zero-filled on every failure path.
    ///
    /// # Errors
    ///
    /// Returns an error if the current track is an audio track, if the cursor
    /// is at or past the end of the track, or if the underlying read fails.
    pub fn read_sector(&mut self, out: &mut [u8; DATA_SECTOR_LEN]) -> DiscResult<()> {
        let DiscPosition { track_number, sector, .. } = self.position;
        let track = self.cue_sheet.track(track_number).expect("cursor track always exists");

        if track.track_type != TrackType::Data {
            out.fill(0);
            return Err(DiscError::WrongTrackType { track_number });
        }
        if sector >= track.sector_len {
            out.fill(0);
            return Err(DiscError::SectorOutOfRange { track_number, sector });
        }

        let byte_addr = track.start_byte
            + u64::from(sector) * track.mode.sector_len()
            + track.mode.data_offset();
        self.reader.read_bytes(&track.file_name, byte_addr, out)?;

        self.position.sector += 1;
        self.position.frame = 0;

        Ok(())
    }

    /// Pull up to `max_frames` stereo frames from the cursor forward,
    /// stopping at the end of the track. Returns the number of frames
    /// written to `out`; the cursor advances past them.
    ///
    /// # Errors
    ///
    /// Returns an error if the current track is not an audio track or if the
    /// underlying read fails.
    ///
    /// # Panics
    ///
    /// Panics if `out` cannot hold `max_frames` stereo frames.
    pub fn read_audio_frames(&mut self, out: &mut [i16], max_frames: u32) -> DiscResult<u32> {
        assert!(out.len() >= max_frames as usize * 2);

        let DiscPosition { track_number, .. } = self.position;
        let track = self.cue_sheet.track(track_number).expect("cursor track always exists");
        if track.track_type != TrackType::Audio {
            return Err(DiscError::WrongTrackType { track_number });
        }

        let mut produced: u32 = 0;
        while produced < max_frames && self.position.sector < track.sector_len {
            let byte_addr =
                track.start_byte + u64::from(self.position.sector) * track.mode.sector_len();
            self.reader.read_bytes(&track.file_name, byte_addr, &mut self.sector_buffer)?;

            let start_frame = self.position.frame;
            let frames = (AUDIO_FRAMES_PER_SECTOR - start_frame).min(max_frames - produced);
            for i in 0..frames {
                let byte = ((start_frame + i) * 4) as usize;
                let sample_l =
                    i16::from_le_bytes([self.sector_buffer[byte], self.sector_buffer[byte + 1]]);
                let sample_r = i16::from_le_bytes([
                    self.sector_buffer[byte + 2],
                    self.sector_buffer[byte + 3],
                ]);

                let out_idx = ((produced + i) * 2) as usize;
                out[out_idx] = sample_l;
                out[out_idx + 1] = sample_r;
            }

            produced += frames;
            self.position.frame += frames;
            if self.position.frame == AUDIO_FRAMES_PER_SECTOR {
                self.position.frame = 0;
                self.position.sector += 1;
            }
        }

        Ok(produced)
    }

    fn current_track(&self) -> &Track {
        self.cue_sheet.track(self.position.track_number).expect("cursor track always exists")
    }
}

fn referenced_file_names(parsed_files: &[cue::ParsedFile]) -> HashSet<String> {
    parsed_files.iter().map(|file| file.file_name.clone()).collect()
}
