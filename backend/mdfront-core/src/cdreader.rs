//! CD reader state machine: data sector access for the emulated CD-ROM
//! controller plus playlist-style CDDA playback feeding the mixer.
//!
//! Every real-time operation is total: it either succeeds or reports failure
//! with a fully zero-initialized output buffer, so the emulator's frame loop
//! never has to handle I/O faults.

use bincode::{Decode, Encode};
use cdrom::cue::TrackType;
use cdrom::reader::{Disc, DiscPosition};

pub const SECTOR_LEN: usize = cdrom::DATA_SECTOR_LEN;

const MEGA_CD_IDENTIFIER: &[u8; 14] = b"SEGADISCSYSTEM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum PlaybackSetting {
    /// Play to the end of the disc, crossing track boundaries
    #[default]
    All,
    /// Stop at the end of the current track
    Once,
    /// Loop the current track
    Repeat,
}

/// Snapshot of everything needed to restore the reader after a compound
/// operation or a save-state load: the disc cursor and the playback flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct CdReaderState {
    pub position: DiscPosition,
    pub playback_setting: PlaybackSetting,
    pub audio_playing: bool,
}

#[derive(Debug, Default)]
pub struct CdReader {
    disc: Option<Disc>,
    playback_setting: PlaybackSetting,
    audio_playing: bool,
}

impl CdReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, disc: Disc) {
        self.disc = Some(disc);
        self.audio_playing = false;
    }

    pub fn close(&mut self) {
        self.disc = None;
        self.audio_playing = false;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.disc.is_some()
    }

    /// Position at sector `sector_index` of the disc's data track. Fails if
    /// no disc is open or track 1 is not a data track.
    pub fn seek_to_sector(&mut self, sector_index: u32) -> bool {
        let Some(disc) = &mut self.disc else { return false };

        match disc.seek_track(1) {
            Some(TrackType::Data) => disc.seek_sector(sector_index),
            Some(TrackType::Audio) | None => false,
        }
    }

    /// Read the 2048-byte sector at the current position and advance.
    ///
    /// `sector` is zero-filled whenever this returns false.
    pub fn read_sector(&mut self, sector: &mut [u8; SECTOR_LEN]) -> bool {
        let success = match &mut self.disc {
            Some(disc) => disc.read_sector(sector).is_ok(),
            None => false,
        };

        if !success {
            sector.fill(0);
        }
        success
    }

    /// Read sector `sector_index` of the data track without disturbing the
    /// current position or playback state.
    ///
    /// `sector` is zero-filled whenever this returns false.
    pub fn read_sector_at(&mut self, sector: &mut [u8; SECTOR_LEN], sector_index: u32) -> bool {
        let mut success = false;
        if let Some(backup) = self.save_state() {
            success = self.seek_to_sector(sector_index) && self.read_sector(sector);
            if !self.load_state(&backup) {
                success = false;
            }
        }

        if !success {
            sector.fill(0);
        }
        success
    }

    /// Start audio playback from the beginning of `track_number`. Fails
    /// (leaving playback stopped) if the track does not exist or is not an
    /// audio track.
    pub fn play_audio(&mut self, track_number: u8, setting: PlaybackSetting) -> bool {
        let Some(disc) = &mut self.disc else { return false };

        self.audio_playing = false;

        if disc.seek_track(track_number) != Some(TrackType::Audio) {
            return false;
        }

        self.audio_playing = true;
        self.playback_setting = setting;
        true
    }

    /// Seek to an audio frame index within the current track. A failed seek
    /// stops playback.
    pub fn seek_to_frame(&mut self, frame_index: u32) -> bool {
        let Some(disc) = &mut self.disc else { return false };

        if !disc.seek_audio_frame(frame_index) {
            self.audio_playing = false;
            return false;
        }

        true
    }

    /// Pull up to `total_frames` stereo frames from the current audio
    /// position, applying the playback setting whenever a track runs out:
    /// All moves to the next track, Once stops (rewinding the cursor),
    /// Repeat restarts the track. Returns the number of frames written;
    /// trailing frames beyond the returned count are untouched.
    ///
    /// # Panics
    ///
    /// Panics if `sample_buffer` cannot hold `total_frames` stereo frames.
    pub fn read_audio(&mut self, sample_buffer: &mut [i16], total_frames: u32) -> u32 {
        assert!(sample_buffer.len() >= total_frames as usize * 2);

        if !self.audio_playing {
            return 0;
        }

        let mut frames_read: u32 = 0;
        while frames_read < total_frames {
            let Some(disc) = &mut self.disc else { return frames_read };

            let out = &mut sample_buffer[frames_read as usize * 2..];
            match disc.read_audio_frames(out, total_frames - frames_read) {
                Ok(frames) => frames_read += frames,
                Err(err) => {
                    log::warn!("CD audio read failed: {err}");
                    self.audio_playing = false;
                    return frames_read;
                }
            }

            if frames_read == total_frames {
                break;
            }

            // The current track is exhausted
            match self.playback_setting {
                PlaybackSetting::All => {
                    let current_track = self.disc.as_ref().unwrap().position().track_number;
                    let advanced = current_track
                        .checked_add(1)
                        .is_some_and(|next_track| self.play_audio(next_track, self.playback_setting));
                    if !advanced {
                        self.audio_playing = false;
                    }
                }
                PlaybackSetting::Once => {
                    self.audio_playing = false;
                    self.seek_to_frame(0);
                }
                PlaybackSetting::Repeat => {
                    self.seek_to_frame(0);
                }
            }

            if !self.audio_playing {
                break;
            }
        }

        frames_read
    }

    /// Returns `None` if no disc is open.
    #[must_use]
    pub fn save_state(&self) -> Option<CdReaderState> {
        let disc = self.disc.as_ref()?;

        Some(CdReaderState {
            position: disc.position(),
            playback_setting: self.playback_setting,
            audio_playing: self.audio_playing,
        })
    }

    /// Restore a previously saved state. Requires an open disc on which the
    /// saved position is still valid.
    pub fn load_state(&mut self, state: &CdReaderState) -> bool {
        let Some(disc) = &mut self.disc else { return false };

        if !disc.set_position(state.position) {
            return false;
        }

        self.playback_setting = state.playback_setting;
        self.audio_playing = state.audio_playing;
        true
    }

    /// Check the disc's boot sector for the Mega CD disc identifier. The
    /// probe must not disturb active audio playback, which the transactional
    /// sector read guarantees.
    pub fn is_mega_cd_disc(&mut self) -> bool {
        let mut first_sector = [0; SECTOR_LEN];
        self.read_sector_at(&mut first_sector, 0);

        first_sector[..MEGA_CD_IDENTIFIER.len()] == *MEGA_CD_IDENTIFIER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdrom::{AUDIO_FRAMES_PER_SECTOR, BYTES_PER_SECTOR};
    use std::collections::HashMap;

    const SECTOR: usize = BYTES_PER_SECTOR as usize;

    // 4 data sectors, then audio tracks of 3 and 2 sectors
    const TEST_CUE: &str = "
FILE \"disc.bin\" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 01 00:00:04
  TRACK 03 AUDIO
    INDEX 01 00:00:07
";

    // Data, audio, data: exercises the mode=All stop on a data track
    const DATA_AFTER_AUDIO_CUE: &str = "
FILE \"disc.bin\" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 01 00:00:02
  TRACK 03 MODE1/2352
    INDEX 01 00:00:04
";

    fn fill_audio_sectors(bin: &mut [u8], sectors: std::ops::Range<usize>, sample: i16) {
        let [lo, hi] = sample.to_le_bytes();
        for chunk in bin[sectors.start * SECTOR..sectors.end * SECTOR].chunks_exact_mut(2) {
            chunk[0] = lo;
            chunk[1] = hi;
        }
    }

    fn open_test_reader(mega_cd: bool) -> CdReader {
        let mut bin = vec![0; 9 * SECTOR];
        if mega_cd {
            bin[16..16 + 14].copy_from_slice(b"SEGADISCSYSTEM");
        }
        // Remaining data payloads hold their sector number
        for sector in 1..4 {
            bin[sector * SECTOR + 16..sector * SECTOR + 2064].fill(sector as u8);
        }
        fill_audio_sectors(&mut bin, 4..7, 0x0202);
        fill_audio_sectors(&mut bin, 7..9, 0x0303);

        let disc = Disc::open_in_memory(TEST_CUE, HashMap::from([("disc.bin".into(), bin)])).unwrap();
        let mut reader = CdReader::new();
        reader.open(disc);
        reader
    }

    fn open_data_after_audio_reader() -> CdReader {
        let mut bin = vec![0; 6 * SECTOR];
        fill_audio_sectors(&mut bin, 2..4, 0x0202);

        let disc = Disc::open_in_memory(DATA_AFTER_AUDIO_CUE, HashMap::from([("disc.bin".into(), bin)]))
            .unwrap();
        let mut reader = CdReader::new();
        reader.open(disc);
        reader
    }

    #[test]
    fn closed_reader_operations_are_total() {
        let mut reader = CdReader::new();

        let mut sector = [0xFF; SECTOR_LEN];
        assert!(!reader.read_sector(&mut sector));
        assert_eq!(sector, [0; SECTOR_LEN]);

        assert!(!reader.seek_to_sector(0));
        assert!(!reader.play_audio(2, PlaybackSetting::All));

        let mut samples = [0; 20];
        assert_eq!(reader.read_audio(&mut samples, 10), 0);

        assert!(reader.save_state().is_none());
        assert!(!reader.is_mega_cd_disc());
    }

    #[test]
    fn reads_data_sectors_sequentially() {
        let mut reader = open_test_reader(false);
        assert!(reader.seek_to_sector(1));

        let mut sector = [0; SECTOR_LEN];
        for expected in 1..4_u8 {
            assert!(reader.read_sector(&mut sector));
            assert!(sector.iter().all(|&byte| byte == expected), "sector {expected}");
        }

        // Past the end of the data track
        assert!(!reader.read_sector(&mut sector));
        assert_eq!(sector, [0; SECTOR_LEN]);
    }

    #[test]
    fn read_sector_at_restores_the_cursor() {
        let mut reader = open_test_reader(false);
        assert!(reader.seek_to_sector(2));
        let before = reader.save_state().unwrap();

        let mut sector = [0; SECTOR_LEN];
        assert!(reader.read_sector_at(&mut sector, 3));
        assert!(sector.iter().all(|&byte| byte == 3));
        assert_eq!(reader.save_state().unwrap(), before);

        // Out-of-range reads fail, zero-fill, and still restore
        let mut sector = [0xFF; SECTOR_LEN];
        assert!(!reader.read_sector_at(&mut sector, 100));
        assert_eq!(sector, [0; SECTOR_LEN]);
        assert_eq!(reader.save_state().unwrap(), before);
    }

    #[test]
    fn probe_detects_mega_cd_discs() {
        assert!(open_test_reader(true).is_mega_cd_disc());
        assert!(!open_test_reader(false).is_mega_cd_disc());
    }

    #[test]
    fn probe_does_not_disturb_audio_playback() {
        let mut reader = open_test_reader(true);
        assert!(reader.play_audio(2, PlaybackSetting::All));

        let mut samples = vec![0; 100 * 2];
        assert_eq!(reader.read_audio(&mut samples, 100), 100);
        let before = reader.save_state().unwrap();

        assert!(reader.is_mega_cd_disc());

        assert_eq!(reader.save_state().unwrap(), before);
        assert!(before.audio_playing);
    }

    #[test]
    fn playback_mode_all_crosses_track_boundaries() {
        let mut reader = open_test_reader(false);
        assert!(reader.play_audio(2, PlaybackSetting::All));
        // 10 frames before the end of track 2
        assert!(reader.seek_to_frame(3 * AUDIO_FRAMES_PER_SECTOR - 10));

        let mut samples = vec![0; 100 * 2];
        assert_eq!(reader.read_audio(&mut samples, 100), 100);

        assert!(samples[..10 * 2].iter().all(|&sample| sample == 0x0202));
        assert!(samples[10 * 2..].iter().all(|&sample| sample == 0x0303));

        let state = reader.save_state().unwrap();
        assert!(state.audio_playing);
        assert_eq!(state.position.track_number, 3);
    }

    #[test]
    fn playback_mode_all_stops_at_the_end_of_the_disc() {
        let mut reader = open_test_reader(false);
        assert!(reader.play_audio(3, PlaybackSetting::All));
        assert!(reader.seek_to_frame(2 * AUDIO_FRAMES_PER_SECTOR - 10));

        let mut samples = vec![0; 100 * 2];
        assert_eq!(reader.read_audio(&mut samples, 100), 10);
        assert!(!reader.save_state().unwrap().audio_playing);

        assert_eq!(reader.read_audio(&mut samples, 100), 0);
    }

    #[test]
    fn playback_mode_all_stops_on_a_data_track() {
        let mut reader = open_data_after_audio_reader();
        assert!(reader.play_audio(2, PlaybackSetting::All));

        // Track 2 is 2 sectors long; ask for more than it holds
        let frames = 2 * AUDIO_FRAMES_PER_SECTOR;
        let mut samples = vec![0; (frames as usize + 50) * 2];
        assert_eq!(reader.read_audio(&mut samples, frames + 50), frames);
        assert!(!reader.save_state().unwrap().audio_playing);
    }

    #[test]
    fn playback_mode_once_stops_and_rewinds() {
        let mut reader = open_test_reader(false);
        assert!(reader.play_audio(3, PlaybackSetting::Once));
        assert!(reader.seek_to_frame(2 * AUDIO_FRAMES_PER_SECTOR - 10));

        let mut samples = vec![0; 100 * 2];
        assert_eq!(reader.read_audio(&mut samples, 100), 10);

        let state = reader.save_state().unwrap();
        assert!(!state.audio_playing);
        // The cursor rewound to the start of the track
        assert_eq!(state.position, DiscPosition { track_number: 3, sector: 0, frame: 0 });
    }

    #[test]
    fn playback_mode_repeat_loops_the_track() {
        let mut reader = open_test_reader(false);
        assert!(reader.play_audio(3, PlaybackSetting::Repeat));
        assert!(reader.seek_to_frame(2 * AUDIO_FRAMES_PER_SECTOR - 10));

        let mut samples = vec![0; 100 * 2];
        assert_eq!(reader.read_audio(&mut samples, 100), 100);
        assert!(samples.iter().all(|&sample| sample == 0x0303));

        let state = reader.save_state().unwrap();
        assert!(state.audio_playing);
        assert_eq!(state.position, DiscPosition { track_number: 3, sector: 0, frame: 90 });
    }

    #[test]
    fn state_backup_round_trips() {
        let mut reader = open_test_reader(true);
        assert!(reader.play_audio(2, PlaybackSetting::Repeat));
        let mut samples = vec![0; 40 * 2];
        reader.read_audio(&mut samples, 40);
        let saved = reader.save_state().unwrap();

        // Churn the reader state
        assert!(reader.seek_to_sector(2));
        let mut sector = [0; SECTOR_LEN];
        reader.read_sector(&mut sector);
        reader.read_sector_at(&mut sector, 3);
        assert!(reader.play_audio(3, PlaybackSetting::Once));

        assert!(reader.load_state(&saved));
        assert_eq!(reader.save_state().unwrap(), saved);

        // Continuing playback picks up where the backup left off
        assert_eq!(reader.read_audio(&mut samples, 40), 40);
        assert!(samples.iter().all(|&sample| sample == 0x0202));
    }

    #[test]
    fn load_state_requires_an_open_disc() {
        let reader = open_test_reader(false);
        let state = reader.save_state().unwrap();

        let mut closed = CdReader::new();
        assert!(!closed.load_state(&state));
    }

    #[test]
    fn play_audio_rejects_data_tracks() {
        let mut reader = open_test_reader(false);
        assert!(!reader.play_audio(1, PlaybackSetting::All));
        assert!(!reader.save_state().unwrap().audio_playing);

        // Nonexistent track
        assert!(!reader.play_audio(9, PlaybackSetting::All));
    }
}
