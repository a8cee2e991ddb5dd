use super::*;

const STANDARD_SPACE: &str = "
FILE \"Standard Space.bin\" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    PREGAP 00:02:00
    INDEX 01 13:10:11
  TRACK 03 AUDIO
    INDEX 00 13:14:25
    INDEX 01 13:16:25
";

#[test]
fn single_file_standard_space() {
    let files = parse(STANDARD_SPACE).unwrap();
    assert_eq!(
        files,
        vec![ParsedFile {
            file_name: "Standard Space.bin".into(),
            tracks: vec![
                ParsedTrack {
                    number: 1,
                    mode: TrackMode::Mode1_2352,
                    pause_start: None,
                    track_start: CdTime::new(0, 0, 0),
                },
                ParsedTrack {
                    number: 2,
                    mode: TrackMode::Audio,
                    pause_start: None,
                    track_start: CdTime::new(13, 10, 11),
                },
                ParsedTrack {
                    number: 3,
                    mode: TrackMode::Audio,
                    pause_start: Some(CdTime::new(13, 14, 25)),
                    track_start: CdTime::new(13, 16, 25),
                }
            ]
        }]
    );
}

const MULTI_FILE: &str = "
FILE \"Multi File (Track 01).bin\" BINARY
  TRACK 01 MODE1/2048
    INDEX 01 00:00:00
FILE \"Multi File (Track 02).bin\" BINARY
  TRACK 02 AUDIO
    INDEX 00 00:00:00
    INDEX 01 00:02:00
";

#[test]
fn multi_file() {
    let files = parse(MULTI_FILE).unwrap();
    assert_eq!(
        files,
        vec![
            ParsedFile {
                file_name: "Multi File (Track 01).bin".into(),
                tracks: vec![ParsedTrack {
                    number: 1,
                    mode: TrackMode::Mode1_2048,
                    pause_start: None,
                    track_start: CdTime::new(0, 0, 0),
                }]
            },
            ParsedFile {
                file_name: "Multi File (Track 02).bin".into(),
                tracks: vec![ParsedTrack {
                    number: 2,
                    mode: TrackMode::Audio,
                    pause_start: Some(CdTime::new(0, 0, 0)),
                    track_start: CdTime::new(0, 2, 0),
                }]
            }
        ]
    );
}

#[test]
fn rejects_malformed_sheets() {
    // Tracks out of order
    assert!(
        parse("\nFILE \"a.bin\" BINARY\n  TRACK 02 AUDIO\n    INDEX 01 00:00:00\n").is_err()
    );

    // Track with no INDEX 01
    assert!(parse("\nFILE \"a.bin\" BINARY\n  TRACK 01 AUDIO\n").is_err());

    // No tracks at all
    assert!(parse("REM nothing here\n").is_err());

    // Unsupported track mode
    assert!(
        parse("\nFILE \"a.bin\" BINARY\n  TRACK 01 MODE2/2352\n    INDEX 01 00:00:00\n").is_err()
    );
}

const MIXED_SINGLE_FILE: &str = "
FILE \"Mixed.bin\" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 00 00:00:04
    INDEX 01 00:00:06
  TRACK 03 AUDIO
    INDEX 01 00:00:09
";

#[test]
fn layout_single_file() {
    let files = parse(MIXED_SINGLE_FILE).unwrap();
    let cue_sheet = to_cue_sheet(&files, |_| 12 * crate::BYTES_PER_SECTOR).unwrap();

    let track1 = cue_sheet.track(1).unwrap();
    assert_eq!((track1.start_byte, track1.sector_len), (0, 4));
    assert_eq!(track1.track_type, TrackType::Data);

    let track2 = cue_sheet.track(2).unwrap();
    assert_eq!((track2.start_byte, track2.sector_len), (6 * crate::BYTES_PER_SECTOR, 3));
    assert_eq!(track2.track_type, TrackType::Audio);

    let track3 = cue_sheet.track(3).unwrap();
    assert_eq!((track3.start_byte, track3.sector_len), (9 * crate::BYTES_PER_SECTOR, 3));

    assert_eq!(cue_sheet.last_track_number(), 3);
    assert!(cue_sheet.track(4).is_none());
    assert!(cue_sheet.track(0).is_none());
}

const MIXED_STRIDE_FILE: &str = "
FILE \"Mixed Stride.bin\" BINARY
  TRACK 01 MODE1/2048
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 00 00:00:10
    INDEX 01 00:00:12
";

#[test]
fn layout_counts_gap_sectors_at_the_following_tracks_stride() {
    let files = parse(MIXED_STRIDE_FILE).unwrap();
    let file_len = 10 * 2048 + 5 * crate::BYTES_PER_SECTOR;
    let cue_sheet = to_cue_sheet(&files, |_| file_len).unwrap();

    let track1 = cue_sheet.track(1).unwrap();
    assert_eq!((track1.start_byte, track1.sector_len), (0, 10));

    let track2 = cue_sheet.track(2).unwrap();
    assert_eq!(track2.start_byte, 10 * 2048 + 2 * crate::BYTES_PER_SECTOR);
    assert_eq!(track2.sector_len, 3);
}

#[test]
fn layout_truncated_file_shortens_the_last_track() {
    let files = parse(MIXED_SINGLE_FILE).unwrap();
    // Half a sector short of 11 full sectors
    let cue_sheet = to_cue_sheet(&files, |_| 11 * crate::BYTES_PER_SECTOR - 1176).unwrap();

    assert_eq!(cue_sheet.track(3).unwrap().sector_len, 1);
}
