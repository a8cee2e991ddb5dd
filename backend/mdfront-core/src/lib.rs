//! Frontend core for a Sega Mega Drive / Mega CD emulator: per-frame audio
//! mixing and resampling of the four sound sources, CD-ROM access with CDDA
//! playback, and cheat code support.

pub mod audio;
pub mod cdreader;
pub mod cheats;

use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Encode, Decode)]
pub enum TimingMode {
    #[default]
    Ntsc,
    Pal,
}

impl TimingMode {
    // NTSC runs at exactly 60000/1001 frames per second, PAL at exactly 50

    /// Number of whole samples produced per video frame at the given sample
    /// rate.
    #[must_use]
    pub fn samples_per_frame(self, sample_rate: u32) -> u32 {
        match self {
            Self::Ntsc => (u64::from(sample_rate) * 1001 / 60000) as u32,
            Self::Pal => sample_rate / 50,
        }
    }

    /// Inverse of [`Self::samples_per_frame`]: the sample rate that produces
    /// exactly `samples_per_frame` whole samples every video frame.
    #[must_use]
    pub fn to_sample_rate(self, samples_per_frame: u32) -> u32 {
        match self {
            Self::Ntsc => (u64::from(samples_per_frame) * 60000 / 1001) as u32,
            Self::Pal => samples_per_frame * 50,
        }
    }
}

impl Display for TimingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ntsc => write!(f, "NTSC"),
            Self::Pal => write!(f, "PAL"),
        }
    }
}

pub trait AudioOutput {
    type Err;

    /// Receive a chunk of interleaved stereo samples;
    /// `samples.len() == 2 * frames`.
    ///
    /// Called synchronously from [`audio::Mixer::end`], possibly several
    /// times per emulated frame. Implementations must not re-enter the mixer.
    ///
    /// # Errors
    ///
    /// This method will return an error if it is unable to deliver the
    /// samples to the audio device.
    fn push_samples(&mut self, samples: &[i16], frames: usize) -> Result<(), Self::Err>;
}
