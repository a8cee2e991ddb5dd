//! Per-frame audio resampling and mixing of the four Mega Drive / Mega CD
//! sound sources (YM2612 FM, PSG, RF5C164 PCM, CD-DA).
//!
//! The emulator core writes each source's samples for one video frame
//! directly into buffers handed out by [`Mixer::begin`] +
//! `allocate_*_samples`; [`Mixer::end`] then resamples every source to the
//! output rate, mixes, clamps, and delivers bounded chunks to an
//! [`AudioOutput`]. The per-sample loop is fixed-point and allocation-free.

use crate::{AudioOutput, TimingMode};
use dsp::muldiv;
use dsp::sinc::{ResamplerConfig, SincTables};

pub const NTSC_GENESIS_MCLK_FREQUENCY: u32 = 53_693_175;
pub const PAL_GENESIS_MCLK_FREQUENCY: u32 = 53_203_424;

const SEGA_CD_MCLK_FREQUENCY: u32 = 12_500_000;

pub const CD_DA_FREQUENCY: u32 = 44_100;
pub const DEFAULT_OUTPUT_FREQUENCY: u32 = CD_DA_FREQUENCY;

const FM_CHANNELS: u8 = 2;
const PSG_CHANNELS: u8 = 1;
const PCM_CHANNELS: u8 = 2;
const CDDA_CHANNELS: u8 = 2;

// Power-of-two loudness balancing between the sources; the PSG and the CD
// are attenuated relative to the YM2612
const FM_VOLUME_DIVISOR: i32 = 1;
const PSG_VOLUME_DIVISOR: i32 = 4;
const PCM_VOLUME_DIVISOR: i32 = 2;
const CDDA_VOLUME_DIVISOR: i32 = 2;

// Output chunk capacity in stereo frames; one emulated frame may flush
// several chunks
const MAX_CHUNK_FRAMES: usize = 0x400;

/// Round a source clock down to an exact multiple of the frame rate so that
/// the per-frame sample count is an integer.
fn corrected_frequency(frequency: u32, timing_mode: TimingMode) -> u32 {
    timing_mode.to_sample_rate(timing_mode.samples_per_frame(frequency))
}

#[derive(Debug, Clone)]
struct MixerSource {
    channels: usize,
    capacity: usize,
    write_index: usize,
    // 2 * stretched kernel radius, in frames; also the head padding length
    kernel_diameter: usize,
    buffer: Vec<i16>,
    resampler: ResamplerConfig,
}

impl MixerSource {
    fn new(channels: u8, input_frequency: u32, output_frequency: u32, capacity: usize) -> Self {
        let resampler = ResamplerConfig::new(input_frequency, output_frequency, output_frequency);
        let kernel_diameter = 2 * resampler.stretched_kernel_radius() as usize;
        let channels = usize::from(channels);

        Self {
            channels,
            capacity,
            write_index: 0,
            kernel_diameter,
            buffer: vec![0; (kernel_diameter + capacity) * channels],
            resampler,
        }
    }

    /// Carry the tail of the previous frame into the head padding (the sinc
    /// window reads it for positions near 0), then clear the writable region.
    fn new_frame(&mut self) {
        let carry_len = self.kernel_diameter * self.channels;
        let carry_start = self.write_index * self.channels;
        self.buffer.copy_within(carry_start..carry_start + carry_len, 0);
        self.buffer[carry_len..carry_len + self.write_index * self.channels].fill(0);

        self.write_index = 0;
    }

    fn allocate(&mut self, total_frames: usize) -> &mut [i16] {
        assert!(
            self.write_index + total_frames <= self.capacity,
            "allocated past source capacity: {} + {total_frames} > {}",
            self.write_index,
            self.capacity
        );

        let start = (self.kernel_diameter + self.write_index) * self.channels;
        self.write_index += total_frames;

        &mut self.buffer[start..start + total_frames * self.channels]
    }

    fn get_frame(&self, tables: &SincTables, out_frame: &mut [i32], position: u32) {
        out_frame.fill(0);
        self.resampler.resample_one(
            tables,
            out_frame,
            &self.buffer,
            self.channels,
            muldiv::fixed_to_int_floor(position) as usize,
            muldiv::fixed_fract(position),
        );
    }

    fn total_allocated(&self) -> usize {
        self.write_index
    }
}

#[derive(Debug, Clone)]
pub struct Mixer {
    timing_mode: TimingMode,
    output_frequency: u32,
    output_length: u32,
    fm: MixerSource,
    psg: MixerSource,
    pcm: MixerSource,
    cdda: MixerSource,
    chunk_buffer: Vec<i16>,
}

impl Mixer {
    /// # Panics
    ///
    /// Panics if `output_frequency` is too low to produce at least one sample
    /// per video frame.
    #[must_use]
    pub fn new(timing_mode: TimingMode, output_frequency: u32) -> Self {
        let mclk = match timing_mode {
            TimingMode::Ntsc => NTSC_GENESIS_MCLK_FREQUENCY,
            TimingMode::Pal => PAL_GENESIS_MCLK_FREQUENCY,
        };

        let fm_frequency = corrected_frequency(mclk / 7 / 6 / 24, timing_mode);
        let psg_frequency = corrected_frequency(mclk / 15 / 16, timing_mode);
        let pcm_frequency = corrected_frequency(SEGA_CD_MCLK_FREQUENCY / 384, timing_mode);
        let cdda_frequency = corrected_frequency(CD_DA_FREQUENCY, timing_mode);

        let output_length = timing_mode.samples_per_frame(output_frequency);
        assert!(output_length != 0, "output frequency {output_frequency} is below the frame rate");

        log::debug!(
            "Mixer configured for {timing_mode} at {output_frequency} Hz ({output_length} samples/frame); FM={fm_frequency} PSG={psg_frequency} PCM={pcm_frequency} CDDA={cdda_frequency}"
        );

        let new_source = |channels, frequency| {
            let capacity = timing_mode.samples_per_frame(frequency) as usize + 1;
            MixerSource::new(channels, frequency, output_frequency, capacity)
        };

        Self {
            timing_mode,
            output_frequency,
            output_length,
            fm: new_source(FM_CHANNELS, fm_frequency),
            psg: new_source(PSG_CHANNELS, psg_frequency),
            pcm: new_source(PCM_CHANNELS, pcm_frequency),
            cdda: new_source(CDDA_CHANNELS, cdda_frequency),
            chunk_buffer: vec![0; MAX_CHUNK_FRAMES * 2],
        }
    }

    pub fn update_timing_mode(&mut self, timing_mode: TimingMode) {
        *self = Self::new(timing_mode, self.output_frequency);
    }

    pub fn update_output_frequency(&mut self, output_frequency: u32) {
        *self = Self::new(self.timing_mode, output_frequency);
    }

    /// Samples delivered per video frame at the configured output rate
    #[must_use]
    pub fn output_length(&self) -> u32 {
        self.output_length
    }

    /// Start a new emulated video frame. Must precede any `allocate_*` calls
    /// for that frame.
    pub fn begin(&mut self) {
        self.fm.new_frame();
        self.psg.new_frame();
        self.pcm.new_frame();
        self.cdda.new_frame();
    }

    /// The returned slices are the caller's only write surface; samples are
    /// taken as-is, with no producer-side transformation.
    ///
    /// # Panics
    ///
    /// These methods panic if a frame's allocations exceed the source's
    /// per-frame capacity.
    pub fn allocate_fm_samples(&mut self, total_frames: usize) -> &mut [i16] {
        self.fm.allocate(total_frames)
    }

    pub fn allocate_psg_samples(&mut self, total_frames: usize) -> &mut [i16] {
        self.psg.allocate(total_frames)
    }

    pub fn allocate_pcm_samples(&mut self, total_frames: usize) -> &mut [i16] {
        self.pcm.allocate(total_frames)
    }

    pub fn allocate_cdda_samples(&mut self, total_frames: usize) -> &mut [i16] {
        self.cdda.allocate(total_frames)
    }

    /// Resample and mix everything written since [`Self::begin`], delivering
    /// `mul_div(output_length, den, num)` stereo frames to `output` in
    /// bounded chunks. `num`/`den` scale the frame's output length for
    /// fast-forward / slow-motion without touching the sample rates.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `output`.
    ///
    /// # Panics
    ///
    /// Panics if `num` is zero.
    pub fn end<A: AudioOutput>(
        &mut self,
        tables: &SincTables,
        num: u32,
        den: u32,
        output: &mut A,
    ) -> Result<(), A::Err> {
        assert!(num != 0, "time stretch numerator must be non-zero");

        let adjusted_output_length = muldiv::mul_div(self.output_length, den, num);
        if adjusted_output_length == 0 {
            return Ok(());
        }

        let fm_ratio = frame_ratio(self.fm.total_allocated(), adjusted_output_length);
        let psg_ratio = frame_ratio(self.psg.total_allocated(), adjusted_output_length);
        let pcm_ratio = frame_ratio(self.pcm.total_allocated(), adjusted_output_length);
        let cdda_ratio = frame_ratio(self.cdda.total_allocated(), adjusted_output_length);

        let mut fm_position: u32 = 0;
        let mut psg_position: u32 = 0;
        let mut pcm_position: u32 = 0;
        let mut cdda_position: u32 = 0;

        let mut fm_frame = [0_i32; FM_CHANNELS as usize];
        let mut psg_frame = [0_i32; PSG_CHANNELS as usize];
        let mut pcm_frame = [0_i32; PCM_CHANNELS as usize];
        let mut cdda_frame = [0_i32; CDDA_CHANNELS as usize];

        let mut chunk_len = 0;
        for _ in 0..adjusted_output_length {
            self.fm.get_frame(tables, &mut fm_frame, fm_position);
            self.psg.get_frame(tables, &mut psg_frame, psg_position);
            self.pcm.get_frame(tables, &mut pcm_frame, pcm_position);
            self.cdda.get_frame(tables, &mut cdda_frame, cdda_position);

            // The mono PSG feeds both stereo channels
            let sample_l = fm_frame[0] / FM_VOLUME_DIVISOR
                + psg_frame[0] / PSG_VOLUME_DIVISOR
                + pcm_frame[0] / PCM_VOLUME_DIVISOR
                + cdda_frame[0] / CDDA_VOLUME_DIVISOR;
            let sample_r = fm_frame[1] / FM_VOLUME_DIVISOR
                + psg_frame[0] / PSG_VOLUME_DIVISOR
                + pcm_frame[1] / PCM_VOLUME_DIVISOR
                + cdda_frame[1] / CDDA_VOLUME_DIVISOR;

            self.chunk_buffer[chunk_len] = clamp_sample(sample_l);
            self.chunk_buffer[chunk_len + 1] = clamp_sample(sample_r);
            chunk_len += 2;

            if chunk_len == self.chunk_buffer.len() {
                output.push_samples(&self.chunk_buffer, MAX_CHUNK_FRAMES)?;
                chunk_len = 0;
            }

            fm_position += fm_ratio;
            psg_position += psg_ratio;
            pcm_position += pcm_ratio;
            cdda_position += cdda_ratio;
        }

        if chunk_len != 0 {
            output.push_samples(&self.chunk_buffer[..chunk_len], chunk_len / 2)?;
        }

        Ok(())
    }
}

// Truncated on purpose: rounding the ratio up could walk the final window
// past the allocated region
fn frame_ratio(available_frames: usize, output_length: u32) -> u32 {
    let ratio = muldiv::to_fixed(available_frames as u32) / output_length;
    debug_assert!(available_frames == 0 || ratio != 0);
    ratio
}

fn clamp_sample(sample: i32) -> i16 {
    sample.clamp(-0x7FFF, 0x7FFF) as i16
}
