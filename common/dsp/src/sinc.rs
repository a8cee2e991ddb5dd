//! Fixed-point windowed sinc interpolation, based on the algorithm described
//! by Julius O. Smith III:
//!   <https://ccrma.stanford.edu/~jos/resample/resample.html>
//!
//! The kernel table is precomputed once (`SincTables`) and shared by every
//! resampler; the per-sample path in [`ResamplerConfig::resample_one`] is
//! integer-only.

use crate::muldiv;
use bincode::{Decode, Encode};
use std::cmp;

/// Half the number of input frames an unstretched kernel spans.
pub const KERNEL_RADIUS: u32 = 3;

// Table entries per unit of kernel argument
const KERNEL_RESOLUTION_BITS: u32 = 10;
const KERNEL_RESOLUTION: u32 = 1 << KERNEL_RESOLUTION_BITS;

// Kernel entries are Q1.15; the center entry is exactly 1.0
const KERNEL_VALUE_BITS: u32 = 15;

// Low bits of a Q16.16 kernel argument left over after the table index
const INTERPOLATION_BITS: u32 = muldiv::FRACTIONAL_BITS - KERNEL_RESOLUTION_BITS;

/// Precomputed Lanczos kernel lookup table.
///
/// Immutable after construction and shareable between any number of
/// resamplers and mixers.
#[derive(Debug, Clone, Encode, Decode)]
pub struct SincTables {
    kernel: Vec<i32>,
}

impl SincTables {
    #[must_use]
    pub fn new() -> Self {
        let len = (KERNEL_RADIUS * KERNEL_RESOLUTION + 1) as usize;
        let kernel = (0..len)
            .map(|i| {
                let x = i as f64 / f64::from(KERNEL_RESOLUTION);
                (lanczos(x) * f64::from(1 << KERNEL_VALUE_BITS)).round() as i32
            })
            .collect();

        Self { kernel }
    }
}

impl Default for SincTables {
    fn default() -> Self {
        Self::new()
    }
}

fn lanczos(x: f64) -> f64 {
    let a = f64::from(KERNEL_RADIUS);
    if x == 0.0 {
        return 1.0;
    }
    if x >= a {
        return 0.0;
    }

    let pi_x = std::f64::consts::PI * x;
    a * (pi_x.sin() * (pi_x / a).sin()) / (pi_x * pi_x)
}

/// Per-source resampler configuration: how far the kernel is stretched to
/// keep the low-pass cutoff below the Nyquist frequency of the slower of the
/// output and low-pass rates.
#[derive(Debug, Clone, Copy, Encode, Decode)]
pub struct ResamplerConfig {
    stretch: u32,
    inverse_stretch: u32,
    stretched_kernel_radius: u32,
}

impl ResamplerConfig {
    /// # Panics
    ///
    /// Panics if any rate is zero.
    #[must_use]
    pub fn new(input_rate: u32, output_rate: u32, lowpass_rate: u32) -> Self {
        assert!(input_rate != 0 && output_rate != 0 && lowpass_rate != 0);

        let cutoff = cmp::min(output_rate, lowpass_rate);
        let stretch = if input_rate > cutoff {
            ((u64::from(input_rate) << muldiv::FRACTIONAL_BITS) / u64::from(cutoff)) as u32
        } else {
            muldiv::FRACTIONAL_SIZE
        };
        let inverse_stretch = ((1_u64 << (2 * muldiv::FRACTIONAL_BITS)) / u64::from(stretch)) as u32;
        let stretched_kernel_radius = ((u64::from(KERNEL_RADIUS) * u64::from(stretch)
            + u64::from(muldiv::FRACTIONAL_SIZE - 1))
            >> muldiv::FRACTIONAL_BITS) as u32;

        log::debug!(
            "Resampler configured: input={input_rate} cutoff={cutoff} stretch={} radius={stretched_kernel_radius}",
            stretch as f64 / f64::from(muldiv::FRACTIONAL_SIZE)
        );

        Self { stretch, inverse_stretch, stretched_kernel_radius }
    }

    /// The kernel radius in input frames after stretching, rounded up.
    ///
    /// Callers must pad their input buffers with `2 * stretched_kernel_radius`
    /// frames ahead of position 0.
    #[must_use]
    pub fn stretched_kernel_radius(&self) -> u32 {
        self.stretched_kernel_radius
    }

    /// Accumulate one output frame from the `2 * stretched_kernel_radius`
    /// input frames starting at `position_int`.
    ///
    /// The interpolation point sits `stretched_kernel_radius` frames past
    /// `position_int` plus the Q16.16 fraction `position_fract`; with the
    /// padding layout above, a position of 0 reads the frames the caller
    /// carried over from the previous buffer.
    ///
    /// Contributions are summed into `out_frame` without clamping; each tap's
    /// product stays within `i32` because kernel weights are Q1.15.
    ///
    /// # Panics
    ///
    /// Panics if the window extends past the end of `input`, or if
    /// `out_frame.len() != channels`.
    pub fn resample_one(
        &self,
        tables: &SincTables,
        out_frame: &mut [i32],
        input: &[i16],
        channels: usize,
        position_int: usize,
        position_fract: u32,
    ) {
        assert_eq!(out_frame.len(), channels);

        let radius = self.stretched_kernel_radius as usize;
        let center = ((radius as u32) << muldiv::FRACTIONAL_BITS) + position_fract;

        for tap in 0..2 * radius {
            let tap_position = (tap as u32) << muldiv::FRACTIONAL_BITS;
            let distance = center.abs_diff(tap_position);
            let kernel_x = muldiv::fixed_mul(distance, self.inverse_stretch);
            if kernel_x >= KERNEL_RADIUS << muldiv::FRACTIONAL_BITS {
                continue;
            }

            let table_index = (kernel_x >> INTERPOLATION_BITS) as usize;
            let interpolation = (kernel_x & ((1 << INTERPOLATION_BITS) - 1)) as i32;
            let entry = tables.kernel[table_index];
            let next_entry = tables.kernel[table_index + 1];
            let mut weight = entry + (((next_entry - entry) * interpolation) >> INTERPOLATION_BITS);

            // Unity stretch skips normalization; the product would not fit in
            // i32 when both factors are at their maximum
            if self.stretch != muldiv::FRACTIONAL_SIZE {
                weight = (weight * self.inverse_stretch as i32) >> muldiv::FRACTIONAL_BITS;
            }

            let base = (position_int + tap) * channels;
            for (channel, out) in out_frame.iter_mut().enumerate() {
                *out += (i32::from(input[base + channel]) * weight) >> KERNEL_VALUE_BITS;
            }
        }
    }
}
