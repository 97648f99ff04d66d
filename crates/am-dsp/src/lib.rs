//! am-dsp: the DSP processors that make up Amplitude's pipeline nodes.
//!
//! ## Core Modules
//! - `simd` - Runtime SIMD dispatch (AVX-512/AVX2/SSE4.2/NEON) and the buffer kernels
//! - `automation` - Sample-accurate parameter automation
//! - `smoothing` - Lock-free parameter smoothing (RTPC/fader ramps)
//!
//! ## DSP Modules
//! - `biquad` - TDF-II biquad filters (lowpass, highpass, peaking, shelving)
//! - `onepole` - One-pole low-pass, curve-driven (obstruction/occlusion)
//! - `eq` - Parametric EQ with per-band dynamic EQ, plus a linear-phase FIR variant
//! - `dynamics` - Compressor (VCA/Opto/FET), limiter, gate, expander
//! - `reverb` - Convolution and algorithmic (Freeverb-style) reverbs
//! - `delay` - Simple, ping-pong, multi-tap, and modulated delays
//! - `analysis` - FFT analysis, peak/RMS meters
//! - `metering` - Correlation, balance, K-system, VU, dynamic range, phase scope meters
//!
//! ## Advanced DSP
//! - `convolution` - Partitioned convolution (HRTF / IR reverb)
//! - `linear_phase` - Zero-phase EQ built from a windowed-sinc FIR

#![allow(dead_code)]

// Core infrastructure
pub mod automation;
pub mod buffer;
pub mod simd;
pub mod smoothing;

// DSP processors
pub mod analysis;
pub mod biquad;
pub mod delay;
pub mod dynamics;
pub mod eq;
pub mod linear_phase;
pub mod metering;
pub mod onepole;
pub mod reverb;

// Advanced DSP
pub mod convolution;

// Re-exports for convenience
pub use simd::{BiquadCoeffsSimd, BiquadStateSimd};
pub use simd::{DspDispatch, SimdLevel, detect_simd_level, simd_level};
pub use simd::{apply_gain, apply_stereo_gain, mix_add, process_biquad};

pub use automation::AtomicAutomationValue;
pub use automation::{AutomationLane, AutomationManager, AutomationPoint, CurveType};

pub use smoothing::{ParameterBank, SmoothedParam, SmoothedStereoParam, SmoothingType};

pub use metering::{
    BalanceMeter, CorrelationMeter, DynamicRangeMeter, KMeter, KSystem, PhasePoint, PhaseScope,
    StereoMeter, VuMeter,
};

pub use analysis::{FftAnalyzer, PeakMeter, RmsMeter};

pub use linear_phase::{LinearPhaseBand, LinearPhaseEQ, LinearPhaseFilterType};

pub use onepole::OnePoleFilter;

pub use buffer::{
    FftKernel, PlanarAudioBuffer, SplitComplex, complex_size, deinterleave, interleave,
    point_wise_multiply, point_wise_multiply_accumulate, scalar_multiply,
    scalar_multiply_accumulate,
};

use am_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// Stereo processor trait
pub trait StereoProcessor: Processor {
    /// Process a stereo sample pair
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample);

    /// Process stereo blocks
    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process_sample(*l, *r);
        }
    }
}

/// Processor configuration for sample rate changes
pub trait ProcessorConfig {
    fn set_sample_rate(&mut self, sample_rate: f64);
}
