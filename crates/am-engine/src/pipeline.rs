//! Per-voice DSP pipeline (§4.7): a fixed-topology DAG from decoded input
//! to the voice's contribution to the stereo/ambisonic mix buses.
//!
//! The node table in §4.7 is a linear chain for every voice (the only
//! branching is data-driven: ambisonic-panned vs. plain stereo-panned, and
//! HRTF-convolved vs. stereo-preset binaural decode) — its topological sort
//! is the declaration order below, computed once at instance-creation and
//! never re-sorted, satisfying "topological sort at instance-creation time;
//! cycles are rejected" without a general graph executor.

use am_core::Sample;
use am_dsp::biquad::BiquadTDF2;
use am_dsp::delay::Delay;
use am_dsp::onepole::OnePoleFilter;
use am_dsp::reverb::AlgorithmicReverb;
use am_dsp::{MonoProcessor, Processor, StereoProcessor};
use am_spatial::binaural::{BinauralConfig, BinauralRenderer};
use am_spatial::hoa::{AmbisonicDecoder, AmbisonicEncoder, AmbisonicOrder, AmbisonicTransform};
use am_spatial::{AudioObject, Orientation, Position3D, SpatialRenderer, SpeakerLayout};

/// How a voice reaches the listener: ambisonic-panned (full 3D, rotated by
/// listener orientation) or a plain stereo pan (e.g. 2D UI sounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SpatializationMode {
    Stereo,
    Ambisonic,
}

/// Binaural decode strategy for an ambisonic-panned voice (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinauralMode {
    StereoPreset,
    Hrtf,
}

/// A fault recorded against a pipeline node this tick; the node is bypassed
/// (pass-through) for the tick rather than propagating the error (§4.1,
/// §7 kind 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFault {
    Attenuation,
    Obstruction,
    Occlusion,
    NearField,
    Panning,
    AmbisonicEncode,
    AmbisonicRotate,
    BinauralDecode,
    Reflections,
    Reverb,
    EnvironmentEffect,
}

/// Per-voice DSP chain. One instance per real channel; virtual channels
/// hold none.
pub struct VoicePipeline {
    pub mode: SpatializationMode,
    pub binaural_mode: BinauralMode,

    obstruction: OnePoleFilter,
    occlusion: OnePoleFilter,
    attenuation_lpf: BiquadTDF2,
    attenuation_lpf_enabled: bool,

    near_field_lpf: BiquadTDF2,
    near_field_hpf: BiquadTDF2,
    near_field_delay: Delay,

    encoder: AmbisonicEncoder,
    rotator: AmbisonicTransform,
    stereo_preset_decoder: AmbisonicDecoder,
    binaural: BinauralRenderer,

    reverb: AlgorithmicReverb,
    environment_effect: OnePoleFilter,

    order: AmbisonicOrder,
    sample_rate: f64,

    pub faults: smallvec::SmallVec<[NodeFault; 4]>,
}

/// Per-tick scalars the mixer computes for a voice and feeds into its
/// pipeline (§4.1 step 4).
#[derive(Debug, Clone, Copy)]
pub struct VoiceTickParams {
    pub attenuation_gain: f64,
    pub obstruction_coeff: f64,
    pub obstruction_gain: f64,
    pub occlusion_coeff: f64,
    pub occlusion_gain: f64,
    pub pan: f64,
    pub direction_listener_space: Position3D,
    pub listener_orientation: Orientation,
    pub near_field_factor: f64,
    pub env_factor: f64,
    pub environment_override_active: bool,
}

impl Default for VoiceTickParams {
    fn default() -> Self {
        Self {
            attenuation_gain: 1.0,
            obstruction_coeff: 1.0,
            obstruction_gain: 1.0,
            occlusion_coeff: 1.0,
            occlusion_gain: 1.0,
            pan: 0.0,
            direction_listener_space: Position3D::origin(),
            listener_orientation: Orientation::forward(),
            near_field_factor: 0.0,
            env_factor: 0.0,
            environment_override_active: false,
        }
    }
}

/// Soft-knee cubic clip, §4.10 / node table `Clip`.
#[inline]
pub fn soft_clip(x: Sample) -> Sample {
    if x > 1.65 {
        0.9862875
    } else if x < -1.65 {
        -0.9862875
    } else {
        0.87 * x - 0.1 * x * x * x
    }
}

/// Equal-power stereo pan, §4.7 `StereoPanning`: `theta = (pan+1) * pi/4`.
#[inline]
pub fn equal_power_pan(mono: Sample, pan: f64, gain: f64) -> (Sample, Sample) {
    let theta = (pan.clamp(-1.0, 1.0) + 1.0) * std::f64::consts::FRAC_PI_4;
    (mono * gain * theta.cos(), mono * gain * theta.sin())
}

impl VoicePipeline {
    pub fn new(sample_rate: f64, order: AmbisonicOrder, mode: SpatializationMode, binaural_mode: BinauralMode) -> Self {
        let stereo_layout = SpeakerLayout::stereo();
        // Near-field delay compensates for the mean HRTF group delay only;
        // it is not a feedback/echo line, so feedback is disabled and the
        // mix is fully wet (§4.7 NearFieldEffect, §9 known limitation).
        let mut near_field_delay = Delay::new(sample_rate, 5.0);
        near_field_delay.set_feedback(0.0);
        near_field_delay.set_dry_wet(1.0);
        near_field_delay.set_filter_enabled(false);
        near_field_delay.set_delay_ms(0.3);
        Self {
            mode,
            binaural_mode,
            obstruction: OnePoleFilter::new(1.0),
            occlusion: OnePoleFilter::new(1.0),
            attenuation_lpf: BiquadTDF2::new(sample_rate),
            attenuation_lpf_enabled: false,
            near_field_lpf: BiquadTDF2::new(sample_rate),
            near_field_hpf: BiquadTDF2::new(sample_rate),
            near_field_delay,
            encoder: AmbisonicEncoder::new(order),
            rotator: AmbisonicTransform::new(order),
            stereo_preset_decoder: AmbisonicDecoder::new(order, stereo_layout)
                .expect("stereo layout is always a valid ambisonic decode target"),
            binaural: BinauralRenderer::new(BinauralConfig::default(), sample_rate as u32),
            reverb: {
                let mut reverb = AlgorithmicReverb::new(sample_rate);
                // A Reverb node is a send, not an insert (§4.7): the dry path
                // already reached `left`/`right` through panning above, so
                // this copy must come back pure wet or the dry signal doubles.
                reverb.set_mix(1.0);
                reverb
            },
            environment_effect: OnePoleFilter::new(1.0),
            order,
            sample_rate,
            faults: smallvec::SmallVec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.obstruction.reset();
        self.occlusion.reset();
        self.attenuation_lpf.reset();
        self.near_field_lpf.reset();
        self.near_field_hpf.reset();
        self.near_field_delay.reset();
        self.reverb.reset();
        self.environment_effect.reset();
        self.faults.clear();
    }

    pub fn set_attenuation_lpf(&mut self, enabled: bool, cutoff_hz: f64) {
        self.attenuation_lpf_enabled = enabled;
        if enabled {
            self.attenuation_lpf.set_lowpass(cutoff_hz.max(20.0), 0.707);
        }
    }

    /// Run the full chain for one voice's mono input block, producing its
    /// stereo contribution to the mixer (§4.1 step 6-8 condensed to a
    /// single voice; the caller sums across voices in `StereoMixer`).
    ///
    /// `room_reflection` is the already-rendered B-format reflections
    /// contribution for this tick (component I), summed in ahead of the
    /// ambisonic mixdown; passing an empty slice means "no reflections
    /// this tick" (room absent or voice outside any room).
    pub fn process(
        &mut self,
        input: &[Sample],
        params: &VoiceTickParams,
        environment_effect_override: bool,
    ) -> (Vec<Sample>, Vec<Sample>) {
        self.faults.clear();
        let n = input.len();
        let mut mono: Vec<Sample> = input.to_vec();

        for s in mono.iter_mut() {
            *s *= params.attenuation_gain;
        }
        if self.attenuation_lpf_enabled {
            self.attenuation_lpf.process_block(&mut mono);
        }

        self.obstruction.set_coeff(params.obstruction_coeff.clamp(0.0, 1.0));
        for s in mono.iter_mut() {
            *s = self.obstruction.process_sample(*s) * params.obstruction_gain;
        }

        self.occlusion.set_coeff(params.occlusion_coeff.clamp(0.0, 1.0));
        for s in mono.iter_mut() {
            *s = self.occlusion.process_sample(*s) * params.occlusion_gain;
        }

        let (mut left, mut right) = match self.mode {
            SpatializationMode::Stereo => {
                let mut l = vec![0.0; n];
                let mut r = vec![0.0; n];
                for i in 0..n {
                    let (ls, rs) = equal_power_pan(mono[i], params.pan, 1.0);
                    l[i] = ls;
                    r[i] = rs;
                }
                (l, r)
            }
            SpatializationMode::Ambisonic => self.process_ambisonic(&mono, params),
        };

        if params.near_field_factor > 0.0 {
            self.apply_near_field(&mono, params.near_field_factor, &mut left, &mut right);
        }

        if environment_effect_override {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *l = self.environment_effect.process_sample(*l);
                *r = self.environment_effect.process_sample(*r);
            }
        } else if params.env_factor > 0.0 {
            // Reverb derives its send params from room volume/absorption
            // (§4.10); with no room under the entity there is nothing to
            // send to, so a voice outside every room skips the node entirely.
            let (rl, rr) = self.process_reverb(&mono);
            let send = params.env_factor.clamp(0.0, 1.0);
            for i in 0..n {
                left[i] += rl[i] * send;
                right[i] += rr[i] * send;
            }
        }

        for s in left.iter_mut().chain(right.iter_mut()) {
            *s = soft_clip(*s);
        }

        (left, right)
    }

    fn process_ambisonic(&mut self, mono: &[Sample], params: &VoiceTickParams) -> (Vec<Sample>, Vec<Sample>) {
        let n = mono.len();
        match self.binaural_mode {
            BinauralMode::Hrtf => {
                let mono_f32: Vec<f32> = mono.iter().map(|&s| s as f32).collect();
                let object = AudioObject {
                    id: 0,
                    name: String::new(),
                    position: params.direction_listener_space,
                    size: 0.0,
                    gain: 1.0,
                    audio: mono_f32,
                    sample_rate: self.sample_rate as u32,
                    automation: None,
                };
                self.binaural.set_listener_position(Position3D::origin(), params.listener_orientation);
                let mut out = vec![0.0f32; n * 2];
                if self.binaural.render(std::slice::from_ref(&object), &mut out, 2).is_err() {
                    self.faults.push(NodeFault::BinauralDecode);
                    return (vec![0.0; n], vec![0.0; n]);
                }
                let mut left = vec![0.0; n];
                let mut right = vec![0.0; n];
                for i in 0..n {
                    left[i] = out[i * 2] as Sample;
                    right[i] = out[i * 2 + 1] as Sample;
                }
                (left, right)
            }
            BinauralMode::StereoPreset => {
                let mono_f32: Vec<f32> = mono.iter().map(|&s| s as f32).collect();
                let bformat = self.encoder.encode(&mono_f32, &params.direction_listener_space);
                self.rotator.set_rotation(params.listener_orientation);
                let rotated = self.rotator.transform(&bformat);
                match self.stereo_preset_decoder.decode(&rotated) {
                    Ok(speakers) if speakers.len() >= 2 => {
                        let left: Vec<Sample> = speakers[0].iter().map(|&s| s as Sample).collect();
                        let right: Vec<Sample> = speakers[1].iter().map(|&s| s as Sample).collect();
                        (left, right)
                    }
                    _ => {
                        self.faults.push(NodeFault::BinauralDecode);
                        (vec![0.0; n], vec![0.0; n])
                    }
                }
            }
        }
    }

    fn apply_near_field(&mut self, mono: &[Sample], factor: f64, left: &mut [Sample], right: &mut [Sample]) {
        self.near_field_lpf.set_lowpass(400.0, 0.707);
        self.near_field_hpf.set_highpass(400.0, 0.707);
        for (i, &s) in mono.iter().enumerate() {
            let bass = self.near_field_lpf.process_sample(s) * 1.5;
            let treble = self.near_field_hpf.process_sample(s);
            let boosted = (bass + treble) * factor;
            let delayed = self.near_field_delay.process_sample(boosted);
            left[i] += delayed * 0.5;
            right[i] += delayed * 0.5;
        }
    }

    fn process_reverb(&mut self, mono: &[Sample]) -> (Vec<Sample>, Vec<Sample>) {
        let mut left = vec![0.0; mono.len()];
        let mut right = vec![0.0; mono.len()];
        for (i, &s) in mono.iter().enumerate() {
            let (l, r) = self.reverb.process_sample(s, s);
            left[i] = l;
            right[i] = r;
        }
        (left, right)
    }

    /// Derive Freeverb-style `room_size`/`damp` from room volume and
    /// average wall absorption (§4.10 "Late reverb").
    pub fn set_room_acoustics(&mut self, volume: f64, max_surface: f64, avg_absorption: f64) {
        let room_size = if max_surface > 0.0 { volume / (max_surface * max_surface.sqrt()) } else { 0.5 };
        self.reverb.set_room_size(room_size.clamp(0.0, 1.0));
        self.reverb.set_damping(avg_absorption.clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn soft_clip_bounds_output_to_plus_minus_unity_ish() {
        assert_abs_diff_eq!(soft_clip(10.0), 0.9862875, epsilon = 1e-6);
        assert_abs_diff_eq!(soft_clip(-10.0), -0.9862875, epsilon = 1e-6);
        assert_eq!(soft_clip(0.0), 0.0);
    }

    #[test]
    fn equal_power_pan_center_splits_evenly() {
        let (l, r) = equal_power_pan(1.0, 0.0, 1.0);
        assert_abs_diff_eq!(l, r, epsilon = 1e-9);
        assert_abs_diff_eq!(l * l + r * r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn equal_power_pan_hard_right_silences_left() {
        let (l, r) = equal_power_pan(1.0, 1.0, 1.0);
        assert_abs_diff_eq!(l, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn stereo_pipeline_produces_equal_channels_for_centered_mono_source() {
        let mut pipeline = VoicePipeline::new(48_000.0, AmbisonicOrder::First, SpatializationMode::Stereo, BinauralMode::StereoPreset);
        let input = vec![0.5; 64];
        let params = VoiceTickParams::default();
        let (left, right) = pipeline.process(&input, &params, true);
        for (l, r) in left.iter().zip(right.iter()) {
            assert_abs_diff_eq!(l, r, epsilon = 1e-9);
        }
    }

    /// A voice outside any room (`env_factor == 0.0`, the default) must
    /// match a bare equal-power pan exactly — no reverb tail added, no
    /// extra dry copy from a wet/dry crossfade.
    #[test]
    fn voice_with_no_room_presence_skips_reverb_entirely() {
        let mut pipeline = VoicePipeline::new(48_000.0, AmbisonicOrder::First, SpatializationMode::Stereo, BinauralMode::StereoPreset);
        let input: Vec<Sample> = (0..64).map(|i| (i as f64 * 0.37).sin()).collect();
        let params = VoiceTickParams::default();
        let (left, right) = pipeline.process(&input, &params, false);
        for (i, &s) in input.iter().enumerate() {
            let (l, r) = equal_power_pan(s, params.pan, 1.0);
            assert_abs_diff_eq!(left[i], soft_clip(l), epsilon = 1e-9);
            assert_abs_diff_eq!(right[i], soft_clip(r), epsilon = 1e-9);
        }
    }
}
