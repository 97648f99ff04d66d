//! A voice: the resources a *real* channel owns exclusively (§3 "Channel
//! (voice)" — "Channels exclusively own their pipeline instance and
//! decoder"). Virtual channels hold none of this; `Voice` only exists for
//! channels currently promoted to real.

use am_core::Sample;
use am_spatial::hoa::AmbisonicOrder;

use crate::io::{Decoder, Resampler};
use crate::pipeline::{BinauralMode, SpatializationMode, VoicePipeline};

/// One real voice's owned render resources: decoder cursor, resampler, and
/// DSP pipeline instance, plus the last-applied gain/pan used to
/// interpolate across tick boundaries without zippering.
pub struct Voice {
    pub decoder: Box<dyn Decoder>,
    pub resampler: Box<dyn Resampler>,
    pub pipeline: VoicePipeline,
    pub last_gain: f64,
    pub last_pan: f64,
    scratch_in: Vec<f32>,
    scratch_resampled: Vec<f32>,
}

impl Voice {
    pub fn new(
        decoder: Box<dyn Decoder>,
        mut resampler: Box<dyn Resampler>,
        sample_rate: f64,
        order: AmbisonicOrder,
        mode: SpatializationMode,
        binaural_mode: BinauralMode,
        decoder_sample_rate: u32,
    ) -> Self {
        let _ = resampler.initialize(1, decoder_sample_rate, sample_rate as u32);
        Self {
            decoder,
            resampler,
            pipeline: VoicePipeline::new(sample_rate, order, mode, binaural_mode),
            last_gain: 1.0,
            last_pan: 0.0,
            scratch_in: Vec::new(),
            scratch_resampled: Vec::new(),
        }
    }

    /// Pull `frame_count` output-rate mono frames through the decoder and
    /// resampler (§4.1 step 6). Returns `Ok(true)` on a clean pull,
    /// `Ok(false)` on a streaming underrun (block is zero-filled, voice
    /// continues per §4.1 failure semantics), or `Err` when the resampler
    /// itself faults (caller demotes the voice to virtual).
    pub fn pull(&mut self, position_frames: u64, frame_count: usize, out: &mut Vec<Sample>) -> Result<bool, ()> {
        out.clear();
        out.resize(frame_count, 0.0);

        let required_in = self.resampler.required_input_frames(frame_count);
        self.scratch_in.resize(required_in, 0.0);
        let read = self
            .decoder
            .stream(&mut self.scratch_in, position_frames, required_in)
            .unwrap_or(0);
        if read == 0 {
            return Ok(false);
        }

        self.scratch_resampled.resize(frame_count, 0.0);
        let mut in_frames = read;
        let mut out_frames = frame_count;
        let ok = self.resampler.process(
            &self.scratch_in[..read],
            &mut in_frames,
            &mut self.scratch_resampled,
            &mut out_frames,
        );
        if !ok {
            return Err(());
        }

        for (dst, &src) in out.iter_mut().zip(self.scratch_resampled.iter()) {
            *dst = src as Sample;
        }
        Ok(out_frames == frame_count)
    }

    pub fn reset(&mut self) {
        self.pipeline.reset();
        self.resampler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{LinearResampler, PcmDecoder};

    #[test]
    fn pull_reports_underrun_past_end_of_stream() {
        let decoder = Box::new(PcmDecoder::new(vec![0.0; 16], 48_000, 1));
        let resampler = Box::new(LinearResampler::new());
        let mut voice = Voice::new(
            decoder,
            resampler,
            48_000.0,
            AmbisonicOrder::First,
            SpatializationMode::Stereo,
            BinauralMode::StereoPreset,
            48_000,
        );
        let mut out = Vec::new();
        let clean = voice.pull(1_000_000, 64, &mut out).unwrap();
        assert!(!clean);
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
