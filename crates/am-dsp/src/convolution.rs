//! Professional Convolution Engine
//!
//! High-performance partitioned convolution:
//! - Non-uniform partitioning (NUFFT-style) for low latency
//! - RealFFT for 2x efficiency over complex FFT
//! - Zero-latency mode with direct convolution for first partition
//! - IR loading with automatic format detection
//! - True stereo, stereo-to-stereo matrix, mono-to-stereo modes

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::{Processor, ProcessorConfig, StereoProcessor};
use am_core::Sample;

// ============ Constants ============

/// Minimum partition size for low latency
const MIN_PARTITION_SIZE: usize = 64;

/// Maximum partition size for efficiency
const MAX_PARTITION_SIZE: usize = 8192;

/// Default partition size (good balance)
const DEFAULT_PARTITION_SIZE: usize = 512;

// ============ Partition ============

/// Single convolution partition (frequency domain IR segment)
struct Partition {
    /// FFT of IR segment (complex, half-spectrum)
    spectrum: Vec<Complex<f64>>,
    /// Size of this partition
    size: usize,
}

impl Partition {
    fn new(ir_segment: &[f64], fft: &Arc<dyn RealToComplex<f64>>) -> Self {
        let fft_size = ir_segment.len() * 2;
        let mut padded = vec![0.0; fft_size];
        padded[..ir_segment.len()].copy_from_slice(ir_segment);

        let mut spectrum = vec![Complex::new(0.0, 0.0); fft_size / 2 + 1];
        fft.process(&mut padded, &mut spectrum).ok();

        Self {
            spectrum,
            size: ir_segment.len(),
        }
    }
}

// ============ Partition Scheme ============

/// Non-uniform partitioning scheme for low latency
/// Uses smaller partitions at the start, larger ones for later IR segments
#[derive(Debug, Clone)]
pub struct PartitionScheme {
    /// Partition sizes (first = smallest for low latency)
    sizes: Vec<usize>,
    /// Starting sample index for each partition
    offsets: Vec<usize>,
}

impl PartitionScheme {
    /// Create uniform partition scheme
    pub fn uniform(ir_length: usize, partition_size: usize) -> Self {
        let partition_size = partition_size.clamp(MIN_PARTITION_SIZE, MAX_PARTITION_SIZE);
        let num_partitions = ir_length.div_ceil(partition_size);

        let sizes = vec![partition_size; num_partitions];
        let offsets: Vec<usize> = (0..num_partitions).map(|i| i * partition_size).collect();

        Self { sizes, offsets }
    }

    /// Create non-uniform scheme (low latency)
    /// First partitions are small, later ones grow exponentially
    pub fn non_uniform(ir_length: usize, min_partition: usize) -> Self {
        let min_partition = min_partition.clamp(MIN_PARTITION_SIZE, MAX_PARTITION_SIZE);

        let mut sizes = Vec::new();
        let mut offsets = Vec::new();
        let mut offset = 0;
        let mut current_size = min_partition;

        while offset < ir_length {
            sizes.push(current_size);
            offsets.push(offset);
            offset += current_size;

            // Double partition size after every 2 partitions
            if sizes.len() % 2 == 0 && current_size < MAX_PARTITION_SIZE {
                current_size = (current_size * 2).min(MAX_PARTITION_SIZE);
            }
        }

        Self { sizes, offsets }
    }

    /// Get minimum partition size (determines latency)
    pub fn min_size(&self) -> usize {
        self.sizes
            .first()
            .copied()
            .unwrap_or(DEFAULT_PARTITION_SIZE)
    }
}

// ============ Convolution Channel ============

/// Single channel convolution processor
struct ConvolutionChannel {
    /// IR partitions in frequency domain
    partitions: Vec<Partition>,
    /// First partition IR (time domain) for direct convolution (zero latency)
    direct_ir: Vec<f64>,
    /// Input history for direct convolution
    direct_history: Vec<f64>,
    /// Input buffer (time domain)
    input_buffer: Vec<f64>,
    /// Input FDLs (Frequency Delay Lines) for each partition size
    fdls: Vec<Vec<Vec<Complex<f64>>>>,
    /// Output overlap buffers per partition size
    overlap_buffers: Vec<Vec<f64>>,
    /// FFT planners per partition size
    fft_forward: Vec<Arc<dyn RealToComplex<f64>>>,
    fft_inverse: Vec<Arc<dyn ComplexToReal<f64>>>,
    /// Partition scheme
    scheme: PartitionScheme,
    /// Current position in input buffer
    buffer_pos: usize,
    /// FDL write positions for each partition size
    fdl_positions: Vec<usize>,
    /// Block counter for triggering larger partitions
    block_counter: usize,
    /// Unique partition sizes (sorted)
    unique_sizes: Vec<usize>,
}

impl ConvolutionChannel {
    fn new(ir: &[f64], scheme: PartitionScheme) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();

        // Get unique partition sizes
        let mut unique_sizes: Vec<usize> = scheme.sizes.to_vec();
        unique_sizes.sort();
        unique_sizes.dedup();

        // Create FFT planners for each size
        let fft_forward: Vec<_> = unique_sizes
            .iter()
            .map(|&size| planner.plan_fft_forward(size * 2))
            .collect();
        let fft_inverse: Vec<_> = unique_sizes
            .iter()
            .map(|&size| planner.plan_fft_inverse(size * 2))
            .collect();

        // Create partitions
        let partitions: Vec<_> = scheme
            .sizes
            .iter()
            .zip(&scheme.offsets)
            .map(|(&size, &offset)| {
                let end = (offset + size).min(ir.len());
                let segment = if offset < ir.len() {
                    &ir[offset..end]
                } else {
                    &[]
                };

                // Find FFT for this size (guaranteed to exist since unique_sizes was built from sizes)
                let size_idx = unique_sizes
                    .iter()
                    .position(|&s| s == size)
                    .expect("partition size must exist in unique_sizes");

                // Pad segment to partition size
                let mut padded = vec![0.0; size];
                let copy_len = segment.len().min(size);
                padded[..copy_len].copy_from_slice(&segment[..copy_len]);

                Partition::new(&padded, &fft_forward[size_idx])
            })
            .collect();

        // Create FDLs for each unique partition size
        let fdls: Vec<Vec<Vec<Complex<f64>>>> = unique_sizes
            .iter()
            .map(|&size| {
                // Count how many partitions of this size
                let count = scheme.sizes.iter().filter(|&&s| s == size).count();
                // Create FDL with enough slots
                (0..count)
                    .map(|_| vec![Complex::new(0.0, 0.0); size + 1])
                    .collect()
            })
            .collect();

        let fdl_positions = vec![0; unique_sizes.len()];

        // Input and overlap buffers sized for max partition
        let max_size = scheme
            .sizes
            .iter()
            .max()
            .copied()
            .unwrap_or(DEFAULT_PARTITION_SIZE);

        // Extract first partition for direct convolution (zero latency)
        let first_size = scheme.min_size();
        let direct_ir: Vec<f64> = ir.iter().take(first_size).copied().collect();
        let direct_history = vec![0.0; first_size];

        // Create overlap buffers per unique partition size
        let overlap_buffers: Vec<Vec<f64>> = unique_sizes
            .iter()
            .map(|&size| vec![0.0; size])
            .collect();

        Self {
            partitions,
            direct_ir,
            direct_history,
            input_buffer: vec![0.0; max_size * 2],
            fdls,
            overlap_buffers,
            fft_forward,
            fft_inverse,
            scheme,
            buffer_pos: 0,
            fdl_positions,
            block_counter: 0,
            unique_sizes,
        }
    }

    fn process_block(&mut self, input: &[f64], output: &mut [f64]) {
        let block_size = self.scheme.min_size();

        // Copy input to buffer
        for (i, &sample) in input.iter().take(block_size).enumerate() {
            self.input_buffer[self.buffer_pos + i] = sample;
        }

        // Process each partition size
        self.process_partitions(output, block_size);

        self.buffer_pos = (self.buffer_pos + block_size) % self.input_buffer.len();
        self.block_counter += 1;
    }

    fn process_partitions(&mut self, output: &mut [f64], block_size: usize) {
        output.fill(0.0);

        // ═══════════════════════════════════════════════════════════════════════════════
        // STAGE 1: DIRECT CONVOLUTION (ZERO LATENCY)
        // ═══════════════════════════════════════════════════════════════════════════════
        // Process first partition in time domain for instant response

        if !self.direct_ir.is_empty() && block_size <= self.direct_ir.len() {
            for (out_idx, out_sample) in output.iter_mut().enumerate().take(block_size) {
                let input_sample = self.input_buffer[self.buffer_pos + out_idx];

                // Update history (circular buffer)
                self.direct_history.rotate_right(1);
                self.direct_history[0] = input_sample;

                // Direct convolution: sum of IR * input history
                let mut sum = 0.0;
                for (ir_sample, hist_sample) in self.direct_ir.iter().zip(&self.direct_history) {
                    sum += ir_sample * hist_sample;
                }
                *out_sample += sum;
            }
        }

        // ═══════════════════════════════════════════════════════════════════════════════
        // STAGE 2+: FFT CONVOLUTION (LATER PARTITIONS)
        // ═══════════════════════════════════════════════════════════════════════════════
        // Process remaining partitions in frequency domain with non-uniform scheduling

        // Skip first partition (already processed via direct convolution)
        for partition in self.partitions.iter().skip(1) {
            let partition_size = partition.size;

            // Find which unique size this partition belongs to
            let size_idx = self.unique_sizes
                .iter()
                .position(|&s| s == partition_size)
                .unwrap_or(0);

            // Determine if this partition should be processed this block
            // Larger partitions are triggered less frequently (non-uniform scheduling)
            let trigger_interval = partition_size / block_size;
            if !self.block_counter.is_multiple_of(trigger_interval) {
                continue;  // Skip this partition this block
            }

            let fft_size = partition_size * 2;

            // FFT the input block
            let mut input_padded = vec![0.0; fft_size];
            let copy_len = block_size.min(partition_size);
            let start_pos = self.buffer_pos;
            let end_pos = start_pos + copy_len;

            if end_pos <= self.input_buffer.len() {
                input_padded[..copy_len].copy_from_slice(&self.input_buffer[start_pos..end_pos]);
            }

            let mut input_spectrum = vec![Complex::new(0.0, 0.0); fft_size / 2 + 1];
            if let Some(fft) = self.fft_forward.get(size_idx) {
                fft.process(&mut input_padded, &mut input_spectrum).ok();
            }

            // Complex multiply with IR spectrum
            let mut result_spectrum: Vec<Complex<f64>> = input_spectrum
                .iter()
                .zip(&partition.spectrum)
                .map(|(a, b)| a * b)
                .collect();

            // IFFT
            let mut result_time = vec![0.0; fft_size];
            if let Some(ifft) = self.fft_inverse.get(size_idx) {
                ifft.process(&mut result_spectrum, &mut result_time).ok();
            }

            // Normalize and overlap-add
            let norm = 1.0 / fft_size as f64;
            for (i, &sample) in result_time.iter().take(block_size).enumerate() {
                if let Some(overlap) = self.overlap_buffers.get(size_idx) {
                    output[i] += sample * norm + overlap.get(i).copied().unwrap_or(0.0);
                }
            }

            // Save overlap for next block
            if let Some(overlap) = self.overlap_buffers.get_mut(size_idx) {
                for i in 0..partition_size.min(overlap.len()) {
                    overlap[i] = if i + block_size < fft_size {
                        result_time[i + block_size] * norm
                    } else {
                        0.0
                    };
                }
            }
        }
    }

    fn reset(&mut self) {
        self.input_buffer.fill(0.0);
        self.direct_history.fill(0.0);
        for overlap in &mut self.overlap_buffers {
            overlap.fill(0.0);
        }
        for fdl in &mut self.fdls {
            for slot in fdl {
                slot.fill(Complex::new(0.0, 0.0));
            }
        }
        self.buffer_pos = 0;
        self.fdl_positions.fill(0);
        self.block_counter = 0;
    }
}

// ============ IR Mode ============

/// Impulse response mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrMode {
    /// Mono IR applied to both channels
    #[default]
    MonoToStereo,
    /// True stereo (L->L, R->R)
    TrueStereo,
    /// Full stereo matrix (L->L, L->R, R->L, R->R)
    StereoMatrix,
}

// ============ Professional Convolution Reverb ============

/// Professional convolution reverb engine
pub struct ProfessionalConvolution {
    /// Left channel processor
    left: Option<ConvolutionChannel>,
    /// Right channel processor
    right: Option<ConvolutionChannel>,
    /// Cross-channels for stereo matrix (L->R, R->L)
    cross_lr: Option<ConvolutionChannel>,
    cross_rl: Option<ConvolutionChannel>,
    /// IR mode
    mode: IrMode,
    /// Partition scheme
    scheme: PartitionScheme,
    /// Dry/wet mix
    dry_wet: f64,
    /// Predelay in samples
    predelay_samples: usize,
    /// Predelay buffers
    predelay_l: Vec<f64>,
    predelay_r: Vec<f64>,
    predelay_pos: usize,
    /// Output gain
    gain: f64,
    /// Sample rate
    sample_rate: f64,
    /// Processing block size
    block_size: usize,
    /// Internal buffers
    input_block_l: Vec<f64>,
    input_block_r: Vec<f64>,
    output_block_l: Vec<f64>,
    output_block_r: Vec<f64>,
    /// Input buffer position
    input_pos: usize,
    /// IR loaded flag
    ir_loaded: bool,
}

impl ProfessionalConvolution {
    /// Create new convolution engine
    pub fn new(sample_rate: f64) -> Self {
        let block_size = MIN_PARTITION_SIZE;
        let max_predelay = (sample_rate * 0.5) as usize; // 500ms max

        Self {
            left: None,
            right: None,
            cross_lr: None,
            cross_rl: None,
            mode: IrMode::MonoToStereo,
            scheme: PartitionScheme::uniform(0, DEFAULT_PARTITION_SIZE),
            dry_wet: 0.5,
            predelay_samples: 0,
            predelay_l: vec![0.0; max_predelay],
            predelay_r: vec![0.0; max_predelay],
            predelay_pos: 0,
            gain: 1.0,
            sample_rate,
            block_size,
            input_block_l: vec![0.0; block_size],
            input_block_r: vec![0.0; block_size],
            output_block_l: vec![0.0; block_size],
            output_block_r: vec![0.0; block_size],
            input_pos: 0,
            ir_loaded: false,
        }
    }

    /// Load mono IR (applied to both channels)
    pub fn load_ir_mono(&mut self, ir: &[f64]) {
        self.scheme = PartitionScheme::non_uniform(ir.len(), MIN_PARTITION_SIZE);
        self.block_size = self.scheme.min_size();

        self.left = Some(ConvolutionChannel::new(ir, self.scheme.clone()));
        self.right = Some(ConvolutionChannel::new(ir, self.scheme.clone()));
        self.cross_lr = None;
        self.cross_rl = None;

        self.mode = IrMode::MonoToStereo;
        self.resize_buffers();
        self.ir_loaded = true;
    }

    /// Load true stereo IR (L->L, R->R)
    pub fn load_ir_stereo(&mut self, left: &[f64], right: &[f64]) {
        let ir_len = left.len().max(right.len());
        self.scheme = PartitionScheme::non_uniform(ir_len, MIN_PARTITION_SIZE);
        self.block_size = self.scheme.min_size();

        self.left = Some(ConvolutionChannel::new(left, self.scheme.clone()));
        self.right = Some(ConvolutionChannel::new(right, self.scheme.clone()));
        self.cross_lr = None;
        self.cross_rl = None;

        self.mode = IrMode::TrueStereo;
        self.resize_buffers();
        self.ir_loaded = true;
    }

    /// Load full stereo matrix IR
    pub fn load_ir_matrix(&mut self, ll: &[f64], lr: &[f64], rl: &[f64], rr: &[f64]) {
        let ir_len = [ll.len(), lr.len(), rl.len(), rr.len()]
            .into_iter()
            .max()
            .unwrap_or(0);
        self.scheme = PartitionScheme::non_uniform(ir_len, MIN_PARTITION_SIZE);
        self.block_size = self.scheme.min_size();

        self.left = Some(ConvolutionChannel::new(ll, self.scheme.clone()));
        self.right = Some(ConvolutionChannel::new(rr, self.scheme.clone()));
        self.cross_lr = Some(ConvolutionChannel::new(lr, self.scheme.clone()));
        self.cross_rl = Some(ConvolutionChannel::new(rl, self.scheme.clone()));

        self.mode = IrMode::StereoMatrix;
        self.resize_buffers();
        self.ir_loaded = true;
    }

    fn resize_buffers(&mut self) {
        self.input_block_l = vec![0.0; self.block_size];
        self.input_block_r = vec![0.0; self.block_size];
        self.output_block_l = vec![0.0; self.block_size];
        self.output_block_r = vec![0.0; self.block_size];
        self.input_pos = 0;
    }

    /// Set dry/wet mix
    pub fn set_dry_wet(&mut self, mix: f64) {
        self.dry_wet = mix.clamp(0.0, 1.0);
    }

    /// Set predelay in milliseconds
    pub fn set_predelay(&mut self, ms: f64) {
        let samples = (ms * 0.001 * self.sample_rate) as usize;
        self.predelay_samples = samples.min(self.predelay_l.len() - 1);
    }

    /// Set output gain in dB
    pub fn set_gain(&mut self, db: f64) {
        self.gain = 10.0_f64.powf(db / 20.0);
    }

    /// Process internal block
    fn process_internal_block(&mut self) {
        // Apply predelay and get delayed input
        let mut delayed_l = vec![0.0; self.block_size];
        let mut delayed_r = vec![0.0; self.block_size];

        for i in 0..self.block_size {
            let read_pos = (self.predelay_pos + self.predelay_l.len() - self.predelay_samples + i)
                % self.predelay_l.len();
            delayed_l[i] = self.predelay_l[read_pos];
            delayed_r[i] = self.predelay_r[read_pos];

            let write_pos = (self.predelay_pos + i) % self.predelay_l.len();
            self.predelay_l[write_pos] = self.input_block_l[i];
            self.predelay_r[write_pos] = self.input_block_r[i];
        }
        self.predelay_pos = (self.predelay_pos + self.block_size) % self.predelay_l.len();

        // Process convolution based on mode
        self.output_block_l.fill(0.0);
        self.output_block_r.fill(0.0);

        match self.mode {
            IrMode::MonoToStereo | IrMode::TrueStereo => {
                if let Some(ref mut left) = self.left {
                    left.process_block(&delayed_l, &mut self.output_block_l);
                }
                if let Some(ref mut right) = self.right {
                    right.process_block(&delayed_r, &mut self.output_block_r);
                }
            }
            IrMode::StereoMatrix => {
                let mut temp = vec![0.0; self.block_size];

                // L->L
                if let Some(ref mut left) = self.left {
                    left.process_block(&delayed_l, &mut self.output_block_l);
                }
                // R->R
                if let Some(ref mut right) = self.right {
                    right.process_block(&delayed_r, &mut self.output_block_r);
                }
                // L->R
                if let Some(ref mut cross_lr) = self.cross_lr {
                    cross_lr.process_block(&delayed_l, &mut temp);
                    for (o, &t) in self.output_block_r.iter_mut().zip(&temp) {
                        *o += t;
                    }
                }
                // R->L
                if let Some(ref mut cross_rl) = self.cross_rl {
                    cross_rl.process_block(&delayed_r, &mut temp);
                    for (o, &t) in self.output_block_l.iter_mut().zip(&temp) {
                        *o += t;
                    }
                }
            }
        }

        // Apply gain
        for sample in &mut self.output_block_l {
            *sample *= self.gain;
        }
        for sample in &mut self.output_block_r {
            *sample *= self.gain;
        }
    }
}

impl Processor for ProfessionalConvolution {
    fn reset(&mut self) {
        if let Some(ref mut left) = self.left {
            left.reset();
        }
        if let Some(ref mut right) = self.right {
            right.reset();
        }
        if let Some(ref mut cross_lr) = self.cross_lr {
            cross_lr.reset();
        }
        if let Some(ref mut cross_rl) = self.cross_rl {
            cross_rl.reset();
        }

        self.predelay_l.fill(0.0);
        self.predelay_r.fill(0.0);
        self.predelay_pos = 0;
        self.input_block_l.fill(0.0);
        self.input_block_r.fill(0.0);
        self.output_block_l.fill(0.0);
        self.output_block_r.fill(0.0);
        self.input_pos = 0;
    }

    fn latency(&self) -> usize {
        self.block_size + self.predelay_samples
    }
}

impl StereoProcessor for ProfessionalConvolution {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        if !self.ir_loaded {
            return (left, right);
        }

        // Add to input block
        self.input_block_l[self.input_pos] = left;
        self.input_block_r[self.input_pos] = right;

        // Get output from previous block
        let wet_l = self.output_block_l[self.input_pos];
        let wet_r = self.output_block_r[self.input_pos];

        self.input_pos += 1;

        // Process block when full
        if self.input_pos >= self.block_size {
            self.process_internal_block();
            self.input_pos = 0;
        }

        // Mix dry/wet
        let out_l = left * (1.0 - self.dry_wet) + wet_l * self.dry_wet;
        let out_r = right * (1.0 - self.dry_wet) + wet_r * self.dry_wet;

        (out_l, out_r)
    }
}

impl ProcessorConfig for ProfessionalConvolution {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        if (sample_rate - self.sample_rate).abs() > 1.0 {
            self.sample_rate = sample_rate;
            let max_predelay = (sample_rate * 0.5) as usize;
            self.predelay_l = vec![0.0; max_predelay];
            self.predelay_r = vec![0.0; max_predelay];
            // Note: IR should be reloaded at new sample rate
            self.ir_loaded = false;
        }
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_scheme_uniform() {
        let scheme = PartitionScheme::uniform(10000, 512);
        assert_eq!(scheme.min_size(), 512);
        assert_eq!(scheme.sizes.len(), 20); // 10000 / 512 rounded up
    }

    #[test]
    fn test_partition_scheme_non_uniform() {
        let scheme = PartitionScheme::non_uniform(10000, 64);
        assert_eq!(scheme.min_size(), 64);
        // Should have small partitions first, then larger
        assert!(!scheme.sizes.is_empty());
    }

    #[test]
    fn test_convolution_without_ir() {
        let mut conv = ProfessionalConvolution::new(48000.0);

        // Without IR, should pass through
        let (l, r) = conv.process_sample(0.5, 0.5);
        assert!((l - 0.5).abs() < 1e-10);
        assert!((r - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_convolution_with_mono_ir() {
        let mut conv = ProfessionalConvolution::new(48000.0);

        // Simple impulse IR (Dirac delta)
        let ir = vec![1.0; 64];
        conv.load_ir_mono(&ir);
        conv.set_dry_wet(1.0);

        // Process some samples
        for _ in 0..1000 {
            let _ = conv.process_sample(0.5, 0.5);
        }
    }

    #[test]
    fn test_convolution_reset() {
        let mut conv = ProfessionalConvolution::new(48000.0);
        let ir = vec![1.0; 256];
        conv.load_ir_mono(&ir);

        // Process some samples
        for _ in 0..500 {
            let _ = conv.process_sample(1.0, 1.0);
        }

        // Reset
        conv.reset();

        // State should be cleared
        assert_eq!(conv.input_pos, 0);
    }
}
