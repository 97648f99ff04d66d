//! am-audio: the device I/O boundary.
//!
//! Spec §1 treats the device driver as an external collaborator; this crate
//! is the thin layer that registers a cpal callback and negotiates format,
//! plus the lock-free ring buffers and real-time thread priority helpers
//! the audio callback and the command/diagnostic path need.

mod device;
mod error;
pub mod ringbuf;
mod stream;
pub mod thread_priority;

pub use device::*;
pub use error::*;
pub use stream::*;

use am_core::{BufferSize, SampleRate};

/// Audio engine configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate: SampleRate,
    pub buffer_size: BufferSize,
    pub input_channels: u16,
    pub output_channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz48000,
            buffer_size: BufferSize::Samples256,
            input_channels: 2,
            output_channels: 2,
        }
    }
}
