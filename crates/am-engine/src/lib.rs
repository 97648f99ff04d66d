//! am-engine: the real-time spatialized audio engine core (§1).
//!
//! Owns the full tick: command intake, bus graph, playable assets, RTPC/
//! switch state, the channel state machine, per-voice DSP pipelines, and
//! the Amplimix mixer that drives them all every block. Codecs, file I/O,
//! and the platform audio callback are out of scope (§1) — see `am-audio`
//! for the device boundary this crate is driven through.

#![allow(clippy::too_many_arguments)]

mod assets;
mod attenuation;
mod bus;
mod channel;
mod command;
mod curve;
mod engine;
mod io;
mod mixer;
mod pipeline;
mod rtpc;
mod scheduler;
mod voice;
mod world;

pub use assets::{
    AssetTable, Collection, CollectionPolicy, CollectionScheduler, RtpcValue, SchedulerScopeKey,
    Sound, SoundObjectCommon, SoundObjectId, SwitchContainer,
};
pub use attenuation::{Attenuation, AttenuationShape};
pub use bus::{Bus, BusGraph, BusGraphError, DuckEntry};
pub use channel::{Channel, ChannelState, MIN_FADE_DURATION};
pub use command::{
    command_channel, diagnostic_channel, BankContents, ChannelHandle, Command, CommandConsumer,
    CommandProducer, DiagnosticEvent,
};
pub use curve::{Curve, CurvePart};
pub use engine::{bank_contents, BusDef, Engine, EngineConfig};
pub use io::{Decoder, Interleave, LinearResampler, PcmDecoder, Resampler, SampleType, SoundFormat};
pub use mixer::{DecoderFactory, Mixer, MixerConfig, ObstructionCurves};
pub use pipeline::{soft_clip, BinauralMode, NodeFault, SpatializationMode, VoicePipeline, VoiceTickParams};
pub use rtpc::{Rtpc, RtpcTable, SwitchTable};
pub use scheduler::{RandomScheduler, ScheduleEntry, SequenceEndBehavior, SequenceScheduler, SkipSet};
pub use voice::Voice;
pub use world::{Entity, Environment, Listener, World};
