//! `Engine` — the T-game-side front-door handle (§2 component K, §9 redesign
//! of the original's `amEngine` global singleton).
//!
//! Owns the producer half of the command ring, the diagnostic receiver, and
//! the non-realtime bank-staging table guarded by `parking_lot::Mutex` (§2.1
//! "setup/teardown locks"). `Engine::new` also builds the paired `Mixer`,
//! which the caller hands off to the audio callback thread — after that
//! handoff the two halves only ever talk through the command ring and the
//! diagnostic channel, never a shared lock.

use std::collections::HashMap;

use am_core::BusId;
use am_spatial::hoa::AmbisonicOrder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::assets::{Collection, Sound, SwitchContainer};
use crate::bus::BusGraphError;
use crate::command::{
    command_channel, diagnostic_channel, BankContents, ChannelHandle, Command, CommandProducer,
    DiagnosticEvent,
};
use crate::mixer::{DecoderFactory, Mixer, MixerConfig};
use crate::pipeline::{BinauralMode, SpatializationMode};

/// One bus to create at startup, beyond the always-present master bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusDef {
    pub id: BusId,
    pub name: String,
    pub parent: BusId,
}

/// Caller-supplied initialization record (§2.1 "Configuration"): sample
/// rate, block size, voice budget, ambisonic order, and the bus topology to
/// build before the audio thread starts pulling blocks. Constructed once by
/// the host and handed to `Engine::new`; nothing here is read from an
/// environment variable or a global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub block_size: usize,
    pub max_real_voices: usize,
    pub ambisonic_order: AmbisonicOrder,
    pub default_spatialization: SpatializationMode,
    pub default_binaural_mode: BinauralMode,
    pub buses: Vec<BusDef>,
    /// Command ring capacity (§5); one command per tick per distinct
    /// mutation is the typical load, so this rarely needs to exceed a few
    /// hundred slots even at a high command rate.
    pub command_ring_capacity: usize,
    /// Diagnostic channel capacity (§5); bounded and allowed to fill, since
    /// a full ring just means T-game hasn't drained its diagnostics lately.
    pub diagnostic_ring_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            block_size: 256,
            max_real_voices: 32,
            ambisonic_order: AmbisonicOrder::Third,
            default_spatialization: SpatializationMode::Ambisonic,
            default_binaural_mode: BinauralMode::Hrtf,
            buses: Vec::new(),
            command_ring_capacity: 512,
            diagnostic_ring_capacity: 256,
        }
    }
}

impl EngineConfig {
    fn to_mixer_config(&self) -> MixerConfig {
        MixerConfig {
            sample_rate: self.sample_rate,
            max_real_voices: self.max_real_voices,
            ambisonic_order: self.ambisonic_order,
            default_spatialization: self.default_spatialization,
            default_binaural_mode: self.default_binaural_mode,
        }
    }
}

/// The host-facing handle: queues commands, polls diagnostics, stages banks.
/// Everything that actually renders audio lives on the paired `Mixer`
/// returned by `new`, which the host moves onto its audio callback thread.
pub struct Engine {
    config: EngineConfig,
    producer: CommandProducer,
    diagnostics: crossbeam_channel::Receiver<DiagnosticEvent>,
    /// Bank content staged by the host's asset loader (flatbuffer parsing is
    /// out of scope, §1) ahead of a `load_bank` call. `parking_lot::Mutex`
    /// because staging happens off the audio thread and is never contended
    /// from it (§2.1).
    staged_banks: Mutex<HashMap<String, BankContents>>,
}

impl Engine {
    /// Build the T-game handle and its paired T-audio `Mixer`, wiring the
    /// command ring and diagnostic channel between them and installing the
    /// configured bus topology before either side starts running.
    pub fn new(config: EngineConfig, decoder_factory: DecoderFactory) -> Result<(Self, Mixer), BusGraphError> {
        let (producer, consumer) = command_channel(config.command_ring_capacity);
        let (diag_tx, diag_rx) = diagnostic_channel(config.diagnostic_ring_capacity);

        let mut mixer = Mixer::new(config.to_mixer_config(), config.block_size, consumer, diag_tx, decoder_factory);
        for bus in &config.buses {
            mixer.buses.add_bus(bus.id, bus.name.clone(), bus.parent)?;
        }

        Ok((
            Self {
                config,
                producer,
                diagnostics: diag_rx,
                staged_banks: Mutex::new(HashMap::new()),
            },
            mixer,
        ))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stage a bank's pre-parsed definition records under `name`, ready for
    /// a subsequent `load_bank` call. Safe to call from any non-realtime
    /// thread; the mutex is never held while a command is in flight.
    pub fn stage_bank(&self, name: impl Into<String>, contents: BankContents) {
        self.staged_banks.lock().insert(name.into(), contents);
    }

    /// Enqueue a `LoadBank` command for a previously staged bank. Returns
    /// `false` if nothing was staged under `name`, or if the ring is full
    /// (§5's bounded-push contract — the caller owns retry policy).
    pub fn load_bank(&mut self, name: &str) -> bool {
        let Some(contents) = self.staged_banks.lock().remove(name) else {
            log::warn!("load_bank({name}): no bank staged under that name");
            return false;
        };
        self.push(Command::LoadBank { name: name.to_string(), contents })
    }

    pub fn unload_bank(&mut self, name: &str) -> bool {
        self.push(Command::UnloadBank { name: name.to_string() })
    }

    // ---- §6 Command API, queued side ----

    /// Queue a `play`. Unlike `Mixer::play`, this cannot hand back a
    /// `channel_handle` synchronously — T-audio resolves the sound object
    /// after the command crosses the ring. Callers that need the handle
    /// immediately (single-threaded embedding, tests) call `Mixer::play`
    /// directly instead; this queued form is for the cross-thread path.
    pub fn play(&mut self, sound_object: crate::assets::SoundObjectId, entity: Option<am_core::EntityId>, fade_ms: f64) -> bool {
        self.push(Command::Play { sound_object, entity, fade_ms })
    }

    pub fn stop(&mut self, channel: ChannelHandle, fade_ms: f64) -> bool {
        self.push(Command::Stop { channel, fade_ms })
    }

    pub fn pause(&mut self, channel: ChannelHandle) -> bool {
        self.push(Command::Pause { channel })
    }

    pub fn resume(&mut self, channel: ChannelHandle) -> bool {
        self.push(Command::Resume { channel })
    }

    pub fn set_location(&mut self, entity: am_core::EntityId, location: am_spatial::Position3D) -> bool {
        self.push(Command::SetLocation { entity, location })
    }

    pub fn set_orientation(&mut self, entity: am_core::EntityId, orientation: am_spatial::Orientation) -> bool {
        self.push(Command::SetOrientation { entity, orientation })
    }

    pub fn set_listener_location(&mut self, listener: am_core::ListenerId, location: am_spatial::Position3D) -> bool {
        self.push(Command::SetListenerLocation { listener, location })
    }

    pub fn set_listener_orientation(&mut self, listener: am_core::ListenerId, orientation: am_spatial::Orientation) -> bool {
        self.push(Command::SetListenerOrientation { listener, orientation })
    }

    pub fn set_rtpc(&mut self, rtpc: am_core::RtpcId, value: f64) -> bool {
        self.push(Command::SetRtpc { rtpc, value })
    }

    pub fn set_attenuation(&mut self, entity: am_core::EntityId, attenuation: Option<am_core::AttenuationId>) -> bool {
        self.push(Command::SetAttenuation { entity, attenuation })
    }

    pub fn set_entity_environment(&mut self, entity: am_core::EntityId, environment: am_core::EnvironmentId, factor: f32) -> bool {
        self.push(Command::SetEntityEnvironment { entity, environment, factor })
    }

    pub fn set_switch(&mut self, group: u32, state: u32) -> bool {
        self.push(Command::SetSwitch { group, state })
    }

    pub fn set_bus_gain(&mut self, bus: BusId, gain: f64) -> bool {
        self.push(Command::SetBusGain { bus, gain })
    }

    pub fn fade_bus(&mut self, bus: BusId, gain: f64, duration_ms: f64) -> bool {
        self.push(Command::FadeBus { bus, gain, duration_ms })
    }

    pub fn mute_bus(&mut self, bus: BusId, muted: bool) -> bool {
        self.push(Command::MuteBus { bus, muted })
    }

    /// `advance_frame(dt)` (§6): a no-op here. In the two-thread design
    /// (§5) `Mixer::mix` already advances its own clock from the block
    /// size and sample rate every callback, driven by the device — there
    /// is no separate game-frame clock for T-game to push. Kept so a host
    /// ported from a single-threaded embedding (tests, offline render)
    /// doesn't need a call-site special case.
    pub fn advance_frame(&mut self, dt: f64) {
        let _ = dt;
    }

    fn push(&mut self, command: Command) -> bool {
        match self.producer.push(command) {
            Ok(()) => true,
            Err(dropped) => {
                log::warn!("command ring full, dropping command: {dropped:?}");
                false
            }
        }
    }

    /// Drain and log every diagnostic T-audio has reported since the last
    /// call (§5, §7 "propagation policy" — T-game is the layer responsible
    /// for actually logging; T-audio never performs I/O of its own).
    pub fn poll_diagnostics(&self) -> Vec<DiagnosticEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.diagnostics.try_recv() {
            match event {
                DiagnosticEvent::PipelineNodeBypassed { channel, fault } => {
                    log::debug!("channel {channel:?}: pipeline node bypassed ({fault:?})")
                }
                DiagnosticEvent::DecoderUnderrun { channel } => log::debug!("channel {channel:?}: decoder underrun"),
                DiagnosticEvent::ResamplerFault { channel } => log::warn!("channel {channel:?}: resampler fault"),
                DiagnosticEvent::VoiceStoppedOnDecoderError { channel } => {
                    log::warn!("channel {channel:?}: stopped on decoder error")
                }
                DiagnosticEvent::InvalidCommandIgnored => log::warn!("invalid command ignored"),
            }
            events.push(event);
        }
        events
    }
}

/// Convenience constructor for a `BankContents` out of already-parsed asset
/// records, so host code doesn't need to depend on `am-engine::assets`'
/// field layout directly.
pub fn bank_contents(sounds: Vec<Sound>, collections: Vec<Collection>, switch_containers: Vec<SwitchContainer>) -> BankContents {
    BankContents { sounds, collections, switch_containers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Sound, SoundObjectCommon};
    use crate::io::PcmDecoder;
    use am_core::SoundId;

    fn factory() -> DecoderFactory {
        Box::new(|_id| {
            Some((
                Box::new(PcmDecoder::new(vec![0.0; 48_000], 48_000, 1)) as Box<dyn crate::io::Decoder>,
                48_000,
            ))
        })
    }

    #[test]
    fn new_builds_the_configured_bus_topology() {
        let config = EngineConfig {
            buses: vec![BusDef { id: BusId::new(2), name: "music".into(), parent: BusId::MASTER }],
            ..EngineConfig::default()
        };
        let (_engine, mixer) = Engine::new(config, factory()).unwrap();
        assert!(mixer.buses.bus(BusId::new(2)).is_some());
    }

    #[test]
    fn load_bank_without_staging_is_rejected() {
        let (mut engine, _mixer) = Engine::new(EngineConfig::default(), factory()).unwrap();
        assert!(!engine.load_bank("missing"));
    }

    #[test]
    fn staged_bank_round_trips_through_the_command_ring() {
        let (mut engine, mut mixer) = Engine::new(EngineConfig::default(), factory()).unwrap();
        let sound = Sound {
            id: SoundId::new(7),
            name: "footstep".into(),
            common: SoundObjectCommon::default(),
            looping: false,
        };
        engine.stage_bank("core", bank_contents(vec![sound], Vec::new(), Vec::new()));
        assert!(engine.load_bank("core"));

        let mut out = vec![0.0; 256 * 2];
        mixer.mix(&mut out, 256);
        assert!(mixer.assets.sounds.contains_key(&SoundId::new(7)));
    }

    #[test]
    fn engine_config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sample_rate, config.sample_rate);
    }
}
