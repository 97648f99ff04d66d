//! Amplimix (§4.1): the mixer core. `mix()` is the audio callback's entry
//! point — the only method the device driver calls every tick.

use std::collections::{HashMap, HashSet};

use am_core::{AttenuationId, BusId, EntityId, Sample, SoundId};
use am_spatial::hoa::AmbisonicOrder;
use am_spatial::room::Room;
use am_spatial::Position3D;
use crossbeam_channel::Sender;

use crate::assets::{AssetTable, CollectionPolicy, CollectionScheduler, SchedulerScopeKey, SoundObjectId};
use crate::attenuation::Attenuation;
use crate::bus::BusGraph;
use crate::channel::{Channel, ChannelState};
use crate::command::{BankContents, ChannelHandle, Command, CommandConsumer, DiagnosticEvent};
use crate::curve::Curve;
use crate::io::{Decoder, Resampler};
use crate::pipeline::{soft_clip, BinauralMode, SpatializationMode, VoiceTickParams};
use crate::rtpc::{RtpcTable, SwitchTable};
use crate::scheduler::{RandomScheduler, ScheduleEntry, SequenceEndBehavior, SequenceScheduler, SkipSet};
use crate::voice::Voice;
use crate::world::{Listener, World};

/// Produces a fresh decoder/resampler pair for a `Sound` asset, plus the
/// decoder's native sample rate. Supplied by the caller at construction —
/// codecs and file I/O are out of scope for this crate (§1).
pub type DecoderFactory = Box<dyn FnMut(SoundId) -> Option<(Box<dyn Decoder>, u32)> + Send>;

fn make_scheduler(policy: &CollectionPolicy, children: &[SoundId]) -> CollectionScheduler {
    match policy {
        CollectionPolicy::Random => {
            CollectionScheduler::Random(RandomScheduler::new(children.iter().map(|&id| ScheduleEntry::new(id, 1.0))))
        }
        CollectionPolicy::Sequence => {
            CollectionScheduler::Sequence(SequenceScheduler::new(children.iter().copied(), SequenceEndBehavior::Restart))
        }
    }
}

fn bus_gain_for(channel: &Channel, assets: &AssetTable, buses: &BusGraph) -> f64 {
    channel
        .resolution_chain
        .last()
        .and_then(|&id| assets.common_of(id))
        .and_then(|c| buses.bus(c.bus_id))
        .map(|b| b.final_gain())
        .unwrap_or(1.0)
}

fn attenuation_gain(
    channel: &Channel,
    listener_pos: Position3D,
    assets: &AssetTable,
    attenuations: &HashMap<AttenuationId, Attenuation>,
    world: &World,
) -> f64 {
    let Some(common) = channel.resolution_chain.last().and_then(|&id| assets.common_of(id)) else {
        return 1.0;
    };
    let Some(att_id) = common.attenuation_id else {
        return 1.0;
    };
    let Some(att) = attenuations.get(&att_id) else {
        return 1.0;
    };
    let source = channel
        .entity
        .and_then(|e| world.entities.get(&e))
        .map(|e| e.location)
        .unwrap_or(Position3D::origin());
    att.gain(source, listener_pos)
}

/// Volume, largest face area, and mean wall absorption for a [`Room`] — the
/// three scalars `VoicePipeline::set_room_acoustics` derives Freeverb
/// `room_size`/`damp` from (§4.10).
fn room_acoustics(room: &Room) -> (f64, f64, f64) {
    let (w, d, h) = (room.dimensions.0 as f64, room.dimensions.1 as f64, room.dimensions.2 as f64);
    let volume = w * d * h;
    let max_surface = (w * d).max(w * h).max(d * h);
    let walls = &room.walls;
    let avg_absorption = (walls.left.average_absorption()
        + walls.right.average_absorption()
        + walls.front.average_absorption()
        + walls.back.average_absorption()
        + walls.floor.average_absorption()
        + walls.ceiling.average_absorption()) as f64
        / 6.0;
    (volume, max_surface, avg_absorption)
}

/// §4.1 step 4: per-tick scalars a voice's pipeline needs. The third element
/// is the dominant room an entity sits in, if any factor in `env_factors` is
/// nonzero — the caller feeds it to `set_room_acoustics` before the voice's
/// reverb send runs.
fn tick_params_for(
    channel: &Channel,
    listener: &Listener,
    world: &World,
    assets: &AssetTable,
    attenuations: &HashMap<AttenuationId, Attenuation>,
    obstruction_curves: &ObstructionCurves,
    now: f64,
) -> (VoiceTickParams, f32, Option<Room>) {
    let mut params = VoiceTickParams::default();
    let entity = channel.entity.and_then(|e| world.entities.get(&e));
    let distance = entity.map(|e| e.distance_to(listener)).unwrap_or(0.0);

    params.attenuation_gain = attenuation_gain(channel, listener.location, assets, attenuations, world) * channel.gain(now);

    let mut room = None;
    if let Some(entity) = entity {
        params.obstruction_coeff = obstruction_curves.obstruction_coeff.evaluate(entity.obstruction as f64);
        params.obstruction_gain = obstruction_curves.obstruction_gain.evaluate(entity.obstruction as f64);
        params.occlusion_coeff = obstruction_curves.occlusion_coeff.evaluate(entity.occlusion as f64);
        params.occlusion_gain = obstruction_curves.occlusion_gain.evaluate(entity.occlusion as f64);

        let local = listener.world_to_local(entity.location);
        params.direction_listener_space = local;
        let mag = local.magnitude();
        params.pan = if mag > f32::EPSILON { (local.x / mag) as f64 } else { 0.0 };

        let mut best_factor = 0.0f32;
        for (env_id, &factor) in &entity.env_factors {
            if factor <= best_factor {
                continue;
            }
            if let Some(env) = world.environments.get(env_id) {
                best_factor = factor;
                room = Some(env.room.clone());
            }
        }
        params.env_factor = best_factor as f64;
    }
    params.listener_orientation = listener.orientation;
    (params, distance, room)
}

/// §9 decision: an environment's direct effect override takes precedence
/// over the Reverb node for any voice whose entity reports a nonzero
/// factor in that environment.
fn environment_override_for_channel(channel: &Channel, world: &World) -> bool {
    let Some(entity_id) = channel.entity else { return false };
    let Some(entity) = world.entities.get(&entity_id) else { return false };
    entity
        .env_factors
        .keys()
        .any(|env_id| world.environments.get(env_id).map(|e| e.effect_override.is_some()).unwrap_or(false))
}

/// Tunables fixed at construction (§4.1 "fixed size" tick, §4.6 voice budget).
#[derive(Debug, Clone, Copy)]
pub struct MixerConfig {
    pub sample_rate: f64,
    pub max_real_voices: usize,
    pub ambisonic_order: AmbisonicOrder,
    pub default_spatialization: SpatializationMode,
    pub default_binaural_mode: BinauralMode,
}

/// Obstruction/occlusion mapping curves: `entity.obstruction`/`.occlusion`
/// in `[0, 1]` drive a low-pass coefficient and a makeup gain (§4.7).
pub struct ObstructionCurves {
    pub obstruction_coeff: Curve,
    pub obstruction_gain: Curve,
    pub occlusion_coeff: Curve,
    pub occlusion_gain: Curve,
}

impl Default for ObstructionCurves {
    fn default() -> Self {
        use am_event::FaderCurve;
        Self {
            obstruction_coeff: Curve::single((0.0, 1.0), (1.0, 0.05), FaderCurve::LINEAR),
            obstruction_gain: Curve::single((0.0, 1.0), (1.0, 0.4), FaderCurve::LINEAR),
            occlusion_coeff: Curve::single((0.0, 1.0), (1.0, 0.02), FaderCurve::LINEAR),
            occlusion_gain: Curve::single((0.0, 1.0), (1.0, 0.2), FaderCurve::LINEAR),
        }
    }
}

/// The mixer core (§4.1 "Amplimix"). Owns every piece of state the tick
/// touches: world, bus graph, asset/RTPC/switch tables, and the channel
/// arena. Runs entirely on the audio thread; `command_consumer` is the
/// only inbound path from T-game (§5).
pub struct Mixer {
    pub world: World,
    pub buses: BusGraph,
    pub assets: AssetTable,
    pub rtpcs: RtpcTable,
    pub switches: SwitchTable,
    pub attenuations: HashMap<AttenuationId, Attenuation>,
    pub obstruction_curves: ObstructionCurves,

    channels: am_core::Arena<Channel>,
    voices: HashMap<ChannelHandle, Voice>,
    schedulers: HashMap<SchedulerScopeKey, CollectionScheduler>,

    command_consumer: CommandConsumer,
    diagnostics: Sender<DiagnosticEvent>,
    decoder_factory: DecoderFactory,

    /// Ids contributed by each loaded bank, so `UnloadBank` removes exactly
    /// what its `LoadBank` added (§6 `load_bank`/`unload_bank`).
    bank_assets: HashMap<String, Vec<SoundObjectId>>,

    config: MixerConfig,
    /// Monotonic tick clock, in seconds, fed to every `Fader::value`/`advance`.
    now: f64,
}

impl Mixer {
    pub fn new(
        config: MixerConfig,
        block_size: usize,
        command_consumer: CommandConsumer,
        diagnostics: Sender<DiagnosticEvent>,
        decoder_factory: DecoderFactory,
    ) -> Self {
        Self {
            world: World::new(),
            buses: BusGraph::new(block_size),
            assets: AssetTable::new(),
            rtpcs: RtpcTable::new(),
            switches: SwitchTable::new(),
            attenuations: HashMap::new(),
            obstruction_curves: ObstructionCurves::default(),
            channels: am_core::Arena::new(),
            voices: HashMap::new(),
            schedulers: HashMap::new(),
            command_consumer,
            diagnostics,
            decoder_factory,
            bank_assets: HashMap::new(),
            config,
            now: 0.0,
        }
    }

    fn emit(&self, event: DiagnosticEvent) {
        let _ = self.diagnostics.try_send(event);
    }

    // ---- Command API (§6), callable directly or via the queued path ----

    /// `play(sound_object_id, entity_id?, fade_ms) -> channel_handle` (§6).
    /// Synchronous: resolves the sound object's scheduler chain immediately
    /// and returns a never-valid handle on resolution failure (§7 "A failed
    /// `play` returns a never-valid channel handle").
    pub fn play(&mut self, sound_object: SoundObjectId, entity: Option<EntityId>, fade_ms: f64) -> ChannelHandle {
        let chain = {
            let assets = &self.assets;
            let switches = &self.switches;
            let schedulers = &mut self.schedulers;
            assets.resolve(
                sound_object,
                &|state| switches.is_active(state),
                &mut |cid, children| {
                    let collection = assets.collections.get(&cid)?;
                    let scope = SchedulerScopeKey { collection: cid, entity };
                    let sched = schedulers.entry(scope).or_insert_with(|| make_scheduler(&collection.policy, children));
                    sched.select(&SkipSet::new())
                },
            )
        };

        let Some(chain) = chain else {
            self.emit(DiagnosticEvent::InvalidCommandIgnored);
            return ChannelHandle::INVALID;
        };

        let looping = match chain.last() {
            Some(SoundObjectId::Sound(id)) => self.assets.sounds.get(id).map(|s| s.looping).unwrap_or(false),
            _ => false,
        };

        let mut channel = Channel::new(am_core::ChannelId::INVALID, sound_object, entity, looping);
        channel.resolution_chain = chain;
        channel.play(fade_ms / 1000.0, self.now);
        let handle = self.channels.insert(channel);
        if let Some(c) = self.channels.get_mut(handle) {
            c.id = am_core::ChannelId::new(handle.index() as u64 + 1);
        }
        handle
    }

    pub fn stop(&mut self, channel: ChannelHandle, fade_ms: f64) {
        if let Some(c) = self.channels.get_mut(channel) {
            c.stop(fade_ms / 1000.0, self.now);
        }
    }

    pub fn pause(&mut self, channel: ChannelHandle) {
        if let Some(c) = self.channels.get_mut(channel) {
            c.pause(self.now);
        }
    }

    pub fn resume(&mut self, channel: ChannelHandle) {
        if let Some(c) = self.channels.get_mut(channel) {
            c.resume(self.now);
        }
    }

    /// Any channel that doesn't resolve — including an already-recycled
    /// generation — reports `Stopped` (§7 "queries report Stopped").
    pub fn channel_state(&self, channel: ChannelHandle) -> ChannelState {
        self.channels.get(channel).map(|c| c.state).unwrap_or(ChannelState::Stopped)
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::Play { sound_object, entity, fade_ms } => {
                self.play(sound_object, entity, fade_ms);
            }
            Command::Stop { channel, fade_ms } => self.stop(channel, fade_ms),
            Command::Pause { channel } => self.pause(channel),
            Command::Resume { channel } => self.resume(channel),
            Command::SetLocation { entity, location } => self.world.entity_mut(entity).location = location,
            Command::SetOrientation { entity, orientation } => self.world.entity_mut(entity).orientation = orientation,
            Command::SetListenerLocation { listener, location } => self.world.listener_mut(listener).set_location(location),
            Command::SetListenerOrientation { listener, orientation } => {
                self.world.listener_mut(listener).set_orientation(orientation)
            }
            Command::SetRtpc { rtpc, value } => self.rtpcs.set(rtpc, value, self.now),
            Command::SetSwitch { group, state } => self.switches.set(group, state),
            Command::SetBusGain { bus, gain } => {
                if let Some(b) = self.buses.bus_mut(bus) {
                    b.user_gain_db = am_core::Decibels::from_gain(gain);
                }
            }
            Command::FadeBus { bus, gain, duration_ms } => {
                if let Some(b) = self.buses.bus_mut(bus) {
                    b.fade_to(gain, duration_ms, self.now);
                }
            }
            Command::MuteBus { bus, muted } => {
                if let Some(b) = self.buses.bus_mut(bus) {
                    b.mute = muted;
                }
            }
            Command::SetAttenuation { entity, attenuation } => {
                // Attenuation is authored per sound-object (`attenuation_id`
                // in `SoundObjectCommon`), not per entity (§3); nothing in
                // the data model to mutate here beyond logging intent.
                let _ = (entity, attenuation);
            }
            Command::SetEntityEnvironment { entity, environment, factor } => {
                self.world.entity_mut(entity).env_factors.insert(environment, factor);
            }
            Command::LoadBank { name, contents: BankContents { sounds, collections, switch_containers } } => {
                let ids = self.bank_assets.entry(name).or_default();
                for sound in sounds {
                    ids.push(SoundObjectId::Sound(sound.id));
                    self.assets.sounds.insert(sound.id, sound);
                }
                for collection in collections {
                    ids.push(SoundObjectId::Collection(collection.id));
                    self.assets.collections.insert(collection.id, collection);
                }
                for switch_container in switch_containers {
                    ids.push(SoundObjectId::SwitchContainer(switch_container.id));
                    self.assets.switch_containers.insert(switch_container.id, switch_container);
                }
            }
            Command::UnloadBank { name } => {
                let Some(ids) = self.bank_assets.remove(&name) else { return };
                for id in ids {
                    match id {
                        SoundObjectId::Sound(id) => {
                            self.assets.sounds.remove(&id);
                        }
                        SoundObjectId::Collection(id) => {
                            self.assets.collections.remove(&id);
                        }
                        SoundObjectId::SwitchContainer(id) => {
                            self.assets.switch_containers.remove(&id);
                        }
                    }
                }
            }
        }
    }

    /// §4.1 step 1: drain the command queue in full, in FIFO order.
    fn drain_commands(&mut self) {
        let commands = self.command_consumer.drain();
        for command in commands {
            self.apply_command(command);
        }
    }

    /// §4.1 step 5: promote up to `max_real_voices` channels by effective
    /// priority; the rest become/stay virtual. Promotion/demotion begins a
    /// `MIN_FADE_DURATION` cross-fade (§4.6).
    fn partition_voices(&mut self, listener: &Listener) {
        let mut scored: Vec<(ChannelHandle, f64)> = {
            let world = &self.world;
            let assets = &self.assets;
            let buses = &self.buses;
            self.channels
                .iter_handles()
                .filter(|(_, c)| c.is_audible())
                .map(|(handle, c)| {
                    let distance = c.entity.and_then(|e| world.entities.get(&e)).map(|e| e.distance_to(listener)).unwrap_or(0.0);
                    let bus_gain = bus_gain_for(c, assets, buses);
                    (handle, c.effective_priority(distance, bus_gain))
                })
                .collect()
        };
        // Higher effective_priority wins (channel.rs); take the top
        // `max_real_voices` by that order, not arena/iteration order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let real_set: HashSet<ChannelHandle> =
            scored.iter().take(self.config.max_real_voices).map(|(h, _)| *h).collect();

        for (handle, _) in &scored {
            let should_be_real = real_set.contains(handle);
            let Some(channel) = self.channels.get_mut(*handle) else { continue };
            if should_be_real && !channel.is_real {
                channel.is_real = true;
                channel.begin_switching_fade(self.now);
                let needs_voice = !self.voices.contains_key(handle);
                if needs_voice {
                    let sound_id = match channel.resolution_chain.last().copied() {
                        Some(SoundObjectId::Sound(sound_id)) => Some(sound_id),
                        _ => None,
                    };
                    if let Some(sound_id) = sound_id {
                        if let Some((decoder, native_rate)) = (self.decoder_factory)(sound_id) {
                            let voice = Voice::new(
                                decoder,
                                Box::new(crate::io::LinearResampler::new()),
                                self.config.sample_rate,
                                self.config.ambisonic_order,
                                self.config.default_spatialization,
                                self.config.default_binaural_mode,
                                native_rate,
                            );
                            self.voices.insert(*handle, voice);
                        }
                    }
                }
            } else if !should_be_real && channel.is_real {
                channel.is_real = false;
                channel.begin_switching_fade(self.now);
                self.voices.remove(handle);
            }
        }
    }

    /// The audio callback's entry point (§4.1, §6 `mix` contract). Writes
    /// exactly `frame_count` interleaved stereo frames into `output`.
    pub fn mix(&mut self, output: &mut [Sample], frame_count: usize) {
        debug_assert_eq!(output.len(), frame_count * 2);

        self.drain_commands();

        let dt = frame_count as f64 / self.config.sample_rate;
        self.now += dt;
        self.rtpcs.advance_all(self.now);

        self.buses.advance_all(self.now);
        self.buses.recompute_gains();
        self.buses.clear_all();

        let Some(listener) = self.world.primary_listener().cloned() else {
            output.fill(0.0);
            return;
        };

        self.partition_voices(&listener);

        let channel_ids: Vec<ChannelHandle> = self.channels.iter_handles().map(|(handle, _)| handle).collect();

        for handle in channel_ids {
            let now = self.now;
            let Some(channel) = self.channels.get_mut(handle) else { continue };
            channel.advance(now);
            if !channel.is_audible() {
                self.voices.remove(&handle);
                continue;
            }
            channel.position_frames += frame_count as u64;
            if !channel.is_real {
                continue;
            }

            let (params, _distance, room) =
                tick_params_for(channel, &listener, &self.world, &self.assets, &self.attenuations, &self.obstruction_curves, now);
            let cross_in = if channel.state == ChannelState::SwitchingFade { channel.cross_fade_in(now) } else { 1.0 };
            let bus_id = channel
                .resolution_chain
                .last()
                .and_then(|&id| self.assets.common_of(id))
                .map(|c| c.bus_id)
                .unwrap_or(BusId::MASTER);
            let start_frame = channel.position_frames.saturating_sub(frame_count as u64);
            let environment_override = environment_override_for_channel(channel, &self.world);

            let Some(voice) = self.voices.get_mut(&handle) else { continue };
            let mut mono = Vec::with_capacity(frame_count);
            match voice.pull(start_frame, frame_count, &mut mono) {
                Ok(true) => {}
                Ok(false) => self.emit(DiagnosticEvent::DecoderUnderrun { channel: handle }),
                Err(()) => {
                    self.emit(DiagnosticEvent::ResamplerFault { channel: handle });
                    continue;
                }
            }

            if let Some(room) = &room {
                let (volume, max_surface, avg_absorption) = room_acoustics(room);
                voice.pipeline.set_room_acoustics(volume, max_surface, avg_absorption);
            }
            let (mut left, mut right) = voice.pipeline.process(&mono, &params, environment_override);
            for &fault in &voice.pipeline.faults {
                self.emit(DiagnosticEvent::PipelineNodeBypassed { channel: handle, fault });
            }
            for s in left.iter_mut().chain(right.iter_mut()) {
                *s *= cross_in;
            }

            if let Some(bus) = self.buses.bus_mut(bus_id) {
                bus.add_stereo(&left, &right);
            }
        }

        // 6-9. Sum stereo buses to master, apply gain, soft-clip.
        self.buses.mix_down();
        let master = self.buses.master();
        let mut left = master.left().to_vec();
        let mut right = master.right().to_vec();
        for s in left.iter_mut().chain(right.iter_mut()) {
            *s = soft_clip(*s);
        }

        // 10. Interleave.
        for i in 0..frame_count {
            output[i * 2] = left[i];
            output[i * 2 + 1] = right[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::assets::{Sound, SoundObjectCommon};
    use crate::command::command_channel;
    use crate::io::PcmDecoder;
    use am_core::ListenerId;

    fn test_mixer(factory: DecoderFactory) -> Mixer {
        let (_producer, consumer) = command_channel(16);
        let (tx, _rx) = crate::command::diagnostic_channel(16);
        let config = MixerConfig {
            sample_rate: 48_000.0,
            max_real_voices: 8,
            ambisonic_order: AmbisonicOrder::First,
            default_spatialization: SpatializationMode::Stereo,
            default_binaural_mode: BinauralMode::StereoPreset,
        };
        let mut mixer = Mixer::new(config, 64, consumer, tx, factory);
        mixer.world.listener_mut(ListenerId::new(1));
        mixer
    }

    #[test]
    fn mix_with_no_listener_writes_silence() {
        let mut mixer_no_listener = {
            let (_producer, consumer) = command_channel(16);
            let (tx, _rx) = crate::command::diagnostic_channel(16);
            let config = MixerConfig {
                sample_rate: 48_000.0,
                max_real_voices: 4,
                ambisonic_order: AmbisonicOrder::First,
                default_spatialization: SpatializationMode::Stereo,
                default_binaural_mode: BinauralMode::StereoPreset,
            };
            Mixer::new(config, 64, consumer, tx, Box::new(|_| None))
        };
        let mut out = vec![1.0; 128];
        mixer_no_listener.mix(&mut out, 64);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn play_with_unresolvable_sound_object_returns_invalid_handle() {
        let mut mixer = test_mixer(Box::new(|_| None));
        let handle = mixer.play(SoundObjectId::Sound(SoundId::new(999)), None, 0.0);
        assert_eq!(mixer.channel_state(handle), ChannelState::Stopped);
    }

    #[test]
    fn play_a_registered_sound_produces_an_audible_channel() {
        let mut mixer = test_mixer(Box::new(|_| None));
        mixer.assets.sounds.insert(
            SoundId::new(1),
            Sound { id: SoundId::new(1), name: "ping".into(), common: SoundObjectCommon::default(), looping: false },
        );
        let handle = mixer.play(SoundObjectId::Sound(SoundId::new(1)), None, 0.0);
        assert_eq!(mixer.channel_state(handle), ChannelState::Playing);
    }

    #[test]
    fn mix_tick_advances_the_clock_by_frame_count_over_sample_rate() {
        let factory: DecoderFactory =
            Box::new(|_| Some((Box::new(PcmDecoder::new(vec![0.5; 48_000], 48_000, 1)) as Box<dyn Decoder>, 48_000)));
        let mut mixer = test_mixer(factory);
        mixer.assets.sounds.insert(
            SoundId::new(1),
            Sound { id: SoundId::new(1), name: "ping".into(), common: SoundObjectCommon::default(), looping: false },
        );
        mixer.play(SoundObjectId::Sound(SoundId::new(1)), None, 0.0);
        let mut out = vec![0.0; 128];
        mixer.mix(&mut out, 64);
        assert_abs_diff_eq!(mixer.now, 64.0 / 48_000.0, epsilon = 1e-9);
    }
}
