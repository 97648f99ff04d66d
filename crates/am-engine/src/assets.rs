//! Playable assets: `Sound`, `Collection`, `SwitchContainer`, and the
//! `SoundObject` union that resolves a play request to a leaf `Sound` (§3).

use am_core::{AttenuationId, BusId, CollectionId, EffectId, EntityId, RtpcId, SoundId, SwitchContainerId};
use smallvec::SmallVec;

use crate::scheduler::{RandomScheduler, SequenceScheduler};

/// A gain/pitch/priority value as authored: either a fixed constant or a
/// live lookup against an RTPC's current value (resolved by the caller
/// holding the RTPC table; this crate only carries the reference).
#[derive(Debug, Clone, Copy)]
pub enum RtpcValue {
    Constant(f64),
    Rtpc(RtpcId),
}

impl RtpcValue {
    /// Resolve against a lookup function (typically a closure over the
    /// engine's RTPC table); constants resolve to themselves.
    pub fn resolve(&self, lookup: impl FnOnce(RtpcId) -> f64) -> f64 {
        match *self {
            RtpcValue::Constant(v) => v,
            RtpcValue::Rtpc(id) => lookup(id),
        }
    }
}

impl Default for RtpcValue {
    fn default() -> Self {
        RtpcValue::Constant(1.0)
    }
}

/// Fields shared by every playable sound-object kind (§3 "Sound object").
#[derive(Debug, Clone)]
pub struct SoundObjectCommon {
    pub bus_id: BusId,
    pub gain: RtpcValue,
    pub pitch: RtpcValue,
    pub priority: RtpcValue,
    pub effect_id: Option<EffectId>,
    pub attenuation_id: Option<AttenuationId>,
}

impl Default for SoundObjectCommon {
    fn default() -> Self {
        Self {
            bus_id: BusId::MASTER,
            gain: RtpcValue::default(),
            pitch: RtpcValue::default(),
            priority: RtpcValue::default(),
            effect_id: None,
            attenuation_id: None,
        }
    }
}

/// A leaf playable asset: decodable PCM media plus its mixer routing.
#[derive(Debug, Clone)]
pub struct Sound {
    pub id: SoundId,
    pub name: String,
    pub common: SoundObjectCommon,
    pub looping: bool,
}

/// An ordered group of `Sound`s resolved at playback time by a scheduler
/// policy (random-weighted or sequence).
#[derive(Debug, Clone)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub common: SoundObjectCommon,
    pub children: SmallVec<[SoundId; 8]>,
    pub policy: CollectionPolicy,
}

#[derive(Debug, Clone)]
pub enum CollectionPolicy {
    Random,
    Sequence,
}

/// Maps each state of a named switch to one child sound object.
#[derive(Debug, Clone)]
pub struct SwitchContainer {
    pub id: SwitchContainerId,
    pub name: String,
    pub common: SoundObjectCommon,
    /// `(switch state id, child)` pairs; resolved against the live switch
    /// value at the moment the play command is dequeued.
    pub cases: SmallVec<[(u32, SoundObjectId); 8]>,
    pub default: Option<SoundObjectId>,
}

/// A reference to any of the three sound-object kinds, used to build the
/// resolution chain an effective-gain walk traverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundObjectId {
    Sound(SoundId),
    Collection(CollectionId),
    SwitchContainer(SwitchContainerId),
}

/// Table of every sound-object asset, keyed by id. Owned by the engine,
/// read-only once a bank finishes loading.
#[derive(Debug, Default)]
pub struct AssetTable {
    pub sounds: std::collections::HashMap<SoundId, Sound>,
    pub collections: std::collections::HashMap<CollectionId, Collection>,
    pub switch_containers: std::collections::HashMap<SwitchContainerId, SwitchContainer>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn common_of(&self, id: SoundObjectId) -> Option<&SoundObjectCommon> {
        match id {
            SoundObjectId::Sound(id) => self.sounds.get(&id).map(|s| &s.common),
            SoundObjectId::Collection(id) => self.collections.get(&id).map(|c| &c.common),
            SoundObjectId::SwitchContainer(id) => self.switch_containers.get(&id).map(|s| &s.common),
        }
    }

    /// Resolve a `SwitchContainer`/`Collection` chain down to one playable
    /// `Sound`, given a switch-lookup and a scheduler draw. Returns the
    /// chain of ids walked, leaf-first, so `effective_gain` can multiply
    /// through every container the leaf was resolved through (§3.1).
    pub fn resolve(
        &self,
        root: SoundObjectId,
        switch_lookup: &impl Fn(u32) -> bool,
        random_scheduler: &mut impl FnMut(CollectionId, &[SoundId]) -> Option<SoundId>,
    ) -> Option<SmallVec<[SoundObjectId; 4]>> {
        let mut chain = SmallVec::new();
        let mut current = root;
        loop {
            chain.push(current);
            match current {
                SoundObjectId::Sound(_) => return Some(chain),
                SoundObjectId::Collection(cid) => {
                    let collection = self.collections.get(&cid)?;
                    let picked = random_scheduler(cid, &collection.children)?;
                    current = SoundObjectId::Sound(picked);
                }
                SoundObjectId::SwitchContainer(sid) => {
                    let container = self.switch_containers.get(&sid)?;
                    let found = container
                        .cases
                        .iter()
                        .find(|(state, _)| switch_lookup(*state))
                        .map(|(_, child)| *child)
                        .or(container.default);
                    current = found?;
                }
            }
        }
    }

    /// `SoundObject::effective_gain` (§3.1): product of every container's
    /// own gain down the resolution chain, leaf last.
    pub fn effective_gain(&self, chain: &[SoundObjectId], rtpc_lookup: impl Fn(am_core::RtpcId) -> f64) -> f64 {
        chain.iter().fold(1.0, |acc, &id| {
            self.common_of(id)
                .map(|c| acc * c.gain.resolve(&rtpc_lookup))
                .unwrap_or(acc)
        })
    }

    pub fn effective_pitch(&self, chain: &[SoundObjectId], rtpc_lookup: impl Fn(am_core::RtpcId) -> f64) -> f64 {
        chain.iter().fold(1.0, |acc, &id| {
            self.common_of(id)
                .map(|c| acc * c.pitch.resolve(&rtpc_lookup))
                .unwrap_or(acc)
        })
    }
}

/// A per-collection scheduler instance, scoped per entity per §3 "Scheduler
/// state" (a single world-scoped instance is also valid; the engine decides
/// the scope when it constructs one per `(entity, collection)` pair).
pub enum CollectionScheduler {
    Random(RandomScheduler),
    Sequence(SequenceScheduler),
}

impl CollectionScheduler {
    pub fn select(&mut self, skip: &crate::scheduler::SkipSet) -> Option<SoundId> {
        match self {
            CollectionScheduler::Random(s) => s.select(skip),
            CollectionScheduler::Sequence(s) => s.select(skip),
        }
    }
}

/// Per-(entity, collection) scheduler scope (§3 "Scheduler state").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedulerScopeKey {
    pub collection: CollectionId,
    pub entity: Option<EntityId>,
}
