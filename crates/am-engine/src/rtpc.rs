//! RTPC and switch state (§4.5): runtime-adjustable scalars consumed by
//! curves, and named-state switches consumed by `SwitchContainer` playback.

use std::collections::HashMap;

use am_core::RtpcId;
use am_event::{Fader, FaderCurve};

/// One runtime parameter control. `current` is driven by `attack_fader`
/// (rising target) or `release_fader` (falling target); both default to a
/// linear ramp and are swappable per-RTPC by the asset definition.
pub struct Rtpc {
    pub id: RtpcId,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    target: f64,
    fader: Fader,
    pub attack_ms: f64,
    pub release_ms: f64,
    pub attack_curve: FaderCurve,
    pub release_curve: FaderCurve,
}

impl Rtpc {
    pub fn new(id: RtpcId, name: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            id,
            name: name.into(),
            min,
            max,
            default,
            target: default,
            fader: Fader::disabled(default),
            attack_ms: 0.0,
            release_ms: 0.0,
            attack_curve: FaderCurve::LINEAR,
            release_curve: FaderCurve::LINEAR,
        }
    }

    /// Current live value (the fader's value at `now`), clamped to `[min, max]`.
    pub fn current(&self, now: f64) -> f64 {
        self.fader.value(now).clamp(self.min, self.max)
    }

    /// `set`: starts an attack fader if `value > current`, else a release
    /// fader, per §4.5.
    pub fn set(&mut self, value: f64, now: f64) {
        let value = value.clamp(self.min, self.max);
        let current = self.current(now);
        self.target = value;
        if value > current {
            let duration = (self.attack_ms / 1000.0).max(0.0);
            self.fader = Fader::start(current, value, duration, now, self.attack_curve);
        } else if value < current {
            let duration = (self.release_ms / 1000.0).max(0.0);
            self.fader = Fader::start(current, value, duration, now, self.release_curve);
        } else {
            self.fader = Fader::disabled(value);
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn advance(&mut self, now: f64) {
        self.fader.advance(now);
    }
}

/// Table of every RTPC, keyed by id.
#[derive(Default)]
pub struct RtpcTable {
    rtpcs: HashMap<RtpcId, Rtpc>,
}

impl RtpcTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rtpc: Rtpc) {
        self.rtpcs.insert(rtpc.id, rtpc);
    }

    pub fn set(&mut self, id: RtpcId, value: f64, now: f64) {
        if let Some(rtpc) = self.rtpcs.get_mut(&id) {
            rtpc.set(value, now);
        }
    }

    /// `get_rtpc`: the current live value, or `0.0` if the id is unknown
    /// (a lookup through an asset's `RtpcValue::Rtpc` reference to a
    /// removed/never-loaded RTPC must not panic the audio thread).
    pub fn value(&self, id: RtpcId, now: f64) -> f64 {
        self.rtpcs.get(&id).map(|r| r.current(now)).unwrap_or(0.0)
    }

    /// Advance every RTPC's fader bookkeeping by one tick (§4.1 step 2).
    pub fn advance_all(&mut self, now: f64) {
        for rtpc in self.rtpcs.values_mut() {
            rtpc.advance(now);
        }
    }

    pub fn get(&self, id: RtpcId) -> Option<&Rtpc> {
        self.rtpcs.get(&id)
    }
}

/// A named switch group's currently active state. Playback commands read
/// this table when a `SwitchContainer` is dequeued (§4.5).
#[derive(Default)]
pub struct SwitchTable {
    active: HashMap<u32, u32>,
}

impl SwitchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, group: u32, state: u32) {
        self.active.insert(group, state);
    }

    /// Whether `state` is the active one *in any group it belongs to* —
    /// callers pass the raw state id recorded on a `SwitchContainer` case,
    /// which already encodes both group and state, so a simple membership
    /// check across all active values is the correct match for those ids.
    pub fn is_active(&self, state: u32) -> bool {
        self.active.values().any(|&s| s == state)
    }

    pub fn active_state(&self, group: u32) -> Option<u32> {
        self.active.get(&group).copied()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn set_rtpc_settles_to_target_after_attack_ms() {
        let mut rtpc = Rtpc::new(RtpcId::new(1), "volume", 0.0, 1.0, 0.0);
        rtpc.attack_ms = 100.0;
        rtpc.set(1.0, 0.0);
        assert_abs_diff_eq!(rtpc.current(0.0), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(rtpc.current(0.1), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn set_below_current_uses_release_fader() {
        let mut rtpc = Rtpc::new(RtpcId::new(1), "volume", 0.0, 1.0, 1.0);
        rtpc.release_ms = 200.0;
        rtpc.set(0.0, 0.0);
        assert!(rtpc.current(0.0) > 0.9);
        assert_abs_diff_eq!(rtpc.current(0.2), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn unknown_rtpc_lookup_returns_zero_not_a_panic() {
        let table = RtpcTable::new();
        assert_eq!(table.value(RtpcId::new(99), 0.0), 0.0);
    }

    #[test]
    fn switch_table_reports_active_state_per_group() {
        let mut switches = SwitchTable::new();
        switches.set(1, 7);
        assert!(switches.is_active(7));
        assert!(!switches.is_active(8));
        assert_eq!(switches.active_state(1), Some(7));
    }
}
