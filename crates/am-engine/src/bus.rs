//! Bus graph — a tree of gain nodes rooted at the master bus.
//!
//! Every bus but the master has exactly one parent. `final_gain` is the
//! product of the bus's own user gain, its duck attenuation, its fader
//! value, and its parent's `final_gain`; recomputing it is a single
//! top-down walk of the tree (§4.2).

use am_core::{BusId, Decibels, Sample};
use am_event::{Fader, FaderCurve};
use std::collections::HashMap;

/// An active `duck(other, ratio, fade)` rule (§4.2): `ratio` scales how much
/// this bus ducks, `fader` ramps that contribution in/out over `fade` so the
/// duck itself doesn't click on/off.
#[derive(Debug, Clone)]
struct DuckEntry {
    source: BusId,
    ratio: f64,
    fade_ms: f64,
    fader: Fader,
}

/// One node in the bus graph.
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub parent: Option<BusId>,
    pub children: Vec<BusId>,

    /// User-set gain, as authored.
    pub user_gain_db: Decibels,
    /// Ramp driving `fade_to(gain, duration)` (§4.2); `fader_gain` is its
    /// cached value at the last `advance`.
    fader: Fader,
    fader_gain: f64,
    pub mute: bool,

    /// Rules currently ducking this bus; combined additively per §4.2.
    duck_list: Vec<DuckEntry>,
    /// Cached `(1 - Σ ratio * fader_value)` clamped to `[0, 1]`, updated by `advance`.
    duck_gain: f64,

    /// Cached gain, recomputed by `BusGraph::recompute_gains`.
    final_gain: f64,

    left_buffer: Vec<Sample>,
    right_buffer: Vec<Sample>,
}

impl Bus {
    fn new(id: BusId, name: impl Into<String>, parent: Option<BusId>, block_size: usize) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            children: Vec::new(),
            user_gain_db: Decibels::ZERO,
            fader: Fader::disabled(1.0),
            fader_gain: 1.0,
            mute: false,
            duck_list: Vec::new(),
            duck_gain: 1.0,
            final_gain: 1.0,
            left_buffer: vec![0.0; block_size],
            right_buffer: vec![0.0; block_size],
        }
    }

    pub fn final_gain(&self) -> f64 {
        if self.mute {
            0.0
        } else {
            self.final_gain
        }
    }

    fn duck_attenuation(&self) -> f64 {
        self.duck_gain
    }

    /// §4.2 `fade_to(gain, duration)`: retarget the bus's own fader from its
    /// current value. `duration_ms <= 0` is instantaneous.
    pub fn fade_to(&mut self, gain: f64, duration_ms: f64, now: f64) {
        self.fader.retarget(gain, (duration_ms / 1000.0).max(0.0), now, FaderCurve::LINEAR);
        self.fader_gain = self.fader.value(now);
    }

    /// §4.2 `duck(other, ratio, fade)`: engage (or re-engage) a duck rule,
    /// ramping its contribution in to full `ratio` over `fade` ms.
    pub fn duck(&mut self, source: BusId, ratio: f64, fade_ms: f64, now: f64) {
        let duration = (fade_ms / 1000.0).max(0.0);
        if let Some(entry) = self.duck_list.iter_mut().find(|d| d.source == source) {
            entry.ratio = ratio;
            entry.fade_ms = fade_ms;
            entry.fader.retarget(1.0, duration, now, FaderCurve::LINEAR);
        } else {
            self.duck_list.push(DuckEntry {
                source,
                ratio,
                fade_ms,
                fader: Fader::start(0.0, 1.0, duration, now, FaderCurve::LINEAR),
            });
        }
    }

    /// Ramp an engaged duck rule back out to zero contribution over its
    /// configured `fade`, without forgetting the rule (it can be re-engaged).
    pub fn release_duck(&mut self, source: BusId, now: f64) {
        if let Some(entry) = self.duck_list.iter_mut().find(|d| d.source == source) {
            let duration = (entry.fade_ms / 1000.0).max(0.0);
            entry.fader.retarget(0.0, duration, now, FaderCurve::LINEAR);
        }
    }

    pub fn remove_duck(&mut self, source: BusId) {
        self.duck_list.retain(|d| d.source != source);
    }

    /// Advance this bus's own fader and every duck fader by one tick,
    /// refreshing the cached scalars `recompute_gains` reads (§4.2).
    pub fn advance(&mut self, now: f64) {
        self.fader.advance(now);
        self.fader_gain = self.fader.value(now);
        let mut sum = 0.0;
        for entry in &mut self.duck_list {
            entry.fader.advance(now);
            sum += entry.ratio * entry.fader.value(now);
        }
        self.duck_gain = (1.0 - sum).clamp(0.0, 1.0);
    }

    pub fn clear_buffer(&mut self) {
        self.left_buffer.fill(0.0);
        self.right_buffer.fill(0.0);
    }

    pub fn add_stereo(&mut self, left: &[Sample], right: &[Sample]) {
        for (i, (&l, &r)) in left.iter().zip(right.iter()).enumerate() {
            if i < self.left_buffer.len() {
                self.left_buffer[i] += l;
                self.right_buffer[i] += r;
            }
        }
    }

    pub fn apply_gain(&mut self) {
        let gain = self.final_gain();
        for s in &mut self.left_buffer {
            *s *= gain;
        }
        for s in &mut self.right_buffer {
            *s *= gain;
        }
    }

    pub fn left(&self) -> &[Sample] {
        &self.left_buffer
    }

    pub fn right(&self) -> &[Sample] {
        &self.right_buffer
    }

    pub fn left_mut(&mut self) -> &mut [Sample] {
        &mut self.left_buffer
    }

    pub fn right_mut(&mut self) -> &mut [Sample] {
        &mut self.right_buffer
    }

    fn resize(&mut self, block_size: usize) {
        self.left_buffer.resize(block_size, 0.0);
        self.right_buffer.resize(block_size, 0.0);
    }
}

/// The bus graph: a tree of [`Bus`] nodes rooted at [`BusId::MASTER`].
pub struct BusGraph {
    buses: HashMap<BusId, Bus>,
    /// Topological order (parents before children), rebuilt on structure change.
    topo_order: Vec<BusId>,
    block_size: usize,
}

impl BusGraph {
    pub fn new(block_size: usize) -> Self {
        let mut buses = HashMap::new();
        buses.insert(
            BusId::MASTER,
            Bus::new(BusId::MASTER, "Master", None, block_size),
        );
        Self {
            buses,
            topo_order: vec![BusId::MASTER],
            block_size,
        }
    }

    /// Insert a new bus as a child of `parent`. `parent` must already exist.
    pub fn add_bus(&mut self, id: BusId, name: impl Into<String>, parent: BusId) -> Result<(), BusGraphError> {
        if id == BusId::MASTER {
            return Err(BusGraphError::CannotReparentMaster);
        }
        if !self.buses.contains_key(&parent) {
            return Err(BusGraphError::UnknownParent(parent));
        }
        if self.buses.contains_key(&id) {
            return Err(BusGraphError::DuplicateBus(id));
        }
        self.buses
            .insert(id, Bus::new(id, name, Some(parent), self.block_size));
        self.buses.get_mut(&parent).unwrap().children.push(id);
        self.rebuild_topo_order();
        Ok(())
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(&id)
    }

    pub fn bus_mut(&mut self, id: BusId) -> Option<&mut Bus> {
        self.buses.get_mut(&id)
    }

    pub fn master(&self) -> &Bus {
        self.buses.get(&BusId::MASTER).expect("master bus always present")
    }

    pub fn master_mut(&mut self) -> &mut Bus {
        self.buses.get_mut(&BusId::MASTER).expect("master bus always present")
    }

    fn rebuild_topo_order(&mut self) {
        let mut order = Vec::with_capacity(self.buses.len());
        let mut stack = vec![BusId::MASTER];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(bus) = self.buses.get(&id) {
                stack.extend(bus.children.iter().copied());
            }
        }
        self.topo_order = order;
    }

    /// Advance every bus's own fader and duck faders by one tick (§4.2).
    /// Must run before `recompute_gains` each mix tick.
    pub fn advance_all(&mut self, now: f64) {
        for bus in self.buses.values_mut() {
            bus.advance(now);
        }
    }

    /// Recompute `final_gain` for every bus, parent before child.
    pub fn recompute_gains(&mut self) {
        for id in self.topo_order.clone() {
            let parent_gain = self
                .buses
                .get(&id)
                .and_then(|b| b.parent)
                .and_then(|p| self.buses.get(&p))
                .map(|p| p.final_gain)
                .unwrap_or(1.0);
            if let Some(bus) = self.buses.get_mut(&id) {
                let own = bus.user_gain_db.to_gain() * bus.fader_gain * bus.duck_attenuation();
                bus.final_gain = parent_gain * own;
            }
        }
    }

    /// Clear every bus's accumulation buffer ahead of a new tick.
    pub fn clear_all(&mut self) {
        for bus in self.buses.values_mut() {
            bus.clear_buffer();
        }
    }

    /// Apply each bus's gain, then sum children into parents bottom-up
    /// (children processed before the parent they feed, i.e. reverse
    /// topological order), finishing at the master bus.
    pub fn mix_down(&mut self) {
        self.recompute_gains();
        for &id in self.topo_order.iter().rev() {
            let Some(bus) = self.buses.get_mut(&id) else {
                continue;
            };
            bus.apply_gain();
            let (l, r) = (bus.left().to_vec(), bus.right().to_vec());
            if let Some(parent_id) = bus.parent {
                if let Some(parent) = self.buses.get_mut(&parent_id) {
                    parent.add_stereo(&l, &r);
                }
            }
        }
    }

    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
        for bus in self.buses.values_mut() {
            bus.resize(block_size);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusGraphError {
    #[error("bus {0} already exists in the graph")]
    DuplicateBus(BusId),
    #[error("unknown parent bus {0}")]
    UnknownParent(BusId),
    #[error("the master bus cannot be reparented")]
    CannotReparentMaster,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_bus_exists_at_construction() {
        let graph = BusGraph::new(64);
        assert!(graph.bus(BusId::MASTER).is_some());
        assert_eq!(graph.master().final_gain(), 1.0);
    }

    #[test]
    fn final_gain_multiplies_down_the_tree() {
        let mut graph = BusGraph::new(64);
        graph.add_bus(BusId::new(2), "music", BusId::MASTER).unwrap();
        graph.add_bus(BusId::new(3), "music-stems", BusId::new(2)).unwrap();

        graph.bus_mut(BusId::new(2)).unwrap().user_gain_db = Decibels::from_gain(0.5);
        graph.bus_mut(BusId::new(3)).unwrap().user_gain_db = Decibels::from_gain(0.5);

        graph.recompute_gains();
        let leaf_gain = graph.bus(BusId::new(3)).unwrap().final_gain();
        assert!((leaf_gain - 0.25).abs() < 1e-9);
    }

    #[test]
    fn mute_zeros_final_gain_without_touching_children() {
        let mut graph = BusGraph::new(64);
        graph.add_bus(BusId::new(2), "vo", BusId::MASTER).unwrap();
        graph.bus_mut(BusId::new(2)).unwrap().mute = true;
        graph.recompute_gains();
        assert_eq!(graph.bus(BusId::new(2)).unwrap().final_gain(), 0.0);
    }

    #[test]
    fn duck_attenuation_applies_additive_ratio_to_final_gain() {
        let mut graph = BusGraph::new(64);
        graph.add_bus(BusId::new(2), "music", BusId::MASTER).unwrap();
        // fade_ms = 0 so the duck is fully engaged the instant it advances.
        graph.bus_mut(BusId::new(2)).unwrap().duck(BusId::new(3), 0.6, 0.0, 0.0);
        graph.advance_all(0.0);
        graph.recompute_gains();
        assert!((graph.bus(BusId::new(2)).unwrap().final_gain() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn duck_ramps_in_over_fade_and_clamps_multiple_rules_at_zero() {
        let mut graph = BusGraph::new(64);
        graph.add_bus(BusId::new(2), "music", BusId::MASTER).unwrap();
        graph.bus_mut(BusId::new(2)).unwrap().duck(BusId::new(3), 0.6, 0.0, 1000.0);
        graph.bus_mut(BusId::new(2)).unwrap().duck(BusId::new(4), 0.6, 0.0, 1000.0);

        graph.advance_all(0.0);
        graph.recompute_gains();
        assert_eq!(graph.bus(BusId::new(2)).unwrap().final_gain(), 1.0);

        graph.advance_all(1.0);
        graph.recompute_gains();
        assert_eq!(graph.bus(BusId::new(2)).unwrap().final_gain(), 0.0);
    }

    #[test]
    fn fade_to_ramps_linearly_then_holds() {
        let mut graph = BusGraph::new(64);
        graph.bus_mut(BusId::MASTER).unwrap().fade_to(0.0, 500.0, 0.0);

        graph.advance_all(0.25);
        graph.recompute_gains();
        let mid = graph.master().final_gain();
        assert!((0.45..=0.55).contains(&mid), "expected mid-fade gain in [0.45, 0.55], got {mid}");

        graph.advance_all(0.5);
        graph.recompute_gains();
        assert_eq!(graph.master().final_gain(), 0.0);
    }

    #[test]
    fn mix_down_sums_children_into_master() {
        let mut graph = BusGraph::new(4);
        graph.add_bus(BusId::new(2), "fx", BusId::MASTER).unwrap();
        graph
            .bus_mut(BusId::new(2))
            .unwrap()
            .add_stereo(&[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0, 1.0, 1.0]);
        graph.mix_down();
        assert_eq!(graph.master().left(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn adding_bus_under_unknown_parent_errors() {
        let mut graph = BusGraph::new(4);
        let err = graph.add_bus(BusId::new(2), "orphan", BusId::new(99));
        assert!(matches!(err, Err(BusGraphError::UnknownParent(_))));
    }
}
