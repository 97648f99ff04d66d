//! Collection scheduler — picks one sound out of a group each time a
//! collection is played.
//!
//! Two policies, mirroring what a switch/random container actually needs at
//! playback time:
//!
//!   - [`RandomScheduler`]: weighted draw with an avoid-repeat stack, same
//!     XorShift64 generator the old random container used.
//!   - [`SequenceScheduler`]: index-stepping walk with `Restart` / `PingPong`
//!     / `Hold` end behavior.
//!
//! Both expose a single `select(skip)` entry point that never blocks: if
//! every candidate is in the skip set, `select` returns `None` rather than
//! falling back to something the caller explicitly excluded.

use smallvec::SmallVec;
use std::collections::HashSet;

use am_core::SoundId;

/// A set of sounds the scheduler must not pick this call — e.g. voices
/// already at the real-voice budget, or sounds excluded by the caller.
pub type SkipSet = HashSet<SoundId>;

/// One candidate in a scheduled collection.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEntry {
    pub sound_id: SoundId,
    pub weight: f64,
}

impl ScheduleEntry {
    pub fn new(sound_id: SoundId, weight: f64) -> Self {
        Self {
            sound_id,
            weight: weight.max(0.0),
        }
    }
}

/// XorShift64 generator, seeded deterministically so replaying a session
/// with the same seed reproduces the same selection sequence.
#[derive(Debug, Clone)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    /// Next value in `[0, 1)`.
    fn next_unit(&mut self) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x as f64) / (u64::MAX as f64 + 1.0)
    }
}

const MAX_ENTRIES: usize = 32;
const DEFAULT_SEED: u64 = 0x853c_49e6_748f_ea9b;

/// Weighted-random scheduler with an avoid-repeat stack (spec §4.4, Random).
#[derive(Debug, Clone)]
pub struct RandomScheduler {
    entries: SmallVec<[ScheduleEntry; MAX_ENTRIES]>,
    rng: XorShift64,
    /// How many of the most recent picks are excluded unless nothing else
    /// is available.
    avoid_repeat_depth: usize,
    avoid_repeat_stack: SmallVec<[SoundId; 8]>,
}

impl RandomScheduler {
    pub fn new(entries: impl IntoIterator<Item = ScheduleEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            rng: XorShift64::new(DEFAULT_SEED),
            avoid_repeat_depth: 1,
            avoid_repeat_stack: SmallVec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = XorShift64::new(seed);
        self
    }

    pub fn with_avoid_repeat_depth(mut self, depth: usize) -> Self {
        self.avoid_repeat_depth = depth;
        self
    }

    fn push_history(&mut self, id: SoundId) {
        if self.avoid_repeat_depth == 0 {
            return;
        }
        self.avoid_repeat_stack.push(id);
        while self.avoid_repeat_stack.len() > self.avoid_repeat_depth {
            self.avoid_repeat_stack.remove(0);
        }
    }

    /// Sample one entry, excluding `skip` and, where possible, the
    /// avoid-repeat stack. Falls back to the stack only when every
    /// non-skipped entry is also on it.
    pub fn select(&mut self, skip: &SkipSet) -> Option<SoundId> {
        let candidates: SmallVec<[ScheduleEntry; MAX_ENTRIES]> = self
            .entries
            .iter()
            .copied()
            .filter(|e| !skip.contains(&e.sound_id))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let fresh: SmallVec<[ScheduleEntry; MAX_ENTRIES]> = candidates
            .iter()
            .copied()
            .filter(|e| !self.avoid_repeat_stack.contains(&e.sound_id))
            .collect();
        let pool = if fresh.is_empty() { &candidates } else { &fresh };

        let total_weight: f64 = pool.iter().map(|e| e.weight).sum();
        let picked = if total_weight <= 0.0 {
            pool[0].sound_id
        } else {
            let x = self.rng.next_unit() * total_weight;
            let mut running = 0.0;
            let mut chosen = pool.last().unwrap().sound_id;
            for entry in pool.iter() {
                running += entry.weight;
                if running >= x {
                    chosen = entry.sound_id;
                    break;
                }
            }
            chosen
        };

        self.push_history(picked);
        Some(picked)
    }
}

/// Direction a sequence scheduler is currently stepping in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepDirection {
    Forward,
    Backward,
}

/// What happens when `next_index` walks off either end of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceEndBehavior {
    /// Wrap back to index 0 (or the last index, stepping backward).
    #[default]
    Restart,
    /// Reverse step direction and continue from the same end.
    PingPong,
    /// Stay on the last valid index; further calls keep returning it.
    Hold,
}

/// Index-stepping scheduler (spec §4.4, Sequence).
#[derive(Debug, Clone)]
pub struct SequenceScheduler {
    entries: SmallVec<[SoundId; MAX_ENTRIES]>,
    end_behavior: SequenceEndBehavior,
    next_index: i64,
    direction: StepDirection,
    /// Set once `Hold` has parked the cursor at an end; suppresses further
    /// stepping until reset.
    held: bool,
}

impl SequenceScheduler {
    pub fn new(entries: impl IntoIterator<Item = SoundId>, end_behavior: SequenceEndBehavior) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            end_behavior,
            next_index: 0,
            direction: StepDirection::Forward,
            held: false,
        }
    }

    pub fn reset(&mut self) {
        self.next_index = 0;
        self.direction = StepDirection::Forward;
        self.held = false;
    }

    fn step_direction(&self) -> i64 {
        match self.direction {
            StepDirection::Forward => 1,
            StepDirection::Backward => -1,
        }
    }

    /// Advance `next_index` by one step, honoring the configured end
    /// behavior when it runs off either end.
    fn advance(&mut self) {
        if self.held {
            return;
        }
        let len = self.entries.len() as i64;
        if len == 0 {
            return;
        }
        let candidate = self.next_index + self.step_direction();
        if candidate >= 0 && candidate < len {
            self.next_index = candidate;
            return;
        }
        match self.end_behavior {
            SequenceEndBehavior::Restart => {
                self.next_index = if candidate < 0 { len - 1 } else { 0 };
            }
            SequenceEndBehavior::PingPong => {
                self.direction = match self.direction {
                    StepDirection::Forward => StepDirection::Backward,
                    StepDirection::Backward => StepDirection::Forward,
                };
                self.next_index = if candidate < 0 { 1.min(len - 1) } else { (len - 2).max(0) };
            }
            SequenceEndBehavior::Hold => {
                self.next_index = candidate.clamp(0, len - 1);
                self.held = true;
            }
        }
    }

    /// Return the entry at `next_index`, then advance. Skipped entries are
    /// walked past (advancing up to `entries.len()` times) before giving up.
    pub fn select(&mut self, skip: &SkipSet) -> Option<SoundId> {
        if self.entries.is_empty() {
            return None;
        }
        let attempts = self.entries.len();
        for _ in 0..=attempts {
            let idx = self.next_index.clamp(0, self.entries.len() as i64 - 1) as usize;
            let candidate = self.entries[idx];
            self.advance();
            if !skip.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(n: u64) -> SoundId {
        SoundId::new(n)
    }

    #[test]
    fn random_scheduler_with_all_entries_skipped_returns_none() {
        let mut sched = RandomScheduler::new([ScheduleEntry::new(sid(1), 1.0), ScheduleEntry::new(sid(2), 1.0)]);
        let mut skip = SkipSet::new();
        skip.insert(sid(1));
        skip.insert(sid(2));
        assert_eq!(sched.select(&skip), None);
    }

    #[test]
    fn random_scheduler_honors_weight_zero_entries_as_never_picked() {
        let mut sched = RandomScheduler::new([ScheduleEntry::new(sid(1), 0.0), ScheduleEntry::new(sid(2), 1.0)]);
        let skip = SkipSet::new();
        for _ in 0..50 {
            assert_eq!(sched.select(&skip), Some(sid(2)));
        }
    }

    #[test]
    fn random_scheduler_avoids_immediate_repeat_when_alternatives_exist() {
        let mut sched =
            RandomScheduler::new([ScheduleEntry::new(sid(1), 1.0), ScheduleEntry::new(sid(2), 1.0)])
                .with_avoid_repeat_depth(1);
        let skip = SkipSet::new();
        let mut previous = sched.select(&skip).unwrap();
        for _ in 0..10 {
            let next = sched.select(&skip).unwrap();
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn sequence_scheduler_restart_wraps_to_zero() {
        let mut sched = SequenceScheduler::new([sid(0), sid(1), sid(2)], SequenceEndBehavior::Restart);
        let skip = SkipSet::new();
        let picks: Vec<_> = (0..5).map(|_| sched.select(&skip).unwrap().get()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn sequence_scheduler_pingpong_bounces_at_both_ends() {
        let entries: Vec<_> = (0..5).map(sid).collect();
        let mut sched = SequenceScheduler::new(entries, SequenceEndBehavior::PingPong);
        let skip = SkipSet::new();
        let picks: Vec<_> = (0..12).map(|_| sched.select(&skip).unwrap().get()).collect();
        assert_eq!(picks, vec![0, 1, 2, 3, 4, 3, 2, 1, 0, 1, 2, 3]);
    }

    #[test]
    fn sequence_scheduler_hold_parks_at_last_index() {
        let mut sched = SequenceScheduler::new([sid(0), sid(1)], SequenceEndBehavior::Hold);
        let skip = SkipSet::new();
        assert_eq!(sched.select(&skip).unwrap().get(), 0);
        assert_eq!(sched.select(&skip).unwrap().get(), 1);
        assert_eq!(sched.select(&skip).unwrap().get(), 1);
        assert_eq!(sched.select(&skip).unwrap().get(), 1);
    }

    #[test]
    fn sequence_scheduler_skips_entries_in_skip_set() {
        let mut sched = SequenceScheduler::new([sid(0), sid(1), sid(2)], SequenceEndBehavior::Restart);
        let mut skip = SkipSet::new();
        skip.insert(sid(1));
        let picks: Vec<_> = (0..4).map(|_| sched.select(&skip).unwrap().get()).collect();
        assert_eq!(picks, vec![0, 2, 0, 2]);
    }
}
