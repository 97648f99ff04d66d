//! Channel (voice) state machine (§4.6): the lifecycle of one playback
//! request, including the virtual↔real cross-fade and the later-command-wins
//! resolution of overlapping stop requests (§9).

use am_core::{ChannelId, EntityId};
use am_event::{Fader, FaderCurve};

use crate::assets::SoundObjectId;

/// Minimum cross-fade duration used for the virtual↔real swap, in seconds.
pub const MIN_FADE_DURATION: f64 = 0.010;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Initial and terminal: the channel holds no resources.
    Stopped,
    Playing,
    Paused,
    /// Transient: running `stop_fader` down to silence, then `Stopped`.
    FadingOut,
    /// Transient: running `play_fader` up from silence, then `Playing`.
    FadingIn,
    /// Transient: cross-fading between the outgoing and incoming
    /// render path on a virtual↔real promotion/demotion swap.
    SwitchingFade,
}

/// What triggered the channel's current `FadingOut`/`SwitchingFade`, so a
/// later command can correctly override or be ignored relative to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStop {
    None,
    Immediate,
    Faded,
}

/// One live (or virtual) playback instance.
pub struct Channel {
    pub id: ChannelId,
    pub sound_object: SoundObjectId,
    pub resolution_chain: smallvec::SmallVec<[SoundObjectId; 4]>,
    pub entity: Option<EntityId>,

    pub state: ChannelState,
    /// `true` while rendered through a real voice's pipeline; `false` while
    /// only its playback position advances.
    pub is_real: bool,

    gain_fader: Fader,
    pending_stop: PendingStop,
    /// Cross-fade ramp used by `SwitchingFade` (real↔virtual swap) and by
    /// the generic in/out fade of `FadingIn`/`FadingOut`.
    cross_fader: Fader,

    pub priority_base: f64,
    pub last_effective_priority: f64,
    /// Bumped each time this channel is (re)started; used as a recency
    /// term in the priority formula (§4.6).
    pub recency: f64,

    /// Playback cursor, in output-rate frames, advanced every tick
    /// regardless of real/virtual status.
    pub position_frames: u64,
    pub looping: bool,
}

impl Channel {
    pub fn new(id: ChannelId, sound_object: SoundObjectId, entity: Option<EntityId>, looping: bool) -> Self {
        Self {
            id,
            sound_object,
            resolution_chain: smallvec::SmallVec::new(),
            entity,
            state: ChannelState::Stopped,
            is_real: false,
            gain_fader: Fader::disabled(0.0),
            pending_stop: PendingStop::None,
            cross_fader: Fader::disabled(1.0),
            priority_base: 0.0,
            last_effective_priority: 0.0,
            recency: 0.0,
            position_frames: 0,
            looping,
        }
    }

    /// `play` transition: `Stopped -> FadingIn` with `fade_seconds > 0`,
    /// else directly to `Playing`.
    pub fn play(&mut self, fade_seconds: f64, now: f64) {
        self.pending_stop = PendingStop::None;
        if fade_seconds > 0.0 {
            self.state = ChannelState::FadingIn;
            self.gain_fader = Fader::start(0.0, 1.0, fade_seconds, now, FaderCurve::EASE_IN);
        } else {
            self.state = ChannelState::Playing;
            self.gain_fader = Fader::disabled(1.0);
        }
    }

    /// `stop` transition, honoring later-command-wins: a later `stop` call
    /// (whether immediate or faded) always replaces whatever stop was
    /// already pending (§9).
    pub fn stop(&mut self, fade_seconds: f64, now: f64) {
        if self.state == ChannelState::Stopped {
            return;
        }
        if fade_seconds > 0.0 {
            self.pending_stop = PendingStop::Faded;
            self.state = ChannelState::FadingOut;
            let current = self.gain_fader.value(now);
            self.gain_fader = Fader::start(current, 0.0, fade_seconds, now, FaderCurve::EASE_OUT);
        } else {
            self.pending_stop = PendingStop::Immediate;
            self.state = ChannelState::Stopped;
            self.gain_fader = Fader::disabled(0.0);
        }
    }

    /// `pause` transition: a short fade-out into `Paused` to avoid a click,
    /// per §4.6.
    pub fn pause(&mut self, now: f64) {
        if self.state != ChannelState::Playing {
            return;
        }
        let current = self.gain_fader.value(now);
        self.gain_fader = Fader::start(current, 0.0, MIN_FADE_DURATION, now, FaderCurve::LINEAR);
        self.state = ChannelState::Paused;
    }

    /// `resume` transition: `Paused -> FadingIn -> Playing`.
    pub fn resume(&mut self, now: f64) {
        if self.state != ChannelState::Paused {
            return;
        }
        self.state = ChannelState::FadingIn;
        self.gain_fader = Fader::start(0.0, 1.0, MIN_FADE_DURATION, now, FaderCurve::LINEAR);
    }

    /// Begin the virtual↔real cross-fade swap (§4.6): `f_in` ramps `0 -> 1`
    /// over `MIN_FADE_DURATION`, the caller sums `incoming * f_in +
    /// outgoing * (1 - f_in)`.
    pub fn begin_switching_fade(&mut self, now: f64) {
        self.state = ChannelState::SwitchingFade;
        self.cross_fader = Fader::start(0.0, 1.0, MIN_FADE_DURATION, now, FaderCurve::LINEAR);
    }

    /// Fraction of the incoming render path to mix in during a
    /// `SwitchingFade`; `1.0` once the swap is complete.
    pub fn cross_fade_in(&self, now: f64) -> f64 {
        self.cross_fader.value(now)
    }

    /// Advance fader bookkeeping and resolve transient states once their
    /// fade completes. Called once per tick for every channel.
    pub fn advance(&mut self, now: f64) {
        self.gain_fader.advance(now);
        self.cross_fader.advance(now);
        match self.state {
            ChannelState::FadingIn if self.gain_fader.is_done(now) => {
                self.state = ChannelState::Playing;
            }
            ChannelState::FadingOut if self.gain_fader.is_done(now) => {
                self.state = ChannelState::Stopped;
                self.pending_stop = PendingStop::None;
            }
            ChannelState::SwitchingFade if self.cross_fader.is_done(now) => {
                self.state = ChannelState::Playing;
            }
            _ => {}
        }
    }

    pub fn gain(&self, now: f64) -> f64 {
        self.gain_fader.value(now)
    }

    pub fn is_audible(&self) -> bool {
        !matches!(self.state, ChannelState::Stopped | ChannelState::Paused)
    }

    /// Effective priority used to partition real vs. virtual voices
    /// (§4.6): base priority plus distance and bus-gain factors plus a
    /// recency boost, closer/louder/newer sorting higher.
    pub fn effective_priority(&self, distance: f32, bus_final_gain: f64) -> f64 {
        let distance_factor = -(distance as f64) * 0.1;
        let bus_factor = bus_final_gain.max(1e-6).log10() * 2.0;
        self.priority_base + distance_factor + bus_factor + self.recency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch() -> Channel {
        Channel::new(ChannelId::new(1), SoundObjectId::Sound(am_core::SoundId::new(1)), None, false)
    }

    #[test]
    fn play_with_no_fade_goes_straight_to_playing() {
        let mut c = ch();
        c.play(0.0, 0.0);
        assert_eq!(c.state, ChannelState::Playing);
        assert_eq!(c.gain(0.0), 1.0);
    }

    #[test]
    fn play_with_fade_starts_fading_in_then_settles_playing() {
        let mut c = ch();
        c.play(0.1, 0.0);
        assert_eq!(c.state, ChannelState::FadingIn);
        c.advance(0.2);
        assert_eq!(c.state, ChannelState::Playing);
    }

    #[test]
    fn channel_transitions_to_stopped_exactly_once() {
        let mut c = ch();
        c.play(0.0, 0.0);
        c.stop(0.0, 1.0);
        assert_eq!(c.state, ChannelState::Stopped);
        c.stop(0.0, 2.0);
        assert_eq!(c.state, ChannelState::Stopped);
    }

    #[test]
    fn later_stop_command_wins_over_pending_fade_out() {
        let mut c = ch();
        c.play(0.0, 0.0);
        c.stop(1.0, 0.0);
        assert_eq!(c.state, ChannelState::FadingOut);
        // A later immediate stop replaces the pending fade.
        c.stop(0.0, 0.1);
        assert_eq!(c.state, ChannelState::Stopped);
    }

    #[test]
    fn pause_then_resume_returns_to_playing() {
        let mut c = ch();
        c.play(0.0, 0.0);
        c.pause(0.0);
        assert_eq!(c.state, ChannelState::Paused);
        c.resume(0.0);
        assert_eq!(c.state, ChannelState::FadingIn);
        c.advance(1.0);
        assert_eq!(c.state, ChannelState::Playing);
    }

    #[test]
    fn switching_fade_cross_fade_in_ramps_zero_to_one() {
        let mut c = ch();
        c.begin_switching_fade(0.0);
        assert_eq!(c.cross_fade_in(0.0), 0.0);
        assert!((c.cross_fade_in(0.005) - 0.5).abs() < 1e-6);
        assert_eq!(c.cross_fade_in(1.0), 1.0);
    }
}
