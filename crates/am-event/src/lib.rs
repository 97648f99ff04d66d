//! am-event: the time-driven scalar ramp (§4.3) shared by RTPC attack/
//! release and bus `fade_to`.
//!
//! Everything a Wwise-style middleware event system would also carry
//! (posted events, action lists, state/switch groups, music segments,
//! ducking matrices) is out of scope for this core per spec §1 — RTPC and
//! switch state live in `am-engine::rtpc`, and a `Fader` here is the only
//! primitive both that module and the bus graph need.

mod fader;

pub use fader::{Fader, FaderCurve, FaderState};
