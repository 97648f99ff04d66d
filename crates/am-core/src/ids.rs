//! Typed asset ids.
//!
//! Every asset kind the engine resolves against gets its own 64-bit id type
//! so a bus id can't be handed to a function expecting a sound id. `0` is
//! reserved invalid across every kind; `1` is additionally reserved as the
//! master bus id.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! asset_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The reserved invalid id, shared by every asset kind.
            pub const INVALID: Self = Self(0);

            #[inline]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }

            #[inline]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

asset_id!(BusId, "Identifies a node in the bus graph.");
asset_id!(CollectionId, "Identifies a `Collection` asset.");
asset_id!(SoundId, "Identifies a `Sound` asset (leaf playable media).");
asset_id!(SwitchContainerId, "Identifies a switch-container asset.");
asset_id!(EventId, "Identifies a middleware event asset.");
asset_id!(RtpcId, "Identifies an RTPC (real-time parameter control) definition.");
asset_id!(EffectId, "Identifies an `Effect` asset (ordered filter chain).");
asset_id!(AttenuationId, "Identifies an `Attenuation` curve-set asset.");
asset_id!(EnvironmentId, "Identifies an `Environment`/room asset.");
asset_id!(BankId, "Identifies a loaded asset bank.");
asset_id!(EntityId, "Identifies a game-world emitter entity.");
asset_id!(ListenerId, "Identifies a listener.");
asset_id!(ChannelId, "Identifies a playing voice/channel instance.");

impl BusId {
    /// The bus graph is a tree rooted here; its parent final gain is `1.0`.
    pub const MASTER: Self = Self(1);

    #[inline]
    pub const fn is_master(self) -> bool {
        self.0 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_is_zero_and_reported_invalid() {
        assert_eq!(BusId::INVALID.get(), 0);
        assert!(!BusId::INVALID.is_valid());
        assert!(BusId::default().eq(&BusId::INVALID));
    }

    #[test]
    fn master_bus_id_is_reserved_as_one() {
        assert_eq!(BusId::MASTER.get(), 1);
        assert!(BusId::MASTER.is_master());
        assert!(!BusId::new(2).is_master());
    }

    #[test]
    fn distinct_asset_kinds_do_not_intermix() {
        let bus = BusId::new(42);
        let sound = SoundId::new(42);
        assert_eq!(bus.get(), sound.get());
        // Deliberately not comparable: BusId and SoundId are different types.
    }
}
