//! T-game → T-audio command queue and T-audio → T-game diagnostic channel
//! (§5, §6 "Command API"). The only way either thread touches the other's
//! state: commands are drained in full at the top of a tick (§4.1 step 1);
//! diagnostics are pushed, never blocking, whenever a node bypasses itself.

use am_core::{AssetHandle, AttenuationId, BusId, EntityId, EnvironmentId, ListenerId, RtpcId};
use am_spatial::{Orientation, Position3D};

use crate::assets::{Collection, Sound, SoundObjectId, SwitchContainer};
use crate::channel::Channel;
use crate::pipeline::NodeFault;

/// Pre-parsed definition records for one bank, staged by the host's asset
/// loader (out of scope, §1) and carried into the mixer by `LoadBank` since
/// the command ring is the only path T-game has into T-audio state.
#[derive(Debug, Clone, Default)]
pub struct BankContents {
    pub sounds: Vec<Sound>,
    pub collections: Vec<Collection>,
    pub switch_containers: Vec<SwitchContainer>,
}

/// A channel (voice) reference: generation-checked, per §9's redesign of
/// reference-counted channel state into an id + generation pair. An
/// invalid handle's queries always report `Stopped` (§7 "user-visible
/// failures").
pub type ChannelHandle = AssetHandle<Channel>;

/// Every mutation T-game can request of the mixer (§6 "Command API
/// (summary)"). Drained in full, in program order, at the start of each
/// tick.
#[derive(Debug, Clone)]
pub enum Command {
    /// `play` is also exposed as a direct, synchronous `Mixer` method
    /// (§6 returns a `channel_handle` immediately); this variant exists so
    /// a recorded/replayed command stream can represent the same call when
    /// commands are transported rather than called in-process.
    Play {
        sound_object: SoundObjectId,
        entity: Option<EntityId>,
        fade_ms: f64,
    },
    Stop {
        channel: ChannelHandle,
        fade_ms: f64,
    },
    Pause {
        channel: ChannelHandle,
    },
    Resume {
        channel: ChannelHandle,
    },
    SetLocation {
        entity: EntityId,
        location: Position3D,
    },
    SetOrientation {
        entity: EntityId,
        orientation: Orientation,
    },
    SetListenerLocation {
        listener: ListenerId,
        location: Position3D,
    },
    SetListenerOrientation {
        listener: ListenerId,
        orientation: Orientation,
    },
    SetRtpc {
        rtpc: RtpcId,
        value: f64,
    },
    SetSwitch {
        group: u32,
        state: u32,
    },
    SetBusGain {
        bus: BusId,
        gain: f64,
    },
    FadeBus {
        bus: BusId,
        gain: f64,
        duration_ms: f64,
    },
    MuteBus {
        bus: BusId,
        muted: bool,
    },
    SetAttenuation {
        entity: EntityId,
        attenuation: Option<AttenuationId>,
    },
    SetEntityEnvironment {
        entity: EntityId,
        environment: EnvironmentId,
        factor: f32,
    },
    LoadBank {
        name: String,
        contents: BankContents,
    },
    UnloadBank {
        name: String,
    },
}

/// SPSC command ring between T-game (producer) and T-audio (consumer). The
/// spec calls for a bounded, lock-free MPSC, but since the engine defines
/// exactly two threads total (§5), a single producer is the only
/// configuration that can occur; `rtrb`'s SPSC ring gives that without a
/// CAS loop.
pub struct CommandProducer {
    inner: rtrb::Producer<Command>,
}

impl CommandProducer {
    /// Push one command. `Err` returns the command back to the caller when
    /// the ring is full, per §5's bounded-wait push contract.
    pub fn push(&mut self, command: Command) -> Result<(), Command> {
        self.inner.push(command).map_err(|rtrb::PushError::Full(c)| c)
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }
}

pub struct CommandConsumer {
    inner: rtrb::Consumer<Command>,
}

impl CommandConsumer {
    /// Drain every command currently queued, in FIFO order (§4.1 step 1).
    pub fn drain(&mut self) -> Vec<Command> {
        let mut drained = Vec::with_capacity(self.inner.slots());
        while let Ok(command) = self.inner.pop() {
            drained.push(command);
        }
        drained
    }
}

pub fn command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (CommandProducer { inner: producer }, CommandConsumer { inner: consumer })
}

/// A fault recovered on T-audio and reported for T-game to log (§5, §7
/// "propagation policy"). Never causes T-audio to unwind.
#[derive(Debug, Clone, Copy)]
pub enum DiagnosticEvent {
    PipelineNodeBypassed { channel: ChannelHandle, fault: NodeFault },
    DecoderUnderrun { channel: ChannelHandle },
    ResamplerFault { channel: ChannelHandle },
    VoiceStoppedOnDecoderError { channel: ChannelHandle },
    InvalidCommandIgnored,
}

pub fn diagnostic_channel(capacity: usize) -> (crossbeam_channel::Sender<DiagnosticEvent>, crossbeam_channel::Receiver<DiagnosticEvent>) {
    crossbeam_channel::bounded(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use am_core::SoundId;

    #[test]
    fn command_round_trips_through_the_ring() {
        let (mut producer, mut consumer) = command_channel(16);
        producer
            .push(Command::Play {
                sound_object: SoundObjectId::Sound(SoundId::new(1)),
                entity: None,
                fade_ms: 0.0,
            })
            .unwrap();
        let drained = consumer.drain();
        assert_eq!(drained.len(), 1);
    }

    #[test]
    fn diagnostic_channel_never_blocks_the_sender_within_capacity() {
        let (tx, rx) = diagnostic_channel(4);
        tx.try_send(DiagnosticEvent::InvalidCommandIgnored).unwrap();
        assert!(rx.try_recv().is_ok());
    }
}
