//! Event types for HallSonic
//!
//! A run reports through plain callbacks on the driver task. When the
//! caller lives on another thread (a UI rendering progress bars or mesh
//! snapshots), [`EventChannel`] manufactures callbacks that forward
//! everything over a channel to be polled at leisure.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::engine::{EngineCallbacks, State};
use crate::math::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub enum HallSonicEvent {
    StateChanged {
        state: State,
        progress: f64,
    },
    /// Full mesh pressure field after one waveguide step.
    WaveguideSnapshot {
        pressures: Vec<f32>,
        time: f64,
    },
    /// Reflection positions of one ray-tracer depth layer.
    RaytracerLayer {
        positions: Vec<Vec3>,
        source: Vec3,
    },
}

/// Bridges engine callbacks to a channel.
pub struct EventChannel {
    sender: Sender<HallSonicEvent>,
    receiver: Receiver<HallSonicEvent>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Callbacks that forward every state change and snapshot into the
    /// channel. Pass the result to the engine constructor.
    pub fn callbacks(&self) -> EngineCallbacks {
        let state_tx = self.sender.clone();
        let waveguide_tx = self.sender.clone();
        let raytracer_tx = self.sender.clone();
        EngineCallbacks {
            state: Some(Box::new(move |state, progress| {
                let _ = state_tx.send(HallSonicEvent::StateChanged { state, progress });
            })),
            waveguide_visual: Some(Box::new(move |pressures, time| {
                let _ = waveguide_tx.send(HallSonicEvent::WaveguideSnapshot {
                    pressures: pressures.to_vec(),
                    time,
                });
            })),
            raytracer_visual: Some(Box::new(move |positions, source| {
                let _ = raytracer_tx.send(HallSonicEvent::RaytracerLayer {
                    positions: positions.to_vec(),
                    source,
                });
            })),
        }
    }

    /// Drains everything currently queued without blocking.
    pub fn poll_events(&self) -> Vec<HallSonicEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_flow_through_channel() {
        let channel = EventChannel::new();
        let callbacks = channel.callbacks();

        if let Some(state) = &callbacks.state {
            state(State::RunningRaytracer, 0.5);
        }
        if let Some(visual) = &callbacks.waveguide_visual {
            visual(&[0.0, 1.0], 0.25);
        }

        let events = channel.poll_events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            HallSonicEvent::StateChanged {
                state: State::RunningRaytracer,
                progress: 0.5
            }
        );
        match &events[1] {
            HallSonicEvent::WaveguideSnapshot { pressures, time } => {
                assert_eq!(pressures.len(), 2);
                assert_eq!(*time, 0.25);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_poll_empty_channel() {
        let channel = EventChannel::new();
        assert!(channel.poll_events().is_empty());
    }
}
