//! Telemetry emitted from the audio callback.
//!
//! The [`TelemetryEmitter`] is driven by the audio frame clock. Every
//! `period_seconds` worth of frames it takes the latest [`Snapshot`] and sends
//! five numbered buffers to a [`TelemetrySink`]:
//!
//! | id | buffer                                  |
//! |----|-----------------------------------------|
//! | 0  | channel count (one value)               |
//! | 1  | raw taxels (channel count values)       |
//! | 2  | active touch count (one value)          |
//! | 3  | touch locations (touch capacity values) |
//! | 4  | touch sizes (touch capacity values)     |
//!
//! Nothing here blocks, allocates or fails.
//!
//! [`Snapshot`]: crate::snapshot::Snapshot

mod rtrb_sink;

pub use rtrb_sink::{telemetry_ring, RtrbTelemetrySink, TelemetryBuffer, TelemetryFrame, TelemetryReader};

use crate::snapshot::SnapshotReader;

/// Identifies one of the five buffers in an emission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferId {
    ChannelCount = 0,
    Taxels = 1,
    ActiveCount = 2,
    Locations = 3,
    Sizes = 4,
}

impl TryFrom<u8> for BufferId {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, u8> {
        match id {
            0 => Ok(BufferId::ChannelCount),
            1 => Ok(BufferId::Taxels),
            2 => Ok(BufferId::ActiveCount),
            3 => Ok(BufferId::Locations),
            4 => Ok(BufferId::Sizes),
            other => Err(other),
        }
    }
}

/// The visualization side of telemetry.
///
/// Called from the audio thread: implementations must not block, and should
/// drop data rather than wait for room.
pub trait TelemetrySink: Send + 'static {
    fn send_buffer(&mut self, id: BufferId, data: &[f32]);
}

/// Times and sends telemetry from inside the audio callback.
pub struct TelemetryEmitter<S: TelemetrySink> {
    reader: SnapshotReader,
    sink: S,
    period_frames: f32,
    count: u32,
    emissions: u64,
}

impl<S: TelemetrySink> TelemetryEmitter<S> {
    pub fn new(reader: SnapshotReader, sink: S, period_seconds: f32, sample_rate: u32) -> Self {
        Self {
            reader,
            sink,
            period_frames: period_seconds * sample_rate as f32,
            count: 0,
            emissions: 0,
        }
    }

    /// Frames between two emissions
    #[inline]
    pub fn period_frames(&self) -> f32 {
        self.period_frames
    }

    #[inline]
    pub fn emissions(&self) -> u64 {
        self.emissions
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Advance the frame counter by one audio block of `frames` frames,
    /// emitting whenever a full period has gone by.
    pub fn process(&mut self, frames: usize) {
        for _ in 0..frames {
            if self.count as f32 >= self.period_frames {
                self.emit();
                self.count = 0;
            }
            self.count += 1;
        }
    }

    fn emit(&mut self) {
        let snapshot = self.reader.latest();
        let touches = &snapshot.touches;

        self.sink.send_buffer(BufferId::ChannelCount, &[snapshot.taxels.len() as f32]);
        self.sink.send_buffer(BufferId::Taxels, &snapshot.taxels);
        self.sink.send_buffer(BufferId::ActiveCount, &[touches.len() as f32]);
        self.sink.send_buffer(BufferId::Locations, touches.locations());
        self.sink.send_buffer(BufferId::Sizes, touches.sizes());
        self.emissions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{shared_state, Snapshot};
    use crate::touch::{Touch, TouchSet};

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(BufferId, Vec<f32>)>,
    }

    impl TelemetrySink for Recorder {
        fn send_buffer(&mut self, id: BufferId, data: &[f32]) {
            self.sent.push((id, data.to_vec()));
        }
    }

    #[test]
    fn emits_once_per_period_after_first_full_period() {
        let (_publisher, reader) = shared_state(4, 2);
        let mut emitter = TelemetryEmitter::new(reader, Recorder::default(), 0.5, 20);
        assert_eq!(emitter.period_frames(), 10.0);

        emitter.process(10);
        assert_eq!(emitter.emissions(), 0);
        emitter.process(1);
        assert_eq!(emitter.emissions(), 1);
        emitter.process(10);
        assert_eq!(emitter.emissions(), 2);
        emitter.process(64 * 10);
        assert_eq!(emitter.emissions(), 66);
    }

    #[test]
    fn sends_five_buffers_in_order() {
        let (mut publisher, reader) = shared_state(3, 2);
        let mut touches = TouchSet::with_capacity(2);
        touches.push(Touch::new(1.5, 0.25));
        publisher.publish(Snapshot { cycle: 1, taxels: vec![0.0, 7.0, 9.0], touches });

        let mut emitter = TelemetryEmitter::new(reader, Recorder::default(), 0.0, 48_000);
        emitter.process(1);

        let sent = &emitter.sink().sent;
        assert_eq!(
            sent,
            &vec![
                (BufferId::ChannelCount, vec![3.0]),
                (BufferId::Taxels, vec![0.0, 7.0, 9.0]),
                (BufferId::ActiveCount, vec![1.0]),
                (BufferId::Locations, vec![1.5, 0.0]),
                (BufferId::Sizes, vec![0.25, 0.0]),
            ]
        );
    }

    #[test]
    fn buffer_ids_round_trip() {
        for id in 0..5u8 {
            assert_eq!(BufferId::try_from(id).map(|b| b as u8), Ok(id));
        }
        assert_eq!(BufferId::try_from(5), Err(5));
    }
}
