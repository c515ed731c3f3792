//! Shared touch state: the latest scan and touches, handed from the
//! acquisition task to the audio thread.
//!
//! Each cycle publishes a whole new [`Snapshot`] through a triple buffer.
//! The reader always gets one consistent snapshot (taxels and touches from
//! the same cycle), possibly a cycle or two stale. Reading is wait-free and
//! never allocates. [`SnapshotPublisher::publish_scan`] refills the back
//! buffer in place, so steady-state publishing doesn't allocate either.

use triple_buffer::{Input, Output, TripleBuffer};

use crate::touch::TouchSet;

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Acquisition cycle that produced this snapshot; `0` before the first one
    pub cycle: u64,
    /// Raw scan, one value per sensor channel
    pub taxels: Vec<f32>,
    pub touches: TouchSet,
}

impl Snapshot {
    pub fn empty(channels: usize, capacity: usize) -> Self {
        Self {
            cycle: 0,
            taxels: vec![0.0; channels],
            touches: TouchSet::with_capacity(capacity),
        }
    }

    /// Overwrite every field, reusing the existing allocations.
    pub fn overwrite(&mut self, cycle: u64, taxels: &[f32], touches: &TouchSet) {
        self.cycle = cycle;
        self.taxels.clear();
        self.taxels.extend_from_slice(taxels);
        self.touches.copy_from(touches);
    }
}

/// Create the publisher/reader pair, both starting from an empty snapshot.
pub fn shared_state(channels: usize, capacity: usize) -> (SnapshotPublisher, SnapshotReader) {
    let (input, output) = TripleBuffer::new(&Snapshot::empty(channels, capacity)).split();
    (SnapshotPublisher { input }, SnapshotReader { output })
}

pub struct SnapshotPublisher {
    input: Input<Snapshot>,
}

impl SnapshotPublisher {
    pub fn publish(&mut self, snapshot: Snapshot) {
        self.input.write(snapshot);
    }

    /// Publish one acquisition cycle by copying it into the back buffer.
    pub fn publish_scan(&mut self, cycle: u64, taxels: &[f32], touches: &TouchSet) {
        self.input.input_buffer_mut().overwrite(cycle, taxels, touches);
        self.input.publish();
    }
}

pub struct SnapshotReader {
    output: Output<Snapshot>,
}

impl SnapshotReader {
    /// The most recently published snapshot
    #[inline]
    pub fn latest(&mut self) -> &Snapshot {
        self.output.read()
    }
}
