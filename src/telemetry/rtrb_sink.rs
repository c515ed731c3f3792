//! Ring buffer telemetry sink, for handing telemetry to another thread

use rtrb::{Consumer, Producer, RingBuffer};

use crate::telemetry::{BufferId, TelemetrySink};

const HEADER_LEN: usize = 2;

/// Create a telemetry sink and the reader draining it.
///
/// `capacity` is in `f32` slots; each buffer takes two header slots plus its
/// payload.
pub fn telemetry_ring(capacity: usize) -> (RtrbTelemetrySink, TelemetryReader) {
    let (producer, consumer) = RingBuffer::<f32>::new(capacity);
    (
        RtrbTelemetrySink { producer, skipped: 0 },
        TelemetryReader { consumer, partial: TelemetryFrame::default() },
    )
}

/// A sink that writes framed buffers into an rtrb ring buffer
///
/// Each buffer is written as `[id, len, payload...]` in a single chunk, so the
/// reader never sees half of one. A buffer that doesn't fit is skipped whole.
pub struct RtrbTelemetrySink {
    producer: Producer<f32>,
    skipped: u64,
}

impl RtrbTelemetrySink {
    /// Returns how many slots are free
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    /// Buffers dropped because the ring was full
    #[inline]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl TelemetrySink for RtrbTelemetrySink {
    fn send_buffer(&mut self, id: BufferId, data: &[f32]) {
        let header = [id as u8 as f32, data.len() as f32];
        match self.producer.write_chunk_uninit(HEADER_LEN + data.len()) {
            Ok(chunk) => {
                chunk.fill_from_iter(header.into_iter().chain(data.iter().copied()));
            }
            // Skip this buffer rather than partially write
            Err(_) => self.skipped += 1,
        }
    }
}

/// One telemetry buffer as read back off the ring
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryBuffer {
    pub id: BufferId,
    pub data: Vec<f32>,
}

/// A complete five-buffer emission
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetryFrame {
    pub channels: Option<usize>,
    pub taxels: Option<Vec<f32>>,
    pub active: Option<usize>,
    pub locations: Option<Vec<f32>>,
    pub sizes: Option<Vec<f32>>,
}

impl TelemetryFrame {
    fn is_complete(&self) -> bool {
        self.channels.is_some()
            && self.taxels.is_some()
            && self.active.is_some()
            && self.locations.is_some()
            && self.sizes.is_some()
    }

    fn accept(&mut self, buffer: TelemetryBuffer) {
        let scalar = |data: &[f32]| data.first().map(|&v| v as usize);
        match buffer.id {
            // a new emission starts; anything half-assembled is stale
            BufferId::ChannelCount => {
                *self = TelemetryFrame::default();
                self.channels = scalar(&buffer.data);
            }
            BufferId::Taxels => self.taxels = Some(buffer.data),
            BufferId::ActiveCount => self.active = scalar(&buffer.data),
            BufferId::Locations => self.locations = Some(buffer.data),
            BufferId::Sizes => self.sizes = Some(buffer.data),
        }
    }
}

/// Non-real-time end of a [`telemetry_ring`].
pub struct TelemetryReader {
    consumer: Consumer<f32>,
    partial: TelemetryFrame,
}

impl TelemetryReader {
    /// Pop the next buffer, if a whole one is queued.
    pub fn next_buffer(&mut self) -> Option<TelemetryBuffer> {
        loop {
            if self.consumer.slots() < HEADER_LEN {
                return None;
            }
            let id = self.consumer.pop().ok()?;
            let len = self.consumer.pop().ok()? as usize;
            let data: Vec<f32> = self.consumer.read_chunk(len).ok()?.into_iter().collect();

            if let Ok(id) = BufferId::try_from(id as u8) {
                return Some(TelemetryBuffer { id, data });
            }
        }
    }

    /// Pop buffers until a complete emission has been assembled.
    ///
    /// Emissions with a skipped buffer are discarded.
    pub fn next_frame(&mut self) -> Option<TelemetryFrame> {
        while let Some(buffer) = self.next_buffer() {
            let last = buffer.id == BufferId::Sizes;
            self.partial.accept(buffer);
            if last {
                let frame = core::mem::take(&mut self.partial);
                if frame.is_complete() {
                    return Some(frame);
                }
            }
        }
        None
    }
}
