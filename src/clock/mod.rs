//! Audio frame clocks that drive a [`TelemetryEmitter`].
//!
//! The emitter only needs to be told how many frames went by. With the
//! `cpal_clock` feature, [`CpalClock`] does that from a real output stream's
//! callback. [`SoftwareClock`] paces blocks against the wall clock instead,
//! for machines without an audio device.

#[cfg(feature = "cpal_clock")]
mod cpal_clock;

#[cfg(feature = "cpal_clock")]
pub use cpal_clock::{CpalClock, RunningClock};

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::info;

use crate::acquisition::StopFlag;
use crate::telemetry::{TelemetryEmitter, TelemetrySink};

/// Feeds an emitter fixed-size blocks at `sample_rate` frames per second.
#[derive(Clone, Copy, Debug)]
pub struct SoftwareClock {
    sample_rate: u32,
    block_size: usize,
}

impl SoftwareClock {
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size: block_size.max(1),
        }
    }

    /// Run the clock on its own thread until `stop` is raised. The emitter is
    /// handed back when the thread is joined.
    pub fn spawn<S: TelemetrySink>(
        self,
        mut emitter: TelemetryEmitter<S>,
        stop: StopFlag,
    ) -> std::io::Result<JoinHandle<TelemetryEmitter<S>>> {
        thread::Builder::new().name("frame-clock".into()).spawn(move || {
            info!(sample_rate = self.sample_rate, block_size = self.block_size, "software frame clock started");
            let start = Instant::now();
            let rate = self.sample_rate as f64;
            let mut blocks = 0u64;

            while !stop.is_stop_requested() {
                // Calculate how many blocks should have been processed by now
                let target = (start.elapsed().as_secs_f64() * rate / self.block_size as f64) as u64;

                while blocks < target {
                    emitter.process(self.block_size);
                    blocks += 1;
                }

                thread::sleep(Duration::from_micros(500));
            }
            emitter
        })
    }
}
