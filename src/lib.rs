//! Taxel - capacitive touch strip pipeline across three timing domains
//!
//! Raw scans from a linear (or ring-shaped) capacitive strip are turned into
//! touch centroids, while configuration commands and telemetry move between
//! threads without locks:
//!
//! - a non-real-time control side writes [`Command`]s into a lock-free
//!   [configuration channel](channel),
//! - a soft-real-time [`AcquisitionTask`] reads the sensor, runs the
//!   [`CentroidDetector`], applies queued commands and publishes a
//!   [`Snapshot`],
//! - a hard-real-time audio callback drives the [`TelemetryEmitter`], which
//!   sends the latest snapshot to the visualizer every period.
//!
//! # Example
//!
//! ```no_run
//! use taxel::{Pipeline, SetupParams, SimulatedBus, Finger, StopFlag, SoftwareClock, telemetry_ring};
//!
//! let params = SetupParams::default();
//! let bus = SimulatedBus::ring(28).with_finger(Finger::new(5.0, 0.6, 0.8));
//! let (sink, mut telemetry) = telemetry_ring(params.telemetry_capacity);
//! let pipeline = Pipeline::build(&params, bus, sink).expect("sensor setup failed");
//!
//! let stop = StopFlag::new();
//! let mut control = pipeline.control;
//! let acquisition = pipeline.acquisition.spawn(params.acquisition_interval, stop.clone()).unwrap();
//! let clock = SoftwareClock::new(params.sample_rate, 64).spawn(pipeline.emitter, stop.clone()).unwrap();
//!
//! let msg = serde_json::json!({ "numBits": 10 });
//! control.submit(msg.as_object().unwrap());
//!
//! while let Some(frame) = telemetry.next_frame() {
//!     println!("{:?} touches", frame.active);
//! }
//! stop.request_stop();
//! ```

pub mod acquisition;
pub mod centroid;
pub mod channel;
pub mod clock;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod sensor;
pub mod setup;
pub mod snapshot;
pub mod telemetry;
pub mod touch;

pub use acquisition::{AcquisitionTask, ManualScheduler, PeriodicTask, Phase, Scheduler, StopFlag, ThreadScheduler};
pub use centroid::{detect, CentroidDetector, DetectorSetup};
pub use channel::{config_channel, ConfigReceiver, ConfigSender, Submitted};
pub use clock::SoftwareClock;
#[cfg(feature = "cpal_clock")]
pub use clock::{CpalClock, RunningClock};
pub use command::{decode, Command, CommandKind};
pub use dispatch::{DispatchStats, Dispatcher};
pub use error::{SensorError, SetupError};
pub use sensor::{Finger, Mode, Sensor, SensorBus, SensorConfig, SimulatedBus};
pub use setup::{Pipeline, SetupParams};
pub use snapshot::{shared_state, Snapshot, SnapshotPublisher, SnapshotReader};
pub use telemetry::{
    telemetry_ring, BufferId, RtrbTelemetrySink, TelemetryBuffer, TelemetryEmitter, TelemetryFrame, TelemetryReader,
    TelemetrySink,
};
pub use touch::{Touch, TouchSet};
