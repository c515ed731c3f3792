//! Setup parameters and pipeline construction.

use std::time::Duration;

use tracing::info;

use crate::acquisition::AcquisitionTask;
use crate::centroid::{CentroidDetector, DetectorSetup};
use crate::channel::{config_channel, ConfigSender};
use crate::error::SetupError;
use crate::sensor::{Mode, Sensor, SensorBus};
use crate::snapshot::shared_state;
use crate::telemetry::{TelemetryEmitter, TelemetrySink};

/// Everything fixed at initialization.
///
/// Defaults describe a 28-taxel ring with up to four touches, reporting to
/// the visualizer every 15 ms.
#[derive(Clone, Debug, PartialEq)]
pub struct SetupParams {
    pub taxel_count: usize,
    pub touch_capacity: usize,
    /// Divisor turning summed run intensity into touch size
    pub size_scale: f32,
    /// See [`DetectorSetup::wrap_around`]
    pub wrap_around: usize,
    pub merge_distance: usize,
    pub activation_threshold: f32,
    /// Seconds between two telemetry emissions
    pub telemetry_period: f32,
    pub sample_rate: u32,
    pub mode: Mode,
    pub acquisition_interval: Duration,
    pub command_capacity: usize,
    /// In `f32` slots
    pub telemetry_capacity: usize,
}

impl Default for SetupParams {
    fn default() -> Self {
        Self {
            taxel_count: 28,
            touch_capacity: 4,
            size_scale: 3200.0,
            wrap_around: 5,
            merge_distance: 0,
            activation_threshold: 0.0,
            telemetry_period: 0.015,
            sample_rate: 44_100,
            mode: Mode::Differential,
            acquisition_interval: Duration::from_millis(50),
            command_capacity: 64,
            telemetry_capacity: 4096,
        }
    }
}

impl SetupParams {
    pub fn with_taxels(mut self, taxel_count: usize) -> Self {
        self.taxel_count = taxel_count;
        self
    }

    pub fn with_touch_capacity(mut self, touch_capacity: usize) -> Self {
        self.touch_capacity = touch_capacity;
        self
    }

    pub fn with_size_scale(mut self, size_scale: f32) -> Self {
        self.size_scale = size_scale;
        self
    }

    pub fn with_wrap_around(mut self, wrap_around: usize) -> Self {
        self.wrap_around = wrap_around;
        self
    }

    pub fn with_merge_distance(mut self, merge_distance: usize) -> Self {
        self.merge_distance = merge_distance;
        self
    }

    pub fn with_activation_threshold(mut self, threshold: f32) -> Self {
        self.activation_threshold = threshold;
        self
    }

    pub fn with_telemetry_period(mut self, seconds: f32) -> Self {
        self.telemetry_period = seconds;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_acquisition_interval(mut self, interval: Duration) -> Self {
        self.acquisition_interval = interval;
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    pub fn with_telemetry_capacity(mut self, capacity: usize) -> Self {
        self.telemetry_capacity = capacity;
        self
    }

    pub fn detector_setup(&self) -> DetectorSetup {
        DetectorSetup::new(self.taxel_count, self.touch_capacity, self.size_scale)
            .with_wrap_around(self.wrap_around)
            .with_merge_distance(self.merge_distance)
            .with_activation_threshold(self.activation_threshold)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |name: &'static str, reason: &'static str| -> Result<(), SetupError> {
            Err(SetupError::InvalidParameter { name, reason })
        };
        if self.taxel_count == 0 {
            return invalid("taxel_count", "must be at least 1");
        }
        if self.touch_capacity == 0 {
            return invalid("touch_capacity", "must be at least 1");
        }
        if !(self.size_scale.is_finite() && self.size_scale > 0.0) {
            return invalid("size_scale", "must be positive");
        }
        if !(self.telemetry_period.is_finite() && self.telemetry_period > 0.0) {
            return invalid("telemetry_period", "must be positive");
        }
        if self.sample_rate == 0 {
            return invalid("sample_rate", "must be positive");
        }
        if self.command_capacity == 0 {
            return invalid("command_capacity", "must be at least 1");
        }
        Ok(())
    }
}

/// The three timing domains, wired together and ready to be handed to their
/// threads:
///
/// - `control` goes to whatever delivers control messages,
/// - `acquisition` to its own thread (see [`AcquisitionTask::spawn`]),
/// - `emitter` to the audio frame clock.
pub struct Pipeline<B: SensorBus, S: TelemetrySink> {
    pub control: ConfigSender,
    pub acquisition: AcquisitionTask<B>,
    pub emitter: TelemetryEmitter<S>,
}

impl<B: SensorBus, S: TelemetrySink> Pipeline<B, S> {
    /// Set up the sensor and connect everything.
    ///
    /// Fails if the parameters are invalid or the sensor cannot be set up;
    /// nothing has been started at that point.
    pub fn build(params: &SetupParams, bus: B, sink: S) -> Result<Self, SetupError> {
        params.validate()?;
        let sensor = Sensor::setup(bus, params.mode)?;
        let channels = sensor.num_channels();
        if channels < params.taxel_count {
            return Err(SetupError::InvalidParameter {
                name: "taxel_count",
                reason: "sensor reports fewer channels",
            });
        }

        let (control, commands) = config_channel(params.command_capacity);
        let (publisher, reader) = shared_state(channels, params.touch_capacity);
        let detector = CentroidDetector::new(params.detector_setup());

        info!(
            channels,
            taxels = params.taxel_count,
            touches = params.touch_capacity,
            wrap_around = params.wrap_around,
            "pipeline ready"
        );

        Ok(Self {
            control,
            acquisition: AcquisitionTask::new(sensor, detector, commands, publisher),
            emitter: TelemetryEmitter::new(reader, sink, params.telemetry_period, params.sample_rate),
        })
    }
}
