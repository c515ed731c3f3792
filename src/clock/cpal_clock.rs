//! CPAL output stream as the audio frame clock.
//!
//! The stream only ever plays silence. Its callback is the hard-real-time
//! context: it advances the [`TelemetryEmitter`] by the number of frames in
//! each buffer and does nothing else.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, SupportedStreamConfig};
use tracing::{info, warn};

use crate::error::SetupError;
use crate::telemetry::{TelemetryEmitter, TelemetrySink};

/// A discovered output device, not yet running.
pub struct CpalClock {
    device: cpal::Device,
    config: SupportedStreamConfig,
    name: String,
}

/// A playing stream. Dropping it stops the clock.
pub struct RunningClock {
    _stream: cpal::Stream,
}

impl CpalClock {
    /// Get the system's default output device.
    ///
    /// Returns `None` if no audio device is available.
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self { device, config, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample rate the emitter must be built with
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Open the stream and start driving `emitter` from its callback.
    pub fn start<S: TelemetrySink>(self, emitter: TelemetryEmitter<S>) -> Result<RunningClock, SetupError> {
        let stream_config = self.config.config();
        let channels = stream_config.channels as usize;

        let stream = match self.config.sample_format() {
            SampleFormat::F32 => build_stream::<f32, S>(&self.device, &stream_config, channels, emitter),
            SampleFormat::I16 => build_stream::<i16, S>(&self.device, &stream_config, channels, emitter),
            SampleFormat::U16 => build_stream::<u16, S>(&self.device, &stream_config, channels, emitter),
            other => return Err(SetupError::AudioClock(format!("unsupported sample format: {other:?}"))),
        }
        .map_err(|err| SetupError::AudioClock(err.to_string()))?;

        stream.play().map_err(|err| SetupError::AudioClock(err.to_string()))?;
        info!(device = %self.name, sample_rate = self.sample_rate(), channels, "audio frame clock started");

        Ok(RunningClock { _stream: stream })
    }
}

fn build_stream<T: SizedSample, S: TelemetrySink>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    channels: usize,
    mut emitter: TelemetryEmitter<S>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _| {
            for sample in data.iter_mut() {
                *sample = T::EQUILIBRIUM;
            }
            emitter.process(data.len() / channels.max(1));
        },
        |err| warn!("CPAL stream error: {:?}", err),
        None,
    )
}
