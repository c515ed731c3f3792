//! Sensor configuration state and the bus it talks through.
//!
//! The physical transport is abstracted behind [`SensorBus`]. [`Sensor`] owns
//! a bus, the [`SensorConfig`] describing how it is set up, and the raw taxel
//! buffer the bus reads into. Configuration changes go through `Sensor` so the
//! state and the device never disagree: a change the bus rejects leaves the
//! state untouched.

mod simulated;

pub use simulated::{Finger, SimulatedBus};

use tracing::info;

use crate::error::SensorError;

/// Operating mode of the sensor, integer-coded the way control messages carry it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Auto = -1,
    Centroid = 0,
    Raw = 1,
    Baseline = 2,
    Differential = 3,
}

impl TryFrom<i32> for Mode {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, i32> {
        match code {
            -1 => Ok(Mode::Auto),
            0 => Ok(Mode::Centroid),
            1 => Ok(Mode::Raw),
            2 => Ok(Mode::Baseline),
            3 => Ok(Mode::Differential),
            other => Err(other),
        }
    }
}

pub const PRESCALER_RANGE: core::ops::RangeInclusive<u8> = 1..=8;
pub const NUM_BITS_RANGE: core::ops::RangeInclusive<u8> = 9..=16;
pub const SPEED_RANGE: core::ops::RangeInclusive<u8> = 0..=3;

/// How the sensor is currently configured.
///
/// Mutated only through [`Sensor`], i.e. by the command dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorConfig {
    pub prescaler: u8,
    /// Raw taxels captured at the last baseline recalibration
    pub baseline: Vec<f32>,
    pub baseline_updates: u32,
    /// Normalized noise floor, `0.0..=1.0`
    pub noise_threshold: f32,
    pub num_bits: u8,
    pub speed: u8,
    pub mode: Mode,
}

impl SensorConfig {
    pub fn new(channels: usize) -> Self {
        Self {
            prescaler: 2,
            baseline: vec![0.0; channels],
            baseline_updates: 0,
            noise_threshold: 0.0,
            num_bits: 12,
            speed: 0,
            mode: Mode::Auto,
        }
    }

    /// Largest value a reading can take at the current bit resolution
    #[inline]
    pub fn full_scale(&self) -> f32 {
        ((1u32 << self.num_bits) - 1) as f32
    }
}

/// The transport to a physical (or simulated) sensor.
///
/// Only `setup` and `read` are required; the setters default to accepting the
/// change, which suits buses whose device has nothing to be told.
pub trait SensorBus: Send + 'static {
    /// Probe the device. Returns the number of channels it reports.
    fn setup(&mut self) -> Result<usize, SensorError>;

    /// Read one scan into `taxels` (one value per channel).
    fn read(&mut self, config: &SensorConfig, taxels: &mut [f32]) -> Result<(), SensorError>;

    fn set_prescaler(&mut self, _prescaler: u8) -> Result<(), SensorError> {
        Ok(())
    }

    fn set_noise_threshold(&mut self, _threshold: f32) -> Result<(), SensorError> {
        Ok(())
    }

    fn set_scan_settings(&mut self, _speed: u8, _num_bits: u8) -> Result<(), SensorError> {
        Ok(())
    }

    fn set_mode(&mut self, _mode: Mode) -> Result<(), SensorError> {
        Ok(())
    }

    fn update_baseline(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

/// A set-up sensor: bus, configuration state and the latest raw scan.
pub struct Sensor<B: SensorBus> {
    bus: B,
    config: SensorConfig,
    taxels: Vec<f32>,
}

impl<B: SensorBus> Sensor<B> {
    /// Probe the bus and put the device in `mode`.
    ///
    /// Fails if the device is absent; nothing downstream should start then.
    pub fn setup(mut bus: B, mode: Mode) -> Result<Self, SensorError> {
        let channels = bus.setup()?;
        let mut sensor = Self {
            bus,
            config: SensorConfig::new(channels),
            taxels: vec![0.0; channels],
        };
        sensor.set_mode(mode)?;
        info!(channels, ?mode, "sensor ready");
        Ok(sensor)
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.taxels.len()
    }

    #[inline]
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// The latest raw scan
    #[inline]
    pub fn taxels(&self) -> &[f32] {
        &self.taxels
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Read a new scan. On error the previous scan is left in place.
    pub fn read(&mut self) -> Result<(), SensorError> {
        self.bus.read(&self.config, &mut self.taxels)
    }

    pub fn set_prescaler(&mut self, prescaler: f32) -> Result<(), SensorError> {
        let prescaler = checked_u8("prescaler", prescaler, PRESCALER_RANGE)?;
        self.bus.set_prescaler(prescaler)?;
        self.config.prescaler = prescaler;
        Ok(())
    }

    pub fn set_noise_threshold(&mut self, threshold: f32) -> Result<(), SensorError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SensorError::OutOfRange { setting: "noise threshold", value: threshold });
        }
        self.bus.set_noise_threshold(threshold)?;
        self.config.noise_threshold = threshold;
        Ok(())
    }

    pub fn set_scan_settings(&mut self, speed: u8, num_bits: u8) -> Result<(), SensorError> {
        let speed = checked_u8("speed", speed as f32, SPEED_RANGE)?;
        let num_bits = checked_u8("number of bits", num_bits as f32, NUM_BITS_RANGE)?;
        self.bus.set_scan_settings(speed, num_bits)?;
        self.config.speed = speed;
        self.config.num_bits = num_bits;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), SensorError> {
        self.bus.set_mode(mode)?;
        self.config.mode = mode;
        Ok(())
    }

    /// Recalibrate the baseline and keep a copy of the current scan as the
    /// reference.
    pub fn update_baseline(&mut self) -> Result<(), SensorError> {
        self.bus.update_baseline()?;
        self.config.baseline.copy_from_slice(&self.taxels);
        self.config.baseline_updates += 1;
        Ok(())
    }
}

fn checked_u8(
    setting: &'static str,
    value: f32,
    range: core::ops::RangeInclusive<u8>,
) -> Result<u8, SensorError> {
    let truncated = value.trunc();
    if truncated.is_finite() && truncated >= *range.start() as f32 && truncated <= *range.end() as f32 {
        Ok(truncated as u8)
    } else {
        Err(SensorError::OutOfRange { setting, value })
    }
}
