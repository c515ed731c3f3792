//! A sensor bus that synthesizes scans from virtual fingers.
//!
//! Each finger adds a Gaussian bump centred on its location. Readings are
//! quantized to the configured bit resolution, so values are in counts
//! (`0..=2^bits - 1`) the way a real capacitive controller reports them.
//! Centroid and auto mode are served as differential scans.

use crate::error::SensorError;
use crate::sensor::{Mode, SensorBus, SensorConfig};

const DEFAULT_PRESCALER: f32 = 2.0;
const RING_ADDRESS: u8 = 0x38;

/// A virtual finger on a [`SimulatedBus`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Finger {
    /// Centre, in taxel units
    pub location: f32,
    /// Peak normalized intensity
    pub pressure: f32,
    /// Standard deviation of the bump, in taxels
    pub width: f32,
    /// Taxels moved per read
    pub velocity: f32,
}

impl Finger {
    pub fn new(location: f32, pressure: f32, width: f32) -> Self {
        Self { location, pressure, width, velocity: 0.0 }
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity;
        self
    }
}

pub struct SimulatedBus {
    channels: usize,
    present: bool,
    ring: bool,
    fingers: Vec<Finger>,
    /// Ambient (untouched) normalized level
    floor: f32,
    drift: f32,
    device_baseline: f32,
    failing_reads: Vec<u64>,
    reads: u64,
    scan_settings: (u8, u8),
    baseline_requests: u32,
}

impl SimulatedBus {
    fn new(channels: usize, ring: bool) -> Self {
        Self {
            channels,
            present: true,
            ring,
            fingers: Vec::new(),
            floor: 0.0,
            drift: 0.0,
            device_baseline: 0.0,
            failing_reads: Vec::new(),
            reads: 0,
            scan_settings: (0, 12),
            baseline_requests: 0,
        }
    }

    /// A closed-loop strip: fingers near one end bleed into the other.
    pub fn ring(channels: usize) -> Self {
        Self::new(channels, true)
    }

    pub fn linear(channels: usize) -> Self {
        Self::new(channels, false)
    }

    /// A bus with nothing attached; [`setup`](SensorBus::setup) fails.
    pub fn unavailable() -> Self {
        Self { present: false, ..Self::new(0, false) }
    }

    pub fn with_finger(mut self, finger: Finger) -> Self {
        self.fingers.push(finger);
        self
    }

    /// Set the ambient level, which is also the initial device baseline.
    pub fn with_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self.device_baseline = floor;
        self
    }

    /// Set the ambient level without calibrating it out: the device baseline
    /// stays at zero until [`update_baseline`](SensorBus::update_baseline).
    pub fn with_uncalibrated_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }

    /// Make the ambient level creep by `per_read` after every scan.
    pub fn with_drift(mut self, per_read: f32) -> Self {
        self.drift = per_read;
        self
    }

    /// Make the `index`th read (counting from zero) fail.
    pub fn fail_read(mut self, index: u64) -> Self {
        self.failing_reads.push(index);
        self
    }

    /// Number of reads attempted so far
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// `(speed, num_bits)` last sent to the device
    pub fn scan_settings(&self) -> (u8, u8) {
        self.scan_settings
    }

    pub fn baseline_requests(&self) -> u32 {
        self.baseline_requests
    }

    fn signal_at(&self, taxel: usize) -> f32 {
        let n = self.channels as f32;
        self.fingers
            .iter()
            .map(|finger| {
                let mut d = taxel as f32 - finger.location;
                if self.ring {
                    d = (d + n / 2.0).rem_euclid(n) - n / 2.0;
                }
                let width = finger.width.max(f32::EPSILON);
                finger.pressure * (-(d * d) / (2.0 * width * width)).exp()
            })
            .sum()
    }

    fn advance(&mut self) {
        let n = self.channels as f32;
        for finger in &mut self.fingers {
            finger.location = (finger.location + finger.velocity).rem_euclid(n);
        }
        self.floor += self.drift;
    }
}

impl SensorBus for SimulatedBus {
    fn setup(&mut self) -> Result<usize, SensorError> {
        if !self.present {
            return Err(SensorError::Unavailable { bus: 1, address: RING_ADDRESS });
        }
        Ok(self.channels)
    }

    fn read(&mut self, config: &SensorConfig, taxels: &mut [f32]) -> Result<(), SensorError> {
        let index = self.reads;
        self.reads += 1;
        if self.failing_reads.contains(&index) {
            return Err(SensorError::ReadFailed(format!("no acknowledge on scan {index}")));
        }

        let gain = config.prescaler as f32 / DEFAULT_PRESCALER;
        let full_scale = config.full_scale();
        for (i, out) in taxels.iter_mut().enumerate() {
            let raw = (self.floor + self.signal_at(i) * gain).min(1.0);
            let value = match config.mode {
                Mode::Raw => raw,
                Mode::Baseline => self.device_baseline,
                Mode::Differential | Mode::Centroid | Mode::Auto => {
                    let diff = (raw - self.device_baseline).max(0.0);
                    if diff <= config.noise_threshold { 0.0 } else { diff }
                }
            };
            *out = (value.clamp(0.0, 1.0) * full_scale).round();
        }

        self.advance();
        Ok(())
    }

    fn set_scan_settings(&mut self, speed: u8, num_bits: u8) -> Result<(), SensorError> {
        self.scan_settings = (speed, num_bits);
        Ok(())
    }

    fn update_baseline(&mut self) -> Result<(), SensorError> {
        self.device_baseline = self.floor;
        self.baseline_requests += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: Mode) -> SensorConfig {
        let mut config = SensorConfig::new(28);
        config.mode = mode;
        config
    }

    #[test]
    fn idle_differential_scan_is_zero() {
        let mut bus = SimulatedBus::ring(28).with_floor(0.2);
        let mut taxels = vec![1.0; 28];
        bus.read(&config(Mode::Differential), &mut taxels).unwrap();
        assert!(taxels.iter().all(|&t| t == 0.0));
    }

    #[test]
    fn finger_peaks_at_its_location() {
        let mut bus = SimulatedBus::ring(28).with_finger(Finger::new(9.0, 0.5, 0.8));
        let mut taxels = vec![0.0; 28];
        bus.read(&config(Mode::Differential), &mut taxels).unwrap();
        let peak = taxels
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(9));
        assert_eq!(taxels[9], (0.5 * 4095.0f32).round());
    }

    #[test]
    fn ring_bump_wraps_around() {
        let mut bus = SimulatedBus::ring(28).with_finger(Finger::new(0.0, 0.5, 0.8));
        let mut taxels = vec![0.0; 28];
        bus.read(&config(Mode::Differential), &mut taxels).unwrap();
        assert!(taxels[27] > 0.0);
        assert_eq!(taxels[27], taxels[1]);
    }

    #[test]
    fn noise_threshold_clips_small_readings() {
        let mut bus = SimulatedBus::linear(28).with_finger(Finger::new(14.0, 0.5, 0.8));
        let mut cfg = config(Mode::Differential);
        cfg.noise_threshold = 0.1;
        let mut taxels = vec![0.0; 28];
        bus.read(&cfg, &mut taxels).unwrap();
        let active: Vec<usize> = (0..28).filter(|&i| taxels[i] > 0.0).collect();
        assert_eq!(active, vec![13, 14, 15]);
    }

    #[test]
    fn scripted_failure_hits_only_that_read() {
        let mut bus = SimulatedBus::ring(8).fail_read(1);
        let mut taxels = vec![0.0; 8];
        let cfg = config(Mode::Raw);
        assert!(bus.read(&cfg, &mut taxels).is_ok());
        assert!(matches!(bus.read(&cfg, &mut taxels), Err(SensorError::ReadFailed(_))));
        assert!(bus.read(&cfg, &mut taxels).is_ok());
        assert_eq!(bus.reads(), 3);
    }

    #[test]
    fn uncalibrated_floor_shows_until_baseline_update() {
        let mut bus = SimulatedBus::ring(8).with_uncalibrated_floor(0.2);
        let cfg = config(Mode::Differential);
        let mut taxels = vec![0.0; 8];
        bus.read(&cfg, &mut taxels).unwrap();
        assert!(taxels.iter().all(|&t| t == (0.2 * 4095.0f32).round()));

        bus.update_baseline().unwrap();
        bus.read(&cfg, &mut taxels).unwrap();
        assert!(taxels.iter().all(|&t| t == 0.0));
    }

    #[test]
    fn baseline_follows_drift_after_update() {
        let mut bus = SimulatedBus::ring(8).with_drift(0.05);
        let cfg = config(Mode::Differential);
        let mut taxels = vec![0.0; 8];
        bus.read(&cfg, &mut taxels).unwrap();
        bus.read(&cfg, &mut taxels).unwrap();
        assert!(taxels.iter().all(|&t| t > 0.0));

        bus.update_baseline().unwrap();
        bus.read(&cfg, &mut taxels).unwrap();
        assert!(taxels.iter().all(|&t| t == 0.0));
    }
}
