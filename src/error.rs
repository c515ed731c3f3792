//! Error types.
//!
//! Only setup can fail fatally. Everything that happens once the pipeline is
//! running is either logged and recovered from, or (on the audio thread)
//! infallible by construction.

use thiserror::Error;

/// Errors reported by a [`SensorBus`](crate::sensor::SensorBus).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// The device did not answer during setup.
    #[error("no sensor found on bus {bus} at address {address:#04x}")]
    Unavailable { bus: u8, address: u8 },

    /// A single scan could not be read. Transient.
    #[error("sensor read failed: {0}")]
    ReadFailed(String),

    /// A configuration value the device cannot accept.
    #[error("{setting} out of range: {value}")]
    OutOfRange { setting: &'static str, value: f32 },
}

/// Errors that abort startup before any clock is running.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("sensor setup failed: {0}")]
    Sensor(#[from] SensorError),

    #[error("invalid setup parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },

    #[error("audio clock failed: {0}")]
    AudioClock(String),
}
